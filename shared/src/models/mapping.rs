//! Product to material recipe mapping

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::validation::validate_quantity_scale;

/// Quantity of one material consumed per finished carton
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialPerCarton {
    pub material_name: String,
    pub qty_per_carton: Decimal,
}

/// Recipe for a finished product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMaterialMapping {
    pub product_name: String,
    pub materials: Vec<MaterialPerCarton>,
}

impl ProductMaterialMapping {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.product_name.trim().is_empty() {
            return Err("Product name is required");
        }
        if self.materials.is_empty() {
            return Err("A mapping needs at least one material");
        }
        let mut seen = HashSet::new();
        for m in &self.materials {
            if m.material_name.trim().is_empty() {
                return Err("Material name is required");
            }
            if m.qty_per_carton <= Decimal::ZERO {
                return Err("Quantity per carton must be positive");
            }
            validate_quantity_scale(m.qty_per_carton)
                .map_err(|_| "Quantity per carton allows at most 3 decimal places")?;
            if !seen.insert(m.material_name.as_str()) {
                return Err("A material may appear only once per mapping");
            }
        }
        Ok(())
    }
}
