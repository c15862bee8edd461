//! Supplier master data

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::material::MaterialKind;

/// What a supplier provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplierType {
    Jobber,
    PackingMaterial,
    RawMaterial,
    Both,
}

impl SupplierType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupplierType::Jobber => "Jobber",
            SupplierType::PackingMaterial => "PackingMaterial",
            SupplierType::RawMaterial => "RawMaterial",
            SupplierType::Both => "Both",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Jobber" => Some(SupplierType::Jobber),
            "PackingMaterial" => Some(SupplierType::PackingMaterial),
            "RawMaterial" => Some(SupplierType::RawMaterial),
            "Both" => Some(SupplierType::Both),
            _ => None,
        }
    }

    /// Material type implied by a non-jobber supplier type
    pub fn derived_material_type(&self) -> Option<MaterialType> {
        match self {
            SupplierType::Jobber => None,
            SupplierType::PackingMaterial => Some(MaterialType::Packing),
            SupplierType::RawMaterial => Some(MaterialType::Raw),
            SupplierType::Both => Some(MaterialType::Both),
        }
    }
}

impl fmt::Display for SupplierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Materials a supplier or jobber handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialType {
    Packing,
    Raw,
    Both,
}

impl MaterialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialType::Packing => "packing",
            MaterialType::Raw => "raw",
            MaterialType::Both => "both",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "packing" => Some(MaterialType::Packing),
            "raw" => Some(MaterialType::Raw),
            "both" => Some(MaterialType::Both),
            _ => None,
        }
    }

    pub fn accepts(&self, kind: MaterialKind) -> bool {
        matches!(
            (self, kind),
            (MaterialType::Both, _)
                | (MaterialType::Packing, MaterialKind::Packing)
                | (MaterialType::Raw, MaterialKind::Raw)
        )
    }
}

impl fmt::Display for MaterialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the stored material type: given explicitly for jobbers, derived otherwise
pub fn resolve_material_type(
    supplier_type: SupplierType,
    requested: Option<MaterialType>,
) -> Result<MaterialType, &'static str> {
    match supplier_type.derived_material_type() {
        Some(derived) => Ok(derived),
        None => requested.ok_or("Material type is required for jobbers"),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: Uuid,
    pub supplier_code: String,
    pub name: String,
    pub supplier_type: SupplierType,
    pub material_type: MaterialType,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub gstin: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn gstin_format(gstin: &str) -> Result<(), ValidationError> {
    crate::validation::validate_gstin(gstin).map_err(|msg| {
        let mut err = ValidationError::new("gstin");
        err.message = Some(msg.into());
        err
    })
}

fn phone_format(phone: &str) -> Result<(), ValidationError> {
    crate::validation::validate_indian_phone(phone).map_err(|msg| {
        let mut err = ValidationError::new("phone");
        err.message = Some(msg.into());
        err
    })
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSupplierInput {
    #[validate(length(min = 1, max = 200, message = "Supplier name is required"))]
    pub name: String,
    pub supplier_type: SupplierType,
    pub material_type: Option<MaterialType>,
    pub contact_person: Option<String>,
    #[validate(custom = "phone_format")]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(custom = "gstin_format")]
    pub gstin: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSupplierInput {
    #[validate(length(min = 1, max = 200, message = "Supplier name is required"))]
    pub name: Option<String>,
    pub supplier_type: Option<SupplierType>,
    pub material_type: Option<MaterialType>,
    pub contact_person: Option<String>,
    #[validate(custom = "phone_format")]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(custom = "gstin_format")]
    pub gstin: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

/// Format a supplier code: `SUP-NNNNN`
pub fn format_supplier_code(sequence: i64) -> String {
    format!("SUP-{:05}", sequence)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> CreateSupplierInput {
        CreateSupplierInput {
            name: "Shree Packaging".to_string(),
            supplier_type: SupplierType::PackingMaterial,
            material_type: None,
            contact_person: None,
            phone: Some("9876543210".to_string()),
            email: Some("orders@shreepack.in".to_string()),
            gstin: Some("27AAPFU0939F1ZV".to_string()),
            address: None,
        }
    }

    #[test]
    fn test_valid_input() {
        assert!(input().validate().is_ok());
    }

    #[test]
    fn test_invalid_fields_are_reported() {
        let mut bad = input();
        bad.name = String::new();
        bad.email = Some("not-an-email".to_string());
        bad.gstin = Some("27AAPFU".to_string());
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("gstin"));
    }

    #[test]
    fn test_material_type_resolution() {
        assert_eq!(
            resolve_material_type(SupplierType::RawMaterial, Some(MaterialType::Packing)),
            Ok(MaterialType::Raw)
        );
        assert_eq!(
            resolve_material_type(SupplierType::Jobber, Some(MaterialType::Packing)),
            Ok(MaterialType::Packing)
        );
        assert!(resolve_material_type(SupplierType::Jobber, None).is_err());
    }

    #[test]
    fn test_material_type_accepts_kind() {
        assert!(MaterialType::Both.accepts(MaterialKind::Raw));
        assert!(MaterialType::Packing.accepts(MaterialKind::Packing));
        assert!(!MaterialType::Packing.accepts(MaterialKind::Raw));
    }

    #[test]
    fn test_supplier_code_format() {
        assert_eq!(format_supplier_code(1), "SUP-00001");
        assert_eq!(format_supplier_code(12345), "SUP-12345");
    }
}
