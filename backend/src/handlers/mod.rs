//! HTTP handlers

pub mod approvals;
pub mod delivery_challan;
pub mod grns;
pub mod health;
pub mod mappings;
pub mod materials;
pub mod product_stock;
pub mod purchase_orders;
pub mod reconciliations;
pub mod suppliers;

pub use approvals::*;
pub use delivery_challan::*;
pub use grns::*;
pub use health::*;
pub use mappings::*;
pub use materials::*;
pub use product_stock::*;
pub use purchase_orders::*;
pub use reconciliations::*;
pub use suppliers::*;
