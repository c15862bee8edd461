//! Business logic services for the Millstock back office

pub mod approval;
pub mod delivery_challan;
pub mod grn;
pub mod mapping;
pub mod material;
pub mod product_stock;
pub mod purchase_order;
pub mod reconciliation;
pub mod sequence;
pub mod supplier;
