//! Domain models for the Millstock back office

mod approval;
mod delivery_challan;
mod grn;
mod mapping;
mod material;
mod product_stock;
mod purchase_order;
mod reconciliation;
mod supplier;

pub use approval::*;
pub use delivery_challan::*;
pub use grn::*;
pub use mapping::*;
pub use material::*;
pub use product_stock::*;
pub use purchase_order::*;
pub use reconciliation::*;
pub use supplier::*;
