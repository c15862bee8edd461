//! Shared types and models for the Millstock back office
//!
//! This crate contains the domain models, derived-field formulas, and status
//! transition tables shared between the backend, the browser client (via
//! WASM), and tests. It performs no I/O.

pub mod amount_words;
pub mod models;
pub mod state;
pub mod validation;

pub use amount_words::amount_in_words;
pub use models::*;
pub use state::*;
pub use validation::*;
