//! # Trait Definitions
pub mod general;
pub mod types;
pub mod wrangler;
