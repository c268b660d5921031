//! Common types, traits, and error definitions for min_dispersion_primitives
//!
//! This module provides the foundational building blocks shared by the
//! dynamics model, the dispersion selector and the lookup table builder.

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
