//! Identity domain types: scope sets and the normalized auth hash.

pub mod hash;
pub mod scope;

pub use hash::*;
pub use scope::*;
