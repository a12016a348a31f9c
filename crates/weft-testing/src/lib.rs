//! Testing utilities and harness for Weft

pub mod harness;

// Re-export testing utilities
pub use harness::*;

pub mod prelude {
    pub use crate::harness::*;
}
