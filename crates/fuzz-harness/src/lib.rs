//! Fuzz Harness
//!
//! Reusable property-based testing strategies for the geo and orbital domain.
//! Every crate in the workspace pulls its proptest inputs from here so the
//! value ranges stay consistent.
//!
//! # Usage
//!
//! ```rust
//! use fuzz_harness::prelude::*;
//!
//! proptest! {
//!     #[test]
//!     fn my_fuzz_test(p in geo_point(), alt in altitude_km()) {
//!         prop_assert!(p.0.abs() <= 90.0 && alt > 0.0);
//!     }
//! }
//! ```

pub mod generators;

pub mod prelude {
    pub use crate::generators::*;
    pub use proptest::prelude::*;
}

// Re-export proptest for convenience
pub use proptest;
