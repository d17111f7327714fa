//! Basic numerical concepts used throughout the program

#![allow(missing_docs)]

/// Floating-point precision of all kinematic quantities (GeV-based units)
pub type Float = f64;

/// Constants associated with the selected floating-point precision
pub use std::f64 as floats;
