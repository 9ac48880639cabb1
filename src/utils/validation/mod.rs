//! Validation utilities for buffer geometry and numeric parameters

pub mod dimensions;
pub mod numeric;

pub use dimensions::DimensionValidator;
pub use numeric::NumericValidator;
