//! Buffer utilities shared by the compositing pipeline

pub mod crop;
pub mod normalize;
pub mod validation;

pub use crop::BackgroundFitter;
pub use normalize::BufferNormalizer;
pub use validation::{DimensionValidator, NumericValidator};
