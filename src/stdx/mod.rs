//! Small generic containers shared across the decoder.

pub mod coverage;

pub use coverage::Coverage;
