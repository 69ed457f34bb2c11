//! Primitive types that have no direct Rust counterpart

mod decimal;
pub use decimal::*;

mod timestamp;
pub use timestamp::*;
