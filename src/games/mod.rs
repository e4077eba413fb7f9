//! Concrete game implementations.

pub mod kuhn;
