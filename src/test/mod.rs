//! Shared test fixtures.

mod factories;

pub use factories::*;
