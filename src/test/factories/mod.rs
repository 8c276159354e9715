//! Factories for class images used across the unit tests.

mod bundle;

pub use bundle::ClassImageBuilder;
