//! Assertions and the scenario suite that exercise the marketplace through
//! the proxy traits in [`crate::market`].

pub mod assertions;
pub mod scenarios;
