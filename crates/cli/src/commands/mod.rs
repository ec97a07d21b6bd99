//! CLI command implementations.

pub mod addresses;
pub mod cart;
pub mod checkout;
pub mod locations;
