//! Core types for Palengke.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod checkout;
pub mod id;
pub mod price;

pub use checkout::*;
pub use id::*;
pub use price::{CurrencyCode, Price};
