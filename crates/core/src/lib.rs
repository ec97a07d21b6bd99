//! Palengke Core - Shared types library.
//!
//! This crate provides common types used across all Palengke components:
//! - `storefront` - Cart, checkout, and location synchronization core
//! - `cli` - Command-line driver for the storefront core
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, and checkout enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
