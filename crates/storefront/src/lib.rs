//! Palengke storefront core.
//!
//! Keeps a customer's cart, checkout session, and address location picker
//! consistent with the REST backend that owns them.
//!
//! # Modules
//!
//! - [`api`] - typed gateway to the backend (`ApiClient` over HTTP)
//! - [`cart`] - cached cart with fetch-after-write mutations
//! - [`checkout`] - address → shipping → payment → confirmation pipeline
//! - [`location`] - province → city → barangay cascade
//! - [`addresses`] - saved addresses and the address form
//! - [`state`] - the [`Storefront`] context that owns one of each

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod addresses;
pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod location;
pub mod state;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{Result, StoreError};
pub use state::Storefront;
