//! Core types for Pic Finder.
//!
//! This module provides type-safe wrappers for the store connection and the
//! normalized product shapes the UI consumes.

pub mod credential;
pub mod id;
pub mod product;
pub mod relay;

pub use credential::{Credentials, clean_domain};
pub use id::*;
pub use product::{Product, ProductImage, ProductsPage};
pub use relay::{RelayErrorBody, RelayRequest, RelayResponse, upstream_url};
