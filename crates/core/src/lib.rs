//! Pic Finder Core - Shared types library.
//!
//! This crate provides common types used across all Pic Finder components:
//! - `shopify` - Store connectivity client (transports, caching, pagination)
//! - `relay` - Same-origin relay that forwards requests to the Admin API
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no storage.
//! This keeps it lightweight and lets the client and the relay agree on the
//! wire format of the relay envelope without depending on each other.
//!
//! # Modules
//!
//! - [`types`] - Credentials, type-safe IDs, normalized products, relay envelope

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
