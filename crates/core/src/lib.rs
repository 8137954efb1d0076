//! Shopfront Core - Shared types library.
//!
//! This crate provides the types shared by every Shopfront component:
//! - `cart` - Cart reconciliation against the hosted data service
//! - `cli` - Command-line tools for migrations and cart inspection
//!
//! # Architecture
//!
//! The core crate contains only types and pure computations - no I/O, no
//! database access, no HTTP clients. This keeps it lightweight and allows it
//! to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, prices, cart lines and checkout summaries

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
