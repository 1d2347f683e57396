//! Domain types - core business entities
//!
//! These types are independent of persistence, transport, and presence concerns.

pub mod config;
pub mod identifier;
