//! HTTP API handlers.
//!
//! The transfer endpoint answers every path no other route claims.

pub mod health;
pub mod transfer;

pub use transfer::transfer;
