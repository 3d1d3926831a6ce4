//! Instance cache synchronisation library.
//!
//! Copies compute instances from the relational store into a key-value cache
//! and serves tenant listings from that cache.

pub mod domain;
pub mod inbound;
pub mod outbound;
pub mod settings;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
