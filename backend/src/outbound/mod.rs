//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: read-only PostgreSQL access to the compute tables via
//!   Diesel
//! - **cache**: Redis-backed instance cache, plus an in-process variant
//!
//! Adapters translate between domain types and infrastructure
//! representations. They contain no business logic.

pub mod cache;
pub mod persistence;
