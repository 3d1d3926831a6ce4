//! Inbound adapters translating domain results into wire payloads.
//!
//! Only the listing payload lives here; HTTP routing and authorisation are
//! provided by the embedding service.

pub mod server_view;

pub use server_view::{FlavorView, ServerListResponse, ServerView};
