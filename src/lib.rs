//! Box-score crawler: extracts per-event basketball datasets from a remote
//! statistics site, enriches them with derived metrics and resolved player
//! identities, and persists one JSON document per event.

pub mod biography;
pub mod crawler;
pub mod derived;
pub mod error;
pub mod http_client;
pub mod identity;
pub mod page;
pub mod record;
pub mod roster;
pub mod season;
pub mod tables;
