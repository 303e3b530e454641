//! Pure Rust async game server queries over heterogeneous binary protocols.
//!
//! A [registry::Registry] binds each configured protocol to its compiled
//! [protocol::Protocol] implementation. [query::query] then builds the
//! request, performs one UDP or TCP round trip, and decodes the reply into a
//! normalized [info::QueryResult].
pub mod config;
pub mod error;
pub mod info;
pub mod packet;
pub mod parse;
pub mod protocol;
pub mod query;
pub mod registry;
