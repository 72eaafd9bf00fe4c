//! Adapters Layer
//!
//! Inbound (HTTP API) and outbound (source fetching) edges of the
//! service.

pub mod inbound;
pub mod outbound;
