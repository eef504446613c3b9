//! Outbound GraphQL channel and the typed operations it carries.

pub mod client;
pub mod listings;
pub mod operations;

pub use client::{GatewayClient, REQUEST_ID_HEADER};
pub use listings::Catalog;
pub use operations::{Money, Operation};
