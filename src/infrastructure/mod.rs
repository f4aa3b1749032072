//! Adapters implementing the domain ports.

pub mod http;
pub mod in_memory;
#[cfg(feature = "transport-redis")]
pub mod redis;
