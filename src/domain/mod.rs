//! Domain layer: payment entities, the webhook wire format, retry rules and
//! the ports through which the application talks to the outside world.

pub mod ports;
pub mod retry;
pub mod transaction;
pub mod webhook;
