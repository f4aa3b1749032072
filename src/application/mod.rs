//! Application layer orchestrating the webhook pipeline.
//!
//! `PaymentUseCase` validates requests and publishes them through the
//! `Publisher`. On the consuming side a `QueueFeeder` moves payloads from the
//! transport into a bounded `tokio` channel, and the `DeliveryWorkerPool`
//! spawns one retrying delivery task per payload.

pub mod payment;
pub mod publisher;
pub mod status;
pub mod subscriber;
pub mod worker;
