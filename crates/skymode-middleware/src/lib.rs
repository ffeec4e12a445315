//! `skymode-middleware` – message plumbing between modes and the autopilot.
//!
//! Routes messages without caring about their meaning.
//!
//! # Modules
//!
//! - [`bus`] – namespaced, topic-based publish/subscribe [`MessageBus`] built
//!   on Tokio broadcast channels. Publishing is fire-and-forget; best-effort
//!   topics keep only the newest sample.

pub mod bus;

pub use bus::{MessageBus, Topic, TopicReceiver};
