//! # Banterbot Core
//!
//! Domain types, traits, and error definitions for the Banterbot channel
//! responder. This crate has **no transport or backend dependencies** — it
//! defines the domain model that the other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator is a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping the chat platform or the generation backend
//! - Testing the responder with mock channels and providers
//! - Clean dependency graph (all crates depend inward on core)

pub mod channel;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use channel::{Channel, ChannelEvent, ChannelId};
pub use error::{ChannelError, Error, ProviderError, Result};
pub use event::{DomainEvent, EventBus};
pub use message::HistoricalMessage;
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
