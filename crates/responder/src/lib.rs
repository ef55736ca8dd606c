//! Banterbot responder — the per-channel rate-gating state machine.
//!
//! Watches inbound channel messages and, once enough of them arrive inside
//! a sliding window while the channel is not cooling down, fetches recent
//! history and posts one generated reply.
//!
//! Components (leaves first):
//! - [`SlidingWindowTracker`] — timestamps within the trailing window
//! - [`CooldownGate`] — last reply time plus a cancellable countdown
//! - [`PromptBuilder`] — history → model input text
//! - [`ResponseGenerator`] — provider call with textual fallback
//! - [`ChannelEventRouter`] — the orchestrator
//! - [`Dispatcher`] — per-channel worker queues in front of the router

pub mod cooldown;
pub mod dispatch;
pub mod generator;
pub mod prompt;
pub mod router;
pub mod state;
pub mod window;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use cooldown::{CooldownGate, Countdown};
pub use dispatch::Dispatcher;
pub use generator::{FALLBACK_PREFIX, ResponseGenerator};
pub use prompt::PromptBuilder;
pub use router::{ChannelEventRouter, IgnoreReason, Outcome};
pub use state::{ChannelState, ChannelStates};
pub use window::SlidingWindowTracker;
