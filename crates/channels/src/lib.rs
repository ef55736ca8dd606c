//! Chat channel implementations for Banterbot.
//!
//! Each channel connects to a chat platform, delivers inbound message events
//! to the responder, and exposes history fetch and message posting.
//!
//! Available channels:
//! - **Slack** — Socket Mode inbound, Web API outbound and history

pub mod slack;

pub use slack::{SlackChannel, SlackConfig};
