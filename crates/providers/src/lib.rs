//! Text-generation provider implementations for Banterbot.
//!
//! All providers implement the `banterbot_core::Provider` trait.

pub mod gemini;

pub use gemini::GeminiProvider;
