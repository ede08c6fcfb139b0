//! Chat-completion providers for Hestia.
//!
//! All providers implement the `hestia_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
