//! Chat completion provider implementations.

pub mod mistral;

pub use mistral::MistralProvider;
