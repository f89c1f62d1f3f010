//! AI provider implementations.

mod openai;

pub use openai::OpenAi;
