//! doc-translate - Translate changed Markdown documentation with an LLM
//!
//! Finds the Markdown files touched by the latest commit under a source-language
//! root, asks a chat-completion provider (Zhipu AI, OpenAI, or a credential-free
//! OpenAI-compatible aggregator) to translate them, and writes the results into
//! a parallel tree per target language.

pub mod cli;
pub mod config;
pub mod detector;
pub mod llm;
pub mod pipeline;
pub mod util;
