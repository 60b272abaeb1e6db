//! Ollama-backed Semantic Analyzer for intentgate.
//!
//! Implements [`intentgate_core::IntentAnalyzer`] against a local Ollama
//! instance, so intent analysis needs no external cloud service. The broker
//! only ever sees typed verdicts or a typed [`intentgate_core::AnalyzerError`]: all prompt
//! construction and best-effort recovery of the model's text output lives
//! here, behind the trait boundary.
//!
//! ```text
//! ┌──────────┐    ┌────────────────┐    ┌────────────┐
//! │  Broker   │───▶│ OllamaAnalyzer │───▶│   Ollama    │
//! │ (trait)   │    │ prompt + repair│    │ /api/generate│
//! └──────────┘    └────────────────┘    └────────────┘
//! ```

mod ollama;
mod repair;

pub use ollama::{OllamaAnalyzer, OllamaClient};
pub use repair::parse_json_output;
