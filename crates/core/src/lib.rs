//! # intentgate Core
//!
//! Domain types, traits, and error definitions for the intentgate mutual-intent
//! broker. This crate has **zero framework dependencies** — it defines the domain
//! model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The Semantic Analyzer is defined as a trait here; implementations live in
//! their own crates. This enables:
//! - Swapping analyzer backends via configuration
//! - Easy testing with mock/stub analyzers
//! - Clean dependency graph (all crates depend inward on core)

pub mod analyzer;
pub mod contract;
pub mod declaration;
pub mod error;
pub mod verdict;

// Re-export key types at crate root for ergonomics
pub use analyzer::IntentAnalyzer;
pub use contract::{CompatibilityReport, CompatibilityStatus, IntentContract, VIOLATION_THRESHOLD};
pub use declaration::{ClientIntent, DataSensitivity, ServerCapability};
pub use error::{AnalyzerError, BrokerError, ResourceKind, Result};
pub use verdict::{
    DriftAction, DriftReport, DriftSeverity, ResponseVerdict, SuggestedAction, TransactionRecord,
    TransactionVerdict, ValidationResult,
};
