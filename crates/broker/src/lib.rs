//! Contract lifecycle engine for mutual-intent agreements.
//!
//! The broker mediates between clients and servers that first *declare*
//! what they want and offer, then *negotiate* a binding contract judged by
//! a semantic analyzer, and finally have every *transaction* validated
//! against that contract — in both directions — with drift analysis and
//! expiry sweeping over the contract's lifetime.
//!
//! The analyzer is an injected [`intentgate_core::IntentAnalyzer`]; the
//! broker owns all contract state and stays correct (conservatively
//! denying) when the analyzer is unreachable.

mod broker;
mod drift;
mod ledger;
mod registry;
mod stats;
mod store;
mod sweeper;
mod validator;

pub mod testing;

pub use broker::IntentBroker;
pub use ledger::{TransactionLedger, LEDGER_CAPACITY};
pub use registry::DeclarationRegistry;
pub use stats::{BrokerStats, ContractStats};
pub use store::NegotiationCounters;
pub use sweeper::Sweeper;
