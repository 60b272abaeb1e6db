//! Intent and capability declarations — the inputs to negotiation.
//!
//! Both declarations are immutable once created. The registry owns them for
//! their entire lifetime; contracts embed copies at negotiation time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A client's declaration of its intent for a bounded session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientIntent {
    /// Free-text statement of purpose, e.g. "Analyze portfolio risk".
    pub purpose: String,

    /// Data-category tags the client expects to need, in order.
    pub data_requirements: Vec<String>,

    /// Self-imposed limits, e.g. "read_only", "no_pii".
    pub constraints: Vec<String>,

    /// Session duration in minutes. Absent means no expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,

    /// Free-form auxiliary metadata. The broker never reads into this.
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,

    /// Generated client identity.
    pub client_id: String,

    /// When the intent was declared.
    pub declared_at: DateTime<Utc>,
}

impl ClientIntent {
    /// Create a new intent declaration with a fresh client id.
    pub fn new(
        purpose: impl Into<String>,
        data_requirements: Vec<String>,
        constraints: Vec<String>,
        duration_minutes: Option<i64>,
    ) -> Self {
        Self {
            purpose: purpose.into(),
            data_requirements,
            constraints,
            duration_minutes,
            context: HashMap::new(),
            client_id: Uuid::new_v4().to_string(),
            declared_at: Utc::now(),
        }
    }

    /// Attach auxiliary context metadata.
    pub fn with_context(mut self, context: HashMap<String, serde_json::Value>) -> Self {
        self.context = context;
        self
    }
}

/// Sensitivity tier of the data a server offers. Ordered: public < restricted
/// < confidential.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum DataSensitivity {
    #[default]
    Public,
    Restricted,
    Confidential,
}

/// A server's declaration of its capabilities and boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCapability {
    /// Tags of offered data/services, e.g. "market_data", "forecasting".
    pub provides: Vec<String>,

    /// Self-imposed limits the server promises to respect.
    pub boundaries: Vec<String>,

    /// Named numeric caps, e.g. {"requests_per_minute": 100}.
    #[serde(default)]
    pub rate_limits: HashMap<String, u64>,

    /// Sensitivity tier of the offered data.
    #[serde(default)]
    pub data_sensitivity: DataSensitivity,

    /// Operations the server supports, e.g. "read", "analyze".
    pub supported_operations: Vec<String>,

    /// Generated server identity.
    pub server_id: String,

    /// When the capability was registered.
    pub registered_at: DateTime<Utc>,
}

impl ServerCapability {
    /// Create a new capability declaration with a fresh server id.
    pub fn new(
        provides: Vec<String>,
        boundaries: Vec<String>,
        rate_limits: HashMap<String, u64>,
        data_sensitivity: DataSensitivity,
        supported_operations: Vec<String>,
    ) -> Self {
        Self {
            provides,
            boundaries,
            rate_limits,
            data_sensitivity,
            supported_operations,
            server_id: Uuid::new_v4().to_string(),
            registered_at: Utc::now(),
        }
    }
}
