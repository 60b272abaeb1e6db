//! Declaration registry — storage and lookup for intent and capability
//! declarations.
//!
//! Declarations are immutable; each declare/register call mints a fresh
//! handle, and a client may declare any number of intents. Values are held
//! behind `Arc` so lookups hand out cheap shared references while the
//! registry retains ownership for the process lifetime.

use intentgate_core::{ClientIntent, ServerCapability};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;
use uuid::Uuid;

/// Thread-safe store of declared intents and registered capabilities.
#[derive(Default)]
pub struct DeclarationRegistry {
    intents: RwLock<HashMap<String, Arc<ClientIntent>>>,
    capabilities: RwLock<HashMap<String, Arc<ServerCapability>>>,
}

impl DeclarationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a client intent declaration. Returns its handle.
    pub fn declare_intent(&self, intent: ClientIntent) -> String {
        let intent_id = Uuid::new_v4().to_string();
        info!(intent_id = %intent_id, purpose = %intent.purpose, "Client intent declared");
        self.intents
            .write()
            .unwrap()
            .insert(intent_id.clone(), Arc::new(intent));
        intent_id
    }

    /// Store a server capability declaration. Returns its handle.
    pub fn register_capability(&self, capability: ServerCapability) -> String {
        let capability_id = Uuid::new_v4().to_string();
        info!(
            capability_id = %capability_id,
            provides = ?capability.provides,
            "Server capability registered"
        );
        self.capabilities
            .write()
            .unwrap()
            .insert(capability_id.clone(), Arc::new(capability));
        capability_id
    }

    /// Look up an intent by handle.
    pub fn intent(&self, intent_id: &str) -> Option<Arc<ClientIntent>> {
        self.intents.read().unwrap().get(intent_id).cloned()
    }

    /// Look up a capability by handle.
    pub fn capability(&self, capability_id: &str) -> Option<Arc<ServerCapability>> {
        self.capabilities.read().unwrap().get(capability_id).cloned()
    }

    pub fn intent_count(&self) -> usize {
        self.intents.read().unwrap().len()
    }

    pub fn capability_count(&self) -> usize {
        self.capabilities.read().unwrap().len()
    }
}
