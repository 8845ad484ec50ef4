//! Session identity
//!
//! Every remote operation is keyed by `{factory}_{medicine}`. The id only
//! exists while both names are non-empty.

use crate::error::{WizardError, WizardResult};
use serde::{Deserialize, Serialize};

/// Derive the `factory_medicine` id, or None when either name is blank
pub fn derive_factory_medicine_id(factory_name: &str, medicine_name: &str) -> Option<String> {
    let factory = factory_name.trim();
    let medicine = medicine_name.trim();
    if factory.is_empty() || medicine.is_empty() {
        None
    } else {
        Some(format!("{}_{}", factory, medicine))
    }
}

/// Factory and medicine names plus the id derived from them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    factory_name: String,
    medicine_name: String,
    factory_medicine_id: Option<String>,
}

impl SessionIdentity {
    pub fn new(factory_name: impl Into<String>, medicine_name: impl Into<String>) -> Self {
        let mut identity = Self {
            factory_name: factory_name.into(),
            medicine_name: medicine_name.into(),
            factory_medicine_id: None,
        };
        identity.recompute();
        identity
    }

    pub fn set_factory_name(&mut self, factory_name: impl Into<String>) {
        self.factory_name = factory_name.into();
        self.recompute();
    }

    pub fn set_medicine_name(&mut self, medicine_name: impl Into<String>) {
        self.medicine_name = medicine_name.into();
        self.recompute();
    }

    fn recompute(&mut self) {
        self.factory_medicine_id =
            derive_factory_medicine_id(&self.factory_name, &self.medicine_name);
    }

    pub fn factory_name(&self) -> &str {
        self.factory_name.trim()
    }

    pub fn medicine_name(&self) -> &str {
        self.medicine_name.trim()
    }

    pub fn factory_medicine_id(&self) -> Option<&str> {
        self.factory_medicine_id.as_deref()
    }

    /// The id, or [`WizardError::MissingIdentity`]
    pub fn require_id(&self) -> WizardResult<String> {
        self.factory_medicine_id
            .clone()
            .ok_or(WizardError::MissingIdentity)
    }
}
