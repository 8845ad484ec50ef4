//! # E-Tongue Common Library
//!
//! Shared code for the e-tongue analysis wizard crates:
//! - Error types
//! - Configuration loading (TOML + environment + compiled defaults)
//! - Wizard event types and the broadcast EventBus
//! - Persisted operator profile (factory and medicine names)
//! - Timestamp parsing for backend records

pub mod config;
pub mod error;
pub mod events;
pub mod profile;
pub mod time;

pub use error::{Error, Result};
pub use events::{EventBus, WizardEvent};
pub use profile::Profile;
