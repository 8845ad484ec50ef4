//! Persisted operator profile
//!
//! The wizard remembers which factory and medicine the operator last worked
//! on. Both names live in a small TOML file under fixed keys
//! (`factory_name`, `medicine_name`) and are read once at startup.

use crate::config::write_toml;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Default profile file name inside the app config directory
pub const PROFILE_FILE_NAME: &str = "profile.toml";

/// Factory and medicine names persisted between runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub factory_name: String,
    #[serde(default)]
    pub medicine_name: String,
}

impl Profile {
    pub fn new(factory_name: impl Into<String>, medicine_name: impl Into<String>) -> Self {
        Self {
            factory_name: factory_name.into(),
            medicine_name: medicine_name.into(),
        }
    }

    /// Load the profile, returning an empty one if the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No profile at {}, starting empty", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let profile: Profile = toml::from_str(&content)?;
        info!(
            factory = %profile.factory_name,
            medicine = %profile.medicine_name,
            "Loaded profile from {}",
            path.display()
        );
        Ok(profile)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_toml(self, path)?;
        info!("Profile saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_profile_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let profile = Profile::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(profile, Profile::default());
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join(PROFILE_FILE_NAME);

        Profile::new("ACME", "Tonic1").save(&path).unwrap();

        let loaded = Profile::load(&path).unwrap();
        assert_eq!(loaded.factory_name, "ACME");
        assert_eq!(loaded.medicine_name, "Tonic1");
        assert!(!path.with_file_name("profile.toml.tmp").exists());
    }

    #[test]
    fn test_missing_keys_default_to_empty() {
        let profile: Profile = toml::from_str("factory_name = \"ACME\"").unwrap();
        assert_eq!(profile.factory_name, "ACME");
        assert!(profile.medicine_name.is_empty());
    }
}
