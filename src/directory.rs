//! External identity directory seam
//!
//! The portal mirrors profile attributes into the campus identity provider
//! and reads them back during profile repair. The provider is behind a trait
//! so deployments can plug their own backend; the in-memory implementation
//! serves single-node setups and tests.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::PortalError;

/// Profile attributes held by the identity provider, keyed by auth key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryProfile {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub usn: String,
    pub branch: String,
    pub semester: String,
    pub cycle: String,
    #[serde(default)]
    pub bio: Option<String>,
    /// Set once onboarding has been completed through the portal
    #[serde(default)]
    pub onboarding_complete: bool,
}

/// Client seam for the external identity provider
#[async_trait]
pub trait DirectoryProvider: Send + Sync {
    /// Read the stored profile for an auth key, if any
    async fn get_profile(&self, auth_id: &str) -> Result<Option<DirectoryProfile>, PortalError>;

    /// Store the full profile for an auth key, replacing any previous value
    async fn put_profile(
        &self,
        auth_id: &str,
        profile: &DirectoryProfile,
    ) -> Result<(), PortalError>;
}

/// In-process directory backed by a concurrent map
pub struct InMemoryDirectory {
    profiles: DashMap<String, DirectoryProfile>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self {
            profiles: DashMap::new(),
        }
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryProvider for InMemoryDirectory {
    async fn get_profile(&self, auth_id: &str) -> Result<Option<DirectoryProfile>, PortalError> {
        Ok(self.profiles.get(auth_id).map(|entry| entry.clone()))
    }

    async fn put_profile(
        &self,
        auth_id: &str,
        profile: &DirectoryProfile,
    ) -> Result<(), PortalError> {
        self.profiles.insert(auth_id.to_string(), profile.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profile() -> DirectoryProfile {
        DirectoryProfile {
            name: "Bruce Wayne".to_string(),
            email: None,
            usn: "4JC22CS001".to_string(),
            branch: "CSE".to_string(),
            semester: "3".to_string(),
            cycle: "none".to_string(),
            bio: Some("Hero in training.".to_string()),
            onboarding_complete: true,
        }
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let dir = InMemoryDirectory::new();

        assert!(dir.get_profile("user-1").await.unwrap().is_none());

        dir.put_profile("user-1", &sample_profile()).await.unwrap();
        let fetched = dir.get_profile("user-1").await.unwrap().unwrap();
        assert_eq!(fetched, sample_profile());
    }

    #[tokio::test]
    async fn test_put_replaces() {
        let dir = InMemoryDirectory::new();

        dir.put_profile("user-1", &sample_profile()).await.unwrap();

        let mut updated = sample_profile();
        updated.semester = "5".to_string();
        dir.put_profile("user-1", &updated).await.unwrap();

        let fetched = dir.get_profile("user-1").await.unwrap().unwrap();
        assert_eq!(fetched.semester, "5");
    }
}
