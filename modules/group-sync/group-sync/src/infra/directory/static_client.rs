use std::collections::HashMap;

use async_trait::async_trait;
use group_sync_sdk::{DirectoryClient, DirectoryError, DirectoryUser, StemGroup};

use crate::config::StaticDirectoryConfig;

/// Directory answered from configuration.
///
/// Unknown group keys and stems are errors, never empty lists.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectoryClient {
    groups: HashMap<String, Vec<String>>,
    users: HashMap<String, DirectoryUser>,
    stems: HashMap<String, Vec<StemGroup>>,
}

impl StaticDirectoryClient {
    #[must_use]
    pub fn from_config(config: &StaticDirectoryConfig) -> Self {
        Self {
            groups: config.groups.clone(),
            users: config.users.clone(),
            stems: config.stems.clone(),
        }
    }

    #[must_use]
    pub fn with_group(mut self, key: &str, members: &[&str]) -> Self {
        self.groups.insert(
            key.to_owned(),
            members.iter().map(|&m| m.to_owned()).collect(),
        );
        self
    }

    #[must_use]
    pub fn with_user(mut self, external_id: &str, name: &str, email: &str) -> Self {
        self.users.insert(
            external_id.to_owned(),
            DirectoryUser {
                name: name.to_owned(),
                email: email.to_owned(),
            },
        );
        self
    }

    #[must_use]
    pub fn with_stem(mut self, stem: &str, groups: Vec<StemGroup>) -> Self {
        self.stems.insert(stem.to_owned(), groups);
        self
    }
}

#[async_trait]
impl DirectoryClient for StaticDirectoryClient {
    async fn list_members(&self, group_key: &str) -> Result<Vec<String>, DirectoryError> {
        self.groups.get(group_key).cloned().ok_or_else(|| {
            DirectoryError::InvalidResponse(format!("unknown directory group '{group_key}'"))
        })
    }

    async fn list_users(
        &self,
        external_ids: &[String],
    ) -> Result<HashMap<String, DirectoryUser>, DirectoryError> {
        Ok(external_ids
            .iter()
            .filter_map(|id| self.users.get(id).map(|user| (id.clone(), user.clone())))
            .collect())
    }

    async fn list_stem_groups(&self, stem: &str) -> Result<Vec<StemGroup>, DirectoryError> {
        self.stems
            .get(stem)
            .cloned()
            .ok_or_else(|| DirectoryError::InvalidResponse(format!("unknown stem '{stem}'")))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[tokio::test]
    async fn empty_group_is_not_an_error() {
        let directory = StaticDirectoryClient::default().with_group("org:empty", &[]);
        assert_eq!(directory.list_members("org:empty").await.unwrap(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn unknown_group_fails() {
        let directory = StaticDirectoryClient::default();
        assert!(matches!(
            directory.list_members("org:missing").await,
            Err(DirectoryError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn list_users_returns_known_subset() {
        let directory = StaticDirectoryClient::default().with_user("E1", "Jane Doe", "jane@example.edu");
        let found = directory
            .list_users(&["E1".to_owned(), "E2".to_owned()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["E1"].name, "Jane Doe");
    }
}
