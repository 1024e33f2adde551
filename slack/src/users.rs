use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::client::SlackClient;
use crate::error::SlackResult;

/// User id → user name, refreshed from `users.list` when an id is unknown.
pub struct UserDirectory {
    client: SlackClient,
    names: RwLock<HashMap<String, String>>,
}

impl UserDirectory {
    pub fn new(client: SlackClient) -> Self {
        Self {
            client,
            names: RwLock::new(HashMap::new()),
        }
    }

    /// Replaces the cache with the current member list.
    pub async fn refresh(&self) -> SlackResult<usize> {
        let users = self.client.users_list().await?;
        let mut names = self.names.write().await;
        names.clear();
        names.extend(users.into_iter().map(|u| (u.id, u.name)));
        info!(count = names.len(), "user directory refreshed");
        Ok(names.len())
    }

    /// Falls back to the id itself when the user can't be found.
    pub async fn name_of(&self, user_id: &str) -> String {
        let names = self.lookup(&[user_id]).await;
        names
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| user_id.to_string())
    }

    /// Names for all `ids` that could be resolved. Refreshes at most once.
    pub async fn lookup(&self, ids: &[&str]) -> HashMap<String, String> {
        if self.resolve(ids).await.len() < ids.len() {
            if let Err(e) = self.refresh().await {
                warn!(error = %e, "failed to refresh user directory");
            }
        }
        self.resolve(ids).await
    }

    async fn resolve(&self, ids: &[&str]) -> HashMap<String, String> {
        let names = self.names.read().await;
        ids.iter()
            .filter_map(|id| names.get(*id).map(|n| (id.to_string(), n.clone())))
            .collect()
    }
}
