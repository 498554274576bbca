use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::host::HostConfig;
use crate::runner::FormHandle;

/// A mounted form and the configuration its host was opened with.
#[derive(Clone)]
pub struct FormSession {
    pub id: String,
    pub config: HostConfig,
    pub form: FormHandle,
    pub created_at: DateTime<Utc>,
}

impl FormSession {
    pub fn new(config: HostConfig, form: FormHandle) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            config,
            form,
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Trait for storing and retrieving form sessions
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn save(&self, session: FormSession) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<FormSession>>;
    /// Removing a session drops its handle, which unmounts the form once no
    /// other clone is alive.
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory implementation of SessionStorage
#[derive(Default)]
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, FormSession>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save(&self, session: FormSession) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<FormSession>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brand::BrandCatalog;
    use crate::form::FormState;
    use crate::host::{HostShell, SubmitOutcome, submitter_fn};
    use crate::protocol::{Feature, InsuranceType};
    use crate::runner::FormRunner;

    #[tokio::test]
    async fn sessions_round_trip_through_storage() {
        let runner = FormRunner::new(Arc::new(BrandCatalog::default()));
        let config = HostConfig::new("LPC001", Feature::Quote, InsuranceType::Vehicle);
        let host = HostShell::new(
            config.clone(),
            Arc::new(submitter_fn(|_record| async {
                anyhow::Ok(SubmitOutcome::accepted("q1", None))
            })),
        );
        let session = FormSession::new(config.clone(), runner.open("s-1", host)).with_id("s-1");

        let storage = InMemorySessionStorage::new();
        storage.save(session).await.unwrap();
        assert_eq!(storage.len(), 1);

        let loaded = storage.get("s-1").await.unwrap().unwrap();
        assert_eq!(loaded.config, config);
        let ready = loaded
            .form
            .wait_for(|snapshot| snapshot.state == FormState::Ready)
            .await
            .unwrap();
        assert_eq!(ready.fields["usage"], "personal");

        storage.delete("s-1").await.unwrap();
        assert!(storage.get("s-1").await.unwrap().is_none());
        assert!(storage.is_empty());
    }
}
