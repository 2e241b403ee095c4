//! In-memory processed webhook log.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::DomainError;
use crate::domain::subscription::ProviderKind;
use crate::ports::{SaveResult, WebhookEventRecord, WebhookEventRepository};

#[derive(Default)]
pub struct InMemoryWebhookEventRepository {
    records: RwLock<HashMap<(ProviderKind, String), WebhookEventRecord>>,
}

impl InMemoryWebhookEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Drops every record, as a retention sweep would.
    pub async fn clear(&self) {
        self.records.write().await.clear();
    }
}

#[async_trait]
impl WebhookEventRepository for InMemoryWebhookEventRepository {
    async fn find(
        &self,
        provider: ProviderKind,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        let records = self.records.read().await;
        Ok(records.get(&(provider, event_id.to_string())).cloned())
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError> {
        let mut records = self.records.write().await;
        let key = (record.provider, record.event_id.clone());
        if records.contains_key(&key) {
            return Ok(SaveResult::AlreadyExists);
        }
        records.insert(key, record);
        Ok(SaveResult::Inserted)
    }
}
