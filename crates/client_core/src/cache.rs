use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use shared::domain::{DocumentId, ResponseDocument};
use storage::Storage;
use tokio::sync::Mutex;

/// Last-known-good copies of response documents. A fallback only; the
/// server stays the system of record.
#[async_trait]
pub trait DocumentCache: Send + Sync {
    async fn load(&self, id: &DocumentId) -> Result<Option<ResponseDocument>>;
    async fn store(&self, document: &ResponseDocument) -> Result<()>;
}

#[async_trait]
impl DocumentCache for Storage {
    async fn load(&self, id: &DocumentId) -> Result<Option<ResponseDocument>> {
        Ok(self
            .load_document(id)
            .await?
            .map(|cached| cached.document))
    }

    async fn store(&self, document: &ResponseDocument) -> Result<()> {
        self.put_document(document).await
    }
}

#[derive(Default)]
pub struct MemoryDocumentCache {
    documents: Mutex<HashMap<DocumentId, ResponseDocument>>,
}

impl MemoryDocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.documents.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.lock().await.is_empty()
    }
}

#[async_trait]
impl DocumentCache for MemoryDocumentCache {
    async fn load(&self, id: &DocumentId) -> Result<Option<ResponseDocument>> {
        Ok(self.documents.lock().await.get(id).cloned())
    }

    async fn store(&self, document: &ResponseDocument) -> Result<()> {
        self.documents
            .lock()
            .await
            .insert(document.id.clone(), document.clone());
        Ok(())
    }
}
