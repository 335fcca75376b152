use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::attestation::LedgerTxStatus;
use crate::error::ServiceError;
use crate::ids::{StorageHandle, TxHandle};

/// The object store is an external collaborator outside this core's scope
/// (§1): `put(bytes) -> id`, `get(id) -> bytes`. Only this two-method
/// contract is modelled here.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, bytes: Vec<u8>) -> Result<StorageHandle, ServiceError>;
    async fn get(&self, handle: &StorageHandle) -> Result<Vec<u8>, ServiceError>;
}

/// The on-chain attestation relay is an external collaborator (§1):
/// `submit(signedPayload) -> txHandle`, with state
/// `pending -> confirmed | failed | simulated`.
#[async_trait]
pub trait AttestationLedger: Send + Sync {
    async fn submit(&self, payload: Vec<u8>) -> Result<(TxHandle, LedgerTxStatus), ServiceError>;
}

#[async_trait]
impl ObjectStore for Arc<dyn ObjectStore> {
    async fn put(&self, bytes: Vec<u8>) -> Result<StorageHandle, ServiceError> {
        self.as_ref().put(bytes).await
    }
    async fn get(&self, handle: &StorageHandle) -> Result<Vec<u8>, ServiceError> {
        self.as_ref().get(handle).await
    }
}

#[async_trait]
impl AttestationLedger for Arc<dyn AttestationLedger> {
    async fn submit(&self, payload: Vec<u8>) -> Result<(TxHandle, LedgerTxStatus), ServiceError> {
        self.as_ref().submit(payload).await
    }
}

/// In-memory object store: the default backend, and the one used by tests.
#[derive(Default)]
pub struct InMemoryObjectStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<StorageHandle, ServiceError> {
        let handle = StorageHandle(format!("mem-{}", uuid::Uuid::new_v4()));
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| ServiceError::Internal("object store lock poisoned".into()))?;
        blobs.insert(handle.0.clone(), bytes);
        Ok(handle)
    }

    async fn get(&self, handle: &StorageHandle) -> Result<Vec<u8>, ServiceError> {
        let blobs = self
            .blobs
            .read()
            .map_err(|_| ServiceError::Internal("object store lock poisoned".into()))?;
        blobs
            .get(&handle.0)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("object {} not found", handle.0)))
    }
}

/// In-memory ledger stub: every submission simulates confirmation, matching
/// the "simulated-flag (ledger was a stub)" field on `Attestation`.
#[derive(Default)]
pub struct InMemoryLedger;

impl InMemoryLedger {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AttestationLedger for InMemoryLedger {
    async fn submit(&self, _payload: Vec<u8>) -> Result<(TxHandle, LedgerTxStatus), ServiceError> {
        let handle = TxHandle(format!("sim-{}", uuid::Uuid::new_v4()));
        Ok((handle, LedgerTxStatus::Simulated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn object_store_round_trip() {
        let store = InMemoryObjectStore::new();
        let handle = store.put(b"payload".to_vec()).await.unwrap();
        let back = store.get(&handle).await.unwrap();
        assert_eq!(back, b"payload");
    }

    #[tokio::test]
    async fn unknown_handle_is_not_found() {
        let store = InMemoryObjectStore::new();
        let err = store
            .get(&StorageHandle("missing".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn ledger_stub_simulates() {
        let ledger = InMemoryLedger::new();
        let (_handle, status) = ledger.submit(b"note".to_vec()).await.unwrap();
        assert_eq!(status, LedgerTxStatus::Simulated);
    }
}
