//! Application state for API handlers.

use std::sync::Arc;

use sanctuary_auth::AuthService;
use sanctuary_registry::RegistryService;
use sanctuary_snapshots::SnapshotService;
use sanctuary_storage::SharedStorage;
use sanctuary_trust::TrustService;
use sanctuary_types::{AttestationLedger, ObjectStore};

type DynObjectStore = Arc<dyn ObjectStore>;
type DynLedger = Arc<dyn AttestationLedger>;

/// Shared application state, cheap to clone: every field is an `Arc` or a
/// handle that is itself `Arc`-backed (`SharedStorage`).
#[derive(Clone)]
pub struct AppState {
    pub storage: SharedStorage,
    pub auth: Arc<AuthService<SharedStorage>>,
    pub registry: Arc<RegistryService<SharedStorage>>,
    pub snapshots: Arc<SnapshotService<SharedStorage, DynObjectStore>>,
    pub trust: Arc<TrustService<SharedStorage, DynLedger>>,
}

impl AppState {
    pub fn new(
        storage: SharedStorage,
        auth: AuthService<SharedStorage>,
        registry: RegistryService<SharedStorage>,
        snapshots: SnapshotService<SharedStorage, DynObjectStore>,
        trust: TrustService<SharedStorage, DynLedger>,
    ) -> Self {
        Self {
            storage,
            auth: Arc::new(auth),
            registry: Arc::new(registry),
            snapshots: Arc::new(snapshots),
            trust: Arc::new(trust),
        }
    }
}
