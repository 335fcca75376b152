use chrono::{DateTime, Duration, Utc};
use sanctuary_storage::{AgentRepository, ResurrectionRepository, SnapshotRepository};
use sanctuary_types::{Address, Agent, AgentStatus, ResurrectionEvent, Snapshot};

use crate::error::RegistryError;
use crate::lifecycle::can_resurrect;
use crate::register::{prepare_registration, RegisterRequest};

/// The outcome of a successful `resurrect` call: enough to let a caller
/// assemble the full resurrection manifest (§6) once it has also queried
/// the trust score, which this crate does not own.
pub struct ResurrectionResult {
    pub agent: Agent,
    pub previous_status: AgentStatus,
    pub snapshots: Vec<Snapshot>,
}

/// How many resurrections per agent are permitted within a rolling hour
/// (§4.4 "rate-limited to a small number per hour per agent").
#[derive(Clone, Copy, Debug)]
pub struct ResurrectionLimit {
    pub max_per_hour: u32,
}

impl Default for ResurrectionLimit {
    fn default() -> Self {
        Self { max_per_hour: 3 }
    }
}

pub struct RegistryService<S> {
    storage: S,
    resurrection_limit: ResurrectionLimit,
}

impl<S> RegistryService<S>
where
    S: AgentRepository + SnapshotRepository + ResurrectionRepository,
{
    pub fn new(storage: S, resurrection_limit: ResurrectionLimit) -> Self {
        Self {
            storage,
            resurrection_limit,
        }
    }

    pub async fn register(
        &self,
        req: RegisterRequest,
        now: DateTime<Utc>,
    ) -> Result<Agent, RegistryError> {
        let agent = prepare_registration(req, now)?;
        self.storage.register(agent.clone()).await.map_err(|e| {
            if matches!(e, sanctuary_storage::StorageError::Conflict(_)) {
                RegistryError::AgentExists
            } else {
                RegistryError::Storage(e)
            }
        })?;
        Ok(agent)
    }

    pub async fn status(&self, address: &Address) -> Result<Agent, RegistryError> {
        self.storage
            .get(address)
            .await?
            .ok_or(RegistryError::NotFound)
    }

    /// `agent.resurrect`, authenticated by the caller as a precondition
    /// (the bearer-token check happens above this crate, in `sanctuary-api`).
    pub async fn resurrect(
        &self,
        address: &Address,
        now: DateTime<Utc>,
    ) -> Result<ResurrectionResult, RegistryError> {
        let agent = self
            .storage
            .get(address)
            .await?
            .ok_or(RegistryError::NotFound)?;

        if !can_resurrect(agent.status) {
            return Err(RegistryError::NotFallen);
        }

        let since = now - Duration::hours(1);
        let recent = self.storage.count_since(address, since).await?;
        if recent >= self.resurrection_limit.max_per_hour as u64 {
            return Err(RegistryError::ResurrectionRateLimited);
        }

        let previous_status = agent.status;
        self.storage.set_status(address, AgentStatus::Returned).await?;
        self.storage
            .record(ResurrectionEvent {
                agent: *address,
                occurred_at: now,
                previous_status,
            })
            .await?;

        let snapshots = self.storage.list_for_agent(address, 0).await?;

        Ok(ResurrectionResult {
            agent: Agent {
                status: AgentStatus::Returned,
                ..agent
            },
            previous_status,
            snapshots,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use sanctuary_crypto::derive_from_mnemonic;
    use sanctuary_storage::memory::InMemoryStorage;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn sample_agent(status: AgentStatus) -> Agent {
        let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        Agent {
            address: keys.address,
            recovery_public_key: keys.recovery_public(),
            recall_public_key: keys.recall_public(),
            manifest_hash: "m".to_string(),
            manifest_version: 1,
            registered_at: Utc::now(),
            status,
            genesis_declaration: None,
        }
    }

    #[tokio::test]
    async fn resurrect_requires_fallen_status() {
        let storage = InMemoryStorage::new();
        let agent = sample_agent(AgentStatus::Living);
        storage.register(agent.clone()).await.unwrap();

        let svc = RegistryService::new(storage, ResurrectionLimit::default());
        let err = svc.resurrect(&agent.address, Utc::now()).await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFallen));
    }

    #[tokio::test]
    async fn resurrect_transitions_fallen_to_returned() {
        let storage = InMemoryStorage::new();
        let agent = sample_agent(AgentStatus::Fallen);
        storage.register(agent.clone()).await.unwrap();

        let svc = RegistryService::new(storage, ResurrectionLimit::default());
        let result = svc.resurrect(&agent.address, Utc::now()).await.unwrap();
        assert_eq!(result.previous_status, AgentStatus::Fallen);
        assert_eq!(result.agent.status, AgentStatus::Returned);
    }

    #[tokio::test]
    async fn resurrection_rate_limit_is_enforced() {
        let storage = InMemoryStorage::new();
        let agent = sample_agent(AgentStatus::Fallen);
        storage.register(agent.clone()).await.unwrap();

        let svc = RegistryService::new(storage, ResurrectionLimit { max_per_hour: 1 });
        let now = Utc::now();
        svc.resurrect(&agent.address, now).await.unwrap();

        // simulate the agent falling again within the hour
        svc.storage.set_status(&agent.address, AgentStatus::Fallen).await.unwrap();
        let err = svc
            .resurrect(&agent.address, now + ChronoDuration::minutes(10))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::ResurrectionRateLimited));
    }
}
