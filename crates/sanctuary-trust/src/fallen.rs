use chrono::{DateTime, Duration, Utc};
use sanctuary_registry::transition_on_stale_heartbeat;
use sanctuary_storage::{AgentRepository, HeartbeatRepository};
use sanctuary_types::AgentStatus;

use crate::error::TrustError;

/// How long a `LIVING` agent may go without a heartbeat before the sweep
/// below transitions it to `FALLEN` (§4.6 "Fallen detection").
pub const FALLEN_THRESHOLD_DAYS: i64 = 30;

/// One pass of the fallen-detection sweep: every currently-`LIVING` agent
/// whose most recent heartbeat is missing or older than the threshold
/// moves to `FALLEN`. Returns the number of agents transitioned.
pub async fn run_fallen_detection<S>(
    storage: &S,
    threshold_days: i64,
    now: DateTime<Utc>,
) -> Result<u64, TrustError>
where
    S: AgentRepository + HeartbeatRepository,
{
    let living = storage.list_living().await?;
    let mut transitioned = 0;

    for address in living {
        let last = storage.last(&address).await?;
        let stale = match last {
            None => true,
            Some(at) => now - at > Duration::days(threshold_days),
        };
        if !stale {
            continue;
        }

        let next = transition_on_stale_heartbeat(AgentStatus::Living);
        if next != AgentStatus::Living {
            storage.set_status(&address, next).await?;
            transitioned += 1;
        }
    }

    Ok(transitioned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sanctuary_crypto::derive_from_mnemonic;
    use sanctuary_storage::memory::InMemoryStorage;
    use sanctuary_types::Agent;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn sample_agent() -> Agent {
        let keys = derive_from_mnemonic(TEST_MNEMONIC).unwrap();
        Agent {
            address: keys.address,
            recovery_public_key: keys.recovery_public(),
            recall_public_key: keys.recall_public(),
            manifest_hash: "m".to_string(),
            manifest_version: 1,
            registered_at: Utc::now() - Duration::days(60),
            status: AgentStatus::Living,
            genesis_declaration: None,
        }
    }

    #[tokio::test]
    async fn agent_with_no_heartbeat_falls() {
        let storage = InMemoryStorage::new();
        let agent = sample_agent();
        let address = agent.address;
        storage.register(agent).await.unwrap();

        let transitioned = run_fallen_detection(&storage, FALLEN_THRESHOLD_DAYS, Utc::now())
            .await
            .unwrap();
        assert_eq!(transitioned, 1);
        assert_eq!(
            storage.get(&address).await.unwrap().unwrap().status,
            AgentStatus::Fallen
        );
    }

    #[tokio::test]
    async fn fresh_heartbeat_keeps_agent_living() {
        let storage = InMemoryStorage::new();
        let agent = sample_agent();
        let address = agent.address;
        storage.register(agent).await.unwrap();
        storage.record(&address, Utc::now()).await.unwrap();

        let transitioned = run_fallen_detection(&storage, FALLEN_THRESHOLD_DAYS, Utc::now())
            .await
            .unwrap();
        assert_eq!(transitioned, 0);
    }
}
