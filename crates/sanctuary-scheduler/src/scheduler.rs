use chrono::Utc;
use sanctuary_storage::{AgentRepository, ChallengeRepository, HeartbeatRepository, SharedStorage};
use sanctuary_types::AttestationLedger;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::RwLock;
use tokio::time::interval;

use crate::job::{default_jobs, JobSpec};
use crate::mutex::WorkMutex;

/// Scheduler configuration: which jobs run and at what intervals, plus the
/// two knobs the jobs themselves need (§4.7).
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub jobs: Vec<JobSpec>,
    pub heartbeat_keep_days: i64,
    pub fallen_threshold_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            heartbeat_keep_days: 90,
            fallen_threshold_days: sanctuary_trust::FALLEN_THRESHOLD_DAYS,
        }
    }
}

/// The in-process scheduler (§4.7): one `tokio::spawn`'d loop per job,
/// small cleanups running unguarded, heavy scans serialised through a
/// shared [`WorkMutex`].
pub struct Scheduler<L> {
    config: SchedulerConfig,
    storage: SharedStorage,
    trust: Arc<sanctuary_trust::TrustService<SharedStorage, L>>,
    work_mutex: Arc<WorkMutex>,
    running: Arc<RwLock<bool>>,
}

impl<L> Scheduler<L>
where
    L: AttestationLedger + 'static,
{
    pub fn new(
        config: SchedulerConfig,
        storage: SharedStorage,
        trust: Arc<sanctuary_trust::TrustService<SharedStorage, L>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            storage,
            trust,
            work_mutex: Arc::new(WorkMutex::new()),
            running: Arc::new(RwLock::new(true)),
        })
    }

    pub fn work_mutex(&self) -> Arc<WorkMutex> {
        self.work_mutex.clone()
    }

    /// Spawn every configured job's loop. Returns immediately; jobs stop
    /// when [`Scheduler::stop`] is called.
    pub fn start(self: &Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        self.config
            .jobs
            .iter()
            .cloned()
            .map(|job| {
                let scheduler = self.clone();
                tokio::spawn(async move { scheduler.run_job_loop(job).await })
            })
            .collect()
    }

    pub async fn stop(&self) {
        *self.running.write().await = false;
        self.work_mutex.request_stop().await;
    }

    async fn running(&self) -> bool {
        *self.running.read().await
    }

    async fn run_job_loop(&self, job: JobSpec) {
        let mut ticker = interval(job.interval);
        ticker.tick().await; // first tick fires immediately; skip it

        loop {
            ticker.tick().await;
            if !self.running().await {
                break;
            }

            if job.heavy && !self.work_mutex.try_enter(job.name).await {
                tracing::debug!(job = job.name, "heavy job skipped, mutex busy");
                continue;
            }

            let outcome = self.run_once(job.name).await;

            if job.heavy {
                self.work_mutex.leave().await;
            }

            match outcome {
                Ok(count) => tracing::info!(job = job.name, count, "job completed"),
                Err(err) => tracing::error!(job = job.name, error = %err, "job failed"),
            }
        }
    }

    async fn run_once(&self, job_name: &str) -> Result<u64, sanctuary_storage::StorageError> {
        let now = Utc::now();
        match job_name {
            "expire_auth_challenges" => self.storage.expire_older_than(now).await,
            "prune_heartbeats" => {
                self.storage
                    .prune_keeping_latest(self.config.heartbeat_keep_days, now)
                    .await
            }
            "recompute_trust_scores" => self.recompute_all(now).await,
            "fallen_detection" => self.run_fallen_detection(now).await,
            other => {
                tracing::warn!(job = other, "unknown job name, skipping");
                Ok(0)
            }
        }
    }

    /// Refreshes every agent still able to accrue trust signals: `LIVING`
    /// and `RETURNED` (§4.6). `FALLEN` agents are frozen until resurrected.
    async fn recompute_all(
        &self,
        now: chrono::DateTime<Utc>,
    ) -> Result<u64, sanctuary_storage::StorageError> {
        let agents = self.storage.list_trust_recomputable().await?;
        let mut updated = 0u64;
        for address in &agents {
            if self.work_mutex.stop_requested().await {
                break;
            }
            match self.trust.recompute_score(address, now).await {
                Ok(_) => updated += 1,
                Err(err) => tracing::warn!(agent = %address.to_hex(), error = %err, "trust recompute failed"),
            }
        }
        Ok(updated)
    }

    async fn run_fallen_detection(
        &self,
        now: chrono::DateTime<Utc>,
    ) -> Result<u64, sanctuary_storage::StorageError> {
        sanctuary_trust::run_fallen_detection(&self.storage, self.config.fallen_threshold_days, now)
            .await
            .map_err(|e| match e {
                sanctuary_trust::TrustError::Storage(inner) => inner,
                other => sanctuary_storage::StorageError::Backend(other.to_string()),
            })
    }
}
