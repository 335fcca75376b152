use tokio::sync::RwLock;

/// The shared mutex that serialises all heavy background scanning work
/// (§4.7): only one heavy job runs at a time, small cleanups bypass it
/// entirely. `try_enter` is non-blocking so a starting job can bail out
/// immediately rather than queue.
pub struct WorkMutex {
    busy: RwLock<Option<&'static str>>,
    stop_requested: RwLock<bool>,
}

impl Default for WorkMutex {
    fn default() -> Self {
        Self {
            busy: RwLock::new(None),
            stop_requested: RwLock::new(false),
        }
    }
}

impl WorkMutex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_busy(&self) -> bool {
        self.busy.read().await.is_some()
    }

    /// Claim the mutex for `job`, or return `false` if another heavy job
    /// already holds it.
    pub async fn try_enter(&self, job: &'static str) -> bool {
        let mut busy = self.busy.write().await;
        if busy.is_some() {
            return false;
        }
        *busy = Some(job);
        *self.stop_requested.write().await = false;
        true
    }

    pub async fn leave(&self) {
        *self.busy.write().await = None;
    }

    pub async fn request_stop(&self) {
        *self.stop_requested.write().await = true;
    }

    pub async fn stop_requested(&self) -> bool {
        *self.stop_requested.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_entrant_is_rejected_while_busy() {
        let mutex = WorkMutex::new();
        assert!(mutex.try_enter("fallen_detection").await);
        assert!(!mutex.try_enter("recompute_trust_scores").await);
        mutex.leave().await;
        assert!(mutex.try_enter("recompute_trust_scores").await);
    }

    #[tokio::test]
    async fn stop_flag_resets_on_each_new_entry() {
        let mutex = WorkMutex::new();
        assert!(mutex.try_enter("fallen_detection").await);
        mutex.request_stop().await;
        assert!(mutex.stop_requested().await);
        mutex.leave().await;

        assert!(mutex.try_enter("fallen_detection").await);
        assert!(!mutex.stop_requested().await);
    }
}
