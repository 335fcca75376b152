use std::time::Duration;

/// One background job's declaration: name for logging, how often it runs,
/// and whether it must hold the shared work mutex (§4.7).
#[derive(Clone, Debug)]
pub struct JobSpec {
    pub name: &'static str,
    pub interval: Duration,
    pub heavy: bool,
}

/// The four jobs §4.7 names, with their intervals. The api layer also
/// triggers `recompute_trust_scores` on-demand after every snapshot insert
/// (see `sanctuary-api`'s upload handler); this table only covers the
/// periodic sweep that backstops agents who never upload again.
pub fn default_jobs() -> Vec<JobSpec> {
    vec![
        JobSpec {
            name: "expire_auth_challenges",
            interval: Duration::from_secs(15 * 60),
            heavy: false,
        },
        JobSpec {
            name: "prune_heartbeats",
            interval: Duration::from_secs(60 * 60),
            heavy: false,
        },
        JobSpec {
            name: "recompute_trust_scores",
            interval: Duration::from_secs(60 * 60),
            heavy: true,
        },
        JobSpec {
            name: "fallen_detection",
            interval: Duration::from_secs(6 * 60 * 60),
            heavy: true,
        },
    ]
}
