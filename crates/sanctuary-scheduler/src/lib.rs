//! The in-process background job scheduler (§4.7): periodic cleanups, the
//! shared heavy-work mutex, exponential back-off, and the single-flight
//! map that serialises concurrent resurrection requests (§5).

mod backoff;
mod job;
mod mutex;
mod scheduler;
mod singleflight;

pub use backoff::Backoff;
pub use job::{default_jobs, JobSpec};
pub use mutex::WorkMutex;
pub use scheduler::{Scheduler, SchedulerConfig};
pub use singleflight::SingleFlight;
