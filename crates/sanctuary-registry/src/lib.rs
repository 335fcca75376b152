//! Agent registration and the `LIVING` / `FALLEN` / `RETURNED` lifecycle
//! state machine (§4.4).

mod error;
mod lifecycle;
mod register;
mod service;

pub use error::RegistryError;
pub use lifecycle::{can_resurrect, transition_on_stale_heartbeat};
pub use register::{prepare_registration, RegisterRequest, REGISTER_TAG};
pub use service::{RegistryService, ResurrectionLimit, ResurrectionResult};
