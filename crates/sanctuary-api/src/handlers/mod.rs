pub mod agent;
pub mod attestation;
pub mod challenge;
pub mod heartbeat;
pub mod snapshot;
