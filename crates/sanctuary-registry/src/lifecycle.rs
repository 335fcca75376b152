use sanctuary_types::AgentStatus;

/// Whether `resurrect(agent)` is legal from `status` (§4.4: only `FALLEN`
/// transitions to `RETURNED`).
pub fn can_resurrect(status: AgentStatus) -> bool {
    matches!(status, AgentStatus::Fallen)
}

/// The passive liveness detector's transition (§4.6 "Fallen detection",
/// §9 open question): only `LIVING` ever becomes `FALLEN` here. A
/// `RETURNED` agent with a stale heartbeat is left alone by this pass — the
/// spec preserves this as the contract rather than "fixing" it to also
/// re-fall `RETURNED` agents.
pub fn transition_on_stale_heartbeat(status: AgentStatus) -> AgentStatus {
    match status {
        AgentStatus::Living => AgentStatus::Fallen,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_status() -> impl Strategy<Value = AgentStatus> {
        prop_oneof![
            Just(AgentStatus::Living),
            Just(AgentStatus::Fallen),
            Just(AgentStatus::Returned),
        ]
    }

    proptest! {
        #[test]
        fn only_fallen_can_resurrect(status in any_status()) {
            prop_assert_eq!(can_resurrect(status), status == AgentStatus::Fallen);
        }

        #[test]
        fn stale_heartbeat_never_moves_returned_or_fallen(status in any_status()) {
            let next = transition_on_stale_heartbeat(status);
            match status {
                AgentStatus::Living => prop_assert_eq!(next, AgentStatus::Fallen),
                other => prop_assert_eq!(next, other),
            }
        }
    }
}
