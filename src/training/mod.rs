//! Agent training orchestration.
//!
//! Runs every agent's training pass against the same profile and event
//! window and collects per-agent outcomes. One agent failing to train never
//! stops the others; an agent that fails keeps whatever trained state it had
//! before.

use crate::agents::{AgentTrainingState, ScoringAgent};
use crate::analytics::UserProfile;
use crate::events::ListeningEvent;
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOutcome {
    pub state: AgentTrainingState,
    /// Present when this run failed; `state` then reflects the previous run.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingReport {
    pub outcomes: BTreeMap<String, TrainingOutcome>,
}

impl TrainingReport {
    pub fn trained_count(&self) -> usize {
        self.outcomes
            .values()
            .filter(|outcome| outcome.state.trained)
            .count()
    }

    pub fn all_failed(&self) -> bool {
        self.outcomes.values().all(|outcome| outcome.error.is_some())
    }
}

#[derive(Default)]
pub struct TrainingOrchestrator;

impl TrainingOrchestrator {
    pub fn new() -> Self {
        Self
    }

    pub fn train_all(
        &self,
        agents: &mut [Box<dyn ScoringAgent>],
        profile: &UserProfile,
        events: &[ListeningEvent],
    ) -> TrainingReport {
        let mut report = TrainingReport::default();
        for agent in agents.iter_mut() {
            let name = agent.name();
            let outcome = match agent.train(profile, events) {
                Ok(state) => {
                    info!(agent = name, version = state.version, "Agent trained");
                    TrainingOutcome { state, error: None }
                }
                Err(error) => {
                    warn!(agent = name, %error, "Agent training failed");
                    TrainingOutcome {
                        state: agent.training_state(),
                        error: Some(error.to_string()),
                    }
                }
            };
            report.outcomes.insert(name.to_string(), outcome);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{NoOpModelRuntime, ExternalModelAgent, StatisticalAgent};
    use std::sync::Arc;

    fn events(count: usize) -> Vec<ListeningEvent> {
        (0..count)
            .map(|i| ListeningEvent {
                id: None,
                song_id: format!("s{i}"),
                artist: "A".to_string(),
                genre: None,
                timestamp_ms: i as i64,
                play_duration_sec: 100,
                total_duration_sec: 100,
                play_count: 1,
                skipped: false,
            })
            .collect()
    }

    #[test]
    fn test_partial_failure_is_reported() {
        let mut agents: Vec<Box<dyn ScoringAgent>> = vec![
            Box::new(StatisticalAgent::new(5)),
            Box::new(ExternalModelAgent::new(Arc::new(NoOpModelRuntime))),
        ];
        let report = TrainingOrchestrator::new().train_all(
            &mut agents,
            &UserProfile::default(),
            &events(10),
        );

        assert_eq!(report.trained_count(), 1);
        assert!(!report.all_failed());
        assert!(report.outcomes["statistical"].error.is_none());
        assert!(report.outcomes["external_model"].error.is_some());
        assert!(agents[0].is_trained());
        assert!(!agents[1].is_trained());
    }

    #[test]
    fn test_insufficient_history_fails_all_local_agents() {
        let mut agents: Vec<Box<dyn ScoringAgent>> =
            vec![Box::new(StatisticalAgent::new(5))];
        let report = TrainingOrchestrator::new().train_all(
            &mut agents,
            &UserProfile::default(),
            &events(2),
        );
        assert_eq!(report.trained_count(), 0);
        assert!(report.all_failed());
        let error = report.outcomes["statistical"].error.as_deref().unwrap();
        assert!(error.contains("distinct songs"));
    }
}
