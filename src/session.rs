//! Caller-owned session state across pipeline runs.
//!
//! The engine itself is stateless between runs; anything a caller wants to
//! carry from the city stage into the planning stage (the chosen city, the
//! verdicts shown alongside it) lives here. The CLI uses one of these per
//! invocation; an embedding application would keep one per user session.

use crate::extract::ExtractedArtifact;
use crate::pipelines::PipelineOutcome;
use serde::Serialize;

/// Artifacts and verdicts accumulated across pipeline runs.
#[derive(Debug, Default, Serialize)]
pub struct SessionContext {
    pub recommended_city: Option<ExtractedArtifact>,
    pub city_classification: Option<String>,
    pub city_justification: Option<String>,
    pub travel_plan: Option<ExtractedArtifact>,
    pub plan_classification: Option<String>,
    pub plan_justification: Option<String>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a city pipeline outcome.
    pub fn record_city(&mut self, outcome: &PipelineOutcome) {
        self.recommended_city = Some(outcome.artifact.clone());
        self.city_classification = Some(outcome.classification.clone());
        self.city_justification = Some(outcome.justification.clone());
    }

    /// Record a travel plan pipeline outcome.
    pub fn record_plan(&mut self, outcome: &PipelineOutcome) {
        self.travel_plan = Some(outcome.artifact.clone());
        self.plan_classification = Some(outcome.classification.clone());
        self.plan_justification = Some(outcome.justification.clone());
    }

    /// Name of the first recommended city, when a valid artifact is present.
    pub fn recommended_city_name(&self) -> Option<&str> {
        self.recommended_city
            .as_ref()
            .and_then(ExtractedArtifact::value)
            .and_then(|value| value["recommended_city"][0]["name"].as_str())
    }
}
