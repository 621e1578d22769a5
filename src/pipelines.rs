//! Built-in recommend/classify/justify pipelines.
//!
//! A pipeline is a validated chain plus the knowledge of which step produces
//! the terminal artifact and against which schema to gate it. Two ship here:
//! city recommendation and travel planning. Both follow the same shape: a
//! tool-granted producer step, a classifier over the producer's raw output,
//! and a justifier over both.
//!
//! Prompt templates live under `prompts/` and are compiled in; the query is
//! spliced into the producer template as serialized JSON before the chain is
//! built, so chain placeholders stay reserved for step outputs.

use crate::agent::Agent;
use crate::chain::{Chain, StepSpec};
use crate::extract::{self, ExtractedArtifact};
use crate::orchestrator::{run_chain, RunOptions, StepResult};
use crate::templates;
use crate::tools::Tool;
use crate::validate::{validate_terminal_artifact, ArtifactSchema, ValidationResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Traveler preferences driving a city recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityQuery {
    pub preferences: Vec<String>,
    /// Budget per day, in the traveler's currency.
    pub budget: f64,
    /// Trip length in days.
    pub duration: u32,
    pub season: String,
}

/// Parameters for a concrete travel plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripQuery {
    pub destination: String,
    /// YYYY-MM-DD.
    pub start_date: String,
    /// YYYY-MM-DD.
    pub end_date: String,
    pub activities: Vec<String>,
    pub accommodation: String,
}

/// The three capabilities a pipeline runs, in step order.
#[derive(Clone)]
pub struct StageAgents {
    pub producer: Arc<dyn Agent>,
    pub classifier: Arc<dyn Agent>,
    pub justifier: Arc<dyn Agent>,
}

/// A runnable chain with its terminal artifact contract.
pub struct Pipeline {
    chain: Chain,
    artifact_step: usize,
    schema: ArtifactSchema,
}

/// Everything one pipeline run produced.
#[derive(Debug, Serialize)]
pub struct PipelineOutcome {
    /// Per-step raw outputs and statuses, in chain order.
    pub steps: Vec<StepResult>,
    /// Artifact extracted from the producer step's raw output.
    pub artifact: ExtractedArtifact,
    /// Classifier verdict, trimmed ("Ideal" / "Not Ideal").
    pub classification: String,
    /// Justifier prose, trimmed.
    pub justification: String,
    /// Gate verdict over the extracted artifact.
    pub validation: ValidationResult,
}

impl Pipeline {
    pub fn schema(&self) -> ArtifactSchema {
        self.schema
    }

    /// Execute the chain and gate the terminal artifact.
    ///
    /// Execution-layer failures (timeout, cancellation, transport) propagate
    /// as errors; a gate rejection is a normal outcome carried in
    /// `validation`.
    pub fn run(&self, options: &RunOptions) -> Result<PipelineOutcome> {
        let steps = run_chain(&self.chain, options)
            .with_context(|| format!("run {} pipeline", self.schema.name()))?;

        let producer = &steps[self.artifact_step];
        let artifact = extract::extract(&producer.raw_text);
        let validation = validate_terminal_artifact(&artifact, producer, self.schema);

        tracing::info!(
            schema = self.schema.name(),
            valid = validation.is_valid,
            "pipeline finished"
        );

        let classification = steps[1].raw_text.trim().to_string();
        let justification = steps[2].raw_text.trim().to_string();
        Ok(PipelineOutcome {
            steps,
            artifact,
            classification,
            justification,
            validation,
        })
    }
}

/// Recommend one city, classify it, justify the classification.
pub fn city_pipeline(
    query: &CityQuery,
    agents: &StageAgents,
    tools: Vec<Arc<dyn Tool>>,
) -> Result<Pipeline> {
    let query_json = serde_json::to_string(query).context("serialize city query")?;
    let recommend = templates::RECOMMEND_CITY_PROMPT_MD.replace("{query}", &query_json);

    let chain = Chain::build(vec![
        StepSpec::new(
            recommend,
            "JSON with a recommended city and its details.",
            agents.producer.clone(),
            tools,
        ),
        StepSpec::new(
            templates::CLASSIFY_CITY_PROMPT_MD,
            "Either 'Ideal' or 'Not Ideal'.",
            agents.classifier.clone(),
            Vec::new(),
        ),
        StepSpec::new(
            templates::JUSTIFY_CITY_PROMPT_MD,
            "Two-line justification.",
            agents.justifier.clone(),
            Vec::new(),
        ),
    ])?;

    Ok(Pipeline {
        chain,
        artifact_step: 0,
        schema: ArtifactSchema::RecommendedCity,
    })
}

/// Plan a trip in detail, classify the plan, justify the classification.
pub fn plan_pipeline(
    query: &TripQuery,
    agents: &StageAgents,
    tools: Vec<Arc<dyn Tool>>,
) -> Result<Pipeline> {
    let query_json = serde_json::to_string(query).context("serialize trip query")?;
    let plan = templates::TRAVEL_PLAN_PROMPT_MD.replace("{query}", &query_json);

    let chain = Chain::build(vec![
        StepSpec::new(
            plan,
            "A detailed travel plan in JSON format, with itinerary, budget, and recommendations.",
            agents.producer.clone(),
            tools,
        ),
        StepSpec::new(
            templates::CLASSIFY_TRIP_PROMPT_MD,
            "Either 'Ideal' or 'Not Ideal'.",
            agents.classifier.clone(),
            Vec::new(),
        ),
        StepSpec::new(
            templates::JUSTIFY_TRIP_PROMPT_MD,
            "Two-sentence justification.",
            agents.justifier.clone(),
            Vec::new(),
        ),
    ])?;

    Ok(Pipeline {
        chain,
        artifact_step: 0,
        schema: ArtifactSchema::TravelPlan,
    })
}
