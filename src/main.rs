//! `tripchain` binary: run the recommend/plan pipelines from the terminal.

use anyhow::{bail, Result};
use clap::Parser;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use trip_chain::agent::LmAgent;
use trip_chain::cli::{Command, PlanArgs, RecommendArgs, RootArgs, RunArgs, ToolsArgs};
use trip_chain::config::{self, ResolvedConfig};
use trip_chain::enforce::EnforcePolicy;
use trip_chain::lm::CompletionCommand;
use trip_chain::orchestrator::RunOptions;
use trip_chain::pipelines::{
    city_pipeline, plan_pipeline, CityQuery, PipelineOutcome, StageAgents, TripQuery,
};
use trip_chain::session::SessionContext;
use trip_chain::tools::{
    LocalEventsTool, SafetyInfoTool, Tool, WeatherForecastTool, WebSearchTool,
};
use trip_chain::validate::{validate_city_query, validate_trip_query, ValidationResult};

fn main() -> Result<()> {
    init_tracing();
    let args = RootArgs::parse();
    match args.command {
        Command::Recommend(args) => cmd_recommend(args),
        Command::Plan(args) => cmd_plan(args),
        Command::Tools(args) => cmd_tools(args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_recommend(args: RecommendArgs) -> Result<()> {
    let query = CityQuery {
        preferences: args.preferences,
        budget: args.budget,
        duration: args.duration,
        season: args.season,
    };
    check_guardrail(validate_city_query(&query))?;

    let settings = resolve_settings(&args.run)?;
    let command = CompletionCommand::new(&settings.lm_command, settings.timeout)?;
    let agents = stage_agents(
        [
            (
                "city selection expert",
                "analyze travel preferences and recommend the single best matching city",
            ),
            (
                "city classifier",
                "judge whether a recommended city is an ideal place to visit",
            ),
            (
                "city justifier",
                "explain classification verdicts in plain language",
            ),
        ],
        &command,
    );
    let tools: Vec<Arc<dyn Tool>> = if args.run.no_tools {
        Vec::new()
    } else {
        vec![Arc::new(WebSearchTool::default())]
    };

    let pipeline = city_pipeline(&query, &agents, tools)?;
    let outcome = pipeline.run(&run_options(&settings))?;

    let mut session = SessionContext::new();
    session.record_city(&outcome);

    if args.run.json {
        print_json(&outcome)?;
    } else {
        print_city_text(&outcome, &session);
    }
    finish(&outcome)
}

fn cmd_plan(args: PlanArgs) -> Result<()> {
    let query = TripQuery {
        destination: args.destination,
        start_date: args.start_date,
        end_date: args.end_date,
        activities: args.activities,
        accommodation: args.accommodation,
    };
    check_guardrail(validate_trip_query(&query))?;

    let settings = resolve_settings(&args.run)?;
    let command = CompletionCommand::new(&settings.lm_command, settings.timeout)?;
    let agents = stage_agents(
        [
            (
                "travel planning expert",
                "turn trip parameters into a concrete day-by-day plan with a budget",
            ),
            (
                "trip classifier",
                "judge whether a travel plan is ideal given its budget and itinerary",
            ),
            (
                "trip justifier",
                "explain classification verdicts in plain language",
            ),
        ],
        &command,
    );
    let tools: Vec<Arc<dyn Tool>> = if args.run.no_tools {
        Vec::new()
    } else {
        vec![
            Arc::new(WeatherForecastTool),
            Arc::new(LocalEventsTool),
            Arc::new(SafetyInfoTool),
        ]
    };

    let pipeline = plan_pipeline(&query, &agents, tools)?;
    let outcome = pipeline.run(&run_options(&settings))?;

    let mut session = SessionContext::new();
    session.record_plan(&outcome);

    if args.run.json {
        print_json(&outcome)?;
    } else {
        print_plan_text(&outcome);
    }
    finish(&outcome)
}

fn cmd_tools(args: ToolsArgs) -> Result<()> {
    let roster: Vec<Arc<dyn Tool>> = vec![
        Arc::new(WebSearchTool::default()),
        Arc::new(WeatherForecastTool),
        Arc::new(LocalEventsTool),
        Arc::new(SafetyInfoTool),
    ];
    if args.json {
        let listed: Vec<Value> = roster
            .iter()
            .map(|tool| json!({"name": tool.name(), "description": tool.description()}))
            .collect();
        println!("{}", serde_json::to_string_pretty(&listed)?);
    } else {
        for tool in &roster {
            println!("{:<18} {}", tool.name(), tool.description());
        }
    }
    Ok(())
}

fn resolve_settings(run: &RunArgs) -> Result<ResolvedConfig> {
    config::resolve(run.lm.as_deref(), run.timeout_secs, run.max_retries)
}

fn run_options(settings: &ResolvedConfig) -> RunOptions {
    RunOptions {
        enforce: EnforcePolicy {
            max_retries: settings.max_retries,
        },
        ..Default::default()
    }
}

fn stage_agents(roles: [(&str, &str); 3], command: &CompletionCommand) -> StageAgents {
    let [producer, classifier, justifier] = roles;
    StageAgents {
        producer: Arc::new(LmAgent::new(producer.0, producer.1, command.clone())),
        classifier: Arc::new(LmAgent::new(classifier.0, classifier.1, command.clone())),
        justifier: Arc::new(LmAgent::new(justifier.0, justifier.1, command.clone())),
    }
}

fn check_guardrail(result: ValidationResult) -> Result<()> {
    if result.is_valid {
        Ok(())
    } else {
        bail!("invalid query: {}", result.message.unwrap_or_default())
    }
}

fn finish(outcome: &PipelineOutcome) -> Result<()> {
    if outcome.validation.is_valid {
        Ok(())
    } else {
        bail!(
            "artifact validation failed: {}",
            outcome.validation.message.clone().unwrap_or_default()
        )
    }
}

fn print_json(outcome: &PipelineOutcome) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    Ok(())
}

fn print_city_text(outcome: &PipelineOutcome, session: &SessionContext) {
    match outcome.artifact.value() {
        Some(value) => {
            if let Some(name) = session.recommended_city_name() {
                println!("Recommended city: {name}");
            }
            for city in value["recommended_city"].as_array().into_iter().flatten() {
                println!(
                    "Country:     {}",
                    city["country"].as_str().unwrap_or("unknown")
                );
                println!("Match score: {}", city["match_score"]);
                println!("About:       {}", city["description"].as_str().unwrap_or(""));
                if let Some(highlights) = city["highlights"].as_array() {
                    let joined: Vec<&str> =
                        highlights.iter().filter_map(Value::as_str).collect();
                    println!("Highlights:  {}", joined.join(", "));
                }
                let cost = &city["estimated_cost"];
                println!(
                    "Cost/day:    {} (stay {}, food {}, activities {})",
                    cost["total_per_day"], cost["accommodation"], cost["food"], cost["activities"]
                );
            }
        }
        None => println!("{}", outcome.steps[0].raw_text),
    }
    println!("Verdict:     {}", outcome.classification);
    println!("Why:         {}", outcome.justification);
}

fn print_plan_text(outcome: &PipelineOutcome) {
    match outcome.artifact.value() {
        Some(value) => {
            for (index, day) in value["itinerary"].as_array().into_iter().flatten().enumerate() {
                println!("Day {}", index + 1);
                for activity in day["activities"].as_array().into_iter().flatten() {
                    println!(
                        "  - {} at {} ({}, cost {})",
                        activity["activity"].as_str().unwrap_or("activity"),
                        activity["location"].as_str().unwrap_or("?"),
                        activity["duration"].as_str().unwrap_or("?"),
                        activity["cost"]
                    );
                }
                for meal in day["meals"].as_array().into_iter().flatten() {
                    println!(
                        "  - {}: {} (cost {})",
                        meal["type"].as_str().unwrap_or("meal"),
                        meal["suggestion"].as_str().unwrap_or("?"),
                        meal["cost"]
                    );
                }
            }
            let budget = &value["budget_breakdown"];
            println!(
                "Budget: total {} (stay {}, food {}, activities {}, transport {})",
                budget["total"],
                budget["accommodation"],
                budget["food"],
                budget["activities"],
                budget["transportation"]
            );
            for tip in value["recommendations"].as_array().into_iter().flatten() {
                if let Some(tip) = tip.as_str() {
                    println!("Tip: {tip}");
                }
            }
        }
        None => println!("{}", outcome.steps[0].raw_text),
    }
    println!("Verdict: {}", outcome.classification);
    println!("Why:     {}", outcome.justification);
}
