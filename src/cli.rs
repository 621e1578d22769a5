//! CLI argument parsing for the travel chain pipelines.
//!
//! The CLI is intentionally thin: it resolves configuration, builds the
//! requested pipeline, and renders the outcome, so the same engine can be
//! embedded elsewhere without dragging terminal concerns along.
use clap::{Args, Parser, Subcommand};

/// Root CLI entrypoint for the travel chain pipelines.
#[derive(Parser, Debug)]
#[command(
    name = "tripchain",
    version,
    about = "LM task-chain engine for validated travel artifacts",
    after_help = "Commands:\n  recommend --preferences <P,...> --budget <N> --duration <DAYS> --season <S>\n                                       Recommend one city, classify and justify it\n  plan --destination <CITY> --start-date <DATE> --end-date <DATE>\n                                       Build a day-by-day travel plan\n  tools                                List the lookup tools granted to producer steps\n\nExamples:\n  tripchain recommend --preferences culture,food --budget 150 --duration 5 --season autumn\n  tripchain plan --destination Porto --start-date 2026-09-10 --end-date 2026-09-15 \\\n      --activities 'wine tasting' --accommodation hotel --json\n  TRIPCHAIN_LM_COMMAND='ollama run llama3' tripchain recommend --preferences beaches --budget 80 --duration 7 --season summer",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Recommend(RecommendArgs),
    Plan(PlanArgs),
    Tools(ToolsArgs),
}

/// LM and runtime settings shared by both pipelines.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// LM command reading a prompt on stdin and writing text to stdout
    /// (overrides TRIPCHAIN_LM_COMMAND and the config file)
    #[arg(long, value_name = "CMD")]
    pub lm: Option<String>,

    /// Wall-clock budget per LM invocation, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Attempt budget per tool-granted step
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Run producer steps without lookup tools (disables tool enforcement)
    #[arg(long)]
    pub no_tools: bool,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

/// Recommend command inputs.
#[derive(Parser, Debug)]
#[command(about = "Recommend one city, then classify and justify the pick")]
pub struct RecommendArgs {
    /// Traveler preferences (comma-separated, e.g. culture,food,beaches)
    #[arg(long, value_name = "PREF", value_delimiter = ',', required = true)]
    pub preferences: Vec<String>,

    /// Budget per day
    #[arg(long, value_name = "AMOUNT")]
    pub budget: f64,

    /// Trip length in days
    #[arg(long, value_name = "DAYS")]
    pub duration: u32,

    /// Travel season (e.g. summer, autumn)
    #[arg(long, value_name = "SEASON")]
    pub season: String,

    #[command(flatten)]
    pub run: RunArgs,
}

/// Plan command inputs.
#[derive(Parser, Debug)]
#[command(about = "Build a detailed day-by-day travel plan")]
pub struct PlanArgs {
    /// Destination city
    #[arg(long, value_name = "CITY")]
    pub destination: String,

    /// Trip start date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub start_date: String,

    /// Trip end date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub end_date: String,

    /// Planned activities (comma-separated)
    #[arg(long, value_name = "ACT", value_delimiter = ',')]
    pub activities: Vec<String>,

    /// Accommodation preference (e.g. hotel, hostel, apartment)
    #[arg(long, value_name = "KIND", default_value = "hotel")]
    pub accommodation: String,

    #[command(flatten)]
    pub run: RunArgs,
}

/// Tools command inputs.
#[derive(Parser, Debug)]
#[command(about = "List the lookup tools granted to producer steps")]
pub struct ToolsArgs {
    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}
