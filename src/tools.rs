//! Lookup tools agents may invoke while executing a step.
//!
//! Tools are opaque to the orchestrator: a name, a description, and a
//! `run(args) -> text` contract. The travel lookups ship deterministic
//! stand-in data keyed off the destination so chains behave reproducibly
//! without network access; web search is the one network-touching tool and
//! degrades to an error string inside its JSON payload rather than failing
//! the step.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::time::Duration;

/// A named, opaque lookup function a capability may invoke during a step.
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// Run the tool with a JSON argument object and return its text output.
    fn run(&self, args: &Value) -> Result<String>;
}

/// Stable small hash for picking stand-in data per destination.
fn seed_for(name: &str) -> usize {
    name.to_lowercase()
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
}

fn arg_str<'a>(args: &'a Value, key: &str) -> &'a str {
    args.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Weather snapshot for a destination and date.
pub struct WeatherForecastTool;

impl Tool for WeatherForecastTool {
    fn name(&self) -> &str {
        "weather_forecast"
    }

    fn description(&self) -> &str {
        "Get the weather forecast for a destination (args: destination, date)"
    }

    fn run(&self, args: &Value) -> Result<String> {
        let destination = arg_str(args, "destination");
        let conditions = ["Sunny", "Partly cloudy", "Overcast", "Light rain", "Clear"];
        let seed = seed_for(destination);
        let forecast = json!({
            "destination": destination,
            "date": arg_str(args, "date"),
            "temperature": 16 + (seed % 15) as i64,
            "condition": conditions[seed % conditions.len()],
            "humidity": 40 + (seed % 45) as i64,
            "wind_speed": 5 + (seed % 20) as i64,
        });
        serde_json::to_string(&forecast).context("serialize weather forecast")
    }
}

/// Upcoming local events for a destination.
pub struct LocalEventsTool;

impl Tool for LocalEventsTool {
    fn name(&self) -> &str {
        "local_events"
    }

    fn description(&self) -> &str {
        "List upcoming local events for a destination (args: destination)"
    }

    fn run(&self, args: &Value) -> Result<String> {
        let destination = arg_str(args, "destination");
        let themes = [
            ("Food Market", "Weekly market with regional produce and street food"),
            ("Open-Air Concert", "Evening concert in the central park"),
            ("Heritage Walk", "Guided walk through the old town"),
            ("Craft Fair", "Local artisans selling handmade goods"),
        ];
        let seed = seed_for(destination);
        let events: Vec<Value> = (0..2)
            .map(|offset| {
                let (name, description) = themes[(seed + offset) % themes.len()];
                json!({
                    "name": name,
                    "date": format!("2026-09-{:02}", 10 + (seed + offset * 3) % 18),
                    "location": format!("{destination} city centre"),
                    "description": description,
                })
            })
            .collect();
        serde_json::to_string(&events).context("serialize local events")
    }
}

/// Traveler safety summary for a destination.
pub struct SafetyInfoTool;

impl Tool for SafetyInfoTool {
    fn name(&self) -> &str {
        "safety_info"
    }

    fn description(&self) -> &str {
        "Summarize traveler safety information for a destination (args: destination)"
    }

    fn run(&self, args: &Value) -> Result<String> {
        let destination = arg_str(args, "destination");
        let crime = ["Low", "Low to moderate", "Moderate"];
        let seed = seed_for(destination);
        let info = json!({
            "destination": destination,
            "general_safety": "Generally safe for tourists; usual precautions apply",
            "health_concerns": "No specific advisories; tap water quality varies",
            "crime_rate": crime[seed % crime.len()],
            "natural_disasters": "No seasonal warnings in effect",
        });
        serde_json::to_string(&info).context("serialize safety info")
    }
}

/// DuckDuckGo HTML search, top result titles as a JSON array.
pub struct WebSearchTool {
    timeout: Duration,
}

impl WebSearchTool {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn search(&self, query: &str) -> Result<Vec<String>> {
        let url = format!("https://duckduckgo.com/html/?q={}", urlencode(query));
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(self.timeout))
            .build()
            .into();
        let mut response = agent
            .get(&url)
            .header("User-Agent", "Mozilla/5.0")
            .call()
            .context("request search results")?;
        let body = response
            .body_mut()
            .read_to_string()
            .context("read search results")?;

        let title_pattern = regex::Regex::new(r#"class="result__a"[^>]*>([^<]+)<"#)
            .expect("result title regex");
        Ok(title_pattern
            .captures_iter(&body)
            .take(5)
            .map(|caps| caps[1].trim().to_string())
            .filter(|title| !title.is_empty())
            .collect())
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "search_internet"
    }

    fn description(&self) -> &str {
        "Search the internet for the given query and return top result titles (args: query)"
    }

    fn run(&self, args: &Value) -> Result<String> {
        let query = arg_str(args, "query");
        let titles = match self.search(query) {
            Ok(titles) => titles,
            // Search failures are content, not step failures.
            Err(err) => vec![format!("Error during search: {err}")],
        };
        serde_json::to_string(&titles).context("serialize search results")
    }
}

fn urlencode(query: &str) -> String {
    let mut encoded = String::with_capacity(query.len());
    for byte in query.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            b' ' => encoded.push('+'),
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}
