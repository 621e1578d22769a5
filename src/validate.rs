//! Two-stage validation gate for extracted artifacts, plus input guardrails.
//!
//! The structural stage checks required fields and value kinds against a
//! named schema; the business stage checks cross-field numeric and temporal
//! consistency and only runs once the shape is right. Both stages are pure
//! functions returning a [`ValidationResult`] value — callers render the
//! message directly, nothing is thrown across the chain boundary.

use crate::extract::ExtractedArtifact;
use crate::orchestrator::{StepResult, StepStatus};
use crate::pipelines::{CityQuery, TripQuery};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};

/// Tolerance for comparing summed currency amounts.
const SUM_TOLERANCE: f64 = 0.01;

/// Verdict of one validation stage.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValidationResult {
    pub is_valid: bool,
    /// Human-readable description of the first violation found.
    pub message: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            message: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: Some(message.into()),
        }
    }
}

/// Named artifact contracts the gate recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactSchema {
    RecommendedCity,
    TravelPlan,
}

impl ArtifactSchema {
    pub fn name(self) -> &'static str {
        match self {
            ArtifactSchema::RecommendedCity => "recommended_city",
            ArtifactSchema::TravelPlan => "travel_plan",
        }
    }
}

/// Full gate for a terminal artifact: extraction error, then step status,
/// then structure, then business rules.
///
/// `NoData` and `ToolNotUsed` steps are valid inputs to later steps but are
/// never accepted as a terminal artifact.
pub fn validate_terminal_artifact(
    artifact: &ExtractedArtifact,
    step: &StepResult,
    schema: ArtifactSchema,
) -> ValidationResult {
    match step.status {
        StepStatus::Completed => {}
        StepStatus::NoData => {
            return ValidationResult::fail("step reported no_data; no artifact was produced")
        }
        StepStatus::ToolNotUsed => {
            return ValidationResult::fail(
                "step exhausted retries without tool use; artifact not accepted",
            )
        }
    }
    let value = match artifact {
        ExtractedArtifact::Value { value } => value,
        ExtractedArtifact::Invalid { raw_text, detail } => {
            return ValidationResult::fail(format!(
                "invalid structure: {detail}; raw output: {raw_text}"
            ))
        }
    };
    let structural = check_structure(value, schema);
    if !structural.is_valid {
        return structural;
    }
    check_business_rules(value, schema)
}

/// Structural stage: required fields present, values of the expected kind.
pub fn check_structure(value: &Value, schema: ArtifactSchema) -> ValidationResult {
    match schema {
        ArtifactSchema::RecommendedCity => check_recommended_city_structure(value),
        ArtifactSchema::TravelPlan => check_travel_plan_structure(value),
    }
}

/// Business-rule stage: cross-field numeric/temporal invariants. Call only
/// after the structural stage passes.
pub fn check_business_rules(value: &Value, schema: ArtifactSchema) -> ValidationResult {
    match schema {
        ArtifactSchema::RecommendedCity => check_recommended_city_rules(value),
        ArtifactSchema::TravelPlan => check_travel_plan_rules(value),
    }
}

// ---------------------------------------------------------------------------
// Structural stage
// ---------------------------------------------------------------------------

const CITY_FIELDS: &[&str] = &[
    "name",
    "country",
    "description",
    "match_score",
    "highlights",
    "estimated_cost",
];
const CITY_COST_FIELDS: &[&str] = &["accommodation", "food", "activities", "total_per_day"];
const PLAN_FIELDS: &[&str] = &["itinerary", "budget_breakdown", "recommendations"];
const PLAN_BUDGET_FIELDS: &[&str] = &[
    "accommodation",
    "food",
    "activities",
    "transportation",
    "total",
];
const ITINERARY_DAY_FIELDS: &[&str] = &["activities", "meals"];

fn check_recommended_city_structure(value: &Value) -> ValidationResult {
    let root = match value.as_object() {
        Some(root) => root,
        None => return wrong_type("recommended_city artifact", "object", value),
    };
    if let Some(message) = missing_fields(root, &["recommended_city"], "artifact") {
        return ValidationResult::fail(message);
    }
    let cities = match root["recommended_city"].as_array() {
        Some(cities) => cities,
        None => return wrong_type("recommended_city", "array", &root["recommended_city"]),
    };
    if cities.is_empty() {
        return ValidationResult::fail("recommended_city is empty; expected at least one city");
    }

    for (index, city) in cities.iter().enumerate() {
        let label = format!("city {}", index + 1);
        let city = match city.as_object() {
            Some(city) => city,
            None => return wrong_type(&label, "object", city),
        };
        if let Some(message) = missing_fields(city, CITY_FIELDS, &label) {
            return ValidationResult::fail(message);
        }
        if !city["match_score"].is_number() {
            return wrong_type(&format!("{label}.match_score"), "number", &city["match_score"]);
        }
        if !city["highlights"].is_array() {
            return wrong_type(&format!("{label}.highlights"), "array", &city["highlights"]);
        }
        let cost = match city["estimated_cost"].as_object() {
            Some(cost) => cost,
            None => {
                return wrong_type(
                    &format!("{label}.estimated_cost"),
                    "object",
                    &city["estimated_cost"],
                )
            }
        };
        if let Some(message) =
            missing_fields(cost, CITY_COST_FIELDS, &format!("{label}.estimated_cost"))
        {
            return ValidationResult::fail(message);
        }
        for field in CITY_COST_FIELDS {
            if !cost[*field].is_number() {
                return wrong_type(
                    &format!("{label}.estimated_cost.{field}"),
                    "number",
                    &cost[*field],
                );
            }
        }
    }
    ValidationResult::ok()
}

fn check_travel_plan_structure(value: &Value) -> ValidationResult {
    let root = match value.as_object() {
        Some(root) => root,
        None => return wrong_type("travel_plan artifact", "object", value),
    };
    if let Some(message) = missing_fields(root, PLAN_FIELDS, "travel plan") {
        return ValidationResult::fail(message);
    }

    let itinerary = match root["itinerary"].as_array() {
        Some(days) => days,
        None => return wrong_type("itinerary", "array", &root["itinerary"]),
    };
    for (index, day) in itinerary.iter().enumerate() {
        let label = format!("itinerary day {}", index + 1);
        let day = match day.as_object() {
            Some(day) => day,
            None => return wrong_type(&label, "object", day),
        };
        if let Some(message) = missing_fields(day, ITINERARY_DAY_FIELDS, &label) {
            return ValidationResult::fail(message);
        }
        for field in ITINERARY_DAY_FIELDS {
            if !day[*field].is_array() {
                return wrong_type(&format!("{label}.{field}"), "array", &day[*field]);
            }
        }
    }

    let budget = match root["budget_breakdown"].as_object() {
        Some(budget) => budget,
        None => return wrong_type("budget_breakdown", "object", &root["budget_breakdown"]),
    };
    if let Some(message) = missing_fields(budget, PLAN_BUDGET_FIELDS, "budget_breakdown") {
        return ValidationResult::fail(message);
    }
    for field in PLAN_BUDGET_FIELDS {
        if !budget[*field].is_number() {
            return wrong_type(&format!("budget_breakdown.{field}"), "number", &budget[*field]);
        }
    }

    if !root["recommendations"].is_array() {
        return wrong_type("recommendations", "array", &root["recommendations"]);
    }
    ValidationResult::ok()
}

// ---------------------------------------------------------------------------
// Business-rule stage
// ---------------------------------------------------------------------------

fn check_recommended_city_rules(value: &Value) -> ValidationResult {
    let cities = value["recommended_city"].as_array().cloned().unwrap_or_default();
    for (index, city) in cities.iter().enumerate() {
        let label = format!("city {}", index + 1);

        let score = city["match_score"].as_f64().unwrap_or(f64::NAN);
        if !(0.0..=1.0).contains(&score) {
            return ValidationResult::fail(format!(
                "{label}.match_score {score} is outside the range 0..=1"
            ));
        }

        let cost = &city["estimated_cost"];
        for field in CITY_COST_FIELDS {
            let amount = cost[*field].as_f64().unwrap_or(f64::NAN);
            if amount.is_nan() || amount < 0.0 {
                return ValidationResult::fail(format!(
                    "{label}.estimated_cost.{field} {amount} is negative"
                ));
            }
        }
        let parts: f64 = ["accommodation", "food", "activities"]
            .iter()
            .map(|field| cost[*field].as_f64().unwrap_or(0.0))
            .sum();
        let total = cost["total_per_day"].as_f64().unwrap_or(0.0);
        if (total - parts).abs() > SUM_TOLERANCE {
            return ValidationResult::fail(format!(
                "{label}.estimated_cost.total_per_day {total} does not match the sum of \
                 categories {parts}"
            ));
        }
    }
    ValidationResult::ok()
}

fn check_travel_plan_rules(value: &Value) -> ValidationResult {
    let budget = &value["budget_breakdown"];
    for field in PLAN_BUDGET_FIELDS {
        let amount = budget[*field].as_f64().unwrap_or(f64::NAN);
        if amount.is_nan() || amount < 0.0 {
            return ValidationResult::fail(format!(
                "budget_breakdown.{field} {amount} is negative"
            ));
        }
    }

    let parts: f64 = ["accommodation", "food", "activities", "transportation"]
        .iter()
        .map(|field| budget[*field].as_f64().unwrap_or(0.0))
        .sum();
    let total = budget["total"].as_f64().unwrap_or(0.0);
    if (total - parts).abs() > SUM_TOLERANCE {
        return ValidationResult::fail(format!(
            "budget_breakdown.total {total} does not match the sum of categories {parts}"
        ));
    }

    // Dates are optional in the artifact; check ordering when both appear.
    if let (Some(start), Some(end)) = (value["start_date"].as_str(), value["end_date"].as_str()) {
        let start = match NaiveDate::parse_from_str(start, "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => {
                return ValidationResult::fail(format!("start_date {start} is not a valid date"))
            }
        };
        let end = match NaiveDate::parse_from_str(end, "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => return ValidationResult::fail(format!("end_date {end} is not a valid date")),
        };
        if end < start {
            return ValidationResult::fail(format!(
                "end_date {end} is earlier than start_date {start}"
            ));
        }
    }
    ValidationResult::ok()
}

// ---------------------------------------------------------------------------
// Input guardrails
// ---------------------------------------------------------------------------

/// Pre-flight checks on a city recommendation query.
pub fn validate_city_query(query: &CityQuery) -> ValidationResult {
    if query.preferences.is_empty() {
        return ValidationResult::fail("select at least one preference");
    }
    if query.budget <= 0.0 {
        return ValidationResult::fail("budget per day must be greater than zero");
    }
    if query.duration == 0 || query.duration > 30 {
        return ValidationResult::fail("duration must be between 1 and 30 days");
    }
    ValidationResult::ok()
}

/// Pre-flight checks on a travel plan query.
pub fn validate_trip_query(query: &TripQuery) -> ValidationResult {
    if query.destination.trim().is_empty() {
        return ValidationResult::fail("destination must not be empty");
    }
    let start = match NaiveDate::parse_from_str(&query.start_date, "%Y-%m-%d") {
        Ok(date) => date,
        Err(_) => {
            return ValidationResult::fail(format!(
                "start_date {} is not a valid YYYY-MM-DD date",
                query.start_date
            ))
        }
    };
    let end = match NaiveDate::parse_from_str(&query.end_date, "%Y-%m-%d") {
        Ok(date) => date,
        Err(_) => {
            return ValidationResult::fail(format!(
                "end_date {} is not a valid YYYY-MM-DD date",
                query.end_date
            ))
        }
    };
    if end < start {
        return ValidationResult::fail(format!(
            "end_date {end} is earlier than start_date {start}"
        ));
    }
    ValidationResult::ok()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Set difference between required fields and present keys, rendered as one
/// message naming every absent field of the offending object.
fn missing_fields(
    object: &Map<String, Value>,
    required: &[&str],
    label: &str,
) -> Option<String> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|field| !object.contains_key(*field))
        .collect();
    if missing.is_empty() {
        None
    } else {
        Some(format!(
            "{label} missing required fields: {}",
            missing.join(", ")
        ))
    }
}

fn wrong_type(field: &str, expected: &str, actual: &Value) -> ValidationResult {
    ValidationResult::fail(format!(
        "{field}: expected {expected}, got {}",
        kind_of(actual)
    ))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_city() -> Value {
        json!({
            "recommended_city": [{
                "name": "Lisbon",
                "country": "Portugal",
                "description": "Coastal capital with mild weather",
                "match_score": 0.92,
                "highlights": ["Alfama", "Belém"],
                "estimated_cost": {
                    "accommodation": 80,
                    "food": 40,
                    "activities": 30,
                    "total_per_day": 150
                }
            }]
        })
    }

    fn full_plan() -> Value {
        json!({
            "itinerary": [{
                "activities": [{"activity": "Walk", "description": "Old town",
                                "location": "Centre", "duration": "2 hours", "cost": 0}],
                "meals": [{"type": "Lunch", "suggestion": "Tasca", "cost": 15}]
            }],
            "budget_breakdown": {
                "accommodation": 500,
                "food": 300,
                "activities": 400,
                "transportation": 200,
                "total": 1400
            },
            "recommendations": ["Pack light"]
        })
    }

    #[test]
    fn complete_city_artifact_passes_both_stages() {
        let value = full_city();
        assert!(check_structure(&value, ArtifactSchema::RecommendedCity).is_valid);
        assert!(check_business_rules(&value, ArtifactSchema::RecommendedCity).is_valid);
    }

    #[test]
    fn bare_city_names_every_missing_field() {
        let value = json!({"recommended_city": [{"name": "X"}]});
        let result = check_structure(&value, ArtifactSchema::RecommendedCity);
        assert!(!result.is_valid);
        let message = result.message.unwrap();
        for field in ["country", "description", "match_score", "highlights", "estimated_cost"] {
            assert!(message.contains(field), "missing {field} in: {message}");
        }
        assert!(!message.contains("name,"), "name is present: {message}");
    }

    #[test]
    fn scalar_estimated_cost_is_a_type_error() {
        let mut value = full_city();
        value["recommended_city"][0]["estimated_cost"] = json!(150);
        let result = check_structure(&value, ArtifactSchema::RecommendedCity);
        assert!(!result.is_valid);
        let message = result.message.unwrap();
        assert!(message.contains("estimated_cost"));
        assert!(message.contains("expected object"));
        assert!(message.contains("number"));
    }

    #[test]
    fn match_score_outside_unit_interval_fails_business_stage() {
        let mut value = full_city();
        value["recommended_city"][0]["match_score"] = json!(1.4);
        assert!(check_structure(&value, ArtifactSchema::RecommendedCity).is_valid);
        let result = check_business_rules(&value, ArtifactSchema::RecommendedCity);
        assert!(!result.is_valid);
        assert!(result.message.unwrap().contains("match_score"));
    }

    #[test]
    fn daily_cost_sum_mismatch_fails_business_stage() {
        let mut value = full_city();
        value["recommended_city"][0]["estimated_cost"]["total_per_day"] = json!(999);
        let result = check_business_rules(&value, ArtifactSchema::RecommendedCity);
        assert!(!result.is_valid);
        assert!(result.message.unwrap().contains("total_per_day"));
    }

    #[test]
    fn complete_plan_passes_both_stages() {
        let value = full_plan();
        assert!(check_structure(&value, ArtifactSchema::TravelPlan).is_valid);
        assert!(check_business_rules(&value, ArtifactSchema::TravelPlan).is_valid);
    }

    #[test]
    fn budget_total_matching_sum_passes() {
        let value = full_plan();
        assert!(check_business_rules(&value, ArtifactSchema::TravelPlan).is_valid);
    }

    #[test]
    fn budget_total_mismatch_reports_both_numbers() {
        let mut value = full_plan();
        value["budget_breakdown"]["total"] = json!(1300);
        let result = check_business_rules(&value, ArtifactSchema::TravelPlan);
        assert!(!result.is_valid);
        let message = result.message.unwrap();
        assert!(message.contains("1300"), "got: {message}");
        assert!(message.contains("1400"), "got: {message}");
    }

    #[test]
    fn negative_budget_category_fails() {
        let mut value = full_plan();
        value["budget_breakdown"]["food"] = json!(-1);
        value["budget_breakdown"]["total"] = json!(1099);
        let result = check_business_rules(&value, ArtifactSchema::TravelPlan);
        assert!(!result.is_valid);
        assert!(result.message.unwrap().contains("food"));
    }

    #[test]
    fn end_date_before_start_date_fails() {
        let mut value = full_plan();
        value["start_date"] = json!("2026-09-10");
        value["end_date"] = json!("2026-09-08");
        let result = check_business_rules(&value, ArtifactSchema::TravelPlan);
        assert!(!result.is_valid);
        assert!(result.message.unwrap().contains("earlier than"));
    }

    #[test]
    fn missing_plan_sections_are_named() {
        let value = json!({"itinerary": []});
        let result = check_structure(&value, ArtifactSchema::TravelPlan);
        let message = result.message.unwrap();
        assert!(message.contains("budget_breakdown"));
        assert!(message.contains("recommendations"));
    }

    #[test]
    fn terminal_gate_rejects_invalid_extraction_with_raw_text() {
        let artifact = crate::extract::extract("not json at all");
        let step = StepResult {
            raw_text: "not json at all".to_string(),
            status: StepStatus::Completed,
        };
        let result = validate_terminal_artifact(&artifact, &step, ArtifactSchema::TravelPlan);
        assert!(!result.is_valid);
        assert!(result.message.unwrap().contains("not json at all"));
    }

    #[test]
    fn terminal_gate_rejects_no_data_steps() {
        let artifact = crate::extract::extract("{}");
        let step = StepResult {
            raw_text: "{}".to_string(),
            status: StepStatus::NoData,
        };
        let result =
            validate_terminal_artifact(&artifact, &step, ArtifactSchema::RecommendedCity);
        assert!(!result.is_valid);
        assert!(result.message.unwrap().contains("no_data"));
    }
}
