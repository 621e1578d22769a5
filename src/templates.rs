pub const RECOMMEND_CITY_PROMPT_MD: &str = include_str!("../prompts/recommend_city.md");
pub const CLASSIFY_CITY_PROMPT_MD: &str = include_str!("../prompts/classify_city.md");
pub const JUSTIFY_CITY_PROMPT_MD: &str = include_str!("../prompts/justify_city.md");
pub const TRAVEL_PLAN_PROMPT_MD: &str = include_str!("../prompts/travel_plan.md");
pub const CLASSIFY_TRIP_PROMPT_MD: &str = include_str!("../prompts/classify_trip.md");
pub const JUSTIFY_TRIP_PROMPT_MD: &str = include_str!("../prompts/justify_trip.md");
