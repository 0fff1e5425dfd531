//! Weather lookup tool: a fixed table of canned conditions.
//!
//! No network access. Unknown locations get a plain "not available" reply
//! rather than an error, so the model can tell the user.

use agentloop_core::schema::{ObjectSchema, ParamType};
use agentloop_core::tool::{FunctionTool, ToolInput};
use serde::Deserialize;

pub const NAME: &str = "get_weather";

const WEATHER: &[(&str, &str)] = &[
    ("San Francisco", "Foggy, 60°F"),
    ("New York", "Partly cloudy, 72°F"),
    ("London", "Rainy, 55°F"),
    ("Tokyo", "Sunny, 80°F"),
];

#[derive(Debug, Deserialize)]
pub struct WeatherInput {
    pub location: String,
}

impl ToolInput for WeatherInput {
    fn input_schema() -> ObjectSchema {
        ObjectSchema::builder()
            .param("location", ParamType::String, "The city or location to get weather for.")
            .build()
    }
}

/// Current conditions for `location` (exact, case-sensitive match).
pub fn lookup(location: &str) -> String {
    WEATHER
        .iter()
        .find(|(city, _)| *city == location)
        .map(|(_, conditions)| conditions.to_string())
        .unwrap_or_else(|| format!("Weather data not available for {location}"))
}

/// The `get_weather` tool.
pub fn tool() -> FunctionTool {
    FunctionTool::typed(NAME, "Get the current weather for a location.", |input: WeatherInput| {
        Ok(lookup(&input.location))
    })
}
