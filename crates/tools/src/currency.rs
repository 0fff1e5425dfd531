//! Currency conversion at fixed USD-relative rates.

use agentloop_core::error::ToolError;
use agentloop_core::schema::{ObjectSchema, ParamType};
use agentloop_core::tool::FunctionTool;
use serde_json::Value;

pub const NAME: &str = "convert_currency";

/// Units of each currency per US dollar.
const RATES: &[(&str, f64)] = &[("USD", 1.0), ("EUR", 0.92), ("JPY", 153.2), ("GBP", 0.79)];

fn rate(code: &str) -> Option<f64> {
    RATES.iter().find(|(c, _)| *c == code).map(|(_, r)| *r)
}

/// Convert `amount` and describe the result, e.g. `100 USD = 92.00 EUR`.
///
/// An unsupported code yields a message rather than an error.
pub fn convert(amount: f64, from: &str, to: &str) -> String {
    match (rate(from), rate(to)) {
        (Some(from_rate), Some(to_rate)) => {
            let result = amount / from_rate * to_rate;
            format!("{amount} {from} = {result:.2} {to}")
        }
        _ => format!("Currency not supported: {from} or {to}"),
    }
}

pub fn schema() -> ObjectSchema {
    ObjectSchema::builder()
        .param("amount", ParamType::Number, "The amount to convert.")
        .param("from_currency", ParamType::String, "The source currency code.")
        .param("to_currency", ParamType::String, "The target currency code.")
        .build()
}

/// The `convert_currency` tool.
pub fn tool() -> FunctionTool {
    FunctionTool::sync(NAME, "Convert between currencies.", schema(), |args: Value| {
        schema()
            .validate(&args)
            .map_err(|e| ToolError::InvalidArguments(format!("{NAME}: {e}")))?;

        let amount = args["amount"].as_f64().unwrap_or_default();
        let from = args["from_currency"].as_str().unwrap_or_default();
        let to = args["to_currency"].as_str().unwrap_or_default();
        Ok(Value::from(convert(amount, from, to)))
    })
}
