//! Tool catalogue for agent clients. Each tool has a name, a description and
//! a JSON schema for its arguments, and runs against the same [`AppState`]
//! the HTTP handlers use.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::cache::Fetched;
use crate::chatbot::{self, DEFAULT_CITY};
use crate::error::{AppError, Result};
use crate::farm::soil::DEFAULT_FIELD;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    GetWeather,
    GetMarketPrice,
    GetSoilReport,
    AddExpense,
    GetExpenses,
    GetFinancialSummary,
    GetCrops,
    AddCrop,
    DeleteCrop,
    AskFarmingQuestion,
}

/// What `GET /tools` lists for each tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl Tool {
    pub const ALL: [Tool; 10] = [
        Tool::GetWeather,
        Tool::GetMarketPrice,
        Tool::GetSoilReport,
        Tool::AddExpense,
        Tool::GetExpenses,
        Tool::GetFinancialSummary,
        Tool::GetCrops,
        Tool::AddCrop,
        Tool::DeleteCrop,
        Tool::AskFarmingQuestion,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Tool::GetWeather => "get_weather",
            Tool::GetMarketPrice => "get_market_price",
            Tool::GetSoilReport => "get_soil_report",
            Tool::AddExpense => "add_expense",
            Tool::GetExpenses => "get_expenses",
            Tool::GetFinancialSummary => "get_financial_summary",
            Tool::GetCrops => "get_crops",
            Tool::AddCrop => "add_crop",
            Tool::DeleteCrop => "delete_crop",
            Tool::AskFarmingQuestion => "ask_farming_question",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Tool::GetWeather => "Get current weather for a city: temperature, humidity and conditions.",
            Tool::GetMarketPrice => "Get the mandi price of a crop in a state, with a short price history.",
            Tool::GetSoilReport => "Get the soil report (pH, NPK, moisture) for a field.",
            Tool::AddExpense => "Record a farming expense or income transaction.",
            Tool::GetExpenses => "List all farming expense and income transactions.",
            Tool::GetFinancialSummary => "Total income, total expense and profit or loss.",
            Tool::GetCrops => "List the crops being grown with their plots.",
            Tool::AddCrop => "Start tracking a crop on a plot.",
            Tool::DeleteCrop => "Stop tracking the crop at a position in the crop list.",
            Tool::AskFarmingQuestion => "Ask the farming assistant a free-form question.",
        }
    }

    pub fn input_schema(self) -> Value {
        match self {
            Tool::GetWeather => json!({
                "type": "object",
                "properties": {
                    "city": { "type": "string", "description": "City name (default Pune)" }
                },
                "required": []
            }),
            Tool::GetMarketPrice => json!({
                "type": "object",
                "properties": {
                    "crop": { "type": "string", "description": "Crop name, e.g. Tomato, Onion, Wheat" },
                    "state": { "type": "string", "description": "Indian state (default from config)" }
                },
                "required": ["crop"]
            }),
            Tool::GetSoilReport => json!({
                "type": "object",
                "properties": {
                    "field": { "type": "string", "description": "Field identifier (default \"default\")" }
                },
                "required": []
            }),
            Tool::AddExpense => json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string", "description": "What the money was for" },
                    "amount": { "type": "number", "description": "Amount in rupees" },
                    "type": { "type": "string", "enum": ["expense", "income"] },
                    "date": { "type": "string", "description": "Date in YYYY-MM-DD format" }
                },
                "required": ["title", "amount", "type", "date"]
            }),
            Tool::GetExpenses | Tool::GetFinancialSummary | Tool::GetCrops => json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
            Tool::AddCrop => json!({
                "type": "object",
                "properties": {
                    "crop": { "type": "string", "description": "Crop name" },
                    "plot": { "type": "string", "description": "Plot or field identifier" }
                },
                "required": ["crop", "plot"]
            }),
            Tool::DeleteCrop => json!({
                "type": "object",
                "properties": {
                    "index": { "type": "integer", "description": "Position in the crop list, oldest first" }
                },
                "required": ["index"]
            }),
            Tool::AskFarmingQuestion => json!({
                "type": "object",
                "properties": {
                    "question": { "type": "string", "description": "The farming question" }
                },
                "required": ["question"]
            }),
        }
    }

    pub fn spec(self) -> ToolSpec {
        ToolSpec {
            name: self.name(),
            description: self.description(),
            input_schema: self.input_schema(),
        }
    }

    pub async fn call(self, state: &AppState, args: &Value) -> Result<Value> {
        match self {
            Tool::GetWeather => {
                let city = text(args, "city").unwrap_or(DEFAULT_CITY);
                fetched(state.weather_for(city).await?)
            }
            Tool::GetMarketPrice => {
                let crop = required(args, "crop")?;
                let region = text(args, "state").unwrap_or(&state.config.default_state);
                fetched(state.price_for(crop, region).await?)
            }
            Tool::GetSoilReport => {
                let field = text(args, "field").unwrap_or(DEFAULT_FIELD);
                to_json(state.farm.soil.get(field).await?)
            }
            Tool::AddExpense => {
                let amount = args
                    .get("amount")
                    .and_then(Value::as_f64)
                    .ok_or_else(|| AppError::BadRequest("amount must be a number".to_string()))?;
                let expense = state
                    .farm
                    .expenses
                    .add(
                        required(args, "title")?,
                        amount,
                        required(args, "type")?,
                        required(args, "date")?,
                    )
                    .await?;
                to_json(expense)
            }
            Tool::GetExpenses => to_json(state.farm.expenses.list().await),
            Tool::GetFinancialSummary => to_json(state.farm.expenses.summary().await),
            Tool::GetCrops => to_json(state.farm.crops.list().await),
            Tool::AddCrop => {
                let crop = required(args, "crop")?;
                let plot = required(args, "plot")?;
                to_json(state.farm.crops.add(crop, plot).await?)
            }
            Tool::DeleteCrop => {
                let index = args
                    .get("index")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| AppError::BadRequest("index is required".to_string()))?;
                to_json(state.farm.crops.delete(index).await?)
            }
            Tool::AskFarmingQuestion => {
                let question = required(args, "question")?;
                Ok(json!({ "answer": chatbot::answer(state, question).await }))
            }
        }
    }
}

pub fn list_tools() -> Vec<ToolSpec> {
    Tool::ALL.into_iter().map(Tool::spec).collect()
}

/// Runs the tool called `name`. Unknown names are `NotFound`.
pub async fn call_tool(state: &AppState, name: &str, args: &Value) -> Result<Value> {
    let tool = Tool::from_name(name)
        .ok_or_else(|| AppError::NotFound(format!("Unknown tool: {}", name)))?;
    info!("Tool call {}", name);
    tool.call(state, args).await
}

fn text<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn required<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    text(args, key).ok_or_else(|| AppError::BadRequest(format!("{} is required", key)))
}

fn to_json<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Last-known-good answers carry `"stale": true` and the failure reason.
fn fetched<T: Serialize>(result: Fetched<T>) -> Result<Value> {
    match result {
        Fetched::Fresh(value) => to_json(value),
        Fetched::Stale { value, reason } => {
            let mut json = to_json(value)?;
            if let Value::Object(map) = &mut json {
                map.insert("stale".to_string(), Value::Bool(true));
                map.insert("stale_reason".to_string(), Value::String(reason));
            }
            Ok(json)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResponseCache;
    use crate::config::Config;

    fn offline_state(dir: &std::path::Path) -> AppState {
        AppState::new(Config::for_data_dir(dir), ResponseCache::in_memory())
    }

    #[test]
    fn every_tool_is_listed_once_by_name() {
        let tools = list_tools();
        assert_eq!(tools.len(), Tool::ALL.len());
        for tool in Tool::ALL {
            assert_eq!(Tool::from_name(tool.name()), Some(tool));
        }
        assert!(Tool::from_name("get_weathr").is_none());
    }

    #[test]
    fn schemas_list_required_arguments() {
        let spec = serde_json::to_value(Tool::AddExpense.spec()).unwrap();
        assert_eq!(spec["name"], "add_expense");
        assert_eq!(spec["inputSchema"]["required"], json!(["title", "amount", "type", "date"]));
        assert_eq!(Tool::GetCrops.input_schema()["required"], json!([]));
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = offline_state(dir.path());
        let result = call_tool(&state, "plant_seeds", &json!({})).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn crop_tools_share_the_crop_book() {
        let dir = tempfile::tempdir().unwrap();
        let state = offline_state(dir.path());

        let added = call_tool(&state, "add_crop", &json!({"crop": "Wheat", "plot": "Field A"}))
            .await
            .unwrap();
        assert_eq!(added["crop"], "Wheat");
        assert_eq!(state.farm.crops.list().await.len(), 1);

        let listed = call_tool(&state, "get_crops", &json!({})).await.unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);

        call_tool(&state, "delete_crop", &json!({"index": 0})).await.unwrap();
        assert!(state.farm.crops.list().await.is_empty());
    }

    #[tokio::test]
    async fn missing_arguments_are_bad_requests() {
        let dir = tempfile::tempdir().unwrap();
        let state = offline_state(dir.path());

        let no_plot = call_tool(&state, "add_crop", &json!({"crop": "Wheat"})).await;
        assert!(matches!(no_plot, Err(AppError::BadRequest(_))));

        let bad_amount = call_tool(
            &state,
            "add_expense",
            &json!({"title": "Seeds", "amount": "lots", "type": "expense", "date": "2024-06-01"}),
        )
        .await;
        assert!(matches!(bad_amount, Err(AppError::BadRequest(_))));
        assert!(state.farm.expenses.list().await.is_empty());
    }

    #[tokio::test]
    async fn expense_tools_feed_the_summary() {
        let dir = tempfile::tempdir().unwrap();
        let state = offline_state(dir.path());

        call_tool(
            &state,
            "add_expense",
            &json!({"title": "Harvest sale", "amount": 5000.0, "type": "income", "date": "2024-06-01"}),
        )
        .await
        .unwrap();
        call_tool(
            &state,
            "add_expense",
            &json!({"title": "Urea", "amount": 1200.0, "type": "expense", "date": "2024-06-02"}),
        )
        .await
        .unwrap();

        let summary = call_tool(&state, "get_financial_summary", &json!({})).await.unwrap();
        let expected = serde_json::to_value(state.farm.expenses.summary().await).unwrap();
        assert_eq!(summary, expected);
        let listed = call_tool(&state, "get_expenses", &json!({})).await.unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn weather_tool_marks_last_known_answers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weather.json");
        std::fs::write(&path, r#"[{"city":"Pune","temp":27.0,"humidity":55,"weather":"haze"}]"#).unwrap();
        let state = offline_state(dir.path());

        let fresh = call_tool(&state, "get_weather", &json!({})).await.unwrap();
        assert_eq!(fresh["city"], "Pune");
        assert!(fresh.get("stale").is_none());

        std::fs::remove_file(&path).unwrap();
        let stale = call_tool(&state, "get_weather", &json!({"city": "Mumbai"})).await.unwrap();
        assert_eq!(stale["city"], "Pune");
        assert_eq!(stale["stale"], true);
        assert!(stale["stale_reason"].is_string());
    }

    #[tokio::test]
    async fn question_tool_answers_offline() {
        let dir = tempfile::tempdir().unwrap();
        let state = offline_state(dir.path());

        let reply = call_tool(&state, "ask_farming_question", &json!({"question": "How do I improve yield?"}))
            .await
            .unwrap();
        assert!(!reply["answer"].as_str().unwrap().is_empty());
    }
}
