//! Question answering: pick an intent, pull the matching farm data and
//! format a short reply.

use tracing::{debug, info};

use crate::farm::{FinanceSummary, SoilReport};
use crate::farm::soil::DEFAULT_FIELD;
use crate::sources::{PriceReport, WeatherReport};
use crate::AppState;

pub const DEFAULT_CITY: &str = "Pune";
pub const DEFAULT_CROP: &str = "Tomato";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Weather,
    Price,
    Soil,
    Finance,
    CropAdvice,
    General,
}

impl Intent {
    /// Reads the one-word label the LLM was asked for.
    pub fn from_reply(reply: &str) -> Self {
        let reply = reply.trim().to_lowercase();
        if reply.contains("weather") {
            Intent::Weather
        } else if reply.contains("price") {
            Intent::Price
        } else if reply.contains("soil") {
            Intent::Soil
        } else if reply.contains("finance") {
            Intent::Finance
        } else if reply.contains("crop_advice") {
            Intent::CropAdvice
        } else {
            Intent::General
        }
    }

    /// Keyword guess used when no LLM is reachable.
    pub fn guess(question: &str) -> Self {
        let q = question.to_lowercase();
        let any = |words: &[&str]| words.iter().any(|w| q.contains(w));

        if any(&["weather", "rain", "temperature", "humid"]) {
            Intent::Weather
        } else if any(&["price", "rate", "mandi", "market"]) {
            Intent::Price
        } else if any(&["soil", "ph ", "nitrogen"]) {
            Intent::Soil
        } else if any(&["profit", "expense", "income", "finance", "money"]) {
            Intent::Finance
        } else if any(&["crop", "plant", "sow", "fertili", "pest"]) {
            Intent::CropAdvice
        } else {
            Intent::General
        }
    }
}

pub async fn detect_intent(state: &AppState, question: &str) -> Intent {
    let prompt = format!(
        "Classify the intent of this question into one word:\n\
         - weather\n- price\n- soil\n- finance\n- crop_advice\n- general\n\n\
         Question: \"{}\"\n\nONLY return one word.",
        question
    );
    match state.llm.ask_strict(&prompt).await {
        Ok(reply) => Intent::from_reply(&reply),
        Err(e) => {
            debug!("Guessing intent locally: {}", e);
            Intent::guess(question)
        }
    }
}

async fn extract(state: &AppState, what: &str, question: &str, default: &str) -> String {
    let prompt = format!(
        "Extract the {} name from: \"{}\"\nIf none found, return \"{}\".\nONLY return the {}.",
        what, question, default, what
    );
    match state.llm.ask_strict(&prompt).await {
        Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
        _ => default.to_string(),
    }
}

pub async fn answer(state: &AppState, question: &str) -> String {
    let intent = detect_intent(state, question).await;
    info!("Chatbot intent {:?} for: {}", intent, question);

    match intent {
        Intent::Weather => {
            let city = extract(state, "city", question, DEFAULT_CITY).await;
            match state.weather_for(&city).await {
                Ok(report) => format_weather(&city, &report.into_inner()),
                Err(e) => e.to_string(),
            }
        }
        Intent::Price => {
            let crop = extract(state, "crop", question, DEFAULT_CROP).await;
            match state.price_for(&crop, &state.config.default_state).await {
                Ok(report) => format_price(&report.into_inner()),
                Err(e) => e.to_string(),
            }
        }
        Intent::Soil => match state.farm.soil.get(DEFAULT_FIELD).await {
            Ok(report) => format_soil(&report),
            Err(e) => e.to_string(),
        },
        Intent::Finance => format_finance(&state.farm.expenses.summary().await),
        Intent::CropAdvice => {
            state
                .llm
                .ask(&format!(
                    "Give practical crop advice for a farmer: {}. Keep it short and in simple language.",
                    question
                ))
                .await
        }
        Intent::General => {
            state
                .llm
                .ask(&format!("You are KisanAI. Explain answer simply for farmers: {}", question))
                .await
        }
    }
}

/// One-sentence tip prompt for the dashboard insight.
pub fn insight_prompt(weather: &str, prices: &str) -> String {
    format!(
        "Generate a 1-sentence farming tip based on this data:\n\
         Weather: {}\nPrices: {}\n\n\
         Keep it practical and actionable for an Indian farmer.",
        weather, prices
    )
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn or_na<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string())
}

pub fn format_weather(city: &str, data: &WeatherReport) -> String {
    format!(
        "🌦 **Weather Update – {}**\nTemperature: **{}°C**\nHumidity: **{}%**\nSky: **{}**\n\n\
         ✅ Good time for outdoor farm work if rain chance is low.",
        city,
        data.temp,
        data.humidity,
        title_case(&data.weather)
    )
}

pub fn format_price(data: &PriceReport) -> String {
    format!(
        "📈 **Market Price for {} – {}**\nMarket: **{}**\nMin: **₹{}**\nMax: **₹{}**\n\n\
         ✅ Compare local mandi rates to get best deal.",
        data.crop,
        data.state,
        or_na(data.market.as_deref()),
        or_na(data.min_price),
        or_na(data.max_price)
    )
}

pub fn format_soil(data: &SoilReport) -> String {
    format!(
        "🧪 **Soil Report**\nSoil Type: **{}**\npH: **{}**\nMoisture: **{}**\nN: **{}**\nP: **{}**\nK: **{}**\n\
         Last Tested: **{}**\n\n✅ Soil looks healthy. Moderate fertilization recommended.",
        data.soil_type, data.ph, data.moisture, data.nitrogen, data.phosphorus, data.potassium, data.last_tested
    )
}

pub fn format_finance(data: &FinanceSummary) -> String {
    format!(
        "💰 **Farm Finance Summary**\nIncome: **₹{}**\nExpenses: **₹{}**\nProfit: **₹{}**\n\n\
         ✅ Track weekly to avoid losses.",
        data.total_income, data.total_expense, data.profit
    )
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
    fn reply_labels_map_to_intents() {
        assert_eq!(Intent::from_reply(" Weather\n"), Intent::Weather);
        assert_eq!(Intent::from_reply("crop_advice"), Intent::CropAdvice);
        assert_eq!(Intent::from_reply("something else"), Intent::General);
    }

    #[test]
    fn keyword_guess_covers_common_questions() {
        assert_eq!(Intent::guess("Will it rain in Nashik?"), Intent::Weather);
        assert_eq!(Intent::guess("onion mandi rate"), Intent::Price);
        assert_eq!(Intent::guess("How much profit did I make?"), Intent::Finance);
        assert_eq!(Intent::guess("Is it good time to plant wheat?"), Intent::CropAdvice);
        assert_eq!(Intent::guess("hello"), Intent::General);
    }

    #[test]
    fn weather_sky_is_title_cased() {
        let text = format_weather("Pune", &WeatherReport {
            city: "Pune".into(),
            temp: 28.0,
            humidity: 60.0,
            weather: "light rain".into(),
        });
        assert!(text.contains("Sky: **Light Rain**"));
        assert!(text.contains("Temperature: **28°C**"));
    }

    #[tokio::test]
    async fn offline_weather_question_uses_local_data() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("weather.json"),
            r#"[{"city":"Pune","temp":26.5,"humidity":70,"weather":"mist"}]"#,
        )
        .unwrap();
        let state = offline_state(dir.path());

        let reply = answer(&state, "What is the weather today?").await;
        assert!(reply.contains("Weather Update – Pune"));
        assert!(reply.contains("26.5°C"));
    }

    #[tokio::test]
    async fn offline_finance_question_reads_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let state = offline_state(dir.path());
        state.farm.expenses.add("Sale", 5000.0, "income", "2025-05-01").await.unwrap();
        state.farm.expenses.add("Seeds", 1000.0, "expense", "2025-05-02").await.unwrap();

        let reply = answer(&state, "What is my profit?").await;
        assert!(reply.contains("Profit: **₹4000**"));
    }

    #[tokio::test]
    async fn missing_soil_data_is_reported_as_answer() {
        let dir = tempfile::tempdir().unwrap();
        let state = offline_state(dir.path());
        assert_eq!(answer(&state, "check my soil").await, "No soil data");
    }
}
