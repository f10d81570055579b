use std::future::Future;

use axum::{
    routing::{get, post},
    Router,
    extract::{Json, Query, State},
    response::IntoResponse,
};
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::models::*;
use crate::api::response;
use crate::cache::Fetched;
use crate::chatbot::{self, DEFAULT_CITY, DEFAULT_CROP};
use crate::error::{AppError, Result};
use crate::farm::soil::DEFAULT_FIELD;
use crate::insight::InsightView;
use crate::tools;
use crate::AppState;

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/weather", get(weather))
        .route("/price", get(price))
        .route("/soil", get(soil))
        .route("/soil/add", post(add_soil))
        .route("/expense/add", get(add_expense))
        .route("/expense/list", get(list_expenses))
        .route("/expense/summary", get(expense_summary))
        .route("/crops", get(list_crops))
        .route("/crops/add", post(add_crop))
        .route("/crops/delete", post(delete_crop))
        .route("/chatbot", post(chat))
        .route("/dashboard", get(dashboard))
        .route("/dashboard/insight", get(dashboard_insight))
        .route("/tools", get(list_tools))
        .route("/tools/call", post(call_tool))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

/// Runs `fut` under the configured overall request timeout.
async fn within<T>(state: &AppState, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(state.config.request_timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!("Request timed out after {:?}", state.config.request_timeout);
            Err(AppError::Timeout("Request processing timed out".to_string()))
        }
    }
}

fn fetched<T: serde::Serialize>(result: Fetched<T>) -> impl IntoResponse {
    match result {
        Fetched::Fresh(data) => response::success(data),
        Fetched::Stale { value, reason } => response::stale(value, reason),
    }
}

fn section<T>(result: Result<Fetched<T>>) -> Section<T> {
    match result {
        Ok(fetched) => {
            let stale = fetched.is_stale();
            Section::Ready {
                data: fetched.into_inner(),
                stale,
            }
        }
        Err(e) => Section::Failed { error: e.to_string() },
    }
}

async fn health() -> impl IntoResponse {
    response::success(Health {
        status: "KisanAI server running",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn weather(
    State(state): State<AppState>,
    Query(q): Query<WeatherQuery>,
) -> Result<impl IntoResponse> {
    info!("Weather requested for {}", q.city);
    let report = within(&state, state.weather_for(&q.city)).await?;
    Ok(fetched(report))
}

async fn price(
    State(state): State<AppState>,
    Query(q): Query<PriceQuery>,
) -> Result<impl IntoResponse> {
    let region = q.state.unwrap_or_else(|| state.config.default_state.clone());
    info!("Price requested for {} in {}", q.crop, region);
    let report = within(&state, state.price_for(&q.crop, &region)).await?;
    Ok(fetched(report))
}

async fn soil(
    State(state): State<AppState>,
    Query(q): Query<SoilQuery>,
) -> Result<impl IntoResponse> {
    let field = q.field.unwrap_or_else(|| DEFAULT_FIELD.to_string());
    Ok(response::success(state.farm.soil.get(&field).await?))
}

async fn add_soil(
    State(state): State<AppState>,
    Json(req): Json<SoilRequest>,
) -> Result<impl IntoResponse> {
    let field = req
        .field
        .ok_or_else(|| AppError::BadRequest("field is required".to_string()))?;
    Ok(response::success(state.farm.soil.add(&field, req.sample).await?))
}

async fn add_expense(
    State(state): State<AppState>,
    Query(q): Query<ExpenseQuery>,
) -> Result<impl IntoResponse> {
    let expense = state
        .farm
        .expenses
        .add(&q.title, q.amount, &q.kind, &q.date)
        .await?;
    Ok(response::success(expense))
}

async fn list_expenses(State(state): State<AppState>) -> impl IntoResponse {
    response::success(state.farm.expenses.list().await)
}

async fn expense_summary(State(state): State<AppState>) -> impl IntoResponse {
    response::success(state.farm.expenses.summary().await)
}

async fn list_crops(State(state): State<AppState>) -> impl IntoResponse {
    response::success(state.farm.crops.list().await)
}

async fn add_crop(
    State(state): State<AppState>,
    Json(req): Json<AddCropRequest>,
) -> Result<impl IntoResponse> {
    let (crop, plot) = match (req.crop, req.plot) {
        (Some(crop), Some(plot)) if !crop.is_empty() && !plot.is_empty() => (crop, plot),
        _ => return Err(AppError::BadRequest("crop and plot are required".to_string())),
    };
    Ok(response::success(state.farm.crops.add(&crop, &plot).await?))
}

async fn delete_crop(
    State(state): State<AppState>,
    Json(req): Json<DeleteCropRequest>,
) -> Result<impl IntoResponse> {
    let index = req
        .index
        .ok_or_else(|| AppError::BadRequest("index is required".to_string()))?;
    Ok(response::success(state.farm.crops.delete(index).await?))
}

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse> {
    info!("Chatbot query: {}", req.question);
    let answer = within(&state, async { Ok(chatbot::answer(&state, &req.question).await) }).await?;
    Ok(response::success(ChatResponse { answer }))
}

async fn dashboard(
    State(state): State<AppState>,
    Query(q): Query<DashboardQuery>,
) -> Result<impl IntoResponse> {
    let city = q.city.unwrap_or_else(|| DEFAULT_CITY.to_string());
    let crop = q.crop.unwrap_or_else(|| DEFAULT_CROP.to_string());

    let body = within(&state, async {
        let (weather, price) = tokio::join!(
            state.weather_for(&city),
            state.price_for(&crop, &state.config.default_state),
        );
        let crops = state.farm.crops.list().await;

        Ok(DashboardResponse {
            weather: section(weather),
            price: section(price),
            crop_count: crops.len(),
            crops,
            financials: state.farm.expenses.summary().await,
        })
    })
    .await?;

    Ok(response::success(body))
}

async fn dashboard_insight(
    State(state): State<AppState>,
    Query(q): Query<DashboardQuery>,
) -> Result<impl IntoResponse> {
    let city = q.city.unwrap_or_else(|| DEFAULT_CITY.to_string());
    let crop = q.crop.unwrap_or_else(|| DEFAULT_CROP.to_string());

    let insight = within(&state, async {
        let weather = match state.weather_for(&city).await {
            Ok(w) => {
                let w = w.into_inner();
                format!("{}C, {}", w.temp, w.weather)
            }
            Err(_) => "Unknown".to_string(),
        };
        let prices = match state.price_for(&crop, &state.config.default_state).await {
            Ok(p) => {
                let p = p.into_inner();
                format!("{}: {}", p.crop, p.modal_price.map(|m| m.to_string()).unwrap_or_else(|| "N/A".to_string()))
            }
            Err(_) => "Unknown".to_string(),
        };
        Ok(state.llm.ask(&chatbot::insight_prompt(&weather, &prices)).await)
    })
    .await?;

    let view = InsightView::from_text(Some(&insight));
    Ok(response::success(InsightResponse { insight, view }))
}

async fn list_tools() -> impl IntoResponse {
    response::success(tools::list_tools())
}

async fn call_tool(
    State(state): State<AppState>,
    Json(req): Json<ToolCallRequest>,
) -> Result<impl IntoResponse> {
    let result = within(&state, tools::call_tool(&state, &req.name, &req.arguments)).await?;
    Ok(response::success(result))
}
