use crate::config::ServerConfig;
use crate::data::{FilterOptions, OrderFilter, OrderStore};
use crate::types::OrderRecord;
use crate::view::{build_view, GridSettings, MapMode, MapView};
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

pub struct AppState {
    pub store: OrderStore,
    pub grid: GridSettings,
}

/// Filter controls as query parameters. List filters accept repeated
/// keys, comma separated values, or both; scalar keys keep the last value.
#[derive(Debug, Default)]
pub struct FilterParams {
    type_user: Vec<String>,
    category_name: Vec<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    min_price: Option<String>,
    max_price: Option<String>,
    type_of_payment: Vec<String>,
    mode: Option<String>,
}

impl FilterParams {
    fn from_query(query: Result<Query<Vec<(String, String)>>, QueryRejection>) -> Result<Self, ApiError> {
        let Query(pairs) = query.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

        let mut params = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "type_user" => params.type_user.push(value),
                "category_name" => params.category_name.push(value),
                "type_of_payment" => params.type_of_payment.push(value),
                "start_date" => params.start_date = Some(value),
                "end_date" => params.end_date = Some(value),
                "min_price" => params.min_price = Some(value),
                "max_price" => params.max_price = Some(value),
                "mode" => params.mode = Some(value),
                _ => {} // cache busters and the like
            }
        }
        Ok(params)
    }

    fn to_filter(&self) -> Result<OrderFilter, ApiError> {
        Ok(OrderFilter {
            user_types: parse_list(&self.type_user)?,
            categories: parse_list(&self.category_name)?,
            start_date: parse_date(self.start_date.as_deref())?,
            end_date: parse_date(self.end_date.as_deref())?,
            min_price: parse_price(self.min_price.as_deref())?,
            max_price: parse_price(self.max_price.as_deref())?,
            payment_types: parse_list(&self.type_of_payment)?,
        })
    }

    fn mode(&self) -> Result<MapMode, ApiError> {
        match self.mode.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(MapMode::default()),
            Some(s) => s.parse().map_err(ApiError::bad_request),
        }
    }
}

fn parse_list<T>(raw: &[String]) -> Result<Vec<T>, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(|e: T::Err| ApiError::bad_request(e.to_string())))
        .collect()
}

fn parse_price(raw: Option<&str>) -> Result<Option<u64>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|e| ApiError::bad_request(format!("invalid price '{}': {}", s, e))),
    }
}

fn parse_date(raw: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| ApiError::bad_request(format!("invalid date '{}': {}", s, e))),
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

#[derive(Serialize)]
pub struct OrdersResponse {
    count: usize,
    orders: Vec<OrderRecord>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/options", get(options_handler))
        .route("/api/orders", get(orders_handler))
        .route("/api/map", get(map_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: ServerConfig, store: OrderStore) -> Result<()> {
    let state = Arc::new(AppState {
        store,
        grid: GridSettings {
            heatmap_cell_deg: config.heatmap_cell_deg,
            cluster_cell_deg: config.cluster_cell_deg,
        },
    });

    let mut app = router(state);
    if let Some(dir) = &config.static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn options_handler(State(state): State<Arc<AppState>>) -> Json<FilterOptions> {
    Json(state.store.options())
}

async fn orders_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<OrdersResponse>, ApiError> {
    let filter = FilterParams::from_query(query)?.to_filter()?;
    let orders: Vec<OrderRecord> = state.store.filter(&filter).into_iter().cloned().collect();
    Ok(Json(OrdersResponse { count: orders.len(), orders }))
}

async fn map_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<MapView>, ApiError> {
    let params = FilterParams::from_query(query)?;
    let (mode, filter) = (params.mode()?, params.to_filter()?);
    let orders = state.store.filter(&filter);
    Ok(Json(build_view(mode, &orders, state.grid)))
}
