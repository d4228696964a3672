use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::haversine_m;
use crate::models::driver::{Driver, GeoPoint, ServiceType};
use crate::notify;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(register_driver).get(list_drivers))
        .route("/drivers/nearest", get(nearest_driver))
        .route("/drivers/:id/availability", patch(update_availability))
        .route("/drivers/:id/location", patch(update_location))
        .route("/drivers/:id/push-token", patch(update_push_token))
}

#[derive(Deserialize)]
pub struct RegisterDriverRequest {
    pub name: String,
    pub service_type: ServiceType,
    pub location: Option<GeoPoint>,
    pub push_token: Option<String>,
}

async fn register_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterDriverRequest>,
) -> Result<Json<Driver>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    let driver = Driver {
        id: Uuid::new_v4(),
        name: payload.name,
        service_type: payload.service_type,
        is_available: true,
        location: payload.location,
        push_token: payload.push_token,
        last_location_update: None,
        updated_at: Utc::now(),
    };

    state.drivers.insert(driver.id, driver.clone());
    Ok(Json(driver))
}

#[derive(Deserialize)]
pub struct ListDriversQuery {
    pub service_type: Option<ServiceType>,
    pub available: Option<bool>,
}

async fn list_drivers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListDriversQuery>,
) -> Json<Vec<Driver>> {
    let drivers = state
        .drivers
        .iter()
        .filter(|entry| {
            let driver = entry.value();
            query
                .service_type
                .is_none_or(|service_type| driver.service_type == service_type)
                && query
                    .available
                    .is_none_or(|available| driver.is_available == available)
        })
        .map(|entry| entry.value().clone())
        .collect();
    Json(drivers)
}

#[derive(Deserialize)]
pub struct NearestDriverQuery {
    pub lat: f64,
    pub lng: f64,
    pub service_type: ServiceType,
}

#[derive(Serialize)]
pub struct NearestDriverResponse {
    pub driver: Option<Driver>,
    pub distance_m: Option<f64>,
}

async fn nearest_driver(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NearestDriverQuery>,
) -> Json<NearestDriverResponse> {
    let from = GeoPoint {
        lat: query.lat,
        lng: query.lng,
    };

    let nearest = state
        .drivers
        .iter()
        .filter(|entry| {
            let driver = entry.value();
            driver.service_type == query.service_type && driver.is_available
        })
        .filter_map(|entry| {
            let driver = entry.value();
            let location = driver.location?;
            Some((haversine_m(&from, &location), driver.clone()))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0));

    match nearest {
        Some((distance, driver)) => Json(NearestDriverResponse {
            driver: Some(driver),
            distance_m: Some(distance),
        }),
        None => Json(NearestDriverResponse {
            driver: None,
            distance_m: None,
        }),
    }
}

#[derive(Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub is_available: bool,
}

async fn update_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Driver>, AppError> {
    let mut driver = state
        .drivers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("driver {} not found", id)))?;

    driver.is_available = payload.is_available;
    driver.updated_at = Utc::now();

    Ok(Json(driver.clone()))
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Driver>, AppError> {
    let updated = {
        let mut driver = state
            .drivers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("driver {} not found", id)))?;

        let now = Utc::now();
        driver.location = Some(payload.location);
        driver.last_location_update = Some(now);
        driver.updated_at = now;
        driver.clone()
    };

    notify::driver_location_updated(&state, id, payload.location);

    Ok(Json(updated))
}

#[derive(Deserialize)]
pub struct UpdatePushTokenRequest {
    pub push_token: String,
}

async fn update_push_token(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePushTokenRequest>,
) -> Result<Json<Driver>, AppError> {
    if payload.push_token.trim().is_empty() {
        return Err(AppError::BadRequest("push_token cannot be empty".to_string()));
    }

    let mut driver = state
        .drivers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("driver {} not found", id)))?;

    driver.push_token = Some(payload.push_token);
    driver.updated_at = Utc::now();

    Ok(Json(driver.clone()))
}
