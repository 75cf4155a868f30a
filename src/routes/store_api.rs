// Handlers backed by the shared store: favorites, comparison, notifications,
// the auth mirror and theme.

use axum::{
    extract::{Json as JsonExtract, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

use super::api::{GenericResponse, csv_response};
use crate::{
    AppState,
    catalog::ListingSource,
    error::{AppError, AppResult},
    export,
    models::{AuthUser, Listing, NewNotification, Notification, Theme},
    store::MAX_COMPARISON,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ComparisonResponse {
    ids: Vec<String>,
    listings: Vec<Listing>,
    max: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationsResponse {
    notifications: Vec<Notification>,
    unread_count: usize,
}

#[derive(Deserialize, Debug)]
pub struct ThemeRequest {
    theme: Theme,
}

fn require_listing(app_state: &AppState, id: &str) -> AppResult<()> {
    if app_state.catalog.listing(id).is_none() {
        return Err(AppError::NotFound(format!("Listing '{}' not found", id)));
    }
    Ok(())
}

fn comparison_listings(app_state: &AppState, ids: &[String]) -> Vec<Listing> {
    ids.iter()
        .filter_map(|id| app_state.catalog.listing(id).cloned())
        .collect()
}

// --- Favorites ---

pub async fn get_favorites(State(app_state): State<AppState>) -> impl IntoResponse {
    let session = app_state.session.lock().await;
    Json(session.store.with_state(|s| s.favorites.clone()))
}

pub async fn add_favorite(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    require_listing(&app_state, &id)?;
    let session = app_state.session.lock().await;
    session.store.add_to_favorites(&id);
    tracing::info!("[HANDLER] /api/favorites/:id - Added {}", id);
    Ok(Json(session.store.with_state(|s| s.favorites.clone())))
}

pub async fn remove_favorite(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let session = app_state.session.lock().await;
    session.store.remove_from_favorites(&id);
    Json(session.store.with_state(|s| s.favorites.clone()))
}

// --- Comparison ---

fn comparison_response(app_state: &AppState, ids: Vec<String>) -> Json<ComparisonResponse> {
    Json(ComparisonResponse {
        listings: comparison_listings(app_state, &ids),
        ids,
        max: MAX_COMPARISON,
    })
}

pub async fn get_comparison(State(app_state): State<AppState>) -> impl IntoResponse {
    let ids = app_state.session.lock().await.store.with_state(|s| s.comparison.clone());
    comparison_response(&app_state, ids)
}

pub async fn add_to_comparison(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    require_listing(&app_state, &id)?;
    let ids = {
        let session = app_state.session.lock().await;
        session.store.try_add_to_comparison(&id)?;
        session.store.with_state(|s| s.comparison.clone())
    };
    Ok(comparison_response(&app_state, ids))
}

pub async fn remove_from_comparison(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let ids = {
        let session = app_state.session.lock().await;
        session.store.remove_from_comparison(&id);
        session.store.with_state(|s| s.comparison.clone())
    };
    comparison_response(&app_state, ids)
}

pub async fn clear_comparison(State(app_state): State<AppState>) -> impl IntoResponse {
    app_state.session.lock().await.store.clear_comparison();
    GenericResponse::ok("Comparison cleared.")
}

pub async fn export_comparison(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let ids = app_state.session.lock().await.store.with_state(|s| s.comparison.clone());
    let listings = comparison_listings(&app_state, &ids);
    let body = export::listings_to_csv(&listings)?;
    Ok(csv_response("comparison.csv", body))
}

// --- Notifications ---

fn notifications_response(session: &crate::Session) -> Json<NotificationsResponse> {
    session.store.with_state(|s| {
        Json(NotificationsResponse {
            notifications: s.notifications.clone(),
            unread_count: s.unread_count,
        })
    })
}

pub async fn get_notifications(State(app_state): State<AppState>) -> impl IntoResponse {
    let session = app_state.session.lock().await;
    notifications_response(&session)
}

pub async fn add_notification(
    State(app_state): State<AppState>,
    JsonExtract(new): JsonExtract<NewNotification>,
) -> AppResult<impl IntoResponse> {
    if new.title.trim().is_empty() {
        return Err(AppError::BadRequest("Notification title must not be empty".to_string()));
    }
    let session = app_state.session.lock().await;
    let notification = session.store.add_notification(new);
    Ok((StatusCode::CREATED, Json(notification)))
}

pub async fn mark_notification_read(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let session = app_state.session.lock().await;
    session.store.mark_notification_read(&id)?;
    Ok(notifications_response(&session))
}

pub async fn mark_all_notifications_read(State(app_state): State<AppState>) -> impl IntoResponse {
    let session = app_state.session.lock().await;
    session.store.mark_all_notifications_read();
    notifications_response(&session)
}

pub async fn remove_notification(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let session = app_state.session.lock().await;
    session.store.remove_notification(&id)?;
    Ok(notifications_response(&session))
}

pub async fn clear_notifications(State(app_state): State<AppState>) -> impl IntoResponse {
    let session = app_state.session.lock().await;
    session.store.clear_notifications();
    notifications_response(&session)
}

// --- Auth mirror, theme, snapshot ---

pub async fn get_session_user(State(app_state): State<AppState>) -> impl IntoResponse {
    let session = app_state.session.lock().await;
    Json(session.store.with_state(|s| s.user.clone()))
}

pub async fn set_session_user(
    State(app_state): State<AppState>,
    JsonExtract(user): JsonExtract<AuthUser>,
) -> AppResult<impl IntoResponse> {
    if user.id.trim().is_empty() || !user.email.contains('@') {
        return Err(AppError::BadRequest("User needs an id and a valid email".to_string()));
    }
    let session = app_state.session.lock().await;
    tracing::info!("[HANDLER] /api/session/user - Signed in {}", user.id);
    session.store.set_user(Some(user.clone()));
    Ok(Json(user))
}

pub async fn clear_session_user(State(app_state): State<AppState>) -> impl IntoResponse {
    app_state.session.lock().await.store.set_user(None);
    GenericResponse::ok("Signed out.")
}

pub async fn set_theme(
    State(app_state): State<AppState>,
    JsonExtract(request): JsonExtract<ThemeRequest>,
) -> impl IntoResponse {
    app_state.session.lock().await.store.set_theme(request.theme);
    GenericResponse::ok(format!("Theme set to {:?}.", request.theme))
}

pub async fn get_state(State(app_state): State<AppState>) -> impl IntoResponse {
    Json(app_state.session.lock().await.store.state())
}
