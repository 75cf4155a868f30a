// Handlers for the catalog, search page, filters and preferences endpoints

use axum::{
    extract::{Json as JsonExtract, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    catalog::ListingSource,
    error::{AppError, AppResult},
    export,
    filters::FilterUpdate,
    models::{FilterCriteria, ViewMode},
    sort_view::{RESULTS_PER_PAGE_OPTIONS, SORT_OPTIONS, SortViewState},
};

// --- Response Wrappers ---

#[derive(Serialize)]
pub(crate) struct GenericResponse {
    success: bool,
    message: Option<String>,
}

impl GenericResponse {
    pub(crate) fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.into()),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FiltersResponse {
    filters: FilterCriteria,
    active_filter_count: usize,
    has_active_filters: bool,
}

#[derive(Serialize)]
struct SortOptionView {
    key: &'static str,
    label: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PreferencesResponse {
    active_sort: String,
    view_mode: ViewMode,
    results_per_page: usize,
    sort_options: Vec<SortOptionView>,
    results_per_page_options: [usize; 3],
}

impl PreferencesResponse {
    fn from_state(sort_view: &SortViewState) -> Self {
        Self {
            active_sort: sort_view.active_sort().to_string(),
            view_mode: sort_view.view_mode(),
            results_per_page: sort_view.results_per_page(),
            sort_options: SORT_OPTIONS
                .iter()
                .map(|o| SortOptionView {
                    key: o.key,
                    label: o.label,
                })
                .collect(),
            results_per_page_options: RESULTS_PER_PAGE_OPTIONS,
        }
    }
}

// --- Request Structs ---

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    query: Option<String>,
    page: Option<usize>,
    page_size: Option<usize>,
}

#[derive(Deserialize)]
pub struct SuggestionsQuery {
    #[serde(default)]
    q: String,
}

#[derive(Deserialize, Debug)]
pub struct SaveSearchRequest {
    name: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PreferencesUpdate {
    active_sort: Option<String>,
    view_mode: Option<ViewMode>,
    results_per_page: Option<usize>,
}

pub(crate) fn csv_response(filename: &str, body: Vec<u8>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
}

// --- Catalog ---

pub async fn get_brands(State(app_state): State<AppState>) -> Json<Vec<String>> {
    tracing::info!("[HANDLER] /api/brands - Request received.");
    Json(app_state.catalog.brands())
}

pub async fn get_models(
    State(app_state): State<AppState>,
    Path(brand): Path<String>,
) -> AppResult<Json<Vec<String>>> {
    tracing::info!("[HANDLER] /api/models/:brand - Request received for brand: {}", brand);
    let models = app_state.catalog.models_for(&brand);
    if models.is_empty() {
        return Err(AppError::NotFound(format!("No listings for brand '{}'", brand)));
    }
    Ok(Json(models))
}

pub async fn get_listing(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    match app_state.catalog.listing(&id) {
        Some(listing) => Ok(Json(listing.clone())),
        None => Err(AppError::NotFound(format!("Listing '{}' not found", id))),
    }
}

// --- Search page ---

pub async fn search(
    State(app_state): State<AppState>,
    JsonExtract(request): JsonExtract<SearchRequest>,
) -> AppResult<impl IntoResponse> {
    tracing::info!("[HANDLER] /api/search - {:?}", request);

    let mut session = app_state.session.lock().await;
    if let Some(size) = request.page_size {
        session.page.set_results_per_page(size)?;
    }
    session.search(request.query.as_deref().unwrap_or(""));
    let page = match request.page {
        Some(page) if page > 1 => session.page.go_to_page(page),
        _ => session.page.snapshot(),
    };
    Ok(Json(page))
}

pub async fn load_more(State(app_state): State<AppState>) -> impl IntoResponse {
    let mut session = app_state.session.lock().await;
    let loaded = session.page.load_more();
    tracing::debug!(loaded, "[HANDLER] /api/search/more");
    Json(session.page.snapshot())
}

pub async fn export_results(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let session = app_state.session.lock().await;
    let body = export::listings_to_csv(session.page.items())?;
    Ok(csv_response("search-results.csv", body))
}

pub async fn get_suggestions(
    State(app_state): State<AppState>,
    Query(query): Query<SuggestionsQuery>,
) -> impl IntoResponse {
    let session = app_state.session.lock().await;
    Json(session.page.suggestions(&query.q))
}

// --- Filters ---

fn filters_response(session: &crate::Session) -> Json<FiltersResponse> {
    let filters = session.page.filters();
    Json(FiltersResponse {
        filters: filters.filters().clone(),
        active_filter_count: filters.active_filter_count(),
        has_active_filters: filters.has_active_filters(),
    })
}

pub async fn get_filters(State(app_state): State<AppState>) -> impl IntoResponse {
    let session = app_state.session.lock().await;
    filters_response(&session)
}

pub async fn set_filters(
    State(app_state): State<AppState>,
    JsonExtract(criteria): JsonExtract<FilterCriteria>,
) -> impl IntoResponse {
    let mut session = app_state.session.lock().await;
    session.set_filters(criteria);
    filters_response(&session)
}

pub async fn update_filters(
    State(app_state): State<AppState>,
    JsonExtract(update): JsonExtract<FilterUpdate>,
) -> impl IntoResponse {
    let mut session = app_state.session.lock().await;
    session.update_filters(update);
    filters_response(&session)
}

pub async fn reset_filters(State(app_state): State<AppState>) -> impl IntoResponse {
    let mut session = app_state.session.lock().await;
    session.reset_filters();
    filters_response(&session)
}

// --- Saved searches ---

pub async fn get_saved_searches(State(app_state): State<AppState>) -> impl IntoResponse {
    let session = app_state.session.lock().await;
    Json(session.page.filters().saved_searches().to_vec())
}

pub async fn save_search(
    State(app_state): State<AppState>,
    JsonExtract(request): JsonExtract<SaveSearchRequest>,
) -> AppResult<impl IntoResponse> {
    if request.name.trim().is_empty() {
        return Err(AppError::BadRequest("Saved search name must not be empty".to_string()));
    }
    let mut session = app_state.session.lock().await;
    let saved = session.save_current_search(&request.name);
    tracing::info!("[HANDLER] /api/saved-searches - Saved '{}' as {}", saved.name, saved.id);
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn delete_saved_search(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let mut session = app_state.session.lock().await;
    if !session.delete_saved_search(&id) {
        return Err(AppError::NotFound(format!("Saved search '{}' not found", id)));
    }
    Ok(GenericResponse::ok("Saved search deleted."))
}

pub async fn load_saved_search(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let mut session = app_state.session.lock().await;
    if session.load_saved_search(&id).is_none() {
        return Err(AppError::NotFound(format!("Saved search '{}' not found", id)));
    }
    Ok(Json(session.page.snapshot()))
}

// --- Recent searches ---

pub async fn get_recent_searches(State(app_state): State<AppState>) -> impl IntoResponse {
    let session = app_state.session.lock().await;
    Json(session.page.recent_searches().to_vec())
}

pub async fn clear_recent_searches(State(app_state): State<AppState>) -> impl IntoResponse {
    let mut session = app_state.session.lock().await;
    session.clear_recent_searches();
    GenericResponse::ok("Recent searches cleared.")
}

pub async fn delete_recent_search(
    State(app_state): State<AppState>,
    Path(query): Path<String>,
) -> AppResult<impl IntoResponse> {
    let mut session = app_state.session.lock().await;
    if !session.remove_recent_search(&query) {
        return Err(AppError::NotFound(format!("'{}' is not a recent search", query)));
    }
    Ok(GenericResponse::ok("Recent search removed."))
}

// --- Sort & view preferences ---

pub async fn get_preferences(State(app_state): State<AppState>) -> impl IntoResponse {
    let session = app_state.session.lock().await;
    Json(PreferencesResponse::from_state(session.page.sort_view()))
}

pub async fn update_preferences(
    State(app_state): State<AppState>,
    JsonExtract(update): JsonExtract<PreferencesUpdate>,
) -> AppResult<impl IntoResponse> {
    let mut session = app_state.session.lock().await;
    if let Some(sort) = update.active_sort.as_deref() {
        session.page.set_sort(sort)?;
    }
    if let Some(mode) = update.view_mode {
        session.page.set_view_mode(mode);
    }
    if let Some(size) = update.results_per_page {
        session.page.set_results_per_page(size)?;
    }
    Ok(Json(PreferencesResponse::from_state(session.page.sort_view())))
}

pub async fn reset_preferences(State(app_state): State<AppState>) -> impl IntoResponse {
    let mut session = app_state.session.lock().await;
    session.page.reset_preferences();
    Json(PreferencesResponse::from_state(session.page.sort_view()))
}
