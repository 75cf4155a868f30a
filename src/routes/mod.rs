// Route definitions

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::AppState;

mod api;
mod static_pages;
mod store_api;

// Every handler pulls AppState through the State extractor; the API router is
// nested under /api and the server-rendered page sits at the root.
pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        // Catalog facets & detail
        .route("/brands", get(api::get_brands))
        .route("/models/:brand", get(api::get_models))
        .route("/listings/:id", get(api::get_listing))
        // Search page
        .route("/search", post(api::search))
        .route("/search/more", post(api::load_more))
        .route("/search/export", get(api::export_results))
        .route("/suggestions", get(api::get_suggestions))
        .route(
            "/filters",
            get(api::get_filters)
                .put(api::set_filters)
                .patch(api::update_filters)
                .delete(api::reset_filters),
        )
        .route(
            "/saved-searches",
            get(api::get_saved_searches).post(api::save_search),
        )
        .route("/saved-searches/:id", delete(api::delete_saved_search))
        .route("/saved-searches/:id/load", post(api::load_saved_search))
        .route(
            "/recent-searches",
            get(api::get_recent_searches).delete(api::clear_recent_searches),
        )
        .route("/recent-searches/:query", delete(api::delete_recent_search))
        .route(
            "/preferences",
            get(api::get_preferences).put(api::update_preferences),
        )
        .route("/preferences/reset", post(api::reset_preferences))
        // Store-backed state
        .route("/favorites", get(store_api::get_favorites))
        .route(
            "/favorites/:id",
            put(store_api::add_favorite).delete(store_api::remove_favorite),
        )
        .route(
            "/comparison",
            get(store_api::get_comparison).delete(store_api::clear_comparison),
        )
        .route("/comparison/export", get(store_api::export_comparison))
        .route(
            "/comparison/:id",
            put(store_api::add_to_comparison).delete(store_api::remove_from_comparison),
        )
        .route(
            "/notifications",
            get(store_api::get_notifications)
                .post(store_api::add_notification)
                .delete(store_api::clear_notifications),
        )
        .route("/notifications/read-all", post(store_api::mark_all_notifications_read))
        .route("/notifications/:id", delete(store_api::remove_notification))
        .route("/notifications/:id/read", post(store_api::mark_notification_read))
        .route(
            "/session/user",
            get(store_api::get_session_user)
                .put(store_api::set_session_user)
                .delete(store_api::clear_session_user),
        )
        .route("/theme", put(store_api::set_theme))
        .route("/state", get(store_api::get_state))
        .with_state(app_state.clone());

    Router::new()
        .route("/", get(static_pages::index_page))
        .nest("/api", api_router)
        .with_state(app_state)
}
