use askama::Template;
use axum::{
    extract::State,
    response::{Html, IntoResponse},
};

use crate::{AppState, error::AppError, models::Listing, sort_view::SORT_OPTIONS, store::MarketState};

struct CardView {
    id: String,
    title: String,
    price: String,
    details: String,
    location: String,
    image: String,
    is_favorite: bool,
    in_comparison: bool,
}

impl CardView {
    fn new(listing: &Listing, state: &MarketState) -> Self {
        let mileage = listing
            .mileage
            .map(|km| format!("{} km", km))
            .unwrap_or_else(|| "mileage n/a".to_string());
        Self {
            id: listing.id.clone(),
            title: listing.title.clone(),
            price: format!("{} {}", listing.price, listing.currency.as_str()),
            details: format!(
                "{} · {} · {} · {}",
                listing.year,
                mileage,
                listing.fuel_type.as_str(),
                listing.transmission.as_str()
            ),
            location: listing.location.clone(),
            image: listing
                .primary_image()
                .map(|i| i.url.clone())
                .unwrap_or_default(),
            is_favorite: state.is_favorite(&listing.id),
            in_comparison: state.is_in_comparison(&listing.id),
        }
    }
}

struct SortChoice {
    key: &'static str,
    label: &'static str,
    selected: bool,
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    theme: String,
    view_mode: String,
    query: String,
    total: usize,
    has_more: bool,
    active_filter_count: usize,
    unread_count: usize,
    favorites_count: usize,
    comparison_count: usize,
    user_name: Option<String>,
    brands: Vec<String>,
    sort_choices: Vec<SortChoice>,
    recent_searches: Vec<String>,
    cards: Vec<CardView>,
}

// First paint of the results page, rendered from the hydrated session so the
// markup matches what the API reports afterwards.
pub async fn index_page(State(app_state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let template = {
        let session = app_state.session.lock().await;
        let page = session.page.snapshot();
        let state = session.store.state();
        IndexTemplate {
            theme: format!("{:?}", state.theme).to_lowercase(),
            view_mode: format!("{:?}", page.view_mode).to_lowercase(),
            query: page.query.clone(),
            total: page.total,
            has_more: page.has_more,
            active_filter_count: page.active_filter_count,
            unread_count: state.unread_count,
            favorites_count: state.favorites.len(),
            comparison_count: state.comparison.len(),
            user_name: state
                .user
                .as_ref()
                .map(|u| u.display_name.clone().unwrap_or_else(|| u.email.clone())),
            brands: app_state.catalog.brands(),
            sort_choices: SORT_OPTIONS
                .iter()
                .map(|o| SortChoice {
                    key: o.key,
                    label: o.label,
                    selected: o.key == page.active_sort,
                })
                .collect(),
            recent_searches: session.page.recent_searches().to_vec(),
            cards: page.items.iter().map(|l| CardView::new(l, &state)).collect(),
        }
    };

    match template.render() {
        Ok(html) => Ok(Html(html)),
        Err(e) => {
            tracing::error!("Failed to render index template: {}", e);
            Err(AppError::InternalServerError(anyhow::Error::new(e)))
        }
    }
}
