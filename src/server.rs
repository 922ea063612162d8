//! HTTP server and routes.

mod handlers;
mod state;

pub use state::AppState;

use axum::{Router, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let opds_routes = Router::new()
        .route("/", get(handlers::opds_root))
        .route("/books", get(handlers::opds_books))
        .route("/books/{sort}", get(handlers::opds_books_sorted))
        .route("/search-spec", get(handlers::opds_search_spec))
        .route("/media/{book_id}/cover", get(handlers::book_cover))
        .route("/acquire/book/{book_id}", get(handlers::book_acquire))
        // by-author, by-tag, by-unique-tag, by-series
        .route("/{section}", get(handlers::opds_section));

    let api_routes = Router::new()
        .route("/books", get(handlers::api_books))
        .route("/books/{book_id}/cover", get(handlers::book_cover));

    Router::new()
        .route("/nocover.jpg", get(handlers::placeholder_cover))
        .nest("/opds", opds_routes)
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
