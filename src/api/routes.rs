//! API Routes
//!
//! Configures the Axum router with all cache server endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_handler, get_all_handler, get_handler, get_many_handler, health_handler,
    migrate_handler, set_handler, set_many_handler, ttl_handler, vacuum_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT /ns/:ns/fields` - Store one field
/// - `PUT /ns/:ns/batch` - Store several fields atomically
/// - `GET /ns/:ns/fields` - List live fields
/// - `POST /ns/:ns/query` - Read several fields in order
/// - `GET /ns/:ns/fields/:key` - Read one field
/// - `DELETE /ns/:ns/fields/:key` - Delete one field
/// - `GET /ns/:ns/fields/:key/ttl` - Remaining field lifetime
/// - `POST /ns/:ns/vacuum` - Reclaim expired fields
/// - `POST /ns/:ns/migrate` - Convert to native field expiration
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router with all endpoints
    Router::new()
        .route("/ns/:ns/fields", put(set_handler).get(get_all_handler))
        .route("/ns/:ns/batch", put(set_many_handler))
        .route("/ns/:ns/query", post(get_many_handler))
        .route("/ns/:ns/fields/:key", get(get_handler).delete(delete_handler))
        .route("/ns/:ns/fields/:key/ttl", get(ttl_handler))
        .route("/ns/:ns/vacuum", post(vacuum_handler))
        .route("/ns/:ns/migrate", post(migrate_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::CacheSettings;
    use crate::store::MemoryStore;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let state = AppState::new(Arc::new(MemoryStore::new()), CacheSettings::default());
        create_router(state)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_set_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/ns/app/fields")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"key":"test","value":"hello","ttl":60}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ns/app/fields/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_field_named_like_a_route() {
        let app = create_test_app();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/ns/app/fields")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"key":"batch","value":"b","ttl":60}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ns/app/fields/batch")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_migrate_without_native_support() {
        let app = create_test_app();

        app.clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/ns/app/fields")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"key":"k","value":"v","ttl":60}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/ns/app/migrate")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }
}
