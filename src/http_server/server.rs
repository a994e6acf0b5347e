//! # HTTP Server
//!
//! Combines the health and review routers behind CORS and request
//! tracing.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::config::HttpServerConfig;
use super::health_routes::health_routes;
use super::review_routes::{review_routes, ReviewState};
use crate::clock::Clock;
use crate::store::ReviewStore;

/// HTTP server for the review front end
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    pub fn new<S, C>(config: HttpServerConfig, state: Arc<ReviewState<S, C>>) -> Self
    where
        S: ReviewStore + 'static,
        C: Clock + Clone + 'static,
    {
        let router = Self::build_router(&config, state);
        Self { config, router }
    }

    /// Build the combined router with all endpoints
    fn build_router<S, C>(config: &HttpServerConfig, state: Arc<ReviewState<S, C>>) -> Router
    where
        S: ReviewStore + 'static,
        C: Clock + Clone + 'static,
    {
        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .merge(health_routes())
            .nest("/review", review_routes(state))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serve until `shutdown` resolves
    pub async fn start_with_shutdown<F>(self, shutdown: F) -> Result<(), std::io::Error>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = self.config.socket_addr().parse().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid socket address {}: {}", self.config.socket_addr(), e),
            )
        })?;

        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "review server listening");
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("review server stopped");
        Ok(())
    }

    /// Serve until Ctrl-C
    pub async fn start(self) -> Result<(), std::io::Error> {
        self.start_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Authenticator, JwtConfig};
    use crate::clock::{LeasePolicy, ManualClock};
    use crate::coordinator::{CoordinatorConfig, WorkflowCoordinator};
    use crate::record::ReviewRecord;
    use crate::store::MemoryReviewStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Map, Value};
    use tower::ServiceExt;

    struct Fixture {
        router: Router,
        auth: Authenticator,
        clock: ManualClock,
    }

    fn fixture(ids: &[&str]) -> Fixture {
        let store = Arc::new(
            MemoryReviewStore::with_records(ids.iter().map(|id| ReviewRecord::new(*id, Map::new())))
                .unwrap(),
        );
        let clock = ManualClock::at_epoch_secs(1_700_000_000);
        let coordinator = Arc::new(WorkflowCoordinator::new(
            store,
            clock.clone(),
            LeasePolicy::default(),
            CoordinatorConfig {
                selection_seed: Some(5),
                ..Default::default()
            },
        ));
        let auth = Authenticator::new(JwtConfig {
            secret: "router_test_secret".to_string(),
            ..Default::default()
        });
        let state = Arc::new(ReviewState::new(coordinator, auth.clone()));
        let router = HttpServer::new(HttpServerConfig::default(), state).router();
        Fixture {
            router,
            auth,
            clock,
        }
    }

    impl Fixture {
        fn token(&self, user: &str) -> String {
            self.auth.issue(user, "").unwrap()
        }

        async fn call(&self, method: &str, uri: &str, user: Option<&str>, body: Value) -> (StatusCode, Value) {
            let mut builder = Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json");
            if let Some(user) = user {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(user)));
            }
            let request = builder.body(Body::from(body.to_string())).unwrap();
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, value)
        }
    }

    #[tokio::test]
    async fn test_health() {
        let f = fixture(&[]);
        let (status, body) = f.call("GET", "/health", None, Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_review_requires_token() {
        let f = fixture(&["R1"]);
        let (status, body) = f.call("POST", "/review/next", None, json!({})).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "auth_required");
    }

    #[tokio::test]
    async fn test_next_heartbeat_save_flow() {
        let f = fixture(&["R1"]);
        let (status, body) = f.call("POST", "/review/next", Some("alice"), json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["record"]["id"], "R1");
        assert_eq!(body["lease"]["expires_at_ms"], 1_700_000_600_000i64);
        assert_eq!(body["heartbeat_interval_ms"], 60_000);
        let version = body["lease"]["version"].as_u64().unwrap();

        f.clock.advance(chrono::Duration::seconds(100));
        let (status, body) = f
            .call(
                "POST",
                "/review/heartbeat",
                Some("alice"),
                json!({"record_id": "R1", "version": version}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["expires_at_ms"], 1_700_000_700_000i64);
        let version = body["version"].as_u64().unwrap();

        let (status, body) = f
            .call(
                "POST",
                "/review/save",
                Some("alice"),
                json!({"record_id": "R1", "version": version, "status": "OK"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
        assert_eq!(body["replayed"], false);
    }

    #[tokio::test]
    async fn test_save_validation_error_is_422() {
        let f = fixture(&["R1"]);
        let (_, body) = f.call("POST", "/review/next", Some("alice"), json!({})).await;
        let version = body["lease"]["version"].as_u64().unwrap();

        let (status, body) = f
            .call(
                "POST",
                "/review/save",
                Some("alice"),
                json!({"record_id": "R1", "version": version, "status": "KO MYM", "reviewer_note": "x"}),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "validation");
        assert_eq!(body["field"], "ko_reason");
    }

    #[tokio::test]
    async fn test_unknown_status_is_422() {
        let f = fixture(&["R1"]);
        let (status, body) = f
            .call(
                "POST",
                "/review/save",
                Some("alice"),
                json!({"record_id": "R1", "version": 1, "status": "MAYBE"}),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "blocked:unknown_status");
    }

    #[tokio::test]
    async fn test_blank_record_id_is_400() {
        let f = fixture(&["R1"]);
        let (status, body) = f
            .call(
                "POST",
                "/review/heartbeat",
                Some("alice"),
                json!({"record_id": "  ", "version": 1}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_conflict_is_409() {
        let f = fixture(&["R1"]);
        f.call("POST", "/review/next", Some("alice"), json!({})).await;

        let (status, body) = f
            .call(
                "POST",
                "/review/skip",
                Some("bob"),
                json!({"record_id": "R1", "version": 1}),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "conflict");

        let (status, _) = f.call("POST", "/review/next", Some("bob"), json!({})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_release_and_stats() {
        let f = fixture(&["R1", "R2"]);
        let (_, body) = f.call("POST", "/review/next", Some("alice"), json!({})).await;
        let record_id = body["record"]["id"].clone();
        let version = body["lease"]["version"].clone();

        let (status, body) = f
            .call(
                "POST",
                "/review/release",
                Some("alice"),
                json!({"record_id": record_id, "version": version}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["released"], true);

        let (status, _) = f.call("GET", "/review/stats", Some("alice"), Value::Null).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = f.call("GET", "/review/stats", Some("admin"), Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pending"], 2);
        assert_eq!(body["available"], 2);
    }

    #[tokio::test]
    async fn test_admin_results_listing() {
        let f = fixture(&["R1", "R2"]);
        let (_, body) = f.call("POST", "/review/next", Some("alice"), json!({})).await;
        let record_id = body["record"]["id"].clone();
        let version = body["lease"]["version"].clone();
        let (status, _) = f
            .call(
                "POST",
                "/review/save",
                Some("alice"),
                json!({"record_id": record_id, "version": version, "status": "OK"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = f.call("GET", "/review/results", Some("alice"), Value::Null).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = f
            .call("GET", "/review/results?status=OK&user=alice&record_id=", Some("admin"), Value::Null)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["results"][0]["record_id"], record_id);

        let (_, body) = f
            .call("GET", "/review/results?status=DUDA", Some("admin"), Value::Null)
            .await;
        assert_eq!(body["count"], 0);

        let (status, _) = f
            .call("GET", "/review/results?status=MAYBE", Some("admin"), Value::Null)
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (_, body) = f.call("GET", "/review/stats", Some("admin"), Value::Null).await;
        assert_eq!(body["by_user"]["alice"], 1);
        assert_eq!(body["ko_rate"], 0.0);
        assert_eq!(body["window_days"], 14);
    }
}
