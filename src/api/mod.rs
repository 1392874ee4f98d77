//! HTTP API.
//!
//! | Method | Path                          | Purpose                         |
//! |--------|-------------------------------|---------------------------------|
//! | GET    | `/health`                     | liveness                        |
//! | POST   | `/api/search`                 | semantic search                 |
//! | POST   | `/api/chat`                   | search + generated answer       |
//! | POST   | `/api/hooks/profiles`         | profile changed                 |
//! | POST   | `/api/hooks/projects`         | project changed                 |
//! | POST   | `/api/hooks/profiles/bulk`    | many profiles changed           |
//! | POST   | `/api/hooks/projects/bulk`    | many projects changed           |
//! | DELETE | `/api/hooks/profiles/{id}`    | profile removed                 |
//! | POST   | `/api/documents`              | index free-form text            |
//! | DELETE | `/api/documents/{id}`         | remove free-form text           |
//! | GET    | `/api/stats`                  | queue, index and cache counters |
//! | GET    | `/metrics`                    | Prometheus exposition           |

mod error;
mod handlers;

pub use error::{ApiError, GENERIC_MESSAGE};
pub use handlers::{ApiResponse, ChatRequest, SearchRequest};

use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::metrics::MetricsService;
use crate::queue::MutationHooks;
use crate::search::{ResponseGenerator, SemanticSearch};
use crate::vector_store::VectorStore;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub search: Arc<SemanticSearch>,
    pub generator: Arc<ResponseGenerator>,
    pub hooks: MutationHooks,
    pub store: Arc<dyn VectorStore>,
    pub metrics: Arc<MetricsService>,
    pub start_time: Instant,
}

/// HTTP server for the search node.
pub struct ApiServer {
    config: ApiConfig,
    state: AppState,
}

impl ApiServer {
    pub fn with_state(config: ApiConfig, state: AppState) -> Self {
        Self { config, state }
    }

    pub fn router(&self) -> Router {
        let router = Router::new()
            .route("/health", get(handlers::health))
            .route("/metrics", get(handlers::metrics))
            .route("/api/search", post(handlers::search))
            .route("/api/chat", post(handlers::chat))
            .route("/api/stats", get(handlers::stats))
            .route("/api/hooks/profiles", post(handlers::profile_updated))
            .route("/api/hooks/projects", post(handlers::project_updated))
            .route("/api/hooks/profiles/bulk", post(handlers::profiles_bulk))
            .route("/api/hooks/projects/bulk", post(handlers::projects_bulk))
            .route("/api/hooks/profiles/{id}", delete(handlers::profile_deleted))
            .route("/api/documents", post(handlers::document_created))
            .route("/api/documents/{id}", delete(handlers::document_deleted))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        if self.config.cors_enabled {
            router.layer(cors_layer(&self.config.cors_origins))
        } else {
            router
        }
    }

    /// Serve until `shutdown` resolves.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let listener = TcpListener::bind(&self.config.listen_address)
            .await
            .map_err(|e| Error::Api(format!("bind {}: {}", self.config.listen_address, e)))?;
        info!(address = %self.config.listen_address, "API server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| Error::Api(format!("server error: {}", e)))
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}
