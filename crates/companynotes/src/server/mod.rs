//! HTTP API over the note store.
//!
//! Every API route passes through the identity middleware, which attaches a
//! [`Requester`](crate::identity::Requester) to the request. Handlers decide
//! for themselves whether an anonymous requester is acceptable.

pub mod error;
mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{Config, ServerConfig};
use crate::error::{Error, Result};
use crate::identity::IdentityResolver;
use crate::store::NoteStore;
use crate::summary::{OpenAiSummarizer, Summarizer};

use self::error::ApiError;

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    store: NoteStore,
    identity: Arc<IdentityResolver>,
    summarizer: Option<Arc<dyn Summarizer>>,
}

impl AppState {
    /// Assemble state from its parts.
    #[must_use]
    pub fn new(
        store: NoteStore,
        identity: IdentityResolver,
        summarizer: Option<Arc<dyn Summarizer>>,
    ) -> Self {
        Self {
            store,
            identity: Arc::new(identity),
            summarizer,
        }
    }

    /// Build identity and summary collaborators from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the token verification key or HTTP client cannot
    /// be set up.
    pub fn from_config(config: &Config, store: NoteStore) -> Result<Self> {
        let identity = IdentityResolver::from_config(&config.auth)?;
        let summarizer = OpenAiSummarizer::from_config(&config.summary)?
            .map(|s| Arc::new(s) as Arc<dyn Summarizer>);
        if summarizer.is_none() {
            info!("No summary API key configured; /summaries will answer 503");
        }
        Ok(Self::new(store, identity, summarizer))
    }
}

async fn identity_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let resolved = {
        let headers = request.headers();
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let asserted = headers
            .get(state.identity.user_header())
            .and_then(|v| v.to_str().ok());
        state.identity.resolve(authorization, asserted)
    };

    match resolved {
        Ok(requester) => {
            request.extensions_mut().insert(requester);
            next.run(request).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

fn cors_layer(config: &ServerConfig, user_header: &str) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {origin:?}");
                None
            }
        })
        .collect();

    let mut headers = vec![header::CONTENT_TYPE, header::AUTHORIZATION];
    match HeaderName::from_bytes(user_header.as_bytes()) {
        Ok(name) => headers.push(name),
        Err(_) => warn!("Identity header {user_header:?} is not a valid header name"),
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(AllowHeaders::list(headers))
        .allow_credentials(true)
}

/// Build the application router.
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let public = Router::new().route("/health", get(handlers::health));

    let api = Router::new()
        .route("/companies", get(handlers::list_companies))
        .route("/companies/{id}/notes", get(handlers::list_notes))
        .route("/notes", post(handlers::create_note))
        .route(
            "/notes/{id}",
            put(handlers::update_note).delete(handlers::delete_note),
        )
        .route("/summaries", post(handlers::create_summary))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            identity_middleware,
        ));

    let cors = cors_layer(config, state.identity.user_header());

    Router::new()
        .merge(public)
        .merge(api)
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A server running on a background task.
#[derive(Debug)]
pub struct RunningServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl RunningServer {
    /// The address the server is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            warn!("Server task ended abnormally: {e}");
        }
    }
}

/// Bind `address` and serve `app` on a background task.
///
/// # Errors
///
/// Returns [`Error::Bind`] if the address cannot be bound.
pub async fn start_server(address: &str, app: Router) -> Result<RunningServer> {
    let listener = TcpListener::bind(address)
        .await
        .map_err(|source| Error::Bind {
            address: address.to_string(),
            source,
        })?;
    let addr = listener.local_addr()?;

    let (shutdown, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("HTTP server shutting down");
            })
            .await
        {
            tracing::error!("HTTP server error: {e}");
        }
    });

    info!("API server listening on {addr}");
    Ok(RunningServer {
        addr,
        shutdown,
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_skips_bad_origins() {
        let config = ServerConfig {
            cors_origins: vec!["http://ok.example".to_string(), "bad\norigin".to_string()],
            ..ServerConfig::default()
        };
        // Building must not panic on the invalid entry.
        let _ = cors_layer(&config, "x-user-id");
    }
}
