use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Path as AxumPath, State};
use axum::http::{header, HeaderValue};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use shepherd_storage::Keyspace;
use shepherd_types::MimeTable;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::errors::GatewayError;
use crate::gateway::{Gateway, PathRoute, Served};

pub const DEFAULT_BANNER: &str = "Shepherd Gateway";

const MARKDOWN_CONTENT_TYPE: &str = "text/html; charset=utf-8";

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub mime: Arc<MimeTable>,
    pub banner: String,
    pub req_count: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(gateway: Gateway, mime: MimeTable, banner: impl Into<String>) -> Self {
        Self {
            gateway: Arc::new(gateway),
            mime: Arc::new(mime),
            banner: banner.into(),
            req_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn record_request(&self) -> u64 {
        self.req_count.fetch_add(1, Ordering::Relaxed) as u64 + 1
    }

    fn content_type(&self, served: &Served) -> Option<String> {
        if served.keyspace == Keyspace::Markdown {
            return Some(MARKDOWN_CONTENT_TYPE.to_string());
        }
        let extension = served.path.as_ref()?.extension()?;
        self.mime.lookup(extension).map(str::to_string)
    }

    fn respond(&self, served: Served) -> Response {
        let content_type = self.content_type(&served);
        let mut response = Response::new(Body::from(served.body));
        if let Some(value) = content_type.and_then(|ct| HeaderValue::from_str(&ct).ok()) {
            response.headers_mut().insert(header::CONTENT_TYPE, value);
        }
        response
    }
}

type SharedState = Arc<AppState>;

pub async fn start_server(state: AppState, addr: &str) -> Result<()> {
    let app = build_router(state);
    let listener = bind_listener(addr).await?;
    let local = listener
        .local_addr()
        .context("failed to read bound gateway address")?;
    info!("Gateway listening on http://{}", local);
    axum::serve(listener, app)
        .await
        .context("gateway server terminated unexpectedly")
}

async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind gateway listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind gateway listener on {addr}"))
    }
}

pub fn build_router(state: AppState) -> Router {
    let shared: SharedState = Arc::new(state);
    Router::new()
        .route("/", get(handle_banner))
        .route("/f/", get(handle_missing_fid))
        .route("/f/:fid", get(handle_fid))
        .route("/p/:owner", get(handle_missing_path))
        .route("/p/:owner/", get(handle_missing_path))
        .route("/p/:owner/*path", get(handle_raw))
        .route("/www/:owner", get(handle_missing_path))
        .route("/www/:owner/", get(handle_missing_path))
        .route("/www/:owner/*path", get(handle_site))
        .route("/md/:owner", get(handle_missing_path))
        .route("/md/:owner/", get(handle_missing_path))
        .route("/md/:owner/*path", get(handle_markdown))
        .route("/:alias", get(handle_alias_root))
        .route("/:alias/*path", get(handle_alias_path))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

async fn handle_banner(State(state): State<SharedState>) -> String {
    state.record_request();
    state.banner.clone()
}

async fn handle_missing_fid(State(state): State<SharedState>) -> GatewayError {
    state.record_request();
    GatewayError::MissingParameter("fid")
}

async fn handle_missing_path(
    State(state): State<SharedState>,
    AxumPath(owner): AxumPath<String>,
) -> GatewayError {
    let req = state.record_request();
    debug!(req, "no path given for owner {}", owner);
    GatewayError::MissingParameter("path")
}

async fn handle_fid(
    State(state): State<SharedState>,
    AxumPath(fid): AxumPath<String>,
) -> Result<Response, GatewayError> {
    let req = state.record_request();
    debug!(req, "fid request {}", fid);
    let served = state.gateway.by_fid(&fid).await?;
    Ok(state.respond(served))
}

async fn handle_raw(
    state: State<SharedState>,
    params: AxumPath<(String, String)>,
) -> Result<Response, GatewayError> {
    serve_path(state, params, PathRoute::Raw).await
}

async fn handle_site(
    state: State<SharedState>,
    params: AxumPath<(String, String)>,
) -> Result<Response, GatewayError> {
    serve_path(state, params, PathRoute::Site).await
}

async fn handle_markdown(
    state: State<SharedState>,
    params: AxumPath<(String, String)>,
) -> Result<Response, GatewayError> {
    serve_path(state, params, PathRoute::Markdown).await
}

async fn serve_path(
    State(state): State<SharedState>,
    AxumPath((owner, path)): AxumPath<(String, String)>,
    route: PathRoute,
) -> Result<Response, GatewayError> {
    let req = state.record_request();
    debug!(req, "/{} request {} {}", route.prefix(), owner, path);
    let served = state.gateway.by_path(&owner, &path, route).await?;
    Ok(state.respond(served))
}

async fn handle_alias_root(
    State(state): State<SharedState>,
    AxumPath(alias): AxumPath<String>,
) -> Result<Response, GatewayError> {
    let req = state.record_request();
    debug!(req, "alias request {}", alias);
    let served = state.gateway.by_alias(&alias, None).await?;
    Ok(state.respond(served))
}

async fn handle_alias_path(
    State(state): State<SharedState>,
    AxumPath((alias, path)): AxumPath<(String, String)>,
) -> Result<Response, GatewayError> {
    let req = state.record_request();
    debug!(req, "alias request {} {}", alias, path);
    let served = state.gateway.by_alias(&alias, Some(&path)).await?;
    Ok(state.respond(served))
}
