//! HTTP interception layer.
//!
//! An axum middleware sits in front of a static file service rooted at the
//! web root. For every `GET`/`HEAD` it asks the [`Dispatcher`] what the
//! request gets: passthrough requests continue to the static files
//! untouched; image requests are answered directly with the original, a
//! cached thumbnail, or a freshly rendered one.
//!
//! Rendering is CPU-bound. It runs on the blocking pool, and a semaphore
//! sized by `thumbnails.max_parallel` caps how many renders run at once.
//!
//! Errors become `application/problem+json` responses: 400 for bad sizes and
//! rejected paths, 500 for decode and I/O failures.

use crate::config::Config;
use crate::dispatch::{Disposition, DispatchError, Dispatcher, ThumbnailRequest};
use crate::imaging::{ImageBackend, RustBackend};
use axum::{
    Json, Router,
    extract::{Query, Request, State},
    http::{HeaderName, HeaderValue, Method, StatusCode, Uri, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use image::ImageFormat;
use serde::Serialize;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};

/// Response header reporting how an image request was served.
pub const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-thumbnail-cache");

/// Shared state of the interceptor.
pub struct AppState<B: ImageBackend = RustBackend> {
    pub dispatcher: Arc<Dispatcher<B>>,
    /// Caps concurrent renders (CPU-bound work).
    pub render_semaphore: Arc<Semaphore>,
}

impl<B: ImageBackend> AppState<B> {
    pub fn new(dispatcher: Dispatcher<B>, max_parallel: usize) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            render_semaphore: Arc::new(Semaphore::new(max_parallel.max(1))),
        }
    }
}

impl<B: ImageBackend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            render_semaphore: Arc::clone(&self.render_semaphore),
        }
    }
}

/// Build the application: interceptor in front of static files.
pub fn router<B: ImageBackend + 'static>(state: AppState<B>) -> Router {
    let web_root = state.dispatcher.resolver().web_root().to_path_buf();
    Router::new()
        .fallback_service(ServeDir::new(web_root))
        .layer(middleware::from_fn_with_state(
            state,
            thumbnail_middleware::<B>,
        ))
        .layer(TraceLayer::new_for_http())
}

/// Initialize the cache, bind, and serve until Ctrl-C.
pub async fn run(config: &Config) -> io::Result<()> {
    let dispatcher = Dispatcher::from_config(config, RustBackend::new());
    let web_root = dispatcher.resolver().web_root();
    if !web_root.is_dir() {
        warn!(web_root = %web_root.display(), "web root does not exist; everything will 404");
    }
    dispatcher.cache().initialize()?;
    info!(cache = %dispatcher.cache().dir().display(), "thumbnail cache ready");

    let state = AppState::new(dispatcher, config.thumbnails.effective_parallelism());
    let app = router(state);

    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    info!("Server: http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

/// The interceptor middleware.
pub async fn thumbnail_middleware<B: ImageBackend + 'static>(
    State(state): State<AppState<B>>,
    req: Request,
    next: Next,
) -> Response {
    if !matches!(*req.method(), Method::GET | Method::HEAD) {
        return next.run(req).await;
    }

    let path = req.uri().path().to_owned();
    let size = size_param(req.uri());
    match serve_image(&state, &path, size.as_deref()).await {
        Ok(Some(response)) => response,
        Ok(None) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}

/// Value of the first `size` query parameter, key matched case-insensitively.
fn size_param(uri: &Uri) -> Option<String> {
    let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri).ok()?;
    pairs
        .into_iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("size"))
        .map(|(_, value)| value)
}

/// `Ok(None)` means the request is not ours.
async fn serve_image<B: ImageBackend + 'static>(
    state: &AppState<B>,
    path: &str,
    size: Option<&str>,
) -> Result<Option<Response>, DispatchError> {
    let decision = state.dispatcher.classify(path, size)?;
    let disposition = decision.disposition;
    let Some(request) = decision.request.filter(|_| !disposition.is_passthrough()) else {
        return Ok(None);
    };

    let bytes = match disposition {
        Disposition::CacheMiss => render(state, request.clone()).await?,
        _ => tokio::fs::read(&request.thumbnail_path).await?,
    };
    Ok(Some(image_response(
        &request.thumbnail_path,
        disposition,
        bytes,
    )))
}

async fn render<B: ImageBackend + 'static>(
    state: &AppState<B>,
    request: ThumbnailRequest,
) -> Result<Vec<u8>, DispatchError> {
    let permit = state
        .render_semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(io::Error::other)?;
    let dispatcher = Arc::clone(&state.dispatcher);
    // The permit lives as long as the render, even if the client goes away.
    tokio::task::spawn_blocking(move || {
        let _permit = permit;
        dispatcher.generate(&request)
    })
        .await
        .map_err(io::Error::other)?
}

fn image_response(path: &Path, disposition: Disposition, bytes: Vec<u8>) -> Response {
    let content_type = ImageFormat::from_path(path)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream");
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (
                CACHE_STATUS_HEADER,
                HeaderValue::from_static(disposition.as_str()),
            ),
        ],
        bytes,
    )
        .into_response()
}

// =============================================================================
// Problem details
// =============================================================================

/// RFC 7807 error body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub type_url: String,
    pub title: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Stable machine-readable code.
    pub code: String,
}

impl DispatchError {
    fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    fn stable_code(&self) -> &'static str {
        match self {
            DispatchError::InvalidSize(_) => "INVALID_SIZE",
            DispatchError::SizeTooLarge { .. } => "SIZE_TOO_LARGE",
            DispatchError::Path(_) => "INVALID_PATH",
            DispatchError::Decode(_) => "DECODE_FAILED",
            DispatchError::Encode(_) => "ENCODE_FAILED",
            DispatchError::Io(_) => "IO_ERROR",
        }
    }

    fn title(&self) -> &'static str {
        match self.status_code() {
            StatusCode::BAD_REQUEST => "Bad Request",
            _ => "Internal Server Error",
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "image request failed");
        }

        let problem = ProblemDetails {
            type_url: "about:blank".to_string(),
            title: self.title().to_string(),
            status: status.as_u16(),
            detail: Some(self.to_string()),
            code: self.stable_code().to_string(),
        };

        let mut res = Json(problem).into_response();
        *res.status_mut() = status;
        res.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        res
    }
}
