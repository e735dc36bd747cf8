use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use solar_core::{
    AuthError, IngestError, Ingestor, ServerConfig, TelemetryRepository, TokenGate,
};
use tower::util::MapResponse;
use tower::ServiceBuilder;
use tracing::{error, warn};

/// The only header a client ever sees.
pub const OPAQUE_CONTENT_TYPE: &str = "application/octet-stream";

pub const INFO_BODY: &str = concat!("solar-ingestd ", env!("CARGO_PKG_VERSION"));

/// Request failures as seen on the wire. Bodies are fixed short strings;
/// details only go to the log.
#[derive(Debug)]
pub enum ApiError {
    Auth(AuthError),
    Ingest(IngestError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Auth(AuthError::ServerMisconfigured) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(AuthError::MissingToken | AuthError::InvalidToken) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Ingest(IngestError::Malformed(_)) => StatusCode::BAD_REQUEST,
            Self::Ingest(IngestError::Persistence { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> &'static str {
        match self {
            Self::Auth(AuthError::ServerMisconfigured) => "server misconfiguration",
            Self::Auth(AuthError::MissingToken) => "missing token",
            Self::Auth(AuthError::InvalidToken) => "invalid token",
            Self::Ingest(IngestError::Malformed(_)) => "malformed payload",
            Self::Ingest(IngestError::Persistence { .. }) => "persistence failure",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), self.body()).into_response()
    }
}

/// The finished service: the router wrapped by [`sanitize_headers`].
pub type App = MapResponse<Router, fn(Response) -> Response>;

/// Builds the full application: ingestion routes behind the token check,
/// the info route, and header stripping around everything.
///
/// The sanitizer wraps the `Router` from outside instead of being added
/// with `Router::layer`, because axum fills in `content-length` after the
/// router's own layers have run.
pub fn router<R>(config: &ServerConfig, ingestor: Ingestor<R>) -> App
where
    R: TelemetryRepository + 'static,
{
    let ingest = Router::new()
        .route("/v2/solar/reading", post(post_reading::<R>))
        .route("/v2/solar/event", post(post_event::<R>))
        .route_layer(middleware::from_fn_with_state(
            config.token_gate(),
            require_token,
        ))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .with_state(ingestor);

    let routes = Router::new().route("/v2/info", get(info)).merge(ingest);

    let app = match config.normalized_base_path() {
        Some(base) => Router::new().nest(&base, routes),
        None => routes,
    };

    ServiceBuilder::new()
        .map_response(sanitize_headers as fn(Response) -> Response)
        .service(app.fallback(not_found))
}

async fn post_reading<R: TelemetryRepository + 'static>(
    State(ingestor): State<Ingestor<R>>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    ingestor
        .ingest_readings(&body)
        .await
        .map(|_| StatusCode::OK)
        .map_err(ingest_failed)
}

async fn post_event<R: TelemetryRepository + 'static>(
    State(ingestor): State<Ingestor<R>>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    ingestor
        .ingest_event(&body)
        .await
        .map(|_| StatusCode::OK)
        .map_err(ingest_failed)
}

async fn info() -> &'static str {
    INFO_BODY
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

fn ingest_failed(err: IngestError) -> ApiError {
    if let IngestError::Persistence { .. } = &err {
        error!(error = %err, "ingest failed");
    }
    ApiError::Ingest(err)
}

/// Runs before any body is read.
pub async fn require_token(
    State(gate): State<TokenGate>,
    request: Request,
    next: Next,
) -> Response {
    match gate.authorize(request.headers()) {
        Ok(()) => next.run(request).await,
        Err(err) => {
            match err {
                AuthError::ServerMisconfigured => {
                    error!(path = %request.uri().path(), "no ingest token configured")
                }
                _ => warn!(path = %request.uri().path(), reason = %err, "unauthorized"),
            }
            ApiError::Auth(err).into_response()
        }
    }
}

/// Drops every header and sets the opaque content type. Applied outermost
/// so it sees handler output, rejections and fallbacks alike.
///
/// This covers the response as the application hands it to hyper. hyper
/// itself still writes `date`, and `content-length` or
/// `transfer-encoding`, when it frames the response on the connection.
pub fn sanitize_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.clear();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(OPAQUE_CONTENT_TYPE),
    );
    response
}
