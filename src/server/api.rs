//! HTTP surface of the document server.
//!
//! # Endpoints
//!
//! - `GET /health`: Health check (no auth required)
//! - `GET /collections/{collection}`: List documents
//! - `GET /collections/{collection}/{id}`: Fetch one document
//! - `PUT /collections/{collection}/{id}`: Create or replace a document
//! - `DELETE /collections/{collection}/{id}`: Remove a document

use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path as FsPath;
use std::sync::Arc;
use tourney_core::{Collection, ErrorKind, Record, ValidationError};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::storage::{ServerStorage, ServerStorageError};
use super::ErrorBody;

/// API key entry in the server config file
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeyEntry {
    pub key: String,
    pub user_id: String,
}

/// Config file structure
#[derive(Debug, Clone, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    api_keys: Vec<ApiKeyEntry>,
}

/// Authenticated caller, added to request extensions after auth
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

/// API key store - maps key -> AuthUser
#[derive(Debug, Clone, Default)]
pub struct ApiKeyStore {
    keys: HashMap<String, AuthUser>,
}

impl ApiKeyStore {
    pub fn from_entries(entries: impl IntoIterator<Item = ApiKeyEntry>) -> Self {
        let keys = entries
            .into_iter()
            .map(|entry| {
                (
                    entry.key,
                    AuthUser {
                        user_id: entry.user_id,
                    },
                )
            })
            .collect();
        Self { keys }
    }

    /// Load API keys from the config file.
    ///
    /// A missing or unreadable file yields an empty store, so every
    /// protected request is refused.
    pub fn load(config_path: &FsPath) -> Self {
        let store = match std::fs::read_to_string(config_path) {
            Ok(contents) => match serde_yaml::from_str::<ConfigFile>(&contents) {
                Ok(config) => Self::from_entries(config.api_keys),
                Err(e) => {
                    tracing::warn!("Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to read config file {}: {}",
                    config_path.display(),
                    e
                );
                Self::default()
            }
        };

        if store.keys.is_empty() {
            tracing::warn!("No API keys loaded - all authenticated requests will fail");
        } else {
            tracing::info!("Loaded {} API key(s)", store.keys.len());
        }
        store
    }

    /// Validate an API key and return the associated user
    fn validate(&self, key: &str) -> Option<AuthUser> {
        self.keys.get(key).cloned()
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub api_keys: Arc<ApiKeyStore>,
    pub storage: ServerStorage,
}

impl AppState {
    pub fn new(api_keys: ApiKeyStore, storage: ServerStorage) -> Self {
        Self {
            api_keys: Arc::new(api_keys),
            storage,
        }
    }
}

/// Error response carrying a backend error code.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, ErrorKind::NotFound, message)
    }

    fn precondition(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            ErrorKind::FailedPrecondition,
            message,
        )
    }
}

impl From<ServerStorageError> for ApiError {
    fn from(e: ServerStorageError) -> Self {
        tracing::error!("Storage error: {}", e);
        let kind = match e {
            ServerStorageError::CorruptDocument(..) => ErrorKind::DataLoss,
            ServerStorageError::IoError(..) => ErrorKind::Unknown,
        };
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, kind, "Storage failure")
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::precondition(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                code: self.kind.code().to_string(),
                message: self.message,
            }),
        )
            .into_response()
    }
}

/// Authentication middleware
async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let api_key = match auth_header {
        Some(h) => match h.strip_prefix("Bearer ") {
            Some(key) => key,
            None => {
                return ApiError::new(
                    StatusCode::UNAUTHORIZED,
                    ErrorKind::Unauthenticated,
                    "Authorization header must use Bearer scheme",
                )
                .into_response();
            }
        },
        None => {
            return ApiError::new(
                StatusCode::UNAUTHORIZED,
                ErrorKind::Unauthenticated,
                "Authorization header required",
            )
            .into_response();
        }
    };

    match state.api_keys.validate(api_key) {
        Some(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => ApiError::new(
            StatusCode::FORBIDDEN,
            ErrorKind::PermissionDenied,
            "Invalid API key",
        )
        .into_response(),
    }
}

fn parse_collection(name: &str) -> Result<Collection, ApiError> {
    Collection::parse(name)
        .ok_or_else(|| ApiError::not_found(format!("Unknown collection: {}", name)))
}

fn parse_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::precondition(format!("Invalid document id: {}", id)))
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_documents(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let collection = parse_collection(&collection)?;
    let documents = state.storage.list(collection)?;
    Ok(Json(documents.into_iter().map(|(_, doc)| doc).collect()))
}

async fn get_document(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let collection = parse_collection(&collection)?;
    let id = parse_id(&id)?;
    state
        .storage
        .get(collection, id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No {} document {}", collection, id)))
}

async fn put_document(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((collection, id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let collection = parse_collection(&collection)?;
    let id = parse_id(&id)?;
    let Json(document) = body.map_err(|e| ApiError::precondition(e.body_text()))?;

    let record = Record::from_document(collection, document)?;
    if record.id() != id {
        return Err(ValidationError::IdMismatch {
            expected: id,
            found: record.id(),
        }
        .into());
    }

    // Store the normalised form, not the raw body.
    let stored = record.to_document().map_err(|e| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Unknown,
            e.to_string(),
        )
    })?;
    state.storage.put(collection, id, &stored)?;

    tracing::info!(user = %user.user_id, %collection, %id, "Document stored");
    Ok(Json(stored))
}

async fn delete_document(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let collection = parse_collection(&collection)?;
    let id = parse_id(&id)?;

    if !state.storage.delete(collection, id)? {
        return Err(ApiError::not_found(format!("No {} document {}", collection, id)));
    }

    tracing::info!(user = %user.user_id, %collection, %id, "Document deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(health));

    let protected_routes = Router::new()
        .route("/collections/{collection}", get(list_documents))
        .route(
            "/collections/{collection}/{id}",
            get(get_document)
                .put(put_document)
                .delete(delete_document),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use serde_json::json;
    use tempfile::TempDir;
    use tourney_core::{PickUpPlayer, Sponsor, SponsorTier};
    use tower::ServiceExt;

    const KEY: &str = "test-key";

    fn setup() -> (Router, TempDir) {
        let temp = TempDir::new().unwrap();
        let keys = ApiKeyStore::from_entries([ApiKeyEntry {
            key: KEY.to_string(),
            user_id: "desk".to_string(),
        }]);
        let state = AppState::new(keys, ServerStorage::new(temp.path()));
        (router(state), temp)
    }

    fn request(method: &str, uri: &str, body: Option<Value>) -> HttpRequest<Body> {
        let builder = HttpRequest::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", KEY));
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn read_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn sponsor() -> Sponsor {
        let mut sponsor = Sponsor::new("Acme Bats", SponsorTier::Gold);
        sponsor.website = "https://acme.example".to_string();
        sponsor
    }

    #[tokio::test]
    async fn test_health_needs_no_auth() {
        let (app, _temp) = setup();
        let response = app
            .oneshot(HttpRequest::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_missing_auth_is_unauthenticated() {
        let (app, _temp) = setup();
        let response = app
            .oneshot(
                HttpRequest::get("/collections/sponsors")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(read_json(response).await["code"], "unauthenticated");
    }

    #[tokio::test]
    async fn test_non_bearer_auth_is_unauthenticated() {
        let (app, _temp) = setup();
        let response = app
            .oneshot(
                HttpRequest::get("/collections/sponsors")
                    .header(header::AUTHORIZATION, "Basic abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_key_is_permission_denied() {
        let (app, _temp) = setup();
        let response = app
            .oneshot(
                HttpRequest::get("/collections/sponsors")
                    .header(header::AUTHORIZATION, "Bearer nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(read_json(response).await["code"], "permission-denied");
    }

    #[tokio::test]
    async fn test_put_then_get_and_list() {
        let (app, _temp) = setup();
        let sponsor = sponsor();
        let uri = format!("/collections/sponsors/{}", sponsor.id);

        let response = app
            .clone()
            .oneshot(request("PUT", &uri, Some(serde_json::to_value(&sponsor).unwrap())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.clone().oneshot(request("GET", &uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["name"], "Acme Bats");

        let response = app
            .oneshot(request("GET", "/collections/sponsors", None))
            .await
            .unwrap();
        let list = read_json(response).await;
        assert_eq!(list.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_pick_up_players_collection_served() {
        let (app, _temp) = setup();
        let player = PickUpPlayer::new("Alex Rodriguez", "12U", "Pitcher", "alex.r@example.com");
        let uri = format!("/collections/pickUpPlayers/{}", player.id);

        let response = app
            .clone()
            .oneshot(request("PUT", &uri, Some(serde_json::to_value(&player).unwrap())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(request("GET", &uri, None)).await.unwrap();
        assert_eq!(read_json(response).await["playerName"], "Alex Rodriguez");
    }

    #[tokio::test]
    async fn test_put_with_mismatched_id_rejected() {
        let (app, _temp) = setup();
        let sponsor = sponsor();
        let uri = format!("/collections/sponsors/{}", Uuid::new_v4());

        let response = app
            .oneshot(request("PUT", &uri, Some(serde_json::to_value(&sponsor).unwrap())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await["code"], "failed-precondition");
    }

    #[tokio::test]
    async fn test_put_with_wrong_shape_rejected() {
        let (app, _temp) = setup();
        let uri = format!("/collections/tournaments/{}", Uuid::new_v4());

        let response = app
            .oneshot(request("PUT", &uri, Some(json!({ "name": 42 }))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await["code"], "failed-precondition");
    }

    #[tokio::test]
    async fn test_unknown_collection_not_found() {
        let (app, _temp) = setup();
        let response = app
            .oneshot(request("GET", "/collections/players", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(read_json(response).await["code"], "not-found");
    }

    #[tokio::test]
    async fn test_invalid_id_rejected() {
        let (app, _temp) = setup();
        let response = app
            .oneshot(request("GET", "/collections/sponsors/..%2Fetc", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let (app, _temp) = setup();
        let uri = format!("/collections/results/{}", Uuid::new_v4());

        let response = app.oneshot(request("DELETE", &uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_existing() {
        let (app, _temp) = setup();
        let sponsor = sponsor();
        let uri = format!("/collections/sponsors/{}", sponsor.id);

        app.clone()
            .oneshot(request("PUT", &uri, Some(serde_json::to_value(&sponsor).unwrap())))
            .await
            .unwrap();

        let response = app.clone().oneshot(request("DELETE", &uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app.oneshot(request("GET", &uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
