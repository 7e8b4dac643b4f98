//! Document server: JSON records per collection behind bearer-key auth.

pub mod api;
pub mod storage;

use serde::{Deserialize, Serialize};

pub use api::{router, ApiKeyEntry, ApiKeyStore, AppState, AuthUser};
pub use storage::{ServerStorage, ServerStorageError};

/// Error body returned by every failing endpoint. `code` uses the backend
/// error codes the client classifies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}
