//! API authentication via bearer tokens.
//!
//! Every token maps to the user it was issued for. When no tokens are
//! configured, a single local token is loaded from (or generated into) the
//! token file and bound to the `local` user.

use std::collections::HashMap;
use std::path::Path;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use rand::Rng;
use tracing::{debug, info, warn};

use adsight_core::config::AuthConfig;

use crate::error::ApiError;
use crate::state::AppState;

/// User id bound to the generated local token.
pub const LOCAL_USER: &str = "local";

/// The authenticated caller, inserted as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerId(pub String);

/// Generate a random 32-character hex token.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    hex::encode(bytes)
}

/// Load token from file, or generate and save a new one.
pub fn load_or_generate_token(token_path: &Path) -> String {
    if let Ok(contents) = std::fs::read_to_string(token_path) {
        let token = contents.trim().to_string();
        if !token.is_empty() {
            info!("API token loaded from {}", token_path.display());
            return token;
        }
    }

    let token = generate_token();

    if let Some(parent) = token_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = std::fs::write(token_path, &token) {
        warn!(error = %e, "Failed to save API token to {}", token_path.display());
    } else {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(token_path, std::fs::Permissions::from_mode(0o600));
        }
        info!("API token saved to {}", token_path.display());
    }

    token
}

/// Build the token table from configuration.
pub fn resolve_tokens(config: &AuthConfig, token_path: &Path) -> HashMap<String, String> {
    if !config.tokens.is_empty() {
        return config.tokens.clone();
    }
    let token = load_or_generate_token(token_path);
    HashMap::from([(token, LOCAL_USER.to_string())])
}

/// Middleware that authenticates `Authorization: Bearer <token>` and
/// attaches the caller's [`CallerId`] to the request.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(value) = req.headers().get("authorization") else {
        return ApiError::Unauthorized.into_response();
    };
    let Ok(value) = value.to_str() else {
        return ApiError::Unauthorized.into_response();
    };
    let Some(token) = value.strip_prefix("Bearer ").map(str::trim) else {
        return ApiError::Unauthorized.into_response();
    };

    let Some(user_id) = state.caller_for(token).map(str::to_string) else {
        debug!("Rejected unknown bearer token");
        return ApiError::InvalidToken.into_response();
    };

    req.extensions_mut().insert(CallerId(user_id));
    next.run(req).await
}
