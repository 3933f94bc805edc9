//! Bearer / `X-API-Key` authentication for the TaskFixer API.
//!
//! The key is read from `Authorization: Bearer <key>` first, then from
//! `X-API-Key: <key>`. Only the SHA-256 hash is stored, in `api_keys`; the
//! owning user becomes the subject of the request and the user id every
//! quota check runs against.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::http::error::AppError;
use crate::state::AppState;

const X_API_KEY: &str = "x-api-key";

const KEY_HINT: &str = "Send it as 'Authorization: Bearer <key>' or 'X-API-Key: <key>'.";

/// The user a request acts for. Extracting this validates the API key.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated {
    pub user_id: Uuid,
}

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let api_key = extract_api_key(&parts.headers)?;

        match state.accounts.resolve_api_key(&api_key).await {
            Ok(Some(user_id)) => Ok(Authenticated { user_id }),
            Ok(None) => Err(AppError::Unauthorized(format!("Invalid API key. {KEY_HINT}"))),
            Err(e) => Err(AppError::Internal(format!("API key lookup failed: {e}"))),
        }
    }
}

/// Pull the raw key out of the headers. Blank keys count as missing.
fn extract_api_key(headers: &HeaderMap) -> Result<String, AppError> {
    let header_str = |name: &str| {
        headers
            .get(name)
            .map(|v| {
                v.to_str()
                    .map_err(|_| AppError::Unauthorized(format!("{name} header is not valid ASCII")))
            })
            .transpose()
    };

    let bearer = header_str(AUTHORIZATION.as_str())?
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    let key = match bearer {
        Some(key) => Some(key),
        None => header_str(X_API_KEY)?.map(str::trim),
    };

    match key {
        Some(key) if !key.is_empty() => Ok(key.to_string()),
        _ => Err(AppError::Unauthorized(format!("Missing API key. {KEY_HINT}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> HeaderMap {
        let mut builder = Request::builder().uri("/api/usage");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0.headers
    }

    #[test]
    fn test_bearer_header() {
        let key = extract_api_key(&parts(&[("authorization", "Bearer tfx_abc ")])).unwrap();
        assert_eq!(key, "tfx_abc");
    }

    #[test]
    fn test_x_api_key_header() {
        let key = extract_api_key(&parts(&[("x-api-key", "tfx_def")])).unwrap();
        assert_eq!(key, "tfx_def");
    }

    #[test]
    fn test_non_bearer_authorization_falls_back() {
        let key = extract_api_key(&parts(&[
            ("authorization", "Basic dXNlcg=="),
            ("x-api-key", "tfx_ghi"),
        ]))
        .unwrap();
        assert_eq!(key, "tfx_ghi");
    }

    #[test]
    fn test_missing_key_is_unauthorized() {
        let err = extract_api_key(&parts(&[])).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let err = extract_api_key(&parts(&[("x-api-key", "  ")])).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
