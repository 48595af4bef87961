//! Authentication middleware
//!
//! JWT verification and permission checks. Tokens are issued out of band
//! (see `lino-admin issue-token`); this server only verifies them, with the
//! same `jwt.secret` the issuer reads from `Config`.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::{permission_key, Action, Resource};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, ErrorDetail, ErrorResponse};

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub permissions: Vec<String>,
}

impl AuthUser {
    /// Check if user has a specific permission
    pub fn has_permission(&self, resource: Resource, action: Action) -> bool {
        let permission = permission_key(resource, action);
        self.permissions.contains(&permission)
    }

    /// Check if user has any of the specified permissions
    pub fn has_any_permission(&self, perms: &[(Resource, Action)]) -> bool {
        perms.iter().any(|(r, a)| self.has_permission(*r, *a))
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub permissions: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

/// Authentication middleware that validates JWT tokens.
///
/// Install with `from_fn_with_state(config, auth_middleware)`.
pub async fn auth_middleware(
    State(config): State<Arc<Config>>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|header| header.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => return unauthorized_response("Missing or invalid Authorization header"),
    };

    let claims = match decode_jwt(token, &config.jwt.secret) {
        Ok(claims) => claims,
        Err(err) => return err.into_response(),
    };

    let user_id = match Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => return unauthorized_response("Invalid user ID in token"),
    };

    request.extensions_mut().insert(AuthUser {
        user_id,
        username: claims.username,
        permissions: claims.permissions,
    });

    next.run(request).await
}

/// Decode and validate JWT token
pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })
}

/// Sign a token for a user
pub fn encode_jwt(
    user_id: Uuid,
    username: &str,
    permissions: Vec<String>,
    expires_in_secs: i64,
    secret: &str,
) -> Result<String, AppError> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        permissions,
        exp: now + expires_in_secs,
        iat: now,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token signing failed: {}", e)))
}

/// Create unauthorized response
fn unauthorized_response(message: &str) -> Response {
    let error = ErrorResponse {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message_en: message.to_string(),
            message_es: "No autorizado".to_string(),
            field: None,
            details: None,
        },
    };

    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| {
                let error = ErrorResponse {
                    error: ErrorDetail {
                        code: "UNAUTHORIZED".to_string(),
                        message_en: "Authentication required".to_string(),
                        message_es: "Debe iniciar sesión".to_string(),
                        field: None,
                        details: None,
                    },
                };
                (StatusCode::UNAUTHORIZED, Json(error))
            })
    }
}

/// Permission guard for use in handlers
pub fn check_permission(user: &AuthUser, resource: Resource, action: Action) -> Result<(), AppError> {
    if user.has_permission(resource, action) {
        Ok(())
    } else {
        tracing::warn!(
            user = %user.username,
            permission = %permission_key(resource, action),
            "Permission denied"
        );
        Err(AppError::InsufficientPermissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip_carries_permissions() {
        let user_id = Uuid::new_v4();
        let token = encode_jwt(
            user_id,
            "caja1",
            vec!["sale:create".to_string()],
            3600,
            "secret",
        )
        .unwrap();

        let claims = decode_jwt(&token, "secret").unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.permissions, vec!["sale:create".to_string()]);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = encode_jwt(Uuid::new_v4(), "caja1", vec![], 3600, "secret").unwrap();
        assert!(matches!(decode_jwt(&token, "other"), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let token = encode_jwt(Uuid::new_v4(), "caja1", vec![], -3600, "secret").unwrap();
        assert!(matches!(decode_jwt(&token, "secret"), Err(AppError::TokenExpired)));
    }

    #[test]
    fn test_permission_check() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            username: "admin".to_string(),
            permissions: vec!["sale:delete".to_string()],
        };
        assert!(check_permission(&user, Resource::Sale, Action::Delete).is_ok());
        assert!(check_permission(&user, Resource::Purchase, Action::Delete).is_err());
        assert!(user.has_any_permission(&[(Resource::Purchase, Action::Delete), (Resource::Sale, Action::Delete)]));
    }
}
