//! Authentication middleware
//!
//! Bearer JWT authentication plus the capability check that gates every
//! endpoint. Roles and permission inheritance live outside this service; a
//! token simply lists the `module:feature:privilege` grants of its holder.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};
use uuid::Uuid;

use crate::error::{AppError, AppResult, ErrorDetail, ErrorResponse};
use crate::AppState;

/// Module name used in every permission of this service
pub const MODULE: &str = "inventory";

/// Privilege level requested from the capability check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    View,
    Create,
    Edit,
}

impl Privilege {
    pub fn as_str(&self) -> &'static str {
        match self {
            Privilege::View => "view",
            Privilege::Create => "create",
            Privilege::Edit => "edit",
        }
    }
}

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub permissions: Vec<String>,
}

impl AuthUser {
    /// Check if user holds `module:feature:privilege`
    pub fn has_permission(&self, module: &str, feature: &str, privilege: Privilege) -> bool {
        let permission = permission_key(module, feature, privilege);
        self.permissions.contains(&permission)
    }
}

fn permission_key(module: &str, feature: &str, privilege: Privilege) -> String {
    format!("{}:{}:{}", module, feature, privilege.as_str())
}

/// Capability check: allow or deny `user` on `module:feature:privilege`
pub fn authorize(user: &AuthUser, module: &str, feature: &str, privilege: Privilege) -> AppResult<()> {
    if user.has_permission(module, feature, privilege) {
        Ok(())
    } else {
        Err(AppError::InsufficientPermissions(permission_key(
            module, feature, privilege,
        )))
    }
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    // Extract Authorization header
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => return AppError::InvalidToken.into_response(),
    };

    let claims = match decode_jwt(token, &state.config.jwt.secret) {
        Ok(claims) => claims,
        Err(err) => return err.into_response(),
    };

    let user_id = match Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => return AppError::InvalidToken.into_response(),
    };

    request.extensions_mut().insert(AuthUser {
        user_id,
        permissions: claims.permissions,
    });

    next.run(request).await
}

/// JWT claims structure
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    permissions: Vec<String>,
    exp: i64,
    iat: i64,
}

/// Decode and validate JWT token
fn decode_jwt(token: &str, secret: &str) -> AppResult<Claims> {
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
                    error: ErrorDetail::new("UNAUTHORIZED", "Authentication required"),
                };
                (StatusCode::UNAUTHORIZED, Json(error))
            })
    }
}

impl CurrentUser {
    /// Capability check for the inventory module
    pub fn authorize(&self, feature: &str, privilege: Privilege) -> AppResult<()> {
        authorize(&self.0, MODULE, feature, privilege)
    }

    pub fn user_id(&self) -> Uuid {
        self.0.user_id
    }
}
