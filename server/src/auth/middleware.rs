//! Identity extraction.
//!
//! Authentication happens at the gateway in front of this service. The
//! gateway forwards the caller's identity in the `X-User-Id` and
//! `X-User-Role` headers. When `AUTH_SECRET` is configured the gateway must
//! also present it as a Bearer token, otherwise the headers are trusted as-is.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use lablib_engine::{Role, UserId};
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Authenticated caller extracted from request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Reject callers without the admin role.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("admin role required"))
        }
    }

    /// The user an operation acts for: the caller by default, anyone when
    /// the caller is an admin.
    pub fn acting_for(&self, requested: Option<UserId>) -> Result<UserId, AppError> {
        match requested {
            None => Ok(self.id),
            Some(id) if id == self.id || self.is_admin() => Ok(id),
            Some(_) => Err(AppError::Forbidden("cannot act for another user")),
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(&parts.headers, state.config.auth_secret.as_deref())
    }
}

fn authenticate(headers: &HeaderMap, secret: Option<&str>) -> Result<AuthUser, AppError> {
    if let Some(secret) = secret {
        let auth_header = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthorized("missing authorization header"))?;

        match auth_header.strip_prefix("Bearer ") {
            Some(token) if token == secret => {}
            Some(_) => return Err(AppError::Unauthorized("invalid bearer token")),
            None => {
                return Err(AppError::Unauthorized(
                    "invalid authorization header format",
                ))
            }
        }
    }

    let id = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::Unauthorized("missing user id"))?;
    let id = Uuid::parse_str(id.trim()).map_err(|_| AppError::Unauthorized("invalid user id"))?;

    let role = match headers
        .get(USER_ROLE_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        Some(role) => Role::parse(role).map_err(|_| AppError::Unauthorized("invalid user role"))?,
        None => Role::User,
    };

    Ok(AuthUser { id, role })
}
