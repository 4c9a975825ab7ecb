use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use clinic_core::error::AppError;
use uuid::Uuid;

use crate::models::Role;
use crate::services::AccessTokenClaims;
use crate::startup::AppState;

/// Authenticated staff member, taken from a validated access token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl TryFrom<AccessTokenClaims> for CurrentUser {
    type Error = AppError;

    fn try_from(claims: AccessTokenClaims) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid token subject")))?;
        let role = claims
            .role
            .parse::<Role>()
            .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid token role")))?;

        Ok(Self {
            id,
            email: claims.email,
            name: claims.name,
            role,
        })
    }
}

/// Require `Authorization: Bearer <token>` and attach the [`CurrentUser`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
        })?;

    let claims = state.jwt.validate_access_token(token)?;
    let user = CurrentUser::try_from(claims)?;

    tracing::Span::current().record("staff_id", tracing::field::display(user.id));
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Not authenticated")))
    }
}
