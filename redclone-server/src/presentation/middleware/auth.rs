use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::application::loaders::RequestContext;
use crate::presentation::AppState;
use crate::presentation::app_error::AppError;

#[derive(Debug, Clone)]
pub(crate) struct AuthenticatedUser {
    pub(crate) user_id: i64,
}

impl AuthenticatedUser {
    pub(crate) fn context(&self) -> RequestContext {
        RequestContext::for_user(self.user_id)
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

/// Identity for routes that serve anonymous callers too.
///
/// No `Authorization` header means anonymous; a header that is present but
/// does not carry a valid bearer token is rejected.
#[derive(Debug, Clone)]
pub(crate) struct MaybeUser(pub(crate) Option<i64>);

impl MaybeUser {
    pub(crate) fn context(&self) -> RequestContext {
        match self.0 {
            Some(user_id) => RequestContext::for_user(user_id),
            None => RequestContext::anonymous(),
        }
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(header::AUTHORIZATION) {
            return Ok(MaybeUser(None));
        }
        let user = authenticate(&parts.headers, state)?;
        Ok(MaybeUser(Some(user.user_id)))
    }
}

pub(crate) async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(request.headers(), &state)?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<AuthenticatedUser, AppError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let mut parts = auth_header.split_whitespace();
    let scheme = parts.next().ok_or(AppError::Unauthorized)?;
    let token = parts.next().ok_or(AppError::Unauthorized)?;
    if parts.next().is_some() {
        return Err(AppError::Unauthorized);
    }
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::Unauthorized);
    }

    let claims = state
        .jwt
        .verify_token(token.trim())
        .map_err(|_| AppError::Unauthorized)?;

    Ok(AuthenticatedUser {
        user_id: claims.user_id,
    })
}
