use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequest, FromRequestParts, Request},
    http::{header, request::Parts},
    Form, Json,
};
use serde::de::DeserializeOwned;

use super::{claims::Claims, error::AuthError, jwt::TokenError, services::AuthService};

/// Extracts and validates the bearer token, yielding its claims.
pub struct AuthUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<AuthService>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = Arc::<AuthService>::from_ref(state);
        let header = match parts.headers.get(header::AUTHORIZATION) {
            Some(v) => Some(
                v.to_str()
                    .map_err(|_| AuthError::InvalidToken(TokenError::Malformed))?,
            ),
            None => None,
        };
        Ok(AuthUser(auth.authorize(header)?))
    }
}

/// Credentials posted either by the HTML form or as JSON.
pub struct Submission<T> {
    pub body: T,
    pub from_form: bool,
}

#[async_trait]
impl<S, T> FromRequest<S> for Submission<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AuthError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("application/json") {
            let Json(body) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| AuthError::InvalidInput(e.body_text()))?;
            Ok(Self {
                body,
                from_form: false,
            })
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(body) = Form::<T>::from_request(req, state)
                .await
                .map_err(|e| AuthError::InvalidInput(e.body_text()))?;
            Ok(Self {
                body,
                from_form: true,
            })
        } else {
            Err(AuthError::InvalidInput(
                "Expected a form or JSON body".into(),
            ))
        }
    }
}
