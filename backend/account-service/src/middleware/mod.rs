//! Request extractors that authenticate the caller.
//!
//! Handlers take `AuthenticatedUser` (any live session) or `StaffUser` as a
//! typed argument; there is no per-request extension bag.

use crate::error::{AccountError, Result};
use crate::handlers::client_ip;
use crate::security::AuthenticatedUser;
use crate::AppState;
use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use tracing::{debug, warn};

/// Token from `Authorization: Bearer <token>`
pub fn bearer_token(req: &HttpRequest) -> Result<String> {
    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AccountError::MissingToken)?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or(AccountError::MissingToken)
}

impl FromRequest for AuthenticatedUser {
    type Error = AccountError;
    type Future = LocalBoxFuture<'static, Result<Self>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token = bearer_token(req);
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let ip = client_ip(req);

        Box::pin(async move {
            let token = token?;
            let state = state.ok_or_else(|| {
                AccountError::Internal("application state is not registered".to_string())
            })?;

            let caller = state
                .sessions
                .validate_access_token(&token)
                .await
                .map_err(|e| {
                    debug!(error = %e, "access token rejected");
                    e
                })?;

            // Last-login bookkeeping runs off the request path.
            let sessions = state.sessions.clone();
            let user_id = caller.id();
            tokio::spawn(async move {
                if let Err(e) = sessions.record_activity(user_id, ip).await {
                    warn!(user_id = %user_id, error = %e, "failed to record user activity");
                }
            });

            Ok(caller)
        })
    }
}

/// Authenticated caller with the staff flag
#[derive(Debug, Clone)]
pub struct StaffUser(pub AuthenticatedUser);

impl FromRequest for StaffUser {
    type Error = AccountError;
    type Future = LocalBoxFuture<'static, Result<Self>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let caller = AuthenticatedUser::from_request(req, payload);

        Box::pin(async move {
            let caller = caller.await?;
            if !caller.user.is_staff {
                return Err(AccountError::Forbidden(
                    "You are not allowed to perform this action".to_string(),
                ));
            }
            Ok(StaffUser(caller))
        })
    }
}
