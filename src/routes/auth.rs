/**
 * Admin Auth Routes
 * Session login, logout and status for the single admin
 */
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{auth::AuthGate, error::AppResult, routes::ClientIp};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub is_authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// POST /api/admin/login
pub async fn login(
    State(gate): State<Arc<AuthGate>>,
    ClientIp(client): ClientIp,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<(CookieJar, Json<SuccessResponse>)> {
    // A malformed body still counts against the limiter.
    let request = payload.map(|Json(r)| r).unwrap_or(LoginRequest {
        username: None,
        password: None,
    });

    let session = gate
        .login(
            client,
            request.username.as_deref(),
            request.password.as_deref(),
        )
        .await?;

    let jar = jar.add(gate.session_cookie(session.token));
    Ok((jar, Json(SuccessResponse { success: true })))
}

/// POST /api/admin/logout
pub async fn logout(
    State(gate): State<Arc<AuthGate>>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<SuccessResponse>)> {
    let token = jar.get(gate.cookie_name()).map(|c| c.value().to_string());
    if let Err(e) = gate.logout(token.as_deref()).await {
        tracing::error!(error = %e, "failed to destroy session");
        return Err(e.into());
    }

    let jar = jar.remove(gate.removal_cookie());
    Ok((jar, Json(SuccessResponse { success: true })))
}

/// GET /api/admin/status
pub async fn status(State(gate): State<Arc<AuthGate>>, jar: CookieJar) -> Json<StatusResponse> {
    match gate.session_from_jar(&jar).await {
        Ok(Some(record)) => Json(StatusResponse {
            is_authenticated: true,
            username: Some(record.username),
        }),
        Ok(None) => Json(StatusResponse {
            is_authenticated: false,
            username: None,
        }),
        Err(e) => {
            tracing::error!(error = %e, "session lookup failed");
            Json(StatusResponse {
                is_authenticated: false,
                username: None,
            })
        }
    }
}
