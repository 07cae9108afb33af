/**
 * Site Routes
 * Contact form and resume download
 */
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{io::ErrorKind, sync::Arc};
use tokio_util::io::ReaderStream;

use crate::{
    config::Config,
    error::{AppError, AppResult},
    routes::ClientIp,
    state::ContactLimiter,
};

lazy_static::lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid");
}

const MAX_FIELD_LEN: usize = 5_000;

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// POST /api/contact
pub async fn contact(
    State(ContactLimiter(limiter)): State<ContactLimiter>,
    ClientIp(client): ClientIp,
    payload: Result<Json<ContactRequest>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    if let Err(retry_after) = limiter.check(client).await {
        tracing::warn!(client = %client, "contact form rate limit exceeded");
        return Err(AppError::RateLimited {
            message: "Too many messages. Please try again later.".to_string(),
            retry_after,
        });
    }

    let missing = || AppError::Validation("Please provide name, email, and message".to_string());
    let Json(request) = payload.map_err(|_| missing())?;
    let (Some(name), Some(email), Some(message)) = (
        required(&request.name),
        required(&request.email),
        required(&request.message),
    ) else {
        return Err(missing());
    };

    if !EMAIL_RE.is_match(email) {
        return Err(AppError::Validation(
            "Please provide a valid email address".to_string(),
        ));
    }
    if [name, email, message]
        .iter()
        .chain(required(&request.subject).iter())
        .any(|field| field.len() > MAX_FIELD_LEN)
    {
        return Err(AppError::Validation("Message is too long".to_string()));
    }

    tracing::info!(
        name = %name,
        email = %email,
        subject = required(&request.subject).unwrap_or(""),
        message_len = message.len(),
        "contact form submission"
    );

    Ok(Json(MessageResponse {
        message: "Message received successfully".to_string(),
    }))
}

/// GET /api/download-resume
///
/// Streams the PDF from disk.
pub async fn download_resume(State(config): State<Arc<Config>>) -> AppResult<Response> {
    let path = &config.resume.path;
    let opened = async {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        Ok::<_, std::io::Error>((file, len))
    };
    let (file, len) = match opened.await {
        Ok(opened) => opened,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(AppError::NotFound("Resume file not found".to_string()));
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to open resume");
            return Err(AppError::Backend(e.to_string()));
        }
    };

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        config.resume.download_name.replace('"', "")
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_LENGTH, HeaderValue::from(len)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}
