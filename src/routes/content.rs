/**
 * Content Routes
 * Public reads and admin writes of portfolio sections
 */
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::{
    auth::RequireAdmin,
    content::{ContentError, SectionName, SectionStore},
    error::{AppError, AppResult},
};

#[derive(Debug, Serialize)]
pub struct SectionList {
    pub sections: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub success: bool,
    pub message: String,
}

fn log_backend_failure(err: &ContentError, section: &str, op: &'static str) {
    if err.is_backend() {
        tracing::error!(section = %section, op, error = %err, "content backend failure");
    }
}

/// GET /api/content
///
/// Never fails: if the backend cannot be read the allow-list alone is returned.
pub async fn list_sections(State(sections): State<SectionStore>) -> Json<SectionList> {
    let sections = match sections.list_sections().await {
        Ok(names) => names,
        Err(e) => {
            log_backend_failure(&e, "*", "list");
            SectionName::ALL
                .iter()
                .map(|name| name.as_str().to_string())
                .collect()
        }
    };
    Json(SectionList { sections })
}

/// GET /api/content/{section}
pub async fn get_section(
    State(sections): State<SectionStore>,
    Path(section): Path<String>,
) -> AppResult<Json<Value>> {
    match sections.get_section(&section).await {
        Ok(payload) => Ok(Json(payload)),
        Err(e) => {
            log_backend_failure(&e, &section, "get");
            Err(e.into())
        }
    }
}

/// POST /api/content/{section}
pub async fn update_section(
    RequireAdmin(session): RequireAdmin,
    State(sections): State<SectionStore>,
    Path(section): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<UpdateResponse>> {
    // Unknown names are a 404 even when the body is also malformed.
    let name: SectionName = section.parse()?;
    let Json(payload) = payload.map_err(|_| AppError::from(ContentError::InvalidPayload))?;

    if let Err(e) = sections.put_section(name.as_str(), payload).await {
        log_backend_failure(&e, &section, "put");
        return Err(e.into());
    }

    tracing::info!(section = %name, username = %session.username, "section updated");
    Ok(Json(UpdateResponse {
        success: true,
        message: format!("{} content updated successfully", name),
    }))
}

#[cfg(test)]
mod tests {
    use crate::routes::tests::{json_request, login_cookie, send, test_state, with_peer};
    use axum::{body::Body, http::Request, http::StatusCode};
    use serde_json::{json, Value};

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_list_returns_allow_list() {
        let (_dir, state) = test_state().await;
        let app = with_peer(crate::create_app(state));

        let (status, _, body) = send(&app, get("/api/content")).await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            body["sections"],
            json!(["hero", "about", "skills", "projects", "experience", "contact", "gallery"])
        );
    }

    #[tokio::test]
    async fn test_unknown_and_empty_sections_are_not_found() {
        let (_dir, state) = test_state().await;
        let app = with_peer(crate::create_app(state));

        let (status, _, body) = send(&app, get("/api/content/nonexistent")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["success"], false);

        let (status, _, _) = send(&app, get("/api/content/gallery")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_write_requires_session() {
        let (_dir, state) = test_state().await;
        let app = with_peer(crate::create_app(state));

        let (status, _, _) = send(
            &app,
            json_request("POST", "/api/content/hero", None, &json!({ "greeting": "Hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_write_validates_name_then_body() {
        let (_dir, state) = test_state().await;
        let app = with_peer(crate::create_app(state));
        let cookie = login_cookie(&app).await;

        let (status, _, _) = send(
            &app,
            json_request("POST", "/api/content/blog", Some(&cookie), &json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, body) = send(
            &app,
            json_request("POST", "/api/content/hero", Some(&cookie), &json!([1, 2, 3])),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["message"], "Invalid payload. Expected a JSON object.");

        let malformed = Request::post("/api/content/hero")
            .header("content-type", "application/json")
            .header("cookie", &cookie)
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _, _) = send(&app, malformed).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_write_then_read_back() {
        let (_dir, state) = test_state().await;
        let app = with_peer(crate::create_app(state));
        let cookie = login_cookie(&app).await;

        let payload = json!({ "title": "Work", "items": [{ "company": "Acme", "years": 3 }] });
        let (status, _, body) = send(
            &app,
            json_request("POST", "/api/content/experience", Some(&cookie), &payload),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "experience content updated successfully");

        let (status, _, body) = send(&app, get("/api/content/experience")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), payload);
    }
}
