//! REST endpoint for bot-driven registration.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use super::service::{RegisterRequest, RegistrationService};
use crate::error::GatewayError;

/// Route path for bot registration.
pub const REGISTRATION_PATH: &str = "/create-telegram-user/";

/// Header carrying the shared bot secret.
pub const BOT_SECRET_HEADER: &str = "X-Bot-Secret";

/// Shared state for gateway routes.
#[derive(Clone)]
pub struct GatewayState {
    pub service: Arc<RegistrationService>,
}

/// JSON body of a registration call.
///
/// All fields default to absent so missing keys become field errors
/// rather than a deserialization failure.
#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    #[serde(default)]
    pub telegram_id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
}

/// POST /create-telegram-user/
///
/// 201 + the stored record when this call created it. An idempotent hit
/// answers 400 with a unique-marker field error — that mirrors the
/// upstream API this replaces, and the bot's "welcome back" branch parses
/// exactly that body.
async fn create_telegram_user(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(body): Json<RegisterBody>,
) -> Response {
    let secret = headers
        .get(BOT_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());

    let request = RegisterRequest {
        telegram_id: body.telegram_id,
        username: body.username,
        first_name: body.first_name,
    };

    match state.service.register(secret, &request).await {
        Ok((user, true)) => (StatusCode::CREATED, Json(user)).into_response(),
        Ok((user, false)) => error_response(&GatewayError::Conflict(user.telegram_id)),
        Err(err) => error_response(&err),
    }
}

/// Map a gateway error to its wire shape.
fn error_response(err: &GatewayError) -> Response {
    match err {
        GatewayError::Unauthorized => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "Unauthorized"})),
        )
            .into_response(),
        GatewayError::Validation { fields } => {
            (StatusCode::BAD_REQUEST, Json(fields.clone())).into_response()
        }
        GatewayError::Conflict(_) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "telegram_id": ["This field must be unique."]
            })),
        )
            .into_response(),
        GatewayError::Internal(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": "Internal server error"})),
        )
            .into_response(),
    }
}

/// Build the gateway REST routes.
pub fn gateway_routes(service: Arc<RegistrationService>) -> Router {
    Router::new()
        .route(REGISTRATION_PATH, post(create_telegram_user))
        .with_state(GatewayState { service })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unauthorized_shape() {
        let response = error_response(&GatewayError::Unauthorized);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Unauthorized");
    }

    #[tokio::test]
    async fn conflict_body_carries_unique_marker() {
        let response = error_response(&GatewayError::Conflict(42));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        let errors = json["telegram_id"].to_string();
        assert!(errors.contains("unique"), "bot parses this marker: {errors}");
    }

    #[tokio::test]
    async fn validation_shape_is_a_field_map() {
        let mut fields = std::collections::BTreeMap::new();
        fields.insert(
            "first_name".to_string(),
            vec!["This field may not be blank.".to_string()],
        );
        let response = error_response(&GatewayError::Validation { fields });
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["first_name"][0], "This field may not be blank.");
    }

    #[tokio::test]
    async fn internal_error_is_opaque() {
        let response = error_response(&GatewayError::Internal("disk on fire".into()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"], "Internal server error");
        assert!(!json.to_string().contains("disk"));
    }
}
