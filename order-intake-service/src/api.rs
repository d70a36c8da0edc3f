use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;
use crate::handlers::OrderIntake;
use crate::store::EventCatalog;

#[derive(Clone)]
pub struct AppState {
    pub intake: OrderIntake,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub ok: bool,
    pub order_id: Uuid,
    pub updated_stocks: BTreeMap<String, i32>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}

impl ErrorResponse {
    fn new(error: impl ToString) -> Json<Self> {
        Json(Self {
            ok: false,
            error: error.to_string(),
        })
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/orders", post(create_order).fallback(method_not_allowed))
        .route("/events/:event_id/catalog", get(get_catalog))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

pub async fn create_order(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CreateOrderResponse>, ApiError> {
    match state.intake.submit(&body).await {
        Ok(placed) => Ok(Json(CreateOrderResponse {
            ok: true,
            order_id: placed.order_id,
            updated_stocks: placed.updated_stocks,
        })),
        Err(e) => Err((StatusCode::BAD_REQUEST, ErrorResponse::new(e))),
    }
}

pub async fn method_not_allowed() -> ApiError {
    (StatusCode::METHOD_NOT_ALLOWED, ErrorResponse::new("Method not allowed"))
}

pub async fn get_catalog(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<EventCatalog>, ApiError> {
    let not_found = || (StatusCode::NOT_FOUND, ErrorResponse::new("Event not found"));

    let event_id = Uuid::parse_str(&event_id).map_err(|_| not_found())?;
    match state.intake.catalog(event_id).await {
        Ok(Some(catalog)) => Ok(Json(catalog)),
        Ok(None) => Err(not_found()),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::new(e))),
    }
}

pub async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::testing::*;
    use crate::memory::MemoryStore;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(store: MemoryStore) -> Router {
        create_router(AppState {
            intake: OrderIntake::new(Arc::new(store)),
        })
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn successful_order_returns_id_and_updated_stocks() {
        let (status, body) = send(
            app(store()),
            Method::POST,
            "/orders",
            Some(json!({
                "eventId": EVENT_ID,
                "channel": "messenger",
                "quantities": {"Coxinha": 3, "Brigadeiro": 2},
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], json!(true));
        assert!(Uuid::parse_str(body["orderId"].as_str().unwrap()).is_ok());
        assert_eq!(body["updatedStocks"], json!({"Coxinha": 7}));
    }

    #[tokio::test]
    async fn invalid_channel_is_a_bad_request() {
        let (status, body) = send(
            app(store()),
            Method::POST,
            "/orders",
            Some(json!({
                "eventId": EVENT_ID,
                "channel": "sms",
                "quantities": {"Coxinha": 1},
            })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"ok": false, "error": "Invalid channel"}));
    }

    #[tokio::test]
    async fn insufficient_stock_is_a_bad_request() {
        let (status, body) = send(
            app(store()),
            Method::POST,
            "/orders",
            Some(json!({
                "eventId": EVENT_ID,
                "channel": "whatsapp",
                "quantities": {"Kibe": 20},
            })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], json!(false));
        assert_eq!(body["error"], json!("Insufficient stock for Kibe: 4 remaining"));
    }

    #[tokio::test]
    async fn empty_body_reports_missing_event_id() {
        let (status, body) = send(app(store()), Method::POST, "/orders", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("eventId is required"));
    }

    #[tokio::test]
    async fn other_methods_get_structured_405() {
        for method in [Method::GET, Method::PUT, Method::DELETE] {
            let (status, body) = send(app(store()), method, "/orders", None).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(body, json!({"ok": false, "error": "Method not allowed"}));
        }
    }

    #[tokio::test]
    async fn cors_preflight_is_allowed_from_any_origin() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/orders")
            .header(header::ORIGIN, "https://shop.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();

        let response = app(store()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn catalog_lists_event_products() {
        let uri = format!("/events/{EVENT_ID}/catalog");
        let (status, body) = send(app(store()), Method::GET, &uri, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["event"]["title"], json!("Saturday salgados"));
        assert_eq!(body["event"]["status"], json!("active"));
        let names: Vec<_> = body["products"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["Coxinha", "Kibe", "Brigadeiro"]);
        assert_eq!(body["products"][0]["available"], json!(true));
        assert_eq!(body["products"][2]["stockQuantity"], Value::Null);
    }

    #[tokio::test]
    async fn catalog_for_unknown_event_is_404() {
        let (status, body) = send(app(store()), Method::GET, "/events/nope/catalog", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], json!("Event not found"));

        let uri = format!("/events/{}/catalog", Uuid::new_v4());
        let (status, _) = send(app(store()), Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_check_responds_ok() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app(store()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
