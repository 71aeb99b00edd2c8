//! The REST surface: three POST endpoints, one per message kind.
//!
//! Every response is `200 OK` with a JSON body, including the rejection
//! and timeout cases; callers distinguish outcomes by the body alone.

use crate::bridge::{Gateway, MessageKind, INVALID_REQUEST_BODY};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header;
use axum::http::HeaderName;
use axum::http::Method;
use axum::response::IntoResponse;
use axum::routing::any;
use axum::Router;

pub fn router(gateway: Gateway) -> Router {
    Router::new()
        .route("/ccr", any(ccr))
        .route("/slr", any(slr))
        .route("/str", any(sy_str))
        .with_state(gateway)
}

async fn ccr(State(gateway): State<Gateway>, method: Method, body: Bytes) -> impl IntoResponse {
    respond(gateway, MessageKind::Gy, method, body).await
}

async fn slr(State(gateway): State<Gateway>, method: Method, body: Bytes) -> impl IntoResponse {
    respond(gateway, MessageKind::SySlr, method, body).await
}

async fn sy_str(State(gateway): State<Gateway>, method: Method, body: Bytes) -> impl IntoResponse {
    respond(gateway, MessageKind::SyStr, method, body).await
}

async fn respond(
    gateway: Gateway,
    kind: MessageKind,
    method: Method,
    body: Bytes,
) -> ([(HeaderName, &'static str); 1], String) {
    let body = if method != Method::POST || body.is_empty() {
        INVALID_REQUEST_BODY.to_string()
    } else {
        gateway.submit(body.to_vec(), kind).await
    };
    ([(header::CONTENT_TYPE, "application/json")], body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Bridge;
    use crate::config::Settings;
    use crate::dictionary::DEFAULT_DICT;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tokio::sync::watch;
    use tower::ServiceExt; // for `oneshot`

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn stub_gateway() -> (Gateway, mpsc::Receiver<crate::bridge::TxRequest>) {
        let (tx, rx) = mpsc::channel(8);
        (Gateway { tx }, rx)
    }

    #[tokio::test]
    async fn test_rejects_get() {
        let (gateway, _rx) = stub_gateway();
        let app = router(gateway);

        let response = app
            .oneshot(Request::builder().uri("/ccr").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(body_string(response).await, INVALID_REQUEST_BODY);
    }

    #[tokio::test]
    async fn test_rejects_empty_post() {
        let (gateway, _rx) = stub_gateway();
        let app = router(gateway);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/ccr")
                    .header("content-type", "application/json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(body_string(response).await, INVALID_REQUEST_BODY);
    }

    #[tokio::test]
    async fn test_rejects_non_json_post() {
        let (gateway, _rx) = stub_gateway();
        let app = router(gateway);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/ccr")
                    .header("content-type", "application/json")
                    .body(Body::from("not-json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(body_string(response).await, INVALID_REQUEST_BODY);
    }

    #[tokio::test]
    async fn test_ccr_through_router() {
        let dict = Arc::new(DEFAULT_DICT.clone());
        let addr = crate::bridge::tests::spawn_server(Arc::clone(&dict), true, None).await;

        let settings = Arc::new(Settings {
            origin_host: "ocs.local".into(),
            origin_realm: "local".into(),
            diameter_server_addr: addr.to_string(),
            ..Default::default()
        });
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (bridge, gateway) = Bridge::connect(settings, dict, shutdown_rx).await.unwrap();
        tokio::spawn(bridge.run());

        let app = router(gateway);

        // a valid CCR gets the peer's answer back as JSON
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/ccr")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"Service-Context-Id":"foo@bar","CC-Request-Type":1}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
        let answer = body_string(response).await;
        let json: serde_json::Value = serde_json::from_str(&answer).unwrap();
        assert_eq!(json["Result-Code"], 2001);

        // an unknown AVP name comes back as a single error field naming it
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/ccr")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"Not-An-AVP":1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        let answer = body_string(response).await;
        let json: serde_json::Value = serde_json::from_str(&answer).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert!(object["error"].as_str().unwrap().contains("Not-An-AVP"));
    }
}
