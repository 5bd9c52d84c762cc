use std::net::SocketAddr;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::auth;
use crate::rate_limit::limit_by_peer;
use crate::state::AppState;

pub fn build_app(state: AppState) -> Router {
    let api = auth::router().route_layer(middleware::from_fn_with_state(
        state.limiter.clone(),
        limit_by_peer,
    ));
    let cors = cors_layer(state.config.client_url.as_deref());

    Router::new()
        .route("/", get(|| async { "homepage" }))
        .route("/health", get(|| async { "ok" }))
        .nest("/api", api)
        .with_state(state)
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

/// Credentialed CORS for the configured client origin, permissive otherwise.
fn cors_layer(client_url: Option<&str>) -> CorsLayer {
    let Some(url) = client_url else {
        return CorsLayer::permissive();
    };
    match HeaderValue::from_str(url.trim_end_matches('/')) {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        Err(e) => {
            tracing::warn!(error = %e, client_url = url, "CLIENT_URL is not a valid origin; CORS left permissive");
            CorsLayer::permissive()
        }
    }
}

pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::ConnectInfo,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, String) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn alice_signup() -> Request<Body> {
        post_json(
            "/api/auth/signup",
            json!({"username": "alice", "email": "a@x.com", "password": "Secret1"}),
        )
    }

    fn token_of(body: &str) -> String {
        let v: Value = serde_json::from_str(body).unwrap();
        v["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn signup_and_login_scenarios() {
        let app = build_app(AppState::fake());

        // fresh signup
        let (status, body) = send(&app, alice_signup()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!token_of(&body).is_empty());

        // same signup again
        let (status, body) = send(&app, alice_signup()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"message": "Email already in use"}));

        // wrong password
        let (wrong_status, wrong_body) = send(
            &app,
            post_json("/api/auth/login", json!({"email": "a@x.com", "password": "wrong"})),
        )
        .await;
        assert_eq!(wrong_status, StatusCode::BAD_REQUEST);
        assert_eq!(serde_json::from_str::<Value>(&wrong_body).unwrap(), json!({"message": "Invalid credentials"}));

        // unknown user
        let (unknown_status, unknown_body) = send(
            &app,
            post_json("/api/auth/login", json!({"email": "nouser@x.com", "password": "anything"})),
        )
        .await;
        assert_eq!(unknown_status, wrong_status);
        assert_eq!(unknown_body, wrong_body);

        // correct login
        let (status, body) = send(
            &app,
            post_json("/api/auth/login", json!({"email": "a@x.com", "password": "Secret1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(!token_of(&body).is_empty());
    }

    #[tokio::test]
    async fn responses_never_leak_password_or_hash() {
        let state = AppState::fake();
        let app = build_app(state.clone());

        let mut bodies = vec![send(&app, alice_signup()).await.1];
        bodies.push(send(&app, alice_signup()).await.1);
        bodies.push(
            send(
                &app,
                post_json("/api/auth/login", json!({"email": "a@x.com", "password": "Secret1"})),
            )
            .await
            .1,
        );
        bodies.push(
            send(
                &app,
                post_json("/api/auth/login", json!({"email": "a@x.com", "password": "nope"})),
            )
            .await
            .1,
        );

        let hash = state.users.find_by_email("a@x.com").await.unwrap().unwrap().password_hash;
        for body in bodies {
            assert!(!body.contains("Secret1"));
            assert!(!body.contains(&hash));
            assert!(!body.contains("argon2"));
        }
    }

    #[tokio::test]
    async fn missing_field_and_malformed_json_are_bad_requests() {
        let app = build_app(AppState::fake());

        let (status, body) = send(
            &app,
            post_json("/api/auth/signup", json!({"username": "alice", "password": "Secret1"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("email is required"));

        let req = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(serde_json::from_str::<Value>(&body).unwrap()["message"].is_string());
    }

    #[tokio::test]
    async fn mistyped_body_does_not_echo_submitted_values() {
        let app = build_app(AppState::fake());

        for uri in ["/api/auth/login", "/api/auth/signup"] {
            let (status, body) = send(
                &app,
                post_json(uri, json!({"username": "alice", "email": "a@x.com", "password": 987654321})),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(!body.contains("987654321"));
            assert_eq!(
                serde_json::from_str::<Value>(&body).unwrap(),
                json!({"message": "Invalid request body"})
            );
        }
    }

    #[tokio::test]
    async fn auth_routes_are_rate_limited_per_peer() {
        let app = build_app(AppState::fake_with(|cfg| cfg.rate_limit.max_requests = 2));
        let login_from = |ip: [u8; 4]| {
            let mut req = post_json("/api/auth/login", json!({"email": "a@x.com", "password": "x"}));
            req.extensions_mut()
                .insert(ConnectInfo(SocketAddr::from((ip, 40000))));
            req
        };

        assert_eq!(send(&app, login_from([10, 0, 0, 1])).await.0, StatusCode::BAD_REQUEST);
        assert_eq!(send(&app, login_from([10, 0, 0, 1])).await.0, StatusCode::BAD_REQUEST);
        let (status, body) = send(&app, login_from([10, 0, 0, 1])).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body.contains("Too many requests"));

        assert_eq!(send(&app, login_from([10, 0, 0, 2])).await.0, StatusCode::BAD_REQUEST);

        let health = Request::builder().uri("/health").body(Body::empty()).unwrap();
        assert_eq!(send(&app, health).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn homepage_and_security_headers() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(res.headers()[header::X_FRAME_OPTIONS], "SAMEORIGIN");
        let body = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"homepage");
    }

    #[tokio::test]
    async fn cors_allows_configured_client_with_credentials() {
        let app = build_app(AppState::fake_with(|cfg| {
            cfg.client_url = Some("http://localhost:5173".into())
        }));
        let preflight = Request::builder()
            .method("OPTIONS")
            .uri("/api/auth/login")
            .header(header::ORIGIN, "http://localhost:5173")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(preflight).await.unwrap();
        assert_eq!(
            res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:5173"
        );
        assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }
}
