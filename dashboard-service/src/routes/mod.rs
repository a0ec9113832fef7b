pub mod admin;
pub mod alerts;
pub mod analytics;
pub mod auth;
pub mod dashboard;
pub mod export;
pub mod health;
pub mod meters;
pub mod params;
pub mod reports;
pub mod settings;
pub mod stream;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, IF_NONE_MATCH};
use axum::http::{HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(origin = %o, error = %e, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, IF_NONE_MATCH])
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.http.cors_allowed_origins);

    Router::new()
        .merge(health::router())
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(meters::router())
                .merge(dashboard::router())
                .merge(alerts::router())
                .merge(analytics::router())
                .merge(reports::router())
                .merge(export::router())
                .merge(stream::router())
                .merge(settings::router())
                .merge(admin::router()),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header::{CONTENT_DISPOSITION, ETAG};
    use axum::http::{HeaderMap, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::test_support::{
        test_state, ADMIN_EMAIL, ADMIN_PASSWORD, USER_EMAIL, USER_PASSWORD,
    };

    struct Reply {
        status: StatusCode,
        headers: HeaderMap,
        body: Vec<u8>,
    }

    impl Reply {
        fn json(&self) -> Value {
            serde_json::from_slice(&self.body).unwrap()
        }

        fn text(&self) -> String {
            String::from_utf8(self.body.clone()).unwrap()
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> Reply {
        let resp = app.clone().oneshot(request).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        Reply { status, headers, body }
    }

    fn get(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    fn with_json(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn login(app: &Router, email: &str, password: &str) -> String {
        let reply = send(
            app,
            with_json(
                "POST",
                "/api/auth/login",
                None,
                json!({"email": email, "password": password}),
            ),
        )
        .await;
        assert_eq!(reply.status, StatusCode::OK, "login failed: {}", reply.text());
        reply.json()["token"].as_str().unwrap().to_string()
    }

    fn app() -> Router {
        router(test_state())
    }

    #[tokio::test]
    async fn healthz_needs_no_session() {
        let app = app();
        let reply = send(
            &app,
            Request::builder().uri("/healthz").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.json()["status"], "ok");
    }

    #[tokio::test]
    async fn data_endpoints_require_a_session() {
        let app = app();
        for uri in ["/api/meters", "/api/dashboard/stats", "/api/alerts", "/api/settings"] {
            let reply = send(&app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await;
            assert_eq!(reply.status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(reply.json()["error"], "Missing or invalid token");
        }

        let reply = send(&app, get("/api/meters", "not-a-token")).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_me_and_logout() {
        let app = app();
        let token = login(&app, "  Admin@Example.com ", ADMIN_PASSWORD).await;

        let me = send(&app, get("/api/auth/me", &token)).await;
        assert_eq!(me.status, StatusCode::OK);
        assert_eq!(me.json()["email"], ADMIN_EMAIL);
        assert_eq!(me.json()["role"], "admin");

        let logout = send(
            &app,
            with_json("POST", "/api/auth/logout", Some(&token), json!({})),
        )
        .await;
        assert_eq!(logout.status, StatusCode::NO_CONTENT);

        let after = send(&app, get("/api/auth/me", &token)).await;
        assert_eq!(after.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let app = app();
        let reply = send(
            &app,
            with_json(
                "POST",
                "/api/auth/login",
                None,
                json!({"email": ADMIN_EMAIL, "password": "nope"}),
            ),
        )
        .await;

        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
        assert_eq!(reply.json()["error"], "Invalid credentials");

        let unknown = send(
            &app,
            with_json(
                "POST",
                "/api/auth/login",
                None,
                json!({"email": "ghost@example.com", "password": "whatever"}),
            ),
        )
        .await;
        assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn meters_carry_names_and_status() {
        let app = app();
        let token = login(&app, USER_EMAIL, USER_PASSWORD).await;

        let reply = send(&app, get("/api/meters", &token)).await;
        assert_eq!(reply.status, StatusCode::OK);
        let meters = reply.json();
        let meters = meters.as_array().unwrap();

        assert_eq!(meters.len(), 3);
        assert_eq!(meters[0]["id"], "MTR-001");
        assert_eq!(meters[0]["name"], "Main Building");
        assert_eq!(meters[0]["status"], "active");
        assert_eq!(meters[0]["reading_count"], 11);
        assert_eq!(meters[1]["name"], "Meter MTR-002");
        assert_eq!(meters[2]["status"], "inactive");
    }

    #[tokio::test]
    async fn latest_reading_supports_etags() {
        let app = app();
        let token = login(&app, USER_EMAIL, USER_PASSWORD).await;

        let missing = send(&app, get("/api/meters/MTR-404/latest", &token)).await;
        assert_eq!(missing.status, StatusCode::NOT_FOUND);

        let first = send(&app, get("/api/meters/MTR-001/latest", &token)).await;
        assert_eq!(first.status, StatusCode::OK);
        assert_eq!(first.json()["meter_id"], "MTR-001");
        assert_eq!(first.json()["timestamp"], "2024-03-15T11:55:00Z");
        let etag = first.headers.get(ETAG).unwrap().to_str().unwrap().to_string();

        let mut request = get("/api/meters/MTR-001/latest", &token);
        request
            .headers_mut()
            .insert("if-none-match", etag.parse().unwrap());
        let second = send(&app, request).await;
        assert_eq!(second.status, StatusCode::NOT_MODIFIED);
        assert!(second.body.is_empty());
    }

    #[tokio::test]
    async fn readings_are_newest_first_and_limited() {
        let app = app();
        let token = login(&app, USER_EMAIL, USER_PASSWORD).await;

        let reply = send(&app, get("/api/meters/MTR-001/readings?limit=2", &token)).await;
        assert_eq!(reply.status, StatusCode::OK);
        let rows = reply.json();
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["timestamp"], "2024-03-15T11:55:00Z");
        assert_eq!(rows[1]["timestamp"], "2024-03-14T12:00:00Z");

        let ranged = send(
            &app,
            get(
                "/api/meters/MTR-001/readings?startDate=2024-03-05&endDate=2024-03-06",
                &token,
            ),
        )
        .await;
        assert_eq!(ranged.json().as_array().unwrap().len(), 2);

        let bad = send(
            &app,
            get("/api/meters/MTR-001/readings?startDate=yesterday&endDate=today", &token),
        )
        .await;
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn dashboard_stats_cover_every_meter() {
        let app = app();
        let token = login(&app, USER_EMAIL, USER_PASSWORD).await;

        let reply = send(&app, get("/api/dashboard/stats", &token)).await;
        assert_eq!(reply.status, StatusCode::OK);
        let stats = reply.json();

        assert_eq!(stats["meter_count"], 3);
        assert_eq!(stats["total_power"], 60_170.0);
        assert_eq!(stats["top_meters"][0]["meter_id"], "MTR-002");
        assert_eq!(stats["top_meters"][1]["name"], "Main Building");
        assert!(!stats["historical_data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn alerts_are_derived_and_transitions_persist() {
        let app = app();
        let user = login(&app, USER_EMAIL, USER_PASSWORD).await;
        let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

        let reply = send(&app, get("/api/alerts", &user)).await;
        assert_eq!(reply.status, StatusCode::OK);
        let alerts = reply.json();
        let ids: Vec<&str> = alerts
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["pf_MTR-001", "power_MTR-002", "voltage_MTR-002"]);
        assert_eq!(alerts[1]["type"], "critical");
        assert_eq!(alerts[0]["status"], "active");

        let forbidden = send(
            &app,
            with_json("POST", "/api/alerts/pf_MTR-001/acknowledge", Some(&user), json!({})),
        )
        .await;
        assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

        let acked = send(
            &app,
            with_json("POST", "/api/alerts/pf_MTR-001/acknowledge", Some(&admin), json!({})),
        )
        .await;
        assert_eq!(acked.status, StatusCode::OK);
        assert_eq!(acked.json()["status"], "acknowledged");
        assert_eq!(acked.json()["status_updated_by"], ADMIN_EMAIL);

        let filtered = send(&app, get("/api/alerts?status=acknowledged", &user)).await;
        let filtered = filtered.json();
        assert_eq!(filtered.as_array().unwrap().len(), 1);
        assert_eq!(filtered[0]["id"], "pf_MTR-001");

        let not_firing = send(
            &app,
            with_json("POST", "/api/alerts/pf_MTR-003/resolve", Some(&admin), json!({})),
        )
        .await;
        assert_eq!(not_firing.status, StatusCode::NOT_FOUND);

        let bad_filter = send(&app, get("/api/alerts?status=snoozed", &user)).await;
        assert_eq!(bad_filter.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn forecast_needs_a_meter_and_enough_history() {
        let app = app();
        let token = login(&app, USER_EMAIL, USER_PASSWORD).await;

        let no_meter = send(&app, get("/api/analytics/forecast", &token)).await;
        assert_eq!(no_meter.status, StatusCode::BAD_REQUEST);
        assert_eq!(no_meter.json()["error"], "meterId is required");

        let reply = send(&app, get("/api/analytics/forecast?meterId=MTR-001&days=3", &token)).await;
        assert_eq!(reply.status, StatusCode::OK);
        let body = reply.json();
        assert_eq!(body["forecast_period"], "3 days");
        assert_eq!(body["historical_data_points"], 11);
        assert_eq!(body["points_used"], 11);
        assert_eq!(body["forecast"].as_array().unwrap().len(), 3);
        assert_eq!(body["forecast"][0]["date"], "2024-03-16");
        let confidence = body["forecast"][0]["confidence_level"].as_f64().unwrap();
        assert!((confidence - 0.95).abs() < 1e-9);
        assert_eq!(body["forecast"][0]["trend"], "increasing");

        let short = send(&app, get("/api/analytics/forecast?meterId=MTR-002", &token)).await;
        assert_eq!(short.status, StatusCode::BAD_REQUEST);
        assert_eq!(short.json()["error"], "Insufficient historical data for forecasting");

        let too_far = send(
            &app,
            get("/api/analytics/forecast?meterId=MTR-001&days=400", &token),
        )
        .await;
        assert_eq!(too_far.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reports_cover_summary_consumption_and_comparison() {
        let app = app();
        let token = login(&app, USER_EMAIL, USER_PASSWORD).await;

        let summary = send(&app, get("/api/reports/summary?meterId=MTR-001", &token)).await;
        assert_eq!(summary.status, StatusCode::OK);
        let summary = summary.json();
        assert_eq!(summary["meter_id"], "MTR-001");
        assert_eq!(summary["days"], 30);
        assert_eq!(summary["total_readings"], 11);
        assert_eq!(summary["peak_power"], 190.0);
        assert_eq!(summary["currency"], "USD");

        let hourly = send(
            &app,
            get("/api/reports/consumption?meterId=MTR-001&period=hourly&limit=2", &token),
        )
        .await;
        assert_eq!(hourly.status, StatusCode::OK);
        assert_eq!(hourly.json().as_array().unwrap().len(), 2);

        let weekly = send(
            &app,
            get("/api/reports/consumption?meterId=MTR-001&period=weekly", &token),
        )
        .await;
        assert_eq!(weekly.status, StatusCode::BAD_REQUEST);

        let comparison = send(&app, get("/api/reports/comparison?meterId=MTR-001", &token)).await;
        assert_eq!(comparison.status, StatusCode::OK);
        let rows = comparison.json();
        assert_eq!(rows.as_array().unwrap().len(), 11);
        assert_eq!(rows[0]["period"], "2024-03-15");
        assert_eq!(rows[0]["previous_power"], Value::Null);
    }

    #[tokio::test]
    async fn csv_export_is_an_attachment() {
        let app = app();
        let token = login(&app, USER_EMAIL, USER_PASSWORD).await;

        let reply = send(&app, get("/api/export/csv?meterId=MTR-001", &token)).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.headers.get("content-type").unwrap(), "text/csv");
        assert_eq!(
            reply.headers.get(CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"meter_MTR-001_2024-03-15.csv\""
        );

        let text = reply.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 12);
        assert!(lines[0].starts_with("Meter ID,Timestamp"));
        assert!(lines[1].contains("2024-03-15T11:55:00Z"));

        let no_meter = send(&app, get("/api/export/csv", &token)).await;
        assert_eq!(no_meter.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn settings_are_validated_and_saved() {
        let app = app();
        let token = login(&app, USER_EMAIL, USER_PASSWORD).await;

        let defaults = send(&app, get("/api/settings", &token)).await;
        assert_eq!(defaults.status, StatusCode::OK);
        assert_eq!(defaults.json()["settings"]["theme"], "dark");
        assert_eq!(defaults.json()["billing"]["energy_rate"], 0.15);
        assert_eq!(defaults.json()["alert_thresholds"]["min_power_factor"], 0.85);

        let settings = json!({
            "notifications": false,
            "auto_refresh": true,
            "refresh_interval_seconds": 60,
            "theme": "light",
            "currency": "eur"
        });
        let saved = send(&app, with_json("PUT", "/api/settings", Some(&token), settings)).await;
        assert_eq!(saved.status, StatusCode::OK);
        assert_eq!(saved.json()["settings"]["currency"], "EUR");

        let reread = send(&app, get("/api/settings", &token)).await;
        assert_eq!(reread.json()["settings"]["theme"], "light");
        assert_eq!(reread.json()["settings"]["notifications"], false);

        let invalid = json!({
            "notifications": true,
            "auto_refresh": true,
            "refresh_interval_seconds": 1,
            "theme": "dark",
            "currency": "USD"
        });
        let rejected = send(&app, with_json("PUT", "/api/settings", Some(&token), invalid)).await;
        assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn admins_manage_users() {
        let app = app();
        let user = login(&app, USER_EMAIL, USER_PASSWORD).await;
        let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

        let forbidden = send(&app, get("/api/admin/users", &user)).await;
        assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

        let listed = send(&app, get("/api/admin/users", &admin)).await;
        assert_eq!(listed.status, StatusCode::OK);
        assert_eq!(listed.json().as_array().unwrap().len(), 2);
        assert!(listed.json()[0].get("password_hash").is_none());

        let new_user = json!({
            "email": "ops@example.com",
            "password": "ops-password",
            "role": "user",
            "customerId": "CUST-9"
        });
        let created = send(
            &app,
            with_json("POST", "/api/admin/users", Some(&admin), new_user.clone()),
        )
        .await;
        assert_eq!(created.status, StatusCode::CREATED);
        assert_eq!(created.json()["customer_id"], "CUST-9");

        let duplicate = send(
            &app,
            with_json("POST", "/api/admin/users", Some(&admin), new_user),
        )
        .await;
        assert_eq!(duplicate.status, StatusCode::CONFLICT);

        login(&app, "ops@example.com", "ops-password").await;
    }

    #[tokio::test]
    async fn password_change_requires_the_current_password() {
        let app = app();
        let token = login(&app, USER_EMAIL, USER_PASSWORD).await;
        let other_device = login(&app, USER_EMAIL, USER_PASSWORD).await;

        let wrong = send(
            &app,
            with_json(
                "POST",
                "/api/auth/password",
                Some(&token),
                json!({"currentPassword": "guess", "newPassword": "brand-new-pass"}),
            ),
        )
        .await;
        assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

        let short = send(
            &app,
            with_json(
                "POST",
                "/api/auth/password",
                Some(&token),
                json!({"currentPassword": USER_PASSWORD, "newPassword": "short"}),
            ),
        )
        .await;
        assert_eq!(short.status, StatusCode::BAD_REQUEST);

        let changed = send(
            &app,
            with_json(
                "POST",
                "/api/auth/password",
                Some(&token),
                json!({"currentPassword": USER_PASSWORD, "newPassword": "brand-new-pass"}),
            ),
        )
        .await;
        assert_eq!(changed.status, StatusCode::NO_CONTENT);

        assert_eq!(send(&app, get("/api/auth/me", &token)).await.status, StatusCode::OK);
        assert_eq!(
            send(&app, get("/api/auth/me", &other_device)).await.status,
            StatusCode::UNAUTHORIZED
        );
        login(&app, USER_EMAIL, "brand-new-pass").await;
    }

    #[tokio::test]
    async fn malformed_bodies_get_json_errors() {
        let app = app();
        let truncated = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"email": "a@b.c""#))
            .unwrap();
        let reply = send(&app, truncated).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        let message = reply.json()["error"].as_str().unwrap().to_string();
        assert!(message.contains("JSON"), "{message}");

        let token = login(&app, USER_EMAIL, USER_PASSWORD).await;
        let mistyped = json!({
            "notifications": "yes",
            "auto_refresh": true,
            "refresh_interval_seconds": 30,
            "theme": "dark",
            "currency": "USD"
        });
        let reply = send(&app, with_json("PUT", "/api/settings", Some(&token), mistyped)).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert!(reply.json()["error"].is_string());
    }
}
