use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use cinebook_api::{app, AppState};
use cinebook_booking::SessionConfig;
use cinebook_core::models::Role;
use cinebook_core::token::{JwtMaker, TokenMaker};
use cinebook_store::MemoryStore;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

const KEY: &str = "abcdefghijklmnopqrstuvwxyz012345";

struct TestApp {
    router: Router,
    tokens: Arc<JwtMaker>,
}

impl TestApp {
    fn new() -> Self {
        let tokens = Arc::new(JwtMaker::new(KEY).unwrap());
        let state = AppState::in_memory(
            MemoryStore::seeded(),
            tokens.clone(),
            SessionConfig {
                access_token_duration: Duration::minutes(15),
                refresh_token_duration: Duration::hours(24),
            },
            StdDuration::from_secs(5),
        );
        Self {
            router: app(state),
            tokens,
        }
    }

    fn token_for(&self, user_id: i64, role: Role) -> String {
        let (token, _) = self
            .tokens
            .create_token(&format!("user{user_id}"), user_id, role, Duration::minutes(15))
            .unwrap();
        token
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Movie plus a showtime tomorrow; returns the showtime id.
    async fn create_showtime(&self) -> i64 {
        let admin = self.token_for(1, Role::Admin);
        let (status, movie) = self
            .send(
                Method::POST,
                "/movies",
                Some(&admin),
                Some(json!({
                    "title": "Movie qwert",
                    "description": "This is a description about qwertyuiop.",
                    "genre_id": 1
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, showtime) = self
            .send(
                Method::POST,
                "/showtimes",
                Some(&admin),
                Some(json!({
                    "movie_id": movie["movie_id"],
                    "start_time": (Utc::now() + Duration::days(1)).to_rfc3339(),
                    "price_cents": 1250
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        showtime["showtime_id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn test_signup_login_and_renew_flow() {
    let app = TestApp::new();

    let (status, user) = app
        .send(
            Method::POST,
            "/users",
            None,
            Some(json!({
                "name": "Ada Lovelace",
                "username": "ada",
                "email": "ada@email.com",
                "password": "secret123"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["role"], "customer");
    assert!(user.get("hashed_password").is_none());

    let (status, _) = app
        .send(
            Method::POST,
            "/users/login",
            None,
            Some(json!({ "email": "ada@email.com", "password": "wrong-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, login) = app
        .send(
            Method::POST,
            "/users/login",
            None,
            Some(json!({ "email": "ada@email.com", "password": "secret123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["user"]["username"], "ada");
    let access = login["access_token"].as_str().unwrap().to_string();
    let refresh = login["refresh_token"].as_str().unwrap().to_string();

    let user_uri = format!("/users/{}", user["user_id"]);
    let (status, fetched) = app.send(Method::GET, &user_uri, Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["email"], "ada@email.com");

    let (status, renewed) = app
        .send(
            Method::POST,
            "/tokens/renew_access",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let renewed_access = renewed["access_token"].as_str().unwrap();
    let (status, _) = app.send(Method::GET, &user_uri, Some(renewed_access), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(
            Method::POST,
            "/tokens/renew_access",
            None,
            Some(json!({ "refresh_token": access })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_signup_conflicts() {
    let app = TestApp::new();
    let body = json!({
        "name": "Bob",
        "username": "bob",
        "email": "bob@email.com",
        "password": "secret123"
    });

    let (status, _) = app.send(Method::POST, "/users", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.send(Method::POST, "/users", None, Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_authentication_and_roles() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/reservations", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = app
        .send(Method::GET, "/reservations", Some("not-a-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let other = JwtMaker::new("zyxwvutsrqponmlkjihgfedcba543210").unwrap();
    let (foreign, _) = other
        .create_token("eve", 9, Role::Admin, Duration::minutes(5))
        .unwrap();
    let (status, _) = app.send(Method::GET, "/reservations", Some(&foreign), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let customer = app.token_for(2, Role::Customer);
    let (status, _) = app
        .send(
            Method::POST,
            "/movies",
            Some(&customer),
            Some(json!({ "title": "x", "description": "y", "genre_id": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, genres) = app.send(Method::GET, "/genres", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(genres.as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn test_reservation_flow() {
    let app = TestApp::new();
    let showtime_id = app.create_showtime().await;
    let alice = app.token_for(10, Role::Customer);
    let bob = app.token_for(11, Role::Customer);

    let (status, body) = app
        .send(
            Method::POST,
            "/reservations",
            Some(&alice),
            Some(json!({ "showtime_id": showtime_id, "seat_ids": [5, 6, 7] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let reservations = body["reservations"].as_array().unwrap();
    let seats: Vec<i64> = reservations
        .iter()
        .map(|r| r["seat_id"].as_i64().unwrap())
        .collect();
    assert_eq!(seats, vec![5, 6, 7]);
    let first_id = reservations[0]["reservation_id"].as_i64().unwrap();

    let (status, _) = app
        .send(
            Method::POST,
            "/reservations",
            Some(&bob),
            Some(json!({ "showtime_id": showtime_id, "seat_ids": [8, 7] })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, seat_map) = app
        .send(Method::GET, &format!("/showtimes/{showtime_id}/seats"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let reserved: Vec<i64> = seat_map["1"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|s| s["is_reserved"] == true)
        .map(|s| s["seat_id"].as_i64().unwrap())
        .collect();
    assert_eq!(reserved, vec![5, 6, 7]);
    assert_eq!(seat_map.as_object().unwrap().len(), 5);

    let (status, mine) = app.send(Method::GET, "/reservations", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 3);
    let (_, theirs) = app.send(Method::GET, "/reservations", Some(&bob), None).await;
    assert!(theirs.as_array().unwrap().is_empty());

    let cancel_uri = format!("/reservations/{first_id}");
    let (status, _) = app.send(Method::DELETE, &cancel_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.send(Method::DELETE, &cancel_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send(Method::DELETE, &cancel_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(
            Method::POST,
            "/reservations",
            Some(&bob),
            Some(json!({ "showtime_id": showtime_id, "seat_ids": [5] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_reservation_request_validation() {
    let app = TestApp::new();
    let showtime_id = app.create_showtime().await;
    let alice = app.token_for(10, Role::Customer);

    for seat_ids in [json!([]), json!([3, 4, 3]), json!([0])] {
        let (status, _) = app
            .send(
                Method::POST,
                "/reservations",
                Some(&alice),
                Some(json!({ "showtime_id": showtime_id, "seat_ids": seat_ids })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, _) = app
        .send(
            Method::POST,
            "/reservations",
            Some(&alice),
            Some(json!({ "showtime_id": 999, "seat_ids": [1] })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_catalog_management() {
    let app = TestApp::new();
    let admin = app.token_for(1, Role::Admin);
    let showtime_id = app.create_showtime().await;

    let (status, _) = app
        .send(
            Method::POST,
            "/showtimes",
            Some(&admin),
            Some(json!({
                "movie_id": 1,
                "start_time": (Utc::now() - Duration::hours(1)).to_rfc3339(),
                "price_cents": 1000
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            Method::POST,
            "/movies",
            Some(&admin),
            Some(json!({ "title": "Orphan", "description": "no genre", "genre_id": 77 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, movies) = app.send(Method::GET, "/movies?page=1&limit=10", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(movies.as_array().unwrap().len(), 1);
    let (status, _) = app.send(Method::GET, "/movies?limit=500", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, upcoming) = app.send(Method::GET, "/showtimes", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(upcoming.as_array().unwrap().len(), 1);
    let (status, _) = app.send(Method::GET, "/showtimes?date=tomorrow", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/showtimes/{showtime_id}");
    let (status, _) = app.send(Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.send(Method::DELETE, "/movies/1", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send(Method::GET, "/movies/1", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_movie_keeps_omitted_fields() {
    let app = TestApp::new();
    let admin = app.token_for(1, Role::Admin);
    app.create_showtime().await;

    let (status, updated) = app
        .send(
            Method::PUT,
            "/movies/1",
            Some(&admin),
            Some(json!({ "title": "Movie zxcvb", "genre_id": 4 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Movie zxcvb");
    assert_eq!(updated["genre_id"], 4);
    assert_eq!(updated["description"], "This is a description about qwertyuiop.");

    let (_, fetched) = app.send(Method::GET, "/movies/1", None, None).await;
    assert_eq!(fetched["title"], "Movie zxcvb");

    let (status, _) = app
        .send(Method::PUT, "/movies/1", Some(&admin), Some(json!({ "genre_id": 77 })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(Method::PUT, "/movies/42", Some(&admin), Some(json!({ "title": "Nope" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let customer = app.token_for(2, Role::Customer);
    let (status, _) = app
        .send(Method::PUT, "/movies/1", Some(&customer), Some(json!({ "title": "Mine" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_malformed_input_gets_json_validation_error() {
    let app = TestApp::new();
    let alice = app.token_for(10, Role::Customer);

    let (status, body) = app
        .send(
            Method::POST,
            "/reservations",
            Some(&alice),
            Some(json!({ "showtime_id": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = app
        .send(Method::DELETE, "/reservations/abc", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = app
        .send(Method::GET, "/movies?page=9223372036854775807&limit=100", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "page out of range");

    let (status, body) = app.send(Method::GET, "/movies?limit=ten", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}
