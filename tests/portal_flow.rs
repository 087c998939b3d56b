//! End-to-end checks through the full router: guard, extractors, actions.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use claimdesk::api::{auth::hash_password, create_router};
use claimdesk::config::Config;
use claimdesk::db::{self, NewUser};
use claimdesk::session::{Role, SESSION_COOKIE};
use claimdesk::AppState;

const PASSWORD: &str = "Correct-Horse-42";

struct Portal {
    state: Arc<AppState>,
    router: Router,
    lecturer: String,
    coordinator_one: String,
    coordinator_two: String,
    center_one: String,
    center_two: String,
}

impl Portal {
    async fn new() -> Self {
        let db = db::init_in_memory().await.unwrap();
        let hash = hash_password(PASSWORD).unwrap();
        let mut ids = Vec::new();
        for (email, role) in [
            ("lecturer@test.local", Role::Lecturer),
            ("coord1@test.local", Role::Coordinator),
            ("coord2@test.local", Role::Coordinator),
        ] {
            let user = db::insert_user(
                &db,
                &NewUser {
                    name: email,
                    email,
                    password_hash: &hash,
                    role,
                },
            )
            .await
            .unwrap();
            ids.push(user.id);
        }
        let (lecturer, coordinator_one, coordinator_two) =
            (ids[0].clone(), ids[1].clone(), ids[2].clone());

        let center_one = db::insert_center(&db, "North", Some(&coordinator_one))
            .await
            .unwrap()
            .id;
        let center_two = db::insert_center(&db, "South", Some(&coordinator_two))
            .await
            .unwrap()
            .id;
        db::assign_lecturer(&db, &lecturer, &center_one, None)
            .await
            .unwrap();

        let state = Arc::new(AppState::new(Config::default(), db).unwrap());
        let router = create_router(state.clone());
        Self {
            state,
            router,
            lecturer,
            coordinator_one,
            coordinator_two,
            center_one,
            center_two,
        }
    }

    fn cookie_for(&self, user_id: &str, role: Role) -> String {
        let session = self.state.sessions.issue(user_id, role, None);
        format!("{}={}", SESSION_COOKIE, self.state.sessions.encode(&session))
    }

    async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, cookie: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn location(response: &axum::response::Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

fn set_cookies(response: &axum::response::Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn teaching_claim(center_id: &str) -> Value {
    json!({
        "claimType": "TEACHING",
        "centerId": center_id,
        "details": {
            "course_code": "CS 101",
            "course_title": "Intro to Computing",
            "teaching_date": "2026-03-02",
            "contact_hours": 3.0,
            "hourly_rate": 50.0
        }
    })
}

#[tokio::test]
async fn login_sets_signed_cookie_and_lands_by_role() {
    let portal = Portal::new().await;
    let request = Request::builder()
        .method("POST")
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!(
            "email=COORD1%40test.local&password={}",
            PASSWORD
        )))
        .unwrap();

    let response = portal.send(request).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/coordinator");
    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("app_session=") && c.contains("HttpOnly")));
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let portal = Portal::new().await;
    let request = Request::builder()
        .method("POST")
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("email=coord1%40test.local&password=nope"))
        .unwrap();

    let response = portal.send(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&response).is_empty());
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn protected_page_without_cookie_redirects_to_login() {
    let portal = Portal::new().await;
    let response = portal.send(get("/dashboard", None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert!(set_cookies(&response).is_empty());
}

#[tokio::test]
async fn malformed_cookie_redirects_and_is_cleared() {
    let portal = Portal::new().await;
    let forged = format!(r#"{}={{"userId":"x","role":"REGISTRY"}}"#, SESSION_COOKIE);
    let response = portal.send(get("/registry", Some(&forged))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert!(set_cookies(&response)
        .iter()
        .any(|c| c.starts_with("app_session=;") && c.contains("Max-Age=0")));
}

#[tokio::test]
async fn signed_in_user_on_login_page_goes_to_dashboard() {
    let portal = Portal::new().await;
    let cookie = portal.cookie_for(&portal.lecturer, Role::Lecturer);
    let response = portal.send(get("/login", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");

    let response = portal.send(get("/login", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn wrong_role_page_redirects_to_dashboard() {
    let portal = Portal::new().await;
    let cookie = portal.cookie_for(&portal.lecturer, Role::Lecturer);
    let response = portal.send(get("/registry", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");

    // Another coordinator's center looks the same as a missing one
    let cookie = portal.cookie_for(&portal.coordinator_two, Role::Coordinator);
    let uri = format!("/coordinator/{}", portal.center_one);
    let response = portal.send(get(&uri, Some(&cookie))).await;
    assert_eq!(location(&response), "/dashboard");
    let response = portal.send(get("/coordinator/missing", Some(&cookie))).await;
    assert_eq!(location(&response), "/dashboard");
}

#[tokio::test]
async fn me_reports_user_or_401() {
    let portal = Portal::new().await;
    let response = portal.send(get("/api/user/me", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let cookie = portal.cookie_for(&portal.lecturer, Role::Lecturer);
    let response = portal.send(get("/api/user/me", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["email"], "lecturer@test.local");
    assert_eq!(body["role"], "LECTURER");

    let ghost = portal.cookie_for("deleted-user", Role::Lecturer);
    let response = portal.send(get("/api/user/me", Some(&ghost))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(!set_cookies(&response).is_empty());
}

#[tokio::test]
async fn claim_lifecycle_through_router() {
    let portal = Portal::new().await;
    let lecturer = portal.cookie_for(&portal.lecturer, Role::Lecturer);
    let owner = portal.cookie_for(&portal.coordinator_one, Role::Coordinator);
    let outsider = portal.cookie_for(&portal.coordinator_two, Role::Coordinator);

    // Client-sent center is ignored
    let response = portal
        .send(post_json(
            "/lecturer/claims",
            &lecturer,
            teaching_claim(&portal.center_two),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "PENDING");
    assert_eq!(body["data"]["center_id"], portal.center_one.as_str());
    assert_eq!(body["data"]["amount"], 150.0);
    let claim_id = body["data"]["id"].as_str().unwrap().to_string();

    // Center list shows it to the owner only
    let list_uri = format!("/coordinator/{}/claims?status=pending", portal.center_one);
    let response = portal.send(get(&list_uri, Some(&owner))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["claims"].as_array().unwrap().len(), 1);

    // Outsider cannot approve, claim unchanged
    let approve_uri = format!(
        "/coordinator/{}/claims/{}/approve",
        portal.center_one, claim_id
    );
    let response = portal.send(post_json(&approve_uri, &outsider, json!({}))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["success"], false);

    // Owner approves once
    let response = portal.send(post_json(&approve_uri, &owner, json!({}))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["status"], "APPROVED");
    let processed_at = body["data"]["processed_at"].clone();

    let response = portal.send(post_json(&approve_uri, &owner, json!({}))).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let reject_uri = format!(
        "/coordinator/{}/claims/{}/reject",
        portal.center_one, claim_id
    );
    let response = portal
        .send(post_json(&reject_uri, &owner, json!({ "reason": "late" })))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Lecturer sees the decision; the cached pending list was invalidated
    let detail_uri = format!("/lecturer/claims/{}", claim_id);
    let response = portal.send(get(&detail_uri, Some(&lecturer))).await;
    let body = json_body(response).await;
    assert_eq!(body["claim"]["status"], "APPROVED");
    assert_eq!(body["claim"]["processed_at"], processed_at);

    let response = portal.send(get(&list_uri, Some(&owner))).await;
    let body = json_body(response).await;
    assert!(body["claims"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_claim_payload_is_a_failure_result() {
    let portal = Portal::new().await;
    let lecturer = portal.cookie_for(&portal.lecturer, Role::Lecturer);

    let mut claim = teaching_claim(&portal.center_one);
    claim["details"]["contact_hours"] = json!(30);
    let response = portal.send(post_json("/lecturer/claims", &lecturer, claim)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Contact hours must not exceed 24");

    let mut claim = teaching_claim(&portal.center_one);
    claim["details"]["debug"] = json!(true);
    let response = portal.send(post_json("/lecturer/claims", &lecturer, claim)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_reject_body_leaves_claim_pending() {
    let portal = Portal::new().await;
    let lecturer = portal.cookie_for(&portal.lecturer, Role::Lecturer);
    let owner = portal.cookie_for(&portal.coordinator_one, Role::Coordinator);

    let response = portal
        .send(post_json(
            "/lecturer/claims",
            &lecturer,
            teaching_claim(&portal.center_one),
        ))
        .await;
    let claim_id = json_body(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();
    let reject_uri = format!(
        "/coordinator/{}/claims/{}/reject",
        portal.center_one, claim_id
    );

    for body in [
        json!({ "reason": 123, "reson": "typo" }),
        json!({ "reson": "typo" }),
        json!({ "reason": ["late"] }),
    ] {
        let response = portal.send(post_json(&reject_uri, &owner, body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "validation_error");
        assert!(body["details"]["reason"].is_array());
    }

    let detail_uri = format!("/lecturer/claims/{}", claim_id);
    let response = portal.send(get(&detail_uri, Some(&lecturer))).await;
    assert_eq!(json_body(response).await["claim"]["status"], "PENDING");

    // An empty body is a reject without a reason
    let request = Request::builder()
        .method("POST")
        .uri(&reject_uri)
        .header(header::COOKIE, &owner)
        .body(Body::empty())
        .unwrap();
    let response = portal.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["data"]["status"], "REJECTED");
}

#[tokio::test]
async fn body_rejections_use_the_failure_envelope() {
    let portal = Portal::new().await;
    let lecturer = portal.cookie_for(&portal.lecturer, Role::Lecturer);

    let mut claim = teaching_claim(&portal.center_one);
    claim["debug"] = json!(true);
    let response = portal.send(post_json("/lecturer/claims", &lecturer, claim)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "validation_error");
    assert!(body["message"].as_str().unwrap().contains("debug"));

    let request = Request::builder()
        .method("POST")
        .uri("/lecturer/claims")
        .header(header::COOKIE, &lecturer)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"claimType\": "))
        .unwrap();
    let response = portal.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["success"], false);

    // Form endpoints too
    let request = Request::builder()
        .method("POST")
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("email=someone%40test.local"))
        .unwrap();
    let response = portal.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "validation_error");
}
