use std::fs;

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use scholar_portal::{build_with, portal_config};

const SECRET: &str = "portal-test-secret-with-enough-length";

fn seed() -> Value {
    json!({
        "tenants": [
            {"id": "t1", "name": "Riverside Trust", "code": "RVT", "status": "active", "plan": "premium"}
        ],
        "tenant_users": [
            {"id": "a1", "user_id": "admin-1", "tenant_id": "t1", "role": "school_admin",
             "permissions": [], "is_active": true}
        ],
        "schools": [
            {"id": "s1", "tenant_id": "t1", "name": "Riverside Primary", "code": "RP", "is_default": true},
            {"id": "s2", "tenant_id": "t1", "name": "Riverside High", "code": "RH", "is_default": false}
        ],
        "classes": [
            {"id": "c-old", "name": "Grade 5", "school_id": "s2"}
        ]
    })
}

async fn portal(dir: &TempDir) -> Router {
    let seed_path = dir.path().join("seed.json");
    fs::write(&seed_path, seed().to_string()).unwrap();

    let vars = vec![
        ("SCHOLAR__GATEWAY__SEED_PATH".to_string(), seed_path.display().to_string()),
        (
            "SCHOLAR__STORAGE__PATH".to_string(),
            dir.path().join("session.json").display().to_string(),
        ),
        ("SCHOLAR__AUTH__JWT_SECRET".to_string(), SECRET.to_string()),
    ];
    build_with(portal_config(vars)).await.unwrap().into_router()
}

fn token(sub: &str) -> String {
    let claims = json!({"sub": sub, "exp": chrono::Utc::now().timestamp() + 600, "user_role": "school_admin"});
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (u16, Value) {
    let req = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) => req
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let res = router.clone().oneshot(req).await.unwrap();
    let status = res.status().as_u16();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn school_admin_manages_classes_in_the_default_school() {
    let dir = TempDir::new().unwrap();
    let router = portal(&dir).await;

    let (status, body) = call(&router, "GET", "/session/school", None).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"schoolId": "s1"}));

    let (status, body) = call(&router, "PUT", "/session", Some(json!({"accessToken": token("admin-1")}))).await;
    assert_eq!(status, 200);
    assert_eq!(body["tenant"]["code"], "RVT");

    let (status, created) = call(&router, "POST", "/classes", Some(json!({"name": "Grade 1", "section": "A"}))).await;
    assert_eq!(status, 200);
    assert_eq!(created["school_id"], "s1");

    let (_, rows) = call(&router, "GET", "/classes", None).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["name"], "Grade 1");

    let (status, body) = call(&router, "GET", "/dashboard/summary", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["schoolId"], "s1");
    assert_eq!(body["classes"], 1);
    assert_eq!(body["lessons"], 0);
}

#[tokio::test]
async fn lessons_round_trip_with_chapters_over_http() {
    let dir = TempDir::new().unwrap();
    let router = portal(&dir).await;
    call(&router, "PUT", "/session", Some(json!({"accessToken": token("admin-1")}))).await;

    let (status, lesson) = call(
        &router,
        "POST",
        "/lessons",
        Some(json!({
            "name": "Plants",
            "class_id": "c-old",
            "chapters": [
                {"title": "Roots", "position": 2},
                {"title": "Seeds", "position": 1}
            ]
        })),
    )
    .await;
    assert_eq!(status, 200);
    let id = lesson["id"].as_str().unwrap().to_string();

    let (_, fetched) = call(&router, "GET", &format!("/lessons/{id}"), None).await;
    assert_eq!(fetched["chapters"][0]["title"], "Seeds");
    assert_eq!(fetched["chapters"][1]["title"], "Roots");

    let (status, body) = call(
        &router,
        "PATCH",
        &format!("/lessons/{id}"),
        Some(json!({"chapters": [{"title": "", "position": 1}]})),
    )
    .await;
    assert_eq!(status, 422);
    assert_eq!(body["errors"]["chapters[0].title"][0], "title must be 1-150 characters");

    let (status, _) = call(&router, "DELETE", &format!("/lessons/{id}"), None).await;
    assert_eq!(status, 200);
    let (status, _) = call(&router, "GET", &format!("/lessons/{id}"), None).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn clearing_the_school_blocks_creates_and_is_persisted() {
    let dir = TempDir::new().unwrap();
    let router = portal(&dir).await;
    call(&router, "PUT", "/session", Some(json!({"accessToken": token("admin-1")}))).await;

    let (status, body) = call(&router, "PUT", "/session/school", Some(json!({"schoolId": null}))).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"schoolId": null}));

    let stored = fs::read_to_string(dir.path().join("session.json")).unwrap();
    assert!(!stored.contains("currentSchoolId"));

    let (status, body) = call(&router, "POST", "/mediums", Some(json!({"name": "English"}))).await;
    assert_eq!(status, 400);
    assert_eq!(body["message"], "No school selected");

    let (status, body) = call(
        &router,
        "POST",
        "/mediums",
        Some(json!({"name": "English", "school_id": "s2"})),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["school_id"], "s2");
}

#[tokio::test]
async fn unassigned_users_are_forbidden() {
    let dir = TempDir::new().unwrap();
    let router = portal(&dir).await;

    let (status, body) = call(&router, "PUT", "/session", Some(json!({"accessToken": token("stranger")}))).await;
    assert_eq!(status, 200);
    assert_eq!(body["tenant"], Value::Null);
    assert_eq!(body["error"], "No tenant assigned to user");

    let (status, body) = call(&router, "GET", "/routes", None).await;
    assert_eq!(status, 403);
    assert_eq!(body["message"], "No tenant assigned to user");
}
