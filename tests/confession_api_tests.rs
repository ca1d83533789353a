use actix_web::{test, web, App};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use confesshub::api::{self, AppState};
use confesshub::auth::AuthService;
use confesshub::models::{User, DEFAULT_PICTURE};
use confesshub::store::Store;

fn seed_user(store: &Arc<Store>, email: &str, anonymous_name: &str) -> User {
    let mut user = User {
        id: String::new(),
        google_id: None,
        custom_user_id: format!("USER_{}", email),
        email: email.to_string(),
        username: "poster".to_string(),
        anonymous_name: anonymous_name.to_string(),
        password_hash: None,
        picture: DEFAULT_PICTURE.to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    store.create_user(&mut user).unwrap();
    user
}

#[actix_web::test]
async fn test_create_confession() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));
    let user = seed_user(&store, "alice@test.com", "Night Owl");

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(AppState {
                store: store.clone(),
                auth_service: auth_service.clone(),
            }))
            .configure(api::configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/confessions")
        .set_json(json!({
            "text": "I still sleep with a night light",
            "secretCode": "abcd",
            "userId": user.custom_user_id,
            "category": "Sleep"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["text"], "I still sleep with a night light");
    assert_eq!(body["data"]["category"], "Sleep");
    // the author's anonymous name is snapshotted onto the post
    assert_eq!(body["data"]["anonymousName"], "Night Owl");
    // the secret hash is never serialized
    assert!(body["data"].get("secret_code_hash").is_none());
    assert!(body["data"].get("secretCode").is_none());
    // timestamps use the same camelCase convention as every other field
    assert!(body["data"]["createdAt"].is_string());
    assert!(body["data"]["updatedAt"].is_string());
    assert!(body["data"].get("created_at").is_none());
}

#[actix_web::test]
async fn test_create_confession_defaults() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(AppState {
                store: store.clone(),
                auth_service: auth_service.clone(),
            }))
            .configure(api::configure_routes),
    )
    .await;

    // unknown author: default name, default category
    let req = test::TestRequest::post()
        .uri("/api/confessions")
        .set_json(json!({
            "text": "no profile yet",
            "secretCode": "abcd",
            "userId": "stranger"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["anonymousName"], "Anonymous");
    assert_eq!(body["data"]["category"], "General");
}

#[actix_web::test]
async fn test_create_confession_validation() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(AppState {
                store: store.clone(),
                auth_service: auth_service.clone(),
            }))
            .configure(api::configure_routes),
    )
    .await;

    let cases = [
        json!({ "secretCode": "abcd", "userId": "u" }),
        json!({ "text": "   ", "secretCode": "abcd", "userId": "u" }),
        json!({ "text": "hi", "userId": "u" }),
        json!({ "text": "hi", "secretCode": "abc", "userId": "u" }),
        json!({ "text": "hi", "secretCode": "abcd" }),
        json!({ "text": "x".repeat(1001), "secretCode": "abcd", "userId": "u" }),
    ];

    for case in cases {
        let req = test::TestRequest::post()
            .uri("/api/confessions")
            .set_json(&case)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400, "expected 400 for {}", case);
    }
}

#[actix_web::test]
async fn test_list_confessions_newest_first() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(AppState {
                store: store.clone(),
                auth_service: auth_service.clone(),
            }))
            .configure(api::configure_routes),
    )
    .await;

    for text in ["first", "second"] {
        let req = test::TestRequest::post()
            .uri("/api/confessions")
            .set_json(json!({ "text": text, "secretCode": "abcd", "userId": "u" }))
            .to_request();
        test::call_service(&app, req).await;
        std::thread::sleep(std::time::Duration::from_millis(5));
    }

    let req = test::TestRequest::get().uri("/api/confessions").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["text"], "second");
    assert_eq!(items[1]["text"], "first");
    for item in items {
        assert!(item.get("secret_code_hash").is_none());
    }
}

#[actix_web::test]
async fn test_edit_requires_correct_secret_code() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(AppState {
                store: store.clone(),
                auth_service: auth_service.clone(),
            }))
            .configure(api::configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/confessions")
        .set_json(json!({ "text": "original", "secretCode": "abcd", "userId": "u" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    // wrong code
    let req = test::TestRequest::put()
        .uri(&format!("/api/confessions/{}", id))
        .set_json(json!({ "secretCode": "wxyz", "text": "hijacked" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    let loaded = store.load_confession(&id).unwrap();
    assert_eq!(loaded.confession.text, "original");

    // missing text
    let req = test::TestRequest::put()
        .uri(&format!("/api/confessions/{}", id))
        .set_json(json!({ "secretCode": "abcd", "text": "" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    // correct code
    let req = test::TestRequest::put()
        .uri(&format!("/api/confessions/{}", id))
        .set_json(json!({ "secretCode": "abcd", "text": "edited" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["text"], "edited");
}

#[actix_web::test]
async fn test_edit_enforces_length_cap() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(AppState {
                store: store.clone(),
                auth_service: auth_service.clone(),
            }))
            .configure(api::configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/confessions")
        .set_json(json!({ "text": "short", "secretCode": "abcd", "userId": "u" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    // an edit cannot grow the text past the cap
    let req = test::TestRequest::put()
        .uri(&format!("/api/confessions/{}", id))
        .set_json(json!({ "secretCode": "abcd", "text": "x".repeat(1001) }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let loaded = store.load_confession(&id).unwrap();
    assert_eq!(loaded.confession.text, "short");

    // exactly at the cap is still accepted
    let req = test::TestRequest::put()
        .uri(&format!("/api/confessions/{}", id))
        .set_json(json!({ "secretCode": "abcd", "text": "y".repeat(1000) }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
}

#[actix_web::test]
async fn test_delete_requires_correct_secret_code() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(AppState {
                store: store.clone(),
                auth_service: auth_service.clone(),
            }))
            .configure(api::configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/confessions")
        .set_json(json!({ "text": "short lived", "secretCode": "abcd", "userId": "u" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    // wrong code: still present afterwards
    let req = test::TestRequest::delete()
        .uri(&format!("/api/confessions/{}", id))
        .set_json(json!({ "secretCode": "wxyz" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
    assert!(store.load_confession(&id).is_ok());

    // correct code: removed
    let req = test::TestRequest::delete()
        .uri(&format!("/api/confessions/{}", id))
        .set_json(json!({ "secretCode": "abcd" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert!(store.load_confession(&id).is_err());

    // deleting again is a 404
    let req = test::TestRequest::delete()
        .uri(&format!("/api/confessions/{}", id))
        .set_json(json!({ "secretCode": "abcd" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_get_single_confession() {
    let store = Arc::new(Store::in_memory().unwrap());
    let auth_service = Arc::new(AuthService::new("test_secret".to_string()));

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(AppState {
                store: store.clone(),
                auth_service: auth_service.clone(),
            }))
            .configure(api::configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/confessions")
        .set_json(json!({ "text": "findable", "secretCode": "abcd", "userId": "u" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri(&format!("/api/confessions/{}", id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["text"], "findable");

    let req = test::TestRequest::get()
        .uri("/api/confessions/missing")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}
