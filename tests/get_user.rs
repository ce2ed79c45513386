pub mod common;

use reqwest::StatusCode;
use user_registry::db::user::Id;

#[tokio::test]
async fn retrieves_user_without_password_hash() {
    let app = common::spawn_app().await;
    let root = app.client().auth("root", "rootpw").await;
    let id = root.user_id_by_username("alice").await;

    let (status, body) = root.get_user(id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["email"], "alice@example.com");
    assert_eq!(body["role"], "User");

    let keys = body.as_object().unwrap();
    assert!(!keys.contains_key("password_hash"));
    assert!(!keys.contains_key("passwordHash"));
    assert!(!keys.contains_key("password"));
}

#[tokio::test]
async fn fails_for_unknown_id() {
    let app = common::spawn_app().await;
    let root = app.client().auth("root", "rootpw").await;

    let (status, body) = root.get_user(Id::new()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");
}

#[tokio::test]
async fn treats_malformed_id_as_unknown() {
    let app = common::spawn_app().await;
    let root = app.client().auth("root", "rootpw").await;

    let (status, body) = root.get("/users/unknown-id").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");
}

#[tokio::test]
async fn fails_when_unauthorized() {
    let app = common::spawn_app().await;
    let (status, body) = app.client().get_user(Id::new()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "No token provided");
}
