mod common;

use anyhow::Result;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use serde_json::json;

use common::TestApp;
use rolegate::policy::Role;

const BOUNDARY: &str = "rolegate-test-boundary";

fn multipart_request(token: &str, field: &str, filename: &str, content_type: &str, data: &[u8]) -> Result<Request<Body>> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Ok(Request::builder()
        .method(Method::POST)
        .uri("/users/me/profile-pic")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))?)
}

#[tokio::test]
async fn me_returns_profile_without_secrets() -> Result<()> {
    let app = TestApp::new();
    let user = app.seed("me@example.com", Role::StandardUser).await?;

    let res = app.get("/users/me", Some(&app.token_for(&user))).await?;
    assert_eq!(res.status, StatusCode::OK);
    let data = &res.body["data"];
    assert_eq!(data["id"], user.id);
    assert_eq!(data["role"], "standard_user");
    assert!(data.get("password_hash").is_none());
    Ok(())
}

#[tokio::test]
async fn self_update_cannot_touch_activation_or_role() -> Result<()> {
    let app = TestApp::new();
    let user = app.seed("me@example.com", Role::StandardUser).await?;
    let token = app.token_for(&user);

    let res = app
        .put(
            "/users/me",
            Some(&token),
            json!({ "first_name": "Maya", "is_active": false, "role": "super_admin" }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["first_name"], "Maya");
    assert_eq!(res.body["data"]["is_active"], true);
    assert_eq!(res.body["data"]["role"], "standard_user");

    // The token keeps working after the update.
    let res = app.get("/users/me", Some(&token)).await?;
    assert_eq!(res.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn self_update_validates_email() -> Result<()> {
    let app = TestApp::new();
    app.seed("other@example.com", Role::StandardUser).await?;
    let user = app.seed("me@example.com", Role::StandardUser).await?;
    let token = app.token_for(&user);

    let res = app.put("/users/me", Some(&token), json!({ "email": "Other@example.com" })).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "Email already registered");

    let res = app.put("/users/me", Some(&token), json!({ "email": "broken" })).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "Invalid email format");

    let res = app.put("/users/me", Some(&token), json!({ "email": "renamed@example.com" })).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["email"], "renamed@example.com");
    Ok(())
}

#[tokio::test]
async fn data_url_picture_is_stored() -> Result<()> {
    let app = TestApp::new();
    let user = app.seed("me@example.com", Role::StandardUser).await?;
    let token = app.token_for(&user);

    let res = app
        .put(
            "/users/me",
            Some(&token),
            json!({ "profile_pic": "data:image/gif;base64,R0lGODlhAQABAAAAACw=" }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    let path = res.body["data"]["profile_pic"].as_str().unwrap_or_default().to_string();
    assert!(path.starts_with(&format!("/static/profile_pics/profile_{}_", user.id)));
    assert!(path.ends_with(".gif"));

    let filename = path.trim_start_matches("/static/profile_pics/");
    assert!(app.pictures.path().join(filename).exists());

    let res = app
        .put("/users/me", Some(&token), json!({ "profile_pic": "data:image/png;base64,***" }))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "Invalid image data");
    Ok(())
}

#[tokio::test]
async fn multipart_upload_requires_image() -> Result<()> {
    let app = TestApp::new();
    let user = app.seed("me@example.com", Role::StandardUser).await?;
    let token = app.token_for(&user);

    let res = app
        .send(multipart_request(&token, "file", "notes.txt", "text/plain", b"hello")?)
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "Invalid image file");

    let res = app
        .send(multipart_request(&token, "file", "face.png", "image/png", b"\x89PNG")?)
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    let first = res.body["data"]["profile_pic"].as_str().unwrap_or_default().to_string();
    assert!(first.ends_with("_face.png"));

    // A second upload replaces and removes the first file.
    let res = app
        .send(multipart_request(&token, "file", "face2.png", "image/png", b"\x89PNG2")?)
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    let old = first.trim_start_matches("/static/profile_pics/");
    assert!(!app.pictures.path().join(old).exists());

    let res = app
        .send(multipart_request(&token, "avatar", "face.png", "image/png", b"\x89PNG")?)
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn search_is_scoped_by_role() -> Result<()> {
    let app = TestApp::new();
    let root = app.seed("root@corp.io", Role::SuperAdmin).await?;
    let admin = app.seed("admin@corp.io", Role::Admin).await?;
    let user = app.seed("user@corp.io", Role::StandardUser).await?;
    app.seed("other@home.io", Role::StandardUser).await?;

    let res = app.get("/users/search?email=CORP", Some(&app.token_for(&root))).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"].as_array().map(Vec::len), Some(3));

    let res = app.get("/users/search", Some(&app.token_for(&admin))).await?;
    let roles: Vec<&str> = res.body["data"]
        .as_array()
        .map(|users| users.iter().filter_map(|u| u["role"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(roles, vec!["standard_user", "standard_user"]);

    let res = app.get("/users/search?email=io", Some(&app.token_for(&user))).await?;
    let data = res.body["data"].as_array().cloned().unwrap_or_default();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["id"], user.id);
    assert!(data[0].get("is_active").is_none());
    Ok(())
}
