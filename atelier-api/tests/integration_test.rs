/// Router-level tests
///
/// The first group runs against an unreachable database: it covers every
/// decision taken before the first query (authentication, role checks, link
/// shape, upload validation, headers). The second group needs PostgreSQL and
/// is ignored by default.

#[allow(dead_code)]
mod common;

use atelier_shared::account::{
    CURRENT_EMAIL_CONFIRMED, EMAIL_CHANGED, EMAIL_CHANGE_REQUESTED, INVALID_LINK_MESSAGE,
    PASSWORD_CHANGED,
};
use atelier_shared::models::project_image::ProjectImage;
use atelier_shared::models::user::{User, UserRole};
use axum::http::{header, StatusCode};
use common::{body_bytes, body_json, fixtures, token_from_body, MultipartBuilder, TestApp};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_health_reports_degraded_without_database() {
    let app = TestApp::offline().await;

    let response = app.get("/health", None).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "DENY");

    let body = body_json(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], "disconnected");
}

#[tokio::test]
async fn test_user_area_requires_token() {
    let app = TestApp::offline().await;

    for uri in ["/v1/me", "/v1/me/documents", "/v1/admin/dashboard"] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body_json(response).await["error"], "unauthorized");
    }
}

#[tokio::test]
async fn test_garbage_token_is_rejected() {
    let app = TestApp::offline().await;

    let response = app.get("/v1/me", Some("Bearer not.a.jwt")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.get("/v1/me", Some("Token abc")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_user_role_cannot_reach_admin_area() {
    let app = TestApp::offline().await;
    let token = format!("Bearer {}", app.token_for(Uuid::new_v4(), UserRole::User));

    for uri in [
        "/v1/admin/dashboard",
        "/v1/admin/users",
        "/v1/admin/documents",
        "/v1/admin/projects",
    ] {
        let response = app.get(uri, Some(&token)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", uri);
        assert_eq!(body_json(response).await["error"], "forbidden");
    }
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let app = TestApp::offline().await;
    let access = app.token_for(Uuid::new_v4(), UserRole::User);

    let response = app
        .json("POST", "/v1/auth/refresh", None, json!({ "refresh_token": access }))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_password_change_is_throttled_per_client_ip() {
    let app = TestApp::offline().await;
    let auth = format!("Bearer {}", app.token_for(Uuid::new_v4(), UserRole::User));
    let first: std::net::SocketAddr = "192.0.2.10:40000".parse().unwrap();
    let second: std::net::SocketAddr = "192.0.2.11:40000".parse().unwrap();

    // Within the quota the request reaches the handler (and fails on the database)
    for _ in 0..3 {
        let response = app.json_from(first, "/v1/me/password-change", &auth, json!({})).await;
        assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    let response = app.json_from(first, "/v1/me/password-change", &auth, json!({})).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(body_json(response).await["error"], "rate_limited");

    let response = app.json_from(second, "/v1/me/password-change", &auth, json!({})).await;
    assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_malformed_links_answer_invalid_link() {
    let app = TestApp::offline().await;

    let uris = vec![
        "/v1/account/password/confirm/abc".to_string(),
        "/v1/account/email/confirm-current/abc".to_string(),
        format!("/v1/account/email/confirm-new/{}", "Z".repeat(64)),
    ];
    for uri in &uris {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "no-store, no-cache, must-revalidate, private"
        );

        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid_link");
        assert_eq!(body["message"], INVALID_LINK_MESSAGE);
    }

    let response = app
        .json(
            "POST",
            "/v1/account/password/confirm/abc",
            None,
            json!({ "password": "a new password", "password_confirmation": "a new password" }),
        )
        .await;
    assert_eq!(body_json(response).await["error"], "invalid_link");
}

#[tokio::test]
async fn test_register_validates_before_touching_database() {
    let app = TestApp::offline().await;

    let response = app
        .json(
            "POST",
            "/v1/auth/register",
            None,
            json!({
                "email": "not-an-email",
                "password": common::TEST_PASSWORD,
                "first_name": "Camille",
                "last_name": "Durand"
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["details"][0]["field"], "email");

    let response = app
        .json(
            "POST",
            "/v1/auth/register",
            None,
            json!({
                "email": "camille@example.com",
                "password": "short",
                "first_name": "Camille",
                "last_name": "Durand"
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["details"][0]["field"], "password");
}

#[tokio::test]
async fn test_document_upload_rejects_disguised_script() {
    let app = TestApp::offline().await;
    let token = format!("Bearer {}", app.token_for(Uuid::new_v4(), UserRole::User));

    let form = MultipartBuilder::new()
        .text("name", "Invoice")
        .file("file", "invoice.pdf", fixtures::script());
    let response = app.multipart("POST", "/v1/me/documents", &token, &form).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["details"][0]["field"], "file");
}

#[tokio::test]
async fn test_project_without_valid_image_is_refused() {
    let app = TestApp::offline().await;
    let token = format!("Bearer {}", app.token_for(Uuid::new_v4(), UserRole::Admin));

    let form = MultipartBuilder::new()
        .text("title", "Gymnase")
        .file("images[]", "photo.jpg", fixtures::script())
        .file("images[]", "doc.png", fixtures::pdf());
    let response = app.multipart("POST", "/v1/admin/projects", &token, &form).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["details"][0]["field"], "images");
}

// ── Database-backed flows ────────────────────────────────────────────────

async fn register(app: &TestApp, email: &str) -> serde_json::Value {
    let response = app
        .json(
            "POST",
            "/v1/auth/register",
            None,
            json!({
                "email": email,
                "password": common::TEST_PASSWORD,
                "first_name": "Claire",
                "last_name": "Martin"
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_register_then_login_lands_on_user_dashboard() {
    let app = TestApp::with_database().await.unwrap();
    let email = format!("login-{}@example.com", Uuid::new_v4());
    register(&app, &email).await;

    let response = app
        .json(
            "POST",
            "/v1/auth/login",
            None,
            json!({ "email": email, "password": common::TEST_PASSWORD }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["role"], "user");
    assert_eq!(body["landing"], "/account/dashboard");

    let response = app
        .json(
            "POST",
            "/v1/auth/login",
            None,
            json!({ "email": email, "password": "wrong password" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let user = User::find_by_email(&app.db, &email).await.unwrap().unwrap();
    app.cleanup_user(&user).await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_email_change_needs_both_confirmations() {
    let app = TestApp::with_database().await.unwrap();
    let user = app.create_user(UserRole::User).await;
    let auth = app.bearer(&user);
    let new_email = format!("moved-{}@example.com", Uuid::new_v4());

    let response = app
        .json("POST", "/v1/me/email-change", Some(&auth), json!({ "email": new_email }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], EMAIL_CHANGE_REQUESTED);

    let first = app.mailer.last().expect("mail to current address");
    assert_eq!(first.to, user.email);
    let current_token = token_from_body(&first.body);

    // Step two's link is not valid for step three
    let response = app
        .get(&format!("/v1/account/email/confirm-new/{}", current_token), None)
        .await;
    assert_eq!(body_json(response).await["error"], "invalid_link");

    let response = app
        .get(&format!("/v1/account/email/confirm-current/{}", current_token), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], CURRENT_EMAIL_CONFIRMED);

    let unchanged = User::find_by_id(&app.db, user.id).await.unwrap().unwrap();
    assert_eq!(unchanged.email, user.email);

    let second = app.mailer.last().expect("mail to new address");
    assert_eq!(second.to, new_email);
    let new_token = token_from_body(&second.body);

    let response = app
        .get(&format!("/v1/account/email/confirm-new/{}", new_token), None)
        .await;
    assert_eq!(body_json(response).await["message"], EMAIL_CHANGED);

    let changed = User::find_by_id(&app.db, user.id).await.unwrap().unwrap();
    assert_eq!(changed.email, new_email);
    assert!(changed.pending_email.is_none());
    assert!(changed.email_change_token_hash.is_none());

    // Single use
    let response = app
        .get(&format!("/v1/account/email/confirm-new/{}", new_token), None)
        .await;
    assert_eq!(body_json(response).await["error"], "invalid_link");

    app.cleanup_user(&user).await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_email_change_to_taken_address_is_indistinguishable() {
    let app = TestApp::with_database().await.unwrap();
    let user = app.create_user(UserRole::User).await;
    let other = app.create_user(UserRole::User).await;
    let auth = app.bearer(&user);

    let taken = app
        .json("POST", "/v1/me/email-change", Some(&auth), json!({ "email": other.email }))
        .await;
    let taken_status = taken.status();
    let taken_body = body_bytes(taken).await;
    assert!(app.mailer.sent().is_empty());

    let free = app
        .json(
            "POST",
            "/v1/me/email-change",
            Some(&auth),
            json!({ "email": format!("free-{}@example.com", Uuid::new_v4()) }),
        )
        .await;
    let free_status = free.status();
    let free_body = body_bytes(free).await;

    assert_eq!(taken_status, free_status);
    assert_eq!(taken_body, free_body);
    assert_eq!(app.mailer.sent().len(), 1);

    app.cleanup_user(&user).await;
    app.cleanup_user(&other).await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_password_link_is_single_use() {
    let app = TestApp::with_database().await.unwrap();
    let user = app.create_user(UserRole::User).await;

    let response = app
        .json("POST", "/v1/me/password-change", Some(&app.bearer(&user)), json!({}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let token = token_from_body(&app.mailer.last().unwrap().body);
    let uri = format!("/v1/account/password/confirm/{}", token);

    let response = app.get(&uri, None).await;
    assert_eq!(body_json(response).await["email"], user.email);

    let change = json!({ "password": "a brand new secret", "password_confirmation": "a brand new secret" });
    let response = app.json("POST", &uri, None, change.clone()).await;
    assert_eq!(body_json(response).await["message"], PASSWORD_CHANGED);

    let response = app.json("POST", &uri, None, change).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_link");

    app.cleanup_user(&user).await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_documents_are_private_to_their_owner() {
    let app = TestApp::with_database().await.unwrap();
    let owner = app.create_user(UserRole::User).await;
    let stranger = app.create_user(UserRole::User).await;

    let form = MultipartBuilder::new()
        .text("name", "Contrat signé")
        .file("file", "contrat.pdf", fixtures::pdf());
    let response = app
        .multipart("POST", "/v1/me/documents", &app.bearer(&owner), &form)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let document_id = body_json(response).await["document"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let download = format!("/v1/me/documents/{}/download", document_id);

    let response = app.get(&download, Some(&app.bearer(&owner))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .starts_with("inline; filename=\"Contrat sign_.pdf\""));
    assert_eq!(body_bytes(response).await, fixtures::pdf());

    let response = app.get(&download, Some(&app.bearer(&stranger))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    app.cleanup_user(&owner).await;
    app.cleanup_user(&stranger).await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_admin_deposit_reaches_only_its_recipient() {
    let app = TestApp::with_database().await.unwrap();
    let admin = app.create_user(UserRole::Admin).await;
    let recipient = app.create_user(UserRole::User).await;
    let other = app.create_user(UserRole::User).await;

    let form = MultipartBuilder::new()
        .text("name", "Facture")
        .text("recipient_id", &recipient.id.to_string())
        .file("file", "facture.pdf", fixtures::pdf());
    let response = app
        .multipart("POST", "/v1/admin/documents", &app.bearer(&admin), &form)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body_json(response).await["document"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let uri = format!("/v1/me/received/{}/download", id);
    assert_eq!(
        app.get(&uri, Some(&app.bearer(&recipient))).await.status(),
        StatusCode::OK
    );
    assert_eq!(
        app.get(&uri, Some(&app.bearer(&other))).await.status(),
        StatusCode::FORBIDDEN
    );

    let response = app
        .json(
            "DELETE",
            &format!("/v1/admin/users/{}", admin.id),
            Some(&app.bearer(&admin)),
            json!({}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    app.cleanup_user(&recipient).await;
    app.cleanup_user(&other).await;
    app.cleanup_user(&admin).await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_project_gallery_keeps_a_single_cover() {
    let app = TestApp::with_database().await.unwrap();
    let admin = app.create_user(UserRole::Admin).await;
    let auth = app.bearer(&admin);

    let form = MultipartBuilder::new()
        .text("title", "Collège Jean Moulin")
        .text("completed_on", "2024-06-30")
        .file("images[]", "a.png", fixtures::png())
        .file("images[]", "evil.jpg", fixtures::script())
        .file("images[]", "b.jpg", fixtures::jpeg());
    let response = app.multipart("POST", "/v1/admin/projects", &auth, &form).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["warnings"].as_array().unwrap().len(), 1);
    let project_id: Uuid = body["project"]["id"].as_str().unwrap().parse().unwrap();

    let gallery = ProjectImage::list_for_project(&app.db, project_id).await.unwrap();
    assert_eq!(gallery.len(), 2);
    assert!(gallery[0].is_cover);
    assert_eq!(gallery[0].mime_type, "image/png");
    let (first, second) = (gallery[0].id, gallery[1].id);

    // Explicit cover choice
    let form = MultipartBuilder::new()
        .text("title", "Collège Jean Moulin")
        .text("cover_image_id", &second.to_string());
    let response = app
        .multipart("PUT", &format!("/v1/admin/projects/{}", project_id), &auth, &form)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["project"]["cover_image_id"], second.to_string());

    // A cover from elsewhere is refused
    let form = MultipartBuilder::new()
        .text("title", "Collège Jean Moulin")
        .text("cover_image_id", &Uuid::new_v4().to_string());
    let response = app
        .multipart("PUT", &format!("/v1/admin/projects/{}", project_id), &auth, &form)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Deleting the cover promotes the remaining image
    let response = app
        .json(
            "DELETE",
            &format!("/v1/admin/projects/images/{}", second),
            Some(&auth),
            json!({}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["cover_image_id"], first.to_string());

    let response = app.get(&format!("/v1/projects/images/{}", first), None).await;
    assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=86400");
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

    let response = app
        .get(&format!("/v1/admin/projects/images/{}", first), Some(&auth))
        .await;
    assert_eq!(response.headers()[header::CACHE_CONTROL], "private, max-age=3600");

    let response = app
        .json(
            "DELETE",
            &format!("/v1/admin/projects/{}", project_id),
            Some(&auth),
            json!({}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(ProjectImage::find_by_id(&app.db, first).await.unwrap().is_none());

    app.cleanup_user(&admin).await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_email_change_to_mixed_case_address_keeps_login_working() {
    let app = TestApp::with_database().await.unwrap();
    let user = app.create_user(UserRole::User).await;
    let auth = app.bearer(&user);
    let typed = format!("New.Person-{}@Example.com", Uuid::new_v4());

    let response = app
        .json("POST", "/v1/me/email-change", Some(&auth), json!({ "email": typed }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let token = token_from_body(&app.mailer.last().unwrap().body);
    app.get(&format!("/v1/account/email/confirm-current/{}", token), None)
        .await;
    let second = app.mailer.last().unwrap();
    assert_eq!(second.to, typed.to_lowercase());

    let token = token_from_body(&second.body);
    let response = app
        .get(&format!("/v1/account/email/confirm-new/{}", token), None)
        .await;
    assert_eq!(body_json(response).await["message"], EMAIL_CHANGED);

    let changed = User::find_by_id(&app.db, user.id).await.unwrap().unwrap();
    assert_eq!(changed.email, typed.to_lowercase());

    for email in [typed.clone(), typed.to_lowercase()] {
        let response = app
            .json(
                "POST",
                "/v1/auth/login",
                None,
                json!({ "email": email, "password": common::TEST_PASSWORD }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "{}", email);
    }

    app.cleanup_user(&user).await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_case_variants_of_a_taken_address_are_refused() {
    let app = TestApp::with_database().await.unwrap();
    let user = app.create_user(UserRole::User).await;
    let other = app.create_user(UserRole::User).await;
    let auth = app.bearer(&user);

    // Registration answers a conflict
    let response = app
        .json(
            "POST",
            "/v1/auth/register",
            None,
            json!({
                "email": other.email.to_uppercase(),
                "password": common::TEST_PASSWORD,
                "first_name": "Claire",
                "last_name": "Martin"
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Email change answers the usual message but starts nothing
    let response = app
        .json(
            "POST",
            "/v1/me/email-change",
            Some(&auth),
            json!({ "email": other.email.to_uppercase() }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], EMAIL_CHANGE_REQUESTED);
    assert!(app.mailer.sent().is_empty());

    let unchanged = User::find_by_id(&app.db, user.id).await.unwrap().unwrap();
    assert!(unchanged.pending_email.is_none());

    // Own address in another case is not a change
    let response = app
        .json(
            "POST",
            "/v1/me/email-change",
            Some(&auth),
            json!({ "email": user.email.to_uppercase() }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    app.cleanup_user(&user).await;
    app.cleanup_user(&other).await;
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_refresh_is_refused_once_the_account_is_deleted() {
    let app = TestApp::with_database().await.unwrap();
    let admin = app.create_user(UserRole::Admin).await;
    let refresh_token = app.refresh_token_for(admin.id, UserRole::Admin);

    let response = app
        .json("POST", "/v1/auth/refresh", None, json!({ "refresh_token": refresh_token }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    User::delete(&app.db, admin.id).await.unwrap();

    let response = app
        .json("POST", "/v1/auth/refresh", None, json!({ "refresh_token": refresh_token }))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_refresh_after_demotion_loses_admin_access() {
    let app = TestApp::with_database().await.unwrap();
    let admin = app.create_user(UserRole::Admin).await;
    let refresh_token = app.refresh_token_for(admin.id, UserRole::Admin);

    sqlx::query("UPDATE users SET role = 'user' WHERE id = $1")
        .bind(admin.id)
        .execute(&app.db)
        .await
        .unwrap();

    let response = app
        .json("POST", "/v1/auth/refresh", None, json!({ "refresh_token": refresh_token }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let access = body_json(response).await["access_token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .get("/v1/admin/users", Some(&format!("Bearer {}", access)))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    app.cleanup_user(&admin).await;
}
