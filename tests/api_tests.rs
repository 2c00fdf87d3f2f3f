use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use rms_directory::config::Config;
use serde_json::{Value, json};
use tower::ServiceExt;

const ADMIN_PASSWORD: &str = "Bootstrap-Admin1";
const ADMIN_NEW_PASSWORD: &str = "Directory-Admin2";

struct TestApp {
    app: Router,
}

struct TestResponse {
    status: StatusCode,
    body: Value,
    raw: String,
    cookie: Option<String>,
}

async fn spawn_app() -> TestApp {
    let db_path =
        std::env::temp_dir().join(format!("rms-directory-api-test-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    config.server.secure_cookies = false;
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config.bootstrap.password = Some(ADMIN_PASSWORD.to_string());

    let state = rms_directory::api::create_app_state_from_config(config, None)
        .await
        .expect("Failed to create app state");
    state
        .shared
        .ensure_bootstrap_admin()
        .await
        .expect("Failed to bootstrap admin");

    TestApp {
        app: rms_directory::api::router(state).await,
    }
}

impl TestApp {
    async fn send(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let raw = String::from_utf8_lossy(&bytes).to_string();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            body,
            raw,
            cookie,
        }
    }

    async fn login(&self, username: &str, password: &str) -> TestResponse {
        self.send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": username, "password": password })),
        )
        .await
    }

    /// Logs in as the bootstrap admin and completes the forced password change.
    async fn admin_session(&self) -> String {
        let response = self.login("admin", ADMIN_PASSWORD).await;
        assert_eq!(response.status, StatusCode::OK);
        let cookie = response.cookie.expect("login should set a session cookie");

        let response = self
            .send(
                Method::PUT,
                "/api/auth/password",
                Some(&cookie),
                Some(json!({
                    "currentPassword": ADMIN_PASSWORD,
                    "newPassword": ADMIN_NEW_PASSWORD,
                })),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK);

        cookie
    }

    async fn create_account(&self, cookie: &str, body: Value) -> TestResponse {
        self.send(Method::POST, "/api/accounts", Some(cookie), Some(body))
            .await
    }
}

fn alice() -> Value {
    json!({
        "username": "alice",
        "email": "alice@example.com",
        "firstName": "Alice",
        "lastName": "Liddell",
        "password": "Wonderland1",
    })
}

#[tokio::test]
async fn test_health_is_public_and_accounts_are_not() {
    let app = spawn_app().await;

    let response = app.send(Method::GET, "/api/health", None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["status"], "ok");

    let response = app.send(Method::GET, "/api/accounts", None, None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app.send(Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = spawn_app().await;

    let unknown = app.login("nobody", ADMIN_PASSWORD).await;
    let wrong = app.login("admin", "Not-The-Password1").await;

    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.body, wrong.body);
    assert_eq!(unknown.body["success"], false);
}

#[tokio::test]
async fn test_first_login_requires_password_change() {
    let app = spawn_app().await;

    let response = app.login("admin", ADMIN_PASSWORD).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["mustChangePassword"], true);
    assert_eq!(response.body["data"]["account"]["role"], "ADMIN");
    let cookie = response.cookie.unwrap();

    let response = app
        .send(Method::GET, "/api/accounts", Some(&cookie), None)
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app
        .send(Method::GET, "/api/auth/me", Some(&cookie), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["firstLogin"], true);

    let response = app
        .send(
            Method::PUT,
            "/api/auth/password",
            Some(&cookie),
            Some(json!({
                "currentPassword": ADMIN_PASSWORD,
                "newPassword": ADMIN_NEW_PASSWORD,
            })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app
        .send(Method::GET, "/api/accounts", Some(&cookie), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_account_never_exposes_credentials() {
    let app = spawn_app().await;
    let cookie = app.admin_session().await;

    let response = app.create_account(&cookie, alice()).await;
    assert_eq!(response.status, StatusCode::CREATED);

    let account = &response.body["data"];
    assert_eq!(account["username"], "alice");
    assert_eq!(account["role"], "EMPLOYEE");
    assert_eq!(account["isActive"], true);
    assert_eq!(account["firstLogin"], true);
    assert!(account["managerId"].is_null());

    assert!(!response.raw.contains("Wonderland1"));
    assert!(!response.raw.contains("argon2"));
    assert!(!response.raw.to_lowercase().contains("password"));

    let response = app
        .send(Method::GET, "/api/accounts", Some(&cookie), None)
        .await;
    assert!(!response.raw.contains("argon2"));
    assert!(!response.raw.contains("credential"));
}

#[tokio::test]
async fn test_create_account_rejections() {
    let app = spawn_app().await;
    let cookie = app.admin_session().await;

    assert_eq!(
        app.create_account(&cookie, alice()).await.status,
        StatusCode::CREATED
    );

    let mut duplicate = alice();
    duplicate["username"] = json!("ALICE");
    duplicate["email"] = json!("other@example.com");
    let response = app.create_account(&cookie, duplicate).await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let mut bad_role = alice();
    bad_role["username"] = json!("bob");
    bad_role["email"] = json!("bob@example.com");
    bad_role["role"] = json!("OWNER");
    let response = app.create_account(&cookie, bad_role).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].as_str().unwrap().contains("role"));

    let mut weak = alice();
    weak["username"] = json!("carol");
    weak["email"] = json!("carol@example.com");
    weak["password"] = json!("weak");
    let response = app.create_account(&cookie, weak).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].as_str().unwrap().contains("password"));

    let mut orphan = alice();
    orphan["username"] = json!("dave");
    orphan["email"] = json!("dave@example.com");
    orphan["managerId"] = json!(999);
    let response = app.create_account(&cookie, orphan).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].as_str().unwrap().contains("managerId"));
}

#[tokio::test]
async fn test_hierarchy_updates_and_cycle_rejection() {
    let app = spawn_app().await;
    let cookie = app.admin_session().await;

    let boss = app
        .create_account(
            &cookie,
            json!({
                "username": "boss",
                "email": "boss@example.com",
                "firstName": "Queen",
                "lastName": "Hearts",
                "role": "manager",
                "password": "OffWithHeads1",
            }),
        )
        .await;
    let boss_id = boss.body["data"]["id"].as_i64().unwrap();
    assert_eq!(boss.body["data"]["role"], "MANAGER");

    let mut alice_body = alice();
    alice_body["managerId"] = json!(boss_id);
    let alice = app.create_account(&cookie, alice_body).await;
    let alice_id = alice.body["data"]["id"].as_i64().unwrap();
    assert_eq!(alice.body["data"]["managerId"], boss_id);

    // Self as manager
    let response = app
        .send(
            Method::PATCH,
            &format!("/api/accounts/{alice_id}"),
            Some(&cookie),
            Some(json!({ "managerId": alice_id })),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    // Report as manager
    let response = app
        .send(
            Method::GET,
            &format!("/api/accounts/{boss_id}/cycle-check?manager_id={alice_id}"),
            Some(&cookie),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["wouldCreateCycle"], true);

    let response = app
        .send(
            Method::PATCH,
            &format!("/api/accounts/{boss_id}"),
            Some(&cookie),
            Some(json!({ "managerId": alice_id })),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .send(
            Method::GET,
            &format!("/api/accounts/{boss_id}/reports"),
            Some(&cookie),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let reports = response.body["data"].as_array().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["username"], "alice");

    // Explicit null detaches; other fields stay put
    let response = app
        .send(
            Method::PATCH,
            &format!("/api/accounts/{alice_id}"),
            Some(&cookie),
            Some(json!({ "managerId": null, "mobileNo": "+1 555 0100" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body["data"]["managerId"].is_null());
    assert_eq!(response.body["data"]["mobileNo"], "+1 555 0100");
    assert_eq!(response.body["data"]["email"], "alice@example.com");
}

#[tokio::test]
async fn test_role_gates_and_self_service() {
    let app = spawn_app().await;
    let admin = app.admin_session().await;

    let boss = app
        .create_account(
            &admin,
            json!({
                "username": "boss",
                "email": "boss@example.com",
                "firstName": "Queen",
                "lastName": "Hearts",
                "role": "MANAGER",
                "password": "OffWithHeads1",
            }),
        )
        .await;
    let boss_id = boss.body["data"]["id"].as_i64().unwrap();

    let mut alice_body = alice();
    alice_body["managerId"] = json!(boss_id);
    app.create_account(&admin, alice_body).await;

    let response = app.login("alice", "Wonderland1").await;
    let alice_cookie = response.cookie.unwrap();
    let response = app
        .send(
            Method::PUT,
            "/api/auth/password",
            Some(&alice_cookie),
            Some(json!({
                "currentPassword": "Wonderland1",
                "newPassword": "LookingGlass2",
            })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app
        .send(Method::GET, "/api/auth/manager", Some(&alice_cookie), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["username"], "boss");

    let response = app
        .send(Method::GET, "/api/accounts", Some(&alice_cookie), None)
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app.create_account(&alice_cookie, alice()).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    // A manager can see the reports under them
    let response = app.login("boss", "OffWithHeads1").await;
    let boss_cookie = response.cookie.unwrap();
    app.send(
        Method::PUT,
        "/api/auth/password",
        Some(&boss_cookie),
        Some(json!({
            "currentPassword": "OffWithHeads1",
            "newPassword": "OffWithHeads2",
        })),
    )
    .await;

    let response = app
        .send(
            Method::GET,
            &format!("/api/accounts/{boss_id}/reports"),
            Some(&boss_cookie),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_password_reset_and_deactivation() {
    let app = spawn_app().await;
    let admin = app.admin_session().await;

    let alice = app.create_account(&admin, alice()).await;
    let alice_id = alice.body["data"]["id"].as_i64().unwrap();

    let response = app.login("alice", "Wonderland1").await;
    let alice_cookie = response.cookie.unwrap();

    let response = app
        .send(
            Method::POST,
            &format!("/api/accounts/{alice_id}/password-reset"),
            Some(&admin),
            Some(json!({ "password": "Rabbit-Hole3" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    assert_eq!(
        app.login("alice", "Wonderland1").await.status,
        StatusCode::UNAUTHORIZED
    );
    let response = app.login("alice", "Rabbit-Hole3").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["mustChangePassword"], true);

    let response = app
        .send(
            Method::POST,
            &format!("/api/accounts/{alice_id}/deactivate"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["isActive"], false);
    assert_eq!(response.body["data"]["username"], "alice");

    // Idempotent
    let response = app
        .send(
            Method::POST,
            &format!("/api/accounts/{alice_id}/deactivate"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    // Existing sessions die with the account
    let response = app
        .send(Method::GET, "/api/auth/me", Some(&alice_cookie), None)
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    assert_eq!(
        app.login("alice", "Rabbit-Hole3").await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_delete_account() {
    let app = spawn_app().await;
    let admin = app.admin_session().await;

    let alice = app.create_account(&admin, alice()).await;
    let alice_id = alice.body["data"]["id"].as_i64().unwrap();

    let response = app
        .send(
            Method::DELETE,
            &format!("/api/accounts/{alice_id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app
        .send(
            Method::GET,
            &format!("/api/accounts/{alice_id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = app
        .send(Method::GET, "/api/accounts/0", Some(&admin), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_cannot_demote_self() {
    let app = spawn_app().await;
    let admin = app.admin_session().await;

    let me = app
        .send(Method::GET, "/api/auth/me", Some(&admin), None)
        .await;
    let admin_id = me.body["data"]["id"].as_i64().unwrap();

    let response = app
        .send(
            Method::PATCH,
            &format!("/api/accounts/{admin_id}"),
            Some(&admin),
            Some(json!({ "role": "EMPLOYEE" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);

    // Restating the current role is not a demotion
    let response = app
        .send(
            Method::PATCH,
            &format!("/api/accounts/{admin_id}"),
            Some(&admin),
            Some(json!({ "role": "ADMIN", "firstName": "Root" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let me = app
        .send(Method::GET, "/api/auth/me", Some(&admin), None)
        .await;
    assert_eq!(me.body["data"]["role"], "ADMIN");
    assert_eq!(me.body["data"]["firstName"], "Root");

    // Another admin can still be demoted
    let mut other = alice();
    other["role"] = json!("ADMIN");
    let other = app.create_account(&admin, other).await;
    let other_id = other.body["data"]["id"].as_i64().unwrap();
    let response = app
        .send(
            Method::PATCH,
            &format!("/api/accounts/{other_id}"),
            Some(&admin),
            Some(json!({ "role": "MANAGER" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["role"], "MANAGER");
}
