// tests/api_tests.rs

use lms_backend::{config::Config, models::user::Role, routes, state::AppState, utils::hash};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

struct TestApp {
    address: String,
    pool: PgPool,
}

/// Helper function to spawn the app on a random port for testing.
/// Returns None (skipping the test) when no database is configured.
async fn spawn_app() -> Option<TestApp> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping integration test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Some(TestApp { address, pool })
}

fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().to_string()[..8])
}

/// Registers a user through the API and returns (username, token).
async fn register_and_login(app: &TestApp, client: &reqwest::Client) -> (String, String) {
    let username = unique_name("u");
    let password = "password123";

    client
        .post(format!("{}/api/auth/register", app.address))
        .json(&serde_json::json!({
            "username": username,
            "password": password,
            "name": "Test User"
        }))
        .send()
        .await
        .expect("Register failed");

    let login: serde_json::Value = client
        .post(format!("{}/api/auth/login", app.address))
        .json(&serde_json::json!({
            "username": username,
            "password": password
        }))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .expect("Failed to parse login json");

    let token = login["token"].as_str().expect("Token not found").to_string();
    (username, token)
}

/// Inserts a user with the given role directly and logs them in.
async fn seed_user_with_role(
    app: &TestApp,
    client: &reqwest::Client,
    role: Role,
) -> (String, String) {
    let username = unique_name("r");
    let password = "password123";
    let hashed = hash::hash_password(password).unwrap();

    sqlx::query("INSERT INTO users (username, password, name, role) VALUES ($1, $2, $3, $4)")
        .bind(&username)
        .bind(&hashed)
        .bind("Seeded User")
        .bind(role)
        .execute(&app.pool)
        .await
        .unwrap();

    let login: serde_json::Value = client
        .post(format!("{}/api/auth/login", app.address))
        .json(&serde_json::json!({
            "username": username,
            "password": password
        }))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .unwrap();

    let token = login["token"].as_str().expect("Token not found").to_string();
    (username, token)
}

#[tokio::test]
async fn health_check_404() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_works() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/auth/register", app.address))
        .json(&serde_json::json!({
            "username": unique_name("u"),
            "password": "password123",
            "name": "New Learner"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["role"], "learner");
}

#[tokio::test]
async fn register_fails_validation() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    // Username too short
    let response = client
        .post(format!("{}/api/auth/register", app.address))
        .json(&serde_json::json!({
            "username": "yo",
            "password": "password123",
            "name": "X"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();
    let username = unique_name("u");

    for expected in [201, 409] {
        let response = client
            .post(format!("{}/api/auth/register", app.address))
            .json(&serde_json::json!({
                "username": username,
                "password": "password123",
                "name": "Dup"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), expected);
    }
}

#[tokio::test]
async fn anonymous_mutation_is_401_wrong_role_is_403() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let course_body = serde_json::json!({
        "title": "Intro to Rust",
        "description": "",
        "visibility": "everyone",
        "access_rule": "open"
    });

    // No token at all: the caller should be sent to login.
    let response = client
        .post(format!("{}/api/courses", app.address))
        .json(&course_body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    // A learner is authenticated but not allowed to author courses.
    let (_, token) = register_and_login(&app, &client).await;
    let response = client
        .post(format!("{}/api/courses", app.address))
        .bearer_auth(&token)
        .json(&course_body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn admin_user_management_flow() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let (_, admin_token) = seed_user_with_role(&app, &client, Role::Admin).await;

    // Admin creates an instructor account.
    let username = unique_name("inst");
    let response = client
        .post(format!("{}/api/admin/users", app.address))
        .bearer_auth(&admin_token)
        .json(&serde_json::json!({
            "username": username,
            "password": "password123",
            "name": "New Instructor",
            "role": "instructor"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let created: serde_json::Value = response.json().await.unwrap();
    let user_id = created["id"].as_i64().unwrap();

    // Role reassignment.
    let response = client
        .put(format!("{}/api/admin/users/{}", app.address, user_id))
        .bearer_auth(&admin_token)
        .json(&serde_json::json!({ "role": "learner" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    // The user list is admin-only.
    let (_, learner_token) = register_and_login(&app, &client).await;
    let response = client
        .get(format!("{}/api/admin/users", app.address))
        .bearer_auth(&learner_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // Cleanup through the API.
    let response = client
        .delete(format!("{}/api/admin/users/{}", app.address, user_id))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);
}

#[tokio::test]
async fn dashboard_is_role_scoped() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let (_, learner_token) = register_and_login(&app, &client).await;
    let body: serde_json::Value = client
        .get(format!("{}/api/profile/dashboard", app.address))
        .bearer_auth(&learner_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["role"], "learner");
    assert!(body.get("enrolled_courses").is_some());

    let (_, instructor_token) = seed_user_with_role(&app, &client, Role::Instructor).await;
    let body: serde_json::Value = client
        .get(format!("{}/api/profile/dashboard", app.address))
        .bearer_auth(&instructor_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["role"], "instructor");
    assert!(body.get("courses").is_some());
}
