// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, course, enrollment, lesson, profile, quiz},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, optional_auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, catalog, courses, lessons, quizzes, admin).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (Database Pool + Config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    // Public read surface: anonymous viewers see what visibility allows.
    let catalog_routes = Router::new()
        .route("/", get(course::list_catalog))
        .route("/{id}", get(course::get_course))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            optional_auth_middleware,
        ));

    let course_routes = Router::new()
        .route("/", post(course::create_course))
        .route("/mine", get(course::list_mine))
        .route("/{id}", put(course::update_course))
        .route("/{id}/publish", put(course::toggle_publish))
        .route("/{id}/tags", put(course::set_tags))
        .route("/{id}/lessons", post(lesson::append_lesson))
        .route("/{id}/lessons/reorder", put(lesson::reorder_lessons))
        .route("/{id}/enroll", post(enrollment::self_enroll))
        .route(
            "/{id}/attendees",
            get(enrollment::list_attendees).post(enrollment::invite),
        )
        .route(
            "/{id}/attendees/eligible",
            get(enrollment::list_eligible_learners),
        );

    let lesson_routes = Router::new().route(
        "/{id}",
        put(lesson::update_lesson).delete(lesson::delete_lesson),
    );

    let quiz_routes = Router::new()
        .route("/{id}", get(quiz::get_quiz))
        .route("/{id}/paper", get(quiz::get_paper))
        .route("/{id}/questions", post(quiz::add_question))
        .route("/{id}/rewards", put(quiz::update_rewards))
        .route("/{id}/submit", post(quiz::submit_attempt));

    let question_routes = Router::new().route(
        "/{id}",
        put(quiz::update_question).delete(quiz::delete_question),
    );

    let profile_routes = Router::new()
        .route("/me", get(profile::get_me))
        .route("/courses", get(profile::my_courses))
        .route("/dashboard", get(profile::dashboard));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route(
            "/users/{id}",
            put(admin::update_user).delete(admin::delete_user),
        )
        // Double middleware protection: Auth first, then the gate's
        // user-management capability check.
        .layer(middleware::from_fn(admin_middleware));

    let protected = Router::new()
        .nest("/api/courses", course_routes)
        .nest("/api/lessons", lesson_routes)
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/questions", question_routes)
        .nest("/api/profile", profile_routes)
        .nest("/api/admin", admin_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/catalog", catalog_routes)
        .merge(protected)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
