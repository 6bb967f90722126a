//! Router assembly: HTTP endpoints, static files, CORS, and HTTP tracing.

use std::path::Path;
use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - JSON API under `/api/v1/...`
/// - Static SPA from `static_dir` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>, static_dir: &Path) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new(static_dir)
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new(static_dir.join("index.html")));

    let api = Router::new()
        .route("/health", get(http::http_health))
        // Content
        .route("/eras", get(http::http_get_eras).post(http::http_post_era))
        .route("/eras/reorder", post(http::http_reorder_eras))
        .route("/eras/:era_id", put(http::http_put_era))
        .route("/eras/:era_id/topics", post(http::http_post_topic))
        .route("/eras/:era_id/topics/reorder", post(http::http_reorder_topics))
        .route("/topics/:topic_id", put(http::http_put_topic).delete(http::http_delete_topic))
        .route("/topics/:topic_id/events", post(http::http_post_event))
        .route("/topics/:topic_id/events/reorder", post(http::http_reorder_events))
        .route(
            "/topics/:topic_id/events/:event_id",
            put(http::http_put_event).delete(http::http_delete_event),
        )
        .route("/export", get(http::http_get_export))
        .route("/import", post(http::http_post_import))
        .route("/search", get(http::http_get_search))
        // Session / profile
        .route("/session", post(http::http_post_session).delete(http::http_delete_session))
        .route("/profile", get(http::http_get_profile))
        .route("/profile/completed", post(http::http_post_completed))
        .route("/profile/quiz-score", post(http::http_post_quiz_score))
        .route("/profile/last-viewed", post(http::http_post_last_viewed))
        .route("/dashboard", get(http::http_get_dashboard))
        // Quiz / leaderboard
        .route("/quiz", get(http::http_get_quiz))
        .route("/quiz/submit", post(http::http_post_quiz_submit))
        .route("/leaderboard", get(http::http_get_leaderboard));

    Router::new()
        .nest("/api/v1", api)
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Language;
    use crate::protocol::SESSION_HEADER;
    use crate::quiz::QuizService;
    use crate::session::tests::FixedClock;
    use crate::storage::LocalBackend;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct TestApp {
        _dir: TempDir,
        state: Arc<AppState>,
        router: Router,
    }

    async fn app() -> TestApp {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("rawHistoricalData.json"),
            json!([
                { "title": "Prophetic Era", "description": "", "topics": [
                    { "name": "Hijra", "title": "", "period": "622", "bio": "Migration to Medina", "isFeatured": true, "events": [
                        { "year": "622", "title": "Leaving Mecca", "story": "At night" },
                        { "year": "622", "title": "Quba", "story": "First mosque" }
                    ]}
                ]}
            ])
            .to_string(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("mockQuizData.json"),
            json!([{ "question": "Year of Hijra?", "options": ["610", "622"], "correctAnswerIndex": 1, "explanation": "" }])
                .to_string(),
        )
        .unwrap();

        let backend = Arc::new(LocalBackend::new(dir.path().join("var")));
        let quiz = QuizService::load(dir.path()).await;
        let state = Arc::new(AppState::new(
            backend.clone(),
            backend,
            Arc::new(FixedClock::at(2024, 5, 1)),
            dir.path(),
            quiz,
        ));
        state.load_all().await;
        let router = build_router(state.clone(), &dir.path().join("static"));
        TestApp { _dir: dir, state, router }
    }

    async fn call(router: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(SESSION_HEADER, t);
        }
        let req = match body {
            Some(b) => req.header("content-type", "application/json").body(Body::from(b.to_string())).unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, json)
    }

    async fn login(router: &Router, provider: &str) -> String {
        let (status, body) = call(router, "POST", "/api/v1/session", None, Some(json!({ "provider": provider }))).await;
        assert_eq!(status, StatusCode::CREATED);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_and_seeded_eras() {
        let app = app().await;
        let (status, body) = call(&app.router, "GET", "/api/v1/health", None, None).await;
        assert_eq!((status, body), (StatusCode::OK, json!({ "ok": true })));

        let (status, body) = call(&app.router, "GET", "/api/v1/eras?lang=en", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["topics"][0]["events"][1]["id"], 2);

        let (_, body) = call(&app.router, "GET", "/api/v1/eras?lang=bn", None, None).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn content_mutations_need_an_admin() {
        let app = app().await;
        let era = json!({ "title": "Umayyad", "description": "" });

        let (status, _) = call(&app.router, "POST", "/api/v1/eras", None, Some(era.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let reader = login(&app.router, "google").await;
        let (status, body) = call(&app.router, "POST", "/api/v1/eras", Some(&reader), Some(era.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["status"], 403);

        let admin = login(&app.router, "admin").await;
        let (status, body) = call(&app.router, "POST", "/api/v1/eras", Some(&admin), Some(era)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body[1]["id"], 2);
    }

    #[tokio::test]
    async fn admin_edits_the_tree() {
        let app = app().await;
        let admin = login(&app.router, "admin").await;

        let (status, body) = call(
            &app.router,
            "POST",
            "/api/v1/topics/1/events",
            Some(&admin),
            Some(json!({ "year": "623", "title": "Constitution", "story": "Charter of Medina" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body[0]["topics"][0]["events"][2]["id"], 3);

        let (_, body) = call(
            &app.router,
            "POST",
            "/api/v1/topics/1/events/reorder",
            Some(&admin),
            Some(json!({ "startIndex": 2, "endIndex": 0 })),
        )
        .await;
        let order: Vec<u64> = body[0]["topics"][0]["events"].as_array().unwrap().iter().map(|e| e["id"].as_u64().unwrap()).collect();
        assert_eq!(order, vec![3, 1, 2]);

        let (status, body) = call(&app.router, "DELETE", "/api/v1/topics/1/events/1", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["topics"][0]["events"].as_array().unwrap().len(), 2);

        let (status, _) = call(&app.router, "DELETE", "/api/v1/topics/1/events/99", Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app.router, "POST", "/api/v1/eras/reorder", Some(&admin), Some(json!({ "from": 0, "to": 4 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = call(&app.router, "DELETE", "/api/v1/topics/1", Some(&admin), None).await;
        assert_eq!(body[0]["topics"], json!([]));
    }

    #[tokio::test]
    async fn import_validates_and_export_round_trips() {
        let app = app().await;
        let admin = login(&app.router, "admin").await;

        let (status, body) = call(&app.router, "POST", "/api/v1/import", Some(&admin), Some(json!({ "eras": [] }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Import failed"));
        assert_eq!(app.state.content(Language::En).unwrap().eras().await.len(), 1);

        let (_, exported) = call(&app.router, "GET", "/api/v1/export", None, None).await;
        let (status, body) = call(&app.router, "POST", "/api/v1/import?lang=bn", Some(&admin), Some(exported.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["eras"], 1);

        let (_, bn) = call(&app.router, "GET", "/api/v1/eras?lang=bn", None, None).await;
        assert_eq!(bn, exported);
    }

    #[tokio::test]
    async fn search_by_substring() {
        let app = app().await;
        let (_, body) = call(&app.router, "GET", "/api/v1/search?q=MOSQUE", None, None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["event"]["title"], "Quba");
        assert_eq!(body[0]["topic"]["id"], 1);
    }

    #[tokio::test]
    async fn profile_progress_flow() {
        let app = app().await;
        let token = login(&app.router, "google").await;

        for _ in 0..2 {
            let (status, _) = call(&app.router, "POST", "/api/v1/profile/completed", Some(&token), Some(json!({ "eventId": 2 }))).await;
            assert_eq!(status, StatusCode::OK);
        }
        call(&app.router, "POST", "/api/v1/profile/last-viewed", Some(&token), Some(json!({ "topicId": 1, "eventId": 2 }))).await;

        let (_, profile) = call(&app.router, "GET", "/api/v1/profile", Some(&token), None).await;
        assert_eq!(profile["profile"]["completedEventIds"], json!([2]));
        assert_eq!(profile["profile"]["dailyStreak"], 1);
        assert_eq!(profile["isAdmin"], false);

        let (_, dash) = call(&app.router, "GET", "/api/v1/dashboard", Some(&token), None).await;
        assert_eq!(dash["completedEvents"], 1);
        assert_eq!(dash["totalEvents"], 2);
        assert_eq!(dash["frequentTopics"][0]["completedCount"], 1);
        assert_eq!(dash["continueReading"]["event"]["title"], "Quba");

        let (status, _) = call(&app.router, "DELETE", "/api/v1/session", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app.router, "GET", "/api/v1/profile", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn quiz_submission_feeds_the_leaderboard() {
        let app = app().await;
        let token = login(&app.router, "facebook").await;

        let (_, questions) = call(&app.router, "GET", "/api/v1/quiz", None, None).await;
        assert!(questions[0].get("correctAnswerIndex").is_none());

        let (_, result) = call(&app.router, "POST", "/api/v1/quiz/submit", Some(&token), Some(json!({ "answers": [1] }))).await;
        assert_eq!(result["score"], 100);
        assert_eq!(result["profile"]["globalQuizStats"]["highScore"], 100);

        let (_, board) = call(&app.router, "GET", "/api/v1/leaderboard", Some(&token), None).await;
        assert_eq!(board[0]["name"], "Ibn Battuta (You)");
        assert_eq!(board[0]["rank"], 1);

        let (status, board) = call(&app.router, "GET", "/api/v1/leaderboard", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(board, json!([]));
    }

    #[tokio::test]
    async fn guest_progress_is_not_tracked() {
        let app = app().await;
        let guest = login(&app.router, "guest").await;
        let (status, body) = call(&app.router, "POST", "/api/v1/profile/completed", Some(&guest), Some(json!({ "eventId": 1 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["profile"], Value::Null);
    }
}
