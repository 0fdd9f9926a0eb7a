mod config;
mod error;
mod handlers;
mod models;
mod services;
mod store;
mod validation;

use config::Config;
use ntex::http::Method;
use ntex::web::{self, middleware};
use services::leaderboard::LeaderboardStore;
use std::io;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// The full application: state, middleware and routes. Shared by the server
/// and the HTTP tests so both exercise the same stack.
macro_rules! leaderboard_app {
    ($board:expr) => {
        web::App::new()
            .state($board)
            .wrap(default_headers())
            .wrap(middleware::Logger::default())
            .configure(routes)
    };
}

#[ntex::main]
async fn main() -> io::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let store = store::open(&config).map_err(io::Error::other)?;
    let board = Arc::new(LeaderboardStore::new(store, config.leaderboard_options()));

    info!(
        backend = board.backend(),
        key = %config.leaderboard_key,
        capacity = config.capacity,
        write_mode = ?config.write_mode,
        "Captcha race leaderboard starting on {}:{}",
        config.host,
        config.port
    );

    web::HttpServer::new(move || leaderboard_app!(board.clone()))
        .bind(format!("{}:{}", config.host, config.port))?
        .run()
        .await
}

/// Every response, errors and preflights included, carries the same permissive
/// CORS headers and a JSON content type. Origins are never echoed back.
fn default_headers() -> middleware::DefaultHeaders {
    middleware::DefaultHeaders::new()
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type")
        .header("Access-Control-Max-Age", "3600")
        .header("Content-Type", "application/json")
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/health", web::get().to(health)).service(
        web::resource("/api/leaderboard")
            .route(web::get().to(handlers::leaderboard::list_scores))
            .route(web::post().to(handlers::leaderboard::submit_score))
            .route(web::route().method(Method::OPTIONS).to(handlers::leaderboard::preflight))
            .route(web::route().to(handlers::leaderboard::method_not_allowed)),
    );
}

async fn health(board: web::types::State<Arc<LeaderboardStore>>) -> web::HttpResponse {
    let reachable = match board.probe() {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "health probe could not read the leaderboard store");
            false
        }
    };
    web::HttpResponse::Ok().json(&serde_json::json!({
        "status": if reachable { "ok" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "store": {
            "backend": board.backend(),
            "reachable": reachable,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::leaderboard::{ScoreEntry, SubmitResponse};
    use ntex::http::StatusCode;
    use ntex::web::test;
    use services::leaderboard::{LeaderboardOptions, LEADERBOARD_KEY};
    use store::{KvStore, MemoryStore, SqliteStore, StoreError};

    struct UnreachableStore;

    impl KvStore for UnreachableStore {
        fn backend(&self) -> &'static str {
            "unreachable"
        }

        fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("binding missing".into()))
        }

        fn put(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("binding missing".into()))
        }
    }

    fn memory_board() -> Arc<LeaderboardStore> {
        Arc::new(LeaderboardStore::new(
            Arc::new(MemoryStore::new()),
            LeaderboardOptions::default(),
        ))
    }

    macro_rules! test_app {
        ($board:expr) => {
            test::init_service(leaderboard_app!($board)).await
        };
    }

    fn assert_cors(resp: &web::WebResponse) {
        let header = |name: &str| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        assert_eq!(header("access-control-allow-origin"), "*");
        assert_eq!(header("access-control-allow-methods"), "GET, POST, OPTIONS");
        assert_eq!(header("access-control-allow-headers"), "Content-Type");
        assert!(header("content-type").starts_with("application/json"));
    }

    #[test]
    fn test_sqlite_backend_opens_in_memory() {
        let store = SqliteStore::open_in_memory().expect("Failed to open in-memory DB");
        assert_eq!(store.get(LEADERBOARD_KEY).unwrap(), None);
    }

    #[ntex::test]
    async fn test_get_empty_leaderboard() {
        let app = test_app!(memory_board());
        let req = test::TestRequest::get().uri("/api/leaderboard").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_cors(&resp);
        let body = test::read_body(resp).await;
        let entries: Vec<ScoreEntry> = serde_json::from_slice(&body).unwrap();
        assert!(entries.is_empty());
    }

    #[ntex::test]
    async fn test_post_then_get() {
        let board = memory_board();
        let app = test_app!(board.clone());

        let req = test::TestRequest::post()
            .uri("/api/leaderboard")
            .set_json(&serde_json::json!({ "captchaSeconds": 8.2, "name": "Ann" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_cors(&resp);
        let submitted: SubmitResponse = serde_json::from_slice(&test::read_body(resp).await).unwrap();
        assert!(submitted.success);
        assert_eq!(submitted.leaderboard.len(), 1);
        assert_eq!(submitted.leaderboard[0].name, "Ann");
        assert_eq!(submitted.leaderboard[0].captcha_seconds, 8.2);
        assert!(!submitted.leaderboard[0].id.is_empty());
        assert!(!submitted.leaderboard[0].date.is_empty());

        let req = test::TestRequest::get().uri("/api/leaderboard").to_request();
        let resp = test::call_service(&app, req).await;
        let listed: Vec<ScoreEntry> = serde_json::from_slice(&test::read_body(resp).await).unwrap();
        assert_eq!(listed, submitted.leaderboard);
    }

    #[ntex::test]
    async fn test_post_ranks_entries() {
        let app = test_app!(memory_board());
        let mut last = Vec::new();
        for seconds in [10.0, 3.5, 7.2] {
            let req = test::TestRequest::post()
                .uri("/api/leaderboard")
                .set_json(&serde_json::json!({ "captchaSeconds": seconds }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            let body: SubmitResponse = serde_json::from_slice(&test::read_body(resp).await).unwrap();
            last = body.leaderboard;
        }
        let seconds: Vec<f64> = last.iter().map(|e| e.captcha_seconds).collect();
        assert_eq!(seconds, vec![3.5, 7.2, 10.0]);
    }

    #[ntex::test]
    async fn test_post_missing_captcha_seconds_is_400() {
        let board = memory_board();
        let app = test_app!(board.clone());

        let req = test::TestRequest::post()
            .uri("/api/leaderboard")
            .set_json(&serde_json::json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_cors(&resp);
        let body: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("captchaSeconds"));

        assert!(board.list().unwrap().is_empty());
    }

    #[ntex::test]
    async fn test_post_malformed_body_is_400() {
        let app = test_app!(memory_board());
        let req = test::TestRequest::post()
            .uri("/api/leaderboard")
            .header("content-type", "application/json")
            .set_payload("{\"captchaSeconds\":")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_cors(&resp);
    }

    #[ntex::test]
    async fn test_post_require_name_variant() {
        let board = Arc::new(LeaderboardStore::new(
            Arc::new(MemoryStore::new()),
            LeaderboardOptions {
                require_name: true,
                ..Default::default()
            },
        ));
        let app = test_app!(board);
        let req = test::TestRequest::post()
            .uri("/api/leaderboard")
            .set_json(&serde_json::json!({ "captchaSeconds": 4.0 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[ntex::test]
    async fn test_unreachable_store() {
        let board = Arc::new(LeaderboardStore::new(
            Arc::new(UnreachableStore),
            LeaderboardOptions::default(),
        ));
        let app = test_app!(board);

        let req = test::TestRequest::get().uri("/api/leaderboard").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(&test::read_body(resp).await[..], b"[]");

        let req = test::TestRequest::post()
            .uri("/api/leaderboard")
            .set_json(&serde_json::json!({ "captchaSeconds": 1.0 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_cors(&resp);
        let body: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let resp = test::call_service(&app, req).await;
        let body: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["store"]["backend"], "unreachable");
        assert_eq!(body["store"]["reachable"], false);
    }

    #[ntex::test]
    async fn test_options_preflight() {
        let app = test_app!(memory_board());
        let req = test::TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/api/leaderboard")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_cors(&resp);
        assert!(test::read_body(resp).await.is_empty());
    }

    #[ntex::test]
    async fn test_browser_preflight_gets_wildcard() {
        let app = test_app!(memory_board());
        let req = test::TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/api/leaderboard")
            .header("origin", "https://example.com")
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "content-type")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_cors(&resp);
        assert!(test::read_body(resp).await.is_empty());
    }

    #[ntex::test]
    async fn test_cross_origin_get_gets_wildcard() {
        let app = test_app!(memory_board());
        let req = test::TestRequest::get()
            .uri("/api/leaderboard")
            .header("origin", "https://example.com")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_cors(&resp);
    }

    #[ntex::test]
    async fn test_cross_origin_error_gets_wildcard() {
        let app = test_app!(memory_board());
        let req = test::TestRequest::default()
            .method(Method::DELETE)
            .uri("/api/leaderboard")
            .header("origin", "https://example.com")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_cors(&resp);
    }

    #[ntex::test]
    async fn test_other_methods_not_allowed() {
        let app = test_app!(memory_board());
        let req = test::TestRequest::default()
            .method(Method::DELETE)
            .uri("/api/leaderboard")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_cors(&resp);
    }

    #[ntex::test]
    async fn test_health_ok() {
        let app = test_app!(memory_board());
        let req = test::TestRequest::get().uri("/api/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["store"]["backend"], "memory");
        assert_eq!(body["store"]["reachable"], true);
    }
}
