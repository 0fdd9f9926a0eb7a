use crate::error::AppError;
use crate::models::leaderboard::SubmitResponse;
use crate::services::leaderboard::LeaderboardStore;
use crate::validation;
use chrono::Utc;
use ntex::util::Bytes;
use ntex::web::{self, HttpResponse};
use std::sync::Arc;
use tracing::debug;

pub async fn list_scores(
    board: web::types::State<Arc<LeaderboardStore>>,
) -> Result<HttpResponse, AppError> {
    let entries = board.list()?;
    Ok(HttpResponse::Ok().json(&entries))
}

/// The body is decoded here rather than through the `Json` extractor so that
/// malformed payloads produce the same JSON error shape as validation failures.
pub async fn submit_score(
    board: web::types::State<Arc<LeaderboardStore>>,
    body: Bytes,
) -> Result<HttpResponse, AppError> {
    let entry = validation::parse_submission(&body)
        .and_then(|req| {
            validation::normalize_submission(req, board.options().require_name, Utc::now())
        })
        .inspect_err(|e| debug!(error = %e, "score submission rejected"))?;
    let leaderboard = board.submit(entry)?;
    Ok(HttpResponse::Ok().json(&SubmitResponse {
        success: true,
        leaderboard,
    }))
}

pub async fn preflight() -> HttpResponse {
    HttpResponse::Ok().finish()
}

pub async fn method_not_allowed() -> Result<HttpResponse, AppError> {
    Err(AppError::MethodNotAllowed)
}
