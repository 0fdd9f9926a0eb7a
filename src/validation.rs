use crate::error::AppError;
use crate::models::leaderboard::{ScoreEntry, ScoreSubmission};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

const MAX_PLAYER_NAME_LEN: usize = 32;
const MAX_ID_LEN: usize = 64;

pub fn validate_player_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        "Anonymous".to_string()
    } else {
        trimmed.chars().take(MAX_PLAYER_NAME_LEN).collect()
    }
}

pub fn validate_captcha_seconds(seconds: Option<f64>) -> Result<f64, AppError> {
    match seconds {
        None => Err(AppError::BadRequest("Missing required field: captchaSeconds".into())),
        Some(s) if !s.is_finite() || s < 0.0 => Err(AppError::BadRequest(
            "captchaSeconds must be a non-negative number".into(),
        )),
        Some(s) => Ok(s),
    }
}

pub fn validate_kasada_seconds(seconds: Option<f64>) -> Result<Option<f64>, AppError> {
    match seconds {
        Some(s) if !s.is_finite() || s < 0.0 => Err(AppError::BadRequest(
            "kasadaSeconds must be a non-negative number".into(),
        )),
        other => Ok(other),
    }
}

pub fn parse_submission(body: &[u8]) -> Result<ScoreSubmission, AppError> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Malformed score payload: {}", e)))
}

/// Applies defaulting rules and fills server-generated fields.
pub fn normalize_submission(
    req: ScoreSubmission,
    require_name: bool,
    now: DateTime<Utc>,
) -> Result<ScoreEntry, AppError> {
    let captcha_seconds = validate_captcha_seconds(req.captcha_seconds)?;
    if require_name && req.name.is_none() {
        return Err(AppError::BadRequest("Missing required field: name".into()));
    }
    let kasada_seconds = validate_kasada_seconds(req.kasada_seconds)?;

    let id = match req.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.chars().take(MAX_ID_LEN).collect(),
        _ => Uuid::new_v4().to_string(),
    };
    let date = match req.date {
        Some(date) if !date.trim().is_empty() => date,
        _ => now.to_rfc3339_opts(SecondsFormat::Millis, true),
    };

    Ok(ScoreEntry {
        id,
        name: validate_player_name(req.name.as_deref().unwrap_or_default()),
        captcha_seconds,
        kasada_seconds,
        retries: req.retries.unwrap_or(0),
        rage_clicks: req.rage_clicks.unwrap_or(0),
        attempts: req.attempts.unwrap_or(0),
        failures: req.failures.unwrap_or(0),
        skips: req.skips.unwrap_or(0),
        beat_the_clock: req.beat_the_clock,
        date,
    })
}
