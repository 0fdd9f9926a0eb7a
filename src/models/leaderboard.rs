use serde::{Deserialize, Serialize};

/// One completed run as stored on the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub captcha_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kasada_seconds: Option<f64>,
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub rage_clicks: u32,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub failures: u32,
    #[serde(default)]
    pub skips: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beat_the_clock: Option<bool>,
    #[serde(default)]
    pub date: String,
}

/// Raw `POST` body before defaulting. Every field is optional here so that
/// missing values can be reported or defaulted instead of failing decode.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSubmission {
    pub id: Option<String>,
    pub name: Option<String>,
    pub captcha_seconds: Option<f64>,
    pub kasada_seconds: Option<f64>,
    pub retries: Option<u32>,
    pub rage_clicks: Option<u32>,
    pub attempts: Option<u32>,
    pub failures: Option<u32>,
    pub skips: Option<u32>,
    pub beat_the_clock: Option<bool>,
    pub date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub leaderboard: Vec<ScoreEntry>,
}
