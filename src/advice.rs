//! Daily focus tip: a best-effort text fetched from a generative API.
//!
//! Nothing here touches the timer. Every failure degrades to
//! [`FALLBACK_TIP`].

use crate::persistence::{Database, DatabaseError};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::env;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const FALLBACK_TIP: &str = "Focus on one task. Ignore everything else for now.";

pub const API_KEY_VAR: &str = "POMOCYCLE_TIP_API_KEY";
pub const ENDPOINT_VAR: &str = "POMOCYCLE_TIP_ENDPOINT";
const DEFAULT_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";
const PROMPT: &str = "Give ONE short, calm productivity tip (max 20 words).\nNo emojis. No quotes. Plain text.";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum AdviceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Tip service returned status {0}")]
    Status(u16),
    #[error("Tip service returned no text")]
    Empty,
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Something that can produce a fresh tip.
pub trait TipSource {
    fn fetch(&self) -> Result<String, AdviceError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn first_text(self) -> Option<String> {
        let text = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text?;
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// Fetches tips from a `generateContent` style endpoint.
pub struct HttpTipSource {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
}

impl HttpTipSource {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self, AdviceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    /// Builds a source from the environment. Returns `None` without an API key.
    pub fn from_env() -> Option<Self> {
        let api_key = env::var(API_KEY_VAR).ok().filter(|k| !k.is_empty())?;
        let endpoint = env::var(ENDPOINT_VAR).unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        match Self::new(endpoint, api_key) {
            Ok(source) => Some(source),
            Err(e) => {
                warn!(error = %e, "failed to build tip client");
                None
            }
        }
    }
}

impl TipSource for HttpTipSource {
    fn fetch(&self) -> Result<String, AdviceError> {
        let body = GenerateRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: PROMPT }],
            }],
        };
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()?;

        if !response.status().is_success() {
            return Err(AdviceError::Status(response.status().as_u16()));
        }

        let parsed: GenerateResponse = response.json()?;
        parsed.first_text().ok_or(AdviceError::Empty)
    }
}

fn try_resolve(
    source: Option<&dyn TipSource>,
    db: &Database,
    today: NaiveDate,
) -> Result<String, AdviceError> {
    if let Some(tip) = db.cached_tip(today)? {
        debug!("using cached focus tip");
        return Ok(tip);
    }
    let Some(source) = source else {
        return Ok(FALLBACK_TIP.to_string());
    };
    let tip = source.fetch()?;
    let tip = tip.trim();
    if tip.is_empty() {
        return Err(AdviceError::Empty);
    }
    if let Err(e) = db.cache_tip(today, tip) {
        warn!(error = %e, "failed to cache focus tip");
    }
    Ok(tip.to_string())
}

/// Returns today's tip: cached if present, freshly fetched otherwise, and
/// the fallback text on any failure. The fallback is never cached.
pub fn resolve_tip(source: Option<&dyn TipSource>, db: &Database, today: NaiveDate) -> String {
    try_resolve(source, db, today).unwrap_or_else(|e| {
        warn!(error = %e, "focus tip unavailable, using fallback");
        FALLBACK_TIP.to_string()
    })
}

/// Resolves today's tip on a background thread and hands it to `deliver`.
pub fn spawn_tip_fetch<F>(deliver: F)
where
    F: FnOnce(String) + Send + 'static,
{
    thread::spawn(move || {
        let source = HttpTipSource::from_env();
        let tip = match Database::new() {
            Ok(db) => resolve_tip(
                source.as_ref().map(|s| s as &dyn TipSource),
                &db,
                Local::now().date_naive(),
            ),
            Err(e) => {
                warn!(error = %e, "tip cache unavailable");
                FALLBACK_TIP.to_string()
            }
        };
        info!("focus tip ready");
        deliver(tip);
    });
}
