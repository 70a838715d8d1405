//! Side-effect execution for claimed jobs.
//!
//! The worker hands a claimed job to an [`ActionRunner`] and gets back a
//! plain outcome. Runners never touch the store and never error out to the
//! caller: every failure path folds into `(success = false, message)`.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

use super::job::Job;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
}

impl ActionOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Perform the side effect for one attempt of a job.
#[async_trait]
pub trait ActionRunner: Send + Sync {
    async fn run(&self, job: &Job, attempt: i32) -> ActionOutcome;
}

/// Action selected from the job payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    /// POST a small JSON notification to the payload's webhook URL.
    Webhook(Url),
    /// Fetch a quote from the configured public endpoint.
    FetchQuote,
}

/// Pick the action for a job: a well-formed `http(s)` URL under
/// `payload.webhook_url` (or `callback_url`) selects the webhook, anything
/// else falls back to the quote fetch.
pub fn resolve_action(payload: Option<&Value>) -> ActionKind {
    let candidate = payload
        .and_then(|p| p.get("webhook_url").or_else(|| p.get("callback_url")))
        .and_then(Value::as_str);

    if let Some(raw) = candidate {
        if let Ok(url) = Url::parse(raw) {
            if matches!(url.scheme(), "http" | "https") {
                return ActionKind::Webhook(url);
            }
        }
    }

    ActionKind::FetchQuote
}

/// Knobs for the simulated portion of an attempt, used to exercise retry
/// paths: an artificial delay window and a probability of failing before
/// the real action runs.
#[derive(Debug, Clone)]
pub struct ExecutionSettings {
    pub min_sleep_secs: u64,
    pub max_sleep_secs: u64,
    pub failure_probability: f64,
    pub quote_api_url: String,
}

/// Production runner: webhook delivery or quote fetch over HTTP, with the
/// simulation knobs applied first.
pub struct HttpActionRunner {
    client: reqwest::Client,
    settings: ExecutionSettings,
}

impl HttpActionRunner {
    pub fn new(settings: ExecutionSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

        Ok(Self { client, settings })
    }

    async fn simulated_delay(&self) {
        let min = self.settings.min_sleep_secs.min(self.settings.max_sleep_secs) as f64;
        let max = self.settings.min_sleep_secs.max(self.settings.max_sleep_secs) as f64;
        let secs = if max > min {
            min + fastrand::f64() * (max - min)
        } else {
            min
        };
        if secs > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(secs)).await;
        }
    }

    async fn post_webhook(&self, url: Url, job: &Job, attempt: i32) -> ActionOutcome {
        let body = json!({
            "job_id": job.id,
            "job_name": job.name,
            "run_at": job.run_at,
            "schedule_type": job.schedule_type,
            "attempt": attempt,
        });

        match self.client.post(url.clone()).json(&body).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                if response.status().is_success() {
                    ActionOutcome::success(format!("webhook {} answered HTTP {}", url, status))
                } else {
                    ActionOutcome::failure(format!("webhook {} answered HTTP {}", url, status))
                }
            }
            Err(e) => ActionOutcome::failure(format!("webhook request failed: {}", e)),
        }
    }

    async fn fetch_quote(&self) -> ActionOutcome {
        let response = match self.client.get(&self.settings.quote_api_url).send().await {
            Ok(response) => response,
            Err(e) => return ActionOutcome::failure(format!("quote request failed: {}", e)),
        };

        if response.status() != reqwest::StatusCode::OK {
            return ActionOutcome::failure(format!(
                "quote endpoint answered HTTP {}",
                response.status().as_u16()
            ));
        }

        match response.json::<Value>().await {
            Ok(body) => ActionOutcome::success(summarize_quote(&body)),
            Err(e) => ActionOutcome::failure(format!("quote response did not parse: {}", e)),
        }
    }
}

#[async_trait]
impl ActionRunner for HttpActionRunner {
    async fn run(&self, job: &Job, attempt: i32) -> ActionOutcome {
        self.simulated_delay().await;

        if self.settings.failure_probability > 0.0
            && fastrand::f64() < self.settings.failure_probability
        {
            return ActionOutcome::failure("Simulated failure");
        }

        match resolve_action(job.payload.as_ref()) {
            ActionKind::Webhook(url) => self.post_webhook(url, job, attempt).await,
            ActionKind::FetchQuote => self.fetch_quote().await,
        }
    }
}

/// Squeeze a fetched quote body into a one-line result. Understands the
/// common `[{"q": ..., "a": ...}]` shape, falls back to a size summary.
fn summarize_quote(body: &Value) -> String {
    if let Some(first) = body.as_array().and_then(|a| a.first()) {
        let quote = first.get("q").and_then(Value::as_str);
        let author = first.get("a").and_then(Value::as_str);
        if let (Some(quote), Some(author)) = (quote, author) {
            return format!("\"{}\" - {}", quote, author);
        }
    }

    format!("fetched quote payload ({} bytes)", body.to_string().len())
}
