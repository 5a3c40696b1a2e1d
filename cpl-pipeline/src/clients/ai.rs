//! AI-backed outreach content generation and reply sentiment classification
//!
//! Both capabilities sit behind traits so engines never depend on the
//! network. [`AiClient`] talks to a messages-style LLM HTTP API and degrades
//! to the deterministic [`FallbackAi`] output whenever the API key is not
//! configured or a call fails.

use super::templates::escape_html;
use async_trait::async_trait;
use cpl_common::models::{Prospect, Sentiment};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
const API_VERSION: &str = "2023-06-01";
const REQUESTS_PER_MINUTE: u32 = 30;
const CONTENT_MAX_TOKENS: u32 = 1024;
const SENTIMENT_MAX_TOKENS: u32 = 8;

/// AI client errors
#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI provider not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Generated outreach email content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutreachContent {
    pub subject: String,
    pub html_body: String,
    /// Provider tokens consumed; 0 for fallback content
    pub tokens_used: u32,
}

/// Public identity of the platform, referenced in outreach copy
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformInfo {
    pub name: String,
    pub site_url: String,
}

impl Default for PlatformInfo {
    fn default() -> Self {
        Self {
            name: "TrashMob.eco".to_string(),
            site_url: "https://www.trashmob.eco".to_string(),
        }
    }
}

/// Produces subject and body for one cadence step
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Never fails: implementations fall back to deterministic copy
    async fn generate_outreach_content(
        &self,
        prospect: &Prospect,
        cadence_step: u8,
        nearby_event_count: usize,
    ) -> OutreachContent;
}

/// Classifies the tone of an inbound reply
#[async_trait]
pub trait SentimentAnalyzer: Send + Sync {
    /// Never fails: implementations fall back to `Neutral`
    async fn analyze_sentiment(&self, text: &str) -> Sentiment;
}

/// Deterministic outreach copy for a cadence step
///
/// Always non-empty and always names the prospect and the platform site.
pub fn fallback_outreach_content(
    prospect: &Prospect,
    cadence_step: u8,
    nearby_event_count: usize,
    platform: &PlatformInfo,
) -> OutreachContent {
    let name = &prospect.name;
    let greeting = match prospect.contact_name.as_deref().map(str::trim) {
        Some(contact) if !contact.is_empty() => format!("Hi {},", contact),
        _ => format!("Hello {} team,", name),
    };
    let activity = match nearby_event_count {
        0 => "Volunteers are looking for ways to care for their neighborhoods".to_string(),
        1 => "Volunteers have already organized a cleanup event near you".to_string(),
        n => format!("Volunteers have already organized {} cleanup events near you", n),
    };

    let (subject, paragraph) = match cadence_step {
        1 => (
            format!("Partnering with {} on community cleanups", name),
            format!(
                "{}. We'd love to explore how {} and {} could work together to support local cleanups.",
                activity, name, platform.name
            ),
        ),
        2 => (
            format!("Following up: cleanups in {}", display_place(prospect)),
            format!(
                "I wanted to follow up on my earlier note. Partners like {} help volunteers with supplies, hauling, and local know-how.",
                name
            ),
        ),
        3 => (
            format!("How partners amplify volunteer impact, {}", name),
            format!(
                "{}. Community partners see more volunteers, better-supplied events, and measurable results they can share.",
                activity
            ),
        ),
        _ => (
            format!("One last note for {}", name),
            format!(
                "I don't want to crowd your inbox, so this is my last note for now. If partnering with {} ever becomes a fit for {}, we'd be glad to hear from you.",
                platform.name, name
            ),
        ),
    };

    let html_body = format!(
        "<p>{}</p><p>{}</p><p>Learn more at <a href=\"{url}\">{url}</a>.</p>",
        escape_html(&greeting),
        escape_html(&paragraph),
        url = escape_html(&platform.site_url)
    );

    OutreachContent {
        subject,
        html_body,
        tokens_used: 0,
    }
}

fn display_place(prospect: &Prospect) -> String {
    let city = prospect.location.city.trim();
    if city.is_empty() {
        "your community".to_string()
    } else {
        city.to_string()
    }
}

/// Offline implementation of both AI capabilities
#[derive(Debug, Clone, Default)]
pub struct FallbackAi {
    platform: PlatformInfo,
}

impl FallbackAi {
    pub fn new(platform: PlatformInfo) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ContentGenerator for FallbackAi {
    async fn generate_outreach_content(
        &self,
        prospect: &Prospect,
        cadence_step: u8,
        nearby_event_count: usize,
    ) -> OutreachContent {
        fallback_outreach_content(prospect, cadence_step, nearby_event_count, &self.platform)
    }
}

#[async_trait]
impl SentimentAnalyzer for FallbackAi {
    async fn analyze_sentiment(&self, _text: &str) -> Sentiment {
        Sentiment::Neutral
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeneratedEmail {
    subject: String,
    body: String,
}

/// LLM-backed client for content generation and sentiment
pub struct AiClient {
    http_client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    platform: PlatformInfo,
    rate_limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl AiClient {
    /// Create a client; `api_key` of `None` (or a placeholder) disables calls
    pub fn new(
        api_key: Option<String>,
        model: Option<String>,
        platform: PlatformInfo,
    ) -> Result<Self, AiError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AiError::Network(e.to_string()))?;

        let quota = governor::Quota::per_minute(
            NonZeroU32::new(REQUESTS_PER_MINUTE).unwrap_or(NonZeroU32::MIN),
        );

        Ok(Self {
            http_client,
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.filter(|k| cpl_common::config::is_configured_secret(k)),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            platform,
            rate_limiter: governor::RateLimiter::direct(quota),
        })
    }

    /// Point the client at a different endpoint (proxies, tests)
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// One messages-API round trip returning `(text, tokens_used)`
    async fn complete(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<(String, u32), AiError> {
        let api_key = self.api_key.as_deref().ok_or(AiError::NotConfigured)?;

        self.rate_limiter.until_ready().await;

        let body = json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "system": system,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .http_client
            .post(&self.api_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AiError::Api(status.as_u16(), error_text));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AiError::Parse(e.to_string()))?;

        let text = parsed
            .content
            .into_iter()
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        let tokens = parsed.usage.input_tokens + parsed.usage.output_tokens;

        Ok((text, tokens))
    }

    async fn try_generate(
        &self,
        prospect: &Prospect,
        cadence_step: u8,
        nearby_event_count: usize,
    ) -> Result<OutreachContent, AiError> {
        let system = format!(
            "You write short, warm partnership outreach emails for {} ({}), a platform where volunteers organize community cleanups. \
             Reply with JSON only: {{\"subject\": string, \"body\": string}}. The body is simple HTML paragraphs and must mention {}.",
            self.platform.name, self.platform.site_url, self.platform.site_url
        );
        let prompt = outreach_prompt(prospect, cadence_step, nearby_event_count);

        let (text, tokens_used) = self.complete(&system, &prompt, CONTENT_MAX_TOKENS).await?;
        let generated = parse_generated_email(&text)?;

        Ok(OutreachContent {
            subject: generated.subject,
            html_body: generated.body,
            tokens_used,
        })
    }
}

fn outreach_prompt(prospect: &Prospect, cadence_step: u8, nearby_event_count: usize) -> String {
    let intent = match cadence_step {
        1 => "a first introduction",
        2 => "a friendly follow-up to the introduction",
        3 => "a note sharing the impact partners have",
        _ => "a brief final check-in",
    };
    format!(
        "Write email {step} of 4 ({intent}) to {name}, a {kind} in {city}, {region}, {country}. \
         Population: {population}. Contact: {contact}. Cleanup events already held nearby: {events}.",
        step = cadence_step,
        intent = intent,
        name = prospect.name,
        kind = prospect.organization_type,
        city = prospect.location.city,
        region = prospect.location.region,
        country = prospect.location.country,
        population = prospect
            .population
            .map(|p| p.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        contact = prospect.contact_name.as_deref().unwrap_or("unknown"),
        events = nearby_event_count,
    )
}

/// Extract the `{subject, body}` object, tolerating prose around it
fn parse_generated_email(text: &str) -> Result<GeneratedEmail, AiError> {
    let start = text
        .find('{')
        .ok_or_else(|| AiError::Parse("no JSON object in response".to_string()))?;
    let end = text
        .rfind('}')
        .ok_or_else(|| AiError::Parse("unterminated JSON object".to_string()))?;
    if end < start {
        return Err(AiError::Parse("malformed JSON object".to_string()));
    }

    let generated: GeneratedEmail =
        serde_json::from_str(&text[start..=end]).map_err(|e| AiError::Parse(e.to_string()))?;

    if generated.subject.trim().is_empty() || generated.body.trim().is_empty() {
        return Err(AiError::Parse("empty subject or body".to_string()));
    }
    Ok(generated)
}

#[async_trait]
impl ContentGenerator for AiClient {
    async fn generate_outreach_content(
        &self,
        prospect: &Prospect,
        cadence_step: u8,
        nearby_event_count: usize,
    ) -> OutreachContent {
        if !self.is_configured() {
            debug!(
                prospect_id = %prospect.id,
                "AI not configured, using fallback outreach content"
            );
            return fallback_outreach_content(
                prospect,
                cadence_step,
                nearby_event_count,
                &self.platform,
            );
        }

        match self.try_generate(prospect, cadence_step, nearby_event_count).await {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    prospect_id = %prospect.id,
                    cadence_step,
                    "Outreach generation failed, using fallback: {}", e
                );
                fallback_outreach_content(
                    prospect,
                    cadence_step,
                    nearby_event_count,
                    &self.platform,
                )
            }
        }
    }
}

#[async_trait]
impl SentimentAnalyzer for AiClient {
    async fn analyze_sentiment(&self, text: &str) -> Sentiment {
        if !self.is_configured() || text.trim().is_empty() {
            return Sentiment::Neutral;
        }

        let system = "Classify the sentiment of a reply to a partnership outreach email. \
                      Answer with exactly one word: Positive, Neutral, or Negative.";

        match self.complete(system, text, SENTIMENT_MAX_TOKENS).await {
            Ok((answer, _)) => Sentiment::parse_lenient(&answer),
            Err(e) => {
                warn!("Sentiment analysis failed, defaulting to Neutral: {}", e);
                Sentiment::Neutral
            }
        }
    }
}
