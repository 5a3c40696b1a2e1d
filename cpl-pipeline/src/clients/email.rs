//! Email dispatch
//!
//! The [`EmailSender`] trait mirrors a templated transactional-mail service:
//! callers fetch an HTML template, substitute placeholders, and send the
//! rendered result with a model describing the message.

use super::templates;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// Email dispatch errors
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email service not configured")]
    NotConfigured,

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("No recipients")]
    NoRecipients,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Email API error {0}: {1}")]
    Api(u16, String),
}

/// A message recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecipient {
    pub email: String,
    pub name: Option<String>,
}

impl EmailRecipient {
    pub fn new(email: &str, name: Option<&str>) -> Self {
        Self {
            email: email.trim().to_string(),
            name: name.map(str::to_string),
        }
    }
}

/// Message model fields understood by the senders
pub const MODEL_SUBJECT: &str = "subject";
pub const MODEL_HTML: &str = "html";

/// Build the model for a rendered message
pub fn message_model(subject: &str, html: &str) -> Value {
    json!({ MODEL_SUBJECT: subject, MODEL_HTML: html })
}

/// Transactional email capability
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_templated_email(
        &self,
        subject: &str,
        template_name: &str,
        template_version: &str,
        model: &Value,
        recipients: &[EmailRecipient],
    ) -> Result<(), EmailError>;

    /// Raw template HTML with placeholder tokens
    async fn get_html_template(&self, template_key: &str) -> Result<String, EmailError> {
        templates::html_template(template_key)
            .map(str::to_string)
            .ok_or_else(|| EmailError::TemplateNotFound(template_key.to_string()))
    }
}

/// Sender that only logs; used when no email API key is configured
#[derive(Debug, Clone, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send_templated_email(
        &self,
        subject: &str,
        template_name: &str,
        template_version: &str,
        _model: &Value,
        recipients: &[EmailRecipient],
    ) -> Result<(), EmailError> {
        if recipients.is_empty() {
            return Err(EmailError::NoRecipients);
        }
        let to: Vec<&str> = recipients.iter().map(|r| r.email.as_str()).collect();
        info!(
            template = template_name,
            version = template_version,
            to = ?to,
            "Email not dispatched (log-only sender): {}",
            subject
        );
        Ok(())
    }
}

/// Sender posting to an HTTP mail API
pub struct HttpEmailSender {
    http_client: reqwest::Client,
    send_url: String,
    api_key: String,
    from_address: String,
    from_name: String,
}

impl HttpEmailSender {
    pub fn new(api_key: &str, from_address: &str, from_name: &str) -> Result<Self, EmailError> {
        if !cpl_common::config::is_configured_secret(api_key) {
            return Err(EmailError::NotConfigured);
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| EmailError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            send_url: DEFAULT_SEND_URL.to_string(),
            api_key: api_key.trim().to_string(),
            from_address: from_address.to_string(),
            from_name: from_name.to_string(),
        })
    }

    pub fn with_send_url(mut self, send_url: impl Into<String>) -> Self {
        self.send_url = send_url.into();
        self
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send_templated_email(
        &self,
        subject: &str,
        template_name: &str,
        template_version: &str,
        model: &Value,
        recipients: &[EmailRecipient],
    ) -> Result<(), EmailError> {
        if recipients.is_empty() {
            return Err(EmailError::NoRecipients);
        }

        let html = model
            .get(MODEL_HTML)
            .and_then(Value::as_str)
            .unwrap_or_default();
        let to: Vec<Value> = recipients
            .iter()
            .map(|r| match &r.name {
                Some(name) => json!({ "email": r.email, "name": name }),
                None => json!({ "email": r.email }),
            })
            .collect();

        let body = json!({
            "personalizations": [{ "to": to }],
            "from": { "email": self.from_address, "name": self.from_name },
            "subject": subject,
            "content": [{ "type": "text/html", "value": html }],
            "custom_args": { "template": template_name, "template_version": template_version },
        });

        debug!(template = template_name, recipients = recipients.len(), "Dispatching email");

        let response = self
            .http_client
            .post(&self.send_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmailError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmailError::Api(status.as_u16(), error_text));
        }

        Ok(())
    }
}
