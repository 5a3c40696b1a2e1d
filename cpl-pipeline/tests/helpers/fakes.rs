//! Fake collaborators for engine tests

use async_trait::async_trait;
use cpl_common::models::{Entity, Sentiment};
use cpl_common::repository::Predicate;
use cpl_common::{InMemoryRepository, Repository, Result};
use cpl_pipeline::clients::{EmailError, EmailRecipient, EmailSender, SentimentAnalyzer};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// Sentiment analyzer returning a fixed label
pub struct ScriptedSentiment {
    label: Mutex<Sentiment>,
    calls: AtomicUsize,
}

impl ScriptedSentiment {
    pub fn new(label: Sentiment) -> Self {
        Self {
            label: Mutex::new(label),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, label: Sentiment) {
        *self.label.lock().unwrap() = label;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SentimentAnalyzer for ScriptedSentiment {
    async fn analyze_sentiment(&self, _text: &str) -> Sentiment {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.label.lock().unwrap()
    }
}

/// One captured dispatch
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub subject: String,
    pub template_name: String,
    pub model: Value,
    pub recipients: Vec<String>,
}

/// Email sender that records every dispatch and can be switched to fail
#[derive(Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<SentEmail>>,
    failing: AtomicBool,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_sends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send_templated_email(
        &self,
        subject: &str,
        template_name: &str,
        _template_version: &str,
        model: &Value,
        recipients: &[EmailRecipient],
    ) -> std::result::Result<(), EmailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmailError::Api(503, "mail service unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(SentEmail {
            subject: subject.to_string(),
            template_name: template_name.to_string(),
            model: model.clone(),
            recipients: recipients.iter().map(|r| r.email.clone()).collect(),
        });
        Ok(())
    }
}

/// In-memory repository that counts every call made through it
pub struct CountingRepository<T: Entity> {
    inner: InMemoryRepository<T>,
    calls: AtomicUsize,
}

impl<T: Entity> CountingRepository<T> {
    pub fn new() -> Self {
        Self {
            inner: InMemoryRepository::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for CountingRepository<T> {
    async fn get(&self, id: Uuid) -> Result<Option<T>> {
        self.count();
        self.inner.get(id).await
    }

    async fn query(&self, predicate: Predicate<'_, T>) -> Result<Vec<T>> {
        self.count();
        self.inner.query(predicate).await
    }

    async fn add(&self, entity: T) -> Result<T> {
        self.count();
        self.inner.add(entity).await
    }

    async fn update(&self, entity: T) -> Result<T> {
        self.count();
        self.inner.update(entity).await
    }
}
