use async_trait::async_trait;
use chrono::Utc;
use quantia::domain::ports::WebhookSender;
use quantia::domain::transaction::{Amount, Transaction};
use quantia::domain::webhook::{WebhookPayload, WebhookUrl};
use quantia::error::{PaymentError, Result};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::time::Instant;

/// Records every call and fails a configurable number of times per URL.
#[derive(Default)]
pub struct RecordingSender {
    failures: HashMap<String, u32>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl RecordingSender {
    pub fn failing(url: &str, failures: u32) -> Self {
        Self::default().and_failing(url, failures)
    }

    pub fn and_failing(mut self, url: &str, failures: u32) -> Self {
        self.failures.insert(url.to_string(), failures);
        self
    }

    pub fn calls_to(&self, url: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, at)| *at)
            .collect()
    }
}

#[async_trait]
impl WebhookSender for RecordingSender {
    async fn deliver(&self, payload: &WebhookPayload) -> Result<()> {
        let url = payload.url.as_str().to_string();
        let mut calls = self.calls.lock().unwrap();
        let previous = calls.iter().filter(|(u, _)| *u == url).count() as u32;
        calls.push((url.clone(), Instant::now()));

        if previous < self.failures.get(&url).copied().unwrap_or(0) {
            Err(PaymentError::DeliveryFailed(format!("{url} unavailable")))
        } else {
            Ok(())
        }
    }
}

pub fn payload(url: &str, amount: Decimal) -> WebhookPayload {
    let tx = Transaction::new(Amount::new(amount).unwrap());
    WebhookPayload::from_transaction(&tx, WebhookUrl::parse(url).unwrap(), Utc::now())
}
