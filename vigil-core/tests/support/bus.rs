use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use vigil_core::bus::{BusError, MessageBus, MessageHandler};

/// Bus that keeps every publication and lets tests deliver messages to the
/// registered handlers directly.
#[derive(Default)]
pub struct RecordingBus {
    published: Mutex<Vec<(String, Vec<u8>)>>,
    handlers: Mutex<HashMap<String, Arc<dyn MessageHandler>>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published_count(&self, subject: &str) -> usize {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s == subject)
            .count()
    }

    pub fn published<T: DeserializeOwned>(&self, subject: &str) -> Vec<T> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s == subject)
            .map(|(_, bytes)| serde_json::from_slice(bytes).unwrap())
            .collect()
    }

    pub fn has_handler(&self, subject: &str) -> bool {
        self.handlers.lock().unwrap().contains_key(subject)
    }

    pub async fn deliver<T: Serialize>(
        &self,
        subject: &str,
        payload: &T,
    ) -> Result<(), BusError> {
        let handler = self
            .handlers
            .lock()
            .unwrap()
            .get(subject)
            .cloned()
            .unwrap_or_else(|| panic!("no handler for {subject}"));
        let bytes = serde_json::to_vec(payload).unwrap();
        handler.handle(subject, &bytes).await
    }
}

#[async_trait]
impl MessageBus for RecordingBus {
    async fn publish_bytes(
        &self,
        subject: &str,
        payload: Vec<u8>,
    ) -> Result<(), BusError> {
        self.published
            .lock()
            .unwrap()
            .push((subject.to_string(), payload));
        Ok(())
    }

    async fn subscribe(
        &self,
        subject: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), BusError> {
        let mut handlers = self.handlers.lock().unwrap();
        if handlers.contains_key(subject) {
            return Err(BusError::AlreadySubscribed(subject.to_string()));
        }
        handlers.insert(subject.to_string(), handler);
        Ok(())
    }
}
