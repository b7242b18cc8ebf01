//! Common test utilities and fixtures

#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD, Engine as _};
use gmail_autoresponder::client::GmailClient;
use gmail_autoresponder::config::Config;
use gmail_autoresponder::error::{GmailError, Result, INVALID_LABEL_MESSAGE};
use gmail_autoresponder::models::{
    Header, LabelInfo, ListQuery, MessageDetail, MessageRef, OutgoingMessage,
};
use mockall::mock;

pub const WATCH_LABEL: &str = "AutoReplied";

/// Config with the watch label set and everything else defaulted
pub fn test_config() -> Config {
    Config {
        label_to_watch: WATCH_LABEL.to_string(),
        ..Default::default()
    }
}

/// Create a test message with Subject and From headers
pub fn create_test_message(id: &str, thread_id: &str, from: &str, subject: &str) -> MessageDetail {
    MessageDetail {
        id: id.to_string(),
        thread_id: thread_id.to_string(),
        headers: vec![
            Header::new("Date", "Mon, 1 Jan 2024 10:00:00 -0800"),
            Header::new("From", from),
            Header::new("Subject", subject),
            Header::new("To", "me@example.com"),
        ],
    }
}

pub fn create_test_refs(pairs: &[(&str, &str)]) -> Vec<MessageRef> {
    pairs
        .iter()
        .map(|(id, thread_id)| MessageRef::new(*id, *thread_id))
        .collect()
}

/// Create a test LabelInfo
pub fn create_test_label_info(id: &str, name: &str) -> LabelInfo {
    LabelInfo {
        id: id.to_string(),
        name: name.to_string(),
    }
}

/// Gmail's answer to a modify call naming no usable label
pub fn invalid_label_error() -> GmailError {
    GmailError::Api {
        status: 400,
        message: INVALID_LABEL_MESSAGE.to_string(),
    }
}

pub fn decode_raw(message: &OutgoingMessage) -> String {
    String::from_utf8(STANDARD.decode(&message.raw).unwrap()).unwrap()
}

// Mock implementation of GmailClient for testing
mock! {
    pub GmailClient {}

    #[async_trait::async_trait]
    impl GmailClient for GmailClient {
        async fn list_messages(&self, query: &ListQuery) -> Result<Vec<MessageRef>>;
        async fn get_message(&self, id: &str) -> Result<MessageDetail>;
        async fn list_labels(&self) -> Result<Vec<LabelInfo>>;
        async fn create_label(&self, name: &str) -> Result<String>;
        async fn add_labels(&self, message_id: &str, label_ids: &[String]) -> Result<()>;
        async fn send_message(&self, message: &OutgoingMessage) -> Result<String>;
    }
}
