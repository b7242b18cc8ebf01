//! Gmail API client seam

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use google_gmail1::api::{Label, Message, ModifyMessageRequest};
use std::future::Future;
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::{GmailHub, GMAIL_MODIFY, GMAIL_READONLY, GMAIL_SEND};
use crate::error::{GmailError, Result};
use crate::models::{Header, LabelInfo, ListQuery, MessageDetail, MessageRef, OutgoingMessage};

/// Mailbox owner alias understood by every Gmail endpoint
pub const USER_ID: &str = "me";

/// Upper bound for any single API call
const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote mail operations used by the autoresponder
#[async_trait]
pub trait GmailClient: Send + Sync {
    /// List one page of message references matching a query
    async fn list_messages(&self, query: &ListQuery) -> Result<Vec<MessageRef>>;

    /// Fetch a message with its headers
    async fn get_message(&self, id: &str) -> Result<MessageDetail>;

    /// List all labels in the account
    async fn list_labels(&self) -> Result<Vec<LabelInfo>>;

    /// Create a label visible in both the label and message lists, returning its id
    async fn create_label(&self, name: &str) -> Result<String>;

    /// Add labels to a message
    async fn add_labels(&self, message_id: &str, label_ids: &[String]) -> Result<()>;

    /// Send a raw message, returning the new message id
    async fn send_message(&self, message: &OutgoingMessage) -> Result<String>;
}

/// Gmail client backed by the google-gmail1 hub
pub struct ProductionGmailClient {
    hub: GmailHub,
}

impl ProductionGmailClient {
    pub fn new(hub: GmailHub) -> Self {
        Self { hub }
    }

    /// Address of the authorized account
    pub async fn account_email(&self) -> Result<String> {
        let (_, profile) = with_timeout(
            "get_profile",
            self.hub
                .users()
                .get_profile(USER_ID)
                .add_scope(GMAIL_READONLY)
                .doit(),
        )
        .await?;

        Ok(profile.email_address.unwrap_or_default())
    }
}

/// Run an API call with a timeout, mapping both failure kinds to GmailError
async fn with_timeout<T, Fut>(operation_name: &str, call: Fut) -> Result<T>
where
    Fut: Future<Output = std::result::Result<T, google_gmail1::Error>>,
{
    match tokio::time::timeout(CALL_TIMEOUT, call).await {
        Ok(result) => result.map_err(GmailError::from),
        Err(_) => {
            warn!("Gmail API {} call timed out after {:?}", operation_name, CALL_TIMEOUT);
            Err(GmailError::NetworkError(format!(
                "API call timed out after {:?}",
                CALL_TIMEOUT
            )))
        }
    }
}

/// Parse Gmail API Message into our MessageDetail structure
fn parse_message_detail(msg: Message) -> Result<MessageDetail> {
    let id = msg
        .id
        .ok_or_else(|| GmailError::InvalidMessageFormat("Missing message ID".to_string()))?;

    let thread_id = msg
        .thread_id
        .ok_or_else(|| GmailError::InvalidMessageFormat("Missing thread ID".to_string()))?;

    let headers = msg
        .payload
        .and_then(|p| p.headers)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|header| match (header.name, header.value) {
            (Some(name), Some(value)) => Some(Header { name, value }),
            _ => None,
        })
        .collect();

    Ok(MessageDetail {
        id,
        thread_id,
        headers,
    })
}

#[async_trait]
impl GmailClient for ProductionGmailClient {
    async fn list_messages(&self, query: &ListQuery) -> Result<Vec<MessageRef>> {
        let (_, response) = with_timeout(
            "list_messages",
            self.hub
                .users()
                .messages_list(USER_ID)
                .q(&query.q)
                .max_results(query.max_results)
                .include_spam_trash(query.include_spam_trash)
                .add_scope(GMAIL_READONLY)
                .doit(),
        )
        .await?;

        let refs: Vec<MessageRef> = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg| match (msg.id, msg.thread_id) {
                (Some(id), Some(thread_id)) => Some(MessageRef { id, thread_id }),
                _ => None,
            })
            .collect();

        debug!("Listed {} messages", refs.len());
        Ok(refs)
    }

    async fn get_message(&self, id: &str) -> Result<MessageDetail> {
        let (_, msg) = with_timeout(
            "get_message",
            self.hub
                .users()
                .messages_get(USER_ID, id)
                .format("metadata")
                .add_metadata_headers("Subject")
                .add_metadata_headers("From")
                .add_scope(GMAIL_READONLY)
                .doit(),
        )
        .await?;

        parse_message_detail(msg)
    }

    async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        let (_, response) = with_timeout(
            "list_labels",
            self.hub
                .users()
                .labels_list(USER_ID)
                .add_scope(GMAIL_READONLY)
                .doit(),
        )
        .await?;

        let labels: Vec<LabelInfo> = response
            .labels
            .unwrap_or_default()
            .into_iter()
            .filter_map(|label| match (label.id, label.name) {
                (Some(id), Some(name)) => Some(LabelInfo { id, name }),
                _ => None,
            })
            .collect();

        debug!("Successfully parsed {} labels", labels.len());
        Ok(labels)
    }

    async fn create_label(&self, name: &str) -> Result<String> {
        let label = Label {
            name: Some(name.to_string()),
            message_list_visibility: Some("show".to_string()),
            label_list_visibility: Some("labelShow".to_string()),
            ..Default::default()
        };

        let (_, created_label) = with_timeout(
            "create_label",
            self.hub
                .users()
                .labels_create(label, USER_ID)
                .add_scope(GMAIL_MODIFY)
                .doit(),
        )
        .await?;

        created_label
            .id
            .ok_or_else(|| GmailError::LabelError("Created label has no ID".to_string()))
    }

    async fn add_labels(&self, message_id: &str, label_ids: &[String]) -> Result<()> {
        // Gmail answers a missing label id with 400 "Invalid label"
        if label_ids.is_empty() {
            debug!(message_id, "No label id to add");
            return Err(GmailError::Api {
                status: 400,
                message: crate::error::INVALID_LABEL_MESSAGE.to_string(),
            });
        }

        let modify_request = ModifyMessageRequest {
            add_label_ids: Some(label_ids.to_vec()),
            remove_label_ids: None,
        };

        with_timeout(
            "modify_message",
            self.hub
                .users()
                .messages_modify(modify_request, USER_ID, message_id)
                .add_scope(GMAIL_MODIFY)
                .doit(),
        )
        .await?;

        Ok(())
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<String> {
        let rfc822 = STANDARD.decode(&message.raw).map_err(|e| {
            GmailError::InvalidMessageFormat(format!("Reply is not valid base64: {}", e))
        })?;

        // The media upload carries the RFC 822 text; the thread id rides in the metadata
        let metadata = Message {
            thread_id: Some(message.thread_id.clone()),
            ..Default::default()
        };

        let (_, sent) = with_timeout(
            "send_message",
            self.hub
                .users()
                .messages_send(metadata, USER_ID)
                .add_scope(GMAIL_SEND)
                .upload(
                    Cursor::new(rfc822),
                    "message/rfc822".parse().map_err(|_| {
                        GmailError::InvalidMessageFormat("Invalid upload MIME type".to_string())
                    })?,
                ),
        )
        .await?;

        Ok(sent.id.unwrap_or_default())
    }
}
