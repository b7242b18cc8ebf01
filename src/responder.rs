//! Automated reply composition and delivery

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::client::GmailClient;
use crate::error::{GmailError, Result};
use crate::label_manager::{LabelManager, LabelOutcome};
use crate::models::{MessageDetail, OutgoingMessage};

/// What happened to one reply attempt
#[derive(Debug)]
pub enum ReplyOutcome {
    /// Reply sent; `labeled` is false when the label step was a no-op
    Sent { sent_id: String, labeled: bool },
    /// Re-fetching the original failed; nothing was labeled or sent
    FetchFailed(GmailError),
    /// The re-fetched original has no Subject header; nothing was labeled or sent
    MissingSubject(GmailError),
    /// The label step failed, so the reply was not sent
    LabelFailed(GmailError),
    /// Labeled, but the send call failed
    SendFailed(GmailError),
}

impl ReplyOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, ReplyOutcome::Sent { .. })
    }
}

/// Plain-text reply before encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyDraft {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl ReplyDraft {
    /// Reply to `original_subject`, prefixed with `Re: `
    pub fn new(to: &str, original_subject: &str, body: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: format!("Re: {}", original_subject),
            body: body.to_string(),
        }
    }

    pub fn to_rfc822(&self) -> String {
        format!("To: {}\r\nSubject: {}\r\n\r\n{}", self.to, self.subject, self.body)
    }

    /// Standard base64 of the RFC 822 text
    pub fn encode(&self) -> String {
        STANDARD.encode(self.to_rfc822())
    }
}

fn required_header<'a>(message: &'a MessageDetail, header: &'static str) -> Result<&'a str> {
    message
        .header(header)
        .ok_or_else(|| GmailError::MissingHeader {
            message_id: message.id.clone(),
            header,
        })
}

pub struct EmailResponder {
    client: Arc<dyn GmailClient>,
    labels: LabelManager,
    reply_body: String,
}

impl EmailResponder {
    pub fn new(client: Arc<dyn GmailClient>, labels: LabelManager, reply_body: String) -> Self {
        Self {
            client,
            labels,
            reply_body,
        }
    }

    /// Fetch a message, read its sender and subject, and reply to it
    ///
    /// Errors are limited to the first fetch and missing Subject/From
    /// headers; the reply itself reports through [`ReplyOutcome`].
    pub async fn process_email_by_id(&self, id: &str) -> Result<ReplyOutcome> {
        let message = self.client.get_message(id).await?;
        let subject = required_header(&message, "Subject")?;
        let from = required_header(&message, "From")?;
        info!(message_id = id, "Subject: {}", subject);
        info!(message_id = id, "From: {}", from);

        Ok(self.reply_to_email(id, &self.reply_body, from).await)
    }

    /// Label the original message, then send `message` to `to` in its thread
    ///
    /// Never fails: every error is logged and reported in the outcome. The
    /// label is applied before sending, so a label failure suppresses the reply.
    pub async fn reply_to_email(&self, id: &str, message: &str, to: &str) -> ReplyOutcome {
        let original = match self.client.get_message(id).await {
            Ok(original) => original,
            Err(e) => {
                error!(message_id = id, "Error replying to email: {}", e);
                return ReplyOutcome::FetchFailed(e);
            }
        };
        let subject = match required_header(&original, "Subject") {
            Ok(subject) => subject,
            Err(e) => {
                warn!(message_id = id, "Not replying: {}", e);
                return ReplyOutcome::MissingSubject(e);
            }
        };

        let outgoing = OutgoingMessage {
            raw: ReplyDraft::new(to, subject, message).encode(),
            thread_id: original.thread_id.clone(),
        };

        let labeled = match self.labels.ensure_label_and_add(id).await {
            Ok(LabelOutcome::Applied) => true,
            Ok(LabelOutcome::InvalidLabel) => false,
            Err(e) => {
                error!(
                    message_id = id,
                    "Label '{}' could not be applied, reply not sent: {}",
                    self.labels.label_name(),
                    e
                );
                return ReplyOutcome::LabelFailed(e);
            }
        };

        info!(message_id = id, thread_id = %outgoing.thread_id, "Sending reply to {}", to);
        match self.client.send_message(&outgoing).await {
            Ok(sent_id) => {
                if !labeled {
                    warn!(
                        message_id = id,
                        "Reply sent but the thread is not labeled; it may be answered again"
                    );
                }
                ReplyOutcome::Sent { sent_id, labeled }
            }
            Err(e) => {
                error!(message_id = id, "Error replying to email: {}", e);
                ReplyOutcome::SendFailed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{detail, invalid_label_error, MockGmailClient};
    use crate::models::{Header, LabelInfo};
    use mockall::predicate::*;
    use mockall::Sequence;
    use std::sync::Mutex;

    const BODY: &str = "This is an automated reply.";

    fn responder(mock: MockGmailClient) -> EmailResponder {
        let client: Arc<dyn GmailClient> = Arc::new(mock);
        let labels = LabelManager::new(Arc::clone(&client), "AutoReplied".to_string(), false);
        EmailResponder::new(client, labels, BODY.to_string())
    }

    fn watch_label() -> Vec<LabelInfo> {
        vec![LabelInfo {
            id: "Label_7".to_string(),
            name: "AutoReplied".to_string(),
        }]
    }

    fn decode(raw: &str) -> String {
        String::from_utf8(STANDARD.decode(raw).unwrap()).unwrap()
    }

    #[test]
    fn test_draft_subject_and_recipient() {
        let draft = ReplyDraft::new("a@b.com", "Hello", BODY);
        assert_eq!(draft.subject, "Re: Hello");
        assert_eq!(draft.to, "a@b.com");
    }

    #[test]
    fn test_encoded_draft_layout() {
        let draft = ReplyDraft::new("a@b.com", "Hello", BODY);
        let decoded = decode(&draft.encode());

        let (head, body) = decoded.split_once("\r\n\r\n").unwrap();
        let header_lines: Vec<&str> = head.split("\r\n").collect();
        assert_eq!(header_lines, vec!["To: a@b.com", "Subject: Re: Hello"]);
        assert_eq!(body, BODY);
    }

    #[test]
    fn test_encoding_is_standard_base64() {
        // '?' and '>' push the encoding into the '+' and '/' alphabet range
        let draft = ReplyDraft::new("x@y.z", "???>>>", "");
        let encoded = draft.encode();
        assert!(encoded.contains('/') || encoded.contains('+'));
        assert_eq!(decode(&encoded), draft.to_rfc822());
    }

    #[tokio::test]
    async fn test_process_replies_to_sender_in_thread() {
        let sent: Arc<Mutex<Vec<OutgoingMessage>>> = Arc::default();
        let sent_clone = Arc::clone(&sent);

        let mut seq = Sequence::new();
        let mut mock = MockGmailClient::new();
        mock.expect_get_message()
            .with(eq("m1"))
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Ok(detail("m1", "t1", "Hello", "a@b.com")));
        mock.expect_list_labels()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(watch_label()));
        mock.expect_add_labels()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        mock.expect_send_message()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |message| {
                sent_clone.lock().unwrap().push(message.clone());
                Ok("sent-1".to_string())
            });

        let outcome = responder(mock).process_email_by_id("m1").await.unwrap();
        assert!(matches!(
            outcome,
            ReplyOutcome::Sent { ref sent_id, labeled: true } if sent_id == "sent-1"
        ));

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].thread_id, "t1");
        let decoded = decode(&sent[0].raw);
        assert!(decoded.starts_with("To: a@b.com\r\nSubject: Re: Hello\r\n\r\n"));
        assert!(decoded.ends_with(BODY));
    }

    #[tokio::test]
    async fn test_missing_from_header_skips_message() {
        let mut mock = MockGmailClient::new();
        mock.expect_get_message().times(1).returning(|_| {
            Ok(MessageDetail {
                id: "m1".to_string(),
                thread_id: "t1".to_string(),
                headers: vec![Header::new("Subject", "Hello")],
            })
        });
        mock.expect_list_labels().never();
        mock.expect_send_message().never();

        let err = responder(mock).process_email_by_id("m1").await.unwrap_err();
        assert!(matches!(err, GmailError::MissingHeader { header: "From", .. }));
    }

    #[tokio::test]
    async fn test_missing_subject_header_skips_message() {
        let mut mock = MockGmailClient::new();
        mock.expect_get_message().times(1).returning(|_| {
            Ok(MessageDetail {
                id: "m1".to_string(),
                thread_id: "t1".to_string(),
                headers: vec![Header::new("From", "a@b.com")],
            })
        });
        mock.expect_send_message().never();

        let err = responder(mock).process_email_by_id("m1").await.unwrap_err();
        assert!(matches!(err, GmailError::MissingHeader { header: "Subject", .. }));
    }

    #[tokio::test]
    async fn test_first_fetch_failure_propagates() {
        let mut mock = MockGmailClient::new();
        mock.expect_get_message().times(1).returning(|_| {
            Err(GmailError::Api {
                status: 404,
                message: "Requested entity was not found.".to_string(),
            })
        });

        assert!(responder(mock).process_email_by_id("m1").await.is_err());
    }

    #[tokio::test]
    async fn test_label_failure_suppresses_send() {
        let mut mock = MockGmailClient::new();
        mock.expect_get_message()
            .returning(|_| Ok(detail("m1", "t1", "Hello", "a@b.com")));
        mock.expect_list_labels().returning(|| Ok(watch_label()));
        mock.expect_add_labels().times(1).returning(|_, _| {
            Err(GmailError::Api {
                status: 500,
                message: "Backend Error".to_string(),
            })
        });
        mock.expect_send_message().never();

        let outcome = responder(mock).reply_to_email("m1", BODY, "a@b.com").await;
        assert!(matches!(outcome, ReplyOutcome::LabelFailed(_)));
    }

    #[tokio::test]
    async fn test_invalid_label_still_sends() {
        let mut mock = MockGmailClient::new();
        mock.expect_get_message()
            .returning(|_| Ok(detail("m1", "t1", "Hello", "a@b.com")));
        mock.expect_list_labels().returning(|| Ok(watch_label()));
        mock.expect_add_labels()
            .times(1)
            .returning(|_, _| Err(invalid_label_error()));
        mock.expect_send_message()
            .times(1)
            .returning(|_| Ok("sent-1".to_string()));

        let outcome = responder(mock).reply_to_email("m1", BODY, "a@b.com").await;
        assert!(matches!(outcome, ReplyOutcome::Sent { labeled: false, .. }));
    }

    #[tokio::test]
    async fn test_send_failure_is_reported_not_raised() {
        let mut mock = MockGmailClient::new();
        mock.expect_get_message()
            .returning(|_| Ok(detail("m1", "t1", "Hello", "a@b.com")));
        mock.expect_list_labels().returning(|| Ok(watch_label()));
        mock.expect_add_labels().returning(|_, _| Ok(()));
        mock.expect_send_message()
            .times(1)
            .returning(|_| Err(GmailError::NetworkError("reset".to_string())));

        let outcome = responder(mock).reply_to_email("m1", BODY, "a@b.com").await;
        assert!(matches!(outcome, ReplyOutcome::SendFailed(_)));
        assert!(!outcome.is_sent());
    }

    #[tokio::test]
    async fn test_refetch_failure_is_reported() {
        let mut mock = MockGmailClient::new();
        mock.expect_get_message()
            .times(1)
            .returning(|_| Err(GmailError::NetworkError("reset".to_string())));
        mock.expect_list_labels().never();
        mock.expect_send_message().never();

        let outcome = responder(mock).reply_to_email("m1", BODY, "a@b.com").await;
        assert!(matches!(outcome, ReplyOutcome::FetchFailed(_)));
    }

    #[tokio::test]
    async fn test_refetched_message_without_subject_is_not_a_fetch_failure() {
        let mut mock = MockGmailClient::new();
        mock.expect_get_message().times(1).returning(|_| {
            Ok(MessageDetail {
                id: "m1".to_string(),
                thread_id: "t1".to_string(),
                headers: vec![Header::new("From", "a@b.com")],
            })
        });
        mock.expect_list_labels().never();
        mock.expect_send_message().never();

        let outcome = responder(mock).reply_to_email("m1", BODY, "a@b.com").await;
        assert!(matches!(
            outcome,
            ReplyOutcome::MissingSubject(GmailError::MissingHeader { header: "Subject", .. })
        ));
    }
}
