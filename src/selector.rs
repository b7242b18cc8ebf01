//! Candidate selection: unread, recent, not self-sent, not yet labeled

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

use crate::client::GmailClient;
use crate::config::QueryConfig;
use crate::error::GmailError;
use crate::models::{ListQuery, MessageRef};

/// Result of one selection call
#[derive(Debug)]
pub enum Selection {
    /// Thread heads to reply to, in listing order
    Candidates(Vec<String>),
    /// The query matched nothing, or nothing survived the thread filter
    Empty,
    /// The list call failed; the next pass is the retry
    Failed(GmailError),
}

impl Selection {
    /// Ids to process; empty for both `Empty` and `Failed`
    pub fn ids(&self) -> &[String] {
        match self {
            Selection::Candidates(ids) => ids,
            Selection::Empty | Selection::Failed(_) => &[],
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Selection::Failed(_))
    }
}

/// Build the Gmail search expression for one pass
///
/// Shape: `-label:<watch> [label:test] newer_than:<age> AND -from:me [is:unread]`
pub fn build_search_query(
    label_to_watch: &str,
    newer_than: &str,
    test_label_only: bool,
    unread_only: bool,
) -> String {
    let mut terms = vec![format!("-label:{}", quote_label(label_to_watch))];
    if test_label_only {
        terms.push("label:test".to_string());
    }
    terms.push(format!("newer_than:{}", newer_than));
    terms.push("AND".to_string());
    terms.push("-from:me".to_string());
    if unread_only {
        terms.push("is:unread".to_string());
    }
    terms.join(" ")
}

fn quote_label(name: &str) -> String {
    if name.chars().any(char::is_whitespace) {
        format!("\"{}\"", name)
    } else {
        name.to_string()
    }
}

/// Keep messages whose thread appears exactly once in the page
///
/// A thread with several messages in the same page already has a reply in
/// flight and is skipped entirely. Listing order is preserved.
pub fn first_time_emails(messages: &[MessageRef]) -> Vec<String> {
    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    for message in messages {
        *occurrences.entry(message.thread_id.as_str()).or_insert(0) += 1;
    }

    messages
        .iter()
        .filter(|message| occurrences.get(message.thread_id.as_str()) == Some(&1))
        .map(|message| message.id.clone())
        .collect()
}

pub struct EmailSelector {
    client: Arc<dyn GmailClient>,
    label_to_watch: String,
    query: QueryConfig,
}

impl EmailSelector {
    pub fn new(client: Arc<dyn GmailClient>, label_to_watch: String, query: QueryConfig) -> Self {
        Self {
            client,
            label_to_watch,
            query,
        }
    }

    pub fn list_query(&self, test_label_only: bool, unread_only: bool) -> ListQuery {
        ListQuery {
            q: build_search_query(
                &self.label_to_watch,
                &self.query.newer_than,
                test_label_only,
                unread_only,
            ),
            max_results: self.query.max_results,
            include_spam_trash: self.query.include_spam_trash,
        }
    }

    /// Query the mailbox and return the first-time emails of this page
    pub async fn select_candidate_thread_heads(
        &self,
        test_label_only: bool,
        unread_only: bool,
    ) -> Selection {
        let query = self.list_query(test_label_only, unread_only);
        info!(query = %query.q, "Searching for first-time emails");

        let messages = match self.client.list_messages(&query).await {
            Ok(messages) => messages,
            Err(e) => {
                error!("The API returned an error while listing messages: {}", e);
                return Selection::Failed(e);
            }
        };

        if messages.is_empty() {
            info!("No messages found");
            return Selection::Empty;
        }

        let ids = first_time_emails(&messages);
        info!(
            "{} of {} listed messages are first-time emails",
            ids.len(),
            messages.len()
        );

        if ids.is_empty() {
            Selection::Empty
        } else {
            Selection::Candidates(ids)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::MockGmailClient;
    use proptest::prelude::*;

    fn refs(pairs: &[(&str, &str)]) -> Vec<MessageRef> {
        pairs
            .iter()
            .map(|(id, thread)| MessageRef::new(*id, *thread))
            .collect()
    }

    fn selector(mock: MockGmailClient) -> EmailSelector {
        EmailSelector::new(
            Arc::new(mock),
            "AutoReplied".to_string(),
            QueryConfig::default(),
        )
    }

    #[test]
    fn test_query_default_pass() {
        assert_eq!(
            build_search_query("AutoReplied", "1d", false, true),
            "-label:AutoReplied newer_than:1d AND -from:me is:unread"
        );
    }

    #[test]
    fn test_query_with_test_label_and_read_messages() {
        assert_eq!(
            build_search_query("AutoReplied", "1d", true, false),
            "-label:AutoReplied label:test newer_than:1d AND -from:me"
        );
    }

    #[test]
    fn test_query_quotes_label_with_spaces() {
        assert_eq!(
            build_search_query("Auto Replied", "2d", false, false),
            "-label:\"Auto Replied\" newer_than:2d AND -from:me"
        );
    }

    #[test]
    fn test_list_query_uses_page_settings() {
        let selector = selector(MockGmailClient::new());
        let query = selector.list_query(false, true);
        assert_eq!(query.max_results, 10);
        assert!(query.include_spam_trash);
        assert!(query.q.starts_with("-label:AutoReplied "));
    }

    #[test]
    fn test_first_time_emails_drops_repeated_threads() {
        let page = refs(&[("m1", "t1"), ("m2", "t2"), ("m3", "t1"), ("m4", "t3")]);
        assert_eq!(first_time_emails(&page), vec!["m2", "m4"]);
    }

    #[test]
    fn test_first_time_emails_empty_page() {
        assert!(first_time_emails(&[]).is_empty());
    }

    proptest! {
        #[test]
        fn prop_selected_iff_thread_occurs_once(
            threads in proptest::collection::vec(0u8..6, 0..20)
        ) {
            let page: Vec<MessageRef> = threads
                .iter()
                .enumerate()
                .map(|(i, t)| MessageRef::new(format!("m{}", i), format!("t{}", t)))
                .collect();

            let selected = first_time_emails(&page);

            let singles: Vec<String> = page
                .iter()
                .filter(|m| page.iter().filter(|o| o.thread_id == m.thread_id).count() == 1)
                .map(|m| m.id.clone())
                .collect();

            prop_assert_eq!(selected, singles);
        }
    }

    #[tokio::test]
    async fn test_select_returns_candidates_in_order() {
        let mut mock = MockGmailClient::new();
        mock.expect_list_messages()
            .withf(|query| query.q.contains("-label:AutoReplied") && query.max_results == 10)
            .times(1)
            .returning(|_| Ok(refs(&[("m3", "t3"), ("m1", "t1"), ("m2", "t3")])));

        let selection = selector(mock).select_candidate_thread_heads(false, true).await;
        assert_eq!(selection.ids(), ["m1".to_string()]);
    }

    #[tokio::test]
    async fn test_select_zero_messages_is_empty() {
        let mut mock = MockGmailClient::new();
        mock.expect_list_messages()
            .times(1)
            .returning(|_| Ok(Vec::new()));

        let selection = selector(mock).select_candidate_thread_heads(false, true).await;
        assert!(matches!(selection, Selection::Empty));
        assert!(selection.ids().is_empty());
    }

    #[tokio::test]
    async fn test_select_all_threads_repeated_is_empty() {
        let mut mock = MockGmailClient::new();
        mock.expect_list_messages()
            .times(1)
            .returning(|_| Ok(refs(&[("m1", "t1"), ("m2", "t1")])));

        let selection = selector(mock).select_candidate_thread_heads(false, true).await;
        assert!(matches!(selection, Selection::Empty));
    }

    #[tokio::test]
    async fn test_select_api_error_is_failed_not_panic() {
        let mut mock = MockGmailClient::new();
        mock.expect_list_messages().times(1).returning(|_| {
            Err(GmailError::Api {
                status: 503,
                message: "Backend Error".to_string(),
            })
        });

        let selection = selector(mock).select_candidate_thread_heads(false, true).await;
        assert!(selection.is_failed());
        assert!(selection.ids().is_empty());
    }
}
