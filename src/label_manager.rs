//! Watch-label lookup, creation and application
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::client::GmailClient;
use crate::error::Result;

/// Result of a successful label step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelOutcome {
    /// The modify call succeeded
    Applied,
    /// Gmail rejected the label id with 400 "Invalid label"; treated as a no-op
    InvalidLabel,
}

pub struct LabelManager {
    client: Arc<dyn GmailClient>,
    label_name: String,
    use_created_label_id: bool,
}

impl LabelManager {
    /// Creates a new LabelManager for the watch label
    pub fn new(client: Arc<dyn GmailClient>, label_name: String, use_created_label_id: bool) -> Self {
        Self {
            client,
            label_name,
            use_created_label_id,
        }
    }

    pub fn label_name(&self) -> &str {
        &self.label_name
    }

    /// Make sure the watch label exists and add it to a message
    ///
    /// The add call uses the id found by the initial label listing. When the
    /// label had to be created that lookup found nothing, so the add call
    /// carries no label id unless `use_created_label_id` is set.
    ///
    /// # Returns
    /// * `Ok(LabelOutcome)` - label applied, or rejected as "Invalid label"
    /// * `Err(GmailError)` - listing, creation or any other modify failure
    pub async fn ensure_label_and_add(&self, message_id: &str) -> Result<LabelOutcome> {
        let labels = self.client.list_labels().await?;
        let mut label_ids: Vec<String> = labels
            .into_iter()
            .find(|label| label.name == self.label_name)
            .map(|label| label.id)
            .into_iter()
            .collect();

        if label_ids.is_empty() {
            info!("Creating label: {}", self.label_name);
            let created_id = self.client.create_label(&self.label_name).await?;
            if self.use_created_label_id {
                label_ids.push(created_id);
            } else {
                warn!(
                    "Label '{}' was just created; its id is not used for this message",
                    self.label_name
                );
            }
        }

        info!(message_id, "Adding label: {}", self.label_name);
        match self.client.add_labels(message_id, &label_ids).await {
            Ok(()) => Ok(LabelOutcome::Applied),
            Err(e) if e.is_invalid_label() => {
                warn!("Label does not exist: {}", self.label_name);
                Ok(LabelOutcome::InvalidLabel)
            }
            Err(e) => {
                error!("Failed to add label {}: {}", self.label_name, e);
                Err(e)
            }
        }
    }
}
