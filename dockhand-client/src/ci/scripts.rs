//! Scripting endpoints: label listing and slave-template creation

use dockhand_core::domain::ci::{CiLabel, LabelMatch, TEMPLATE_FAILURE_MARKER};
use tracing::debug;

use super::CiClient;
use crate::error::Result;

/// Script listing the labels of a cloud configuration
pub const LABELS_SCRIPT: &str = "/scriptler/run/getLabels.groovy";

/// Script creating a docker slave template in a cloud configuration
pub const TEMPLATE_SCRIPT: &str = "/scriptler/run/createDockerTemplate.groovy";

impl CiClient {
    /// Fetch the raw label listing of a cloud configuration
    pub async fn list_labels(&self, cloud: &str) -> Result<String> {
        let response = self
            .authed(self.client.get(self.url(LABELS_SCRIPT)))
            .query(&[("cloudName", cloud)])
            .send()
            .await?;

        self.handle_text(response).await
    }

    /// Check that a label does not exist yet in its cloud configuration
    ///
    /// # Returns
    /// `false` when the label is already present in the listing
    pub async fn is_label_unique(&self, label: &CiLabel, mode: LabelMatch) -> Result<bool> {
        let listing = self.list_labels(&label.cloud).await?;
        let taken = mode.matches(&listing, &label.label);
        debug!(
            "Label {} in cloud {}: {} ({:?} match)",
            label.label,
            label.cloud,
            if taken { "taken" } else { "free" },
            mode
        );
        Ok(!taken)
    }

    /// Create a slave template binding `label` to `image`
    ///
    /// # Returns
    /// `false` when the script ran but reported failure
    pub async fn create_template(&self, label: &CiLabel, image: &str) -> Result<bool> {
        let response = self
            .authed(self.client.get(self.url(TEMPLATE_SCRIPT)))
            .query(&[
                ("cloudName", label.cloud.as_str()),
                ("label", label.label.as_str()),
                ("image", image),
            ])
            .send()
            .await?;

        let body = self.handle_text(response).await?;
        Ok(!body.contains(TEMPLATE_FAILURE_MARKER))
    }
}
