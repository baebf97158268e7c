//! Image domain — pull.

use bollard::query_parameters::CreateImageOptions;
use futures_util::stream::StreamExt;

use super::client::{RuntimeClient, RuntimeError};

/// Split `repo:tag` into its parts; a missing tag means `latest`.
pub fn split_image_tag(image: &str) -> (&str, &str) {
    // The last colon separates the tag unless it belongs to a registry port
    // (`registry:5000/app`), recognisable by a following slash.
    match image.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') => (repo, tag),
        _ => (image, "latest"),
    }
}

impl RuntimeClient {
    /// Pull an image from a registry. Returns when the pull is complete.
    pub async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        let (repo, tag) = split_image_tag(image);
        let options = Some(CreateImageOptions {
            from_image: Some(repo.to_string()),
            tag: Some(tag.to_string()),
            ..Default::default()
        });

        let mut stream = self.client.create_image(options, None, None);
        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    tracing::debug!(status = ?info.status, image, "Image pull progress");
                }
                Err(e) => return Err(RuntimeError::from(e)),
            }
        }
        Ok(())
    }
}
