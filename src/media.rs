//! Media upload

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::json;

use crate::error::Error;
use crate::fetch::Transport;
use crate::types::MediaUpload;

/// Client for uploading activity media.
pub struct MediaClient {
    transport: Transport,
}

impl MediaClient {
    pub(crate) fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// Upload an image and return its hosted URL. The bytes travel
    /// base64-encoded inside the JSON body, matching the backend's upload
    /// contract.
    pub async fn upload(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<String, Error> {
        let body = json!({
            "fileName": file_name,
            "contentType": content_type,
            "data": STANDARD.encode(bytes),
        });
        let uploaded: MediaUpload = self.transport.post("/media/upload", &body).await?;
        Ok(uploaded.url)
    }
}
