//! HTTP response wrapper.

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::{FetchError, FetchResult};

/// HTTP response wrapper.
pub struct HttpResponse {
    pub status: StatusCode,
    pub url: String,
    pub(crate) response: Response,
}

impl HttpResponse {
    /// Check if the response is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Turn a non-success status into a connection error.
    pub fn error_for_status(self) -> FetchResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(FetchError::status(&self.url, self.status.as_u16()))
        }
    }

    /// Get response body as bytes.
    pub async fn bytes(self) -> FetchResult<Vec<u8>> {
        Ok(self.response.bytes().await.map(|b| b.to_vec())?)
    }

    /// Get response body as text.
    pub async fn text(self) -> FetchResult<String> {
        Ok(self.response.text().await?)
    }

    /// Decode a JSON body.
    pub async fn json<T: DeserializeOwned>(self) -> FetchResult<T> {
        let url = self.url.clone();
        let body = self.text().await?;
        serde_json::from_str(&body).map_err(|e| FetchError::Malformed(format!("{}: {}", url, e)))
    }
}
