// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token refresh client for the application's WOPI endpoint.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::RefreshError;

/// Request parameters for one refresh call.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshParams {
    pub filename: String,
    pub mode: String,
    pub user_id: String,
    pub user_name: String,
}

/// Body of a successful refresh response.
///
/// Fields default when absent so a structurally valid but incomplete body
/// still deserializes; [`TokenResponse::is_well_formed`] decides whether it
/// is usable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    /// Fresh session URL for the embedded frame.
    #[serde(default)]
    pub url: String,
    /// Fresh access token (embedded in `url`; kept for host-side use).
    #[serde(default)]
    pub access_token: String,
    /// Token lifetime in seconds.
    #[serde(default)]
    pub access_token_ttl: u64,
}

impl TokenResponse {
    /// A response is usable only with a non-empty URL and a positive TTL.
    /// The scheduler discards anything else without mutating state.
    pub fn is_well_formed(&self) -> bool {
        !self.url.is_empty() && self.access_token_ttl > 0
    }
}

/// Source of fresh tokens. The production implementation is
/// [`WopiTokenClient`]; tests script their own.
pub trait TokenSource: Send + Sync + 'static {
    fn refresh_token(
        &self,
        params: RefreshParams,
    ) -> impl Future<Output = Result<TokenResponse, RefreshError>> + Send;
}

/// HTTP client for `GET {base}/wopi/refresh-token`.
pub struct WopiTokenClient {
    base_url: String,
    client: reqwest::Client,
}

impl WopiTokenClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { base_url, client }
    }
}

impl TokenSource for WopiTokenClient {
    async fn refresh_token(&self, params: RefreshParams) -> Result<TokenResponse, RefreshError> {
        let url = format!("{}/wopi/refresh-token", self.base_url);
        let resp = self
            .client
            .get(url)
            .query(&[
                ("filename", params.filename.as_str()),
                ("mode", params.mode.as_str()),
                ("userId", params.user_id.as_str()),
                ("userName", params.user_name.as_str()),
            ])
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RefreshError::Http { status: status.as_u16() });
        }

        resp.json::<TokenResponse>()
            .await
            .map_err(|e| RefreshError::MalformedBody(e.to_string()))
    }
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
