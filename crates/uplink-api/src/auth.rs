//! Access token issuance by client credentials grant.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::TokenService;
use crate::error::{Result, ensure_success};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Client for the OAuth token endpoint.
#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    token_url: Url,
    scope: String,
}

impl AuthClient {
    pub fn new(token_url: &str, scope: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            token_url: Url::parse(token_url)?,
            scope: scope.into(),
        })
    }
}

#[async_trait]
impl TokenService for AuthClient {
    async fn access_token(&self, client_id: &str, client_secret: &str) -> Result<String> {
        tracing::debug!(url = %self.token_url, "requesting access token");
        let resp = self
            .client
            .post(self.token_url.clone())
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials"), ("scope", self.scope.as_str())])
            .send()
            .await?;
        let body: TokenResponse = ensure_success(resp).await?.json().await?;
        Ok(body.access_token)
    }
}
