use crate::error::PharosError;
use async_trait::async_trait;
use bytes::Bytes;

#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, PharosError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, PharosError> {
        let parsed = url::Url::parse(url)
            .map_err(|e| PharosError::validation(format!("invalid resource url {url}: {e}")))?;

        let response = self.client.get(parsed).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PharosError::network(format!("{url} returned {status}"))
                .with_property("status", status.as_str()));
        }

        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_is_validation_error() {
        let fetcher = HttpFetcher::new();
        let result = fetcher.fetch("not a url").await;

        match result {
            Err(PharosError::Validation(msg, _)) => assert!(msg.contains("not a url")),
            other => panic!("Expected validation error, got {other:?}"),
        }
    }
}
