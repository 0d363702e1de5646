use anyhow::{Context, Result};
use async_trait::async_trait;
use authoring_core::service::{
    ContentInstance, ContentService, ContentType, ContentTypeDirectory, ContentTypeLookup, SearchQuery, SearchResult,
    SearchService,
};
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Talks to an `authoring-server` over its JSON API.
#[derive(Clone)]
pub struct HttpSearchClient {
    client: Client,
    base: Url,
}

impl HttpSearchClient {
    pub fn new(server: &str, timeout: Duration) -> Result<Self> {
        let address = if server.contains("://") { server.to_string() } else { format!("http://{server}") };
        let mut base = Url::parse(&address).with_context(|| format!("invalid server address: {server}"))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder()
            .user_agent(concat!("authoring-cli/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, site: &str, tail: &str) -> Result<Url> {
        Ok(self.base.join(&format!("api/{site}/{tail}"))?)
    }
}

#[async_trait]
impl SearchService for HttpSearchClient {
    async fn search(&self, site: &str, query: &SearchQuery) -> Result<SearchResult> {
        let url = self.endpoint(site, "search")?;
        let resp = self.client.post(url).json(query).send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl ContentService for HttpSearchClient {
    async fn get_content_instance(&self, site: &str, path: &str, _lookup: &ContentTypeLookup) -> Result<ContentInstance> {
        let mut url = self.endpoint(site, "content")?;
        url.query_pairs_mut().append_pair("path", path);
        let resp = self.client.get(url).send().await?.error_for_status()
            .with_context(|| format!("loading content instance {path}"))?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl ContentTypeDirectory for HttpSearchClient {
    async fn content_types(&self, site: &str) -> Result<Vec<ContentType>> {
        let url = self.endpoint(site, "content-types")?;
        let resp = self.client.get(url).send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_keep_the_base_path() {
        let client = HttpSearchClient::new("http://localhost:8080/authoring", Duration::from_secs(1)).unwrap();
        assert_eq!(client.endpoint("editorial", "search").unwrap().as_str(), "http://localhost:8080/authoring/api/editorial/search");

        let client = HttpSearchClient::new("localhost:8080", Duration::from_secs(1)).unwrap();
        assert_eq!(client.endpoint("editorial", "content-types").unwrap().as_str(), "http://localhost:8080/api/editorial/content-types");
    }
}
