use crate::api;
use crate::client::{ApiClient, FetchResult};
use crate::models::Section;

/// Interactive session state: the authenticated client plus the section
/// catalog cache. The cache is tied to the current token and treated as
/// stale as soon as a new token is entered.
pub struct Session {
    pub client: ApiClient,
    sections: Option<Vec<Section>>,
}

impl Session {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            sections: None,
        }
    }

    pub fn renew_token(&mut self, token: String) {
        self.client.set_token(token);
        self.sections = None;
    }

    /// Section catalog, fetched at most once per token session. Sections
    /// rarely change within a run, so repeated selection reuses the cache.
    pub async fn sections(&mut self) -> FetchResult<Vec<Section>> {
        if let Some(cached) = &self.sections {
            return Ok(cached.clone());
        }
        let fetched = api::fetch_sections(&self.client).await?;
        self.sections = Some(fetched.clone());
        Ok(fetched)
    }
}
