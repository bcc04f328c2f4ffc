use anyhow::Result;
use async_trait::async_trait;

/// Where search and detail pages come from
/// Lets the pipeline run against recorded pages as well as the live site
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fully rendered search results page (all lazy-loaded listings present)
    async fn search_page(&self) -> Result<String>;

    /// Raw HTML of one listing's detail page
    async fn detail_page(&self, url: &str) -> Result<String>;

    /// Get the name of the source
    fn source_name(&self) -> &'static str;
}
