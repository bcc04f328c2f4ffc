use serde::{Deserialize, Serialize};

pub const OPENRENT_BASE: &str = "https://www.openrent.co.uk";

/// Search parameters for the OpenRent results page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    /// Site root, used to resolve listing links
    pub base_url: String,
    /// Search term (city)
    pub term: String,
    /// Radius around the term, in miles
    pub radius: u32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            base_url: OPENRENT_BASE.to_string(),
            term: "London".to_string(),
            radius: 2,
        }
    }
}

impl SearchParams {
    pub fn with_radius(radius: u32) -> Self {
        Self {
            radius,
            ..Self::default()
        }
    }

    pub fn search_url(&self) -> String {
        format!(
            "{}/properties-to-rent/{}?term={}&area={}",
            self.base_url.trim_end_matches('/'),
            self.term.to_lowercase(),
            self.term,
            self.radius
        )
    }

    /// Absolute link for an href found on the results page
    pub fn listing_url(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            return href.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            href.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn search_url_carries_radius() {
        assert_eq!(
            SearchParams::with_radius(5).search_url(),
            "https://www.openrent.co.uk/properties-to-rent/london?term=London&area=5"
        );
    }

    #[test]
    fn listing_url_joins_relative_hrefs() {
        let params = SearchParams::default();
        assert_eq!(
            params.listing_url("/property-to-rent/london/2-bed-flat/1234567"),
            "https://www.openrent.co.uk/property-to-rent/london/2-bed-flat/1234567"
        );
        assert_eq!(
            params.listing_url("1234567"),
            "https://www.openrent.co.uk/1234567"
        );
        assert_eq!(
            params.listing_url("https://example.com/1"),
            "https://example.com/1"
        );
    }
}
