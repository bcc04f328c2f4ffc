use crate::config::{FailurePolicy, Pacing};
use crate::models::{Flag, Listing, ListingId, ListingSummary};
use crate::normalize;
use crate::scrapers::browser::SearchPageRenderer;
use crate::scrapers::traits::ListingSource;
use crate::scrapers::types::SearchParams;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info, warn};

const SUMMARY: &str = r#"[class="pli clearfix"]"#;
const TITLE: &str = ".property-title";
const DESCRIPTION: &str = ".description";
const OVERVIEW_TABLE: &str = r#"[class="table table-striped intro-stats"]"#;
const DETAIL_TABLE: &str = r#"[class="table table-striped"]"#;
const TRANSPORT_TABLE: &str = r#"[class="table table-striped mt-1"]"#;

/// Header cells preceding the first station row in the transport table
const TRANSPORT_HEADER_CELLS: usize = 4;

/// Live OpenRent: browser for the search page, plain HTTP for detail pages
pub struct OpenRentSource {
    client: Client,
    params: SearchParams,
    pacing: Pacing,
}

impl OpenRentSource {
    pub fn new(params: SearchParams, pacing: Pacing) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            params,
            pacing,
        })
    }
}

#[async_trait]
impl ListingSource for OpenRentSource {
    async fn search_page(&self) -> Result<String> {
        let url = self.params.search_url();
        let pacing = self.pacing.clone();

        // The browser lives only inside this closure, so Chrome exits as soon
        // as the page source is captured or an error surfaces.
        tokio::task::spawn_blocking(move || {
            let renderer = SearchPageRenderer::launch(pacing)?;
            renderer.render(&url)
        })
        .await
        .context("Browser task panicked")?
    }

    async fn detail_page(&self, url: &str) -> Result<String> {
        debug!("Fetching URL: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {url}"))?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch {}: {}", url, response.status());
        }

        response.text().await.context("Failed to read response body")
    }

    fn source_name(&self) -> &'static str {
        "OpenRent"
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector `{css}`: {e:?}"))
}

/// Every listing summary on a rendered results page, in page order
pub fn parse_search_results(html: &str, params: &SearchParams) -> Result<Vec<ListingSummary>> {
    let document = Html::parse_document(html);
    let summary = selector(SUMMARY)?;

    let mut summaries = Vec::new();
    for element in document.select(&summary) {
        let Some(href) = element.value().attr("href") else {
            warn!("Listing summary without href, skipping");
            continue;
        };
        let link = params.listing_url(href);
        let last_segment = link.rsplit('/').next().unwrap_or_default();
        match ListingId::parse(last_segment) {
            Ok(id) => summaries.push(ListingSummary { id, link }),
            Err(e) => warn!("Skipping listing link {link}: {e}"),
        }
    }

    info!("Found {} listings on search page", summaries.len());
    Ok(summaries)
}

struct TitleGroup {
    title: Option<String>,
    postcode: Option<String>,
}

struct Overview {
    location: String,
    bedrooms: i64,
    bathrooms: i64,
    max_tenants: i64,
}

struct Prices {
    deposit: i64,
    rent_pcm: i64,
    bills_included: Flag,
}

struct Preferences {
    student: Flag,
    family: Flag,
    pet: Flag,
    smoker: Flag,
}

struct Availability {
    available_from: String,
    min_tenancy_months: i64,
}

struct Features {
    garden: Flag,
    parking: Flag,
    fireplace: Flag,
    furnishing: String,
}

struct Transport {
    stations: Vec<String>,
    closest_station_mins: i64,
}

/// Detail page extraction for one listing
///
/// Each section of the page is read independently. A missing or malformed
/// section either takes its sentinel values or, under
/// [`FailurePolicy::SkipListing`], fails the whole listing.
pub fn extract_listing(
    html: &str,
    summary: &ListingSummary,
    reference_date: NaiveDate,
    policy: FailurePolicy,
) -> Result<Listing> {
    let doc = Html::parse_document(html);
    let id = &summary.id;

    let title = resolve(title_group(&doc), policy, id, "title", || TitleGroup {
        title: None,
        postcode: None,
    })?;
    let description = resolve(description(&doc), policy, id, "description", || None)?;
    let overview = resolve(overview(&doc), policy, id, "overview", || Overview {
        location: "London".to_string(),
        bedrooms: -1,
        bathrooms: -1,
        max_tenants: -1,
    })?;
    let prices = resolve(prices(&doc), policy, id, "price", || Prices {
        deposit: -1,
        rent_pcm: -1,
        bills_included: Flag::Undefined,
    })?;
    let prefs = resolve(preferences(&doc), policy, id, "tenant preferences", || {
        Preferences {
            student: Flag::Undefined,
            family: Flag::Undefined,
            pet: Flag::Undefined,
            smoker: Flag::Undefined,
        }
    })?;
    let avail = resolve(
        availability(&doc, reference_date),
        policy,
        id,
        "availability",
        || Availability {
            available_from: "Undefined".to_string(),
            min_tenancy_months: -1,
        },
    )?;
    let features = resolve(features(&doc), policy, id, "features", || Features {
        garden: Flag::Undefined,
        parking: Flag::Undefined,
        fireplace: Flag::Undefined,
        furnishing: "Undefined".to_string(),
    })?;
    let transport = resolve(transport(&doc), policy, id, "transport", || Transport {
        stations: vec!["Undefined".to_string()],
        closest_station_mins: -1,
    })?;

    Ok(Listing {
        property_id: summary.id.clone(),
        property_link: summary.link.clone(),
        listing_title: title.title,
        description,
        location: overview.location,
        num_bedrooms: overview.bedrooms,
        num_bathrooms: overview.bathrooms,
        max_tenants: overview.max_tenants,
        deposit: prices.deposit,
        rent_pcm: prices.rent_pcm,
        bills_included: prices.bills_included,
        student_friendly: prefs.student,
        family_friendly: prefs.family,
        pet_friendly: prefs.pet,
        smoker_friendly: prefs.smoker,
        available_from: avail.available_from,
        min_tenancy_months: avail.min_tenancy_months,
        garden: features.garden,
        parking: features.parking,
        fireplace: features.fireplace,
        furnishing: features.furnishing,
        nearby_stations: transport.stations,
        closest_station_mins: transport.closest_station_mins,
        postcode: title.postcode,
        scrape_date: reference_date,
        predicted_price: None,
    })
}

fn resolve<T>(
    group: Result<T>,
    policy: FailurePolicy,
    id: &ListingId,
    section: &str,
    fallback: impl FnOnce() -> T,
) -> Result<T> {
    match (group, policy) {
        (Ok(value), _) => Ok(value),
        (Err(e), FailurePolicy::FillSentinels) => {
            debug!("Listing {id}: {section} section unreadable ({e:#}), using sentinels");
            Ok(fallback())
        }
        (Err(e), FailurePolicy::SkipListing) => {
            Err(e.context(format!("listing {id}: {section} section unreadable")))
        }
    }
}

fn first<'a>(doc: &'a Html, css: &str) -> Result<ElementRef<'a>> {
    doc.select(&selector(css)?)
        .next()
        .ok_or_else(|| anyhow!("no element matches `{css}`"))
}

fn detail_table(doc: &Html, n: usize) -> Result<ElementRef<'_>> {
    doc.select(&selector(DETAIL_TABLE)?)
        .nth(n)
        .ok_or_else(|| anyhow!("detail table #{n} missing"))
}

fn cells(table: ElementRef<'_>) -> Result<Vec<ElementRef<'_>>> {
    Ok(table.select(&selector("td")?).collect())
}

fn cell<'a>(cells: &[ElementRef<'a>], i: usize) -> Result<ElementRef<'a>> {
    cells
        .get(i)
        .copied()
        .ok_or_else(|| anyhow!("cell {i} missing (table has {})", cells.len()))
}

fn text_at(cells: &[ElementRef<'_>], i: usize) -> Result<String> {
    Ok(normalize::cell_text(cell(cells, i)?))
}

fn int_at(cells: &[ElementRef<'_>], i: usize) -> Result<i64> {
    let text = text_at(cells, i)?;
    text.parse()
        .with_context(|| format!("cell {i} is not an integer: {text:?}"))
}

fn flag_at(cells: &[ElementRef<'_>], i: usize) -> Result<Flag> {
    Ok(normalize::amenity_flag(cell(cells, i)?))
}

/// Present but blank text is recorded as absent
fn non_empty(text: String) -> Option<String> {
    (!text.is_empty()).then_some(text)
}

fn title_group(doc: &Html) -> Result<TitleGroup> {
    let title = non_empty(normalize::cell_text(first(doc, TITLE)?));
    let postcode = title.as_deref().and_then(normalize::postcode_from_title);
    Ok(TitleGroup { title, postcode })
}

fn description(doc: &Html) -> Result<Option<String>> {
    Ok(non_empty(normalize::cell_text(first(doc, DESCRIPTION)?)))
}

fn overview(doc: &Html) -> Result<Overview> {
    let rows = cells(first(doc, OVERVIEW_TABLE)?)?;
    Ok(Overview {
        location: text_at(&rows, 1)?,
        bedrooms: int_at(&rows, 3)?,
        bathrooms: int_at(&rows, 5)?,
        max_tenants: int_at(&rows, 7)?,
    })
}

fn prices(doc: &Html) -> Result<Prices> {
    let rows = cells(detail_table(doc, 0)?)?;
    let deposit = text_at(&rows, 1)?;
    let rent = text_at(&rows, 3)?;
    Ok(Prices {
        deposit: normalize::currency(&deposit)
            .ok_or_else(|| anyhow!("unreadable deposit {deposit:?}"))?,
        rent_pcm: normalize::currency(&rent).ok_or_else(|| anyhow!("unreadable rent {rent:?}"))?,
        bills_included: flag_at(&rows, 5)?,
    })
}

fn preferences(doc: &Html) -> Result<Preferences> {
    let rows = cells(detail_table(doc, 1)?)?;
    Ok(Preferences {
        student: flag_at(&rows, 1)?,
        family: flag_at(&rows, 3)?,
        pet: flag_at(&rows, 5)?,
        smoker: flag_at(&rows, 7)?,
    })
}

fn availability(doc: &Html, reference_date: NaiveDate) -> Result<Availability> {
    let rows = cells(detail_table(doc, 2)?)?;
    let available = text_at(&rows, 1)?;
    let tenancy = normalize::cell_text(cell(&rows, 3)?);
    Ok(Availability {
        available_from: normalize::availability(&available, reference_date),
        min_tenancy_months: normalize::leading_number(&tenancy)
            .ok_or_else(|| anyhow!("unreadable minimum tenancy {tenancy:?}"))?,
    })
}

fn features(doc: &Html) -> Result<Features> {
    let rows = cells(detail_table(doc, 3)?)?;
    Ok(Features {
        garden: flag_at(&rows, 1)?,
        parking: flag_at(&rows, 3)?,
        fireplace: flag_at(&rows, 5)?,
        furnishing: text_at(&rows, 7)?,
    })
}

fn transport(doc: &Html) -> Result<Transport> {
    let rows = cells(first(doc, TRANSPORT_TABLE)?)?;
    let data = rows.get(TRANSPORT_HEADER_CELLS..).unwrap_or_default();

    let stations = data
        .iter()
        .step_by(3)
        .map(|c| normalize::cell_text(*c))
        .collect();
    let closest = data
        .get(1)
        .map(|c| normalize::cell_text(*c))
        .ok_or_else(|| anyhow!("no station distances listed"))?;

    Ok(Transport {
        stations,
        closest_station_mins: normalize::leading_number(&closest)
            .ok_or_else(|| anyhow!("unreadable station distance {closest:?}"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn reference_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn summary(id: &str) -> ListingSummary {
        ListingSummary {
            id: ListingId::parse(id).unwrap(),
            link: format!("https://www.openrent.co.uk/property-to-rent/london/{id}"),
        }
    }

    fn fixture(name: &str) -> String {
        fs::read_to_string(format!("tests/htmls/{name}")).expect("Invalid file path")
    }

    #[test]
    fn test_parsing_search_results() {
        let html = fixture("search.html");
        let summaries = parse_search_results(&html, &SearchParams::default()).unwrap();

        let ids: Vec<&str> = summaries.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["1111111", "2222222", "3333333"]);
        assert_eq!(
            summaries[1].link,
            "https://www.openrent.co.uk/property-to-rent/london/2-bed-flat-upper-street-n1/2222222"
        );
    }

    #[test]
    fn test_parsing_full_detail_page() {
        let html = fixture("detail_full.html");
        let listing = extract_listing(
            &html,
            &summary("2222222"),
            reference_date(),
            FailurePolicy::FillSentinels,
        )
        .unwrap();

        let expected = Listing {
            property_id: ListingId::parse("2222222").unwrap(),
            property_link: "https://www.openrent.co.uk/property-to-rent/london/2222222"
                .to_string(),
            listing_title: Some("2 Bed Flat, Upper Street, N1".to_string()),
            description: Some("Bright two bedroom flat close to Angel.".to_string()),
            location: "Islington".to_string(),
            num_bedrooms: 2,
            num_bathrooms: 1,
            max_tenants: 3,
            deposit: 950,
            rent_pcm: 1800,
            bills_included: Flag::No,
            student_friendly: Flag::Yes,
            family_friendly: Flag::Yes,
            pet_friendly: Flag::No,
            smoker_friendly: Flag::No,
            available_from: "19 October 2026".to_string(),
            min_tenancy_months: 6,
            garden: Flag::Yes,
            parking: Flag::No,
            fireplace: Flag::No,
            furnishing: "Furnished".to_string(),
            nearby_stations: vec!["Angel".to_string(), "Highbury & Islington".to_string()],
            closest_station_mins: 5,
            postcode: Some("N1".to_string()),
            scrape_date: reference_date(),
            predicted_price: None,
        };
        assert_eq!(listing, expected);
    }

    #[test]
    fn test_missing_sections_fall_back_to_sentinels() {
        let html = fixture("detail_partial.html");
        let listing = extract_listing(
            &html,
            &summary("3333333"),
            reference_date(),
            FailurePolicy::FillSentinels,
        )
        .unwrap();

        // Title, overview and prices are present
        assert_eq!(listing.listing_title.as_deref(), Some("Studio Flat, Camden, NW1"));
        assert_eq!(listing.num_bedrooms, 1);
        assert_eq!(listing.rent_pcm, 1250);

        // Everything else is missing from the page
        assert_eq!(listing.description, None);
        assert_eq!(listing.student_friendly, Flag::Undefined);
        assert_eq!(listing.available_from, "Undefined");
        assert_eq!(listing.min_tenancy_months, -1);
        assert_eq!(listing.garden, Flag::Undefined);
        assert_eq!(listing.furnishing, "Undefined");
        assert_eq!(listing.nearby_stations, vec!["Undefined".to_string()]);
        assert_eq!(listing.closest_station_mins, -1);
    }

    #[test]
    fn test_skip_policy_rejects_partial_page() {
        let html = fixture("detail_partial.html");
        let result = extract_listing(
            &html,
            &summary("3333333"),
            reference_date(),
            FailurePolicy::SkipListing,
        );
        assert!(result.is_err());

        let full = fixture("detail_full.html");
        assert!(extract_listing(
            &full,
            &summary("2222222"),
            reference_date(),
            FailurePolicy::SkipListing
        )
        .is_ok());
    }

    #[test]
    fn test_empty_page_is_all_sentinels() {
        let listing = extract_listing(
            "<html><body></body></html>",
            &summary("4"),
            reference_date(),
            FailurePolicy::FillSentinels,
        )
        .unwrap();
        assert_eq!(listing.listing_title, None);
        assert_eq!(listing.postcode, None);
        assert_eq!(listing.location, "London");
        assert_eq!(listing.deposit, -1);
        assert_eq!(listing.bills_included, Flag::Undefined);
    }

    #[test]
    fn test_blank_title_and_description_are_absent() {
        let html = r#"<html><body>
            <h1 class="property-title">  </h1>
            <div class="description">
            </div>
        </body></html>"#;
        let listing = extract_listing(
            html,
            &summary("5"),
            reference_date(),
            FailurePolicy::FillSentinels,
        )
        .unwrap();
        assert_eq!(listing.listing_title, None);
        assert_eq!(listing.description, None);
        assert_eq!(listing.postcode, None);
    }
}
