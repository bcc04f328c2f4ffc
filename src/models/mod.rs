use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical form of the site's numeric property identifier
///
/// Always ASCII digits without leading zeros, so "012" and "12" compare equal
/// whether they came from a link, a CSV file or an integer column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ListingId(String);

impl ListingId {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            bail!("invalid listing id: {:?}", raw);
        }
        let trimmed = raw.trim_start_matches('0');
        let canonical = if trimmed.is_empty() { "0" } else { trimmed };
        Ok(Self(canonical.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ListingId {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ListingId> for String {
    fn from(id: ListingId) -> Self {
        id.0
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tri-state amenity / preference indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Flag {
    Yes,
    No,
    Undefined,
}

impl Flag {
    /// Integer form used by the typed table
    pub fn as_sql(self) -> Option<i64> {
        match self {
            Flag::Yes => Some(1),
            Flag::No => Some(0),
            Flag::Undefined => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Flag::Yes => "Yes",
            Flag::No => "No",
            Flag::Undefined => "Undefined",
        }
    }
}

/// A listing seen on the search results page, before its detail page is fetched
#[derive(Debug, Clone, PartialEq)]
pub struct ListingSummary {
    pub id: ListingId,
    pub link: String,
}

/// Core listing record
///
/// Field order is the column order of every output (CSV header and table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub property_id: ListingId,
    pub property_link: String,
    pub listing_title: Option<String>,
    pub description: Option<String>,
    pub location: String,
    pub num_bedrooms: i64,
    pub num_bathrooms: i64,
    pub max_tenants: i64,
    pub deposit: i64,
    pub rent_pcm: i64,
    pub bills_included: Flag,
    pub student_friendly: Flag,
    pub family_friendly: Flag,
    pub pet_friendly: Flag,
    pub smoker_friendly: Flag,
    pub available_from: String,
    pub min_tenancy_months: i64,
    pub garden: Flag,
    pub parking: Flag,
    pub fireplace: Flag,
    pub furnishing: String,
    #[serde(with = "stations")]
    pub nearby_stations: Vec<String>,
    pub closest_station_mins: i64,
    pub postcode: Option<String>,
    #[serde(with = "run_date")]
    pub scrape_date: NaiveDate,
    pub predicted_price: Option<f64>,
}

/// Date format shared by `scrape_date` and substituted availability
pub const DATE_FORMAT: &str = "%d %B %Y";

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Stations are flattened into one cell holding a JSON array of names
///
/// JSON keeps the list exact through CSV and the table, including empty names
/// and names containing separators.
pub mod stations {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn join(stations: &[String]) -> String {
        serde_json::to_string(stations).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn split(cell: &str) -> serde_json::Result<Vec<String>> {
        if cell.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(cell)
    }

    pub fn serialize<S: Serializer>(stations: &[String], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&join(stations))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let cell = String::deserialize(d)?;
        split(&cell).map_err(D::Error::custom)
    }
}

pub mod run_date {
    use super::DATE_FORMAT;
    use chrono::NaiveDate;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let cell = String::deserialize(d)?;
        NaiveDate::parse_from_str(cell.trim(), DATE_FORMAT).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn listing_id_is_canonical() {
        assert_eq!(ListingId::parse("0012345").unwrap().as_str(), "12345");
        assert_eq!(ListingId::parse(" 987 ").unwrap().as_str(), "987");
        assert_eq!(ListingId::parse("000").unwrap().as_str(), "0");
        assert_eq!(
            ListingId::parse("12").unwrap(),
            ListingId::parse("012").unwrap()
        );
    }

    #[test]
    fn listing_id_rejects_non_numeric() {
        assert!(ListingId::parse("").is_err());
        assert!(ListingId::parse("12a").is_err());
        assert!(ListingId::parse("-5").is_err());
    }

    #[test]
    fn flag_sql_mapping() {
        assert_eq!(Flag::Yes.as_sql(), Some(1));
        assert_eq!(Flag::No.as_sql(), Some(0));
        assert_eq!(Flag::Undefined.as_sql(), None);
    }

    #[test]
    fn stations_split_and_join() {
        let list = vec!["Angel".to_string(), "Old Street".to_string()];
        assert_eq!(stations::join(&list), r#"["Angel","Old Street"]"#);
        assert_eq!(stations::split(r#"["Angel","Old Street"]"#).unwrap(), list);
        assert!(stations::split("").unwrap().is_empty());
    }

    #[test]
    fn stations_keep_awkward_names() {
        let list = vec![
            String::new(),
            "Elephant | Castle".to_string(),
            "King's \"Cross\"".to_string(),
        ];
        assert_eq!(stations::split(&stations::join(&list)).unwrap(), list);
        assert!(stations::split("Angel|Old Street").is_err());
    }

    #[test]
    fn date_format_is_long_form() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(format_date(date), "19 October 2026");
    }
}
