//! Conversions from scraped free text into typed values.

use crate::models::{format_date, Flag};
use chrono::NaiveDate;
use scraper::{ElementRef, Selector};

/// Literal the site shows when a property is available immediately
pub const AVAILABLE_NOW: &str = "Today";

/// Icon class marking an affirmative amenity cell
pub const AFFIRMATIVE_ICON: &str = "fa-check";

/// "£1,250.00" -> 1250
pub fn currency(text: &str) -> Option<i64> {
    let cleaned = text.trim().replace(['£', ','], "");
    let whole = cleaned.split('.').next().unwrap_or_default().trim();
    whole.parse().ok()
}

/// "5 mins" -> 5, "3 months" -> 3
pub fn leading_number(text: &str) -> Option<i64> {
    text.split_whitespace().next()?.parse().ok()
}

pub fn availability(text: &str, reference_date: NaiveDate) -> String {
    if text == AVAILABLE_NOW {
        format_date(reference_date)
    } else {
        text.to_string()
    }
}

/// Yes when the cell's first icon ends in the affirmative class, No otherwise
pub fn amenity_flag(cell: ElementRef<'_>) -> Flag {
    let Ok(icon) = Selector::parse("i") else {
        return Flag::No;
    };
    let affirmative = cell
        .select(&icon)
        .next()
        .and_then(|i| i.value().attr("class"))
        .and_then(|classes| classes.split_whitespace().last())
        .is_some_and(|last| last == AFFIRMATIVE_ICON);

    if affirmative {
        Flag::Yes
    } else {
        Flag::No
    }
}

/// Trimmed text content of an element
pub fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Last comma-separated segment of a title such as "2 Bed Flat, Islington, N1"
pub fn postcode_from_title(title: &str) -> Option<String> {
    title.rsplit(',').next().map(|s| s.trim().to_string())
}

/// Second-to-last comma-separated segment of a title
pub fn area_from_title(title: &str) -> Option<String> {
    let mut segments = title.rsplit(',');
    segments.next()?;
    segments.next().map(|s| s.trim().to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingType {
    Studio,
    Shared,
    Maisonette,
    Flat,
}

impl ListingType {
    pub fn as_str(self) -> &'static str {
        match self {
            ListingType::Studio => "studio",
            ListingType::Shared => "shared",
            ListingType::Maisonette => "maisonette",
            ListingType::Flat => "flat",
        }
    }
}

pub fn listing_type(title: &str) -> ListingType {
    let title = title.to_lowercase();
    if title.contains("studio") {
        ListingType::Studio
    } else if title.contains("shared") {
        ListingType::Shared
    } else if title.contains("maisonette") {
        ListingType::Maisonette
    } else {
        ListingType::Flat
    }
}

/// First character of the postcode, lowercased
pub fn region(postcode: &str) -> Option<char> {
    postcode
        .trim()
        .chars()
        .next()
        .and_then(|c| c.to_lowercase().next())
}

/// None when there is no usable bathroom count (zero or sentinel)
pub fn bed_bath_ratio(bedrooms: i64, bathrooms: i64) -> Option<f64> {
    if bathrooms <= 0 || bedrooms < 0 {
        return None;
    }
    Some(bedrooms as f64 / bathrooms as f64)
}
