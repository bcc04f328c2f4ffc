//! The in-memory table produced by one run.

use crate::models::Listing;
use chrono::NaiveDate;

/// Declared store type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
}

impl SqlType {
    pub fn as_sql(self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
        }
    }
}

/// Column order and store types, matching the field order of [`Listing`]
pub const COLUMNS: [(&str, SqlType); 26] = [
    ("property_id", SqlType::Text),
    ("property_link", SqlType::Text),
    ("listing_title", SqlType::Text),
    ("description", SqlType::Text),
    ("location", SqlType::Text),
    ("num_bedrooms", SqlType::Integer),
    ("num_bathrooms", SqlType::Integer),
    ("max_tenants", SqlType::Integer),
    ("deposit", SqlType::Real),
    ("rent_pcm", SqlType::Real),
    ("bills_included", SqlType::Integer),
    ("student_friendly", SqlType::Integer),
    ("family_friendly", SqlType::Integer),
    ("pet_friendly", SqlType::Integer),
    ("smoker_friendly", SqlType::Integer),
    ("available_from", SqlType::Text),
    ("min_tenancy_months", SqlType::Integer),
    ("garden", SqlType::Integer),
    ("parking", SqlType::Integer),
    ("fireplace", SqlType::Integer),
    ("furnishing", SqlType::Text),
    ("nearby_stations", SqlType::Text),
    ("closest_station_mins", SqlType::Integer),
    ("postcode", SqlType::Text),
    ("scrape_date", SqlType::Text),
    ("predicted_price", SqlType::Real),
];

pub fn column_names() -> impl Iterator<Item = &'static str> {
    COLUMNS.iter().map(|(name, _)| *name)
}

/// Rows scraped in one run, all stamped with the run's reference date
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    reference_date: NaiveDate,
    rows: Vec<Listing>,
}

impl Dataset {
    pub fn new(reference_date: NaiveDate) -> Self {
        Self {
            reference_date,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, mut listing: Listing) {
        listing.scrape_date = self.reference_date;
        self.rows.push(listing);
    }

    pub fn rows(&self) -> &[Listing] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Listing] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[cfg(test)]
    pub fn is_scored(&self) -> bool {
        !self.rows.is_empty() && self.rows.iter().all(|r| r.predicted_price.is_some())
    }
}
