use crate::dataset::COLUMNS;
use crate::dedup::KnownIds;
use crate::models::{format_date, stations, Listing, ListingId};
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::{debug, info, warn};

pub const RENTALS_TABLE: &str = "rentals";

/// The typed `rentals` table in a local SQLite file
pub struct RentalStore {
    pool: SqlitePool,
}

impl RentalStore {
    /// Open (or create) the database file
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let opt = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opt)
            .await
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        Ok(Self { pool })
    }

    async fn is_table_exists(&self) -> Result<bool> {
        Ok(
            sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
                .bind(RENTALS_TABLE)
                .fetch_optional(&self.pool)
                .await?
                .is_some(),
        )
    }

    async fn create_table(&self) -> Result<()> {
        if self.is_table_exists().await? {
            return Ok(());
        }
        let columns = COLUMNS
            .iter()
            .map(|(name, ty)| match *name {
                "property_id" => format!("{name} {} PRIMARY KEY", ty.as_sql()),
                _ => format!("{name} {}", ty.as_sql()),
            })
            .collect::<Vec<_>>()
            .join(",\n    ");
        let query = format!("CREATE TABLE {RENTALS_TABLE} (\n    {columns}\n)");
        sqlx::query(&query).execute(&self.pool).await?;
        debug!("Created {}", RENTALS_TABLE);
        Ok(())
    }

    /// Identifiers already stored; empty when nothing has been written yet
    pub async fn known_ids(&self) -> Result<KnownIds> {
        if !self.is_table_exists().await? {
            info!("No {} table yet, nothing to deduplicate against", RENTALS_TABLE);
            return Ok(KnownIds::default());
        }

        // Older stores may hold integer ids; compare everything as canonical text
        let query = format!(
            "SELECT DISTINCT CAST(property_id AS TEXT) AS property_id FROM {RENTALS_TABLE}"
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .context("Failed to read stored property ids")?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let raw: Option<String> = row.try_get("property_id")?;
            match raw.as_deref().map(ListingId::parse) {
                Some(Ok(id)) => ids.push(id),
                Some(Err(e)) => warn!("Ignoring stored row: {e}"),
                None => warn!("Ignoring stored row without property_id"),
            }
        }
        Ok(KnownIds::new(ids))
    }

    pub async fn count(&self) -> Result<i64> {
        if !self.is_table_exists().await? {
            return Ok(0);
        }
        let query = format!("SELECT COUNT(*) AS n FROM {RENTALS_TABLE}");
        let row = sqlx::query(&query).fetch_one(&self.pool).await?;
        Ok(row.try_get("n")?)
    }

    /// Append every row in one transaction, creating the table on first use
    ///
    /// Returns the number of rows written. Rows whose id is already stored are
    /// left untouched.
    pub async fn append(&self, rows: &[Listing]) -> Result<u64> {
        self.create_table().await?;

        let names = COLUMNS
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; COLUMNS.len()].join(", ");
        let query =
            format!("INSERT OR IGNORE INTO {RENTALS_TABLE} ({names}) VALUES ({placeholders})");

        let mut tx = self.pool.begin().await?;
        let mut written = 0;
        for l in rows {
            let result = sqlx::query(&query)
                .bind(l.property_id.as_str())
                .bind(&l.property_link)
                .bind(&l.listing_title)
                .bind(&l.description)
                .bind(&l.location)
                .bind(l.num_bedrooms)
                .bind(l.num_bathrooms)
                .bind(l.max_tenants)
                .bind(l.deposit as f64)
                .bind(l.rent_pcm as f64)
                .bind(l.bills_included.as_sql())
                .bind(l.student_friendly.as_sql())
                .bind(l.family_friendly.as_sql())
                .bind(l.pet_friendly.as_sql())
                .bind(l.smoker_friendly.as_sql())
                .bind(&l.available_from)
                .bind(l.min_tenancy_months)
                .bind(l.garden.as_sql())
                .bind(l.parking.as_sql())
                .bind(l.fireplace.as_sql())
                .bind(&l.furnishing)
                .bind(stations::join(&l.nearby_stations))
                .bind(l.closest_station_mins)
                .bind(&l.postcode)
                .bind(format_date(l.scrape_date))
                .bind(l.predicted_price)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to insert listing {}", l.property_id))?;
            written += result.rows_affected();
        }
        tx.commit().await?;

        let skipped = rows.len() as u64 - written;
        if skipped > 0 {
            warn!("{skipped} listings were already stored and were not rewritten");
        }
        info!("💾 Appended {} listings to {}", written, RENTALS_TABLE);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::sample_listing;
    use pretty_assertions::assert_eq;

    fn rows(ids: &[&str]) -> Vec<Listing> {
        ids.iter().map(|id| sample_listing(id)).collect()
    }

    #[tokio::test]
    async fn missing_store_means_no_known_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = RentalStore::open(dir.path().join("fresh.db")).await.unwrap();

        assert!(store.known_ids().await.unwrap().is_empty());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn append_creates_table_and_feeds_dedup() {
        let dir = tempfile::tempdir().unwrap();
        let store = RentalStore::open(dir.path().join("rentals.db")).await.unwrap();

        assert_eq!(store.append(&rows(&["10", "20"])).await.unwrap(), 2);
        assert_eq!(store.append(&rows(&["30"])).await.unwrap(), 1);

        let known = store.known_ids().await.unwrap();
        assert_eq!(known.len(), 3);
        assert!(known.contains(&ListingId::parse("20").unwrap()));
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn stored_rows_are_never_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = RentalStore::open(dir.path().join("rentals.db")).await.unwrap();

        store.append(&rows(&["10"])).await.unwrap();
        let mut again = rows(&["10", "11"]);
        again[0].rent_pcm = 1;

        assert_eq!(store.append(&again).await.unwrap(), 1);

        let row = sqlx::query("SELECT rent_pcm FROM rentals WHERE property_id = '10'")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        let rent: f64 = row.try_get("rent_pcm").unwrap();
        assert_eq!(rent, 1800.0);
    }

    #[tokio::test]
    async fn columns_carry_declared_types() {
        let dir = tempfile::tempdir().unwrap();
        let store = RentalStore::open(dir.path().join("rentals.db")).await.unwrap();
        store.append(&rows(&["10"])).await.unwrap();

        let row = sqlx::query(
            "SELECT typeof(property_id) AS id_t, typeof(deposit) AS deposit_t,
                    typeof(garden) AS garden_t, typeof(smoker_friendly) AS smoker_t,
                    nearby_stations, scrape_date
             FROM rentals",
        )
        .fetch_one(&store.pool)
        .await
        .unwrap();

        assert_eq!(row.get::<String, _>("id_t"), "text");
        assert_eq!(row.get::<String, _>("deposit_t"), "real");
        assert_eq!(row.get::<String, _>("garden_t"), "integer");
        assert_eq!(row.get::<String, _>("smoker_t"), "null");
        assert_eq!(row.get::<String, _>("nearby_stations"), r#"["Angel","Old Street"]"#);
        assert_eq!(row.get::<String, _>("scrape_date"), "01 January 2026");
    }

    #[tokio::test]
    async fn integer_ids_from_older_stores_are_recognised() {
        let dir = tempfile::tempdir().unwrap();
        let store = RentalStore::open(dir.path().join("legacy.db")).await.unwrap();
        sqlx::query("CREATE TABLE rentals (property_id INTEGER)")
            .execute(&store.pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO rentals (property_id) VALUES (1234567)")
            .execute(&store.pool)
            .await
            .unwrap();

        let known = store.known_ids().await.unwrap();
        assert!(known.contains(&ListingId::parse("1234567").unwrap()));
    }
}
