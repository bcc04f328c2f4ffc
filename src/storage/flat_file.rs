use crate::dataset::{column_names, Dataset};
use crate::dedup::KnownIds;
use crate::models::Listing;
use anyhow::{Context, Result};
use csv::{Reader, WriterBuilder};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Write the run's rows to `path`, replacing whatever was there
pub fn write_run(path: impl AsRef<Path>, dataset: &Dataset) -> Result<()> {
    let path = path.as_ref();
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    write_rows(file, dataset, true).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("💾 Saved {} listings to {}", dataset.len(), path.display());
    Ok(())
}

/// Append the run's rows to the cumulative file, adding a header only to a new file
pub fn append_history(path: impl AsRef<Path>, dataset: &Dataset) -> Result<()> {
    let path = path.as_ref();
    let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    write_rows(file, dataset, needs_header)
        .with_context(|| format!("Failed to append to {}", path.display()))?;
    info!(
        "💾 Appended {} listings to {}",
        dataset.len(),
        path.display()
    );
    Ok(())
}

fn write_rows(out: impl Write, dataset: &Dataset, header: bool) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(out);
    if header {
        writer.write_record(column_names())?;
    }
    for listing in dataset.rows() {
        writer.serialize(listing)?;
    }
    writer.flush()?;
    Ok(())
}

/// Listings from a file produced by [`write_run`] or [`append_history`]
pub fn read_listings(path: impl AsRef<Path>) -> Result<Vec<Listing>> {
    let path = path.as_ref();
    let mut reader =
        Reader::from_path(path).with_context(|| format!("Failed to open {}", path.display()))?;
    reader
        .deserialize::<Listing>()
        .enumerate()
        .map(|(i, row)| row.with_context(|| format!("{}: bad row {}", path.display(), i + 1)))
        .collect()
}

/// Identifiers already appended to the cumulative file; none if it does not exist yet
pub fn known_ids(path: impl AsRef<Path>) -> Result<KnownIds> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(KnownIds::default());
    }
    let ids = read_listings(path)?.into_iter().map(|l| l.property_id);
    Ok(KnownIds::new(ids))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::sample_listing;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn dataset(ids: &[&str]) -> Dataset {
        let mut dataset = Dataset::new(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        for id in ids {
            dataset.push(sample_listing(id));
        }
        dataset
    }

    #[test]
    fn write_run_replaces_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.csv");

        write_run(&path, &dataset(&["1", "2", "3"])).unwrap();
        write_run(&path, &dataset(&["4"])).unwrap();

        let rows = read_listings(&path).unwrap();
        assert_eq!(rows, dataset(&["4"]).rows().to_vec());
    }

    #[test]
    fn history_gets_one_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");

        append_history(&path, &dataset(&["1"])).unwrap();
        append_history(&path, &dataset(&["2", "3"])).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("property_id,").count(), 1);

        let ids: Vec<String> = read_listings(&path)
            .unwrap()
            .into_iter()
            .map(|l| l.property_id.to_string())
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn empty_run_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");

        write_run(&path, &dataset(&[])).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("property_id,property_link,listing_title"));
        assert!(read_listings(&path).unwrap().is_empty());
    }

    #[test]
    fn flat_columns_are_human_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.csv");
        let mut data = dataset(&["7"]);
        data.rows_mut()[0].predicted_price = Some(1725.5);

        write_run(&path, &data).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert!(row.contains(r#","[""Angel"",""Old Street""]","#));
        assert!(row.contains(",19 October 2026,1725.5"));
        assert!(row.contains(",No,Yes,Yes,No,Undefined,"));
    }

    #[test]
    fn stations_survive_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.csv");
        let mut data = dataset(&["7", "8"]);
        data.rows_mut()[0].nearby_stations =
            vec!["Elephant | Castle".to_string(), "Angel".to_string()];
        data.rows_mut()[1].nearby_stations = vec![String::new()];

        write_run(&path, &data).unwrap();

        assert_eq!(read_listings(&path).unwrap(), data.rows().to_vec());
    }

    #[test]
    fn known_ids_come_from_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        assert_eq!(known_ids(&path).unwrap().len(), 0);

        append_history(&path, &dataset(&["1", "02"])).unwrap();

        let known = known_ids(&path).unwrap();
        assert_eq!(known.len(), 2);
        assert!(known.contains(&crate::models::ListingId::parse("2").unwrap()));
    }
}
