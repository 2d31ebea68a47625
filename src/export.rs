//! CSV export of one cycle's findings: every field quoted, header row
//! `Price,Title,Location,Link`, one row per fingerprint in extraction order.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::{QuoteStyle, WriterBuilder};
use tracing::info;

use crate::models::RawListing;

/// Render the export document for one batch of fingerprints.
pub fn render_csv(rows: &[RawListing]) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(vec![]);
    writer
        .write_record(["Price", "Title", "Location", "Link"])
        .context("failed to write CSV header")?;
    for row in rows {
        writer
            .write_record([&row.price, &row.title, &row.location, &row.link])
            .context("failed to write CSV row")?;
    }
    let bytes = writer.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output was not valid UTF-8")
}

/// Filename convention: embeds the cycle number and running listing count.
pub fn export_filename(cycle: u32, count: usize) -> String {
    format!("scrape_{cycle}_{count}_listings.csv")
}

/// Write one cycle's findings under `dir`, returning the file path.
pub async fn export_cycle(dir: &Path, cycle: u32, rows: &[RawListing]) -> Result<PathBuf> {
    let csv = render_csv(rows)?;
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create export dir {}", dir.display()))?;
    let path = dir.join(export_filename(cycle, rows.len()));
    tokio::fs::write(&path, csv)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("exported {} listings to {}", rows.len(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_header_and_quoted_rows() {
        let rows = vec![RawListing {
            price: "$50".into(),
            title: "iPhone 14".into(),
            location: "Austin".into(),
            link: "http://x".into(),
        }];
        let csv = render_csv(&rows).unwrap();
        assert_eq!(
            csv,
            "\"Price\",\"Title\",\"Location\",\"Link\"\n\"$50\",\"iPhone 14\",\"Austin\",\"http://x\"\n"
        );
    }

    #[test]
    fn doubles_embedded_quotes() {
        let rows = vec![RawListing {
            price: "$10".into(),
            title: "Case \"mint\"".into(),
            location: "Waco".into(),
            link: "http://x/1".into(),
        }];
        let csv = render_csv(&rows).unwrap();
        assert!(csv.contains("\"Case \"\"mint\"\"\""));
    }

    #[test]
    fn filename_embeds_cycle_and_count() {
        assert_eq!(export_filename(3, 42), "scrape_3_42_listings.csv");
    }

    #[tokio::test]
    async fn writes_the_cycle_file() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![RawListing {
            price: "$5".into(),
            title: "Cable".into(),
            location: "Plano".into(),
            link: "http://x/2".into(),
        }];
        let path = export_cycle(dir.path(), 1, &rows).await.unwrap();
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.starts_with("\"Price\""));
        assert!(path.ends_with("scrape_1_1_listings.csv"));
    }
}
