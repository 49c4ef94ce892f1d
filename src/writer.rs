//! Row-capped CSV part files.
//!
//! One [`MonthWriter`] per month owns the open file handle, the part number,
//! and the row counter, rotating to a fresh headered part whenever the row
//! cap is reached. Months never share parts: every month starts at part 1.

use crate::crossref::Article;
use crate::error::Result;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// CSV column order for output files
pub const COLUMNS: &[&str] = &[
    "Year",
    "Month",
    "ISSN",
    "DOI",
    "Article Title",
    "Volume",
    "Issue",
    "Page",
    "Journal Title",
    "Publisher",
];

/// One CSV line: an article flattened together with the run parameters.
#[derive(Debug, Clone, Serialize)]
pub struct OutputRow {
    #[serde(rename = "Year")]
    pub year: i32,
    /// Month label, `YYYY-MM`
    #[serde(rename = "Month")]
    pub month: String,
    /// ISSN the query was filtered by (not necessarily the one the work
    /// carries)
    #[serde(rename = "ISSN")]
    pub issn: String,
    #[serde(rename = "DOI")]
    pub doi: String,
    #[serde(rename = "Article Title")]
    pub title: String,
    #[serde(rename = "Volume")]
    pub volume: String,
    #[serde(rename = "Issue")]
    pub issue: String,
    #[serde(rename = "Page")]
    pub page: String,
    #[serde(rename = "Journal Title")]
    pub journal: String,
    #[serde(rename = "Publisher")]
    pub publisher: String,
}

impl OutputRow {
    /// Flatten one fetched article with the run's year/month and the queried
    /// ISSN.
    pub fn new(year: i32, month: u32, issn: &str, article: Article) -> Self {
        Self {
            year,
            month: format!("{}-{:02}", year, month),
            issn: issn.to_string(),
            doi: article.doi,
            title: article.title,
            volume: article.volume,
            issue: article.issue,
            page: article.page,
            journal: article.journal,
            publisher: article.publisher,
        }
    }
}

/// Writer for one month's part files.
///
/// Rotation is check-then-write: a row arriving at a full part seals it and
/// becomes the first row of the next part.
pub struct MonthWriter {
    dir: PathBuf,
    year: i32,
    month: u32,
    row_cap: usize,
    part: u32,
    rows_in_part: usize,
    writer: csv::Writer<File>,
    created: Vec<PathBuf>,
}

impl MonthWriter {
    /// Open part 1 for the given month: a fresh, empty file carrying only
    /// the header row.
    pub fn create(dir: &Path, year: i32, month: u32, row_cap: usize) -> Result<Self> {
        let (writer, path) = open_part(dir, year, month, 1)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            year,
            month,
            row_cap,
            part: 1,
            rows_in_part: 0,
            writer,
            created: vec![path],
        })
    }

    /// Append one row, rotating to the next part first if the current one
    /// is full.
    pub fn write(&mut self, row: &OutputRow) -> Result<()> {
        if self.rows_in_part >= self.row_cap {
            self.rotate()?;
        }
        self.writer.serialize(row)?;
        self.rows_in_part += 1;
        Ok(())
    }

    /// Seal the current part and open the next one.
    fn rotate(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.part += 1;
        self.rows_in_part = 0;

        let (writer, path) = open_part(&self.dir, self.year, self.month, self.part)?;
        self.writer = writer;
        debug!(month = self.month, part = self.part, "Rotated to new part file");
        self.created.push(path);
        Ok(())
    }

    /// Seal the final part and return every file this writer created, in
    /// creation order.
    pub fn seal(mut self) -> Result<Vec<PathBuf>> {
        self.writer.flush()?;
        Ok(std::mem::take(&mut self.created))
    }
}

/// Create a part file and emit the header row.
fn open_part(dir: &Path, year: i32, month: u32, part: u32) -> Result<(csv::Writer<File>, PathBuf)> {
    let path = dir.join(format!("issn_{}-{:02}_part{}.csv", year, month, part));

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&path)?;
    writer.write_record(COLUMNS)?;

    Ok((writer, path))
}
