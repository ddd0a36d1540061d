//! CSV export and import of links.

use chrono::{NaiveDateTime, Utc};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use sqlx::SqlitePool;

use crate::{
    db,
    error::LinkError,
    models::{non_empty, Link, LinkChanges, LinkMode, NewLink},
    slug,
};

const BOM: &[u8] = b"\xEF\xBB\xBF";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column order of exports, and of headerless imports.
pub const COLUMNS: [&str; 8] = [
    "slug",
    "target_url",
    "title",
    "description",
    "mode",
    "is_active",
    "created_at",
    "updated_at",
];

/// What to do with an imported slug that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    #[default]
    Skip,
    Update,
}

impl ConflictPolicy {
    pub fn from_input(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("update") => ConflictPolicy::Update,
            _ => ConflictPolicy::Skip,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub updated: usize,
    pub skipped: usize,
    /// One `Row N: …` line per rejected row.
    pub errors: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("empty or invalid CSV file")]
    Empty,
    #[error("could not read CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Link(#[from] LinkError),
}

// ── Export ─────────────────────────────────────────────────────────────────

/// Serialize links as UTF-8 CSV with a BOM (so spreadsheets pick the encoding).
pub fn export_links(links: &[Link]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = WriterBuilder::new().from_writer(BOM.to_vec());
    writer.write_record(COLUMNS)?;

    for link in links {
        let created_at = link.created_at.format(TIMESTAMP_FORMAT).to_string();
        let updated_at = link.updated_at.format(TIMESTAMP_FORMAT).to_string();
        writer.write_record([
            link.slug.as_str(),
            link.target_url.as_str(),
            link.title.as_deref().unwrap_or(""),
            link.description.as_deref().unwrap_or(""),
            link.mode.as_str(),
            if link.is_active { "1" } else { "0" },
            created_at.as_str(),
            updated_at.as_str(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

/// Download file name, e.g. `golinks-export-2024-03-01-120000.csv`.
pub fn export_filename() -> String {
    format!("golinks-export-{}.csv", Utc::now().format("%Y-%m-%d-%H%M%S"))
}

// ── Import ─────────────────────────────────────────────────────────────────

/// One data row after column mapping, before validation.
#[derive(Debug, Clone, Default)]
struct RawRow {
    slug: String,
    target_url: String,
    title: String,
    description: String,
    mode: String,
    is_active: Option<String>,
    created_at: String,
    updated_at: String,
}

/// Split a CSV payload into numbered raw rows.
///
/// A first row naming at least three known columns is treated as a header;
/// otherwise every row is read positionally in [`COLUMNS`] order.
fn read_rows(data: &[u8]) -> Result<Vec<(usize, RawRow)>, ImportError> {
    let data = data.strip_prefix(BOM).unwrap_or(data);
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let records = reader.records().collect::<Result<Vec<StringRecord>, _>>()?;
    let first = records.first().ok_or(ImportError::Empty)?;

    let header: Vec<String> = first.iter().map(|h| h.trim().to_lowercase()).collect();
    let known = header
        .iter()
        .filter(|h| COLUMNS.contains(&h.as_str()))
        .count();
    let has_header = known >= 3;

    let index: Vec<Option<usize>> = if has_header {
        COLUMNS
            .iter()
            .map(|col| header.iter().position(|h| h == col))
            .collect()
    } else {
        (0..COLUMNS.len()).map(Some).collect()
    };

    let field = |record: &StringRecord, col: usize| -> Option<String> {
        index[col]
            .and_then(|i| record.get(i))
            .map(|v| v.trim().to_owned())
    };

    let skip = usize::from(has_header);
    Ok(records
        .iter()
        .enumerate()
        .skip(skip)
        .filter(|(_, record)| record.iter().any(|v| !v.trim().is_empty()))
        .map(|(i, record)| {
            let raw = RawRow {
                slug: field(record, 0).unwrap_or_default(),
                target_url: field(record, 1).unwrap_or_default(),
                title: field(record, 2).unwrap_or_default(),
                description: field(record, 3).unwrap_or_default(),
                mode: field(record, 4).unwrap_or_default(),
                is_active: field(record, 5),
                created_at: field(record, 6).unwrap_or_default(),
                updated_at: field(record, 7).unwrap_or_default(),
            };
            // Line where the record starts; blank lines still count.
            let line = record
                .position()
                .map_or(i + 1, |pos| pos.line() as usize);
            (line, raw)
        })
        .collect())
}

/// `1`, `yes`, `true` are active; a missing or empty value defaults to active.
fn parse_active(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None | Some("") => true,
        Some(v) => matches!(v.to_lowercase().as_str(), "1" | "yes" | "true"),
    }
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

/// Validated row ready for the store.
fn validate(row_num: usize, raw: RawRow) -> Result<NewLink, String> {
    if raw.slug.is_empty() || raw.target_url.is_empty() {
        return Err(format!("Row {row_num}: Missing slug or target_url"));
    }
    let slug = slug::clean(&raw.slug).map_err(|_| format!("Row {row_num}: Invalid slug format"))?;
    let target_url = slug::clean_target_url(&raw.target_url)
        .map_err(|_| format!("Row {row_num}: Invalid target URL"))?;

    Ok(NewLink {
        slug,
        target_url,
        title: non_empty(Some(&raw.title)),
        description: non_empty(Some(&raw.description)),
        mode: LinkMode::from_input(Some(&raw.mode)),
        is_active: parse_active(raw.is_active.as_deref()),
        created_by: None,
        created_at: parse_timestamp(&raw.created_at),
        updated_at: parse_timestamp(&raw.updated_at),
    })
}

/// Import a CSV payload. Bad rows are skipped and reported; store failures abort.
pub async fn import_links(
    pool: &SqlitePool,
    data: &[u8],
    policy: ConflictPolicy,
    slug_length: usize,
) -> Result<ImportReport, ImportError> {
    let mut report = ImportReport::default();

    for (row_num, raw) in read_rows(data)? {
        let new = match validate(row_num, raw) {
            Ok(new) => new,
            Err(message) => {
                report.errors.push(message);
                report.skipped += 1;
                continue;
            }
        };

        let existing = db::get_link_by_slug(pool, &new.slug)
            .await
            .map_err(LinkError::from)?;

        let outcome = match existing {
            Some(existing) if policy == ConflictPolicy::Update => {
                let changes = LinkChanges {
                    slug: None,
                    target_url: Some(new.target_url),
                    title: Some(new.title),
                    description: Some(new.description),
                    mode: Some(new.mode),
                    is_active: Some(new.is_active),
                };
                db::update_link(pool, existing.id, &changes)
                    .await
                    .map(|_| report.updated += 1)
            }
            Some(_) => {
                report.skipped += 1;
                Ok(())
            }
            None => db::create_link(pool, &new, slug_length)
                .await
                .map(|_| report.imported += 1),
        };

        match outcome {
            Ok(()) => {}
            Err(LinkError::Store(e)) => return Err(LinkError::Store(e).into()),
            Err(e) => {
                report.errors.push(format!("Row {row_num}: {e}"));
                report.skipped += 1;
            }
        }
    }

    tracing::info!(
        "CSV import: {} imported, {} updated, {} skipped",
        report.imported,
        report.updated,
        report.skipped
    );
    Ok(report)
}
