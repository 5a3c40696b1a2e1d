//! Bulk prospect import from delimited files
//!
//! Expected columns, after a header row:
//! `Name, Type, City, Region, Country, Population, Website, ContactEmail, ContactName, ContactTitle`.
//! Quoted fields follow RFC 4180. Extra trailing columns are ignored.

use super::scoring::ScoringEngine;
use chrono::Utc;
use cpl_common::events::{EventBus, PipelineEvent};
use cpl_common::models::{Location, OrganizationType, Prospect, ProspectSource};
use cpl_common::{Result, SharedRepository};
use serde::Serialize;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const REQUIRED_COLUMNS: usize = 10;

/// Aggregate outcome of one import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportResult {
    /// Data rows processed (header excluded)
    pub total_rows: usize,
    pub created: usize,
    pub skipped_duplicates: usize,
    pub errors: usize,
    pub error_messages: Vec<String>,
}

impl ImportResult {
    fn empty_file() -> Self {
        Self {
            errors: 1,
            error_messages: vec!["The file is empty".to_string()],
            ..Default::default()
        }
    }

    fn row_error(&mut self, message: String) {
        self.errors += 1;
        self.error_messages.push(message);
    }
}

#[derive(Debug)]
struct ProspectRow {
    name: String,
    organization_type: OrganizationType,
    city: String,
    region: String,
    country: String,
    population: Option<u64>,
    website: Option<String>,
    contact_email: Option<String>,
    contact_name: Option<String>,
    contact_title: Option<String>,
}

impl ProspectRow {
    fn matches(&self, prospect: &Prospect) -> bool {
        prospect.is_same_organization(&self.name, &self.city, &self.region, &self.country)
    }

    fn into_prospect(self, user_id: Uuid) -> Prospect {
        let mut prospect = Prospect::new(
            &self.name,
            self.organization_type,
            Location::new(&self.city, &self.region, &self.country),
            ProspectSource::CsvImport,
            user_id,
        );
        prospect.population = self.population;
        prospect.website = self.website;
        prospect.contact_email = self.contact_email;
        prospect.contact_name = self.contact_name;
        prospect.contact_title = self.contact_title;
        prospect
    }
}

fn optional(field: &str) -> Option<String> {
    let field = field.trim();
    (!field.is_empty()).then(|| field.to_string())
}

fn parse_population(field: &str) -> std::result::Result<Option<u64>, ()> {
    let digits: String = field.trim().chars().filter(|c| *c != ',' && *c != '_').collect();
    if digits.is_empty() {
        return Ok(None);
    }
    digits.parse().map(Some).map_err(|_| ())
}

fn parse_row(record: &csv::StringRecord, row: u64) -> std::result::Result<ProspectRow, String> {
    if record.len() < REQUIRED_COLUMNS {
        return Err(format!(
            "Row {}: Expected at least {} columns, found {}",
            row,
            REQUIRED_COLUMNS,
            record.len()
        ));
    }

    let field = |i: usize| record.get(i).unwrap_or_default().trim();

    let name = field(0);
    if name.is_empty() {
        return Err(format!("Row {}: Name is required", row));
    }

    let population = parse_population(field(5))
        .map_err(|_| format!("Row {}: Invalid population '{}'", row, field(5)))?;

    Ok(ProspectRow {
        name: name.to_string(),
        organization_type: OrganizationType::parse(field(1)),
        city: field(2).to_string(),
        region: field(3).to_string(),
        country: field(4).to_string(),
        population,
        website: optional(field(6)),
        contact_email: optional(field(7)),
        contact_name: optional(field(8)),
        contact_title: optional(field(9)),
    })
}

type NumberedRecord = (u64, std::result::Result<csv::StringRecord, String>);

/// Parsed records with their 1-based line numbers, header included
fn read_records<R: Read>(mut reader: R) -> std::io::Result<Option<Vec<NumberedRecord>>> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data.as_slice());

    let records = csv_reader
        .records()
        .enumerate()
        .map(|(index, result)| match result {
            Ok(record) => {
                let line = record.position().map(|p| p.line()).unwrap_or(index as u64 + 1);
                (line, Ok(record))
            }
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(index as u64 + 1);
                (line, Err(e.to_string()))
            }
        })
        .collect();

    Ok(Some(records))
}

/// CSV import engine; every created prospect is scored before it is stored
pub struct CsvImporter {
    prospects: SharedRepository<Prospect>,
    scoring: Arc<ScoringEngine>,
    event_bus: EventBus,
}

impl CsvImporter {
    pub fn new(
        prospects: SharedRepository<Prospect>,
        scoring: Arc<ScoringEngine>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            prospects,
            scoring,
            event_bus,
        }
    }

    /// Import prospects from a CSV stream
    ///
    /// Per-row problems are reported in the result and never abort the
    /// import. `Err` is returned only for I/O or repository failures.
    pub async fn import_prospects<R: Read + Send>(
        &self,
        reader: R,
        user_id: Uuid,
    ) -> Result<ImportResult> {
        let Some(records) = read_records(reader)? else {
            warn!("Import rejected: empty file");
            return Ok(ImportResult::empty_file());
        };

        // Existing prospects plus those created earlier in this file
        let mut known = self.prospects.all().await?;

        let snapshot = self.scoring.snapshot().await?;
        let mut result = ImportResult::default();

        for (line, record) in records.into_iter().skip(1) {
            result.total_rows += 1;

            let row = match record {
                Ok(record) => parse_row(&record, line),
                Err(e) => Err(format!("Row {}: {}", line, e)),
            };
            let row = match row {
                Ok(row) => row,
                Err(message) => {
                    debug!("{}", message);
                    result.row_error(message);
                    continue;
                }
            };

            if known.iter().any(|p| row.matches(p)) {
                result.skipped_duplicates += 1;
                continue;
            }

            let mut prospect = row.into_prospect(user_id);
            prospect.fit_score = snapshot.score(&prospect);
            known.push(self.prospects.add(prospect).await?);
            result.created += 1;
        }

        info!(
            total_rows = result.total_rows,
            created = result.created,
            skipped = result.skipped_duplicates,
            errors = result.errors,
            "Prospect import complete"
        );

        self.event_bus.emit_lossy(PipelineEvent::ProspectsImported {
            created: result.created,
            skipped_duplicates: result.skipped_duplicates,
            errors: result.errors,
            timestamp: Utc::now(),
        });

        Ok(result)
    }
}
