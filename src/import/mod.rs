mod coerce;
mod mapping;

pub use coerce::coerce_label_value;
pub use mapping::{ColumnMapping, LabelMapping};

use crate::error::{ClientError, Result};
use crate::types::{Dataset, DatasetImage, ImportImageRequest, LabelDefinition, LabelUpdate};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Upload boundary of the import pipeline. The production implementation is
/// `ApiClient::upload_by_url`; tests substitute a recording mock.
#[async_trait]
pub trait ImageUploadPort: Send + Sync {
    async fn upload_by_url(
        &self,
        dataset_id: &str,
        request: &ImportImageRequest,
    ) -> Result<DatasetImage>;
}

/// A parsed CSV: header row plus one column-name-to-cell map per data row.
#[derive(Debug, Clone)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
}

impl CsvTable {
    /// Read a delimited file with a header row. An empty or header-only
    /// file blocks the import up front.
    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        if headers.is_empty() {
            return Err(ClientError::Import("CSV file has no header row".into()));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            // Only records with nothing in them at all are dropped here.
            // Whitespace-only rows survive parsing and are counted as
            // failures by the importer, since they carry no usable URL.
            if record.iter().all(|cell| cell.is_empty()) {
                continue;
            }
            let row = headers
                .iter()
                .cloned()
                .zip(record.iter().map(|cell| cell.to_string()))
                .collect();
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(ClientError::Import("CSV file contains no data rows".into()));
        }

        Ok(Self { headers, rows })
    }
}

/// Live progress for one import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportProgress {
    pub processed: usize,
    pub total: usize,
    pub percent: u8,
}

/// Tally of per-row outcomes plus the images the backend created.
/// Conflicts (duplicate URLs, HTTP 409) are not failures.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub success: usize,
    pub failed: usize,
    pub conflicts: usize,
    pub images: Vec<DatasetImage>,
}

/// CSV-driven batch creation of dataset images: one upload request per row,
/// processed strictly sequentially so progress reporting stays accurate and
/// the backend is never flooded.
pub struct BulkImporter {
    dataset_id: String,
    label_definitions: HashMap<String, LabelDefinition>,
    mapping: ColumnMapping,
}

impl BulkImporter {
    pub fn new(dataset: &Dataset, mapping: ColumnMapping) -> Self {
        let label_definitions = dataset
            .labels
            .iter()
            .flatten()
            .map(|def| (def.name.clone(), def.clone()))
            .collect();
        Self {
            dataset_id: dataset.id.clone(),
            label_definitions,
            mapping,
        }
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    /// Build the upload request for one row, or None when the row has no
    /// usable image URL.
    fn request_for_row(&self, row: &HashMap<String, String>) -> Option<ImportImageRequest> {
        let url = self
            .mapping
            .url_column
            .as_ref()
            .and_then(|column| row.get(column))
            .map(|cell| cell.trim())
            .filter(|cell| !cell.is_empty())?;

        let name = self
            .mapping
            .name_column
            .as_ref()
            .and_then(|column| row.get(column))
            .map(|cell| cell.trim().to_string())
            .filter(|cell| !cell.is_empty());

        let mut labels = Vec::new();
        for (label_name, column) in self.mapping.active_labels() {
            let (Some(definition), Some(cell)) =
                (self.label_definitions.get(label_name), row.get(column))
            else {
                continue;
            };
            labels.push(LabelUpdate {
                name: label_name.to_string(),
                value: coerce_label_value(cell, definition),
            });
        }

        // A row counts as labeled as soon as any mapping applied
        let is_labeled = !labels.is_empty();

        Some(ImportImageRequest {
            url: url.to_string(),
            name,
            description: None,
            labels: Some(labels),
            is_labeled: Some(is_labeled),
        })
    }

    /// Run the import. Rows are uploaded one at a time; `progress` is
    /// invoked after every row with the running counts.
    #[instrument(skip(self, uploader, table, progress), fields(dataset_id = %self.dataset_id, rows = table.rows.len()))]
    pub async fn run(
        &self,
        uploader: &dyn ImageUploadPort,
        table: &CsvTable,
        mut progress: impl FnMut(ImportProgress),
    ) -> ImportReport {
        let total = table.rows.len();
        let mut report = ImportReport::default();

        for (index, row) in table.rows.iter().enumerate() {
            match self.request_for_row(row) {
                Some(request) => match uploader.upload_by_url(&self.dataset_id, &request).await {
                    Ok(image) => {
                        report.success += 1;
                        report.images.push(image);
                    }
                    Err(ClientError::Conflict) => {
                        report.conflicts += 1;
                        debug!(url = %request.url, "duplicate image skipped");
                    }
                    Err(e) => {
                        report.failed += 1;
                        warn!(row = index + 1, "import row failed: {e}");
                    }
                },
                None => {
                    report.failed += 1;
                    warn!(row = index + 1, "row has no image URL");
                }
            }

            let processed = index + 1;
            progress(ImportProgress {
                processed,
                total,
                percent: ((processed * 100) / total) as u8,
            });
        }

        info!(
            success = report.success,
            failed = report.failed,
            conflicts = report.conflicts,
            "bulk import finished"
        );
        report
    }
}
