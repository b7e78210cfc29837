use async_trait::async_trait;
use chrono::Utc;
use std::io::Write;
use std::sync::Arc;

use aitrace::error::{ClientError, Result};
use aitrace::import::{BulkImporter, ColumnMapping, CsvTable, ImageUploadPort};
use aitrace::types::{
    Dataset, DatasetImage, ImportImageRequest, LabelDefinition, LabelType, LabelValue,
};

/// Upload port that answers like the backend: first sight of a URL
/// succeeds, repeats return the duplicate conflict.
struct FakeBackend {
    requests: Arc<tokio::sync::Mutex<Vec<ImportImageRequest>>>,
    seen_urls: Arc<tokio::sync::Mutex<Vec<String>>>,
}

impl FakeBackend {
    fn new() -> Self {
        Self {
            requests: Arc::new(tokio::sync::Mutex::new(Vec::new())),
            seen_urls: Arc::new(tokio::sync::Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl ImageUploadPort for FakeBackend {
    async fn upload_by_url(
        &self,
        dataset_id: &str,
        request: &ImportImageRequest,
    ) -> Result<DatasetImage> {
        self.requests.lock().await.push(request.clone());
        let mut seen = self.seen_urls.lock().await;
        if seen.contains(&request.url) {
            return Err(ClientError::Conflict);
        }
        seen.push(request.url.clone());
        let now = Utc::now();
        Ok(DatasetImage {
            id: format!("img-{}", seen.len()),
            name: request.name.clone().unwrap_or_else(|| request.url.clone()),
            md5: format!("{:032x}", seen.len()),
            dataset_id: dataset_id.to_string(),
            source_url: Some(request.url.clone()),
            labels: Some(serde_json::to_value(request.labels.clone()).unwrap()),
            is_labeled: request.is_labeled.unwrap_or(false),
            is_queued: !request.is_labeled.unwrap_or(false),
            comment: None,
            updated_by_username: None,
            created_at: now,
            updated_at: now,
        })
    }
}

fn animals_dataset() -> Dataset {
    Dataset {
        id: "ds-animals".into(),
        name: "animals".into(),
        description: "test fixture".into(),
        labels: Some(vec![
            LabelDefinition {
                name: "category".into(),
                label_type: LabelType::Category,
                description: String::new(),
                possible_values: vec!["cat".into(), "dog".into()],
            },
            LabelDefinition {
                name: "blurry".into(),
                label_type: LabelType::Boolean,
                description: String::new(),
                possible_values: vec![],
            },
        ]),
        n_images: 0,
        n_labeled_images: 0,
        n_queued_images: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn csv_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn csv_to_upload_requests_with_inferred_mapping() -> anyhow::Result<()> {
    let file = csv_file(
        "image_url,name,category,blurry\n\
         http://x/1.png,first,cat,Y\n\
         http://x/2.png,second,DOG,\n\
         http://x/1.png,dup,cat,n\n",
    );

    let table = CsvTable::read(file.path())?;
    let dataset = animals_dataset();
    let mapping = ColumnMapping::infer(&table.headers, dataset.labels.as_deref().unwrap());
    assert_eq!(mapping.url_column.as_deref(), Some("image_url"));
    assert_eq!(mapping.name_column.as_deref(), Some("name"));

    let importer = BulkImporter::new(&dataset, mapping);
    let backend = FakeBackend::new();
    let report = importer.run(&backend, &table, |_| {}).await;

    // Third row repeats the first URL: a conflict, not a failure
    assert_eq!(report.success, 2);
    assert_eq!(report.conflicts, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.images.len(), 2);

    let requests = backend.requests.lock().await;
    assert_eq!(requests.len(), 3);

    // Row one: exact category match, boolean "Y" is truthy
    let first: std::collections::BTreeMap<_, _> = requests[0]
        .labels
        .as_deref()
        .unwrap()
        .iter()
        .map(|l| (l.name.clone(), l.value.clone()))
        .collect();
    assert_eq!(first["category"], LabelValue::Text("cat".into()));
    assert_eq!(first["blurry"], LabelValue::Bool(true));
    assert_eq!(requests[0].name.as_deref(), Some("first"));
    assert_eq!(requests[0].is_labeled, Some(true));

    // Row two: case-insensitive category match canonicalizes, empty
    // boolean cell defaults to false
    let second: std::collections::BTreeMap<_, _> = requests[1]
        .labels
        .as_deref()
        .unwrap()
        .iter()
        .map(|l| (l.name.clone(), l.value.clone()))
        .collect();
    assert_eq!(second["category"], LabelValue::Text("dog".into()));
    assert_eq!(second["blurry"], LabelValue::Bool(false));

    Ok(())
}

#[tokio::test]
async fn uploaded_labels_round_trip_through_the_image_record() -> anyhow::Result<()> {
    let file = csv_file("image_url,category,blurry\nhttp://x/1.png,cat,true\n");
    let table = CsvTable::read(file.path())?;
    let dataset = animals_dataset();
    let mapping = ColumnMapping::infer(&table.headers, dataset.labels.as_deref().unwrap());
    let importer = BulkImporter::new(&dataset, mapping);
    let backend = FakeBackend::new();

    let report = importer.run(&backend, &table, |_| {}).await;
    assert_eq!(report.success, 1);

    // The created record carries the same label mapping that was sent
    let values = report.images[0].label_values();
    assert_eq!(values["category"], LabelValue::Text("cat".into()));
    assert_eq!(values["blurry"], LabelValue::Bool(true));
    Ok(())
}
