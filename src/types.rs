use crate::error::{ClientError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// The two label kinds a dataset schema can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelType {
    Boolean,
    Category,
}

/// A named field attached to a dataset and applied to every image.
/// `possible_values` is non-empty for category labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub label_type: LabelType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub possible_values: Vec<String>,
}

impl LabelDefinition {
    /// Schema rules: a label needs a name, and a category label needs at
    /// least one possible value to default to.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ClientError::Schema("label name must not be empty".into()));
        }
        if self.label_type == LabelType::Category && self.possible_values.is_empty() {
            return Err(ClientError::Schema(format!(
                "category label '{}' needs at least one possible value",
                self.name
            )));
        }
        Ok(())
    }
}

/// A concrete label assignment value: boolean labels carry a bool,
/// category labels carry one of the schema's possible values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelValue {
    Bool(bool),
    Text(String),
}

/// Wire shape for a single label assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelUpdate {
    pub name: String,
    pub value: LabelValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub labels: Option<Vec<LabelDefinition>>,
    #[serde(default)]
    pub n_images: u64,
    #[serde(default)]
    pub n_labeled_images: u64,
    #[serde(default)]
    pub n_queued_images: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Dataset {
    /// Label definitions keyed by name. Names are unique within a dataset.
    pub fn label_map(&self) -> BTreeMap<String, LabelDefinition> {
        self.labels
            .iter()
            .flatten()
            .map(|def| (def.name.clone(), def.clone()))
            .collect()
    }

    /// Append a label definition to the schema. Label names are the unique
    /// key within a dataset.
    pub fn add_label(&mut self, definition: LabelDefinition) -> Result<()> {
        definition.validate()?;
        if self
            .labels
            .iter()
            .flatten()
            .any(|existing| existing.name == definition.name)
        {
            return Err(ClientError::Schema(format!(
                "label '{}' already exists in dataset '{}'",
                definition.name, self.name
            )));
        }
        self.labels.get_or_insert_with(Vec::new).push(definition);
        Ok(())
    }

    /// Drop a label definition from the schema by name.
    pub fn remove_label(&mut self, name: &str) -> Result<()> {
        let labels = self.labels.get_or_insert_with(Vec::new);
        let before = labels.len();
        labels.retain(|definition| definition.name != name);
        if labels.len() == before {
            return Err(ClientError::Schema(format!(
                "dataset '{}' has no label named '{name}'",
                self.name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDatasetRequest {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateDatasetRequest {
    pub name: String,
    pub description: String,
    pub labels: Vec<LabelDefinition>,
}

/// An image row as the backend returns it. `labels` arrives either as an
/// array of `{name, value}` pairs or a name-to-value object depending on
/// the endpoint; use [`DatasetImage::label_values`] to read it uniformly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetImage {
    pub id: String,
    pub name: String,
    pub md5: String,
    pub dataset_id: String,
    #[serde(default)]
    pub source_url: Option<String>,
    pub labels: Option<serde_json::Value>,
    pub is_labeled: bool,
    pub is_queued: bool,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub updated_by_username: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DatasetImage {
    /// Normalize the wire `labels` field (array of pairs or object) into a
    /// name-to-value map. Unknown JSON value kinds are stringified.
    pub fn label_values(&self) -> BTreeMap<String, LabelValue> {
        let mut values = BTreeMap::new();
        match &self.labels {
            Some(serde_json::Value::Array(entries)) => {
                for entry in entries {
                    if let (Some(name), Some(value)) = (entry.get("name"), entry.get("value")) {
                        if let Some(name) = name.as_str() {
                            values.insert(name.to_string(), json_to_label_value(value));
                        }
                    }
                }
            }
            Some(serde_json::Value::Object(map)) => {
                for (name, value) in map {
                    values.insert(name.clone(), json_to_label_value(value));
                }
            }
            _ => {}
        }
        values
    }
}

fn json_to_label_value(value: &serde_json::Value) -> LabelValue {
    match value {
        serde_json::Value::Bool(b) => LabelValue::Bool(*b),
        serde_json::Value::String(s) => LabelValue::Text(s.clone()),
        other => LabelValue::Text(other.to_string()),
    }
}

/// PUT body for `/datasets/{id}/images/{imageId}`. Absent fields are left
/// untouched by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUpdateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<LabelUpdate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_labeled: Option<bool>,
}

/// POST body for `/datasets/{id}/images/upload-by-url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportImageRequest {
    pub url: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub labels: Option<Vec<LabelUpdate>>,
    pub is_labeled: Option<bool>,
}

/// Query parameters for the server-filtered, server-paginated image list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageQuery {
    pub is_labeled: Option<bool>,
    pub search_by_name: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

/// One page of results plus the pagination metadata the backend reports in
/// `X-Total-Count`, `X-Page-Size`, `X-Current-Page` and `X-Total-Pages`.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_items: u64,
    pub page_size: u32,
    pub current_page: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestRunStatus {
    Running,
    Completed,
    Stopped,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRun {
    pub id: String,
    pub description: Option<String>,
    pub run_start_time: DateTime<Utc>,
    pub run_end_time: DateTime<Utc>,
    pub status: TestRunStatus,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub accuracy: Option<f64>,
    pub f1_score: Option<f64>,
    pub n_test_cases: u64,
    #[serde(default)]
    pub extra_metrics: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub roles: Vec<String>,
    pub organization_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreateRequest {
    pub username: String,
    pub password: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlag {
    pub id: Uuid,
    pub name: String,
    pub enabled: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyPreview {
    pub id: String,
    pub api_key_preview: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyCreated {
    pub id: String,
    pub api_key: String,
    pub api_key_preview: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSchema {
    pub name: String,
    pub description: String,
    pub schema_definition: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn image_with_labels(labels: serde_json::Value) -> DatasetImage {
        serde_json::from_value(json!({
            "id": "img-1",
            "name": "one.png",
            "md5": "d41d8cd98f00b204e9800998ecf8427e",
            "dataset_id": "ds-1",
            "labels": labels,
            "is_labeled": true,
            "is_queued": false,
            "created_at": "2025-05-01T12:00:00Z",
            "updated_at": "2025-05-01T12:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn label_values_from_pair_array() {
        let image = image_with_labels(json!([
            {"name": "blurry", "value": true},
            {"name": "animal", "value": "cat"}
        ]));
        let values = image.label_values();
        assert_eq!(values["blurry"], LabelValue::Bool(true));
        assert_eq!(values["animal"], LabelValue::Text("cat".into()));
    }

    #[test]
    fn label_values_from_object() {
        let image = image_with_labels(json!({"blurry": false, "animal": "dog"}));
        let values = image.label_values();
        assert_eq!(values["blurry"], LabelValue::Bool(false));
        assert_eq!(values["animal"], LabelValue::Text("dog".into()));
    }

    #[test]
    fn label_type_round_trips_lowercase() {
        assert_eq!(serde_json::to_string(&LabelType::Boolean).unwrap(), "\"boolean\"");
        let parsed: LabelType = serde_json::from_str("\"category\"").unwrap();
        assert_eq!(parsed, LabelType::Category);
    }

    fn empty_dataset() -> Dataset {
        serde_json::from_value(json!({
            "id": "ds-1",
            "name": "animals",
            "description": "",
            "labels": null,
            "created_at": "2025-05-01T12:00:00Z",
            "updated_at": "2025-05-01T12:00:00Z"
        }))
        .unwrap()
    }

    fn boolean_label(name: &str) -> LabelDefinition {
        LabelDefinition {
            name: name.to_string(),
            label_type: LabelType::Boolean,
            description: String::new(),
            possible_values: Vec::new(),
        }
    }

    #[test]
    fn add_label_appends_to_schema() {
        let mut dataset = empty_dataset();
        dataset.add_label(boolean_label("blurry")).unwrap();
        dataset
            .add_label(LabelDefinition {
                name: "animal".into(),
                label_type: LabelType::Category,
                description: String::new(),
                possible_values: vec!["cat".into(), "dog".into()],
            })
            .unwrap();
        let names: Vec<_> = dataset.label_map().into_keys().collect();
        assert_eq!(names, vec!["animal".to_string(), "blurry".to_string()]);
    }

    #[test]
    fn add_label_rejects_duplicate_names() {
        let mut dataset = empty_dataset();
        dataset.add_label(boolean_label("blurry")).unwrap();
        let err = dataset.add_label(boolean_label("blurry")).unwrap_err();
        assert!(matches!(err, ClientError::Schema(_)));
    }

    #[test]
    fn category_label_needs_possible_values() {
        let mut dataset = empty_dataset();
        let err = dataset
            .add_label(LabelDefinition {
                name: "animal".into(),
                label_type: LabelType::Category,
                description: String::new(),
                possible_values: Vec::new(),
            })
            .unwrap_err();
        assert!(matches!(err, ClientError::Schema(_)));
    }

    #[test]
    fn remove_label_drops_only_the_named_definition() {
        let mut dataset = empty_dataset();
        dataset.add_label(boolean_label("blurry")).unwrap();
        dataset.add_label(boolean_label("occluded")).unwrap();
        dataset.remove_label("blurry").unwrap();
        let names: Vec<_> = dataset.label_map().into_keys().collect();
        assert_eq!(names, vec!["occluded".to_string()]);
        assert!(matches!(
            dataset.remove_label("blurry").unwrap_err(),
            ClientError::Schema(_)
        ));
    }

    #[test]
    fn image_update_request_skips_absent_fields() {
        let request = ImageUpdateRequest {
            name: None,
            comment: None,
            labels: None,
            is_labeled: Some(false),
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            "{\"is_labeled\":false}"
        );
    }
}
