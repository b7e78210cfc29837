use crate::types::LabelDefinition;

const URL_HINTS: [&str; 3] = ["url", "image", "img"];

/// One dataset label's link to a CSV column. Disabled mappings are skipped
/// during import.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMapping {
    pub label_name: String,
    pub column: Option<String>,
    pub enabled: bool,
}

/// How CSV columns feed the upload request: which column holds the image
/// URL, which (optionally) the image name, and which columns map onto the
/// dataset's labels.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    pub url_column: Option<String>,
    pub name_column: Option<String>,
    pub labels: Vec<LabelMapping>,
}

impl ColumnMapping {
    /// Guess a mapping from the header row.
    ///
    /// The URL column is the first header containing "url", "image" or
    /// "img" (any case), falling back to the first column. The name column
    /// is the first header containing "name". Labels match their column by
    /// case-insensitive exact name first, then by substring.
    pub fn infer(headers: &[String], labels: &[LabelDefinition]) -> Self {
        let url_column = headers
            .iter()
            .find(|header| {
                let lowered = header.to_lowercase();
                URL_HINTS.iter().any(|hint| lowered.contains(hint))
            })
            .or_else(|| headers.first())
            .cloned();

        let name_column = headers
            .iter()
            .find(|header| header.to_lowercase().contains("name"))
            .cloned();

        let label_mappings = labels
            .iter()
            .map(|definition| {
                let wanted = definition.name.to_lowercase();
                let matched = headers
                    .iter()
                    .find(|header| header.to_lowercase() == wanted)
                    .or_else(|| {
                        headers
                            .iter()
                            .find(|header| header.to_lowercase().contains(&wanted))
                    });
                LabelMapping {
                    label_name: definition.name.clone(),
                    enabled: matched.is_some(),
                    column: matched.cloned(),
                }
            })
            .collect();

        Self {
            url_column,
            name_column,
            labels: label_mappings,
        }
    }

    /// Explicit user choices supersede inference. Unknown label names are
    /// ignored; the dataset schema is the source of truth.
    pub fn override_url_column(&mut self, column: Option<String>) {
        if column.is_some() {
            self.url_column = column;
        }
    }

    pub fn override_name_column(&mut self, column: Option<String>) {
        if column.is_some() {
            self.name_column = column;
        }
    }

    pub fn override_label(&mut self, label_name: &str, column: &str) {
        if let Some(mapping) = self
            .labels
            .iter_mut()
            .find(|mapping| mapping.label_name == label_name)
        {
            mapping.column = Some(column.to_string());
            mapping.enabled = true;
        }
    }

    /// Mappings that will actually contribute a label to each row.
    pub fn active_labels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.labels.iter().filter_map(|mapping| {
            if !mapping.enabled {
                return None;
            }
            mapping
                .column
                .as_deref()
                .map(|column| (mapping.label_name.as_str(), column))
        })
    }
}
