use crate::types::{
    Dataset, DatasetImage, ImageQuery, ImageUpdateRequest, LabelDefinition, LabelType,
    LabelUpdate, LabelValue, Page,
};
use std::collections::{BTreeMap, HashMap};

/// The dataset view's tabs. Each issues its own server-side filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    All,
    Labeled,
    Queued,
    Tests,
}

impl Tab {
    /// The `is_labeled` filter this tab sends, if any. Queued means
    /// not-yet-labeled. The tests tab lists test runs, not images.
    pub fn is_labeled_filter(self) -> Option<bool> {
        match self {
            Tab::All | Tab::Tests => None,
            Tab::Labeled => Some(true),
            Tab::Queued => Some(false),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub page_size: u32,
    pub total_items: u64,
}

/// Per-image edit buffers: what the user is typing before a save.
#[derive(Debug, Clone, Default)]
pub struct ImageEdit {
    pub name: String,
    pub comment: String,
    pub labels: BTreeMap<String, LabelValue>,
}

/// Client-side state of one dataset's paginated image list: active tab,
/// search, pagination, the current page of images, and the edit buffers.
/// All filtering and paging is done by the server; this struct only builds
/// queries and ingests responses.
pub struct ImageBrowser {
    label_definitions: Vec<LabelDefinition>,
    tab: Tab,
    search: String,
    pagination: Pagination,
    images: Vec<DatasetImage>,
    edits: HashMap<String, ImageEdit>,
}

impl ImageBrowser {
    pub fn new(dataset: &Dataset, page_size: u32) -> Self {
        Self {
            label_definitions: dataset.labels.clone().unwrap_or_default(),
            tab: Tab::All,
            search: String::new(),
            pagination: Pagination {
                current_page: 1,
                total_pages: 1,
                page_size,
                total_items: 0,
            },
            images: Vec::new(),
            edits: HashMap::new(),
        }
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn images(&self) -> &[DatasetImage] {
        &self.images
    }

    pub fn edit(&self, image_id: &str) -> Option<&ImageEdit> {
        self.edits.get(image_id)
    }

    /// Switching tabs restarts at page one.
    pub fn set_tab(&mut self, tab: Tab) {
        if self.tab != tab {
            self.tab = tab;
            self.pagination.current_page = 1;
        }
    }

    /// Changing the search query restarts at page one.
    pub fn set_search(&mut self, search: &str) {
        if self.search != search {
            self.search = search.to_string();
            self.pagination.current_page = 1;
        }
    }

    pub fn set_page(&mut self, page: u32) {
        self.pagination.current_page = page.clamp(1, self.pagination.total_pages.max(1));
    }

    /// The query for the current tab, page and search.
    pub fn query(&self) -> ImageQuery {
        let offset = (self.pagination.current_page - 1) * self.pagination.page_size;
        ImageQuery {
            is_labeled: self.tab.is_labeled_filter(),
            search_by_name: if self.search.is_empty() {
                None
            } else {
                Some(self.search.clone())
            },
            limit: self.pagination.page_size,
            offset,
        }
    }

    /// Ingest one server page: adopt the reported pagination metadata and
    /// rebuild each image's edit buffers from its saved fields. The backend
    /// reports page 0 for an empty result set; the view is always on a page.
    pub fn apply_page(&mut self, page: Page<DatasetImage>) {
        self.pagination = Pagination {
            current_page: page.current_page.max(1),
            total_pages: page.total_pages.max(1),
            page_size: page.page_size,
            total_items: page.total_items,
        };
        self.edits.clear();
        for image in &page.items {
            self.edits.insert(
                image.id.clone(),
                ImageEdit {
                    name: image.name.clone(),
                    comment: image.comment.clone().unwrap_or_default(),
                    labels: image.label_values(),
                },
            );
        }
        self.images = page.items;
    }

    pub fn set_label(&mut self, image_id: &str, name: &str, value: LabelValue) {
        if let Some(edit) = self.edits.get_mut(image_id) {
            edit.labels.insert(name.to_string(), value);
        }
    }

    pub fn set_comment(&mut self, image_id: &str, comment: &str) {
        if let Some(edit) = self.edits.get_mut(image_id) {
            edit.comment = comment.to_string();
        }
    }

    pub fn set_name(&mut self, image_id: &str, name: &str) {
        if let Some(edit) = self.edits.get_mut(image_id) {
            edit.name = name.to_string();
        }
    }

    fn default_value(definition: &LabelDefinition) -> LabelValue {
        match definition.label_type {
            LabelType::Boolean => LabelValue::Bool(false),
            LabelType::Category => LabelValue::Text(
                definition.possible_values.first().cloned().unwrap_or_default(),
            ),
        }
    }

    /// Build the save request for an image. The label list always covers
    /// the dataset's full current schema; values the user never touched
    /// get the type's default. `is_labeled` flips to true only when the
    /// image is still queued.
    pub fn save_request(&self, image_id: &str) -> Option<ImageUpdateRequest> {
        let image = self.images.iter().find(|img| img.id == image_id)?;
        let edit = self.edits.get(image_id)?;

        let labels = self
            .label_definitions
            .iter()
            .map(|definition| LabelUpdate {
                name: definition.name.clone(),
                value: edit
                    .labels
                    .get(&definition.name)
                    .cloned()
                    .unwrap_or_else(|| Self::default_value(definition)),
            })
            .collect();

        Some(ImageUpdateRequest {
            name: Some(edit.name.clone()),
            comment: Some(edit.comment.clone()),
            labels: Some(labels),
            is_labeled: if image.is_labeled { None } else { Some(true) },
        })
    }

    /// Merge a successful save back into the list.
    pub fn mark_saved(&mut self, updated: DatasetImage) {
        if let Some(slot) = self.images.iter_mut().find(|img| img.id == updated.id) {
            *slot = updated;
        }
    }

    /// After a successful `is_labeled=false` PUT: the image leaves the
    /// Labeled tab's list; other tabs just refresh it in place.
    pub fn mark_queued(&mut self, updated: DatasetImage) {
        if self.tab == Tab::Labeled {
            self.remove(&updated.id);
        } else {
            self.mark_saved(updated);
        }
    }

    /// Drop an image (after deletion) along with its edit buffers.
    pub fn remove(&mut self, image_id: &str) {
        self.images.retain(|img| img.id != image_id);
        self.edits.remove(image_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn dataset() -> Dataset {
        Dataset {
            id: "ds-1".into(),
            name: "animals".into(),
            description: String::new(),
            labels: Some(vec![
                LabelDefinition {
                    name: "blurry".into(),
                    label_type: LabelType::Boolean,
                    description: String::new(),
                    possible_values: vec![],
                },
                LabelDefinition {
                    name: "animal".into(),
                    label_type: LabelType::Category,
                    description: String::new(),
                    possible_values: vec!["cat".into(), "dog".into()],
                },
            ]),
            n_images: 0,
            n_labeled_images: 0,
            n_queued_images: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn image(id: &str, is_labeled: bool) -> DatasetImage {
        DatasetImage {
            id: id.into(),
            name: format!("{id}.png"),
            md5: format!("md5-{id}"),
            dataset_id: "ds-1".into(),
            source_url: None,
            labels: None,
            is_labeled,
            is_queued: !is_labeled,
            comment: None,
            updated_by_username: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn page(items: Vec<DatasetImage>, current_page: u32) -> Page<DatasetImage> {
        Page {
            total_items: items.len() as u64,
            page_size: 10,
            current_page,
            total_pages: 3,
            items,
        }
    }

    #[test]
    fn offset_is_page_minus_one_times_page_size() {
        let mut browser = ImageBrowser::new(&dataset(), 10);
        browser.apply_page(page(vec![], 1));
        browser.set_page(3);
        assert_eq!(browser.query().offset, 20);
        assert_eq!(browser.query().limit, 10);
    }

    #[test]
    fn tab_filters_set_is_labeled() {
        let mut browser = ImageBrowser::new(&dataset(), 10);
        assert_eq!(browser.query().is_labeled, None);
        browser.set_tab(Tab::Labeled);
        assert_eq!(browser.query().is_labeled, Some(true));
        browser.set_tab(Tab::Queued);
        assert_eq!(browser.query().is_labeled, Some(false));
    }

    #[test]
    fn search_change_resets_page() {
        let mut browser = ImageBrowser::new(&dataset(), 10);
        browser.apply_page(page(vec![], 1));
        browser.set_page(2);
        browser.set_search("cat");
        assert_eq!(browser.pagination().current_page, 1);
        assert_eq!(browser.query().search_by_name.as_deref(), Some("cat"));

        // Same query again must not reset
        browser.set_page(2);
        browser.set_search("cat");
        assert_eq!(browser.pagination().current_page, 2);
    }

    #[test]
    fn tab_change_resets_page() {
        let mut browser = ImageBrowser::new(&dataset(), 10);
        browser.apply_page(page(vec![], 1));
        browser.set_page(3);
        browser.set_tab(Tab::Labeled);
        assert_eq!(browser.pagination().current_page, 1);
    }

    #[test]
    fn save_request_defaults_missing_labels() {
        let mut browser = ImageBrowser::new(&dataset(), 10);
        browser.apply_page(page(vec![image("img-1", true)], 1));

        let request = browser.save_request("img-1").unwrap();
        let labels = request.labels.unwrap();
        assert_eq!(labels.len(), 2);
        assert!(labels.contains(&LabelUpdate {
            name: "blurry".into(),
            value: LabelValue::Bool(false),
        }));
        assert!(labels.contains(&LabelUpdate {
            name: "animal".into(),
            value: LabelValue::Text("cat".into()),
        }));
        // Already labeled: is_labeled left untouched
        assert_eq!(request.is_labeled, None);
    }

    #[test]
    fn saving_a_queued_image_marks_it_labeled() {
        let mut browser = ImageBrowser::new(&dataset(), 10);
        browser.apply_page(page(vec![image("img-1", false)], 1));
        browser.set_label("img-1", "animal", LabelValue::Text("dog".into()));
        browser.set_comment("img-1", "second pass");

        let request = browser.save_request("img-1").unwrap();
        assert_eq!(request.is_labeled, Some(true));
        assert_eq!(request.comment.as_deref(), Some("second pass"));
        assert!(request.labels.unwrap().contains(&LabelUpdate {
            name: "animal".into(),
            value: LabelValue::Text("dog".into()),
        }));
    }

    #[test]
    fn queueing_removes_from_labeled_tab_only() {
        let mut browser = ImageBrowser::new(&dataset(), 10);
        browser.set_tab(Tab::Labeled);
        browser.apply_page(page(vec![image("img-1", true), image("img-2", true)], 1));

        let mut updated = image("img-1", false);
        updated.is_queued = true;
        browser.mark_queued(updated);
        assert_eq!(browser.images().len(), 1);
        assert_eq!(browser.images()[0].id, "img-2");

        // On the All tab the image stays, refreshed in place
        let mut browser = ImageBrowser::new(&dataset(), 10);
        browser.apply_page(page(vec![image("img-1", true)], 1));
        let mut updated = image("img-1", false);
        updated.is_queued = true;
        browser.mark_queued(updated);
        assert_eq!(browser.images().len(), 1);
        assert!(!browser.images()[0].is_labeled);
    }

    #[test]
    fn remove_drops_image_and_buffers() {
        let mut browser = ImageBrowser::new(&dataset(), 10);
        browser.apply_page(page(vec![image("img-1", true)], 1));
        browser.remove("img-1");
        assert!(browser.images().is_empty());
        assert!(browser.edit("img-1").is_none());
    }

    #[test]
    fn empty_page_keeps_at_least_one_total_page() {
        let mut browser = ImageBrowser::new(&dataset(), 10);
        browser.apply_page(Page {
            items: vec![],
            total_items: 0,
            page_size: 10,
            current_page: 1,
            total_pages: 0,
        });
        assert_eq!(browser.pagination().total_pages, 1);
    }

    #[test]
    fn zero_current_page_from_server_is_clamped() {
        let mut browser = ImageBrowser::new(&dataset(), 10);
        browser.apply_page(Page {
            items: vec![],
            total_items: 0,
            page_size: 10,
            current_page: 0,
            total_pages: 0,
        });
        assert_eq!(browser.pagination().current_page, 1);
        // The next query must not underflow the offset
        assert_eq!(browser.query().offset, 0);
    }
}
