use super::ApiClient;
use crate::error::{ClientError, Result};
use crate::import::ImageUploadPort;
use crate::types::{
    DatasetImage, ImageQuery, ImageUpdateRequest, ImportImageRequest, LabelUpdate, Page,
};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::multipart::{Form, Part};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Optional fields accompanying a file upload.
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub url: Option<String>,
    pub name: Option<String>,
    pub labels: Vec<LabelUpdate>,
    pub is_labeled: bool,
}

fn header_u64(headers: &HeaderMap, name: &str, fallback: u64) -> u64 {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

impl ApiClient {
    /// Server-paginated, server-filtered image list. Pagination metadata is
    /// read back from the response headers.
    #[instrument(skip(self, query), fields(limit = query.limit, offset = query.offset))]
    pub async fn list_images(
        &self,
        dataset_id: &str,
        query: &ImageQuery,
    ) -> Result<Page<DatasetImage>> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(is_labeled) = query.is_labeled {
            params.push(("is_labeled", is_labeled.to_string()));
        }
        if let Some(search) = &query.search_by_name {
            if !search.is_empty() {
                params.push(("search_by_name", search.clone()));
            }
        }
        params.push(("limit", query.limit.to_string()));
        params.push(("offset", query.offset.to_string()));

        let response = self
            .get(&format!("/datasets/{dataset_id}/images"))
            .query(&params)
            .send()
            .await?;
        let response = self.check(response).await?;

        let headers = response.headers().clone();
        let total_items = header_u64(&headers, "X-Total-Count", 0);
        let page_size = header_u64(&headers, "X-Page-Size", query.limit as u64) as u32;
        // An empty result set comes back as page 0 of 0; the browse state
        // expects one-based pages.
        let current_page = header_u64(&headers, "X-Current-Page", 1).max(1) as u32;
        // The backend reports 0 pages for an empty result set; the view
        // always shows at least one.
        let total_pages = header_u64(&headers, "X-Total-Pages", 1).max(1) as u32;

        let items: Vec<DatasetImage> = response.json().await?;
        debug!(count = items.len(), total_items, current_page, total_pages, "fetched images");

        Ok(Page {
            items,
            total_items,
            page_size,
            current_page,
            total_pages,
        })
    }

    pub async fn get_image(&self, dataset_id: &str, image_id: &str) -> Result<DatasetImage> {
        let response = self
            .get(&format!("/datasets/{dataset_id}/images/{image_id}"))
            .send()
            .await?;
        Ok(self.check(response).await?.json().await?)
    }

    pub async fn update_image(
        &self,
        dataset_id: &str,
        image_id: &str,
        body: &ImageUpdateRequest,
    ) -> Result<DatasetImage> {
        let response = self
            .put(&format!("/datasets/{dataset_id}/images/{image_id}"))
            .json(body)
            .send()
            .await?;
        Ok(self.check(response).await?.json().await?)
    }

    pub async fn delete_image(&self, dataset_id: &str, image_id: &str) -> Result<()> {
        let response = self
            .delete(&format!("/datasets/{dataset_id}/images/{image_id}"))
            .send()
            .await?;
        self.check(response).await?;
        info!(dataset_id, image_id, "deleted image");
        Ok(())
    }

    /// URL the backend serves the rendered image content at.
    pub fn render_url(&self, dataset_id: &str, image_id: &str) -> String {
        self.url(&format!("/datasets/{dataset_id}/images/{image_id}/render"))
    }

    /// Multipart upload of a local file. Labels travel as a JSON array in
    /// the `labels` form field.
    #[instrument(skip(self, options), fields(path = %path.display()))]
    pub async fn upload_image_by_file(
        &self,
        dataset_id: &str,
        path: &Path,
        options: &UploadOptions,
    ) -> Result<DatasetImage> {
        let bytes = tokio::fs::read(path).await?;
        let digest = hex::encode(Sha256::digest(&bytes));
        debug!(sha256 = %digest, size = bytes.len(), "read upload payload");

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::MissingField("file name".into()))?
            .to_string();

        let mut form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));
        if let Some(url) = &options.url {
            form = form.text("url", url.clone());
        }
        if let Some(name) = &options.name {
            form = form.text("name", name.clone());
        }
        form = form
            .text("labels", serde_json::to_string(&options.labels)?)
            .text("is_labeled", options.is_labeled.to_string());

        let response = self
            .post(&format!("/datasets/{dataset_id}/images/upload-by-file"))
            .multipart(form)
            .send()
            .await?;
        let image: DatasetImage = self.check(response).await?.json().await?;
        info!(id = %image.id, "uploaded image by file");
        Ok(image)
    }

    /// JSON upload of a remote image. The backend answers 409 when the URL
    /// was already imported; `check` maps that to [`ClientError::Conflict`].
    pub async fn upload_image_by_url(
        &self,
        dataset_id: &str,
        request: &ImportImageRequest,
    ) -> Result<DatasetImage> {
        let response = self
            .post(&format!("/datasets/{dataset_id}/images/upload-by-url"))
            .json(request)
            .send()
            .await?;
        let image: DatasetImage = self.check(response).await?.json().await?;
        info!(id = %image.id, "uploaded image by url");
        Ok(image)
    }
}

#[async_trait]
impl ImageUploadPort for ApiClient {
    async fn upload_by_url(
        &self,
        dataset_id: &str,
        request: &ImportImageRequest,
    ) -> Result<DatasetImage> {
        self.upload_image_by_url(dataset_id, request).await
    }
}
