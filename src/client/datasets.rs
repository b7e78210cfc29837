use super::ApiClient;
use crate::error::Result;
use crate::types::{
    CreateDatasetRequest, Dataset, DatasetSchema, TestRun, UpdateDatasetRequest,
};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};

impl ApiClient {
    pub async fn list_datasets(&self) -> Result<Vec<Dataset>> {
        let response = self.get("/datasets").send().await?;
        Ok(self.check(response).await?.json().await?)
    }

    #[instrument(skip(self))]
    pub async fn create_dataset(&self, name: &str, description: &str) -> Result<Dataset> {
        let body = CreateDatasetRequest {
            name: name.to_string(),
            description: description.to_string(),
        };
        let response = self.post("/datasets").json(&body).send().await?;
        let dataset: Dataset = self.check(response).await?.json().await?;
        info!(id = %dataset.id, "created dataset");
        Ok(dataset)
    }

    pub async fn get_dataset(&self, id: &str) -> Result<Dataset> {
        let response = self.get(&format!("/datasets/{id}")).send().await?;
        Ok(self.check(response).await?.json().await?)
    }

    pub async fn update_dataset(&self, id: &str, body: &UpdateDatasetRequest) -> Result<Dataset> {
        let response = self.put(&format!("/datasets/{id}")).json(body).send().await?;
        Ok(self.check(response).await?.json().await?)
    }

    pub async fn delete_dataset(&self, id: &str) -> Result<()> {
        let response = self.delete(&format!("/datasets/{id}")).send().await?;
        self.check(response).await?;
        info!(id, "deleted dataset");
        Ok(())
    }

    /// Predefined dataset schema templates offered at creation time.
    pub async fn dataset_schemas(&self) -> Result<Vec<DatasetSchema>> {
        let response = self.get("/datasets/schemas").send().await?;
        Ok(self.check(response).await?.json().await?)
    }

    pub async fn test_runs(&self, dataset_id: &str) -> Result<Vec<TestRun>> {
        let response = self.get(&format!("/datasets/{dataset_id}/tests")).send().await?;
        Ok(self.check(response).await?.json().await?)
    }

    /// `GET /datasets/{id}/export` written to a local file. Returns the
    /// number of bytes written.
    #[instrument(skip(self, output))]
    pub async fn export_dataset(
        &self,
        dataset_id: &str,
        only_labeled: bool,
        output_format: &str,
        output: &Path,
    ) -> Result<u64> {
        let response = self
            .get(&format!("/datasets/{dataset_id}/export"))
            .query(&[
                ("only_labeled", if only_labeled { "true" } else { "false" }),
                ("output_format", output_format),
            ])
            .send()
            .await?;
        let mut response = self.check(response).await?;
        let mut file = tokio::fs::File::create(output).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        info!(path = %output.display(), bytes = written, "exported dataset");
        Ok(written)
    }
}
