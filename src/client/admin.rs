use super::ApiClient;
use crate::error::Result;
use crate::types::{ApiKeyCreated, ApiKeyPreview, FeatureFlag, User, UserCreateRequest};
use serde_json::json;
use tracing::{info, instrument};

impl ApiClient {
    // --- admin users -----------------------------------------------------

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let response = self.get("/admin/users").send().await?;
        Ok(self.check(response).await?.json().await?)
    }

    #[instrument(skip(self, body), fields(username = %body.username))]
    pub async fn create_user(&self, body: &UserCreateRequest) -> Result<User> {
        let response = self.post("/admin/users").json(body).send().await?;
        let user: User = self.check(response).await?.json().await?;
        info!(id = %user.id, "created user");
        Ok(user)
    }

    pub async fn update_user_password(&self, user_id: &str, password: &str) -> Result<()> {
        let response = self
            .put(&format!("/admin/users/{user_id}/password"))
            .json(&json!({ "password": password }))
            .send()
            .await?;
        self.check(response).await?;
        info!(user_id, "updated user password");
        Ok(())
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<()> {
        let response = self.delete(&format!("/admin/users/{user_id}")).send().await?;
        self.check(response).await?;
        info!(user_id, "deleted user");
        Ok(())
    }

    // --- feature flags ---------------------------------------------------

    pub async fn feature_flags(&self) -> Result<Vec<FeatureFlag>> {
        let response = self.get("/feature-flags").send().await?;
        Ok(self.check(response).await?.json().await?)
    }

    /// Flags are addressed by name, not id.
    pub async fn set_feature_flag(&self, name: &str, enabled: bool) -> Result<FeatureFlag> {
        let response = self
            .patch(&format!("/feature-flags/{name}"))
            .json(&json!({ "enabled": enabled }))
            .send()
            .await?;
        let flag: FeatureFlag = self.check(response).await?.json().await?;
        info!(name, enabled, "updated feature flag");
        Ok(flag)
    }

    // --- api keys --------------------------------------------------------

    pub async fn list_api_keys(&self) -> Result<Vec<ApiKeyPreview>> {
        let response = self.get("/key-management").send().await?;
        Ok(self.check(response).await?.json().await?)
    }

    /// The full key value is only ever returned by this call.
    pub async fn create_api_key(&self) -> Result<ApiKeyCreated> {
        let response = self.post("/key-management").send().await?;
        let key: ApiKeyCreated = self.check(response).await?.json().await?;
        info!(id = %key.id, "created api key");
        Ok(key)
    }

    pub async fn revoke_api_key(&self, key_id: &str) -> Result<()> {
        let response = self.delete(&format!("/key-management/{key_id}")).send().await?;
        self.check(response).await?;
        info!(key_id, "revoked api key");
        Ok(())
    }
}
