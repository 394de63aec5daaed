//! Storage folder endpoints

use async_trait::async_trait;
use stepline_core::dto::folder::{CreateFolder, FolderInfo, MakeDirectory};
use tracing::debug;

use crate::error::Result;
use crate::{ContentStore, ManagerClient};

impl ManagerClient {
    fn file_url(&self, container: &str) -> String {
        format!("{}/folders/{}/file", self.base_url, container)
    }
}

#[async_trait]
impl ContentStore for ManagerClient {
    async fn list(&self) -> Result<Vec<FolderInfo>> {
        let url = format!("{}/folders", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response, "folders").await
    }

    async fn create(&self, container: &str, host: &str) -> Result<()> {
        let url = format!("{}/folders", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&CreateFolder {
                name: container.to_string(),
                host: host.to_string(),
            })
            .send()
            .await?;

        self.handle_empty_response(response, container).await
    }

    async fn mkdir(&self, container: &str, path: &str) -> Result<()> {
        let url = format!("{}/folders/{}/mkdir", self.base_url, container);
        let response = self
            .client
            .post(&url)
            .json(&MakeDirectory {
                path: path.to_string(),
                parents: true,
            })
            .send()
            .await?;

        self.handle_empty_response(response, container).await
    }

    async fn upload(&self, container: &str, path: &str, bytes: Vec<u8>) -> Result<()> {
        debug!("Uploading {} bytes to {}/{}", bytes.len(), container, path);

        let response = self
            .client
            .put(self.file_url(container))
            .query(&[("path", path)])
            .body(bytes)
            .send()
            .await?;

        self.handle_empty_response(response, &format!("{}/{}", container, path))
            .await
    }

    async fn download(&self, container: &str, path: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.file_url(container))
            .query(&[("path", path)])
            .send()
            .await?;

        self.handle_bytes_response(response, &format!("{}/{}", container, path))
            .await
    }
}
