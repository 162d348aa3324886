use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};

use folio_core::storage::{Category, Document, RemoteSource, SyncError};

use super::error::{map_response_error, HttpRemoteError};
use super::shared::{HttpRemoteConfig, SharedClient};

/// Answer of the health endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub storage: Option<String>,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

// The create endpoint answers either with the record itself or wrapped as `{ "file": ... }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum CreateResponse {
    Envelope { file: Document },
    Bare(Document),
}

/// [`RemoteSource`] talking to the Folio backend over HTTP.
#[derive(Clone, Debug)]
pub struct HttpRemote {
    shared: SharedClient,
}

impl HttpRemote {
    pub fn new(config: HttpRemoteConfig) -> Result<Self, HttpRemoteError> {
        Self::new_with_client(config, None)
    }

    /// Like [`new`](Self::new), using `client_override` instead of building a client.
    pub fn new_with_client(
        config: HttpRemoteConfig,
        client_override: Option<Client>,
    ) -> Result<Self, HttpRemoteError> {
        Ok(Self {
            shared: SharedClient::new(config, client_override)?,
        })
    }

    pub fn config(&self) -> &HttpRemoteConfig {
        self.shared.config()
    }

    /// Queries the health endpoint.
    #[instrument(skip(self))]
    pub async fn health(&self) -> Result<HealthStatus, HttpRemoteError> {
        let url = self.shared.build_url(&["api", "health"])?;
        let response = self.shared.get(url).send().await?;
        read_json(response, "health").await
    }

    async fn list_documents(&self) -> Result<Vec<Document>, HttpRemoteError> {
        let url = self.shared.build_url(&["api", "files"])?;
        let response = self.shared.get(url).send().await?;
        // An empty store is serialized as `null`.
        let documents: Option<Vec<Document>> = read_json(response, "file list").await?;
        Ok(documents.unwrap_or_default())
    }

    async fn create_document(&self, document: &Document) -> Result<Document, HttpRemoteError> {
        let url = self.shared.build_url(&["api", "files"])?;
        let response = self.shared.post(url).json(document).send().await?;
        match read_json(response, "created file").await? {
            CreateResponse::Envelope { file } | CreateResponse::Bare(file) => Ok(file),
        }
    }

    async fn delete_document(&self, filename: &str) -> Result<(), HttpRemoteError> {
        let url = self.shared.build_url(&["api", "files", filename])?;
        let response = self.shared.delete(url).send().await?;
        if !response.status().is_success() {
            return Err(map_response_error(response).await);
        }
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, HttpRemoteError> {
        let url = self.shared.build_url(&["api", "categories"])?;
        let response = self.shared.get(url).send().await?;
        let categories: Option<Vec<Category>> = read_json(response, "category list").await?;
        Ok(categories
            .unwrap_or_default()
            .into_iter()
            .map(|mut category| {
                category.description = category.description.filter(|d| !d.is_empty());
                category
            })
            .collect())
    }

    async fn fetch_content(&self, filename: &str) -> Result<String, HttpRemoteError> {
        let url = self.shared.build_url(&["uploads", filename])?;
        let response = self.shared.get(url).send().await?;
        if !response.status().is_success() {
            return Err(map_response_error(response).await);
        }
        Ok(response.text().await?)
    }
}

async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    context: &str,
) -> Result<T, HttpRemoteError> {
    if !response.status().is_success() {
        return Err(map_response_error(response).await);
    }
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|source| HttpRemoteError::ResponseParsing {
        context: context.to_string(),
        source,
    })
}

#[async_trait]
impl RemoteSource for HttpRemote {
    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<Document>, SyncError> {
        let documents = self.list_documents().await?;
        debug!(count = documents.len(), "Fetched document list");
        Ok(documents)
    }

    #[instrument(skip(self, document), fields(filename = %document.filename))]
    async fn create(&self, document: &Document) -> Result<Document, SyncError> {
        Ok(self.create_document(document).await?)
    }

    #[instrument(skip(self))]
    async fn delete(&self, filename: &str) -> Result<(), SyncError> {
        Ok(self.delete_document(filename).await?)
    }

    #[instrument(skip(self))]
    async fn categories(&self) -> Result<Vec<Category>, SyncError> {
        Ok(self.list_categories().await?)
    }

    #[instrument(skip(self))]
    async fn content(&self, filename: &str) -> Result<String, SyncError> {
        Ok(self.fetch_content(filename).await?)
    }
}
