/// Client for the model catalog service that lists uploaded models
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::CatalogError;
use crate::loader::ModelResource;

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelRecord {
    pub id: u64,
    pub name: String,
    #[serde(rename = "file")]
    pub file_locator: String,
    #[serde(default)]
    pub file_format: Option<String>,
    #[serde(rename = "uploaded_at", alias = "created_at", default)]
    pub created_at: Option<String>,
}

impl ModelRecord {
    /// The loadable resource behind this record
    pub fn resource(&self) -> ModelResource {
        let resource = ModelResource::new(self.file_locator.clone());
        match &self.file_format {
            Some(format) => resource.with_format_hint(format.clone()),
            None => resource,
        }
    }
}

pub trait ModelCatalog: Send + Sync {
    fn list_models(&self) -> BoxFuture<'_, Result<Vec<ModelRecord>, CatalogError>>;

    fn fetch_model_record<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<ModelRecord, CatalogError>>;
}

/// Catalog served over HTTP at `{base_url}/models/`
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCatalog {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn models_url(&self) -> String {
        format!("{}/models/", self.base_url)
    }

    fn model_url(&self, id: &str) -> String {
        format!("{}/models/{}/", self.base_url, id)
    }

    /// Resolve a relative file path (e.g. `/media/models/a.stl`) against the service.
    fn absolutize(&self, mut record: ModelRecord) -> ModelRecord {
        if !record.file_locator.contains("://") {
            if let Ok(joined) =
                reqwest::Url::parse(&self.base_url).and_then(|base| base.join(&record.file_locator))
            {
                record.file_locator = joined.to_string();
            }
        }
        record
    }
}

impl ModelCatalog for HttpCatalog {
    fn list_models(&self) -> BoxFuture<'_, Result<Vec<ModelRecord>, CatalogError>> {
        async move {
            let response = self.client.get(self.models_url()).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(CatalogError::Status {
                    status: status.as_u16(),
                });
            }
            let records: Vec<ModelRecord> = response.json().await?;
            tracing::debug!(count = records.len(), "listed models");
            Ok(records.into_iter().map(|r| self.absolutize(r)).collect())
        }
        .boxed()
    }

    fn fetch_model_record<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<ModelRecord, CatalogError>> {
        async move {
            let response = self.client.get(self.model_url(id)).send().await?;
            match response.status() {
                StatusCode::NOT_FOUND => Err(CatalogError::NotFound { id: id.to_string() }),
                status if !status.is_success() => Err(CatalogError::Status {
                    status: status.as_u16(),
                }),
                _ => {
                    let record: ModelRecord = response.json().await?;
                    tracing::debug!(id = record.id, name = %record.name, "fetched model record");
                    Ok(self.absolutize(record))
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::MeshFormat;

    #[test]
    fn test_record_from_json() {
        let record: ModelRecord = serde_json::from_str(
            r#"{
                "id": 7,
                "name": "bracket",
                "file": "http://localhost:8000/media/models/bracket",
                "file_format": "stl",
                "uploaded_at": "2024-03-01T12:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(record.id, 7);
        assert_eq!(record.created_at.as_deref(), Some("2024-03-01T12:00:00Z"));

        let resource = record.resource();
        assert_eq!(resource.locator, "http://localhost:8000/media/models/bracket");
        assert_eq!(resource.format(), MeshFormat::Stl);
    }

    #[test]
    fn test_minimal_record() {
        let records: Vec<ModelRecord> =
            serde_json::from_str(r#"[{"id": 1, "name": "cup", "file": "/media/models/cup.obj", "created_at": "x"}]"#)
                .unwrap();
        assert_eq!(records[0].file_format, None);
        assert_eq!(records[0].created_at.as_deref(), Some("x"));
        assert_eq!(records[0].resource().format(), MeshFormat::Obj);
    }

    #[test]
    fn test_urls() {
        let catalog = HttpCatalog::new(reqwest::Client::new(), "http://localhost:8000/api/");
        assert_eq!(catalog.models_url(), "http://localhost:8000/api/models/");
        assert_eq!(catalog.model_url("3"), "http://localhost:8000/api/models/3/");

        let record = catalog.absolutize(ModelRecord {
            id: 3,
            name: "cup".into(),
            file_locator: "/media/models/cup.obj".into(),
            file_format: None,
            created_at: None,
        });
        assert_eq!(record.file_locator, "http://localhost:8000/media/models/cup.obj");
    }
}
