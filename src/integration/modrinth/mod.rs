//! Client for the Modrinth mod index.
//!
//! Every remote call returns a typed [`SearchError`]. The search entry points
//! used by the HTTP surface log that error and collapse it into an empty
//! result, so callers cannot tell "nothing found" from "index unavailable".

use std::path::Path;

use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use tokio::io::AsyncWriteExt;

use crate::types::manifest::is_valid_identifier;

pub mod models;

use models::{ModSearchResult, ModVersion, SearchResponse};

pub const DEFAULT_API_URL: &str = "https://api.modrinth.com/v2";
pub const DEFAULT_LIMIT: u32 = 20;

const MOD_FACET: &str = r#"[["project_types:mod"]]"#;

#[derive(thiserror::Error, Debug)]
pub enum SearchError {
    #[error("Invalid mod index URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid project or version reference '{0}'")]
    InvalidReference(String),
    #[error("Failed to contact the mod index: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Mod index responded with {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Failed to encode request: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Release {0} has no downloadable files")]
    NoFiles(String),
    #[error("No release of {0} matches the requested game versions and loader")]
    NoMatchingVersion(String),
    #[error("Failed to write downloaded file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy)]
enum SortIndex {
    Relevance,
    Downloads,
}

impl SortIndex {
    fn as_str(self) -> &'static str {
        match self {
            SortIndex::Relevance => "relevance",
            SortIndex::Downloads => "downloads",
        }
    }
}

#[derive(Clone)]
pub struct ModrinthClient {
    http: Client,
    base_url: Url,
}

impl ModrinthClient {
    pub fn new(base_url: &str) -> Result<ModrinthClient, SearchError> {
        // Url::join drops the last path segment unless the base ends in a slash
        let base = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&base).map_err(|e| SearchError::InvalidUrl(e.to_string()))?;
        let http = Client::builder()
            .user_agent(concat!("modpack-index/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(ModrinthClient { http, base_url })
    }

    fn get(&self, endpoint: &str) -> Result<RequestBuilder, SearchError> {
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|e| SearchError::InvalidUrl(e.to_string()))?;
        Ok(self
            .http
            .get(url)
            .header(ACCEPT, HeaderValue::from_static("application/json")))
    }

    /// Relevance-ranked mod search. An empty query never reaches the index.
    pub async fn search(
        &self,
        query: &str,
        game_version: Option<&str>,
        loader: Option<&str>,
        limit: u32,
    ) -> Vec<ModSearchResult> {
        if query.is_empty() {
            return vec![];
        }

        match self
            .try_search(Some(query), SortIndex::Relevance, game_version, loader, limit)
            .await
        {
            Ok(results) => results,
            Err(e) => {
                log::error!("Mod search for '{}' failed: {}", query, e);
                vec![]
            }
        }
    }

    /// Mods ranked by download count.
    pub async fn popular(
        &self,
        game_version: Option<&str>,
        loader: Option<&str>,
        limit: u32,
    ) -> Vec<ModSearchResult> {
        match self
            .try_search(None, SortIndex::Downloads, game_version, loader, limit)
            .await
        {
            Ok(results) => results,
            Err(e) => {
                log::error!("Popular mod listing failed: {}", e);
                vec![]
            }
        }
    }

    async fn try_search(
        &self,
        query: Option<&str>,
        index: SortIndex,
        game_version: Option<&str>,
        loader: Option<&str>,
        limit: u32,
    ) -> Result<Vec<ModSearchResult>, SearchError> {
        let mut params: Vec<(&str, String)> = vec![
            ("limit", limit.to_string()),
            ("index", index.as_str().to_string()),
            ("facets", MOD_FACET.to_string()),
        ];
        if let Some(query) = query {
            params.push(("query", query.to_string()));
        }

        // The loader is matched against game_versions as well; this index
        // integration has no dedicated loader filter.
        let filters = [game_version, loader]
            .into_iter()
            .flatten()
            .map(|v| format!("game_versions:{}", v))
            .collect::<Vec<_>>();
        if !filters.is_empty() {
            params.push(("filter", filters.join(" AND ")));
        }

        log::debug!("Searching mod index with {:?}", params);
        let response = self.get("search")?.query(&params).send().await?;
        let body: SearchResponse = check_status(response).await?.json().await?;

        Ok(body.hits.into_iter().map(ModSearchResult::from).collect())
    }

    pub async fn version(&self, version_id: &str) -> Result<ModVersion, SearchError> {
        if !is_valid_identifier(version_id) {
            return Err(SearchError::InvalidReference(version_id.to_string()));
        }

        let response = self.get(&format!("version/{}", version_id))?.send().await?;
        Ok(check_status(response).await?.json().await?)
    }

    /// Newest release of `project_id` built for any of `game_versions` and `loader`.
    pub async fn latest_version(
        &self,
        project_id: &str,
        game_versions: &[String],
        loader: Option<&str>,
    ) -> Result<ModVersion, SearchError> {
        if !is_valid_identifier(project_id) {
            return Err(SearchError::InvalidReference(project_id.to_string()));
        }

        let mut params: Vec<(&str, String)> = vec![];
        if !game_versions.is_empty() {
            params.push(("game_versions", serde_json::to_string(game_versions)?));
        }
        if let Some(loader) = loader {
            params.push(("loaders", serde_json::to_string(&[loader])?));
        }

        let response = self
            .get(&format!("project/{}/version", project_id))?
            .query(&params)
            .send()
            .await?;
        let versions: Vec<ModVersion> = check_status(response).await?.json().await?;

        versions
            .into_iter()
            .next()
            .ok_or_else(|| SearchError::NoMatchingVersion(project_id.to_string()))
    }

    /// Streams `url` into `destination`, returning the number of bytes written.
    pub async fn download(&self, url: &str, destination: &Path) -> Result<u64, SearchError> {
        let result = async {
            let mut response = check_status(self.http.get(url).send().await?).await?;
            let mut file = tokio::fs::File::create(destination).await?;
            let mut written = 0u64;
            while let Some(chunk) = response.chunk().await? {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok::<u64, SearchError>(written)
        }
        .await;

        if result.is_err() {
            let _ = tokio::fs::remove_file(destination).await;
        }
        result
    }

    /// Downloads the primary file of release `version_id` to `destination`.
    pub async fn fetch_file(&self, version_id: &str, destination: &Path) -> bool {
        let result = async {
            let version = self.version(version_id).await?;
            let file = version
                .primary_file()
                .ok_or_else(|| SearchError::NoFiles(version_id.to_string()))?;
            self.download(&file.url, destination).await
        }
        .await;

        match result {
            Ok(bytes) => {
                log::info!(
                    "Downloaded release {} to {} ({} bytes)",
                    version_id,
                    destination.display(),
                    bytes
                );
                true
            }
            Err(e) => {
                log::error!("Failed to fetch release {}: {}", version_id, e);
                false
            }
        }
    }
}

async fn check_status(response: Response) -> Result<Response, SearchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(SearchError::Status { status, body })
}
