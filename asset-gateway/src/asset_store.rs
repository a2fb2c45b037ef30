// asset-gateway/src/asset_store.rs
use actix_files::NamedFile;
use actix_web::http::header::{self, HeaderValue};
use actix_web::{HttpRequest, HttpResponse};
use async_trait::async_trait;
use common::{CacheConfig, StaticFilesConfig};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetStoreError {
    #[error("asset store I/O failure: {0}")]
    Io(#[from] io::Error),
}

/// Content store collaborator. `path` has already been classified and rewritten;
/// the response is returned to the client untouched.
#[async_trait(?Send)]
pub trait AssetStore: Send + Sync {
    async fn fetch(&self, req: &HttpRequest, path: &str) -> Result<HttpResponse, AssetStoreError>;
}

// Configuration for static file serving
#[derive(Debug, Clone)]
pub struct DirectoryAssetStore {
    root: PathBuf,
    cache: CacheConfig,
}

impl DirectoryAssetStore {
    pub fn new(root: impl Into<PathBuf>, cache: CacheConfig) -> Self {
        Self {
            root: root.into(),
            cache,
        }
    }

    /// `None` when the configured directory does not exist, i.e. no store binding
    pub fn from_config(config: &StaticFilesConfig) -> Option<Self> {
        let root = PathBuf::from(&config.path);
        if root.is_dir() {
            Some(Self::new(root, config.cache.clone()))
        } else {
            None
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // Map a URL path onto the root, refusing to climb out of it
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let mut resolved = self.root.clone();
        for segment in path.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return None,
                s if s.contains('\\') || s.contains('\0') => return None,
                s => resolved.push(s),
            }
        }
        Some(resolved)
    }

    fn cache_control(&self, path: &str) -> String {
        if path.to_ascii_lowercase().ends_with(".html") {
            return "no-cache".to_string();
        }

        let mut value = format!("public, max-age={}", self.cache.max_age);
        if self.cache.immutable {
            value.push_str(", immutable");
        }
        if self.cache.must_revalidate {
            value.push_str(", must-revalidate");
        }
        value
    }
}

fn not_found() -> HttpResponse {
    HttpResponse::NotFound()
        .content_type("text/plain; charset=utf-8")
        .body("Not Found")
}

#[async_trait(?Send)]
impl AssetStore for DirectoryAssetStore {
    async fn fetch(&self, req: &HttpRequest, path: &str) -> Result<HttpResponse, AssetStoreError> {
        let Some(file_path) = self.resolve(path) else {
            tracing::warn!("Rejected asset path outside the store root: {}", path);
            return Ok(not_found());
        };

        match tokio::fs::metadata(&file_path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(not_found()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(not_found()),
            Err(e) => return Err(e.into()),
        }

        let file = NamedFile::open_async(&file_path)
            .await?
            .prefer_utf8(true)
            .use_etag(true)
            .use_last_modified(true);

        let mut response = file.into_response(req);
        if response.status().is_success() {
            if let Ok(value) = HeaderValue::from_str(&self.cache_control(path)) {
                response.headers_mut().insert(header::CACHE_CONTROL, value);
            }
        }
        Ok(response)
    }
}
