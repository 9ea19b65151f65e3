use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::domain::CatalogKind;
use crate::error::CatalogError;

#[derive(Debug, Clone)]
pub struct Store {
    cache_root: Utf8PathBuf,
}

impl Store {
    pub fn new(cache_root: Option<&str>) -> Result<Self, CatalogError> {
        if let Some(root) = cache_root {
            return Ok(Self::new_with_root(Utf8PathBuf::from(root)));
        }

        let cache_root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(
                    dirs.home_dir().join(".cache").join("halo-catalog-manager"),
                )
                .ok()
            })
            .ok_or_else(|| {
                CatalogError::Filesystem("unable to resolve cache directory".to_string())
            })?;

        Ok(Self { cache_root })
    }

    pub fn new_with_root(cache_root: Utf8PathBuf) -> Self {
        Self { cache_root }
    }

    pub fn cache_root(&self) -> &Utf8Path {
        &self.cache_root
    }

    pub fn catalog_dir(&self, kind: CatalogKind) -> Utf8PathBuf {
        self.cache_root.join(kind.as_str())
    }

    pub fn catalog_path(&self, kind: CatalogKind, filename: &str) -> Utf8PathBuf {
        self.catalog_dir(kind).join(filename)
    }

    pub fn metadata_path(&self, kind: CatalogKind, filename: &str) -> Utf8PathBuf {
        self.cache_root
            .join("metadata")
            .join(kind.as_str())
            .join(format!("{filename}.json"))
    }

    pub fn ensure_catalog_dir(&self, kind: CatalogKind) -> Result<Utf8PathBuf, CatalogError> {
        let dir = self.catalog_dir(kind);
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| CatalogError::Filesystem(format!("create {dir}: {err}")))?;
        Ok(dir)
    }

    pub fn list_cached(&self, kind: CatalogKind) -> Result<Vec<String>, CatalogError> {
        let dir = self.catalog_dir(kind);
        if !dir.as_std_path().is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(dir.as_std_path())
            .map_err(|err| CatalogError::Filesystem(format!("read {dir}: {err}")))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| CatalogError::Filesystem(err.to_string()))?;
            let is_file = entry
                .file_type()
                .map(|file_type| file_type.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn write_metadata(path: &Utf8Path, record: &DownloadRecord) -> Result<(), CatalogError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
        }
        let tmp_path = path.with_extension("json.tmp");
        let content = serde_json::to_vec_pretty(record)
            .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
        fs::write(tmp_path.as_std_path(), &content)
            .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
        Ok(())
    }

    pub fn list_metadata(&self, kind: CatalogKind) -> Result<Vec<DownloadRecord>, CatalogError> {
        let metadata_dir = self.cache_root.join("metadata").join(kind.as_str());
        if !metadata_dir.as_std_path().is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(metadata_dir.as_std_path())
            .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
        let mut records = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|err| CatalogError::Filesystem(err.to_string()))?
                .path();
            if path.is_file() && path.extension().map(|ext| ext == "json").unwrap_or(false) {
                let content = fs::read_to_string(&path)
                    .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
                let record: DownloadRecord = serde_json::from_str(&content)
                    .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
                records.push(record);
            }
        }
        records.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(records)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub source_url: String,
    pub kind: CatalogKind,
    pub filename: String,
    pub downloaded_at: String,
    pub tool: String,
    pub resolved_path: String,
}

impl DownloadRecord {
    pub fn new(source_url: &str, kind: CatalogKind, filename: &str, path: &Utf8Path) -> Self {
        Self {
            source_url: source_url.to_string(),
            kind,
            filename: filename.to_string(),
            downloaded_at: chrono::Utc::now().to_rfc3339(),
            tool: format!("halocat/{}", env!("CARGO_PKG_VERSION")),
            resolved_path: path.to_string(),
        }
    }
}
