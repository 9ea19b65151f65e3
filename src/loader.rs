use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{info, warn};

use crate::config::SnapshotDefaults;
use crate::domain::CatalogKind;
use crate::error::CatalogError;
use crate::remote::{ArchiveClient, join_url};
use crate::store::{DownloadRecord, Store};
use crate::table::{Table, TableReader};

#[derive(Clone)]
pub struct CatalogLoader<C: ArchiveClient, R: TableReader> {
    store: Store,
    archive: C,
    reader: R,
    defaults: SnapshotDefaults,
    default_url: String,
}

impl<C: ArchiveClient, R: TableReader> CatalogLoader<C, R> {
    pub fn new(
        store: Store,
        archive: C,
        reader: R,
        defaults: SnapshotDefaults,
        default_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            archive,
            reader,
            defaults,
            default_url: default_url.into(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn archive(&self) -> &C {
        &self.archive
    }

    pub fn default_url(&self) -> &str {
        &self.default_url
    }

    pub fn default_filename(&self, kind: CatalogKind) -> String {
        self.defaults.catalog(kind).to_string()
    }

    pub fn load(
        &self,
        directory: &Utf8Path,
        filename: &str,
        allow_download: bool,
        remote_base_url: &str,
    ) -> Result<Option<Table>, CatalogError> {
        let local = directory.join(filename);
        if local.as_std_path().is_file() {
            return self.reader.read_table(local.as_std_path()).map(Some);
        }
        if !allow_download {
            return Ok(None);
        }

        let kind = self
            .defaults
            .kind_of(filename)
            .ok_or_else(|| CatalogError::NotADefaultCatalog(filename.to_string()))?;
        let path = self.fetch(kind, filename, remote_base_url)?;
        self.reader.read_table(path.as_std_path()).map(Some)
    }

    pub fn download_all_default_catalogs(&self) -> Result<Vec<Utf8PathBuf>, CatalogError> {
        let mut downloaded = Vec::new();
        for kind in CatalogKind::ALL {
            let filename = self.default_filename(kind);
            if self
                .store
                .catalog_path(kind, &filename)
                .as_std_path()
                .is_file()
            {
                continue;
            }
            match kind {
                CatalogKind::Halos => warn!(%filename, "Downloading default halo catalog"),
                CatalogKind::Particles => warn!(%filename, "Downloading default particle catalog"),
            }
            downloaded.push(self.fetch(kind, &filename, &self.default_url)?);
        }
        Ok(downloaded)
    }

    fn fetch(
        &self,
        kind: CatalogKind,
        filename: &str,
        base_url: &str,
    ) -> Result<Utf8PathBuf, CatalogError> {
        let directory = self.store.ensure_catalog_dir(kind)?;
        let destination = directory.join(filename);
        let url = join_url(base_url, filename);

        let temp = tempfile::Builder::new()
            .prefix(".halocat-download")
            .tempfile_in(directory.as_std_path())
            .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
        self.archive.download(&url, temp.path())?;
        if destination.as_std_path().exists() {
            fs::remove_file(destination.as_std_path())
                .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
        }
        temp.persist(destination.as_std_path())
            .map_err(|err| CatalogError::Filesystem(err.to_string()))?;

        let record = DownloadRecord::new(&url, kind, filename, &destination);
        Store::write_metadata(&self.store.metadata_path(kind, filename), &record)?;
        info!(%url, path = %destination, "downloaded catalog");
        Ok(destination)
    }
}
