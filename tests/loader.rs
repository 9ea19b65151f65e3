use std::path::Path;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use halo_catalog_manager::config::SnapshotDefaults;
use halo_catalog_manager::domain::CatalogKind;
use halo_catalog_manager::error::CatalogError;
use halo_catalog_manager::loader::CatalogLoader;
use halo_catalog_manager::remote::ArchiveClient;
use halo_catalog_manager::store::Store;
use halo_catalog_manager::table::{Column, ColumnData, Table, TableReader};

const ARCHIVE: &str = "http://archive.test/catalogs/";

#[derive(Default)]
struct MockArchive {
    requests: Mutex<Vec<String>>,
}

impl MockArchive {
    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl ArchiveClient for MockArchive {
    fn download(&self, url: &str, destination: &Path) -> Result<(), CatalogError> {
        self.requests.lock().unwrap().push(url.to_string());
        std::fs::write(destination, b"remote")
            .map_err(|err| CatalogError::Filesystem(err.to_string()))
    }

    fn fetch_text(&self, _url: &str) -> Result<String, CatalogError> {
        Err(CatalogError::ArchiveHttp("not used".to_string()))
    }
}

/// Turns the file contents into a one-column table.
#[derive(Default)]
struct BytesReader;

impl TableReader for BytesReader {
    fn read_table(&self, path: &Path) -> Result<Table, CatalogError> {
        let bytes =
            std::fs::read(path).map_err(|err| CatalogError::Filesystem(err.to_string()))?;
        Ok(Table {
            rows: bytes.len(),
            columns: vec![Column {
                name: "byte".to_string(),
                repeat: 1,
                data: ColumnData::Int(bytes.into_iter().map(i64::from).collect()),
            }],
        })
    }
}

fn loader() -> (tempfile::TempDir, CatalogLoader<MockArchive, BytesReader>) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().join("cache")).unwrap();
    let loader = CatalogLoader::new(
        Store::new_with_root(root),
        MockArchive::default(),
        BytesReader,
        SnapshotDefaults::default(),
        ARCHIVE,
    );
    (temp, loader)
}

#[test]
fn local_file_never_hits_the_network() {
    let (_temp, loader) = loader();
    let dir = loader.store().ensure_catalog_dir(CatalogKind::Halos).unwrap();
    std::fs::write(dir.join("bolshoi_a0.5000_rockstar_halos.fits"), b"abc").unwrap();

    let table = loader
        .load(&dir, "bolshoi_a0.5000_rockstar_halos.fits", true, ARCHIVE)
        .unwrap()
        .unwrap();

    assert_eq!(table.rows, 3);
    assert!(loader.archive().requests().is_empty());
}

#[test]
fn missing_file_without_download_is_none() {
    let (_temp, loader) = loader();
    let dir = loader.store().catalog_dir(CatalogKind::Halos);

    let table = loader
        .load(&dir, "bolshoi_a1.0003_rockstar_halos.fits", false, ARCHIVE)
        .unwrap();

    assert!(table.is_none());
    assert!(loader.archive().requests().is_empty());
}

#[test]
fn missing_non_default_file_is_fatal() {
    let (_temp, loader) = loader();
    let dir = loader.store().catalog_dir(CatalogKind::Halos);

    let err = loader
        .load(&dir, "bolshoi_a0.5000_rockstar_halos.fits", true, ARCHIVE)
        .unwrap_err();

    assert_matches!(err, CatalogError::NotADefaultCatalog(_));
    assert!(loader.archive().requests().is_empty());
}

#[test]
fn missing_default_particles_are_downloaded_into_their_directory() {
    let (_temp, loader) = loader();
    let filename = loader.default_filename(CatalogKind::Particles);
    let dir = loader.store().catalog_dir(CatalogKind::Particles);

    let table = loader.load(&dir, &filename, true, ARCHIVE).unwrap().unwrap();

    assert_eq!(table.rows, b"remote".len());
    assert_eq!(
        loader.archive().requests(),
        vec![format!("http://archive.test/catalogs/{filename}")]
    );
    assert!(dir.join(&filename).as_std_path().is_file());
    let records = loader.store().list_metadata(CatalogKind::Particles).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].filename, filename);
}

#[test]
fn default_halo_catalog_is_recognized() {
    let (_temp, loader) = loader();
    let filename = loader.default_filename(CatalogKind::Halos);
    let dir = loader.store().catalog_dir(CatalogKind::Halos);

    let table = loader.load(&dir, &filename, true, ARCHIVE).unwrap();

    assert!(table.is_some());
    assert_eq!(loader.archive().requests().len(), 1);
}

#[test]
fn bulk_download_skips_cached_defaults() {
    let (_temp, loader) = loader();
    let halo_dir = loader.store().ensure_catalog_dir(CatalogKind::Halos).unwrap();
    let halo_default = loader.default_filename(CatalogKind::Halos);
    std::fs::write(halo_dir.join(&halo_default), b"cached").unwrap();

    let downloaded = loader.download_all_default_catalogs().unwrap();

    assert_eq!(downloaded.len(), 1);
    assert!(downloaded[0].ends_with(loader.default_filename(CatalogKind::Particles)));
    assert_eq!(loader.archive().requests().len(), 1);

    let again = loader.download_all_default_catalogs().unwrap();
    assert!(again.is_empty());
    assert_eq!(loader.archive().requests().len(), 1);
}
