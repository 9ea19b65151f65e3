use std::path::Path;
use std::sync::{Arc, Mutex};

use camino::Utf8PathBuf;

use halo_catalog_manager::config::CatalogConfig;
use halo_catalog_manager::domain::CatalogKind;
use halo_catalog_manager::error::CatalogError;
use halo_catalog_manager::loader::CatalogLoader;
use halo_catalog_manager::remote::ArchiveClient;
use halo_catalog_manager::snapshot::{ProcessedSnapshot, SnapshotRequest};
use halo_catalog_manager::store::Store;
use halo_catalog_manager::table::{Table, TableReader};

#[derive(Clone, Default)]
struct MockArchive {
    requests: Arc<Mutex<Vec<String>>>,
}

impl ArchiveClient for MockArchive {
    fn download(&self, url: &str, destination: &Path) -> Result<(), CatalogError> {
        self.requests.lock().unwrap().push(url.to_string());
        std::fs::write(destination, b"fits").map_err(|err| CatalogError::Filesystem(err.to_string()))
    }

    fn fetch_text(&self, url: &str) -> Result<String, CatalogError> {
        Err(CatalogError::ArchiveHttp(format!("unexpected listing of {url}")))
    }
}

struct EmptyReader;

impl TableReader for EmptyReader {
    fn read_table(&self, _path: &Path) -> Result<Table, CatalogError> {
        Ok(Table {
            columns: Vec::new(),
            rows: 0,
        })
    }
}

struct Fixture {
    _temp: tempfile::TempDir,
    store: Store,
    archive: MockArchive,
    config: CatalogConfig,
}

impl Fixture {
    fn new() -> Self {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        Self {
            _temp: temp,
            store: Store::new_with_root(root),
            archive: MockArchive::default(),
            config: CatalogConfig::default(),
        }
    }

    fn cache(&self, kind: CatalogKind, filename: &str) {
        let dir = self.store.ensure_catalog_dir(kind).unwrap();
        std::fs::write(dir.join(filename), b"cached").unwrap();
    }

    fn open(
        &self,
        request: SnapshotRequest,
    ) -> Result<ProcessedSnapshot<MockArchive, EmptyReader>, CatalogError> {
        let loader = CatalogLoader::new(
            self.store.clone(),
            self.archive.clone(),
            EmptyReader,
            self.config.defaults.clone(),
            "http://archive.test/",
        );
        ProcessedSnapshot::open(request, &self.config, loader)
    }

    fn requests(&self) -> Vec<String> {
        self.archive.requests.lock().unwrap().clone()
    }
}

#[test]
fn cached_exact_match_is_used_without_downloads() {
    let fixture = Fixture::new();
    fixture.cache(CatalogKind::Halos, "bolshoi_a0.5000_rockstar_halos.fits");
    fixture.cache(CatalogKind::Particles, "bolshoi_a0.5000_2e5_particles.fits");

    let mut request = SnapshotRequest::from_defaults(&fixture.config.defaults);
    request.scale_factor = 0.5;
    let snapshot = fixture.open(request).unwrap();

    assert_eq!(
        snapshot.halo_catalog().filename,
        "bolshoi_a0.5000_rockstar_halos.fits"
    );
    assert!(snapshot.halo_catalog().matched);
    assert_eq!(
        snapshot.particle_catalog().filename,
        "bolshoi_a0.5000_2e5_particles.fits"
    );
    assert!(snapshot.particles().unwrap().is_some());
    assert!(fixture.requests().is_empty());
}

#[test]
fn missing_snapshot_falls_back_to_downloaded_defaults() {
    let fixture = Fixture::new();

    let request = SnapshotRequest::from_defaults(&fixture.config.defaults);
    let snapshot = fixture.open(request).unwrap();

    assert_eq!(
        snapshot.halo_catalog().filename,
        "bolshoi_a1.0003_rockstar_halos.fits"
    );
    assert!(!snapshot.halo_catalog().matched);
    assert_eq!(
        snapshot.particle_catalog().filename,
        "bolshoi_a1.0003_2e5_particles.fits"
    );
    assert_eq!(
        fixture.requests(),
        vec![
            "http://archive.test/bolshoi_a1.0003_rockstar_halos.fits".to_string(),
            "http://archive.test/bolshoi_a1.0003_2e5_particles.fits".to_string(),
        ]
    );
    assert!(snapshot.halos().unwrap().is_some());
    assert_eq!(fixture.requests().len(), 2);
}

#[test]
fn nearby_but_inexact_match_is_not_used() {
    let fixture = Fixture::new();
    fixture.cache(CatalogKind::Halos, "bolshoi_a0.5100_rockstar_halos.fits");

    let mut request = SnapshotRequest::from_defaults(&fixture.config.defaults);
    request.scale_factor = 0.5;
    request.allow_download = false;
    let snapshot = fixture.open(request).unwrap();

    assert_eq!(
        snapshot.halo_catalog().filename,
        "bolshoi_a1.0003_rockstar_halos.fits"
    );
    assert!(!snapshot.halo_catalog().matched);
}

#[test]
fn offline_snapshot_without_cache_loads_nothing() {
    let fixture = Fixture::new();

    let mut request = SnapshotRequest::from_defaults(&fixture.config.defaults);
    request.allow_download = false;
    let snapshot = fixture.open(request).unwrap();

    assert!(snapshot.halos().unwrap().is_none());
    assert!(snapshot.particles().unwrap().is_none());
    assert!(fixture.requests().is_empty());
}

#[test]
fn simulation_properties_come_from_the_table() {
    let fixture = Fixture::new();
    fixture.cache(CatalogKind::Halos, "bolshoi_a1.0003_rockstar_halos.fits");
    fixture.cache(CatalogKind::Particles, "bolshoi_a1.0003_2e5_particles.fits");

    let bolshoi = fixture
        .open(SnapshotRequest::from_defaults(&fixture.config.defaults))
        .unwrap();
    assert_eq!(bolshoi.properties().box_size, Some(250.0));
    assert_eq!(bolshoi.properties().particle_mass, Some(1.35e8));
    assert_eq!(bolshoi.simulation_name(), "bolshoi");
    assert_eq!(bolshoi.halo_finder(), "rockstar");

    let mut request = SnapshotRequest::from_defaults(&fixture.config.defaults);
    request.simname = "consuelo".to_string();
    request.allow_download = false;
    let consuelo = fixture.open(request).unwrap();
    assert_eq!(consuelo.properties().box_size, None);
    assert!(fixture.requests().is_empty());
}

#[test]
fn non_positive_scale_factor_is_rejected() {
    let fixture = Fixture::new();

    let mut request = SnapshotRequest::from_defaults(&fixture.config.defaults);
    request.scale_factor = 0.0;
    let err = fixture.open(request).err().unwrap();

    assert!(matches!(err, CatalogError::InvalidRequest(_)));
}
