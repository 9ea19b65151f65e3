use camino::Utf8PathBuf;
use serde::Serialize;

use crate::config::{CatalogConfig, SnapshotDefaults};
use crate::domain::{CatalogKind, SimulationProperties, SnapshotTime};
use crate::error::CatalogError;
use crate::loader::CatalogLoader;
use crate::locator::{Lookup, SnapshotLocator};
use crate::remote::ArchiveClient;
use crate::table::{Table, TableReader};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotRequest {
    pub simname: String,
    pub scale_factor: f64,
    pub halo_finder: String,
    pub allow_download: bool,
}

impl SnapshotRequest {
    pub fn from_defaults(defaults: &SnapshotDefaults) -> Self {
        Self {
            simname: defaults.simname.clone(),
            scale_factor: defaults.scale_factor,
            halo_finder: defaults.halo_finder.clone(),
            allow_download: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogHandle {
    pub directory: Utf8PathBuf,
    pub filename: String,
    pub allow_download: bool,
    pub matched: bool,
}

pub struct ProcessedSnapshot<C: ArchiveClient, R: TableReader> {
    request: SnapshotRequest,
    properties: SimulationProperties,
    halos: CatalogHandle,
    particles: CatalogHandle,
    loader: CatalogLoader<C, R>,
}

impl<C: ArchiveClient, R: TableReader> ProcessedSnapshot<C, R> {
    pub fn open(
        request: SnapshotRequest,
        config: &CatalogConfig,
        loader: CatalogLoader<C, R>,
    ) -> Result<Self, CatalogError> {
        let properties = config.simulations.properties(&request.simname);
        let locator = SnapshotLocator::new(loader.store().clone(), config.scale_factor_tolerance);

        let halos = resolve_handle(CatalogKind::Halos, &request, &locator, &loader)?;
        let particles = resolve_handle(CatalogKind::Particles, &request, &locator, &loader)?;

        Ok(Self {
            request,
            properties,
            halos,
            particles,
            loader,
        })
    }

    pub fn simulation_name(&self) -> &str {
        &self.request.simname
    }

    pub fn scale_factor(&self) -> f64 {
        self.request.scale_factor
    }

    pub fn halo_finder(&self) -> &str {
        &self.request.halo_finder
    }

    pub fn properties(&self) -> SimulationProperties {
        self.properties
    }

    pub fn halo_catalog(&self) -> &CatalogHandle {
        &self.halos
    }

    pub fn particle_catalog(&self) -> &CatalogHandle {
        &self.particles
    }

    pub fn halos(&self) -> Result<Option<Table>, CatalogError> {
        self.load(&self.halos)
    }

    pub fn particles(&self) -> Result<Option<Table>, CatalogError> {
        self.load(&self.particles)
    }

    fn load(&self, handle: &CatalogHandle) -> Result<Option<Table>, CatalogError> {
        self.loader.load(
            &handle.directory,
            &handle.filename,
            handle.allow_download,
            self.loader.default_url(),
        )
    }
}

fn resolve_handle<C: ArchiveClient, R: TableReader>(
    kind: CatalogKind,
    request: &SnapshotRequest,
    locator: &SnapshotLocator,
    loader: &CatalogLoader<C, R>,
) -> Result<CatalogHandle, CatalogError> {
    let lookup = locator.find_nearest(
        kind,
        SnapshotTime::ScaleFactor(request.scale_factor),
        &request.simname,
        Some(&request.halo_finder),
    )?;

    let (filename, matched) = match lookup {
        Lookup::Found(found) if found.is_exact() => (found.filename, true),
        _ => {
            if request.allow_download {
                loader.download_all_default_catalogs()?;
            }
            (loader.default_filename(kind), false)
        }
    };

    Ok(CatalogHandle {
        directory: loader.store().catalog_dir(kind),
        filename,
        allow_download: request.allow_download,
        matched,
    })
}
