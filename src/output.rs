use std::io::{self, Write};

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::domain::{CatalogFilename, CatalogKind, SimulationProperties};
use crate::locator::Lookup;
use crate::snapshot::CatalogHandle;
use crate::store::DownloadRecord;
use crate::table::TableSummary;

#[derive(Debug, Clone, Serialize)]
pub struct LocateResult {
    pub kind: CatalogKind,
    pub simname: String,
    pub halo_finder: Option<String>,
    pub lookup: Lookup,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadResult {
    pub kind: CatalogKind,
    pub filename: String,
    pub table: Option<TableSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotResult {
    pub simname: String,
    pub scale_factor: f64,
    pub halo_finder: String,
    pub properties: SimulationProperties,
    pub halos: CatalogHandle,
    pub particles: CatalogHandle,
    pub halo_table: Option<TableSummary>,
    pub particle_table: Option<TableSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchDefaultsResult {
    pub downloaded: Vec<Utf8PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub catalogs: Vec<ListEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListEntry {
    pub kind: CatalogKind,
    pub filename: String,
    pub parsed: Option<CatalogFilename>,
    pub download: Option<DownloadRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoteListResult {
    pub url: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertiesResult {
    pub simname: String,
    pub properties: SimulationProperties,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
