use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::{CatalogFilename, CatalogKind, SimulationProperties};
use crate::error::CatalogError;

pub const DEFAULT_CONFIG_FILE: &str = "halocat.json";
pub const DEFAULT_ARCHIVE_URL: &str = "http://www.astro.yale.edu/aphearin/Data_files/";
pub const BEHROOZI_ARCHIVE_URL: &str = "http://www.slac.stanford.edu/~behroozi/Bolshoi_Catalogs/";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub cache_root: Option<String>,
    #[serde(default)]
    pub defaults: Option<DefaultsEntry>,
    #[serde(default)]
    pub scale_factor_tolerance: Option<f64>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub archives: Option<ArchiveEntry>,
    #[serde(default)]
    pub simulations: Vec<SimulationEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DefaultsEntry {
    #[serde(default)]
    pub simname: Option<String>,
    #[serde(default)]
    pub scale_factor: Option<f64>,
    #[serde(default)]
    pub halo_finder: Option<String>,
    #[serde(default)]
    pub numptcl: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ArchiveEntry {
    #[serde(default)]
    pub default_url: Option<String>,
    #[serde(default)]
    pub behroozi_url: Option<String>,
    #[serde(default)]
    pub halo_archives: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationEntry {
    pub name: String,
    #[serde(default)]
    pub box_size: Option<f64>,
    #[serde(default)]
    pub particle_mass: Option<f64>,
    #[serde(default)]
    pub softening: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotDefaults {
    pub simname: String,
    pub scale_factor: f64,
    pub halo_finder: String,
    pub numptcl: u64,
}

impl SnapshotDefaults {
    pub fn halo_catalog(&self) -> CatalogFilename {
        CatalogFilename::halos(&self.simname, self.scale_factor, &self.halo_finder)
    }

    pub fn particle_catalog(&self) -> CatalogFilename {
        CatalogFilename::particles(&self.simname, self.scale_factor, self.numptcl)
    }

    pub fn catalog(&self, kind: CatalogKind) -> CatalogFilename {
        match kind {
            CatalogKind::Halos => self.halo_catalog(),
            CatalogKind::Particles => self.particle_catalog(),
        }
    }

    pub fn kind_of(&self, filename: &str) -> Option<CatalogKind> {
        CatalogKind::ALL
            .into_iter()
            .find(|kind| self.catalog(*kind).to_string() == filename)
    }
}

impl Default for SnapshotDefaults {
    fn default() -> Self {
        Self {
            simname: "bolshoi".to_string(),
            scale_factor: 1.0003,
            halo_finder: "rockstar".to_string(),
            numptcl: 200_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveSettings {
    pub default_url: String,
    pub behroozi_url: String,
    pub halo_archives: BTreeMap<String, String>,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            default_url: DEFAULT_ARCHIVE_URL.to_string(),
            behroozi_url: BEHROOZI_ARCHIVE_URL.to_string(),
            halo_archives: default_halo_archives(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationTable {
    entries: BTreeMap<String, SimulationProperties>,
}

impl SimulationTable {
    pub fn properties(&self, simname: &str) -> SimulationProperties {
        self.entries.get(simname).copied().unwrap_or_default()
    }

    pub fn insert(&mut self, simname: &str, properties: SimulationProperties) {
        self.entries.insert(simname.to_string(), properties);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl Default for SimulationTable {
    fn default() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            "bolshoi".to_string(),
            SimulationProperties {
                box_size: Some(250.0),
                particle_mass: Some(1.35e8),
                softening: Some(1.0),
            },
        );
        Self { entries }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogConfig {
    pub schema_version: u32,
    pub cache_root: Option<String>,
    pub defaults: SnapshotDefaults,
    pub scale_factor_tolerance: f64,
    pub request_timeout_secs: u64,
    pub archives: ArchiveSettings,
    pub simulations: SimulationTable,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            cache_root: None,
            defaults: SnapshotDefaults::default(),
            scale_factor_tolerance: 0.05,
            request_timeout_secs: 300,
            archives: ArchiveSettings::default(),
            simulations: SimulationTable::default(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<CatalogConfig, CatalogError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(CatalogConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| CatalogError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| CatalogError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<CatalogConfig, CatalogError> {
        let base = CatalogConfig::default();

        let mut defaults = base.defaults;
        if let Some(entry) = config.defaults {
            if let Some(simname) = entry.simname {
                defaults.simname = simname;
            }
            if let Some(scale_factor) = entry.scale_factor {
                defaults.scale_factor = scale_factor;
            }
            if let Some(halo_finder) = entry.halo_finder {
                defaults.halo_finder = halo_finder;
            }
            if let Some(numptcl) = entry.numptcl {
                defaults.numptcl = numptcl;
            }
        }
        if defaults.scale_factor.is_nan() || defaults.scale_factor <= 0.0 {
            return Err(CatalogError::ConfigParse(format!(
                "default scale factor must be positive, got {}",
                defaults.scale_factor
            )));
        }

        let scale_factor_tolerance = config
            .scale_factor_tolerance
            .unwrap_or(base.scale_factor_tolerance);
        if scale_factor_tolerance.is_nan() || scale_factor_tolerance < 0.0 {
            return Err(CatalogError::ConfigParse(format!(
                "scale factor tolerance must be non-negative, got {scale_factor_tolerance}"
            )));
        }

        let mut archives = base.archives;
        if let Some(entry) = config.archives {
            if let Some(url) = entry.default_url {
                archives.default_url = url;
            }
            if let Some(url) = entry.behroozi_url {
                archives.behroozi_url = url;
            }
            archives.halo_archives.extend(entry.halo_archives);
        }

        let mut simulations = base.simulations;
        for entry in config.simulations {
            simulations.insert(
                &entry.name,
                SimulationProperties {
                    box_size: entry.box_size,
                    particle_mass: entry.particle_mass,
                    softening: entry.softening,
                },
            );
        }

        Ok(CatalogConfig {
            schema_version: config.schema_version.unwrap_or(1),
            cache_root: config.cache_root,
            defaults,
            scale_factor_tolerance,
            request_timeout_secs: config
                .request_timeout_secs
                .unwrap_or(base.request_timeout_secs),
            archives,
            simulations,
        })
    }
}

pub fn default_halo_archives() -> BTreeMap<String, String> {
    [
        ("bolshoi_halos", BEHROOZI_ARCHIVE_URL),
        (
            "bolshoi_bdm_halos",
            "http://www.slac.stanford.edu/~behroozi/Bolshoi_Catalogs_BDM/",
        ),
        (
            "multidark_halos",
            "http://slac.stanford.edu/~behroozi/MultiDark_Hlists_Rockstar/",
        ),
        (
            "consuelo_halos",
            "http://www.slac.stanford.edu/~behroozi/Consuelo_Catalogs/",
        ),
    ]
    .into_iter()
    .map(|(name, url)| (name.to_string(), url.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_names() {
        let defaults = SnapshotDefaults::default();
        assert_eq!(
            defaults.halo_catalog().to_string(),
            "bolshoi_a1.0003_rockstar_halos.fits"
        );
        assert_eq!(
            defaults.particle_catalog().to_string(),
            "bolshoi_a1.0003_2e5_particles.fits"
        );
        assert_eq!(
            defaults.kind_of("bolshoi_a1.0003_2e5_particles.fits"),
            Some(CatalogKind::Particles)
        );
        assert_eq!(defaults.kind_of("bolshoi_a0.5000_rockstar_halos.fits"), None);
    }

    #[test]
    fn unknown_simulation_has_no_properties() {
        let table = SimulationTable::default();
        assert_eq!(table.properties("bolshoi").box_size, Some(250.0));
        assert_eq!(table.properties("millennium"), SimulationProperties::default());
    }
}
