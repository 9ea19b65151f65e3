use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

static CATALOG_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<simname>.+)_a(?P<scale>(?:0|[1-9]\d*)\.\d{4})_(?P<tag>.+)_(?P<kind>halos|particles)\.fits$",
    )
    .expect("catalog filename pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    #[value(alias = "halo")]
    Halos,
    #[value(alias = "particle")]
    Particles,
}

impl CatalogKind {
    pub const ALL: [CatalogKind; 2] = [CatalogKind::Halos, CatalogKind::Particles];

    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::Halos => "halos",
            CatalogKind::Particles => "particles",
        }
    }

    pub fn file_suffix(&self) -> String {
        format!("{}.fits", self.as_str())
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CatalogKind {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "halo" | "halos" => Ok(CatalogKind::Halos),
            "particle" | "particles" => Ok(CatalogKind::Particles),
            _ => Err(CatalogError::UnknownCatalogKind(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotTime {
    ScaleFactor(f64),
    Redshift(f64),
}

impl SnapshotTime {
    pub fn from_options(
        scale_factor: Option<f64>,
        redshift: Option<f64>,
    ) -> Result<Self, CatalogError> {
        match (scale_factor, redshift) {
            (Some(a), None) => Ok(SnapshotTime::ScaleFactor(a)),
            (None, Some(z)) => Ok(SnapshotTime::Redshift(z)),
            (Some(_), Some(_)) => Err(CatalogError::InvalidRequest(
                "cannot specify both a redshift and a scale factor".to_string(),
            )),
            (None, None) => Err(CatalogError::InvalidRequest(
                "must specify either a redshift or a scale factor".to_string(),
            )),
        }
    }

    pub fn scale_factor(&self) -> f64 {
        match *self {
            SnapshotTime::ScaleFactor(a) => a,
            SnapshotTime::Redshift(z) => 1.0 / (1.0 + z),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogFilename {
    pub simname: String,
    pub scale_factor: f64,
    pub scale_factor_text: String,
    pub tag: String,
    pub kind: CatalogKind,
}

impl CatalogFilename {
    pub fn new(kind: CatalogKind, simname: &str, scale_factor: f64, tag: &str) -> Self {
        let scale_factor_text = format!("{scale_factor:.4}");
        Self {
            simname: simname.to_string(),
            scale_factor: scale_factor_text.parse().unwrap_or(scale_factor),
            scale_factor_text,
            tag: tag.to_string(),
            kind,
        }
    }

    pub fn halos(simname: &str, scale_factor: f64, halo_finder: &str) -> Self {
        Self::new(CatalogKind::Halos, simname, scale_factor, halo_finder)
    }

    pub fn particles(simname: &str, scale_factor: f64, numptcl: u64) -> Self {
        Self::new(
            CatalogKind::Particles,
            simname,
            scale_factor,
            &numptcl_to_string(numptcl),
        )
    }

    pub fn halo_finder(&self) -> Option<&str> {
        match self.kind {
            CatalogKind::Halos => Some(&self.tag),
            CatalogKind::Particles => None,
        }
    }
}

impl fmt::Display for CatalogFilename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_a{}_{}_{}",
            self.simname,
            self.scale_factor_text,
            self.tag,
            self.kind.file_suffix()
        )
    }
}

impl FromStr for CatalogFilename {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let captures = CATALOG_FILENAME
            .captures(value)
            .ok_or_else(|| CatalogError::MalformedFilename(value.to_string()))?;
        let scale_factor_text = captures["scale"].to_string();
        let scale_factor = scale_factor_text
            .parse::<f64>()
            .map_err(|_| CatalogError::MalformedFilename(value.to_string()))?;
        Ok(Self {
            simname: captures["simname"].to_string(),
            scale_factor,
            scale_factor_text,
            tag: captures["tag"].to_string(),
            kind: captures["kind"].parse()?,
        })
    }
}

pub fn numptcl_to_string(numptcl: u64) -> String {
    let numptcl = numptcl as f64;
    let mut power = 0i32;
    while (numptcl / 10f64.powi(power)).round_ties_even() >= 10.0 {
        power += 1;
    }
    let mantissa = (numptcl / 10f64.powi(power)).round_ties_even() as u64;
    format!("{mantissa}e{power}")
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulationProperties {
    // Mpc/h
    pub box_size: Option<f64>,
    // Msun/h
    pub particle_mass: Option<f64>,
    // kpc/h
    pub softening: Option<f64>,
}
