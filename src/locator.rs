use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{CatalogFilename, CatalogKind, SnapshotTime};
use crate::error::CatalogError;
use crate::store::Store;

const ENCODING_RESOLUTION: f64 = 0.5e-4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotMatch {
    pub filename: String,
    pub scale_factor: f64,
    pub requested_scale_factor: f64,
    pub distance: f64,
    pub within_tolerance: bool,
}

impl SnapshotMatch {
    pub fn is_exact(&self) -> bool {
        self.distance <= ENCODING_RESOLUTION
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Lookup {
    Found(SnapshotMatch),
    NotFound,
}

impl Lookup {
    pub fn found(&self) -> Option<&SnapshotMatch> {
        match self {
            Lookup::Found(found) => Some(found),
            Lookup::NotFound => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotLocator {
    store: Store,
    tolerance: f64,
}

impl SnapshotLocator {
    pub fn new(store: Store, tolerance: f64) -> Self {
        Self { store, tolerance }
    }

    pub fn find_nearest_from_options(
        &self,
        kind: CatalogKind,
        scale_factor: Option<f64>,
        redshift: Option<f64>,
        simname: &str,
        halo_finder: Option<&str>,
    ) -> Result<Lookup, CatalogError> {
        let time = SnapshotTime::from_options(scale_factor, redshift)?;
        self.find_nearest(kind, time, simname, halo_finder)
    }

    pub fn find_nearest(
        &self,
        kind: CatalogKind,
        time: SnapshotTime,
        simname: &str,
        halo_finder: Option<&str>,
    ) -> Result<Lookup, CatalogError> {
        let scale_factor = time.scale_factor();
        if !scale_factor.is_finite() || scale_factor <= 0.0 {
            return Err(CatalogError::InvalidRequest(format!(
                "scale factor must be positive, got {scale_factor}"
            )));
        }

        // Particle catalogs are not tied to a halo-finder.
        let halo_finder = match kind {
            CatalogKind::Halos => halo_finder,
            CatalogKind::Particles => None,
        };

        let listing = self.store.list_cached(kind)?;
        let candidates = identify_relevant_catalogs(&listing, kind, Some(simname), halo_finder);

        let Some(index) = nearest_snapshot(&candidates, scale_factor) else {
            match kind {
                CatalogKind::Halos => {
                    warn!(simname, ?halo_finder, "Zero halo catalogs in cache match the input simname & halo-finder")
                }
                CatalogKind::Particles => {
                    warn!(simname, "Zero particle catalogs in cache match the input simname")
                }
            }
            return Ok(Lookup::NotFound);
        };

        let nearest = &candidates[index];
        let distance = (nearest.scale_factor - scale_factor).abs();
        let within_tolerance = distance <= self.tolerance;
        if !within_tolerance {
            warn!(
                requested = scale_factor,
                tolerance = self.tolerance,
                "Closest match to desired snapshot has a scale factor of {}",
                nearest.scale_factor
            );
        }

        Ok(Lookup::Found(SnapshotMatch {
            filename: nearest.to_string(),
            scale_factor: nearest.scale_factor,
            requested_scale_factor: scale_factor,
            distance,
            within_tolerance,
        }))
    }
}

pub fn identify_relevant_catalogs(
    listing: &[String],
    kind: CatalogKind,
    simname: Option<&str>,
    halo_finder: Option<&str>,
) -> Vec<CatalogFilename> {
    listing
        .iter()
        .filter_map(|name| match name.parse::<CatalogFilename>() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                debug!(filename = %name, "skipping file outside the catalog naming convention");
                None
            }
        })
        .filter(|parsed| parsed.kind == kind)
        .filter(|parsed| simname.is_none_or(|simname| parsed.simname == simname))
        .filter(|parsed| halo_finder.is_none_or(|finder| parsed.halo_finder() == Some(finder)))
        .collect()
}

// First candidate wins ties.
pub fn nearest_snapshot(candidates: &[CatalogFilename], scale_factor: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let distance = (candidate.scale_factor - scale_factor).abs();
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((index, distance)),
        }
    }
    best.map(|(index, _)| index)
}
