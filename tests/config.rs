use std::fs;

use assert_matches::assert_matches;

use halo_catalog_manager::config::{
    ArchiveEntry, BEHROOZI_ARCHIVE_URL, Config, ConfigLoader, DEFAULT_ARCHIVE_URL, DefaultsEntry,
    SimulationEntry,
};
use halo_catalog_manager::domain::CatalogKind;
use halo_catalog_manager::error::CatalogError;

#[test]
fn empty_config_resolves_to_defaults() {
    let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
    assert_eq!(resolved.schema_version, 1);
    assert_eq!(resolved.defaults.simname, "bolshoi");
    assert_eq!(resolved.defaults.scale_factor, 1.0003);
    assert_eq!(resolved.defaults.halo_finder, "rockstar");
    assert_eq!(resolved.defaults.numptcl, 200_000);
    assert_eq!(resolved.scale_factor_tolerance, 0.05);
    assert_eq!(resolved.request_timeout_secs, 300);
    assert_eq!(resolved.archives.default_url, DEFAULT_ARCHIVE_URL);
    assert_eq!(resolved.archives.behroozi_url, BEHROOZI_ARCHIVE_URL);
    assert_eq!(resolved.archives.halo_archives.len(), 4);
    assert!(resolved.cache_root.is_none());
}

#[test]
fn overrides_merge_into_defaults() {
    let config = Config {
        defaults: Some(DefaultsEntry {
            simname: Some("multidark".to_string()),
            numptcl: Some(2_000_000),
            ..DefaultsEntry::default()
        }),
        archives: Some(ArchiveEntry {
            halo_archives: [("mirror".to_string(), "http://mirror.test/".to_string())]
                .into_iter()
                .collect(),
            ..ArchiveEntry::default()
        }),
        simulations: vec![SimulationEntry {
            name: "multidark".to_string(),
            box_size: Some(1000.0),
            particle_mass: Some(8.721e9),
            softening: None,
        }],
        ..Config::default()
    };

    let resolved = ConfigLoader::resolve_config(config).unwrap();
    assert_eq!(resolved.defaults.halo_finder, "rockstar");
    assert_eq!(
        resolved.defaults.catalog(CatalogKind::Particles).to_string(),
        "multidark_a1.0003_2e6_particles.fits"
    );
    assert_eq!(resolved.archives.halo_archives.len(), 5);
    assert!(resolved.archives.halo_archives.contains_key("consuelo_halos"));
    assert_eq!(
        resolved.simulations.properties("multidark").box_size,
        Some(1000.0)
    );
    assert!(resolved.simulations.names().any(|name| name == "bolshoi"));
}

#[test]
fn invalid_values_are_rejected() {
    let negative_tolerance = Config {
        scale_factor_tolerance: Some(-0.1),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(negative_tolerance),
        Err(CatalogError::ConfigParse(_))
    );

    let zero_scale = Config {
        defaults: Some(DefaultsEntry {
            scale_factor: Some(0.0),
            ..DefaultsEntry::default()
        }),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(zero_scale),
        Err(CatalogError::ConfigParse(_))
    );
    let nan_tolerance = Config {
        scale_factor_tolerance: Some(f64::NAN),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(nan_tolerance),
        Err(CatalogError::ConfigParse(_))
    );

    let nan_scale = Config {
        defaults: Some(DefaultsEntry {
            scale_factor: Some(f64::NAN),
            ..DefaultsEntry::default()
        }),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(nan_scale),
        Err(CatalogError::ConfigParse(_))
    );
}

#[test]
fn resolve_reads_json_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("halocat.json");
    fs::write(
        &path,
        r#"{
  "cache_root": "/data/halocat",
  "scale_factor_tolerance": 0.01,
  "defaults": { "halo_finder": "bdm" }
}"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.cache_root.as_deref(), Some("/data/halocat"));
    assert_eq!(resolved.scale_factor_tolerance, 0.01);
    assert_eq!(
        resolved.defaults.halo_catalog().to_string(),
        "bolshoi_a1.0003_bdm_halos.fits"
    );
}

#[test]
fn explicit_missing_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("missing.json");
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, CatalogError::ConfigRead(_));
}

#[test]
fn malformed_json_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("halocat.json");
    fs::write(&path, "{ \"defaults\": [").unwrap();
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, CatalogError::ConfigParse(_));
}
