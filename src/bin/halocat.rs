use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use halo_catalog_manager::config::{CatalogConfig, ConfigLoader};
use halo_catalog_manager::domain::{CatalogFilename, CatalogKind};
use halo_catalog_manager::error::CatalogError;
use halo_catalog_manager::loader::CatalogLoader;
use halo_catalog_manager::locator::SnapshotLocator;
use halo_catalog_manager::output::{
    FetchDefaultsResult, JsonOutput, ListEntry, ListResult, LoadResult, LocateResult,
    PropertiesResult, RemoteListResult, SnapshotResult,
};
use halo_catalog_manager::remote::{ArchiveHttpClient, ListingKind, list_remote_catalogs};
use halo_catalog_manager::snapshot::{ProcessedSnapshot, SnapshotRequest};
use halo_catalog_manager::store::Store;
use halo_catalog_manager::table::FitsTableReader;

#[derive(Parser)]
#[command(name = "halocat")]
#[command(about = "Locate, cache and load N-body halo and particle catalogs")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Find the cached catalog closest to a scale factor or redshift")]
    Locate(LocateArgs),
    #[command(about = "Load a catalog, downloading a default catalog if allowed")]
    Load(LoadArgs),
    #[command(about = "Resolve the halo and particle catalogs of a snapshot")]
    Snapshot(SnapshotArgs),
    #[command(about = "Download the default catalogs that are not cached yet")]
    FetchDefaults,
    #[command(about = "List cached catalogs")]
    List(ListArgs),
    #[command(about = "List the catalogs offered by a remote archive")]
    RemoteList(RemoteListArgs),
    #[command(about = "Show the properties of a simulation")]
    Properties(PropertiesArgs),
}

#[derive(Args)]
struct LocateArgs {
    kind: CatalogKind,

    #[arg(long)]
    scale_factor: Option<f64>,

    #[arg(long)]
    redshift: Option<f64>,

    #[arg(long)]
    simname: Option<String>,

    #[arg(long)]
    halo_finder: Option<String>,
}

#[derive(Args)]
struct LoadArgs {
    kind: CatalogKind,

    filename: String,

    #[arg(long)]
    download: bool,
}

#[derive(Args)]
struct SnapshotArgs {
    #[arg(long)]
    simname: Option<String>,

    #[arg(long)]
    scale_factor: Option<f64>,

    #[arg(long)]
    halo_finder: Option<String>,

    #[arg(long)]
    no_download: bool,

    #[arg(long)]
    load: bool,
}

#[derive(Args)]
struct ListArgs {
    kind: Option<CatalogKind>,
}

#[derive(Args)]
struct RemoteListArgs {
    kind: ListingKind,

    #[arg(long, conflicts_with = "archive")]
    url: Option<String>,

    #[arg(long)]
    archive: Option<String>,
}

#[derive(Args)]
struct PropertiesArgs {
    simname: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<CatalogError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CatalogError) -> u8 {
    match error {
        CatalogError::InvalidRequest(_)
        | CatalogError::UnknownCatalogKind(_)
        | CatalogError::NotADefaultCatalog(_) => 2,
        CatalogError::ArchiveHttp(_) | CatalogError::ArchiveStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let store = Store::new(config.cache_root.as_deref())?;

    match cli.command {
        Commands::Locate(args) => run_locate(args, &config, store),
        Commands::Load(args) => run_load(args, &config, store),
        Commands::Snapshot(args) => run_snapshot(args, &config, store),
        Commands::FetchDefaults => {
            let loader = build_loader(&config, store)?;
            let downloaded = loader.download_all_default_catalogs()?;
            JsonOutput::print(&FetchDefaultsResult { downloaded }).into_diagnostic()
        }
        Commands::List(args) => run_list(args, store),
        Commands::RemoteList(args) => run_remote_list(args, &config),
        Commands::Properties(args) => {
            let properties = config.simulations.properties(&args.simname);
            JsonOutput::print(&PropertiesResult {
                simname: args.simname,
                properties,
            })
            .into_diagnostic()
        }
    }
}

fn build_loader(
    config: &CatalogConfig,
    store: Store,
) -> Result<CatalogLoader<ArchiveHttpClient, FitsTableReader>, CatalogError> {
    let archive = ArchiveHttpClient::new(Duration::from_secs(config.request_timeout_secs))?;
    Ok(CatalogLoader::new(
        store,
        archive,
        FitsTableReader,
        config.defaults.clone(),
        config.archives.default_url.clone(),
    ))
}

fn run_locate(args: LocateArgs, config: &CatalogConfig, store: Store) -> miette::Result<()> {
    let simname = args
        .simname
        .unwrap_or_else(|| config.defaults.simname.clone());
    let halo_finder = match args.kind {
        CatalogKind::Halos => Some(
            args.halo_finder
                .unwrap_or_else(|| config.defaults.halo_finder.clone()),
        ),
        CatalogKind::Particles => None,
    };
    let locator = SnapshotLocator::new(store, config.scale_factor_tolerance);
    let lookup = locator.find_nearest_from_options(
        args.kind,
        args.scale_factor,
        args.redshift,
        &simname,
        halo_finder.as_deref(),
    )?;
    JsonOutput::print(&LocateResult {
        kind: args.kind,
        simname,
        halo_finder,
        lookup,
    })
    .into_diagnostic()
}

fn run_load(args: LoadArgs, config: &CatalogConfig, store: Store) -> miette::Result<()> {
    let directory = store.catalog_dir(args.kind);
    let loader = build_loader(config, store)?;
    let table = loader.load(
        &directory,
        &args.filename,
        args.download,
        &config.archives.default_url,
    )?;
    JsonOutput::print(&LoadResult {
        kind: args.kind,
        filename: args.filename,
        table: table.map(|table| table.summary()),
    })
    .into_diagnostic()
}

fn run_snapshot(args: SnapshotArgs, config: &CatalogConfig, store: Store) -> miette::Result<()> {
    let mut request = SnapshotRequest::from_defaults(&config.defaults);
    if let Some(simname) = args.simname {
        request.simname = simname;
    }
    if let Some(scale_factor) = args.scale_factor {
        request.scale_factor = scale_factor;
    }
    if let Some(halo_finder) = args.halo_finder {
        request.halo_finder = halo_finder;
    }
    request.allow_download = !args.no_download;

    let loader = build_loader(config, store)?;
    let snapshot = ProcessedSnapshot::open(request, config, loader)?;
    let (halo_table, particle_table) = if args.load {
        (
            snapshot.halos()?.map(|table| table.summary()),
            snapshot.particles()?.map(|table| table.summary()),
        )
    } else {
        (None, None)
    };

    JsonOutput::print(&SnapshotResult {
        simname: snapshot.simulation_name().to_string(),
        scale_factor: snapshot.scale_factor(),
        halo_finder: snapshot.halo_finder().to_string(),
        properties: snapshot.properties(),
        halos: snapshot.halo_catalog().clone(),
        particles: snapshot.particle_catalog().clone(),
        halo_table,
        particle_table,
    })
    .into_diagnostic()
}

fn run_list(args: ListArgs, store: Store) -> miette::Result<()> {
    let kinds = match args.kind {
        Some(kind) => vec![kind],
        None => CatalogKind::ALL.to_vec(),
    };
    let mut catalogs = Vec::new();
    for kind in kinds {
        let records = store.list_metadata(kind)?;
        for filename in store.list_cached(kind)? {
            let parsed = filename.parse::<CatalogFilename>().ok();
            let download = records
                .iter()
                .find(|record| record.filename == filename)
                .cloned();
            catalogs.push(ListEntry {
                kind,
                filename,
                parsed,
                download,
            });
        }
    }
    JsonOutput::print(&ListResult { catalogs }).into_diagnostic()
}

fn run_remote_list(args: RemoteListArgs, config: &CatalogConfig) -> miette::Result<()> {
    let url = match (args.url, args.archive) {
        (Some(url), _) => url,
        (None, Some(name)) => config
            .archives
            .halo_archives
            .get(&name)
            .cloned()
            .ok_or_else(|| CatalogError::InvalidRequest(format!("unknown archive: {name}")))?,
        (None, None) => config.archives.default_url.clone(),
    };
    let client = ArchiveHttpClient::new(Duration::from_secs(config.request_timeout_secs))?;
    let files = list_remote_catalogs(&client, &url, args.kind, &config.archives)?;
    JsonOutput::print(&RemoteListResult { url, files }).into_diagnostic()
}
