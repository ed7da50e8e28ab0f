//! Media Indexer CLI
//!
//! Scans the configured roots into a SQLite catalog and queries the result.

use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

use media_indexer::{
    IndexerConfig, MediaAttribute, MediaLibrary, MediaRecord, MediaType, ScanSummary,
};

/// Filesystem-backed media indexer
#[derive(Parser)]
#[command(name = "media_indexer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// SQLite catalog file
    #[arg(short = 'd', long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rescan all roots and reconcile the catalog
    Scan {
        /// Root used when no roots are configured
        #[arg(short = 'r', long)]
        root: Option<PathBuf>,

        /// Print the scan summary as JSON
        #[arg(long)]
        json: bool,

        /// Write progress lines to stderr
        #[arg(long)]
        progress: bool,
    },
    /// Manage the configured scan roots
    Roots {
        #[command(subcommand)]
        action: RootsAction,
    },
    /// Rescan, then list catalog records
    List {
        /// Only records of this type
        #[arg(short = 't', long = "type", value_enum)]
        media_type: Option<TypeArg>,

        /// Audio records by artist
        #[arg(long, conflicts_with_all = ["album", "genre"])]
        artist: Option<String>,

        /// Audio records by album
        #[arg(long, conflicts_with = "genre")]
        album: Option<String>,

        /// Audio records by genre
        #[arg(long)]
        genre: Option<String>,

        /// Root used when no roots are configured
        #[arg(short = 'r', long)]
        root: Option<PathBuf>,

        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RootsAction {
    /// Show configured roots
    List,
    /// Add a root directory
    Add { dir: PathBuf },
    /// Remove a root directory
    Remove { dir: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum TypeArg {
    Video,
    Audio,
    Other,
}

impl From<TypeArg> for MediaType {
    fn from(arg: TypeArg) -> Self {
        match arg {
            TypeArg::Video => MediaType::Video,
            TypeArg::Audio => MediaType::Audio,
            TypeArg::Other => MediaType::Other,
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn build_config(db: Option<PathBuf>, root: Option<PathBuf>, progress: bool) -> IndexerConfig {
    let mut builder = IndexerConfig::builder().progress_output(progress);
    if let Some(db) = db {
        builder = builder.db_path(db);
    }
    if let Some(root) = root {
        builder = builder.default_root(root);
    }
    builder.build()
}

fn scan_now(library: &MediaLibrary) -> Option<ScanSummary> {
    if !library.request_scan() {
        info!("A scan is already running");
    }
    library.wait_for_scan()
}

fn run(cli: Cli) -> media_indexer::Result<()> {
    match cli.command {
        Commands::Scan {
            root,
            json,
            progress,
        } => {
            let library = MediaLibrary::open(build_config(cli.db, root, progress))?;
            let Some(summary) = scan_now(&library) else {
                return Ok(());
            };

            if json {
                print_json(&summary);
            } else {
                println!("Scan completed:");
                println!("  Roots: {:?}", summary.roots);
                println!("  Files: {}", summary.loaded_files);
                println!("  New files: {}", summary.new_files);
                println!("  Reused files: {}", summary.reused_files);
                println!("  Removed files: {}", summary.removed_files);
                println!("  Failed deletes: {}", summary.failed_deletes);
                println!("  Errors: {}", summary.error_count());
                println!("  Duration: {}ms", summary.duration_ms);
            }
            for err in &summary.errors {
                info!("{}", err);
            }
        }
        Commands::Roots { action } => {
            let library = MediaLibrary::open(build_config(cli.db, None, false))?;
            match action {
                RootsAction::List => {
                    for root in library.roots()? {
                        println!("{}", root.display());
                    }
                }
                RootsAction::Add { dir } => library.add_root(&absolute(dir))?,
                RootsAction::Remove { dir } => library.remove_root(&absolute(dir))?,
            }
        }
        Commands::List {
            media_type,
            artist,
            album,
            genre,
            root,
            json,
        } => {
            let library = MediaLibrary::open(build_config(cli.db, root, false))?;
            scan_now(&library);

            let attribute = artist
                .map(|v| (MediaAttribute::Artist, v))
                .or_else(|| album.map(|v| (MediaAttribute::Album, v)))
                .or_else(|| genre.map(|v| (MediaAttribute::Genre, v)));

            let records: Vec<MediaRecord> = library.snapshot().select(
                media_type.map(MediaType::from),
                attribute.as_ref().map(|(a, v)| (*a, v.as_str())),
            );

            if json {
                print_json(&records);
            } else {
                for record in &records {
                    println!("{}\t{}", record.media_type, record.path.display());
                }
            }
        }
    }
    Ok(())
}

fn absolute(dir: PathBuf) -> PathBuf {
    std::path::absolute(&dir).unwrap_or(dir)
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to serialize output: {}", e),
    }
}
