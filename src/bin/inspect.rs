//! localvcs-inspect
//!
//! Offline inspection of a storage directory.

use std::io::Write;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use localvcs_store::{Config, ContentId, Inspector, LocalVcsStorage, VerifyReport, SCHEMA_VERSION};
use tracing_subscriber::{fmt, EnvFilter};

/// Inspect a local VCS storage directory
#[derive(Parser, Debug)]
#[command(name = "localvcs-inspect")]
#[command(about = "Inspect, verify and compact a local VCS storage directory")]
#[command(version)]
struct Args {
    /// Storage directory
    #[arg(short, long)]
    dir: PathBuf,

    /// Expected schema version
    #[arg(short = 's', long = "schema-version", default_value_t = SCHEMA_VERSION)]
    version: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print counters for both artifacts
    Stats,

    /// Re-probe both artifacts and report consistency
    Verify,

    /// Print the stored snapshot
    Snapshot,

    /// Write a blob's bytes to stdout
    Cat {
        /// Content id
        id: u64,
    },

    /// Drop the bytes of purged blobs (consistent directories only)
    Compact,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,localvcs_store=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::info!("localvcs-inspect v{}", localvcs_store::VERSION);

    let code = match run(&args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            1
        }
    };
    process::exit(code);
}

fn run(args: &Args) -> localvcs_store::Result<i32> {
    let inspector = Inspector::new(&args.dir, args.version);

    match &args.command {
        Commands::Stats => {
            match inspector.header()? {
                Some(header) => {
                    println!("version:        {} (expected {})", header.version, args.version);
                    println!("index state:    {:?}", header.state);
                }
                None => println!("index:          missing"),
            }
            match inspector.probe_content() {
                Ok(report) => {
                    println!("blobs:          {}", report.blob_count);
                    println!("purged:         {}", report.purged_count);
                    println!("blob bytes:     {}", report.blob_bytes);
                    println!("next id:        {}", report.next_id);
                }
                Err(e) => println!("content:        CORRUPT ({})", e),
            }
            Ok(0)
        }
        Commands::Verify => {
            let report = inspector.verify();
            print_report(&report);
            Ok(if report.is_consistent() { 0 } else { 2 })
        }
        Commands::Snapshot => {
            let snapshot = inspector.snapshot()?;
            println!("{:#?}", snapshot);
            Ok(0)
        }
        Commands::Cat { id } => {
            let data = inspector.content_data(ContentId(*id))?;
            std::io::stdout().write_all(&data)?;
            Ok(0)
        }
        Commands::Compact => {
            // Opening an inconsistent directory would wipe it.
            let report = inspector.verify();
            if !report.is_consistent() {
                print_report(&report);
                eprintln!("refusing to compact an inconsistent directory");
                return Ok(2);
            }

            let config = Config::builder()
                .data_dir(&args.dir)
                .version(args.version)
                .build();
            let storage = LocalVcsStorage::open(config)?;
            let stats = storage.compact_contents()?;
            storage.close()?;

            println!(
                "dropped {} blobs: {} -> {} bytes",
                stats.blobs_dropped, stats.bytes_before, stats.bytes_after
            );
            Ok(0)
        }
    }
}

fn print_report(report: &VerifyReport) {
    match &report.index {
        Ok(index) => println!(
            "index:   ok (version {}, {:?}, counter {}, {} change sets, {} content refs, {} dangling)",
            index.version,
            index.state,
            index.entry_counter,
            index.change_sets,
            index.content_refs,
            index.dangling.len()
        ),
        Err(e) => println!("index:   CORRUPT ({})", e),
    }
    match &report.content {
        Ok(content) => println!(
            "content: ok ({} blobs, {} purged, next id {})",
            content.blob_count, content.purged_count, content.next_id
        ),
        Err(e) => println!("content: CORRUPT ({})", e),
    }
    println!(
        "status:  {}",
        if report.is_consistent() { "consistent" } else { "INCONSISTENT" }
    );
}
