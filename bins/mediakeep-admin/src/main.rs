use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use mediakeep_backend::LocalFsBackend;
use mediakeep_engine::{MediaEngine, MediaId, StoreConfig};
use mediakeep_logging::{init_logging, LogConfig};

/// Mediakeep store maintenance
#[derive(Parser, Debug)]
#[command(name = "mediakeep-admin", version, about)]
struct Args {
    /// Store directory
    #[arg(short, long, default_value = "./mediakeep-data")]
    store: PathBuf,

    /// Path to a JSON store configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also write logs to daily-rotated files in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Emit machine-readable JSON instead of text
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all media records, newest first
    List,
    /// Show usage against the configured quota
    Info,
    /// Find video records that can no longer be reassembled
    Scan,
    /// Delete a broken video record and its surviving chunks
    Repair { id: MediaId },
    /// Evict oldest records down to the retention target
    Gc,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_config = match &args.log_dir {
        Some(dir) => LogConfig::with_log_dir(dir),
        None => LogConfig::default(),
    };
    let _log_guard = init_logging(&log_config);

    let config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str::<StoreConfig>(&raw)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => StoreConfig::default(),
    };

    let backend = LocalFsBackend::open(&args.store)
        .await
        .with_context(|| format!("opening store directory {}", args.store.display()))?;
    let engine = MediaEngine::open(Arc::new(backend), config).await?;

    match args.command {
        Command::List => {
            let records = engine.get_all_media().await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                for record in &records {
                    println!(
                        "{}  {:5}  {:>10} B  {}",
                        record.id, record.media_type, record.size_bytes, record.created_at
                    );
                }
                println!("{} record(s)", records.len());
            }
        }
        Command::Info => {
            let info = engine.get_storage_info().await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("items:  {}", info.usage.item_count);
                println!("photos: {}", info.counts.photos);
                println!("videos: {}", info.counts.videos);
                println!("bytes:  {}", info.usage.used_bytes);
                match info.usage.capacity_bytes {
                    Some(capacity) => println!("capacity: {} B", capacity),
                    None => println!("capacity: unlimited"),
                }
                println!("used: {:.1}%", info.usage.used_percent);
                if info.usage.is_nearly_full() {
                    println!("warning: store is nearly full");
                }
            }
        }
        Command::Scan => {
            let broken = engine.find_broken_videos().await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&broken)?);
            } else if broken.is_empty() {
                println!("no broken videos");
            } else {
                for video in &broken {
                    println!(
                        "{}  missing {}/{} chunk(s): {:?}",
                        video.id,
                        video.missing_chunk_indices.len(),
                        video.total_chunks,
                        video.missing_chunk_indices
                    );
                }
            }
        }
        Command::Repair { id } => {
            engine.delete_broken_video(id).await?;
            println!("removed {}", id);
        }
        Command::Gc => {
            let evicted = engine.cleanup_old_media().await?;
            println!("evicted {} record(s)", evicted);
        }
    }

    Ok(())
}
