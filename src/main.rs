use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use toolmount::catalog::ToolStore;
use toolmount::storage::{BlobStorage, LocalStorage, StorageBackend};
use toolmount::web::{self, AppState};

const DEFAULT_PORT: u16 = 4010;
const DEFAULT_DB_PATH: &str = "toolmount.db";
const DEFAULT_STORAGE_DIR: &str = "storage/react-apps";
const DEFAULT_MAX_UPLOAD_MIB: usize = 50;

#[derive(Parser)]
#[command(name = "toolmount", version, about = "Mini tool catalog and app server daemon")]
struct Cli {
    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,
    /// Path to the catalog database
    #[arg(long)]
    db: Option<PathBuf>,
    /// Directory for locally stored archives
    #[arg(long)]
    storage_dir: Option<PathBuf>,
    /// Maximum accepted upload size in MiB
    #[arg(long)]
    max_upload_mib: Option<usize>,
    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_log(verbose: u8) -> anyhow::Result<()> {
    fn logger(
        write: &mut dyn std::io::Write,
        now: &mut flexi_logger::DeferredNow,
        record: &log::Record<'_>,
    ) -> Result<(), std::io::Error> {
        let level = record.level();
        let level_str = match level {
            flexi_logger::Level::Debug => "DEBG".to_string(),
            x => x.to_string(),
        };
        let styler = flexi_logger::style(level);
        write!(
            write,
            "[{}] {} [{}:{}] {}",
            styler.paint(
                now.now()
                    .naive_local()
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            ),
            styler.paint(level_str),
            record.file().unwrap_or("<unnamed>"),
            record.line().unwrap_or(0),
            &record.args()
        )
    }

    let log_spec = match verbose {
        0 => "info",
        1 => "debug",
        2.. => "trace",
    };
    flexi_logger::Logger::try_with_str(log_spec)?
        .set_palette("196;208;158;248;240".to_owned())
        .format(logger)
        .start()?;
    Ok(())
}

fn env_or<T: std::str::FromStr>(name: &str, fallback: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|x| x.parse().ok())
        .unwrap_or(fallback)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_log(cli.verbose)?;

    let port = cli
        .port
        .unwrap_or_else(|| env_or("TOOLMOUNT_PORT", DEFAULT_PORT));
    let db_path = cli
        .db
        .unwrap_or_else(|| env_or("TOOLMOUNT_DB", PathBuf::from(DEFAULT_DB_PATH)));
    let storage_dir = cli
        .storage_dir
        .unwrap_or_else(|| env_or("TOOLMOUNT_STORAGE_DIR", PathBuf::from(DEFAULT_STORAGE_DIR)));
    let max_upload_bytes = cli
        .max_upload_mib
        .unwrap_or_else(|| env_or("TOOLMOUNT_MAX_UPLOAD_MIB", DEFAULT_MAX_UPLOAD_MIB))
        * 1024
        * 1024;

    let store = Arc::new(ToolStore::open(&db_path).context("opening catalog database")?);

    // Backend selection happens exactly once; every stored reference from
    // here on belongs to the chosen backend
    let blob_endpoint = std::env::var("TOOLMOUNT_BLOB_ENDPOINT").ok();
    let blob_token = std::env::var("TOOLMOUNT_BLOB_TOKEN").ok();
    let storage: Arc<dyn StorageBackend> = match (blob_endpoint, blob_token) {
        (Some(endpoint), Some(token)) => {
            log::info!("using remote blob storage at {endpoint}");
            Arc::new(BlobStorage::new(endpoint, token))
        }
        _ => {
            log::info!("using local archive storage at {}", storage_dir.display());
            Arc::new(LocalStorage::new(storage_dir))
        }
    };

    let app = web::main_service(AppState { store, storage }, max_upload_bytes);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    log::warn!("Starting toolmount daemon on {addr}...");

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::warn!("Stopping toolmount daemon...");
        })
        .await
        .context("http server failed")?;

    Ok(())
}
