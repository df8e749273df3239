//! Quickstat - Quick statistical profile of uploaded CSV files
//!
//! Serves the upload/download HTTP API until interrupted.

use std::path::PathBuf;

use anyhow::{ensure, Result};
use argh::FromArgs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use quickstat::sample::DEFAULT_SAMPLE_LIMIT;
use quickstat::server::{self, ServerConfig};

/// Quickstat - upload a CSV, get its statistical profile back
#[derive(FromArgs)]
struct Args {
    /// address to bind (default: 0.0.0.0)
    #[argh(option, default = "String::from(\"0.0.0.0\")")]
    host: String,

    /// port to listen on (default: 5000)
    #[argh(option, short = 'p', default = "5000")]
    port: u16,

    /// directory where uploads are stored (default: uploads)
    #[argh(option, short = 'd', default = "PathBuf::from(\"uploads\")")]
    upload_dir: PathBuf,

    /// largest accepted request body in MiB (default: 64)
    #[argh(option, default = "64")]
    max_upload_mb: usize,

    /// rows kept in the chart sample (default: 200)
    #[argh(option, default = "DEFAULT_SAMPLE_LIMIT")]
    sample_limit: usize,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig> {
        ensure!(self.max_upload_mb > 0, "--max-upload-mb must be at least 1");
        Ok(ServerConfig {
            host: self.host,
            port: self.port,
            upload_dir: self.upload_dir,
            max_upload_bytes: self.max_upload_mb.saturating_mul(1024 * 1024),
            sample_limit: self.sample_limit,
        })
    }
}

/// Log to stderr; `RUST_LOG` overrides the default filter
fn setup_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("quickstat=info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Args = argh::from_env();
    setup_logging();

    let config = args.into_config()?;
    server::serve(config).await
}
