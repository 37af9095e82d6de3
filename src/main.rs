// Entrypoint for the CLI application.
// - Keeps `main` small: parse flags, load the config, build the client and
//   hand everything to the UI flow.
// - Any failure prints one diagnostic line and exits with status 1.

use clap::Parser;
use qiniu_img_upload::{config, ui, Config, Error, QiniuClient, UploadOptions};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "qiniu-img-upload", version, about = "Upload an image to Qiniu, optionally as WebP")]
struct Cli {
    /// Local path or http(s) URL of the image; prompted for when omitted
    source: Option<String>,

    /// Path to config.json (overrides QINIU_UPLOAD_CONFIG and the default lookup)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log pipeline steps to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "qiniu_img_upload=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let path = config::locate(cli.config.as_deref())?;
    let cfg = Config::load(&path)?;
    let client = QiniuClient::from_config(&cfg)?;
    let opts = UploadOptions::from_config(&cfg);

    let result = ui::run(&client, cli.source, &opts)?;
    println!("{}", ui::render_report(&result));
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<Error>() {
                Some(e) => {
                    tracing::debug!(kind = e.kind(), error = ?e, "upload aborted");
                    println!("{}", ui::render_failure(e));
                }
                None => println!("Upload failed: {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}
