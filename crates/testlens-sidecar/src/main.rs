mod config;
mod logging;
mod outline_cmd;
mod session;
mod watch;

use crate::config::{load_view_config, Overrides};
use crate::outline_cmd::CommandOutlineParser;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use testlens_core::config::UpdateOn;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "testlens-sidecar", version)]
struct Args {
    /// Command that prints the JSON outline of a test file.
    #[arg(long)]
    outline_cmd: String,
    /// Extra argument passed before the document path; repeatable.
    #[arg(long = "outline-arg", allow_hyphen_values = true)]
    outline_args: Vec<String>,
    /// Seconds before an outline command is killed.
    #[arg(long, default_value_t = 10)]
    outline_timeout: u64,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    update_on: Option<UpdateOn>,
    #[arg(long)]
    update_on_type_delay: Option<i64>,
    #[arg(long, allow_negative_numbers = true)]
    double_click_threshold: Option<i64>,
    /// Treat on-disk writes of the tracked document as saves.
    #[arg(long, default_value_t = false)]
    watch: bool,
    #[arg(long, default_value_t = false)]
    debug: bool,
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guard = logging::init_logging(args.debug, args.log_dir.as_deref());

    let config = load_view_config(
        args.config.as_deref(),
        Overrides {
            update_on: args.update_on,
            update_on_type_delay: args.update_on_type_delay,
            double_click_threshold: args.double_click_threshold,
        },
    )?;
    info!(
        event = "sidecar_start",
        outline_cmd = %args.outline_cmd,
        update_on = %config.update_on,
        watch = args.watch
    );

    let parser = CommandOutlineParser::new(
        args.outline_cmd,
        args.outline_args,
        Duration::from_secs(args.outline_timeout),
    );
    session::run_session(
        tokio::io::stdin(),
        tokio::io::stdout(),
        config,
        parser,
        args.watch,
    )
    .await
}
