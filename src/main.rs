use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use taskboard_lib::commands::{execute, Command};
use taskboard_lib::logging::init_logging;
use taskboard_lib::{AppContext, Config, Storage};

/// Local task list with activity history and JSON/CSV import and export.
#[derive(Debug, Parser)]
#[command(name = "taskboard", version)]
struct Cli {
    /// Directory holding the stored tasks, activity and settings.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::resolve(cli.data_dir);
    init_logging(&config).context("failed to start logging")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;

    runtime.block_on(async {
        let ctx = AppContext::open(Storage::new(config.data_dir.clone()));
        let mut stdout = std::io::stdout().lock();
        let result = execute(&ctx, cli.command, &mut stdout).await;
        ctx.store.dispose();
        if let Err(error) = &result {
            log::warn!("command failed error={error:#}");
        }
        result
    })
}
