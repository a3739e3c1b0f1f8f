mod cli;
mod commands;
mod tracing;

use crate::cli::Commands;
use crate::commands::Session;
use crate::tracing::TracingConfig;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> miette::Result<ExitCode> {
    let cli = cli::parse();

    crate::tracing::init_tracing(TracingConfig {
        format: cli.log_format,
        level: cli.log_level.into(),
        filter: None,
    })?;

    let session = Session::load(&cli).await?;

    match &cli.command {
        Commands::Ensure => commands::ensure::execute(&session)
            .await
            .map(|()| ExitCode::SUCCESS),
        Commands::Update { yes } => commands::update::execute(&session, *yes)
            .await
            .map(|()| ExitCode::SUCCESS),
        Commands::Lint(args) => commands::lint::execute(&session, args).await,
        Commands::Explain { uri } => commands::explain::execute(&session, uri)
            .await
            .map(|()| ExitCode::SUCCESS),
    }
}
