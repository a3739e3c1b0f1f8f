use super::Session;
use aipguard_core::Error;
use aipguard_provision::{AssetKind, AvailableUpdate};
use std::io::{BufRead, Write};

/// Check for a newer api-linter now and install it after confirmation.
#[allow(clippy::print_stdout)]
pub async fn execute(session: &Session, yes: bool) -> miette::Result<()> {
    if let Some(path) = &session.provision.custom_executable_path {
        println!("Using configured api-linter at {}, nothing to update", path.display());
        return Ok(());
    }

    let provisioner = session.provisioner()?;
    let Some(update) = provisioner.check_update().await? else {
        let installed = provisioner.ensure(AssetKind::Executable).await?;
        println!("api-linter is up to date ({})", installed.path.display());
        return Ok(());
    };

    if yes || confirm(&update).await? {
        let path = provisioner.apply_update(&update).await?;
        println!("Installed api-linter {} at {}", update.latest, path.display());
    } else {
        provisioner.decline_update(&update).await?;
        println!(
            "Keeping api-linter {}",
            update.current.as_deref().unwrap_or("(unknown version)")
        );
    }
    Ok(())
}

async fn confirm(update: &AvailableUpdate) -> miette::Result<bool> {
    let prompt = format!(
        "Install api-linter {} (installed: {})? [y/N] ",
        update.latest,
        update.current.as_deref().unwrap_or("unknown")
    );

    let answer = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(prompt.as_bytes())?;
        stdout.flush()?;
        let mut answer = String::new();
        std::io::stdin().lock().read_line(&mut answer)?;
        Ok(answer)
    })
    .await
    .map_err(|e| miette::miette!("Prompt task failed: {e}"))?
    .map_err(|e| Error::io(e, None, "prompt"))?;

    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
