use super::Session;
use aipguard_provision::{AssetKind, Corpus};
use tracing::warn;

/// Provision the executable and both corpora, printing where they live.
#[allow(clippy::print_stdout)]
pub async fn execute(session: &Session) -> miette::Result<()> {
    let provisioner = session.provisioner()?;

    let executable = provisioner.ensure(AssetKind::Executable).await?;
    println!(
        "{:<11} {}",
        AssetKind::Executable.identifier(),
        executable.path.display()
    );

    let mut first_error = None;
    for corpus in Corpus::ALL {
        match provisioner.ensure(AssetKind::Corpus(corpus)).await {
            Ok(provisioned) => {
                println!("{:<11} {}", corpus.identifier(), provisioned.path.display());
            }
            Err(e) => {
                warn!(corpus = corpus.identifier(), error = %e, "Corpus unavailable");
                println!("{:<11} unavailable", corpus.identifier());
                first_error.get_or_insert(e);
            }
        }
    }

    if let Some(update) = executable.update {
        println!(
            "api-linter {} is available (installed: {}), run `aipguard update`",
            update.latest,
            update.current.as_deref().unwrap_or("unknown")
        );
    }

    match first_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
