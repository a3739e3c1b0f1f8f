use super::Session;
use crate::cli::LintArgs;
use aipguard_core::{DiagnosticRecord, Error};
use aipguard_guidance::GuidanceCache;
use aipguard_lint::{LintOutcome, Linter};
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Serialize)]
struct FileReport<'a> {
    file: &'a Path,
    diagnostics: Vec<Entry>,
}

#[derive(Debug, Serialize)]
struct Entry {
    #[serde(flatten)]
    record: DiagnosticRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    guidance: Option<String>,
}

/// Lint every file concurrently and print what api-linter reported.
///
/// Exits with 2 when a file could not be linted, 1 when problems were found and
/// `--set-exit-status` is given, 0 otherwise.
#[allow(clippy::print_stdout, clippy::print_stderr)]
pub async fn execute(session: &Session, args: &LintArgs) -> miette::Result<ExitCode> {
    let mut linter = Linter::new(Arc::new(session.provisioner()?), session.invocation.clone());
    if let Some(root) = &args.workspace_root {
        linter = linter.with_workspace_root(root.clone());
    }

    let linter = &linter;
    let outcomes = futures::future::join_all(
        args.files
            .iter()
            .map(|file| async move { (file.as_path(), linter.lint(file).await) }),
    )
    .await;

    let mut reports = Vec::new();
    let mut failed = false;
    for (file, outcome) in outcomes {
        match outcome {
            Ok(LintOutcome::Completed(records)) => reports.push(FileReport {
                file,
                diagnostics: records
                    .into_iter()
                    .map(|record| Entry {
                        record,
                        guidance: None,
                    })
                    .collect(),
            }),
            Ok(LintOutcome::Superseded) => debug!(file = %file.display(), "Superseded"),
            Err(e) => {
                failed = true;
                if linter.should_report(&e) {
                    eprintln!("{:?}", miette::Report::new(e));
                }
            }
        }
    }

    if args.explain {
        let mut cache = GuidanceCache::new(session.http.clone())?;
        for entry in reports.iter_mut().flat_map(|r| r.diagnostics.iter_mut()) {
            let guidance = cache.guidance_for(&entry.record.rule_doc_uri).await;
            entry.guidance = Some(guidance.formatted_body);
        }
    }

    if args.json {
        let json = serde_json::to_string_pretty(&reports)
            .map_err(|e| Error::serialization(e.to_string()))?;
        println!("{json}");
    } else {
        for report in &reports {
            for entry in &report.diagnostics {
                println!("{}", format_entry(report.file, entry));
            }
        }
    }

    if let Some(update) = linter.available_update() {
        eprintln!(
            "note: api-linter {} is available, run `aipguard update`",
            update.latest
        );
    }

    let findings = reports.iter().map(|r| r.diagnostics.len()).sum::<usize>();
    debug!(files = reports.len(), findings, "Lint complete");
    Ok(exit_code(failed, findings, session.invocation.set_exit_status))
}

fn exit_code(failed: bool, findings: usize, set_exit_status: bool) -> ExitCode {
    if failed {
        ExitCode::from(2)
    } else if findings > 0 && set_exit_status {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

/// `file:line:col: rule: message`, 1-based, followed by any suggestion and guidance.
fn format_entry(file: &Path, entry: &Entry) -> String {
    let record = &entry.record;
    let mut out = format!(
        "{}:{}:{}: {}: {}",
        file.display(),
        u64::from(record.range.start_line) + 1,
        u64::from(record.range.start_column) + 1,
        record.rule_id,
        record.message
    );
    if let Some(suggestion) = &record.suggestion {
        out.push_str("\n    suggestion: ");
        out.push_str(suggestion);
    }
    if let Some(guidance) = &entry.guidance {
        for line in guidance.lines() {
            out.push_str("\n    ");
            out.push_str(line);
        }
    }
    out
}
