//! Build the api-linter command line for one file.
//!
//! The tool runs inside the file's directory and receives only the base name, so
//! that directory is always the first import path. Every other path goes through
//! placeholder substitution and an existence check; anything that does not resolve
//! is dropped instead of being passed through literally.

use aipguard_core::{Error, InvocationOptions, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

const WORKSPACE_PLACEHOLDERS: [&str; 2] = ["${workspaceFolder}", "${workspaceRoot}"];

/// Workspace-local corpus locations, relative to the workspace root.
const LOCAL_CORPORA: [&str; 2] = ["googleapis", "third_party/googleapis"];

/// A ready-to-spawn api-linter command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Arguments, ending with the file's base name.
    pub args: Vec<String>,
    /// Working directory: the file's parent.
    pub cwd: PathBuf,
}

/// Where import paths come from besides the configured list.
#[derive(Debug, Clone, Default)]
pub struct ImportContext {
    /// Root of the caller's workspace; substituted for `${workspaceFolder}`.
    pub workspace_root: Option<PathBuf>,
    /// Import directories of the provisioned corpora.
    pub global_corpora: Vec<PathBuf>,
}

/// Build the invocation for `file`.
///
/// The file and workspace root are made absolute first, so every path handed to
/// the tool means the same thing inside its working directory. Only touches the
/// filesystem to check which paths exist.
pub fn build(
    file: &Path,
    options: &InvocationOptions,
    context: &ImportContext,
) -> Result<Invocation> {
    let file = std::path::absolute(file).map_err(Error::io_at(file, "resolve"))?;
    let file_name = file
        .file_name()
        .ok_or_else(|| Error::configuration(format!("not a file path: {}", file.display())))?;
    let cwd = file
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| Error::configuration(format!("not a file path: {}", file.display())))?;
    let root = context
        .workspace_root
        .as_deref()
        .map(std::path::absolute)
        .transpose()
        .map_err(|e| Error::io(e, context.workspace_root.clone(), "resolve"))?;
    let root = root.as_deref();
    let base = root.unwrap_or(&cwd);

    let mut args = Vec::new();

    if let Some(config) = options
        .config_file
        .as_deref()
        .and_then(|raw| resolve(raw, root, base))
        .filter(|path| path.is_file())
    {
        args.push("--config".to_string());
        args.push(display(&config));
    }

    let mut proto_paths = vec![cwd.clone()];
    if let Some(root) = root {
        proto_paths.extend(
            LOCAL_CORPORA
                .iter()
                .map(|rel| root.join(rel))
                .filter(|dir| dir.is_dir()),
        );
    }
    proto_paths.extend(context.global_corpora.iter().filter(|dir| dir.is_dir()).cloned());
    for raw in &options.import_paths {
        match resolve(raw, root, base) {
            Some(path) if path.exists() => proto_paths.push(path),
            _ => debug!(import_path = %raw, "Dropping import path that does not resolve"),
        }
    }

    let mut seen = std::collections::HashSet::new();
    for path in proto_paths {
        if seen.insert(path.clone()) {
            args.push("--proto-path".to_string());
            args.push(display(&path));
        }
    }

    for rule in &options.disabled_rules {
        args.push("--disable-rule".to_string());
        args.push(rule.clone());
    }
    for rule in &options.enabled_rules {
        args.push("--enable-rule".to_string());
        args.push(rule.clone());
    }

    for raw in &options.descriptor_sets {
        match resolve(raw, root, base) {
            Some(path) if path.is_file() => {
                args.push("--descriptor-set-in".to_string());
                args.push(display(&path));
            }
            _ => debug!(descriptor_set = %raw, "Dropping descriptor set that does not resolve"),
        }
    }

    if options.ignore_comment_disables {
        args.push("--ignore-comment-disables".to_string());
    }
    if options.set_exit_status {
        args.push("--set-exit-status".to_string());
    }
    args.push("--output-format".to_string());
    args.push("json".to_string());
    args.push(file_name.to_string_lossy().into_owned());

    Ok(Invocation { args, cwd })
}

/// Substitute placeholders in `raw` and anchor relative results at `base`.
///
/// Returns `None` when a placeholder cannot be resolved.
fn resolve(raw: &str, root: Option<&Path>, base: &Path) -> Option<PathBuf> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let mut value = raw.to_string();
    for placeholder in WORKSPACE_PLACEHOLDERS {
        if value.contains(placeholder) {
            value = value.replace(placeholder, &display(root?));
        }
    }
    if value.contains("${") {
        return None;
    }

    let path = if value == "~" {
        dirs::home_dir()?
    } else if let Some(rest) = value.strip_prefix("~/") {
        dirs::home_dir()?.join(rest)
    } else {
        PathBuf::from(value)
    };

    if path.is_absolute() {
        Some(path)
    } else {
        Some(base.join(path))
    }
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
