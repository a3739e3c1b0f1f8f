//! Archive extraction and atomic placement.
//!
//! Archives are always unpacked into a fresh staging directory next to their final
//! location; nothing is written into an installed asset in place. Once the payload
//! is complete it is moved over the old copy with a rename.
//!
//! These functions block; the provisioner runs them on the blocking pool.

use aipguard_core::{Error, Result, cleanup};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::{debug, trace, warn};

/// Archive formats understood by [`extract`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// gzip-compressed tarball
    TarGz,
    /// uncompressed tarball
    Tar,
    /// zip
    Zip,
}

impl ArchiveFormat {
    /// Determine the format from a file name or URL.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

/// Extract `archive` into `dest`, which must not exist yet.
///
/// On failure `dest` is removed so no partial tree is left behind.
pub fn extract(archive: &Path, format: ArchiveFormat, dest: &Path) -> Result<()> {
    debug!(archive = %archive.display(), dest = %dest.display(), ?format, "Extracting");

    if dest.exists() {
        return Err(Error::extraction(
            archive.display().to_string(),
            format!("staging directory {} already exists", dest.display()),
        ));
    }
    std::fs::create_dir_all(dest).map_err(Error::io_at(dest, "create_dir_all"))?;

    let result = match format {
        ArchiveFormat::TarGz => {
            let file = File::open(archive).map_err(Error::io_at(archive, "open"))?;
            unpack_tar(Archive::new(GzDecoder::new(BufReader::new(file))), archive, dest)
        }
        ArchiveFormat::Tar => {
            let file = File::open(archive).map_err(Error::io_at(archive, "open"))?;
            unpack_tar(Archive::new(BufReader::new(file)), archive, dest)
        }
        ArchiveFormat::Zip => unpack_zip(archive, dest),
    };

    if result.is_err() {
        cleanup::remove_dir_all_blocking(dest);
    }
    result
}

fn unpack_tar<R: std::io::Read>(mut tar: Archive<R>, archive: &Path, dest: &Path) -> Result<()> {
    tar.set_preserve_permissions(true);
    tar.set_overwrite(true);
    // `unpack` refuses entries that would land outside `dest`.
    tar.unpack(dest)
        .map_err(|e| Error::extraction(archive.display().to_string(), e.to_string()))
}

fn unpack_zip(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive).map_err(Error::io_at(archive, "open"))?;
    let mut zip = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| Error::extraction(archive.display().to_string(), e.to_string()))?;

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| Error::extraction(archive.display().to_string(), e.to_string()))?;

        let Some(relative) = entry.enclosed_name() else {
            warn!(name = entry.name(), "Skipping zip entry outside the archive root");
            continue;
        };
        let outpath = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath).map_err(Error::io_at(&outpath, "create_dir_all"))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).map_err(Error::io_at(parent, "create_dir_all"))?;
        }
        let mut out = File::create(&outpath).map_err(Error::io_at(&outpath, "create"))?;
        std::io::copy(&mut entry, &mut out).map_err(Error::io_at(&outpath, "write"))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))
                .map_err(Error::io_at(&outpath, "set_permissions"))?;
        }
        trace!(path = %outpath.display(), "Extracted zip entry");
    }
    Ok(())
}

/// The single top-level directory of an extracted source archive.
///
/// GitHub source archives wrap the tree in `<repo>-<ref>/`. Loose top-level files
/// (such as a `pax_global_header`) are ignored; anything but exactly one directory
/// is an error.
pub fn single_top_level_dir(staging: &Path) -> Result<PathBuf> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(staging).map_err(Error::io_at(staging, "read_dir"))? {
        let entry = entry.map_err(Error::io_at(staging, "read_dir"))?;
        if entry
            .file_type()
            .map_err(Error::io_at(&entry.path(), "file_type"))?
            .is_dir()
        {
            dirs.push(entry.path());
        }
    }

    match dirs.len() {
        1 => Ok(dirs.remove(0)),
        0 => Err(Error::extraction(
            staging.display().to_string(),
            "archive contains no top-level directory",
        )),
        n => Err(Error::extraction(
            staging.display().to_string(),
            format!("expected one top-level directory, found {n}"),
        )),
    }
}

/// Find a regular file called `name` anywhere below `root`, shallowest first.
pub fn find_file(root: &Path, name: &str) -> Result<PathBuf> {
    let mut queue = std::collections::VecDeque::from([root.to_path_buf()]);
    while let Some(dir) = queue.pop_front() {
        let mut entries: Vec<_> = std::fs::read_dir(&dir)
            .map_err(Error::io_at(&dir, "read_dir"))?
            .filter_map(std::result::Result::ok)
            .collect();
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                queue.push_back(path);
            } else if file_type.is_file() && entry.file_name() == name {
                return Ok(path);
            }
        }
    }

    Err(Error::extraction(
        root.display().to_string(),
        format!("'{name}' not found in archive"),
    ))
}

/// Mark a file as executable (`0o755`). A no-op off Unix.
pub fn set_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .map_err(Error::io_at(path, "set_permissions"))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Move `new` to `dest`, replacing any existing file.
///
/// `new` must be on the same filesystem as `dest`; the rename either happens
/// completely or not at all.
pub fn replace_file(new: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(Error::io_at(parent, "create_dir_all"))?;
    }
    std::fs::rename(new, dest).map_err(Error::io_at(dest, "rename"))
}

/// Move the directory `new` to `dest`, replacing any existing directory.
///
/// Directories cannot be renamed over each other, so the old copy is first moved
/// aside. If the second rename fails the old copy is moved back.
pub fn replace_dir(new: &Path, dest: &Path) -> Result<()> {
    if !dest.exists() {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(Error::io_at(parent, "create_dir_all"))?;
        }
        return std::fs::rename(new, dest).map_err(Error::io_at(dest, "rename"));
    }

    let name = dest
        .file_name()
        .map_or_else(|| "asset".into(), |n| n.to_string_lossy().into_owned());
    let backup = dest.with_file_name(format!(".{name}.{}.old", uuid::Uuid::new_v4()));

    std::fs::rename(dest, &backup).map_err(Error::io_at(dest, "rename"))?;
    if let Err(e) = std::fs::rename(new, dest) {
        cleanup::best_effort("restore", dest, std::fs::rename(&backup, dest));
        return Err(Error::io(e, Some(dest.to_path_buf()), "rename"));
    }

    cleanup::remove_dir_all_blocking(&backup);
    Ok(())
}
