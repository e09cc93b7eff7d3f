//! Archive extraction
//!
//! Hosts wrap every archive in a single top-level directory
//! (`{repo}-{ref}/` and friends). Extraction drops exactly that one level so
//! the destination receives the repository tree itself.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};
use zip::ZipArchive;

use crate::error::{Result, TargitError};
use crate::locator::ArchiveType;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";
const ZIP_EMPTY_MAGIC: [u8; 4] = *b"PK\x05\x06";

/// Unpack the archive at `from` into `to`, dropping its wrapper directory.
///
/// `to` may be missing (it is created) or an empty directory; anything else
/// is refused before a single byte is written.
pub async fn extract(from: &Path, to: &Path) -> Result<PathBuf> {
    if !tokio::fs::try_exists(from).await.unwrap_or(false) {
        return Err(TargitError::ArchiveNotFound {
            path: from.to_path_buf(),
        });
    }

    match tokio::fs::read_dir(to).await {
        Ok(mut entries) => {
            if entries
                .next_entry()
                .await
                .map_err(|e| TargitError::io(to, e))?
                .is_some()
            {
                return Err(TargitError::DestinationNotEmpty {
                    path: to.to_path_buf(),
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(TargitError::io(to, e)),
    }

    tokio::fs::create_dir_all(to)
        .await
        .map_err(|e| TargitError::io(to, e))?;

    log::debug!("Extracting {} into {}", from.display(), to.display());

    // tar/zip decoding is CPU-bound and synchronous
    let archive = from.to_path_buf();
    let dest = to.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let format = detect_format(&archive)?;
        match format {
            ArchiveType::TarGz => unpack_tar_gz(&archive, &dest),
            ArchiveType::Zip => unpack_zip(&archive, &dest),
        }
    })
    .await
    .map_err(|e| extract_error(from, e))??;

    Ok(to.to_path_buf())
}

/// Identify an archive by magic bytes, then by extension
fn detect_format(path: &Path) -> Result<ArchiveType> {
    let mut magic = [0u8; 4];
    let mut file = File::open(path).map_err(|e| TargitError::io(path, e))?;
    let read = read_prefix(&mut file, &mut magic).map_err(|e| TargitError::io(path, e))?;

    if read >= 2 && magic[..2] == GZIP_MAGIC {
        return Ok(ArchiveType::TarGz);
    }
    if read == 4 && (magic == ZIP_MAGIC || magic == ZIP_EMPTY_MAGIC) {
        return Ok(ArchiveType::Zip);
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if name.ends_with(".zip") {
        Ok(ArchiveType::Zip)
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Ok(ArchiveType::TarGz)
    } else {
        Err(extract_error(path, "unrecognised archive format"))
    }
}

fn read_prefix(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Drop the leading wrapper component of an archive entry path.
///
/// Returns `Ok(None)` for the wrapper itself and for entries that sit
/// directly at the archive root, and an error for paths that would leave
/// the destination.
fn strip_wrapper(entry: &Path) -> std::result::Result<Option<PathBuf>, String> {
    let mut rest = PathBuf::new();
    let mut wrapper_seen = false;

    for component in entry.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) if wrapper_seen => rest.push(part),
            Component::Normal(_) => wrapper_seen = true,
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(format!("unsafe entry path {}", entry.display()));
            }
        }
    }

    Ok((!rest.as_os_str().is_empty()).then_some(rest))
}

/// A relative symlink target must resolve inside the destination.
///
/// Only leading `..` components are accepted, so the check does not depend
/// on what the named components turn out to be.
fn link_stays_inside(entry: &Path, target: &Path) -> bool {
    let mut depth = entry.components().count().saturating_sub(1) as isize;
    let mut descended = false;

    for component in target.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(_) => {
                depth += 1;
                descended = true;
            }
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 || descended {
                    return false;
                }
            }
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

/// Refuse entries whose parent chain inside `to` passes through a symlink
fn check_ancestors(to: &Path, relative: &Path) -> std::result::Result<(), String> {
    let Some(parent) = relative.parent() else {
        return Ok(());
    };

    let mut current = to.to_path_buf();
    for component in parent.components() {
        current.push(component);
        match std::fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(format!(
                    "entry {} lies beneath symlink {}",
                    relative.display(),
                    current.display()
                ));
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => break,
            Err(e) => return Err(e.to_string()),
        }
    }
    Ok(())
}

/// Resolve where an entry goes and make room for it without following links
fn prepare_dest(from: &Path, to: &Path, relative: &Path) -> Result<PathBuf> {
    check_ancestors(to, relative).map_err(|reason| extract_error(from, reason))?;

    let dest = to.join(relative);
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| TargitError::io(parent, e))?;
    }
    if std::fs::symlink_metadata(&dest).is_ok_and(|meta| meta.file_type().is_symlink()) {
        std::fs::remove_file(&dest).map_err(|e| TargitError::io(&dest, e))?;
    }
    Ok(dest)
}

fn checked_link_target(from: &Path, relative: &Path, target: &Path) -> Result<()> {
    if link_stays_inside(relative, target) {
        Ok(())
    } else {
        Err(extract_error(
            from,
            format!(
                "symlink {} -> {} points outside the destination",
                relative.display(),
                target.display()
            ),
        ))
    }
}

#[cfg(unix)]
fn create_symlink(target: &Path, dest: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, dest)
}

#[cfg(not(unix))]
fn create_symlink(target: &Path, dest: &Path) -> std::io::Result<()> {
    std::fs::write(dest, target.to_string_lossy().as_bytes())
}

fn unpack_tar_gz(from: &Path, to: &Path) -> Result<()> {
    let file = File::open(from).map_err(|e| TargitError::io(from, e))?;
    let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));

    for entry in archive.entries().map_err(|e| extract_error(from, e))? {
        let mut entry = entry.map_err(|e| extract_error(from, e))?;
        let kind = entry.header().entry_type();

        if matches!(kind, EntryType::XGlobalHeader | EntryType::XHeader) {
            continue;
        }

        let path = entry.path().map_err(|e| extract_error(from, e))?.into_owned();
        let Some(relative) = strip_wrapper(&path).map_err(|reason| extract_error(from, reason))?
        else {
            continue;
        };

        match kind {
            EntryType::Directory => {
                let dest = prepare_dest(from, to, &relative)?;
                std::fs::create_dir_all(&dest).map_err(|e| TargitError::io(&dest, e))?;
            }
            EntryType::Symlink => {
                let target = link_name(from, &mut entry, &path)?;
                checked_link_target(from, &relative, &target)?;
                let dest = prepare_dest(from, to, &relative)?;
                create_symlink(&target, &dest).map_err(|e| TargitError::io(&dest, e))?;
            }
            EntryType::Link => {
                // Hard link targets are archive paths and carry the wrapper too.
                let target = link_name(from, &mut entry, &path)?;
                let Some(target) = strip_wrapper(&target).map_err(|reason| extract_error(from, reason))?
                else {
                    return Err(extract_error(from, format!("link {} has no target", path.display())));
                };
                check_ancestors(to, &target).map_err(|reason| extract_error(from, reason))?;
                let dest = prepare_dest(from, to, &relative)?;
                std::fs::hard_link(to.join(target), &dest).map_err(|e| TargitError::io(&dest, e))?;
            }
            _ => {
                let dest = prepare_dest(from, to, &relative)?;
                entry.unpack(&dest).map_err(|e| extract_error(from, e))?;
            }
        }
    }

    Ok(())
}

fn link_name<R: Read>(from: &Path, entry: &mut tar::Entry<'_, R>, path: &Path) -> Result<PathBuf> {
    entry
        .link_name()
        .map_err(|e| extract_error(from, e))?
        .map(|target| target.into_owned())
        .ok_or_else(|| extract_error(from, format!("link {} has no target", path.display())))
}

fn unpack_zip(from: &Path, to: &Path) -> Result<()> {
    let file = File::open(from).map_err(|e| TargitError::io(from, e))?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|e| extract_error(from, e))?;

    for index in 0..archive.len() {
        let mut file = archive.by_index(index).map_err(|e| extract_error(from, e))?;
        let Some(enclosed) = file.enclosed_name() else {
            return Err(extract_error(from, format!("unsafe entry path {}", file.name())));
        };
        let Some(relative) = strip_wrapper(&enclosed).map_err(|reason| extract_error(from, reason))?
        else {
            continue;
        };

        if file.is_dir() {
            let dest = prepare_dest(from, to, &relative)?;
            std::fs::create_dir_all(&dest).map_err(|e| TargitError::io(&dest, e))?;
            continue;
        }

        if file.is_symlink() {
            let mut target = String::new();
            file.read_to_string(&mut target)
                .map_err(|e| extract_error(from, e))?;
            let target = PathBuf::from(target);
            checked_link_target(from, &relative, &target)?;
            let dest = prepare_dest(from, to, &relative)?;
            create_symlink(&target, &dest).map_err(|e| TargitError::io(&dest, e))?;
            continue;
        }

        let dest = prepare_dest(from, to, &relative)?;
        let mut out = File::create(&dest).map_err(|e| TargitError::io(&dest, e))?;
        std::io::copy(&mut file, &mut out).map_err(|e| extract_error(from, e))?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(mode & 0o777))
                .map_err(|e| TargitError::io(&dest, e))?;
        }
    }

    Ok(())
}

fn extract_error(path: &Path, reason: impl std::fmt::Display) -> TargitError {
    TargitError::Extract {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
