use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ExperimentError;
use crate::experiment::lock::FileLock;

/// A checkpoint directory together with the lock guarding its result slot.
#[derive(Debug, Clone)]
pub struct CheckpointSource {
    pub checkpoint_dir: PathBuf,
    pub lock_file: PathBuf,
}

fn has_entries(dir: &Path) -> bool {
    fs::read_dir(dir).map_or(false, |mut entries| entries.next().is_some())
}

fn copy_dir(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

/// Seed `current` with the most recent checkpoint of a smaller contract.
///
/// Does nothing when `current` already holds a checkpoint. Otherwise the
/// `sources` (smaller contracts, largest first) are tried in order: a
/// source whose lock is held elsewhere is skipped, the first non-empty one
/// is copied and optionally removed. Returns the directory copied from.
pub fn copy_forward(
    current: &Path,
    sources: &[CheckpointSource],
    remove_source: bool,
) -> Result<Option<PathBuf>, ExperimentError> {
    if has_entries(current) {
        log::debug!("Resuming from existing checkpoint {}", current.display());
        return Ok(None);
    }
    for source in sources {
        let _guard = match FileLock::try_acquire(&source.lock_file) {
            Ok(guard) => guard,
            Err(ExperimentError::LockContention(path)) => {
                log::info!("Skipping checkpoint guarded by busy lock {}", path.display());
                continue;
            }
            Err(e) => return Err(e),
        };
        if !has_entries(&source.checkpoint_dir) {
            continue;
        }
        copy_dir(&source.checkpoint_dir, current)?;
        log::info!(
            "Copied checkpoint {} to {}",
            source.checkpoint_dir.display(),
            current.display()
        );
        if remove_source {
            fs::remove_dir_all(&source.checkpoint_dir)?;
        }
        return Ok(Some(source.checkpoint_dir.clone()));
    }
    Ok(None)
}
