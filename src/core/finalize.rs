use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

use crate::constants::{FINALIZE_TEMP_DIR_NAME, TEMP_FILE_SUFFIX};
use crate::errors::{Result, SiftError};
use crate::external_sort::{sort_and_deduplicate, ExternalSortConfig};

static FINALIZE_RUN_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone)]
pub struct FinalizeOptions {
    pub chunk_size_bytes: usize,
    pub io_buffer_size: usize,
    /// Parent directory for chunk files. A private subdirectory is created per pass.
    pub temp_directory: PathBuf,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FinalizeStats {
    pub sinks: usize,
    pub lines_read: usize,
    pub unique_lines: usize,
    pub duplicates_removed: usize,
}

/// Sort and deduplicate every sink file in place. Running it again over the same files leaves
/// them unchanged.
pub fn finalize_sinks(sinks: &[PathBuf], options: &FinalizeOptions) -> Result<FinalizeStats> {
    let work_dir = options.temp_directory.join(format!(
        "{}_{}_{}",
        FINALIZE_TEMP_DIR_NAME,
        std::process::id(),
        FINALIZE_RUN_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    fs::create_dir_all(&work_dir)?;

    let config = ExternalSortConfig {
        chunk_size_bytes: options.chunk_size_bytes,
        io_buffer_size: options.io_buffer_size,
        temp_directory: work_dir.clone(),
    };

    let outcome: Result<FinalizeStats> = sinks
        .iter()
        .filter(|sink| sink.is_file())
        .try_fold(FinalizeStats::default(), |mut stats, sink| {
            let sink_stats = finalize_sink(sink, &config)?;
            stats.sinks += 1;
            stats.lines_read += sink_stats.lines_read;
            stats.unique_lines += sink_stats.unique_lines;
            stats.duplicates_removed += sink_stats.duplicates_removed;
            Ok(stats)
        });

    if let Err(e) = fs::remove_dir_all(&work_dir) {
        warn!("Failed to remove finalize directory {}: {}", work_dir.display(), e);
    }

    let stats = outcome?;
    info!(
        "Finalized {} sinks: {} unique lines, {} duplicates removed",
        stats.sinks, stats.unique_lines, stats.duplicates_removed
    );
    Ok(stats)
}

fn finalize_sink(sink: &Path, config: &ExternalSortConfig) -> Result<FinalizeStats> {
    let mut temp_name = sink.as_os_str().to_owned();
    temp_name.push(TEMP_FILE_SUFFIX);
    let temp_path = PathBuf::from(temp_name);

    let sorted = sort_and_deduplicate(sink, &temp_path, config)
        .and_then(|stats| {
            fs::rename(&temp_path, sink).map_err(|source| SiftError::sink_write(sink, source))?;
            Ok(stats)
        });
    if sorted.is_err() && temp_path.exists() {
        let _ = fs::remove_file(&temp_path);
    }
    let stats = sorted?;

    debug!(
        "{}: {} lines, {} duplicates removed",
        sink.display(),
        stats.lines_read,
        stats.duplicates_removed
    );

    Ok(FinalizeStats {
        sinks: 1,
        lines_read: stats.lines_read,
        unique_lines: stats.unique_lines,
        duplicates_removed: stats.duplicates_removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn options(temp: &Path) -> FinalizeOptions {
        FinalizeOptions {
            chunk_size_bytes: 16,
            io_buffer_size: 4096,
            temp_directory: temp.to_path_buf(),
        }
    }

    #[test]
    fn test_finalize_dedups_each_sink() {
        let dir = tempdir().unwrap();
        let bayern = dir.path().join("bayern.txt");
        let other = dir.path().join("other.txt");
        fs::write(&bayern, "alice@bayern.de, secret123\nalice@bayern.de, secret123\n").unwrap();
        fs::write(&other, "").unwrap();

        let stats = finalize_sinks(
            &[bayern.clone(), other.clone(), dir.path().join("missing.txt")],
            &options(dir.path()),
        )
        .unwrap();

        assert_eq!(stats.sinks, 2);
        assert_eq!(stats.duplicates_removed, 1);
        assert_eq!(fs::read_to_string(&bayern).unwrap(), "alice@bayern.de, secret123\n");
        assert_eq!(fs::read_to_string(&other).unwrap(), "");
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let dir = tempdir().unwrap();
        let sink = dir.path().join("sink.txt");
        fs::write(&sink, "c, 1\na, 2\nc, 1\nb, 3\na, 2\n").unwrap();

        finalize_sinks(&[sink.clone()], &options(dir.path())).unwrap();
        let first = fs::read_to_string(&sink).unwrap();
        let again = finalize_sinks(&[sink.clone()], &options(dir.path())).unwrap();
        let second = fs::read_to_string(&sink).unwrap();

        assert_eq!(first, "a, 2\nb, 3\nc, 1\n");
        assert_eq!(first, second);
        assert_eq!(again.duplicates_removed, 0);

        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }
}
