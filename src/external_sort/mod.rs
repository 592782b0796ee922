pub mod chunk;
pub mod merger;

#[cfg(test)]
mod tests;

pub use chunk::{ChunkMetadata, ChunkProcessor};
pub use merger::{ChunkMerger, MergeStats};

use std::path::{Path, PathBuf};

use crate::errors::Result;

#[derive(Debug, Clone)]
pub struct ExternalSortConfig {
    pub chunk_size_bytes: usize,
    pub io_buffer_size: usize,
    pub temp_directory: PathBuf,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExternalSortStats {
    pub lines_read: usize,
    pub unique_lines: usize,
    pub duplicates_removed: usize,
    pub chunks_created: usize,
}

/// Sort the lines of `input_file` and write each distinct non-empty line once to
/// `output_file`. Chunk files are created in the configured temp directory and removed
/// afterwards.
pub fn sort_and_deduplicate(
    input_file: &Path,
    output_file: &Path,
    config: &ExternalSortConfig,
) -> Result<ExternalSortStats> {
    let processor = ChunkProcessor::new(
        config.chunk_size_bytes,
        config.io_buffer_size,
        config.temp_directory.clone(),
    );
    let (chunks, lines_read) = processor.process_file_to_chunks(input_file)?;

    let merged = ChunkMerger::new(config.io_buffer_size).merge_chunks(&chunks, output_file);
    processor.cleanup_all_chunks(&chunks);
    let merged = merged?;

    Ok(ExternalSortStats {
        lines_read,
        unique_lines: merged.lines_written,
        duplicates_removed: lines_read - merged.lines_written,
        chunks_created: chunks.len(),
    })
}
