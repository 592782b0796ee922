use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::constants::{FINALIZE_CHUNK_FILE_EXTENSION, FINALIZE_CHUNK_FILE_PREFIX};
use crate::errors::Result;

#[derive(Debug, Clone)]
pub struct ChunkMetadata {
    pub chunk_id: usize,
    pub file_path: PathBuf,
    pub line_count: usize,
}

/// Splits a line file into sorted, locally deduplicated chunk files no larger than
/// `chunk_size_bytes` of line data each.
pub struct ChunkProcessor {
    chunk_size_bytes: usize,
    io_buffer_size: usize,
    temp_directory: PathBuf,
}

impl ChunkProcessor {
    pub fn new(chunk_size_bytes: usize, io_buffer_size: usize, temp_directory: PathBuf) -> Self {
        Self {
            chunk_size_bytes: chunk_size_bytes.max(1),
            io_buffer_size,
            temp_directory,
        }
    }

    /// Returns the chunk files and the number of non-empty lines read.
    pub fn process_file_to_chunks(&self, file_path: &Path) -> Result<(Vec<ChunkMetadata>, usize)> {
        let file = File::open(file_path)?;
        let mut reader = BufReader::with_capacity(self.io_buffer_size, file);
        let mut chunks = Vec::new();
        let mut current_chunk: Vec<String> = Vec::new();
        let mut current_size = 0;
        let mut lines_read = 0;
        let mut buffer = Vec::new();

        loop {
            buffer.clear();
            if reader.read_until(b'\n', &mut buffer)? == 0 {
                break;
            }

            let line = String::from_utf8_lossy(&buffer);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                continue;
            }
            lines_read += 1;

            if current_size + line.len() > self.chunk_size_bytes && !current_chunk.is_empty() {
                let metadata =
                    self.sort_and_write_chunk(chunks.len(), std::mem::take(&mut current_chunk))?;
                chunks.push(metadata);
                current_size = 0;
            }

            current_size += line.len();
            current_chunk.push(line.to_string());
        }

        if !current_chunk.is_empty() {
            let metadata = self.sort_and_write_chunk(chunks.len(), current_chunk)?;
            chunks.push(metadata);
        }

        debug!(
            "{}: {} lines split into {} sorted chunks",
            file_path.display(),
            lines_read,
            chunks.len()
        );
        Ok((chunks, lines_read))
    }

    pub fn sort_and_write_chunk(&self, chunk_id: usize, mut lines: Vec<String>) -> Result<ChunkMetadata> {
        lines.par_sort();
        lines.dedup();

        let chunk_file = self.temp_directory.join(format!(
            "{}{}{}",
            FINALIZE_CHUNK_FILE_PREFIX, chunk_id, FINALIZE_CHUNK_FILE_EXTENSION
        ));

        let file = File::create(&chunk_file)?;
        let mut writer = BufWriter::with_capacity(self.io_buffer_size, file);
        for line in &lines {
            writeln!(writer, "{}", line)?;
        }
        writer.flush()?;

        Ok(ChunkMetadata {
            chunk_id,
            file_path: chunk_file,
            line_count: lines.len(),
        })
    }

    pub fn cleanup_all_chunks(&self, chunks: &[ChunkMetadata]) {
        for chunk in chunks {
            if chunk.file_path.exists() {
                if let Err(e) = fs::remove_file(&chunk.file_path) {
                    warn!("Failed to clean up chunk {}: {}", chunk.chunk_id, e);
                }
            }
        }
    }
}
