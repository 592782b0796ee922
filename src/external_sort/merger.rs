use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::constants::{BYTES_PER_KB, MERGE_HEAP_INITIAL_CAPACITY, OUTPUT_BUFFER_SIZE_KB};
use crate::errors::Result;
use crate::external_sort::chunk::ChunkMetadata;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub lines_written: usize,
    pub duplicates_removed: usize,
}

pub struct ChunkMerger {
    io_buffer_size: usize,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct MergeEntry {
    line: String,
    chunk_id: usize,
}

impl ChunkMerger {
    pub fn new(io_buffer_size: usize) -> Self {
        Self { io_buffer_size }
    }

    /// K-way merge of sorted chunks into `output_file`, dropping lines equal to the one just
    /// written.
    pub fn merge_chunks(&self, chunks: &[ChunkMetadata], output_file: &Path) -> Result<MergeStats> {
        let output = File::create(output_file)?;
        let mut writer = BufWriter::with_capacity(OUTPUT_BUFFER_SIZE_KB * BYTES_PER_KB, output);

        let mut chunk_readers = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let file = File::open(&chunk.file_path)?;
            chunk_readers.push(BufReader::with_capacity(self.io_buffer_size, file));
        }

        let mut merge_heap = BinaryHeap::with_capacity(MERGE_HEAP_INITIAL_CAPACITY.max(chunks.len()));
        for (chunk_id, reader) in chunk_readers.iter_mut().enumerate() {
            if let Some(line) = read_next_line(reader)? {
                merge_heap.push(Reverse(MergeEntry { line, chunk_id }));
            }
        }

        let mut stats = MergeStats::default();
        let mut last_line: Option<String> = None;

        while let Some(Reverse(entry)) = merge_heap.pop() {
            if let Some(next) = read_next_line(&mut chunk_readers[entry.chunk_id])? {
                merge_heap.push(Reverse(MergeEntry {
                    line: next,
                    chunk_id: entry.chunk_id,
                }));
            }

            if last_line.as_deref() == Some(entry.line.as_str()) {
                stats.duplicates_removed += 1;
                continue;
            }
            writeln!(writer, "{}", entry.line)?;
            stats.lines_written += 1;
            last_line = Some(entry.line);
        }

        writer.flush()?;
        Ok(stats)
    }
}

fn read_next_line(reader: &mut BufReader<File>) -> Result<Option<String>> {
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer)? == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&buffer);
        let line = line.trim_end_matches(['\n', '\r']);
        if !line.is_empty() {
            return Ok(Some(line.to_string()));
        }
    }
}
