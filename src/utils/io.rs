use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::constants::{CSV_EXTENSION, SPREADSHEET_EXTENSION, TEXT_EXTENSION};
use crate::errors::{Result, SiftError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Text,
    /// Comma-separated with a header line.
    Csv,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub path: PathBuf,
    pub kind: InputKind,
}

#[derive(Debug, Default)]
pub struct InputDiscovery {
    pub files: Vec<InputFile>,
    /// Paths that were found but cannot be read as line input.
    pub skipped: Vec<PathBuf>,
}

fn input_kind(path: &Path) -> Option<InputKind> {
    let extension = path.extension()?.to_string_lossy().to_lowercase();
    match extension.as_str() {
        TEXT_EXTENSION => Some(InputKind::Text),
        CSV_EXTENSION => Some(InputKind::Csv),
        _ => None,
    }
}

fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case(SPREADSHEET_EXTENSION))
}

/// Resolve input arguments into readable files. Directories are walked recursively in name
/// order. Spreadsheets and unknown extensions found in directories are skipped; an explicit
/// file argument is read as text unless it is a spreadsheet.
pub fn discover_input_files(paths: &[PathBuf]) -> Result<InputDiscovery> {
    let mut discovery = InputDiscovery::default();

    for path in paths {
        if !path.exists() {
            return Err(SiftError::InputRead {
                path: path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
            });
        }

        if path.is_file() {
            if is_spreadsheet(path) {
                warn!("Spreadsheet input {} must be converted to csv first, skipping", path.display());
                discovery.skipped.push(path.clone());
                continue;
            }
            discovery.files.push(InputFile {
                path: path.clone(),
                kind: input_kind(path).unwrap_or(InputKind::Text),
            });
            continue;
        }

        for entry in WalkDir::new(path).follow_links(false).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let file_path = entry.path();
            match input_kind(file_path) {
                Some(kind) => discovery.files.push(InputFile {
                    path: file_path.to_path_buf(),
                    kind,
                }),
                None => {
                    if is_spreadsheet(file_path) {
                        warn!(
                            "Spreadsheet input {} must be converted to csv first, skipping",
                            file_path.display()
                        );
                    } else {
                        debug!("Ignoring {}", file_path.display());
                    }
                    discovery.skipped.push(file_path.to_path_buf());
                }
            }
        }
    }

    Ok(discovery)
}

/// Reads an input file in line-aligned chunks of roughly `chunk_size_bytes`. Invalid UTF-8 is
/// replaced rather than rejected, and the header of a CSV input is dropped.
pub struct ChunkReader {
    path: PathBuf,
    reader: BufReader<File>,
    chunk_size_bytes: usize,
    skip_header: bool,
    chunks_read: usize,
    exhausted: bool,
}

impl ChunkReader {
    pub fn open(input: &InputFile, chunk_size_bytes: usize, io_buffer_size: usize) -> Result<Self> {
        let file = File::open(&input.path).map_err(|source| SiftError::InputRead {
            path: input.path.clone(),
            source,
        })?;

        Ok(Self {
            path: input.path.clone(),
            reader: BufReader::with_capacity(io_buffer_size, file),
            chunk_size_bytes: chunk_size_bytes.max(1),
            skip_header: input.kind == InputKind::Csv,
            chunks_read: 0,
            exhausted: false,
        })
    }

    /// Index of the next chunk; 0 until the first chunk is returned.
    pub fn chunks_read(&self) -> usize {
        self.chunks_read
    }

    pub fn next_chunk(&mut self) -> Result<Option<Vec<String>>> {
        if self.exhausted {
            return Ok(None);
        }

        let mut lines = Vec::new();
        let mut size = 0;
        let mut buffer = Vec::new();

        while size < self.chunk_size_bytes {
            buffer.clear();
            let read = self
                .reader
                .read_until(b'\n', &mut buffer)
                .map_err(|source| SiftError::InputRead {
                    path: self.path.clone(),
                    source,
                })?;
            if read == 0 {
                self.exhausted = true;
                break;
            }
            if self.skip_header {
                self.skip_header = false;
                continue;
            }
            size += read;

            let line = String::from_utf8_lossy(&buffer);
            lines.push(line.trim_end_matches(['\n', '\r']).to_string());
        }

        if lines.is_empty() && self.exhausted {
            return Ok(None);
        }
        self.chunks_read += 1;
        Ok(Some(lines))
    }
}
