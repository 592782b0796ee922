use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::constants::{SINK_FILE_EXTENSION, TABULAR_COLUMNS, TEMP_FILE_SUFFIX};
use crate::core::aggregator::SinkBatch;
use crate::core::finalize::{finalize_sinks, FinalizeOptions, FinalizeStats};
use crate::core::record::Record;
use crate::errors::{Result, SiftError};

/// Persistence for partitioned rows. A run calls `prepare` once, `write_batches` once per
/// input chunk and `finalize` once at the end.
pub trait SinkWriter: Send {
    /// Create every sink up front so empty groups still leave a file behind.
    fn prepare(&mut self, groups: &[String]) -> Result<()>;

    /// Returns the number of rows written.
    fn write_batches(&mut self, batches: &[SinkBatch]) -> Result<usize>;

    fn finalize(&mut self, options: &FinalizeOptions) -> Result<FinalizeStats>;

    /// Files this writer produced.
    fn outputs(&self) -> Vec<PathBuf>;
}

/// `results/<group>.txt` per reference entry plus `results/other.txt`, one attribute line per row.
pub struct TextSinkWriter {
    results_directory: PathBuf,
    io_buffer_size: usize,
    clean: bool,
    sinks: HashMap<String, PathBuf>,
    order: Vec<String>,
}

impl TextSinkWriter {
    pub fn new(results_directory: impl Into<PathBuf>, io_buffer_size: usize, clean: bool) -> Self {
        Self {
            results_directory: results_directory.into(),
            io_buffer_size,
            clean,
            sinks: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn sink_path(&self, group: &str) -> PathBuf {
        let mut path = self.results_directory.clone();
        for part in group.split('/') {
            path.push(part);
        }
        let mut file_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        file_name.push(".");
        file_name.push(SINK_FILE_EXTENSION);
        path.set_file_name(file_name);
        path
    }

    fn append(&self, path: &Path, batch: &SinkBatch) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::with_capacity(self.io_buffer_size, file);
        for row in &batch.rows {
            writeln!(writer, "{}", row.attribute_line())?;
        }
        writer.flush()
    }
}

impl SinkWriter for TextSinkWriter {
    fn prepare(&mut self, groups: &[String]) -> Result<()> {
        if self.clean && self.results_directory.is_dir() {
            info!("Removing previous results in {}", self.results_directory.display());
            fs::remove_dir_all(&self.results_directory)
                .map_err(|source| SiftError::sink_write(&self.results_directory, source))?;
        }

        for group in groups {
            let path = self.sink_path(group);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|source| SiftError::sink_write(parent, source))?;
            }
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|source| SiftError::sink_write(&path, source))?;
            self.sinks.insert(group.clone(), path);
            self.order.push(group.clone());
        }

        debug!("Prepared {} text sinks in {}", groups.len(), self.results_directory.display());
        Ok(())
    }

    fn write_batches(&mut self, batches: &[SinkBatch]) -> Result<usize> {
        let mut written = 0;
        for batch in batches {
            let path = match self.sinks.get(&batch.group) {
                Some(path) => path.clone(),
                None => {
                    warn!("No prepared sink for group {}, creating it", batch.group);
                    let path = self.sink_path(&batch.group);
                    if let Some(parent) = path.parent() {
                        fs::create_dir_all(parent)
                            .map_err(|source| SiftError::sink_write(parent, source))?;
                    }
                    self.sinks.insert(batch.group.clone(), path.clone());
                    self.order.push(batch.group.clone());
                    path
                }
            };

            self.append(&path, batch)
                .map_err(|source| SiftError::sink_write(&path, source))?;
            written += batch.rows.len();
        }
        Ok(written)
    }

    fn finalize(&mut self, options: &FinalizeOptions) -> Result<FinalizeStats> {
        finalize_sinks(&self.outputs(), options)
    }

    fn outputs(&self) -> Vec<PathBuf> {
        self.order
            .iter()
            .filter_map(|group| self.sinks.get(group).cloned())
            .collect()
    }
}

/// One CSV artifact with a `domain_group` partition column. CSV has no way to append inside a
/// partition, so every batch reads the artifact back, merges the new rows in per partition and
/// rewrites the whole file.
pub struct TabularSinkWriter {
    path: PathBuf,
    clean: bool,
    groups: Vec<String>,
}

impl TabularSinkWriter {
    pub fn new(path: impl Into<PathBuf>, clean: bool) -> Self {
        Self {
            path: path.into(),
            clean,
            groups: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_existing(&self) -> Result<Vec<Record>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut records = Vec::new();
        for (idx, row) in reader.records().enumerate() {
            let row = row?;
            let columns: Vec<String> = row.iter().map(str::to_string).collect();
            match Record::from_columns(&columns) {
                Some(record) => records.push(record),
                None => warn!(
                    "Skipping row {} of {}: expected {} columns, found {}",
                    idx + 2,
                    self.path.display(),
                    TABULAR_COLUMNS.len(),
                    columns.len()
                ),
            }
        }
        Ok(records)
    }

    fn write_all(&self, partitions: &[(String, Vec<Record>)]) -> Result<()> {
        let mut temp_name = self.path.as_os_str().to_owned();
        temp_name.push(TEMP_FILE_SUFFIX);
        let temp_path = PathBuf::from(temp_name);

        {
            let mut writer = csv::Writer::from_path(&temp_path)?;
            writer.write_record(TABULAR_COLUMNS)?;
            for (_, records) in partitions {
                for record in records {
                    writer.write_record(record.to_columns())?;
                }
            }
            writer
                .flush()
                .map_err(|source| SiftError::sink_write(&temp_path, source))?;
        }

        fs::rename(&temp_path, &self.path).map_err(|source| SiftError::sink_write(&self.path, source))
    }
}

impl SinkWriter for TabularSinkWriter {
    fn prepare(&mut self, groups: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| SiftError::sink_write(parent, source))?;
        }
        if self.clean && self.path.exists() {
            info!("Removing previous tabular results {}", self.path.display());
            fs::remove_file(&self.path).map_err(|source| SiftError::sink_write(&self.path, source))?;
        }
        self.groups = groups.to_vec();

        if !self.path.exists() {
            let mut writer = csv::Writer::from_writer(
                File::create(&self.path).map_err(|source| SiftError::sink_write(&self.path, source))?,
            );
            writer.write_record(TABULAR_COLUMNS)?;
            writer
                .flush()
                .map_err(|source| SiftError::sink_write(&self.path, source))?;
        }
        Ok(())
    }

    fn write_batches(&mut self, batches: &[SinkBatch]) -> Result<usize> {
        if batches.is_empty() {
            return Ok(0);
        }

        let mut partitions: Vec<(String, Vec<Record>)> = self
            .groups
            .iter()
            .map(|group| (group.clone(), Vec::new()))
            .collect();
        let mut slots: HashMap<String, usize> = partitions
            .iter()
            .enumerate()
            .map(|(slot, (group, _))| (group.clone(), slot))
            .collect();

        let mut place = |group: &str, record: Record, partitions: &mut Vec<(String, Vec<Record>)>| {
            let slot = *slots.entry(group.to_string()).or_insert_with(|| {
                partitions.push((group.to_string(), Vec::new()));
                partitions.len() - 1
            });
            partitions[slot].1.push(record);
        };

        for record in self.read_existing()? {
            let group = record.domain_group.clone();
            place(&group, record, &mut partitions);
        }

        let mut written = 0;
        for batch in batches {
            for row in &batch.rows {
                place(&batch.group, row.to_record(&batch.group), &mut partitions);
                written += 1;
            }
        }

        self.write_all(&partitions)?;
        debug!("Rewrote {} with {} new rows", self.path.display(), written);
        Ok(written)
    }

    fn finalize(&mut self, _options: &FinalizeOptions) -> Result<FinalizeStats> {
        Ok(FinalizeStats::default())
    }

    fn outputs(&self) -> Vec<PathBuf> {
        vec![self.path.clone()]
    }
}
