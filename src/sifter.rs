use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::{Config, OutputFormat};
use crate::constants::OTHER_GROUP;
use crate::core::aggregator::{Aggregator, Assignment, PartitionStats};
use crate::core::classifier::{discover_reference_entries, DomainClassifier, ReferenceEntry};
use crate::core::finalize::FinalizeOptions;
use crate::core::labeler::{KeylessFirstLine, LabelOutcome, LabelStats, Labeler, LabelerOptions};
use crate::core::patterns::FieldKind;
use crate::core::sink::{SinkWriter, TabularSinkWriter, TextSinkWriter};
use crate::core::tokenizer::tokenize;
use crate::errors::{Result, SiftError};
use crate::utils::io::{discover_input_files, ChunkReader, InputFile};
use crate::utils::format_bytes;

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub files_processed: usize,
    pub files_skipped: usize,
    pub input_bytes: u64,
    pub reference_entries: usize,
    pub chunks: usize,
    pub lines: usize,
    pub rows: usize,
    pub matched_rows: usize,
    pub other_rows: usize,
    pub malformed_lines: usize,
    pub keyless_lines: usize,
    pub keyless_rows_written: usize,
    pub merged_lines: usize,
    pub forced_secrets: usize,
    pub contested_keys: usize,
    pub failed_scans: usize,
    pub rows_written: usize,
    pub duplicates_removed: usize,
    pub outputs: Vec<PathBuf>,
    pub elapsed: Duration,
}

impl RunSummary {
    fn record_chunk(
        &mut self,
        rows: usize,
        stats: &LabelStats,
        assignment: &Assignment,
        partition: &PartitionStats,
        written: usize,
    ) {
        self.chunks += 1;
        self.lines += stats.lines;
        self.rows += rows;
        self.malformed_lines += stats.malformed_lines;
        self.keyless_lines += stats.keyless_lines;
        self.merged_lines += stats.merged_lines;
        self.forced_secrets += stats.forced_secrets;
        self.matched_rows += partition.matched_rows;
        self.other_rows += partition.other_rows;
        self.keyless_rows_written += partition.keyless_rows;
        self.contested_keys += assignment.contested_keys();
        self.failed_scans += assignment.failed_scans();
        self.rows_written += written;
    }
}

#[derive(Debug, Clone)]
pub enum SiftOutcome {
    Completed(RunSummary),
    /// The first line of `input` has no key. Nothing has been written; rerun with
    /// `KeylessFirstLine::Accept` or another key field.
    NeedsKeyFieldDecision {
        input: PathBuf,
        line_number: usize,
        line: String,
    },
}

pub struct DomainSifter {
    config: Config,
}

impl DomainSifter {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the whole pipeline on a blocking thread.
    pub async fn run(&self, inputs: Vec<PathBuf>, reference_dir: PathBuf) -> Result<SiftOutcome> {
        let sifter = DomainSifter {
            config: self.config.clone(),
        };
        tokio::task::spawn_blocking(move || sifter.run_blocking(&inputs, &reference_dir))
            .await
            .map_err(|e| SiftError::WorkerPool(format!("sift task failed: {}", e)))?
    }

    pub fn run_blocking(&self, inputs: &[PathBuf], reference_dir: &Path) -> Result<SiftOutcome> {
        let start = Instant::now();
        let config = &self.config;

        let entries = discover_reference_entries(reference_dir)?;
        info!("Found {} reference files in {}", entries.len(), reference_dir.display());

        let discovery = discover_input_files(inputs)?;
        let input_bytes: u64 = discovery
            .files
            .iter()
            .filter_map(|f| fs::metadata(&f.path).ok())
            .map(|m| m.len())
            .sum();
        info!(
            "Found {} input files ({}), {} skipped",
            discovery.files.len(),
            format_bytes(input_bytes),
            discovery.skipped.len()
        );

        let labeler = Labeler::new(LabelerOptions {
            key_field: config.classification.key_field,
            mode: config.label_mode(),
            censor_secrets: config.output.censor_secrets,
            keyless_first_line: config.classification.keyless_first_line,
        });

        if config.classification.keyless_first_line == KeylessFirstLine::Ask {
            for input in &discovery.files {
                if let Some(decision) = self.probe_first_line(&labeler, input)? {
                    return Ok(decision);
                }
            }
        }

        let classifier = self.build_classifier(&entries)?;
        let mut aggregator = Aggregator::new(&entries, config.output.retain_keyless_lines);

        let mut sink: Box<dyn SinkWriter> = match config.output.format {
            OutputFormat::Text => Box::new(TextSinkWriter::new(
                &config.output.results_directory,
                config.io_buffer_size_bytes(),
                config.output.clean_results,
            )),
            OutputFormat::Tabular => Box::new(TabularSinkWriter::new(
                config.tabular_path(),
                config.output.clean_results,
            )),
        };
        sink.prepare(&aggregator.sink_groups())?;

        let mut summary = RunSummary {
            files_skipped: discovery.skipped.len(),
            input_bytes,
            reference_entries: entries.len(),
            ..Default::default()
        };

        let chunk_size = config.chunk_size_bytes();
        debug!("Reading input in chunks of {}", format_bytes(chunk_size as u64));

        for input in &discovery.files {
            let mut reader = ChunkReader::open(input, chunk_size, config.io_buffer_size_bytes())?;

            while let Some(lines) = reader.next_chunk()? {
                let at_input_start = reader.chunks_read() == 1;
                let set = match labeler.label_chunk(&lines, at_input_start) {
                    LabelOutcome::Complete(set) => set,
                    LabelOutcome::NeedsKeyFieldDecision { line_number, line } => {
                        return Ok(SiftOutcome::NeedsKeyFieldDecision {
                            input: input.path.clone(),
                            line_number,
                            line,
                        });
                    }
                };

                let assignment = match &classifier {
                    Some(classifier) => aggregator.fold(classifier.classify(&entries, &set.keys())),
                    None => Assignment::default(),
                };
                let (batches, partition) = aggregator.partition(&set, &assignment);
                let written = sink.write_batches(&batches)?;

                info!(
                    "{} chunk {}: {} rows, {} matched, {} to {}",
                    input.path.display(),
                    reader.chunks_read(),
                    set.len(),
                    partition.matched_rows,
                    partition.other_rows,
                    OTHER_GROUP
                );
                summary.record_chunk(set.len(), set.stats(), &assignment, &partition, written);
            }

            summary.files_processed += 1;
        }

        let finalized = sink.finalize(&FinalizeOptions {
            chunk_size_bytes: config.finalize_chunk_size_bytes(),
            io_buffer_size: config.io_buffer_size_bytes(),
            temp_directory: config.finalize_temp_directory(),
        })?;

        summary.duplicates_removed = finalized.duplicates_removed;
        summary.outputs = sink.outputs();
        summary.elapsed = start.elapsed();

        if summary.failed_scans > 0 {
            warn!(
                "{} reference scans failed; their groups are missing matches from those chunks",
                summary.failed_scans
            );
        }

        Ok(SiftOutcome::Completed(summary))
    }

    fn build_classifier(&self, entries: &[ReferenceEntry]) -> Result<Option<DomainClassifier>> {
        let config = &self.config;
        if config.classification.key_field != FieldKind::Identifier {
            info!(
                "Key field is {}; domain matching only applies to email keys, every row goes to {}",
                config.classification.key_field, OTHER_GROUP
            );
            return Ok(None);
        }
        if entries.is_empty() {
            warn!("Reference directory holds no files; every row goes to {}", OTHER_GROUP);
            return Ok(None);
        }

        let classifier = DomainClassifier::new(config.threads(), config.classification.case_insensitive)?;
        debug!("Scanning references with {} workers", classifier.threads());
        Ok(Some(classifier))
    }

    /// Label the first tokenizable line of `input` on its own to see whether it carries a key.
    fn probe_first_line(&self, labeler: &Labeler, input: &InputFile) -> Result<Option<SiftOutcome>> {
        let mut reader = ChunkReader::open(input, 1, self.config.io_buffer_size_bytes())?;
        let mut line_number = 0;

        while let Some(lines) = reader.next_chunk()? {
            for line in lines {
                line_number += 1;
                if tokenize(&line).is_empty() {
                    continue;
                }
                return Ok(match labeler.label_chunk([line.as_str()], true) {
                    LabelOutcome::Complete(_) => None,
                    LabelOutcome::NeedsKeyFieldDecision { line, .. } => {
                        Some(SiftOutcome::NeedsKeyFieldDecision {
                            input: input.path.clone(),
                            line_number,
                            line,
                        })
                    }
                });
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config_for(results: &Path) -> Config {
        let mut config = Config::default();
        config.processing.threads = 2;
        config.output.results_directory = results.to_path_buf();
        config.finalize.temp_directory = Some(results.parent().unwrap().to_path_buf());
        config
    }

    #[test]
    fn test_keyless_first_line_stops_before_writing() {
        let dir = tempdir().unwrap();
        let refs = dir.path().join("refs");
        fs::create_dir_all(&refs).unwrap();
        fs::write(refs.join("bayern.txt"), "bayern.de\n").unwrap();
        let input = dir.path().join("dump.txt");
        fs::write(&input, "\n10.0.0.1 pw\nalice@bayern.de pw\n").unwrap();
        let results = dir.path().join("results");

        let sifter = DomainSifter::new(config_for(&results)).unwrap();
        match sifter.run_blocking(&[input.clone()], &refs).unwrap() {
            SiftOutcome::NeedsKeyFieldDecision { input: path, line_number, line } => {
                assert_eq!(path, input);
                assert_eq!(line_number, 2);
                assert_eq!(line, "10.0.0.1 pw");
            }
            other => panic!("expected decision request, got {:?}", other),
        }
        assert!(!results.exists());
    }

    #[test]
    fn test_non_identifier_key_sends_everything_to_other() {
        let dir = tempdir().unwrap();
        let refs = dir.path().join("refs");
        fs::create_dir_all(&refs).unwrap();
        fs::write(refs.join("bayern.txt"), "bayern.de\n").unwrap();
        let input = dir.path().join("dump.txt");
        fs::write(&input, "10.0.0.1 alice@bayern.de pw\n").unwrap();
        let results = dir.path().join("results");

        let mut config = config_for(&results);
        config.classification.key_field = FieldKind::NetworkAddress;
        let sifter = DomainSifter::new(config).unwrap();

        let summary = match sifter.run_blocking(&[input], &refs).unwrap() {
            SiftOutcome::Completed(summary) => summary,
            other => panic!("expected completion, got {:?}", other),
        };

        assert_eq!(summary.other_rows, 1);
        assert_eq!(summary.matched_rows, 0);
        assert_eq!(fs::read_to_string(results.join("bayern.txt")).unwrap(), "");
        assert_eq!(
            fs::read_to_string(results.join("other.txt")).unwrap(),
            "10.0.0.1, alice@bayern.de, pw\n"
        );
    }
}
