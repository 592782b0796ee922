use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::constants::{OTHER_GROUP, REFERENCE_EXTENSION};
use crate::errors::{Result, SiftError};

/// One leaf file of the reference directory. `group` is its path relative to the reference
/// root, `/`-separated and without a `.txt` extension; it names the output sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub path: PathBuf,
    pub group: String,
}

impl ReferenceEntry {
    pub fn new(root: &Path, path: PathBuf) -> Self {
        let relative = path.strip_prefix(root).unwrap_or(&path);
        let mut parts: Vec<String> = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();

        if let Some(last) = parts.last_mut() {
            let has_reference_ext = Path::new(last.as_str())
                .extension()
                .map_or(false, |ext| ext.eq_ignore_ascii_case(REFERENCE_EXTENSION));
            if has_reference_ext {
                last.truncate(last.len() - REFERENCE_EXTENSION.len() - 1);
            }
        }

        Self {
            group: parts.join("/"),
            path,
        }
    }

    /// Non-empty, trimmed reference lines.
    pub fn load_references(&self) -> std::io::Result<Vec<String>> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut references = Vec::new();
        for line in reader.split(b'\n') {
            let line = line?;
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if !line.is_empty() {
                references.push(line.to_string());
            }
        }
        Ok(references)
    }
}

/// Walk the reference directory and list every leaf file in a stable order. Each leaf needs a
/// sink of its own, so two leaves naming the same group, or a leaf named like the fallback
/// sink, are rejected.
pub fn discover_reference_entries(root: &Path) -> Result<Vec<ReferenceEntry>> {
    if !root.is_dir() {
        return Err(SiftError::MissingReferenceDirectory(root.to_path_buf()));
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if hidden {
            continue;
        }
        entries.push(ReferenceEntry::new(root, entry.into_path()));
    }

    let mut seen: HashMap<&str, &Path> = HashMap::new();
    for entry in &entries {
        if entry.group == OTHER_GROUP {
            return Err(SiftError::Config(format!(
                "reference file {} uses the reserved group name '{}'",
                entry.path.display(),
                OTHER_GROUP
            )));
        }
        if let Some(previous) = seen.insert(entry.group.as_str(), entry.path.as_path()) {
            return Err(SiftError::Config(format!(
                "reference files {} and {} both map to group '{}'",
                previous.display(),
                entry.path.display(),
                entry.group
            )));
        }
    }

    Ok(entries)
}

/// Does `reference` occur in `key` right after an `@` or a `.`?
pub fn key_matches_reference(key: &str, reference: &str) -> bool {
    if reference.is_empty() || !key.contains(reference) {
        return false;
    }
    key.match_indices(reference).any(|(pos, _)| {
        matches!(key[..pos].chars().next_back(), Some('@') | Some('.'))
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub group: String,
    /// Matched keys in reference-line order, each listed once.
    pub keys: Vec<String>,
}

/// Scan one reference file against the key set. Reads only its own file and returns an owned
/// result.
pub fn scan_entry(
    entry: &ReferenceEntry,
    keys: &[String],
    case_insensitive: bool,
) -> Result<ClassificationResult> {
    let references = entry
        .load_references()
        .map_err(|source| SiftError::ReferenceScan {
            path: entry.path.clone(),
            source,
        })?;

    let folded_keys: Option<Vec<String>> =
        case_insensitive.then(|| keys.iter().map(|key| key.to_ascii_lowercase()).collect());

    let mut seen = HashSet::new();
    let mut matched = Vec::new();

    for reference in &references {
        let reference = if case_insensitive {
            reference.to_ascii_lowercase()
        } else {
            reference.clone()
        };

        for (idx, key) in keys.iter().enumerate() {
            let candidate = folded_keys.as_ref().map_or(key.as_str(), |folded| folded[idx].as_str());
            if key_matches_reference(candidate, &reference) && seen.insert(idx) {
                matched.push(key.clone());
            }
        }
    }

    Ok(ClassificationResult {
        group: entry.group.clone(),
        keys: matched,
    })
}

#[derive(Debug)]
pub struct ScanFailure {
    pub group: String,
    pub error: SiftError,
}

/// Everything the workers delivered for one key set, in arrival order.
#[derive(Debug, Default)]
pub struct ClassificationRun {
    pub results: Vec<ClassificationResult>,
    pub failures: Vec<ScanFailure>,
}

pub struct DomainClassifier {
    pool: ThreadPool,
    threads: usize,
    case_insensitive: bool,
}

impl DomainClassifier {
    pub fn new(threads: usize, case_insensitive: bool) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|idx| format!("domain-scan-{}", idx))
            .build()
            .map_err(|e| SiftError::WorkerPool(e.to_string()))?;

        Ok(Self {
            threads: pool.current_num_threads(),
            pool,
            case_insensitive,
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Dispatch one scan per reference entry and block until all of them are done. Results are
    /// collected in the order workers finish, so which entry claims a contested key is up to
    /// scheduling.
    pub fn classify(&self, entries: &[ReferenceEntry], keys: &[String]) -> ClassificationRun {
        let (tx, rx) = mpsc::channel();
        let case_insensitive = self.case_insensitive;

        // The sender moves into the scope and is dropped with it, closing the channel.
        self.pool.scope(move |scope| {
            for entry in entries {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let outcome = scan_entry(entry, keys, case_insensitive);
                    let _ = tx.send((entry, outcome));
                });
            }
        });

        let mut run = ClassificationRun::default();
        for (entry, outcome) in rx {
            match outcome {
                Ok(result) => {
                    info!(
                        "Reference {}: {} matching keys",
                        result.group,
                        result.keys.len()
                    );
                    debug!("Keys in {}: {:?}", result.group, result.keys);
                    run.results.push(result);
                }
                Err(error) => {
                    warn!("Skipping reference {}: {}", entry.group, error);
                    run.failures.push(ScanFailure {
                        group: entry.group.clone(),
                        error,
                    });
                }
            }
        }
        run
    }
}
