use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

use crate::constants::MAX_RELABEL_DEPTH;
use crate::core::patterns::{classify_attribute, classify_token, FieldKind, TokenClass};
use crate::core::record::{censor_secret, Record, Row};
use crate::core::tokenizer::tokenize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelMode {
    /// Tokens are sorted into typed record fields and duplicate keys are merged.
    Labeled,
    /// Tokens are kept as-is with the key swapped to the front; a repeated key replaces the row.
    Raw,
}

/// What to do when the first line of an input carries no key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeylessFirstLine {
    Ask,
    Accept,
}

#[derive(Debug, Clone)]
pub struct LabelerOptions {
    pub key_field: FieldKind,
    pub mode: LabelMode,
    pub censor_secrets: bool,
    pub keyless_first_line: KeylessFirstLine,
}

impl Default for LabelerOptions {
    fn default() -> Self {
        Self {
            key_field: FieldKind::Identifier,
            mode: LabelMode::Raw,
            censor_secrets: false,
            keyless_first_line: KeylessFirstLine::Ask,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LabelStats {
    pub lines: usize,
    pub malformed_lines: usize,
    pub keyless_lines: usize,
    pub merged_lines: usize,
    pub forced_secrets: usize,
}

/// Rows keyed by their key value, in first-seen order.
#[derive(Debug, Default, Clone)]
pub struct LabelSet {
    rows: Vec<Row>,
    index: HashMap<String, usize>,
    keyless: Vec<Vec<String>>,
    stats: LabelStats,
}

impl LabelSet {
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn keys(&self) -> Vec<String> {
        self.rows.iter().map(|row| row.key().to_string()).collect()
    }

    pub fn get(&self, key: &str) -> Option<&Row> {
        self.index.get(key).map(|&slot| &self.rows[slot])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Token lists of lines that never produced a key.
    pub fn keyless_lines(&self) -> &[Vec<String>] {
        &self.keyless
    }

    pub fn stats(&self) -> &LabelStats {
        &self.stats
    }
}

#[derive(Debug, Clone)]
pub enum LabelOutcome {
    Complete(LabelSet),
    /// The first line has no key. The caller decides whether to accept that or pick another
    /// key field, then labels the input again.
    NeedsKeyFieldDecision { line_number: usize, line: String },
}

#[derive(Debug)]
struct Relabel<'a> {
    token: &'a str,
    depth: usize,
}

pub struct Labeler {
    options: LabelerOptions,
}

impl Labeler {
    pub fn new(options: LabelerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LabelerOptions {
        &self.options
    }

    /// Label one chunk of lines. `at_input_start` marks the chunk holding the first line of
    /// the whole input, the only place a keyless line can trigger a key-field decision.
    pub fn label_chunk<I, S>(&self, lines: I, at_input_start: bool) -> LabelOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = LabelSet::default();
        let mut first_line_pending = at_input_start;

        for (line_idx, line) in lines.into_iter().enumerate() {
            let line = line.as_ref();
            set.stats.lines += 1;

            let tokens = tokenize(line);
            if tokens.is_empty() {
                set.stats.malformed_lines += 1;
                continue;
            }

            let keyed = match self.options.mode {
                LabelMode::Labeled => self.label_line(&mut set, &tokens),
                LabelMode::Raw => self.label_raw_line(&mut set, tokens.clone()),
            };

            if !keyed {
                let decide = first_line_pending
                    && set.is_empty()
                    && self.options.keyless_first_line == KeylessFirstLine::Ask;
                if decide {
                    return LabelOutcome::NeedsKeyFieldDecision {
                        line_number: line_idx + 1,
                        line: line.trim_end().to_string(),
                    };
                }
                set.stats.keyless_lines += 1;
                let mut tokens = tokens;
                self.censor_tokens(&mut tokens, None);
                set.keyless.push(tokens);
            }
            first_line_pending = false;
        }

        debug!(
            "Labeled {} lines into {} rows ({} keyless, {} merged)",
            set.stats.lines,
            set.rows.len(),
            set.stats.keyless_lines,
            set.stats.merged_lines
        );

        LabelOutcome::Complete(set)
    }

    /// Returns false when the line holds no key-kind token.
    fn label_line(&self, set: &mut LabelSet, tokens: &[String]) -> bool {
        let mut pending = Record::default();
        let mut merge_slot: Option<usize> = None;
        let mut key_found = false;

        for (i, token) in tokens.iter().enumerate() {
            let class = classify_token(token, self.options.key_field);

            if class == TokenClass::Key && !key_found {
                key_found = true;
                match set.index.get(token.as_str()).copied() {
                    Some(slot) => {
                        set.stats.merged_lines += 1;
                        pending = Record::default();
                        merge_slot = Some(slot);

                        let worklist = tokens[..i]
                            .iter()
                            .map(|token| Relabel { token, depth: 1 })
                            .collect();
                        let record = labeled_record(&mut set.rows[slot]);
                        self.drain_worklist(record, worklist, &mut set.stats);
                    }
                    None => pending.key = token.clone(),
                }
                continue;
            }

            let kind = match class {
                TokenClass::Attribute(kind) => kind,
                TokenClass::Key => classify_attribute(token),
            };
            match merge_slot {
                Some(slot) => self.store(labeled_record(&mut set.rows[slot]), kind, token, true),
                None => self.store(&mut pending, kind, token, false),
            }
        }

        if !key_found {
            return false;
        }

        if merge_slot.is_none() {
            set.index.insert(pending.key.clone(), set.rows.len());
            set.rows.push(Row::Labeled(pending));
        }
        true
    }

    /// Re-label tokens into an existing record. An item that would open a merge of its own
    /// goes back on the list one level deeper, and anything past `MAX_RELABEL_DEPTH` lands in
    /// the secret field.
    fn drain_worklist(
        &self,
        record: &mut Record,
        mut worklist: VecDeque<Relabel<'_>>,
        stats: &mut LabelStats,
    ) {
        while let Some(item) = worklist.pop_front() {
            if item.depth > MAX_RELABEL_DEPTH {
                stats.forced_secrets += 1;
                self.store(record, FieldKind::Secret, item.token, true);
                continue;
            }
            match classify_token(item.token, self.options.key_field) {
                TokenClass::Key => worklist.push_back(Relabel {
                    token: item.token,
                    depth: item.depth + 1,
                }),
                TokenClass::Attribute(kind) => self.store(record, kind, item.token, true),
            }
        }
    }

    /// Values merged into an existing record form a union; values of a fresh record are kept
    /// as they appear on the line.
    fn store(&self, record: &mut Record, kind: FieldKind, token: &str, merging: bool) {
        let censored;
        let value = if kind == FieldKind::Secret && self.options.censor_secrets {
            censored = censor_secret(token);
            censored.as_str()
        } else {
            token
        };
        if merging {
            record.merge_attribute(kind, value);
        } else {
            record.push_attribute(kind, value);
        }
    }

    fn label_raw_line(&self, set: &mut LabelSet, mut tokens: Vec<String>) -> bool {
        let key_field = self.options.key_field;
        let Some(key_pos) = tokens.iter().position(|token| key_field.matches(token)) else {
            return false;
        };

        self.censor_tokens(&mut tokens, Some(key_pos));
        tokens.swap(0, key_pos);

        match set.index.get(tokens[0].as_str()).copied() {
            Some(slot) => {
                set.stats.merged_lines += 1;
                set.rows[slot] = Row::Raw(tokens);
            }
            None => {
                set.index.insert(tokens[0].clone(), set.rows.len());
                set.rows.push(Row::Raw(tokens));
            }
        }
        true
    }

    /// Mask every secret-looking token except the one at `keep`.
    fn censor_tokens(&self, tokens: &mut [String], keep: Option<usize>) {
        if !self.options.censor_secrets {
            return;
        }
        for (i, token) in tokens.iter_mut().enumerate() {
            if Some(i) != keep && classify_attribute(token) == FieldKind::Secret {
                *token = censor_secret(token);
            }
        }
    }
}

fn labeled_record(row: &mut Row) -> &mut Record {
    match row {
        Row::Labeled(record) => record,
        Row::Raw(_) => unreachable!("labeled mode only stores labeled rows"),
    }
}
