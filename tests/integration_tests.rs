use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use domain_sift::core::finalize::{finalize_sinks, FinalizeOptions};
use domain_sift::{
    Config, DomainSifter, FieldKind, KeylessFirstLine, OutputFormat, RunSummary, SiftOutcome,
};

/// Reference tree with nested groups, as the sifter expects it.
fn create_references(temp_dir: &TempDir) -> Result<PathBuf> {
    let refs = temp_dir.path().join("refs");
    fs::create_dir_all(refs.join("Bundeslaender"))?;
    fs::create_dir_all(refs.join("Bund"))?;

    fs::write(refs.join("Bundeslaender/bayern.txt"), "bayern.de\nmuenchen.de\n")?;
    fs::write(refs.join("Bundeslaender/berlin.txt"), "berlin.de\n")?;
    fs::write(refs.join("Bund/ministerien.txt"), "bund.de\n")?;

    Ok(refs)
}

fn create_test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.processing.threads = 2;
    config.processing.chunk_size_mb = 1;
    config.output.results_directory = temp_dir.path().join("results");
    config.finalize.temp_directory = Some(temp_dir.path().to_path_buf());
    config
}

async fn run(config: Config, inputs: Vec<PathBuf>, refs: &Path) -> Result<RunSummary> {
    let sifter = DomainSifter::new(config)?;
    match sifter.run(inputs, refs.to_path_buf()).await? {
        SiftOutcome::Completed(summary) => Ok(summary),
        other => anyhow::bail!("run did not complete: {:?}", other),
    }
}

fn read_sink(results: &Path, group: &str) -> String {
    fs::read_to_string(results.join(format!("{}.txt", group))).unwrap_or_default()
}

#[tokio::test]
async fn test_bayern_scenario() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let refs = create_references(&temp_dir)?;
    let input = temp_dir.path().join("dump.txt");
    fs::write(&input, "alice@bayern.de, secret123, 2023-01-01\nbob@example.com;hunter2\n")?;

    let config = create_test_config(&temp_dir);
    let results = config.output.results_directory.clone();
    let summary = run(config, vec![input], &refs).await?;

    assert_eq!(
        read_sink(&results, "Bundeslaender/bayern"),
        "alice@bayern.de, secret123, 2023-01-01\n"
    );
    let other = read_sink(&results, "other");
    assert!(!other.contains("alice"));
    assert_eq!(other, "bob@example.com, hunter2\n");

    // Empty groups still get their sink.
    assert!(results.join("Bundeslaender/berlin.txt").is_file());
    assert_eq!(read_sink(&results, "Bund/ministerien"), "");

    assert_eq!(summary.files_processed, 1);
    assert_eq!(summary.matched_rows, 1);
    assert_eq!(summary.other_rows, 1);
    assert_eq!(summary.failed_scans, 0);
    assert_eq!(summary.outputs.len(), 4);
    Ok(())
}

#[tokio::test]
async fn test_duplicate_line_written_once_after_finalize() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let refs = create_references(&temp_dir)?;
    let first = temp_dir.path().join("first.txt");
    let second = temp_dir.path().join("second.txt");
    fs::write(&first, "carol@berlin.de:pw1\n")?;
    fs::write(&second, "carol@berlin.de:pw1\n")?;

    let config = create_test_config(&temp_dir);
    let results = config.output.results_directory.clone();
    let summary = run(config, vec![first, second], &refs).await?;

    assert_eq!(read_sink(&results, "Bundeslaender/berlin"), "carol@berlin.de, pw1\n");
    assert_eq!(summary.rows_written, 2);
    assert_eq!(summary.duplicates_removed, 1);
    Ok(())
}

#[tokio::test]
async fn test_every_key_lands_in_exactly_one_sink() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let refs = create_references(&temp_dir)?;
    // A second reference claiming the same domain makes `dora` contested.
    fs::write(refs.join("Bund/laender.txt"), "bayern.de\n")?;

    let input = temp_dir.path().join("dump.txt");
    let keys = [
        "alice@bayern.de",
        "dora@stmi.bayern.de",
        "erik@berlin.de",
        "fritz@bund.de",
        "user@coded.com",
        "nobody@example.org",
    ];
    let lines: Vec<String> = keys.iter().map(|k| format!("{} pw", k)).collect();
    fs::write(&input, lines.join("\n"))?;

    let config = create_test_config(&temp_dir);
    let results = config.output.results_directory.clone();
    let summary = run(config, vec![input], &refs).await?;

    let sinks: Vec<String> = summary
        .outputs
        .iter()
        .map(|path| fs::read_to_string(path).unwrap())
        .collect();
    for key in keys {
        let hits: usize = sinks
            .iter()
            .map(|content| content.lines().filter(|line| line.starts_with(key)).count())
            .sum();
        assert_eq!(hits, 1, "{} appears in {} sinks", key, hits);
    }

    assert!(read_sink(&results, "other").contains("user@coded.com"));
    assert!(summary.contested_keys >= 2);
    Ok(())
}

#[tokio::test]
async fn test_infix_reference_does_not_match() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let refs = temp_dir.path().join("refs");
    fs::create_dir_all(&refs)?;
    fs::write(refs.join("de.txt"), "de\n")?;

    let input = temp_dir.path().join("dump.txt");
    fs::write(&input, "user@coded.com pw\nhans@firma.de pw\n")?;

    let config = create_test_config(&temp_dir);
    let results = config.output.results_directory.clone();
    run(config, vec![input], &refs).await?;

    assert_eq!(read_sink(&results, "de"), "hans@firma.de, pw\n");
    assert_eq!(read_sink(&results, "other"), "user@coded.com, pw\n");
    Ok(())
}

#[tokio::test]
async fn test_finalize_is_idempotent_on_run_output() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let refs = create_references(&temp_dir)?;
    let input = temp_dir.path().join("dump.txt");
    fs::write(
        &input,
        "zed@bayern.de pw\namy@bayern.de pw\nzed@bayern.de pw\nx@y.org pw\n",
    )?;

    let config = create_test_config(&temp_dir);
    let summary = run(config, vec![input], &refs).await?;

    let before: Vec<String> = summary.outputs.iter().map(|p| fs::read_to_string(p).unwrap()).collect();
    let again = finalize_sinks(
        &summary.outputs,
        &FinalizeOptions {
            chunk_size_bytes: 1024,
            io_buffer_size: 4096,
            temp_directory: temp_dir.path().to_path_buf(),
        },
    )?;
    let after: Vec<String> = summary.outputs.iter().map(|p| fs::read_to_string(p).unwrap()).collect();

    assert_eq!(before, after);
    assert_eq!(again.duplicates_removed, 0);
    Ok(())
}

#[tokio::test]
async fn test_tabular_output_merges_and_appends() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let refs = create_references(&temp_dir)?;
    let input = temp_dir.path().join("dump.csv");
    fs::write(
        &input,
        "email,password,ip\nalice@bayern.de,pw1,10.0.0.1\nalice@bayern.de,pw2,10.0.0.1\nbob@example.com,pw3,\n",
    )?;

    let mut config = create_test_config(&temp_dir);
    config.output.format = OutputFormat::Tabular;
    let tabular = config.tabular_path();
    run(config.clone(), vec![input.clone()], &refs).await?;

    let mut reader = csv::Reader::from_path(&tabular)?;
    let rows: Vec<Vec<String>> = reader
        .records()
        .map(|r| r.map(|r| r.iter().map(str::to_string).collect()))
        .collect::<std::result::Result<_, _>>()?;
    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[0],
        vec!["alice@bayern.de", "pw1, pw2", "10.0.0.1", "", "", "", "Bundeslaender/bayern"]
    );
    assert_eq!(rows[1][0], "bob@example.com");
    assert_eq!(rows[1][6], "other");

    // A second run without cleaning appends into the existing partitions.
    let second_input = temp_dir.path().join("more.txt");
    fs::write(&second_input, "erik@muenchen.de pw9\n")?;
    config.output.clean_results = false;
    run(config, vec![second_input], &refs).await?;

    let mut reader = csv::Reader::from_path(&tabular)?;
    let keys: Vec<(String, String)> = reader
        .records()
        .map(|r| r.map(|r| (r[0].to_string(), r[6].to_string())))
        .collect::<std::result::Result<_, _>>()?;
    assert_eq!(
        keys,
        vec![
            ("alice@bayern.de".to_string(), "Bundeslaender/bayern".to_string()),
            ("erik@muenchen.de".to_string(), "Bundeslaender/bayern".to_string()),
            ("bob@example.com".to_string(), "other".to_string()),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_censored_secrets_and_keyless_decision() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let refs = create_references(&temp_dir)?;
    let input = temp_dir.path().join("dump.txt");
    fs::write(&input, "10.0.0.9 orphan\nalice@bayern.de hunter2\n")?;

    let mut config = create_test_config(&temp_dir);
    config.output.censor_secrets = true;
    config.output.retain_keyless_lines = true;

    let sifter = DomainSifter::new(config.clone())?;
    match sifter.run(vec![input.clone()], refs.clone()).await? {
        SiftOutcome::NeedsKeyFieldDecision { line_number, line, .. } => {
            assert_eq!(line_number, 1);
            assert_eq!(line, "10.0.0.9 orphan");
        }
        other => panic!("expected a key field decision, got {:?}", other),
    }

    config.classification.keyless_first_line = KeylessFirstLine::Accept;
    let results = config.output.results_directory.clone();
    let summary = run(config.clone(), vec![input.clone()], &refs).await?;

    assert_eq!(read_sink(&results, "Bundeslaender/bayern"), "alice@bayern.de, hun****\n");
    assert_eq!(read_sink(&results, "other"), "10.0.0.9, orp****\n");
    assert_eq!(summary.keyless_lines, 1);

    // Choosing the address as key instead routes everything to `other`.
    config.classification.key_field = FieldKind::NetworkAddress;
    config.classification.keyless_first_line = KeylessFirstLine::Ask;
    run(config, vec![input], &refs).await?;
    let other = read_sink(&results, "other");
    assert!(other.lines().any(|line| line == "10.0.0.9, orp****"));
    assert!(other.lines().any(|line| line == "ali****, hun****"));
    assert_eq!(read_sink(&results, "Bundeslaender/bayern"), "");
    Ok(())
}

#[tokio::test]
async fn test_reference_named_like_fallback_sink_is_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let refs = temp_dir.path().join("refs");
    fs::create_dir_all(&refs)?;
    fs::write(refs.join("other.txt"), "bayern.de\n")?;

    let input = temp_dir.path().join("dump.txt");
    fs::write(&input, "alice@bayern.de pw\nbob@x.org pw\n")?;

    let config = create_test_config(&temp_dir);
    let results = config.output.results_directory.clone();
    let sifter = DomainSifter::new(config)?;
    let err = sifter.run(vec![input], refs).await.unwrap_err();

    assert!(err.to_string().contains("reserved group name"));
    assert!(!results.exists());
    Ok(())
}
