use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use domain_sift::constants::DEFAULT_CONFIG_FILE;
use domain_sift::utils::system::{available_memory_bytes, total_memory_bytes};
use domain_sift::utils::{format_bytes, format_duration, setup_logging};
use domain_sift::{
    Config, DomainSifter, FieldKind, KeylessFirstLine, OutputFormat, RunSummary, SiftOutcome,
};

#[derive(Parser)]
#[command(name = "domain-sift")]
#[command(about = "🧭 Domain Sift - Sort leaked contact records into groups by reference domain lists")]
#[command(version)]
struct Args {
    #[arg(
        required = true,
        num_args = 2..,
        value_name = "[KEY] [FORMAT] INPUT... REFERENCE_DIR",
        help = "Optional key field (email, password, ip, url, phone_number) and output format (txt, csv), then input files or directories and the reference directory"
    )]
    positionals: Vec<String>,

    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, help = "Configuration file")]
    config: PathBuf,

    #[arg(short, long, help = "Results directory (overrides config)")]
    results: Option<PathBuf>,

    #[arg(long, conflicts_with = "no_censor", help = "Mask secrets in the output")]
    censor_secrets: bool,

    #[arg(long, help = "Write secrets unmasked")]
    no_censor: bool,

    #[arg(short, long, help = "Never prompt; accept keyless first lines")]
    yes: bool,

    #[arg(short, long, help = "Verbose output")]
    verbose: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct Invocation {
    key_field: Option<FieldKind>,
    format: Option<OutputFormat>,
    inputs: Vec<PathBuf>,
    reference_dir: PathBuf,
}

/// `[KEY] [FORMAT] INPUT... REFERENCE_DIR`. A leading word only counts as KEY or FORMAT when it
/// parses as one and is not an existing path, and at least one input must remain.
fn parse_positionals(positionals: &[String]) -> Result<Invocation> {
    let Some((reference_dir, rest)) = positionals.split_last() else {
        bail!("missing reference directory");
    };
    let mut rest = rest;

    let mut key_field = None;
    if rest.len() > 1 && !Path::new(&rest[0]).exists() {
        if let Ok(field) = rest[0].parse::<FieldKind>() {
            key_field = Some(field);
            rest = &rest[1..];
        }
    }

    let mut format = None;
    if rest.len() > 1 && !Path::new(&rest[0]).exists() {
        if let Ok(parsed) = rest[0].parse::<OutputFormat>() {
            format = Some(parsed);
            rest = &rest[1..];
        }
    }

    if rest.is_empty() {
        bail!("no input files given");
    }

    Ok(Invocation {
        key_field,
        format,
        inputs: rest.iter().map(PathBuf::from).collect(),
        reference_dir: PathBuf::from(reference_dir),
    })
}

fn prompt(question: &str) -> Result<String> {
    print!("{} ", question);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().to_string())
}

fn ask_censor(default: bool) -> Result<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    let answer = prompt(&format!("🔒 Mask secrets in the output? {}", hint))?;
    Ok(match answer.to_ascii_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    })
}

/// Returns `None` to accept the keyless line, or the key field to use instead.
fn ask_key_field(current: FieldKind, input: &Path, line_number: usize, line: &str) -> Result<Option<FieldKind>> {
    println!("⚠️ Line {} of {} has no {} key:", line_number, input.display(), current);
    println!("   {}", line);
    loop {
        let answer = prompt("❓ [c]ontinue anyway, or enter the key field to use (email, password, ip, url, phone_number):")?;
        match answer.to_ascii_lowercase().as_str() {
            "" | "c" | "continue" => return Ok(None),
            other => match other.parse::<FieldKind>() {
                Ok(field) => return Ok(Some(field)),
                Err(e) => println!("❌ {}", e),
            },
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!("\n🎉 Sifting completed successfully! 🎉");
    println!("=======================================");
    println!("📁 Files processed: {} ({} skipped, {})",
        summary.files_processed,
        summary.files_skipped,
        format_bytes(summary.input_bytes)
    );
    println!("📚 Reference files: {}", summary.reference_entries);
    println!("📦 Chunks: {}", summary.chunks);
    println!("📊 Lines read: {}", summary.lines);
    println!("🔑 Keyed rows: {}", summary.rows);
    println!("✅ Matched rows: {}", summary.matched_rows);
    println!("📥 Other rows: {}", summary.other_rows);
    println!("🔗 Merged duplicate keys: {}", summary.merged_lines);
    println!("❔ Keyless lines: {} ({} written)", summary.keyless_lines, summary.keyless_rows_written);
    println!("🚫 Malformed lines: {}", summary.malformed_lines);
    if summary.contested_keys > 0 {
        println!("⚖️ Keys matching several references: {}", summary.contested_keys);
    }
    if summary.failed_scans > 0 {
        println!("⚠️ Failed reference scans: {}", summary.failed_scans);
    }
    println!("🗑️ Duplicates removed: {}", summary.duplicates_removed);
    println!("📝 Outputs: {}", summary.outputs.len());
    println!("⏱️ Total time: {}", format_duration(summary.elapsed));
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let invocation = parse_positionals(&args.positionals)?;

    let (mut config, created) = Config::load_or_create(&args.config)
        .await
        .with_context(|| format!("failed to load config {}", args.config.display()))?;

    let verbosity = if args.verbose { "verbose".to_string() } else { config.logging.verbosity.clone() };
    setup_logging(&verbosity)?;

    println!("🧭 Domain Sift");
    if created {
        println!("📄 Config file not found, created default: {}", args.config.display());
    }

    if let Some(key_field) = invocation.key_field {
        config.classification.key_field = key_field;
    }
    if let Some(format) = invocation.format {
        config.output.format = format;
    }
    if let Some(results) = &args.results {
        config.output.results_directory = results.clone();
    }

    let interactive = !args.yes && io::stdin().is_terminal();
    if args.yes {
        config.classification.keyless_first_line = KeylessFirstLine::Accept;
    }

    config.output.censor_secrets = if args.censor_secrets {
        true
    } else if args.no_censor {
        false
    } else if interactive {
        ask_censor(config.output.censor_secrets)?
    } else {
        config.output.censor_secrets
    };

    for input in &invocation.inputs {
        println!("🔍 Input: {}", input.display());
    }
    println!("📚 References: {}", invocation.reference_dir.display());
    println!("🔑 Key field: {}", config.classification.key_field);
    println!("📝 Output: {} in {}", config.output.format, config.output.results_directory.display());
    println!("🧠 Memory: {} available of {}",
        format_bytes(available_memory_bytes()),
        format_bytes(total_memory_bytes())
    );

    let start_time = Instant::now();
    let summary = loop {
        let sifter = DomainSifter::new(config.clone())?;
        let outcome = sifter
            .run(invocation.inputs.clone(), invocation.reference_dir.clone())
            .await?;

        match outcome {
            SiftOutcome::Completed(summary) => break summary,
            SiftOutcome::NeedsKeyFieldDecision { input, line_number, line } => {
                if !interactive {
                    bail!(
                        "line {} of {} has no {} key: '{}'. Pass another KEY, or --yes to accept it",
                        line_number,
                        input.display(),
                        config.classification.key_field,
                        line
                    );
                }
                match ask_key_field(config.classification.key_field, &input, line_number, &line)? {
                    Some(field) => config.classification.key_field = field,
                    None => config.classification.keyless_first_line = KeylessFirstLine::Accept,
                }
            }
        }
    };

    info!("Sifting finished in {}", format_duration(start_time.elapsed()));
    print_summary(&summary);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_parse_full_positionals() {
        let invocation =
            parse_positionals(&strings(&["email", ".csv", "dump1.txt", "dump2.txt", "refs"])).unwrap();

        assert_eq!(invocation.key_field, Some(FieldKind::Identifier));
        assert_eq!(invocation.format, Some(OutputFormat::Tabular));
        assert_eq!(invocation.inputs, vec![PathBuf::from("dump1.txt"), PathBuf::from("dump2.txt")]);
        assert_eq!(invocation.reference_dir, PathBuf::from("refs"));
    }

    #[test]
    fn test_parse_inputs_only() {
        let invocation = parse_positionals(&strings(&["dump.txt", "refs"])).unwrap();
        assert_eq!(invocation.key_field, None);
        assert_eq!(invocation.format, None);
        assert_eq!(invocation.inputs, vec![PathBuf::from("dump.txt")]);
    }

    #[test]
    fn test_key_word_alone_is_an_input() {
        let invocation = parse_positionals(&strings(&["ip", "refs"])).unwrap();
        assert_eq!(invocation.key_field, None);
        assert_eq!(invocation.inputs, vec![PathBuf::from("ip")]);

        let invocation = parse_positionals(&strings(&["phone", "txt", "refs"])).unwrap();
        assert_eq!(invocation.key_field, Some(FieldKind::Phone));
        assert_eq!(invocation.format, None);
        assert_eq!(invocation.inputs, vec![PathBuf::from("txt")]);
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["domain-sift", "--yes", "-v", "email", "dump.txt", "refs"]).unwrap();
        assert!(args.yes);
        assert!(args.verbose);
        assert_eq!(args.positionals, strings(&["email", "dump.txt", "refs"]));

        assert!(Args::try_parse_from(["domain-sift", "refs"]).is_err());
        assert!(Args::try_parse_from(["domain-sift", "--censor-secrets", "--no-censor", "a", "b"]).is_err());
    }
}
