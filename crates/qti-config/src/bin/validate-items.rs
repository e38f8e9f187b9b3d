//! Catalog validation CLI tool
//!
//! Validates an item catalog and reports any errors.

use qti_config::ResponseProcessingTemplate;
use qti_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let catalog_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-items [catalog-file]");
            eprintln!();
            eprintln!("Validates a QTI item catalog.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !catalog_path.exists() {
        eprintln!("Error: Catalog file not found: {}", catalog_path.display());
        return ExitCode::from(1);
    }

    match qti_config::load_catalog(&catalog_path) {
        Ok(catalog) => {
            println!("✓ Catalog is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", qti_config::CURRENT_CONFIG_VERSION);
            println!("  Acceptable latency: {}", catalog.session.acceptable_latency);
            println!("  Items: {}", catalog.items.len());

            if !catalog.items.is_empty() {
                println!();
                println!("Items:");
                for item in &catalog.items {
                    let max_time = item
                        .time_limits
                        .max_time
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "none".into());
                    let attempts = match item.control.attempts.max_attempts {
                        0 => "unlimited".to_string(),
                        n => n.to_string(),
                    };
                    let processing = match &item.response_processing {
                        ResponseProcessingTemplate::None => "none".to_string(),
                        ResponseProcessingTemplate::MatchCorrect { response, outcome } => {
                            format!("match_correct({} -> {})", response, outcome)
                        }
                    };
                    println!(
                        "  - {}: max_time={} attempts={} processing={}{}",
                        item.id,
                        max_time,
                        attempts,
                        processing,
                        if item.adaptive { " [adaptive]" } else { "" }
                    );
                }
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Catalog validation failed");
            eprintln!();
            match &e {
                qti_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                qti_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                qti_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                qti_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        qti_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
