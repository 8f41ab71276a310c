//! `matchbridge validate` - check a configuration file for errors.
//!
//! Parses and validates the config file, reporting results in either
//! human-readable text or machine-readable JSON format.

use crate::cli::{ValidateArgs, ValidateFormat};
use crate::config::sources::{extension, parse_config_str};
use crate::config::validation;
use crate::error::BridgeError;

pub fn execute(args: &ValidateArgs) -> Result<(), BridgeError> {
    let path = &args.config;

    if !path.exists() {
        return Err(BridgeError::ConfigFileNotFound { path: path.clone() });
    }

    let content = std::fs::read_to_string(path)?;
    let config = parse_config_str(extension(path), &content, &path.display().to_string())?;

    if let Err(errors) = validation::validate(&config) {
        match args.format {
            ValidateFormat::Text => {
                eprintln!("\u{2717} {} has {} errors\n", path.display(), errors.len());
                for error in &errors {
                    eprintln!("{error}");
                }
            }
            ValidateFormat::Json => {
                let json_errors: Vec<serde_json::Value> = errors
                    .iter()
                    .map(|e| {
                        serde_json::json!({
                            "route": e.route,
                            "field": e.field,
                            "message": e.message,
                            "suggestion": e.suggestion,
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::json!({
                        "valid": false,
                        "errors": json_errors,
                    })
                );
            }
        }
        return Err(BridgeError::ConfigValidation { errors });
    }

    match args.format {
        ValidateFormat::Text => {
            println!(
                "\u{2713} {}",
                validation::format_validation_report(&path.display().to_string(), &config)
            );
        }
        ValidateFormat::Json => {
            let routes: Vec<serde_json::Value> = config
                .routes
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "id": r.id(),
                        "source_topics": r.source_topics(),
                        "destination_topic": r.destination_topic,
                        "reference_topics": r.reference_topics(),
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::json!({
                    "valid": true,
                    "routes": routes,
                    "reference_feeds": config.total_feeds(),
                })
            );
        }
    }

    Ok(())
}
