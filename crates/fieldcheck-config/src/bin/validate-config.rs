//! Config validation CLI tool
//!
//! Validates a fieldcheckd configuration file and reports any errors.

use fieldcheck_api::Role;
use fieldcheck_config::ConfigError;
use fieldcheck_util::{default_config_path, format_distance, format_duration_minutes};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a fieldcheckd configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match fieldcheck_config::load_config(&config_path) {
        Ok(settings) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", fieldcheck_config::CURRENT_CONFIG_VERSION);
            println!(
                "  Auto-checkout after: {} (sweep every {})",
                format_duration_minutes(i64::from(settings.sessions.auto_checkout_hours) * 60),
                format_duration_minutes((settings.sessions.sweep_interval.as_secs() / 60) as i64)
            );
            println!(
                "  Default check-in radius: {}",
                format_distance(f64::from(settings.sessions.default_check_in_radius_meters))
            );

            let providers = settings.users.iter().filter(|u| u.role == Role::Provider).count();
            println!(
                "  Users: {} ({} providers, {} administrators)",
                settings.users.len(),
                providers,
                settings.users.len() - providers
            );

            if !settings.schools.is_empty() {
                println!();
                println!("Schools:");
                for school in &settings.schools {
                    let radius =
                        school.effective_radius(settings.sessions.default_check_in_radius_meters);
                    println!(
                        "  - {}: {} ({:.4}, {:.4}), radius {}",
                        school.id,
                        school.name,
                        school.location.latitude,
                        school.location.longitude,
                        format_distance(f64::from(radius))
                    );
                }
            }

            if !settings.schedules.is_empty() {
                println!();
                println!("Schedules:");
                for slot in &settings.schedules {
                    let length = slot
                        .window()
                        .map(|w| format_duration_minutes(i64::from(w.length_minutes())))
                        .unwrap_or_default();
                    println!(
                        "  - {}: {} at {} on {} {} - {} ({}){}",
                        slot.id,
                        slot.provider_id,
                        slot.school_id,
                        slot.day.display_name(),
                        slot.start.format_12h(),
                        slot.end.format_12h(),
                        length,
                        if slot.is_active { "" } else { " (inactive)" }
                    );
                }
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        fieldcheck_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
