use std::path::Path;
use std::process;

use pact_core::PactError;
use pact_eval::{coverage_gaps, validate_indicator};

use crate::seed::SeedDocument;
use crate::{report_error, OutputFormat};

/// Validate indicator rule sets offline, straight from the seed document.
///
/// Invalid rule sets fail the command. Coverage gaps are reported but are
/// not failures: evaluation inside a gap is refused, never guessed.
pub(crate) fn cmd_check_rules(seed: Option<&Path>, output: OutputFormat, quiet: bool) {
    let Some(path) = seed else {
        report_error(
            "no seed document: pass --seed or set [seed] path",
            output,
            quiet,
        );
        process::exit(1);
    };
    let document = match SeedDocument::read(path) {
        Ok(d) => d,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let mut reports = Vec::new();
    let mut invalid = 0;
    for indicator in &document.indicators {
        let violations = match validate_indicator(indicator) {
            Ok(()) => Vec::new(),
            Err(PactError::Validation(v)) => v,
            Err(other) => {
                report_error(&other.to_string(), output, quiet);
                process::exit(1);
            }
        };
        if !violations.is_empty() {
            invalid += 1;
        }
        let gaps = coverage_gaps(indicator);
        reports.push((indicator, violations, gaps));
    }

    if !quiet {
        match output {
            OutputFormat::Json => {
                let json: Vec<serde_json::Value> = reports
                    .iter()
                    .map(|(indicator, violations, gaps)| {
                        serde_json::json!({
                            "indicator": indicator.id,
                            "contract_type": indicator.contract_type,
                            "valid": violations.is_empty(),
                            "violations": violations,
                            "coverage_gaps": gaps,
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "indicators": json,
                        "invalid": invalid,
                    }))
                    .unwrap_or_default()
                );
            }
            OutputFormat::Text => {
                for (indicator, violations, gaps) in &reports {
                    if violations.is_empty() {
                        println!("{} ({}): ok", indicator.id, indicator.contract_type);
                    } else {
                        println!(
                            "{} ({}): {} violation(s)",
                            indicator.id,
                            indicator.contract_type,
                            violations.len()
                        );
                        for v in violations {
                            println!("  - {}", v);
                        }
                    }
                    for gap in gaps {
                        println!("  warning: no rule covers {} .. {}", gap.from, gap.to);
                    }
                }
                println!();
                println!(
                    "{} indicator(s) checked, {} invalid",
                    reports.len(),
                    invalid
                );
            }
        }
    }

    if invalid > 0 {
        process::exit(1);
    }
}
