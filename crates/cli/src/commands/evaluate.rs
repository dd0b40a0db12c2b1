use std::process;
use std::str::FromStr;

use rust_decimal::Decimal;
use tokio::runtime::Runtime;

use crate::seed::Engine;
use crate::{report_error, OutputFormat};

pub(crate) fn cmd_evaluate(
    rt: &Runtime,
    engine: &Engine,
    indicator: &str,
    baseline: &str,
    output: OutputFormat,
    quiet: bool,
) {
    let baseline = match Decimal::from_str(baseline.trim()) {
        Ok(b) => b,
        Err(_) => {
            report_error(
                &format!("invalid baseline '{}': expected a decimal number", baseline),
                output,
                quiet,
            );
            process::exit(1);
        }
    };

    let evaluation = match rt.block_on(engine.evaluate_indicator(indicator, baseline)) {
        Ok(e) => e,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&evaluation)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", json);
        }
        OutputFormat::Text => {
            println!("target: {}", evaluation.target);
            println!("{}", evaluation.explanation);
        }
    }
}
