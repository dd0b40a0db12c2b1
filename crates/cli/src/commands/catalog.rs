use std::process;

use pact_core::ContractType;
use tokio::runtime::Runtime;

use crate::seed::Engine;
use crate::{report_error, OutputFormat};

pub(crate) fn cmd_catalog(
    rt: &Runtime,
    engine: &Engine,
    contract_type: &str,
    output: OutputFormat,
    quiet: bool,
) {
    let catalog = match contract_type
        .parse::<ContractType>()
        .and_then(|ct| rt.block_on(engine.list_deliverables(ct)))
    {
        Ok(c) => c,
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
            let json = serde_json::to_string_pretty(catalog.as_ref())
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", json);
        }
        OutputFormat::Text => {
            println!(
                "Catalog: {} ({} deliverables)",
                catalog.contract_type,
                catalog.deliverables.len()
            );
            for d in &catalog.deliverables {
                println!();
                println!("  {}. {}  [{}]", d.number, d.title.primary, d.timeline);
                for o in &d.options {
                    match &o.target {
                        Some(t) => println!(
                            "     {}) {}  (baseline {} -> target {})",
                            o.number, o.text.primary, t.baseline, t.target
                        ),
                        None => println!("     {}) {}", o.number, o.text.primary),
                    }
                }
            }
        }
    }
}
