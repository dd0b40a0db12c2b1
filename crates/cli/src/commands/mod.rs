pub(crate) mod catalog;
pub(crate) mod check_rules;
pub(crate) mod evaluate;

use std::path::Path;
use std::process;

use tokio::runtime::Runtime;

use crate::config::PactConfig;
use crate::seed::{self, Engine, SeedDocument};
use crate::{report_error, OutputFormat};

/// Build the engine, loading the seed from `--seed` or `[seed] path`.
/// Exits the process when the seed cannot be read or is rejected.
pub(crate) fn seeded_engine(
    rt: &Runtime,
    config: &PactConfig,
    seed_path: Option<&Path>,
    output: OutputFormat,
    quiet: bool,
) -> Engine {
    let path = seed_path.or(config.seed.path.as_deref());
    let document = match path.map(SeedDocument::read).transpose() {
        Ok(doc) => doc,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    match rt.block_on(seed::engine(config.executor_settings(), document.as_ref())) {
        Ok(engine) => engine,
        Err(e) => {
            report_error(&format!("seed rejected: {}", e), output, quiet);
            process::exit(1);
        }
    }
}
