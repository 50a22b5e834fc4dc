use std::{fs, path::Path};

use anyhow::{Context, Result};
use tracing::info;

use crate::{config::Config, rewrite::transform, splice::Splicer};

#[derive(Debug)]
pub struct Converter {
    // The fuzzer trace to convert.
    trace_file: String,
    // The test file name inside the target folder.
    test_file: String,
    // Inserts the generated test function.
    splicer: Splicer,
}

impl Converter {
    pub fn new(cfg: &Config) -> Result<Self> {
        let splicer = Splicer::new(&cfg.trace.fn_prefix, cfg.trace.strategy)?;

        Ok(Self {
            trace_file: cfg.trace.trace_file.clone(),
            test_file: cfg.trace.test_file.clone(),
            splicer,
        })
    }

    pub fn with_trace_file(mut self, trace_file: &str) -> Self {
        self.trace_file = trace_file.to_string();
        self
    }

    /// Convert the trace into a new test function of `<folder>/<test_file>`.
    /// Return (output_path, fn_name)
    pub fn gen(&self, folder: &str) -> Result<(String, String)> {
        info!("🔥 Start converting: {}", self.trace_file);
        let trace = fs::read_to_string(&self.trace_file)
            .with_context(|| format!("failed to read trace {}", self.trace_file))?;

        let block = transform(&trace);
        info!("Generated statements:\n{}", block);

        let output_path = Path::new(folder).join(&self.test_file);
        let fn_name = self.splicer.splice_file(&output_path, &block)?;

        Ok((output_path.display().to_string(), fn_name))
    }
}
