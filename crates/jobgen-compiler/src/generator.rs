//! The public entry point.

use jobgen_core::config::{Configuration, GeneratorConfig};
use jobgen_core::job::JobGraph;
use jobgen_core::plan::OptimizedPlan;

use crate::error::CompileError;
use crate::finalize::finalize;
use crate::report::CompileReport;
use crate::traversal::Translator;

/// Compiles optimized plans into job graphs.
///
/// The generator holds only its resource defaults. All per-compilation state
/// lives in a context created by `compile` and dropped when it returns, so
/// one generator can serve any number of compilations.
#[derive(Debug, Clone, Default)]
pub struct JobGraphGenerator {
    config: GeneratorConfig,
}

impl JobGraphGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: GeneratorConfig) -> Result<Self, CompileError> {
        config.validate().map_err(CompileError::Config)?;
        Ok(Self { config })
    }

    /// Read the resource defaults from a configuration blob.
    pub fn from_configuration(config: &Configuration) -> Result<Self, CompileError> {
        Self::with_config(GeneratorConfig::from_configuration(config))
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Translate `plan` into a job graph. Fails atomically: on error no
    /// partial graph is returned.
    pub fn compile(&self, plan: &OptimizedPlan) -> Result<JobGraph, CompileError> {
        self.compile_with_report(plan).map(|(graph, _)| graph)
    }

    /// Like `compile`, also returning where every node was placed and any
    /// non-fatal diagnostics.
    pub fn compile_with_report(&self, plan: &OptimizedPlan) -> Result<(JobGraph, CompileReport), CompileError> {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            job = plan.job_name(),
            nodes = plan.nodes().len(),
            sinks = plan.sinks().len(),
            "compiling plan"
        );

        let mut translator = Translator::new(plan, &self.config);
        plan.accept(&mut translator)?;
        finalize(plan, translator.into_context())
    }
}
