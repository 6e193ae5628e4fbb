use serde::Serialize;

use crate::config::Settings;
use crate::error::PipelineError;
use crate::fact::Fact;
use crate::params::Params;
use crate::runner::{CommandRunner, RunOutcome, split_lines};

/// Everything the hooks of a processor variant may need: the configured
/// paths/binaries and the runner, so an after-hook can invoke a secondary
/// tool through the same seam as the main command.
pub struct Context<'a> {
    pub settings: &'a Settings,
    pub runner: &'a dyn CommandRunner,
}

/// The uniform result record of one processor invocation. A fresh record is
/// built per call; `output` and `errors` are always line sequences, never raw
/// multi-line blobs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessorOutput {
    pub command: Vec<String>,
    pub output: Vec<String>,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    /// Public URL of the cid's workspace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub facts: Vec<Fact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factcount: Option<usize>,
    /// Source file promoted to a canonical name by the after-hook, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promoted: Option<String>,
    /// Set when the harvester exhausted its retry budget, so an empty
    /// `facts` can be told apart from a genuine zero-match run.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub harvest_failed: bool,
}

/// One external tool wrapped into the shared three-phase lifecycle.
///
/// `before` stages inputs or fixes identifiers ahead of command building,
/// `command` turns the parameters into the argument vector, and `after`
/// relocates output files or harvests structured facts. The default hooks do
/// nothing; each variant overrides what its tool needs.
pub trait Processor {
    fn name(&self) -> &'static str;

    fn before(
        &self,
        _ctx: &Context<'_>,
        _params: &mut Params,
        _out: &mut ProcessorOutput,
    ) -> Result<(), PipelineError> {
        Ok(())
    }

    fn command(
        &self,
        ctx: &Context<'_>,
        params: &Params,
        out: &mut ProcessorOutput,
    ) -> Result<Vec<String>, PipelineError>;

    fn after(
        &self,
        _ctx: &Context<'_>,
        _params: &Params,
        _out: &mut ProcessorOutput,
    ) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// Whether the optional hooks run for one invocation.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub run_before: bool,
    pub run_after: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            run_before: true,
            run_after: true,
        }
    }
}

/// Drives processor lifecycles against one settings/runner pair.
pub struct Pipeline<'a> {
    settings: &'a Settings,
    runner: &'a dyn CommandRunner,
}

impl<'a> Pipeline<'a> {
    pub fn new(settings: &'a Settings, runner: &'a dyn CommandRunner) -> Self {
        Self { settings, runner }
    }

    /// Runs one processor to completion. Failures at any phase land in the
    /// output record's `errors`; the caller always gets a record back, never
    /// an error. A failed phase suppresses the phases that depend on its
    /// artifacts: a failed before-hook stops the run, a spawn failure or
    /// timeout skips the after-hook.
    pub fn run(
        &self,
        processor: &dyn Processor,
        mut params: Params,
        options: RunOptions,
    ) -> ProcessorOutput {
        let mut out = ProcessorOutput::default();
        let ctx = Context {
            settings: self.settings,
            runner: self.runner,
        };

        params.strip_control();
        if let Err(err) = params.validate() {
            out.errors.push(err.to_string());
            return out;
        }

        if options.run_before {
            if let Err(err) = processor.before(&ctx, &mut params, &mut out) {
                out.errors.push(err.to_string());
                return out;
            }
        }

        match processor.command(&ctx, &params, &mut out) {
            Ok(command) => out.command = command,
            Err(err) => {
                out.errors.push(err.to_string());
                return out;
            }
        }

        tracing::info!(processor = processor.name(), command = %out.command.join(" "), "running");
        let executed = match ctx.runner.run(&out.command) {
            RunOutcome::Completed {
                stdout,
                stderr,
                code,
            } => {
                out.output = split_lines(&stdout);
                out.errors.extend(split_lines(&stderr));
                if let Some(code) = code.filter(|code| *code != 0) {
                    tracing::debug!(processor = processor.name(), code, "non-zero exit");
                }
                true
            }
            RunOutcome::SpawnFailed { message } => {
                out.errors.push(format!("failed to spawn command: {message}"));
                false
            }
            RunOutcome::TimedOut { limit } => {
                out.errors
                    .push(format!("command timed out after {}s", limit.as_secs()));
                false
            }
        };

        if options.run_after && executed {
            if let Err(err) = processor.after(&ctx, &params, &mut out) {
                out.errors.push(err.to_string());
            }
        }

        out
    }
}
