//! Phase-ordered execution of parsed drovefiles.

use std::path::{Path, PathBuf};

use colored::Colorize;
use drovefile::{Action, Drovefile, Phase, Request, SubstituteError};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Errors, Result};
use crate::options::{AbortOptions, ExecOptions, RequestOptions};
use crate::requester::{build_http_request, Requester};
use crate::response::Response;
use crate::script::{EngineFactory, ScriptEngine, State};
use crate::waiter::{NoopWaiter, Waiter};

const BANNER_WIDTH: usize = 100;

/// Parses drovefiles and executes them.
///
/// A fresh script engine is created per drovefile run via the factory;
/// the requester is shared across the whole batch.
pub struct Executor {
    engine_factory: EngineFactory,
    requester: Box<dyn Requester>,

    /// Parse everything, execute nothing.
    pub dry: bool,
    /// Never abort on request failures, regardless of per-request
    /// options (except `alwaysAbort`).
    pub no_abort: bool,
    /// Phases to skip wholesale.
    pub skip: Vec<Phase>,
    /// Gate invoked before each dispatch.
    pub waiter: Box<dyn Waiter>,
}

impl Executor {
    pub fn new(engine_factory: EngineFactory, requester: Box<dyn Requester>) -> Self {
        Self {
            engine_factory,
            requester,
            dry: false,
            no_abort: false,
            skip: Vec::new(),
            waiter: Box::new(NoopWaiter),
        }
    }

    /// Executes drovefiles from the given files or directories with
    /// the given initial engine state.
    pub async fn execute(&self, paths: &[PathBuf], initial: State) -> Result<()> {
        if let [path] = paths {
            let meta = std::fs::metadata(path)?;
            if !meta.is_dir() {
                let file = self.parse_file(path)?;
                debug!("executing drovefile ...");
                return self.execute_file(&file, &initial).await;
            }
        }

        self.execute_batch(paths, initial).await
    }

    /// Runs a single parsed drovefile against a fresh engine.
    ///
    /// The teardown phase runs on every exit path; its failures join
    /// the multi-error alongside whatever aborted the earlier phases.
    pub async fn execute_file(&self, file: &Drovefile, initial: &State) -> Result<()> {
        if self.dry {
            warn!("this is a dry run: no requests will be executed");
            return Ok(());
        }

        let mut engine = (self.engine_factory)();
        engine.set_state(initial.clone());

        let mut failures = Errors::default();
        let mut aborted = false;

        if self.is_skipped(Phase::Setup) {
            warn!("skipping setup steps");
        } else {
            for action in &file.setup {
                if self
                    .run_step(action, engine.as_mut(), file, Phase::Setup, &mut failures)
                    .await
                {
                    aborted = true;
                    break;
                }
            }
        }

        if !aborted {
            if self.is_skipped(Phase::Tests) {
                warn!("skipping test steps");
            } else {
                for action in &file.tests {
                    if self
                        .execute_test(action, engine.as_mut(), file, &mut failures)
                        .await
                    {
                        break;
                    }
                }
            }
        }

        self.run_teardown(
            &file.teardown,
            Phase::Teardown,
            engine.as_mut(),
            file,
            &mut failures,
        )
        .await;

        match failures.condense() {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// Runs one test action surrounded by the setup-each and
    /// teardown-each steps. Teardown-each runs even when setup-each or
    /// the test itself aborted. Returns whether the batch aborts.
    async fn execute_test(
        &self,
        action: &Action,
        engine: &mut dyn ScriptEngine,
        file: &Drovefile,
        failures: &mut Errors,
    ) -> bool {
        let mut abort = false;

        if self.is_skipped(Phase::SetupEach) {
            warn!("skipping setup-each steps");
        } else {
            for pre in &file.setup_each {
                if self
                    .run_step(pre, engine, file, Phase::SetupEach, failures)
                    .await
                {
                    abort = true;
                    break;
                }
            }
        }

        if !abort {
            abort = self
                .run_step(action, engine, file, Phase::Tests, failures)
                .await;
        }

        self.run_teardown(
            &file.teardown_each,
            Phase::TeardownEach,
            engine,
            file,
            failures,
        )
        .await;

        abort
    }

    /// Executes one action. Returns whether the failure (if any)
    /// aborts the enclosing phase.
    async fn run_step(
        &self,
        action: &Action,
        engine: &mut dyn ScriptEngine,
        file: &Drovefile,
        phase: Phase,
        failures: &mut Errors,
    ) -> bool {
        let req = match action {
            Action::LogSection(label) => {
                log_section_banner(label);
                return false;
            }
            Action::Request(req) => req,
        };

        match self.execute_request(engine, req, file).await {
            Ok(()) => {
                info!(req = %req, phase = %phase, "step completed");
                false
            }
            Err(err) => {
                let err = err.at_step(file.path.clone(), req.pos_line);
                error!(req = %req, phase = %phase, error = %err, "step failed");
                failures.push(err);
                AbortOptions::from_entries(&req.options).abort_on_error(self.no_abort)
            }
        }
    }

    /// Executes a teardown phase. Aborting failures stop the
    /// remaining steps of the phase, except substitution failures: a
    /// teardown step frequently references state that an aborted test
    /// never produced, and one such step must not take the rest of the
    /// cleanup down with it.
    async fn run_teardown(
        &self,
        actions: &[Action],
        phase: Phase,
        engine: &mut dyn ScriptEngine,
        file: &Drovefile,
        failures: &mut Errors,
    ) {
        if self.is_skipped(phase) {
            warn!("skipping {phase} steps");
            return;
        }

        for action in actions {
            let req = match action {
                Action::LogSection(label) => {
                    log_section_banner(label);
                    continue;
                }
                Action::Request(req) => req,
            };

            match self.execute_request(engine, req, file).await {
                Ok(()) => info!(req = %req, phase = %phase, "step completed"),
                Err(err) => {
                    let err = err.at_step(file.path.clone(), req.pos_line);
                    error!(req = %req, phase = %phase, error = %err, "step failed");
                    let skip_remaining = !err.is_params_parsing()
                        && AbortOptions::from_entries(&req.options).abort_on_error(self.no_abort);
                    failures.push(err);
                    if skip_remaining {
                        break;
                    }
                }
            }
        }
    }

    async fn execute_request(
        &self,
        engine: &mut dyn ScriptEngine,
        req: &Request,
        file: &Drovefile,
    ) -> Result<()> {
        let mut req = req.clone();
        req.merge_defaults(&file.defaults);

        let base_dir = file.path.parent().unwrap_or(Path::new("."));

        req.pre_substitute(&engine.state()).map_err(substitute_err)?;
        let pre_script = req
            .pre_script
            .text(base_dir)
            .map_err(|source| Error::Content {
                what: "pre-script",
                source,
            })?;
        if !pre_script.is_empty() {
            engine.run(&pre_script).map_err(Error::PreScript)?;
        }

        req.substitute(&engine.state()).map_err(substitute_err)?;

        let exec_opts = ExecOptions::from_entries(&req.options);
        if !exec_opts.condition {
            warn!(req = %req, "skipped due to condition");
            return Ok(());
        }
        if !exec_opts.delay.is_zero() {
            info!(req = %req, delay = ?exec_opts.delay, "awaiting delay ...");
            tokio::time::sleep(exec_opts.delay).await;
        }

        self.waiter.wait().await;

        let http_req = build_http_request(&req, base_dir)?;
        let req_opts = RequestOptions::from_entries(&req.options);
        let http_resp = self.requester.do_request(http_req, &req_opts).await?;
        let response = Response::from_http(http_resp).await?;

        let mut state = engine.state();
        state.insert("response".into(), response.to_state_value());
        engine.set_state(state);

        let script = req.script.text(base_dir).map_err(|source| Error::Content {
            what: "script",
            source,
        })?;
        if !script.is_empty() {
            engine.run(&script).map_err(Error::Script)?;
        }

        Ok(())
    }

    async fn execute_batch(&self, paths: &[PathBuf], initial: State) -> Result<()> {
        let mut files = Vec::new();
        let mut batch_errs = Errors::default();
        let mut total = 0usize;

        for path in paths {
            for entry in WalkDir::new(path)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| !(e.file_type().is_dir() && starts_with_underscore(e.path())))
            {
                let entry = entry.map_err(|err| Error::Io(err.into()))?;
                if entry.file_type().is_dir() {
                    continue;
                }
                if starts_with_underscore(entry.path()) {
                    continue;
                }
                let ext = entry.path().extension().and_then(|e| e.to_str());
                if ext != Some(drovefile::FILE_EXTENSION) {
                    continue;
                }

                total += 1;
                match self.parse_file(entry.path()) {
                    Ok(file) => files.push(file),
                    Err(err) => {
                        error!(path = %entry.path().display(), error = %err, "{}", "parsing failed".red().bold());
                        batch_errs.push(err);
                    }
                }
            }
        }

        if total == 0 {
            return Err(Error::NoFiles);
        }

        for file in &files {
            info!(path = %file.path.display(), "{}", "executing batch ...".purple().bold());

            match self.execute_file(file, &initial).await {
                Ok(()) => {
                    info!(path = %file.path.display(), "{}", "batch finished successfully".purple().bold());
                }
                Err(err) => {
                    if let Error::Multi(errs) = &err {
                        for e in &errs.0 {
                            error!("{}", e.to_string().red());
                        }
                    }
                    error!(path = %file.path.display(), "{}", "batch execution failed".red().bold());
                    batch_errs.push(err);
                }
            }
        }

        if batch_errs.is_empty() {
            Ok(())
        } else {
            Err(Error::Batch {
                total,
                failed: batch_errs.len(),
                source: batch_errs,
            })
        }
    }

    fn parse_file(&self, path: &Path) -> Result<Drovefile> {
        debug!(from = %path.display(), "parsing drovefile ...");
        drovefile::load(path).map_err(Error::from)
    }

    fn is_skipped(&self, phase: Phase) -> bool {
        self.skip.contains(&phase)
    }
}

fn substitute_err(err: SubstituteError) -> Error {
    match err {
        SubstituteError::Template(t) => Error::ParamsParsing(t),
        other => Error::Substitute(other),
    }
}

fn starts_with_underscore(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('_'))
        .unwrap_or(false)
}

/// Emits a centered banner for a log-section action.
fn log_section_banner(label: &str) {
    let pad = BANNER_WIDTH.saturating_sub(label.len() + 2);
    let left = pad / 2;
    let right = pad - left;
    info!(
        "{}",
        format!("{} {} {}", "-".repeat(left), label, "-".repeat(right)).purple()
    );
}
