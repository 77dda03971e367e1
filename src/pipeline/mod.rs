//! Acquire, fingerprint, look up, compile or load, store, execute.
//!
//! One pipeline owns one engine scope and runs requests strictly in order.
//! Failures are reported and folded into the exit status at this boundary;
//! a failing file never stops the files after it.
use std::{collections::VecDeque, str, sync::Arc};

use crate::{
    artifact::CompiledArtifactLoader,
    cache::{CacheKey, CacheStats, CompiledUnit, ScriptCache},
    config::{Encoding, HostConfig},
    console::{Console, StdConsole},
    engine::{EngineError, ScriptEngine, SecurityDomain},
    error::{ExitStatus, HostError},
    fingerprint::ContentDigest,
    report::{ErrorReporter, StderrReporter, render_error},
    session::InteractiveSession,
    source::{ArtifactKind, FsSourceAcquirer, SourceAcquirer, SourceContent, strip_shebang},
};

pub const INLINE_UNIT: &str = "<command>";
pub const ARGUMENTS_GLOBAL: &str = "arguments";

pub struct ExecutionPipeline<E: ScriptEngine> {
    engine: E,
    scope: E::Scope,
    cache: Arc<ScriptCache<E::Unit>>,
    acquirer: Box<dyn SourceAcquirer>,
    console: Box<dyn Console>,
    reporter: Box<dyn ErrorReporter>,
    config: HostConfig,
    status: ExitStatus,
    history: Vec<String>,
    /// Most recently executed last. The cache only holds weak references,
    /// so these are what keep warm entries alive between runs.
    retained: VecDeque<Arc<CompiledUnit<E::Unit>>>,
}

impl<E: ScriptEngine> ExecutionPipeline<E> {
    /// A pipeline reading from the filesystem and the process's standard
    /// streams, with a private cache sized from `config`.
    pub fn new(engine: E, config: HostConfig) -> Result<Self, HostError> {
        config.validate()?;
        let encoding = Encoding::from_label(&config.encoding)?;
        let scope = engine.new_scope();
        Ok(Self {
            engine,
            scope,
            cache: Arc::new(ScriptCache::new(config.cache_capacity)),
            acquirer: Box::new(FsSourceAcquirer::new(encoding)),
            console: Box::new(StdConsole::new()),
            reporter: Box::new(StderrReporter),
            config,
            status: ExitStatus::Success,
            history: Vec::new(),
            retained: VecDeque::new(),
        })
    }

    /// Shares `cache` with other pipelines.
    pub fn with_cache(mut self, cache: Arc<ScriptCache<E::Unit>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_acquirer(mut self, acquirer: impl SourceAcquirer + 'static) -> Self {
        self.acquirer = Box::new(acquirer);
        self
    }

    pub fn with_console(mut self, console: impl Console + 'static) -> Self {
        self.console = Box::new(console);
        self
    }

    pub fn with_reporter(mut self, reporter: impl ErrorReporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn cache(&self) -> &Arc<ScriptCache<E::Unit>> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn exit_status(&self) -> ExitStatus {
        self.status
    }

    /// Units executed successfully by interactive sessions, oldest first.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Exposes trailing command-line arguments to scripts.
    pub fn define_arguments(&mut self, args: &[String]) {
        self.engine
            .define_global_strings(&mut self.scope, ARGUMENTS_GLOBAL, args);
    }

    /// `None` runs an interactive session on the console, `-` reads a
    /// script from the console without prompts, anything else is a file.
    pub fn run(&mut self, path: Option<&str>, domain: Option<&SecurityDomain>) {
        match path {
            None => self.run_interactive(true, domain),
            Some("-") => self.run_interactive(false, domain),
            Some(path) => self.run_file_no_throw(path, domain),
        }
    }

    /// Runs every request in order, then settles asynchronous work: unhandled
    /// rejections are printed and fail the run, and deferred tasks drain.
    pub fn run_batch(&mut self, files: &[Option<String>], domain: Option<&SecurityDomain>) {
        for file in files {
            self.run(file.as_deref(), domain);
        }
        self.report_rejections();
        if let Err(e) = self.engine.run_pending_tasks(&mut self.scope) {
            self.fail(HostError::Engine(e));
        }
        self.report_rejections();
    }

    /// Evaluates a literal snippet. Inline sources are never cached.
    pub fn run_inline(&mut self, source: &str, domain: Option<&SecurityDomain>) {
        log::info!("evaluating {}", INLINE_UNIT);
        let result = self
            .engine
            .compile(source, INLINE_UNIT, 1, domain)
            .and_then(|unit| match unit {
                Some(unit) => self.engine.execute(&unit, &mut self.scope).map(drop),
                None => Ok(()),
            });
        if let Err(e) = result {
            self.fail(HostError::Engine(e));
        }
    }

    pub fn run_file_no_throw(&mut self, path: &str, domain: Option<&SecurityDomain>) {
        if let Err(e) = self.process_file(path, domain) {
            self.fail(e);
        }
    }

    pub fn process_file(
        &mut self,
        path: &str,
        domain: Option<&SecurityDomain>,
    ) -> Result<(), HostError> {
        let kind = ArtifactKind::from_path(path, &self.config.artifact_extension);
        let content = self.acquirer.acquire(path, kind)?;
        let digest = ContentDigest::of_content(&content);
        let key = CacheKey::new(path, self.engine.execution_mode())
            .with_profile(self.engine.compile_profile())
            .in_domain(domain);

        let unit = match self.cache.get(&key, &digest) {
            Some(unit) => unit,
            None => {
                let Some(unit) = self.compile_content(path, kind, &content, domain)? else {
                    log::debug!("{}: nothing to execute", path);
                    return Ok(());
                };
                let unit = Arc::new(CompiledUnit::new(unit));
                self.cache.put(key, digest, &unit);
                unit
            }
        };

        log::info!("running {}", path);
        let result = self.engine.execute(unit.unit(), &mut self.scope);
        self.retain(unit);
        result?;
        Ok(())
    }

    /// Drops every unit this pipeline keeps alive.
    pub fn release_units(&mut self) {
        self.retained.clear();
    }

    fn retain(&mut self, unit: Arc<CompiledUnit<E::Unit>>) {
        if self.config.retained_units == 0 {
            return;
        }
        if let Some(i) = self.retained.iter().position(|u| Arc::ptr_eq(u, &unit)) {
            self.retained.remove(i);
        }
        self.retained.push_back(unit);
        while self.retained.len() > self.config.retained_units {
            self.retained.pop_front();
        }
    }

    fn compile_content(
        &self,
        path: &str,
        kind: ArtifactKind,
        content: &SourceContent,
        domain: Option<&SecurityDomain>,
    ) -> Result<Option<E::Unit>, HostError> {
        match kind {
            ArtifactKind::Binary => CompiledArtifactLoader::new(&self.engine)
                .load(path, Some(content.as_bytes()), domain)
                .map(Some),
            ArtifactKind::Source => {
                let text = match content {
                    SourceContent::Text(text) => text.as_str(),
                    SourceContent::Bytes(bytes) => str::from_utf8(bytes).map_err(|e| {
                        HostError::content_unavailable(path, format!("invalid UTF-8: {}", e))
                    })?,
                };
                let source = strip_shebang(text);
                Ok(self
                    .engine
                    .compile(source.body, path, source.start_line, domain)?)
            }
        }
    }

    fn run_interactive(&mut self, prompted: bool, domain: Option<&SecurityDomain>) {
        let prompts = if prompted {
            self.console
                .println(&self.engine.implementation_version());
            Some(self.config.prompts.clone())
        } else {
            None
        };
        let outcome = InteractiveSession::new(prompts)
            .with_domain(domain.cloned())
            .run(
                &self.engine,
                &mut self.scope,
                self.console.as_mut(),
                self.reporter.as_mut(),
            );
        if !outcome.is_clean() {
            self.status = ExitStatus::RuntimeError;
        }
        self.history.extend(outcome.history);
    }

    fn report_rejections(&mut self) {
        let rejections = self.engine.take_unhandled_rejections(&mut self.scope);
        if rejections.is_empty() {
            return;
        }
        let failure = HostError::PendingAsyncFailure(rejections);
        self.console.println(&render_error(&failure));
        self.status = failure.exit_status();
    }

    fn fail(&mut self, error: HostError) {
        if let HostError::Engine(engine) = &error
            && engine.is_resource_exhaustion()
        {
            log::error!("resource exhaustion: {}", describe(engine));
        }
        self.reporter.report(&error);
        self.status = error.exit_status();
    }
}

fn describe(error: &EngineError) -> String {
    match error.location() {
        Some(location) => format!("{} at {}", error, location),
        None => error.to_string(),
    }
}
