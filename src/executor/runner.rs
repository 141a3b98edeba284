//! Run entry point
//!
//! Wires hooks, the result channel, the scheduler and the collector together
//! for one run and writes the report once every worker is done.

use anyhow::{Context, Result};
use std::future::Future;
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tracing::info;

use super::parallel::{ctrl_c, run_pool, RunStatus};
use crate::hooks::{HookChain, OutputStream};
use crate::models::{AggregatedOutcome, RunReport, Suite};
use crate::output::{OutputFormat, ResultFormatter};
use crate::pool::channel::channel;
use crate::pool::{
    Collector, FragmentSender, ProcessSpawner, Scheduler, Spawner, DEFAULT_PROCESS_TIMEOUT,
};
use crate::utils::timer::Timer;

type SpawnerFactory = dyn Fn(FragmentSender) -> Result<Arc<dyn Spawner>> + Send + Sync;

/// Run-wide settings
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Worker processes; zero or less means one per available CPU
    pub processes: i32,
    pub process_timeout: Duration,
    pub format: OutputFormat,
    pub colorize: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            processes: 0,
            process_timeout: DEFAULT_PROCESS_TIMEOUT,
            format: OutputFormat::Table,
            colorize: true,
        }
    }
}

/// Runs suites in worker processes and reports the merged outcome
pub struct SuiteRunner {
    options: RunOptions,
    hooks: HookChain,
    stream: OutputStream,
    spawner: Box<SpawnerFactory>,
}

impl SuiteRunner {
    /// Runner that re-executes the current binary as workers and reports
    /// to stdout
    pub fn new(options: RunOptions) -> Self {
        Self {
            options,
            hooks: HookChain::new(),
            stream: Box::new(std::io::stdout()),
            spawner: Box::new(|sender: FragmentSender| -> Result<Arc<dyn Spawner>> {
                let spawner = ProcessSpawner::current_exe(sender)
                    .context("Failed to locate the worker executable")?;
                Ok(Arc::new(spawner) as Arc<dyn Spawner>)
            }),
        }
    }

    pub fn with_hooks(mut self, hooks: HookChain) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_stream(mut self, stream: OutputStream) -> Self {
        self.stream = stream;
        self
    }

    /// Replace how workers are started
    pub fn with_spawner<F>(mut self, factory: F) -> Self
    where
        F: Fn(FragmentSender) -> Result<Arc<dyn Spawner>> + Send + Sync + 'static,
    {
        self.spawner = Box::new(factory);
        self
    }

    /// Run until done or Ctrl-C
    pub async fn run(&mut self, suites: Vec<Suite>) -> Result<RunReport> {
        self.run_until(suites, ctrl_c()).await
    }

    /// Run until done or `interrupt` resolves
    pub async fn run_until<F>(&mut self, suites: Vec<Suite>, interrupt: F) -> Result<RunReport>
    where
        F: Future<Output = ()>,
    {
        let suites = self.hooks.prepare(suites);
        let placeholder: OutputStream = Box::new(std::io::sink());
        let stream = std::mem::replace(&mut self.stream, placeholder);
        self.stream = self.hooks.set_output_stream(stream);

        let outcome = AggregatedOutcome::shared();
        let (sender, receiver) = channel();

        // Duplicates must fail before any worker exists
        let mut collector = Collector::new(&suites, outcome.clone(), receiver)?;
        let spawner = (self.spawner)(sender)?;
        let mut scheduler = Scheduler::new(self.options.processes, spawner)
            .with_timeout(self.options.process_timeout);

        info!(
            "Running {} suites on {} worker processes",
            suites.len(),
            scheduler.capacity()
        );

        let suite_count = suites.len();
        for suite in suites {
            scheduler.add_task(suite);
        }

        let timer = Timer::start("run");
        let started_at = timer.started_at();
        let status = run_pool(&mut scheduler, &mut collector, interrupt).await?;
        let duration = timer.stop();

        let mut outcome = {
            let mut shared = outcome.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *shared)
        };
        self.hooks.finalize(&mut outcome);

        let report = RunReport {
            started_at,
            duration_ms: duration.as_millis() as u64,
            processes: scheduler.capacity(),
            suites: suite_count,
            interrupted: status == RunStatus::Interrupted,
            outcome,
        };

        let mut formatter = ResultFormatter::new(self.options.format);
        if !self.options.colorize {
            formatter = formatter.no_color();
        }
        formatter
            .write_report(&report, &mut *self.stream)
            .context("Failed to write report")?;

        Ok(report)
    }
}

impl Default for SuiteRunner {
    fn default() -> Self {
        Self::new(RunOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::RunHooks;
    use crate::models::{Identify, TestCase};
    use crate::pool::testing::{all_passed, EchoSpawner};
    use crate::pool::PoolError;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct Capture(SharedBuffer);

    impl RunHooks for Capture {
        fn name(&self) -> &str {
            "capture"
        }

        fn set_output_stream(&self, _stream: OutputStream) -> Result<OutputStream, OutputStream> {
            Ok(Box::new(self.0.clone()))
        }
    }

    /// Writes a heading into whatever stream it is handed
    struct Heading;

    impl RunHooks for Heading {
        fn name(&self) -> &str {
            "heading"
        }

        fn set_output_stream(
            &self,
            mut stream: OutputStream,
        ) -> Result<OutputStream, OutputStream> {
            match stream.write_all(b"# nightly\n") {
                Ok(()) => Ok(stream),
                Err(_) => Err(stream),
            }
        }
    }

    fn options() -> RunOptions {
        RunOptions {
            processes: 2,
            format: OutputFormat::Summary,
            colorize: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_duplicate_fingerprint_spawns_nothing() {
        let suites = vec![
            Suite::new("s").case(TestCase::new("a", ["true"])),
            Suite::new("s").case(TestCase::new("a", ["true"])),
        ];
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();

        let mut runner = SuiteRunner::new(options())
            .with_stream(Box::new(std::io::sink()))
            .with_spawner(move |sender| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(EchoSpawner::passing(sender, "0") as Arc<dyn Spawner>)
            });

        let err = runner
            .run_until(suites, std::future::pending())
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<PoolError>(),
            Some(PoolError::DuplicateFingerprint(_))
        ));
        assert_eq!(built.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_reports_through_hook_stream() {
        let suites = vec![
            Suite::new("api")
                .case(TestCase::new("get", ["true"]))
                .case(TestCase::new("put", ["true"])),
            Suite::new("db").case(TestCase::new("migrate", ["true"])),
        ];
        let buffer = SharedBuffer::default();

        let mut runner = SuiteRunner::new(options())
            .with_hooks(HookChain::new().with(Capture(buffer.clone())))
            .with_spawner(|sender| {
                Ok(EchoSpawner::with(sender, "0", |suite: &Suite| {
                    let mut fragment = all_passed(suite);
                    if suite.name == "db" {
                        fragment.passed.clear();
                        fragment
                            .errors
                            .push((suite.cases[0].fingerprint(), "locked".to_string()));
                    }
                    fragment
                }) as Arc<dyn Spawner>)
            });

        let report = runner
            .run_until(suites, std::future::pending())
            .await
            .unwrap();

        assert_eq!(report.suites, 2);
        assert_eq!(report.processes, 2);
        assert!(!report.interrupted);
        assert_eq!(report.outcome.tests_run, 3);
        assert_eq!(report.outcome.items_completed, 2);
        assert_eq!(report.outcome.errors.len(), 1);
        assert!(!report.is_success());
        assert!(buffer
            .contents()
            .starts_with("2/3 passed (66.7%), 0 failed, 1 errors, 0 skipped"));
    }

    #[tokio::test]
    async fn test_hook_writes_into_configured_stream() {
        let buffer = SharedBuffer::default();
        let mut runner = SuiteRunner::new(options())
            .with_stream(Box::new(buffer.clone()))
            .with_hooks(HookChain::new().with(Heading))
            .with_spawner(|sender| Ok(EchoSpawner::passing(sender, "0") as Arc<dyn Spawner>));

        let suites = vec![Suite::new("api").case(TestCase::new("get", ["true"]))];
        runner
            .run_until(suites, std::future::pending())
            .await
            .unwrap();

        let contents = buffer.contents();
        assert!(
            contents.starts_with("# nightly\n1/1 passed (100.0%)"),
            "{contents}"
        );
    }

    #[tokio::test]
    async fn test_empty_run_succeeds() {
        let mut runner = SuiteRunner::new(options())
            .with_stream(Box::new(std::io::sink()))
            .with_spawner(|sender| Ok(EchoSpawner::passing(sender, "0") as Arc<dyn Spawner>));

        let report = runner
            .run_until(Vec::new(), std::future::pending())
            .await
            .unwrap();

        assert_eq!(report.outcome.tests_run, 0);
        assert!(report.is_success());
    }
}
