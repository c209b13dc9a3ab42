//! Benchmark case definition.
//!
//! A [`BenchmarkCase`] bundles a named unit of work with its setup and
//! teardown hooks. Building a case never touches the context; hooks run only
//! when the case is handed to [`crate::runner::run`].

use crate::error::BoxError;
use crate::partition::Partition;

/// Setup or teardown hook. Receives exclusive access to the suite context.
pub type Hook<C> = Box<dyn Fn(&mut C) -> Result<(), BoxError> + Send + Sync>;

/// Work executed by every worker over its own partition.
pub type Work<C> = Box<dyn Fn(&C, Partition) -> Result<(), BoxError> + Send + Sync>;

pub struct BenchmarkCase<C> {
    pub(crate) name: String,
    pub(crate) concurrency: usize,
    pub(crate) iterations: u64,
    pub(crate) create_topic: bool,
    pub(crate) before: Option<Hook<C>>,
    pub(crate) after: Option<Hook<C>>,
    pub(crate) work: Work<C>,
}

impl<C> BenchmarkCase<C> {
    /// A single-threaded case with no iterations and no hooks.
    pub fn new<W>(name: impl Into<String>, work: W) -> Self
    where
        W: Fn(&C, Partition) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            concurrency: 1,
            iterations: 0,
            create_topic: false,
            before: None,
            after: None,
            work: Box::new(work),
        }
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn iterations(mut self, iterations: u64) -> Self {
        self.iterations = iterations;
        self
    }

    /// Report this case under its own heading instead of the caller's.
    pub fn create_topic(mut self, create_topic: bool) -> Self {
        self.create_topic = create_topic;
        self
    }

    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut C) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.before = Some(Box::new(hook));
        self
    }

    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut C) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.after = Some(Box::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn concurrency_level(&self) -> usize {
        self.concurrency
    }

    pub fn iteration_count(&self) -> u64 {
        self.iterations
    }

    pub fn creates_topic(&self) -> bool {
        self.create_topic
    }
}

impl<C> std::fmt::Debug for BenchmarkCase<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenchmarkCase")
            .field("name", &self.name)
            .field("concurrency", &self.concurrency)
            .field("iterations", &self.iterations)
            .field("create_topic", &self.create_topic)
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}
