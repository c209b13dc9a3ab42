//! Ordered collections of benchmark cases.

use tracing::{error, info};

use crate::case::BenchmarkCase;
use crate::error::{CaseError, SuiteAborted};
use crate::runner::{run, RunResult};

/// What a suite does when one of its cases fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Stop at the first failing case and return its error.
    #[default]
    Abort,
    /// Record the failure and move on to the next case.
    Continue,
}

/// Receives progress from a running suite.
pub trait Reporter {
    fn suite_started(&mut self, _suite: &str) {}

    /// Called before a case that asked for its own topic.
    fn topic(&mut self, _name: &str) {}

    fn case_finished(&mut self, result: &RunResult);

    fn case_failed(&mut self, _error: &CaseError) {}
}

pub type CaseOutcome = Result<RunResult, CaseError>;

/// Outcomes of every case that ran, in suite order.
#[derive(Debug, Default)]
pub struct SuiteReport {
    pub name: String,
    pub outcomes: Vec<CaseOutcome>,
}

impl SuiteReport {
    pub fn results(&self) -> impl Iterator<Item = &RunResult> {
        self.outcomes.iter().filter_map(|o| o.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseError> {
        self.outcomes.iter().filter_map(|o| o.as_ref().err())
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(Result::is_ok)
    }
}

pub struct Suite<C> {
    name: String,
    cases: Vec<BenchmarkCase<C>>,
    policy: ErrorPolicy,
}

impl<C: Sync> Suite<C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cases: Vec::new(),
            policy: ErrorPolicy::default(),
        }
    }

    pub fn case(mut self, case: BenchmarkCase<C>) -> Self {
        self.cases.push(case);
        self
    }

    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Keep only the cases whose name starts with one of `prefixes`,
    /// compared case-insensitively. An empty filter keeps everything.
    pub fn retain_prefixed(mut self, prefixes: &[String]) -> Self {
        if prefixes.is_empty() {
            return self;
        }
        let prefixes: Vec<String> = prefixes.iter().map(|p| p.to_lowercase()).collect();
        self.cases.retain(|case| {
            let name = case.name().to_lowercase();
            prefixes.iter().any(|p| name.starts_with(p.as_str()))
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Run every case in order against `ctx`.
    ///
    /// A case starts only after the previous case's teardown has returned.
    /// Under [`ErrorPolicy::Abort`] the first failure stops the suite and is
    /// returned along with the cases that already finished; under
    /// [`ErrorPolicy::Continue`] failures are kept in the report and the
    /// remaining cases still run.
    pub fn run(
        self,
        ctx: &mut C,
        reporter: &mut dyn Reporter,
    ) -> Result<SuiteReport, SuiteAborted> {
        let Suite {
            name,
            cases,
            policy,
        } = self;

        info!(suite = %name, cases = cases.len(), ?policy, "starting suite");
        reporter.suite_started(&name);

        let mut report = SuiteReport {
            name,
            outcomes: Vec::with_capacity(cases.len()),
        };
        for case in cases {
            if case.creates_topic() {
                reporter.topic(case.name());
            }
            match run(case, ctx) {
                Ok(result) => {
                    reporter.case_finished(&result);
                    report.outcomes.push(Ok(result));
                }
                Err(err) => {
                    error!(case = err.case(), error = %err, "case failed");
                    reporter.case_failed(&err);
                    if policy == ErrorPolicy::Abort {
                        return Err(SuiteAborted { report, error: err });
                    }
                    report.outcomes.push(Err(err));
                }
            }
        }
        Ok(report)
    }
}
