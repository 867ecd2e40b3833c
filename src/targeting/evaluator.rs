//! Concurrent evaluation of targeting groups.
//!
//! A targeting group qualifies its content only if *all* of its predicates evaluate to
//! true. Predicates may be arbitrarily slow (an external predicate can consult remote
//! data), so they are fanned out to a bounded worker pool and a decisive false
//! short-circuits the whole group.

use std::{
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{RequestContext, TargetingGroup};

use super::predicate::{TargetingPredicate, TargetingPredicateResult};

/// Configuration for [`TargetingEvaluator`].
#[derive(Debug, Clone)]
pub struct TargetingEvaluatorConfig {
    /// Bound on how long one group evaluation may take. A group that does not settle
    /// within the deadline resolves as [`GroupDisposition::TimedOut`].
    ///
    /// Defaults to [`TargetingEvaluatorConfig::DEFAULT_TIMEOUT`].
    pub timeout: Duration,
    /// Maximum number of predicate evaluations running concurrently. The pool is
    /// reused across calls; it is sized independently of predicate count so large
    /// targeting groups cannot grow resource usage without bound.
    ///
    /// Defaults to the available parallelism of the host.
    pub workers: usize,
}

impl TargetingEvaluatorConfig {
    /// Default value for [`TargetingEvaluatorConfig::timeout`].
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Create a new `TargetingEvaluatorConfig` using default configuration.
    pub fn new() -> TargetingEvaluatorConfig {
        TargetingEvaluatorConfig::default()
    }

    /// Update the evaluation deadline with `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> TargetingEvaluatorConfig {
        self.timeout = timeout;
        self
    }

    /// Update the worker-pool size with `workers`.
    pub fn with_workers(mut self, workers: usize) -> TargetingEvaluatorConfig {
        self.workers = workers;
        self
    }
}

impl Default for TargetingEvaluatorConfig {
    fn default() -> TargetingEvaluatorConfig {
        TargetingEvaluatorConfig {
            timeout: TargetingEvaluatorConfig::DEFAULT_TIMEOUT,
            workers: std::thread::available_parallelism().map_or(4, NonZeroUsize::get),
        }
    }
}

/// Outcome of evaluating one targeting group against one request context.
///
/// Only [`Eligible`](GroupDisposition::Eligible) satisfies the group. The remaining
/// variants exist so callers can observe *why* a group did not qualify; in particular a
/// timeout must be distinguishable from an ordinary rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupDisposition {
    /// Every predicate evaluated to true (vacuously for an empty group).
    Eligible,
    /// At least one predicate evaluated to false.
    Rejected,
    /// No predicate evaluated to false, but at least one could not decide.
    Undecided,
    /// Evaluation did not settle within the configured deadline.
    TimedOut,
}

impl GroupDisposition {
    /// Returns `true` iff the group qualifies its content for selection.
    pub fn is_eligible(self) -> bool {
        self == GroupDisposition::Eligible
    }
}

/// Evaluates the targeting predicates of a group concurrently against a request
/// context.
///
/// The evaluator owns a bounded worker pool that is reused across calls. A decisive
/// false short-circuits a call: the verdict is returned immediately, queued predicate
/// work is skipped via a shared cancellation flag, and results of evaluations already
/// in flight are discarded. The evaluator keeps no per-call state, so one instance can
/// serve concurrent selection requests.
pub struct TargetingEvaluator {
    /// Vacated only during drop.
    runtime: Option<tokio::runtime::Runtime>,
    timeout: Duration,
}

impl TargetingEvaluator {
    /// Create an evaluator with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the worker pool fails to start.
    pub fn new() -> std::io::Result<TargetingEvaluator> {
        TargetingEvaluator::with_config(TargetingEvaluatorConfig::default())
    }

    /// Create an evaluator with the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the worker pool fails to start.
    pub fn with_config(config: TargetingEvaluatorConfig) -> std::io::Result<TargetingEvaluator> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            // One core thread drives the deadline timer and result collection;
            // predicate work runs on the bounded blocking pool.
            .worker_threads(1)
            .max_blocking_threads(config.workers.max(1))
            .thread_name("targeting-eval")
            .enable_time()
            .build()?;

        Ok(TargetingEvaluator {
            runtime: Some(runtime),
            timeout: config.timeout,
        })
    }

    /// Evaluate a targeting group: `true` iff all of its predicates evaluate to true
    /// against the request context.
    pub fn evaluate(&self, context: &RequestContext, group: &TargetingGroup) -> bool {
        self.disposition(context, group).is_eligible()
    }

    /// Evaluate a targeting group, reporting why it did or did not qualify.
    pub fn disposition(
        &self,
        context: &RequestContext,
        group: &TargetingGroup,
    ) -> GroupDisposition {
        let disposition = self.evaluate_predicates(context, &group.targeting_predicates);
        match disposition {
            GroupDisposition::TimedOut => {
                log::warn!(target: "adselect",
                    targeting_group_id = group.targeting_group_id,
                    timeout_ms = self.timeout.as_millis() as u64;
                    "targeting evaluation did not settle within the deadline");
            }
            _ => {
                log::trace!(target: "adselect",
                    targeting_group_id = group.targeting_group_id,
                    disposition:serde = disposition;
                    "evaluated targeting group");
            }
        }
        disposition
    }

    /// Decide whether all `predicates` evaluate to true for `context`.
    ///
    /// Predicates are evaluated concurrently in unspecified order; an empty collection
    /// is vacuously [`GroupDisposition::Eligible`]. The aggregate verdict is computed
    /// on the calling thread from a per-call result channel, never from state shared
    /// between calls.
    pub fn evaluate_predicates(
        &self,
        context: &RequestContext,
        predicates: &[TargetingPredicate],
    ) -> GroupDisposition {
        if predicates.is_empty() {
            return GroupDisposition::Eligible;
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let context = Arc::new(context.clone());
        let (result_sender, mut results) = mpsc::unbounded_channel();

        for predicate in predicates {
            let predicate = predicate.clone();
            let context = Arc::clone(&context);
            let cancelled = Arc::clone(&cancelled);
            let result_sender = result_sender.clone();
            // Send errors are ignored: once a verdict is known the receiver is gone and
            // late results are discarded.
            let _ = self.runtime().spawn_blocking(move || {
                if cancelled.load(Ordering::Acquire) {
                    return;
                }
                let _ = result_sender.send(predicate.evaluate(&context));
            });
        }
        drop(result_sender);

        let expected = predicates.len();
        let disposition = self.runtime().block_on(async {
            tokio::time::timeout(self.timeout, collect_verdict(&mut results, expected))
                .await
                .unwrap_or(GroupDisposition::TimedOut)
        });

        if !disposition.is_eligible() {
            // Best-effort cancellation: queued evaluations observe the flag and skip;
            // evaluations already running finish late into a closed channel.
            cancelled.store(true, Ordering::Release);
        }

        disposition
    }

    fn runtime(&self) -> &tokio::runtime::Runtime {
        // The slot is only vacated by drop, which cannot race a method call.
        self.runtime
            .as_ref()
            .expect("evaluator runtime is present until drop")
    }
}

impl Drop for TargetingEvaluator {
    fn drop(&mut self) {
        // A predicate that ignores cancellation must not wedge the dropping thread, so
        // the pool is shut down in the background rather than joined.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Aggregate per-predicate results into a group verdict.
///
/// Returns [`GroupDisposition::Rejected`] as soon as any false result arrives, without
/// waiting for outstanding evaluations.
async fn collect_verdict(
    results: &mut mpsc::UnboundedReceiver<TargetingPredicateResult>,
    expected: usize,
) -> GroupDisposition {
    let mut undecided = false;
    let mut received = 0;
    while received < expected {
        match results.recv().await {
            Some(TargetingPredicateResult::False) => return GroupDisposition::Rejected,
            Some(TargetingPredicateResult::Indeterminate) => undecided = true,
            Some(TargetingPredicateResult::True) => {}
            // A worker dropped its sender without reporting a result (the predicate
            // panicked). No verdict was produced, so the group cannot be eligible.
            None => return GroupDisposition::Undecided,
        }
        received += 1;
    }

    if undecided {
        GroupDisposition::Undecided
    } else {
        GroupDisposition::Eligible
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Arc,
        time::{Duration, Instant},
    };

    use super::{GroupDisposition, TargetingEvaluator, TargetingEvaluatorConfig};
    use crate::{
        targeting::{EvaluatePredicate, TargetingPredicate, TargetingPredicateResult},
        RequestContext, TargetingGroup,
    };

    #[derive(Debug)]
    struct Fixed(TargetingPredicateResult);

    impl EvaluatePredicate for Fixed {
        fn evaluate(&self, _context: &RequestContext) -> TargetingPredicateResult {
            self.0
        }
    }

    #[derive(Debug)]
    struct SleepThen(Duration, TargetingPredicateResult);

    impl EvaluatePredicate for SleepThen {
        fn evaluate(&self, _context: &RequestContext) -> TargetingPredicateResult {
            std::thread::sleep(self.0);
            self.1
        }
    }

    fn custom(predicate: impl EvaluatePredicate + 'static) -> TargetingPredicate {
        TargetingPredicate::Custom(Arc::new(predicate))
    }

    fn group(predicates: Vec<TargetingPredicate>) -> TargetingGroup {
        TargetingGroup {
            targeting_group_id: "tg-1".into(),
            content_id: "content-1".into(),
            click_through_rate: 0.42,
            targeting_predicates: predicates,
        }
    }

    fn context() -> RequestContext {
        RequestContext::new("amzn1.account.AEZI3A", "ATVPDKIKX0DER")
    }

    #[test]
    fn empty_group_is_vacuously_eligible() {
        let evaluator = TargetingEvaluator::new().unwrap();
        assert!(evaluator.evaluate(&context(), &group(vec![])));
    }

    #[test]
    fn all_true_predicates_are_eligible() {
        let evaluator = TargetingEvaluator::new().unwrap();
        let group = group(vec![
            TargetingPredicate::Marketplace {
                marketplace_ids: vec!["ATVPDKIKX0DER".into()],
                inverse: false,
            },
            TargetingPredicate::RecognizedCustomer { inverse: false },
            custom(Fixed(TargetingPredicateResult::True)),
        ]);
        assert_eq!(
            evaluator.disposition(&context(), &group),
            GroupDisposition::Eligible
        );
    }

    #[test]
    fn single_false_rejects_group() {
        let evaluator = TargetingEvaluator::new().unwrap();
        let group = group(vec![
            custom(Fixed(TargetingPredicateResult::True)),
            custom(Fixed(TargetingPredicateResult::False)),
            custom(Fixed(TargetingPredicateResult::True)),
        ]);
        assert_eq!(
            evaluator.disposition(&context(), &group),
            GroupDisposition::Rejected
        );
        assert!(!evaluator.evaluate(&context(), &group));
    }

    #[test]
    fn false_short_circuits_slow_predicates() {
        let _ = env_logger::builder().is_test(true).try_init();

        let evaluator =
            TargetingEvaluator::with_config(TargetingEvaluatorConfig::new().with_workers(4))
                .unwrap();
        let group = group(vec![
            custom(SleepThen(
                Duration::from_secs(10),
                TargetingPredicateResult::True,
            )),
            custom(Fixed(TargetingPredicateResult::False)),
        ]);

        let start = Instant::now();
        let disposition = evaluator.disposition(&context(), &group);
        assert_eq!(disposition, GroupDisposition::Rejected);
        // The decisive false must not wait on the sleeper.
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn indeterminate_is_not_eligible() {
        let evaluator = TargetingEvaluator::new().unwrap();
        let group = group(vec![
            custom(Fixed(TargetingPredicateResult::True)),
            custom(Fixed(TargetingPredicateResult::Indeterminate)),
        ]);
        assert_eq!(
            evaluator.disposition(&context(), &group),
            GroupDisposition::Undecided
        );
        assert!(!evaluator.evaluate(&context(), &group));
    }

    #[test]
    fn hanging_predicate_times_out() {
        let _ = env_logger::builder().is_test(true).try_init();

        let evaluator = TargetingEvaluator::with_config(
            TargetingEvaluatorConfig::new().with_timeout(Duration::from_millis(200)),
        )
        .unwrap();
        let group = group(vec![
            custom(Fixed(TargetingPredicateResult::True)),
            custom(SleepThen(
                Duration::from_secs(5),
                TargetingPredicateResult::True,
            )),
        ]);

        let start = Instant::now();
        let disposition = evaluator.disposition(&context(), &group);
        assert_eq!(disposition, GroupDisposition::TimedOut);
        assert!(!disposition.is_eligible());
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn concurrent_groups_evaluate_independently() {
        let evaluator = Arc::new(TargetingEvaluator::new().unwrap());

        let eligible = Arc::new(group(vec![
            custom(Fixed(TargetingPredicateResult::True)),
            custom(Fixed(TargetingPredicateResult::True)),
        ]));
        let rejected = Arc::new(group(vec![
            custom(Fixed(TargetingPredicateResult::True)),
            custom(Fixed(TargetingPredicateResult::False)),
        ]));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let evaluator = Arc::clone(&evaluator);
                let eligible = Arc::clone(&eligible);
                let rejected = Arc::clone(&rejected);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        assert!(evaluator.evaluate(&context(), &eligible));
                        assert!(!evaluator.evaluate(&context(), &rejected));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
