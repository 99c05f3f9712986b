//! Model review collection.
//!
//! This module drives each proposal through a model call, validates
//! the structured result, and retries transient failures with a fixed
//! sleep between attempts. Exhausting the attempt budget aborts the
//! whole batch: a silently skipped proposal would poison the merge
//! stage downstream.

pub mod backend;

pub use backend::{AttemptOutcome, ModelBackend, OllamaBackend, OllamaConfig, ReviewPayload};

use crate::models::{ModelReview, PipelineError, Proposal};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Retry behavior for model invocations.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts per proposal (including the first).
    pub max_retries: u32,
    /// Fixed sleep between attempts.
    pub sleep: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 6,
            sleep: Duration::from_secs(20),
        }
    }
}

/// State of the retry loop for one proposal.
#[derive(Debug)]
enum RetryState {
    Attempting { attempt: u32 },
    Succeeded(ReviewPayload),
    Exhausted { attempts: u32, reason: String },
    Aborted { reason: String },
}

/// Drives a batch of proposals through a model backend.
pub struct ReviewRunner<B> {
    backend: B,
    template: String,
    policy: RetryPolicy,
    processed: HashSet<String>,
    show_progress: bool,
}

impl<B: ModelBackend> ReviewRunner<B> {
    pub fn new(backend: B, template: String, policy: RetryPolicy) -> Self {
        Self {
            backend,
            template,
            policy,
            processed: HashSet::new(),
            show_progress: false,
        }
    }

    /// Supply the set of already-processed proposal ids to skip,
    /// typically sourced from a previous run's output table.
    pub fn with_processed(mut self, processed: HashSet<String>) -> Self {
        self.processed = processed;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Review every proposal not in the processed set, strictly
    /// sequentially in table row order.
    ///
    /// Fails fast: the first proposal that exhausts its attempt budget
    /// aborts the batch, and only the reviews accumulated so far exist
    /// in memory at that point.
    pub async fn run(&self, proposals: &[Proposal]) -> Result<Vec<ModelReview>, PipelineError> {
        let mut results = Vec::new();

        let bar = if self.show_progress {
            let bar = ProgressBar::new(proposals.len() as u64);
            bar.set_style(
                ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            Some(bar)
        } else {
            None
        };

        for proposal in proposals {
            if self.processed.contains(&proposal.id) {
                info!("Skipping already processed proposal: {}", proposal.id);
                if let Some(ref bar) = bar {
                    bar.inc(1);
                }
                continue;
            }

            let start = Instant::now();
            info!("Processing proposal: {}", proposal.id);

            let prompt = self.template.replace("{PROPOSAL_INFO}", &proposal.info_block());
            let payload = self.review_with_retry(&prompt, &proposal.id).await?;

            results.push(ModelReview {
                summary: payload.summary,
                comment: payload.comment,
                vote: payload.vote,
                proposal_id: proposal.id.clone(),
            });

            info!(
                "Execution time for proposal {}: {:.2} seconds",
                proposal.id,
                start.elapsed().as_secs_f64()
            );
            if let Some(ref bar) = bar {
                bar.inc(1);
            }
        }

        if let Some(bar) = bar {
            bar.finish_and_clear();
        }

        Ok(results)
    }

    /// Explicit retry state machine: Attempting -> Succeeded |
    /// Attempting(n+1) | Exhausted | Aborted.
    async fn review_with_retry(
        &self,
        prompt: &str,
        proposal_id: &str,
    ) -> Result<ReviewPayload, PipelineError> {
        let mut state = RetryState::Attempting { attempt: 1 };

        loop {
            state = match state {
                RetryState::Attempting { attempt } => {
                    match self.backend.invoke(prompt).await {
                        AttemptOutcome::Success(payload) => RetryState::Succeeded(payload),
                        AttemptOutcome::Retryable(reason) => {
                            error!(
                                "Model invoke failed for proposal {} (Attempt {}/{}): {}",
                                proposal_id, attempt, self.policy.max_retries, reason
                            );
                            if attempt >= self.policy.max_retries {
                                RetryState::Exhausted {
                                    attempts: attempt,
                                    reason,
                                }
                            } else {
                                tokio::time::sleep(self.policy.sleep).await;
                                RetryState::Attempting {
                                    attempt: attempt + 1,
                                }
                            }
                        }
                        AttemptOutcome::Fatal(reason) => {
                            error!(
                                "Model invoke failed fatally for proposal {}: {}",
                                proposal_id, reason
                            );
                            RetryState::Aborted { reason }
                        }
                    }
                }
                RetryState::Succeeded(payload) => return Ok(payload),
                RetryState::Exhausted { attempts, reason } => {
                    return Err(PipelineError::RetriesExhausted {
                        proposal_id: proposal_id.to_string(),
                        attempts,
                        reason,
                    });
                }
                RetryState::Aborted { reason } => {
                    return Err(PipelineError::ModelFailure {
                        proposal_id: proposal_id.to_string(),
                        reason,
                    });
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Vote;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn payload(vote: Vote) -> ReviewPayload {
        ReviewPayload {
            summary: "S".to_string(),
            comment: "C".to_string(),
            vote,
        }
    }

    fn proposal(id: &str) -> Proposal {
        Proposal {
            id: id.to_string(),
            title: "T".to_string(),
            abstract_text: "A".to_string(),
            detailed_description: String::new(),
            outline: String::new(),
            objective: String::new(),
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            sleep: Duration::ZERO,
        }
    }

    /// Replays a scripted sequence of outcomes, then succeeds forever.
    struct ScriptedBackend {
        outcomes: Mutex<Vec<AttemptOutcome>>,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(outcomes: Vec<AttemptOutcome>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ModelBackend for ScriptedBackend {
        async fn invoke(&self, _prompt: &str) -> AttemptOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.is_empty() {
                AttemptOutcome::Success(payload(Vote::PlusOne))
            } else {
                outcomes.remove(0)
            }
        }
    }

    #[tokio::test]
    async fn test_two_failures_then_success_within_budget() {
        let backend = ScriptedBackend::new(vec![
            AttemptOutcome::Retryable("boom".to_string()),
            AttemptOutcome::Retryable("boom".to_string()),
        ]);
        let runner = ReviewRunner::new(backend, "{PROPOSAL_INFO}".to_string(), fast_policy(3));

        let reviews = runner.run(&[proposal("1")]).await.unwrap();

        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].proposal_id, "1");
        assert_eq!(reviews[0].vote, Vote::PlusOne);
        assert_eq!(runner.backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_aborts_after_exact_attempt_count() {
        let backend = ScriptedBackend::new(vec![
            AttemptOutcome::Retryable("down".to_string()),
            AttemptOutcome::Retryable("down".to_string()),
            AttemptOutcome::Retryable("down".to_string()),
        ]);
        let runner = ReviewRunner::new(backend, "{PROPOSAL_INFO}".to_string(), fast_policy(2));

        let err = runner.run(&[proposal("7")]).await.unwrap_err();

        match err {
            PipelineError::RetriesExhausted {
                proposal_id,
                attempts,
                ..
            } => {
                assert_eq!(proposal_id, "7");
                assert_eq!(attempts, 2);
            }
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }
        assert_eq!(runner.backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_fatal_outcome_skips_remaining_attempts() {
        let backend = ScriptedBackend::new(vec![AttemptOutcome::Fatal("no such model".to_string())]);
        let runner = ReviewRunner::new(backend, "{PROPOSAL_INFO}".to_string(), fast_policy(6));

        let err = runner.run(&[proposal("1")]).await.unwrap_err();

        assert!(matches!(err, PipelineError::ModelFailure { .. }));
        assert_eq!(runner.backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_processed_ids_are_skipped() {
        let backend = ScriptedBackend::new(vec![]);
        let processed: HashSet<String> = ["1".to_string()].into_iter().collect();
        let runner = ReviewRunner::new(backend, "{PROPOSAL_INFO}".to_string(), fast_policy(1))
            .with_processed(processed);

        let reviews = runner.run(&[proposal("1"), proposal("2")]).await.unwrap();

        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].proposal_id, "2");
        assert_eq!(runner.backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_prompt_template_substitution() {
        struct CapturingBackend {
            seen: Mutex<Vec<String>>,
        }

        impl ModelBackend for CapturingBackend {
            async fn invoke(&self, prompt: &str) -> AttemptOutcome {
                self.seen.lock().unwrap().push(prompt.to_string());
                AttemptOutcome::Success(payload(Vote::PlusZero))
            }
        }

        let backend = CapturingBackend {
            seen: Mutex::new(Vec::new()),
        };
        let runner = ReviewRunner::new(
            backend,
            "Review this proposal:\n{PROPOSAL_INFO}\nVote now.".to_string(),
            fast_policy(1),
        );

        runner.run(&[proposal("1")]).await.unwrap();

        let seen = runner.backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].starts_with("Review this proposal:"));
        assert!(seen[0].contains("title: T"));
        assert!(!seen[0].contains("{PROPOSAL_INFO}"));
    }
}
