//! Judge orchestration: the adapter contract, the fingerprint cache,
//! and in-flight tracking. The actual HTTP round-trip happens on a
//! detached Tokio task spawned by the Room actor — this module only
//! holds the pieces that don't need the actor's own loop to run.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use coderoyale_protocol::{JudgeKind, JudgeResultPayload, PlayerId, Problem, ProblemId};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// What the judge adapter returns on a transport-level or internal
/// failure. A success is a [`JudgeResultPayload`] returned directly.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum JudgeError {
    #[error("judge unavailable")]
    Unavailable { retry_after_ms: Option<u64> },
    #[error("internal judge error: {0}")]
    Internal(String),
}

/// The contract the Room consumes. Implementations perform the actual
/// HTTP round-trip to the external sandbox; this crate only specifies
/// the shape. The Room is generic over this trait rather than storing
/// a trait object, so the method can stay a plain native `async fn`.
pub trait JudgeClient: Send + Sync {
    fn judge(
        &self,
        problem: &Problem,
        code: &str,
        kind: JudgeKind,
    ) -> impl std::future::Future<Output = Result<JudgeResultPayload, JudgeError>> + Send;
}

/// `problem.timeLimitMs + 5s`, the outer timeout past which the Room
/// gives up on a judge call and reports `JUDGE_UNAVAILABLE` to the
/// requester alone.
pub fn outer_timeout(problem: &Problem) -> Duration {
    Duration::from_millis(problem.time_limit_ms as u64) + Duration::from_secs(5)
}

/// `sha256(code)[0..16] + ":" + problemId`.
pub fn fingerprint(code: &str, problem_id: ProblemId) -> String {
    let digest = Sha256::digest(code.as_bytes());
    let hex = hex::encode(digest);
    format!("{}:{}", &hex[..16], problem_id.0)
}

struct CacheEntry {
    result: JudgeResultPayload,
    expires_at: Instant,
}

/// Caches passing judge results for 30s, keyed by fingerprint. Failing
/// results are never cached — a fixed submission should be re-judged
/// immediately rather than waiting out a stale failure.
pub struct ResultCache {
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
}

impl ResultCache {
    pub fn new() -> Self {
        ResultCache {
            ttl: Duration::from_secs(30),
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str, now: Instant) -> Option<&JudgeResultPayload> {
        self.entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| &entry.result)
    }

    /// Stores `result` under `key` only if it passed.
    pub fn insert_if_passing(&mut self, key: String, result: JudgeResultPayload, now: Instant) {
        if result.passed {
            self.entries.insert(
                key,
                CacheEntry {
                    result,
                    expires_at: now + self.ttl,
                },
            );
        }
    }

    /// Drops expired entries; call opportunistically, e.g. on scheduler
    /// wakeups, to bound memory.
    pub fn evict_expired(&mut self, now: Instant) {
        self.entries.retain(|_, entry| entry.expires_at > now);
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Enforces at most one in-flight judge call per (player, problemId).
#[derive(Default)]
pub struct InFlightTracker {
    inflight: std::collections::HashSet<(PlayerId, ProblemId)>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` and marks in-flight if none was already pending
    /// for this (player, problem) pair.
    pub fn try_start(&mut self, player_id: PlayerId, problem_id: ProblemId) -> bool {
        self.inflight.insert((player_id, problem_id))
    }

    pub fn finish(&mut self, player_id: PlayerId, problem_id: ProblemId) {
        self.inflight.remove(&(player_id, problem_id));
    }

    pub fn is_in_flight(&self, player_id: PlayerId, problem_id: ProblemId) -> bool {
        self.inflight.contains(&(player_id, problem_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coderoyale_protocol::PublicTestResult;

    fn payload(passed: bool) -> JudgeResultPayload {
        JudgeResultPayload {
            kind: JudgeKind::Submit,
            problem_id: ProblemId(1),
            passed,
            public_tests: vec![PublicTestResult { passed, actual_output: "x".into() }],
            runtime_ms: Some(5),
            hidden_tests_passed: None,
            hidden_failure_message: None,
        }
    }

    #[test]
    fn test_fingerprint_is_deterministic_and_scoped_to_problem() {
        let a = fingerprint("code", ProblemId(1));
        let b = fingerprint("code", ProblemId(1));
        let c = fingerprint("code", ProblemId(2));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.ends_with(":1"));
    }

    #[test]
    fn test_outer_timeout_adds_five_seconds() {
        let problem = Problem {
            problem_id: ProblemId(1),
            title: "t".into(),
            difficulty: coderoyale_protocol::Difficulty::Easy,
            problem_type: coderoyale_protocol::ProblemType::Code,
            prompt: "p".into(),
            time_limit_ms: 2000,
            is_garbage: false,
            function_name: None,
            signature: None,
            starter_code: None,
            public_tests: vec![],
            hidden_tests: vec![],
            hints: vec![],
            solution_sketch: None,
            options: vec![],
            correct_answer: None,
        };
        assert_eq!(outer_timeout(&problem), Duration::from_secs(7));
    }

    #[test]
    fn test_cache_only_stores_passing_results() {
        let mut cache = ResultCache::new();
        let now = Instant::now();
        cache.insert_if_passing("k1".into(), payload(false), now);
        assert!(cache.get("k1", now).is_none());
        cache.insert_if_passing("k2".into(), payload(true), now);
        assert!(cache.get("k2", now).is_some());
    }

    #[test]
    fn test_cache_entry_expires_after_ttl() {
        let mut cache = ResultCache::new();
        let now = Instant::now();
        cache.insert_if_passing("k".into(), payload(true), now);
        assert!(cache.get("k", now + Duration::from_secs(29)).is_some());
        assert!(cache.get("k", now + Duration::from_secs(31)).is_none());
    }

    #[test]
    fn test_in_flight_tracker_enforces_single_call() {
        let mut tracker = InFlightTracker::new();
        assert!(tracker.try_start(PlayerId(1), ProblemId(1)));
        assert!(!tracker.try_start(PlayerId(1), ProblemId(1)));
        tracker.finish(PlayerId(1), ProblemId(1));
        assert!(tracker.try_start(PlayerId(1), ProblemId(1)));
    }
}
