//! A judge adapter that never leaves the process.
//!
//! The real judge is a sandboxed code runner living outside this
//! workspace; wiring a client up to it is out of scope here. This
//! module supplies a deterministic stand-in so a room can be driven
//! end to end without one: it "runs" a submission by comparing the
//! submitted code against each test's expected output as a literal
//! substring, which is enough to exercise the pass/fail and caching
//! paths the room actually depends on.

use std::time::Duration;

use coderoyale_protocol::{JudgeKind, JudgeResultPayload, Problem, PublicTestResult};
use coderoyale_room::{JudgeClient, JudgeError};

/// Judges a submission by checking whether each test's expected
/// output appears verbatim in the submitted code. Sleeps for a short,
/// fixed delay first to stand in for the round-trip a real sandbox
/// would incur.
pub struct StubJudgeClient {
    delay: Duration,
}

impl StubJudgeClient {
    pub fn new() -> Self {
        StubJudgeClient {
            delay: Duration::from_millis(50),
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        StubJudgeClient { delay }
    }
}

impl Default for StubJudgeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl JudgeClient for StubJudgeClient {
    async fn judge(
        &self,
        problem: &Problem,
        code: &str,
        kind: JudgeKind,
    ) -> Result<JudgeResultPayload, JudgeError> {
        tokio::time::sleep(self.delay).await;

        if code.trim().is_empty() {
            return Err(JudgeError::Internal("empty submission".into()));
        }

        let public_tests: Vec<PublicTestResult> = problem
            .public_tests
            .iter()
            .map(|test| {
                let passed = code.contains(test.expected_output.trim());
                PublicTestResult {
                    passed,
                    actual_output: if passed {
                        test.expected_output.clone()
                    } else {
                        "<no match>".to_string()
                    },
                }
            })
            .collect();
        let public_passed = public_tests.iter().all(|t| t.passed);

        let (hidden_tests_passed, hidden_failure_message, passed) = match kind {
            JudgeKind::Run => (None, None, public_passed),
            JudgeKind::Submit => {
                let hidden_passed = problem
                    .hidden_tests
                    .iter()
                    .filter(|test| code.contains(test.expected_output.trim()))
                    .count() as u32;
                let all_hidden_passed = hidden_passed as usize == problem.hidden_tests.len();
                let failure = if public_passed && !all_hidden_passed {
                    Some("a hidden test did not match".to_string())
                } else {
                    None
                };
                (
                    Some(hidden_passed),
                    failure,
                    public_passed && all_hidden_passed,
                )
            }
        };

        Ok(JudgeResultPayload {
            kind,
            problem_id: problem.problem_id,
            passed,
            public_tests,
            runtime_ms: Some(self.delay.as_millis() as u64),
            hidden_tests_passed,
            hidden_failure_message,
        })
    }
}
