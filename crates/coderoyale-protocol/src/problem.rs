//! Problem schemas.
//!
//! [`Problem`] is the server's full record, including everything a
//! cheating client must never see (hidden tests, the MCQ answer, hint
//! text, the solution sketch). [`ClientProblemView`] is what actually
//! goes out on the wire — it is built from a `Problem` by stripping
//! those fields, never constructed independently, so the two can never
//! drift apart by accident.

use serde::{Deserialize, Serialize};

use crate::ids::ProblemId;
use crate::enums::{Difficulty, ProblemType};

/// A single test case: input arguments (already formatted for the
/// judge) and expected output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
}

/// The server's authoritative record for one problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub problem_id: ProblemId,
    pub title: String,
    pub difficulty: Difficulty,
    pub problem_type: ProblemType,
    pub prompt: String,
    pub time_limit_ms: u32,
    #[serde(default)]
    pub is_garbage: bool,

    // -- code problems --
    pub function_name: Option<String>,
    pub signature: Option<String>,
    pub starter_code: Option<String>,
    #[serde(default)]
    pub public_tests: Vec<TestCase>,
    #[serde(default)]
    pub hidden_tests: Vec<TestCase>,
    #[serde(default)]
    pub hints: Vec<String>,
    pub solution_sketch: Option<String>,

    // -- mcq problems --
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answer: Option<String>,
}

impl Problem {
    /// Number of hints available for this problem (code problems only).
    pub fn hint_count(&self) -> usize {
        self.hints.len()
    }

    /// Strips server-only fields, producing the view sent to clients.
    pub fn to_client_view(&self) -> ClientProblemView {
        ClientProblemView {
            problem_id: self.problem_id,
            title: self.title.clone(),
            difficulty: self.difficulty,
            problem_type: self.problem_type,
            prompt: self.prompt.clone(),
            time_limit_ms: self.time_limit_ms,
            is_garbage: self.is_garbage,
            function_name: self.function_name.clone(),
            signature: self.signature.clone(),
            starter_code: self.starter_code.clone(),
            public_tests: self.public_tests.clone(),
            hint_count: self.hint_count(),
            options: self.options.clone(),
        }
    }
}

/// What a client is allowed to see about a problem: no hidden tests, no
/// hints text (only a count — revealed hints are sent separately as
/// plain strings once purchased), no solution sketch, no MCQ answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientProblemView {
    pub problem_id: ProblemId,
    pub title: String,
    pub difficulty: Difficulty,
    pub problem_type: ProblemType,
    pub prompt: String,
    pub time_limit_ms: u32,
    pub is_garbage: bool,
    pub function_name: Option<String>,
    pub signature: Option<String>,
    pub starter_code: Option<String>,
    pub public_tests: Vec<TestCase>,
    pub hint_count: usize,
    pub options: Vec<String>,
}

/// The lightweight summary carried in a player's `queued` list — the
/// full view is only needed for the current problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemSummary {
    pub problem_id: ProblemId,
    pub title: String,
    pub difficulty: Difficulty,
    pub is_garbage: bool,
}

impl From<&Problem> for ProblemSummary {
    fn from(p: &Problem) -> Self {
        ProblemSummary {
            problem_id: p.problem_id,
            title: p.title.clone(),
            difficulty: p.difficulty,
            is_garbage: p.is_garbage,
        }
    }
}
