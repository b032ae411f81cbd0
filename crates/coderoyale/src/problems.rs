//! Default problem seed bundled with the server binary.
//!
//! The judge sandbox and the authoring pipeline behind a real problem
//! catalog are out of scope here (see `coderoyale-room`'s
//! [`ProblemLibrary`](coderoyale_room::ProblemLibrary)); this module only
//! supplies enough problems to stand up a room end to end.

use coderoyale_protocol::Problem;

const SEED_JSON: &str = include_str!("../assets/problems.json");

/// Parses the bundled seed set. Panics on malformed JSON — this is
/// fixture data shipped with the binary, not user input.
pub fn seed_problems() -> Vec<Problem> {
    serde_json::from_str(SEED_JSON).expect("bundled problem seed is valid JSON")
}
