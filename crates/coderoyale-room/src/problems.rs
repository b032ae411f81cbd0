//! Problem library: shared immutable problem data, loaded once, dealt
//! to players without repeats (until the pool is exhausted) and
//! weighted by the match's difficulty profile.

use std::collections::HashSet;

use coderoyale_protocol::{Difficulty, DifficultyProfile, Problem, ProblemId};
use rand::Rng;

/// The full set of problems available to every Room in the
/// deployment. Immutable after construction.
pub struct ProblemLibrary {
    problems: Vec<Problem>,
}

impl ProblemLibrary {
    pub fn new(problems: Vec<Problem>) -> Self {
        ProblemLibrary { problems }
    }

    pub fn get(&self, id: ProblemId) -> Option<&Problem> {
        self.problems.iter().find(|p| p.problem_id == id)
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    /// Samples a non-garbage problem for `seen`, weighted by `profile`.
    /// Resets and refills `seen` if the candidate pool is exhausted.
    /// Never returns a garbage problem — callers needing one use
    /// [`Self::sample_garbage`].
    pub fn sample(
        &self,
        profile: DifficultyProfile,
        seen: &mut HashSet<ProblemId>,
        rng: &mut impl Rng,
    ) -> Option<Problem> {
        self.sample_weighted(profile, true, seen, rng)
    }

    /// Samples any problem (garbage allowed) for a timed arrival,
    /// weighted by `profile` among the candidate pool.
    pub fn sample_for_arrival(
        &self,
        profile: DifficultyProfile,
        seen: &mut HashSet<ProblemId>,
        rng: &mut impl Rng,
    ) -> Option<Problem> {
        self.sample_weighted(profile, false, seen, rng)
    }

    fn sample_weighted(
        &self,
        profile: DifficultyProfile,
        exclude_garbage: bool,
        seen: &mut HashSet<ProblemId>,
        rng: &mut impl Rng,
    ) -> Option<Problem> {
        if self.problems.is_empty() {
            return None;
        }

        let pool = |exclude: &HashSet<ProblemId>| -> Vec<&Problem> {
            self.problems
                .iter()
                .filter(|p| !exclude_garbage || !p.is_garbage)
                .filter(|p| !exclude.contains(&p.problem_id))
                .collect()
        };

        let mut candidates = pool(seen);
        if candidates.is_empty() {
            seen.clear();
            candidates = pool(seen);
        }
        if candidates.is_empty() {
            return None;
        }

        let (we, wm, wh) = profile.weights();
        let by_difficulty = |d: Difficulty| -> Vec<&&Problem> {
            candidates.iter().filter(|p| p.difficulty == d).collect()
        };
        let easy = by_difficulty(Difficulty::Easy);
        let medium = by_difficulty(Difficulty::Medium);
        let hard = by_difficulty(Difficulty::Hard);

        let mut buckets: Vec<(u32, &[&&Problem])> = Vec::new();
        if !easy.is_empty() {
            buckets.push((we, &easy));
        }
        if !medium.is_empty() {
            buckets.push((wm, &medium));
        }
        if !hard.is_empty() {
            buckets.push((wh, &hard));
        }

        let total: u32 = buckets.iter().map(|(w, _)| w).sum();
        let chosen_bucket = if total == 0 {
            // No populated bucket carries weight; fall back to the flat pool.
            candidates.as_slice()
        } else {
            let mut roll = rng.random_range(0..total);
            let mut picked: &[&&Problem] = &[];
            for (w, bucket) in &buckets {
                if roll < *w {
                    picked = bucket;
                    break;
                }
                roll -= w;
            }
            // `picked` borrows `&&Problem`; flatten below uniformly.
            return {
                let idx = rng.random_range(0..picked.len());
                let problem = (*picked[idx]).clone();
                seen.insert(problem.problem_id);
                Some(problem)
            };
        };

        let idx = rng.random_range(0..chosen_bucket.len());
        let problem = chosen_bucket[idx].clone();
        seen.insert(problem.problem_id);
        Some(problem)
    }

    /// Picks any garbage problem uniformly, for a `garbageDrop` attack.
    /// Does not consult or update `seen` — garbage problems award no
    /// score and aren't subject to the no-repeat rule.
    pub fn sample_garbage(&self, rng: &mut impl Rng) -> Option<Problem> {
        let garbage: Vec<&Problem> = self.problems.iter().filter(|p| p.is_garbage).collect();
        if garbage.is_empty() {
            return None;
        }
        let idx = rng.random_range(0..garbage.len());
        Some(garbage[idx].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coderoyale_protocol::ProblemType;
    use rand::{rngs::StdRng, SeedableRng};

    fn problem(id: u32, difficulty: Difficulty, is_garbage: bool) -> Problem {
        Problem {
            problem_id: ProblemId(id),
            title: format!("p{id}"),
            difficulty,
            problem_type: ProblemType::Code,
            prompt: "solve it".into(),
            time_limit_ms: 2000,
            is_garbage,
            function_name: Some("f".into()),
            signature: Some("fn f()".into()),
            starter_code: Some("".into()),
            public_tests: vec![],
            hidden_tests: vec![],
            hints: vec![],
            solution_sketch: None,
            options: vec![],
            correct_answer: None,
        }
    }

    #[test]
    fn test_sample_never_returns_garbage() {
        let lib = ProblemLibrary::new(vec![
            problem(1, Difficulty::Easy, false),
            problem(2, Difficulty::Easy, true),
        ]);
        let mut seen = HashSet::new();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..10 {
            let p = lib.sample(DifficultyProfile::Moderate, &mut seen, &mut rng).unwrap();
            assert!(!p.is_garbage);
            seen.clear();
        }
    }

    #[test]
    fn test_sample_avoids_seen_until_exhausted() {
        let lib = ProblemLibrary::new(vec![
            problem(1, Difficulty::Easy, false),
            problem(2, Difficulty::Easy, false),
        ]);
        let mut seen = HashSet::new();
        let mut rng = StdRng::seed_from_u64(7);

        let first = lib.sample(DifficultyProfile::Moderate, &mut seen, &mut rng).unwrap();
        assert!(seen.contains(&first.problem_id));
        let second = lib.sample(DifficultyProfile::Moderate, &mut seen, &mut rng).unwrap();
        assert_ne!(first.problem_id, second.problem_id);
        assert_eq!(seen.len(), 2);

        // Pool exhausted — next sample resets and refills.
        let third = lib.sample(DifficultyProfile::Moderate, &mut seen, &mut rng).unwrap();
        assert_eq!(seen.len(), 1);
        assert!(third.problem_id == ProblemId(1) || third.problem_id == ProblemId(2));
    }

    #[test]
    fn test_sample_garbage_only_returns_garbage() {
        let lib = ProblemLibrary::new(vec![
            problem(1, Difficulty::Easy, false),
            problem(2, Difficulty::Hard, true),
        ]);
        let mut rng = StdRng::seed_from_u64(3);
        let p = lib.sample_garbage(&mut rng).unwrap();
        assert!(p.is_garbage);
    }

    #[test]
    fn test_sample_garbage_empty_pool_returns_none() {
        let lib = ProblemLibrary::new(vec![problem(1, Difficulty::Easy, false)]);
        let mut rng = StdRng::seed_from_u64(3);
        assert!(lib.sample_garbage(&mut rng).is_none());
    }

    #[test]
    fn test_sample_falls_back_when_profile_weighted_difficulty_absent() {
        // Competitive weights heavily favor hard/medium but pool is easy-only.
        let lib = ProblemLibrary::new(vec![problem(1, Difficulty::Easy, false)]);
        let mut seen = HashSet::new();
        let mut rng = StdRng::seed_from_u64(5);
        let p = lib.sample(DifficultyProfile::Competitive, &mut seen, &mut rng).unwrap();
        assert_eq!(p.difficulty, Difficulty::Easy);
    }
}
