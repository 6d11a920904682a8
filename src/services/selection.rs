//! Reviewer selection.
//!
//! Pure decision logic over a team roster. All randomness comes from the
//! injected [`RandomSource`], so a seeded source makes every pick repeatable.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};

use crate::models::User;

/// Number of reviewers assigned when a pull request is created.
pub const INITIAL_REVIEWER_COUNT: usize = 2;

/// Shared random number generator used for reviewer picks.
pub type RandomSource = Arc<Mutex<dyn RngCore + Send>>;

/// Random source seeded from OS entropy.
pub fn entropy_source() -> RandomSource {
    Arc::new(Mutex::new(StdRng::from_entropy()))
}

/// Deterministic random source.
pub fn seeded_source(seed: u64) -> RandomSource {
    Arc::new(Mutex::new(StdRng::seed_from_u64(seed)))
}

/// Run `pick` with exclusive access to the generator. The lock is released
/// before this returns, so it never spans an await point.
pub fn with_rng<T>(source: &RandomSource, pick: impl FnOnce(&mut dyn RngCore) -> T) -> T {
    let mut rng = source.lock().unwrap_or_else(|e| e.into_inner());
    pick(&mut *rng)
}

/// Pick up to [`INITIAL_REVIEWER_COUNT`] distinct active reviewers for a new
/// pull request, never the author. Fewer eligible users means fewer reviewers.
pub fn pick_initial_reviewers<R: Rng + ?Sized>(
    author_id: &str,
    candidates: &[User],
    rng: &mut R,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let eligible: Vec<&str> = candidates
        .iter()
        .filter(|u| u.is_active && u.user_id != author_id)
        .map(|u| u.user_id.as_str())
        .filter(|id| seen.insert(*id))
        .collect();

    eligible
        .choose_multiple(rng, INITIAL_REVIEWER_COUNT)
        .map(|id| id.to_string())
        .collect()
}

/// Users from `candidates` who may replace `departing`: active, not the
/// author, and not already reviewing (the departing reviewer included).
pub fn replacement_candidates<'a>(
    candidates: &'a [User],
    departing: &str,
    author_id: &str,
    assigned: &[String],
) -> Vec<&'a User> {
    candidates
        .iter()
        .filter(|u| u.is_active)
        .filter(|u| u.user_id != departing && u.user_id != author_id)
        .filter(|u| !assigned.iter().any(|id| *id == u.user_id))
        .collect()
}

/// Pick one replacement uniformly at random, or `None` if nobody is eligible.
pub fn pick_replacement<R: Rng + ?Sized>(
    candidates: &[User],
    departing: &str,
    author_id: &str,
    assigned: &[String],
    rng: &mut R,
) -> Option<String> {
    replacement_candidates(candidates, departing, author_id, assigned)
        .choose(rng)
        .map(|u| u.user_id.clone())
}
