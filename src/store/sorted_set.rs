//! Sorted Set Module
//!
//! Score-ordered member set used by the memory store to hold expiry indexes.

use std::collections::{BTreeSet, HashMap};

// == Sorted Set ==
/// Members ordered by an integer score, with O(log n) upsert and removal.
///
/// Ties are broken by member name, so iteration order is deterministic.
#[derive(Debug, Default, Clone)]
pub struct SortedSet {
    /// Member to score lookup
    scores: HashMap<String, i64>,
    /// (score, member) pairs in ascending order
    ordered: BTreeSet<(i64, String)>,
}

impl SortedSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    // == Insert ==
    /// Inserts a member or moves it to a new score.
    pub fn insert(&mut self, member: &str, score: i64) {
        if let Some(previous) = self.scores.insert(member.to_string(), score) {
            self.ordered.remove(&(previous, member.to_string()));
        }
        self.ordered.insert((score, member.to_string()));
    }

    // == Remove ==
    /// Removes a member. Returns true if it was present.
    pub fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.ordered.remove(&(score, member.to_string()));
                true
            }
            None => false,
        }
    }

    /// Returns the score of a member.
    pub fn score(&self, member: &str) -> Option<i64> {
        self.scores.get(member).copied()
    }

    /// Returns the highest score in the set.
    pub fn max_score(&self) -> Option<i64> {
        self.ordered.iter().next_back().map(|(score, _)| *score)
    }

    // == Range By Score ==
    /// Returns up to `limit` members with `score <= max`, lowest scores first.
    pub fn range_up_to(&self, max: i64, limit: usize) -> Vec<String> {
        self.ordered
            .iter()
            .take_while(|(score, _)| *score <= max)
            .take(limit)
            .map(|(_, member)| member.clone())
            .collect()
    }

    /// Returns the first `count` members with their scores, lowest first.
    pub fn first(&self, count: usize) -> Vec<(String, i64)> {
        self.ordered
            .iter()
            .take(count)
            .map(|(score, member)| (member.clone(), *score))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}
