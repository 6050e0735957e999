//! Per-quiz leaderboards.

use crate::telegram::UserId;

/// One player's latest result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub user: UserId,
    pub name: String,
    pub score: u32,
    pub total: usize,
}

/// Results of one quiz, one entry per player.
#[derive(Debug, Clone, Default)]
pub struct Leaderboard {
    entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a result; a player's newer result replaces the older one but
    /// keeps its original position for tie-breaking.
    pub fn record(&mut self, user: UserId, name: &str, score: u32, total: usize) {
        let entry = LeaderboardEntry {
            user,
            name: name.to_owned(),
            score,
            total,
        };
        match self.entries.iter_mut().find(|e| e.user == user) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Returns the best `limit` results, highest score first.
    #[must_use]
    pub fn top(&self, limit: usize) -> Vec<&LeaderboardEntry> {
        let mut ranked: Vec<_> = self.entries.iter().collect();
        ranked.sort_by(|a, b| b.score.cmp(&a.score));
        ranked.truncate(limit);
        ranked
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_orders_by_score() {
        let mut board = Leaderboard::new();
        board.record(UserId(1), "Ada", 1, 3);
        board.record(UserId(2), "Bob", 3, 3);
        board.record(UserId(3), "Cy", 2, 3);

        let names: Vec<_> = board.top(5).iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Bob", "Cy", "Ada"]);
    }

    #[test]
    fn test_ties_keep_first_recorded_order() {
        let mut board = Leaderboard::new();
        board.record(UserId(1), "Ada", 2, 3);
        board.record(UserId(2), "Bob", 2, 3);

        let names: Vec<_> = board.top(5).iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Ada", "Bob"]);
    }

    #[test]
    fn test_newer_result_replaces_older() {
        let mut board = Leaderboard::new();
        board.record(UserId(1), "Ada", 3, 3);
        board.record(UserId(1), "Ada", 0, 3);

        assert_eq!(board.len(), 1);
        assert_eq!(board.top(1)[0].score, 0);
    }

    #[test]
    fn test_top_truncates() {
        let mut board = Leaderboard::new();
        for i in 0..8 {
            board.record(UserId(i), &format!("p{i}"), u32::try_from(i).unwrap(), 8);
        }
        let top = board.top(5);
        assert_eq!(top.len(), 5);
        assert_eq!(top[0].score, 7);
    }
}
