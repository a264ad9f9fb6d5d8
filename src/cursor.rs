//! Update cursor: the highest event id already dispatched.

/// Tracks the last consumed update id so re-polling never replays old events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorTracker {
    cursor: i64,
}

impl CursorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a known position (e.g. an id restored by the operator)
    pub fn starting_at(cursor: i64) -> Self {
        Self { cursor }
    }

    /// Move the cursor forward to `max_observed_id`; never moves it backward
    pub fn advance(&mut self, max_observed_id: i64) {
        self.cursor = self.cursor.max(max_observed_id);
    }

    /// Lower bound (inclusive) for the next fetch
    pub fn next(&self) -> i64 {
        self.cursor + 1
    }

    pub fn current(&self) -> i64 {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_only_moves_forward() {
        let mut cursor = CursorTracker::new();
        assert_eq!(cursor.next(), 1);

        cursor.advance(10);
        assert_eq!(cursor.current(), 10);
        assert_eq!(cursor.next(), 11);

        cursor.advance(7);
        assert_eq!(cursor.current(), 10);

        cursor.advance(12);
        assert_eq!(cursor.next(), 13);
    }

    #[test]
    fn test_cursor_starting_position() {
        let cursor = CursorTracker::starting_at(41);
        assert_eq!(cursor.next(), 42);
    }
}
