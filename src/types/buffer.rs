//! Bounded outcome buffer
//!
//! - Append-only, oldest first
//! - Colors and round identifiers live in two parallel deques
//! - Both are evicted together once the capacity is exceeded

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::Color;
use crate::MAX_COLORS_BUFFER;

/// Recent classified outcomes with their round identifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorBuffer {
    colors: VecDeque<Color>,
    round_ids: VecDeque<String>,
    capacity: usize,
}

impl Default for ColorBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorBuffer {
    /// Create buffer with default capacity (500)
    pub fn new() -> Self {
        Self::with_capacity(MAX_COLORS_BUFFER)
    }

    /// Create buffer with custom capacity. A capacity of zero is bumped to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            colors: VecDeque::with_capacity(capacity),
            round_ids: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append one outcome, evicting the oldest if over capacity
    pub fn push(&mut self, color: Color, round_id: impl Into<String>) {
        self.colors.push_back(color);
        self.round_ids.push_back(round_id.into());
        while self.colors.len() > self.capacity {
            self.colors.pop_front();
            self.round_ids.pop_front();
        }
    }

    /// Copy of the colors, oldest first
    pub fn to_vec(&self) -> Vec<Color> {
        self.colors.iter().copied().collect()
    }

    /// Copy of the round identifiers, oldest first
    pub fn round_ids(&self) -> Vec<String> {
        self.round_ids.iter().cloned().collect()
    }

    /// The last `n` colors (or fewer if the buffer is shorter), oldest first
    pub fn tail(&self, n: usize) -> Vec<Color> {
        let skip = self.colors.len().saturating_sub(n);
        self.colors.iter().skip(skip).copied().collect()
    }

    /// Round identifier `back` positions before the newest (0 = newest)
    pub fn round_id_back(&self, back: usize) -> Option<&str> {
        let len = self.round_ids.len();
        if back >= len {
            return None;
        }
        self.round_ids.get(len - 1 - back).map(String::as_str)
    }

    /// Newest round identifier
    pub fn last_round_id(&self) -> Option<&str> {
        self.round_id_back(0)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Replace contents. Inputs of different length are truncated to the
    /// shorter one, then to capacity, keeping the newest.
    pub fn restore(&mut self, colors: Vec<Color>, round_ids: Vec<String>) {
        let len = colors.len().min(round_ids.len());
        let skip_colors = colors.len() - len;
        let skip_ids = round_ids.len() - len;
        self.clear();
        for (color, id) in colors
            .into_iter()
            .skip(skip_colors)
            .zip(round_ids.into_iter().skip(skip_ids))
        {
            self.push(color, id);
        }
    }

    /// Clear all outcomes
    pub fn clear(&mut self) {
        self.colors.clear();
        self.round_ids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_tail() {
        let mut buffer = ColorBuffer::new();
        buffer.push(Color::Red, "r1");
        buffer.push(Color::Green, "r2");
        buffer.push(Color::Yellow, "r3");

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.tail(2), vec![Color::Green, Color::Yellow]);
        assert_eq!(buffer.tail(10).len(), 3);
    }

    #[test]
    fn test_eviction_in_lockstep() {
        let mut buffer = ColorBuffer::with_capacity(2);
        buffer.push(Color::Red, "r1");
        buffer.push(Color::Green, "r2");
        buffer.push(Color::Yellow, "r3");

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.to_vec(), vec![Color::Green, Color::Yellow]);
        assert_eq!(buffer.round_ids(), vec!["r2".to_string(), "r3".to_string()]);
    }

    #[test]
    fn test_round_id_back() {
        let mut buffer = ColorBuffer::new();
        buffer.push(Color::Red, "r1");
        buffer.push(Color::Green, "r2");

        assert_eq!(buffer.round_id_back(0), Some("r2"));
        assert_eq!(buffer.round_id_back(1), Some("r1"));
        assert_eq!(buffer.round_id_back(2), None);
        assert_eq!(buffer.last_round_id(), Some("r2"));
    }

    #[test]
    fn test_window_after_wraparound() {
        let mut buffer = ColorBuffer::with_capacity(3);
        for (i, c) in [Color::Red, Color::Green, Color::Yellow, Color::Red, Color::Green]
            .into_iter()
            .enumerate()
        {
            buffer.push(c, format!("r{}", i));
        }
        assert_eq!(buffer.to_vec(), vec![Color::Yellow, Color::Red, Color::Green]);
        assert_eq!(buffer.round_ids(), vec!["r2", "r3", "r4"]);
    }

    #[test]
    fn test_restore_truncates_to_equal_length() {
        let mut buffer = ColorBuffer::with_capacity(2);
        buffer.restore(
            vec![Color::Red, Color::Green, Color::Yellow],
            vec!["a".into(), "b".into()],
        );
        assert_eq!(buffer.to_vec(), vec![Color::Green, Color::Yellow]);
        assert_eq!(buffer.round_ids(), vec!["a".to_string(), "b".to_string()]);
    }
}
