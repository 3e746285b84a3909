//! Summary statistics over outcomes and closed streaks

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Color, StreakHistoryRecord, StreakKind};

/// Runs of one color longer than a single outcome
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub max: u32,
    /// Two decimals
    pub avg: f64,
    pub count: u32,
}

/// Per-color run statistics plus the raw distribution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorRunReport {
    pub total_rounds: usize,
    pub distribution: BTreeMap<Color, u32>,
    pub runs: BTreeMap<Color, RunStats>,
}

/// Walk `colors` and summarise maximal same-color runs of length ≥ 2
pub fn color_run_stats(colors: &[Color]) -> ColorRunReport {
    let mut distribution: BTreeMap<Color, u32> = BTreeMap::new();
    let mut lengths: BTreeMap<Color, Vec<u32>> = BTreeMap::new();
    for color in [Color::Red, Color::Green, Color::Yellow] {
        distribution.insert(color, 0);
        lengths.insert(color, Vec::new());
    }

    let mut current: Option<(Color, u32)> = None;
    for &color in colors {
        *distribution.entry(color).or_default() += 1;
        current = match current {
            Some((c, n)) if c == color => Some((c, n + 1)),
            Some((c, n)) => {
                if n > 1 {
                    lengths.entry(c).or_default().push(n);
                }
                Some((color, 1))
            }
            None => Some((color, 1)),
        };
    }
    if let Some((c, n)) = current {
        if n > 1 {
            lengths.entry(c).or_default().push(n);
        }
    }

    let runs = lengths
        .into_iter()
        .map(|(color, list)| {
            let stats = if list.is_empty() {
                RunStats::default()
            } else {
                let sum: u32 = list.iter().sum();
                RunStats {
                    max: list.iter().copied().max().unwrap_or(0),
                    avg: (sum as f64 / list.len() as f64 * 100.0).round() / 100.0,
                    count: list.len() as u32,
                }
            };
            (color, stats)
        })
        .collect();

    ColorRunReport {
        total_rounds: colors.len(),
        distribution,
        runs,
    }
}

/// How many closed streaks of `kind` there were at each length, longest first
pub fn streak_distribution(records: &[StreakHistoryRecord], kind: StreakKind) -> Vec<(u32, u32)> {
    let mut histogram: BTreeMap<u32, u32> = BTreeMap::new();
    for record in records.iter().filter(|r| r.streak_kind == kind) {
        *histogram.entry(record.length).or_default() += 1;
    }
    histogram.into_iter().rev().collect()
}
