//! Per-rank analysis state for the position under search.

use serde::Serialize;
use std::collections::BTreeMap;
use uci::{EngineInfo, Score, ScoreBound};

/// Latest evaluation for one MultiPV rank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisLine {
    /// MultiPV slot, starting at 1.
    pub rank: u32,
    /// Search depth in plies.
    pub depth: u32,
    /// Selective search depth, when reported.
    pub seldepth: Option<u32>,
    /// Centipawn or mate score from the side to move's view.
    pub score: Score,
    /// Set when the score is only a bound.
    pub bound: Option<ScoreBound>,
    /// Nodes searched, 0 when not reported.
    pub nodes: u64,
    /// Predicted line in engine (long algebraic) notation.
    pub principal_variation: Vec<String>,
}

impl AnalysisLine {
    /// First move of the principal variation.
    pub fn best_move(&self) -> Option<&str> {
        self.principal_variation.first().map(String::as_str)
    }
}

impl From<EngineInfo> for AnalysisLine {
    fn from(info: EngineInfo) -> Self {
        Self {
            rank: info.multipv,
            depth: info.depth,
            seldepth: info.seldepth,
            score: info.score,
            bound: info.bound,
            nodes: info.nodes.unwrap_or(0),
            principal_variation: info.pv,
        }
    }
}

/// Terminal result of one search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BestMove {
    #[serde(rename = "move")]
    pub mv: String,
    pub ponder: Option<String>,
}

/// Outcome of [`MultiPvTable::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// Rank above the configured line count; nothing stored.
    OutOfRange,
    /// Stored, but shallower than a line subscribers already saw.
    Stored,
    /// Stored and should be delivered to subscribers.
    Publish,
}

/// Latest [`AnalysisLine`] per rank for the position currently searched.
///
/// A new line for a rank replaces the previous one unconditionally, even
/// when its depth is lower. Publication is tracked separately so that
/// subscribers only ever see non-decreasing depth per rank.
///
/// Only reported ranks take up space, whatever the line count.
#[derive(Debug, Clone)]
pub struct MultiPvTable {
    line_count: u32,
    ranks: BTreeMap<u32, Ranked>,
}

#[derive(Debug, Clone)]
struct Ranked {
    line: AnalysisLine,
    published_depth: u32,
}

impl MultiPvTable {
    pub fn new(line_count: u32) -> Self {
        Self {
            line_count,
            ranks: BTreeMap::new(),
        }
    }

    pub fn line_count(&self) -> u32 {
        self.line_count
    }

    /// Change the line count, dropping ranks above it.
    pub fn set_line_count(&mut self, line_count: u32) {
        self.line_count = line_count;
        self.ranks.retain(|rank, _| *rank <= line_count);
    }

    /// Forget every rank.
    pub fn clear(&mut self) {
        self.ranks.clear();
    }

    pub fn record(&mut self, line: AnalysisLine) -> Recorded {
        let rank = line.rank;
        if rank == 0 || rank > self.line_count {
            return Recorded::OutOfRange;
        }

        let depth = line.depth;
        match self.ranks.get_mut(&rank) {
            Some(slot) => {
                slot.line = line;
                if depth < slot.published_depth {
                    Recorded::Stored
                } else {
                    slot.published_depth = depth;
                    Recorded::Publish
                }
            }
            None => {
                self.ranks.insert(
                    rank,
                    Ranked {
                        line,
                        published_depth: depth,
                    },
                );
                Recorded::Publish
            }
        }
    }

    pub fn get(&self, rank: u32) -> Option<&AnalysisLine> {
        self.ranks.get(&rank).map(|slot| &slot.line)
    }

    /// Lines ordered by rank, skipping ranks not yet reported.
    pub fn lines(&self) -> Vec<AnalysisLine> {
        self.ranks.values().map(|slot| slot.line.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

/// Compact node count for display: `950`, `12.3K`, `1.2M`.
pub fn format_nodes(nodes: u64) -> String {
    if nodes < 1_000 {
        nodes.to_string()
    } else if nodes < 1_000_000 {
        format!("{:.1}K", nodes as f64 / 1_000.0)
    } else {
        format!("{:.1}M", nodes as f64 / 1_000_000.0)
    }
}
