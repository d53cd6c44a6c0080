//! UCI info line types.

use crate::UciError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Score in centipawns or mate distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Score {
    /// Centipawn score (100 = 1 pawn advantage).
    Centipawns(i32),
    /// Mate in N moves (positive = side to move mates, negative = side to move is mated).
    Mate(i32),
}

impl Score {
    /// Pawn-unit value of a centipawn score. Mate scores have none.
    pub fn pawns(&self) -> Option<f64> {
        match self {
            Score::Centipawns(cp) => Some(f64::from(*cp) / 100.0),
            Score::Mate(_) => None,
        }
    }

    pub fn is_mate(&self) -> bool {
        matches!(self, Score::Mate(_))
    }

    // (tier, value): getting mated < any centipawn score < delivering mate.
    fn rank_key(&self) -> (u8, i64) {
        match *self {
            Score::Mate(n) if n <= 0 => (0, -i64::from(n)),
            Score::Centipawns(cp) => (1, i64::from(cp)),
            Score::Mate(n) => (2, -i64::from(n)),
        }
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank_key().cmp(&other.rank_key())
    }
}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Score::Centipawns(0) => write!(f, "0.0"),
            Score::Centipawns(cp) => write!(f, "{:+.1}", f64::from(cp) / 100.0),
            Score::Mate(n) => write!(f, "#{}", n),
        }
    }
}

/// Whether a score is exact or only a search window bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBound {
    Lower,
    Upper,
}

/// One parsed `info` line that carries a search result.
///
/// `depth` and `score` are mandatory; every other field is optional.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineInfo {
    /// Search depth in plies.
    pub depth: u32,
    /// Score evaluation.
    pub score: Score,
    /// Set when the score is a bound rather than exact.
    pub bound: Option<ScoreBound>,
    /// MultiPV rank, 1 when the engine omits it.
    pub multipv: u32,
    /// Selective search depth.
    pub seldepth: Option<u32>,
    /// Nodes searched.
    pub nodes: Option<u64>,
    /// Nodes per second.
    pub nps: Option<u64>,
    /// Time spent in milliseconds.
    pub time: Option<u64>,
    /// Hash table usage (per mille).
    pub hashfull: Option<u32>,
    /// Tablebase hits.
    pub tbhits: Option<u64>,
    /// Win/draw/loss estimate in per mille.
    pub wdl: Option<(u32, u32, u32)>,
    /// Current move being searched.
    pub currmove: Option<String>,
    /// Current move number.
    pub currmovenumber: Option<u32>,
    /// Principal variation (best line found).
    pub pv: Vec<String>,
    /// Arbitrary string info.
    pub string: Option<String>,
}

impl EngineInfo {
    /// Parse a UCI info line.
    ///
    /// The line is split on whitespace into keyword/value pairs that may
    /// appear in any order. Unknown tokens are skipped. A line without
    /// `depth` or `score`, or with a malformed value for a known keyword,
    /// is rejected with [`UciError::MalformedLine`].
    pub fn parse(line: &str) -> Result<Self, UciError> {
        let malformed = |why: &str| UciError::MalformedLine(format!("{}: {}", why, line.trim()));

        let mut tokens = line.split_whitespace().peekable();
        if tokens.next() != Some("info") {
            return Err(malformed("not an info line"));
        }

        let mut depth = None;
        let mut score = None;
        let mut bound = None;
        let mut multipv = None;
        let mut seldepth = None;
        let mut nodes = None;
        let mut nps = None;
        let mut time = None;
        let mut hashfull = None;
        let mut tbhits = None;
        let mut wdl = None;
        let mut currmove = None;
        let mut currmovenumber = None;
        let mut pv = Vec::new();
        let mut string = None;

        while let Some(token) = tokens.next() {
            match token {
                "depth" => depth = Some(number(tokens.next(), "depth", line)?),
                "seldepth" => seldepth = Some(number(tokens.next(), "seldepth", line)?),
                "multipv" => {
                    let rank: u32 = number(tokens.next(), "multipv", line)?;
                    if rank == 0 {
                        return Err(malformed("multipv must be at least 1"));
                    }
                    multipv = Some(rank);
                }
                "score" => {
                    let kind = tokens.next();
                    let value: i32 = number(tokens.next(), "score", line)?;
                    score = Some(match kind {
                        Some("cp") => Score::Centipawns(value),
                        Some("mate") => Score::Mate(value),
                        _ => return Err(malformed("unknown score kind")),
                    });
                    match tokens.peek() {
                        Some(&"lowerbound") => {
                            bound = Some(ScoreBound::Lower);
                            tokens.next();
                        }
                        Some(&"upperbound") => {
                            bound = Some(ScoreBound::Upper);
                            tokens.next();
                        }
                        _ => {}
                    }
                }
                "nodes" => nodes = Some(number(tokens.next(), "nodes", line)?),
                "nps" => nps = Some(number(tokens.next(), "nps", line)?),
                "time" => time = Some(number(tokens.next(), "time", line)?),
                "hashfull" => hashfull = Some(number(tokens.next(), "hashfull", line)?),
                "tbhits" => tbhits = Some(number(tokens.next(), "tbhits", line)?),
                "wdl" => {
                    wdl = Some((
                        number(tokens.next(), "wdl", line)?,
                        number(tokens.next(), "wdl", line)?,
                        number(tokens.next(), "wdl", line)?,
                    ))
                }
                "currmove" => {
                    currmove = Some(tokens.next().ok_or_else(|| malformed("currmove without a move"))?.to_string())
                }
                "currmovenumber" => {
                    currmovenumber = Some(number(tokens.next(), "currmovenumber", line)?)
                }
                "pv" => {
                    // Moves run until the next keyword or end of line
                    while let Some(mv) = tokens.next_if(|t| !is_info_keyword(t)) {
                        pv.push(mv.to_string());
                    }
                }
                "string" => {
                    // String consumes rest of line
                    string = Some(tokens.by_ref().collect::<Vec<_>>().join(" "));
                }
                _ => {}
            }
        }

        let depth = depth.ok_or_else(|| malformed("missing depth"))?;
        let score = score.ok_or_else(|| malformed("missing score"))?;

        Ok(EngineInfo {
            depth,
            score,
            bound,
            multipv: multipv.unwrap_or(1),
            seldepth,
            nodes,
            nps,
            time,
            hashfull,
            tbhits,
            wdl,
            currmove,
            currmovenumber,
            pv,
            string,
        })
    }
}

fn number<T: std::str::FromStr>(token: Option<&str>, keyword: &str, line: &str) -> Result<T, UciError> {
    token.and_then(|t| t.parse().ok()).ok_or_else(|| {
        UciError::MalformedLine(format!("bad value for {}: {}", keyword, line.trim()))
    })
}

fn is_info_keyword(s: &str) -> bool {
    matches!(
        s,
        "depth" | "seldepth" | "multipv" | "score" | "nodes" | "nps" | "time"
        | "pv" | "currmove" | "currmovenumber" | "hashfull" | "tbhits" | "wdl" | "string"
    )
}

/// Builder for constructing EngineInfo.
pub struct InfoBuilder {
    info: EngineInfo,
}

impl InfoBuilder {
    /// Start from the two mandatory fields.
    pub fn new(depth: u32, score: Score) -> Self {
        Self {
            info: EngineInfo {
                depth,
                score,
                bound: None,
                multipv: 1,
                seldepth: None,
                nodes: None,
                nps: None,
                time: None,
                hashfull: None,
                tbhits: None,
                wdl: None,
                currmove: None,
                currmovenumber: None,
                pv: Vec::new(),
                string: None,
            },
        }
    }

    pub fn multipv(mut self, rank: u32) -> Self {
        self.info.multipv = rank;
        self
    }

    pub fn pv<I, S>(mut self, moves: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.info.pv = moves.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> EngineInfo {
        self.info
    }
}
