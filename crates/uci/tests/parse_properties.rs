//! Property-based tests for the engine output classifier.

use proptest::prelude::*;
use uci::{EngineMessage, Score};

fn score_strategy() -> impl Strategy<Value = Score> {
    prop_oneof![
        (-10_000i32..10_000).prop_map(Score::Centipawns),
        (-60i32..60).prop_map(Score::Mate),
    ]
}

fn move_strategy() -> impl Strategy<Value = String> {
    ("[a-h][1-8][a-h][1-8]", prop::option::of("[qrbn]"))
        .prop_map(|(mv, promo)| format!("{}{}", mv, promo.unwrap_or_default()))
}

fn score_tokens(score: Score) -> String {
    match score {
        Score::Centipawns(cp) => format!("score cp {}", cp),
        Score::Mate(m) => format!("score mate {}", m),
    }
}

/// Optional non-mandatory fields, in random order.
fn noise_strategy() -> impl Strategy<Value = Vec<String>> {
    (
        prop::option::of(1u32..10),
        prop::option::of(0u32..100),
        prop::option::of(any::<u64>()),
        prop::option::of(0u64..1_000_000),
        prop::collection::vec(move_strategy(), 0..8),
    )
        .prop_map(|(multipv, seldepth, nodes, time, pv)| {
            let mut fields = Vec::new();
            if let Some(rank) = multipv {
                fields.push(format!("multipv {}", rank));
            }
            if let Some(d) = seldepth {
                fields.push(format!("seldepth {}", d));
            }
            if let Some(n) = nodes {
                fields.push(format!("nodes {}", n));
            }
            if let Some(ms) = time {
                fields.push(format!("time {}", ms));
            }
            if !pv.is_empty() {
                fields.push(format!("pv {}", pv.join(" ")));
            }
            fields
        })
        .prop_shuffle()
}

proptest! {
    /// Property: depth and score come back exactly as written, rank defaults to 1
    #[test]
    fn prop_mandatory_fields_extracted(
        depth in 0u32..256,
        score in score_strategy(),
        nodes in prop::option::of(any::<u64>()),
        pv in prop::collection::vec(move_strategy(), 0..12),
    ) {
        let mut line = format!("info depth {} {}", depth, score_tokens(score));
        if let Some(n) = nodes {
            line.push_str(&format!(" nodes {}", n));
        }
        if !pv.is_empty() {
            line.push_str(&format!(" pv {}", pv.join(" ")));
        }

        match EngineMessage::parse(&line) {
            EngineMessage::Info(info) => {
                prop_assert_eq!(info.depth, depth);
                prop_assert_eq!(info.score, score);
                prop_assert_eq!(info.multipv, 1);
                prop_assert_eq!(info.nodes, nodes);
                prop_assert_eq!(info.pv, pv);
            }
            other => prop_assert!(false, "expected Info, got {:?}", other),
        }
    }

    /// Property: explicit multipv rank is carried through regardless of field order
    #[test]
    fn prop_multipv_any_position(
        depth in 1u32..64,
        rank in 1u32..10,
        score in score_strategy(),
        rank_first in any::<bool>(),
    ) {
        let line = if rank_first {
            format!("info multipv {} depth {} {}", rank, depth, score_tokens(score))
        } else {
            format!("info depth {} {} multipv {}", depth, score_tokens(score), rank)
        };

        match EngineMessage::parse(&line) {
            EngineMessage::Info(info) => {
                prop_assert_eq!(info.multipv, rank);
                prop_assert_eq!(info.depth, depth);
                prop_assert_eq!(info.score, score);
            }
            other => prop_assert!(false, "expected Info, got {:?}", other),
        }
    }

    /// Property: without depth a line never becomes Info
    #[test]
    fn prop_missing_depth_unrecognized(
        score in score_strategy(),
        noise in noise_strategy(),
        at in any::<prop::sample::Index>(),
    ) {
        let mut fields = noise;
        let at = at.index(fields.len() + 1);
        fields.insert(at, score_tokens(score));
        let line = format!("info {}", fields.join(" "));
        let is_unrecognized = matches!(EngineMessage::parse(&line), EngineMessage::Unrecognized(_));
        prop_assert!(is_unrecognized);
    }

    /// Property: the classifier never panics on arbitrary input
    #[test]
    fn prop_parse_total(line in ".{0,120}") {
        let _ = EngineMessage::parse(&line);
    }
}
