//! Cosine similarity and best-candidate selection

use common::ParticipantId;

use crate::domain::Participant;

/// Cosine similarity accumulated in f64.
///
/// `None` when the lengths differ, either vector is empty, or either has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x = f64::from(x);
        let y = f64::from(y);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return None;
    }
    Some((dot / denom).clamp(-1.0, 1.0))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub participant_id: ParticipantId,
    pub score: f64,
}

/// Pick the waiting participant most similar to the requester.
///
/// Only scores strictly above `threshold` qualify. On equal scores the
/// candidate seen first in `pool` order wins. The requester is never its own
/// candidate, and candidates with incomparable embeddings are skipped.
pub fn find_best_match<'a>(
    requester_id: &ParticipantId,
    requester_embedding: &[f32],
    pool: impl IntoIterator<Item = &'a Participant>,
    threshold: f64,
) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;

    for candidate in pool {
        if &candidate.id == requester_id {
            continue;
        }

        let Some(score) = cosine_similarity(requester_embedding, &candidate.embedding) else {
            continue;
        };

        if score <= threshold {
            continue;
        }

        let better = best.as_ref().map_or(true, |b| score > b.score);
        if better {
            best = Some(Candidate {
                participant_id: candidate.id.clone(),
                score,
            });
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::participant;

    #[test]
    fn test_cosine_basics() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), Some(1.0));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), Some(0.0));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), Some(-1.0));
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), None);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), None);
        assert_eq!(cosine_similarity(&[], &[]), None);
    }

    #[test]
    fn test_empty_pool_yields_none() {
        let pool: Vec<Participant> = vec![];
        assert!(find_best_match(&"r".into(), &[1.0, 0.0], &pool, 0.5).is_none());
    }

    #[test]
    fn test_threshold_is_strict() {
        let pool = vec![participant("a", &["x"], vec![0.6, 0.8])];
        let score = cosine_similarity(&[1.0, 0.0], &pool[0].embedding).unwrap();

        assert!(find_best_match(&"r".into(), &[1.0, 0.0], &pool, score).is_none());

        let best = find_best_match(&"r".into(), &[1.0, 0.0], &pool, score - 1e-9).unwrap();
        assert_eq!(best.participant_id, ParticipantId::new("a"));
        assert_eq!(best.score, score);
    }

    #[test]
    fn test_picks_highest_and_first_on_tie() {
        let pool = vec![
            participant("low", &["x"], vec![1.0, 1.0]),
            participant("first", &["x"], vec![1.0, 0.1]),
            participant("second", &["x"], vec![1.0, 0.1]),
        ];

        let best = find_best_match(&"r".into(), &[1.0, 0.0], &pool, 0.5).unwrap();
        assert_eq!(best.participant_id, ParticipantId::new("first"));
    }

    #[test]
    fn test_skips_self_and_mismatched_dimensions() {
        let pool = vec![
            participant("r", &["x"], vec![1.0, 0.0]),
            participant("wide", &["x"], vec![1.0, 0.0, 0.0]),
            participant("ok", &["x"], vec![0.9, 0.1]),
        ];

        let best = find_best_match(&"r".into(), &[1.0, 0.0], &pool, 0.5).unwrap();
        assert_eq!(best.participant_id, ParticipantId::new("ok"));
    }
}
