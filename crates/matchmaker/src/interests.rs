//! Common-interest extraction
//!
//! Explains a match with at most `limit` strings: exact shared interests
//! first, then, only when fewer than two exact matches exist, semantically
//! related pairs rendered as `"x ~ y"`.

use crate::similarity::cosine_similarity;

const MIN_EXACT_BEFORE_SEMANTIC: usize = 2;

/// One side of a comparison: the interests and, when available, one vector
/// per interest.
#[derive(Debug, Clone, Copy)]
pub struct InterestSet<'a> {
    pub interests: &'a [String],
    pub vectors: &'a [Vec<f32>],
}

impl<'a> InterestSet<'a> {
    pub fn new(interests: &'a [String], vectors: &'a [Vec<f32>]) -> Self {
        Self { interests, vectors }
    }

    fn has_vectors(&self) -> bool {
        !self.interests.is_empty() && self.vectors.len() == self.interests.len()
    }
}

pub fn common_interests(
    a: InterestSet<'_>,
    b: InterestSet<'_>,
    limit: usize,
    semantic_threshold: f64,
) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();

    for interest in a.interests {
        if result.len() >= limit {
            break;
        }
        if b.interests.contains(interest) && !result.contains(interest) {
            result.push(interest.clone());
        }
    }

    let exact = result.len();
    if exact < MIN_EXACT_BEFORE_SEMANTIC && a.has_vectors() && b.has_vectors() {
        'outer: for (x, x_vec) in a.interests.iter().zip(a.vectors) {
            for (y, y_vec) in b.interests.iter().zip(b.vectors) {
                if result.len() >= limit {
                    break 'outer;
                }
                if x == y {
                    continue;
                }
                let related = cosine_similarity(x_vec, y_vec)
                    .map_or(false, |score| score > semantic_threshold);
                if !related {
                    continue;
                }
                let pair = format!("{} ~ {}", x, y);
                if !result.contains(&pair) {
                    result.push(pair);
                }
            }
        }
    }

    result.truncate(limit);
    result
}
