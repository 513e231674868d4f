//! FAQ score fusion
//!
//! The FAQ Responder scores each candidate against three text variants —
//! question alone, question+answer, and answer alone — then fuses them into
//! one ranking score (§4.2). Kept as a pure function so the fusion weights
//! and consistency bonus can be unit-tested without a reranker or vector
//! store in the loop.

/// Per-candidate cross-encoder scores against the three FAQ text variants.
#[derive(Debug, Clone, Copy)]
pub struct FaqVariantScores {
    pub question_score: f32,
    pub question_answer_score: f32,
    pub answer_score: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct FusionWeights {
    pub question: f32,
    pub question_answer: f32,
    pub answer: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            question: 0.5,
            question_answer: 0.3,
            answer: 0.2,
        }
    }
}

/// Weighted sum of the three variant scores, boosted when all three agree
/// that the candidate is strong (§4.2 consistency bonus).
pub fn fuse_faq_scores(
    scores: FaqVariantScores,
    weights: FusionWeights,
    consistency_threshold: f32,
    consistency_bonus: f32,
) -> f32 {
    let base = weights.question * scores.question_score
        + weights.question_answer * scores.question_answer_score
        + weights.answer * scores.answer_score;

    let all_strong = scores.question_score > consistency_threshold
        && scores.question_answer_score > consistency_threshold
        && scores.answer_score > consistency_threshold;

    if all_strong {
        base * consistency_bonus
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_sum_matches_defaults() {
        let scores = FaqVariantScores {
            question_score: 0.8,
            question_answer_score: 0.4,
            answer_score: 0.2,
        };
        let fused = fuse_faq_scores(scores, FusionWeights::default(), 0.6, 1.1);
        // none of the three variants exceed 0.6 together, so no bonus applies
        let expected = 0.5 * 0.8 + 0.3 * 0.4 + 0.2 * 0.2;
        assert!((fused - expected).abs() < 1e-6);
    }

    #[test]
    fn consistency_bonus_applies_when_all_variants_strong() {
        let scores = FaqVariantScores {
            question_score: 0.7,
            question_answer_score: 0.75,
            answer_score: 0.65,
        };
        let fused = fuse_faq_scores(scores, FusionWeights::default(), 0.6, 1.1);
        let base = 0.5 * 0.7 + 0.3 * 0.75 + 0.2 * 0.65;
        assert!((fused - base * 1.1).abs() < 1e-6);
    }

    #[test]
    fn consistency_bonus_skipped_when_one_variant_weak() {
        let scores = FaqVariantScores {
            question_score: 0.9,
            question_answer_score: 0.9,
            answer_score: 0.1,
        };
        let fused = fuse_faq_scores(scores, FusionWeights::default(), 0.6, 1.1);
        let base = 0.5 * 0.9 + 0.3 * 0.9 + 0.2 * 0.1;
        assert!((fused - base).abs() < 1e-6);
    }

    #[test]
    fn ranking_is_order_independent() {
        let a = FaqVariantScores {
            question_score: 0.9,
            question_answer_score: 0.8,
            answer_score: 0.7,
        };
        let b = FaqVariantScores {
            question_score: 0.3,
            question_answer_score: 0.2,
            answer_score: 0.1,
        };
        let weights = FusionWeights::default();
        let fused_a = fuse_faq_scores(a, weights, 0.6, 1.1);
        let fused_b = fuse_faq_scores(b, weights, 0.6, 1.1);

        let mut forward = [("a", fused_a), ("b", fused_b)];
        let mut reversed = [("b", fused_b), ("a", fused_a)];
        forward.sort_by(|x, y| y.1.partial_cmp(&x.1).unwrap());
        reversed.sort_by(|x, y| y.1.partial_cmp(&x.1).unwrap());
        assert_eq!(forward[0].0, reversed[0].0);
    }
}
