//! Scorer and selector (SPEC_FULL.md §4.6).
//!
//! Scores each fetched candidate against the request's targeting and
//! remaining budget, then selects one winner among the candidates that
//! clear the minimum score and still have budget to serve. Ties within
//! `TIE_EPSILON` of the top score are broken uniformly at random rather
//! than by insertion order, so repeated identical requests don't always
//! favor the same ad.

use primitives::{Ad, Campaign, Config, Money};
use rand::Rng;

const TIE_EPSILON: f64 = 1e-9;
/// Placeholder bid factor until a real bidding model exists (§4.6 Open
/// Question — documented in DESIGN.md).
const PLACEHOLDER_BID_SCORE: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub ad: Ad,
    pub campaign: Campaign,
    pub score: f64,
}

fn jaccard(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a: std::collections::HashSet<&String> = a.iter().collect();
    let b: std::collections::HashSet<&String> = b.iter().collect();
    let intersection = a.intersection(&b).count();
    let union = a.union(&b).count();

    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn category_match(ad: &Ad, category: Option<&str>) -> f64 {
    match category {
        Some(category) => {
            let category = category.to_lowercase();
            if ad.categories_lower().iter().any(|c| c == &category) {
                1.0
            } else {
                0.0
            }
        }
        None => 0.0,
    }
}

fn budget_factor(ad: &Ad, campaign: &Campaign) -> f64 {
    let remaining = ad.own_remaining().or_else(|| campaign.remaining());
    let ceiling = ad.budget.amount().or(campaign.budget);

    match (remaining, ceiling) {
        (Some(remaining), Some(ceiling)) => remaining.ratio(&ceiling),
        // Either side uncapped: treat as fully available.
        _ => 1.0,
    }
}

/// Scores every candidate, re-weighting the configured factors when the
/// request doesn't supply one of the targeting dimensions (§4.6: a
/// request with no category shouldn't let that factor silently zero out
/// every candidate's score).
pub fn score_candidates(
    candidates: Vec<(Ad, Campaign)>,
    category: Option<&str>,
    tags: &[String],
    config: &Config,
) -> Vec<ScoredCandidate> {
    let has_category = category.is_some();
    let has_tags = !tags.is_empty();

    let weights = if has_category && has_tags {
        config.scoring_weights
    } else if has_category {
        config.scoring_weights.category_only()
    } else if has_tags {
        config.scoring_weights.tags_only()
    } else {
        config.scoring_weights.neither()
    };

    candidates
        .into_iter()
        .map(|(ad, campaign)| {
            let tag_score = jaccard(&ad.tags_lower(), tags);
            let category_score = category_match(&ad, category);
            let budget_score = budget_factor(&ad, &campaign);

            let score = weights.tag * tag_score
                + weights.category * category_score
                + weights.budget * budget_score
                + weights.bid * PLACEHOLDER_BID_SCORE;

            ScoredCandidate { ad, campaign, score }
        })
        .collect()
}

fn has_sufficient_budget(candidate: &ScoredCandidate, cost: Money) -> bool {
    let remaining = candidate
        .ad
        .own_remaining()
        .or_else(|| candidate.campaign.remaining());

    remaining.map_or(true, |remaining| remaining >= cost)
}

/// Filters to candidates meeting `min_score` and `cost`, then picks
/// uniformly at random among whichever remain within `TIE_EPSILON` of the
/// top score. Returns `None` when no candidate qualifies.
pub fn select(
    mut candidates: Vec<ScoredCandidate>,
    min_score: f64,
    cost: Money,
) -> Option<ScoredCandidate> {
    candidates.retain(|c| c.score >= min_score && has_sufficient_budget(c, cost));
    if candidates.is_empty() {
        return None;
    }

    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    let top_score = candidates[0].score;
    let tied_count = candidates
        .iter()
        .take_while(|c| (top_score - c.score).abs() <= TIE_EPSILON)
        .count();

    let winner_index = if tied_count <= 1 {
        0
    } else {
        rand::thread_rng().gen_range(0..tied_count)
    };

    Some(candidates.remove(winner_index))
}

#[cfg(test)]
mod test {
    use super::*;
    use primitives::test_util::{dummy_ad, dummy_campaign};
    use primitives::config::ScoringWeights;

    fn config_with_weights(weights: ScoringWeights) -> Config {
        Config {
            cost_per_view_cents: 50,
            impression_ttl_minutes: 10,
            min_score: 0.35,
            max_candidates: 25,
            scoring_weights: weights,
        }
    }

    #[test]
    fn jaccard_of_disjoint_sets_is_zero() {
        let a = vec!["a".to_string()];
        let b = vec!["b".to_string()];
        assert_eq!(0.0, jaccard(&a, &b));
    }

    #[test]
    fn jaccard_of_identical_sets_is_one() {
        let a = vec!["a".to_string(), "b".to_string()];
        assert_eq!(1.0, jaccard(&a, &a.clone()));
    }

    #[test]
    fn score_candidates_rewards_category_and_tag_match() {
        let campaign = dummy_campaign();
        let mut matching = dummy_ad(campaign.id);
        matching.categories = vec!["tech".to_string()];
        matching.tags = vec!["reviews".to_string()];
        let non_matching = dummy_ad(campaign.id);

        let config = config_with_weights(ScoringWeights {
            tag: 0.30,
            category: 0.25,
            budget: 0.30,
            bid: 0.15,
        });

        let scored = score_candidates(
            vec![
                (matching, campaign.clone()),
                (non_matching, campaign),
            ],
            Some("tech"),
            &["reviews".to_string()],
            &config,
        );

        assert!(scored[0].score > scored[1].score);
    }

    #[test]
    fn select_returns_none_when_nothing_clears_min_score() {
        let campaign = dummy_campaign();
        let ad = dummy_ad(campaign.id);
        let candidate = ScoredCandidate { ad, campaign, score: 0.1 };

        assert!(select(vec![candidate], 0.35, Money::from_cents(50)).is_none());
    }

    #[test]
    fn select_rejects_candidates_without_enough_remaining_budget() {
        let mut campaign = dummy_campaign();
        campaign.budget = Some(Money::from_cents(40));
        campaign.spent = Money::from_cents(40);
        let ad = dummy_ad(campaign.id);
        let candidate = ScoredCandidate { ad, campaign, score: 0.9 };

        assert!(select(vec![candidate], 0.35, Money::from_cents(50)).is_none());
    }

    #[test]
    fn select_picks_the_only_qualifying_candidate() {
        let campaign = dummy_campaign();
        let ad = dummy_ad(campaign.id);
        let candidate = ScoredCandidate { ad: ad.clone(), campaign: campaign.clone(), score: 0.9 };

        let winner = select(vec![candidate], 0.35, Money::from_cents(50)).unwrap();
        assert_eq!(ad.id, winner.ad.id);
    }
}
