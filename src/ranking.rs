//! Scoring and top-k ranking of catalog items under exclusion constraints.
use std::cmp::Ordering;
use std::collections::HashSet;
use std::f32;

use ndarray::aview1;

use super::{ItemId, PredictionError, RankingError, UserId};
use features::ItemFeatures;
use model::FactorizationModel;

/// What to score items against: either a model row for an existing user, or
/// a dense vector of the embedding dimensionality (used for composed users
/// and similarity queries).
#[derive(Clone, Copy, Debug)]
pub enum ScoreTarget<'a> {
    /// Score via the model's predict operation for this user index.
    User(UserId),
    /// Score via dot products of item embeddings against this vector, plus
    /// the item biases.
    Vector(&'a [f32]),
}

/// Rank all items in `[0, num_items)` for the given target and return the
/// top `k` item indices in descending score order.
///
/// Indices in `exclude` never appear in the output, regardless of their
/// score. Ties are broken by ascending item index, so two calls with
/// identical model state and arguments return identical sequences.
pub fn rank<M: FactorizationModel>(
    model: &M,
    num_items: usize,
    target: ScoreTarget,
    exclude: &[ItemId],
    k: usize,
    item_features: Option<&ItemFeatures>,
) -> Result<Vec<ItemId>, RankingError> {
    check_k(k)?;
    let mut scores = score_all(model, num_items, target, item_features)?;
    Ok(top_k(&mut scores, exclude, k, None))
}

/// Like [`rank`](fn.rank.html), but drops items whose score is at or below
/// `threshold` from the top-k window. The filter applies after the top-k
/// selection, so the result may hold fewer than `k` items.
pub fn rank_above<M: FactorizationModel>(
    model: &M,
    num_items: usize,
    target: ScoreTarget,
    exclude: &[ItemId],
    k: usize,
    item_features: Option<&ItemFeatures>,
    threshold: f32,
) -> Result<Vec<ItemId>, RankingError> {
    check_k(k)?;
    let mut scores = score_all(model, num_items, target, item_features)?;
    Ok(top_k(&mut scores, exclude, k, Some(threshold)))
}

fn score_all<M: FactorizationModel>(
    model: &M,
    num_items: usize,
    target: ScoreTarget,
    item_features: Option<&ItemFeatures>,
) -> Result<Vec<f32>, RankingError> {
    if num_items == 0 {
        return Err(RankingError::InvalidRange(
            "item count must be positive".to_owned(),
        ));
    }

    match target {
        ScoreTarget::User(user_id) => {
            let item_ids: Vec<ItemId> = (0..num_items).collect();
            let scores = model.predict(user_id, &item_ids, item_features)?;

            if scores.len() != num_items {
                return Err(RankingError::InvalidRange(format!(
                    "model produced {} scores for {} items",
                    scores.len(),
                    num_items
                )));
            }

            Ok(scores)
        }
        ScoreTarget::Vector(user_vector) => {
            let embeddings = model.item_embeddings();
            let biases = model.item_biases();
            let (rows, dim) = embeddings.dim();

            if user_vector.len() != dim {
                return Err(RankingError::DimensionMismatch(dim, user_vector.len()));
            }
            if num_items > rows {
                return Err(RankingError::InvalidRange(format!(
                    "item count {} exceeds the {} embedding rows",
                    num_items, rows
                )));
            }

            let query = aview1(user_vector);

            (0..num_items)
                .map(|idx| {
                    let score = embeddings.row(idx).dot(&query) + biases[idx];

                    if score.is_finite() {
                        Ok(score)
                    } else {
                        Err(PredictionError::InvalidPredictionValue.into())
                    }
                })
                .collect()
        }
    }
}

/// Order item indices by descending score (ties broken by ascending index),
/// skip excluded items, take the first `k`, then optionally drop items whose
/// score is at or below the threshold. Callers run `check_k` first.
pub(crate) fn top_k(
    scores: &mut [f32],
    exclude: &[ItemId],
    k: usize,
    threshold: Option<f32>,
) -> Vec<ItemId> {
    let excluded: HashSet<ItemId> = exclude.iter().cloned().collect();

    for &idx in exclude {
        if idx < scores.len() {
            scores[idx] = f32::NEG_INFINITY;
        }
    }

    let mut order: Vec<ItemId> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.cmp(&b))
    });

    order
        .into_iter()
        .filter(|idx| !excluded.contains(idx))
        .take(k)
        .filter(|&idx| threshold.map_or(true, |t| scores[idx] > t))
        .collect()
}

/// Validate a top-k cutoff.
pub(crate) fn check_k(k: usize) -> Result<(), RankingError> {
    if k == 0 {
        Err(RankingError::InvalidRange(
            "k must be positive".to_owned(),
        ))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::StubModel;

    #[test]
    fn excluded_top_scorer_never_appears() {
        let model = StubModel::from_scores(vec![vec![0.1, 0.9, 0.3, 0.2, 0.8]]);

        let top = rank(&model, 5, ScoreTarget::User(0), &[1], 3, None).unwrap();

        assert_eq!(top, vec![4, 2, 3]);
    }

    #[test]
    fn exclusion_holds_when_k_exceeds_the_remainder() {
        let model = StubModel::from_scores(vec![vec![0.1, 0.9, 0.3, 0.2, 0.8]]);

        let top = rank(&model, 5, ScoreTarget::User(0), &[1, 4], 5, None).unwrap();

        assert_eq!(top, vec![2, 3, 0]);
    }

    #[test]
    fn ties_break_by_ascending_index() {
        let model = StubModel::from_scores(vec![vec![0.5, 0.5, 0.5, 0.5]]);

        let first = rank(&model, 4, ScoreTarget::User(0), &[], 4, None).unwrap();
        let second = rank(&model, 4, ScoreTarget::User(0), &[], 4, None).unwrap();

        assert_eq!(first, vec![0, 1, 2, 3]);
        assert_eq!(first, second);
    }

    #[test]
    fn vector_target_adds_biases() {
        let model = StubModel::with_embeddings(
            vec![vec![0.0; 3]],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
            vec![0.0, 0.0, 10.0],
        );

        let top = rank(&model, 3, ScoreTarget::Vector(&[1.0, 0.0]), &[], 2, None).unwrap();

        // Scores: 1.0, 0.0, 11.0.
        assert_eq!(top, vec![2, 0]);
    }

    #[test]
    fn vector_dimension_is_checked() {
        let model = StubModel::with_embeddings(
            vec![vec![0.0; 2]],
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            vec![0.0, 0.0],
        );

        match rank(&model, 2, ScoreTarget::Vector(&[1.0, 0.0, 0.0]), &[], 2, None) {
            Err(RankingError::DimensionMismatch(2, 3)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn non_finite_vector_scores_are_an_error() {
        let model = StubModel::with_embeddings(
            vec![vec![0.0; 2]],
            vec![vec![1.0, 0.0], vec![::std::f32::NAN, 1.0]],
            vec![0.0, 0.0],
        );

        match rank(&model, 2, ScoreTarget::Vector(&[1.0, 1.0]), &[], 2, None) {
            Err(RankingError::Prediction(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn threshold_filters_after_the_top_k_window() {
        let model = StubModel::from_scores(vec![vec![0.9, -0.5, 0.3, 0.1, 0.7]]);

        let top =
            rank_above(&model, 5, ScoreTarget::User(0), &[], 3, None, 0.2).unwrap();
        assert_eq!(top, vec![0, 4, 2]);

        let top =
            rank_above(&model, 5, ScoreTarget::User(0), &[], 3, None, 0.4).unwrap();
        assert_eq!(top, vec![0, 4]);

        // A score exactly at the threshold is dropped.
        let top =
            rank_above(&model, 5, ScoreTarget::User(0), &[], 3, None, 0.9).unwrap();
        assert!(top.is_empty());
    }

    #[test]
    fn zero_items_is_an_error() {
        let model = StubModel::from_scores(vec![vec![]]);

        match rank(&model, 0, ScoreTarget::User(0), &[], 3, None) {
            Err(RankingError::InvalidRange(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn zero_k_is_an_error() {
        let model = StubModel::from_scores(vec![vec![0.2, 0.1]]);

        match rank(&model, 2, ScoreTarget::User(0), &[], 0, None) {
            Err(RankingError::InvalidRange(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn out_of_range_exclusions_are_harmless() {
        let model = StubModel::from_scores(vec![vec![0.2, 0.1]]);

        let top = rank(&model, 2, ScoreTarget::User(0), &[7], 2, None).unwrap();

        assert_eq!(top, vec![0, 1]);
    }
}
