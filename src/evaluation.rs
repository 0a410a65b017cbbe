//! Catalog-coverage and precision-at-k evaluation.
use std::collections::HashSet;

use rayon::prelude::*;

use super::{ItemId, RankingError};
use data::CompressedInteractions;
use features::ItemFeatures;
use model::FactorizationModel;
use ranking::{check_k, rank, rank_above, ScoreTarget};

/// The fraction of the catalog that appears in at least one user's top-k
/// list at the given score threshold.
///
/// Every user in `[0, num_users)` is ranked with no exclusion set; the union
/// of the returned item indices is divided by `num_items`. Users are
/// evaluated in parallel; the result does not depend on evaluation order.
/// A catalog of zero items is an error, not a zero coverage.
pub fn item_coverage<M: FactorizationModel + Sync>(
    model: &M,
    num_users: usize,
    num_items: usize,
    item_features: Option<&ItemFeatures>,
    k: usize,
    threshold: f32,
) -> Result<f32, RankingError> {
    if num_items == 0 {
        return Err(RankingError::InvalidRange(
            "coverage is undefined for an empty catalog".to_owned(),
        ));
    }
    check_k(k)?;

    let per_user: Result<Vec<Vec<ItemId>>, RankingError> = (0..num_users)
        .into_par_iter()
        .map(|user_id| {
            rank_above(
                model,
                num_items,
                ScoreTarget::User(user_id),
                &[],
                k,
                item_features,
                threshold,
            )
        })
        .collect();

    let mut recommended = HashSet::new();

    for items in per_user? {
        recommended.extend(items);
    }

    Ok(recommended.len() as f32 / num_items as f32)
}

/// Mean precision-at-k over validation users.
///
/// For every user with held-out validation interactions, ranks the top `k`
/// items with that user's training interactions excluded, and scores the
/// fraction of the list found in the user's validation set. The train and
/// validation matrices must have the same shape: a narrower validation
/// matrix would silently remove train-only items from the candidate set.
/// Errors if no user has validation interactions.
pub fn precision_at_k<M: FactorizationModel + Sync>(
    model: &M,
    train: &CompressedInteractions,
    validation: &CompressedInteractions,
    item_features: Option<&ItemFeatures>,
    k: usize,
) -> Result<f32, RankingError> {
    check_k(k)?;

    if train.shape() != validation.shape() {
        return Err(RankingError::InvalidRange(format!(
            "train shape {:?} does not match validation shape {:?}",
            train.shape(),
            validation.shape()
        )));
    }

    let num_items = validation.num_items();

    let precisions: Result<Vec<f32>, RankingError> = validation
        .iter_users()
        .collect::<Vec<_>>()
        .par_iter()
        .filter(|user| !user.is_empty())
        .map(|user| {
            let seen = train
                .get_user(user.user_id)
                .map(|train_user| train_user.item_ids)
                .unwrap_or(&[]);

            let top = rank(
                model,
                num_items,
                ScoreTarget::User(user.user_id),
                seen,
                k,
                item_features,
            )?;

            let held_out: HashSet<ItemId> = user.item_ids.iter().cloned().collect();
            let hits = top.iter().filter(|idx| held_out.contains(idx)).count();

            Ok(hits as f32 / k as f32)
        })
        .collect();

    let precisions = precisions?;

    if precisions.is_empty() {
        return Err(RankingError::InvalidRange(
            "no users with validation interactions".to_owned(),
        ));
    }

    Ok(precisions.iter().sum::<f32>() / precisions.len() as f32)
}
