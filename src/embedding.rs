//! Composing pseudo-user vectors from item embeddings, and embedding-space
//! similarity queries.
use ndarray::{Array1, ArrayView2};

use super::{CatalogId, ItemId, RankingError};
use data::IdMapping;
use model::FactorizationModel;
use ranking::{check_k, rank, top_k, ScoreTarget};

/// Build a synthetic "user" vector from a weighted set of item embeddings.
///
/// External identifiers are resolved through `mapping`; the corresponding
/// embedding rows are summed with the given weights (uniform 1.0 when
/// `weights` is `None`) and the sum is L2-normalized. A zero-norm sum,
/// including the empty item list, is a `DegenerateVector` error.
pub fn compose_user(
    item_ids: &[CatalogId],
    embeddings: ArrayView2<f32>,
    mapping: &IdMapping,
    weights: Option<&[f32]>,
) -> Result<Array1<f32>, RankingError> {
    if let Some(weights) = weights {
        if weights.len() != item_ids.len() {
            return Err(RankingError::InvalidRange(format!(
                "{} weights supplied for {} items",
                weights.len(),
                item_ids.len()
            )));
        }
    }

    let weights: Vec<f32> = match weights {
        Some(weights) => weights.to_owned(),
        None => vec![1.0; item_ids.len()],
    };

    let (num_rows, dim) = embeddings.dim();
    let mut composed = Array1::<f32>::zeros(dim);

    for (&id, &weight) in izip!(item_ids, &weights) {
        let idx = mapping.internal(id)?;

        if idx >= num_rows {
            return Err(RankingError::InvalidRange(format!(
                "item index {} exceeds the {} embedding rows",
                idx, num_rows
            )));
        }

        composed.scaled_add(weight, &embeddings.row(idx));
    }

    let norm = composed.dot(&composed).sqrt();

    if norm == 0.0 {
        return Err(RankingError::DegenerateVector);
    }

    composed /= norm;

    Ok(composed)
}

/// Rank items by embedding-space similarity to a reference item.
///
/// Similarity is the dot product of every item's embedding with the query
/// item's embedding. The query item itself is excluded, and the top `k`
/// results are returned as external identifiers.
pub fn similar_items(
    item_id: CatalogId,
    embeddings: ArrayView2<f32>,
    mapping: &IdMapping,
    k: usize,
) -> Result<Vec<CatalogId>, RankingError> {
    check_k(k)?;

    let query_idx = mapping.internal(item_id)?;
    let (num_rows, _) = embeddings.dim();

    if query_idx >= num_rows {
        return Err(RankingError::InvalidRange(format!(
            "item index {} exceeds the {} embedding rows",
            query_idx, num_rows
        )));
    }

    let query = embeddings.row(query_idx).to_owned();

    let mut scores: Vec<f32> = (0..num_rows)
        .map(|idx| embeddings.row(idx).dot(&query))
        .collect();

    to_external(top_k(&mut scores, &[query_idx], k, None), mapping)
}

/// Recommend items for an ad hoc set of seed items: compose a pseudo-user
/// vector from the seeds, then rank against it with the seeds excluded.
///
/// This is exactly [`compose_user`](fn.compose_user.html) followed by a
/// vector-target [`rank`](../ranking/fn.rank.html); the seed exclusion
/// guarantees recommendations never echo the input.
pub fn recommend_from_items<M: FactorizationModel>(
    model: &M,
    mapping: &IdMapping,
    item_ids: &[CatalogId],
    weights: Option<&[f32]>,
    k: usize,
) -> Result<Vec<CatalogId>, RankingError> {
    let embeddings = model.item_embeddings();
    let (num_rows, _) = embeddings.dim();

    let composed = compose_user(item_ids, embeddings, mapping, weights)?;
    let composed = composed.to_vec();

    let exclude: Vec<ItemId> = item_ids
        .iter()
        .map(|&id| mapping.internal(id))
        .collect::<Result<_, _>>()?;

    let top = rank(
        model,
        num_rows,
        ScoreTarget::Vector(&composed),
        &exclude,
        k,
        None,
    )?;

    to_external(top, mapping)
}

fn to_external(
    indices: Vec<ItemId>,
    mapping: &IdMapping,
) -> Result<Vec<CatalogId>, RankingError> {
    indices
        .into_iter()
        .map(|idx| {
            mapping.external(idx).ok_or_else(|| {
                RankingError::InvalidRange(format!(
                    "item index {} is outside the identifier mapping",
                    idx
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use ndarray::arr2;

    use super::*;
    use test_utils::StubModel;

    #[test]
    fn composed_vector_is_unit_norm() {
        let embeddings = arr2(&[[3.0, 4.0], [1.0, 0.0]]);
        let mapping = IdMapping::from_ids(vec![10, 20]);

        let composed = compose_user(&[10], embeddings.view(), &mapping, None).unwrap();

        assert_eq!(composed.to_vec(), vec![0.6, 0.8]);

        let norm = composed.dot(&composed).sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn weights_scale_the_contributions() {
        let embeddings = arr2(&[[1.0, 0.0], [0.0, 1.0]]);
        let mapping = IdMapping::from_ids(vec![10, 20]);

        let composed =
            compose_user(&[10, 20], embeddings.view(), &mapping, Some(&[3.0, 0.0])).unwrap();

        assert_eq!(composed.to_vec(), vec![1.0, 0.0]);
    }

    #[test]
    fn empty_item_list_is_degenerate() {
        let embeddings = arr2(&[[1.0, 0.0]]);
        let mapping = IdMapping::from_ids(vec![10]);

        match compose_user(&[], embeddings.view(), &mapping, None) {
            Err(RankingError::DegenerateVector) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn cancelling_embeddings_are_degenerate() {
        let embeddings = arr2(&[[1.0, -2.0], [-1.0, 2.0]]);
        let mapping = IdMapping::from_ids(vec![10, 20]);

        match compose_user(&[10, 20], embeddings.view(), &mapping, None) {
            Err(RankingError::DegenerateVector) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn unknown_identifiers_are_reported() {
        let embeddings = arr2(&[[1.0, 0.0]]);
        let mapping = IdMapping::from_ids(vec![10]);

        match compose_user(&[99], embeddings.view(), &mapping, None) {
            Err(RankingError::UnknownItem(99)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn mismatched_weights_are_an_error() {
        let embeddings = arr2(&[[1.0, 0.0]]);
        let mapping = IdMapping::from_ids(vec![10]);

        match compose_user(&[10], embeddings.view(), &mapping, Some(&[1.0, 2.0])) {
            Err(RankingError::InvalidRange(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn similar_items_excludes_the_query() {
        let embeddings = arr2(&[[1.0, 0.0], [0.9, 0.1], [0.0, 1.0]]);
        let mapping = IdMapping::from_ids(vec![10, 20, 30]);

        let similar = similar_items(10, embeddings.view(), &mapping, 10).unwrap();

        // Length is capped by the catalog, never includes the query, and
        // similarities descend strictly (0.9, then 0.0).
        assert_eq!(similar, vec![20, 30]);
    }

    #[test]
    fn recommendations_never_echo_the_seeds() {
        let model = StubModel::with_embeddings(
            vec![vec![0.0; 3]],
            vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]],
            vec![0.0, 0.0, 0.0],
        );
        let mapping = IdMapping::from_ids(vec![10, 20, 30]);

        let recommended = recommend_from_items(&model, &mapping, &[10], None, 3).unwrap();

        // Item 20 shares the seed's direction and outranks item 30; the
        // seed itself is excluded despite scoring highest.
        assert_eq!(recommended, vec![20, 30]);
    }
}
