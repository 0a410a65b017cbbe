//! A deterministic stand-in for the model boundary, shared by tests.
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use super::{FittingError, ItemId, PredictionError, UserId};
use data::Interactions;
use features::ItemFeatures;
use model::{FactorizationModel, FitOptions};

/// A model with fixed score and embedding tables. Fitting is a no-op that
/// records how it was called, which is what the search tests assert on.
pub struct StubModel {
    scores: Array2<f32>,
    embeddings: Array2<f32>,
    biases: Array1<f32>,
    pub partial_fits: Arc<AtomicUsize>,
    pub full_fit_epochs: Arc<AtomicUsize>,
    pub saw_sample_weight: Arc<AtomicBool>,
}

fn to_array2(rows: Vec<Vec<f32>>) -> Array2<f32> {
    let num_rows = rows.len();
    let num_cols = rows.first().map_or(0, |row| row.len());
    let flat: Vec<f32> = rows.into_iter().flat_map(|row| row).collect();

    Array2::from_shape_vec((num_rows, num_cols), flat).unwrap()
}

impl StubModel {
    /// A stub with the given per-user score rows and trivial embeddings.
    pub fn from_scores(scores: Vec<Vec<f32>>) -> Self {
        let num_items = scores.first().map_or(0, |row| row.len());

        StubModel {
            scores: to_array2(scores),
            embeddings: Array2::zeros((num_items, 2)),
            biases: Array1::zeros(num_items),
            partial_fits: Arc::new(AtomicUsize::new(0)),
            full_fit_epochs: Arc::new(AtomicUsize::new(0)),
            saw_sample_weight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A stub with explicit embeddings and biases for the vector-target and
    /// embedding-composition tests.
    pub fn with_embeddings(
        scores: Vec<Vec<f32>>,
        embeddings: Vec<Vec<f32>>,
        biases: Vec<f32>,
    ) -> Self {
        let mut model = StubModel::from_scores(scores);
        model.embeddings = to_array2(embeddings);
        model.biases = Array1::from_vec(biases);
        model
    }
}

impl FactorizationModel for StubModel {
    fn predict(
        &self,
        user_id: UserId,
        item_ids: &[ItemId],
        _item_features: Option<&ItemFeatures>,
    ) -> Result<Vec<f32>, PredictionError> {
        item_ids
            .iter()
            .map(|&item_id| {
                let score = self.scores[[user_id, item_id]];

                if score.is_finite() {
                    Ok(score)
                } else {
                    Err(PredictionError::InvalidPredictionValue)
                }
            })
            .collect()
    }

    fn fit_partial(
        &mut self,
        _interactions: &Interactions,
        options: &FitOptions,
    ) -> Result<f32, FittingError> {
        self.partial_fits.fetch_add(1, Ordering::SeqCst);
        self.saw_sample_weight
            .store(options.sample_weight.is_some(), Ordering::SeqCst);

        Ok(0.0)
    }

    fn fit(
        &mut self,
        _interactions: &Interactions,
        epochs: usize,
        options: &FitOptions,
    ) -> Result<f32, FittingError> {
        self.full_fit_epochs.fetch_add(epochs, Ordering::SeqCst);
        self.saw_sample_weight
            .store(options.sample_weight.is_some(), Ordering::SeqCst);

        Ok(0.0)
    }

    fn item_embeddings(&self) -> ArrayView2<f32> {
        self.embeddings.view()
    }

    fn item_biases(&self) -> ArrayView1<f32> {
        self.biases.view()
    }
}
