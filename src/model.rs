//! The model boundary: the trait a trained latent-factor model must expose,
//! and the configuration enums describing how one is to be trained.
use ndarray::{ArrayView1, ArrayView2};

use super::{FittingError, ItemId, PredictionError, RankingError, UserId};
use data::Interactions;
use features::ItemFeatures;

/// Trait describing a latent-factor model consumed by the scoring, coverage,
/// and search components. Training internals are the implementor's business;
/// this crate only drives `fit_partial`/`fit` and reads the learned state.
pub trait FactorizationModel {
    /// Compute a real-valued score for each of `item_ids` for the given user.
    fn predict(
        &self,
        user_id: UserId,
        item_ids: &[ItemId],
        item_features: Option<&ItemFeatures>,
    ) -> Result<Vec<f32>, PredictionError>;

    /// Train the model for a single epoch, returning the epoch loss.
    fn fit_partial(
        &mut self,
        interactions: &Interactions,
        options: &FitOptions,
    ) -> Result<f32, FittingError>;

    /// Train the model for `epochs` epochs in one call, returning the
    /// final loss.
    fn fit(
        &mut self,
        interactions: &Interactions,
        epochs: usize,
        options: &FitOptions,
    ) -> Result<f32, FittingError>;

    /// The learned per-item embedding matrix, `num_items` rows wide.
    fn item_embeddings(&self) -> ArrayView2<f32>;

    /// The learned per-item bias vector.
    fn item_biases(&self) -> ArrayView1<f32>;
}

/// Per-trial fitting arguments, fixed once at sampling time.
#[derive(Debug, Clone, Default)]
pub struct FitOptions {
    /// Optional per-interaction sample weights, aligned with the training
    /// interactions.
    pub sample_weight: Option<Vec<f32>>,
    /// Optional item side-features.
    pub item_features: Option<ItemFeatures>,
}

/// The learning-rate schedule used to train the model, with its
/// schedule-specific parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LearningSchedule {
    /// Adagrad.
    Adagrad {
        /// The initial learning rate.
        learning_rate: f32,
    },
    /// Adadelta.
    Adadelta {
        /// The decay factor of the squared-gradient average.
        rho: f32,
        /// The conditioning constant.
        epsilon: f32,
    },
}

/// The loss a model configuration trains with. Variants carry exactly the
/// parameters applicable to them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LossFunction {
    /// Bayesian Personalised Ranking.
    Bpr,
    /// Logistic loss.
    Logistic,
    /// WARP: pairwise rank loss with sampled negatives.
    Warp {
        /// The maximum number of negatives sampled per positive.
        max_sampled: usize,
    },
    /// k-OS WARP: pairwise rank loss over the k-th order statistic of a
    /// sample of `n` positives.
    WarpKos {
        /// The maximum number of negatives sampled per positive.
        max_sampled: usize,
        /// The order statistic used for updates.
        k: usize,
        /// The number of sampled positives; at least `k`.
        n: usize,
    },
}

impl LossFunction {
    /// Construct a k-OS WARP loss, validating the `k <= n` ordering.
    pub fn warp_kos(max_sampled: usize, k: usize, n: usize) -> Result<Self, RankingError> {
        if k == 0 || n < k {
            return Err(RankingError::InvalidRange(format!(
                "k-OS order statistic k = {} must be positive and at most n = {}",
                k, n
            )));
        }

        Ok(LossFunction::WarpKos { max_sampled, k, n })
    }

    /// Whether per-interaction sample weighting may be combined with this
    /// loss. k-OS WARP and weighting are mutually exclusive.
    pub fn allows_sample_weight(&self) -> bool {
        match *self {
            LossFunction::WarpKos { .. } => false,
            _ => true,
        }
    }

    /// The loss family this configuration belongs to.
    pub fn kind(&self) -> LossKind {
        match *self {
            LossFunction::Bpr => LossKind::Bpr,
            LossFunction::Logistic => LossKind::Logistic,
            LossFunction::Warp { .. } => LossKind::Warp,
            LossFunction::WarpKos { .. } => LossKind::WarpKos,
        }
    }
}

/// The loss families a hyperparameter search may choose between.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossKind {
    /// Bayesian Personalised Ranking.
    Bpr,
    /// Logistic loss.
    Logistic,
    /// WARP.
    Warp,
    /// k-OS WARP.
    WarpKos,
}

impl LossKind {
    /// The canonical name of this loss family.
    pub fn name(&self) -> &'static str {
        match *self {
            LossKind::Bpr => "bpr",
            LossKind::Logistic => "logistic",
            LossKind::Warp => "warp",
            LossKind::WarpKos => "warp-kos",
        }
    }

    /// All supported loss families.
    pub fn all() -> Vec<LossKind> {
        vec![
            LossKind::Bpr,
            LossKind::Warp,
            LossKind::WarpKos,
            LossKind::Logistic,
        ]
    }
}
