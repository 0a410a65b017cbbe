//! Adaptive hyperparameter search: conditional sampling, epoch-wise
//! training, and pruning of unpromising trials.
use rand::distributions::{Distribution, Uniform};
use rand::{Rng, SeedableRng, XorShiftRng};

use super::{FittingError, RankingError};
use data::Interactions;
use evaluation::precision_at_k;
use features::FeatureSource;
use model::{
    FactorizationModel, FitOptions, LearningSchedule, LossFunction, LossKind,
};

/// Errors produced while running a search trial.
#[derive(Debug, Fail)]
pub enum SearchError {
    /// Evaluating the validation objective failed.
    #[fail(display = "Evaluation failed: {}", _0)]
    Ranking(#[fail(cause)] RankingError),
    /// Training the model failed.
    #[fail(display = "Fitting failed: {}", _0)]
    Fitting(#[fail(cause)] FittingError),
}

impl From<RankingError> for SearchError {
    fn from(error: RankingError) -> Self {
        SearchError::Ranking(error)
    }
}

impl From<FittingError> for SearchError {
    fn from(error: FittingError) -> Self {
        SearchError::Fitting(error)
    }
}

/// The search framework's trial handle: parameter suggestions flow out of
/// it, intermediate objective values flow back into it.
pub trait Trial {
    /// Suggest an integer in `[low, high]`.
    fn suggest_int(&mut self, name: &str, low: usize, high: usize) -> usize;
    /// Suggest a float in `[low, high)`, log-uniformly when `log` is set.
    fn suggest_float(&mut self, name: &str, low: f64, high: f64, log: bool) -> f64;
    /// Suggest one of `choices`, returned as an index into the slice.
    fn suggest_categorical(&mut self, name: &str, choices: &[&str]) -> usize;
    /// Report an intermediate objective value for the given epoch.
    fn report(&mut self, value: f32, epoch: usize);
    /// Whether the framework considers this trial unpromising. Consulted
    /// after every report.
    fn should_prune(&self) -> bool;
}

/// How a trial ended: either it trained all its epochs, or the framework
/// pruned it at a report boundary. Pruning is a normal outcome, not an
/// error, and pruned trials must not be retried.
#[derive(Clone, Debug, PartialEq)]
pub enum TrialOutcome {
    /// All epochs trained; the final validation precision-at-k.
    Completed(f32),
    /// The trial was aborted after reporting at this epoch.
    Pruned {
        /// The zero-based epoch index of the last report.
        epoch: usize,
    },
}

/// Controller settings shared by every trial of a search.
#[derive(Clone, Debug)]
pub struct SearchConfig {
    seed: [u8; 16],
    precision_k: usize,
    sample_weight: Option<Vec<f32>>,
    losses: Vec<LossKind>,
    enable_pruning: bool,
    pruning_interval: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig::new()
    }
}

impl SearchConfig {
    /// Create a configuration with the default settings: precision@10,
    /// all loss families as candidates, pruning every 5 epochs.
    pub fn new() -> Self {
        SearchConfig {
            seed: [123; 16],
            precision_k: 10,
            sample_weight: None,
            losses: LossKind::all(),
            enable_pruning: true,
            pruning_interval: 5,
        }
    }

    /// Set the random seed handed to model construction.
    pub fn seed(mut self, seed: [u8; 16]) -> Self {
        self.seed = seed;
        self
    }

    /// Set the precision-at-k cutoff used for the validation objective.
    pub fn precision_k(mut self, k: usize) -> Self {
        self.precision_k = k;
        self
    }

    /// Supply per-interaction sample weights for training.
    pub fn sample_weight(mut self, weights: Vec<f32>) -> Self {
        self.sample_weight = Some(weights);
        self
    }

    /// Set the candidate loss families the search may choose between.
    pub fn losses(mut self, losses: Vec<LossKind>) -> Self {
        self.losses = losses;
        self
    }

    /// Enable or disable pruning. With pruning disabled, trials train all
    /// epochs in a single fit call and never report.
    pub fn enable_pruning(mut self, enable: bool) -> Self {
        self.enable_pruning = enable;
        self
    }

    /// Evaluate and report every `interval` epochs.
    pub fn pruning_interval(mut self, interval: usize) -> Self {
        self.pruning_interval = interval;
        self
    }
}

/// The blending weights applied to brewery and style feature columns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureBlend {
    /// Weight of the brewery column.
    pub brewery: f32,
    /// Weight of the style column.
    pub style: f32,
}

/// A fully sampled model configuration. Conditional parameters live inside
/// the variant they belong to, so a configuration can never carry a
/// parameter its choices do not call for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    /// The latent embedding dimension.
    pub latent_dim: usize,
    /// The learning-rate schedule and its parameters.
    pub schedule: LearningSchedule,
    /// The training loss and its parameters.
    pub loss: LossFunction,
    /// L2 regularization strength on item features.
    pub item_alpha: f32,
    /// L2 regularization strength on user features.
    pub user_alpha: f32,
    /// The number of training epochs.
    pub epochs: usize,
    /// Blend weights for item side-features, when features are in use.
    pub feature_blend: Option<FeatureBlend>,
    /// The seed for model parameter initialization.
    pub seed: [u8; 16],
}

impl Hyperparameters {
    /// Draw a configuration from the conditional parameter space.
    ///
    /// Base parameters are sampled first; schedule- and loss-specific
    /// parameters only when their governing choice selects them. For the
    /// k-OS loss, `k` is sampled before `n` and bounds it from below.
    pub fn sample<T: Trial>(
        trial: &mut T,
        config: &SearchConfig,
        with_features: bool,
    ) -> Result<Hyperparameters, SearchError> {
        if config.losses.is_empty() {
            return Err(SearchError::Ranking(RankingError::InvalidRange(
                "the candidate loss list is empty".to_owned(),
            )));
        }

        let latent_dim = trial.suggest_int("no_components", 5, 128);

        let schedule_choice =
            trial.suggest_categorical("learning_schedule", &["adagrad", "adadelta"]);

        let loss_names: Vec<&str> = config.losses.iter().map(LossKind::name).collect();
        let loss_choice = trial.suggest_categorical("loss", &loss_names);
        let loss_kind = *config.losses.get(loss_choice).ok_or_else(|| {
            SearchError::Ranking(RankingError::InvalidRange(format!(
                "loss choice {} is outside the {} candidates",
                loss_choice,
                config.losses.len()
            )))
        })?;

        let item_alpha = trial.suggest_float("item_alpha", 1e-10, 1e-6, true) as f32;
        let user_alpha = trial.suggest_float("user_alpha", 1e-10, 1e-6, true) as f32;

        let schedule = if schedule_choice == 0 {
            LearningSchedule::Adagrad {
                learning_rate: trial.suggest_float("learning_rate", 1e-3, 1.0, true) as f32,
            }
        } else {
            LearningSchedule::Adadelta {
                rho: trial.suggest_float("rho", 0.9, 0.999, false) as f32,
                epsilon: trial.suggest_float("epsilon", 1e-8, 1e-6, true) as f32,
            }
        };

        let loss = match loss_kind {
            LossKind::Bpr => LossFunction::Bpr,
            LossKind::Logistic => LossFunction::Logistic,
            LossKind::Warp => LossFunction::Warp {
                max_sampled: trial.suggest_int("max_sampled", 5, 15),
            },
            LossKind::WarpKos => {
                let max_sampled = trial.suggest_int("max_sampled", 5, 15);
                let k = trial.suggest_int("k", 1, 10);
                let n = trial.suggest_int("n", k, 20);

                LossFunction::warp_kos(max_sampled, k, n)?
            }
        };

        let epochs = trial.suggest_int("epochs", 20, 50);

        if epochs == 0 {
            return Err(SearchError::Ranking(RankingError::InvalidRange(
                "epoch count must be positive".to_owned(),
            )));
        }

        let feature_blend = if with_features {
            Some(FeatureBlend {
                brewery: trial.suggest_float("b", 0.0, 0.5, false) as f32,
                style: trial.suggest_float("s", 0.0, 0.5, false) as f32,
            })
        } else {
            None
        };

        Ok(Hyperparameters {
            latent_dim,
            schedule,
            loss,
            item_alpha,
            user_alpha,
            epochs,
            feature_blend,
            seed: config.seed,
        })
    }
}

/// Run a single trial: sample a configuration, build a model with it, train
/// epoch by epoch, and report the validation precision to the framework.
///
/// With pruning enabled, the model is trained one epoch at a time; every
/// `pruning_interval` epochs, and unconditionally on the final epoch, the
/// validation precision-at-k is computed and reported. If the framework then
/// asks for pruning, the trial stops at that epoch boundary and returns
/// [`TrialOutcome::Pruned`](enum.TrialOutcome.html) — no further epochs are
/// trained. Otherwise the outcome is the last computed precision.
///
/// With pruning disabled, all epochs are trained in one fit call and the
/// objective is computed once.
pub fn run_trial<T, M, F>(
    trial: &mut T,
    train: &Interactions,
    validation: &Interactions,
    features: Option<&FeatureSource>,
    build: F,
    config: &SearchConfig,
) -> Result<TrialOutcome, SearchError>
where
    T: Trial,
    M: FactorizationModel + Sync,
    F: Fn(&Hyperparameters) -> M,
{
    if config.enable_pruning && config.pruning_interval == 0 {
        return Err(SearchError::Ranking(RankingError::InvalidRange(
            "pruning interval must be positive".to_owned(),
        )));
    }

    let hyper = Hyperparameters::sample(trial, config, features.is_some())?;

    let item_features = match (features, &hyper.feature_blend) {
        (Some(source), &Some(ref blend)) => Some(source.build(blend.brewery, blend.style)?),
        _ => None,
    };

    // Weighting and the k-OS loss are mutually exclusive; the options are
    // fixed here for the whole trial.
    let sample_weight = if hyper.loss.allows_sample_weight() {
        config.sample_weight.clone()
    } else {
        None
    };

    let options = FitOptions {
        sample_weight,
        item_features,
    };

    let mut model = build(&hyper);

    let train_matrix = train.to_compressed();
    let validation_matrix = validation.to_compressed();

    if config.enable_pruning {
        let mut last_precision = 0.0;

        for epoch in 0..hyper.epochs {
            model.fit_partial(train, &options)?;

            if (epoch + 1) % config.pruning_interval == 0 || epoch + 1 == hyper.epochs {
                let precision = precision_at_k(
                    &model,
                    &train_matrix,
                    &validation_matrix,
                    options.item_features.as_ref(),
                    config.precision_k,
                )?;

                trial.report(precision, epoch);

                if trial.should_prune() {
                    return Ok(TrialOutcome::Pruned { epoch });
                }

                last_precision = precision;
            }
        }

        Ok(TrialOutcome::Completed(last_precision))
    } else {
        model.fit(train, hyper.epochs, &options)?;

        let precision = precision_at_k(
            &model,
            &train_matrix,
            &validation_matrix,
            options.item_features.as_ref(),
            config.precision_k,
        )?;

        Ok(TrialOutcome::Completed(precision))
    }
}

/// A trial that samples every suggestion uniformly at random (log-uniformly
/// where requested) from an explicitly seeded generator. It records reported
/// values and never prunes.
pub struct RandomTrial {
    rng: XorShiftRng,
    reports: Vec<(usize, f32)>,
}

impl RandomTrial {
    /// Create a random trial from a seed.
    pub fn new(seed: [u8; 16]) -> Self {
        RandomTrial {
            rng: XorShiftRng::from_seed(seed),
            reports: Vec::new(),
        }
    }

    /// The `(epoch, value)` pairs reported so far.
    pub fn reports(&self) -> &[(usize, f32)] {
        &self.reports
    }
}

impl Trial for RandomTrial {
    fn suggest_int(&mut self, _name: &str, low: usize, high: usize) -> usize {
        Uniform::new_inclusive(low, high).sample(&mut self.rng)
    }

    fn suggest_float(&mut self, _name: &str, low: f64, high: f64, log: bool) -> f64 {
        if log {
            self.rng.gen_range(low.ln(), high.ln()).exp()
        } else {
            self.rng.gen_range(low, high)
        }
    }

    fn suggest_categorical(&mut self, _name: &str, choices: &[&str]) -> usize {
        self.rng.gen_range(0, choices.len())
    }

    fn report(&mut self, value: f32, epoch: usize) {
        self.reports.push((epoch, value));
    }

    fn should_prune(&self) -> bool {
        false
    }
}
