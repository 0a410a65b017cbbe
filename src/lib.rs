#![deny(missing_docs)]
//! # brewtiful
//!
//! `brewtiful` turns the latent factors of a trained recommendation model
//! into ordered, deduplicated recommendation lists, measures how much of the
//! catalog those lists actually surface, and searches a conditional
//! hyperparameter space for well-performing model configurations with early
//! termination of unpromising trials.
//!
//! The model itself is a collaborator, not a resident: anything implementing
//! [`model::FactorizationModel`](model/trait.FactorizationModel.html) can be
//! scored, evaluated, and tuned. The crate only assumes the model exposes
//! per-item embeddings and biases, a predict operation, and incremental
//! fitting.
//!
//! ## Example
//!
//! The embedding-level queries work directly on an embedding matrix and an
//! identifier mapping:
//!
//! ```rust
//! extern crate brewtiful;
//! extern crate ndarray;
//!
//! use brewtiful::data::IdMapping;
//! use brewtiful::embedding::similar_items;
//!
//! # fn main() {
//! let embeddings = ndarray::arr2(&[[1.0, 0.0], [0.9, 0.1], [0.0, 1.0]]);
//! let mapping = IdMapping::from_ids(vec![10, 20, 30]);
//!
//! let similar = similar_items(10, embeddings.view(), &mapping, 2).unwrap();
//! assert_eq!(similar, vec![20, 30]);
//! # }
//! ```
#[macro_use]
extern crate failure;

#[macro_use]
extern crate itertools;

#[macro_use]
extern crate serde_derive;

extern crate ndarray;
extern crate rand;
extern crate rayon;
extern crate serde;
extern crate siphasher;

pub mod data;
pub mod embedding;
pub mod evaluation;
pub mod features;
pub mod model;
pub mod ranking;
pub mod search;

#[cfg(test)]
mod test_utils;

/// Alias for user indices.
pub type UserId = usize;
/// Alias for internal, dense item indices.
pub type ItemId = usize;
/// Alias for external catalog identifiers.
pub type CatalogId = u64;

/// Prediction error types.
#[derive(Debug, Fail)]
pub enum PredictionError {
    /// Failed prediction due to numerical issues.
    #[fail(display = "Invalid prediction value: non-finite or not a number.")]
    InvalidPredictionValue,
}

/// Fitting error types.
#[derive(Debug, Fail)]
pub enum FittingError {
    /// No interactions were given.
    #[fail(display = "No interactions were given.")]
    NoInteractions,
}

/// Errors produced by ranking, coverage, and embedding queries.
#[derive(Debug, Fail)]
pub enum RankingError {
    /// An external identifier is absent from the identifier mapping.
    #[fail(display = "Unknown item identifier: {}.", _0)]
    UnknownItem(CatalogId),
    /// A composed user vector has zero norm and cannot be normalized.
    #[fail(display = "Composed vector has zero norm.")]
    DegenerateVector,
    /// An index, count, or range argument was invalid.
    #[fail(display = "Invalid range: {}.", _0)]
    InvalidRange(String),
    /// A query vector does not match the embedding dimensionality.
    #[fail(display = "Query vector has dimension {}, embeddings have dimension {}.", _0, _1)]
    DimensionMismatch(usize, usize),
    /// The model failed to produce predictions.
    #[fail(display = "Prediction failed: {}", _0)]
    Prediction(#[fail(cause)] PredictionError),
}

impl From<PredictionError> for RankingError {
    fn from(error: PredictionError) -> Self {
        RankingError::Prediction(error)
    }
}
