//! Item side-feature construction: blends brewery and style columns into a
//! sparse per-item feature representation consumable by the model.
use std::collections::BTreeMap;

use super::{CatalogId, RankingError};
use data::IdMapping;

/// A single catalog row describing an item's side attributes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// The external catalog identifier.
    pub item_id: CatalogId,
    /// The brewery the item belongs to.
    pub brewery: String,
    /// The item's style.
    pub style: String,
}

impl CatalogEntry {
    /// Create a new catalog entry.
    pub fn new<S: Into<String>>(item_id: CatalogId, brewery: S, style: S) -> Self {
        CatalogEntry {
            item_id,
            brewery: brewery.into(),
            style: style.into(),
        }
    }
}

/// A sparse item-feature matrix: one row per item, each row a list of
/// `(feature_index, weight)` pairs. Opaque to the scoring core; passed
/// through to the model's predict and fit calls.
#[derive(Clone, Debug)]
pub struct ItemFeatures {
    num_features: usize,
    rows: Vec<Vec<(usize, f32)>>,
}

impl ItemFeatures {
    /// The number of items (rows).
    pub fn num_items(&self) -> usize {
        self.rows.len()
    }

    /// The total number of feature columns.
    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// The `(feature_index, weight)` pairs of a single item.
    pub fn row(&self, item_idx: usize) -> &[(usize, f32)] {
        &self.rows[item_idx]
    }
}

/// The catalog data and identifier mapping from which item features are
/// built. Blend weights vary per trial, so features are rebuilt on demand.
pub struct FeatureSource {
    entries: Vec<CatalogEntry>,
    mapping: IdMapping,
}

impl FeatureSource {
    /// Create a feature source from catalog entries and the dataset's
    /// identifier mapping.
    pub fn new(entries: Vec<CatalogEntry>, mapping: IdMapping) -> Self {
        FeatureSource { entries, mapping }
    }

    /// Build the item-feature matrix. Every item gets an identity feature at
    /// weight 1.0; items with catalog entries additionally get their brewery
    /// column at `brewery_weight` and their style column at `style_weight`.
    /// Fails with `UnknownItem` if a catalog entry's identifier is absent
    /// from the mapping.
    pub fn build(
        &self,
        brewery_weight: f32,
        style_weight: f32,
    ) -> Result<ItemFeatures, RankingError> {
        let num_items = self.mapping.len();

        // BTreeMaps keep the column assignment deterministic.
        let mut breweries = BTreeMap::new();
        let mut styles = BTreeMap::new();

        for entry in &self.entries {
            let next = breweries.len();
            breweries.entry(entry.brewery.as_str()).or_insert(next);
            let next = styles.len();
            styles.entry(entry.style.as_str()).or_insert(next);
        }

        let style_offset = num_items + breweries.len();

        let mut rows: Vec<Vec<(usize, f32)>> =
            (0..num_items).map(|idx| vec![(idx, 1.0)]).collect();

        for entry in &self.entries {
            let idx = self.mapping.internal(entry.item_id)?;
            let brewery_column = num_items + breweries[entry.brewery.as_str()];
            let style_column = style_offset + styles[entry.style.as_str()];

            rows[idx] = vec![
                (idx, 1.0),
                (brewery_column, brewery_weight),
                (style_column, style_weight),
            ];
        }

        Ok(ItemFeatures {
            num_features: style_offset + styles.len(),
            rows,
        })
    }
}
