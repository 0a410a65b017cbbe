//! Interaction containers, identifier mappings, and dataset splits.
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hasher;

use rand::Rng;

use siphasher::sip::SipHasher;

use super::{CatalogId, ItemId, RankingError, UserId};

fn default_weight() -> f32 {
    1.0
}

/// A single observed user-item interaction.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Interaction {
    user_id: UserId,
    item_id: ItemId,
    #[serde(default = "default_weight")]
    weight: f32,
}

impl Interaction {
    /// Create a new interaction.
    pub fn new(user_id: UserId, item_id: ItemId, weight: f32) -> Self {
        Interaction {
            user_id,
            item_id,
            weight,
        }
    }

    /// The user index of this interaction.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// The item index of this interaction.
    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    /// The interaction weight.
    pub fn weight(&self) -> f32 {
        self.weight
    }
}

/// Randomly split interactions into test and train sets.
pub fn train_test_split<R: Rng>(
    interactions: &mut Interactions,
    rng: &mut R,
    test_fraction: f32,
) -> (Interactions, Interactions) {
    interactions.shuffle(rng);

    let (test, train) = interactions.split_at((test_fraction * interactions.len() as f32) as usize);

    (train, test)
}

/// Split interactions into train and test sets so that no user is present
/// in both. Users are assigned via a keyed hash, making the assignment
/// deterministic for a given pair of keys.
pub fn user_based_split<R: Rng>(
    interactions: &mut Interactions,
    rng: &mut R,
    test_fraction: f32,
) -> (Interactions, Interactions) {
    let denominator = 100_000;
    let train_cutoff = (test_fraction * denominator as f32) as u64;

    let (key_0, key_1) = (rng.gen::<u64>(), rng.gen::<u64>());

    let is_train = |x: &Interaction| {
        let mut hasher = SipHasher::new_with_keys(key_0, key_1);
        hasher.write_usize(x.user_id());
        hasher.finish() % denominator > train_cutoff
    };

    interactions.split_by(is_train)
}

/// A sparse user-item interaction matrix in coordinate form. Rows are users,
/// columns are items; entries carry interaction weights.
pub struct Interactions {
    num_users: usize,
    num_items: usize,
    interactions: Vec<Interaction>,
}

impl Interactions {
    /// Create an empty interaction matrix with at least the given dimensions.
    pub fn new(num_users: usize, num_items: usize) -> Self {
        Interactions {
            num_users,
            num_items,
            interactions: Vec::new(),
        }
    }

    /// Add a single interaction, growing the dimensions if necessary.
    pub fn push(&mut self, interaction: Interaction) {
        self.num_users = self.num_users.max(interaction.user_id() + 1);
        self.num_items = self.num_items.max(interaction.item_id() + 1);
        self.interactions.push(interaction);
    }

    /// The underlying interaction data.
    pub fn data(&self) -> &[Interaction] {
        &self.interactions
    }

    /// The number of interactions.
    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    /// Whether there are no interactions.
    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    /// Shuffle the interactions in place.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        rng.shuffle(&mut self.interactions);
    }

    /// Split into two halves at the given position.
    pub fn split_at(&self, idx: usize) -> (Self, Self) {
        let head = Interactions {
            num_users: self.num_users,
            num_items: self.num_items,
            interactions: self.interactions[..idx].to_owned(),
        };
        let tail = Interactions {
            num_users: self.num_users,
            num_items: self.num_items,
            interactions: self.interactions[idx..].to_owned(),
        };

        (head, tail)
    }

    /// Split into two sets based on a predicate; interactions satisfying it
    /// go into the first set.
    pub fn split_by<F: Fn(&Interaction) -> bool>(&self, func: F) -> (Self, Self) {
        let head = Interactions {
            num_users: self.num_users,
            num_items: self.num_items,
            interactions: self
                .interactions
                .iter()
                .filter(|x| func(x))
                .cloned()
                .collect(),
        };
        let tail = Interactions {
            num_users: self.num_users,
            num_items: self.num_items,
            interactions: self
                .interactions
                .iter()
                .filter(|x| !func(x))
                .cloned()
                .collect(),
        };

        (head, tail)
    }

    /// Convert to a compressed per-user representation.
    pub fn to_compressed(&self) -> CompressedInteractions {
        CompressedInteractions::from(self)
    }

    /// The number of users.
    pub fn num_users(&self) -> usize {
        self.num_users
    }

    /// The number of items.
    pub fn num_items(&self) -> usize {
        self.num_items
    }

    /// The (num_users, num_items) shape.
    pub fn shape(&self) -> (usize, usize) {
        (self.num_users, self.num_items)
    }
}

impl From<Vec<Interaction>> for Interactions {
    fn from(data: Vec<Interaction>) -> Interactions {
        let num_users = data.iter().map(|x| x.user_id()).max().map_or(0, |x| x + 1);
        let num_items = data.iter().map(|x| x.item_id()).max().map_or(0, |x| x + 1);

        Interactions {
            num_users,
            num_items,
            interactions: data,
        }
    }
}

fn cmp_user_item(x: &Interaction, y: &Interaction) -> Ordering {
    x.user_id()
        .cmp(&y.user_id())
        .then_with(|| x.item_id().cmp(&y.item_id()))
}

/// A sparse user-item interaction matrix in CSR form, giving cheap access
/// to the items (and weights) of every user.
pub struct CompressedInteractions {
    num_users: usize,
    num_items: usize,
    user_pointers: Vec<usize>,
    item_ids: Vec<ItemId>,
    weights: Vec<f32>,
}

impl<'a> From<&'a Interactions> for CompressedInteractions {
    fn from(interactions: &Interactions) -> CompressedInteractions {
        let mut data = interactions.data().to_owned();

        data.sort_by(cmp_user_item);

        let mut user_pointers = vec![0; interactions.num_users + 1];
        let mut item_ids = Vec::with_capacity(data.len());
        let mut weights = Vec::with_capacity(data.len());

        for datum in &data {
            item_ids.push(datum.item_id());
            weights.push(datum.weight());

            user_pointers[datum.user_id() + 1] += 1;
        }

        for idx in 1..user_pointers.len() {
            user_pointers[idx] += user_pointers[idx - 1];
        }

        CompressedInteractions {
            num_users: interactions.num_users,
            num_items: interactions.num_items,
            user_pointers,
            item_ids,
            weights,
        }
    }
}

impl CompressedInteractions {
    /// Iterate over all users.
    pub fn iter_users(&self) -> CompressedInteractionsUserIterator {
        CompressedInteractionsUserIterator {
            interactions: self,
            idx: 0,
        }
    }

    /// Get a single user's interactions, or `None` if the index is out
    /// of bounds.
    pub fn get_user(&self, user_id: UserId) -> Option<CompressedInteractionsUser> {
        if user_id >= self.num_users {
            return None;
        }

        let start = self.user_pointers[user_id];
        let stop = self.user_pointers[user_id + 1];

        Some(CompressedInteractionsUser {
            user_id,
            item_ids: &self.item_ids[start..stop],
            weights: &self.weights[start..stop],
        })
    }

    /// The number of users.
    pub fn num_users(&self) -> usize {
        self.num_users
    }

    /// The number of items.
    pub fn num_items(&self) -> usize {
        self.num_items
    }

    /// The (num_users, num_items) shape.
    pub fn shape(&self) -> (usize, usize) {
        (self.num_users, self.num_items)
    }
}

/// Iterator over the users of a `CompressedInteractions`.
pub struct CompressedInteractionsUserIterator<'a> {
    interactions: &'a CompressedInteractions,
    idx: usize,
}

/// A single user's interactions.
#[derive(Debug)]
pub struct CompressedInteractionsUser<'a> {
    /// The user index.
    pub user_id: UserId,
    /// The items this user interacted with.
    pub item_ids: &'a [ItemId],
    /// The weights of those interactions.
    pub weights: &'a [f32],
}

impl<'a> CompressedInteractionsUser<'a> {
    /// Whether the user has no interactions.
    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }
}

impl<'a> Iterator for CompressedInteractionsUserIterator<'a> {
    type Item = CompressedInteractionsUser<'a>;
    fn next(&mut self) -> Option<Self::Item> {
        let value = if self.idx >= self.interactions.num_users {
            None
        } else {
            let start = self.interactions.user_pointers[self.idx];
            let stop = self.interactions.user_pointers[self.idx + 1];

            Some(CompressedInteractionsUser {
                user_id: self.idx,
                item_ids: &self.interactions.item_ids[start..stop],
                weights: &self.interactions.weights[start..stop],
            })
        };

        self.idx += 1;

        value
    }
}

/// A bijection between external catalog identifiers and the dense item
/// indices used by the model. Built once from the dataset, read-only
/// during scoring.
#[derive(Clone, Debug)]
pub struct IdMapping {
    forward: HashMap<CatalogId, ItemId>,
    inverse: Vec<CatalogId>,
}

impl IdMapping {
    /// Build a mapping from an iterator of external identifiers. The first
    /// occurrence of each identifier determines its internal index.
    pub fn from_ids<I: IntoIterator<Item = CatalogId>>(ids: I) -> Self {
        let mut forward = HashMap::new();
        let mut inverse = Vec::new();

        for id in ids {
            if !forward.contains_key(&id) {
                forward.insert(id, inverse.len());
                inverse.push(id);
            }
        }

        IdMapping { forward, inverse }
    }

    /// Map an external identifier to its internal index.
    pub fn internal(&self, id: CatalogId) -> Result<ItemId, RankingError> {
        self.forward
            .get(&id)
            .cloned()
            .ok_or_else(|| RankingError::UnknownItem(id))
    }

    /// Map an internal index back to its external identifier.
    pub fn external(&self, idx: ItemId) -> Option<CatalogId> {
        self.inverse.get(idx).cloned()
    }

    /// The number of mapped identifiers.
    pub fn len(&self) -> usize {
        self.inverse.len()
    }

    /// Whether the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.inverse.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, XorShiftRng};

    use super::*;

    fn sample_interactions() -> Interactions {
        let mut interactions = Interactions::new(0, 0);

        for user_id in 0..20 {
            for item_id in 0..5 {
                interactions.push(Interaction::new(user_id, (user_id + item_id) % 7, 1.0));
            }
        }

        interactions
    }

    #[test]
    fn compressed_groups_items_by_user() {
        let interactions = Interactions::from(vec![
            Interaction::new(1, 3, 1.0),
            Interaction::new(0, 2, 0.5),
            Interaction::new(1, 1, 2.0),
            Interaction::new(0, 0, 1.0),
        ]);

        let compressed = interactions.to_compressed();

        assert_eq!(compressed.shape(), (2, 4));

        let user_0 = compressed.get_user(0).unwrap();
        assert_eq!(user_0.item_ids, &[0, 2]);
        assert_eq!(user_0.weights, &[1.0, 0.5]);

        let user_1 = compressed.get_user(1).unwrap();
        assert_eq!(user_1.item_ids, &[1, 3]);

        assert!(compressed.get_user(2).is_none());
    }

    #[test]
    fn user_split_is_disjoint_over_users() {
        let mut interactions = sample_interactions();
        let mut rng = XorShiftRng::from_seed([42; 16]);

        let (train, test) = user_based_split(&mut interactions, &mut rng, 0.5);

        assert_eq!(train.len() + test.len(), interactions.len());

        let train_users: Vec<UserId> = train.data().iter().map(|x| x.user_id()).collect();

        for interaction in test.data() {
            assert!(!train_users.contains(&interaction.user_id()));
        }
    }

    #[test]
    fn mapping_is_a_bijection() {
        let mapping = IdMapping::from_ids(vec![100, 7, 42, 7]);

        assert_eq!(mapping.len(), 3);

        for (idx, &id) in [100, 7, 42].iter().enumerate() {
            assert_eq!(mapping.internal(id).unwrap(), idx);
            assert_eq!(mapping.external(idx).unwrap(), id);
        }

        assert!(mapping.external(3).is_none());

        match mapping.internal(99) {
            Err(RankingError::UnknownItem(99)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
