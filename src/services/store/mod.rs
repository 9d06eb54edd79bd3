use crate::models::*;
use crate::utils::validation::{validate_rating, ValidationError};
use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

pub mod synthetic;

pub use synthetic::SyntheticCatalog;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("invalid rating: {0}")]
    InvalidRating(#[from] ValidationError),

    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse dataset: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Read side of the catalog as consumed by the recommenders.
///
/// Implementations must never return two ratings for the same
/// (user, item) pair from a single call.
#[async_trait::async_trait]
pub trait DataStore: Send + Sync {
    async fn ratings_of(&self, user_id: UserId) -> Result<Vec<UserRating>>;

    async fn all_ratings(&self) -> Result<Vec<Rating>>;

    async fn item_by_id(&self, item_id: ItemId) -> Result<Option<Item>>;

    async fn items_matching(&self, filter: &ItemFilter) -> Result<Vec<Item>>;

    /// Items passing `filter` with at least `min_count` ratings, joined with
    /// their average rating and rating count.
    async fn rating_aggregate_by_item(
        &self,
        filter: &ItemFilter,
        min_count: usize,
    ) -> Result<Vec<ItemAggregate>>;

    /// Like [`DataStore::rating_aggregate_by_item`] but only over ratings
    /// created at or after `cutoff`. Items without such ratings are omitted.
    async fn rating_aggregate_by_item_since(
        &self,
        cutoff: DateTime<Utc>,
        filter: &ItemFilter,
    ) -> Result<Vec<ItemAggregate>>;

    /// Monotonic counter that changes on every write.
    fn version(&self) -> u64;

    async fn items_by_ids(&self, item_ids: &[ItemId]) -> Result<Vec<Item>> {
        let mut items = Vec::with_capacity(item_ids.len());
        for item_id in item_ids {
            if let Some(item) = self.item_by_id(*item_id).await? {
                items.push(item);
            }
        }
        Ok(items)
    }
}

#[derive(Debug, Default)]
struct StoreState {
    users: HashMap<UserId, User>,
    items: HashMap<ItemId, Item>,
    ratings: HashMap<UserId, HashMap<ItemId, Rating>>,
}

impl StoreState {
    fn aggregate<F>(&self, filter: &ItemFilter, include: F) -> Vec<ItemAggregate>
    where
        F: Fn(&Rating) -> bool,
    {
        let mut stats: HashMap<ItemId, (f64, usize)> = HashMap::new();
        for rating in self.ratings.values().flat_map(|by_item| by_item.values()) {
            if !include(rating) {
                continue;
            }
            let entry = stats.entry(rating.item_id).or_insert((0.0, 0));
            entry.0 += f64::from(rating.rating);
            entry.1 += 1;
        }

        stats
            .into_iter()
            .filter_map(|(item_id, (sum, count))| {
                let item = self.items.get(&item_id)?;
                if !filter.matches(item) {
                    return None;
                }
                Some(ItemAggregate {
                    item: item.clone(),
                    avg_rating: sum / count as f64,
                    count,
                })
            })
            .collect()
    }
}

/// Process-local catalog backing the server, the CLI and the tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
    version: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dataset(dataset: Dataset) -> Result<Self, StoreError> {
        let store = Self::new();
        store.load_dataset(dataset)?;
        Ok(store)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let dataset: Dataset = serde_json::from_str(&raw)?;
        info!("Loaded dataset from {}", path.as_ref().display());
        Self::from_dataset(dataset)
    }

    fn bump_version(&self) {
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    pub fn insert_user(&self, user: User) {
        self.state.write().users.insert(user.id, user);
        self.bump_version();
    }

    pub fn insert_item(&self, item: Item) {
        debug!("Inserted item {} ({})", item.id, item.item_type());
        self.state.write().items.insert(item.id, item);
        self.bump_version();
    }

    /// Creates or replaces the rating for (user, item). A replacement keeps the
    /// original `created_at`.
    pub fn upsert_rating(&self, rating: Rating) -> Result<Rating, StoreError> {
        validate_rating(&rating)?;

        let stored = {
            let mut state = self.state.write();
            if !state.items.contains_key(&rating.item_id) {
                return Err(StoreError::ItemNotFound(rating.item_id));
            }

            state
                .users
                .entry(rating.user_id)
                .or_insert_with(|| User {
                    id: rating.user_id,
                    username: None,
                    created_at: rating.created_at,
                });

            let by_item = state.ratings.entry(rating.user_id).or_default();
            match by_item.get_mut(&rating.item_id) {
                Some(existing) => {
                    existing.rating = rating.rating;
                    existing.updated_at = Utc::now();
                    existing.clone()
                }
                None => {
                    by_item.insert(rating.item_id, rating.clone());
                    rating
                }
            }
        };

        self.bump_version();
        Ok(stored)
    }

    pub fn delete_rating(&self, user_id: UserId, item_id: ItemId) -> bool {
        let removed = self
            .state
            .write()
            .ratings
            .get_mut(&user_id)
            .and_then(|by_item| by_item.remove(&item_id))
            .is_some();

        if removed {
            self.bump_version();
        }
        removed
    }

    pub fn load_dataset(&self, dataset: Dataset) -> Result<(), StoreError> {
        let Dataset { users, items, ratings } = dataset;
        let (user_count, item_count, rating_count) = (users.len(), items.len(), ratings.len());

        for user in users {
            self.insert_user(user);
        }
        for item in items {
            self.insert_item(item);
        }
        for rating in ratings {
            self.upsert_rating(rating)?;
        }

        info!(
            users = user_count,
            items = item_count,
            ratings = rating_count,
            "Dataset loaded into in-memory store"
        );
        Ok(())
    }

    pub fn user(&self, user_id: UserId) -> Option<User> {
        self.state.read().users.get(&user_id).cloned()
    }

    /// Every rating of `item_id`, newest first.
    pub fn ratings_for_item(&self, item_id: ItemId) -> Vec<Rating> {
        let state = self.state.read();
        let mut ratings: Vec<Rating> = state
            .ratings
            .values()
            .filter_map(|by_item| by_item.get(&item_id).cloned())
            .collect();
        ratings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        ratings
    }

    pub fn rating_count(&self) -> usize {
        self.state.read().ratings.values().map(HashMap::len).sum()
    }

    pub fn item_count(&self) -> usize {
        self.state.read().items.len()
    }
}

#[async_trait::async_trait]
impl DataStore for InMemoryStore {
    async fn ratings_of(&self, user_id: UserId) -> Result<Vec<UserRating>> {
        let state = self.state.read();
        Ok(state
            .ratings
            .get(&user_id)
            .map(|by_item| by_item.values().map(UserRating::from).collect())
            .unwrap_or_default())
    }

    async fn all_ratings(&self) -> Result<Vec<Rating>> {
        let state = self.state.read();
        Ok(state
            .ratings
            .values()
            .flat_map(|by_item| by_item.values().cloned())
            .collect())
    }

    async fn item_by_id(&self, item_id: ItemId) -> Result<Option<Item>> {
        Ok(self.state.read().items.get(&item_id).cloned())
    }

    async fn items_matching(&self, filter: &ItemFilter) -> Result<Vec<Item>> {
        let state = self.state.read();
        Ok(state
            .items
            .values()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect())
    }

    async fn rating_aggregate_by_item(
        &self,
        filter: &ItemFilter,
        min_count: usize,
    ) -> Result<Vec<ItemAggregate>> {
        let state = self.state.read();
        let mut aggregates = state.aggregate(filter, |_| true);
        aggregates.retain(|agg| agg.count >= min_count);
        Ok(aggregates)
    }

    async fn rating_aggregate_by_item_since(
        &self,
        cutoff: DateTime<Utc>,
        filter: &ItemFilter,
    ) -> Result<Vec<ItemAggregate>> {
        let state = self.state.read();
        Ok(state.aggregate(filter, |rating| rating.created_at >= cutoff))
    }

    fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    async fn items_by_ids(&self, item_ids: &[ItemId]) -> Result<Vec<Item>> {
        let state = self.state.read();
        Ok(item_ids
            .iter()
            .filter_map(|id| state.items.get(id).cloned())
            .collect())
    }
}
