pub mod collaborative;
pub mod content;
pub mod features;
pub mod hybrid;
pub mod popularity;

pub use collaborative::CollaborativeFilter;
pub use content::ContentRecommender;
pub use features::FeatureExtractor;
pub use hybrid::HybridBlender;
pub use popularity::PopularityRanker;

use crate::models::*;
use crate::services::store::DataStore;
use anyhow::Result;

/// A personalized recommender producing a ranked list for one user.
#[async_trait::async_trait]
pub trait Recommender: Send + Sync {
    async fn recommend(
        &self,
        user_id: UserId,
        limit: usize,
        min_similarity: f64,
    ) -> Result<Vec<Recommendation>>;
}

/// The user's ratings as item id -> rating value.
pub async fn load_rating_map(store: &dyn DataStore, user_id: UserId) -> Result<RatingMap> {
    Ok(store
        .ratings_of(user_id)
        .await?
        .into_iter()
        .map(|r| (r.item_id, f64::from(r.rating)))
        .collect())
}
