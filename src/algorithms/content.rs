use crate::algorithms::features::FeatureExtractor;
use crate::algorithms::Recommender;
use crate::config::RecommendationConfig;
use crate::models::*;
use crate::services::store::DataStore;
use crate::utils::{cosine_similarity, max_normalize, rank_recommendations};
use anyhow::Result;
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Attribute-based recommender: scores catalog items against a taste profile
/// built from the user's well-rated items.
pub struct ContentRecommender {
    store: Arc<dyn DataStore>,
    extractor: FeatureExtractor,
    config: RecommendationConfig,
}

impl ContentRecommender {
    pub fn new(
        store: Arc<dyn DataStore>,
        extractor: FeatureExtractor,
        config: RecommendationConfig,
    ) -> Self {
        Self {
            store,
            extractor,
            config,
        }
    }

    /// Weighted sum of the feature vectors of items rated at least
    /// `min_rating`, each scaled by `rating / 5`, then max-normalized.
    pub async fn get_user_preferred_features(
        &self,
        user_id: UserId,
        min_rating: f64,
    ) -> Result<FeatureVector> {
        let liked: Vec<UserRating> = self
            .store
            .ratings_of(user_id)
            .await?
            .into_iter()
            .filter(|r| f64::from(r.rating) >= min_rating)
            .collect();
        if liked.is_empty() {
            return Ok(FeatureVector::new());
        }

        let ids: Vec<ItemId> = liked.iter().map(|r| r.item_id).collect();
        let items = self.store.items_by_ids(&ids).await?;

        let mut profile = FeatureVector::new();
        for item in &items {
            let Some(rating) = liked.iter().find(|r| r.item_id == item.id) else {
                continue;
            };
            let scale = f64::from(rating.rating) / 5.0;
            for (feature, weight) in self.extractor.extract(item) {
                *profile.entry(feature).or_insert(0.0) += weight * scale;
            }
        }

        max_normalize(&mut profile);
        Ok(profile)
    }

    pub async fn generate_content_based_recommendations(
        &self,
        user_id: UserId,
        limit: usize,
        min_similarity: f64,
    ) -> Result<Vec<Recommendation>> {
        let profile = self
            .get_user_preferred_features(user_id, self.config.profile_min_rating)
            .await?;
        if profile.is_empty() {
            return Ok(Vec::new());
        }

        let rated: HashSet<ItemId> = self
            .store
            .ratings_of(user_id)
            .await?
            .into_iter()
            .map(|r| r.item_id)
            .collect();

        let candidates: Vec<Item> = self
            .store
            .items_matching(&ItemFilter::default())
            .await?
            .into_iter()
            .filter(|item| !rated.contains(&item.id))
            .collect();
        let candidate_count = candidates.len();
        let profile_features = profile.len();

        let mut recommendations = self.score_against(profile, candidates, min_similarity).await?;

        rank_recommendations(&mut recommendations, limit);
        debug!(
            %user_id,
            profile_features,
            candidates = candidate_count,
            returned = recommendations.len(),
            "Generated content-based recommendations"
        );
        Ok(recommendations)
    }

    /// Items of the same type as `item_id` ranked by feature-vector cosine.
    pub async fn find_similar_items(
        &self,
        item_id: ItemId,
        limit: usize,
        min_similarity: f64,
    ) -> Result<Vec<Recommendation>> {
        let Some(target) = self.store.item_by_id(item_id).await? else {
            return Ok(Vec::new());
        };
        let target_features = self.extractor.extract(&target);

        let candidates: Vec<Item> = self
            .store
            .items_matching(&ItemFilter::of_type(target.item_type()))
            .await?
            .into_iter()
            .filter(|item| item.id != item_id)
            .collect();

        let mut recommendations = self
            .score_against(target_features, candidates, min_similarity)
            .await?;

        rank_recommendations(&mut recommendations, limit);
        Ok(recommendations)
    }

    /// Cosine of every candidate against `target` on the rayon pool, keeping
    /// those at or above `min_similarity`. Unranked.
    async fn score_against(
        &self,
        target: FeatureVector,
        candidates: Vec<Item>,
        min_similarity: f64,
    ) -> Result<Vec<Recommendation>> {
        let extractor = self.extractor.clone();
        let scored = tokio::task::spawn_blocking(move || {
            candidates
                .into_par_iter()
                .filter_map(|item| {
                    let similarity = cosine_similarity(&target, &extractor.extract(&item));
                    (similarity >= min_similarity)
                        .then(|| Recommendation::new(item, similarity, RecommendationType::ContentBased))
                })
                .collect::<Vec<_>>()
        })
        .await?;
        Ok(scored)
    }
}

#[async_trait::async_trait]
impl Recommender for ContentRecommender {
    async fn recommend(
        &self,
        user_id: UserId,
        limit: usize,
        min_similarity: f64,
    ) -> Result<Vec<Recommendation>> {
        self.generate_content_based_recommendations(user_id, limit, min_similarity)
            .await
    }
}
