use crate::algorithms::{load_rating_map, Recommender};
use crate::config::RecommendationConfig;
use crate::models::*;
use crate::services::store::DataStore;
use crate::utils::{common_keys, compare_scores_desc, pearson_correlation, top_k_by_score};
use anyhow::Result;
use futures::future::try_join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
struct ScoreAccumulator {
    score: f64,
    count: usize,
}

impl ScoreAccumulator {
    fn add(&mut self, similarity: f64, rating: f64) {
        self.score += similarity * rating;
        self.count += 1;
    }

    /// Plain mean of `similarity * rating` over contributing neighbors. Not
    /// divided by the similarity sum, so a lone weak neighbor scores low.
    fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.score / self.count as f64
        }
    }
}

/// User-user collaborative filtering over Pearson-correlated neighbors.
pub struct CollaborativeFilter {
    store: Arc<dyn DataStore>,
    config: RecommendationConfig,
}

impl CollaborativeFilter {
    pub fn new(store: Arc<dyn DataStore>, config: RecommendationConfig) -> Self {
        Self { store, config }
    }

    /// Every user's rating map, built from a single `all_ratings` read.
    async fn ratings_by_user(&self) -> Result<HashMap<UserId, RatingMap>> {
        let mut by_user: HashMap<UserId, RatingMap> = HashMap::new();
        for rating in self.store.all_ratings().await? {
            by_user
                .entry(rating.user_id)
                .or_default()
                .insert(rating.item_id, f64::from(rating.rating));
        }
        Ok(by_user)
    }

    /// Users whose ratings correlate positively with `user_id` over at least
    /// `min_common_items` co-rated items, strongest first.
    pub async fn find_similar_users(
        &self,
        user_id: UserId,
        min_common_items: usize,
        top_n: usize,
    ) -> Result<Vec<(UserId, f64)>> {
        let user_ratings = load_rating_map(self.store.as_ref(), user_id).await?;
        if user_ratings.is_empty() {
            return Ok(Vec::new());
        }

        let all_ratings = self.ratings_by_user().await?;

        let mut similarities: Vec<(UserId, f64)> = all_ratings
            .iter()
            .filter(|(other_id, _)| **other_id != user_id)
            .filter(|(_, other)| common_keys(&user_ratings, other) >= min_common_items)
            .map(|(other_id, other)| (*other_id, pearson_correlation(&user_ratings, other)))
            .filter(|(_, similarity)| *similarity > 0.0)
            .collect();

        similarities.sort_by(|a, b| compare_scores_desc((a.1, &a.0), (b.1, &b.0)));
        similarities.truncate(top_n);

        debug!(%user_id, neighbors = similarities.len(), "Found similar users");
        Ok(similarities)
    }

    pub async fn generate_collaborative_recommendations(
        &self,
        user_id: UserId,
        limit: usize,
        min_similarity: f64,
    ) -> Result<Vec<Recommendation>> {
        let user_ratings = load_rating_map(self.store.as_ref(), user_id).await?;
        let rated: HashSet<ItemId> = user_ratings.keys().copied().collect();

        let similar_users = self
            .find_similar_users(user_id, self.config.min_common_items, self.config.neighbor_pool)
            .await?;
        if similar_users.is_empty() {
            return Ok(Vec::new());
        }

        // One read per neighbor; the reads are independent, so issue them together.
        let neighbors = similar_users
            .into_iter()
            .filter(|(_, similarity)| *similarity >= min_similarity)
            .map(|(neighbor_id, similarity)| async move {
                let ratings = load_rating_map(self.store.as_ref(), neighbor_id).await?;
                Ok::<_, anyhow::Error>((similarity, ratings))
            });
        let neighbor_ratings = try_join_all(neighbors).await?;

        let mut accumulators: HashMap<ItemId, ScoreAccumulator> = HashMap::new();
        for (similarity, ratings) in &neighbor_ratings {
            for (item_id, rating) in ratings {
                if rated.contains(item_id) {
                    continue;
                }
                accumulators
                    .entry(*item_id)
                    .or_insert_with(ScoreAccumulator::default)
                    .add(*similarity, *rating);
            }
        }

        let scores: HashMap<ItemId, f64> = accumulators
            .iter()
            .map(|(item_id, acc)| (*item_id, acc.average()))
            .collect();
        let ranked = top_k_by_score(&scores, limit);

        let ids: Vec<ItemId> = ranked.iter().map(|(id, _)| *id).collect();
        let items: HashMap<ItemId, Item> = self
            .store
            .items_by_ids(&ids)
            .await?
            .into_iter()
            .map(|item| (item.id, item))
            .collect();

        // Items deleted since the neighbor reads are dropped rather than failing.
        let recommendations: Vec<Recommendation> = ranked
            .into_iter()
            .filter_map(|(item_id, score)| {
                items
                    .get(&item_id)
                    .map(|item| Recommendation::new(item.clone(), score, RecommendationType::Collaborative))
            })
            .collect();

        debug!(
            %user_id,
            neighbors = neighbor_ratings.len(),
            candidates = accumulators.len(),
            returned = recommendations.len(),
            "Generated collaborative recommendations"
        );
        Ok(recommendations)
    }
}

#[async_trait::async_trait]
impl Recommender for CollaborativeFilter {
    async fn recommend(
        &self,
        user_id: UserId,
        limit: usize,
        min_similarity: f64,
    ) -> Result<Vec<Recommendation>> {
        self.generate_collaborative_recommendations(user_id, limit, min_similarity)
            .await
    }
}
