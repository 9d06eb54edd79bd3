use crate::algorithms::{
    CollaborativeFilter, ContentRecommender, FeatureExtractor, HybridBlender, PopularityRanker,
};
use crate::config::Config;
use crate::models::*;
use crate::services::cache::{CacheKey, RecommendationCache};
use crate::services::store::DataStore;
use crate::utils::validation::*;
use anyhow::Result;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// A personalized list together with how it was produced.
#[derive(Debug, Clone, Default)]
pub struct PersonalizedResult {
    pub recommendations: Vec<Recommendation>,
    /// The personalized list was empty and popular items were substituted.
    pub fell_back: bool,
    pub cache_hit: bool,
}

/// Caller layer over the engine: validates parameters, memoizes personalized
/// lists and substitutes popular items when a personalized list is empty.
pub struct RecommendationService {
    store: Arc<dyn DataStore>,
    config: Arc<Config>,
    collaborative: Arc<CollaborativeFilter>,
    content: Arc<ContentRecommender>,
    hybrid: HybridBlender,
    popularity: PopularityRanker,
    cache: RecommendationCache,
}

impl RecommendationService {
    pub fn new(store: Arc<dyn DataStore>, config: Arc<Config>) -> Result<Self> {
        let cache = RecommendationCache::new(&config.cache)?;
        Ok(Self::with_cache(store, config, cache))
    }

    pub fn with_cache(store: Arc<dyn DataStore>, config: Arc<Config>, cache: RecommendationCache) -> Self {
        let collaborative = Arc::new(CollaborativeFilter::new(
            store.clone(),
            config.recommendation.clone(),
        ));
        let content = Arc::new(ContentRecommender::new(
            store.clone(),
            FeatureExtractor::new(config.features.clone()),
            config.recommendation.clone(),
        ));
        let hybrid = HybridBlender::new(
            collaborative.clone(),
            content.clone(),
            config.recommendation.clone(),
        );
        let popularity = PopularityRanker::new(store.clone(), config.popularity.clone());

        Self {
            store,
            config,
            collaborative,
            content,
            hybrid,
            popularity,
            cache,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs `compute` unless a live cache entry exists, then applies the
    /// popular-items fallback to an empty result.
    async fn personalized<F>(
        &self,
        user_id: UserId,
        method: &str,
        params: String,
        limit: usize,
        compute: F,
    ) -> Result<PersonalizedResult, ServiceError>
    where
        F: Future<Output = Result<Vec<Recommendation>>>,
    {
        let key = CacheKey::new(user_id, method, params, self.store.version());

        let (recommendations, cache_hit) = match self.cache.get(&key).await {
            Some(cached) => (cached, true),
            None => {
                let computed = compute.await?;
                self.cache.put(&key, &computed).await;
                (computed, false)
            }
        };

        if !recommendations.is_empty() {
            return Ok(PersonalizedResult {
                recommendations,
                fell_back: false,
                cache_hit,
            });
        }

        debug!(%user_id, method, "Personalized list empty, falling back to popular items");
        let fallback = self.popularity.fallback(limit).await?;
        Ok(PersonalizedResult {
            recommendations: fallback,
            fell_back: true,
            cache_hit,
        })
    }

    pub async fn collaborative(
        &self,
        user_id: UserId,
        limit: usize,
        min_similarity: f64,
    ) -> Result<PersonalizedResult, ServiceError> {
        let limit = validate_limit(limit, &self.config)?;
        let min_similarity = validate_min_similarity(min_similarity)?;

        self.personalized(
            user_id,
            RecommendationMethod::Collaborative.as_str(),
            format!("limit={}&min_similarity={}", limit, min_similarity),
            limit,
            self.collaborative
                .generate_collaborative_recommendations(user_id, limit, min_similarity),
        )
        .await
    }

    pub async fn content_based(
        &self,
        user_id: UserId,
        limit: usize,
        min_similarity: f64,
    ) -> Result<PersonalizedResult, ServiceError> {
        let limit = validate_limit(limit, &self.config)?;
        let min_similarity = validate_min_similarity(min_similarity)?;

        self.personalized(
            user_id,
            RecommendationMethod::Content.as_str(),
            format!("limit={}&min_similarity={}", limit, min_similarity),
            limit,
            self.content
                .generate_content_based_recommendations(user_id, limit, min_similarity),
        )
        .await
    }

    pub async fn hybrid(
        &self,
        user_id: UserId,
        limit: usize,
        collaborative_weight: f64,
        content_weight: f64,
        min_similarity: f64,
    ) -> Result<PersonalizedResult, ServiceError> {
        let limit = validate_limit(limit, &self.config)?;
        let (collaborative_weight, content_weight) =
            validate_weights(collaborative_weight, content_weight, &self.config)?;
        let min_similarity = validate_min_similarity(min_similarity)?;

        self.personalized(
            user_id,
            RecommendationMethod::Hybrid.as_str(),
            format!(
                "limit={}&cw={}&tw={}&min_similarity={}",
                limit, collaborative_weight, content_weight, min_similarity
            ),
            limit,
            self.hybrid.generate_hybrid_recommendations(
                user_id,
                limit,
                collaborative_weight,
                content_weight,
                min_similarity,
            ),
        )
        .await
    }

    /// Dispatches to one personalized method with its configured defaults.
    pub async fn get_personalized_recommendations(
        &self,
        user_id: UserId,
        limit: usize,
        method: RecommendationMethod,
    ) -> Result<PersonalizedResult, ServiceError> {
        let defaults = &self.config.recommendation;
        let result = match method {
            RecommendationMethod::Hybrid => {
                self.hybrid(
                    user_id,
                    limit,
                    defaults.collaborative_weight,
                    defaults.content_weight,
                    defaults.min_similarity,
                )
                .await?
            }
            RecommendationMethod::Collaborative => {
                self.collaborative(user_id, limit, defaults.min_similarity).await?
            }
            RecommendationMethod::Content => {
                self.content_based(user_id, limit, defaults.min_similarity).await?
            }
        };

        info!(
            %user_id,
            method = method.as_str(),
            count = result.recommendations.len(),
            fell_back = result.fell_back,
            cache_hit = result.cache_hit,
            "Generated personalized recommendations"
        );
        Ok(result)
    }

    pub async fn popular(
        &self,
        filter: &ItemFilter,
        limit: usize,
        min_ratings: usize,
    ) -> Result<Vec<Recommendation>, ServiceError> {
        let limit = validate_limit(limit, &self.config)?;
        let min_ratings = validate_min_ratings(min_ratings)?;
        Ok(self.popularity.get_popular_items(filter, limit, min_ratings).await?)
    }

    pub async fn popular_by_category(
        &self,
        item_type: ItemType,
        limit_per_category: usize,
    ) -> Result<BTreeMap<String, Vec<Recommendation>>, ServiceError> {
        let limit = validate_limit(limit_per_category, &self.config)?;
        Ok(self.popularity.get_popular_by_category(item_type, limit).await?)
    }

    pub async fn trending(
        &self,
        item_type: Option<ItemType>,
        days: i64,
        limit: usize,
    ) -> Result<Vec<Recommendation>, ServiceError> {
        let limit = validate_limit(limit, &self.config)?;
        let days = validate_days(days, &self.config)?;
        Ok(self.popularity.get_trending_items(item_type, days, limit).await?)
    }

    pub async fn similar_items(
        &self,
        item_id: ItemId,
        limit: usize,
        min_similarity: f64,
    ) -> Result<Vec<Recommendation>, ServiceError> {
        let limit = validate_limit(limit, &self.config)?;
        let min_similarity = validate_min_similarity(min_similarity)?;
        Ok(self.content.find_similar_items(item_id, limit, min_similarity).await?)
    }

    pub async fn item(&self, item_id: ItemId) -> Result<Option<Item>, ServiceError> {
        Ok(self.store.item_by_id(item_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::InMemoryStore;
    use uuid::Uuid;

    fn service(store: Arc<InMemoryStore>) -> RecommendationService {
        RecommendationService::new(store, Arc::new(Config::default())).unwrap()
    }

    fn seeded_store() -> (Arc<InMemoryStore>, Vec<ItemId>) {
        let store = Arc::new(InMemoryStore::new());
        let ids = (0..3)
            .map(|i| {
                let item = Item::movie(format!("Movie {}", i), MovieMetadata::default())
                    .with_genres(["drama"]);
                let id = item.id;
                store.insert_item(item);
                id
            })
            .collect::<Vec<_>>();
        (store, ids)
    }

    #[tokio::test]
    async fn test_rejects_invalid_parameters() {
        let (store, _) = seeded_store();
        let service = service(store);
        let user = Uuid::new_v4();

        assert!(matches!(
            service.collaborative(user, 0, 0.3).await,
            Err(ServiceError::Validation(ValidationError::Limit { .. }))
        ));
        assert!(matches!(
            service.hybrid(user, 10, 0.7, 0.4, 0.3).await,
            Err(ServiceError::Validation(ValidationError::Weights { .. }))
        ));
        assert!(matches!(
            service.trending(None, 31, 10).await,
            Err(ServiceError::Validation(ValidationError::Days { .. }))
        ));
        assert!(matches!(
            service.popular(&ItemFilter::default(), 10, 0).await,
            Err(ServiceError::Validation(ValidationError::MinRatings))
        ));
    }

    #[tokio::test]
    async fn test_unknown_user_falls_back_to_popular() {
        let (store, ids) = seeded_store();
        store.upsert_rating(Rating::new(Uuid::new_v4(), ids[0], 5)).unwrap();
        let service = service(store);

        let result = service
            .get_personalized_recommendations(Uuid::new_v4(), 10, RecommendationMethod::Hybrid)
            .await
            .unwrap();

        assert!(result.fell_back);
        assert_eq!(result.recommendations.len(), 1);
        assert_eq!(result.recommendations[0].item_id(), ids[0]);
        assert_eq!(result.recommendations[0].recommendation_type, RecommendationType::Popular);
    }

    #[tokio::test]
    async fn test_empty_store_gives_empty_list() {
        let service = service(Arc::new(InMemoryStore::new()));
        for method in [
            RecommendationMethod::Hybrid,
            RecommendationMethod::Collaborative,
            RecommendationMethod::Content,
        ] {
            let result = service
                .get_personalized_recommendations(Uuid::new_v4(), 10, method)
                .await
                .unwrap();
            assert!(result.recommendations.is_empty());
        }
    }

    #[tokio::test]
    async fn test_cache_hits_until_store_changes() {
        let (store, ids) = seeded_store();
        let user = Uuid::new_v4();
        store.upsert_rating(Rating::new(user, ids[0], 5)).unwrap();
        let service = service(store.clone());

        let first = service.content_based(user, 10, 0.3).await.unwrap();
        assert!(!first.cache_hit);
        assert_eq!(first.recommendations.len(), 2);

        let second = service.content_based(user, 10, 0.3).await.unwrap();
        assert!(second.cache_hit);
        assert_eq!(second.recommendations, first.recommendations);

        store.upsert_rating(Rating::new(user, ids[1], 4)).unwrap();
        let third = service.content_based(user, 10, 0.3).await.unwrap();
        assert!(!third.cache_hit);
        assert_eq!(third.recommendations.len(), 1);
        assert_eq!(third.recommendations[0].item_id(), ids[2]);
    }
}
