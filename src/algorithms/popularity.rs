use crate::config::PopularityConfig;
use crate::models::*;
use crate::services::store::DataStore;
use crate::utils::rank_recommendations;
use anyhow::Result;
use chrono::{Duration, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// User-independent ranking by rating volume and quality, used directly and
/// as the fallback when a personalized recommender comes back empty.
pub struct PopularityRanker {
    store: Arc<dyn DataStore>,
    config: PopularityConfig,
}

impl PopularityRanker {
    pub fn new(store: Arc<dyn DataStore>, config: PopularityConfig) -> Self {
        Self { store, config }
    }

    pub fn popularity_score(&self, avg_rating: f64, rating_count: usize) -> f64 {
        avg_rating * (1.0 + self.config.rating_count_bonus * rating_count as f64)
    }

    /// Items with at least `min_ratings` ratings, ranked by popularity score.
    /// Unrated items have no aggregate and never rank, so a floor of 0
    /// behaves the same as a floor of 1.
    pub async fn get_popular_items(
        &self,
        filter: &ItemFilter,
        limit: usize,
        min_ratings: usize,
    ) -> Result<Vec<Recommendation>> {
        let aggregates = self.store.rating_aggregate_by_item(filter, min_ratings).await?;

        let mut recommendations: Vec<Recommendation> = aggregates
            .into_iter()
            .filter(|agg| agg.count >= min_ratings)
            .map(|agg| {
                let score = self.popularity_score(agg.avg_rating, agg.count);
                Recommendation::new(agg.item, score, RecommendationType::Popular)
                    .with_rating_stats(agg.avg_rating, agg.count)
            })
            .collect();

        rank_recommendations(&mut recommendations, limit);
        debug!(count = recommendations.len(), min_ratings, "Ranked popular items");
        Ok(recommendations)
    }

    /// Popular items per grouping key of `item_type`: product category for
    /// products, genre for everything else.
    pub async fn get_popular_by_category(
        &self,
        item_type: ItemType,
        limit_per_category: usize,
    ) -> Result<BTreeMap<String, Vec<Recommendation>>> {
        let items = self.store.items_matching(&ItemFilter::of_type(item_type)).await?;

        let mut groups = BTreeSet::new();
        for item in &items {
            match item.item_type() {
                ItemType::Product => {
                    if let Some(category) = item.category() {
                        groups.insert(category.to_string());
                    }
                }
                _ => groups.extend(item.genres.iter().cloned()),
            }
        }

        let mut result = BTreeMap::new();
        for group in groups {
            let filter = match item_type {
                ItemType::Product => ItemFilter {
                    item_type: Some(item_type),
                    category: Some(group.clone()),
                    genre: None,
                },
                _ => ItemFilter {
                    item_type: Some(item_type),
                    category: None,
                    genre: Some(group.clone()),
                },
            };

            let popular = self
                .get_popular_items(&filter, limit_per_category, self.config.fallback_min_ratings)
                .await?;
            result.insert(group, popular);
        }

        Ok(result)
    }

    /// Items ranked by `recent_count * recent_avg` over the trailing `days`.
    pub async fn get_trending_items(
        &self,
        item_type: Option<ItemType>,
        days: i64,
        limit: usize,
    ) -> Result<Vec<Recommendation>> {
        let cutoff = Duration::try_days(days)
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .ok_or_else(|| anyhow::anyhow!("trending window of {} days is out of range", days))?;
        let filter = ItemFilter {
            item_type,
            ..ItemFilter::default()
        };

        let aggregates = self.store.rating_aggregate_by_item_since(cutoff, &filter).await?;

        let mut recommendations: Vec<Recommendation> = aggregates
            .into_iter()
            .filter(|agg| agg.count > 0)
            .map(|agg| {
                let score = agg.count as f64 * agg.avg_rating;
                Recommendation::new(agg.item, score, RecommendationType::Trending)
            })
            .collect();

        rank_recommendations(&mut recommendations, limit);
        debug!(count = recommendations.len(), days, "Ranked trending items");
        Ok(recommendations)
    }

    /// The list substituted for an empty personalized result.
    pub async fn fallback(&self, limit: usize) -> Result<Vec<Recommendation>> {
        self.get_popular_items(&ItemFilter::default(), limit, self.config.fallback_min_ratings)
            .await
    }
}
