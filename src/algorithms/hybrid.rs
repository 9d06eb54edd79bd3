use crate::algorithms::Recommender;
use crate::config::RecommendationConfig;
use crate::models::*;
use crate::utils::{normalize_scores, rank_recommendations};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

struct BlendEntry {
    item: Item,
    collaborative_score: f64,
    content_score: f64,
    appearances: usize,
}

impl BlendEntry {
    fn new(item: Item) -> Self {
        Self {
            item,
            collaborative_score: 0.0,
            content_score: 0.0,
            appearances: 0,
        }
    }
}

/// Weighted blend of a collaborative and a content-based recommender.
pub struct HybridBlender {
    collaborative: Arc<dyn Recommender>,
    content: Arc<dyn Recommender>,
    config: RecommendationConfig,
}

impl HybridBlender {
    pub fn new(
        collaborative: Arc<dyn Recommender>,
        content: Arc<dyn Recommender>,
        config: RecommendationConfig,
    ) -> Self {
        Self {
            collaborative,
            content,
            config,
        }
    }

    pub async fn generate_hybrid_recommendations(
        &self,
        user_id: UserId,
        limit: usize,
        collaborative_weight: f64,
        content_weight: f64,
        min_similarity: f64,
    ) -> Result<Vec<Recommendation>> {
        let candidate_limit = limit.saturating_mul(self.config.candidate_multiplier);

        let (mut collaborative, mut content) = futures::try_join!(
            self.collaborative.recommend(user_id, candidate_limit, min_similarity),
            self.content.recommend(user_id, candidate_limit, min_similarity),
        )?;

        normalize_scores(&mut collaborative);
        normalize_scores(&mut content);

        let collaborative_count = collaborative.len();
        let content_count = content.len();

        let mut merged: HashMap<ItemId, BlendEntry> = HashMap::new();
        for rec in collaborative {
            let entry = merged
                .entry(rec.item.id)
                .or_insert_with(|| BlendEntry::new(rec.item.clone()));
            entry.collaborative_score = rec.recommendation_score;
            entry.appearances += 1;
        }
        for rec in content {
            let entry = merged
                .entry(rec.item.id)
                .or_insert_with(|| BlendEntry::new(rec.item.clone()));
            entry.content_score = rec.recommendation_score;
            entry.appearances += 1;
        }

        let mut recommendations: Vec<Recommendation> = merged
            .into_values()
            .map(|entry| {
                let mut score = collaborative_weight * entry.collaborative_score
                    + content_weight * entry.content_score;
                if entry.appearances > 1 {
                    score *= self.config.agreement_boost;
                }
                Recommendation::new(entry.item, score, RecommendationType::Hybrid)
                    .with_component_scores(entry.collaborative_score, entry.content_score)
            })
            .collect();

        rank_recommendations(&mut recommendations, limit);
        debug!(
            %user_id,
            collaborative = collaborative_count,
            content = content_count,
            returned = recommendations.len(),
            "Blended hybrid recommendations"
        );
        Ok(recommendations)
    }
}

#[async_trait::async_trait]
impl Recommender for HybridBlender {
    async fn recommend(
        &self,
        user_id: UserId,
        limit: usize,
        min_similarity: f64,
    ) -> Result<Vec<Recommendation>> {
        self.generate_hybrid_recommendations(
            user_id,
            limit,
            self.config.collaborative_weight,
            self.config.content_weight,
            min_similarity,
        )
        .await
    }
}
