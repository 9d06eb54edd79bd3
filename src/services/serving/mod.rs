use crate::models::*;
use crate::services::recommendation::{PersonalizedResult, RecommendationService, ServiceError};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Front of the recommendation service for the HTTP layer. Keeps request
/// counters and latency figures.
pub struct ServingService {
    recommendation_service: Arc<RecommendationService>,
    serving_stats: DashMap<String, u64>,
}

impl ServingService {
    pub fn new(recommendation_service: Arc<RecommendationService>) -> Self {
        Self {
            recommendation_service,
            serving_stats: DashMap::new(),
        }
    }

    pub fn recommendations(&self) -> &RecommendationService {
        &self.recommendation_service
    }

    /// Wraps one personalized call with request accounting.
    pub async fn serve<F>(&self, user_id: UserId, method: &str, call: F) -> Result<Vec<Recommendation>, ServiceError>
    where
        F: std::future::Future<Output = Result<PersonalizedResult, ServiceError>>,
    {
        self.increment_stat("total_requests");
        let start_time = Instant::now();

        let result = match call.await {
            Ok(result) => result,
            Err(e) => {
                match &e {
                    ServiceError::Validation(_) => self.increment_stat("rejected_requests"),
                    ServiceError::Internal(inner) => {
                        error!("Failed to serve {} recommendations for user {}: {}", method, user_id, inner);
                        self.increment_stat("failed_requests");
                    }
                }
                return Err(e);
            }
        };

        let latency = start_time.elapsed().as_millis() as u64;
        self.update_latency_stat(latency);
        self.increment_stat("successful_requests");
        if result.fell_back {
            self.increment_stat("fallbacks");
        }
        if result.cache_hit {
            self.increment_stat("cache_hits");
        }

        info!(
            %user_id,
            method,
            count = result.recommendations.len(),
            latency_ms = latency,
            "Served recommendations"
        );
        Ok(result.recommendations)
    }

    /// Wraps a non-personalized call; only request and failure counters apply.
    pub async fn serve_listing<T, F>(&self, call: F) -> Result<T, ServiceError>
    where
        F: std::future::Future<Output = Result<T, ServiceError>>,
    {
        self.increment_stat("listing_requests");
        let result = call.await;
        if let Err(ServiceError::Internal(e)) = &result {
            error!("Failed to serve listing: {}", e);
            self.increment_stat("failed_requests");
        }
        result
    }

    pub fn get_serving_stats(&self) -> HashMap<String, u64> {
        self.serving_stats
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    fn increment_stat(&self, key: &str) {
        let mut counter = self.serving_stats.entry(key.to_string()).or_insert(0);
        *counter += 1;
    }

    fn update_latency_stat(&self, latency_ms: u64) {
        // Running mean over successful requests.
        let current_avg = self.serving_stats.get("avg_latency_ms").map(|v| *v).unwrap_or(0);
        let served = self.serving_stats.get("successful_requests").map(|v| *v).unwrap_or(0) + 1;
        let new_avg = (current_avg * (served - 1) + latency_ms) / served;
        self.serving_stats.insert("avg_latency_ms".to_string(), new_avg);

        let current_max = self.serving_stats.get("max_latency_ms").map(|v| *v).unwrap_or(0);
        if latency_ms > current_max {
            self.serving_stats.insert("max_latency_ms".to_string(), latency_ms);
        }
    }
}
