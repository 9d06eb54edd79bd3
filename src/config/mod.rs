use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub recommendation: RecommendationConfig,
    pub popularity: PopularityConfig,
    pub features: FeatureConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port).parse()?;
        Ok(addr)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Optional second cache tier. When unset only the in-process map is used.
    pub redis_url: Option<String>,
    pub ttl_seconds: u64,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    pub default_limit: usize,
    pub max_limit: usize,
    pub min_similarity: f64,
    /// Co-rated items required before two users are compared at all.
    pub min_common_items: usize,
    /// How many neighbors the collaborative recommender pulls before scoring.
    pub neighbor_pool: usize,
    /// Ratings below this value are ignored when building a taste profile.
    pub profile_min_rating: f64,
    pub collaborative_weight: f64,
    pub content_weight: f64,
    pub weight_tolerance: f64,
    /// Multiplier applied to items that both hybrid sources agree on.
    pub agreement_boost: f64,
    /// Hybrid over-fetch factor applied to `limit` for each source list.
    pub candidate_multiplier: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopularityConfig {
    /// Per-rating bonus in `avg_rating * (1 + bonus * rating_count)`.
    pub rating_count_bonus: f64,
    pub fallback_min_ratings: usize,
    pub trending_days: i64,
    pub max_trending_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub max_cast_members: usize,
    pub actor_weight: f64,
    pub publisher_weight: f64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 100,
            min_similarity: 0.3,
            min_common_items: 3,
            neighbor_pool: 50,
            profile_min_rating: 3.0,
            collaborative_weight: 0.6,
            content_weight: 0.4,
            weight_tolerance: 0.01,
            agreement_boost: 1.2,
            candidate_multiplier: 2,
        }
    }
}

impl Default for PopularityConfig {
    fn default() -> Self {
        Self {
            rating_count_bonus: 0.1,
            fallback_min_ratings: 1,
            trending_days: 7,
            max_trending_days: 30,
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            max_cast_members: 5,
            actor_weight: 0.5,
            publisher_weight: 0.5,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: num_cpus::get(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redis_url: None,
            ttl_seconds: 300,
            max_entries: 10_000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            cache: CacheConfig::default(),
            recommendation: RecommendationConfig::default(),
            popularity: PopularityConfig::default(),
            features: FeatureConfig::default(),
        }
    }
}

impl Config {
    /// Loads `path`, then applies `HYBRIDREC__SECTION__KEY` environment overrides.
    /// Keys missing from both fall back to the defaults.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("HYBRIDREC").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Same as [`Config::from_file`] but falls back to defaults when the file is missing.
    pub fn load_or_default(path: &str) -> anyhow::Result<Self> {
        if std::path::Path::new(path).exists() {
            Self::from_file(path)
        } else {
            tracing::info!("Config file {} not found, using default configuration", path);
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        let config = Config::default();
        let sum = config.recommendation.collaborative_weight + config.recommendation.content_weight;
        assert!((sum - 1.0).abs() < 1e-9);
        assert_eq!(config.recommendation.agreement_boost, 1.2);
        assert_eq!(config.popularity.rating_count_bonus, 0.1);
    }

    #[test]
    fn test_socket_addr() {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 9000;
        assert_eq!(config.server.socket_addr().unwrap().port(), 9000);

        config.server.host = "not a host".to_string();
        assert!(config.server.socket_addr().is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load_or_default("does/not/exist.toml").unwrap();
        assert_eq!(config.recommendation.default_limit, 10);
    }
}
