use crate::config::Config;
use crate::models::*;
use uuid::Uuid;

/// Request-level checks performed before the engine is invoked.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("limit must be between 1 and {max}, got {value}")]
    Limit { value: usize, max: usize },

    #[error("min_similarity must be between 0.0 and 1.0, got {0}")]
    MinSimilarity(f64),

    #[error("weights must each be between 0.0 and 1.0 and sum to 1.0 (got {collaborative} + {content})")]
    Weights { collaborative: f64, content: f64 },

    #[error("days must be between 1 and {max}, got {value}")]
    Days { value: i64, max: i64 },

    #[error("min_ratings must be at least 1")]
    MinRatings,

    #[error("rating must be between 1 and 5, got {0}")]
    RatingValue(u8),

    #[error("invalid identifier: {0}")]
    Identifier(String),
}

pub fn validate_limit(limit: usize, config: &Config) -> Result<usize, ValidationError> {
    let max = config.recommendation.max_limit;
    if limit == 0 || limit > max {
        return Err(ValidationError::Limit { value: limit, max });
    }
    Ok(limit)
}

pub fn validate_min_similarity(min_similarity: f64) -> Result<f64, ValidationError> {
    if !min_similarity.is_finite() || !(0.0..=1.0).contains(&min_similarity) {
        return Err(ValidationError::MinSimilarity(min_similarity));
    }
    Ok(min_similarity)
}

pub fn validate_weights(
    collaborative: f64,
    content: f64,
    config: &Config,
) -> Result<(f64, f64), ValidationError> {
    let in_range = |w: f64| w.is_finite() && (0.0..=1.0).contains(&w);
    let tolerance = config.recommendation.weight_tolerance;

    if !in_range(collaborative)
        || !in_range(content)
        || (collaborative + content - 1.0).abs() > tolerance
    {
        return Err(ValidationError::Weights { collaborative, content });
    }
    Ok((collaborative, content))
}

pub fn validate_days(days: i64, config: &Config) -> Result<i64, ValidationError> {
    let max = config.popularity.max_trending_days;
    if days < 1 || days > max {
        return Err(ValidationError::Days { value: days, max });
    }
    Ok(days)
}

pub fn validate_min_ratings(min_ratings: usize) -> Result<usize, ValidationError> {
    if min_ratings == 0 {
        return Err(ValidationError::MinRatings);
    }
    Ok(min_ratings)
}

pub fn validate_rating(rating: &Rating) -> Result<(), ValidationError> {
    if !(1..=5).contains(&rating.rating) {
        return Err(ValidationError::RatingValue(rating.rating));
    }
    if rating.user_id.is_nil() {
        return Err(ValidationError::Identifier("user id cannot be nil".to_string()));
    }
    if rating.item_id.is_nil() {
        return Err(ValidationError::Identifier("item id cannot be nil".to_string()));
    }
    Ok(())
}

pub fn validate_uuid_string(uuid_str: &str) -> Result<Uuid, ValidationError> {
    Uuid::parse_str(uuid_str).map_err(|_| ValidationError::Identifier(uuid_str.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_limit() {
        let config = Config::default();
        assert_eq!(validate_limit(10, &config), Ok(10));
        assert_eq!(validate_limit(100, &config), Ok(100));
        assert!(validate_limit(0, &config).is_err());
        assert!(validate_limit(101, &config).is_err());
    }

    #[test]
    fn test_validate_min_similarity() {
        assert!(validate_min_similarity(0.0).is_ok());
        assert!(validate_min_similarity(1.0).is_ok());
        assert!(validate_min_similarity(-0.1).is_err());
        assert!(validate_min_similarity(f64::NAN).is_err());
    }

    #[test]
    fn test_validate_weights() {
        let config = Config::default();
        assert!(validate_weights(0.6, 0.4, &config).is_ok());
        assert!(validate_weights(0.605, 0.4, &config).is_ok());
        assert!(validate_weights(0.7, 0.4, &config).is_err());
        assert!(validate_weights(1.2, -0.2, &config).is_err());
    }

    #[test]
    fn test_validate_days_and_min_ratings() {
        let config = Config::default();
        assert!(validate_days(7, &config).is_ok());
        assert!(validate_days(0, &config).is_err());
        assert!(validate_days(31, &config).is_err());
        assert!(validate_min_ratings(0).is_err());
        assert_eq!(validate_min_ratings(3), Ok(3));
    }

    #[test]
    fn test_validate_rating() {
        let valid = Rating::new(Uuid::new_v4(), Uuid::new_v4(), 5);
        assert!(validate_rating(&valid).is_ok());

        let out_of_range = Rating::new(Uuid::new_v4(), Uuid::new_v4(), 6);
        assert_eq!(validate_rating(&out_of_range), Err(ValidationError::RatingValue(6)));

        let nil_user = Rating::new(Uuid::nil(), Uuid::new_v4(), 3);
        assert!(validate_rating(&nil_user).is_err());
    }

    #[test]
    fn test_validate_uuid_string() {
        assert!(validate_uuid_string("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid_string("invalid-uuid").is_err());
    }
}
