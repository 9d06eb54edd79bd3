use crate::config::FeatureConfig;
use crate::models::*;

/// Metadata values that are missing or blank contribute no feature.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Type-specific part of an item's feature vector.
pub trait ExtractFeatures {
    fn extract_into(&self, config: &FeatureConfig, features: &mut FeatureVector);
}

impl ExtractFeatures for MovieMetadata {
    fn extract_into(&self, config: &FeatureConfig, features: &mut FeatureVector) {
        if let Some(director) = present(&self.director) {
            features.insert(format!("director:{}", director), 1.0);
        }
        for actor in self.cast.iter().take(config.max_cast_members) {
            features.insert(format!("actor:{}", actor), config.actor_weight);
        }
    }
}

impl ExtractFeatures for ProductMetadata {
    fn extract_into(&self, _config: &FeatureConfig, features: &mut FeatureVector) {
        if let Some(brand) = present(&self.brand) {
            features.insert(format!("brand:{}", brand), 1.0);
        }
        if let Some(category) = present(&self.category) {
            features.insert(format!("category:{}", category), 1.0);
        }
    }
}

impl ExtractFeatures for BookMetadata {
    fn extract_into(&self, config: &FeatureConfig, features: &mut FeatureVector) {
        if let Some(author) = present(&self.author) {
            features.insert(format!("author:{}", author), 1.0);
        }
        if let Some(publisher) = present(&self.publisher) {
            features.insert(format!("publisher:{}", publisher), config.publisher_weight);
        }
    }
}

impl ExtractFeatures for ItemDetails {
    fn extract_into(&self, config: &FeatureConfig, features: &mut FeatureVector) {
        features.insert(format!("type:{}", self.item_type()), 1.0);

        match self {
            ItemDetails::Movie(meta) => meta.extract_into(config, features),
            ItemDetails::Product(meta) => meta.extract_into(config, features),
            ItemDetails::Book(meta) => meta.extract_into(config, features),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    config: FeatureConfig,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    /// Derives the sparse attribute vector of `item`.
    pub fn extract(&self, item: &Item) -> FeatureVector {
        let mut features = FeatureVector::new();

        for genre in &item.genres {
            features.insert(format!("genre:{}", genre), 1.0);
        }
        for tag in &item.tags {
            features.insert(format!("tag:{}", tag), 1.0);
        }

        item.details.extract_into(&self.config, &mut features);
        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(FeatureConfig::default())
    }

    #[test]
    fn test_movie_features() {
        let cast: Vec<String> = (1..=7).map(|i| format!("Actor {}", i)).collect();
        let movie = Item::movie(
            "Ensemble",
            MovieMetadata {
                director: Some("Jane Doe".to_string()),
                cast,
                ..Default::default()
            },
        )
        .with_genres(["drama", "comedy"])
        .with_tags(["festival"]);

        let features = extractor().extract(&movie);

        assert_eq!(features["genre:drama"], 1.0);
        assert_eq!(features["genre:comedy"], 1.0);
        assert_eq!(features["tag:festival"], 1.0);
        assert_eq!(features["type:movie"], 1.0);
        assert_eq!(features["director:Jane Doe"], 1.0);
        assert_eq!(features["actor:Actor 1"], 0.5);
        assert_eq!(features["actor:Actor 5"], 0.5);
        assert!(!features.contains_key("actor:Actor 6"));
        assert_eq!(features.len(), 2 + 1 + 1 + 1 + 5);
    }

    #[test]
    fn test_product_features() {
        let product = Item::product(
            "Kettle",
            ProductMetadata {
                brand: Some("Brewster".to_string()),
                category: Some("kitchen".to_string()),
                ..Default::default()
            },
        );

        let features = extractor().extract(&product);
        assert_eq!(features["brand:Brewster"], 1.0);
        assert_eq!(features["category:kitchen"], 1.0);
        assert_eq!(features["type:product"], 1.0);
        assert_eq!(features.len(), 3);
    }

    #[test]
    fn test_book_features() {
        let book = Item::book(
            "Dune",
            BookMetadata {
                author: Some("Frank Herbert".to_string()),
                publisher: Some("Chilton".to_string()),
                ..Default::default()
            },
        );

        let features = extractor().extract(&book);
        assert_eq!(features["author:Frank Herbert"], 1.0);
        assert_eq!(features["publisher:Chilton"], 0.5);
        assert_eq!(features["type:book"], 1.0);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let book = Item::book("Dune", BookMetadata::default()).with_genres(["scifi", "classic"]);
        let extractor = extractor();
        assert_eq!(extractor.extract(&book), extractor.extract(&book));
    }

    #[test]
    fn test_blank_metadata_is_skipped() {
        let book = Item::book(
            "Anonymous",
            BookMetadata {
                author: Some(String::new()),
                ..Default::default()
            },
        );
        let features = extractor().extract(&book);
        assert_eq!(features.len(), 1);
        assert!(features.contains_key("type:book"));
    }

    #[test]
    fn test_cast_cap_is_configurable() {
        let extractor = FeatureExtractor::new(FeatureConfig {
            max_cast_members: 1,
            ..Default::default()
        });
        let movie = Item::movie(
            "Duo",
            MovieMetadata {
                cast: vec!["A".to_string(), "B".to_string()],
                ..Default::default()
            },
        );

        let features = extractor.extract(&movie);
        assert!(features.contains_key("actor:A"));
        assert!(!features.contains_key("actor:B"));
    }
}
