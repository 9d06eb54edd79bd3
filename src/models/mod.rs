use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use chrono::{DateTime, Utc};

pub type UserId = Uuid;
pub type ItemId = Uuid;

/// Sparse attribute encoding of one item, keyed like `genre:drama`.
pub type FeatureVector = HashMap<String, f64>;

/// One user's ratings keyed by item.
pub type RatingMap = HashMap<ItemId, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Movie,
    Product,
    Book,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Movie => "movie",
            ItemType::Product => "product",
            ItemType::Book => "book",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(ItemType::Movie),
            "product" => Ok(ItemType::Product),
            "book" => Ok(ItemType::Book),
            other => Err(anyhow::anyhow!("Unknown item type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovieMetadata {
    pub director: Option<String>,
    pub cast: Vec<String>,
    pub release_date: Option<String>,
    pub poster_url: Option<String>,
    pub duration_minutes: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductMetadata {
    pub brand: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub image_url: Option<String>,
    pub stock: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookMetadata {
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub isbn: Option<String>,
    pub publication_date: Option<String>,
    pub cover_url: Option<String>,
    pub pages: Option<u32>,
}

/// Item type together with the metadata that only makes sense for that type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "item_type", rename_all = "lowercase")]
pub enum ItemDetails {
    Movie(MovieMetadata),
    Product(ProductMetadata),
    Book(BookMetadata),
}

impl ItemDetails {
    pub fn item_type(&self) -> ItemType {
        match self {
            ItemDetails::Movie(_) => ItemType::Movie,
            ItemDetails::Product(_) => ItemType::Product,
            ItemDetails::Book(_) => ItemType::Book,
        }
    }

    /// Only products carry a category.
    pub fn category(&self) -> Option<&str> {
        match self {
            ItemDetails::Product(meta) => meta.category.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub details: ItemDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    fn with_details(details: ItemDetails) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: None,
            name: None,
            description: String::new(),
            genres: Vec::new(),
            tags: Vec::new(),
            details,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn movie(title: impl Into<String>, metadata: MovieMetadata) -> Self {
        let mut item = Self::with_details(ItemDetails::Movie(metadata));
        item.title = Some(title.into());
        item
    }

    pub fn product(name: impl Into<String>, metadata: ProductMetadata) -> Self {
        let mut item = Self::with_details(ItemDetails::Product(metadata));
        item.name = Some(name.into());
        item
    }

    pub fn book(title: impl Into<String>, metadata: BookMetadata) -> Self {
        let mut item = Self::with_details(ItemDetails::Book(metadata));
        item.title = Some(title.into());
        item
    }

    pub fn with_id(mut self, id: ItemId) -> Self {
        self.id = id;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_genres<S: Into<String>>(mut self, genres: impl IntoIterator<Item = S>) -> Self {
        self.genres = genres.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn item_type(&self) -> ItemType {
        self.details.item_type()
    }

    pub fn category(&self) -> Option<&str> {
        self.details.category()
    }

    pub fn display_name(&self) -> &str {
        self.title
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            username: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

impl Default for User {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub rating: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rating {
    pub fn new(user_id: UserId, item_id: ItemId, rating: u8) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            item_id,
            rating,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = created_at;
        self
    }
}

/// A rating as seen from its author's side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRating {
    pub item_id: ItemId,
    pub rating: u8,
    pub created_at: DateTime<Utc>,
}

impl From<&Rating> for UserRating {
    fn from(rating: &Rating) -> Self {
        Self {
            item_id: rating.item_id,
            rating: rating.rating,
            created_at: rating.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemFilter {
    pub item_type: Option<ItemType>,
    pub category: Option<String>,
    pub genre: Option<String>,
}

impl ItemFilter {
    pub fn of_type(item_type: ItemType) -> Self {
        Self {
            item_type: Some(item_type),
            ..Self::default()
        }
    }

    pub fn matches(&self, item: &Item) -> bool {
        if let Some(item_type) = self.item_type {
            if item.item_type() != item_type {
                return false;
            }
        }

        if let Some(ref category) = self.category {
            if item.category() != Some(category.as_str()) {
                return false;
            }
        }

        if let Some(ref genre) = self.genre {
            if !item.genres.iter().any(|g| g == genre) {
                return false;
            }
        }

        true
    }
}

/// Rating statistics joined onto one item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemAggregate {
    pub item: Item,
    pub avg_rating: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    Collaborative,
    ContentBased,
    Popular,
    Trending,
    Hybrid,
}

/// An item snapshot annotated with how and how strongly it was recommended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(flatten)]
    pub item: Item,
    pub recommendation_score: f64,
    pub recommendation_type: RecommendationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collaborative_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_count: Option<usize>,
}

impl Recommendation {
    pub fn new(item: Item, score: f64, recommendation_type: RecommendationType) -> Self {
        Self {
            item,
            recommendation_score: score,
            recommendation_type,
            collaborative_score: None,
            content_score: None,
            avg_rating: None,
            rating_count: None,
        }
    }

    pub fn item_id(&self) -> ItemId {
        self.item.id
    }

    pub fn with_component_scores(mut self, collaborative: f64, content: f64) -> Self {
        self.collaborative_score = Some(collaborative);
        self.content_score = Some(content);
        self
    }

    pub fn with_rating_stats(mut self, avg_rating: f64, rating_count: usize) -> Self {
        self.avg_rating = Some((avg_rating * 100.0).round() / 100.0);
        self.rating_count = Some(rating_count);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationMethod {
    #[default]
    Hybrid,
    Collaborative,
    Content,
}

impl RecommendationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationMethod::Hybrid => "hybrid",
            RecommendationMethod::Collaborative => "collaborative",
            RecommendationMethod::Content => "content",
        }
    }
}

impl FromStr for RecommendationMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hybrid" => Ok(RecommendationMethod::Hybrid),
            "collaborative" => Ok(RecommendationMethod::Collaborative),
            "content" | "content_based" => Ok(RecommendationMethod::Content),
            other => Err(anyhow::anyhow!("Unknown recommendation method: {}", other)),
        }
    }
}

/// Users, items and ratings in one document, as loaded by the binaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    pub users: Vec<User>,
    pub items: Vec<Item>,
    pub ratings: Vec<Rating>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_details_serde_tagging() {
        let item = Item::movie(
            "Heat",
            MovieMetadata {
                director: Some("Michael Mann".to_string()),
                cast: vec!["Al Pacino".to_string()],
                ..Default::default()
            },
        )
        .with_genres(["crime"]);

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["details"]["item_type"], "movie");
        assert_eq!(json["details"]["director"], "Michael Mann");
        assert!(json.get("name").is_none());

        let back: Item = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_product_category() {
        let item = Item::product(
            "Trail Shoe",
            ProductMetadata {
                brand: Some("Acme".to_string()),
                category: Some("footwear".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(item.item_type(), ItemType::Product);
        assert_eq!(item.category(), Some("footwear"));
        assert_eq!(item.display_name(), "Trail Shoe");
    }

    #[test]
    fn test_item_filter() {
        let book = Item::book("Dune", BookMetadata::default()).with_genres(["scifi"]);

        assert!(ItemFilter::default().matches(&book));
        assert!(ItemFilter::of_type(ItemType::Book).matches(&book));
        assert!(!ItemFilter::of_type(ItemType::Movie).matches(&book));

        let by_genre = ItemFilter {
            genre: Some("scifi".to_string()),
            ..Default::default()
        };
        assert!(by_genre.matches(&book));

        let by_category = ItemFilter {
            category: Some("footwear".to_string()),
            ..Default::default()
        };
        assert!(!by_category.matches(&book));
    }

    #[test]
    fn test_recommendation_json_shape() {
        let item = Item::book("Dune", BookMetadata::default());
        let rec = Recommendation::new(item, 0.75, RecommendationType::Hybrid)
            .with_component_scores(1.0, 0.5);

        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["recommendation_type"], "hybrid");
        assert_eq!(json["title"], "Dune");
        assert_eq!(json["collaborative_score"], 1.0);
        assert!(json.get("avg_rating").is_none());
    }

    #[test]
    fn test_rating_stats_rounding() {
        let item = Item::book("Dune", BookMetadata::default());
        let rec = Recommendation::new(item, 1.0, RecommendationType::Popular)
            .with_rating_stats(4.3333333, 3);
        assert_eq!(rec.avg_rating, Some(4.33));
        assert_eq!(rec.rating_count, Some(3));
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("content".parse::<RecommendationMethod>().unwrap(), RecommendationMethod::Content);
        assert_eq!(RecommendationMethod::default(), RecommendationMethod::Hybrid);
        assert!("random".parse::<RecommendationMethod>().is_err());
    }
}
