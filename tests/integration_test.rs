use hybridrec::algorithms::*;
use hybridrec::config::RecommendationConfig;
use hybridrec::services::recommendation::RecommendationService;
use hybridrec::services::store::{DataStore, InMemoryStore, SyntheticCatalog};
use hybridrec::*;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

fn service_with(store: Arc<InMemoryStore>, config: Config) -> RecommendationService {
    RecommendationService::new(store, Arc::new(config)).unwrap()
}

#[tokio::test]
async fn test_two_users_scenario_end_to_end() {
    let store = Arc::new(InMemoryStore::new());
    let items: Vec<Item> = (1..=3)
        .map(|i| Item::movie(format!("item{}", i), MovieMetadata::default()))
        .collect();
    for item in &items {
        store.insert_item(item.clone());
    }

    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    store.upsert_rating(Rating::new(a, items[0].id, 5)).unwrap();
    store.upsert_rating(Rating::new(a, items[1].id, 4)).unwrap();
    store.upsert_rating(Rating::new(b, items[0].id, 5)).unwrap();
    store.upsert_rating(Rating::new(b, items[1].id, 4)).unwrap();
    store.upsert_rating(Rating::new(b, items[2].id, 5)).unwrap();

    let mut config = Config::default();
    config.recommendation.min_common_items = 2;
    let service = service_with(store, config);

    let result = service.collaborative(a, 10, 0.3).await.unwrap();
    assert!(!result.fell_back);
    assert_eq!(result.recommendations.len(), 1);
    assert_eq!(result.recommendations[0].item_id(), items[2].id);
    assert!((result.recommendations[0].recommendation_score - 5.0).abs() < 1e-9);

    let json = serde_json::to_value(&result.recommendations[0]).unwrap();
    assert_eq!(json["recommendation_type"], "collaborative");
    assert_eq!(json["title"], "item3");
    assert!(json.get("content_score").is_none());
}

#[tokio::test]
async fn test_shared_genre_scenario() {
    let store = Arc::new(InMemoryStore::new());
    let x = Item::movie("X", MovieMetadata::default()).with_genres(["action"]);
    let y = Item::movie("Y", MovieMetadata::default()).with_genres(["action"]);
    let (x_id, y_id) = (x.id, y.id);
    store.insert_item(x);
    store.insert_item(y);

    let user = Uuid::new_v4();
    store.upsert_rating(Rating::new(user, x_id, 5)).unwrap();

    let service = service_with(store, Config::default());
    let result = service.content_based(user, 10, 0.3).await.unwrap();
    assert_eq!(result.recommendations.len(), 1);
    assert_eq!(result.recommendations[0].item_id(), y_id);
    assert!((result.recommendations[0].recommendation_score - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_no_ratings_anywhere() {
    let store = Arc::new(InMemoryStore::new());
    store.insert_item(Item::book("Lonely", BookMetadata::default()).with_genres(["poetry"]));
    let service = service_with(store.clone(), Config::default());
    let user = Uuid::new_v4();

    let collaborative = CollaborativeFilter::new(store.clone(), RecommendationConfig::default());
    assert!(collaborative.recommend(user, 10, 0.3).await.unwrap().is_empty());

    for method in [
        RecommendationMethod::Collaborative,
        RecommendationMethod::Content,
        RecommendationMethod::Hybrid,
    ] {
        let result = service
            .get_personalized_recommendations(user, 10, method)
            .await
            .unwrap();
        assert!(result.recommendations.is_empty());
        assert!(result.fell_back);
    }
    assert!(service.popular(&ItemFilter::default(), 10, 1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rated_items_never_recommended_on_synthetic_catalog() {
    let dataset = SyntheticCatalog {
        users: 40,
        items: 60,
        ratings_per_user: 15,
        ..Default::default()
    }
    .generate();
    let user_ids: Vec<UserId> = dataset.users.iter().take(5).map(|u| u.id).collect();
    let store = Arc::new(InMemoryStore::from_dataset(dataset).unwrap());

    let mut config = RecommendationConfig::default();
    config.min_common_items = 2;
    let collaborative = CollaborativeFilter::new(store.clone(), config.clone());
    let content = ContentRecommender::new(
        store.clone(),
        FeatureExtractor::new(Default::default()),
        config,
    );

    for user_id in user_ids {
        let rated: HashSet<ItemId> = store
            .ratings_of(user_id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.item_id)
            .collect();

        let collab = collaborative.recommend(user_id, 20, 0.0).await.unwrap();
        let by_content = content.recommend(user_id, 20, 0.0).await.unwrap();
        assert!(collab.iter().chain(&by_content).all(|r| !rated.contains(&r.item_id())));

        for pair in by_content.windows(2) {
            assert!(pair[0].recommendation_score >= pair[1].recommendation_score);
        }
    }
}

#[tokio::test]
async fn test_hybrid_with_collaborative_weight_only_matches_collaborative_order() {
    let dataset = SyntheticCatalog {
        seed: 7,
        users: 30,
        items: 40,
        ratings_per_user: 12,
        ..Default::default()
    }
    .generate();
    let user_id = dataset.users[0].id;
    let store = Arc::new(InMemoryStore::from_dataset(dataset).unwrap());

    let mut config = RecommendationConfig::default();
    config.min_common_items = 2;
    let collaborative = Arc::new(CollaborativeFilter::new(store.clone(), config.clone()));

    // Content source that never returns anything.
    struct Silent;
    #[async_trait::async_trait]
    impl Recommender for Silent {
        async fn recommend(&self, _: UserId, _: usize, _: f64) -> anyhow::Result<Vec<Recommendation>> {
            Ok(Vec::new())
        }
    }

    let hybrid = HybridBlender::new(collaborative.clone(), Arc::new(Silent), config);
    let blended = hybrid
        .generate_hybrid_recommendations(user_id, 5, 1.0, 0.0, 0.0)
        .await
        .unwrap();
    let direct = collaborative
        .generate_collaborative_recommendations(user_id, 5, 0.0)
        .await
        .unwrap();

    let blended_ids: Vec<ItemId> = blended.iter().map(|r| r.item_id()).collect();
    let direct_ids: Vec<ItemId> = direct.iter().map(|r| r.item_id()).collect();
    assert_eq!(blended_ids, direct_ids);
}

#[tokio::test]
async fn test_rating_upsert_keeps_one_rating_per_pair() {
    let store = Arc::new(InMemoryStore::new());
    let item = Item::product("Kettle", ProductMetadata::default());
    let item_id = item.id;
    store.insert_item(item);

    let user = Uuid::new_v4();
    let first = store.upsert_rating(Rating::new(user, item_id, 2)).unwrap();
    let second = store.upsert_rating(Rating::new(user, item_id, 5)).unwrap();

    assert_eq!(store.rating_count(), 1);
    assert_eq!(second.rating, 5);
    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at >= first.updated_at);

    let service = service_with(store, Config::default());
    let popular = service.popular(&ItemFilter::default(), 10, 1).await.unwrap();
    assert_eq!(popular[0].avg_rating, Some(5.0));
    assert_eq!(popular[0].rating_count, Some(1));
}

#[tokio::test]
async fn test_dataset_round_trips_through_json_file() {
    let dataset = SyntheticCatalog {
        users: 5,
        items: 9,
        ratings_per_user: 3,
        ..Default::default()
    }
    .generate();
    let path = std::env::temp_dir().join(format!("hybridrec-{}.json", Uuid::new_v4()));
    std::fs::write(&path, serde_json::to_string(&dataset).unwrap()).unwrap();

    let store = InMemoryStore::from_json_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(store.item_count(), 9);
    assert_eq!(store.rating_count(), 15);
}
