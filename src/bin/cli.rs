use anyhow::Result;
use clap::Parser;
use hybridrec::services::cache::RecommendationCache;
use hybridrec::services::recommendation::RecommendationService;
use hybridrec::services::store::{InMemoryStore, SyntheticCatalog};
use hybridrec::utils::validation::validate_uuid_string;
use hybridrec::{init_tracing, Config, ItemFilter, RecommendationMethod};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Print recommendations for one user as JSON", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// JSON dataset to load. A synthetic catalog is generated when omitted.
    #[arg(short, long)]
    dataset: Option<String>,

    /// User to recommend for. Defaults to the first user of the dataset.
    #[arg(short, long)]
    user: Option<String>,

    /// hybrid, collaborative, content, popular or trending.
    #[arg(short, long, default_value = "hybrid")]
    method: String,

    #[arg(long, default_value_t = 10)]
    limit: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value_t = 100)]
    users: usize,

    #[arg(long, default_value_t = 200)]
    items: usize,

    #[arg(long, default_value_t = 20)]
    ratings_per_user: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing();

    let config = Config::load_or_default(&args.config)?;

    let (store, first_user) = match &args.dataset {
        Some(path) => {
            let store = InMemoryStore::from_json_file(path)?;
            (store, None)
        }
        None => {
            let dataset = SyntheticCatalog {
                seed: args.seed,
                users: args.users,
                items: args.items,
                ratings_per_user: args.ratings_per_user,
                ..Default::default()
            }
            .generate();
            info!(
                users = dataset.users.len(),
                items = dataset.items.len(),
                ratings = dataset.ratings.len(),
                "Generated synthetic catalog"
            );
            let first = dataset.users.first().map(|u| u.id);
            (InMemoryStore::from_dataset(dataset)?, first)
        }
    };

    let user_id = match (&args.user, first_user) {
        (Some(raw), _) => validate_uuid_string(raw)?,
        (None, Some(id)) => id,
        (None, None) => anyhow::bail!("--user is required when loading a dataset file"),
    };

    // One-shot run; nothing to memoize.
    let service =
        RecommendationService::with_cache(Arc::new(store), Arc::new(config), RecommendationCache::disabled());
    let limit = args.limit;

    let output = match args.method.as_str() {
        "popular" => {
            let recommendations = service.popular(&ItemFilter::default(), limit, 1).await?;
            json!({ "method": "popular", "recommendations": recommendations })
        }
        "trending" => {
            let days = service.config().popularity.trending_days;
            let recommendations = service.trending(None, days, limit).await?;
            json!({ "method": "trending", "days": days, "recommendations": recommendations })
        }
        other => {
            let method: RecommendationMethod = other.parse()?;
            let result = service
                .get_personalized_recommendations(user_id, limit, method)
                .await?;
            json!({
                "user_id": user_id,
                "method": method.as_str(),
                "fell_back": result.fell_back,
                "recommendations": result.recommendations,
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
