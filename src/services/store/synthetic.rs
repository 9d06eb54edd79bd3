use crate::models::*;
use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use uuid::{Builder, Uuid};

const GENRES: &[&str] = &[
    "action", "comedy", "drama", "fantasy", "history", "horror", "romance", "sci-fi", "thriller",
];
const TAGS: &[&str] = &["classic", "award-winning", "indie", "bestseller", "new", "family"];
const PEOPLE: &[&str] = &[
    "Ada Park", "Ben Ortiz", "Cleo Grant", "Dev Rao", "Eli Moss", "Faye Lin", "Gus Hale", "Ivy Stone",
];
const BRANDS: &[&str] = &["Acme", "Northwind", "Globex", "Initech"];
const CATEGORIES: &[&str] = &["kitchen", "outdoor", "electronics", "footwear"];
const PUBLISHERS: &[&str] = &["Harbor House", "Quill & Co", "Lantern Press"];

/// Shape of a generated catalog.
#[derive(Debug, Clone)]
pub struct SyntheticCatalog {
    pub seed: u64,
    pub users: usize,
    pub items: usize,
    pub ratings_per_user: usize,
    /// Ratings are spread uniformly over this many trailing days.
    pub history_days: i64,
}

impl Default for SyntheticCatalog {
    fn default() -> Self {
        Self {
            seed: 42,
            users: 100,
            items: 200,
            ratings_per_user: 20,
            history_days: 30,
        }
    }
}

impl SyntheticCatalog {
    /// Generates the catalog. The same seed always yields the same dataset
    /// apart from timestamps, which are relative to now.
    pub fn generate(&self) -> Dataset {
        let mut rng = StdRng::seed_from_u64(self.seed);

        let users: Vec<User> = (0..self.users)
            .map(|i| {
                let mut user = User::new().with_username(format!("user{}", i));
                user.id = seeded_uuid(&mut rng);
                user
            })
            .collect();

        let items: Vec<Item> = (0..self.items).map(|i| random_item(&mut rng, i)).collect();

        let now = Utc::now();
        let mut ratings = Vec::with_capacity(self.users * self.ratings_per_user);
        for user in &users {
            let per_user = self.ratings_per_user.min(items.len());
            let picked: Vec<ItemId> = items
                .choose_multiple(&mut rng, per_user)
                .map(|item| item.id)
                .collect();
            for item_id in picked {
                let age = Duration::minutes(rng.gen_range(0..self.history_days.max(1) * 24 * 60));
                ratings.push(
                    Rating::new(user.id, item_id, rng.gen_range(1..=5)).with_created_at(now - age),
                );
            }
        }

        Dataset {
            users,
            items,
            ratings,
        }
    }
}

fn seeded_uuid(rng: &mut StdRng) -> Uuid {
    Builder::from_random_bytes(rng.gen()).into_uuid()
}

fn pick<'a>(rng: &mut StdRng, values: &[&'a str]) -> &'a str {
    values[rng.gen_range(0..values.len())]
}

fn some_of(rng: &mut StdRng, values: &[&str], max: usize) -> Vec<String> {
    let count = rng.gen_range(1..=max);
    values
        .choose_multiple(rng, count)
        .map(|v| v.to_string())
        .collect()
}

fn random_item(rng: &mut StdRng, index: usize) -> Item {
    let item = match index % 3 {
        0 => Item::movie(
            format!("Movie {}", index),
            MovieMetadata {
                director: Some(pick(rng, PEOPLE).to_string()),
                cast: some_of(rng, PEOPLE, 6),
                duration_minutes: Some(rng.gen_range(80..180)),
                ..Default::default()
            },
        ),
        1 => Item::product(
            format!("Product {}", index),
            ProductMetadata {
                brand: Some(pick(rng, BRANDS).to_string()),
                category: Some(pick(rng, CATEGORIES).to_string()),
                price: Some(f64::from(rng.gen_range(500u32..20_000)) / 100.0),
                stock: Some(rng.gen_range(0..500)),
                ..Default::default()
            },
        ),
        _ => Item::book(
            format!("Book {}", index),
            BookMetadata {
                author: Some(pick(rng, PEOPLE).to_string()),
                publisher: Some(pick(rng, PUBLISHERS).to_string()),
                pages: Some(rng.gen_range(90..900)),
                ..Default::default()
            },
        ),
    };

    let id = seeded_uuid(rng);
    let genres = some_of(rng, GENRES, 3);
    let tags = some_of(rng, TAGS, 2);
    let description = format!("A {} {}, tagged {}", genres.join("/"), item.item_type(), tags.join(", "));
    item.with_id(id)
        .with_description(description)
        .with_genres(genres)
        .with_tags(tags)
}
