//! Directory queries backed by the local store.

use tracing::debug;

use crate::error::DirectoryError;
use crate::store::KeyValueStore;
use crate::sync::SyncHelper;

use super::client::DirectoryClient;
use super::filters::{self, ALL};
use super::types::{Restaurant, Review};

/// Restaurant directory with transparent local caching.
///
/// Every query loads the full record set through the sync helper, which only
/// touches the network when the local store is empty, then filters in memory.
pub struct Directory<S: KeyValueStore> {
  inner: DirectoryClient,
  sync: SyncHelper<S>,
}

impl<S: KeyValueStore> Directory<S> {
  pub fn new(inner: DirectoryClient, sync: SyncHelper<S>) -> Self {
    Self { inner, sync }
  }

  pub fn sync(&self) -> &SyncHelper<S> {
    &self.sync
  }

  /// All restaurants, in source order.
  pub async fn restaurants(&self) -> Result<Vec<Restaurant>, DirectoryError> {
    let result = self
      .sync
      .get_records(|| {
        let inner = self.inner.clone();
        async move { inner.get_restaurants().await }
      })
      .await?;

    debug!(source = ?result.source, count = result.data.len(), "Loaded restaurants");
    Ok(result.data)
  }

  /// All reviews, for every restaurant.
  pub async fn reviews(&self) -> Result<Vec<Review>, DirectoryError> {
    let result = self
      .sync
      .get_records(|| {
        let inner = self.inner.clone();
        async move { inner.get_reviews().await }
      })
      .await?;

    debug!(source = ?result.source, count = result.data.len(), "Loaded reviews");
    Ok(result.data)
  }

  /// Get a single restaurant. A missing id is `DirectoryError::NotFound`.
  pub async fn restaurant_by_id(&self, id: &str) -> Result<Restaurant, DirectoryError> {
    let restaurants = self.restaurants().await?;
    filters::find_by_id(&restaurants, id)
      .cloned()
      .ok_or_else(|| DirectoryError::NotFound(format!("Restaurant {} does not exist", id)))
  }

  #[allow(dead_code)]
  pub async fn restaurants_by_cuisine(
    &self,
    cuisine: &str,
  ) -> Result<Vec<Restaurant>, DirectoryError> {
    self.restaurants_by_cuisine_and_neighborhood(cuisine, ALL).await
  }

  #[allow(dead_code)]
  pub async fn restaurants_by_neighborhood(
    &self,
    neighborhood: &str,
  ) -> Result<Vec<Restaurant>, DirectoryError> {
    self.restaurants_by_cuisine_and_neighborhood(ALL, neighborhood).await
  }

  /// Filter on both dimensions; `"all"` disables either one.
  pub async fn restaurants_by_cuisine_and_neighborhood(
    &self,
    cuisine: &str,
    neighborhood: &str,
  ) -> Result<Vec<Restaurant>, DirectoryError> {
    let restaurants = self.restaurants().await?;
    Ok(filters::by_cuisine_and_neighborhood(
      restaurants,
      cuisine,
      neighborhood,
    ))
  }

  pub async fn cuisines(&self) -> Result<Vec<String>, DirectoryError> {
    Ok(filters::unique_cuisines(&self.restaurants().await?))
  }

  pub async fn neighborhoods(&self) -> Result<Vec<String>, DirectoryError> {
    Ok(filters::unique_neighborhoods(&self.restaurants().await?))
  }

  pub async fn reviews_for_restaurant(
    &self,
    restaurant_id: &str,
  ) -> Result<Vec<Review>, DirectoryError> {
    Ok(filters::reviews_for(self.reviews().await?, restaurant_id))
  }
}

impl<S: KeyValueStore> Clone for Directory<S> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
      sync: self.sync.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::directory::testing::serve;
  use crate::store::{SqliteStore, TransactionMode};
  use crate::sync::LatchState;
  use serde_json::json;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;

  /// Directory whose store already holds restaurants 1..=10 and two
  /// reviews, pointed at an API that refuses connections.
  fn seeded_directory() -> Directory<SqliteStore> {
    let sync = SyncHelper::new(SqliteStore::open_in_memory(), "restaurants-data", 1);

    let db = sync.open("restaurants").unwrap();
    for id in 1..=10u64 {
      let cuisine = if id % 2 == 0 { "Thai" } else { "Italian" };
      let neighborhood = if id <= 5 { "Manhattan" } else { "Queens" };
      let record = json!({
        "id": id,
        "name": format!("Restaurant {}", id),
        "cuisine_type": cuisine,
        "neighborhood": neighborhood,
        "photograph": format!("{}.jpg", id),
      });
      sync
        .store()
        .put_record(&db, "restaurants", TransactionMode::ReadWrite, &record)
        .unwrap();
    }

    let db = sync.open("reviews").unwrap();
    for (id, restaurant_id) in [(1u64, 3u64), (2, 4)] {
      let record = json!({ "id": id, "restaurant_id": restaurant_id, "name": "Guest" });
      sync
        .store()
        .put_record(&db, "reviews", TransactionMode::ReadWrite, &record)
        .unwrap();
    }

    let client = DirectoryClient::new("http://127.0.0.1:9").unwrap();
    Directory::new(client, sync)
  }

  #[tokio::test]
  async fn test_restaurant_by_id_found() {
    let directory = seeded_directory();
    let restaurant = directory.restaurant_by_id("4").await.unwrap();
    assert_eq!(restaurant.name, "Restaurant 4");
    assert_eq!(restaurant.image_url().as_deref(), Some("/img/4.jpg"));
  }

  #[tokio::test]
  async fn test_restaurant_by_id_not_found() {
    let directory = seeded_directory();
    let err = directory.restaurant_by_id("999").await.unwrap_err();
    assert!(err.is_not_found());
  }

  #[tokio::test]
  async fn test_filters_over_local_records() {
    let directory = seeded_directory();

    let italian = directory.restaurants_by_cuisine("Italian").await.unwrap();
    assert_eq!(italian.len(), 5);

    let queens = directory.restaurants_by_neighborhood("Queens").await.unwrap();
    assert!(queens.iter().all(|r| r.neighborhood == "Queens"));

    let everything = directory
      .restaurants_by_cuisine_and_neighborhood(ALL, ALL)
      .await
      .unwrap();
    assert_eq!(everything.len(), 10);

    assert_eq!(directory.cuisines().await.unwrap(), vec!["Italian", "Thai"]);
    assert_eq!(
      directory.neighborhoods().await.unwrap(),
      vec!["Manhattan", "Queens"]
    );
  }

  #[tokio::test]
  async fn test_reviews_for_restaurant() {
    let directory = seeded_directory();
    let reviews = directory.reviews_for_restaurant("3").await.unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].id, Some(1));
  }

  #[tokio::test]
  async fn test_empty_store_surfaces_transport_error() {
    let sync = SyncHelper::new(SqliteStore::open_in_memory(), "restaurants-data", 1);
    let client = DirectoryClient::new("http://127.0.0.1:9").unwrap();
    let directory = Directory::new(client, sync);

    let err = directory.restaurant_by_id("1").await.unwrap_err();
    assert!(matches!(err, DirectoryError::Transport(_)));
    assert!(!err.is_not_found());
  }

  /// Directory with an empty store, pointed at a local API serving `routes`.
  async fn remote_directory(
    routes: &[(&str, u16, &str)],
  ) -> (Directory<SqliteStore>, Arc<AtomicU32>) {
    let (base, hits) = serve(routes).await;
    let sync = SyncHelper::new(SqliteStore::open_in_memory(), "restaurants-data", 1);
    let client = DirectoryClient::new(&base).unwrap();
    (Directory::new(client, sync), hits)
  }

  #[tokio::test]
  async fn test_empty_store_fetches_patches_and_stores() {
    let body = r#"[
      {"id": 1, "name": "Mission Chinese Food", "neighborhood": "Manhattan",
       "cuisine_type": "Asian", "photograph": 1},
      {"id": 2, "name": "Emily", "neighborhood": "Brooklyn",
       "cuisine_type": "Pizza", "photograph": "storefront.png"},
      {"id": 10, "name": "Casa Enrique", "neighborhood": "Queens",
       "cuisine_type": "Mexican"}
    ]"#;
    let (directory, hits) = remote_directory(&[("/restaurants", 200, body)]).await;

    let restaurants = directory.restaurants().await.unwrap();
    let photos: Vec<_> = restaurants
      .iter()
      .map(|r| r.photograph.as_deref().unwrap())
      .collect();
    assert_eq!(photos, vec!["1.jpg", "storefront.png", "10.jpg"]);

    let db = directory.sync().open("restaurants").unwrap();
    let stored = directory.sync().store().get_all(&db, "restaurants").unwrap();
    assert_eq!(stored.len(), 3);
    assert_eq!(stored[0]["photograph"], "1.jpg");
    assert_eq!(stored[2]["photograph"], "10.jpg");
    assert_eq!(
      directory.sync().latch_state::<Restaurant>().await.unwrap(),
      LatchState::Fetched
    );

    // Served locally from now on
    assert_eq!(directory.cuisines().await.unwrap(), vec!["Asian", "Pizza", "Mexican"]);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_review_without_foreign_key_does_not_drop_the_rest() {
    let body = r#"[
      {"id": 1, "restaurant_id": 3, "name": "Steve"},
      {"id": 2, "restaurant_id": 3, "name": "Morgan"},
      {"id": 3, "name": "Anonymous"}
    ]"#;
    let (directory, _) = remote_directory(&[("/reviews/", 200, body)]).await;

    let reviews = directory.reviews_for_restaurant("3").await.unwrap();
    let ids: Vec<_> = reviews.iter().filter_map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2]);

    let db = directory.sync().open("reviews").unwrap();
    assert_eq!(directory.sync().store().count(&db, "reviews").unwrap(), 3);
    assert_eq!(directory.reviews().await.unwrap().len(), 3);
  }

  #[tokio::test]
  async fn test_api_error_status_reaches_caller() {
    let (directory, _) = remote_directory(&[("/restaurants", 500, "boom")]).await;

    let err = directory.cuisines().await.unwrap_err();
    assert!(matches!(err, DirectoryError::Status(500, _)));
    assert_eq!(
      directory.sync().latch_state::<Restaurant>().await.unwrap(),
      LatchState::NotFetched
    );
  }
}
