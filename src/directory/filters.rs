//! In-memory directory queries. Every function scans its whole input and
//! keeps source order.

use super::types::{Restaurant, Review};

/// Filter value that matches everything
pub const ALL: &str = "all";

/// Loose id comparison: `"7"`, `" 7"` and `"007"` all match id 7. A record
/// without an id matches nothing.
pub fn id_matches(id: Option<u64>, input: &str) -> bool {
  match (id, input.trim().parse::<u64>()) {
    (Some(id), Ok(n)) => id == n,
    _ => false,
  }
}

pub fn find_by_id<'a>(restaurants: &'a [Restaurant], id: &str) -> Option<&'a Restaurant> {
  restaurants.iter().find(|r| id_matches(r.id, id))
}

pub fn by_cuisine_and_neighborhood(
  restaurants: Vec<Restaurant>,
  cuisine: &str,
  neighborhood: &str,
) -> Vec<Restaurant> {
  restaurants
    .into_iter()
    .filter(|r| cuisine == ALL || r.cuisine_type == cuisine)
    .filter(|r| neighborhood == ALL || r.neighborhood == neighborhood)
    .collect()
}

pub fn unique_cuisines(restaurants: &[Restaurant]) -> Vec<String> {
  unique_by_first_occurrence(restaurants.iter().map(|r| r.cuisine_type.as_str()))
}

pub fn unique_neighborhoods(restaurants: &[Restaurant]) -> Vec<String> {
  unique_by_first_occurrence(restaurants.iter().map(|r| r.neighborhood.as_str()))
}

pub fn reviews_for(reviews: Vec<Review>, restaurant_id: &str) -> Vec<Review> {
  reviews
    .into_iter()
    .filter(|r| id_matches(r.restaurant_id, restaurant_id))
    .collect()
}

fn unique_by_first_occurrence<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
  let mut unique: Vec<String> = Vec::new();
  for value in values {
    if !unique.iter().any(|u| u == value) {
      unique.push(value.to_string());
    }
  }
  unique
}
