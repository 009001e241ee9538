//! Sync implementations for directory types.

use crate::sync::Record;

use super::types::{Restaurant, Review};

// ============================================================================
// Record implementations
// ============================================================================

impl Record for Restaurant {
  fn store_name() -> &'static str {
    "restaurants"
  }

  fn record_id(&self) -> String {
    self.id.map(|id| id.to_string()).unwrap_or_default()
  }

  fn patch(mut self) -> Self {
    if let Some(filename) = photograph_filename(self.id, self.photograph.as_deref()) {
      self.photograph = Some(filename);
    }
    self
  }
}

impl Record for Review {
  fn store_name() -> &'static str {
    "reviews"
  }

  fn record_id(&self) -> String {
    self.id.map(|id| id.to_string()).unwrap_or_default()
  }
}

// ============================================================================
// Patch policy
// ============================================================================

/// Image filename for a restaurant.
///
/// Bare numbers get a `.jpg` suffix, missing or empty values fall back to
/// the restaurant id, anything else is already a filename. `None` when there
/// is neither a photograph nor an id to derive one from.
pub fn photograph_filename(id: Option<u64>, photograph: Option<&str>) -> Option<String> {
  match photograph.map(str::trim) {
    None | Some("") => id.map(|id| format!("{}.jpg", id)),
    Some(p) if p.chars().all(|c| c.is_ascii_digit()) => Some(format!("{}.jpg", p)),
    Some(p) => Some(p.to_string()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn restaurant(value: serde_json::Value) -> Restaurant {
    serde_json::from_value(value).unwrap()
  }

  #[test]
  fn test_numeric_photograph_gets_extension() {
    let patched = restaurant(json!({ "id": 1, "photograph": "1" })).patch();
    assert_eq!(patched.photograph.as_deref(), Some("1.jpg"));
  }

  #[test]
  fn test_missing_photograph_falls_back_to_id() {
    let patched = restaurant(json!({ "id": 10 })).patch();
    assert_eq!(patched.photograph.as_deref(), Some("10.jpg"));

    let patched = restaurant(json!({ "id": 4, "photograph": "" })).patch();
    assert_eq!(patched.photograph.as_deref(), Some("4.jpg"));
  }

  #[test]
  fn test_patch_is_idempotent() {
    for value in [
      json!({ "id": 1, "photograph": "1" }),
      json!({ "id": 2, "photograph": 7 }),
      json!({ "id": 3 }),
      json!({ "id": 4, "photograph": "storefront.png" }),
      json!({ "name": "no id" }),
    ] {
      let once = restaurant(value).patch();
      let twice = once.clone().patch();
      assert_eq!(once, twice);
    }
  }

  #[test]
  fn test_patched_photograph_is_never_empty() {
    for value in [
      json!({ "id": 1, "photograph": "1" }),
      json!({ "id": 3 }),
      json!({ "id": 4, "photograph": "" }),
    ] {
      let patched = restaurant(value).patch();
      assert!(!patched.photograph.as_deref().unwrap_or("").is_empty());
    }
  }

  #[test]
  fn test_missing_id_and_photograph_is_left_alone() {
    let patched = restaurant(json!({ "name": "no id" })).patch();
    assert_eq!(patched.photograph, None);

    let patched = restaurant(json!({ "photograph": 9 })).patch();
    assert_eq!(patched.photograph.as_deref(), Some("9.jpg"));
  }

  #[test]
  fn test_reviews_are_not_patched() {
    let review: Review =
      serde_json::from_value(json!({ "id": 1, "restaurant_id": 2, "comments": "ok" })).unwrap();
    assert_eq!(review.clone().patch(), review);
  }
}
