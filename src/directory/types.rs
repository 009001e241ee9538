use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A restaurant listing. Fields not used for filtering are carried in
/// `extra` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
  /// Records without a usable id are kept but never match an id lookup
  #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
  pub id: Option<u64>,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub neighborhood: String,
  #[serde(default)]
  pub cuisine_type: String,
  /// Image filename; guaranteed non-empty once patched
  #[serde(
    default,
    deserialize_with = "photograph_name",
    skip_serializing_if = "Option::is_none"
  )]
  pub photograph: Option<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl Restaurant {
  /// Relative URL of the restaurant's detail page
  pub fn page_url(&self) -> Option<String> {
    self.id.map(|id| format!("./restaurant.html?id={}", id))
  }

  /// Image path, falling back to `<id>.jpg` for unpatched records
  pub fn image_url(&self) -> Option<String> {
    match (self.photograph.as_deref(), self.id) {
      (Some(photo), _) if !photo.is_empty() => Some(format!("/img/{}", photo)),
      (_, Some(id)) => Some(format!("/img/{}.jpg", id)),
      _ => None,
    }
  }
}

/// A review of a restaurant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
  #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
  pub id: Option<u64>,
  /// Reviews without a usable foreign key belong to no restaurant
  #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
  pub restaurant_id: Option<u64>,
  #[serde(default)]
  pub name: String,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// Accept ids sent either as numbers or numeric strings. Anything else
/// (null, negative, free text) reads as no id rather than failing the
/// whole payload.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(match Value::deserialize(deserializer)? {
    Value::Number(n) => n.as_u64(),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  })
}

/// Photograph may arrive as a number, a string, null or not at all.
fn photograph_name<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(match Option::<Value>::deserialize(deserializer)? {
    Some(Value::Number(n)) => Some(n.to_string()),
    Some(Value::String(s)) => Some(s),
    _ => None,
  })
}
