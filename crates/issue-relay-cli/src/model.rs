use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Decoded `node.json` payload. A missing `list` means no items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ItemList {
    #[serde(default)]
    pub list: Option<Vec<Item>>,
}

impl ItemList {
    pub fn len(&self) -> usize {
        self.list.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One issue node. drupal.org renders empty fields as `[]` and ids as either
/// strings or numbers, so every field decodes leniently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Item {
    #[serde(default, deserialize_with = "lenient_string")]
    pub nid: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: String,
    #[serde(default, rename = "body", deserialize_with = "body_value")]
    pub body_html: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub created: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub changed: String,
    #[serde(default, rename = "field_project", deserialize_with = "reference_id")]
    pub project_id: String,
    #[serde(
        default,
        rename = "taxonomy_vocabulary_9",
        deserialize_with = "reference_ids"
    )]
    pub tag_ids: Vec<String>,
}

impl Item {
    pub fn created_secs(&self) -> Option<f64> {
        parse_timestamp(&self.created)
    }

    pub fn changed_secs(&self) -> Option<f64> {
        parse_timestamp(&self.changed)
    }
}

fn parse_timestamp(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_text(&value).unwrap_or_default())
}

fn body_value<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .get("value")
        .and_then(scalar_text)
        .unwrap_or_default())
}

fn reference_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.get("id").and_then(scalar_text).unwrap_or_default())
}

fn reference_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let ids = match value {
        Value::Array(terms) => terms
            .iter()
            .filter_map(|term| term.get("id").and_then(scalar_text))
            .filter(|id| !id.is_empty())
            .collect(),
        Value::Object(_) => value
            .get("id")
            .and_then(scalar_text)
            .into_iter()
            .collect(),
        _ => Vec::new(),
    };

    Ok(ids)
}
