//! One server page of list records plus its pagination metadata.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keys that may hold the record array when the body is an object.
const ITEM_KEYS: &[&str] = &["data", "items", "results"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_number: u32,
    pub total_pages: u32,
}

/// Pagination block as emitted by the list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default, alias = "currentPage")]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default, alias = "pages")]
    pub total_pages: Option<u32>,
}

impl Pagination {
    fn resolved_total_pages(&self) -> Option<u32> {
        self.total_pages.or_else(|| match (self.total, self.limit) {
            (Some(total), Some(limit)) if limit > 0 => {
                Some(u32::try_from(total.div_ceil(u64::from(limit))).unwrap_or(u32::MAX))
            }
            _ => None,
        })
    }
}

/// Total pages when the backend sent a bare list.
///
/// A short page is the last one; a full page means at least one more may
/// exist. This over-reports by one when the last page is exactly full.
pub fn infer_total_pages(page_number: u32, item_count: usize, page_size: u32) -> u32 {
    if item_count < page_size as usize {
        page_number
    } else {
        page_number.saturating_add(1)
    }
}

impl<T: DeserializeOwned> Page<T> {
    /// Build a page from a normalized gateway body.
    ///
    /// `requested` is the page number that was asked for; it is used
    /// whenever the body does not echo one back.
    pub fn from_body(body: Value, requested: u32, page_size: u32) -> Result<Self, serde_json::Error> {
        let (raw_items, pagination) = split_body(body)?;
        let items: Vec<T> = serde_json::from_value(raw_items)?;

        let (page_number, total_pages) = match pagination {
            Some(meta) => {
                let page_number = meta.page.unwrap_or(requested);
                let total_pages = meta
                    .resolved_total_pages()
                    .unwrap_or_else(|| infer_total_pages(page_number, items.len(), page_size));
                (page_number, total_pages)
            }
            None => (requested, infer_total_pages(requested, items.len(), page_size)),
        };

        Ok(Self {
            items,
            page_number,
            total_pages,
        })
    }
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.page_number < self.total_pages
    }
}

fn split_body(body: Value) -> Result<(Value, Option<Pagination>), serde_json::Error> {
    match body {
        Value::Null => Ok((Value::Array(Vec::new()), None)),
        Value::Array(_) => Ok((body, None)),
        Value::Object(mut map) => {
            let pagination = match map.remove("pagination") {
                Some(Value::Null) | None => None,
                Some(raw) => Some(serde_json::from_value::<Pagination>(raw)?),
            };

            let keyed = ITEM_KEYS
                .iter()
                .copied()
                .find(|key| map.get(*key).is_some_and(Value::is_array))
                .and_then(|key| map.remove(key));

            let items = match keyed {
                Some(items) => items,
                None => {
                    // Endpoints like `{ appointments: [...] }` carry exactly one list.
                    let mut arrays = map.into_iter().filter(|(_, v)| v.is_array());
                    match (arrays.next(), arrays.next()) {
                        (Some((_, items)), None) => items,
                        (None, _) => Value::Array(Vec::new()),
                        _ => {
                            return Err(serde::de::Error::custom(
                                "ambiguous list body: several array fields",
                            ))
                        }
                    }
                }
            };
            Ok((items, pagination))
        }
        other => Err(serde::de::Error::custom(format!(
            "expected list body, got {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
