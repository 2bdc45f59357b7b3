//! Query string and form field values
//!
//! Values submitted through the URL query string or an urlencoded/multipart
//! body are decoded into [`Items`]. Bracketed keys build nested values:
//!
//! - `tag[]=a&tag[]=b` becomes a list under `tag`
//! - `user[name]=x` becomes a map under `user`
//! - `user[roles][]=admin` nests a list inside a map
//!
//! A plain key given more than once keeps its last value. A key nested
//! deeper than [`MAX_NESTING`] brackets is dropped.

use std::collections::BTreeMap;
use url::form_urlencoded;

/// Deepest bracket nesting accepted for a single key
pub const MAX_NESTING: usize = 64;

/// A single submitted value, possibly nested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Value(String),
    List(Vec<Item>),
    Map(BTreeMap<String, Item>),
}

impl Item {
    /// The scalar value, if this is not a list or map
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Item::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Item]> {
        match self {
            Item::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Item>> {
        match self {
            Item::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a nested key of a map item
    pub fn get(&self, key: &str) -> Option<&Item> {
        self.as_map().and_then(|map| map.get(key))
    }

    fn insert_path(&mut self, path: &[&str], value: String) {
        let Some((segment, rest)) = path.split_first() else {
            *self = Item::Value(value);
            return;
        };

        if segment.is_empty() {
            if !matches!(self, Item::List(_)) {
                *self = Item::List(Vec::new());
            }
            if let Item::List(list) = self {
                let mut child = Item::Map(BTreeMap::new());
                child.insert_path(rest, value);
                list.push(child);
            }
        } else {
            if !matches!(self, Item::Map(_)) {
                *self = Item::Map(BTreeMap::new());
            }
            if let Item::Map(map) = self {
                map.entry((*segment).to_string())
                    .or_insert_with(|| Item::Map(BTreeMap::new()))
                    .insert_path(rest, value);
            }
        }
    }
}

impl From<&str> for Item {
    fn from(value: &str) -> Self {
        Item::Value(value.to_string())
    }
}

/// Decoded top-level items of a query string or form body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Items {
    items: BTreeMap<String, Item>,
}

impl Items {
    pub fn new() -> Self {
        Items::default()
    }

    /// Decode an `application/x-www-form-urlencoded` string
    pub fn parse(input: &str) -> Self {
        let mut items = Items::new();
        for (key, value) in form_urlencoded::parse(input.trim_start_matches('?').as_bytes()) {
            items.insert(&key, value.into_owned());
        }
        items
    }

    /// Insert a value under a possibly bracketed key
    ///
    /// Keys nested deeper than [`MAX_NESTING`] are dropped with a warning.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        let (name, path) = split_key(key);
        if name.is_empty() {
            return;
        }
        if path.len() > MAX_NESTING {
            tracing::warn!(
                item = name,
                depth = path.len(),
                limit = MAX_NESTING,
                "item nested too deeply, dropping it"
            );
            return;
        }
        self.items
            .entry(name.to_string())
            .or_insert_with(|| Item::Map(BTreeMap::new()))
            .insert_path(&path, value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Item> {
        self.items.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Item)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Split `name[a][b]` into `name` and `["a", "b"]`
///
/// A key whose brackets do not close is taken literally.
fn split_key(key: &str) -> (&str, Vec<&str>) {
    let Some(open) = key.find('[') else {
        return (key, Vec::new());
    };
    if open == 0 {
        return (key, Vec::new());
    }

    let mut path = Vec::new();
    let mut rest = &key[open..];
    while let Some(inner) = rest.strip_prefix('[') {
        match inner.find(']') {
            Some(close) => {
                path.push(&inner[..close]);
                rest = &inner[close + 1..];
            }
            None => return (key, Vec::new()),
        }
    }

    (&key[..open], path)
}
