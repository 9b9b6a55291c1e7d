//! Description extraction from the standard meta tags.

use crate::consts::DESCRIPTION_META_KEYS;
use crate::doc::Document;
use crate::extract::meta_map;

pub fn extract_description(doc: &Document) -> String {
    let map = meta_map(doc);
    DESCRIPTION_META_KEYS
        .iter()
        .find_map(|key| map.get(*key).cloned())
        .map(|d| d.trim().to_string())
        .unwrap_or_default()
}
