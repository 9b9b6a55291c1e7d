//! Cover-image extraction from og:image, with a deny list for hosts whose
//! "cover" is always a site logo.

use crate::consts::{COVER_IMAGE_META_KEYS, COVER_IMAGE_SKIP_HOSTS};
use crate::doc::Document;
use crate::extract::meta_map;
use crate::util;

pub fn extract_cover_image(doc: &Document) -> String {
    if COVER_IMAGE_SKIP_HOSTS.iter().any(|h| doc.url.contains(h)) {
        return String::new();
    }
    let map = meta_map(doc);
    COVER_IMAGE_META_KEYS
        .iter()
        .find_map(|key| map.get(*key))
        .map(|value| util::ensure_link_absolute(value.trim(), &doc.url))
        .unwrap_or_default()
}
