//! Data structures for tracked ad cards.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use web_sys::Element;

/// What kind of media an ad card carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// Best-effort reference to the media found inside a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub url: String,
    pub poster_url: Option<String>,
}

impl MediaRef {
    pub fn video(url: String, poster_url: Option<String>) -> MediaRef {
        MediaRef {
            kind: MediaKind::Video,
            url,
            poster_url,
        }
    }

    pub fn image(url: String) -> MediaRef {
        MediaRef {
            kind: MediaKind::Image,
            url,
            poster_url: None,
        }
    }
}

/// One tracked ad card. The anchor is the DOM element rooting the card in
/// the live page; it is generic so the registry logic can be exercised
/// without a DOM.
#[derive(Debug, Clone)]
pub struct AdCard<A = Element> {
    pub ad_id: String,
    pub anchor: A,
    pub media: Option<MediaRef>,
    pub is_saved: bool,
    pub tags: BTreeSet<String>,
}

impl<A> AdCard<A> {
    pub fn new(ad_id: String, anchor: A, media: Option<MediaRef>) -> AdCard<A> {
        AdCard {
            ad_id,
            anchor,
            media,
            is_saved: false,
            tags: BTreeSet::new(),
        }
    }

    /// Split the media reference into the (video, poster, image) triple the
    /// save request carries. At most one of video/image is set.
    pub fn media_fields(&self) -> (Option<String>, Option<String>, Option<String>) {
        match &self.media {
            Some(media) if media.kind == MediaKind::Video => (
                Some(media.url.clone()),
                media.poster_url.clone(),
                None,
            ),
            Some(media) => (None, None, Some(media.url.clone())),
            None => (None, None, None),
        }
    }
}

/// Insertion-ordered collection of tracked cards, deduplicated by ad id.
/// Cards accumulate for the lifetime of the page view; only an explicit
/// `clear` (manual reinitialization) discards them.
#[derive(Debug, Default)]
pub struct CardRegistry<A = Element> {
    cards: Vec<AdCard<A>>,
}

impl<A> CardRegistry<A> {
    pub fn new() -> CardRegistry<A> {
        CardRegistry { cards: Vec::new() }
    }

    pub fn contains(&self, ad_id: &str) -> bool {
        self.cards.iter().any(|card| card.ad_id == ad_id)
    }

    /// Insert a card unless its ad id is already tracked. First found wins.
    pub fn insert(&mut self, card: AdCard<A>) -> bool {
        if self.contains(&card.ad_id) {
            return false;
        }
        self.cards.push(card);
        true
    }

    pub fn get(&self, ad_id: &str) -> Option<&AdCard<A>> {
        self.cards.iter().find(|card| card.ad_id == ad_id)
    }

    pub fn get_mut(&mut self, ad_id: &str) -> Option<&mut AdCard<A>> {
        self.cards.iter_mut().find(|card| card.ad_id == ad_id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.cards.iter().map(|card| card.ad_id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn clear(&mut self) {
        self.cards.clear();
    }
}

/// One saved ad as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedAdEntry {
    pub ad_archive_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(ad_id: &str) -> AdCard<u32> {
        AdCard::new(ad_id.to_string(), 0, None)
    }

    #[test]
    fn registry_dedups_by_ad_id() {
        let mut registry = CardRegistry::new();
        assert!(registry.insert(card("111")));
        assert!(registry.insert(card("222")));
        assert!(!registry.insert(card("111")));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ids(), vec!["111", "222"]);
    }

    #[test]
    fn registry_clear_discards_everything() {
        let mut registry = CardRegistry::new();
        registry.insert(card("111"));
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.insert(card("111")));
    }

    #[test]
    fn media_fields_for_video() {
        let mut c = card("111");
        c.media = Some(MediaRef::video(
            "https://cdn/v.mp4".to_string(),
            Some("https://cdn/p.jpg".to_string()),
        ));
        assert_eq!(
            c.media_fields(),
            (
                Some("https://cdn/v.mp4".to_string()),
                Some("https://cdn/p.jpg".to_string()),
                None
            )
        );
    }

    #[test]
    fn media_fields_for_image_and_none() {
        let mut c = card("111");
        assert_eq!(c.media_fields(), (None, None, None));
        c.media = Some(MediaRef::image("https://cdn/i.jpg".to_string()));
        assert_eq!(
            c.media_fields(),
            (None, None, Some("https://cdn/i.jpg".to_string()))
        );
    }

    #[test]
    fn saved_ad_entry_tags_default_to_empty() {
        let entry: SavedAdEntry =
            serde_json::from_str(r#"{"ad_archive_id":"123"}"#).unwrap();
        assert_eq!(entry.ad_archive_id, "123");
        assert!(entry.tags.is_empty());
    }
}
