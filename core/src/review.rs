//! Review records and their moderation lifecycle.
//!
//! Reviews are plain records. Defaults for new reviews (identifier, creation
//! time, `pending` status, empty media) are filled by [`Review::create`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Maximum length of a single review text, in characters.
pub const MAX_REVIEW_TEXT_LEN: usize = 1000;

/// Maximum length of user and product identifiers.
pub const MAX_IDENTIFIER_LEN: usize = 255;

/// Language a review was written in or translated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English
    En,
    /// Arabic
    Ar,
}

impl Language {
    /// Every supported language.
    pub const ALL: [Self; 2] = [Self::En, Self::Ar];

    /// Two-letter code used on the wire and by the translation provider.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ar => "ar",
        }
    }

    /// Name of the review column holding text in this language.
    #[must_use]
    pub const fn text_field(self) -> &'static str {
        match self {
            Self::En => "review_en",
            Self::Ar => "review_ar",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en" => Ok(Self::En),
            "ar" => Ok(Self::Ar),
            other => Err(format!("Unsupported language: {other}")),
        }
    }
}

/// Moderation state of a review.
///
/// Only `Published` reviews contribute to product statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationStatus {
    /// Awaiting moderation (default on insert)
    #[default]
    Pending,
    /// Visible and counted
    Published,
    /// Hidden and not counted
    Rejected,
}

impl PublicationStatus {
    /// Every status, in moderation order.
    pub const ALL: [Self; 3] = [Self::Pending, Self::Published, Self::Rejected];

    /// Convert to the persisted string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Published => "published",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PublicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "published" => Ok(Self::Published),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("Invalid publication status: {other}")),
        }
    }
}

/// Kind of an attached media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still image (jpeg, png, gif)
    Image,
    /// Video clip (mp4, mov, avi)
    Video,
}

impl MediaKind {
    /// Accepted upload extensions.
    pub const ALLOWED_EXTENSIONS: [&'static str; 7] =
        ["jpeg", "png", "jpg", "gif", "mp4", "mov", "avi"];

    /// Classify an upload by its file extension (case-insensitive).
    ///
    /// Returns `None` for extensions that are not accepted.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        match ext.as_str() {
            "mp4" | "mov" | "avi" => Some(Self::Video),
            "jpeg" | "png" | "jpg" | "gif" => Some(Self::Image),
            _ => None,
        }
    }
}

/// A media attachment stored alongside a review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    /// Attachment identifier
    pub id: String,
    /// Image or video
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// Blob storage path (also the CDN path)
    pub path: String,
    /// Public URL
    pub url: String,
}

/// Input for creating a review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReview {
    /// Author
    pub user_id: String,
    /// Reviewed product
    pub product_id: String,
    /// Rating, 1..=5
    pub rating: u8,
    /// Language the review was written in
    pub original_language: Language,
    /// English text
    pub review_en: Option<String>,
    /// Arabic text
    pub review_ar: Option<String>,
    /// ISO-3166 alpha-2 country code
    pub country: String,
}

/// A stored review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    /// Immutable, globally unique identifier
    pub review_id: String,
    /// Author
    pub user_id: String,
    /// Reviewed product
    pub product_id: String,
    /// Rating, 1..=5
    pub rating: u8,
    /// Language the review was written in
    pub original_language: Language,
    /// English text (original or translation)
    pub review_en: Option<String>,
    /// Arabic text (original or translation)
    pub review_ar: Option<String>,
    /// ISO-3166 alpha-2 country code
    pub country: String,
    /// Creation time, never modified
    pub created_at: DateTime<Utc>,
    /// Moderation state
    pub publication_status: PublicationStatus,
    /// Ordered media attachments
    pub media: Vec<Media>,
}

impl Review {
    /// Build a review from user input, filling defaults.
    ///
    /// Assigns a fresh UUID v4, stamps `created_at`, starts in `pending`,
    /// and attaches no media.
    #[must_use]
    pub fn create(input: NewReview, now: DateTime<Utc>) -> Self {
        Self {
            review_id: Uuid::new_v4().to_string(),
            user_id: input.user_id,
            product_id: input.product_id,
            rating: input.rating,
            original_language: input.original_language,
            review_en: input.review_en.filter(|t| !t.is_empty()),
            review_ar: input.review_ar.filter(|t| !t.is_empty()),
            country: input.country,
            created_at: now,
            publication_status: PublicationStatus::Pending,
            media: Vec::new(),
        }
    }

    /// Text in the given language, if present and non-empty.
    #[must_use]
    pub fn text(&self, language: Language) -> Option<&str> {
        let text = match language {
            Language::En => self.review_en.as_deref(),
            Language::Ar => self.review_ar.as_deref(),
        };
        text.filter(|t| !t.is_empty())
    }

    /// Set the text for a language.
    pub fn set_text(&mut self, language: Language, text: String) {
        match language {
            Language::En => self.review_en = Some(text),
            Language::Ar => self.review_ar = Some(text),
        }
    }

    /// Text in the language the review was written in.
    #[must_use]
    pub fn original_text(&self) -> Option<&str> {
        self.text(self.original_language)
    }

    /// Supported languages other than the original that have no text yet.
    #[must_use]
    pub fn missing_translations(&self) -> Vec<Language> {
        Language::ALL
            .into_iter()
            .filter(|lang| *lang != self.original_language && self.text(*lang).is_none())
            .collect()
    }

    /// Whether this review counts toward product statistics.
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.publication_status == PublicationStatus::Published
    }

    /// Storage paths of every media attachment.
    #[must_use]
    pub fn media_paths(&self) -> Vec<String> {
        self.media.iter().map(|m| m.path.clone()).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn input() -> NewReview {
        NewReview {
            user_id: "user-1".into(),
            product_id: "product-1".into(),
            rating: 4,
            original_language: Language::En,
            review_en: Some("Great kettle".into()),
            review_ar: None,
            country: "AE".into(),
        }
    }

    #[test]
    fn create_fills_defaults() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let review = Review::create(input(), now);

        assert!(Uuid::parse_str(&review.review_id).is_ok());
        assert_eq!(review.created_at, now);
        assert_eq!(review.publication_status, PublicationStatus::Pending);
        assert!(review.media.is_empty());
    }

    #[test]
    fn create_generates_distinct_ids() {
        let now = Utc::now();
        let a = Review::create(input(), now);
        let b = Review::create(input(), now);
        assert_ne!(a.review_id, b.review_id);
    }

    #[test]
    fn empty_text_counts_as_missing() {
        let mut new = input();
        new.review_ar = Some(String::new());
        let review = Review::create(new, Utc::now());

        assert_eq!(review.text(Language::Ar), None);
        assert_eq!(review.missing_translations(), vec![Language::Ar]);
    }

    #[test]
    fn translation_fills_missing_language() {
        let mut review = Review::create(input(), Utc::now());
        review.set_text(Language::Ar, "غلاية رائعة".into());

        assert!(review.missing_translations().is_empty());
        assert_eq!(review.original_text(), Some("Great kettle"));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in PublicationStatus::ALL {
            assert_eq!(status.as_str().parse::<PublicationStatus>().unwrap(), status);
        }
        assert!("archived".parse::<PublicationStatus>().is_err());
    }

    #[test]
    fn media_kind_by_extension() {
        assert_eq!(MediaKind::from_extension("MP4"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_extension("avi"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_extension("jpg"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_extension("exe"), None);
    }

    #[test]
    fn media_serializes_kind_as_type() {
        let media = Media {
            id: "m-1".into(),
            kind: MediaKind::Video,
            path: "reviews/r-1/media-abcd1234.mp4".into(),
            url: "https://cdn.example.com/reviews/r-1/media-abcd1234.mp4".into(),
        };
        let json = serde_json::to_value(&media).unwrap();
        assert_eq!(json["type"], "video");
    }
}
