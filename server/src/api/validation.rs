//! Request validation.
//!
//! Every rule failing on a request is collected before responding, so a
//! client sees all of its mistakes in one 422:
//!
//! ```json
//! { "code": "VALIDATION_ERROR", "message": "The given data was invalid.",
//!   "errors": { "rating": ["The rating must be between 1 and 5."] } }
//! ```

use crate::app::UploadedFile;
use crate::app::media::MAX_MEDIA_BYTES;
use product_reviews_core::query::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use product_reviews_core::review::{
    Language, MAX_IDENTIFIER_LEN, MAX_REVIEW_TEXT_LEN, MediaKind, NewReview, PublicationStatus,
};
use product_reviews_core::statistics::{MAX_RATING, MIN_RATING};
use product_reviews_web::{AppError, FieldErrors};
use std::str::FromStr;

/// Collects field errors.
#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    /// Empty validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for `field`.
    pub fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.errors.entry(field.to_string()).or_default().push(message.into());
    }

    /// Require a non-blank value, returning it trimmed.
    pub fn required<'a>(&mut self, field: &str, value: Option<&'a str>) -> Option<&'a str> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => Some(v),
            None => {
                self.fail(field, format!("The {} field is required.", label(field)));
                None
            }
        }
    }

    /// Reject values longer than `max` characters.
    pub fn max_len(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.fail(
                field,
                format!("The {} field must not be greater than {max} characters.", label(field)),
            );
        }
    }

    /// Parse a value, recording `message` on failure.
    pub fn parse<T: FromStr>(&mut self, field: &str, value: &str, message: &str) -> Option<T> {
        match value.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                self.fail(field, message);
                None
            }
        }
    }

    /// Whether no rule has failed yet.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok` if nothing failed, otherwise a 422 listing every field.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::invalid_fields`] when any rule failed.
    pub fn finish(self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::invalid_fields(self.errors))
        }
    }
}

fn label(field: &str) -> String {
    field.replace('_', " ")
}

/// Raw text fields of a create-review request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ReviewForm {
    pub user_id: Option<String>,
    pub product_id: Option<String>,
    pub rating: Option<String>,
    pub original_language: Option<String>,
    pub review_en: Option<String>,
    pub review_ar: Option<String>,
    pub country: Option<String>,
}

impl ReviewForm {
    /// Set a field by its form name; unknown names are ignored.
    pub fn set(&mut self, name: &str, value: String) {
        let slot = match name {
            "user_id" => &mut self.user_id,
            "product_id" => &mut self.product_id,
            "rating" => &mut self.rating,
            "original_language" => &mut self.original_language,
            "review_en" => &mut self.review_en,
            "review_ar" => &mut self.review_ar,
            "country" => &mut self.country,
            _ => return,
        };
        *slot = Some(value);
    }
}

/// Validate a create request and its uploads.
///
/// # Errors
///
/// Returns a 422 listing every failing field.
pub fn validate_new_review(form: &ReviewForm, files: &[UploadedFile]) -> Result<NewReview, AppError> {
    let mut v = Validator::new();

    let user_id = v.required("user_id", form.user_id.as_deref());
    if let Some(id) = user_id {
        v.max_len("user_id", id, MAX_IDENTIFIER_LEN);
    }
    let product_id = v.required("product_id", form.product_id.as_deref());
    if let Some(id) = product_id {
        v.max_len("product_id", id, MAX_IDENTIFIER_LEN);
    }

    let rating = v.required("rating", form.rating.as_deref()).and_then(|raw| {
        match raw.parse::<u8>() {
            Ok(r) if (MIN_RATING..=MAX_RATING).contains(&r) => Some(r),
            _ => {
                v.fail(
                    "rating",
                    format!("The rating must be between {MIN_RATING} and {MAX_RATING}."),
                );
                None
            }
        }
    });

    let language = v
        .required("original_language", form.original_language.as_deref())
        .and_then(|raw| {
            v.parse::<Language>(
                "original_language",
                raw,
                "The original language must be either \"en\" or \"ar\".",
            )
        });

    let review_en = form.review_en.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let review_ar = form.review_ar.as_deref().map(str::trim).filter(|t| !t.is_empty());
    if let Some(text) = review_en {
        v.max_len("review_en", text, MAX_REVIEW_TEXT_LEN);
    }
    if let Some(text) = review_ar {
        v.max_len("review_ar", text, MAX_REVIEW_TEXT_LEN);
    }
    match language {
        Some(Language::En) if review_en.is_none() => {
            v.fail("review_en", "The review en field is required when original language is en.");
        }
        Some(Language::Ar) if review_ar.is_none() => {
            v.fail("review_ar", "The review ar field is required when original language is ar.");
        }
        _ => {}
    }

    let country = v.required("country", form.country.as_deref());
    if let Some(code) = country {
        if code.chars().count() != 2 {
            v.fail("country", "The country field must be 2 characters.");
        }
    }

    for (i, file) in files.iter().enumerate() {
        let field = format!("media_files.{i}");
        let accepted = file
            .extension()
            .is_some_and(|ext| MediaKind::from_extension(&ext).is_some());
        if !accepted {
            v.fail(
                &field,
                format!(
                    "The {field} field must be a file of type: {}.",
                    MediaKind::ALLOWED_EXTENSIONS.join(", ")
                ),
            );
        }
        if file.bytes.len() > MAX_MEDIA_BYTES {
            v.fail(
                &field,
                format!(
                    "The {field} field must not be greater than {} kilobytes.",
                    MAX_MEDIA_BYTES / 1024
                ),
            );
        }
    }

    v.finish()?;

    // Every required value is present once `finish` passes.
    match (user_id, product_id, rating, language, country) {
        (Some(user_id), Some(product_id), Some(rating), Some(original_language), Some(country)) => {
            Ok(NewReview {
                user_id: user_id.to_string(),
                product_id: product_id.to_string(),
                rating,
                original_language,
                review_en: review_en.map(str::to_string),
                review_ar: review_ar.map(str::to_string),
                country: country.to_ascii_uppercase(),
            })
        }
        _ => Err(AppError::validation("The given data was invalid.")),
    }
}

/// Validate `per_page`, defaulting when absent.
pub fn per_page(v: &mut Validator, raw: Option<&str>) -> usize {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return DEFAULT_PAGE_SIZE;
    };
    let message = format!("The per page must be between 1 and {MAX_PAGE_SIZE}.");
    match raw.parse::<usize>() {
        Ok(n) if (1..=MAX_PAGE_SIZE).contains(&n) => n,
        _ => {
            v.fail("per_page", message);
            DEFAULT_PAGE_SIZE
        }
    }
}

/// Validate an optional status filter.
pub fn optional_status(v: &mut Validator, raw: Option<&str>) -> Option<PublicationStatus> {
    let raw = raw.map(str::trim).filter(|r| !r.is_empty())?;
    v.parse(
        "publication_status",
        raw,
        "The publication status must be one of: pending, published, rejected.",
    )
}

/// Validate an optional language filter.
pub fn optional_language(v: &mut Validator, field: &str, raw: Option<&str>) -> Option<Language> {
    let raw = raw.map(str::trim).filter(|r| !r.is_empty())?;
    v.parse(field, raw, "The language must be either \"en\" or \"ar\".")
}

/// Non-blank optional string.
#[must_use]
pub fn optional(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
}

/// Validate the status of a moderation update.
///
/// # Errors
///
/// Returns a 422 if the status is missing or unknown.
pub fn required_status(raw: Option<&str>) -> Result<PublicationStatus, AppError> {
    let mut v = Validator::new();
    let status = v.required("publication_status", raw).and_then(|raw| {
        v.parse(
            "publication_status",
            raw,
            "The publication status must be one of: pending, published, rejected.",
        )
    });
    v.finish()?;
    status.ok_or_else(|| AppError::validation("The given data was invalid."))
}

/// Validate the target language of a translate request.
///
/// # Errors
///
/// Returns a 422 if the language is missing or unsupported.
pub fn required_language(raw: Option<&str>) -> Result<Language, AppError> {
    let raw = raw.map(str::trim).filter(|r| !r.is_empty());
    let Some(raw) = raw else {
        return Err(AppError::validation("The language query parameter is required."));
    };
    raw.parse()
        .map_err(|_| AppError::validation("The language must be either \"en\" or \"ar\"."))
}

/// Validate the product ids of a bulk summary request.
///
/// # Errors
///
/// Returns a 422 if the list is missing or empty, or an id is blank or too long.
pub fn product_ids(ids: Option<&[String]>) -> Result<Vec<String>, AppError> {
    let mut v = Validator::new();
    let ids = ids.unwrap_or_default();
    if ids.is_empty() {
        v.fail("product_ids", "The product ids field is required.");
    }
    for (i, id) in ids.iter().enumerate() {
        let field = format!("product_ids.{i}");
        if id.trim().is_empty() {
            v.fail(&field, format!("The {field} field is required."));
        }
        v.max_len(&field, id, MAX_IDENTIFIER_LEN);
    }
    v.finish()?;
    Ok(ids.to_vec())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn form() -> ReviewForm {
        ReviewForm {
            user_id: Some("u-1".into()),
            product_id: Some("p-1".into()),
            rating: Some("4".into()),
            original_language: Some("en".into()),
            review_en: Some("Solid".into()),
            review_ar: None,
            country: Some("ae".into()),
        }
    }

    fn errors(err: &AppError) -> Vec<String> {
        err.field_errors().unwrap().keys().cloned().collect()
    }

    #[test]
    fn test_valid_form() {
        let review = validate_new_review(&form(), &[]).unwrap();

        assert_eq!(review.rating, 4);
        assert_eq!(review.original_language, Language::En);
        assert_eq!(review.country, "AE");
        assert_eq!(review.review_ar, None);
    }

    #[test]
    fn test_every_failure_is_reported() {
        let bad = ReviewForm {
            user_id: None,
            rating: Some("6".into()),
            original_language: Some("fr".into()),
            country: Some("ARE".into()),
            ..form()
        };

        let err = validate_new_review(&bad, &[]).unwrap_err();

        assert_eq!(err.status(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            errors(&err),
            vec!["country", "original_language", "rating", "user_id"]
        );
    }

    #[test]
    fn test_original_text_required() {
        let bad = ReviewForm {
            original_language: Some("ar".into()),
            ..form()
        };

        let err = validate_new_review(&bad, &[]).unwrap_err();

        assert_eq!(errors(&err), vec!["review_ar"]);
    }

    #[test]
    fn test_text_length_limit() {
        let bad = ReviewForm {
            review_en: Some("x".repeat(MAX_REVIEW_TEXT_LEN + 1)),
            ..form()
        };

        assert_eq!(errors(&validate_new_review(&bad, &[]).unwrap_err()), vec!["review_en"]);
    }

    #[test]
    fn test_media_type_and_size() {
        let files = vec![
            UploadedFile {
                file_name: "ok.png".into(),
                bytes: vec![0; 4],
            },
            UploadedFile {
                file_name: "doc.pdf".into(),
                bytes: vec![0; 4],
            },
            UploadedFile {
                file_name: "big.mp4".into(),
                bytes: vec![0; MAX_MEDIA_BYTES + 1],
            },
        ];

        let err = validate_new_review(&form(), &files).unwrap_err();

        assert_eq!(errors(&err), vec!["media_files.1", "media_files.2"]);
    }

    #[test]
    fn test_per_page_bounds() {
        let mut v = Validator::new();
        assert_eq!(per_page(&mut v, None), DEFAULT_PAGE_SIZE);
        assert_eq!(per_page(&mut v, Some("25")), 25);
        assert!(v.is_valid());

        per_page(&mut v, Some("0"));
        per_page(&mut v, Some("101"));
        assert!(!v.is_valid());
    }

    #[test]
    fn test_translate_language_messages() {
        let missing = required_language(None).unwrap_err();
        assert_eq!(missing.to_string(), "[VALIDATION_ERROR] The language query parameter is required.");

        let bad = required_language(Some("fr")).unwrap_err();
        assert_eq!(
            bad.to_string(),
            "[VALIDATION_ERROR] The language must be either \"en\" or \"ar\"."
        );

        assert_eq!(required_language(Some("ar")).unwrap(), Language::Ar);
    }

    #[test]
    fn test_bulk_ids() {
        assert!(product_ids(None).is_err());
        assert!(product_ids(Some(&[])).is_err());
        assert!(product_ids(Some(&["p".repeat(MAX_IDENTIFIER_LEN + 1)])).is_err());
        assert_eq!(product_ids(Some(&["p-1".to_string()])).unwrap(), vec!["p-1"]);
    }
}
