//! CDN path patterns affected by review changes.
//!
//! Every builder returns paths already normalised to start with `/`.

/// Prefix a path with `/` unless it already has one.
#[must_use]
pub fn normalize(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

/// Normalise and de-duplicate a list of paths, keeping first-seen order.
#[must_use]
pub fn normalize_all<I, S>(paths: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for path in paths {
        let path = path.as_ref().trim();
        if path.is_empty() {
            continue;
        }
        let normalized = normalize(path);
        if !out.contains(&normalized) {
            out.push(normalized);
        }
    }
    out
}

/// Media files of one review.
#[must_use]
pub fn review_media(review_id: &str) -> Vec<String> {
    vec![format!("/reviews/{review_id}/*")]
}

/// Media files of every review.
#[must_use]
pub fn all_media() -> Vec<String> {
    vec!["/reviews/*".to_string()]
}

/// Individual media files by storage path.
#[must_use]
pub fn media_items<S: AsRef<str>>(paths: &[S]) -> Vec<String> {
    normalize_all(paths)
}

/// Review listings of one product.
#[must_use]
pub fn product_reviews_api(product_id: &str) -> Vec<String> {
    vec![format!("/api/products/{product_id}/reviews*")]
}

/// Every API resource of one review.
#[must_use]
pub fn review_api(review_id: &str) -> Vec<String> {
    vec![
        format!("/api/reviews/{review_id}*"),
        format!("/api/reviews/{review_id}/translate*"),
        format!("/api/reviews/{review_id}/publication*"),
    ]
}

/// Every review API resource.
#[must_use]
pub fn all_api() -> Vec<String> {
    vec![
        "/api/reviews*".to_string(),
        "/api/products/*/reviews*".to_string(),
    ]
}

/// Review listings without filters.
#[must_use]
pub fn review_listing() -> Vec<String> {
    vec!["/api/reviews".to_string()]
}

/// Paths touched by a review update (status change or new translation).
#[must_use]
pub fn review_updated(review_id: &str, product_id: &str) -> Vec<String> {
    let mut paths = review_api(review_id);
    paths.extend(product_reviews_api(product_id));
    paths
}

/// Paths touched by a review delete: media items first, then the API paths.
#[must_use]
pub fn review_deleted<S: AsRef<str>>(review_id: &str, product_id: &str, media_paths: &[S]) -> Vec<String> {
    let mut paths = media_items(media_paths);
    paths.extend(review_updated(review_id, product_id));
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_single_leading_slash() {
        assert_eq!(normalize("reviews/r-1/a.jpg"), "/reviews/r-1/a.jpg");
        assert_eq!(normalize("/reviews/r-1/a.jpg"), "/reviews/r-1/a.jpg");
        assert_eq!(normalize("//reviews"), "/reviews");
    }

    #[test]
    fn normalize_all_drops_blanks_and_duplicates() {
        let paths = normalize_all(["a", "/a", "", "  ", "b"]);
        assert_eq!(paths, vec!["/a".to_string(), "/b".to_string()]);
    }

    #[test]
    fn review_api_covers_sub_resources() {
        assert_eq!(
            review_api("r-1"),
            vec![
                "/api/reviews/r-1*",
                "/api/reviews/r-1/translate*",
                "/api/reviews/r-1/publication*",
            ]
        );
    }

    #[test]
    fn delete_includes_media_and_api_paths() {
        let paths = review_deleted("r-1", "p-1", &["reviews/r-1/media-a.jpg"]);
        assert_eq!(paths[0], "/reviews/r-1/media-a.jpg");
        assert!(paths.contains(&"/api/reviews/r-1*".to_string()));
        assert!(paths.contains(&"/api/products/p-1/reviews*".to_string()));
        assert!(paths.iter().all(|p| p.starts_with('/')));
    }

    #[test]
    fn bulk_patterns() {
        assert_eq!(all_media(), vec!["/reviews/*"]);
        assert_eq!(all_api(), vec!["/api/reviews*", "/api/products/*/reviews*"]);
        assert_eq!(product_reviews_api("p-9"), vec!["/api/products/p-9/reviews*"]);
        assert_eq!(review_media("r-2"), vec!["/reviews/r-2/*"]);
    }
}
