//! Application services shared by the HTTP handlers and the binaries.

pub mod deps;
pub mod media;
pub mod reviews;
pub mod translation;

pub use deps::Deps;
pub use media::{MediaUploader, UploadedFile};
pub use reviews::{ListReviews, ProductReviews, ReviewService, StatusCounts};
pub use translation::TranslationService;
