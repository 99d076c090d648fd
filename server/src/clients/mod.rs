//! Production implementations of the external collaborator traits.

pub mod cdn;
pub mod media;
pub mod translation;

pub use cdn::HttpCdnClient;
pub use media::ObjectStoreMedia;
pub use translation::GoogleTranslator;
