use std::pin::Pin;

pub mod error;
pub use error::{ErrorKind, GenerationError};

pub mod gemini;
pub use gemini::Gemini;

pub const DEFAULT_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_ENDPOINT_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub data: Vec<u8>,
    /// As reported by the provider, e.g. `image/png`
    pub mime_type: Option<String>,
}

pub trait ImageModel {
    fn get_image<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Image, GenerationError>> + Send + 'a>>;

    fn model(&self) -> &str;
}
