//! Image reference helpers.
//!
//! The daemon reports local images by ID with their repo tags. Cleanup looks
//! the pulled image up by tag so it can be removed by ID.

use crate::container::ImageInfo;

/// Default tag applied to references that do not name one.
pub const DEFAULT_TAG: &str = "latest";

/// Normalize an image reference the way the daemon tags pulled images.
///
/// `alpine` becomes `alpine:latest`. A registry port (`host:5000/app`) is not
/// mistaken for a tag, and digest references are returned unchanged.
pub fn normalize_reference(image: &str) -> String {
    if image.contains('@') {
        return image.to_string();
    }

    let last_component = image.rsplit('/').next().unwrap_or(image);
    if last_component.contains(':') {
        image.to_string()
    } else {
        format!("{}:{}", image, DEFAULT_TAG)
    }
}

/// Find the ID of the local image tagged with `reference`.
pub fn find_image_id(images: &[ImageInfo], reference: &str) -> Option<String> {
    let wanted = normalize_reference(reference);
    images
        .iter()
        .find(|image| image.repo_tags.iter().any(|tag| *tag == wanted))
        .map(|image| image.id.clone())
}
