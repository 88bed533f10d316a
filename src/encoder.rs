use crate::error::Error;
use base64::{engine::general_purpose, Engine};
use std::fs;
use std::path::Path;

const FALLBACK_MIME: &str = "image/png";

/// Read an image and return it as a `data:<mime>;base64,...` URL.
pub fn encode_image(path: &Path) -> Result<String, Error> {
    if !path.is_file() {
        return Err(Error::MissingFile(path.to_path_buf()));
    }
    let data = fs::read(path)?;
    let payload = general_purpose::STANDARD.encode(&data);
    Ok(format!("data:{};base64,{}", guess_mime(path), payload))
}

/// MIME type from the file extension. Unknown extensions fall back to PNG.
pub fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => FALLBACK_MIME,
    }
}
