use std::fs;
use std::io::Cursor;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::ImageOutputFormat;

use crate::error::Result;

/// Normalizes arbitrary image bytes to PNG and returns Base64 payload.
pub fn encode_image_base64_from_bytes(bytes: &[u8]) -> Result<String> {
    let image = image::load_from_memory(bytes)?;
    let mut buffer = Vec::new();
    image.write_to(&mut Cursor::new(&mut buffer), ImageOutputFormat::Png)?;
    Ok(STANDARD.encode(&buffer))
}

/// Reads an image file and returns it as Base64 PNG.
pub fn encode_image_file(path: impl AsRef<Path>) -> Result<String> {
    let bytes = fs::read(path)?;
    encode_image_base64_from_bytes(&bytes)
}

/// Resolves a list of image references for a multimodal prompt.
///
/// Each entry is either a path to an image file or already Base64 data.
pub fn load_images<S: AsRef<str>>(images: &[S]) -> Result<Vec<String>> {
    images
        .iter()
        .map(|image| {
            let image = image.as_ref();
            if Path::new(image).is_file() {
                encode_image_file(image)
            } else {
                Ok(image.to_string())
            }
        })
        .collect()
}

pub(crate) fn data_url(base64_png: &str) -> String {
    if base64_png.starts_with("data:") {
        base64_png.to_string()
    } else {
        format!("data:image/png;base64,{base64_png}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    #[test]
    fn bytes_are_normalized_to_png() {
        let pixel: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(2, 2, Rgb([255, 0, 0]));
        let mut jpeg = Vec::new();
        pixel
            .write_to(&mut Cursor::new(&mut jpeg), ImageOutputFormat::Jpeg(90))
            .unwrap();

        let encoded = encode_image_base64_from_bytes(&jpeg).unwrap();
        let decoded = STANDARD.decode(encoded).unwrap();
        assert_eq!(&decoded[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn non_paths_pass_through_as_base64() {
        let images = load_images(&["aGVsbG8="]).unwrap();
        assert_eq!(images, vec!["aGVsbG8=".to_string()]);
    }

    #[test]
    fn data_url_is_not_wrapped_twice() {
        assert_eq!(data_url("QUJD"), "data:image/png;base64,QUJD");
        assert_eq!(data_url("data:image/jpeg;base64,QUJD"), "data:image/jpeg;base64,QUJD");
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        assert!(encode_image_base64_from_bytes(b"not an image").is_err());
    }
}
