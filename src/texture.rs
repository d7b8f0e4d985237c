use std::io::Cursor;

use image::error::{ParameterError, ParameterErrorKind};
use image::{DynamicImage, ImageError, ImageFormat, ImageReader, RgbaImage};

use crate::error::VrmError;
use crate::scene::ImageData;

/// Image bytes ready to be embedded in a buffer view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Encode a scene image for embedding.
///
/// Already-encoded images pass through untouched; raw RGBA8 pixels are
/// written as PNG.
pub fn encode_image(data: &ImageData) -> Result<EncodedImage, VrmError> {
    match data {
        ImageData::Encoded { mime_type, bytes } => Ok(EncodedImage {
            mime_type: mime_type.clone(),
            bytes: bytes.clone(),
        }),
        ImageData::Rgba8 {
            width,
            height,
            pixels,
        } => {
            let image = RgbaImage::from_raw(*width, *height, pixels.clone()).ok_or_else(|| {
                ImageError::Parameter(ParameterError::from_kind(
                    ParameterErrorKind::DimensionMismatch,
                ))
            })?;
            let mut bytes = Vec::new();
            DynamicImage::ImageRgba8(image).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
            Ok(EncodedImage {
                mime_type: "image/png".to_string(),
                bytes,
            })
        }
    }
}

/// Read width and height from an encoded image header.
pub fn probe_dimensions(bytes: &[u8]) -> Result<(u32, u32), VrmError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(ImageError::IoError)?;
    Ok(reader.into_dimensions()?)
}

/// MIME type sniffed from the image signature.
pub fn guess_mime_type(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_rgba_pixels_when_encoding_then_png_with_same_dimensions_is_produced() {
        let data = ImageData::Rgba8 {
            width: 3,
            height: 2,
            pixels: vec![255; 3 * 2 * 4],
        };

        let encoded = encode_image(&data).expect("pixels match dimensions");

        assert_eq!(encoded.mime_type, "image/png");
        assert_eq!(&encoded.bytes[1..4], b"PNG");
        assert_eq!(probe_dimensions(&encoded.bytes).ok(), Some((3, 2)));
        assert_eq!(guess_mime_type(&encoded.bytes), Some("image/png"));
    }

    #[test]
    fn given_pixel_count_mismatch_when_encoding_then_image_error_is_returned() {
        let data = ImageData::Rgba8 {
            width: 4,
            height: 4,
            pixels: vec![0; 7],
        };
        assert!(matches!(encode_image(&data), Err(VrmError::Image(_))));
    }

    #[test]
    fn given_encoded_image_when_encoding_then_bytes_pass_through() {
        let data = ImageData::Encoded {
            mime_type: "image/jpeg".into(),
            bytes: vec![1, 2, 3],
        };
        let encoded = encode_image(&data).expect("pass-through");
        assert_eq!(encoded.bytes, vec![1, 2, 3]);
        assert_eq!(encoded.mime_type, "image/jpeg");
    }
}
