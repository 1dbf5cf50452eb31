use crate::stage::RgbaSprite;

use super::PlatformError;

pub fn decode_profile_image(bytes: &[u8]) -> Result<RgbaSprite, PlatformError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|error| PlatformError::ProfileData(format!("decode_failed:{error}")))?;
    let image = decoded.to_rgba8();
    Ok(RgbaSprite {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

    use super::*;

    #[test]
    fn png_bytes_decode_to_rgba() {
        let source = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(source)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode");

        let sprite = decode_profile_image(&bytes).expect("decode");
        assert_eq!((sprite.width, sprite.height), (3, 2));
        assert_eq!(sprite.rgba.len(), 3 * 2 * 4);
        assert_eq!(&sprite.rgba[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn garbage_bytes_are_profile_data_errors() {
        let error = decode_profile_image(b"not an image").expect_err("garbage");
        assert!(matches!(error, PlatformError::ProfileData(_)));
    }
}
