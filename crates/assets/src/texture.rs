use crate::error::AssetError;
use std::path::Path;

/// Decoded RGBA8 image, rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// A 1x1 texture of one color.
    pub fn solid(label: impl Into<String>, rgba: [u8; 4]) -> Self {
        Self {
            label: label.into(),
            width: 1,
            height: 1,
            pixels: rgba.to_vec(),
        }
    }

    /// Magenta/black checkerboard substituted for textures that fail to load.
    pub fn checkerboard(label: impl Into<String>, size: u32, cell: u32) -> Self {
        let size = size.max(1);
        let cell = cell.max(1);
        let mut pixels = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let on = ((x / cell) + (y / cell)) % 2 == 0;
                pixels.extend_from_slice(if on {
                    &[255, 0, 255, 255]
                } else {
                    &[0, 0, 0, 255]
                });
            }
        }
        Self {
            label: label.into(),
            width: size,
            height: size,
            pixels,
        }
    }

    /// Bytes per row of tightly packed pixels.
    pub fn bytes_per_row(&self) -> u32 {
        self.width * 4
    }
}

/// Decode an image file (PNG or JPEG) into RGBA8.
pub fn load_texture(path: impl AsRef<Path>) -> Result<TextureData, AssetError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| AssetError::io(path, e))?;
    let image = image::load_from_memory(&bytes).map_err(|source| AssetError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    tracing::debug!("decoded texture {} ({width}x{height})", path.display());
    Ok(TextureData {
        label: path.display().to_string(),
        width,
        height,
        pixels: rgba.into_raw(),
    })
}

/// Like [`load_texture`], but a missing or undecodable file yields a
/// checkerboard and a warning instead of an error.
pub fn load_texture_or_fallback(path: impl AsRef<Path>) -> TextureData {
    let path = path.as_ref();
    match load_texture(path) {
        Ok(texture) => texture,
        Err(err) => {
            tracing::warn!("using fallback texture: {err}");
            TextureData::checkerboard(path.display().to_string(), 64, 8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkerboard_alternates_cells() {
        let tex = TextureData::checkerboard("fallback", 4, 2);
        assert_eq!(tex.pixels.len(), 4 * 4 * 4);
        assert_eq!(&tex.pixels[0..4], &[255, 0, 255, 255]);
        // x = 2 starts the next cell on row 0.
        assert_eq!(&tex.pixels[8..12], &[0, 0, 0, 255]);
        assert_eq!(tex.bytes_per_row(), 16);
    }

    #[test]
    fn png_round_trips_through_image_crate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([200, 10, 20, 255]));
        img.save(&path).unwrap();

        let tex = load_texture(&path).unwrap();
        assert_eq!((tex.width, tex.height), (3, 2));
        assert_eq!(&tex.pixels[0..4], &[200, 10, 20, 255]);
    }

    #[test]
    fn missing_texture_falls_back() {
        let tex = load_texture_or_fallback("/no/such/texture.png");
        assert_eq!((tex.width, tex.height), (64, 64));
        assert_eq!(tex.label, "/no/such/texture.png");
    }

    #[test]
    fn garbage_bytes_are_image_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();
        assert!(matches!(load_texture(&path), Err(AssetError::Image { .. })));
    }
}
