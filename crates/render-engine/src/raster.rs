//! Raster codec: uploaded bytes in, premultiplied pixmaps out, PNG back.

use std::fmt;
use std::io::Cursor;

use image::{ImageEncoder, ImageFormat, ImageReader};
use tiny_skia::{ColorU8, IntSize, Pixmap, PixmapRef};

use sizesnapper_common::error::{SnapperError, SnapperResult};
use sizesnapper_project_model::{ImageItem, Size};

/// A decoded layer raster in premultiplied RGBA.
#[derive(Clone, PartialEq)]
pub struct Raster {
    pixmap: Pixmap,
}

impl Raster {
    /// Build a raster from straight (non-premultiplied) RGBA8 pixels.
    pub fn from_rgba8(width: u32, height: u32, rgba: &[u8]) -> SnapperResult<Self> {
        let size = IntSize::from_wh(width, height)
            .ok_or_else(|| SnapperError::render(format!("invalid raster size {width}x{height}")))?;
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(SnapperError::render(format!(
                "expected {expected} bytes of RGBA for {width}x{height}, got {}",
                rgba.len()
            )));
        }

        let mut data = Vec::with_capacity(expected);
        for px in rgba.chunks_exact(4) {
            let c = ColorU8::from_rgba(px[0], px[1], px[2], px[3]).premultiply();
            data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }

        let pixmap = Pixmap::from_vec(data, size)
            .ok_or_else(|| SnapperError::render("failed to allocate raster"))?;
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Native dimensions, the basis of every layer bounding box.
    pub fn natural_size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    pub fn pixmap(&self) -> PixmapRef<'_> {
        self.pixmap.as_ref()
    }
}

impl fmt::Debug for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// Decode uploaded bytes into a raster.
///
/// The declared MIME type is tried first; if it is missing, unknown, or
/// wrong, the format is sniffed from the content instead.
pub fn decode_raster(file_name: &str, bytes: &[u8], mime_type: &str) -> SnapperResult<Raster> {
    let hinted = ImageFormat::from_mime_type(mime_type)
        .and_then(|format| image::load_from_memory_with_format(bytes, format).ok());

    let decoded = match hinted {
        Some(decoded) => decoded,
        None => ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| SnapperError::decode(file_name, e.to_string()))?
            .decode()
            .map_err(|e| SnapperError::decode(file_name, e.to_string()))?,
    };

    let rgba = decoded.into_rgba8();
    let (width, height) = rgba.dimensions();
    Raster::from_rgba8(width, height, rgba.as_raw())
        .map_err(|e| SnapperError::decode(file_name, e.to_string()))
}

/// Decode the bytes stored on an image layer.
pub fn decode_image(image: &ImageItem) -> SnapperResult<Raster> {
    decode_raster(&image.file_name, &image.data, &image.mime_type)
}

/// Straight-alpha RGBA8 bytes of a pixmap.
pub fn pixmap_to_rgba8(pixmap: &Pixmap) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixmap.data().len());
    for px in pixmap.pixels() {
        let c = px.demultiply();
        out.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    out
}

/// Encode a rendered surface as a lossless PNG.
pub fn encode_png(pixmap: &Pixmap) -> SnapperResult<Vec<u8>> {
    let rgba = pixmap_to_rgba8(pixmap);
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(
            &rgba,
            pixmap.width(),
            pixmap.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| SnapperError::encode(e.to_string()))?;
    Ok(buf)
}
