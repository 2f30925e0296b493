//! Decoded rasters for the layers of an open project.
//!
//! Decoding runs off the async thread in batches. Each batch carries the
//! generation it was requested under; if the layer set changed while it was
//! decoding, the batch is stale and gets dropped on commit.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use sizesnapper_common::error::{SnapperError, SnapperResult};
use sizesnapper_project_model::{ImageItem, Size};
use sizesnapper_render_engine::{decode_image, Raster};

use crate::hit_test::LayerSizes;

/// Images that need decoding, stamped with the cache generation.
#[derive(Debug, Clone)]
pub struct DecodeRequest {
    pub generation: u64,
    pub images: Vec<ImageItem>,
}

impl DecodeRequest {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Results of a [`DecodeRequest`].
#[derive(Debug)]
pub struct DecodedBatch {
    pub generation: u64,
    pub results: Vec<(String, SnapperResult<Raster>)>,
}

/// Raster cache keyed by image id.
#[derive(Debug, Default)]
pub struct RasterCache {
    rasters: HashMap<String, Arc<Raster>>,
    failed: HashSet<String>,
    generation: u64,
}

impl RasterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, image_id: &str) -> Option<&Raster> {
        self.rasters.get(image_id).map(Arc::as_ref)
    }

    /// Whether decoding this image already failed.
    pub fn is_failed(&self, image_id: &str) -> bool {
        self.failed.contains(image_id)
    }

    pub fn len(&self) -> usize {
        self.rasters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rasters.is_empty()
    }

    /// Start a new generation for the current layer set.
    ///
    /// Entries for layers that are gone are evicted. The request lists the
    /// layers that have neither a raster nor a recorded failure.
    pub fn request(&mut self, images: &[ImageItem]) -> DecodeRequest {
        self.generation += 1;
        let live: HashSet<&str> = images.iter().map(|i| i.id.as_str()).collect();
        self.rasters.retain(|id, _| live.contains(id.as_str()));
        self.failed.retain(|id| live.contains(id.as_str()));

        let missing = images
            .iter()
            .filter(|i| !self.rasters.contains_key(&i.id) && !self.failed.contains(&i.id))
            .cloned()
            .collect();
        DecodeRequest {
            generation: self.generation,
            images: missing,
        }
    }

    /// Decode a request on the blocking pool.
    pub async fn decode_batch(request: DecodeRequest) -> SnapperResult<DecodedBatch> {
        let generation = request.generation;
        if request.is_empty() {
            return Ok(DecodedBatch {
                generation,
                results: Vec::new(),
            });
        }
        let results = tokio::task::spawn_blocking(move || {
            request
                .images
                .iter()
                .map(|image| (image.id.clone(), decode_image(image)))
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| SnapperError::render(format!("decode task failed: {e}")))?;
        Ok(DecodedBatch {
            generation,
            results,
        })
    }

    /// Store a batch's results. Returns `false` and keeps nothing if the
    /// batch belongs to an older generation.
    pub fn commit(&mut self, batch: DecodedBatch) -> bool {
        if batch.generation != self.generation {
            tracing::debug!(
                batch = batch.generation,
                current = self.generation,
                "Dropping stale decode batch"
            );
            return false;
        }
        for (image_id, result) in batch.results {
            match result {
                Ok(raster) => {
                    self.rasters.insert(image_id, Arc::new(raster));
                }
                Err(err) => {
                    tracing::warn!(image = %image_id, error = %err, "Layer could not be decoded");
                    self.failed.insert(image_id);
                }
            }
        }
        true
    }
}

impl LayerSizes for RasterCache {
    fn natural_size(&self, image_id: &str) -> Option<Size> {
        self.get(image_id).map(Raster::natural_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sizesnapper_project_model::NewImage;
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([1, 2, 3, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn layer(name: &str, bytes: Vec<u8>) -> ImageItem {
        ImageItem::new("p", NewImage::new(name, bytes, "image/png"), 0)
    }

    #[tokio::test]
    async fn test_decode_and_commit() {
        let images = vec![layer("ok.png", png(4, 2)), layer("bad.png", b"junk".to_vec())];
        let mut cache = RasterCache::new();

        let request = cache.request(&images);
        assert_eq!(request.images.len(), 2);
        let batch = RasterCache::decode_batch(request).await.unwrap();
        assert!(cache.commit(batch));

        assert_eq!(cache.natural_size(&images[0].id), Some(Size::new(4, 2)));
        assert_eq!(cache.natural_size(&images[1].id), None);
        assert!(cache.is_failed(&images[1].id));

        // Nothing left to decode.
        assert!(cache.request(&images).is_empty());
    }

    #[tokio::test]
    async fn test_stale_batch_is_dropped() {
        let first = vec![layer("a.png", png(1, 1))];
        let mut cache = RasterCache::new();

        let stale = cache.request(&first);
        let fresh = cache.request(&first);
        let stale_batch = RasterCache::decode_batch(stale).await.unwrap();
        assert!(!cache.commit(stale_batch));
        assert!(cache.is_empty());

        let fresh_batch = RasterCache::decode_batch(fresh).await.unwrap();
        assert!(cache.commit(fresh_batch));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_removed_layers_are_evicted() {
        let images = vec![layer("a.png", png(1, 1)), layer("b.png", png(2, 2))];
        let mut cache = RasterCache::new();
        let batch = RasterCache::decode_batch(cache.request(&images)).await.unwrap();
        cache.commit(batch);
        assert_eq!(cache.len(), 2);

        cache.request(&images[1..]);
        assert!(cache.get(&images[0].id).is_none());
        assert!(cache.get(&images[1].id).is_some());
    }
}
