// Overlapping tile generation
//
// Tiles are laid on a fixed grid with `stride = tile_size - overlap`.
// Strips at the right/bottom edge narrower than one stride are not covered
// unless `cover_trailing_edges` is set.

use image::{DynamicImage, GenericImageView};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::core::config::TilingConfig;
use crate::core::errors::{ConfigError, PipelineError};
use crate::core::types::{Tile, TileBounds};
use crate::utils::image_ops::crop_tile;

#[derive(Debug, Clone, Copy)]
pub struct TileSplitter {
    tile_size: u32,
    overlap: u32,
    cover_trailing_edges: bool,
}

impl TileSplitter {
    /// Fails with `InvalidTileGeometry` unless `tile_size > overlap >= 0`.
    pub fn new(tile_size: u32, overlap: u32) -> Result<Self, ConfigError> {
        if tile_size == 0 || tile_size <= overlap {
            return Err(ConfigError::InvalidTileGeometry { tile_size, overlap });
        }
        Ok(Self {
            tile_size,
            overlap,
            cover_trailing_edges: false,
        })
    }

    pub fn from_config(config: &TilingConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.tile_size, config.overlap)?
            .with_trailing_edges(config.cover_trailing_edges))
    }

    pub fn with_trailing_edges(mut self, enabled: bool) -> Self {
        self.cover_trailing_edges = enabled;
        self
    }

    pub fn stride(&self) -> u32 {
        self.tile_size - self.overlap
    }

    /// Compute tile placements for an image of the given size, row-major.
    pub fn plan(&self, width: u32, height: u32) -> Result<Vec<TileBounds>, PipelineError> {
        let xs = self.axis_starts(width);
        let ys = self.axis_starts(height);

        if xs.is_empty() || ys.is_empty() {
            return Err(PipelineError::ImageTooSmall {
                width,
                height,
                tile_size: self.tile_size,
                overlap: self.overlap,
            });
        }

        let tiles = ys
            .iter()
            .flat_map(|&y1| {
                xs.iter().map(move |&x1| TileBounds {
                    x1,
                    y1,
                    x2: (x1 + self.tile_size).min(width),
                    y2: (y1 + self.tile_size).min(height),
                })
            })
            .collect();

        Ok(tiles)
    }

    /// Cut the image into tiles.
    #[instrument(skip(self, image), fields(tile_size = self.tile_size, overlap = self.overlap))]
    pub fn split(&self, image: &DynamicImage) -> Result<Vec<Tile>, PipelineError> {
        let (width, height) = image.dimensions();
        let plan = self.plan(width, height)?;

        let tiles: Vec<Tile> = plan
            .into_iter()
            .enumerate()
            .map(|(index, bounds)| Tile {
                index,
                bounds,
                image: Arc::new(crop_tile(image, &bounds)),
            })
            .collect();

        debug!("Split {}x{} image into {} tiles", width, height, tiles.len());
        Ok(tiles)
    }

    /// Start offsets along one axis of length `len`.
    fn axis_starts(&self, len: u32) -> Vec<u32> {
        let stride = self.stride();
        let count = len.saturating_sub(self.overlap) / stride;
        let mut starts: Vec<u32> = (0..count).map(|i| i * stride).collect();

        if self.cover_trailing_edges {
            if let Some(&last) = starts.last() {
                if last + self.tile_size < len {
                    starts.push(len - self.tile_size);
                }
            }
        }

        starts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn bounds(x1: u32, y1: u32, x2: u32, y2: u32) -> TileBounds {
        TileBounds { x1, y1, x2, y2 }
    }

    #[test]
    fn test_1024_square_gives_four_tiles() {
        let splitter = TileSplitter::new(512, 64).unwrap();
        let plan = splitter.plan(1024, 1024).unwrap();

        assert_eq!(
            plan,
            vec![
                bounds(0, 0, 512, 512),
                bounds(448, 0, 960, 512),
                bounds(0, 448, 512, 960),
                bounds(448, 448, 960, 960),
            ]
        );
    }

    #[test]
    fn test_tiles_stay_inside_image_and_overlap_exactly() {
        let cases = [(512, 64), (300, 0), (256, 100), (97, 13)];
        let sizes = [(1024, 1024), (700, 3000), (513, 900), (2000, 520)];

        for &(tile_size, overlap) in &cases {
            let splitter = TileSplitter::new(tile_size, overlap).unwrap();
            for &(w, h) in &sizes {
                let Ok(plan) = splitter.plan(w, h) else { continue };

                for t in &plan {
                    assert!(t.x1 <= t.x2 && t.x2 <= w, "{:?} outside width {}", t, w);
                    assert!(t.y1 <= t.y2 && t.y2 <= h, "{:?} outside height {}", t, h);
                }

                for pair in plan.windows(2) {
                    let (a, b) = (pair[0], pair[1]);
                    if a.y1 == b.y1 {
                        assert_eq!(a.x2 - b.x1, overlap, "{:?} / {:?}", a, b);
                    }
                }
            }
        }
    }

    #[test]
    fn test_trailing_strip_is_dropped_by_default() {
        // (1100 - 64) / 448 = 2 columns, pixels 960..1100 are never tiled
        let splitter = TileSplitter::new(512, 64).unwrap();
        let plan = splitter.plan(1100, 512).unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.last().unwrap().x2, 960);
    }

    #[test]
    fn test_cover_trailing_edges_adds_clamped_tile() {
        let splitter = TileSplitter::new(512, 64).unwrap().with_trailing_edges(true);
        let plan = splitter.plan(1100, 512).unwrap();

        assert_eq!(plan.len(), 3);
        assert_eq!(*plan.last().unwrap(), bounds(588, 0, 1100, 512));
    }

    #[test]
    fn test_cover_trailing_edges_adds_clamped_row_and_column() {
        let splitter = TileSplitter::new(512, 64).unwrap().with_trailing_edges(true);
        let plan = splitter.plan(1100, 1100).unwrap();

        assert_eq!(plan.len(), 9);
        assert_eq!(plan[2], bounds(588, 0, 1100, 512));
        assert_eq!(
            plan[6..].to_vec(),
            vec![
                bounds(0, 588, 512, 1100),
                bounds(448, 588, 960, 1100),
                bounds(588, 588, 1100, 1100),
            ]
        );

        // bottom-right corner pixel is covered
        assert!(plan.iter().any(|t| t.x2 == 1100 && t.y2 == 1100));
    }

    #[test]
    fn test_cover_trailing_edges_noop_when_grid_is_exact() {
        // 64 + 2 * 448 = 960
        let splitter = TileSplitter::new(512, 64).unwrap().with_trailing_edges(true);
        assert_eq!(splitter.plan(960, 960).unwrap().len(), 4);
    }

    #[test]
    fn test_image_smaller_than_stride_is_rejected() {
        let splitter = TileSplitter::new(512, 64).unwrap();

        assert!(matches!(
            splitter.plan(400, 2000),
            Err(PipelineError::ImageTooSmall { width: 400, .. })
        ));
        assert!(matches!(
            splitter.plan(30, 30),
            Err(PipelineError::ImageTooSmall { .. })
        ));
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(TileSplitter::new(0, 0).is_err());
        assert!(TileSplitter::new(64, 64).is_err());
        assert!(TileSplitter::new(64, 100).is_err());
        assert!(TileSplitter::new(64, 0).is_ok());
    }

    #[test]
    fn test_split_crops_each_tile() {
        let mut img = RgbImage::new(200, 100);
        img.put_pixel(80, 0, Rgb([9, 9, 9]));
        let img = DynamicImage::ImageRgb8(img);

        let splitter = TileSplitter::new(100, 20).unwrap();
        let tiles = splitter.split(&img).unwrap();

        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[1].bounds, bounds(80, 0, 180, 100));
        assert_eq!(tiles[1].image.dimensions(), (100, 100));
        assert_eq!(tiles[1].image.to_rgb8().get_pixel(0, 0), &Rgb([9, 9, 9]));
        assert_eq!(tiles.iter().map(|t| t.index).collect::<Vec<_>>(), vec![0, 1]);
    }
}
