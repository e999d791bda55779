//! Sprite sheets and GID lookup.

use macroquad::texture::Image;
use std::fmt;
use std::sync::Arc;

/// An image sliced into a uniform grid of tiles.
#[derive(Clone)]
pub struct SpriteSheet {
    /// RGBA8 atlas.
    pub image: Arc<Image>,
    /// The same atlas mirrored left to right.
    pub mirrored: Arc<Image>,
    /// Cell width.
    pub tile_w: u32,
    /// Cell height.
    pub tile_h: u32,
    /// Cells per row.
    pub columns: u32,
    /// Rows that fit the image.
    pub rows: u32,
    /// Gap between cells.
    pub spacing: u32,
    /// Border around the grid.
    pub margin: u32,
}

impl fmt::Debug for SpriteSheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpriteSheet")
            .field("image", &(self.image.width, self.image.height))
            .field("tile_w", &self.tile_w)
            .field("tile_h", &self.tile_h)
            .field("columns", &self.columns)
            .field("rows", &self.rows)
            .field("spacing", &self.spacing)
            .field("margin", &self.margin)
            .finish()
    }
}

/// Pixel rectangle inside an atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    /// Left.
    pub x: u32,
    /// Top.
    pub y: u32,
    /// Width.
    pub w: u32,
    /// Height.
    pub h: u32,
}

impl SpriteSheet {
    /// Slice `image` into `tile_w`×`tile_h` cells. `columns == 0` derives the
    /// column count from the image width.
    pub fn new(image: Image, tile_w: u32, tile_h: u32, columns: u32, spacing: u32, margin: u32) -> Self {
        let fit = |extent: u32, tile: u32| {
            if tile == 0 {
                0
            } else {
                (extent.saturating_sub(2 * margin) + spacing) / (tile + spacing)
            }
        };
        let columns = if columns > 0 {
            columns
        } else {
            fit(image.width as u32, tile_w)
        };
        let rows = fit(image.height as u32, tile_h);
        let mirrored = mirror_horizontally(&image);

        SpriteSheet {
            image: Arc::new(image),
            mirrored: Arc::new(mirrored),
            tile_w,
            tile_h,
            columns,
            rows,
            spacing,
            margin,
        }
    }

    /// Number of cells in the grid.
    #[inline]
    pub fn tile_count(&self) -> u32 {
        self.columns * self.rows
    }

    /// Rectangle of cell `index` in row-major order. Returns `None` for a
    /// sheet with zero columns.
    pub fn cell_rect(&self, index: u32) -> Option<CellRect> {
        if self.columns == 0 {
            return None;
        }
        let col = index % self.columns;
        let row = index / self.columns;
        Some(CellRect {
            x: self.margin + col * (self.tile_w + self.spacing),
            y: self.margin + row * (self.tile_h + self.spacing),
            w: self.tile_w,
            h: self.tile_h,
        })
    }

    /// Same cell, addressed in the [`mirrored`](Self::mirrored) atlas.
    pub fn mirrored_cell_rect(&self, index: u32) -> Option<CellRect> {
        let r = self.cell_rect(index)?;
        let width = self.image.width as u32;
        Some(CellRect {
            x: width.saturating_sub(r.x + r.w),
            ..r
        })
    }
}

fn mirror_horizontally(src: &Image) -> Image {
    let w = src.width as usize;
    let mut out = src.clone();
    if w == 0 {
        return out;
    }
    for (src_row, dst_row) in src.bytes.chunks_exact(w * 4).zip(out.bytes.chunks_exact_mut(w * 4)) {
        for x in 0..w {
            let s = (w - 1 - x) * 4;
            dst_row[x * 4..x * 4 + 4].copy_from_slice(&src_row[s..s + 4]);
        }
    }
    out
}

/// A sprite sheet contributing the GID range starting at `first_gid`.
#[derive(Debug, Clone)]
pub struct TileSet {
    /// Name from the document.
    pub name: String,
    /// GID of local tile 0.
    pub first_gid: u32,
    /// Declared `tilecount`, or the grid size when absent.
    pub tile_count: u32,
    /// The atlas.
    pub sheet: SpriteSheet,
}

/// Where to copy a tile from.
#[derive(Debug, Clone, Copy)]
pub struct TileSource<'a> {
    /// Position of the owning set in [`TileSets`].
    pub tileset_index: usize,
    /// The owning set.
    pub tileset: &'a TileSet,
    /// Cell inside the owning set's atlas.
    pub rect: CellRect,
}

/// The ordered tile sets of one map.
#[derive(Debug, Clone, Default)]
pub struct TileSets {
    sets: Vec<TileSet>,
}

impl TileSets {
    /// Sorts by ascending `first_gid`.
    pub fn new(mut sets: Vec<TileSet>) -> Self {
        sets.sort_by_key(|t| t.first_gid);
        TileSets { sets }
    }

    /// Number of sets.
    #[inline]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// True for a map without tile sets.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Sets in ascending `first_gid` order.
    pub fn iter(&self) -> impl Iterator<Item = &TileSet> {
        self.sets.iter()
    }

    /// Set at `index`.
    pub fn get(&self, index: usize) -> Option<&TileSet> {
        self.sets.get(index)
    }

    /// Index of the set with the greatest `first_gid <= gid`. Scans from the
    /// back and stops at index 0, so a gid below every `first_gid` lands on the
    /// first set. `None` only when there are no sets.
    pub fn owning_index(&self, gid: u32) -> Option<usize> {
        if self.sets.is_empty() {
            return None;
        }
        let mut idx = self.sets.len() - 1;
        while idx > 0 && gid < self.sets[idx].first_gid {
            idx -= 1;
        }
        Some(idx)
    }

    /// The set with the greatest `first_gid <= gid`.
    pub fn owning(&self, gid: u32) -> Option<&TileSet> {
        self.owning_index(gid).map(|i| &self.sets[i])
    }

    /// Source rectangle for a cleaned gid. `None` when the gid falls outside
    /// the owning set's range (including the below-first fallback case).
    pub fn resolve(&self, gid: u32) -> Option<TileSource<'_>> {
        let tileset_index = self.owning_index(gid)?;
        let tileset = &self.sets[tileset_index];
        let local = gid.checked_sub(tileset.first_gid)?;
        if local >= tileset.tile_count {
            return None;
        }
        let rect = tileset.sheet.cell_rect(local)?;
        Some(TileSource {
            tileset_index,
            tileset,
            rect,
        })
    }
}
