//! Flattening tile layers into background and foreground surfaces.

use crate::error::{MapError, MapResult};
use crate::map::{Layer, TileLayer, TmxMap};
use crate::render::surface::Surface;
use tracing::debug;

/// Static tile layers flattened into two surfaces, split at the first object
/// layer. Sprites are drawn between them.
pub struct LayerSurfaces<S> {
    /// Layers below the first object layer.
    pub background: S,
    /// Layers above it.
    pub foreground: S,
    /// Pixel width of both surfaces.
    pub width: u32,
    /// Pixel height of both surfaces.
    pub height: u32,
}

/// Pixel origin of grid index `index`, shifted by the layer offset.
fn cell_origin(index: u32, tile: u32, offset: i32) -> Option<i32> {
    i32::try_from(index.checked_mul(tile)?).ok()?.checked_add(offset)
}

fn draw_layer_into<S: Surface>(map: &TmxMap, layer: &TileLayer, surface: &mut S) -> MapResult<usize> {
    let mut drawn = 0;
    for cell in layer.cells() {
        let src = map
            .tilesets
            .resolve(cell.gid)
            .ok_or_else(|| MapError::InvalidTileGid {
                layer: layer.name.clone(),
                gid: cell.gid,
            })?;
        let (Some(dx), Some(dy)) = (
            cell_origin(cell.col, map.tile_w, layer.offset_x),
            cell_origin(cell.row, map.tile_h, layer.offset_y),
        ) else {
            return Err(MapError::cells(
                &layer.name,
                format!("cell ({}, {}) lies outside the addressable surface", cell.col, cell.row),
            ));
        };
        surface.blit(&src.tileset.sheet.image, src.rect, dx, dy, cell.flags);
        drawn += 1;
    }
    Ok(drawn)
}

impl<S: Surface> LayerSurfaces<S> {
    /// Pre-render every visible tile layer of `map`.
    ///
    /// Layers before the first object layer go to the background, everything
    /// after it to the foreground; the switch never reverts.
    pub fn build(map: &TmxMap) -> MapResult<Self> {
        let (width, height) = map.pixel_size().ok_or(MapError::SurfaceTooLarge {
            width: u64::from(map.width) * u64::from(map.tile_w),
            height: u64::from(map.height) * u64::from(map.tile_h),
            max: u32::MAX.into(),
        })?;
        let mut background = S::create(width, height)?;
        let mut foreground = S::create(width, height)?;

        let mut is_bg = true;
        for layer in &map.layers {
            match layer {
                Layer::Objects(o) => {
                    if is_bg {
                        debug!(layer = %o.name, "object layer reached, painting foreground from here");
                    }
                    is_bg = false;
                }
                Layer::Tiles(t) if !t.visible => {
                    debug!(layer = %t.name, "skipping hidden layer");
                }
                Layer::Tiles(t) => {
                    let target = if is_bg { &mut background } else { &mut foreground };
                    let drawn = draw_layer_into(map, t, target)?;
                    debug!(layer = %t.name, drawn, background = is_bg, "layer composited");
                }
            }
        }

        Ok(LayerSurfaces {
            background,
            foreground,
            width,
            height,
        })
    }
}
