//! Decoded level model: layers in paint order plus the tile sets they index.

use crate::gid::TileFlags;
use crate::tileset::TileSets;
use std::collections::HashMap;

/// String-keyed properties as declared in `<properties>`.
pub type Properties = HashMap<String, String>;

/// Decoded level.
#[derive(Debug, Clone)]
pub struct TmxMap {
    /// Width in tiles.
    pub width: u32,
    /// Height in tiles.
    pub height: u32,
    /// Grid cell width in pixels.
    pub tile_w: u32,
    /// Grid cell height in pixels.
    pub tile_h: u32,
    /// Map-level custom properties.
    pub properties: Properties,
    /// Paint order: document order.
    pub layers: Vec<Layer>,
    /// Tile sets, sorted by first GID.
    pub tilesets: TileSets,
}

impl TmxMap {
    /// Size of the composited surfaces in pixels, `None` when it overflows `u32`.
    pub fn pixel_size(&self) -> Option<(u32, u32)> {
        Some((
            self.width.checked_mul(self.tile_w)?,
            self.height.checked_mul(self.tile_h)?,
        ))
    }

    /// Tile layers in paint order.
    pub fn tile_layers(&self) -> impl Iterator<Item = &TileLayer> {
        self.layers.iter().filter_map(|l| match l {
            Layer::Tiles(t) => Some(t),
            Layer::Objects(_) => None,
        })
    }

    /// Object layers in paint order.
    pub fn object_layers(&self) -> impl Iterator<Item = &ObjectLayer> {
        self.layers.iter().filter_map(|l| match l {
            Layer::Objects(o) => Some(o),
            Layer::Tiles(_) => None,
        })
    }

    /// First layer called `name`.
    pub fn layer_by_name(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name() == name)
    }
}

/// A layer of either kind.
#[derive(Debug, Clone)]
pub enum Layer {
    /// `<layer>`
    Tiles(TileLayer),
    /// `<objectgroup>`
    Objects(ObjectLayer),
}

impl Layer {
    /// Document id, `0` when absent.
    pub fn id(&self) -> u32 {
        match self {
            Layer::Tiles(t) => t.id,
            Layer::Objects(o) => o.id,
        }
    }

    /// Layer name.
    pub fn name(&self) -> &str {
        match self {
            Layer::Tiles(t) => &t.name,
            Layer::Objects(o) => &o.name,
        }
    }

    /// Custom properties.
    pub fn properties(&self) -> &Properties {
        match self {
            Layer::Tiles(t) => &t.properties,
            Layer::Objects(o) => &o.properties,
        }
    }
}

/// Grid of cells, row-major.
#[derive(Debug, Clone)]
pub struct TileLayer {
    /// Document id.
    pub id: u32,
    /// Layer name.
    pub name: String,
    /// Width in cells.
    pub width: u32,
    /// Height in cells.
    pub height: u32,
    /// Hidden layers are not composited.
    pub visible: bool,
    /// Pixel offset, rounded.
    pub offset_x: i32,
    /// Pixel offset, rounded.
    pub offset_y: i32,
    /// Custom properties.
    pub properties: Properties,
    /// Cleaned GIDs, `0` = empty.
    pub tile_ids: Vec<u32>,
    /// Flags for the same cells.
    pub tile_rotations: Vec<TileFlags>,
}

/// One nonzero cell of a [`TileLayer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// Column.
    pub col: u32,
    /// Row.
    pub row: u32,
    /// Cleaned GID, never `0`.
    pub gid: u32,
    /// Flip flags.
    pub flags: TileFlags,
}

impl TileLayer {
    /// GID at `(col, row)`, `None` when out of bounds.
    pub fn tile_at(&self, col: u32, row: u32) -> Option<u32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.tile_ids.get((row * self.width + col) as usize).copied()
    }

    /// Nonzero cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        let width = self.width.max(1);
        self.tile_ids
            .iter()
            .zip(&self.tile_rotations)
            .enumerate()
            .filter(|(_, (gid, _))| **gid != 0)
            .map(move |(i, (&gid, &flags))| Cell {
                col: i as u32 % width,
                row: i as u32 / width,
                gid,
                flags,
            })
    }
}

/// Objects placed freely on the map. Splits background from foreground.
#[derive(Debug, Clone)]
pub struct ObjectLayer {
    /// Document id.
    pub id: u32,
    /// Layer name.
    pub name: String,
    /// Visibility flag from the document.
    pub visible: bool,
    /// Custom properties.
    pub properties: Properties,
    /// Objects in document order.
    pub objects: Vec<MapObject>,
}

/// A placed object. Only the placement is decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct MapObject {
    /// Document id.
    pub id: u32,
    /// Object name.
    pub name: String,
    /// `class`, or the older `type`.
    pub class_name: String,
    /// Left edge in pixels.
    pub x: f32,
    /// Top edge in pixels.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
    /// Tile objects carry a raw GID.
    pub gid: Option<u32>,
    /// Custom properties.
    pub properties: Properties,
}
