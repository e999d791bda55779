#![warn(missing_docs)]

//! Tiled TMX levels, layer compositing, sprite animation and input tracking
//! for Macroquad.

mod error;
pub mod anim;
pub mod assets;
pub mod gid;
pub mod input;
/// Level and animation file loaders.
pub mod loader {
    pub mod anim_loader;
    pub mod tmx_loader;
}
pub mod map;
pub mod render;
pub mod session;
pub mod tileset;

pub use anim::{Animation, AnimationFrame, AnimationState, Animator, CycleHook, SpriteCell};
pub use assets::{AssetSource, FsAssets, MemoryAssets};
pub use error::{ErrorKind, MapError, MapResult};
pub use gid::{pack_cell, split_cell, TileFlags, GID_MASK};
pub use input::{ButtonState, ButtonTracker, GamepadButton, Input, KeyboardState};
pub use loader::anim_loader::AnimationLibrary;
pub use loader::tmx_loader::{decode_cells, decode_map, decode_map_str};
pub use map::{Cell, Layer, MapObject, ObjectLayer, Properties, TileLayer, TmxMap};
pub use render::{LayerSurfaces, SessionRenderer, Surface};
pub use session::{Actor, ActorCtx, EntityId, Position, Session, SessionConfig};
pub use tileset::{CellRect, SpriteSheet, TileSet, TileSets, TileSource};
