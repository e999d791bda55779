//! GPU upload and drawing.

use crate::render::composite::LayerSurfaces;
use crate::session::Session;
use crate::tileset::{CellRect, SpriteSheet};
use macroquad::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

fn upload(image: &Image) -> Texture2D {
    let tex = Texture2D::from_image(image);
    tex.set_filter(FilterMode::Nearest);
    tex
}

/// Composited layers living on the GPU. Needs a running macroquad context.
pub struct GpuLayers {
    /// Drawn before sprites.
    pub background: Texture2D,
    /// Drawn after sprites.
    pub foreground: Texture2D,
}

impl GpuLayers {
    /// Upload both surfaces with nearest filtering.
    pub fn upload(surfaces: &LayerSurfaces<Image>) -> Self {
        GpuLayers {
            background: upload(&surfaces.background),
            foreground: upload(&surfaces.foreground),
        }
    }

    /// Draw the background with its top-left at `origin`.
    pub fn draw_background(&self, origin: Vec2) {
        draw_texture(&self.background, origin.x, origin.y, WHITE);
    }

    /// Draw the foreground with its top-left at `origin`.
    pub fn draw_foreground(&self, origin: Vec2) {
        draw_texture(&self.foreground, origin.x, origin.y, WHITE);
    }
}

/// A sprite sheet's atlas and its mirrored copy as textures.
pub struct SheetTextures {
    /// As loaded.
    pub normal: Texture2D,
    /// Mirrored left to right.
    pub mirrored: Texture2D,
}

impl SheetTextures {
    /// Upload both atlases.
    pub fn upload(sheet: &SpriteSheet) -> Self {
        SheetTextures {
            normal: upload(&sheet.image),
            mirrored: upload(&sheet.mirrored),
        }
    }

    /// Draw one cell. `src` must come from [`SpriteSheet::cell_rect`] or
    /// [`SpriteSheet::mirrored_cell_rect`] to match `mirrored`.
    pub fn draw_cell(&self, src: CellRect, x: f32, y: f32, mirrored: bool) {
        let tex = if mirrored { &self.mirrored } else { &self.normal };
        draw_texture_ex(
            tex,
            x,
            y,
            WHITE,
            DrawTextureParams {
                source: Some(Rect::new(src.x as f32, src.y as f32, src.w as f32, src.h as f32)),
                ..Default::default()
            },
        );
    }
}

/// Per-sheet values keyed by sheet identity. Holds a reference to every sheet
/// it has seen, so a key address is never reused while the entry lives.
pub struct SheetCache<T> {
    entries: HashMap<*const SpriteSheet, (Arc<SpriteSheet>, T)>,
}

impl<T> Default for SheetCache<T> {
    fn default() -> Self {
        SheetCache {
            entries: HashMap::new(),
        }
    }
}

impl<T> SheetCache<T> {
    /// Value for `sheet`, built by `make` on first use.
    pub fn get_or_insert_with(&mut self, sheet: &Arc<SpriteSheet>, make: impl FnOnce(&SpriteSheet) -> T) -> &T {
        let (_, value) = self
            .entries
            .entry(Arc::as_ptr(sheet))
            .or_insert_with(|| (Arc::clone(sheet), make(sheet)));
        value
    }

    /// Sheets seen so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True before the first insert.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// GPU side of a [`Session`]: layer textures plus one texture pair per sprite
/// sheet, uploaded lazily.
pub struct SessionRenderer {
    layers: GpuLayers,
    sheets: SheetCache<SheetTextures>,
}

impl SessionRenderer {
    /// Upload the session's layers. Needs a running macroquad context.
    pub fn new(session: &Session) -> Self {
        SessionRenderer {
            layers: GpuLayers::upload(&session.layers),
            sheets: SheetCache::default(),
        }
    }

    /// Background, sprites, foreground.
    pub fn draw(&mut self, session: &Session, origin: Vec2) {
        self.layers.draw_background(origin);
        for sprite in session.sprites() {
            let textures = self.sheets.get_or_insert_with(sprite.sheet, SheetTextures::upload);
            textures.draw_cell(
                sprite.cell.src,
                origin.x + sprite.x,
                origin.y + sprite.y,
                sprite.cell.mirrored,
            );
        }
        self.layers.draw_foreground(origin);
    }
}
