// src/loader/anim_loader.rs
//! JSON animation libraries.

use crate::anim::{Animation, AnimationFrame};
use crate::assets::{resolve_relative, AssetSource};
use crate::error::{MapError, MapResult};
use crate::tileset::SpriteSheet;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Deserialize)]
struct JsonSheet {
    image: String,
    tile_width: u32,
    tile_height: u32,
    #[serde(default)]
    columns: u32,
    #[serde(default)]
    spacing: u32,
    #[serde(default)]
    margin: u32,
}

#[derive(Deserialize)]
struct JsonFrame {
    tile: u32,
    duration: f64,
}

#[derive(Deserialize)]
struct JsonAnimation {
    sheet: String,
    #[serde(default)]
    offset: [f32; 2],
    frames: Vec<JsonFrame>,
}

#[derive(Deserialize)]
struct JsonLibrary {
    #[serde(default)]
    sheets: HashMap<String, JsonSheet>,
    #[serde(default)]
    animations: HashMap<String, JsonAnimation>,
}

/// Named sprite sheets and the animations cut from them.
#[derive(Debug, Default, Clone)]
pub struct AnimationLibrary {
    sheets: HashMap<String, Arc<SpriteSheet>>,
    animations: HashMap<String, Arc<Animation>>,
}

impl AnimationLibrary {
    /// Parse a library file. Sheet images resolve relative to `path`.
    #[tracing::instrument(skip(assets))]
    pub fn load(path: &Path, assets: &dyn AssetSource) -> MapResult<Self> {
        let text = assets.read_text(path)?;
        Self::from_json(&text, path, assets)
    }

    /// Parse library text already in memory. `path` anchors image paths.
    pub fn from_json(text: &str, path: &Path, assets: &dyn AssetSource) -> MapResult<Self> {
        let j: JsonLibrary = serde_json::from_str(text).map_err(|source| MapError::Config {
            path: path.to_path_buf(),
            source,
        })?;

        let mut sheets = HashMap::with_capacity(j.sheets.len());
        for (name, s) in j.sheets {
            let image = assets.load_image(&resolve_relative(path, &s.image))?;
            let sheet = SpriteSheet::new(image, s.tile_width, s.tile_height, s.columns, s.spacing, s.margin);
            sheets.insert(name, Arc::new(sheet));
        }

        let mut animations = HashMap::with_capacity(j.animations.len());
        for (name, a) in j.animations {
            let sheet = sheets
                .get(&a.sheet)
                .cloned()
                .ok_or_else(|| MapError::animation(&name, format!("unknown sheet '{}'", a.sheet)))?;
            let frames = a
                .frames
                .into_iter()
                .map(|f| AnimationFrame {
                    tile_index: f.tile,
                    duration: f.duration,
                })
                .collect();
            let anim = Animation::new(name.clone(), sheet, (a.offset[0], a.offset[1]), frames)?;
            animations.insert(name, Arc::new(anim));
        }

        info!(
            sheets = sheets.len(),
            animations = animations.len(),
            "animation library loaded"
        );
        Ok(AnimationLibrary { sheets, animations })
    }

    /// Animation called `name`.
    pub fn get(&self, name: &str) -> Option<Arc<Animation>> {
        self.animations.get(name).cloned()
    }

    /// Sheet called `name`.
    pub fn sheet(&self, name: &str) -> Option<&Arc<SpriteSheet>> {
        self.sheets.get(name)
    }

    /// All sheets, unordered.
    pub fn sheets(&self) -> impl Iterator<Item = (&str, &Arc<SpriteSheet>)> {
        self.sheets.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of animations.
    pub fn len(&self) -> usize {
        self.animations.len()
    }

    /// True when no animations are defined.
    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }
}
