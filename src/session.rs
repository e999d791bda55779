//! Per-level runtime context: the decoded map, its pre-rendered layers, input,
//! and entity capability tables.

use crate::anim::{AnimationState, Animator, SpriteCell};
use crate::assets::{resolve_relative, AssetSource};
use crate::error::{MapError, MapResult};
use crate::input::Input;
use crate::loader::anim_loader::AnimationLibrary;
use crate::loader::tmx_loader::decode_map;
use crate::map::TmxMap;
use crate::render::LayerSurfaces;
use crate::tileset::SpriteSheet;
use anyhow::Context;
use macroquad::texture::Image;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

fn default_clear() -> [u8; 3] {
    [0, 0, 0]
}

/// Settings file, JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Level document (TMX).
    pub map: PathBuf,
    /// Animation library (JSON), optional.
    #[serde(default)]
    pub animations: Option<PathBuf>,
    /// Background RGB behind the map.
    #[serde(default = "default_clear")]
    pub clear_color: [u8; 3],
}

impl SessionConfig {
    /// Read a config file; contained paths become relative to it.
    pub fn load(path: &Path, assets: &dyn AssetSource) -> MapResult<Self> {
        let text = assets.read_text(path)?;
        let mut cfg: SessionConfig = serde_json::from_str(&text).map_err(|source| MapError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.map = resolve_relative(path, &cfg.map.to_string_lossy());
        cfg.animations = cfg
            .animations
            .map(|a| resolve_relative(path, &a.to_string_lossy()));
        Ok(cfg)
    }
}

/// Handle for an entity; keys every capability table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

/// World position in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    /// Horizontal.
    pub x: f32,
    /// Vertical.
    pub y: f32,
    /// Draw the sprite mirrored left to right.
    pub mirrored: bool,
}

/// What an actor sees of the session during its update.
pub struct ActorCtx<'a> {
    /// The entity being updated.
    pub id: EntityId,
    /// Frame time in milliseconds.
    pub now: f64,
    /// Input as of this frame.
    pub input: &'a Input,
    /// Animations to switch to.
    pub library: &'a AnimationLibrary,
    /// The entity's position, if it has one.
    pub position: Option<&'a mut Position>,
    /// The entity's playback state, if it has one.
    pub animation: Option<&'a mut AnimationState>,
}

/// Entities with per-frame behaviour.
pub trait Actor {
    /// Called once per frame, in id order.
    fn update(&mut self, ctx: ActorCtx<'_>);
}

/// A sprite ready to draw.
#[derive(Debug, Clone)]
pub struct SpriteDraw<'a> {
    /// Owner.
    pub id: EntityId,
    /// Left edge, offset applied.
    pub x: f32,
    /// Top edge, offset applied.
    pub y: f32,
    /// Atlas cell.
    pub cell: SpriteCell,
    /// Atlas the cell belongs to.
    pub sheet: &'a Arc<SpriteSheet>,
}

/// Everything one running level needs.
pub struct Session {
    /// The level.
    pub map: TmxMap,
    /// Pre-rendered static layers.
    pub layers: LayerSurfaces<Image>,
    /// Loaded animations.
    pub library: AnimationLibrary,
    /// Fed by the host between frames.
    pub input: Input,
    /// From the config; black for [`Session::new`].
    pub clear_color: [u8; 3],
    /// Position table.
    pub positions: BTreeMap<EntityId, Position>,
    /// Animation table.
    pub animations: BTreeMap<EntityId, AnimationState>,
    actors: BTreeMap<EntityId, Box<dyn Actor>>,
    animator: Animator,
    next_id: u32,
}

impl Session {
    /// Pre-render `map` and start with no entities.
    pub fn new(map: TmxMap, library: AnimationLibrary) -> MapResult<Self> {
        let layers = LayerSurfaces::build(&map)?;
        Ok(Session {
            map,
            layers,
            library,
            input: Input::new(),
            clear_color: default_clear(),
            positions: BTreeMap::new(),
            animations: BTreeMap::new(),
            actors: BTreeMap::new(),
            animator: Animator::new(),
            next_id: 0,
        })
    }

    /// Load config, level and animations. Any failure leaves no session.
    #[tracing::instrument(skip(assets))]
    pub fn load(config_path: &Path, assets: &dyn AssetSource) -> anyhow::Result<Self> {
        let cfg = SessionConfig::load(config_path, assets)
            .with_context(|| format!("Loading config {}", config_path.display()))?;
        let map = decode_map(&cfg.map, assets).with_context(|| format!("Loading map {}", cfg.map.display()))?;
        let library = match &cfg.animations {
            Some(p) => AnimationLibrary::load(p, assets)
                .with_context(|| format!("Loading animations {}", p.display()))?,
            None => AnimationLibrary::default(),
        };
        let mut session = Session::new(map, library).context("Compositing map layers")?;
        session.clear_color = cfg.clear_color;
        info!(
            width = session.layers.width,
            height = session.layers.height,
            "session ready"
        );
        Ok(session)
    }

    /// Allocate an id. It has no capabilities until some are set.
    pub fn spawn(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Give `id` a position, replacing any previous one.
    pub fn set_position(&mut self, id: EntityId, pos: Position) {
        self.positions.insert(id, pos);
    }

    /// Give `id` an animation state.
    pub fn set_animation(&mut self, id: EntityId, state: AnimationState) {
        self.animations.insert(id, state);
    }

    /// Give `id` per-frame behaviour.
    pub fn set_actor(&mut self, id: EntityId, actor: impl Actor + 'static) {
        self.actors.insert(id, Box::new(actor));
    }

    /// Drop every capability of `id`.
    pub fn despawn(&mut self, id: EntityId) {
        self.positions.remove(&id);
        self.animations.remove(&id);
        self.actors.remove(&id);
    }

    /// False while the window is unfocused.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.input.is_active() && !self.animator.is_suspended()
    }

    /// One simulation step: actors, then animations, then the per-frame input
    /// reset. Does nothing while unfocused.
    pub fn frame(&mut self, now: f64) {
        if !self.is_running() {
            return;
        }
        let Session {
            actors,
            positions,
            animations,
            input,
            library,
            ..
        } = self;
        for (id, actor) in actors.iter_mut() {
            actor.update(ActorCtx {
                id: *id,
                now,
                input,
                library,
                position: positions.get_mut(id),
                animation: animations.get_mut(id),
            });
        }

        self.animator.advance_all(self.animations.values_mut(), now);
        self.input.reset_per_frame_data();
    }

    /// Window focus change: suspends or resumes animation playback and input.
    pub fn set_focus(&mut self, active: bool, now: f64) {
        if !self.input.set_focus(active) {
            return;
        }
        if active {
            self.animator.resume(self.animations.values_mut(), now);
        } else {
            self.animator.suspend(now);
        }
        info!(active, "focus changed");
    }

    /// Entities that have both a position and an animation, in id order.
    pub fn sprites(&self) -> impl Iterator<Item = SpriteDraw<'_>> {
        self.animations.iter().filter_map(move |(id, state)| {
            let pos = self.positions.get(id)?;
            let cell = state.sprite(pos.mirrored)?;
            Some(SpriteDraw {
                id: *id,
                x: pos.x + cell.offset_x,
                y: pos.y + cell.offset_y,
                cell,
                sheet: &state.animation().sheet,
            })
        })
    }
}
