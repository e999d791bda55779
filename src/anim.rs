//! Frame-based sprite animation.
//!
//! An [`Animation`] is shared, read-only data. Each entity playing one owns an
//! [`AnimationState`] that is advanced with wall-clock milliseconds.

use crate::error::{MapError, MapResult};
use crate::tileset::{CellRect, SpriteSheet};
use std::fmt;
use std::sync::Arc;

/// One cell of an animation and how long it shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationFrame {
    /// Cell in the sheet, row-major.
    pub tile_index: u32,
    /// Milliseconds.
    pub duration: f64,
}

/// A sequence of atlas cells with per-frame durations. Never empty.
#[derive(Debug, Clone)]
pub struct Animation {
    /// Library key.
    pub name: String,
    /// Atlas the frames index into.
    pub sheet: Arc<SpriteSheet>,
    /// Draw offset from the entity position.
    pub offset_x: f32,
    /// See `offset_x`.
    pub offset_y: f32,
    frames: Vec<AnimationFrame>,
}

impl Animation {
    /// Fails on an empty frame list, a non-positive duration, or a tile index
    /// outside the sheet.
    pub fn new(
        name: impl Into<String>,
        sheet: Arc<SpriteSheet>,
        offset: (f32, f32),
        frames: Vec<AnimationFrame>,
    ) -> MapResult<Self> {
        let name = name.into();
        if frames.is_empty() {
            return Err(MapError::animation(&name, "no frames"));
        }
        for (i, f) in frames.iter().enumerate() {
            if !(f.duration.is_finite() && f.duration > 0.0) {
                return Err(MapError::animation(&name, format!("frame {i} has duration {}", f.duration)));
            }
            if f.tile_index >= sheet.tile_count() {
                return Err(MapError::animation(
                    &name,
                    format!("frame {i} uses tile {} of {}", f.tile_index, sheet.tile_count()),
                ));
            }
        }
        Ok(Animation {
            name,
            sheet,
            offset_x: offset.0,
            offset_y: offset.1,
            frames,
        })
    }

    /// Frames in playback order.
    pub fn frames(&self) -> &[AnimationFrame] {
        &self.frames
    }

    /// Number of frames, at least one.
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Sum of all frame durations.
    pub fn cycle_duration(&self) -> f64 {
        self.frames.iter().map(|f| f.duration).sum()
    }
}

/// Called each time playback wraps to frame 0. Returning an animation
/// switches to it, starting at the instant of the wrap.
pub type CycleHook = Box<dyn FnMut(&Animation) -> Option<Arc<Animation>>>;

/// What to draw for an entity this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteCell {
    /// Cell rectangle, in the mirrored atlas when `mirrored` is set.
    pub src: CellRect,
    /// Added to the entity position.
    pub offset_x: f32,
    /// See `offset_x`.
    pub offset_y: f32,
    /// Draw from the mirrored atlas.
    pub mirrored: bool,
}

/// Per-entity playback position.
pub struct AnimationState {
    animation: Arc<Animation>,
    frame_start: f64,
    frame_index: usize,
    on_cycle: Option<CycleHook>,
}

impl fmt::Debug for AnimationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationState")
            .field("animation", &self.animation.name)
            .field("frame_start", &self.frame_start)
            .field("frame_index", &self.frame_index)
            .field("on_cycle", &self.on_cycle.is_some())
            .finish()
    }
}

impl AnimationState {
    /// Start `animation` at frame 0 at time `now`.
    pub fn new(animation: Arc<Animation>, now: f64) -> Self {
        AnimationState {
            animation,
            frame_start: now,
            frame_index: 0,
            on_cycle: None,
        }
    }

    /// Install a [`CycleHook`].
    pub fn with_cycle_hook(mut self, hook: impl FnMut(&Animation) -> Option<Arc<Animation>> + 'static) -> Self {
        self.on_cycle = Some(Box::new(hook));
        self
    }

    /// Replace or remove the cycle hook.
    pub fn set_cycle_hook(&mut self, hook: Option<CycleHook>) {
        self.on_cycle = hook;
    }

    /// The animation currently playing.
    pub fn animation(&self) -> &Arc<Animation> {
        &self.animation
    }

    /// Index of the frame on screen.
    #[inline]
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// When the current frame began, in milliseconds.
    #[inline]
    pub fn frame_start(&self) -> f64 {
        self.frame_start
    }

    /// The frame on screen.
    pub fn current_frame(&self) -> AnimationFrame {
        self.animation.frames[self.frame_index]
    }

    /// Restart playback with `animation`, even if it is the one already playing.
    pub fn switch(&mut self, animation: Arc<Animation>, now: f64) {
        self.animation = animation;
        self.frame_index = 0;
        self.frame_start = now;
    }

    /// Step through every frame whose duration has fully elapsed by `now`.
    /// `frame_start` moves by whole frame durations so no time is lost.
    /// Returns the number of completed cycles.
    /// A non-finite `now` leaves the state untouched.
    pub fn advance(&mut self, now: f64) -> u32 {
        if !now.is_finite() || !self.frame_start.is_finite() {
            return 0;
        }
        let mut cycles = 0;
        loop {
            let duration = self.animation.frames[self.frame_index].duration;
            if now - self.frame_start <= duration {
                break;
            }
            let next_start = self.frame_start + duration;
            // duration below the clock's precision at this magnitude
            if next_start == self.frame_start {
                break;
            }
            self.frame_start = next_start;
            self.frame_index = (self.frame_index + 1) % self.animation.frame_count();

            if self.frame_index == 0 {
                cycles += 1;
                if let Some(hook) = self.on_cycle.as_mut() {
                    if let Some(next) = hook(&self.animation) {
                        self.animation = next;
                    }
                }
            }
        }
        cycles
    }

    /// Move the current frame's start time, e.g. to skip a paused interval.
    pub fn shift(&mut self, delta: f64) {
        self.frame_start += delta;
    }

    /// Atlas cell for the current frame.
    pub fn sprite(&self, mirrored: bool) -> Option<SpriteCell> {
        let tile = self.current_frame().tile_index;
        let sheet = &self.animation.sheet;
        let src = if mirrored {
            sheet.mirrored_cell_rect(tile)?
        } else {
            sheet.cell_rect(tile)?
        };
        Some(SpriteCell {
            src,
            offset_x: self.animation.offset_x,
            offset_y: self.animation.offset_y,
            mirrored,
        })
    }
}

/// Drives every [`AnimationState`] of a session and handles pausing.
#[derive(Debug, Default)]
pub struct Animator {
    suspended_at: Option<f64>,
}

impl Animator {
    /// A running animator.
    pub fn new() -> Self {
        Self::default()
    }

    /// True between `suspend` and `resume`.
    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.suspended_at.is_some()
    }

    /// Advance all states unless suspended.
    pub fn advance_all<'a>(&self, states: impl IntoIterator<Item = &'a mut AnimationState>, now: f64) {
        if self.is_suspended() {
            return;
        }
        for state in states {
            state.advance(now);
        }
    }

    /// Stop advancing. A second call while suspended keeps the first timestamp.
    pub fn suspend(&mut self, now: f64) {
        if self.suspended_at.is_none() {
            self.suspended_at = Some(now);
        }
    }

    /// Resume, pushing every state's `frame_start` forward by the part of the
    /// suspension it lived through. A state started or switched while
    /// suspended resumes from `now`.
    pub fn resume<'a>(&mut self, states: impl IntoIterator<Item = &'a mut AnimationState>, now: f64) {
        let Some(since) = self.suspended_at.take() else {
            return;
        };
        for state in states {
            let paused_from = since.max(state.frame_start);
            state.shift((now - paused_from).max(0.0));
        }
        tracing::debug!(paused_ms = (now - since).max(0.0), "animations resumed");
    }
}
