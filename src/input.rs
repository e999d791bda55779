//! Button state with half-transition counting.
//!
//! Raw device edges come in between frames; the frame reads `pressed` /
//! `released` and then calls [`ButtonTracker::reset_per_frame_data`]. Counting
//! edges instead of keeping a per-frame flag means a press and release that
//! both happen between two frames still reads as a press.

use macroquad::input::KeyCode;
use std::collections::HashMap;
use std::hash::Hash;

/// Level and edge count of one button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonState {
    /// Current level.
    pub down: bool,
    /// Level changes since the last frame reset.
    pub half_transition_count: u32,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    state: ButtonState,
    last_event: f64,
}

impl Default for Slot {
    fn default() -> Self {
        Slot {
            state: ButtonState::default(),
            last_event: f64::NEG_INFINITY,
        }
    }
}

/// Tracks every button of one device, addressed by key code.
#[derive(Debug, Clone)]
pub struct ButtonTracker<K> {
    slots: HashMap<K, Slot>,
}

impl<K> Default for ButtonTracker<K> {
    fn default() -> Self {
        ButtonTracker {
            slots: HashMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash> ButtonTracker<K> {
    /// No buttons down.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one raw edge stamped with the device's monotonic `timestamp`.
    ///
    /// A down edge is only honoured if it is strictly newer than the last event
    /// seen for the key: a repeat "down" delivered after an "up" carrying the
    /// same timestamp must not leave the key stuck. Up edges always apply.
    /// Edges that match the current level don't count as transitions.
    pub fn edge(&mut self, key: K, pressed: bool, timestamp: f64) {
        let slot = self.slots.entry(key).or_default();
        if pressed {
            if timestamp > slot.last_event {
                if !slot.state.down {
                    slot.state.down = true;
                    slot.state.half_transition_count = slot.state.half_transition_count.saturating_add(1);
                }
                slot.last_event = timestamp;
            }
        } else {
            if slot.state.down {
                slot.state.down = false;
                slot.state.half_transition_count = slot.state.half_transition_count.saturating_add(1);
            }
            slot.last_event = slot.last_event.max(timestamp);
        }
    }

    /// State of `key`; untouched keys read as up with no edges.
    pub fn state(&self, key: K) -> ButtonState {
        self.slots.get(&key).map(|s| s.state).unwrap_or_default()
    }

    /// Held right now.
    #[inline]
    pub fn down(&self, key: K) -> bool {
        self.state(key).down
    }

    /// Went down since the last frame reset: down now after at least one
    /// edge, or up now after a full down-up round trip.
    pub fn pressed(&self, key: K) -> bool {
        let s = self.state(key);
        match s.down {
            true => s.half_transition_count > 0,
            false => s.half_transition_count > 1,
        }
    }

    /// Went up since the last frame reset; mirror image of [`pressed`](Self::pressed).
    pub fn released(&self, key: K) -> bool {
        let s = self.state(key);
        match s.down {
            false => s.half_transition_count > 0,
            true => s.half_transition_count > 1,
        }
    }

    /// Level changes since the last frame reset.
    #[inline]
    pub fn half_transitions(&self, key: K) -> u32 {
        self.state(key).half_transition_count
    }

    /// Clear the transition counters; levels stay. Once per frame, after the
    /// frame has read its input.
    pub fn reset_per_frame_data(&mut self) {
        for slot in self.slots.values_mut() {
            slot.state.half_transition_count = 0;
        }
    }

    /// Forget everything, levels included.
    pub fn reset(&mut self) {
        self.slots.clear();
    }
}

/// Buttons of a standard-layout gamepad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GamepadButton {
    /// Bottom face button (A / Cross).
    FaceDown,
    /// Right face button (B / Circle).
    FaceRight,
    /// Left face button (X / Square).
    FaceLeft,
    /// Top face button (Y / Triangle).
    FaceUp,
    /// Left shoulder.
    L1,
    /// Right shoulder.
    R1,
    /// Left trigger.
    L2,
    /// Right trigger.
    R2,
    /// Select / back.
    Meta,
    /// Start.
    Options,
    /// Left stick press.
    L3,
    /// Right stick press.
    R3,
    /// D-pad up.
    DpUp,
    /// D-pad down.
    DpDown,
    /// D-pad left.
    DpLeft,
    /// D-pad right.
    DpRight,
    /// Guide button.
    Home,
    /// Vendor extra (touchpad, share).
    Extra,
}

impl GamepadButton {
    /// Map a standard-mapping button index.
    pub fn from_index(index: usize) -> Option<Self> {
        use GamepadButton::*;
        const ALL: [GamepadButton; 18] = [
            FaceDown, FaceRight, FaceLeft, FaceUp, L1, R1, L2, R2, Meta, Options, L3, R3, DpUp, DpDown,
            DpLeft, DpRight, Home, Extra,
        ];
        ALL.get(index).copied()
    }
}

/// Keyboard buttons by macroquad key code.
pub type KeyboardState = ButtonTracker<KeyCode>;
/// Gamepad buttons, fed by the host.
pub type GamepadState = ButtonTracker<GamepadButton>;

/// Keyboard plus an optional gamepad, and whether the window has focus.
#[derive(Debug, Clone)]
pub struct Input {
    /// Keyboard state.
    pub keyboard: KeyboardState,
    /// First gamepad.
    pub gamepad: GamepadState,
    active: bool,
}

impl Default for Input {
    fn default() -> Self {
        Input {
            keyboard: KeyboardState::new(),
            gamepad: GamepadState::new(),
            active: true,
        }
    }
}

impl Input {
    /// Focused, nothing held.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the window has focus.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Focus change. Regaining focus drops all state: keys released while
    /// unfocused never reported an up edge. Returns true if the focus changed.
    pub fn set_focus(&mut self, active: bool) -> bool {
        if self.active == active {
            return false;
        }
        self.active = active;
        if active {
            self.reset();
        }
        true
    }

    /// Release everything on both devices.
    pub fn reset(&mut self) {
        self.keyboard.reset();
        self.gamepad.reset();
    }

    /// Clear this frame's edges on both devices.
    pub fn reset_per_frame_data(&mut self) {
        self.keyboard.reset_per_frame_data();
        self.gamepad.reset_per_frame_data();
    }

    /// Arrow key or d-pad held.
    pub fn left(&self) -> bool {
        self.keyboard.down(KeyCode::Left) || self.gamepad.down(GamepadButton::DpLeft)
    }

    /// See [`left`](Self::left).
    pub fn right(&self) -> bool {
        self.keyboard.down(KeyCode::Right) || self.gamepad.down(GamepadButton::DpRight)
    }

    /// See [`left`](Self::left).
    pub fn up(&self) -> bool {
        self.keyboard.down(KeyCode::Up) || self.gamepad.down(GamepadButton::DpUp)
    }

    /// See [`left`](Self::left).
    pub fn down(&self) -> bool {
        self.keyboard.down(KeyCode::Down) || self.gamepad.down(GamepadButton::DpDown)
    }
}

/// Feed this frame's macroquad key edges into `input`. Needs a running
/// macroquad context.
pub fn poll_macroquad(input: &mut Input, now: f64) {
    // macroquad delivers edges per frame, so every edge shares the frame time;
    // apply presses before releases so a tap inside one frame counts twice
    for key in macroquad::input::get_keys_pressed() {
        input.keyboard.edge(key, true, now);
    }
    for key in macroquad::input::get_keys_released() {
        input.keyboard.edge(key, false, now);
    }
}
