//! Packed cell values: a 29-bit global tile id plus four flag bits on top.

/// Keep lower 29 bits; the top of the word carries the flip/rotation flags.
pub const GID_MASK: u32 = 0x1FFF_FFFF;
/// Position of the lowest flag bit.
pub const FLAG_SHIFT: u32 = 28;

/// Per-cell rotation/flip flags, as stored in bits 28..=31 of a raw cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TileFlags(pub u8);

impl TileFlags {
    /// No transformation.
    pub const NONE: TileFlags = TileFlags(0);
    /// Swap x and y (transpose).
    pub const DIAGONAL: TileFlags = TileFlags(1);
    /// Mirror top to bottom.
    pub const VERTICAL: TileFlags = TileFlags(2);
    /// Mirror left to right.
    pub const HORIZONTAL: TileFlags = TileFlags(4);

    /// Raw 4-bit value.
    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }
    /// True if every bit of `other` is set.
    #[inline]
    pub fn contains(self, other: TileFlags) -> bool {
        self.0 & other.0 == other.0
    }
    /// Anti-diagonal flip (transpose).
    #[inline]
    pub fn diagonal(self) -> bool {
        self.contains(Self::DIAGONAL)
    }
    /// Flipped top to bottom.
    #[inline]
    pub fn vertical(self) -> bool {
        self.contains(Self::VERTICAL)
    }
    /// Flipped left to right.
    #[inline]
    pub fn horizontal(self) -> bool {
        self.contains(Self::HORIZONTAL)
    }
}

impl std::ops::BitOr for TileFlags {
    type Output = TileFlags;

    fn bitor(self, rhs: TileFlags) -> TileFlags {
        TileFlags(self.0 | rhs.0)
    }
}

/// Split a raw stored cell into `(gid, flags)`.
#[inline]
pub fn split_cell(raw: u32) -> (u32, TileFlags) {
    (raw & GID_MASK, TileFlags((raw >> FLAG_SHIFT) as u8))
}

/// Build a raw cell as `(flags << 28) | gid`.
///
/// Bit 28 is both the lowest flag bit and the top bit of the gid mask, so
/// [`split_cell`] only recovers a 28-bit gid exactly while the diagonal flag is clear.
#[inline]
pub fn pack_cell(gid: u32, flags: TileFlags) -> u32 {
    ((flags.0 as u32 & 0xF) << FLAG_SHIFT) | (gid & GID_MASK)
}
