//! Offscreen targets for compositing.

use crate::error::{MapError, MapResult};
use crate::gid::TileFlags;
use crate::tileset::CellRect;
use macroquad::color::BLANK;
use macroquad::texture::Image;

/// Destination for pre-rendered tiles.
pub trait Surface {
    /// Offscreen surface of `width`×`height` pixels, fully transparent.
    /// Fails when the backing store cannot hold that size.
    fn create(width: u32, height: u32) -> MapResult<Self>
    where
        Self: Sized;

    /// Copy `src` out of `atlas` with its top-left at `(dx, dy)`, applying the
    /// cell's flip flags.
    fn blit(&mut self, atlas: &Image, src: CellRect, dx: i32, dy: i32, flags: TileFlags);
}

/// Destination extent of a cell once `flags` are applied.
#[inline]
pub fn blit_extent(src: CellRect, flags: TileFlags) -> (u32, u32) {
    if flags.diagonal() {
        (src.h, src.w)
    } else {
        (src.w, src.h)
    }
}

/// Source pixel (relative to the cell) feeding destination pixel `(x, y)`.
///
/// Drawing applies the diagonal flip first, then horizontal, then vertical, so
/// the lookup undoes them in reverse.
#[inline]
pub fn source_texel(x: u32, y: u32, src: CellRect, flags: TileFlags) -> (u32, u32) {
    let (dw, dh) = blit_extent(src, flags);
    let y = if flags.vertical() { dh - 1 - y } else { y };
    let x = if flags.horizontal() { dw - 1 - x } else { x };
    if flags.diagonal() {
        (y, x)
    } else {
        (x, y)
    }
}

fn blend(dst: &mut [u8], src: &[u8]) {
    let a = src[3] as u32;
    match a {
        0 => {}
        255 => dst.copy_from_slice(src),
        _ => {
            let inv = 255 - a;
            for c in 0..3 {
                dst[c] = ((src[c] as u32 * a + dst[c] as u32 * inv) / 255) as u8;
            }
            dst[3] = (a + dst[3] as u32 * inv / 255) as u8;
        }
    }
}

impl Surface for Image {
    fn create(width: u32, height: u32) -> MapResult<Self> {
        match (u16::try_from(width), u16::try_from(height)) {
            (Ok(w), Ok(h)) => Ok(Image::gen_image_color(w, h, BLANK)),
            _ => Err(MapError::SurfaceTooLarge {
                width: width.into(),
                height: height.into(),
                max: u16::MAX.into(),
            }),
        }
    }

    fn blit(&mut self, atlas: &Image, src: CellRect, dx: i32, dy: i32, flags: TileFlags) {
        let (dw, dh) = blit_extent(src, flags);
        let (surf_w, surf_h) = (self.width as i64, self.height as i64);
        let (atlas_w, atlas_h) = (atlas.width as u32, atlas.height as u32);

        for y in 0..dh {
            let ty = dy as i64 + y as i64;
            if ty < 0 || ty >= surf_h {
                continue;
            }
            for x in 0..dw {
                let tx = dx as i64 + x as i64;
                if tx < 0 || tx >= surf_w {
                    continue;
                }
                let (sx, sy) = source_texel(x, y, src, flags);
                let (sx, sy) = (src.x + sx, src.y + sy);
                if sx >= atlas_w || sy >= atlas_h {
                    continue;
                }
                let s = (sy as usize * atlas_w as usize + sx as usize) * 4;
                let d = (ty as usize * surf_w as usize + tx as usize) * 4;
                blend(&mut self.bytes[d..d + 4], &atlas.bytes[s..s + 4]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use macroquad::color::Color;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const GREEN: [u8; 4] = [0, 255, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];
    const WHITE: [u8; 4] = [255, 255, 255, 255];

    /// 2x2 atlas: red green / blue white
    fn atlas() -> Image {
        let mut img = Image::gen_image_color(2, 2, BLANK);
        img.bytes = [RED, GREEN, BLUE, WHITE].concat();
        img
    }

    fn px(img: &Image, x: usize, y: usize) -> [u8; 4] {
        let i = (y * img.width as usize + x) * 4;
        img.bytes[i..i + 4].try_into().unwrap()
    }

    fn blit_with(flags: TileFlags) -> Image {
        let mut surf = <Image as Surface>::create(2, 2).unwrap();
        surf.blit(&atlas(), CellRect { x: 0, y: 0, w: 2, h: 2 }, 0, 0, flags);
        surf
    }

    #[test]
    fn new_surface_is_transparent() {
        let s = <Image as Surface>::create(3, 2).unwrap();
        assert_eq!((s.width, s.height), (3, 2));
        assert!(s.bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn image_surfaces_refuse_sizes_they_cannot_hold() {
        let err = <Image as Surface>::create(70_000, 1).unwrap_err();
        assert!(matches!(
            err,
            MapError::SurfaceTooLarge { width: 70_000, height: 1, max: 65_535 }
        ));
        assert!(<Image as Surface>::create(1, 65_536).is_err());
        let edge = <Image as Surface>::create(65_535, 1).unwrap();
        assert_eq!(edge.width, 65_535);
    }

    #[test]
    fn plain_copy() {
        let s = blit_with(TileFlags::NONE);
        assert_eq!(px(&s, 0, 0), RED);
        assert_eq!(px(&s, 1, 1), WHITE);
    }

    #[test]
    fn horizontal_flip_mirrors_columns() {
        let s = blit_with(TileFlags::HORIZONTAL);
        assert_eq!(px(&s, 0, 0), GREEN);
        assert_eq!(px(&s, 1, 0), RED);
    }

    #[test]
    fn vertical_flip_mirrors_rows() {
        let s = blit_with(TileFlags::VERTICAL);
        assert_eq!(px(&s, 0, 0), BLUE);
        assert_eq!(px(&s, 0, 1), RED);
    }

    #[test]
    fn diagonal_flip_transposes() {
        let s = blit_with(TileFlags::DIAGONAL);
        assert_eq!(px(&s, 1, 0), BLUE);
        assert_eq!(px(&s, 0, 1), GREEN);
    }

    #[test]
    fn diagonal_then_horizontal_rotates_clockwise() {
        let s = blit_with(TileFlags::DIAGONAL | TileFlags::HORIZONTAL);
        assert_eq!(px(&s, 0, 0), BLUE);
        assert_eq!(px(&s, 1, 0), RED);
        assert_eq!(px(&s, 1, 1), GREEN);
    }

    #[test]
    fn transparent_texels_keep_what_is_below() {
        let mut surf = <Image as Surface>::create(1, 1).unwrap();
        surf.set_pixel(0, 0, Color::from_rgba(0, 0, 255, 255));
        let clear = Image::gen_image_color(1, 1, BLANK);
        surf.blit(&clear, CellRect { x: 0, y: 0, w: 1, h: 1 }, 0, 0, TileFlags::NONE);
        assert_eq!(px(&surf, 0, 0), BLUE);
    }

    #[test]
    fn clips_at_edges() {
        let mut surf = <Image as Surface>::create(2, 2).unwrap();
        surf.blit(&atlas(), CellRect { x: 0, y: 0, w: 2, h: 2 }, 1, -1, TileFlags::NONE);
        assert_eq!(px(&surf, 1, 0), BLUE);
        assert_eq!(px(&surf, 0, 0), [0, 0, 0, 0]);
        assert_eq!(px(&surf, 1, 1), [0, 0, 0, 0]);
    }
}
