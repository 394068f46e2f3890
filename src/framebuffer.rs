//! # Frame Buffer
//!
//! One contiguous `stride × height` allocation plus a small alignment
//! pad. The DMA pipeline reads whole rows including the left/right
//! border bytes; drawing code only ever sees the visible window, offset
//! by the left border.
//!
//! ## Drawing surface
//!
//! This is the boundary the rasterizer and compositor layers consume:
//!
//! ```ignore
//! fb.clear(rgb(0, 0, 0));
//! fb.set_pixel(10, 20, rgb(255, 0, 0));
//! fb.write_row(0, &line_of_pixels);             // native pixels
//! fb.write_row_paletted(1, &indices, &palette); // 8-bit paletted
//! fb.write_row_rgb565(2, &rgb565_line);         // 16-bit RGB565
//! ```
//!
//! Out-of-range coordinates are ignored, not faulted: there is no
//! process isolation here, and a panic in drawing code halts the whole
//! device. Row writers clamp to the visible window and never touch the
//! borders, so stray input cannot bleed into blanking.
//!
//! The scanout interrupt reads whichever bytes a row holds when its
//! line comes up. Writing a row while it is being transmitted can tear
//! for one frame; locking every pixel write against the raster position
//! would cost more than the tear does.

use alloc::vec::Vec;

use crate::mode::VideoMode;
use crate::{Pixel, VgaError};

/// Pad past the last row so a shifted secondary channel's final reads
/// stay inside the allocation.
const SHIFT_PAD: usize = 8;

pub struct FrameBuffer {
    data: Vec<u8>,
    width: usize,
    height: usize,
    stride: usize,
    left_border: usize,
}

impl FrameBuffer {
    /// Allocate and zero the buffer for a resolved mode. Fallible:
    /// allocation failure is an initialization error, not a panic.
    pub fn allocate(mode: &VideoMode) -> Result<FrameBuffer, VgaError> {
        let len = mode.stride as usize * mode.height as usize + SHIFT_PAD;
        let mut data = Vec::new();
        if data.try_reserve_exact(len).is_err() {
            log::warn!("could not allocate {len} byte frame buffer");
            return Err(VgaError::AllocationFailed);
        }
        data.resize(len, 0);
        Ok(FrameBuffer {
            data,
            width: mode.width as usize,
            height: mode.height as usize,
            stride: mode.stride as usize,
            left_border: mode.left_border as usize,
        })
    }

    /// Address of byte 0 of row 0 (left border included) — what the
    /// DMA pipeline streams from.
    #[inline(always)]
    pub(crate) fn base_addr(&self) -> usize {
        self.data.as_ptr() as usize
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Raw pointer to the first visible pixel of row `y`; the row
    /// extends `stride` bytes. Null if `y` is out of range.
    pub fn row_pointer(&mut self, y: usize) -> *mut Pixel {
        if y >= self.height {
            return core::ptr::null_mut();
        }
        let offset = y * self.stride + self.left_border;
        unsafe { self.data.as_mut_ptr().add(offset) }
    }

    /// Visible pixels of row `y`.
    pub fn row(&self, y: usize) -> Option<&[Pixel]> {
        if y >= self.height {
            return None;
        }
        let start = y * self.stride + self.left_border;
        Some(&self.data[start..start + self.width])
    }

    /// Visible pixels of row `y`, mutable.
    pub fn row_mut(&mut self, y: usize) -> Option<&mut [Pixel]> {
        if y >= self.height {
            return None;
        }
        let start = y * self.stride + self.left_border;
        Some(&mut self.data[start..start + self.width])
    }

    /// Read one pixel. `None` outside the visible window.
    pub fn pixel(&self, x: usize, y: usize) -> Option<Pixel> {
        self.row(y)?.get(x).copied()
    }

    /// Write one pixel. Out-of-range writes are dropped.
    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, color: Pixel) {
        if x < self.width {
            if let Some(row) = self.row_mut(y) {
                row[x] = color;
            }
        }
    }

    /// Fill the visible window. Border bytes stay zero (black).
    pub fn clear(&mut self, color: Pixel) {
        for y in 0..self.height {
            let start = y * self.stride + self.left_border;
            self.data[start..start + self.width].fill(color);
        }
    }

    /// Write a row of native pixels, adapted to the mode's width:
    /// wider sources are nearest-neighbor downsampled, a source of
    /// exactly half width is pixel-doubled, narrower sources are
    /// centered.
    pub fn write_row(&mut self, y: usize, src: &[Pixel]) {
        let width = self.width;
        let Some(dst) = self.row_mut(y) else { return };
        if src.is_empty() {
            return;
        }
        if src.len() > width {
            // 8.8 fixed-point source step.
            let step = (src.len() << 8) / width;
            let mut pos = 0usize;
            for d in dst.iter_mut() {
                *d = src[pos >> 8];
                pos += step;
            }
        } else if src.len() * 2 == width {
            for (i, &p) in src.iter().enumerate() {
                dst[i * 2] = p;
                dst[i * 2 + 1] = p;
            }
        } else {
            let offset = (width - src.len()) / 2;
            dst[offset..offset + src.len()].copy_from_slice(src);
        }
    }

    /// Write a row of 8-bit palette indices through a 256-entry
    /// palette, with the same width adaptation as [`write_row`].
    ///
    /// [`write_row`]: FrameBuffer::write_row
    pub fn write_row_paletted(&mut self, y: usize, src: &[u8], palette: &[Pixel; 256]) {
        let width = self.width;
        let Some(dst) = self.row_mut(y) else { return };
        if src.is_empty() {
            return;
        }
        if src.len() > width {
            let step = (src.len() << 8) / width;
            let mut pos = 0usize;
            for d in dst.iter_mut() {
                *d = palette[src[pos >> 8] as usize];
                pos += step;
            }
        } else if src.len() * 2 == width {
            for (i, &idx) in src.iter().enumerate() {
                let p = palette[idx as usize];
                dst[i * 2] = p;
                dst[i * 2 + 1] = p;
            }
        } else {
            let offset = (width - src.len()) / 2;
            for (d, &idx) in dst[offset..].iter_mut().zip(src) {
                *d = palette[idx as usize];
            }
        }
    }

    /// Write a row of RGB565 pixels, repacked to native `RRRGGGBB`,
    /// with the same width adaptation as [`write_row`].
    ///
    /// [`write_row`]: FrameBuffer::write_row
    pub fn write_row_rgb565(&mut self, y: usize, src: &[u16]) {
        let width = self.width;
        let Some(dst) = self.row_mut(y) else { return };
        if src.is_empty() {
            return;
        }
        if src.len() > width {
            let step = (src.len() << 8) / width;
            let mut pos = 0usize;
            for d in dst.iter_mut() {
                *d = pack_565(src[pos >> 8]);
                pos += step;
            }
        } else if src.len() * 2 == width {
            for (i, &v) in src.iter().enumerate() {
                let p = pack_565(v);
                dst[i * 2] = p;
                dst[i * 2 + 1] = p;
            }
        } else {
            let offset = (width - src.len()) / 2;
            for (d, &v) in dst[offset..].iter_mut().zip(src) {
                *d = pack_565(v);
            }
        }
    }
}

/// Keep the top 3/3/2 bits of an RGB565 word.
#[inline(always)]
fn pack_565(v: u16) -> Pixel {
    (((v >> 13) & 0x07) << 5) as u8 | (((v >> 8) & 0x07) << 2) as u8 | ((v >> 3) & 0x03) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Mode;
    use crate::rgb;

    fn buffer(mode: Mode) -> FrameBuffer {
        FrameBuffer::allocate(&VideoMode::resolve(mode).unwrap()).unwrap()
    }

    #[test]
    fn pixel_round_trip_full_window() {
        let mut fb = buffer(Mode::Vga320x240);
        for y in 0..fb.height() {
            for x in 0..fb.width() {
                let p = ((x * 7 + y * 13) & 0xFF) as u8;
                fb.set_pixel(x, y, p);
            }
        }
        for y in 0..fb.height() {
            for x in 0..fb.width() {
                let p = ((x * 7 + y * 13) & 0xFF) as u8;
                assert_eq!(fb.pixel(x, y), Some(p));
            }
        }
    }

    #[test]
    fn out_of_range_writes_do_not_bleed() {
        let mut fb = buffer(Mode::Vga320x240);
        fb.clear(0xAA);
        let snapshot: Vec<u8> = (0..fb.height())
            .flat_map(|y| fb.row(y).unwrap().to_vec())
            .collect();

        fb.set_pixel(fb.width(), 0, 0x55);
        fb.set_pixel(0, fb.height(), 0x55);
        fb.set_pixel(usize::MAX, usize::MAX, 0x55);
        fb.write_row(fb.height(), &[0x55; 320]);

        let after: Vec<u8> = (0..fb.height())
            .flat_map(|y| fb.row(y).unwrap().to_vec())
            .collect();
        assert_eq!(snapshot, after);
    }

    #[test]
    fn borders_stay_black() {
        let mut fb = buffer(Mode::Vga320x240);
        fb.clear(0xFF);
        fb.write_row(0, &[0xFF; 320]);
        // Byte 0 of each raw row is left border, untouched.
        let stride = fb.stride();
        for y in 0..fb.height() {
            assert_eq!(fb.data[y * stride], 0);
            assert_eq!(fb.data[y * stride + stride - 1], 0);
        }
    }

    #[test]
    fn write_row_exact_width() {
        let mut fb = buffer(Mode::Vga320x240);
        let src: Vec<Pixel> = (0..320).map(|x| (x & 0xFF) as u8).collect();
        fb.write_row(3, &src);
        assert_eq!(fb.row(3).unwrap(), &src[..]);
    }

    #[test]
    fn write_row_downsamples_wider_sources() {
        let mut fb = buffer(Mode::Vga320x240);
        // 640 source pixels onto 320: every second pixel survives.
        let src: Vec<Pixel> = (0..640).map(|x| (x & 0xFF) as u8).collect();
        fb.write_row(0, &src);
        let row = fb.row(0).unwrap();
        assert_eq!(row[0], src[0]);
        assert_eq!(row[1], src[2]);
        assert_eq!(row[159], src[318]);
    }

    #[test]
    fn write_row_doubles_half_width_sources() {
        let mut fb = buffer(Mode::Vga320x240);
        let src: Vec<Pixel> = (0..160).map(|x| (x & 0xFF) as u8).collect();
        fb.write_row(0, &src);
        let row = fb.row(0).unwrap();
        assert_eq!(row[0], src[0]);
        assert_eq!(row[1], src[0]);
        assert_eq!(row[318], src[159]);
        assert_eq!(row[319], src[159]);
    }

    #[test]
    fn write_row_centers_narrow_sources() {
        let mut fb = buffer(Mode::Vga320x240);
        let src = [0x11u8; 100];
        fb.write_row(0, &src);
        let row = fb.row(0).unwrap();
        assert_eq!(row[109], 0);
        assert_eq!(row[110], 0x11);
        assert_eq!(row[209], 0x11);
        assert_eq!(row[210], 0);
    }

    #[test]
    fn paletted_rows_translate() {
        let mut fb = buffer(Mode::Vga320x240);
        let mut palette = [0u8; 256];
        palette[7] = rgb(255, 0, 0);
        let src = [7u8; 320];
        fb.write_row_paletted(0, &src, &palette);
        assert_eq!(fb.pixel(0, 0), Some(rgb(255, 0, 0)));
        assert_eq!(fb.pixel(319, 0), Some(rgb(255, 0, 0)));
    }

    #[test]
    fn rgb565_repacks_to_332() {
        assert_eq!(pack_565(0xFFFF), 0xFF);
        assert_eq!(pack_565(0xF800), 0b111_000_00); // pure red
        assert_eq!(pack_565(0x07E0), 0b000_111_00); // pure green
        assert_eq!(pack_565(0x001F), 0b000_000_11); // pure blue
        let mut fb = buffer(Mode::Vga320x240);
        fb.write_row_rgb565(1, &[0xF800; 320]);
        assert_eq!(fb.pixel(5, 1), Some(0b111_000_00));
    }

    #[test]
    fn row_pointer_spans_stride() {
        let mut fb = buffer(Mode::Vga320x240);
        let p0 = fb.row_pointer(0) as usize;
        let p1 = fb.row_pointer(1) as usize;
        assert_eq!(p1 - p0, fb.stride());
        assert!(fb.row_pointer(fb.height()).is_null());
    }
}
