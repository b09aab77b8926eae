//! NV21 <-> packed RGB conversion, BT.601 full range.
//!
//! Fixed-point coefficients are scaled by 256. Callers are expected to have
//! validated the buffer length (see [`RawFrame::validate`]).
//!
//! [`RawFrame::validate`]: crate::shared::raw_frame::RawFrame::validate

/// Converts an NV21 buffer to packed RGB.
pub fn nv21_to_rgb(nv21: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let chroma_stride = 2 * w.div_ceil(2);
    let (y_plane, vu_plane) = nv21.split_at(w * h);

    let mut rgb = vec![0u8; w * h * 3];
    for row in 0..h {
        let vu_row = (row / 2) * chroma_stride;
        for col in 0..w {
            let vu = vu_row + (col / 2) * 2;
            let v = vu_plane[vu] as i32 - 128;
            let u = vu_plane[vu + 1] as i32 - 128;
            let y = y_plane[row * w + col] as i32;

            let out = (row * w + col) * 3;
            rgb[out] = clamp(y + ((359 * v) >> 8));
            rgb[out + 1] = clamp(y - ((88 * u + 183 * v) >> 8));
            rgb[out + 2] = clamp(y + ((454 * u) >> 8));
        }
    }
    rgb
}

/// Converts packed RGB to NV21, averaging chroma over each 2x2 block.
pub fn rgb_to_nv21(rgb: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let cw = w.div_ceil(2);
    let ch = h.div_ceil(2);

    let mut out = vec![0u8; w * h + 2 * cw * ch];
    for row in 0..h {
        for col in 0..w {
            let p = (row * w + col) * 3;
            let (r, g, b) = (rgb[p] as i32, rgb[p + 1] as i32, rgb[p + 2] as i32);
            out[row * w + col] = clamp((77 * r + 150 * g + 29 * b + 128) >> 8);
        }
    }

    let luma_len = w * h;
    for by in 0..ch {
        for bx in 0..cw {
            let (mut r, mut g, mut b, mut n) = (0i32, 0i32, 0i32, 0i32);
            for row in (by * 2)..((by * 2 + 2).min(h)) {
                for col in (bx * 2)..((bx * 2 + 2).min(w)) {
                    let p = (row * w + col) * 3;
                    r += rgb[p] as i32;
                    g += rgb[p + 1] as i32;
                    b += rgb[p + 2] as i32;
                    n += 1;
                }
            }
            let (r, g, b) = (r / n, g / n, b / n);
            let idx = luma_len + by * 2 * cw + bx * 2;
            out[idx] = clamp(((128 * r - 107 * g - 21 * b + 128) >> 8) + 128);
            out[idx + 1] = clamp(((-43 * r - 85 * g + 128 * b + 128) >> 8) + 128);
        }
    }
    out
}

/// Builds an NV21 buffer from a luma plane with neutral chroma.
pub fn gray_to_nv21(luma: &[u8], width: u32, height: u32) -> Vec<u8> {
    let cw = (width as usize).div_ceil(2);
    let ch = (height as usize).div_ceil(2);
    let mut out = Vec::with_capacity(luma.len() + 2 * cw * ch);
    out.extend_from_slice(luma);
    out.resize(luma.len() + 2 * cw * ch, 128);
    out
}

#[inline]
fn clamp(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}
