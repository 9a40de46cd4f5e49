// Linear scRGB (RGBA16F) to BGRA8 tone mapping.
//
// The alternate capture path delivers linear half-float frames. Conversion
// applies an exposure pre-scale, clamps to the SDR range, and encodes with
// the sRGB transfer function. Output rows are tightly packed, alpha is
// forced opaque.

use half::f16;

use crate::buffer::{HdrPixelView, PixelBuffer, BYTES_PER_HDR_PIXEL, BYTES_PER_PIXEL};

/// Tone-map `frame` into `out`, reusing its allocation.
///
/// `exposure_percent` scales the linear values before encoding; 100 is
/// neutral. Values above 1.0 after scaling clip to full white.
pub fn tone_map_into(frame: &HdrPixelView<'_>, exposure_percent: i32, out: &mut PixelBuffer) {
    let exposure = exposure_percent.clamp(1, 400) as f32 / 100.0;
    out.reset(
        frame.width(),
        frame.height(),
        frame.width() as usize * BYTES_PER_PIXEL,
    );

    for y in 0..frame.height() {
        let src_row = frame.row(y);
        let dst_row = out.row_mut(y);
        let pairs = src_row
            .chunks_exact(BYTES_PER_HDR_PIXEL)
            .zip(dst_row.chunks_exact_mut(BYTES_PER_PIXEL));
        for (s, d) in pairs {
            let r = half_at(s, 0).to_f32() * exposure;
            let g = half_at(s, 2).to_f32() * exposure;
            let b = half_at(s, 4).to_f32() * exposure;
            d[0] = linear_to_srgb_u8(b);
            d[1] = linear_to_srgb_u8(g);
            d[2] = linear_to_srgb_u8(r);
            d[3] = 255;
        }
    }
}

#[inline]
fn half_at(bytes: &[u8], offset: usize) -> f16 {
    f16::from_bits(u16::from_le_bytes([bytes[offset], bytes[offset + 1]]))
}

/// Encode one linear channel with the sRGB transfer function.
#[inline]
pub fn linear_to_srgb_u8(v: f32) -> u8 {
    let c = v.clamp(0.0, 1.0);
    let srgb = if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    (srgb * 255.0 + 0.5).floor().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encode f32 RGBA quads as a half-float frame with `pad` trailing
    /// bytes per row, each padding byte 0xFF.
    fn hdr_bytes(pixels: &[[f32; 4]], width: u32, height: u32, pad: usize) -> (Vec<u8>, usize) {
        assert_eq!(pixels.len(), (width * height) as usize);
        let stride = width as usize * BYTES_PER_HDR_PIXEL + pad;
        let mut data = vec![0xFFu8; stride * height as usize];
        for (i, px) in pixels.iter().enumerate() {
            let y = i / width as usize;
            let x = i % width as usize;
            let off = y * stride + x * BYTES_PER_HDR_PIXEL;
            for (c, &v) in px.iter().enumerate() {
                let bits = f16::from_f32(v).to_bits().to_le_bytes();
                data[off + c * 2] = bits[0];
                data[off + c * 2 + 1] = bits[1];
            }
        }
        (data, stride)
    }

    #[test]
    fn known_values_encode_to_srgb() {
        let (data, stride) = hdr_bytes(
            &[
                [0.0, 0.0, 0.0, 1.0],
                [1.0, 1.0, 1.0, 1.0],
                [0.5, 0.5, 0.5, 1.0],
                [2.0, 2.0, 2.0, 1.0],
            ],
            4,
            1,
            0,
        );
        let frame = HdrPixelView::new(&data, 4, 1, stride).expect("valid frame");
        let mut out = PixelBuffer::new(0, 0);
        tone_map_into(&frame, 100, &mut out);

        let view = out.as_view();
        assert_eq!(view.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(view.pixel(1, 0), [255, 255, 255, 255]);
        // Linear 0.5 encodes to 188 under the sRGB transfer function.
        assert_eq!(view.pixel(2, 0), [188, 188, 188, 255]);
        // Above the SDR range clips to full white.
        assert_eq!(view.pixel(3, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn linear_segment_near_black() {
        // Below the sRGB knee the encode is linear, not a power curve.
        let bits = f16::from_f32(0.002);
        let expected = (bits.to_f32() * 12.92 * 255.0 + 0.5) as u8;

        let (data, stride) = hdr_bytes(&[[0.002, 0.002, 0.002, 1.0]], 1, 1, 0);
        let frame = HdrPixelView::new(&data, 1, 1, stride).expect("valid frame");
        let mut out = PixelBuffer::new(0, 0);
        tone_map_into(&frame, 100, &mut out);
        assert_eq!(out.as_view().pixel(0, 0), [expected, expected, expected, 255]);
    }

    #[test]
    fn row_padding_is_skipped() {
        // 0xFF padding decodes as NaN halves; any read of it would poison
        // the output row.
        let (data, stride) = hdr_bytes(
            &[
                [0.25, 0.25, 0.25, 1.0],
                [0.25, 0.25, 0.25, 1.0],
                [0.25, 0.25, 0.25, 1.0],
                [0.25, 0.25, 0.25, 1.0],
            ],
            2,
            2,
            8,
        );
        let frame = HdrPixelView::new(&data, 2, 2, stride).expect("valid frame");
        let mut out = PixelBuffer::new(0, 0);
        tone_map_into(&frame, 100, &mut out);

        let view = out.as_view();
        let expected = view.pixel(0, 0);
        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(view.pixel(x, y), expected);
            }
        }
    }

    #[test]
    fn exposure_prescales_linear_values() {
        let (data, stride) = hdr_bytes(&[[0.25, 0.25, 0.25, 1.0]], 1, 1, 0);
        let frame = HdrPixelView::new(&data, 1, 1, stride).expect("valid frame");
        let mut out = PixelBuffer::new(0, 0);

        tone_map_into(&frame, 200, &mut out);
        // 0.25 * 2.0 = 0.5 linear, which encodes to 188.
        assert_eq!(out.as_view().pixel(0, 0), [188, 188, 188, 255]);
    }

    #[test]
    fn alpha_is_forced_opaque() {
        let (data, stride) = hdr_bytes(&[[0.1, 0.2, 0.3, 0.0]], 1, 1, 0);
        let frame = HdrPixelView::new(&data, 1, 1, stride).expect("valid frame");
        let mut out = PixelBuffer::new(0, 0);
        tone_map_into(&frame, 100, &mut out);
        assert_eq!(out.as_view().pixel(0, 0)[3], 255);
    }
}
