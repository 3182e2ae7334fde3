/// Per-pixel colour math used by the filters
///
/// Everything here works on 8-bit channel values:
/// - Luma (ITU-R 601-2 weights, the classic "L" conversion)
/// - Two-tone gradient recolouring (sepia)
/// - Multiplicative brightness and contrast

/// Sepia shadow tone (what black maps to)
pub const SEPIA_SHADOW: [u8; 3] = [107, 74, 47];
/// Sepia highlight tone (what white maps to)
pub const SEPIA_HIGHLIGHT: [u8; 3] = [207, 190, 183];

/// Luma of an RGB pixel
///
/// Fixed point version of `0.299 R + 0.587 G + 0.114 B`, rounded.
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = u32::from(r) * 19595 + u32::from(g) * 38470 + u32::from(b) * 7471;
    ((weighted + 0x8000) >> 16) as u8
}

/// Map a grey level onto the line between two colours
///
/// Level 0 gives `shadow`, 255 gives `highlight`.
pub fn gradient(shadow: [u8; 3], highlight: [u8; 3], level: u8) -> [u8; 3] {
    let t = f32::from(level) / 255.0;
    let mut out = [0u8; 3];
    for (i, channel) in out.iter_mut().enumerate() {
        let from = f32::from(shadow[i]);
        let to = f32::from(highlight[i]);
        *channel = clamp_channel(from + (to - from) * t);
    }
    out
}

/// Multiply a channel by `factor` (brightness)
pub fn scale_channel(value: u8, factor: f32) -> u8 {
    clamp_channel(f32::from(value) * factor)
}

/// Push a channel away from (or towards) `mean` by `factor` (contrast)
pub fn stretch_channel(value: u8, mean: f32, factor: f32) -> u8 {
    clamp_channel(mean + (f32::from(value) - mean) * factor)
}

fn clamp_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luma_extremes_and_weights() {
        assert_eq!(luma(0, 0, 0), 0);
        assert_eq!(luma(255, 255, 255), 255);
        assert_eq!(luma(255, 0, 0), 76);
        assert_eq!(luma(0, 255, 0), 150);
        assert_eq!(luma(0, 0, 255), 29);
    }

    #[test]
    fn test_gradient_endpoints() {
        assert_eq!(gradient(SEPIA_SHADOW, SEPIA_HIGHLIGHT, 0), SEPIA_SHADOW);
        assert_eq!(gradient(SEPIA_SHADOW, SEPIA_HIGHLIGHT, 255), SEPIA_HIGHLIGHT);
        let mid = gradient(SEPIA_SHADOW, SEPIA_HIGHLIGHT, 128);
        assert!(mid[0] > SEPIA_SHADOW[0] && mid[0] < SEPIA_HIGHLIGHT[0]);
    }

    #[test]
    fn test_neutral_factors_are_identity() {
        for value in [0u8, 1, 64, 127, 128, 200, 255] {
            assert_eq!(scale_channel(value, 1.0), value);
            assert_eq!(stretch_channel(value, 117.0, 1.0), value);
        }
    }

    #[test]
    fn test_scaling_clamps() {
        assert_eq!(scale_channel(200, 1.5), 255);
        assert_eq!(scale_channel(100, 0.5), 50);
        assert_eq!(stretch_channel(0, 128.0, 1.5), 0);
        assert_eq!(stretch_channel(200, 100.0, 0.5), 150);
    }
}
