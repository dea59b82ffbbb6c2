//! Colors of the exported comic.

pub type Rgb = [u8; 3];

pub const PAGE_FILL: Rgb = [0x0f, 0x17, 0x2a];
pub const PAGE_DOTS: Rgb = [0x1b, 0x26, 0x3f];
pub const PANEL_FILL: Rgb = [0x1e, 0x29, 0x3b];
pub const PANEL_HATCH: Rgb = [0x33, 0x41, 0x55];
pub const PANEL_BORDER: Rgb = [0x33, 0x41, 0x55];
pub const TITLE_TEXT: Rgb = [0xef, 0xf6, 0xff];
pub const SUBTITLE_TEXT: Rgb = [0x94, 0xa3, 0xb8];
pub const ACCENT: Rgb = [0x3b, 0x82, 0xf6];
pub const BADGE_FILL: Rgb = [0x02, 0x06, 0x17];
pub const BADGE_TEXT: Rgb = [0x60, 0xa5, 0xfa];
pub const MUTED_TEXT: Rgb = [0x64, 0x74, 0x8b];
pub const CAPTION_FILL: Rgb = [0x0f, 0x17, 0x2a];
pub const CAPTION_TEXT: Rgb = [0xff, 0xff, 0xff];
pub const BUBBLE_FILL: Rgb = [0xff, 0xff, 0xff];
pub const BUBBLE_TEXT: Rgb = [0x0f, 0x17, 0x2a];
pub const SPEAKER_TEXT: Rgb = [0x1e, 0x29, 0x3b];
pub const THOUGHT_BORDER: Rgb = [0xcb, 0xd5, 0xe1];

/// `base` blended towards `over` by `alpha`; stands in for a translucent fill.
pub fn blend(base: Rgb, over: Rgb, alpha: f32) -> Rgb {
    let a = alpha.clamp(0.0, 1.0);
    let mix = |b: u8, o: u8| (b as f32 * (1.0 - a) + o as f32 * a).round() as u8;
    [mix(base[0], over[0]), mix(base[1], over[1]), mix(base[2], over[2])]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_endpoints() {
        assert_eq!(blend([0, 0, 0], [255, 255, 255], 0.0), [0, 0, 0]);
        assert_eq!(blend([0, 0, 0], [255, 255, 255], 1.0), [255, 255, 255]);
        assert_eq!(blend([0, 0, 0], [200, 100, 50], 0.5), [100, 50, 25]);
    }
}
