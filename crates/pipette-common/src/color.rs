/// Channel layout of a 32-bit packed pixel, as declared by the capture service.
///
/// Names follow the `wl_shm` convention: the format describes the `u32` read in
/// native (little-endian) order, so `Xrgb8888` keeps red in bits 16..24.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    #[default]
    Argb8888,
    Xrgb8888,
    Abgr8888,
    Xbgr8888,
}

impl PixelFormat {
    fn swaps_red_blue(self) -> bool {
        matches!(self, PixelFormat::Abgr8888 | PixelFormat::Xbgr8888)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0)
    }

    pub fn to_hex(self, uppercase: bool) -> String {
        if uppercase {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        }
    }
}

/// A raw pixel lifted out of a captured frame. The alpha byte is carried
/// along but never interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampledColor {
    pub packed: u32,
    pub format: PixelFormat,
}

impl SampledColor {
    pub fn new(packed: u32, format: PixelFormat) -> Self {
        Self { packed, format }
    }

    pub fn from_le_bytes(bytes: [u8; 4], format: PixelFormat) -> Self {
        Self::new(u32::from_le_bytes(bytes), format)
    }

    pub fn rgb(&self) -> Rgb {
        let hi = (self.packed >> 16) as u8;
        let mid = (self.packed >> 8) as u8;
        let lo = self.packed as u8;
        if self.format.swaps_red_blue() {
            Rgb::new(lo, mid, hi)
        } else {
            Rgb::new(hi, mid, lo)
        }
    }

    pub fn to_hex(&self, uppercase: bool) -> String {
        self.rgb().to_hex(uppercase)
    }
}

pub fn parse_color(s: &str) -> Option<Rgb> {
    let s = s.trim().trim_start_matches('#');
    if s.len() != 6 || !s.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&s[0..2], 16).ok()?;
    let g = u8::from_str_radix(&s[2..4], 16).ok()?;
    let b = u8::from_str_radix(&s[4..6], 16).ok()?;
    Some(Rgb::new(r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rgb() {
        assert_eq!(parse_color("#FF0000"), Some(Rgb::new(0xFF, 0, 0)));
        assert_eq!(parse_color("#00FF00"), Some(Rgb::new(0, 0xFF, 0)));
        assert_eq!(parse_color("1A1A2E"), Some(Rgb::new(0x1A, 0x1A, 0x2E)));
    }

    #[test]
    fn test_invalid() {
        assert_eq!(parse_color(""), None);
        assert_eq!(parse_color("#FFF"), None);
        assert_eq!(parse_color("#80FF0000"), None);
        assert_eq!(parse_color("invalid"), None);
    }

    #[test]
    fn test_xrgb_channels() {
        let color = SampledColor::from_le_bytes([0x33, 0x22, 0x11, 0x00], PixelFormat::Xrgb8888);
        assert_eq!(color.packed, 0x0011_2233);
        assert_eq!(color.rgb(), Rgb::new(0x11, 0x22, 0x33));
    }

    #[test]
    fn test_xbgr_channels() {
        let color = SampledColor::from_le_bytes([0x33, 0x22, 0x11, 0xFF], PixelFormat::Xbgr8888);
        assert_eq!(color.rgb(), Rgb::new(0x33, 0x22, 0x11));
    }

    #[test]
    fn test_hex_ignores_alpha() {
        let color = SampledColor::new(0xAB0A_0B0C, PixelFormat::Argb8888);
        assert_eq!(color.to_hex(true), "#0A0B0C");
        assert_eq!(SampledColor::new(0x00FE_DCBA, PixelFormat::Xrgb8888).to_hex(false), "#fedcba");
    }

    #[test]
    fn test_default_is_black() {
        assert_eq!(SampledColor::default().to_hex(true), "#000000");
    }
}
