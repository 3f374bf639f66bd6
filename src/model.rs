use serde::{Deserialize, Serialize};

/// An RGBA zone color. Devices composite `a` onto black.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    #[serde(default = "opaque")]
    pub a: u8,
}

fn opaque() -> u8 {
    0xFF
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(0xFF, 0xFF, 0xFF);
    pub const BLUE: Color = Color::rgb(0, 0, 0xFF);
    /// Brand green shown while nothing musical is playing.
    pub const IDLE_GREEN: Color = Color::rgb(0x1E, 0xD7, 0x60);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xFF }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Direct channel scaling at full opacity. Truncates, never rounds.
    pub fn scaled(self, scale: f32) -> Self {
        Self::rgb(
            (self.r as f32 * scale) as u8,
            (self.g as f32 * scale) as u8,
            (self.b as f32 * scale) as u8,
        )
    }

    /// What a device shows when this color is drawn over a black background.
    pub fn composited_on_black(self) -> [u8; 3] {
        if self.a == 0xFF {
            return [self.r, self.g, self.b];
        }
        let a = self.a as u16;
        [
            (self.r as u16 * a / 0xFF) as u8,
            (self.g as u16 * a / 0xFF) as u8,
            (self.b as u16 * a / 0xFF) as u8,
        ]
    }

    pub fn is_black(self) -> bool {
        self.composited_on_black() == [0, 0, 0]
    }

    pub fn random(rng: &mut dyn rand::RngCore) -> Self {
        let mut bytes = [0u8; 3];
        rng.fill_bytes(&mut bytes);
        Self::rgb(bytes[0], bytes[1], bytes[2])
    }
}

impl From<[u8; 3]> for Color {
    fn from(c: [u8; 3]) -> Self {
        Self::rgb(c[0], c[1], c[2])
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PixelStrip {
    pub id: u64,
    pub universe: u16,
    pub start_channel: u16,
    pub pixel_count: usize,
    pub x: f64,        // Meters from the left edge of the layout
    pub y: f64,        // Meters from the top edge of the layout
    pub spacing: f64,  // Meters between pixels
    pub rotation: f64, // Radians
    #[serde(default = "default_color_order")]
    pub color_order: String, // "RGB", "GRB", "BGR"
}

fn default_color_order() -> String {
    "RGB".to_string()
}

impl PixelStrip {
    /// Layout position of one pixel along the strip.
    pub fn pixel_position(&self, index: usize) -> glam::DVec2 {
        let along = index as f64 * self.spacing;
        glam::DVec2::new(
            self.x + along * self.rotation.cos(),
            self.y + along * self.rotation.sin(),
        )
    }
}

impl Default for PixelStrip {
    fn default() -> Self {
        Self {
            id: 0,
            universe: 1,
            start_channel: 1,
            pixel_count: 50,
            x: 0.0,
            y: 0.0,
            spacing: 0.0166,
            rotation: 0.0,
            color_order: "RGB".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NetworkConfig {
    pub use_multicast: bool,
    pub unicast_ip: String,
    pub universe: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            use_multicast: true,
            unicast_ip: "192.168.1.50".to_string(), // Default placeholder
            universe: 1,
        }
    }
}
