use super::{EffectSettings, TickContext};
use crate::device::FrameOutput;
use crate::geometry::DeviceGeometry;
use crate::model::Color;
use glam::DVec2;
use image::RgbImage;

/// Stretches the current cover art over the array.
pub struct ArtworkEffect {
    idle_color: Color,
}

impl ArtworkEffect {
    pub fn new(settings: &EffectSettings) -> Self {
        Self { idle_color: settings.idle_color }
    }

    pub fn render(&mut self, ctx: &mut TickContext<'_>) -> FrameOutput {
        match ctx.feed.artwork() {
            Some(image) => FrameOutput::Zones(sample_artwork(image, ctx.geometry)),
            None => FrameOutput::Uniform(self.idle_color),
        }
    }
}

/// Nearest pixel under each zone, with the image scaled to the bounding box.
pub fn sample_artwork(image: &RgbImage, geometry: &DeviceGeometry) -> Vec<Color> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return vec![Color::BLACK; geometry.zone_count()];
    }

    geometry
        .positions
        .iter()
        .map(|pos| {
            let n = normalized(*pos, geometry.bounding_box);
            let x = ((n.x * width as f64) as u32).min(width - 1);
            let y = ((n.y * height as f64) as u32).min(height - 1);
            Color::from(image.get_pixel(x, y).0)
        })
        .collect()
}

fn normalized(pos: DVec2, bounding_box: DVec2) -> DVec2 {
    let axis = |p: f64, extent: f64| {
        if extent > 0.0 {
            (p / extent).clamp(0.0, 1.0)
        } else {
            0.0
        }
    };
    DVec2::new(axis(pos.x, bounding_box.x), axis(pos.y, bounding_box.y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::PlaybackFeed;
    use crate::geometry::tests::grid;
    use crate::service::{ItemKind, NowPlaying};
    use image::Rgb;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Instant;

    fn quadrants() -> RgbImage {
        RgbImage::from_fn(4, 4, |x, y| match (x < 2, y < 2) {
            (true, true) => Rgb([255, 0, 0]),
            (false, true) => Rgb([0, 255, 0]),
            (true, false) => Rgb([0, 0, 255]),
            (false, false) => Rgb([255, 255, 255]),
        })
    }

    #[test]
    fn test_samples_nearest_pixel() {
        let geometry = grid(2, 2);
        let colors = sample_artwork(&quadrants(), &geometry);
        assert_eq!(
            colors,
            vec![
                Color::rgb(255, 0, 0),
                Color::rgb(0, 255, 0),
                Color::rgb(0, 0, 255),
                Color::WHITE
            ]
        );
    }

    #[test]
    fn test_edge_zones_clamp_to_image() {
        let geometry = DeviceGeometry::new(
            vec![DVec2::new(0.0, 0.0), DVec2::new(2.0, 2.0), DVec2::new(5.0, -1.0)],
            DVec2::new(2.0, 2.0),
        );
        let colors = sample_artwork(&quadrants(), &geometry);
        assert_eq!(colors, vec![Color::rgb(255, 0, 0), Color::WHITE, Color::rgb(0, 255, 0)]);
    }

    #[test]
    fn test_idle_until_artwork_arrives() {
        let geometry = grid(2, 2);
        let now = Instant::now();
        let mut feed = PlaybackFeed::new();
        feed.accept(
            &NowPlaying {
                track_id: "a".into(),
                kind: ItemKind::Track,
                progress_ms: 0,
                is_playing: true,
                service_timestamp_ms: 1,
                artwork_url: Some("cover".into()),
            },
            now,
        );
        let mut effect = ArtworkEffect::new(&EffectSettings::default());
        let mut rng = StdRng::seed_from_u64(1);
        {
            let mut ctx = TickContext { now, feed: &feed, geometry: &geometry, rng: &mut rng };
            assert_eq!(effect.render(&mut ctx), FrameOutput::Uniform(Color::IDLE_GREEN));
        }

        feed.publish_artwork("cover", quadrants());
        let mut ctx = TickContext { now, feed: &feed, geometry: &geometry, rng: &mut rng };
        assert!(matches!(effect.render(&mut ctx), FrameOutput::Zones(_)));
    }
}
