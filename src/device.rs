use crate::keys::Key;
use crate::model::Color;
use glam::DVec2;

/// A connected multi-zone light array.
///
/// Geometry queries are static for the lifetime of the connection. The frame
/// loop calls exactly one of `set_colors` or `set_color` per produced frame.
pub trait LampArray: Send {
    fn name(&self) -> &str;

    fn zone_count(&self) -> usize;

    /// Zone position in meters from the top-left of the bounding box.
    fn zone_position(&self, index: usize) -> DVec2;

    /// Width and height of the array in meters.
    fn bounding_box(&self) -> DVec2;

    fn supports_keyed_zones(&self) -> bool {
        false
    }

    fn zones_for_key(&self, _key: Key) -> Vec<usize> {
        Vec::new()
    }

    fn set_colors(&mut self, colors: &[Color], zones: &[usize]);

    fn set_color(&mut self, color: Color);
}

/// What one frame tick asks the device to show.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutput {
    /// Nothing new this tick; the device keeps what it shows.
    Hold,
    /// One color across the whole array.
    Uniform(Color),
    /// One color per zone, indexed by zone.
    Zones(Vec<Color>),
}

impl FrameOutput {
    pub fn apply(&self, device: &mut dyn LampArray, zone_indices: &[usize]) {
        match self {
            FrameOutput::Hold => {}
            FrameOutput::Uniform(color) => device.set_color(*color),
            FrameOutput::Zones(colors) => device.set_colors(colors, zone_indices),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Records every frame written to it.
    pub(crate) struct FakeLampArray {
        pub positions: Vec<DVec2>,
        pub bounding_box: DVec2,
        pub keys: HashMap<Key, Vec<usize>>,
        pub frames: Arc<Mutex<Vec<FrameOutput>>>,
    }

    impl FakeLampArray {
        pub(crate) fn grid(cols: usize, rows: usize) -> Self {
            let geo = crate::geometry::tests::grid(cols, rows);
            Self {
                positions: geo.positions,
                bounding_box: geo.bounding_box,
                keys: HashMap::new(),
                frames: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl LampArray for FakeLampArray {
        fn name(&self) -> &str {
            "fake"
        }
        fn zone_count(&self) -> usize {
            self.positions.len()
        }
        fn zone_position(&self, index: usize) -> DVec2 {
            self.positions[index]
        }
        fn bounding_box(&self) -> DVec2 {
            self.bounding_box
        }
        fn supports_keyed_zones(&self) -> bool {
            !self.keys.is_empty()
        }
        fn zones_for_key(&self, key: Key) -> Vec<usize> {
            self.keys.get(&key).cloned().unwrap_or_default()
        }
        fn set_colors(&mut self, colors: &[Color], zones: &[usize]) {
            assert_eq!(colors.len(), zones.len());
            self.frames.lock().unwrap().push(FrameOutput::Zones(colors.to_vec()));
        }
        fn set_color(&mut self, color: Color) {
            self.frames.lock().unwrap().push(FrameOutput::Uniform(color));
        }
    }

    #[test]
    fn test_hold_writes_nothing() {
        let mut device = FakeLampArray::grid(2, 1);
        FrameOutput::Hold.apply(&mut device, &[0, 1]);
        FrameOutput::Uniform(Color::IDLE_GREEN).apply(&mut device, &[0, 1]);
        let frames = device.frames.lock().unwrap();
        assert_eq!(*frames, vec![FrameOutput::Uniform(Color::IDLE_GREEN)]);
    }

    #[test]
    fn test_keyed_geometry_from_device() {
        let mut device = FakeLampArray::grid(3, 1);
        device.keys.insert(Key::A, vec![0]);
        device.keys.insert(Key::Q, vec![0, 1]);
        device.keys.insert(Key::Space, vec![2]);
        let geo = crate::geometry::DeviceGeometry::from_device(&device);
        use crate::keys::PitchClass;
        assert_eq!(geo.zones_for_pitch(PitchClass::CSharp), Some(&[0, 1][..]));
        assert_eq!(geo.zones_for_pitch(PitchClass::F), Some(&[2][..]));
        assert_eq!(geo.zones_for_pitch(PitchClass::C), None);
    }
}
