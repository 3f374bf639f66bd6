//! Spatial groupings derived from a device's zone layout.
//!
//! Everything here is measured from the midpoint of the device's bounding
//! box. Angles come from `atan2(mid.y - y, mid.x - x)` and so lie in
//! `[-π, π]`.

use crate::device::LampArray;
use crate::keys::PitchClass;
use glam::DVec2;
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// Upper angle of each beat sector, ascending, for the meters we can draw.
/// Sector boundaries sit on odd multiples of `π/meter`.
pub fn boundary_angles(meter: u32) -> Option<&'static [f64]> {
    const METER_3: [f64; 3] = [-PI / 3.0, PI / 3.0, PI];
    const METER_4: [f64; 4] = [-PI / 2.0, 0.0, PI / 2.0, PI];
    const METER_5: [f64; 5] = [-3.0 * PI / 5.0, -PI / 5.0, PI / 5.0, 3.0 * PI / 5.0, PI];
    const METER_6: [f64; 6] = [-2.0 * PI / 3.0, -PI / 3.0, 0.0, PI / 3.0, 2.0 * PI / 3.0, PI];
    const METER_7: [f64; 7] = [
        -5.0 * PI / 7.0,
        -3.0 * PI / 7.0,
        -PI / 7.0,
        PI / 7.0,
        3.0 * PI / 7.0,
        5.0 * PI / 7.0,
        PI,
    ];

    match meter {
        3 => Some(&METER_3),
        4 => Some(&METER_4),
        5 => Some(&METER_5),
        6 => Some(&METER_6),
        7 => Some(&METER_7),
        _ => None,
    }
}

/// Zone groups, one per beat of the bar.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BeatPartition {
    pub groups: Vec<Vec<usize>>,
}

impl BeatPartition {
    pub fn group(&self, beat: usize) -> Option<&[usize]> {
        self.groups.get(beat).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(Vec::is_empty)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeviceGeometry {
    pub positions: Vec<DVec2>,
    pub bounding_box: DVec2,
    pub key_bindings: Option<BTreeMap<PitchClass, Vec<usize>>>,
}

impl DeviceGeometry {
    pub fn new(positions: Vec<DVec2>, bounding_box: DVec2) -> Self {
        Self { positions, bounding_box, key_bindings: None }
    }

    /// Snapshot the static layout of a connected device.
    pub fn from_device(device: &dyn LampArray) -> Self {
        let positions = (0..device.zone_count()).map(|i| device.zone_position(i)).collect();
        let key_bindings = if device.supports_keyed_zones() {
            let mut bindings = BTreeMap::new();
            for pitch in PitchClass::ALL {
                let mut zones: Vec<usize> = pitch
                    .keys()
                    .iter()
                    .flat_map(|key| device.zones_for_key(*key))
                    .collect();
                zones.sort_unstable();
                zones.dedup();
                if !zones.is_empty() {
                    bindings.insert(pitch, zones);
                }
            }
            Some(bindings)
        } else {
            None
        };

        Self {
            positions,
            bounding_box: device.bounding_box(),
            key_bindings,
        }
    }

    pub fn zone_count(&self) -> usize {
        self.positions.len()
    }

    pub fn midpoint(&self) -> DVec2 {
        self.bounding_box / 2.0
    }

    pub fn angle_of(&self, zone: usize) -> f64 {
        let d = self.midpoint() - self.positions[zone];
        d.y.atan2(d.x)
    }

    pub fn angular_partition(&self, meter: u32) -> BeatPartition {
        let Some(bounds) = boundary_angles(meter) else {
            return BeatPartition::default();
        };

        let mut groups = vec![Vec::new(); bounds.len()];
        for zone in 0..self.zone_count() {
            let angle = self.angle_of(zone);
            if let Some(j) = bounds.iter().position(|b| angle <= *b) {
                groups[j].push(zone);
            }
        }
        BeatPartition { groups }
    }

    /// Distance to the midpoint, 0 at the center and 1 at a corner.
    pub fn radial_distance(&self, zone: usize) -> f64 {
        let mid = self.midpoint();
        let max_dist = mid.length();
        if max_dist <= 0.0 {
            return 0.0;
        }
        (mid - self.positions[zone]).abs().length() / max_dist
    }

    pub fn radial_distances(&self) -> Vec<f64> {
        (0..self.zone_count()).map(|i| self.radial_distance(i)).collect()
    }

    /// Zone indices ordered left to right, top to bottom on ties.
    pub fn zones_by_x(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.zone_count()).collect();
        order.sort_by(|&l, &r| {
            let (lp, rp) = (self.positions[l], self.positions[r]);
            lp.x.total_cmp(&rp.x).then(lp.y.total_cmp(&rp.y))
        });
        order
    }

    pub fn zones_for_pitch(&self, pitch: PitchClass) -> Option<&[usize]> {
        self.key_bindings
            .as_ref()
            .and_then(|b| b.get(&pitch))
            .map(Vec::as_slice)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A `cols` x `rows` grid of zones one unit apart, centered in its box.
    pub(crate) fn grid(cols: usize, rows: usize) -> DeviceGeometry {
        let mut positions = Vec::new();
        for row in 0..rows {
            for col in 0..cols {
                positions.push(DVec2::new(col as f64 + 0.5, row as f64 + 0.5));
            }
        }
        DeviceGeometry::new(positions, DVec2::new(cols as f64, rows as f64))
    }

    #[test]
    fn test_supported_meters_cover_every_zone_once() {
        let geo = grid(9, 5);
        for meter in 3..=7 {
            let partition = geo.angular_partition(meter);
            assert_eq!(partition.groups.len(), meter as usize);
            let mut seen = vec![0; geo.zone_count()];
            for group in &partition.groups {
                for &zone in group {
                    seen[zone] += 1;
                }
            }
            assert!(seen.iter().all(|&n| n == 1), "meter {}: {:?}", meter, seen);
        }
    }

    #[test]
    fn test_unsupported_meters_have_no_groups() {
        let geo = grid(4, 4);
        for meter in [0, 1, 2, 8, 9] {
            let partition = geo.angular_partition(meter);
            assert!(partition.groups.is_empty());
            assert!(partition.is_empty());
            assert!(partition.group(0).is_none());
        }
    }

    #[test]
    fn test_meter_three_uses_literal_table() {
        assert_eq!(boundary_angles(3), Some(&[-PI / 3.0, PI / 3.0, PI][..]));

        // Zone left of center: midpoint - zone points along +x, angle 0.
        let geo = DeviceGeometry::new(
            vec![DVec2::new(0.0, 1.0), DVec2::new(2.0, 1.0), DVec2::new(1.0, 0.0)],
            DVec2::new(2.0, 2.0),
        );
        let p = geo.angular_partition(3);
        assert_eq!(p.groups[1], vec![0]); // angle 0 in (-π/3, π/3]
        assert_eq!(p.groups[2], vec![1, 2]); // angles π and π/2
        assert!(p.groups[0].is_empty());
    }

    #[test]
    fn test_meter_four_quadrants() {
        let geo = DeviceGeometry::new(
            vec![
                DVec2::new(1.0, 2.0), // below mid: angle -π/2
                DVec2::new(0.0, 1.0), // left: 0
                DVec2::new(1.0, 0.0), // above: π/2
                DVec2::new(2.0, 1.0), // right: π
            ],
            DVec2::new(2.0, 2.0),
        );
        let p = geo.angular_partition(4);
        assert_eq!(p.groups, vec![vec![0], vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn test_radial_distance_is_normalized() {
        let geo = DeviceGeometry::new(
            vec![DVec2::new(2.0, 1.0), DVec2::new(0.0, 0.0), DVec2::new(4.0, 2.0), DVec2::new(3.0, 1.0)],
            DVec2::new(4.0, 2.0),
        );
        assert_eq!(geo.radial_distance(0), 0.0);
        assert!((geo.radial_distance(1) - 1.0).abs() < 1e-12);
        assert!((geo.radial_distance(2) - 1.0).abs() < 1e-12);
        assert!((geo.radial_distance(3) - 1.0 / 5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_zones_by_x_breaks_ties_on_y() {
        let geo = DeviceGeometry::new(
            vec![DVec2::new(2.0, 0.0), DVec2::new(1.0, 1.0), DVec2::new(1.0, 0.0)],
            DVec2::new(3.0, 1.0),
        );
        assert_eq!(geo.zones_by_x(), vec![2, 1, 0]);
    }
}
