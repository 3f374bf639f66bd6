//! A light array made of addressable pixel strips driven over sACN (E1.31).

use crate::config::EngineConfig;
use crate::device::LampArray;
use crate::keys::Key;
use crate::model::{Color, NetworkConfig, PixelStrip};
use anyhow::{anyhow, Result};
use glam::DVec2;
use log::{debug, error, info, warn};
use sacn::source::SacnSource;
use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, SocketAddr};

const SOURCE_NAME: &str = "Lampsync";
const PRIORITY: u8 = 100;
const SACN_PORT: u16 = 5568;
const DMX_CHANNELS: usize = 512;

/// Where every zone of a strip layout sits, and which keys map onto it.
#[derive(Clone, Debug, PartialEq)]
pub struct StripLayout {
    /// (strip index, pixel index) for each zone, strips in config order.
    pub zones: Vec<(usize, usize)>,
    pub positions: Vec<DVec2>,
    pub bounding_box: DVec2,
    pub key_zones: HashMap<Key, Vec<usize>>,
}

impl StripLayout {
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut zones = Vec::new();
        let mut positions = Vec::new();
        for (s, strip) in config.strips.iter().enumerate() {
            for p in 0..strip.pixel_count {
                zones.push((s, p));
                positions.push(strip.pixel_position(p));
            }
        }

        let bounding_box = match config.bounding_box {
            Some([w, h]) => DVec2::new(w, h),
            None => positions
                .iter()
                .fold(DVec2::ZERO, |extent, pos| extent.max(*pos)),
        };

        let mut key_zones: HashMap<Key, Vec<usize>> = HashMap::new();
        for (key, pixels) in &config.key_zones {
            for &(strip_id, pixel) in pixels {
                let zone = zones.iter().position(|&(s, p)| {
                    config.strips[s].id == strip_id && p == pixel
                });
                match zone {
                    Some(zone) => key_zones.entry(*key).or_default().push(zone),
                    None => warn!(
                        "[SACN] Key {:?} bound to missing pixel {} of strip {}",
                        key, pixel, strip_id
                    ),
                }
            }
        }

        Self { zones, positions, bounding_box, key_zones }
    }
}

/// Coalesce strip pixel data into 512-channel DMX universes.
///
/// `universe_offset` shifts every strip's universe, clamped to the valid
/// sACN range. Pixels that would run past channel 512 are dropped.
pub fn pack_universes(
    strips: &[PixelStrip],
    pixels: &[Vec<[u8; 3]>],
    universe_offset: u16,
) -> HashMap<u16, Vec<u8>> {
    let mut universe_data: HashMap<u16, Vec<u8>> = HashMap::new();

    for (strip, data) in strips.iter().zip(pixels) {
        let u = strip.universe.saturating_add(universe_offset).clamp(1, 63999);
        let start = (strip.start_channel as usize).saturating_sub(1);
        let entry = universe_data.entry(u).or_insert_with(|| vec![0; DMX_CHANNELS]);

        for (i, pixel) in data.iter().enumerate() {
            let idx = start + i * 3;
            if idx + 2 >= entry.len() {
                break;
            }
            let ordered = match strip.color_order.as_str() {
                "GRB" => [pixel[1], pixel[0], pixel[2]],
                "BGR" => [pixel[2], pixel[1], pixel[0]],
                _ => *pixel,
            };
            entry[idx..idx + 3].copy_from_slice(&ordered);
        }
    }

    universe_data
}

/// Unicast target, `None` for multicast. Errors on an unparsable address.
fn destination(network: &NetworkConfig) -> Result<Option<SocketAddr>> {
    if network.use_multicast {
        return Ok(None);
    }
    let ip: IpAddr = network
        .unicast_ip
        .parse()
        .map_err(|e| anyhow!("Invalid unicast IP {:?}: {}", network.unicast_ip, e))?;
    Ok(Some(SocketAddr::new(ip, SACN_PORT)))
}

pub struct StripLampArray {
    name: String,
    strips: Vec<PixelStrip>,
    layout: StripLayout,
    pixels: Vec<Vec<[u8; 3]>>,
    universe_offset: u16,
    dst_ip: Option<SocketAddr>,
    sender: SacnSource,
    registered_universes: HashSet<u16>,
}

impl StripLampArray {
    pub fn new(name: impl Into<String>, config: &EngineConfig) -> Result<Self> {
        info!("[SACN] Initializing sACN (E1.31) network stack...");
        let dst_ip = destination(&config.network)?;

        let local_addr = SocketAddr::from(([0, 0, 0, 0], 0));
        debug!("[SACN] Binding to address: {}", local_addr);
        let sender = SacnSource::with_ip(SOURCE_NAME, local_addr)
            .map_err(|e| anyhow!("Failed to create sACN sender: {:?}", e))?;
        info!(
            "[SACN] Sender ready, {}",
            dst_ip.map_or("multicast".to_string(), |ip| format!("unicast to {}", ip))
        );

        let layout = StripLayout::from_config(config);
        let pixels = config.strips.iter().map(|s| vec![[0; 3]; s.pixel_count]).collect();

        Ok(Self {
            name: name.into(),
            strips: config.strips.clone(),
            layout,
            pixels,
            universe_offset: config.network.universe.saturating_sub(1),
            dst_ip,
            sender,
            registered_universes: HashSet::new(),
        })
    }

    fn flush(&mut self) {
        let universe_data = pack_universes(&self.strips, &self.pixels, self.universe_offset);

        for (u, data) in universe_data {
            if !self.registered_universes.contains(&u) {
                match self.sender.register_universe(u) {
                    Ok(_) => {
                        self.registered_universes.insert(u);
                        info!("[SACN] Registered sACN Universe {}", u);
                    }
                    Err(e) => {
                        error!("[SACN] Failed to register sACN Universe {}: {:?}", u, e);
                        continue;
                    }
                }
            }

            let mut with_start_code = Vec::with_capacity(data.len() + 1);
            with_start_code.push(0u8);
            with_start_code.extend_from_slice(&data);

            if let Err(e) = self.sender.send(&[u], &with_start_code, Some(PRIORITY), self.dst_ip, None) {
                warn!("[SACN] Send error on Universe {} (Dest: {:?}): {:?}", u, self.dst_ip, e);
            }
        }
    }
}

impl LampArray for StripLampArray {
    fn name(&self) -> &str {
        &self.name
    }

    fn zone_count(&self) -> usize {
        self.layout.zones.len()
    }

    fn zone_position(&self, index: usize) -> DVec2 {
        self.layout.positions.get(index).copied().unwrap_or(DVec2::ZERO)
    }

    fn bounding_box(&self) -> DVec2 {
        self.layout.bounding_box
    }

    fn supports_keyed_zones(&self) -> bool {
        !self.layout.key_zones.is_empty()
    }

    fn zones_for_key(&self, key: Key) -> Vec<usize> {
        self.layout.key_zones.get(&key).cloned().unwrap_or_default()
    }

    fn set_colors(&mut self, colors: &[Color], zones: &[usize]) {
        for (color, &zone) in colors.iter().zip(zones) {
            if let Some(&(s, p)) = self.layout.zones.get(zone) {
                self.pixels[s][p] = color.composited_on_black();
            }
        }
        self.flush();
    }

    fn set_color(&mut self, color: Color) {
        let rgb = color.composited_on_black();
        for strip in &mut self.pixels {
            strip.fill(rgb);
        }
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(id: u64, universe: u16, start_channel: u16, pixel_count: usize, order: &str) -> PixelStrip {
        PixelStrip {
            id,
            universe,
            start_channel,
            pixel_count,
            color_order: order.to_string(),
            ..PixelStrip::default()
        }
    }

    #[test]
    fn test_pack_color_orders() {
        let strips = vec![strip(1, 1, 1, 1, "RGB"), strip(2, 1, 4, 1, "GRB"), strip(3, 1, 7, 1, "BGR")];
        let pixels = vec![vec![[10, 20, 30]]; 3];
        let packed = pack_universes(&strips, &pixels, 0);
        assert_eq!(packed.len(), 1);
        assert_eq!(&packed[&1][..9], &[10, 20, 30, 20, 10, 30, 30, 20, 10]);
        assert_eq!(packed[&1].len(), 512);
    }

    #[test]
    fn test_pack_universe_offset_and_overflow() {
        // 171 pixels need 513 channels; the last one does not fit.
        let strips = vec![strip(1, 2, 1, 171, "RGB")];
        let pixels = vec![vec![[1, 2, 3]; 171]];
        let packed = pack_universes(&strips, &pixels, 4);
        let data = &packed[&6];
        assert_eq!(&data[507..510], &[1, 2, 3]);
        assert_eq!(&data[510..], &[0, 0]);
    }

    #[test]
    fn test_pack_clamps_universe() {
        let strips = vec![strip(1, 0, 1, 1, "RGB"), strip(2, 63999, 1, 1, "RGB")];
        let pixels = vec![vec![[1, 1, 1]], vec![[2, 2, 2]]];
        let packed = pack_universes(&strips, &pixels, 10);
        assert!(packed.contains_key(&10));
        assert!(packed.contains_key(&63999));
        let packed = pack_universes(&strips[..1], &pixels[..1], 0);
        assert!(packed.contains_key(&1));
    }

    #[test]
    fn test_layout_positions_and_extents() {
        let mut a = strip(1, 1, 1, 3, "RGB");
        a.spacing = 0.5;
        a.y = 1.0;
        let config = EngineConfig { strips: vec![a], ..EngineConfig::default() };
        let layout = StripLayout::from_config(&config);
        assert_eq!(layout.zones, vec![(0, 0), (0, 1), (0, 2)]);
        assert_eq!(layout.positions[2], DVec2::new(1.0, 1.0));
        assert_eq!(layout.bounding_box, DVec2::new(1.0, 1.0));

        let config = EngineConfig { bounding_box: Some([4.0, 2.0]), ..config };
        assert_eq!(StripLayout::from_config(&config).bounding_box, DVec2::new(4.0, 2.0));
    }

    #[test]
    fn test_layout_key_zones() {
        let mut config = EngineConfig {
            strips: vec![strip(7, 1, 1, 2, "RGB"), strip(9, 1, 7, 2, "RGB")],
            ..EngineConfig::default()
        };
        config.key_zones.insert(Key::Space, vec![(9, 1), (7, 0), (3, 3)]);
        let layout = StripLayout::from_config(&config);
        assert_eq!(layout.key_zones[&Key::Space], vec![3, 0]);
    }

    #[test]
    fn test_unicast_destination() {
        let mut network = NetworkConfig::default();
        assert_eq!(destination(&network).unwrap(), None);
        network.use_multicast = false;
        network.unicast_ip = "10.0.0.2".to_string();
        assert_eq!(
            destination(&network).unwrap(),
            Some(SocketAddr::from(([10, 0, 0, 2], SACN_PORT)))
        );
        network.unicast_ip = "not an ip".to_string();
        assert!(destination(&network).is_err());
    }
}
