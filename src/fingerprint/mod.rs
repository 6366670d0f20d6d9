//! Fingerprint generation
//!
//! Pairs each spectral peak (the anchor) with the next few peaks after it
//! (the targets) and packs every pair into a 32-bit address mapped to the
//! anchor's timestamp. The mapping is tagged with an opaque value so the
//! same pipeline serves both ingest (tagged with the song) and query
//! (tagged with a unit placeholder the matcher never reads).

pub mod hash;
pub mod peaks;

pub use hash::{pack_address, unpack_address};
pub use peaks::{extract_peaks, Peak};

use crate::dsp;
use std::collections::HashMap;

/// Number of following peaks paired with each anchor
pub const TARGET_ZONE_SIZE: usize = 5;

/// Value stored per address: the anchor timestamp and an opaque tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Couple<T = ()> {
    pub anchor_time_ms: u32,
    pub tag: T,
}

/// Build the address map for a peak list.
///
/// Each anchor at index `i` pairs with the peaks at indices `i+1 ..= i+Z`.
/// The pair delta is truncated to whole milliseconds and masked to the
/// 14-bit field of the address. Within one batch, a repeated address
/// overwrites the previous entry; only the last anchor time survives, a
/// loss the time-coherence scorer tolerates.
pub fn fingerprints<T: Copy>(
    peaks: &[Peak],
    sample_rate: u32,
    tag: T,
) -> HashMap<u32, Couple<T>> {
    let mut map = HashMap::new();

    for (i, anchor) in peaks.iter().enumerate() {
        let anchor_time = dsp::frame_time(anchor.frame_index, sample_rate);

        for target in peaks.iter().skip(i + 1).take(TARGET_ZONE_SIZE) {
            let target_time = dsp::frame_time(target.frame_index, sample_rate);
            let delta_ms = ((target_time - anchor_time) * 1000.0) as u32;
            let address = hash::pack_address(anchor.freq_bin as u32, target.freq_bin as u32, delta_ms);

            map.insert(
                address,
                Couple {
                    anchor_time_ms: (anchor_time * 1000.0) as u32,
                    tag,
                },
            );
        }
    }

    map
}
