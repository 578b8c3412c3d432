use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds between 1904-01-01 and 1970-01-01.
const MP4_EPOCH_OFFSET: u64 = 2_082_844_800;

/// Converts `value` from one timescale to another, rounding down.
pub fn convert_timescale(value: u64, from_timescale: u32, to_timescale: u32) -> u64 {
    if from_timescale == 0 {
        return 0;
    }
    (u128::from(value) * u128::from(to_timescale) / u128::from(from_timescale)) as u64
}

pub fn mp4_timestamp_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
        + MP4_EPOCH_OFFSET
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_timescale() {
        assert_eq!(convert_timescale(5000, 24000, 1000), 208);
        assert_eq!(convert_timescale(24000, 24000, 1000), 1000);
        assert_eq!(convert_timescale(44100, 44100, 600), 600);
        assert_eq!(convert_timescale(10, 0, 1000), 0);
    }
}
