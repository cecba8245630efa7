// Frame-accurate rational time values for FCPXML.

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Whole frames elapsed at `ms` milliseconds, rounded down.
pub fn frame_at(ms: u64, fps: u32) -> u64 {
    ms.saturating_mul(fps as u64) / 1000
}

/// `frame / fps` seconds as a reduced fraction.
pub fn frames_to_fraction(frame: u64, fps: u32) -> String {
    let fps = (fps as u64).max(1);
    if frame == 0 {
        return "0/1s".to_string();
    }
    let divisor = gcd(frame, fps);
    format!("{}/{}s", frame / divisor, fps / divisor)
}

/// Snaps a millisecond time to its frame and renders it as `"<num>/<den>s"`.
pub fn fraction_time(ms: u64, fps: u32) -> String {
    frames_to_fraction(frame_at(ms, fps), fps)
}

/// Duration of one frame, `1/fps` seconds.
pub fn frame_duration(fps: u32) -> String {
    frames_to_fraction(1, fps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_time() {
        assert_eq!(fraction_time(0, 30), "0/1s");
        assert_eq!(fraction_time(1000, 30), "1/1s");
        assert_eq!(fraction_time(1500, 30), "3/2s");
        // 33 ms is still inside frame 0
        assert_eq!(fraction_time(33, 30), "0/1s");
        assert_eq!(fraction_time(34, 30), "1/30s");
        assert_eq!(fraction_time(90_123, 25), "2253/25s");
    }

    #[test]
    fn test_frame_duration() {
        assert_eq!(frame_duration(30), "1/30s");
        assert_eq!(frame_duration(24), "1/24s");
    }

    #[test]
    fn test_frame_at_is_exact() {
        assert_eq!(frame_at(1000, 30), 30);
        assert_eq!(frame_at(2000, 60), 120);
        assert_eq!(frame_at(999, 30), 29);
    }
}
