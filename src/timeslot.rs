/// Parse time string in HH:MM format or named time (morning, noon, etc.)
/// Accepts flexible formats:
/// - Named times: "morning", "noon", "evening", etc.
/// - HH:MM format: "08:00", "8:00", "8:5" (with or without leading zeros)
/// - Hour only: "8", "08" (defaults to :00)
pub fn parse_time(time_str: &str) -> Option<(u32, u32)> {
    let trimmed = time_str.trim();

    // First, try to parse named times (case-insensitive)
    let time_lower = trimmed.to_lowercase();
    let named_time = match time_lower.as_str() {
        "morning" | "breakfast" => Some((8, 0)),
        "midmorning" | "mid-morning" => Some((10, 0)),
        "noon" | "midday" | "lunch" => Some((12, 0)),
        "afternoon" => Some((15, 0)),
        "evening" | "dinner" => Some((18, 0)),
        "night" | "bedtime" => Some((21, 0)),
        "midnight" => Some((0, 0)),
        _ => None,
    };

    if let Some(time) = named_time {
        return Some(time);
    }

    // Try to parse HH:MM format (or just H:MM, HH:M, H:M)
    if trimmed.contains(':') {
        let parts: Vec<&str> = trimmed.split(':').collect();
        if parts.len() != 2 {
            return None;
        }

        let hour = parts[0].trim().parse::<u32>().ok()?;
        let minute = parts[1].trim().parse::<u32>().ok()?;

        if hour >= 24 || minute >= 60 {
            return None;
        }

        return Some((hour, minute));
    }

    // Try to parse as just an hour (e.g., "8" means "08:00")
    if let Ok(hour) = trimmed.parse::<u32>() {
        if hour >= 24 {
            return None;
        }
        return Some((hour, 0));
    }

    None
}

/// Resolve the dose slots of one day into minute offsets from midnight.
///
/// With an anchor time, slot 0 sits exactly on the anchor and the remaining
/// slots are spaced `24 / doses_per_day` hours apart. The spacing is kept as
/// fractional minutes (5 doses/day is 4.8h apart) so uneven counts don't
/// drift. An offset can pass 24h, in which case the dose lands on the
/// following calendar day.
///
/// Without an anchor, slots spread from midnight at `floor(i * 24 / doses)`
/// whole hours. The truncation clusters slots at high counts but is kept for
/// compatibility with how existing schedules were displayed.
pub fn slot_offsets(anchor: Option<(u32, u32)>, doses_per_day: u32) -> Vec<f64> {
    let doses = doses_per_day.max(1);

    match anchor {
        Some((hour, minute)) => {
            let base = f64::from(hour * 60 + minute);
            let interval_minutes = 24.0 * 60.0 / f64::from(doses);
            (0..doses)
                .map(|i| base + f64::from(i) * interval_minutes)
                .collect()
        }
        None => (0..doses)
            .map(|i| f64::from((i * 24 / doses) * 60))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_named() {
        assert_eq!(parse_time("morning"), Some((8, 0)));
        assert_eq!(parse_time("MORNING"), Some((8, 0)));
        assert_eq!(parse_time("noon"), Some((12, 0)));
        assert_eq!(parse_time("evening"), Some((18, 0)));
        assert_eq!(parse_time("bedtime"), Some((21, 0)));
        assert_eq!(parse_time("midnight"), Some((0, 0)));
        assert_eq!(parse_time("mid-morning"), Some((10, 0)));
    }

    #[test]
    fn test_parse_time_hhmm_format() {
        assert_eq!(parse_time("08:00"), Some((8, 0)));
        assert_eq!(parse_time("8:00"), Some((8, 0)));
        assert_eq!(parse_time("8:5"), Some((8, 5)));
        assert_eq!(parse_time("14:30"), Some((14, 30)));
        assert_eq!(parse_time("23:59"), Some((23, 59)));
        assert_eq!(parse_time(" 8:00 "), Some((8, 0)));
    }

    #[test]
    fn test_parse_time_hour_only() {
        assert_eq!(parse_time("8"), Some((8, 0)));
        assert_eq!(parse_time("0"), Some((0, 0)));
        assert_eq!(parse_time("23"), Some((23, 0)));
    }

    #[test]
    fn test_parse_time_invalid() {
        assert_eq!(parse_time("24:00"), None);
        assert_eq!(parse_time("8:60"), None);
        assert_eq!(parse_time("8:30:00"), None);
        assert_eq!(parse_time("garbage"), None);
        assert_eq!(parse_time(""), None);
        assert_eq!(parse_time(":30"), None);
        assert_eq!(parse_time("8:"), None);
    }

    #[test]
    fn test_slots_single_anchored() {
        assert_eq!(slot_offsets(Some((8, 30)), 1), vec![510.0]);
    }

    #[test]
    fn test_slots_anchored_even_spacing() {
        // 08:00 anchor, twice daily -> 08:00 and 20:00
        assert_eq!(slot_offsets(Some((8, 0)), 2), vec![480.0, 1200.0]);
        // 08:00 anchor, three times daily -> 08:00, 16:00, 24:00 (rolls over)
        assert_eq!(slot_offsets(Some((8, 0)), 3), vec![480.0, 960.0, 1440.0]);
    }

    #[test]
    fn test_slots_anchored_fractional_spacing() {
        // 5 doses/day is 4.8h = 288min apart, no truncation
        let slots = slot_offsets(Some((6, 0)), 5);
        assert_eq!(slots, vec![360.0, 648.0, 936.0, 1224.0, 1512.0]);
    }

    #[test]
    fn test_slots_unanchored() {
        assert_eq!(slot_offsets(None, 1), vec![0.0]);
        // hours 0, 8, 16
        assert_eq!(slot_offsets(None, 3), vec![0.0, 480.0, 960.0]);
        // floor(i * 24 / 5) -> hours 0, 4, 9, 14, 19
        assert_eq!(
            slot_offsets(None, 5),
            vec![0.0, 240.0, 540.0, 840.0, 1140.0]
        );
    }

    #[test]
    fn test_slots_zero_doses_clamped() {
        assert_eq!(slot_offsets(None, 0), vec![0.0]);
    }
}
