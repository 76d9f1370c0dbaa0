/// Daily administration slots used by the billing requisition, in shift order.
pub const SCHEDULE_TIMES: [&str; 8] = [
    "06:00", "09:00", "12:00", "15:00", "18:00", "21:00", "00:00", "03:00",
];

/// Position of `time` in the daily schedule; unknown slots sort last.
pub fn schedule_position(time: &str) -> usize {
    SCHEDULE_TIMES
        .iter()
        .position(|slot| *slot == time)
        .unwrap_or(SCHEDULE_TIMES.len())
}

/// Orders times by the daily schedule, falling back to text order for
/// slots outside the vocabulary.
pub fn sort_by_schedule(times: &mut [String]) {
    times.sort_by(|a, b| {
        schedule_position(a)
            .cmp(&schedule_position(b))
            .then_with(|| a.cmp(b))
    });
}

/// Accepts `HH:MM` with a valid hour and minute.
pub fn is_valid_time(time: &str) -> bool {
    let Some((h, m)) = time.split_once(':') else {
        return false;
    };
    let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
    if !two_digits(h) || !two_digits(m) {
        return false;
    }
    matches!((h.parse::<u8>(), m.parse::<u8>()), (Ok(h), Ok(m)) if h < 24 && m < 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_night_slots_follow_evening() {
        let mut times = vec![
            "03:00".to_string(),
            "21:00".to_string(),
            "00:00".to_string(),
            "06:00".to_string(),
        ];
        sort_by_schedule(&mut times);
        assert_eq!(times, vec!["06:00", "21:00", "00:00", "03:00"]);
    }

    #[test]
    fn test_time_validation() {
        assert!(is_valid_time("06:00"));
        assert!(is_valid_time("23:59"));
        assert!(!is_valid_time("24:00"));
        assert!(!is_valid_time("6:00"));
        assert!(!is_valid_time("3h"));
        assert!(!is_valid_time("+1:00"));
        assert!(!is_valid_time("12:+5"));
    }
}
