//! Persona model, weekly schedules and intensity profiles.

use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

/// A configured synthetic identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub interests: Vec<String>,
    pub schedule: Schedule,
    #[serde(default)]
    pub intensity: Intensity,
    /// Mirrors whether the runner currently holds a session for this persona.
    #[serde(default)]
    pub is_active: bool,
}

/// Weekly activity window: `[start, end)` on each listed day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
    pub days: Vec<Weekday>,
}

impl Schedule {
    /// Whether `now` falls inside the window.
    ///
    /// Comparison is at minute resolution, so 16:59:59 is inside a window
    /// ending at 17:00 and 17:00:30 is not. A window whose end is not after
    /// its start never matches.
    pub fn is_active_at(&self, now: NaiveDateTime) -> bool {
        if !self.days.contains(&now.weekday()) {
            return false;
        }
        let Some(minute) = NaiveTime::from_hms_opt(now.hour(), now.minute(), 0) else {
            return false;
        };
        self.start <= minute && minute < self.end
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default(),
            days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
        }
    }
}

/// `HH:MM` (de)serialization for schedule bounds.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time(&raw).map_err(serde::de::Error::custom)
    }
}

/// Parse `HH:MM` (or `HH:MM:SS`).
pub fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|e| format!("invalid time '{raw}': {e}"))
}

/// How hard a persona browses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Low,
    #[default]
    Medium,
    High,
}

/// Inclusive millisecond range for a randomized wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }
}

/// Pacing parameters derived from an [`Intensity`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityProfile {
    /// Wait between targets in a batch.
    pub delay: DelayRange,
    /// Pause between scroll steps while reading.
    pub scroll_pause: DelayRange,
    /// Per-step probability of abandoning a page.
    pub stop_chance: f64,
    /// Fallback batch size.
    pub batch_size: usize,
    /// Probability of following one in-domain link after reading.
    pub link_follow_chance: f64,
}

impl IntensityProfile {
    /// Pause between batches: roughly 2x to 3x the per-target delay.
    pub fn breathing_room(&self) -> DelayRange {
        DelayRange::new(self.delay.min_ms * 2, self.delay.max_ms * 3)
    }
}

const LOW: IntensityProfile = IntensityProfile {
    delay: DelayRange::new(8_000, 15_000),
    scroll_pause: DelayRange::new(800, 2_000),
    stop_chance: 0.4,
    batch_size: 3,
    link_follow_chance: 0.2,
};

const MEDIUM: IntensityProfile = IntensityProfile {
    delay: DelayRange::new(2_000, 7_000),
    scroll_pause: DelayRange::new(500, 1_500),
    stop_chance: 0.2,
    batch_size: 5,
    link_follow_chance: 0.5,
};

const HIGH: IntensityProfile = IntensityProfile {
    delay: DelayRange::new(500, 2_000),
    scroll_pause: DelayRange::new(200, 600),
    stop_chance: 0.1,
    batch_size: 8,
    link_follow_chance: 0.8,
};

impl Intensity {
    pub fn profile(self) -> IntensityProfile {
        match self {
            Intensity::Low => LOW,
            Intensity::Medium => MEDIUM,
            Intensity::High => HIGH,
        }
    }
}

impl std::fmt::Display for Intensity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Intensity::Low => "low",
            Intensity::Medium => "medium",
            Intensity::High => "high",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        // 2024-01-01 was a Monday.
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn monday_window() -> Schedule {
        Schedule {
            start: parse_time("09:00").unwrap(),
            end: parse_time("17:00").unwrap(),
            days: vec![Weekday::Mon],
        }
    }

    #[test]
    fn test_schedule_window_is_half_open() {
        let schedule = monday_window();
        assert!(schedule.is_active_at(at(1, 9, 0)));
        assert!(schedule.is_active_at(at(1, 16, 59)));
        assert!(!schedule.is_active_at(at(1, 17, 0)));
        assert!(!schedule.is_active_at(at(2, 9, 0)));
    }

    #[test]
    fn test_schedule_ignores_seconds() {
        let schedule = monday_window();
        let late = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(16, 59, 59)
            .unwrap();
        assert!(schedule.is_active_at(late));
    }

    #[test]
    fn test_schedule_serde_uses_short_names() {
        let json = serde_json::to_value(monday_window()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"start": "09:00", "end": "17:00", "days": ["Mon"]})
        );

        let parsed: Schedule = serde_json::from_value(
            serde_json::json!({"start": "08:30", "end": "12:00", "days": ["Sat", "Sun"]}),
        )
        .unwrap();
        assert_eq!(parsed.days, vec![Weekday::Sat, Weekday::Sun]);
        assert_eq!(parsed.start, parse_time("08:30").unwrap());
    }

    #[test]
    fn test_intensity_profiles() {
        assert_eq!(Intensity::Low.profile().batch_size, 3);
        assert_eq!(Intensity::Medium.profile().batch_size, 5);
        assert_eq!(Intensity::High.profile().batch_size, 8);
        assert_eq!(Intensity::High.profile().link_follow_chance, 0.8);
        assert_eq!(
            Intensity::Medium.profile().breathing_room(),
            DelayRange::new(4_000, 21_000)
        );
    }
}
