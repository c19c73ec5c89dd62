//! Ad break position classification

use serde::{Deserialize, Serialize};

/// Where an ad break sits on the content timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdPosition {
    Preroll,
    Midroll,
    Postroll,
}

impl AdPosition {
    /// Classify an ad break from its schedule time and the content duration.
    ///
    /// Both boundaries are inclusive: a break scheduled at exactly `0` is a
    /// pre-roll and one scheduled at exactly `duration` is a post-roll.
    pub fn classify(schedule_time: f64, duration: f64) -> Self {
        if schedule_time <= 0.0 {
            AdPosition::Preroll
        } else if schedule_time >= duration {
            AdPosition::Postroll
        } else {
            AdPosition::Midroll
        }
    }

    /// Pod position label used in ad break custom events
    pub fn pod_label(&self) -> &'static str {
        match self {
            AdPosition::Preroll => "Pre-roll",
            AdPosition::Midroll => "Mid-roll",
            AdPosition::Postroll => "Post-roll",
        }
    }
}

impl std::fmt::Display for AdPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdPosition::Preroll => write!(f, "PREROLL"),
            AdPosition::Midroll => write!(f, "MIDROLL"),
            AdPosition::Postroll => write!(f, "POSTROLL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries() {
        assert_eq!(AdPosition::classify(0.0, 120.0), AdPosition::Preroll);
        assert_eq!(AdPosition::classify(120.0, 120.0), AdPosition::Postroll);
        assert_eq!(AdPosition::classify(0.001, 120.0), AdPosition::Midroll);
        assert_eq!(AdPosition::classify(119.999, 120.0), AdPosition::Midroll);
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(AdPosition::classify(-5.0, 120.0), AdPosition::Preroll);
        assert_eq!(AdPosition::classify(f64::INFINITY, 120.0), AdPosition::Postroll);
        assert_eq!(AdPosition::classify(500.0, 120.0), AdPosition::Postroll);
    }

    #[test]
    fn test_live_content() {
        // Live streams report an infinite duration, so only a zero schedule is pre-roll
        assert_eq!(AdPosition::classify(30.0, f64::INFINITY), AdPosition::Midroll);
        assert_eq!(AdPosition::classify(0.0, f64::INFINITY), AdPosition::Preroll);
    }

    #[test]
    fn test_nan_schedule_is_midroll() {
        assert_eq!(AdPosition::classify(f64::NAN, 120.0), AdPosition::Midroll);
    }

    #[test]
    fn test_midroll_law() {
        let duration = 600.0;
        for t in [1.0, 42.5, 300.0, 599.0] {
            assert_eq!(AdPosition::classify(t, duration), AdPosition::Midroll);
        }
    }
}
