//! Attendance threshold bands shared by the charts and the text formatter.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Band {
    Good,
    Fair,
    Poor,
    Critical,
}

#[derive(Debug, Clone, Copy)]
pub struct BandSpec {
    pub min_percent: f64,
    pub band: Band,
    pub color: &'static str,
    pub marker: &'static str,
}

/// Ordered from the highest threshold down; the last entry catches everything.
pub static BANDS: [BandSpec; 4] = [
    BandSpec {
        min_percent: 80.0,
        band: Band::Good,
        color: "#4CAF50",
        marker: "🟢",
    },
    BandSpec {
        min_percent: 60.0,
        band: Band::Fair,
        color: "#FFC107",
        marker: "🟡",
    },
    BandSpec {
        min_percent: 40.0,
        band: Band::Poor,
        color: "#FF9800",
        marker: "🟠",
    },
    BandSpec {
        min_percent: f64::NEG_INFINITY,
        band: Band::Critical,
        color: "#F44336",
        marker: "🔴",
    },
];

/// Guide lines drawn on the percentage charts.
pub fn guide_percents() -> [f64; 2] {
    [BANDS[0].min_percent, BANDS[1].min_percent]
}

pub fn band_spec(percent: f64) -> &'static BandSpec {
    BANDS
        .iter()
        .find(|b| percent >= b.min_percent)
        .unwrap_or(&BANDS[BANDS.len() - 1])
}

pub fn band_for(percent: f64) -> Band {
    band_spec(percent).band
}

pub fn color_for(percent: f64) -> &'static str {
    band_spec(percent).color
}

pub fn format_percentage(percent: f64) -> String {
    format!("{} {:.0}%", band_spec(percent).marker, percent.round_ties_even())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_inclusive_lower_bounds() {
        assert_eq!(band_for(100.0), Band::Good);
        assert_eq!(band_for(80.0), Band::Good);
        assert_eq!(band_for(79.9), Band::Fair);
        assert_eq!(band_for(60.0), Band::Fair);
        assert_eq!(band_for(40.0), Band::Poor);
        assert_eq!(band_for(39.9), Band::Critical);
        assert_eq!(band_for(0.0), Band::Critical);
    }

    #[test]
    fn colors_and_text_come_from_the_same_table() {
        assert_eq!(color_for(66.7), "#FFC107");
        assert_eq!(format_percentage(66.7), "🟡 67%");
        assert_eq!(format_percentage(33.3), "🔴 33%");
        assert_eq!(format_percentage(62.5), "🟡 62%");
        assert_eq!(format_percentage(87.5), "🟢 88%");
        assert_eq!(guide_percents(), [80.0, 60.0]);
    }
}
