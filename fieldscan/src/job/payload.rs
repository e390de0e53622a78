//! Analysis payloads carried by job records.

use crate::geo::BoundingBox;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// An inclusive date range for imagery queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First day of the window.
    pub start: NaiveDate,
    /// Last day of the window.
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a range, requiring `start <= end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        if start <= end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// Returns true when `start <= end`.
    pub fn is_ordered(&self) -> bool {
        self.start <= self.end
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Options shared by every job in a submission.
///
/// These are passed through to the analysis provider unchanged; the queue
/// core does not interpret them beyond equality.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// Maximum acceptable cloud cover fraction (0.0 - 1.0) for scene
    /// selection, if the provider supports filtering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cloud_cover: Option<f64>,

    /// Requested ground resolution in meters per pixel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_m: Option<u32>,
}

/// The work description for one analysis job.
///
/// Single-field submissions carry a `target_date` only; batch children also
/// carry the batch's imagery `window`, with `target_date` set to the window's
/// last day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    /// Identifier of the monitored field.
    pub field_id: String,

    /// Area of interest for imagery retrieval.
    pub bounding_box: BoundingBox,

    /// The day the analysis should target.
    pub target_date: NaiveDate,

    /// Imagery search window for batch children.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<DateRange>,

    /// Provider options shared across the submission.
    pub options: AnalysisOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_range_ordered() {
        let range = DateRange::new(date(2025, 6, 1), date(2025, 6, 30));
        assert!(range.is_some());
        assert!(range.unwrap().is_ordered());
    }

    #[test]
    fn test_date_range_single_day() {
        let day = date(2025, 6, 15);
        assert!(DateRange::new(day, day).is_some());
    }

    #[test]
    fn test_date_range_inverted() {
        assert!(DateRange::new(date(2025, 6, 30), date(2025, 6, 1)).is_none());
    }

    #[test]
    fn test_date_range_display() {
        let range = DateRange::new(date(2025, 6, 1), date(2025, 6, 30)).unwrap();
        assert_eq!(format!("{}", range), "2025-06-01..2025-06-30");
    }

    #[test]
    fn test_options_default() {
        let options = AnalysisOptions::default();
        assert!(options.max_cloud_cover.is_none());
        assert!(options.resolution_m.is_none());
    }
}
