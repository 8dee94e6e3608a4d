//! Rule-based risk flags for a run.
//!
//! Rules are evaluated in a fixed order and each may fire independently;
//! flags are returned in evaluation order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// High/critical incident count above which the volume flag is HIGH.
pub const HIGH_SEVERITY_VOLUME_THRESHOLD: usize = 20;

/// Incidents per hour above which the rate flag fires.
pub const INCIDENT_RATE_THRESHOLD: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Elevated,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Elevated => "ELEVATED",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which rule raised a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskKind {
    UnblockedDetections,
    HighSeverityVolume,
    IncidentRate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFlag {
    pub level: RiskLevel,
    pub kind: RiskKind,
    pub message: String,
}

/// Applies the risk rules.
///
/// `window_hours <= 0` disables the rate rule.
pub fn assess(
    total_detected_not_blocked: u64,
    high_critical_count: usize,
    incident_count: usize,
    window_hours: f64,
) -> Vec<RiskFlag> {
    let mut flags = Vec::new();

    if total_detected_not_blocked > 0 {
        flags.push(RiskFlag {
            level: RiskLevel::Critical,
            kind: RiskKind::UnblockedDetections,
            message: format!(
                "{} alerts detected but NOT blocked - investigate immediately",
                total_detected_not_blocked
            ),
        });
    }

    if high_critical_count > HIGH_SEVERITY_VOLUME_THRESHOLD {
        flags.push(RiskFlag {
            level: RiskLevel::High,
            kind: RiskKind::HighSeverityVolume,
            message: format!(
                "{} high/critical incidents - review and triage needed",
                high_critical_count
            ),
        });
    } else if high_critical_count > 0 {
        flags.push(RiskFlag {
            level: RiskLevel::Elevated,
            kind: RiskKind::HighSeverityVolume,
            message: format!("{} high/critical incidents present", high_critical_count),
        });
    }

    if window_hours > 0.0 {
        let rate = incident_count as f64 / window_hours;
        if rate > INCIDENT_RATE_THRESHOLD {
            flags.push(RiskFlag {
                level: RiskLevel::High,
                kind: RiskKind::IncidentRate,
                message: format!(
                    "Incident rate ({:.1}/hr) is elevated - possible active campaign",
                    rate
                ),
            });
        }
    }

    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(flags: &[RiskFlag]) -> Vec<(RiskLevel, RiskKind)> {
        flags.iter().map(|f| (f.level, f.kind)).collect()
    }

    #[test]
    fn test_rate_uses_incidents_per_hour() {
        let flags = assess(3, 25, 60, 24.0);
        assert_eq!(
            kinds(&flags),
            vec![
                (RiskLevel::Critical, RiskKind::UnblockedDetections),
                (RiskLevel::High, RiskKind::HighSeverityVolume),
            ]
        );
        assert!(flags[0].message.starts_with("3 alerts"));
    }

    #[test]
    fn test_all_rules_fire_in_order() {
        let flags = assess(1, 21, 1_300, 24.0);
        assert_eq!(
            kinds(&flags),
            vec![
                (RiskLevel::Critical, RiskKind::UnblockedDetections),
                (RiskLevel::High, RiskKind::HighSeverityVolume),
                (RiskLevel::High, RiskKind::IncidentRate),
            ]
        );
        assert!(flags[2].message.contains("54.2/hr"));
    }

    #[test]
    fn test_volume_thresholds() {
        assert_eq!(
            kinds(&assess(0, 20, 0, 24.0)),
            vec![(RiskLevel::Elevated, RiskKind::HighSeverityVolume)]
        );
        assert_eq!(
            kinds(&assess(0, 1, 0, 24.0)),
            vec![(RiskLevel::Elevated, RiskKind::HighSeverityVolume)]
        );
        assert!(assess(0, 0, 10, 24.0).is_empty());
    }

    #[test]
    fn test_rate_threshold_is_strict() {
        assert!(assess(0, 0, 50, 1.0).is_empty());
        assert_eq!(
            kinds(&assess(0, 0, 51, 1.0)),
            vec![(RiskLevel::High, RiskKind::IncidentRate)]
        );
    }

    #[test]
    fn test_zero_window_skips_rate_rule() {
        assert!(assess(0, 0, 1_000, 0.0).is_empty());
    }

    #[test]
    fn test_level_serializes_uppercase() {
        let json = serde_json::to_string(&RiskLevel::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
    }
}
