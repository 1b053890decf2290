use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::aggregate::OverlapRegion;
use super::{Incident, Priority};

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    fn weight(self) -> f64 {
        match self {
            Self::Low => 1.0,
            Self::Medium => 2.0,
            Self::High => 3.0,
            Self::Critical => 4.0,
        }
    }
}

/// Thresholds and weights used to score overlap regions.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskPolicy {
    /// Regions with at least this many incidents are CRITICAL.
    pub critical_incident_count: usize,
    /// Regions with at least this many incidents are HIGH.
    pub high_incident_count: usize,
    pub weight_participation: f64,
    pub weight_severity: f64,
    pub weight_area: f64,
    /// Severity points at which the severity term reaches ~63%.
    pub severity_scale: f64,
    /// Overlap area at which the area term reaches ~63%.
    pub area_scale_km2: f64,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            critical_incident_count: 4,
            high_incident_count: 3,
            weight_participation: 0.3,
            weight_severity: 0.4,
            weight_area: 0.3,
            severity_scale: 8.0,
            area_scale_km2: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoredRegion {
    pub region: OverlapRegion,
    pub level: RiskLevel,
    pub max_priority: Priority,
    /// Days between the earliest and latest contributing report.
    pub span_days: i64,
}

pub fn classify(incident_count: usize, max_priority: Priority, policy: &RiskPolicy) -> RiskLevel {
    if incident_count >= policy.critical_incident_count || max_priority == Priority::Critical {
        RiskLevel::Critical
    } else if incident_count >= policy.high_incident_count || max_priority == Priority::High {
        RiskLevel::High
    } else if max_priority == Priority::Medium {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Assigns a level to each region and orders them most severe first.
pub fn score_regions(
    regions: Vec<OverlapRegion>,
    incidents: &[Incident],
    policy: &RiskPolicy,
) -> Vec<ScoredRegion> {
    let mut scored: Vec<ScoredRegion> = regions
        .into_iter()
        .map(|region| {
            let contributors = || region.members.iter().map(|&m| &incidents[m]);
            let max_priority = contributors().map(|i| i.priority).max().unwrap_or(Priority::Low);
            let (first, last) = contributors()
                .map(|i| i.created_at)
                .minmax()
                .into_option()
                .unwrap_or((0, 0));
            let level = classify(region.members.len(), max_priority, policy);

            ScoredRegion {
                level,
                max_priority,
                span_days: (last - first) / SECONDS_PER_DAY,
                region,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.level
            .cmp(&a.level)
            .then(b.region.members.len().cmp(&a.region.members.len()))
            .then(b.region.area_km2.total_cmp(&a.region.area_km2))
            .then_with(|| a.region.members.cmp(&b.region.members))
    });
    scored
}

/// Weighted combination in `[0, 1]` of:
/// - the share of analysed incidents inside at least one region,
/// - the severity of those incidents, each counted once at the level of the
///   most severe region it belongs to,
/// - the ground covered by two or more incidents, `overlapped_km2`.
///
/// The last two terms saturate instead of being normalised by the input
/// size, so adding an overlapping incident can only raise the index.
pub fn composite_index(
    total_incidents: usize,
    scored: &[ScoredRegion],
    overlapped_km2: f64,
    policy: &RiskPolicy,
) -> f64 {
    let weight_total = policy.weight_participation + policy.weight_severity + policy.weight_area;
    if total_incidents == 0 || scored.is_empty() || weight_total <= 0.0 {
        return 0.0;
    }

    let mut exposure: BTreeMap<usize, RiskLevel> = BTreeMap::new();
    for s in scored {
        for &member in &s.region.members {
            exposure
                .entry(member)
                .and_modify(|level| *level = (*level).max(s.level))
                .or_insert(s.level);
        }
    }

    let participation = exposure.len() as f64 / total_incidents as f64;
    let severity = saturate(exposure.values().map(|l| l.weight()).sum(), policy.severity_scale);
    let area = saturate(overlapped_km2, policy.area_scale_km2);

    let combined = policy.weight_participation * participation
        + policy.weight_severity * severity
        + policy.weight_area * area;
    (combined / weight_total).clamp(0.0, 1.0)
}

/// Overall 0-100 risk score.
pub fn overall_score(
    total_incidents: usize,
    scored: &[ScoredRegion],
    overlapped_km2: f64,
    policy: &RiskPolicy,
) -> u8 {
    (composite_index(total_incidents, scored, overlapped_km2, policy) * 100.0).round() as u8
}

#[inline]
fn saturate(value: f64, scale: f64) -> f64 {
    if scale <= 0.0 {
        return if value > 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - (-value / scale).exp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn incident(id: &str, priority: Priority, day: i64) -> Incident {
        Incident {
            id: id.to_string(),
            priority,
            created_at: day * SECONDS_PER_DAY,
            affected_area: None,
        }
    }

    fn region(members: Vec<usize>, area_km2: f64) -> OverlapRegion {
        OverlapRegion {
            members,
            polygon: polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)],
            area_km2,
        }
    }

    #[test]
    fn classification_policy() {
        let policy = RiskPolicy::default();
        assert_eq!(classify(2, Priority::Low, &policy), RiskLevel::Low);
        assert_eq!(classify(2, Priority::Medium, &policy), RiskLevel::Medium);
        assert_eq!(classify(2, Priority::High, &policy), RiskLevel::High);
        assert_eq!(classify(3, Priority::Low, &policy), RiskLevel::High);
        assert_eq!(classify(4, Priority::Low, &policy), RiskLevel::Critical);
        assert_eq!(classify(2, Priority::Critical, &policy), RiskLevel::Critical);
    }

    #[test]
    fn thresholds_are_configurable() {
        let policy = RiskPolicy {
            critical_incident_count: 3,
            ..RiskPolicy::default()
        };
        assert_eq!(classify(3, Priority::Low, &policy), RiskLevel::Critical);
    }

    #[test]
    fn no_regions_scores_zero() {
        assert_eq!(overall_score(5, &[], 0.0, &RiskPolicy::default()), 0);
        assert_eq!(overall_score(0, &[], 0.0, &RiskPolicy::default()), 0);
    }

    #[test]
    fn regions_sorted_by_severity_then_size() {
        let incidents = vec![
            incident("a", Priority::Low, 0),
            incident("b", Priority::Low, 3),
            incident("c", Priority::Critical, 10),
            incident("d", Priority::Low, 12),
        ];
        let scored = score_regions(
            vec![region(vec![0, 1], 5.0), region(vec![2, 3], 0.5)],
            &incidents,
            &RiskPolicy::default(),
        );

        assert_eq!(scored[0].region.members, vec![2, 3]);
        assert_eq!(scored[0].level, RiskLevel::Critical);
        assert_eq!(scored[0].max_priority, Priority::Critical);
        assert_eq!(scored[0].span_days, 2);
        assert_eq!(scored[1].level, RiskLevel::Low);
        assert_eq!(scored[1].span_days, 3);
    }

    #[test]
    fn adding_an_overlapping_incident_raises_index() {
        let policy = RiskPolicy::default();
        let two = vec![incident("a", Priority::Medium, 0), incident("b", Priority::Medium, 1)];
        let before = score_regions(vec![region(vec![0, 1], 0.4)], &two, &policy);

        let mut three = two.clone();
        three.push(incident("c", Priority::Low, 2));
        let after = score_regions(vec![region(vec![0, 1, 2], 0.5)], &three, &policy);

        let (lo, hi) = (
            composite_index(2, &before, 0.4, &policy),
            composite_index(3, &after, 0.5, &policy),
        );
        assert!(hi > lo, "{hi} <= {lo}");
        assert!(overall_score(3, &after, 0.5, &policy) >= overall_score(2, &before, 0.4, &policy));
    }

    #[test]
    fn unresolved_incidents_dilute_participation() {
        let policy = RiskPolicy::default();
        let incidents = vec![incident("a", Priority::Low, 0), incident("b", Priority::Low, 0)];
        let scored = score_regions(vec![region(vec![0, 1], 1.0)], &incidents, &policy);
        assert!(composite_index(3, &scored, 1.0, &policy) < composite_index(2, &scored, 1.0, &policy));
    }

    #[test]
    fn higher_severity_scores_higher() {
        let policy = RiskPolicy::default();
        let medium = vec![incident("a", Priority::Medium, 0), incident("b", Priority::Medium, 0)];
        let critical = vec![incident("a", Priority::Critical, 0), incident("b", Priority::Medium, 0)];

        let low_score = composite_index(2, &score_regions(vec![region(vec![0, 1], 1.0)], &medium, &policy), 1.0, &policy);
        let high_score = composite_index(2, &score_regions(vec![region(vec![0, 1], 1.0)], &critical, &policy), 1.0, &policy);
        assert!(high_score > low_score);
    }
}
