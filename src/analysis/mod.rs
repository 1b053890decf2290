//! Repeat-disaster overlay analysis.
//!
//! The pipeline is strictly linear: resolve incidents, validate and project
//! their affected areas, aggregate overlaps, score, recommend. It is a pure
//! function of the incident snapshot handed in, so identical inputs always
//! produce identical output.

pub(crate) mod aggregate;
pub(crate) mod geometry;
pub(crate) mod recommend;
pub(crate) mod risk;

use std::collections::HashMap;
use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::models::responses::{AnalysisPayload, AnalysisWarning, OverlappingArea};
use geometry::{EqualAreaProjection, Footprint, GeometryError};
use risk::RiskPolicy;

const AREA_DECIMALS: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "CRITICAL" => Ok(Self::Critical),
            _ => Err(format!("unknown priority: {s}")),
        }
    }
}

/// Snapshot of a stored incident as the analysis needs it.
#[derive(Debug, Clone)]
pub struct Incident {
    pub id: String,
    pub priority: Priority,
    /// Report time, seconds since the Unix epoch.
    pub created_at: i64,
    /// Stored GeoJSON text, parsed lazily so bad geometry stays a per-incident problem.
    pub affected_area: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisPolicy {
    /// Upper bound on requested incident IDs.
    pub max_incidents: usize,
    pub repeat_window_days: i64,
    pub risk: RiskPolicy,
}

impl Default for AnalysisPolicy {
    fn default() -> Self {
        Self {
            max_incidents: 200,
            repeat_window_days: 30,
            risk: RiskPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("at least 2 distinct, resolvable incident IDs are required (got {resolvable})")]
    InsufficientInput { resolvable: usize },
    #[error("{requested} incident IDs requested, at most {max} may be analysed at once")]
    TooManyIncidents { requested: usize, max: usize },
}

/// Trimmed, non-empty IDs in first-seen order without duplicates.
pub fn distinct_ids(ids: &[String]) -> Vec<String> {
    ids.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .unique()
        .map(str::to_string)
        .collect()
}

/// Runs the overlay analysis for `requested` over the `incidents` snapshot.
///
/// IDs missing from the snapshot, incidents without an affected area and
/// incidents whose polygon is unusable are reported as warnings; they still
/// fail the request when fewer than two requested IDs resolve.
pub fn analyze_overlay(
    requested: &[String],
    incidents: Vec<Incident>,
    policy: &AnalysisPolicy,
) -> Result<AnalysisPayload, AnalysisError> {
    if requested.len() > policy.max_incidents {
        return Err(AnalysisError::TooManyIncidents {
            requested: requested.len(),
            max: policy.max_incidents,
        });
    }
    let requested = distinct_ids(requested);
    if requested.len() < 2 {
        return Err(AnalysisError::InsufficientInput {
            resolvable: requested.len(),
        });
    }

    let mut by_id: HashMap<String, Incident> =
        incidents.into_iter().map(|i| (i.id.clone(), i)).collect();
    let mut warnings = Vec::new();
    let mut resolved = Vec::with_capacity(requested.len());
    for id in &requested {
        match by_id.remove(id) {
            Some(incident) => resolved.push(incident),
            None => {
                log::warn!("Overlay analysis: incident {id} not found, skipping");
                warnings.push(AnalysisWarning::new(id, "NOT_FOUND", "incident not found"));
            }
        }
    }
    if resolved.len() < 2 {
        return Err(AnalysisError::InsufficientInput {
            resolvable: resolved.len(),
        });
    }

    let mut shapes = Vec::with_capacity(resolved.len());
    for (index, incident) in resolved.iter().enumerate() {
        let Some(text) = incident.affected_area.as_deref() else {
            warnings.push(AnalysisWarning::new(
                &incident.id,
                "MISSING_AREA",
                "incident has no affected area; counted but not mapped",
            ));
            continue;
        };
        match geometry::parse_affected_area(text).and_then(|polygon| {
            geometry::validate_polygon(&polygon)?;
            Ok(polygon)
        }) {
            Ok(polygon) => shapes.push((index, polygon)),
            Err(err) => {
                log::warn!("Overlay analysis: excluding incident {}: {err}", incident.id);
                warnings.push(geometry_warning(&incident.id, err));
            }
        }
    }

    let projection = EqualAreaProjection::centred_on(shapes.iter().map(|(_, polygon)| polygon));
    let footprints: Vec<Footprint> = shapes
        .iter()
        .map(|(index, polygon)| Footprint {
            incident: *index,
            polygon: projection.project(polygon),
        })
        .collect();

    let overlaps = aggregate::overlap_regions(&footprints);
    let scored = risk::score_regions(overlaps.regions, &resolved, &policy.risk);
    let risk_score = risk::overall_score(requested.len(), &scored, overlaps.overlapped_km2, &policy.risk);
    let recommendations = recommend::recommendations(&scored, risk_score, policy.repeat_window_days);

    log::debug!(
        "Overlay analysis: {} requested, {} resolved, {} mapped, {} regions, score {risk_score}",
        requested.len(),
        resolved.len(),
        footprints.len(),
        scored.len()
    );

    let overlapping_areas = scored
        .iter()
        .map(|s| OverlappingArea {
            coordinates: projection.unproject_rings(&s.region.polygon),
            incident_count: s.region.members.len(),
            incident_ids: s.region.members.iter().map(|&m| resolved[m].id.clone()).collect(),
            risk_level: s.level,
            area: round_area(s.region.area_km2),
            max_priority: s.max_priority,
            span_days: s.span_days,
        })
        .collect();

    Ok(AnalysisPayload {
        total_incidents: requested.len(),
        overlapping_areas,
        risk_score,
        recommendations,
        warnings,
    })
}

fn geometry_warning(incident_id: &str, err: GeometryError) -> AnalysisWarning {
    AnalysisWarning::new(incident_id, err.kind(), &err.to_string())
}

#[inline]
fn round_area(v: f64) -> f64 {
    (v * AREA_DECIMALS).round() / AREA_DECIMALS
}
