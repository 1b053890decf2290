use crate::analysis::{distinct_ids, AnalysisError};
use crate::errors::AppError;
use validator::ValidationError;

pub const MAX_INCIDENT_ID_LEN: usize = 64;

#[allow(clippy::ptr_arg)]
pub fn validate_incident_id_entries(ids: &Vec<String>) -> Result<(), ValidationError> {
    let bad_entry = ids.iter().any(|id| {
        let id = id.trim();
        id.is_empty() || id.len() > MAX_INCIDENT_ID_LEN
    });
    if bad_entry {
        let mut err = ValidationError::new("incident_id");
        err.message = Some(format!("incident IDs must be 1-{MAX_INCIDENT_ID_LEN} characters").into());
        return Err(err);
    }
    Ok(())
}

/// Applies the request-size cap, then collapses duplicates. Runs before any
/// database access so oversized requests cost nothing.
pub fn validate_incident_ids(ids: &[String], max_incidents: usize) -> Result<Vec<String>, AppError> {
    if ids.len() > max_incidents {
        return Err(AnalysisError::TooManyIncidents {
            requested: ids.len(),
            max: max_incidents,
        }
        .into());
    }

    let distinct = distinct_ids(ids);
    if distinct.len() < 2 {
        return Err(AnalysisError::InsufficientInput {
            resolvable: distinct.len(),
        }
        .into());
    }
    Ok(distinct)
}
