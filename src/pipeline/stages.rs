//! Stage list validation.
//!
//! Two checks exist: strategy-declared stages (which must avoid the reserved
//! names entirely) and the full runtime list, which is re-validated before
//! every emission because middlewares may grow it while the query runs.

use crate::constants::stages::{self, END, QUERY, RESERVED, START};
use crate::error::{QueryError, Result};
use std::collections::HashSet;

fn check_blank_and_duplicates(list: &[String]) -> Result<()> {
    if list.iter().any(|stage| stage.trim().is_empty()) {
        return Err(QueryError::stage_validation("Stages must not be blank"));
    }

    let mut seen = HashSet::with_capacity(list.len());
    if !list.iter().all(|stage| seen.insert(stage.as_str())) {
        return Err(QueryError::stage_validation("Stages must have no duplicates"));
    }
    Ok(())
}

/// Validate the stages a strategy declares for the middle of the lifecycle
pub fn validate_declared(list: &[String]) -> Result<()> {
    check_blank_and_duplicates(list)?;

    if list.iter().any(|stage| stages::is_reserved(stage)) {
        return Err(QueryError::stage_validation(format!(
            "Stages must not be {}",
            RESERVED.join(", ")
        )));
    }
    Ok(())
}

/// Validate the complete stage list of a running execution
///
/// `emitted` is the prefix already run; the list must still begin with it.
pub fn validate_schedule(list: &[String], emitted: &[String]) -> Result<()> {
    check_blank_and_duplicates(list)?;

    match list.first() {
        Some(first) if first == START => {}
        first => {
            return Err(QueryError::stage_validation(format!(
                "The first stage must be \"{START}\", got {}",
                describe(first)
            )))
        }
    }
    match list.last() {
        Some(last) if last == END => {}
        last => {
            return Err(QueryError::stage_validation(format!(
                "The last stage must be \"{END}\", got {}",
                describe(last)
            )))
        }
    }
    if list.iter().any(|stage| stage == QUERY) {
        return Err(QueryError::stage_validation(format!(
            "Stage \"{QUERY}\" is reserved and cannot be scheduled"
        )));
    }

    if let Some(index) = emitted
        .iter()
        .zip(list)
        .position(|(emitted, scheduled)| emitted != scheduled)
    {
        return Err(QueryError::stage_validation(format!(
            "Stage \"{}\" was scheduled before the current stage \"{}\"",
            list[index],
            emitted.last().map(String::as_str).unwrap_or(START)
        )));
    }
    if list.len() < emitted.len() {
        return Err(QueryError::stage_validation(
            "Stages that already ran must not be removed",
        ));
    }
    Ok(())
}

fn describe(stage: Option<&String>) -> String {
    stage.map_or_else(|| "nothing".to_string(), |stage| format!("\"{stage}\""))
}
