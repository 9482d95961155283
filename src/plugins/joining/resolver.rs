//! Join dependency resolution over a [`JoinCatalogue`].
//!
//! Requested names are expanded to the transitive closure of their
//! prerequisites, then ordered so every join comes after the joins it
//! requires. Catalogues are checked for dangling references and cycles when
//! the plugin is registered, so resolution itself never loops.

use super::catalogue::JoinCatalogue;
use crate::error::{QueryError, Result};
use std::collections::{HashMap, HashSet};

/// Names in `requested` that the catalogue does not declare, in request order
pub fn undefined_joins<'a>(catalogue: &JoinCatalogue, requested: &'a [String]) -> Vec<&'a str> {
    let mut undefined: Vec<&str> = Vec::new();
    for name in requested {
        if !catalogue.contains(name) && !undefined.contains(&name.as_str()) {
            undefined.push(name);
        }
    }
    undefined
}

pub fn ensure_defined(catalogue: &JoinCatalogue, requested: &[String]) -> Result<()> {
    let undefined = undefined_joins(catalogue, requested);
    if undefined.is_empty() {
        Ok(())
    } else {
        Err(QueryError::join_resolution(format!(
            "The following joins have not been defined: {}",
            undefined.join(", ")
        )))
    }
}

/// Requested joins plus everything they transitively require
///
/// Each name is followed by its own prerequisites the first time it is seen.
pub fn required_closure(catalogue: &JoinCatalogue, requested: &[String]) -> Result<Vec<String>> {
    ensure_defined(catalogue, requested)?;

    let mut closure: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut pending: Vec<&str> = requested.iter().rev().map(String::as_str).collect();

    while let Some(name) = pending.pop() {
        if !seen.insert(name) {
            continue;
        }
        let prerequisites = catalogue.required_joins(name);
        ensure_defined(catalogue, prerequisites)?;

        closure.push(name.to_string());
        pending.extend(prerequisites.iter().rev().map(String::as_str));
    }
    Ok(closure)
}

/// Order `names` so each join follows all of its prerequisites
///
/// Joins without prerequisites come first; each following pass moves every
/// join whose prerequisites are already ordered. A pass that moves nothing
/// means the remaining joins can never be ordered.
pub fn application_order(catalogue: &JoinCatalogue, names: &[String]) -> Result<Vec<String>> {
    let mut ordered: Vec<String> = Vec::with_capacity(names.len());
    let mut placed: HashSet<&str> = HashSet::with_capacity(names.len());
    let mut remaining: Vec<&str> = names.iter().map(String::as_str).collect();

    while !remaining.is_empty() {
        let ready: Vec<&str> = remaining
            .iter()
            .copied()
            .filter(|name| {
                catalogue
                    .required_joins(name)
                    .iter()
                    .all(|required| placed.contains(required.as_str()))
            })
            .collect();

        if ready.is_empty() {
            return Err(QueryError::join_resolution(format!(
                "Join order could not be resolved for: {}",
                remaining.join(", ")
            )));
        }

        remaining.retain(|name| !ready.contains(name));
        for name in ready {
            placed.insert(name);
            ordered.push(name.to_string());
        }
    }
    Ok(ordered)
}

/// Closure of `requested`, in application order
pub fn resolve(catalogue: &JoinCatalogue, requested: &[String]) -> Result<Vec<String>> {
    let closure = required_closure(catalogue, requested)?;
    application_order(catalogue, &closure)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// First dependency cycle found, as a path that starts and ends on the same join
pub fn find_cycle(catalogue: &JoinCatalogue) -> Option<Vec<String>> {
    fn visit<'a>(
        catalogue: &'a JoinCatalogue,
        name: &'a str,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        match marks.get(name) {
            Some(Mark::Done) => return None,
            Some(Mark::Visiting) => {
                let start = path.iter().position(|&n| n == name).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(name.to_string());
                return Some(cycle);
            }
            None => {}
        }

        marks.insert(name, Mark::Visiting);
        path.push(name);
        for required in catalogue.required_joins(name) {
            if let Some(cycle) = visit(catalogue, required, marks, path) {
                return Some(cycle);
            }
        }
        path.pop();
        marks.insert(name, Mark::Done);
        None
    }

    let mut marks = HashMap::new();
    let mut path = Vec::new();
    catalogue
        .iter()
        .find_map(|join| visit(catalogue, &join.name, &mut marks, &mut path))
}

/// Reject prerequisites that are not declared and dependency cycles
pub fn validate_catalogue(catalogue: &JoinCatalogue) -> Result<()> {
    for join in catalogue.iter() {
        if let Some(missing) = join
            .required_joins
            .iter()
            .find(|required| !catalogue.contains(required))
        {
            return Err(QueryError::configuration(format!(
                "Join \"{}\" requires undefined join \"{missing}\"",
                join.name
            )));
        }
    }

    if let Some(cycle) = find_cycle(catalogue) {
        return Err(QueryError::configuration(format!(
            "Joins have a circular dependency: {}",
            cycle.join(" -> ")
        )));
    }
    Ok(())
}
