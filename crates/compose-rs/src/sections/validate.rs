//! Pre-flight checks over a section list.
//!
//! The resolver tolerates dangling and cyclic `dependsOn` references at run
//! time by dropping them. [`validate_sections`] catches those (and other
//! authoring mistakes) when a configuration is loaded, so a bad list is
//! rejected before any run rather than silently degrading every run.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use serde::Serialize;

use super::SectionDefinition;
use crate::transforms::TransformRegistry;
use crate::{SUMMARY_KEY, VERSION_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One finding from [`validate_sections`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ConfigIssue {
    DuplicateId { id: String },
    DuplicateOutputKey { output_key: String, sections: Vec<String> },
    DanglingDependency { section: String, depends_on: String },
    /// Sections that lie on (or between) dependency cycles.
    Cycle { sections: Vec<String> },
    UnknownTransform { section: String, transform: String },
    UnrecognizedCondition { section: String, tag: String },
    MissingConditionParameter { section: String, condition: String, parameter: String },
    ReservedOutputKey { section: String, output_key: String },
}

impl ConfigIssue {
    pub fn severity(&self) -> Severity {
        match self {
            Self::DuplicateOutputKey { .. }
            | Self::UnknownTransform { .. }
            | Self::UnrecognizedCondition { .. } => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId { id } => write!(f, "section id '{id}' is defined more than once"),
            Self::DuplicateOutputKey { output_key, sections } => write!(
                f,
                "output key '{output_key}' is written by several sections ({}); later values overwrite earlier ones",
                sections.join(", ")
            ),
            Self::DanglingDependency { section, depends_on } => {
                write!(f, "section '{section}' depends on unknown section '{depends_on}'")
            }
            Self::Cycle { sections } => {
                write!(f, "dependency cycle among sections: {}", sections.join(" -> "))
            }
            Self::UnknownTransform { section, transform } => {
                write!(f, "section '{section}' uses unregistered transform '{transform}'")
            }
            Self::UnrecognizedCondition { section, tag } => {
                write!(f, "section '{section}' uses unrecognized activation condition '{tag}'")
            }
            Self::MissingConditionParameter {
                section,
                condition,
                parameter,
            } => write!(f, "section '{section}': condition '{condition}' requires '{parameter}'"),
            Self::ReservedOutputKey { section, output_key } => {
                write!(f, "section '{section}' uses reserved output key '{output_key}'")
            }
        }
    }
}

/// All findings for one section list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<ConfigIssue>,
}

impl ValidationReport {
    /// No errors (warnings allowed).
    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn errors(&self) -> impl Iterator<Item = &ConfigIssue> {
        self.issues.iter().filter(|i| i.severity() == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ConfigIssue> {
        self.issues.iter().filter(|i| i.severity() == Severity::Warning)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            return write!(f, "  (no issues)");
        }
        let lines: Vec<String> = self
            .issues
            .iter()
            .map(|issue| {
                let label = match issue.severity() {
                    Severity::Error => "error",
                    Severity::Warning => "warning",
                };
                format!("  - {label}: {issue}")
            })
            .collect();
        write!(f, "{}", lines.join("\n"))
    }
}

/// Check a section list against `registry`.
pub fn validate_sections(
    sections: &[SectionDefinition],
    registry: &TransformRegistry,
) -> ValidationReport {
    let mut issues = Vec::new();

    let mut seen_ids = HashSet::new();
    for section in sections {
        if !seen_ids.insert(section.id.as_str()) {
            issues.push(ConfigIssue::DuplicateId {
                id: section.id.clone(),
            });
        }
    }

    let mut writers: Vec<(&str, Vec<String>)> = Vec::new();
    for section in sections {
        match writers.iter_mut().find(|(key, _)| *key == section.output_key) {
            Some((_, ids)) => ids.push(section.id.clone()),
            None => writers.push((section.output_key.as_str(), vec![section.id.clone()])),
        }
    }
    issues.extend(
        writers
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(key, ids)| ConfigIssue::DuplicateOutputKey {
                output_key: key.to_string(),
                sections: ids,
            }),
    );

    for section in sections {
        if section.output_key == VERSION_KEY || section.output_key == SUMMARY_KEY {
            issues.push(ConfigIssue::ReservedOutputKey {
                section: section.id.clone(),
                output_key: section.output_key.clone(),
            });
        }

        for dep in &section.depends_on {
            if !seen_ids.contains(dep.as_str()) {
                issues.push(ConfigIssue::DanglingDependency {
                    section: section.id.clone(),
                    depends_on: dep.clone(),
                });
            }
        }

        for name in section.transform_names() {
            if !registry.contains(name) {
                issues.push(ConfigIssue::UnknownTransform {
                    section: section.id.clone(),
                    transform: name.clone(),
                });
            }
        }

        let condition = &section.activate_when;
        if let super::ActivationCondition::Custom { tag } = condition {
            issues.push(ConfigIssue::UnrecognizedCondition {
                section: section.id.clone(),
                tag: tag.clone(),
            });
        }
        if let Some(parameter) = condition.missing_parameter() {
            issues.push(ConfigIssue::MissingConditionParameter {
                section: section.id.clone(),
                condition: condition.tag().to_string(),
                parameter: parameter.to_string(),
            });
        }
    }

    if let Some(cycle) = find_cycle_members(sections) {
        issues.push(ConfigIssue::Cycle { sections: cycle });
    }

    ValidationReport { issues }
}

/// Ids left after peeling off every node with no incoming edge (Kahn's
/// algorithm) and then every node with no outgoing edge. What remains sits on
/// a cycle or on a path between cycles. Dangling edges are ignored.
fn find_cycle_members(sections: &[SectionDefinition]) -> Option<Vec<String>> {
    let ids: HashSet<&str> = sections.iter().map(|s| s.id.as_str()).collect();
    let mut order: Vec<&str> = Vec::new();
    let mut deps: HashMap<&str, Vec<&str>> = HashMap::new();
    for section in sections {
        if deps.contains_key(section.id.as_str()) {
            continue;
        }
        let known = section
            .depends_on
            .iter()
            .map(String::as_str)
            .filter(|d| ids.contains(d))
            .collect();
        order.push(section.id.as_str());
        deps.insert(section.id.as_str(), known);
    }

    let mut remaining: HashSet<&str> = order.iter().copied().collect();
    peel(&mut remaining, &deps, Direction::Incoming);
    peel(&mut remaining, &deps, Direction::Outgoing);

    if remaining.is_empty() {
        return None;
    }
    Some(
        order
            .into_iter()
            .filter(|id| remaining.contains(id))
            .map(str::to_string)
            .collect(),
    )
}

#[derive(Clone, Copy)]
enum Direction {
    Incoming,
    Outgoing,
}

/// Repeatedly remove nodes whose degree in `direction` is zero.
fn peel<'a>(
    remaining: &mut HashSet<&'a str>,
    deps: &HashMap<&'a str, Vec<&'a str>>,
    direction: Direction,
) {
    // Edge dep -> id: `id` has an incoming edge from each of its deps.
    let mut degree: HashMap<&str, usize> = remaining.iter().map(|id| (*id, 0)).collect();
    let mut neighbours: HashMap<&str, Vec<&str>> = HashMap::new();

    for id in remaining.iter() {
        for dep in deps.get(id).into_iter().flatten() {
            if !remaining.contains(dep) {
                continue;
            }
            let (counted, other) = match direction {
                Direction::Incoming => (*id, *dep),
                Direction::Outgoing => (*dep, *id),
            };
            *degree.entry(counted).or_insert(0) += 1;
            neighbours.entry(other).or_default().push(counted);
        }
    }

    let mut queue: VecDeque<&str> = degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(id, _)| *id)
        .collect();

    while let Some(id) = queue.pop_front() {
        remaining.remove(id);
        for next in neighbours.get(id).into_iter().flatten() {
            if let Some(d) = degree.get_mut(next) {
                *d -= 1;
                if *d == 0 {
                    queue.push_back(*next);
                }
            }
        }
    }
}
