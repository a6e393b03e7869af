//! Repository selection by glob patterns.
//!
//! One optional inclusion glob plus any number of exclusions. `*` matches
//! across `/`, so `backend-*` covers `backend-payments/service`; exclusions
//! are checked first, in declaration order.

use globset::{Glob, GlobMatcher};

use crate::error::{FleetError, FleetResult};

/// Outcome of classifying one candidate path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Selected,
    Excluded { pattern: String },
    NotMatched { pattern: String },
}

impl Selection {
    pub fn is_selected(&self) -> bool {
        matches!(self, Selection::Selected)
    }

    /// Human-readable skip reason; `None` when selected.
    pub fn reason(&self) -> Option<String> {
        match self {
            Selection::Selected => None,
            Selection::Excluded { pattern } => Some(format!("matched exclusion '{pattern}'")),
            Selection::NotMatched { pattern } => Some(format!("did not match '{pattern}'")),
        }
    }
}

#[derive(Debug)]
pub struct RepoSelector {
    inclusion: Option<(String, GlobMatcher)>,
    exclusions: Vec<(String, GlobMatcher)>,
}

impl RepoSelector {
    /// Compile the patterns. An empty or absent inclusion pattern selects
    /// everything not excluded.
    pub fn new(inclusion: Option<&str>, exclusions: &[String]) -> FleetResult<Self> {
        let inclusion = match inclusion.filter(|p| !p.is_empty()) {
            Some(pattern) => Some((pattern.to_string(), compile(pattern)?)),
            None => None,
        };
        let exclusions = exclusions
            .iter()
            .map(|pattern| Ok((pattern.clone(), compile(pattern)?)))
            .collect::<FleetResult<Vec<_>>>()?;

        Ok(Self {
            inclusion,
            exclusions,
        })
    }

    pub fn classify(&self, path: &str) -> Selection {
        for (pattern, matcher) in &self.exclusions {
            if matcher.is_match(path) {
                return Selection::Excluded {
                    pattern: pattern.clone(),
                };
            }
        }

        if let Some((pattern, matcher)) = &self.inclusion {
            if !matcher.is_match(path) {
                return Selection::NotMatched {
                    pattern: pattern.clone(),
                };
            }
        }

        Selection::Selected
    }

    pub fn is_selected(&self, path: &str) -> bool {
        self.classify(path).is_selected()
    }
}

fn compile(pattern: &str) -> FleetResult<GlobMatcher> {
    Ok(Glob::new(pattern)
        .map_err(|e| FleetError::Pattern {
            pattern: pattern.to_string(),
            detail: e.to_string(),
        })?
        .compile_matcher())
}
