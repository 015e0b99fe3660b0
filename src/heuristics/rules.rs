//! Heuristic rules and predicates.

use serde::{Deserialize, Serialize};

use crate::core::types::Subject;

/// A named predicate with a severity weight.
///
/// Rules are pure functions over a subject's observable attributes. The
/// registry evaluates them in registration order; adding a rule never
/// changes the identity or behavior of existing entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicRule {
    /// Unique, stable rule name.
    pub name: String,

    /// The predicate that decides whether the rule matches.
    pub predicate: RulePredicate,

    /// Severity contribution in [0, 1] when the predicate matches.
    pub weight: f64,
}

impl HeuristicRule {
    /// Creates a new rule.
    pub fn new(name: impl Into<String>, predicate: RulePredicate, weight: f64) -> Self {
        Self {
            name: name.into(),
            predicate,
            weight,
        }
    }

    /// Returns `true` if this rule matches the subject.
    pub fn matches(&self, subject: &Subject) -> bool {
        self.predicate.matches(subject)
    }

    /// The built-in rule set, used when configuration supplies none.
    ///
    /// Mirrors the stock heuristics: extensions favored by droppers,
    /// oversized binaries, temp-named processes, and bloated duplicate
    /// groups.
    pub fn default_rules() -> Vec<Self> {
        vec![
            Self::new(
                "suspicious-extension",
                RulePredicate::Any {
                    predicates: [".exe", ".dll", ".bat", ".scr", ".js", ".vbs"]
                        .into_iter()
                        .map(|ext| RulePredicate::ExtensionIs {
                            extension: ext.to_string(),
                        })
                        .collect(),
                },
                0.4,
            ),
            Self::new(
                "large-binary",
                RulePredicate::All {
                    predicates: vec![
                        RulePredicate::SizeAtLeast {
                            bytes: 50 * 1024 * 1024,
                        },
                        RulePredicate::Any {
                            predicates: vec![
                                RulePredicate::ExtensionIs {
                                    extension: ".exe".into(),
                                },
                                RulePredicate::ExtensionIs {
                                    extension: ".dll".into(),
                                },
                            ],
                        },
                    ],
                },
                0.2,
            ),
            Self::new(
                "temp-process",
                RulePredicate::NameEndsWith {
                    suffix: ".tmp".into(),
                },
                0.6,
            ),
            Self::new(
                "tilde-prefixed-exe",
                RulePredicate::NameStartsWith {
                    prefix: "~$".into(),
                },
                0.4,
            ),
            Self::new(
                "crowded-duplicate-group",
                RulePredicate::GroupMembersAtLeast { count: 5 },
                0.3,
            ),
        ]
    }
}

/// The result of evaluating one rule against one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMatch {
    /// Name of the evaluated rule.
    pub rule: String,

    /// Whether the predicate matched.
    pub matched: bool,

    /// Severity contribution: the rule weight when matched, zero otherwise.
    pub contribution: f64,
}

/// A pure predicate over a subject's observable attributes.
///
/// Every variant exposes the same evaluation signature, so new predicates
/// extend the enum without touching the engine's dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RulePredicate {
    /// Matches if the subject name contains the substring (case-insensitive).
    NameContains {
        /// Substring to search for.
        needle: String,
    },

    /// Matches if the subject name starts with the prefix.
    NameStartsWith {
        /// Prefix to match.
        prefix: String,
    },

    /// Matches if the subject name ends with the suffix.
    NameEndsWith {
        /// Suffix to match.
        suffix: String,
    },

    /// Matches if a file subject has the given extension (with leading dot).
    ExtensionIs {
        /// Extension including the leading dot, e.g. ".exe".
        extension: String,
    },

    /// Matches if a file or process path contains the substring.
    PathContains {
        /// Substring to search for in the path.
        needle: String,
    },

    /// Matches if a file subject is at least this large.
    SizeAtLeast {
        /// Size threshold in bytes.
        bytes: u64,
    },

    /// Matches if a process command line contains the substring.
    CmdlineContains {
        /// Substring to search for.
        needle: String,
    },

    /// Matches if a duplicate group has at least this many members.
    GroupMembersAtLeast {
        /// Member count threshold.
        count: usize,
    },

    /// Logical AND of the inner predicates.
    All {
        /// Predicates that must all match.
        predicates: Vec<RulePredicate>,
    },

    /// Logical OR of the inner predicates.
    Any {
        /// Predicates of which at least one must match.
        predicates: Vec<RulePredicate>,
    },

    /// Logical NOT of the inner predicate.
    Not {
        /// Predicate to negate.
        predicate: Box<RulePredicate>,
    },
}

impl RulePredicate {
    /// Evaluates this predicate against a subject.
    pub fn matches(&self, subject: &Subject) -> bool {
        match self {
            Self::NameContains { needle } => subject
                .display_name()
                .to_lowercase()
                .contains(&needle.to_lowercase()),

            Self::NameStartsWith { prefix } => subject.display_name().starts_with(prefix.as_str()),

            Self::NameEndsWith { suffix } => subject.display_name().ends_with(suffix.as_str()),

            Self::ExtensionIs { extension } => {
                let name = subject.display_name().to_lowercase();
                let wanted = extension.to_lowercase();
                name.ends_with(&wanted) && name.len() > wanted.len()
            }

            Self::PathContains { needle } => {
                let path = match subject {
                    Subject::File { path, .. } => Some(path.clone()),
                    Subject::Process { exe, .. } => exe.clone(),
                    Subject::DuplicateGroup { .. } => None,
                };
                path.map(|p| {
                    p.to_string_lossy()
                        .to_lowercase()
                        .contains(&needle.to_lowercase())
                })
                .unwrap_or(false)
            }

            Self::SizeAtLeast { bytes } => match subject {
                Subject::File { size, .. } => size >= bytes,
                _ => false,
            },

            Self::CmdlineContains { needle } => match subject {
                Subject::Process { cmdline, .. } => cmdline
                    .as_ref()
                    .map(|c| c.to_lowercase().contains(&needle.to_lowercase()))
                    .unwrap_or(false),
                _ => false,
            },

            Self::GroupMembersAtLeast { count } => match subject {
                Subject::DuplicateGroup { members, .. } => members.len() >= *count,
                _ => false,
            },

            Self::All { predicates } => predicates.iter().all(|p| p.matches(subject)),

            Self::Any { predicates } => predicates.iter().any(|p| p.matches(subject)),

            Self::Not { predicate } => !predicate.matches(subject),
        }
    }
}
