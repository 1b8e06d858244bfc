//! # Migration settings loaded from `KEY=VALUE` text.
//!
//! Every recognised key is declared once in [`FIELDS`]: its external name,
//! whether it must be present, and a typed setter. Loading walks the text,
//! applies each line through the table and collects **every** problem it
//! finds instead of stopping at the first one.
//!
//! ```text
//! # comment
//! VSS_DIRECTORY = /srv/vss
//! VSS_PROJECT   = $/Project_1.root
//! ENCODING      = 1252
//! IGNORE_GIT_ERRORS = True
//! ```
//!
//! ## Rules
//! - Blank lines and lines starting with `#` are ignored.
//! - Keys are case-insensitive; keys and values are trimmed.
//! - Booleans accept `true`/`false` in any case.
//! - A value may contain `=`; only the first one separates key from value.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// A single problem found while loading or validating settings.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsIssue {
    /// The line has no `=` separator.
    #[error("line {line}: expected KEY=VALUE, got '{text}'")]
    MalformedLine {
        /// 1-based line number.
        line: usize,
        /// The offending line, trimmed.
        text: String,
    },

    /// The key is not part of the settings table.
    #[error("unknown key '{0}'")]
    UnknownKey(String),

    /// A required key never appeared.
    #[error("missing key '{0}'")]
    MissingKey(&'static str),

    /// The key appeared more than once.
    #[error("duplicate key '{0}'")]
    DuplicateKey(&'static str),

    /// The value could not be parsed into the field's type.
    #[error("key '{key}': expected {expected}, got '{value}'")]
    InvalidValue {
        /// Key whose value was rejected.
        key: &'static str,
        /// Human readable type name.
        expected: &'static str,
        /// The raw value.
        value: String,
    },

    /// The value parsed but does not satisfy a run-start precondition.
    #[error("key '{key}': {reason}")]
    Invalid {
        /// Key whose value was rejected.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Failure to load a settings file.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The file could not be read.
    #[error("cannot read settings file {path}: {source}")]
    Io {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The text was read but has problems.
    #[error("settings have {} problem(s)", .0.len())]
    Invalid(Vec<SettingsIssue>),
}

impl SettingsError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SettingsError::Io { .. } => "settings_io",
            SettingsError::Invalid(_) => "settings_invalid",
        }
    }

    /// Returns `true` if the settings file does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SettingsError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Settings of one migration run.
///
/// Empty strings mean "not configured". The defaults match an empty file
/// with only the required keys present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Root directory of the source database.
    pub vss_directory: String,
    /// Project path inside the source database (for example `$/Project`).
    pub vss_project: String,
    /// Semicolon separated path patterns to skip.
    pub vss_exclude_paths: String,
    /// Code page of the source database; `-1` selects the platform default.
    pub encoding: i32,
    /// Target repository directory; empty disables the export stage.
    pub git_directory: String,
    /// Domain appended to user names to form commit e-mail addresses.
    pub default_email_domain: String,
    /// Commit message used when a changeset has no comment.
    pub default_comment: String,
    /// Run log path; empty means no run log.
    pub log_file: String,
    /// Transcode comments to UTF-8 instead of tagging the commit encoding.
    pub transcode_comments: bool,
    /// Always create annotated tags.
    pub force_annotated_tags: bool,
    /// Keep going when the target repository reports an error.
    pub ignore_git_errors: bool,
    /// Revisions closer than this are merged regardless of comment.
    pub any_comment_seconds: i32,
    /// Revisions with the same comment closer than this are merged.
    pub same_comment_seconds: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vss_directory: String::new(),
            vss_project: String::new(),
            vss_exclude_paths: String::new(),
            encoding: -1,
            git_directory: String::new(),
            default_email_domain: String::new(),
            default_comment: String::new(),
            log_file: String::new(),
            transcode_comments: false,
            force_annotated_tags: false,
            ignore_git_errors: false,
            any_comment_seconds: 0,
            same_comment_seconds: 0,
        }
    }
}

enum Setter {
    Text(fn(&mut Settings, String)),
    Int(fn(&mut Settings, i32)),
    Bool(fn(&mut Settings, bool)),
}

struct Field {
    key: &'static str,
    required: bool,
    set: Setter,
}

/// The settings table: external key, presence requirement, typed setter.
static FIELDS: &[Field] = &[
    Field {
        key: "VSS_DIRECTORY",
        required: true,
        set: Setter::Text(|s, v| s.vss_directory = v),
    },
    Field {
        key: "VSS_PROJECT",
        required: true,
        set: Setter::Text(|s, v| s.vss_project = v),
    },
    Field {
        key: "VSS_EXCLUDE_PATHS",
        required: false,
        set: Setter::Text(|s, v| s.vss_exclude_paths = v),
    },
    Field {
        key: "ENCODING",
        required: false,
        set: Setter::Int(|s, v| s.encoding = v),
    },
    Field {
        key: "GIT_DIRECTORY",
        required: false,
        set: Setter::Text(|s, v| s.git_directory = v),
    },
    Field {
        key: "DEFAULT_EMAIL_DOMAIN",
        required: false,
        set: Setter::Text(|s, v| s.default_email_domain = v),
    },
    Field {
        key: "DEFAULT_COMMENT",
        required: false,
        set: Setter::Text(|s, v| s.default_comment = v),
    },
    Field {
        key: "LOG_FILE",
        required: false,
        set: Setter::Text(|s, v| s.log_file = v),
    },
    Field {
        key: "TRANSCODE_COMMENTS",
        required: false,
        set: Setter::Bool(|s, v| s.transcode_comments = v),
    },
    Field {
        key: "FORCE_ANNOTATED_TAGS",
        required: false,
        set: Setter::Bool(|s, v| s.force_annotated_tags = v),
    },
    Field {
        key: "IGNORE_GIT_ERRORS",
        required: false,
        set: Setter::Bool(|s, v| s.ignore_git_errors = v),
    },
    Field {
        key: "ANY_COMMENT_SECONDS",
        required: false,
        set: Setter::Int(|s, v| s.any_comment_seconds = v),
    },
    Field {
        key: "SAME_COMMENT_SECONDS",
        required: false,
        set: Setter::Int(|s, v| s.same_comment_seconds = v),
    },
];

impl Field {
    fn apply(&self, settings: &mut Settings, value: &str) -> Result<(), SettingsIssue> {
        let invalid = |expected| SettingsIssue::InvalidValue {
            key: self.key,
            expected,
            value: value.to_string(),
        };
        match self.set {
            Setter::Text(set) => set(settings, value.to_string()),
            Setter::Int(set) => set(settings, value.parse().map_err(|_| invalid("integer"))?),
            Setter::Bool(set) => set(settings, parse_bool(value).ok_or_else(|| invalid("boolean"))?),
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

impl Settings {
    /// Keys understood by the loader, in table order.
    pub fn keys() -> impl Iterator<Item = &'static str> {
        FIELDS.iter().map(|f| f.key)
    }

    /// Parses settings text, returning every issue found.
    pub fn parse(text: &str) -> Result<Self, Vec<SettingsIssue>> {
        let mut settings = Settings::default();
        let mut issues = Vec::new();
        let mut seen = vec![false; FIELDS.len()];

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                issues.push(SettingsIssue::MalformedLine {
                    line: idx + 1,
                    text: line.to_string(),
                });
                continue;
            };
            let key = key.trim();
            let Some(pos) = FIELDS.iter().position(|f| f.key.eq_ignore_ascii_case(key)) else {
                issues.push(SettingsIssue::UnknownKey(key.to_string()));
                continue;
            };
            let field = &FIELDS[pos];
            if std::mem::replace(&mut seen[pos], true) {
                issues.push(SettingsIssue::DuplicateKey(field.key));
                continue;
            }
            if let Err(issue) = field.apply(&mut settings, value.trim()) {
                issues.push(issue);
            }
        }

        issues.extend(
            FIELDS
                .iter()
                .zip(&seen)
                .filter(|(f, seen)| f.required && !**seen)
                .map(|(f, _)| SettingsIssue::MissingKey(f.key)),
        );

        if issues.is_empty() {
            Ok(settings)
        } else {
            Err(issues)
        }
    }

    /// Reads and parses a settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(SettingsError::Invalid)
    }

    /// Checks the preconditions of a run.
    pub fn validate(&self) -> Result<(), Vec<SettingsIssue>> {
        let mut issues = Vec::new();

        if self.vss_directory.is_empty() {
            issues.push(SettingsIssue::Invalid {
                key: "VSS_DIRECTORY",
                reason: "must not be empty".into(),
            });
        } else if !Path::new(&self.vss_directory).is_dir() {
            issues.push(SettingsIssue::Invalid {
                key: "VSS_DIRECTORY",
                reason: format!("'{}' is not a directory", self.vss_directory),
            });
        }
        if self.vss_project.is_empty() {
            issues.push(SettingsIssue::Invalid {
                key: "VSS_PROJECT",
                reason: "must not be empty".into(),
            });
        }
        for (key, secs) in [
            ("ANY_COMMENT_SECONDS", self.any_comment_seconds),
            ("SAME_COMMENT_SECONDS", self.same_comment_seconds),
        ] {
            if secs < 0 {
                issues.push(SettingsIssue::Invalid {
                    key,
                    reason: format!("must not be negative, got {secs}"),
                });
            }
        }

        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }

    /// Exclusion patterns, split on `;` with blanks dropped.
    pub fn exclude_paths(&self) -> Vec<&str> {
        self.vss_exclude_paths
            .split(';')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect()
    }

    /// Returns `true` if the export stage should run.
    pub fn exports(&self) -> bool {
        !self.git_directory.is_empty()
    }

    /// Run log path, if one is configured.
    pub fn log_path(&self) -> Option<&Path> {
        (!self.log_file.is_empty()).then(|| Path::new(self.log_file.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# sample
VSS_DIRECTORY=/srv/vss
vss_project = $/Project_1.root
VSS_EXCLUDE_PATHS=*.tmp; bin/ ;
ENCODING=1252
GIT_DIRECTORY=/srv/git/p1
DEFAULT_COMMENT=a=b
TRANSCODE_COMMENTS = True
IGNORE_GIT_ERRORS = FALSE
ANY_COMMENT_SECONDS=15
SAME_COMMENT_SECONDS=600
";

    #[test]
    fn parses_a_complete_file() {
        let s = Settings::parse(SAMPLE).unwrap();
        assert_eq!(s.vss_directory, "/srv/vss");
        assert_eq!(s.vss_project, "$/Project_1.root");
        assert_eq!(s.encoding, 1252);
        assert_eq!(s.default_comment, "a=b");
        assert!(s.transcode_comments);
        assert!(!s.ignore_git_errors);
        assert_eq!(s.same_comment_seconds, 600);
        assert_eq!(s.exclude_paths(), vec!["*.tmp", "bin/"]);
        assert!(s.exports());
        assert_eq!(s.log_path(), None);
    }

    #[test]
    fn reports_every_issue_at_once() {
        let text = "\
VSS_PROJECT=$/p
COLOR=blue
no separator here
ENCODING=latin1
VSS_PROJECT=$/q
FORCE_ANNOTATED_TAGS=yes
";
        let issues = Settings::parse(text).unwrap_err();
        assert_eq!(
            issues,
            vec![
                SettingsIssue::UnknownKey("COLOR".into()),
                SettingsIssue::MalformedLine {
                    line: 3,
                    text: "no separator here".into()
                },
                SettingsIssue::InvalidValue {
                    key: "ENCODING",
                    expected: "integer",
                    value: "latin1".into()
                },
                SettingsIssue::DuplicateKey("VSS_PROJECT"),
                SettingsIssue::InvalidValue {
                    key: "FORCE_ANNOTATED_TAGS",
                    expected: "boolean",
                    value: "yes".into()
                },
                SettingsIssue::MissingKey("VSS_DIRECTORY"),
            ]
        );
    }

    #[test]
    fn validate_flags_run_preconditions() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = Settings {
            vss_directory: dir.path().display().to_string(),
            vss_project: "$/p".into(),
            ..Settings::default()
        };
        assert!(s.validate().is_ok());

        s.vss_project.clear();
        s.any_comment_seconds = -1;
        let issues = s.validate().unwrap_err();
        let keys: Vec<_> = issues
            .iter()
            .map(|i| match i {
                SettingsIssue::Invalid { key, .. } => *key,
                other => panic!("unexpected: {other:?}"),
            })
            .collect();
        assert_eq!(keys, vec!["VSS_PROJECT", "ANY_COMMENT_SECONDS"]);
    }

    #[test]
    fn load_distinguishes_missing_file() {
        let err = Settings::load("/definitely/not/here.conf").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.as_label(), "settings_io");
    }
}
