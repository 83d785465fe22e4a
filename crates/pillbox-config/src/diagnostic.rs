// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Miette diagnostics for `pillbox.toml`.
//!
//! Load errors from figment and rule violations from [`crate::validation`]
//! both end up here, pointed back at the line that caused them.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use std::ops::Range;
use std::path::{Path, PathBuf};

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::model::SECTION_KEYS;

/// Minimum Jaro-Winkler similarity for a "did you mean" hint
/// (`tick_intreval_secs` -> `tick_interval_secs`).
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// Text of one config layer, kept for pointing diagnostics at it.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub name: String,
    pub content: String,
}

impl ConfigSource {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Read a config file; `None` when it does not exist or is unreadable.
    pub fn read(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        let name = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        Some(Self::new(name.display().to_string(), content))
    }
}

/// How an unknown key might be fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyHint {
    /// A similarly spelled key in the same section.
    Typo(String),
    /// The key is valid, but only under this other section.
    WrongSection(String),
}

/// A configuration error rendered by miette at startup.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown key `{key}` in {}", scope(.section.as_deref()))]
    #[diagnostic(
        code(pillbox::config::unknown_key),
        help("{}", unknown_key_help(section.as_deref(), key, hint.as_ref(), valid_keys))
    )]
    UnknownKey {
        /// `None` for a top-level key, i.e. an unknown section.
        section: Option<String>,
        key: String,
        hint: Option<KeyHint>,
        valid_keys: String,
        #[label("not recognized here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that does not deserialize into its field.
    #[error("invalid value for `{key}`: {detail}")]
    #[diagnostic(code(pillbox::config::invalid_value))]
    InvalidValue {
        key: String,
        detail: String,
        #[label("this value")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A well-typed value that breaks a rule, possibly in combination with
    /// another key.
    #[error("{key}: {message}")]
    #[diagnostic(code(pillbox::config::validation))]
    Validation {
        /// Dotted `section.key` path.
        key: String,
        message: String,
        #[help]
        help: Option<String>,
        /// A second key the rule ties this one to.
        paired: Option<String>,
        #[label("rejected value")]
        span: Option<SourceSpan>,
        #[label("checked against this")]
        paired_span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("configuration error: {0}")]
    #[diagnostic(code(pillbox::config::other))]
    Other(String),
}

impl ConfigError {
    /// A rule violation on `key` with no source position yet.
    pub fn validation(key: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            key: key.to_string(),
            message: message.into(),
            help: None,
            paired: None,
            span: None,
            paired_span: None,
            src: None,
        }
    }

    pub fn with_help(mut self, text: impl Into<String>) -> Self {
        if let Self::Validation { help, .. } = &mut self {
            *help = Some(text.into());
        }
        self
    }

    pub fn paired_with(mut self, key: &str) -> Self {
        if let Self::Validation { paired, .. } = &mut self {
            *paired = Some(key.to_string());
        }
        self
    }

    /// The dotted key this error is about, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::UnknownKey { key, .. }
            | Self::InvalidValue { key, .. }
            | Self::Validation { key, .. } => Some(key),
            Self::Other(_) => None,
        }
    }
}

fn scope(section: Option<&str>) -> String {
    match section {
        Some(section) => format!("[{section}]"),
        None => "the top level".to_string(),
    }
}

fn unknown_key_help(
    section: Option<&str>,
    key: &str,
    hint: Option<&KeyHint>,
    valid_keys: &str,
) -> String {
    let accepts = format!("{} accepts: {valid_keys}", scope(section));
    match hint {
        Some(KeyHint::Typo(candidate)) => format!("did you mean `{candidate}`? {accepts}"),
        Some(KeyHint::WrongSection(home)) => {
            format!("`{key}` belongs under [{home}]; move it there")
        }
        None => accepts,
    }
}

/// Convert a `figment::Error` into diagnostics, one per underlying error.
///
/// `sources` are the config layers in merge order.
pub fn from_figment(err: figment::Error, sources: &[ConfigSource]) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let origin = error_origin(&error);
            let mut path: Vec<String> = error.path.iter().map(ToString::to_string).collect();
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    if path.last() == Some(field) {
                        path.pop();
                    }
                    let section = path.first().cloned();
                    let (span, src) =
                        locate(sources, origin.as_deref(), section.as_deref().unwrap_or(""), field)
                            .map(|(source, found)| (Some(found.key.into()), Some(named(source))))
                            .unwrap_or((None, None));
                    ConfigError::UnknownKey {
                        hint: hint_for(section.as_deref(), field, expected),
                        section,
                        key: field.clone(),
                        valid_keys: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::InvalidType(actual, expected) => invalid_value(
                    &path,
                    format!("found {actual}, expected {expected}"),
                    sources,
                    origin.as_deref(),
                ),
                Kind::InvalidValue(actual, expected) => invalid_value(
                    &path,
                    format!("found {actual}, expected {expected}"),
                    sources,
                    origin.as_deref(),
                ),
                Kind::UnknownVariant(variant, expected) => invalid_value(
                    &path,
                    format!("`{variant}` is not one of: {}", expected.join(", ")),
                    sources,
                    origin.as_deref(),
                ),
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// Point validation errors at the value that broke the rule.
///
/// When only the paired key appears in a file, it takes the primary label.
pub fn attach_spans(errors: Vec<ConfigError>, sources: &[ConfigSource]) -> Vec<ConfigError> {
    errors
        .into_iter()
        .map(|error| match error {
            ConfigError::Validation {
                key,
                message,
                help,
                paired,
                span: None,
                paired_span: None,
                src: None,
            } => {
                let primary = locate_dotted(sources, &key);
                let (span, paired_span, src) = match primary {
                    Some((source, found)) => {
                        let other = paired
                            .as_deref()
                            .and_then(|other| find_dotted(&source.content, other));
                        (
                            Some(found.value.into()),
                            other.map(|o| o.value.into()),
                            Some(named(source)),
                        )
                    }
                    None => match paired.as_deref().and_then(|p| locate_dotted(sources, p)) {
                        Some((source, found)) => {
                            (None, Some(found.value.into()), Some(named(source)))
                        }
                        None => (None, None, None),
                    },
                };
                ConfigError::Validation {
                    key,
                    message,
                    help,
                    paired,
                    span,
                    paired_span,
                    src,
                }
            }
            other => other,
        })
        .collect()
}

fn locate_dotted<'a>(
    sources: &'a [ConfigSource],
    key: &str,
) -> Option<(&'a ConfigSource, KeyLocation)> {
    let (section, field) = key.split_once('.')?;
    locate(sources, None, section, field)
}

fn find_dotted(content: &str, key: &str) -> Option<KeyLocation> {
    let (section, field) = key.split_once('.')?;
    find_key(content, section, field)
}

fn invalid_value(
    path: &[String],
    detail: String,
    sources: &[ConfigSource],
    origin: Option<&Path>,
) -> ConfigError {
    let (span, src) = match path {
        [section, field] => locate(sources, origin, section, field)
            .map(|(source, found)| (Some(found.value.into()), Some(named(source))))
            .unwrap_or((None, None)),
        _ => (None, None),
    };
    ConfigError::InvalidValue {
        key: path.join("."),
        detail,
        span,
        src,
    }
}

fn error_origin(error: &figment::Error) -> Option<PathBuf> {
    match error.metadata.as_ref()?.source.as_ref()? {
        figment::Source::File(path) => Some(path.clone()),
        _ => None,
    }
}

fn named(source: &ConfigSource) -> NamedSource<String> {
    NamedSource::new(&source.name, source.content.clone())
}

/// Suggest a fix for `key` found under `section`.
///
/// A key that is valid in exactly one other section wins over a spelling
/// match, so `ttl_hours` under `[scheduler]` points at `[retention]`.
pub fn hint_for(section: Option<&str>, key: &str, valid_keys: &[&str]) -> Option<KeyHint> {
    if section.is_some() {
        let mut homes = SECTION_KEYS
            .iter()
            .filter(|(name, keys)| Some(*name) != section && keys.contains(&key))
            .map(|(name, _)| *name);
        if let (Some(home), None) = (homes.next(), homes.next()) {
            return Some(KeyHint::WrongSection(home.to_string()));
        }
    }
    valid_keys
        .iter()
        .map(|candidate| (strsim::jaro_winkler(key, candidate), *candidate))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, candidate)| KeyHint::Typo(candidate.to_string()))
}

/// Byte ranges of a `key = value` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLocation {
    pub key: Range<usize>,
    pub value: Range<usize>,
}

/// Find `key` under `[section]` (`""` for the top level) in TOML text.
pub fn find_key(content: &str, section: &str, key: &str) -> Option<KeyLocation> {
    let mut current = "";
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        let body = line.trim_end_matches(['\n', '\r']);
        let trimmed = body.trim_start();
        if let Some(header) = trimmed.strip_prefix('[') {
            current = header.split(']').next().unwrap_or_default().trim();
            continue;
        }
        if current != section {
            continue;
        }
        let Some(rest) = trimmed.strip_prefix(key) else {
            continue;
        };
        let Some(value) = rest.trim_start().strip_prefix('=') else {
            continue;
        };
        let key_start = start + (body.len() - trimmed.len());
        let value = value.trim_start();
        let value_start = start + (body.len() - value.len());
        let value = if value.starts_with('"') {
            value.trim_end()
        } else {
            value.split('#').next().unwrap_or_default().trim_end()
        };
        return Some(KeyLocation {
            key: key_start..key_start + key.len(),
            value: value_start..value_start + value.len(),
        });
    }
    None
}

/// Search the layer figment blamed first, then every layer from the highest
/// precedence down.
fn locate<'a>(
    sources: &'a [ConfigSource],
    origin: Option<&Path>,
    section: &str,
    key: &str,
) -> Option<(&'a ConfigSource, KeyLocation)> {
    let blamed = origin.and_then(|origin| {
        sources
            .iter()
            .find(|source| Path::new(&source.name) == origin)
    });
    blamed
        .into_iter()
        .chain(sources.iter().rev())
        .find_map(|source| find_key(&source.content, section, key).map(|found| (source, found)))
}

/// Render a list of `ConfigError`s to stderr using miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    let plural = if errors.len() == 1 { "" } else { "s" };
    eprintln!("pillbox: {} configuration error{plural}", errors.len());
    for error in errors {
        let mut buf = String::new();
        let diagnostic: &dyn Diagnostic = error;
        if handler.render_report(&mut buf, diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEDULER: &[&str] = &[
        "tick_interval_secs",
        "tolerance_secs",
        "recompile_interval_secs",
        "default_utc_offset_minutes",
    ];

    #[test]
    fn typo_hint_stays_inside_the_section() {
        assert_eq!(
            hint_for(Some("scheduler"), "tick_intreval_secs", SCHEDULER),
            Some(KeyHint::Typo("tick_interval_secs".into()))
        );
        assert_eq!(hint_for(Some("scheduler"), "zzzzzz", SCHEDULER), None);
    }

    #[test]
    fn misplaced_key_points_at_its_section() {
        assert_eq!(
            hint_for(Some("scheduler"), "ttl_hours", SCHEDULER),
            Some(KeyHint::WrongSection("retention".into()))
        );
    }

    #[test]
    fn shared_key_names_are_not_treated_as_misplaced() {
        // `enabled` lives in several sections
        assert_eq!(hint_for(Some("scheduler"), "enabled", SCHEDULER), None);
    }

    #[test]
    fn unknown_section_gets_a_spelling_hint() {
        let sections: Vec<&str> = SECTION_KEYS.iter().map(|(name, _)| *name).collect();
        assert_eq!(
            hint_for(None, "schedular", &sections),
            Some(KeyHint::Typo("scheduler".into()))
        );
    }

    #[test]
    fn find_key_respects_section_headers() {
        let content = "[gateway]\nenabled = false\n\n[email]\nenabled = true # on\n";
        let found = find_key(content, "email", "enabled").unwrap();
        assert_eq!(&content[found.key.clone()], "enabled");
        assert_eq!(&content[found.value.clone()], "true");
        assert!(found.key.start > content.find("[email]").unwrap());
    }

    #[test]
    fn find_key_ignores_longer_keys_with_the_same_prefix() {
        let content = "[email]\nsmtp_port = 25\nsmtp = 1\n";
        assert!(find_key(content, "email", "smtp_host").is_none());
        let found = find_key(content, "email", "smtp").unwrap();
        assert_eq!(&content[found.value], "1");
    }

    #[test]
    fn attach_spans_prefers_the_highest_precedence_layer() {
        let sources = [
            ConfigSource::new("/etc/pillbox/pillbox.toml", "[retention]\nttl_hours = 5\n"),
            ConfigSource::new("pillbox.toml", "[retention]\nttl_hours = 0\n"),
        ];
        let errors = attach_spans(
            vec![ConfigError::validation("retention.ttl_hours", "must be at least 1")],
            &sources,
        );
        let ConfigError::Validation { span, src, .. } = &errors[0] else {
            panic!("expected validation error");
        };
        let span = span.unwrap();
        assert_eq!(&sources[1].content[span.offset()..span.offset() + span.len()], "0");
        assert_eq!(src.as_ref().unwrap().name(), "pillbox.toml");
    }

    #[test]
    fn paired_key_is_labelled_in_the_same_file() {
        let content = "[scheduler]\ntick_interval_secs = 120\ntolerance_secs = 30\n";
        let sources = [ConfigSource::new("pillbox.toml", content)];
        let errors = attach_spans(
            vec![
                ConfigError::validation("scheduler.tolerance_secs", "too small")
                    .paired_with("scheduler.tick_interval_secs"),
            ],
            &sources,
        );
        let ConfigError::Validation {
            span, paired_span, ..
        } = &errors[0]
        else {
            panic!("expected validation error");
        };
        let (span, paired_span) = (span.unwrap(), paired_span.unwrap());
        assert_eq!(&content[span.offset()..span.offset() + span.len()], "30");
        assert_eq!(
            &content[paired_span.offset()..paired_span.offset() + paired_span.len()],
            "120"
        );
    }

    #[test]
    fn paired_key_alone_still_gets_a_label() {
        let content = "[scheduler]\ntick_interval_secs = 120\n";
        let sources = [ConfigSource::new("pillbox.toml", content)];
        let errors = attach_spans(
            vec![
                ConfigError::validation("scheduler.tolerance_secs", "too small")
                    .paired_with("scheduler.tick_interval_secs"),
            ],
            &sources,
        );
        let ConfigError::Validation {
            span,
            paired_span,
            src,
            ..
        } = &errors[0]
        else {
            panic!("expected validation error");
        };
        assert!(span.is_none());
        assert!(paired_span.is_some());
        assert!(src.is_some());
    }

    #[test]
    fn validation_error_renders_key_and_help() {
        let err = ConfigError::validation("scheduler.tolerance_secs", "too small")
            .with_help("raise it");
        assert_eq!(err.to_string(), "scheduler.tolerance_secs: too small");
        assert_eq!(Diagnostic::help(&err).unwrap().to_string(), "raise it");
        let code = Diagnostic::code(&err).map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("pillbox::config::validation"));
    }
}
