//! Agent argument parsing and transformation configuration.
//!
//! The agent receives a single delimited string such as
//! `active=true|pattern=[$lang] $value|includes=com.acme.`. [`AgentArgs::parse`] extracts the
//! four recognized keys without ever failing, and [`TransformConfig::from_args`] resolves the
//! defaults the rewrite engine works with.
//!
//! Lookup rules:
//! - a key is found at the first occurrence of `key=` anywhere in the string
//! - its value runs up to the next `|`, or to the end of the string
//! - a list value is one literal, trimmed; a blank literal is an empty list, not an absent one
//!
//! # Examples
//!
//! ```rust
//! use bundleweave::config::{AgentArgs, TransformConfig};
//!
//! let args = AgentArgs::parse(Some("active=true|includes=com.acme.|pattern=<$value>"));
//! assert!(args.active);
//!
//! let config = TransformConfig::from_args(&args);
//! assert_eq!(config.pattern, "<$value>");
//! assert_eq!(config.includes, Some(vec!["com.acme.".to_string()]));
//! assert_eq!(config.excludes.as_ref().map(Vec::len), Some(4));
//! ```

/// Pattern used when the agent arguments do not provide one.
pub const DEFAULT_PATTERN: &str = "[$locale] $value";

/// Base name prefixes excluded when the agent arguments do not provide an exclude list.
pub const DEFAULT_EXCLUDES: [&str; 4] = ["java.", "sun.", "jdk.", "oracle."];

/// Raw agent arguments, before defaults are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentArgs {
    /// `active=true` enables the agent; anything else disables it
    pub active: bool,
    /// `pattern=` value
    pub pattern: Option<String>,
    /// `includes=` value
    pub includes: Option<Vec<String>>,
    /// `excludes=` value
    pub excludes: Option<Vec<String>>,
}

impl AgentArgs {
    /// Parse the agent argument string. Never fails: unknown or malformed content is ignored.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return AgentArgs::default();
        };

        AgentArgs {
            active: extract(raw, "active").is_some_and(|value| value.eq_ignore_ascii_case("true")),
            pattern: extract(raw, "pattern").map(str::to_string),
            includes: extract_list(raw, "includes"),
            excludes: extract_list(raw, "excludes"),
        }
    }
}

fn extract<'a>(raw: &'a str, key: &str) -> Option<&'a str> {
    let marker = format!("{key}=");
    let start = raw.find(&marker)? + marker.len();
    let value = &raw[start..];
    Some(value.find('|').map_or(value, |end| &value[..end]))
}

fn extract_list(raw: &str, key: &str) -> Option<Vec<String>> {
    extract(raw, key).map(|value| {
        let value = value.trim();
        if value.is_empty() {
            Vec::new()
        } else {
            vec![value.to_string()]
        }
    })
}

/// Resolved configuration of one rewrite.
///
/// An empty or absent list is stored as `None`: no filtering on that axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformConfig {
    /// Template applied to formatted values
    pub pattern: String,
    /// Base name prefixes that must match, `None` to accept every base name
    pub includes: Option<Vec<String>>,
    /// Base name prefixes that are never formatted, `None` to exclude nothing
    pub excludes: Option<Vec<String>>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        TransformConfig {
            pattern: DEFAULT_PATTERN.to_string(),
            includes: None,
            excludes: Some(DEFAULT_EXCLUDES.iter().map(ToString::to_string).collect()),
        }
    }
}

impl TransformConfig {
    /// Configuration with the default pattern and exclude list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve parsed agent arguments against the defaults.
    #[must_use]
    pub fn from_args(args: &AgentArgs) -> Self {
        let defaults = Self::default();
        TransformConfig {
            pattern: args.pattern.clone().unwrap_or(defaults.pattern),
            includes: non_empty(args.includes.clone()),
            excludes: non_empty(args.excludes.clone().or(defaults.excludes)),
        }
    }

    /// Replace the pattern.
    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Replace the include list. An empty iterator disables include filtering.
    #[must_use]
    pub fn with_includes<I, S>(mut self, includes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.includes = non_empty(Some(includes.into_iter().map(Into::into).collect()));
        self
    }

    /// Replace the exclude list. An empty iterator disables exclude filtering.
    #[must_use]
    pub fn with_excludes<I, S>(mut self, excludes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes = non_empty(Some(excludes.into_iter().map(Into::into).collect()));
        self
    }
}

pub(crate) fn non_empty(list: Option<Vec<String>>) -> Option<Vec<String>> {
    list.filter(|values| !values.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_arguments_disable_the_agent() {
        assert_eq!(AgentArgs::parse(None), AgentArgs::default());
        assert!(!AgentArgs::parse(Some("")).active);
        assert!(!AgentArgs::parse(Some("active=yes")).active);
        assert!(!AgentArgs::parse(Some("pattern=$value")).active);
        assert!(AgentArgs::parse(Some("active=TRUE")).active);
    }

    #[test]
    fn values_end_at_the_next_separator() {
        let args = AgentArgs::parse(Some("pattern=<$lang> $value|active=true|excludes= org. "));
        assert!(args.active);
        assert_eq!(args.pattern.as_deref(), Some("<$lang> $value"));
        assert_eq!(args.excludes, Some(vec!["org.".to_string()]));
        assert_eq!(args.includes, None);
    }

    #[test]
    fn first_occurrence_wins() {
        let args = AgentArgs::parse(Some("active=true|includes=a.|includes=b."));
        assert_eq!(args.includes, Some(vec!["a.".to_string()]));
    }

    #[test]
    fn list_values_are_single_literals() {
        let args = AgentArgs::parse(Some("includes=a.,b."));
        assert_eq!(args.includes, Some(vec!["a.,b.".to_string()]));
    }

    #[test]
    fn blank_list_is_empty_not_absent() {
        let args = AgentArgs::parse(Some("active=true|excludes=  |pattern=x"));
        assert_eq!(args.excludes, Some(Vec::new()));

        let config = TransformConfig::from_args(&args);
        assert_eq!(config.excludes, None);
        assert_eq!(config.pattern, "x");
    }

    #[test]
    fn defaults_apply_to_absent_keys() {
        let config = TransformConfig::from_args(&AgentArgs::parse(Some("active=true")));
        assert_eq!(config, TransformConfig::default());
        assert_eq!(config.pattern, DEFAULT_PATTERN);
        assert_eq!(
            config.excludes,
            Some(vec![
                "java.".to_string(),
                "sun.".to_string(),
                "jdk.".to_string(),
                "oracle.".to_string()
            ])
        );
    }

    #[test]
    fn builder_methods() {
        let config = TransformConfig::new()
            .with_pattern("$base:$value")
            .with_includes(["app."])
            .with_excludes(Vec::<String>::new());
        assert_eq!(config.pattern, "$base:$value");
        assert_eq!(config.includes, Some(vec!["app.".to_string()]));
        assert_eq!(config.excludes, None);
    }
}
