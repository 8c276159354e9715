//! Inclusion and formatting policy.
//!
//! These functions define what the rewritten class does at run time. The helpers the rewrite
//! engine synthesizes into the target class are bytecode renditions of the same decisions,
//! and [`crate::intercept::Instrumented`] applies them directly to Rust implementations.
//!
//! # Examples
//!
//! ```rust
//! use bundleweave::intercept::policy::{format_string, is_included, FormatContext};
//!
//! let excludes = vec!["java.".to_string()];
//! assert!(!is_included(Some("java.time"), None, Some(&excludes)));
//! assert!(is_included(Some("app.messages"), None, Some(&excludes)));
//!
//! let context = FormatContext::new(Some("fr_FR"), Some("fr"), Some("app.messages"));
//! assert_eq!(format_string("[$locale] $value", "hello", &context), "[fr_FR] hello");
//! ```

use strum::{AsRefStr, Display, EnumIter, IntoEnumIterator};

use crate::intercept::Value;

/// Text substituted for an empty or missing locale part.
pub const DEFAULT_LOCALE_TEXT: &str = "default";

/// Placeholders of the pattern template, in substitution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display, AsRefStr)]
pub enum Placeholder {
    /// The raw value
    #[strum(serialize = "$value")]
    Value,
    /// The locale identifier, e.g. `fr_FR`
    #[strum(serialize = "$locale")]
    Locale,
    /// The locale's language, e.g. `fr`
    #[strum(serialize = "$lang")]
    Lang,
    /// The bundle base name
    #[strum(serialize = "$base")]
    Base,
}

/// Bundle state a value is formatted against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatContext<'a> {
    /// Locale identifier
    pub locale: Option<&'a str>,
    /// Language subtag of the locale
    pub language: Option<&'a str>,
    /// Base name of the bundle
    pub base_name: Option<&'a str>,
}

impl<'a> FormatContext<'a> {
    /// Create a context.
    #[must_use]
    pub fn new(
        locale: Option<&'a str>,
        language: Option<&'a str>,
        base_name: Option<&'a str>,
    ) -> Self {
        FormatContext {
            locale,
            language,
            base_name,
        }
    }

    fn replacement(&self, placeholder: Placeholder, value: &str) -> String {
        match placeholder {
            Placeholder::Value => value.to_string(),
            Placeholder::Locale => or_default(self.locale).to_string(),
            Placeholder::Lang => or_default(self.language).to_string(),
            Placeholder::Base => self.base_name.unwrap_or("null").to_string(),
        }
    }
}

fn or_default(text: Option<&str>) -> &str {
    text.filter(|text| !text.is_empty())
        .unwrap_or(DEFAULT_LOCALE_TEXT)
}

/// Returns `true` if `candidate` starts with any of `prefixes`.
///
/// A missing candidate or a missing or empty prefix list never matches.
#[must_use]
pub fn prefix_matches(candidate: Option<&str>, prefixes: Option<&[String]>) -> bool {
    match (candidate, prefixes) {
        (Some(candidate), Some(prefixes)) => prefixes
            .iter()
            .any(|prefix| candidate.starts_with(prefix.as_str())),
        _ => false,
    }
}

/// Decide whether values of the bundle named `base_name` get formatted.
///
/// A missing base name is always included. Otherwise an exclude match wins, a missing include
/// list accepts everything else, and a present include list requires a match.
#[must_use]
pub fn is_included(
    base_name: Option<&str>,
    includes: Option<&[String]>,
    excludes: Option<&[String]>,
) -> bool {
    if base_name.is_none() {
        return true;
    }
    if excludes.is_some() && prefix_matches(base_name, excludes) {
        return false;
    }
    includes.is_none() || prefix_matches(base_name, includes)
}

/// Substitute every placeholder of `pattern`, one after the other in [`Placeholder`] order.
///
/// Each substitution runs over the output of the previous one, so placeholder text introduced
/// by `value` is substituted too.
#[must_use]
pub fn format_string(pattern: &str, value: &str, context: &FormatContext<'_>) -> String {
    Placeholder::iter().fold(pattern.to_string(), |text, placeholder| {
        text.replace(placeholder.as_ref(), &context.replacement(placeholder, value))
    })
}

/// Format a resource value.
///
/// Strings are templated, string arrays are templated element by element into a new array,
/// anything else is returned as is. Missing array elements are templated as `"null"`.
#[must_use]
pub fn format_value(pattern: &str, value: &Value, context: &FormatContext<'_>) -> Value {
    match value {
        Value::Str(text) => Value::Str(format_string(pattern, text, context)),
        Value::StrArray(items) => Value::StrArray(
            items
                .iter()
                .map(|item| {
                    Some(format_string(
                        pattern,
                        item.as_deref().unwrap_or("null"),
                        context,
                    ))
                })
                .collect(),
        ),
        Value::Other(_) => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn placeholder_order_and_text() {
        let placeholders: Vec<Placeholder> = Placeholder::iter().collect();
        let tokens: Vec<&str> = placeholders.iter().map(AsRef::as_ref).collect();
        assert_eq!(tokens, vec!["$value", "$locale", "$lang", "$base"]);
        assert_eq!(Placeholder::Lang.to_string(), "$lang");
    }

    #[test]
    fn prefix_matching() {
        let prefixes = list(&["app.", "lib."]);
        assert!(prefix_matches(Some("app.messages"), Some(&prefixes)));
        assert!(prefix_matches(Some("lib."), Some(&prefixes)));
        assert!(!prefix_matches(Some("ap"), Some(&prefixes)));
        assert!(!prefix_matches(Some("com.app.messages"), Some(&prefixes)));
        assert!(!prefix_matches(None, Some(&prefixes)));
        assert!(!prefix_matches(Some("app.messages"), None));
        assert!(!prefix_matches(Some("app.messages"), Some(&[])));
    }

    #[test]
    fn includes_only() {
        let includes = list(&["app."]);
        assert!(is_included(Some("app.messages"), Some(&includes), None));
        assert!(!is_included(Some("lib.messages"), Some(&includes), None));
    }

    #[test]
    fn excludes_win_without_includes() {
        let excludes = list(&["java.", "sun."]);
        assert!(!is_included(Some("java.time"), None, Some(&excludes)));
        assert!(!is_included(Some("sun.util"), None, Some(&excludes)));
        assert!(is_included(Some("app.messages"), None, Some(&excludes)));
    }

    #[test]
    fn excludes_win_over_includes() {
        let includes = list(&["app."]);
        let excludes = list(&["app.internal."]);
        assert!(!is_included(
            Some("app.internal.text"),
            Some(&includes),
            Some(&excludes)
        ));
        assert!(is_included(Some("app.text"), Some(&includes), Some(&excludes)));
        assert!(!is_included(Some("other"), Some(&includes), Some(&excludes)));
    }

    #[test]
    fn missing_base_name_is_included() {
        let excludes = list(&[""]);
        assert!(is_included(None, Some(&list(&["app."])), Some(&excludes)));
    }

    #[test]
    fn locale_scenarios() {
        let context = FormatContext::new(Some("fr_FR"), Some("fr"), Some("app.messages"));
        assert_eq!(
            format_string("[$locale] $value", "hello", &context),
            "[fr_FR] hello"
        );
        assert_eq!(
            format_string("$lang/$base:$value", "hello", &context),
            "fr/app.messages:hello"
        );

        let root = FormatContext::new(Some(""), Some(""), None);
        assert_eq!(format_string("[$locale] $value", "hi", &root), "[default] hi");
        assert_eq!(format_string("$lang|$base", "hi", &root), "default|null");
        assert_eq!(
            format_string("[$locale]", "hi", &FormatContext::default()),
            "[default]"
        );
    }

    #[test]
    fn unknown_placeholders_pass_through() {
        let context = FormatContext::new(Some("en"), Some("en"), None);
        assert_eq!(
            format_string("$val $value $locales", "x", &context),
            "$val x ens"
        );
    }

    #[test]
    fn value_text_is_substituted_by_later_placeholders() {
        let context = FormatContext::new(Some("de_DE"), Some("de"), Some("app"));
        assert_eq!(
            format_string("[$value]", "costs $base in $locale", &context),
            "[costs app in de_DE]"
        );
    }

    #[test]
    fn formatting_is_not_idempotent() {
        let context = FormatContext::new(Some("fr_FR"), Some("fr"), None);
        let once = format_value("[$locale] $value", &Value::from("hello"), &context);
        let twice = match &once {
            Value::Str(text) => format_value("[$locale] $value", &Value::from(text.as_str()), &context),
            _ => Value::from(""),
        };
        assert_eq!(once, Value::from("[fr_FR] hello"));
        assert_eq!(twice, Value::from("[fr_FR] [fr_FR] hello"));
        assert_ne!(once, twice);
    }

    #[test]
    fn arrays_are_formatted_element_by_element() {
        let context = FormatContext::default();
        let value = Value::StrArray(vec![Some("a".to_string()), Some("b".to_string()), None]);
        assert_eq!(
            format_value("$value", &value, &context),
            Value::StrArray(vec![
                Some("a".to_string()),
                Some("b".to_string()),
                Some("null".to_string())
            ])
        );
        assert_eq!(
            format_value("<$value>", &value, &context),
            Value::StrArray(vec![
                Some("<a>".to_string()),
                Some("<b>".to_string()),
                Some("<null>".to_string())
            ])
        );
    }

    #[test]
    fn other_values_are_returned_by_reference() {
        let payload: Arc<dyn std::any::Any + Send + Sync> = Arc::new(42_u32);
        let value = Value::Other(Arc::clone(&payload));
        match format_value("$value!", &value, &FormatContext::default()) {
            Value::Other(returned) => assert!(Arc::ptr_eq(&returned, &payload)),
            other => panic!("unexpected {other:?}"),
        }
    }
}
