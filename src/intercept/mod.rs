//! Trait-level interception of bundle resolution and value access.
//!
//! The rewrite engine grafts the inclusion and formatting behavior onto a class it does not
//! own. Rust code that owns its bundle abstraction gets the same behavior without any binary
//! rewriting: implement [`Interceptable`] and wrap the bundle in [`Instrumented`], which plays
//! the role of the two delegating methods.
//!
//! - [`Instrumented::resolve`] - the resolution delegate; decides once per handle whether
//!   values get formatted
//! - [`Instrumented::get`] - the access delegate; formats values of flagged handles
//! - [`FilterSet::global`] - process-wide filter configuration, initialized once
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use bundleweave::{
//!     config::TransformConfig,
//!     intercept::{FilterSet, Instrumented, Interceptable, Value},
//! };
//!
//! struct Greeting(&'static str);
//!
//! impl Interceptable for Greeting {
//!     type Request = ();
//!
//!     fn raw_resolve(_base_name: Option<&str>, _request: &()) -> Option<Self> {
//!         Some(Greeting("fr_FR"))
//!     }
//!     fn raw_access(&self, _key: &str) -> Option<Value> {
//!         Some(Value::from("bonjour"))
//!     }
//!     fn locale(&self) -> Option<&str> {
//!         Some(self.0)
//!     }
//!     fn base_name(&self) -> Option<&str> {
//!         Some("app.messages")
//!     }
//! }
//!
//! let filters = Arc::new(FilterSet::from_config(&TransformConfig::default()));
//! let bundle = Instrumented::<Greeting>::resolve_with(filters, Some("app.messages"), &())
//!     .ok_or("not resolved")?;
//! assert_eq!(bundle.get("greeting"), Some(Value::from("[fr_FR] bonjour")));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod policy;

use std::{
    any::Any,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, OnceLock,
    },
};

use crate::{
    config::{non_empty, TransformConfig},
    Error, Result,
};

pub use policy::{FormatContext, Placeholder};

/// A resource value as returned by a bundle.
#[derive(Clone)]
pub enum Value {
    /// A single string
    Str(String),
    /// A string array; elements may be missing
    StrArray(Vec<Option<String>>),
    /// Any other object, never copied or inspected
    Other(Arc<dyn Any + Send + Sync>),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(text) => f.debug_tuple("Str").field(text).finish(),
            Value::StrArray(items) => f.debug_tuple("StrArray").field(items).finish(),
            Value::Other(_) => f.write_str("Other(..)"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::StrArray(a), Value::StrArray(b)) => a == b,
            (Value::Other(a), Value::Other(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Str(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Str(text)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::StrArray(items.into_iter().map(Some).collect())
    }
}

/// A bundle whose resolution and value access can be intercepted.
pub trait Interceptable: Sized {
    /// Resolution inputs besides the base name (locale, loader, ...)
    type Request;

    /// Resolve a bundle without interception.
    fn raw_resolve(base_name: Option<&str>, request: &Self::Request) -> Option<Self>;

    /// Look up a value without formatting.
    fn raw_access(&self, key: &str) -> Option<Value>;

    /// Locale identifier of the bundle, e.g. `fr_FR`.
    fn locale(&self) -> Option<&str>;

    /// Language subtag of the locale. Defaults to the part before the first `_`.
    fn language(&self) -> Option<&str> {
        self.locale()
            .map(|locale| locale.split('_').next().unwrap_or(locale))
    }

    /// Base name the bundle was resolved for.
    fn base_name(&self) -> Option<&str>;
}

static GLOBAL_FILTERS: OnceLock<Arc<FilterSet>> = OnceLock::new();

/// Read-only pattern and prefix lists shared by all instrumented bundles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSet {
    pattern: String,
    includes: Option<Vec<String>>,
    excludes: Option<Vec<String>>,
}

impl FilterSet {
    /// Capture the relevant parts of a configuration. Empty lists disable filtering on their
    /// axis, as they do in a rewritten class.
    #[must_use]
    pub fn from_config(config: &TransformConfig) -> Self {
        FilterSet {
            pattern: config.pattern.clone(),
            includes: non_empty(config.includes.clone()),
            excludes: non_empty(config.excludes.clone()),
        }
    }

    /// Install the process-wide filter set.
    ///
    /// # Errors
    /// Returns [`crate::Error::Error`] if a filter set was already installed or observed
    /// through [`FilterSet::global`].
    pub fn install(config: &TransformConfig) -> Result<Arc<FilterSet>> {
        let filters = Arc::new(FilterSet::from_config(config));
        GLOBAL_FILTERS
            .set(Arc::clone(&filters))
            .map_err(|_| Error::Error("Global filter set is already initialized".to_string()))?;
        Ok(filters)
    }

    /// The process-wide filter set, initialized with the defaults on first use if
    /// [`FilterSet::install`] was not called before.
    pub fn global() -> Arc<FilterSet> {
        Arc::clone(
            GLOBAL_FILTERS.get_or_init(|| Arc::new(FilterSet::from_config(&TransformConfig::default()))),
        )
    }

    /// Template applied to formatted values.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns `true` if values of the bundle named `base_name` get formatted.
    #[must_use]
    pub fn is_included(&self, base_name: Option<&str>) -> bool {
        policy::is_included(base_name, self.includes.as_deref(), self.excludes.as_deref())
    }
}

/// A bundle wrapped with the delegating behavior.
///
/// The flag starts unset and is set at most once, by [`Instrumented::resolve_with`].
pub struct Instrumented<T> {
    inner: T,
    filters: Arc<FilterSet>,
    flagged: AtomicBool,
}

impl<T: Interceptable> Instrumented<T> {
    /// Resolve against [`FilterSet::global`].
    pub fn resolve(base_name: Option<&str>, request: &T::Request) -> Option<Self> {
        Self::resolve_with(FilterSet::global(), base_name, request)
    }

    /// Resolve a bundle and flag it if its base name is included.
    ///
    /// A missing bundle stays missing. A missing base name leaves the handle unflagged.
    pub fn resolve_with(
        filters: Arc<FilterSet>,
        base_name: Option<&str>,
        request: &T::Request,
    ) -> Option<Self> {
        let bundle = Instrumented {
            inner: T::raw_resolve(base_name, request)?,
            filters,
            flagged: AtomicBool::new(false),
        };
        if base_name.is_some() && bundle.filters.is_included(base_name) {
            bundle.flagged.store(true, Ordering::Release);
        }
        Some(bundle)
    }

    /// Look up a value, formatted if the handle is flagged.
    pub fn get(&self, key: &str) -> Option<Value> {
        let value = self.inner.raw_access(key)?;
        if !self.is_flagged() {
            return Some(value);
        }

        let context = FormatContext::new(
            self.inner.locale(),
            self.inner.language(),
            self.inner.base_name(),
        );
        Some(policy::format_value(self.filters.pattern(), &value, &context))
    }

    /// Returns `true` if values of this handle are formatted.
    pub fn is_flagged(&self) -> bool {
        self.flagged.load(Ordering::Acquire)
    }

    /// The wrapped bundle.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Unwrap the bundle.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: fmt::Debug> fmt::Debug for Instrumented<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumented")
            .field("inner", &self.inner)
            .field("flagged", &self.flagged.load(Ordering::Relaxed))
            .finish()
    }
}
