//! Agent wiring.
//!
//! [`premain`] is what a host runtime calls once at startup with the raw agent argument
//! string. It resolves the configuration, announces whether the agent is active and, if so,
//! registers a [`TransformGate`] for the target class.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use bundleweave::agent::{premain, MemorySink, TransformerRegistry};
//!
//! let sink = Arc::new(MemorySink::new());
//! let mut registry = TransformerRegistry::new();
//!
//! assert!(premain(Some("active=true|includes=com.acme."), &mut registry, sink.clone()));
//! assert_eq!(registry.len(), 1);
//! assert_eq!(sink.lines(), vec!["BundleWeaveAgent activated"]);
//! ```

pub mod diagnostics;
pub mod gate;
pub mod hook;

use std::sync::Arc;

pub use diagnostics::{Diagnostic, DiagnosticSink, MemorySink, StdoutSink};
pub use gate::TransformGate;
pub use hook::{ClassFileTransformer, Instrumentation, TransformerRegistry};

use crate::{
    config::{AgentArgs, TransformConfig},
    rewrite::RewriteEngine,
};

/// Name used in the activation notice.
pub const AGENT_NAME: &str = "BundleWeaveAgent";

/// Agent entry point. Returns `true` if a transformer was registered.
pub fn premain(
    args: Option<&str>,
    instrumentation: &mut dyn Instrumentation,
    sink: Arc<dyn DiagnosticSink>,
) -> bool {
    let args = AgentArgs::parse(args);
    if !args.active {
        sink.info(&format!("{AGENT_NAME} not active"));
        return false;
    }
    sink.info(&format!("{AGENT_NAME} activated"));

    let config = TransformConfig::from_args(&args);
    log::debug!(
        "Registering transform gate: pattern {:?}, includes {:?}, excludes {:?}",
        config.pattern,
        config.includes,
        config.excludes
    );
    instrumentation.add_transformer(Box::new(TransformGate::new(
        RewriteEngine::new(config),
        sink,
    )));
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_by_default() {
        let sink = Arc::new(MemorySink::new());
        let mut registry = TransformerRegistry::new();

        for args in [None, Some(""), Some("active=false"), Some("active=yes|pattern=$value")] {
            assert!(!premain(args, &mut registry, sink.clone()));
        }
        assert!(registry.is_empty());
        assert_eq!(sink.lines().len(), 4);
        assert!(sink
            .lines()
            .iter()
            .all(|line| line == "BundleWeaveAgent not active"));
    }

    #[test]
    fn activation_is_case_insensitive() {
        let sink = Arc::new(MemorySink::new());
        let mut registry = TransformerRegistry::new();

        assert!(premain(Some("pattern=<$value>|active=TRUE"), &mut registry, sink.clone()));
        assert_eq!(registry.len(), 1);
        assert_eq!(sink.lines(), vec!["BundleWeaveAgent activated"]);
    }
}
