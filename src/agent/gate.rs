//! The transform gate.
//!
//! Only the target class reaches the rewrite engine. A failed rewrite is reported to the
//! diagnostic sink and the class loads unmodified.

use std::sync::Arc;

use crate::{
    agent::{diagnostics::DiagnosticSink, hook::ClassFileTransformer},
    rewrite::RewriteEngine,
};

/// Routes the target class through a [`RewriteEngine`].
pub struct TransformGate {
    engine: RewriteEngine,
    sink: Arc<dyn DiagnosticSink>,
}

impl TransformGate {
    /// Gate in front of `engine`, reporting to `sink`.
    pub fn new(engine: RewriteEngine, sink: Arc<dyn DiagnosticSink>) -> Self {
        TransformGate { engine, sink }
    }

    /// The wrapped engine.
    #[must_use]
    pub fn engine(&self) -> &RewriteEngine {
        &self.engine
    }
}

impl ClassFileTransformer for TransformGate {
    fn transform(&self, class_name: &str, image: &[u8]) -> Option<Vec<u8>> {
        let profile = self.engine.profile();
        if class_name != profile.class_name {
            return None;
        }

        match self.engine.rewrite(image) {
            Ok((rewritten, report)) => {
                log::debug!("{}", report);
                self.sink
                    .info(&format!("Transformed {}", profile.simple_name()));
                Some(rewritten)
            }
            Err(error) => {
                log::warn!(
                    "Keeping the original {}: {}",
                    profile.display_name(),
                    error
                );
                self.sink.error(&error);
                None
            }
        }
    }
}

impl std::fmt::Debug for TransformGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformGate")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}
