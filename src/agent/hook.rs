//! The load hook seam.
//!
//! A host runtime calls [`TransformerRegistry::on_class_load`] for every class image about to
//! be defined. Transformers never fail a load: they either return a replacement image or
//! nothing.

use std::borrow::Cow;

/// Inspects, and possibly replaces, class images at load time.
pub trait ClassFileTransformer: Send + Sync {
    /// Replacement for the image of `class_name` (internal form, `a/b/C`), or `None` to keep
    /// the image as loaded.
    fn transform(&self, class_name: &str, image: &[u8]) -> Option<Vec<u8>>;
}

/// Where transformers get registered.
pub trait Instrumentation {
    /// Register a transformer; it sees every class loaded afterwards.
    fn add_transformer(&mut self, transformer: Box<dyn ClassFileTransformer>);
}

/// Ordered list of transformers, each one sees the output of the previous one.
#[derive(Default)]
pub struct TransformerRegistry {
    transformers: Vec<Box<dyn ClassFileTransformer>>,
}

impl TransformerRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered transformers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    /// Run every transformer over `image`.
    ///
    /// Borrows the input when no transformer replaced it.
    pub fn on_class_load<'a>(&self, class_name: &str, image: &'a [u8]) -> Cow<'a, [u8]> {
        let mut current = Cow::Borrowed(image);
        for transformer in &self.transformers {
            if let Some(replacement) = transformer.transform(class_name, &current) {
                current = Cow::Owned(replacement);
            }
        }
        current
    }
}

impl Instrumentation for TransformerRegistry {
    fn add_transformer(&mut self, transformer: Box<dyn ClassFileTransformer>) {
        self.transformers.push(transformer);
    }
}

impl std::fmt::Debug for TransformerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformerRegistry")
            .field("transformers", &self.transformers.len())
            .finish()
    }
}
