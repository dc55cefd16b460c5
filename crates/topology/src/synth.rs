//! Port through which a stack is rendered into a deployment template.
//!
//! The domain crate decides *what* is deployed; an adapter crate decides the
//! template format. Implementations must validate the stack before rendering
//! and must not add resources of their own.

use crate::{Stack, SynthesisError};

/// Renders a [`Stack`] into a concrete template.
pub trait TemplateSynthesizer {
    /// The rendered template.
    type Template;

    /// Validates `stack` and renders it.
    fn synthesize(&self, stack: &Stack) -> Result<Self::Template, SynthesisError>;
}
