#![forbid(unsafe_code)]

//! Engine failure taxonomy.
//!
//! None of these is fatal to the host. Each is logged where it is absorbed
//! and kept in the engine's diagnostics list so hosts and tests can inspect
//! what was skipped.

use std::fmt;
use std::time::Duration;

use guidepost_core::ElementHandle;
use guidepost_core::renderer::RendererError;
use guidepost_core::surface::HostError;

use crate::catalog::ContextId;

/// A non-fatal engine failure.
#[derive(Debug, Clone, PartialEq)]
pub enum TourError {
    /// A declared target did not exist when it was needed.
    MissingTarget { context: ContextId, locator: String },
    /// A start precondition never held within its bound.
    ReadinessTimeout { context: ContextId, waited: Duration },
    /// The renderer could not be configured; the engine is inert.
    RendererUnavailable(RendererError),
    /// Fullscreen did not engage in time; the tour ran without it.
    FullscreenTimeout { waited: Duration },
    /// Restoring one element failed; the others were still restored.
    RestorationFailure {
        element: ElementHandle,
        source: HostError,
    },
}

impl fmt::Display for TourError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTarget { context, locator } => {
                write!(f, "target {locator:?} missing in context {context}")
            }
            Self::ReadinessTimeout { context, waited } => write!(
                f,
                "context {context} not ready after {}ms",
                waited.as_millis()
            ),
            Self::RendererUnavailable(err) => write!(f, "{err}"),
            Self::FullscreenTimeout { waited } => write!(
                f,
                "fullscreen did not engage within {}ms",
                waited.as_millis()
            ),
            Self::RestorationFailure { element, source } => {
                write!(f, "failed to restore {element}: {source}")
            }
        }
    }
}

impl std::error::Error for TourError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::RendererUnavailable(err) => Some(err),
            Self::RestorationFailure { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<RendererError> for TourError {
    fn from(err: RendererError) -> Self {
        Self::RendererUnavailable(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn display_messages() {
        let err = TourError::MissingTarget {
            context: ContextId::new("home"),
            locator: "#chat".into(),
        };
        assert_eq!(err.to_string(), "target \"#chat\" missing in context home");

        let err = TourError::FullscreenTimeout {
            waited: Duration::from_secs(2),
        };
        assert_eq!(err.to_string(), "fullscreen did not engage within 2000ms");
    }

    #[test]
    fn restoration_failure_has_source() {
        let err = TourError::RestorationFailure {
            element: ElementHandle(7),
            source: HostError::Detached(ElementHandle(7)),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("el#7"));
    }
}
