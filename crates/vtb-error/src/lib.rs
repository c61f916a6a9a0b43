// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error kinds shared by every layer of the vector tool bridge.
//!
//! Every failure that can reach a caller carries an [`ErrorKind`] (a stable,
//! machine-readable tag), a human-readable message, an optional `detail`
//! holding the backend's own wording, and arbitrary key-value context for
//! logs. Use the builder returned by [`BridgeError::new`] to construct errors
//! fluently.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Message shown to callers in place of any [`ErrorKind::Internal`] text.
pub const INTERNAL_MESSAGE: &str = "internal bridge error";

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Which side of the bridge an [`ErrorKind`] blames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The invocation itself is wrong; retrying unchanged will fail again.
    Caller,
    /// The vector store failed or refused the request.
    Backend,
    /// The bridge could not handle an otherwise valid request.
    Bridge,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Caller => "caller",
            Self::Backend => "backend",
            Self::Bridge => "bridge",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Stable failure tag carried by every [`BridgeError`].
///
/// Serialises to the variant name (`"InvalidArgument"`, ...) which is part of
/// the tool-call wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ErrorKind {
    /// No tool with the requested name is registered.
    UnknownTool,
    /// Argument validation failed, including a missing confirmation on a
    /// destructive tool.
    InvalidArgument,
    /// A logical name or scope would break collection isolation.
    NamespaceConflict,
    /// Connection failure, timeout or 5xx from the backend.
    BackendUnavailable,
    /// The backend answered with a well-formed refusal.
    BackendRejected,
    /// A filter or query construct has no backend encoding.
    TranslationUnsupported,
    /// Anything unclassified.
    Internal,
}

impl ErrorKind {
    /// Returns the [`ErrorCategory`] this kind belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownTool
            | Self::InvalidArgument
            | Self::NamespaceConflict
            | Self::TranslationUnsupported => ErrorCategory::Caller,
            Self::BackendUnavailable | Self::BackendRejected => ErrorCategory::Backend,
            Self::Internal => ErrorCategory::Bridge,
        }
    }

    /// Stable string form, identical to the serialised value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownTool => "UnknownTool",
            Self::InvalidArgument => "InvalidArgument",
            Self::NamespaceConflict => "NamespaceConflict",
            Self::BackendUnavailable => "BackendUnavailable",
            Self::BackendRejected => "BackendRejected",
            Self::TranslationUnsupported => "TranslationUnsupported",
            Self::Internal => "Internal",
        }
    }

    /// `true` only for failures a caller may retry unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::BackendUnavailable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// BridgeError
// ---------------------------------------------------------------------------

/// Unified bridge error.
///
/// # Builder usage
///
/// ```
/// use vtb_error::{BridgeError, ErrorKind};
///
/// let err = BridgeError::new(ErrorKind::BackendRejected, "collection refused the write")
///     .with_detail("Wrong input: Vector dimension error: expected dim: 384, got 3")
///     .with_context("collection", "kb");
/// assert_eq!(err.kind, ErrorKind::BackendRejected);
/// ```
pub struct BridgeError {
    /// Machine-readable kind.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// The backend's own message, preserved verbatim.
    pub detail: Option<String>,
    /// Optional underlying cause. Never shown to callers.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl BridgeError {
    /// Create a new error with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// An [`ErrorKind::InvalidArgument`] naming the offending field.
    pub fn invalid_argument(field: impl Into<String>, reason: impl fmt::Display) -> Self {
        let field = field.into();
        Self::new(
            ErrorKind::InvalidArgument,
            format!("invalid argument `{field}`: {reason}"),
        )
        .with_context("field", field)
    }

    /// An [`ErrorKind::UnknownTool`] for `name`.
    pub fn unknown_tool(name: &str) -> Self {
        Self::new(ErrorKind::UnknownTool, format!("unknown tool `{name}`"))
            .with_context("tool", name)
    }

    /// An [`ErrorKind::Internal`] error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Attach the backend's own message.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.kind.category()`.
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// The argument named by an [`ErrorKind::InvalidArgument`], if any.
    pub fn field(&self) -> Option<&str> {
        self.context.get("field").and_then(|v| v.as_str())
    }

    /// The caller-facing projection of this error.
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload::from(self)
    }
}

impl fmt::Debug for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("BridgeError");
        d.field("kind", &self.kind);
        d.field("message", &self.message);
        if let Some(ref detail) = self.detail {
            d.field("detail", detail);
        }
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.as_str(), self.message)?;
        if !self.context.is_empty() {
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal("failed to encode tool output").with_source(err)
    }
}

// ---------------------------------------------------------------------------
// Wire form
// ---------------------------------------------------------------------------

/// The `error` object of a failed tool result.
///
/// Internal errors are sanitised: their message is replaced with
/// [`INTERNAL_MESSAGE`] and no detail is carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorPayload {
    /// Error kind.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Backend message, when the backend produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<&BridgeError> for ErrorPayload {
    fn from(err: &BridgeError) -> Self {
        if err.kind == ErrorKind::Internal {
            return Self {
                kind: ErrorKind::Internal,
                message: INTERNAL_MESSAGE.to_string(),
                detail: None,
            };
        }
        Self {
            kind: err.kind,
            message: err.message.clone(),
            detail: err.detail.clone(),
        }
    }
}

impl From<ErrorPayload> for BridgeError {
    fn from(payload: ErrorPayload) -> Self {
        let mut err = Self::new(payload.kind, payload.message);
        err.detail = payload.detail;
        err
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
