use crate::xdm::ExpandedName;
use core::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Generic error
    FOER0000,
    XPTY0004, // type error
    XPST0008, // undeclared variable
    // XQuery Update Facility: dynamic errors
    XUDY0009, // replace node: target has no parent
    XUDY0014, // modify clause targets a node that was not copied
    XUDY0015, // duplicate rename target
    XUDY0016, // duplicate replace node target
    XUDY0017, // duplicate replace value / replace element content target
    XUDY0024, // conflicting namespace bindings on one element
    XUDY0029, // insert before/after: target has no parent
    XUDY0031, // duplicate put uri
    XUDY0037, // put inside a modify clause
    // XQuery Update Facility: type errors
    XUTY0004, // attribute content where only children are allowed
    XUTY0005, // insert into: target not an element or document
    XUTY0006, // insert before/after: target is not a child node
    XUTY0008, // replace: unsuitable target
    XUTY0010, // replace node: attribute replacement for a child node
    XUTY0011, // replace node: non-attribute replacement for an attribute
    XUTY0012, // rename: unsuitable target
    XUTY0013, // copy source is not exactly one node
    XUTY0022, // insert attributes: target not an element
    // Project specific
    INT0000,  // internal consistency violation (fatal)
    HOST0000, // host tree rejected a call
    UPD0001,  // update target is not a real host node
    EVAL0001, // cursor stayed pending past the poll budget
    NYI0000,  // not yet implemented
    // Fallback / unknown (kept last)
    Unknown,
}

/// ErrorCode notes:
/// - W3C codes keep their standard names; project codes share the `err` namespace.
/// - Use `Error::code_enum()` for structured handling instead of matching raw strings.
impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::FOER0000 => "FOER0000",
            ErrorCode::XPTY0004 => "XPTY0004",
            ErrorCode::XPST0008 => "XPST0008",
            ErrorCode::XUDY0009 => "XUDY0009",
            ErrorCode::XUDY0014 => "XUDY0014",
            ErrorCode::XUDY0015 => "XUDY0015",
            ErrorCode::XUDY0016 => "XUDY0016",
            ErrorCode::XUDY0017 => "XUDY0017",
            ErrorCode::XUDY0024 => "XUDY0024",
            ErrorCode::XUDY0029 => "XUDY0029",
            ErrorCode::XUDY0031 => "XUDY0031",
            ErrorCode::XUDY0037 => "XUDY0037",
            ErrorCode::XUTY0004 => "XUTY0004",
            ErrorCode::XUTY0005 => "XUTY0005",
            ErrorCode::XUTY0006 => "XUTY0006",
            ErrorCode::XUTY0008 => "XUTY0008",
            ErrorCode::XUTY0010 => "XUTY0010",
            ErrorCode::XUTY0011 => "XUTY0011",
            ErrorCode::XUTY0012 => "XUTY0012",
            ErrorCode::XUTY0013 => "XUTY0013",
            ErrorCode::XUTY0022 => "XUTY0022",
            ErrorCode::INT0000 => "INT0000",
            ErrorCode::HOST0000 => "HOST0000",
            ErrorCode::UPD0001 => "UPD0001",
            ErrorCode::EVAL0001 => "EVAL0001",
            ErrorCode::NYI0000 => "NYI0000",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }

    /// Returns the QName (ExpandedName) for this error code.
    /// Namespace: http://www.w3.org/2005/xqt-errors
    pub fn qname(&self) -> ExpandedName {
        ExpandedName {
            ns_uri: Some(ERR_NS.to_string()),
            local: self.as_str().to_string(),
        }
    }

    pub fn from_code(s: &str) -> Self {
        use ErrorCode::*;
        match s.strip_prefix("err:").unwrap_or(s) {
            "FOER0000" => FOER0000,
            "XPTY0004" => XPTY0004,
            "XPST0008" => XPST0008,
            "XUDY0009" => XUDY0009,
            "XUDY0014" => XUDY0014,
            "XUDY0015" => XUDY0015,
            "XUDY0016" => XUDY0016,
            "XUDY0017" => XUDY0017,
            "XUDY0024" => XUDY0024,
            "XUDY0029" => XUDY0029,
            "XUDY0031" => XUDY0031,
            "XUDY0037" => XUDY0037,
            "XUTY0004" => XUTY0004,
            "XUTY0005" => XUTY0005,
            "XUTY0006" => XUTY0006,
            "XUTY0008" => XUTY0008,
            "XUTY0010" => XUTY0010,
            "XUTY0011" => XUTY0011,
            "XUTY0012" => XUTY0012,
            "XUTY0013" => XUTY0013,
            "XUTY0022" => XUTY0022,
            "INT0000" => INT0000,
            "HOST0000" => HOST0000,
            "UPD0001" => UPD0001,
            "EVAL0001" => EVAL0001,
            "NYI0000" => NYI0000,
            _ => Unknown,
        }
    }
}

/// Namespace URI used for W3C-defined XPath/XQuery error codes (xqt-errors).
pub use crate::consts::ERR_NS;

/// Shared chained cause attached to an [`Error`].
pub type ErrorSource = Arc<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, thiserror::Error)]
pub struct Error {
    pub code: ExpandedName,
    pub message: String,
    #[source]
    pub source: Option<ErrorSource>, // optional chained cause
}

impl Error {
    pub fn new_qname(code: ExpandedName, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            source: None,
        }
    }

    pub fn from_code(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self::new_qname(code.qname(), msg)
    }

    /// An invariant of the pointer model was broken by the caller. Never recovered.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::INT0000, msg)
    }

    /// The host tree refused a construction or mutation call.
    pub fn host(msg: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::HOST0000, msg)
    }

    pub fn not_implemented(feature: &str) -> Self {
        Self::from_code(ErrorCode::NYI0000, format!("not implemented: {}", feature))
    }

    pub fn code_enum(&self) -> ErrorCode {
        // Only ERR_NS codes map to the enum; others are Unknown.
        if self.code.ns_uri.as_deref() == Some(ERR_NS) {
            ErrorCode::from_code(&self.code.local)
        } else {
            ErrorCode::Unknown
        }
    }

    /// Internal-consistency violations abort the evaluation; everything else is
    /// raised before any document mutation and may be handled by the caller.
    pub fn is_fatal(&self) -> bool {
        self.code_enum() == ErrorCode::INT0000
    }

    /// Format the code as a human-readable string (err:LOCAL or Q{ns}local).
    pub fn format_code(&self) -> String {
        if self.code.ns_uri.as_deref() == Some(ERR_NS) {
            format!("err:{}", self.code.local)
        } else if let Some(ns) = &self.code.ns_uri {
            format!("Q{{{}}}{}", ns, self.code.local)
        } else {
            self.code.local.clone()
        }
    }

    /// Compose an error with a source cause.
    pub fn with_source(
        mut self,
        source: impl Into<Option<ErrorSource>>,
    ) -> Self {
        self.source = source.into();
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error: {} ({})", self.message, self.format_code())
    }
}

/// Knobs that apply to one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationOptions {
    /// How often `drive` re-polls a cursor that reports `Pending` before giving up.
    /// `None` polls until the cursor makes progress.
    pub max_pending_polls: Option<usize>,
    /// Copy real (non-grafted) nodes used as insertion content instead of moving them
    /// out of their current parent.
    pub copy_inserted_content: bool,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            max_pending_polls: Some(10_000),
            copy_inserted_content: true,
        }
    }
}

pub struct EvaluationOptionsBuilder {
    options: EvaluationOptions,
}

impl Default for EvaluationOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EvaluationOptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: EvaluationOptions::default(),
        }
    }

    pub fn with_max_pending_polls(mut self, polls: usize) -> Self {
        self.options.max_pending_polls = Some(polls);
        self
    }

    pub fn with_unbounded_polling(mut self) -> Self {
        self.options.max_pending_polls = None;
        self
    }

    pub fn with_copy_inserted_content(mut self, copy: bool) -> Self {
        self.options.copy_inserted_content = copy;
        self
    }

    pub fn build(self) -> EvaluationOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_round_trips_through_qname() {
        let err = Error::from_code(ErrorCode::XUDY0015, "duplicate rename");
        assert_eq!(err.code_enum(), ErrorCode::XUDY0015);
        assert_eq!(err.format_code(), "err:XUDY0015");
        assert!(!err.is_fatal());
        assert!(Error::internal("broken graft").is_fatal());
    }

    #[test]
    fn foreign_codes_are_unknown() {
        let err = Error::new_qname(ExpandedName::new(Some("urn:x".into()), "E1"), "custom");
        assert_eq!(err.code_enum(), ErrorCode::Unknown);
        assert_eq!(err.format_code(), "Q{urn:x}E1");
    }

    #[test]
    fn builder_overrides_defaults() {
        let opts = EvaluationOptionsBuilder::new()
            .with_unbounded_polling()
            .with_copy_inserted_content(false)
            .build();
        assert_eq!(opts.max_pending_polls, None);
        assert!(!opts.copy_inserted_content);
    }
}
