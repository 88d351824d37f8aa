//! fOS JavaScript Runtime
//!
//! QuickJS-based script context and the host-object bridge to native state.
//!
//! Features:
//! - One rquickjs runtime + context per [`ScriptContext`]
//! - Exception bridge into a registered handler
//! - Host objects: native property bags exposed to script through a `Proxy`
//! - DOM node host objects backed by `fos-dom`
//! - Console API routed to `tracing`

mod config;
mod console;
mod context;
mod convert;
mod dom_bindings;
mod host_object;
mod script_value;

pub use config::ScriptConfig;
pub use context::{ExceptionHandler, ScriptContext, ScriptException, MAX_START_LINE};
pub use dom_bindings::{expose_node, install_document, NodeHostObject};
pub use host_object::{DeferredCleanup, DeferredWork, HostObject, HostObjectHandle, PropertyNameAccumulator};
pub use script_value::{ScriptValue, ScriptValueKind};

use fos_dom::DomError;
use std::fmt;

/// Execute JavaScript code in a throwaway context
pub fn eval(code: &str) -> Result<JsValue, JsError> {
    let context = ScriptContext::new(0, ScriptConfig::default(), |_, _| {}, None)?;
    context.evaluate_script(code, "eval", 1)
}

/// JavaScript value
///
/// `Object`, `Array` and `Function` are kind-only snapshots, as returned by
/// evaluation. Values read through host objects and globals arrive as
/// [`ScriptValue`] handles that keep the engine value itself.
#[derive(Debug, Clone, PartialEq)]
pub enum JsValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Object,
    Array,
    Function,
    Script(ScriptValue),
}

impl fmt::Display for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
            Self::Object => f.write_str("[Object]"),
            Self::Array => f.write_str("[Array]"),
            Self::Function => f.write_str("[Function]"),
            Self::Script(v) => match v.kind() {
                ScriptValueKind::Object => f.write_str("[Object]"),
                ScriptValueKind::Array => f.write_str("[Array]"),
                ScriptValueKind::Function => f.write_str("[Function]"),
            },
        }
    }
}

/// JavaScript error
#[derive(Debug, thiserror::Error)]
pub enum JsError {
    #[error("JavaScript error: {0}")]
    Runtime(String),

    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Uncaught {0}")]
    Exception(ScriptException),

    /// Torn-down context or finalized host object
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    #[error(transparent)]
    Dom(#[from] DomError),
}

impl From<rquickjs::Error> for JsError {
    fn from(err: rquickjs::Error) -> Self {
        Self::Runtime(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_simple() {
        let result = eval("1 + 1").unwrap();
        match result {
            JsValue::Number(n) => assert_eq!(n, 2.0),
            _ => panic!("Expected number"),
        }
    }

    #[test]
    fn test_eval_exception() {
        match eval("throw new RangeError('out')") {
            Err(JsError::Exception(e)) => {
                assert_eq!(e.name.as_deref(), Some("RangeError"));
                assert_eq!(e.message, "out");
            }
            other => panic!("Expected exception, got {other:?}"),
        }
    }

    #[test]
    fn test_value_display() {
        assert_eq!(JsValue::Number(1.5).to_string(), "1.5");
        assert_eq!(JsValue::Null.to_string(), "null");
        assert_eq!(JsValue::String("s".into()).to_string(), "s");
    }
}
