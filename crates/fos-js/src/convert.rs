//! Engine value conversion

use crate::{JsError, JsValue};
use rquickjs::{Array, Ctx, IntoJs, Object, Value};

/// Snapshot an engine value. Objects keep only their kind.
pub(crate) fn from_js(value: &Value<'_>) -> Result<JsValue, JsError> {
    let converted = if value.is_undefined() {
        JsValue::Undefined
    } else if value.is_null() {
        JsValue::Null
    } else if let Some(b) = value.as_bool() {
        JsValue::Bool(b)
    } else if let Some(n) = value.as_number() {
        JsValue::Number(n)
    } else if let Some(s) = value.as_string() {
        JsValue::String(s.to_string()?)
    } else if value.is_array() {
        JsValue::Array
    } else if value.is_function() {
        JsValue::Function
    } else if value.is_object() {
        JsValue::Object
    } else {
        JsValue::Undefined
    };
    Ok(converted)
}

/// Materialize a snapshot in `ctx`. Function snapshots read as `undefined`;
/// object and array snapshots come back empty. Handles only resolve through
/// their context's value table and read as `undefined` here.
pub(crate) fn to_js<'js>(ctx: &Ctx<'js>, value: &JsValue) -> rquickjs::Result<Value<'js>> {
    match value {
        JsValue::Undefined | JsValue::Function | JsValue::Script(_) => Ok(Value::new_undefined(ctx.clone())),
        JsValue::Null => Ok(Value::new_null(ctx.clone())),
        JsValue::Bool(b) => b.into_js(ctx),
        JsValue::Number(n) => n.into_js(ctx),
        JsValue::String(s) => s.as_str().into_js(ctx),
        JsValue::Object => Object::new(ctx.clone())?.into_js(ctx),
        JsValue::Array => Array::new(ctx.clone())?.into_js(ctx),
    }
}
