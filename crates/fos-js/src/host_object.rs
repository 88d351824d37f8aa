//! Host objects
//!
//! A [`HostObject`] is a native property bag that script sees as an ordinary
//! object. The engine side is a `Proxy` over an empty target whose traps are
//! Rust closures sharing one [`HostSlot`]. When the collector frees the proxy
//! the closures drop, the last reference to the slot goes with them, and the
//! slot finalizes the payload exactly once.
//!
//! Finalization runs wherever the engine happens to collect, with the
//! runtime locked. The payload's `finalize` hook therefore never sees a
//! context; anything that needs one is queued as [`DeferredWork`] and run by
//! [`ScriptContext::drain_finalizations`](crate::ScriptContext::drain_finalizations).

use crate::script_value::ValueTable;
use crate::{JsError, JsValue, ScriptContext};
use rquickjs::function::Constructor;
use rquickjs::{Ctx, Exception, Function, Object, Value};
use std::rc::Rc;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Cleanup that needs a live context, run after finalization
pub type DeferredWork = Box<dyn FnOnce(&ScriptContext) + Send>;

/// Native object exposed to script as a property bag
pub trait HostObject: Send + Sync + 'static {
    /// Name used in diagnostics
    fn class_name(&self) -> &'static str {
        "HostObject"
    }

    /// Read a property. Unknown names read as `undefined`.
    fn get_property(&self, _name: &str) -> Result<JsValue, JsError> {
        Ok(JsValue::Undefined)
    }

    /// Write a property. Without an override every write is rejected the way
    /// strict mode rejects writes to a frozen object.
    fn set_property(&mut self, name: &str, _value: JsValue) -> Result<(), JsError> {
        Err(JsError::TypeError(format!(
            "Cannot assign to read only property '{name}' of object '{}'",
            self.class_name()
        )))
    }

    /// Enumerable property names, in a stable order
    fn property_names(&self, _names: &mut PropertyNameAccumulator) {}

    /// Called once when the script object is collected or the context is
    /// torn down. No engine access is possible here.
    fn finalize(&mut self, _cleanup: &mut DeferredCleanup) {}
}

/// Collects property names for enumeration, dropping duplicates
#[derive(Debug, Default)]
pub struct PropertyNameAccumulator {
    names: Vec<String>,
}

impl PropertyNameAccumulator {
    pub fn add(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.names.contains(&name) {
            self.names.push(name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn into_names(self) -> Vec<String> {
        self.names
    }
}

/// Work queued by [`HostObject::finalize`]
#[derive(Default)]
pub struct DeferredCleanup {
    work: Vec<DeferredWork>,
}

impl DeferredCleanup {
    pub fn defer(&mut self, work: impl FnOnce(&ScriptContext) + Send + 'static) {
        self.work.push(Box::new(work));
    }

    pub fn len(&self) -> usize {
        self.work.len()
    }

    pub fn is_empty(&self) -> bool {
        self.work.is_empty()
    }
}

/// Finalization record sent back to the owning context
pub(crate) struct Disposal {
    pub(crate) id: u64,
    pub(crate) class: &'static str,
    pub(crate) work: Vec<DeferredWork>,
}

/// Shared state behind one proxy
pub(crate) struct HostSlot {
    id: u64,
    class: &'static str,
    object: Mutex<Option<Box<dyn HostObject>>>,
    disposals: Sender<Disposal>,
}

impl HostSlot {
    pub(crate) fn new(id: u64, object: Box<dyn HostObject>, disposals: Sender<Disposal>) -> Self {
        Self {
            id,
            class: object.class_name(),
            object: Mutex::new(Some(object)),
            disposals,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn HostObject>>> {
        self.object.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with<R>(&self, f: impl FnOnce(&mut dyn HostObject) -> R) -> Result<R, JsError> {
        match self.lock().as_mut() {
            Some(object) => Ok(f(object.as_mut())),
            None => Err(JsError::InvalidState("host object has been finalized")),
        }
    }

    fn get(&self, name: &str) -> Result<JsValue, JsError> {
        self.with(|object| object.get_property(name))?
    }

    fn set(&self, name: &str, value: JsValue) -> Result<(), JsError> {
        self.with(|object| object.set_property(name, value))?
    }

    fn names(&self) -> Result<PropertyNameAccumulator, JsError> {
        self.with(|object| {
            let mut names = PropertyNameAccumulator::default();
            object.property_names(&mut names);
            names
        })
    }
}

impl Drop for HostSlot {
    fn drop(&mut self) {
        let object = self
            .object
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut object) = object else { return };

        let mut cleanup = DeferredCleanup::default();
        object.finalize(&mut cleanup);
        drop(object);
        tracing::debug!(id = self.id, class = self.class, deferred = cleanup.len(), "host object finalized");

        let disposal = Disposal { id: self.id, class: self.class, work: cleanup.work };
        if self.disposals.send(disposal).is_err() {
            tracing::debug!(id = self.id, "script context gone, deferred cleanup dropped");
        }
    }
}

/// Native-side weak reference to a host object
#[derive(Clone)]
pub struct HostObjectHandle {
    slot: Weak<HostSlot>,
}

impl std::fmt::Debug for HostObjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostObjectHandle")
            .field("finalized", &self.is_finalized())
            .finish()
    }
}

impl HostObjectHandle {
    pub(crate) fn new(slot: &Arc<HostSlot>) -> Self {
        Self { slot: Arc::downgrade(slot) }
    }

    /// True once the engine has released the script object
    pub fn is_finalized(&self) -> bool {
        self.slot.strong_count() == 0
    }

    pub fn get_property(&self, name: &str) -> Result<JsValue, JsError> {
        self.upgrade()?.get(name)
    }

    pub fn set_property(&self, name: &str, value: JsValue) -> Result<(), JsError> {
        self.upgrade()?.set(name, value)
    }

    /// Run `f` against the live payload
    pub fn with<R>(&self, f: impl FnOnce(&mut dyn HostObject) -> R) -> Result<R, JsError> {
        self.upgrade()?.with(f)
    }

    fn upgrade(&self) -> Result<Arc<HostSlot>, JsError> {
        self.slot
            .upgrade()
            .ok_or(JsError::InvalidState("host object has been finalized"))
    }
}

fn throw(ctx: &Ctx<'_>, err: JsError) -> rquickjs::Error {
    match err {
        JsError::TypeError(message) => Exception::throw_type(ctx, &message),
        other => Exception::throw_message(ctx, &other.to_string()),
    }
}

/// String property key, or `None` for symbols
fn property_key(key: &Value<'_>) -> rquickjs::Result<Option<String>> {
    match key.as_string() {
        Some(s) => s.to_string().map(Some),
        None => Ok(None),
    }
}

/// Build the proxy for `slot`. The slot lives as long as any trap does.
/// Objects and functions written through the proxy are rooted in `values`.
pub(crate) fn create_proxy<'js>(
    ctx: &Ctx<'js>,
    slot: Arc<HostSlot>,
    values: Rc<ValueTable>,
) -> rquickjs::Result<Object<'js>> {
    let target = Object::new(ctx.clone())?;
    let handler = Object::new(ctx.clone())?;

    let s = slot.clone();
    let v = values.clone();
    handler.set(
        "get",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>,
                  _target: Value<'js>,
                  key: Value<'js>,
                  _receiver: Value<'js>|
                  -> rquickjs::Result<Value<'js>> {
                let Some(name) = property_key(&key)? else {
                    return Ok(Value::new_undefined(ctx));
                };
                let value = s.get(&name).map_err(|e| throw(&ctx, e))?;
                v.to_js(&ctx, &value).map_err(|e| throw(&ctx, e))
            },
        )?,
    )?;

    let s = slot.clone();
    let v = values.clone();
    handler.set(
        "set",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>,
                  _target: Value<'js>,
                  key: Value<'js>,
                  value: Value<'js>,
                  _receiver: Value<'js>|
                  -> rquickjs::Result<bool> {
                let Some(name) = property_key(&key)? else {
                    return Err(Exception::throw_type(&ctx, "Symbol-keyed properties are not writable"));
                };
                let value = v.from_js(&ctx, value).map_err(|e| throw(&ctx, e))?;
                s.set(&name, value).map_err(|e| throw(&ctx, e))?;
                Ok(true)
            },
        )?,
    )?;

    let s = slot.clone();
    handler.set(
        "has",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, _target: Value<'js>, key: Value<'js>| -> rquickjs::Result<bool> {
                let Some(name) = property_key(&key)? else { return Ok(false) };
                let names = s.names().map_err(|e| throw(&ctx, e))?;
                Ok(names.contains(&name))
            },
        )?,
    )?;

    let s = slot.clone();
    handler.set(
        "ownKeys",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, _target: Value<'js>| -> rquickjs::Result<Vec<String>> {
                let names = s.names().map_err(|e| throw(&ctx, e))?;
                Ok(names.into_names())
            },
        )?,
    )?;

    let s = slot.clone();
    let v = values.clone();
    handler.set(
        "getOwnPropertyDescriptor",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, _target: Value<'js>, key: Value<'js>| -> rquickjs::Result<Value<'js>> {
                let Some(name) = property_key(&key)? else {
                    return Ok(Value::new_undefined(ctx));
                };
                if !s.names().map_err(|e| throw(&ctx, e))?.contains(&name) {
                    return Ok(Value::new_undefined(ctx));
                }
                let value = s.get(&name).map_err(|e| throw(&ctx, e))?;
                let descriptor = Object::new(ctx.clone())?;
                descriptor.set("value", v.to_js(&ctx, &value).map_err(|e| throw(&ctx, e))?)?;
                descriptor.set("writable", true)?;
                descriptor.set("enumerable", true)?;
                descriptor.set("configurable", true)?;
                Ok(descriptor.into_value())
            },
        )?,
    )?;

    let class = slot.class;
    handler.set(
        "deleteProperty",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, _target: Value<'js>, _key: Value<'js>| -> rquickjs::Result<bool> {
                Err(Exception::throw_type(
                    &ctx,
                    &format!("Cannot delete properties of host object '{class}'"),
                ))
            },
        )?,
    )?;

    // Data descriptors become ordinary writes, so read-only objects still
    // reject them. Accessors have nowhere to live.
    let s = slot.clone();
    handler.set(
        "defineProperty",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>,
                  _target: Value<'js>,
                  key: Value<'js>,
                  descriptor: Object<'js>|
                  -> rquickjs::Result<bool> {
                let Some(name) = property_key(&key)? else {
                    return Err(Exception::throw_type(&ctx, "Symbol-keyed properties are not writable"));
                };
                if descriptor.contains_key("get")? || descriptor.contains_key("set")? {
                    return Err(Exception::throw_type(
                        &ctx,
                        &format!("Cannot define accessor '{name}' on host object '{class}'"),
                    ));
                }
                if !descriptor.contains_key("value")? {
                    return Err(Exception::throw_type(
                        &ctx,
                        &format!("Cannot redefine property '{name}' of host object '{class}'"),
                    ));
                }
                let value = descriptor.get::<_, Value>("value")?;
                let value = values.from_js(&ctx, value).map_err(|e| throw(&ctx, e))?;
                s.set(&name, value).map_err(|e| throw(&ctx, e))?;
                Ok(true)
            },
        )?,
    )?;

    handler.set(
        "preventExtensions",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, _target: Value<'js>| -> rquickjs::Result<bool> {
                Err(Exception::throw_type(
                    &ctx,
                    &format!("Cannot prevent extensions of host object '{class}'"),
                ))
            },
        )?,
    )?;

    handler.set(
        "setPrototypeOf",
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, _target: Value<'js>, _prototype: Value<'js>| -> rquickjs::Result<bool> {
                Err(Exception::throw_type(
                    &ctx,
                    &format!("Cannot set the prototype of host object '{class}'"),
                ))
            },
        )?,
    )?;

    tracing::debug!(id = slot.id, class = slot.class, "host object created");
    drop(slot);

    let proxy: Constructor = ctx.globals().get("Proxy")?;
    proxy.construct((target, handler))
}
