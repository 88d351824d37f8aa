//! Engine values held from native code
//!
//! Objects, arrays and functions that cross into native code keep their
//! identity. Native code gets a [`ScriptValue`] handle while the engine value
//! stays rooted in its context's [`ValueTable`]. Dropping the last clone of a
//! handle only queues the entry for release, so handles may be dropped
//! anywhere, including from a finalizer or after teardown. The table frees
//! queued entries the next time it is used with the runtime alive.

use crate::{convert, JsError, JsValue};
use rquickjs::{Ctx, Persistent, Value};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);

/// What a [`ScriptValue`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptValueKind {
    Object,
    Array,
    Function,
}

struct Held {
    table: u64,
    slot: u64,
    kind: ScriptValueKind,
    release: Sender<u64>,
}

impl Drop for Held {
    fn drop(&mut self) {
        // The table is gone once its context is torn down
        let _ = self.release.send(self.slot);
    }
}

/// Native handle to an engine object, array or function. Clones share one
/// table entry and compare equal; separately kept values never do, even
/// when they refer to the same engine object.
#[derive(Clone)]
pub struct ScriptValue(Arc<Held>);

impl ScriptValue {
    pub fn kind(&self) -> ScriptValueKind {
        self.0.kind
    }
}

impl PartialEq for ScriptValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptValue")
            .field("kind", &self.0.kind)
            .field("table", &self.0.table)
            .field("slot", &self.0.slot)
            .finish()
    }
}

/// Engine values rooted on behalf of [`ScriptValue`] handles
pub(crate) struct ValueTable {
    id: u64,
    entries: RefCell<HashMap<u64, Persistent<Value<'static>>>>,
    next_slot: Cell<u64>,
    release_tx: Sender<u64>,
    release_rx: Receiver<u64>,
}

impl ValueTable {
    pub(crate) fn new() -> Self {
        let (release_tx, release_rx) = mpsc::channel();
        Self {
            id: NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed),
            entries: RefCell::new(HashMap::new()),
            next_slot: Cell::new(1),
            release_tx,
            release_rx,
        }
    }

    /// Convert an engine value, keeping objects, arrays and functions alive
    /// behind a handle. Primitives are copied.
    pub(crate) fn from_js<'js>(&self, ctx: &Ctx<'js>, value: Value<'js>) -> Result<JsValue, JsError> {
        let kind = if value.is_function() {
            ScriptValueKind::Function
        } else if value.is_array() {
            ScriptValueKind::Array
        } else if value.is_object() {
            ScriptValueKind::Object
        } else {
            return convert::from_js(&value);
        };
        self.collect_released();

        let slot = self.next_slot.get();
        self.next_slot.set(slot + 1);
        self.entries.borrow_mut().insert(slot, Persistent::save(ctx, value));
        Ok(JsValue::Script(ScriptValue(Arc::new(Held {
            table: self.id,
            slot,
            kind,
            release: self.release_tx.clone(),
        }))))
    }

    /// Materialize a value in `ctx`. Handles restore the very engine value
    /// they were created from.
    pub(crate) fn to_js<'js>(&self, ctx: &Ctx<'js>, value: &JsValue) -> Result<Value<'js>, JsError> {
        let JsValue::Script(held) = value else {
            return Ok(convert::to_js(ctx, value)?);
        };
        if held.0.table != self.id {
            return Err(JsError::InvalidState("script value belongs to another context"));
        }
        let entry = self
            .entries
            .borrow()
            .get(&held.0.slot)
            .cloned()
            .ok_or(JsError::InvalidState("script value has been released"))?;
        Ok(entry.restore(ctx)?)
    }

    /// Free entries whose handles are all gone. Needs the runtime alive.
    pub(crate) fn collect_released(&self) -> usize {
        let mut released = Vec::new();
        {
            let mut entries = self.entries.borrow_mut();
            while let Ok(slot) = self.release_rx.try_recv() {
                released.extend(entries.remove(&slot));
            }
        }
        // Freed outside the borrow: freeing may finalize host objects
        released.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Free every entry; outstanding handles become dangling
    pub(crate) fn clear(&self) -> usize {
        let entries = std::mem::take(&mut *self.entries.borrow_mut());
        let count = entries.len();
        drop(entries);
        while self.release_rx.try_recv().is_ok() {}
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquickjs::{Context, Runtime};

    #[test]
    fn test_objects_keep_identity() {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        let table = ValueTable::new();

        context.with(|ctx| {
            let object: Value = ctx.eval("globalThis.kept = {a: 1}; kept").unwrap();
            let held = table.from_js(&ctx, object).unwrap();
            let JsValue::Script(handle) = &held else { panic!("Expected handle") };
            assert_eq!(handle.kind(), ScriptValueKind::Object);
            assert_eq!(held.clone(), held);

            let back = table.to_js(&ctx, &held).unwrap();
            ctx.globals().set("back", back).unwrap();
            let same: bool = ctx.eval("back === kept && back.a === 1").unwrap();
            assert!(same);

            let number = table.from_js(&ctx, ctx.eval::<Value, _>("3").unwrap()).unwrap();
            assert_eq!(number, JsValue::Number(3.0));
            assert_eq!(table.len(), 1);

            drop(held);
            assert_eq!(table.collect_released(), 1);
            assert_eq!(table.len(), 0);
        });
    }

    #[test]
    fn test_foreign_and_released_handles() {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        let table = ValueTable::new();
        let other = ValueTable::new();

        context.with(|ctx| {
            let func: Value = ctx.eval("(() => 5)").unwrap();
            let held = table.from_js(&ctx, func).unwrap();
            assert!(matches!(other.to_js(&ctx, &held), Err(JsError::InvalidState(_))));

            assert_eq!(table.clear(), 1);
            assert!(matches!(table.to_js(&ctx, &held), Err(JsError::InvalidState(_))));
        });
    }
}
