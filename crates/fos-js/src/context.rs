//! Script context
//!
//! One QuickJS runtime and global context per realm, plus the exception
//! bridge, the interned string queue and the finalization drain.
//!
//! Teardown order matters: the context is marked invalid, the collector
//! runs, pending finalizations drain, interned strings are released, and
//! only then are the context and runtime dropped. Dropping the runtime
//! finalizes whatever host objects were still reachable, so the queue is
//! drained once more afterwards.

use crate::host_object::{self, Disposal, HostObject, HostObjectHandle, HostSlot};
use crate::script_value::ValueTable;
use crate::{console, convert, JsError, JsValue, ScriptConfig};
use rquickjs::{Context, Ctx, Object, Persistent, Runtime, Value};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

/// Largest `start_line` accepted by [`ScriptContext::evaluate_script`]
pub const MAX_START_LINE: u32 = 1 << 20;

/// Receives every uncaught exception with the id of the reporting context
pub type ExceptionHandler = Box<dyn Fn(i32, &ScriptException)>;

/// Script exception converted out of the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptException {
    /// Error class (`TypeError`, ...) when the thrown value was an error object
    pub name: Option<String>,
    pub message: String,
    pub stack: Option<String>,
    /// Source the failing evaluation was started with
    pub source_url: String,
}

impl ScriptException {
    fn from_value(value: &Value<'_>, source_url: &str) -> Self {
        let text = |key: &str| {
            value
                .as_object()
                .and_then(|o| o.get::<_, Option<String>>(key).ok().flatten())
        };
        let message = text("message").unwrap_or_else(|| {
            convert::from_js(value).map(|v| v.to_string()).unwrap_or_default()
        });
        Self {
            name: text("name"),
            message,
            stack: text("stack"),
            source_url: source_url.to_string(),
        }
    }

    fn internal(err: &rquickjs::Error, source_url: &str) -> Self {
        Self {
            name: Some("InternalError".into()),
            message: err.to_string(),
            stack: None,
            source_url: source_url.to_string(),
        }
    }
}

impl fmt::Display for ScriptException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}: {}", self.message)?,
            None => f.write_str(&self.message)?,
        }
        write!(f, " ({})", self.source_url)
    }
}

struct Engine {
    // Declared before the runtime so it drops first.
    context: Context,
    runtime: Runtime,
}

/// Resets the re-entrancy flag when the engine scope ends
struct Entered<'a>(&'a Cell<bool>);

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// JavaScript context with the host-object bridge installed
pub struct ScriptContext {
    context_id: i32,
    engine: RefCell<Option<Engine>>,
    entered: Cell<bool>,
    strings: RefCell<VecDeque<Persistent<rquickjs::String<'static>>>>,
    values: Rc<ValueTable>,
    handler: ExceptionHandler,
    owner: Option<Weak<dyn Any>>,
    disposal_tx: Sender<Disposal>,
    disposal_rx: Receiver<Disposal>,
    next_host_id: Cell<u64>,
}

impl fmt::Debug for ScriptContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptContext")
            .field("context_id", &self.context_id)
            .field("valid", &self.is_valid())
            .field("interned", &self.strings.borrow().len())
            .field("held_values", &self.values.len())
            .finish()
    }
}

impl ScriptContext {
    /// Create a runtime and a full global context
    pub fn new(
        context_id: i32,
        config: ScriptConfig,
        handler: impl Fn(i32, &ScriptException) + 'static,
        owner: Option<Weak<dyn Any>>,
    ) -> Result<Self, JsError> {
        let runtime = Runtime::new()?;
        runtime.set_memory_limit(config.memory_limit);
        runtime.set_gc_threshold(config.gc_threshold);
        runtime.set_max_stack_size(config.max_stack_size);

        let context = Context::full(&runtime)?;
        if config.install_console {
            context.with(|ctx| console::install_console(&ctx))?;
        }

        let (disposal_tx, disposal_rx) = mpsc::channel();
        tracing::info!(context_id, memory_limit = config.memory_limit, "Creating script context");

        Ok(Self {
            context_id,
            engine: RefCell::new(Some(Engine { context, runtime })),
            entered: Cell::new(false),
            strings: RefCell::new(VecDeque::new()),
            values: Rc::new(ValueTable::new()),
            handler: Box::new(handler),
            owner,
            disposal_tx,
            disposal_rx,
            next_host_id: Cell::new(1),
        })
    }

    pub fn context_id(&self) -> i32 {
        self.context_id
    }

    /// False once [`ScriptContext::teardown`] has run
    pub fn is_valid(&self) -> bool {
        self.engine.borrow().is_some()
    }

    /// The embedder object this context was created for, if still alive
    pub fn owner<T: Any>(&self) -> Option<Rc<T>> {
        self.owner.as_ref()?.upgrade()?.downcast::<T>().ok()
    }

    /// Enter the engine. Nested entry is refused rather than deadlocking
    /// on the runtime lock.
    pub fn with<F, R>(&self, f: F) -> Result<R, JsError>
    where
        F: for<'js> FnOnce(Ctx<'js>) -> Result<R, JsError>,
    {
        let engine = self.engine.borrow();
        let Some(engine) = engine.as_ref() else {
            tracing::warn!(context_id = self.context_id, "script context used after teardown");
            return Err(JsError::InvalidState("script context has been torn down"));
        };
        if self.entered.replace(true) {
            return Err(JsError::InvalidState("script context is already entered"));
        }
        let _entered = Entered(&self.entered);
        engine.context.with(f)
    }

    /// Evaluate narrow source. `start_line` is the 1-based line the source
    /// starts at in `source_url`, so engine line numbers match the document.
    /// Lines past [`MAX_START_LINE`] are refused with `InvalidState`.
    pub fn evaluate_script(&self, code: &str, source_url: &str, start_line: u32) -> Result<JsValue, JsError> {
        tracing::debug!(context_id = self.context_id, source_url, bytes = code.len(), "Evaluating script");
        if start_line > MAX_START_LINE {
            tracing::warn!(context_id = self.context_id, source_url, start_line, "start line out of range");
            return Err(JsError::InvalidState("start line out of range"));
        }
        let padding = start_line.saturating_sub(1) as usize;
        let mut source = String::with_capacity(padding + code.len());
        source.extend(std::iter::repeat_n('\n', padding));
        source.push_str(code);

        self.with(|ctx| {
            let completion = ctx.eval::<Value, _>(source);
            match completion {
                Ok(value) => convert::from_js(&value),
                Err(err) => Err(JsError::Exception(self.report_exception(&ctx, &err, source_url))),
            }
        })
    }

    /// Evaluate UTF-16 source; unpaired surrogates become U+FFFD
    pub fn evaluate_script_utf16(&self, code: &[u16], source_url: &str, start_line: u32) -> Result<JsValue, JsError> {
        self.evaluate_script(&String::from_utf16_lossy(code), source_url, start_line)
    }

    /// Report `completion` to the exception handler if it is a thrown value.
    /// Returns whether it was.
    pub fn handle_exception<T>(&self, ctx: &Ctx<'_>, completion: &rquickjs::Result<T>) -> bool {
        match completion {
            Ok(_) => false,
            Err(err) => {
                self.report_exception(ctx, err, "<native>");
                true
            }
        }
    }

    fn report_exception(&self, ctx: &Ctx<'_>, err: &rquickjs::Error, source_url: &str) -> ScriptException {
        let exception = match err {
            rquickjs::Error::Exception => ScriptException::from_value(&ctx.catch(), source_url),
            other => ScriptException::internal(other, source_url),
        };
        tracing::error!(context_id = self.context_id, "[JS] Uncaught {exception}");
        (self.handler)(self.context_id, &exception);
        exception
    }

    /// Create an engine string that lives until teardown
    pub fn emplace_global_string<'js>(&self, ctx: &Ctx<'js>, value: &str) -> Result<rquickjs::String<'js>, JsError> {
        let string = rquickjs::String::from_str(ctx.clone(), value)?;
        self.strings
            .borrow_mut()
            .push_back(Persistent::save(ctx, string.clone()));
        Ok(string)
    }

    /// [`ScriptContext::emplace_global_string`] outside an engine scope
    pub fn intern(&self, value: &str) -> Result<(), JsError> {
        self.with(|ctx| self.emplace_global_string(&ctx, value).map(|_| ()))
    }

    pub fn interned_count(&self) -> usize {
        self.strings.borrow().len()
    }

    /// Interned strings in insertion order
    pub fn interned_strings(&self) -> Result<Vec<String>, JsError> {
        self.with(|ctx| {
            self.strings
                .borrow()
                .iter()
                .map(|s| Ok(s.clone().restore(&ctx)?.to_string()?))
                .collect()
        })
    }

    pub fn set_global(&self, name: &str, value: &JsValue) -> Result<(), JsError> {
        self.with(|ctx| {
            let value = self.values.to_js(&ctx, value)?;
            ctx.globals().set(name, value)?;
            Ok(())
        })
    }

    /// Read a global. Objects and functions come back as handles.
    pub fn get_global(&self, name: &str) -> Result<JsValue, JsError> {
        self.with(|ctx| {
            let value: Value = ctx.globals().get(name)?;
            self.values.from_js(&ctx, value)
        })
    }

    /// Engine values currently kept alive for native handles
    pub fn held_values(&self) -> usize {
        self.values.len()
    }

    /// Wrap `object` in a script proxy inside an open engine scope
    pub fn create_host_object<'js, H: HostObject>(
        &self,
        ctx: &Ctx<'js>,
        object: H,
    ) -> Result<(Object<'js>, HostObjectHandle), JsError> {
        let id = self.next_host_id.get();
        self.next_host_id.set(id + 1);
        let slot = Arc::new(HostSlot::new(id, Box::new(object), self.disposal_tx.clone()));
        let handle = HostObjectHandle::new(&slot);
        let proxy = host_object::create_proxy(ctx, slot, self.values.clone())?;
        Ok((proxy, handle))
    }

    /// Expose `object` as the global `name`
    pub fn expose<H: HostObject>(&self, name: &str, object: H) -> Result<HostObjectHandle, JsError> {
        self.with(|ctx| {
            let (proxy, handle) = self.create_host_object(&ctx, object)?;
            ctx.globals().set(name, proxy)?;
            Ok(handle)
        })
    }

    /// Force a full collection
    pub fn run_gc(&self) -> Result<(), JsError> {
        if self.entered.get() {
            return Err(JsError::InvalidState("cannot collect inside an engine scope"));
        }
        match self.engine.borrow().as_ref() {
            Some(engine) => {
                engine.runtime.run_gc();
                Ok(())
            }
            None => Err(JsError::InvalidState("script context has been torn down")),
        }
    }

    /// Run cleanup queued by finalized host objects and free engine values
    /// whose handles are gone. Must not be called from inside
    /// [`ScriptContext::with`] if the work re-enters the engine.
    pub fn drain_finalizations(&self) -> usize {
        let released = self.values.collect_released();
        if released > 0 {
            tracing::trace!(released, "released held values");
        }
        let mut drained = 0;
        while let Ok(disposal) = self.disposal_rx.try_recv() {
            tracing::trace!(id = disposal.id, class = disposal.class, "draining finalization");
            for work in disposal.work {
                work(self);
            }
            drained += 1;
        }
        drained
    }

    /// Release the engine. Every later operation fails with `InvalidState`.
    pub fn teardown(&self) {
        if self.entered.get() {
            tracing::warn!(context_id = self.context_id, "teardown requested inside an engine scope");
            return;
        }
        let Some(engine) = self.engine.borrow_mut().take() else {
            tracing::warn!(context_id = self.context_id, "teardown of an invalid script context");
            return;
        };
        engine.runtime.run_gc();
        let collected = self.drain_finalizations();

        let released = {
            let mut strings = self.strings.borrow_mut();
            let count = strings.len();
            strings.clear();
            count
        };
        let held = self.values.clear();
        drop(engine);
        let late = self.drain_finalizations();

        tracing::info!(context_id = self.context_id, collected, late, released, held, "Script context torn down");
    }
}

impl Drop for ScriptContext {
    fn drop(&mut self) {
        if self.is_valid() {
            self.teardown();
        }
    }
}
