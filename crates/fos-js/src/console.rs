//! Console API
//!
//! `console.log`/`info`/`warn`/`error`/`debug` routed to `tracing` with a
//! `[JS]` prefix.

use crate::convert;
use rquickjs::function::Rest;
use rquickjs::{Ctx, Function, Object, Value};

#[derive(Clone, Copy)]
enum Level {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

const METHODS: [(&str, Level); 5] = [
    ("log", Level::Log),
    ("info", Level::Info),
    ("warn", Level::Warn),
    ("error", Level::Error),
    ("debug", Level::Debug),
];

/// Install console API into the global object
pub(crate) fn install_console(ctx: &Ctx<'_>) -> Result<(), rquickjs::Error> {
    let console = Object::new(ctx.clone())?;
    for (name, level) in METHODS {
        let method = Function::new(ctx.clone(), move |args: Rest<Value<'_>>| {
            emit(level, &format_args(&args.0));
        })?
        .with_name(name)?;
        console.set(name, method)?;
    }
    ctx.globals().set("console", console)?;
    Ok(())
}

fn format_args(values: &[Value<'_>]) -> String {
    values
        .iter()
        .map(|v| convert::from_js(v).map(|v| v.to_string()).unwrap_or_else(|_| "[unknown]".into()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn emit(level: Level, line: &str) {
    match level {
        Level::Error => tracing::error!("[JS] {}", line),
        Level::Warn => tracing::warn!("[JS] {}", line),
        Level::Debug => tracing::debug!("[JS] {}", line),
        Level::Log | Level::Info => tracing::info!("[JS] {}", line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquickjs::{Context, Runtime};

    #[test]
    fn test_console_levels() {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();

        context.with(|ctx| {
            install_console(&ctx).unwrap();
            let _: Value = ctx
                .eval("console.log('a'); console.info('b'); console.warn('c'); console.error('d'); console.debug('e')")
                .unwrap();
            let name: String = ctx.eval("console.warn.name").unwrap();
            assert_eq!(name, "warn");
        });
    }

    #[test]
    fn test_format_args() {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();

        context.with(|ctx| {
            let values: Vec<Value> = ctx.eval("['Hello', 42, true, null, [1], {}]").unwrap();
            assert_eq!(format_args(&values), "Hello 42 true null [Array] [Object]");
        });
    }
}
