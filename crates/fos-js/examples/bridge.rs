//! Example: a document tree driven from script
//!
//! Run with `RUST_LOG=debug` to watch host objects come and go.

use fos_dom::Document;
use fos_js::{expose_node, install_document, ScriptConfig, ScriptContext};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), fos_js::JsError> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut doc = Document::new("demo://bridge");
    let body = doc.create_element("body")?;
    doc.append_child(doc.root(), body)?;
    let greeting = doc.create_element("p")?;
    doc.append_child(body, greeting)?;
    let doc = Arc::new(Mutex::new(doc));

    let context = ScriptContext::new(
        1,
        ScriptConfig::default(),
        |id, exception| eprintln!("context {id}: uncaught {exception}"),
        None,
    )?;
    install_document(&context, &doc)?;
    expose_node(&context, "greeting", &doc, greeting)?;

    context.evaluate_script(
        "greeting.textContent = 'Hello from ' + document.nodeName;\n\
         console.log(greeting.nodeName, greeting.childCount, greeting.textContent);",
        "demo://bridge/main.js",
        1,
    )?;

    // Writes to read-only properties surface as script exceptions
    let _ = context.evaluate_script("greeting.nodeName = 'DIV'", "demo://bridge/bad.js", 1);

    context.evaluate_script("delete globalThis.greeting", "demo://bridge/cleanup.js", 1)?;
    context.run_gc()?;
    println!("finalized wrappers: {}", context.drain_finalizations());

    let text = doc.lock().ok().and_then(|d| d.text_content(body));
    println!("body text: {}", text.unwrap_or_default());

    context.teardown();
    let freed = doc.lock().map(|mut d| d.collect_garbage()).unwrap_or_default();
    println!("nodes freed after teardown: {freed}");
    Ok(())
}
