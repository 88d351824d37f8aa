//! Script context configuration

/// Engine limits applied when a [`ScriptContext`](crate::ScriptContext) is created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptConfig {
    /// Heap limit in bytes
    pub memory_limit: usize,
    /// Allocation volume that triggers a collection
    pub gc_threshold: usize,
    pub max_stack_size: usize,
    /// Install `console.*` routed to tracing
    pub install_console: bool,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            memory_limit: 32 * 1024 * 1024,
            gc_threshold: 256 * 1024,
            max_stack_size: 512 * 1024,
            install_console: true,
        }
    }
}

impl ScriptConfig {
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = bytes;
        self
    }

    pub fn with_gc_threshold(mut self, bytes: usize) -> Self {
        self.gc_threshold = bytes;
        self
    }

    pub fn without_console(mut self) -> Self {
        self.install_console = false;
        self
    }
}
