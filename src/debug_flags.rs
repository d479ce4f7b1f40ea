//! Runtime debug switches, read once from the environment.

use std::sync::OnceLock;

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON"))
        .unwrap_or(default)
}

/// Per-instruction execution trace (`DEBUG_CPU_TRACE=1`), emitted at trace
/// level before each dispatched opcode.
pub fn cpu_trace() -> bool {
    static ON: OnceLock<bool> = OnceLock::new();
    *ON.get_or_init(|| env_flag("DEBUG_CPU_TRACE", false))
}

/// Hardware-interrupt dispatch trace (`DEBUG_IRQ_TRACE=1`).
pub fn irq_trace() -> bool {
    static ON: OnceLock<bool> = OnceLock::new();
    *ON.get_or_init(|| env_flag("DEBUG_IRQ_TRACE", false))
}
