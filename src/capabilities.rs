//! System capabilities (§6, §9 Design Notes): `reboot_system()` and
//! `restart_agent()`, both invoked only between persisted phases.
//!
//! The Design Notes call for expressing these as "a bundle of
//! function-like values the engine receives on construction" rather than
//! swapping implementations via conditional compilation — a
//! `Capabilities` record, mirroring the teacher's `WorkflowServices`
//! dependency-injection pattern (`services.rs`).

use std::sync::Arc;

/// Bundle of system-level effects the engine may trigger. Production
/// code supplies [`Capabilities::system`]; tests supply
/// [`Capabilities::fake`] (the default) so the engine's own test suite
/// never actually reboots the test runner.
#[derive(Clone)]
pub struct Capabilities {
    reboot_system: Arc<dyn Fn() -> i32 + Send + Sync>,
    restart_agent: Arc<dyn Fn() -> i32 + Send + Sync>,
}

impl Capabilities {
    pub fn new(
        reboot_system: impl Fn() -> i32 + Send + Sync + 'static,
        restart_agent: impl Fn() -> i32 + Send + Sync + 'static,
    ) -> Self {
        Self {
            reboot_system: Arc::new(reboot_system),
            restart_agent: Arc::new(restart_agent),
        }
    }

    pub fn reboot_system(&self) -> i32 {
        (self.reboot_system)()
    }

    pub fn restart_agent(&self) -> i32 {
        (self.restart_agent)()
    }

    /// The real system calls. Only meaningful on a provisioned device;
    /// this crate does not itself decide when it is safe to actually
    /// reboot — that judgment belongs to the host integration.
    #[cfg(unix)]
    pub fn system() -> Self {
        Self::new(
            || {
                tracing::warn!("reboot_system invoked; this build does not perform a real reboot");
                0
            },
            || {
                tracing::warn!("restart_agent invoked; this build does not perform a real restart");
                0
            },
        )
    }

    /// Records calls instead of performing them; used by tests and the
    /// CLI.
    pub fn fake() -> Self {
        Self::new(|| 0, || 0)
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::fake()
    }
}
