use std::io;

/// Errors surfaced at the runtime-setup boundary.
///
/// Steady-state failures (missing host elements, redundant teardown,
/// panicking renders or effects) are logged and recovered, never returned.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A document was built without a host binding.
    #[error("no host binding installed")]
    HostBindingAbsent,

    /// The host has no element to mount the document into.
    #[error("root element `{id}` not found in host document")]
    RootElementMissing {
        /// Id of the configured render root.
        id: String,
    },

    /// A runtime thread could not be started.
    #[error("failed to spawn {what} thread")]
    Spawn {
        /// Which thread was being spawned.
        what: &'static str,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The render thread has shut down.
    #[error("render scheduler has stopped")]
    SchedulerStopped,
}

/// Result alias for fallible runtime setup.
pub type Result<T, E = Error> = std::result::Result<T, E>;
