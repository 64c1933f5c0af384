//! Async runtime used for work that must not block the shell, such as the
//! release check.

use tokio::runtime::Runtime;

/// Builds the runtime the controller spawns its background checks on.
pub(crate) fn build_runtime() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("castbar-runtime")
        .enable_all()
        .build()
}
