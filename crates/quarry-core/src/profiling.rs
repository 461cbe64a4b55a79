//! Profiling utilities based on the `puffin` crate.
//!
//! Scopes are free when profiling is off. [`start_server`] turns them on and
//! streams them to `puffin_viewer`.

pub use puffin::{GlobalProfiler, profile_function, profile_scope};

/// Default address of the profiling server.
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:8585";

/// Enable or disable scope collection.
pub fn set_enabled(enabled: bool) {
    puffin::set_scopes_on(enabled);
}

pub fn is_enabled() -> bool {
    puffin::are_scopes_on()
}

/// Start serving profiling data on `addr`.
///
/// The returned server must be kept alive for as long as data should be
/// served. Returns `None` if the socket could not be bound.
#[cfg(feature = "profiling")]
pub fn start_server(addr: &str) -> Option<puffin_http::Server> {
    set_enabled(true);
    match puffin_http::Server::new(addr) {
        Ok(server) => {
            tracing::info!("Puffin profiler server started on http://{}", addr);
            Some(server)
        }
        Err(e) => {
            tracing::error!("Failed to start puffin server: {}", e);
            None
        }
    }
}

/// Close the current profiling frame.
///
/// The database has no natural frame, so callers mark one after each batch
/// of imports they care about.
#[inline]
pub fn mark_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}
