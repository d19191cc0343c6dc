//! Profiling support via Tracy.
//!
//! Optional instrumentation using the [Tracy profiler](https://github.com/wolfpld/tracy),
//! enabled via the `profiling` Cargo feature:
//!
//! ```bash
//! cargo test --features strata-core/profiling
//! ```
//!
//! When the feature is disabled (the default), all macros compile to no-ops.
//!
//! # CPU Profiling
//!
//! ```ignore
//! use strata_core::profiling::{profile_function, profile_scope};
//!
//! fn allocate() {
//!     profile_function!();
//!     {
//!         profile_scope!("find_free_range");
//!         // ...
//!     }
//! }
//! ```
//!
//! # GPU Memory Plots
//!
//! Heap allocators report their occupancy with [`profile_heap_usage!`], which
//! shows up as a pair of plots per heap in Tracy:
//!
//! ```ignore
//! profile_heap_usage!("critical", used_bytes, capacity_bytes);
//! ```

// Re-export tracy-client types when profiling is enabled
#[cfg(feature = "profiling")]
pub use tracy_client::{
    self, Client, Span, frame_mark as tracy_frame_mark, plot as tracy_plot, span,
};

/// Mark the end of a frame for Tracy's frame analysis.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! frame_mark {
    () => {
        $crate::profiling::tracy_frame_mark()
    };
}

/// Mark the end of a frame (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! frame_mark {
    () => {};
}

/// Create a profiling span for the current scope.
///
/// The span ends when the scope exits.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Create a profiling span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Create a profiling span covering the whole function.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_function {
    () => {
        let _profile_span = $crate::profiling::span!();
    };
}

/// Create a profiling span for function (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_function {
    () => {};
}

/// Plot a value over time in Tracy.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        $crate::profiling::tracy_plot!($name, $value as f64)
    };
}

/// Plot a value (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        let _ = $value;
    };
}

/// Plot the used and total bytes of a GPU heap.
///
/// `$heap` must be a string literal; it becomes part of the plot names
/// `"<heap> heap used (MB)"` and `"<heap> heap capacity (MB)"`.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_heap_usage {
    ($heap:literal, $used:expr, $capacity:expr) => {{
        $crate::profiling::tracy_plot!(
            concat!($heap, " heap used (MB)"),
            $used as f64 / (1024.0 * 1024.0)
        );
        $crate::profiling::tracy_plot!(
            concat!($heap, " heap capacity (MB)"),
            $capacity as f64 / (1024.0 * 1024.0)
        );
    }};
}

/// Plot heap usage (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_heap_usage {
    ($heap:literal, $used:expr, $capacity:expr) => {{
        let _ = ($used, $capacity);
    }};
}

/// Send a message to Tracy's message log.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_message {
    ($msg:expr) => {
        if let Some(client) = $crate::profiling::Client::running() {
            client.message($msg, 0);
        }
    };
}

/// Send a message (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_message {
    ($msg:expr) => {};
}

// Re-export macros at module level
pub use frame_mark;
pub use profile_function;
pub use profile_heap_usage;
pub use profile_message;
pub use profile_plot;
pub use profile_scope;
