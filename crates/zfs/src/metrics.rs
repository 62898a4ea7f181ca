//! Prometheus instrumentation at the port boundary

use std::sync::LazyLock;

use prometheus::{register_histogram_vec, HistogramVec};

/// Wall time of zfs(8) invocations, labeled by subcommand. Registered in
/// the process-wide default registry on first use.
pub(crate) static ZFS_COMMAND_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "zrepl_zfs_command_duration_seconds",
        "Duration of zfs(8) invocations by subcommand",
        &["subcommand"]
    )
    .expect("register zfs command duration histogram")
});
