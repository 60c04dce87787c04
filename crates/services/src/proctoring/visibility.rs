use std::sync::Weak;

use tracing::debug;

use super::capabilities::VisibilityReceiver;
use super::monitor::MonitorShared;

/// Tab-focus source: forwards every visibility change to the monitor.
pub(crate) async fn run(monitor: Weak<MonitorShared>, mut receiver: VisibilityReceiver) {
    while let Some(visibility) = receiver.recv().await {
        let Some(shared) = monitor.upgrade() else {
            break;
        };
        if shared.is_stopped() {
            break;
        }
        shared.set_tab_visible(visibility.is_visible());
    }
    debug!("tab-focus source ended");
}
