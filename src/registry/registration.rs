use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

use crate::WatchPoint;

/// Management collaborator told about watch lifecycle transitions.
///
/// The registry calls this on register/deregister; what "registration"
/// means (a management console, a remote directory) is the host's
/// business. Sink failures are logged by the registry and never surface
/// to producers.
#[cfg_attr(test, automock)]
pub trait RegistrationSink: Send + Sync + 'static {
    fn registered(
        &self,
        watch: Arc<dyn WatchPoint>,
    );

    fn deregistered(
        &self,
        id: &str,
    );
}

/// Compute-resource collaborator serving the well-known system metric
/// ids ([`crate::constants::system_watch_id`]) that live outside the
/// registry's own table.
#[cfg_attr(test, automock)]
pub trait ComputeResourceSource: Send + Sync + 'static {
    fn fetch(
        &self,
        id: &str,
    ) -> Option<Arc<dyn WatchPoint>>;
}
