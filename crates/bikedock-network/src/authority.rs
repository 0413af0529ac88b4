//! The authorization contract between a dock and its back end.

use bikedock_core::{BikeId, CardCode, DockId};
use std::future::Future;

/// Remote authority deciding check-ins and check-outs.
///
/// Every call answers authorized (`true`) or denied (`false`). Implementations
/// fail closed: anything that prevents a clear positive answer is a denial,
/// and no error ever reaches the caller.
///
/// Methods return `Send` futures so a controller generic over the authority
/// can be spawned.
pub trait Authority: Send + Sync {
    /// Announce this dock to the authority.
    fn register(&self, dock_id: &DockId) -> impl Future<Output = bool> + Send;

    /// Ask to accept `bike_id` into the dock.
    fn check_in(&self, bike_id: &BikeId) -> impl Future<Output = bool> + Send;

    /// Ask to release `bike_id` to the holder of `card`.
    fn check_out(&self, bike_id: &BikeId, card: &CardCode) -> impl Future<Output = bool> + Send;
}
