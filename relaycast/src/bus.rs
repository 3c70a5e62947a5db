//! Bus assembly: wire a proxy and a router together.

use tokio::sync::mpsc;

use crate::audit::{AuditStore, InMemoryAuditStore};
use crate::config::RouterConfig;
use crate::proxy::{Proxy, ProxyDriver};
use crate::router::Router;
use crate::time::{TimeProvider, TokioTimeProvider};

/// Assemble an unstarted bus.
///
/// Returns the application handle plus the two tasks to drive. Callers
/// that want custom audit storage, a custom clock, or control over task
/// spawning use this; everyone else uses [`spawn_local`].
pub fn build<A: AuditStore, T: TimeProvider>(
    config: RouterConfig,
    audit: A,
    time: T,
) -> (Proxy, ProxyDriver, Router<A, T>) {
    let (to_router, from_proxy) = mpsc::unbounded_channel();
    let (to_proxy, from_router) = mpsc::unbounded_channel();
    let proxy = Proxy::new(to_router);
    let driver = ProxyDriver::new(&proxy, from_router);
    let router = Router::new(config, audit, time, from_proxy, to_proxy);
    (proxy, driver, router)
}

/// Assemble a bus with default audit storage and clock, spawn both
/// tasks on the current [`tokio::task::LocalSet`], and return the
/// application handle.
///
/// # Panics
///
/// Panics if called outside a `LocalSet` context, as
/// `tokio::task::spawn_local` does.
pub fn spawn_local(config: RouterConfig) -> Proxy {
    let (proxy, driver, router) =
        build(config, InMemoryAuditStore::new(), TokioTimeProvider::new());
    tokio::task::spawn_local(router.run());
    tokio::task::spawn_local(driver.run());
    proxy
}
