//! Retry queue timing tests under a paused clock.
//!
//! The retry tick is the bus's only timeout mechanism; these tests
//! pin down the attempt budget boundary, the per-tick counter
//! increments, and late-subscriber resolution.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use serde_json::json;

use relaycast::{
    bus, Delivery, InMemoryAuditStore, Proxy, RouterConfig, SubscriberFault, TokioTimeProvider,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_test_writer()
        .try_init();
}

fn spawn_bus(config: RouterConfig) -> (Proxy, Rc<InMemoryAuditStore>) {
    let audit = Rc::new(InMemoryAuditStore::new());
    let (proxy, driver, router) = bus::build(config, Rc::clone(&audit), TokioTimeProvider::new());
    tokio::task::spawn_local(router.run());
    tokio::task::spawn_local(driver.run());
    (proxy, audit)
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// One retry tick: the default interval plus 1ms of slack so the
/// router's deadline fires strictly first. Yields never advance the
/// paused clock, so the slack cannot accumulate into a missed tick.
async fn one_tick() {
    tokio::time::sleep(Duration::from_millis(1001)).await;
    settle().await;
}

#[derive(Clone, Default)]
struct Recorder {
    deliveries: Rc<RefCell<Vec<Delivery>>>,
}

impl Recorder {
    fn handler(&self) -> impl FnMut(Delivery) -> Result<(), SubscriberFault> + 'static {
        let deliveries = Rc::clone(&self.deliveries);
        move |delivery| {
            deliveries.borrow_mut().push(delivery);
            Ok(())
        }
    }

    fn count(&self) -> usize {
        self.deliveries.borrow().len()
    }
}

#[tokio::test(start_paused = true)]
async fn test_single_attempt_miss_never_enters_the_queue() {
    init_tracing();
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let (proxy, audit) = spawn_bus(RouterConfig::default());
            settle().await;

            proxy.send("ghost", json!("nobody home"));
            settle().await;

            // Exactly one lookup, audited once.
            assert_eq!(audit.dispatches_for_recipient("ghost").len(), 1);

            tokio::time::sleep(Duration::from_secs(10)).await;
            settle().await;
            // No queue growth, no further attempts.
            assert_eq!(audit.dispatches_for_recipient("ghost").len(), 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_bounded_budget_counts_attempts_per_tick_then_drops() {
    init_tracing();
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let (proxy, audit) = spawn_bus(RouterConfig::default());
            settle().await;

            proxy.send_from("ghost", json!("three strikes"), None, Some(3));
            settle().await;
            let rows = audit.dispatches_for_recipient("ghost");
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].attempt, None);
            let message_id = rows[0].message_id;

            one_tick().await;
            let rows = audit.dispatches_for_message(message_id);
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[1].attempt, Some(1));

            one_tick().await;
            let rows = audit.dispatches_for_message(message_id);
            assert_eq!(rows.len(), 3);
            assert_eq!(rows[2].attempt, Some(2));

            // Budget spent: dropped after two retry ticks, silent ever
            // after.
            for _ in 0..5 {
                one_tick().await;
            }
            assert_eq!(audit.dispatches_for_message(message_id).len(), 3);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_queued_message_resolves_when_subscriber_appears() {
    init_tracing();
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let (proxy, _audit) = spawn_bus(RouterConfig::default());
            settle().await;

            proxy.send_from("worker", json!({"job": 7}), None, Some(5));
            settle().await;

            let inbox = Recorder::default();
            proxy.register_handler("worker", inbox.handler());
            settle().await;
            // Delivery waits for the tick; mid-interval nothing moves.
            assert_eq!(inbox.count(), 0);

            one_tick().await;
            assert_eq!(inbox.count(), 1);
            let delivery = inbox.deliveries.borrow()[0].clone();
            assert_eq!(delivery.payload, json!({"job": 7}));
            // A retried name dispatch still issues a reply id.
            assert!(delivery.reply_id.is_some());

            // Delivered, not requeued.
            one_tick().await;
            assert_eq!(inbox.count(), 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_budget_retries_until_resolution() {
    init_tracing();
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let (proxy, audit) = spawn_bus(RouterConfig::default());
            settle().await;

            proxy.send_from("patience", json!("eventually"), None, None);
            settle().await;

            for _ in 0..30 {
                one_tick().await;
            }
            // Still ticking long past any finite budget.
            let rows = audit.dispatches_for_recipient("patience");
            assert_eq!(rows.len(), 31);
            assert_eq!(rows.last().unwrap().attempt, Some(30));

            let inbox = Recorder::default();
            proxy.register_handler("patience", inbox.handler());
            settle().await;
            one_tick().await;
            assert_eq!(inbox.count(), 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_retry_can_resolve_to_a_replacement_subscriber() {
    init_tracing();
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let (proxy, _audit) = spawn_bus(RouterConfig::default());
            let first = Recorder::default();
            let id_first = proxy.register_handler("svc", first.handler());
            settle().await;

            // Disconnecting does not cancel in-flight by-name retries.
            proxy.disconnect(id_first);
            settle().await;
            proxy.send_from("svc", json!("who answers?"), None, Some(10));
            settle().await;
            assert_eq!(first.count(), 0);

            let second = Recorder::default();
            proxy.register_handler("svc", second.handler());
            settle().await;
            one_tick().await;

            assert_eq!(first.count(), 0);
            assert_eq!(second.count(), 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_reply_to_vanished_sender_waits_in_the_queue() {
    init_tracing();
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let (proxy, _audit) = spawn_bus(RouterConfig::default());
            let sender = Recorder::default();
            let target = Recorder::default();
            let id_sender = proxy.register_handler("origin", sender.handler());
            proxy.register_handler("target", target.handler());
            settle().await;

            proxy.send_from("target", json!("request"), Some(id_sender), Some(1));
            settle().await;
            let reply_id = target.deliveries.borrow()[0]
                .reply_id
                .expect("reply id issued");

            // The sender's slot vanishes before the reply arrives; the
            // reply waits like any unresolved message would.
            proxy.disconnect(id_sender);
            settle().await;
            proxy.reply(reply_id, json!("response"), None, Some(3));
            settle().await;
            assert_eq!(sender.count(), 0);

            one_tick().await;
            one_tick().await;
            // Sender ids are stable but this one is gone for good;
            // after the budget the reply is dropped quietly.
            assert_eq!(sender.count(), 0);
        })
        .await;
}
