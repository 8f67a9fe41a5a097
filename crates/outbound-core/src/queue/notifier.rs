//! Notifier - キュー単位の publish/subscribe
//!
//! # 設計
//! - listener は `Arc<dyn Fn(&QueueEvent)>`。emit 時にロックの中で一覧を clone し、
//!   ロックを外してから呼び出す
//! - なので listener の中から subscribe / unsubscribe を呼んでもデッドロックしない
//! - 発火中に追加された listener はその発火では呼ばれない。発火中に削除された
//!   listener はその発火では（スナップショット通り）最後まで呼ばれる
//! - channel 購読（mpsc）は受信側が drop されたら次の emit で掃除する
//! - 発火順は `EmitPermit` で直列化する。キューは状態ロックを持ったまま permit を
//!   取り、ロックを外してから発火するので、状態遷移の順とイベントの順が一致する
//! - listener の中から同じ Notifier の `emit` を呼ぶとデッドロックする

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::domain::{QueueEvent, QueueEventKind};

type Listener = Arc<dyn Fn(&QueueEvent) + Send + Sync>;

/// Handle returned by `subscribe`; pass it to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct ListenerEntry {
    id: SubscriptionId,
    filter: Option<QueueEventKind>,
    listener: Listener,
}

struct ChannelEntry {
    filter: Option<QueueEventKind>,
    tx: UnboundedSender<QueueEvent>,
}

fn matches(filter: Option<QueueEventKind>, event: &QueueEvent) -> bool {
    filter.is_none_or(|kind| kind == event.kind())
}

/// Lock ignoring poison: a panicking listener runs outside the lock, so the
/// list itself is never left half-updated.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct NotifierInner {
    next_id: AtomicU64,
    listeners: Mutex<Vec<ListenerEntry>>,
    channels: Mutex<Vec<ChannelEntry>>,
    order: Mutex<()>,
}

/// Exclusive right to emit the next event.
///
/// Permits are handed out one at a time, so events are dispatched in the order
/// their permits were reserved. Not `Send`: consume it before the next `.await`.
#[must_use = "an unused permit blocks every later emission until dropped"]
pub struct EmitPermit<'a> {
    notifier: &'a Notifier,
    _order: MutexGuard<'a, ()>,
}

impl EmitPermit<'_> {
    pub fn emit(self, event: &QueueEvent) {
        self.notifier.dispatch(event);
    }
}

/// Typed event fan-out scoped to one queue. Cheap to clone.
#[derive(Clone, Default)]
pub struct Notifier {
    inner: Arc<NotifierInner>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `listener` for events of `kind` only.
    pub fn subscribe<F>(&self, kind: QueueEventKind, listener: F) -> SubscriptionId
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        self.add_listener(Some(kind), Arc::new(listener))
    }

    /// Call `listener` for every event.
    pub fn subscribe_all<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        self.add_listener(None, Arc::new(listener))
    }

    fn add_listener(&self, filter: Option<QueueEventKind>, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner.listeners).push(ListenerEntry {
            id,
            filter,
            listener,
        });
        id
    }

    /// Returns false if `id` was not (or no longer) subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = lock(&self.inner.listeners);
        let before = listeners.len();
        listeners.retain(|entry| entry.id != id);
        listeners.len() != before
    }

    /// Receive events through a channel instead of a callback.
    /// `None` receives every event.
    pub fn channel(&self, filter: Option<QueueEventKind>) -> UnboundedReceiver<QueueEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.inner.channels).push(ChannelEntry { filter, tx });
        rx
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    /// Wait for the emission slot. Reserve while the change being announced is
    /// still exclusive to the caller.
    pub fn reserve(&self) -> EmitPermit<'_> {
        EmitPermit {
            notifier: self,
            _order: lock(&self.inner.order),
        }
    }

    pub fn emit(&self, event: &QueueEvent) {
        self.reserve().emit(event);
    }

    fn dispatch(&self, event: &QueueEvent) {
        let snapshot: Vec<Listener> = lock(&self.inner.listeners)
            .iter()
            .filter(|entry| matches(entry.filter, event))
            .map(|entry| Arc::clone(&entry.listener))
            .collect();

        for listener in snapshot {
            listener(event);
        }

        // Remove disconnected receivers
        lock(&self.inner.channels).retain(|entry| {
            if entry.tx.is_closed() {
                return false;
            }
            !matches(entry.filter, event) || entry.tx.send(event.clone()).is_ok()
        });
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &lock(&self.inner.listeners).len())
            .field("channels", &lock(&self.inner.channels).len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&QueueEvent) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move |_: &QueueEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn filtered_listener_only_sees_its_kind() {
        let notifier = Notifier::new();
        let (count, listener) = counter();
        notifier.subscribe(QueueEventKind::AllCleared, listener);

        notifier.emit(&QueueEvent::CompletedCleared { count: 2 });
        notifier.emit(&QueueEvent::AllCleared);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let notifier = Notifier::new();
        let (count, listener) = counter();
        let id = notifier.subscribe_all(listener);

        notifier.emit(&QueueEvent::AllCleared);
        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        notifier.emit(&QueueEvent::AllCleared);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listeners_may_subscribe_and_unsubscribe_during_dispatch() {
        let notifier = Notifier::new();
        let (late_count, late_listener) = counter();
        let late_listener = Arc::new(late_listener);

        // 発火中に自分自身を外し、新しい listener を追加する
        let self_id = Arc::new(Mutex::new(None::<SubscriptionId>));
        let id = {
            let handle = notifier.clone();
            let self_id = Arc::clone(&self_id);
            let late_listener = Arc::clone(&late_listener);
            notifier.subscribe_all(move |_| {
                if let Some(id) = lock(&self_id).take() {
                    handle.unsubscribe(id);
                    let late = Arc::clone(&late_listener);
                    handle.subscribe_all(move |event| late(event));
                }
            })
        };
        *lock(&self_id) = Some(id);

        notifier.emit(&QueueEvent::AllCleared);
        // 追加された listener はこの発火では呼ばれない
        assert_eq!(late_count.load(Ordering::SeqCst), 0);
        assert_eq!(notifier.listener_count(), 1);

        notifier.emit(&QueueEvent::AllCleared);
        assert_eq!(late_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_removed_mid_dispatch_still_sees_current_event() {
        let notifier = Notifier::new();
        let (second_count, second) = counter();

        let second_id = Arc::new(Mutex::new(None::<SubscriptionId>));
        {
            let handle = notifier.clone();
            let second_id = Arc::clone(&second_id);
            notifier.subscribe_all(move |_| {
                if let Some(id) = *lock(&second_id) {
                    handle.unsubscribe(id);
                }
            });
        }
        *lock(&second_id) = Some(notifier.subscribe_all(second));

        notifier.emit(&QueueEvent::AllCleared);
        notifier.emit(&QueueEvent::AllCleared);

        assert_eq!(second_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reserved_permits_dispatch_in_reservation_order() {
        let notifier = Notifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            notifier.subscribe_all(move |event| lock(&seen).push(event.kind()));
        }

        let first = notifier.reserve();
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let second = std::thread::spawn({
            let notifier = notifier.clone();
            move || {
                started_tx.send(()).unwrap();
                notifier.reserve().emit(&QueueEvent::AllCleared);
            }
        });

        started_rx.recv().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));
        // 2 本目はまだ permit 待ち
        assert!(lock(&seen).is_empty());

        first.emit(&QueueEvent::CompletedCleared { count: 1 });
        second.join().unwrap();

        assert_eq!(
            *lock(&seen),
            vec![QueueEventKind::CompletedCleared, QueueEventKind::AllCleared]
        );
    }

    #[tokio::test]
    async fn channel_subscribers_receive_and_get_pruned() {
        let notifier = Notifier::new();
        let mut all = notifier.channel(None);
        let mut cleared = notifier.channel(Some(QueueEventKind::CompletedCleared));

        notifier.emit(&QueueEvent::AllCleared);
        notifier.emit(&QueueEvent::CompletedCleared { count: 4 });

        assert_eq!(all.recv().await, Some(QueueEvent::AllCleared));
        assert_eq!(
            all.recv().await,
            Some(QueueEvent::CompletedCleared { count: 4 })
        );
        assert_eq!(
            cleared.recv().await,
            Some(QueueEvent::CompletedCleared { count: 4 })
        );

        drop(all);
        drop(cleared);
        notifier.emit(&QueueEvent::AllCleared);
        assert_eq!(lock(&notifier.inner.channels).len(), 0);
    }
}
