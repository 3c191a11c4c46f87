//! Throttled delivery of message snapshots to the observer.

use forgeloop_content::segment;
use forgeloop_core::message::{Message, MessageStatus};
use forgeloop_core::observer::{AgentObserver, MessageSnapshot};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// The raw material of a snapshot; segmentation happens only on delivery.
#[derive(Debug, Clone)]
struct Frame {
    message_id: String,
    status: MessageStatus,
    iteration: u32,
    content: String,
}

impl Frame {
    fn capture(message: &Message, iteration: u32) -> Self {
        Self {
            message_id: message.id.clone(),
            status: message.status,
            iteration,
            content: message.content.clone(),
        }
    }

    fn into_snapshot(self) -> MessageSnapshot {
        let blocks = segment(&self.content, self.status == MessageStatus::Streaming);
        MessageSnapshot {
            message_id: self.message_id,
            status: self.status,
            iteration: self.iteration,
            content: self.content,
            blocks,
        }
    }
}

#[derive(Default)]
struct Shared {
    last_emit: Option<Instant>,
    pending: Option<Frame>,
}

/// At most one observer refresh per interval while content grows.
///
/// Updates inside the interval coalesce: a trailing timer delivers only the
/// latest one. `flush` delivers immediately and `cancel` drops whatever is
/// pending, so nothing stale arrives after either.
pub struct RedisplayThrottle {
    observer: Arc<dyn AgentObserver>,
    interval: Duration,
    shared: Arc<Mutex<Shared>>,
    timer: Option<JoinHandle<()>>,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RedisplayThrottle {
    pub fn new(observer: Arc<dyn AgentObserver>, interval: Duration) -> Self {
        Self {
            observer,
            interval,
            shared: Arc::new(Mutex::new(Shared::default())),
            timer: None,
        }
    }

    /// Request a redraw of `message`.
    pub fn update(&mut self, message: &Message, iteration: u32) {
        let frame = Frame::capture(message, iteration);
        let now = Instant::now();
        let mut shared = lock(&self.shared);

        let due = shared
            .last_emit
            .is_none_or(|last| now.duration_since(last) >= self.interval);
        if due {
            shared.pending = None;
            shared.last_emit = Some(now);
            self.observer.on_snapshot(&frame.into_snapshot());
            drop(shared);
            self.abort_timer();
            return;
        }

        shared.pending = Some(frame);
        let deadline = shared.last_emit.map_or(now, |last| last + self.interval);
        drop(shared);

        if self.timer.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        let shared = Arc::clone(&self.shared);
        let observer = Arc::clone(&self.observer);
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let mut guard = lock(&shared);
            if let Some(frame) = guard.pending.take() {
                guard.last_emit = Some(Instant::now());
                observer.on_snapshot(&frame.into_snapshot());
            }
        }));
    }

    /// Deliver `message` now, superseding anything pending.
    pub fn flush(&mut self, message: &Message, iteration: u32) {
        self.abort_timer();
        let mut shared = lock(&self.shared);
        shared.pending = None;
        shared.last_emit = Some(Instant::now());
        self.observer
            .on_snapshot(&Frame::capture(message, iteration).into_snapshot());
    }

    /// Drop any pending update without delivering it.
    pub fn cancel(&mut self) {
        self.abort_timer();
        lock(&self.shared).pending = None;
    }

    fn abort_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for RedisplayThrottle {
    fn drop(&mut self) {
        self.abort_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        contents: Mutex<Vec<String>>,
    }

    impl AgentObserver for Recorder {
        fn on_snapshot(&self, snapshot: &MessageSnapshot) {
            self.contents.lock().unwrap().push(snapshot.content.clone());
        }
    }

    fn message(text: &str) -> Message {
        let mut msg = Message::streaming_assistant();
        msg.append(text);
        msg
    }

    fn setup() -> (Arc<Recorder>, RedisplayThrottle) {
        let recorder = Arc::new(Recorder::default());
        let throttle = RedisplayThrottle::new(recorder.clone(), Duration::from_millis(100));
        (recorder, throttle)
    }

    #[tokio::test(start_paused = true)]
    async fn first_update_is_immediate_and_bursts_coalesce() {
        let (recorder, mut throttle) = setup();
        throttle.update(&message("a"), 1);
        throttle.update(&message("ab"), 1);
        throttle.update(&message("abc"), 1);
        assert_eq!(*recorder.contents.lock().unwrap(), ["a"]);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(*recorder.contents.lock().unwrap(), ["a", "abc"]);
    }

    #[tokio::test(start_paused = true)]
    async fn updates_after_interval_are_immediate() {
        let (recorder, mut throttle) = setup();
        throttle.update(&message("a"), 1);
        tokio::time::sleep(Duration::from_millis(120)).await;
        throttle.update(&message("ab"), 1);
        assert_eq!(*recorder.contents.lock().unwrap(), ["a", "ab"]);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_supersedes_pending() {
        let (recorder, mut throttle) = setup();
        throttle.update(&message("a"), 1);
        throttle.update(&message("ab"), 1);
        throttle.flush(&message("final"), 1);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(*recorder.contents.lock().unwrap(), ["a", "final"]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending() {
        let (recorder, mut throttle) = setup();
        throttle.update(&message("a"), 1);
        throttle.update(&message("ab"), 1);
        throttle.cancel();

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(*recorder.contents.lock().unwrap(), ["a"]);
    }

    #[tokio::test]
    async fn snapshots_carry_segmented_blocks() {
        #[derive(Default)]
        struct Blocks(Mutex<Vec<MessageSnapshot>>);
        impl AgentObserver for Blocks {
            fn on_snapshot(&self, snapshot: &MessageSnapshot) {
                self.0.lock().unwrap().push(snapshot.clone());
            }
        }

        let observer = Arc::new(Blocks::default());
        let mut throttle = RedisplayThrottle::new(observer.clone(), Duration::from_millis(100));
        throttle.flush(&message("Hi\n```rust\nfn"), 3);

        let snapshots = observer.0.lock().unwrap();
        assert_eq!(snapshots[0].iteration, 3);
        assert_eq!(snapshots[0].blocks.len(), 2);
        assert!(snapshots[0].blocks[1].is_active());
    }
}
