use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError, RwLock};

use futures::{stream, Stream, StreamExt};
use stream_cancel::{Trigger, Valved};
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::{BroadcastStream, WatchStream};

use crate::{Device, ErrorCode, ScanState};

pub type EventStream<T> = Valved<Pin<Box<dyn Stream<Item = T> + Send>>>;

/// Recently emitted devices and the live sender, kept under one lock so that
/// a subscriber sees every emission exactly once.
struct History {
    replay: VecDeque<Device>,
    depth: usize,
    sender: broadcast::Sender<Device>,
}

/// Fan-out of discovered devices, lifecycle state and error codes.
pub(crate) struct EventChannel {
    devices: Mutex<History>,
    state: watch::Sender<ScanState>,
    error: watch::Sender<ErrorCode>,
    stream_stoppers: RwLock<Vec<Trigger>>,
}

impl EventChannel {
    pub(crate) fn new(replay_depth: usize, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        let (state, _) = watch::channel(ScanState::Idle);
        let (error, _) = watch::channel(ErrorCode::NONE);

        Self {
            devices: Mutex::new(History {
                replay: VecDeque::with_capacity(replay_depth),
                depth: replay_depth,
                sender,
            }),
            state,
            error,
            stream_stoppers: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn emit(&self, device: Device) {
        let mut history = self.devices.lock().unwrap_or_else(PoisonError::into_inner);

        if history.depth > 0 {
            if history.replay.len() == history.depth {
                history.replay.pop_front();
            }
            history.replay.push_back(device.clone());
        }

        // No receivers is not an error, the device stays in the replay history.
        history.sender.send(device).ok();
    }

    /// Forget the replay history of the previous session.
    pub(crate) fn clear_history(&self) {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replay
            .clear();
    }

    pub(crate) fn set_state(&self, state: ScanState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            log::info!("Scan state: {:?}", state);
        }
    }

    pub(crate) fn state(&self) -> ScanState {
        *self.state.borrow()
    }

    pub(crate) fn set_error(&self, code: ErrorCode) {
        log::error!("Scanning service error: {}", code);
        self.error.send_replace(code);
    }

    pub(crate) fn error(&self) -> ErrorCode {
        *self.error.borrow()
    }

    pub(crate) fn device_stream(&self) -> EventStream<Device> {
        let (replayed, receiver) = {
            let history = self.devices.lock().unwrap_or_else(PoisonError::into_inner);
            (
                history.replay.iter().cloned().collect::<Vec<_>>(),
                history.sender.subscribe(),
            )
        };

        let live = BroadcastStream::new(receiver).filter_map(|x| async move {
            if let Err(e) = &x {
                log::warn!("Device stream subscriber fell behind: {}", e);
            }
            x.ok()
        });

        self.valved(Box::pin(stream::iter(replayed).chain(live)))
    }

    pub(crate) fn state_stream(&self) -> EventStream<ScanState> {
        self.valved(Box::pin(WatchStream::new(self.state.subscribe())))
    }

    pub(crate) fn error_stream(&self) -> EventStream<ErrorCode> {
        self.valved(Box::pin(WatchStream::new(self.error.subscribe())))
    }

    /// End every stream handed out so far.
    pub(crate) fn close(&self) {
        self.stream_stoppers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn valved<T>(&self, stream: Pin<Box<dyn Stream<Item = T> + Send>>) -> EventStream<T> {
        let (trigger, stream) = Valved::new(stream);
        self.stream_stoppers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(trigger);
        stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btleplug::api::BDAddr;

    fn device(last: u8) -> Device {
        Device::new(BDAddr::from([0, 0, 0, 0, 0, last]), None, Default::default())
    }

    #[tokio::test]
    async fn late_subscriber_gets_bounded_replay_then_live() {
        let channel = EventChannel::new(2, 8);
        channel.emit(device(1));
        channel.emit(device(2));
        channel.emit(device(3));

        let mut stream = channel.device_stream();
        channel.emit(device(4));

        assert_eq!(stream.next().await, Some(device(2)));
        assert_eq!(stream.next().await, Some(device(3)));
        assert_eq!(stream.next().await, Some(device(4)));
    }

    #[tokio::test]
    async fn cleared_history_is_not_replayed() {
        let channel = EventChannel::new(4, 8);
        channel.emit(device(1));
        channel.clear_history();
        channel.emit(device(2));

        let mut stream = channel.device_stream();
        assert_eq!(stream.next().await, Some(device(2)));
    }

    #[tokio::test]
    async fn state_stream_starts_with_current_state() {
        let channel = EventChannel::new(4, 8);
        channel.set_state(ScanState::Scanning);

        let mut stream = channel.state_stream();
        assert_eq!(stream.next().await, Some(ScanState::Scanning));
    }

    #[tokio::test]
    async fn error_defaults_to_none() {
        let channel = EventChannel::new(4, 8);
        assert_eq!(channel.error(), ErrorCode::NONE);

        let mut stream = channel.error_stream();
        assert_eq!(stream.next().await, Some(ErrorCode::NONE));
    }

    #[tokio::test]
    async fn close_ends_streams() {
        let channel = EventChannel::new(4, 8);
        let mut stream = channel.device_stream();
        channel.close();
        assert_eq!(stream.next().await, None);
    }

    #[test]
    fn emit_never_blocks_without_subscribers() {
        let channel = EventChannel::new(1, 1);
        for i in 0..10 {
            channel.emit(device(i));
        }
    }
}
