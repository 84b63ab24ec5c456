use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use futures::{Stream, StreamExt};
use stream_cancel::{StreamExt as _, Trigger, Tripwire};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::{Advertisement, DeliveryTarget, Error, ErrorCode, ScanSettings, ScanningService};

/// [`ScanningService`] backed by a btleplug adapter.
///
/// Every discovered or updated peripheral is delivered as a batch of one.
/// Must be used from within a tokio runtime.
pub struct BtleplugService {
    _manager: Manager,
    adapter: Adapter,
    sessions: SessionQueue,
    scan_stopper: Mutex<Option<Trigger>>,
}

impl BtleplugService {
    /// Use the bluetooth adapter with the given index. The first adapter is index 0.
    pub async fn new(adapter_index: usize) -> Result<Self, Error> {
        let manager = Manager::new().await?;
        let mut adapters = manager.adapters().await?;

        if adapter_index >= adapters.len() {
            return Err(Error::AdapterNotFound(adapter_index));
        }

        let adapter = adapters.swap_remove(adapter_index);

        log::trace!("Using adapter: {:?}", adapter);

        Ok(Self {
            _manager: manager,
            adapter,
            sessions: SessionQueue::new(Handle::current()),
            scan_stopper: Mutex::new(None),
        })
    }
}

impl ScanningService for BtleplugService {
    fn begin(
        &self,
        filters: &[ScanFilter],
        settings: &ScanSettings,
        target: DeliveryTarget,
    ) -> Result<(), ErrorCode> {
        let mut stopper = self
            .scan_stopper
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if stopper.is_some() {
            return Err(ErrorCode::ALREADY_STARTED);
        }

        // btleplug only understands service filters.
        log::trace!("Ignoring unsupported scan settings: {:?}", settings);
        let filter = ScanFilter {
            services: filters
                .iter()
                .flat_map(|filter| filter.services.iter().copied())
                .collect(),
        };

        let (trigger, tripwire) = Tripwire::new();
        self.sessions
            .spawn(listen(self.adapter.clone(), filter, target, tripwire));

        *stopper = Some(trigger);

        Ok(())
    }

    fn halt(&self, target: &DeliveryTarget) {
        log::debug!("Halting scan session {}", target.session());

        // The session task stops the adapter scan once it sees the trigger go.
        self.scan_stopper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// Runs scan sessions strictly one after another, so that a session never
/// starts the adapter scan before the previous one has stopped it.
struct SessionQueue {
    runtime: Handle,
    last: Mutex<Option<JoinHandle<()>>>,
}

impl SessionQueue {
    fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            last: Mutex::new(None),
        }
    }

    fn spawn(&self, session: impl Future<Output = ()> + Send + 'static) {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = last.take();

        *last = Some(self.runtime.spawn(async move {
            if let Some(previous) = previous {
                if let Err(e) = previous.await {
                    log::warn!("Previous scan session failed: {}", e);
                }
            }
            session.await;
        }));
    }
}

async fn listen(adapter: Adapter, filter: ScanFilter, target: DeliveryTarget, tripwire: Tripwire) {
    let events: Pin<Box<dyn Stream<Item = CentralEvent> + Send>> = match adapter.events().await {
        Ok(events) => events,
        Err(e) => {
            log::error!("Could not subscribe to adapter events: {:?}", e);
            target.report_error(ErrorCode::APPLICATION_REGISTRATION_FAILED);
            return;
        }
    };

    if let Err(e) = adapter.start_scan(filter).await {
        log::error!("Could not start the scan: {:?}", e);
        target.report_error(ErrorCode::INTERNAL_ERROR);
        return;
    }

    let mut events = Box::pin(events.take_until_if(tripwire));

    while let Some(event) = events.next().await {
        match event {
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                if let Some(advertisement) = advertisement(&adapter, &id).await {
                    target.deliver(&[advertisement]);
                }
            }
            _ => {}
        }
    }

    if let Err(e) = adapter.stop_scan().await {
        log::warn!("Could not stop the scan: {:?}", e);
    }

    log::info!("Scan session {} was stopped.", target.session());
}

async fn advertisement(adapter: &Adapter, id: &PeripheralId) -> Option<Advertisement> {
    let peripheral = adapter.peripheral(id).await.ok()?;

    log::trace!("Device discovered: {:?}", peripheral);

    match peripheral.properties().await {
        Ok(Some(props)) => Some(Advertisement::from(&props)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn next_session_waits_for_previous_stop() {
        let queue = SessionQueue::new(Handle::current());
        let log = Arc::new(Mutex::new(Vec::new()));
        let (release, released) = oneshot::channel::<()>();
        let (done, finished) = oneshot::channel::<()>();

        let first = log.clone();
        queue.spawn(async move {
            released.await.ok();
            first.lock().unwrap().push("stop 1");
        });

        let second = log.clone();
        queue.spawn(async move {
            second.lock().unwrap().push("start 2");
            done.send(()).ok();
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(log.lock().unwrap().is_empty());

        release.send(()).unwrap();
        finished.await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["stop 1", "start 2"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn panicking_session_does_not_block_the_next() {
        let queue = SessionQueue::new(Handle::current());
        let (done, finished) = oneshot::channel::<()>();

        queue.spawn(async { panic!("session failed") });
        queue.spawn(async move {
            done.send(()).ok();
        });

        tokio::time::timeout(Duration::from_secs(5), finished)
            .await
            .unwrap()
            .unwrap();
    }
}
