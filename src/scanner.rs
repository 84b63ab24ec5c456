use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::events::{EventChannel, EventStream};
use crate::processor::{ScanContext, Verdict};
use crate::{Advertisement, Device, Error, ErrorCode, ScanConfig, ScanSettings, ScanningService};

/// Lifecycle state of the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    /// The scanning service failed with the given code. A new `start`
    /// may be attempted at any time.
    Error(ErrorCode),
}

/// Settings that apply to every session of a scanner.
#[derive(Debug, Clone)]
pub struct ScannerOptions {
    /// Number of devices replayed to a new device stream subscriber
    replay_depth: usize,
    /// Number of devices buffered for a slow subscriber before the oldest are dropped
    event_capacity: usize,
    /// Radio settings handed to the scanning service
    settings: ScanSettings,
}

impl Default for ScannerOptions {
    fn default() -> Self {
        Self {
            replay_depth: 100,
            event_capacity: 64,
            settings: ScanSettings::default(),
        }
    }
}

impl ScannerOptions {
    pub fn replay_depth(mut self, depth: usize) -> Self {
        self.replay_depth = depth;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn settings(mut self, settings: ScanSettings) -> Self {
        self.settings = settings;
        self
    }
}

struct Shared {
    service: Box<dyn ScanningService>,
    settings: ScanSettings,
    context: Mutex<ScanContext>,
    events: EventChannel,
}

/// Scans for BLE devices through a [`ScanningService`] and reports the
/// ones that pass the filters of the current [`ScanConfig`].
///
/// Only one session can be active at a time. Share the scanner with an
/// `Arc` when several parts of the application need it. Dropping the
/// scanner stops an active scan and ends all of its streams.
pub struct Scanner {
    shared: Arc<Shared>,
}

impl Scanner {
    pub fn new(service: impl ScanningService + 'static) -> Self {
        Scanner::with_options(service, ScannerOptions::default())
    }

    pub fn with_options(service: impl ScanningService + 'static, options: ScannerOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                service: Box::new(service),
                settings: options.settings,
                context: Mutex::new(ScanContext::default()),
                events: EventChannel::new(options.replay_depth, options.event_capacity),
            }),
        }
    }

    /// Start scanning for ble devices.
    ///
    /// Does nothing if a scan is already running; stop it first to change
    /// the filters. If the scanning service refuses to start, the scanner
    /// moves to [`ScanState::Error`] and the code is returned.
    pub fn start(&self, config: ScanConfig) -> Result<(), Error> {
        let mut ctx = self.shared.lock();

        if ctx.state == ScanState::Scanning {
            log::debug!("Scanner is already started.");
            return Ok(());
        }

        log::info!("Starting the scan");

        let session = ctx.reset(config);
        self.shared.events.clear_history();

        let target = self.shared.target(session);
        let result = self.shared.service.begin(
            ctx.config.native_filters(),
            &self.shared.settings,
            target,
        );

        match result {
            Ok(()) => {
                self.shared.set_state(&mut ctx, ScanState::Scanning);
                Ok(())
            }
            Err(code) => {
                log::warn!("Scanning service refused to start: {}", code);
                self.shared.set_state(&mut ctx, ScanState::Error(code));
                Err(Error::StartFailed(code))
            }
        }
    }

    /// Stop scanning for ble devices.
    pub fn stop(&self) {
        let mut ctx = self.shared.lock();

        if ctx.state == ScanState::Scanning {
            self.shared.halt(&mut ctx, ScanState::Idle);
        } else {
            log::debug!("Scanner is already stopped");
        }
    }

    /// Stop an active scan and end every stream created by this scanner.
    pub fn close(self) {
        drop(self);
    }

    pub fn state(&self) -> ScanState {
        self.shared.events.state()
    }

    /// Last error reported by the scanning service, or [`ErrorCode::NONE`].
    pub fn error_code(&self) -> ErrorCode {
        self.shared.events.error()
    }

    /// Devices found so far in the current session, in discovery order.
    pub fn devices(&self) -> Vec<Device> {
        self.shared.lock().found().to_vec()
    }

    /// Create a new stream that receives discovered ble devices.
    ///
    /// Devices already reported in the current session are replayed first.
    pub fn device_stream(&self) -> EventStream<Device> {
        self.shared.events.device_stream()
    }

    /// Create a new stream that receives the scanner state, starting with the current one.
    pub fn state_stream(&self) -> EventStream<ScanState> {
        self.shared.events.state_stream()
    }

    /// Create a new stream that receives error codes reported by the scanning service.
    pub fn error_stream(&self) -> EventStream<ErrorCode> {
        self.shared.events.error_stream()
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        self.stop();
        self.shared.events.close();
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ScanContext> {
        self.context.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn target(self: &Arc<Self>, session: u64) -> DeliveryTarget {
        DeliveryTarget {
            session,
            shared: Arc::downgrade(self),
        }
    }

    fn set_state(&self, ctx: &mut ScanContext, state: ScanState) {
        ctx.state = state;
        self.events.set_state(state);
    }

    fn halt(self: &Arc<Self>, ctx: &mut ScanContext, next: ScanState) {
        log::info!("Stopping the scan");
        self.service.halt(&self.target(ctx.session));
        self.set_state(ctx, next);
    }

    fn on_batch(self: &Arc<Self>, session: u64, batch: &[Advertisement]) {
        let mut ctx = self.lock();

        if ctx.session != session || ctx.state != ScanState::Scanning {
            log::debug!("Dropping {} advertisements for an inactive session", batch.len());
            return;
        }

        for advertisement in batch {
            match ctx.process(advertisement) {
                Verdict::Skip => {}
                Verdict::Emit(device) => self.events.emit(device),
                Verdict::EmitAndStop(device) => {
                    self.events.emit(device);
                    log::info!("Scanner stop condition reached.");
                    self.halt(&mut ctx, ScanState::Idle);
                    break;
                }
            }
        }
    }

    fn on_service_error(self: &Arc<Self>, session: u64, code: ErrorCode) {
        let mut ctx = self.lock();

        self.events.set_error(code);

        if ctx.session == session && ctx.state == ScanState::Scanning {
            self.halt(&mut ctx, ScanState::Error(code));
        }
    }
}

/// Handle through which a scanning service delivers the results of one
/// scan session.
///
/// Deliveries for a session that has already ended are ignored, as is
/// everything delivered after the scanner has been dropped.
#[derive(Clone)]
pub struct DeliveryTarget {
    session: u64,
    shared: Weak<Shared>,
}

impl DeliveryTarget {
    /// Identifier of the session this target belongs to.
    pub fn session(&self) -> u64 {
        self.session
    }

    /// Hand a batch of advertisements to the scanner. Advertisements are
    /// processed in order.
    pub fn deliver(&self, batch: &[Advertisement]) {
        match self.shared.upgrade() {
            Some(shared) => shared.on_batch(self.session, batch),
            None => log::trace!("Scanner is gone, dropping {} advertisements", batch.len()),
        }
    }

    /// Report an asynchronous failure of the scanning service. An active
    /// session is stopped and the scanner moves to [`ScanState::Error`].
    pub fn report_error(&self, code: ErrorCode) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_service_error(self.session, code);
        }
    }
}

impl std::fmt::Debug for DeliveryTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryTarget")
            .field("session", &self.session)
            .finish()
    }
}
