//! Async driver shell
//!
//! The imperative shell around the pure lifecycle core. One
//! [`ModemRunner`] per modem instance owns the UART and control pins and
//! is the single worker context: it drains the event queue, runs
//! state-machine handlers and chat scripts, arms the instance timer, and
//! services control requests. [`ModemControl`] handles are cheap, cloneable
//! entry points for application threads; they rendezvous with the runner
//! through a channel and serialize on the transmit mutex.

use core::cell::RefCell;
use core::fmt::Write as _;

use embassy_futures::select::{select3, select4, Either3, Either4};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{with_timeout, Duration, Instant, Timer};
use embedded_hal::digital::OutputPin;
use heapless::{String, Vec};

use crate::at::args::AtArgs;
use crate::at::matcher;
use crate::at::urc;
use crate::chat::runner::{ChatRunner, RunnerStep};
use crate::chat::script::{ChatScript, ScriptResult};
use crate::chat::scripts::{ScriptId, ABORT_MATCHES};
use crate::config::identity::APN_SIZE;
use crate::config::{
    timing, CONNECT_MARKER, EOF_PATTERN, EVENT_QUEUE_SIZE, LINE_BUFFER_SIZE, LINE_DELIMITER,
    MAX_REQUEST_LEN, SOCKET_CHUNK_SIZE,
};
use crate::event::EventBus;
use crate::gpio::{ModemPins, PinPresence};
use crate::modem::core::{Action, ApnSource, ModemConfig, ModemCore};
use crate::modem::identity::ModemIdentity;
use crate::modem::registration::RegistrationStatus;
use crate::socket::framer::{FramerStatus, RxFramer};
use crate::socket::offload::{self, SessionState, SocketProtocol, HOST_SIZE};
use crate::transport::{LineBuffer, ModemUart, TransportOwner};
use crate::types::{
    ModemError, ModemEvent, ModemState, PhoneFunctionality, SignalQuality,
};

/// One response line captured for a control request.
pub type ResponseLine = String<LINE_BUFFER_SIZE>;

/// Control request serviced by the runner.
enum Command {
    Dynamic {
        request: String<MAX_REQUEST_LEN>,
        expect: String<32>,
        timeout: Duration,
    },
    EnterState(ModemState),
    SocketCreate {
        protocol: SocketProtocol,
        host: String<HOST_SIZE>,
        port: u16,
    },
    SocketConnect {
        id: u8,
    },
    SocketSend {
        id: u8,
        data: Vec<u8, SOCKET_CHUNK_SIZE>,
    },
    SocketRecv {
        id: u8,
        len: usize,
    },
    SocketClose {
        id: u8,
    },
}

/// Shared state binding one runner to any number of control handles.
///
/// Typically placed in a `static` (via the integrator's favorite
/// static-allocation cell) so ISRs can reach [`ModemShared::delegate_event`].
pub struct ModemShared {
    bus: EventBus,
    core: BlockingMutex<CriticalSectionRawMutex, RefCell<ModemCore>>,
    transmit: Mutex<CriticalSectionRawMutex, ()>,
    suspended: Signal<CriticalSectionRawMutex, ()>,
    commands: Channel<CriticalSectionRawMutex, Command, 1>,
    command_done: Signal<CriticalSectionRawMutex, Result<ResponseLine, ModemError>>,
    framer: BlockingMutex<CriticalSectionRawMutex, RefCell<RxFramer>>,
}

impl ModemShared {
    /// Create the shared state for one modem instance.
    #[must_use]
    pub fn new(config: ModemConfig, pins: PinPresence) -> Self {
        Self {
            bus: EventBus::new(),
            core: BlockingMutex::new(RefCell::new(ModemCore::new(config, pins))),
            transmit: Mutex::new(()),
            suspended: Signal::new(),
            commands: Channel::new(),
            command_done: Signal::new(),
            framer: BlockingMutex::new(RefCell::new(RxFramer::new())),
        }
    }

    /// The sole event-injection point. Safe from any context, including
    /// GPIO interrupt handlers; never blocks.
    pub fn delegate_event(&self, event: ModemEvent) -> bool {
        self.bus.delegate(event)
    }

    /// A control handle for this instance.
    #[must_use]
    pub fn control(&self) -> ModemControl<'_> {
        ModemControl { shared: self }
    }

    fn with_core<R>(&self, f: impl FnOnce(&mut ModemCore) -> R) -> R {
        self.core.lock(|cell| f(&mut cell.borrow_mut()))
    }
}

/// Application-facing control surface.
#[derive(Clone, Copy)]
pub struct ModemControl<'a> {
    shared: &'a ModemShared,
}

impl ModemControl<'_> {
    /// Bring the modem up.
    pub fn resume(&self) {
        let _ = self.shared.bus.delegate(ModemEvent::Resume);
    }

    /// Take the modem down gracefully, blocking (bounded) until the driver
    /// reaches `Idle`.
    pub async fn suspend(&self) -> Result<(), ModemError> {
        self.shared.suspended.reset();
        let _ = self.shared.bus.delegate(ModemEvent::Suspend);
        with_timeout(timing::SUSPEND_WAIT, self.shared.suspended.wait())
            .await
            .map_err(|_| ModemError::CommandTimeout)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ModemState {
        self.shared.with_core(|c| c.state())
    }

    /// Snapshot of the registration status.
    #[must_use]
    pub fn registration(&self) -> RegistrationStatus {
        self.shared.with_core(|c| c.registration)
    }

    /// Snapshot of the identity record.
    #[must_use]
    pub fn identity(&self) -> ModemIdentity {
        self.shared.with_core(|c| c.identity.clone())
    }

    /// Events dropped at the queue since startup.
    #[must_use]
    pub fn dropped_events(&self) -> u32 {
        self.shared.bus.dropped()
    }

    /// Use a static APN for the data session.
    pub fn set_apn(&self, apn: &str) -> Result<(), ModemError> {
        let mut owned: String<APN_SIZE> = String::new();
        owned.push_str(apn).map_err(|()| ModemError::Overflow)?;
        self.shared
            .with_core(|c| c.set_apn_source(ApnSource::Static(owned.clone())));
        Ok(())
    }

    /// Run an arbitrary AT command.
    ///
    /// `expect` is the response prefix to capture; when empty, a bare `OK`
    /// completes the command and the returned line is empty.
    pub async fn run_command(
        &self,
        request: &str,
        expect: &str,
        timeout: Duration,
    ) -> Result<ResponseLine, ModemError> {
        let mut owned_request: String<MAX_REQUEST_LEN> = String::new();
        owned_request
            .push_str(request)
            .map_err(|()| ModemError::Overflow)?;
        let mut owned_expect: String<32> = String::new();
        owned_expect
            .push_str(expect)
            .map_err(|()| ModemError::Overflow)?;
        self.request(Command::Dynamic {
            request: owned_request,
            expect: owned_expect,
            timeout,
        })
        .await
    }

    /// Query signal strength (`AT+CSQ` plus `AT+CESQ`).
    pub async fn signal_quality(&self) -> Result<SignalQuality, ModemError> {
        let line = self
            .run_command("AT+CSQ", "+CSQ:", timing::DEFAULT_RESPONSE)
            .await?;
        self.shared.with_core(|c| {
            let _ = urc::dispatch_urc(c, line.as_bytes());
        });
        let line = self
            .run_command("AT+CESQ", "+CESQ:", timing::DEFAULT_RESPONSE)
            .await?;
        Ok(self.shared.with_core(|c| {
            let _ = urc::dispatch_urc(c, line.as_bytes());
            c.signal
        }))
    }

    /// Query the phone functionality level.
    pub async fn functionality(&self) -> Result<PhoneFunctionality, ModemError> {
        let line = self
            .run_command("AT+CFUN?", "+CFUN:", timing::DEFAULT_RESPONSE)
            .await?;
        self.shared
            .with_core(|c| {
                let _ = urc::dispatch_urc(c, line.as_bytes());
                c.functionality()
            })
            .ok_or(ModemError::NotReady)
    }

    /// Change the phone functionality level through the state machine.
    pub async fn set_functionality(&self, level: PhoneFunctionality) -> Result<(), ModemError> {
        match level {
            PhoneFunctionality::Airplane => {
                self.request(Command::EnterState(ModemState::Airplane))
                    .await
                    .map(|_| ())
            }
            PhoneFunctionality::Minimum => {
                self.request(Command::EnterState(ModemState::SimPowerOff))
                    .await
                    .map(|_| ())
            }
            PhoneFunctionality::Full => {
                let _ = self.shared.bus.delegate(ModemEvent::Resume);
                Ok(())
            }
        }
    }

    /// Query the registered operator name.
    pub async fn operator(&self) -> Result<ModemIdentity, ModemError> {
        let line = self
            .run_command("AT+COPS?", "+COPS:", timing::DEFAULT_RESPONSE)
            .await?;
        Ok(self.shared.with_core(|c| {
            let _ = urc::dispatch_urc(c, line.as_bytes());
            c.identity.clone()
        }))
    }

    /// Configure a socket session, returning the modem-assigned id.
    pub async fn socket_create(
        &self,
        protocol: SocketProtocol,
        host: &str,
        port: u16,
    ) -> Result<u8, ModemError> {
        let mut owned_host: String<HOST_SIZE> = String::new();
        owned_host.push_str(host).map_err(|()| ModemError::Overflow)?;
        let line = self
            .request(Command::SocketCreate {
                protocol,
                host: owned_host,
                port,
            })
            .await?;
        let prefix = offload::config_response_prefix(protocol);
        let args = AtArgs::parse(line.as_bytes(), prefix.len(), b",");
        args.int(1)
            .and_then(|v| u8::try_from(v).ok())
            .ok_or(ModemError::Transport)
    }

    /// Connect a configured TCP session.
    pub async fn socket_connect(&self, id: u8) -> Result<(), ModemError> {
        self.request(Command::SocketConnect { id }).await.map(|_| ())
    }

    /// Send `data`, chunked to the modem's transfer size.
    pub async fn socket_send(&self, id: u8, data: &[u8]) -> Result<usize, ModemError> {
        let mut sent = 0;
        for chunk in data.chunks(SOCKET_CHUNK_SIZE) {
            let mut owned: Vec<u8, SOCKET_CHUNK_SIZE> = Vec::new();
            owned
                .extend_from_slice(chunk)
                .map_err(|()| ModemError::Overflow)?;
            self.request(Command::SocketSend { id, data: owned }).await?;
            sent += chunk.len();
        }
        Ok(sent)
    }

    /// Receive pending data into `buf`, returning the byte count. Returns
    /// zero immediately when the modem has announced nothing.
    pub async fn socket_recv(&self, id: u8, buf: &mut [u8]) -> Result<usize, ModemError> {
        let pending = self
            .shared
            .with_core(|c| c.sockets.by_id(i32::from(id)).map(|s| s.pending_bytes as usize))
            .ok_or(ModemError::NoSuchSocket)?;
        if pending == 0 {
            return Ok(0);
        }
        let want = buf.len().min(pending);
        self.request(Command::SocketRecv { id, len: want }).await?;
        Ok(self.shared.framer.lock(|f| f.borrow_mut().take(buf)))
    }

    /// Close and delete a socket session.
    pub async fn socket_close(&self, id: u8) -> Result<(), ModemError> {
        self.request(Command::SocketClose { id }).await.map(|_| ())
    }

    async fn request(&self, command: Command) -> Result<ResponseLine, ModemError> {
        // One caller at a time owns the transmit scope, including across
        // error paths (the guard releases on drop).
        let _permit = self.shared.transmit.lock().await;
        self.shared.command_done.reset();
        self.shared.commands.send(command).await;
        self.shared.command_done.wait().await
    }
}

/// The worker context driving one modem instance.
pub struct ModemRunner<'a, U: ModemUart, P: OutputPin> {
    shared: &'a ModemShared,
    uart: U,
    pins: ModemPins<P>,
    lines: LineBuffer,
    owner: TransportOwner,
    deadline: Option<Instant>,
    uart_open: bool,
}

impl<'a, U: ModemUart, P: OutputPin> ModemRunner<'a, U, P> {
    /// Create the runner for one instance.
    pub fn new(shared: &'a ModemShared, uart: U, pins: ModemPins<P>) -> Self {
        Self {
            shared,
            uart,
            pins,
            lines: LineBuffer::new(),
            owner: TransportOwner::Detached,
            deadline: None,
            uart_open: false,
        }
    }

    /// Drive the modem forever. This is the only context that mutates the
    /// state machine, so handlers need no locking around transitions.
    pub async fn run(&mut self) -> ! {
        info!("modem worker started");
        loop {
            self.service_actions().await;
            self.step().await;
        }
    }

    async fn step(&mut self) {
        let shared = self.shared;
        let deadline = self.deadline;

        if self.uart_open {
            let mut chunk = [0u8; 64];
            let outcome = {
                let read = self.uart.read(&mut chunk);
                select4(
                    shared.bus.wait(),
                    deadline_wait(deadline),
                    shared.commands.receive(),
                    read,
                )
                .await
            };
            match outcome {
                Either4::First(()) => self.dispatch_events().await,
                Either4::Second(()) => {
                    self.deadline = None;
                    self.handle_one(ModemEvent::Timeout).await;
                }
                Either4::Third(command) => self.handle_command(command).await,
                Either4::Fourth(Ok(0)) | Either4::Fourth(Err(_)) => {
                    warn!("uart fault, closing pipe");
                    self.uart_open = false;
                    self.owner = TransportOwner::Detached;
                    let _ = shared.bus.delegate(ModemEvent::BusClosed);
                }
                Either4::Fourth(Ok(count)) => self.ingest(&chunk[..count]),
            }
        } else {
            let outcome = select3(
                shared.bus.wait(),
                deadline_wait(deadline),
                shared.commands.receive(),
            )
            .await;
            match outcome {
                Either3::First(()) => self.dispatch_events().await,
                Either3::Second(()) => {
                    self.deadline = None;
                    self.handle_one(ModemEvent::Timeout).await;
                }
                Either3::Third(Command::EnterState(state)) => {
                    shared.with_core(|c| c.enter_state(state));
                    self.service_actions().await;
                    shared.command_done.signal(Ok(ResponseLine::new()));
                }
                Either3::Third(_) => {
                    shared.command_done.signal(Err(ModemError::NotReady));
                }
            }
        }
    }

    /// Route received bytes to whichever layer owns the transport.
    fn ingest(&mut self, bytes: &[u8]) {
        match self.owner {
            TransportOwner::Chat => {
                let _ = self.lines.push(bytes);
                while let Some(line) = self.lines.next_line() {
                    self.shared.with_core(|c| {
                        let _ = urc::dispatch_urc(c, &line);
                    });
                }
                self.drain_side_actions();
            }
            TransportOwner::Framer => {
                self.shared.framer.lock(|f| f.borrow_mut().feed_slice(bytes));
            }
            TransportOwner::Detached => {}
        }
    }

    async fn dispatch_events(&mut self) {
        let mut events: Vec<ModemEvent, EVENT_QUEUE_SIZE> = Vec::new();
        self.shared.bus.drain(&mut events);
        for event in events {
            self.shared.with_core(|c| c.handle_event(event));
            self.service_actions().await;
        }
    }

    async fn handle_one(&mut self, event: ModemEvent) {
        self.shared.with_core(|c| c.handle_event(event));
        self.service_actions().await;
    }

    async fn service_actions(&mut self) {
        while let Some(action) = self.shared.with_core(|c| c.next_action()) {
            self.execute(action).await;
        }
    }

    async fn execute(&mut self, action: Action) {
        match action {
            Action::SetPin(role, active) => {
                if self.pins.set(role, active).is_err() {
                    warn!("gpio fault on {:?}", role);
                }
            }
            Action::StartTimer(duration) => self.deadline = Some(Instant::now() + duration),
            Action::StopTimer => self.deadline = None,
            Action::OpenUart => {
                if self.uart_open {
                    let _ = self.shared.bus.delegate(ModemEvent::BusOpened);
                } else {
                    match self.uart.open().await {
                        Ok(()) => {
                            self.uart_open = true;
                            self.lines.clear();
                            let _ = self.shared.bus.delegate(ModemEvent::BusOpened);
                        }
                        Err(_) => {
                            warn!("uart open failed");
                            let _ = self.shared.bus.delegate(ModemEvent::BusClosed);
                        }
                    }
                }
            }
            Action::CloseUart => {
                if self.uart_open {
                    let _ = self.uart.close().await;
                    self.uart_open = false;
                }
                self.owner = TransportOwner::Detached;
                self.shared.with_core(|c| c.sockets.clear());
            }
            Action::AttachChat => self.owner = TransportOwner::Chat,
            Action::ReleaseChat => {
                if self.owner == TransportOwner::Chat {
                    self.owner = TransportOwner::Detached;
                }
            }
            Action::RunScript(id) => self.execute_script(id).await,
            Action::Delegate(event) => {
                let _ = self.shared.bus.delegate(event);
            }
            Action::NotifySuspended => self.shared.suspended.signal(()),
            Action::SetBaudrate(rate) => {
                let _ = self.uart.set_baudrate(rate).await;
            }
        }
    }

    /// Run a script to its terminal result and translate that into the
    /// event vocabulary.
    async fn execute_script(&mut self, id: ScriptId) {
        let result = match id {
            ScriptId::RatConfig => self.run_rat_config().await,
            ScriptId::EnableGprs => self.run_enable_gprs().await,
            ScriptId::SetBaud => self.run_set_baud().await,
            _ => match id.chat() {
                Some(script) => self.run_chat(script).await,
                None => ScriptResult::Abort,
            },
        };

        let event = match result {
            ScriptResult::Success if id == ScriptId::RatConfig => ModemEvent::ScriptRequireRestart,
            ScriptResult::Success => ModemEvent::ScriptSuccess,
            ScriptResult::Abort => ModemEvent::ScriptFailed,
            ScriptResult::Timeout => ModemEvent::Timeout,
        };
        let _ = self.shared.bus.delegate(event);
    }

    async fn run_chat(&mut self, script: &'static ChatScript<ModemCore>) -> ScriptResult {
        debug!("script {} start", script.name);
        let mut runner: ChatRunner<ModemCore> = ChatRunner::new();
        let overall = Instant::now() + script.timeout;
        let mut step = runner.start(script);

        loop {
            match step {
                RunnerStep::Transmit { request, timeout } => {
                    if !request.is_empty() && self.send_request(request).await.is_err() {
                        let _ = self.shared.bus.delegate(ModemEvent::BusClosed);
                        return ScriptResult::Timeout;
                    }
                    runner.request_sent();
                    let step_deadline = (Instant::now() + timeout).min(overall);
                    step = self.await_response(&mut runner, step_deadline).await;
                }
                RunnerStep::Finished(result) => {
                    debug!("script {} -> {:?}", script.name, result);
                    return result;
                }
                RunnerStep::Pending | RunnerStep::Unclaimed => return ScriptResult::Abort,
            }
        }
    }

    async fn await_response(
        &mut self,
        runner: &mut ChatRunner<ModemCore>,
        deadline: Instant,
    ) -> RunnerStep {
        loop {
            let now = Instant::now();
            if now >= deadline {
                return runner.handle_timeout();
            }
            match with_timeout(deadline - now, self.next_line()).await {
                Ok(Ok(line)) => {
                    let step = self.shared.with_core(|c| runner.handle_line(c, &line));
                    if step == RunnerStep::Unclaimed {
                        // Not a script response; URCs still flow.
                        self.shared.with_core(|c| {
                            let _ = urc::dispatch_urc(c, &line);
                        });
                        self.drain_side_actions();
                        continue;
                    }
                    self.drain_side_actions();
                    return step;
                }
                Ok(Err(_)) => {
                    let _ = self.shared.bus.delegate(ModemEvent::BusClosed);
                    return runner.handle_timeout();
                }
                Err(_) => return runner.handle_timeout(),
            }
        }
    }

    /// Handlers invoked during a script only queue lightweight actions;
    /// anything needing the transport waits until the script finishes.
    fn drain_side_actions(&mut self) {
        let mut actions: Vec<Action, 16> = Vec::new();
        self.shared.with_core(|c| c.drain_actions(&mut actions));
        for action in actions {
            match action {
                Action::SetPin(role, active) => {
                    if self.pins.set(role, active).is_err() {
                        warn!("gpio fault on {:?}", role);
                    }
                }
                Action::StartTimer(duration) => self.deadline = Some(Instant::now() + duration),
                Action::StopTimer => self.deadline = None,
                Action::Delegate(event) => {
                    let _ = self.shared.bus.delegate(event);
                }
                Action::NotifySuspended => self.shared.suspended.signal(()),
                other => {
                    // Requeue for the main loop once the script is done.
                    self.shared.with_core(|c| c.push_action(other));
                }
            }
        }
    }

    async fn next_line(&mut self) -> Result<Vec<u8, LINE_BUFFER_SIZE>, ModemError> {
        loop {
            if let Some(line) = self.lines.next_line() {
                return Ok(line);
            }
            let mut chunk = [0u8; 64];
            let count = self
                .uart
                .read(&mut chunk)
                .await
                .map_err(|_| ModemError::Transport)?;
            if count == 0 {
                return Err(ModemError::Transport);
            }
            let _ = self.lines.push(&chunk[..count]);
        }
    }

    async fn send_request(&mut self, request: &[u8]) -> Result<(), ModemError> {
        self.uart
            .write_all(request)
            .await
            .map_err(|_| ModemError::Transport)?;
        self.uart
            .write_all(LINE_DELIMITER)
            .await
            .map_err(|_| ModemError::Transport)?;
        Ok(())
    }

    /// One ad-hoc request/response exchange sharing the scripts' abort set.
    async fn run_request(
        &mut self,
        request: &[u8],
        expect: &[u8],
        timeout: Duration,
    ) -> Result<ResponseLine, ModemError> {
        self.send_request(request).await?;
        let deadline = Instant::now() + timeout;

        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(ModemError::CommandTimeout);
            }
            let line = match with_timeout(deadline - now, self.next_line()).await {
                Ok(Ok(line)) => line,
                Ok(Err(err)) => {
                    let _ = self.shared.bus.delegate(ModemEvent::BusClosed);
                    return Err(err);
                }
                Err(_) => return Err(ModemError::CommandTimeout),
            };

            let aborted = self
                .shared
                .with_core(|c| matcher::dispatch(c, ABORT_MATCHES, &line));
            if aborted {
                return Err(ModemError::CommandAborted);
            }
            if !expect.is_empty() && line.starts_with(expect) {
                return ResponseLine::from_utf8(line).map_err(|_| ModemError::Transport);
            }
            if line.as_slice() == b"OK" {
                return Ok(ResponseLine::new());
            }
            self.shared.with_core(|c| {
                let _ = urc::dispatch_urc(c, &line);
            });
            self.drain_side_actions();
        }
    }

    /// Apply RAT and band configuration; the caller translates success into
    /// the restart-required event.
    async fn run_rat_config(&mut self) -> ScriptResult {
        let (rat, bands) = self
            .shared
            .with_core(|c| (c.config().rat, c.config().bands));

        let mut cmd: String<MAX_REQUEST_LEN> = String::new();
        let _ = write!(cmd, "AT+KSRAT={}", rat.as_at());
        match self
            .run_request(cmd.as_bytes(), b"", timing::SLOW_RESPONSE)
            .await
        {
            Ok(_) => {}
            Err(ModemError::CommandTimeout) => return ScriptResult::Timeout,
            Err(_) => return ScriptResult::Abort,
        }

        if let Some(bands) = bands {
            let hex = bands.to_hex();
            let mut cmd: String<MAX_REQUEST_LEN> = String::new();
            let _ = write!(cmd, "AT+KBNDCFG={},{}", rat.as_at(), hex.as_str());
            match self
                .run_request(cmd.as_bytes(), b"", timing::SLOW_RESPONSE)
                .await
            {
                Ok(_) => {}
                Err(ModemError::CommandTimeout) => return ScriptResult::Timeout,
                Err(_) => return ScriptResult::Abort,
            }
        }

        // Bounce through airplane mode so the new configuration applies.
        match self
            .run_request(b"AT+CFUN=4,1", b"", timing::SLOW_RESPONSE)
            .await
        {
            Ok(_) => ScriptResult::Success,
            Err(ModemError::CommandTimeout) => ScriptResult::Timeout,
            Err(_) => ScriptResult::Abort,
        }
    }

    /// Apply the resolved APN and bring the radio to full functionality.
    async fn run_enable_gprs(&mut self) -> ScriptResult {
        let apn: String<APN_SIZE> = self.shared.with_core(|c| {
            let mut owned = String::new();
            let _ = owned.push_str(c.identity.apn());
            owned
        });

        let mut cmd: String<MAX_REQUEST_LEN> = String::new();
        let _ = write!(cmd, "AT+KCNXCFG=1,\"GPRS\",\"{}\"", apn.as_str());
        match self
            .run_request(cmd.as_bytes(), b"", timing::SLOW_RESPONSE)
            .await
        {
            Ok(_) => {}
            Err(ModemError::CommandTimeout) => return ScriptResult::Timeout,
            Err(_) => return ScriptResult::Abort,
        }

        match self
            .run_request(b"AT+CFUN=1,0", b"", timing::SLOW_RESPONSE)
            .await
        {
            Ok(_) => ScriptResult::Success,
            Err(ModemError::CommandTimeout) => ScriptResult::Timeout,
            Err(_) => ScriptResult::Abort,
        }
    }

    /// Apply the configured UART rate on both ends.
    async fn run_set_baud(&mut self) -> ScriptResult {
        let Some(rate) = self.shared.with_core(|c| c.config().baud) else {
            return ScriptResult::Success;
        };
        let mut cmd: String<MAX_REQUEST_LEN> = String::new();
        let _ = write!(cmd, "AT+IPR={rate}");
        match self
            .run_request(cmd.as_bytes(), b"", timing::DEFAULT_RESPONSE)
            .await
        {
            Ok(_) => {
                let _ = self.uart.set_baudrate(rate).await;
                ScriptResult::Success
            }
            Err(ModemError::CommandTimeout) => ScriptResult::Timeout,
            Err(_) => ScriptResult::Abort,
        }
    }

    async fn handle_command(&mut self, command: Command) {
        let result = self.run_command_inner(command).await;
        self.shared.command_done.signal(result);
    }

    async fn run_command_inner(&mut self, command: Command) -> Result<ResponseLine, ModemError> {
        match command {
            Command::EnterState(state) => {
                self.shared.with_core(|c| c.enter_state(state));
                self.service_actions().await;
                Ok(ResponseLine::new())
            }
            Command::Dynamic {
                request,
                expect,
                timeout,
            } => {
                self.ensure_chat()?;
                self.run_request(request.as_bytes(), expect.as_bytes(), timeout)
                    .await
            }
            Command::SocketCreate {
                protocol,
                host,
                port,
            } => {
                self.ensure_chat()?;
                let cmd = offload::config_command(protocol, host.as_str(), port)?;
                let prefix = offload::config_response_prefix(protocol);
                let line = self
                    .run_request(cmd.as_bytes(), prefix, timing::SLOW_RESPONSE)
                    .await?;
                let args = AtArgs::parse(line.as_bytes(), prefix.len(), b",");
                let id = args
                    .int(1)
                    .and_then(|v| u8::try_from(v).ok())
                    .ok_or(ModemError::Transport)?;
                drop(args);
                self.shared
                    .with_core(|c| c.sockets.insert(id, protocol, host.as_str(), port))?;
                Ok(line)
            }
            Command::SocketConnect { id } => {
                self.ensure_chat()?;
                let cmd = match self
                    .shared
                    .with_core(|c| c.sockets.by_id(i32::from(id)).map(offload::connect_command))
                {
                    Some(cmd) => cmd?,
                    None => return Err(ModemError::NoSuchSocket),
                };
                self.run_request(cmd.as_bytes(), b"", timing::SLOW_RESPONSE)
                    .await?;
                self.shared.with_core(|c| {
                    if let Some(session) = c.sockets.by_id_mut(i32::from(id)) {
                        session.state = SessionState::Connected;
                    }
                });
                Ok(ResponseLine::new())
            }
            Command::SocketSend { id, data } => self.socket_send(id, &data).await,
            Command::SocketRecv { id, len } => self.socket_recv(id, len).await,
            Command::SocketClose { id } => {
                self.ensure_chat()?;
                let commands = self.shared.with_core(|c| {
                    c.sockets
                        .by_id(i32::from(id))
                        .map(|s| (offload::close_command(s), offload::delete_command(s)))
                });
                let Some((close, delete)) = commands else {
                    return Err(ModemError::NoSuchSocket);
                };
                let _ = self
                    .run_request(close?.as_bytes(), b"", timing::SLOW_RESPONSE)
                    .await;
                let _ = self
                    .run_request(delete?.as_bytes(), b"", timing::DEFAULT_RESPONSE)
                    .await;
                self.shared.with_core(|c| c.sockets.remove(id));
                Ok(ResponseLine::new())
            }
        }
    }

    /// Send one payload chunk: command, `CONNECT` prompt, raw bytes, EOF
    /// pattern, `OK` confirmation.
    async fn socket_send(&mut self, id: u8, data: &[u8]) -> Result<ResponseLine, ModemError> {
        self.ensure_chat()?;
        let cmd = match self
            .shared
            .with_core(|c| c.sockets.by_id(i32::from(id)).map(|s| offload::send_command(s, data.len())))
        {
            Some(cmd) => cmd?,
            None => return Err(ModemError::NoSuchSocket),
        };

        self.send_request(cmd.as_bytes()).await?;

        let deadline = Instant::now() + timing::SOCKET_TRANSFER;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(ModemError::CommandTimeout);
            }
            let line = match with_timeout(deadline - now, self.next_line()).await {
                Ok(Ok(line)) => line,
                Ok(Err(err)) => return Err(err),
                Err(_) => return Err(ModemError::CommandTimeout),
            };
            if line.as_slice() == CONNECT_MARKER {
                break;
            }
            let aborted = self
                .shared
                .with_core(|c| matcher::dispatch(c, ABORT_MATCHES, &line));
            if aborted {
                return Err(ModemError::ConnectionAborted);
            }
            self.shared.with_core(|c| {
                let _ = urc::dispatch_urc(c, &line);
            });
        }

        self.uart
            .write_all(data)
            .await
            .map_err(|_| ModemError::Transport)?;
        self.uart
            .write_all(EOF_PATTERN)
            .await
            .map_err(|_| ModemError::Transport)?;

        let deadline = Instant::now() + timing::SOCKET_TRANSFER;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(ModemError::CommandTimeout);
            }
            let line = match with_timeout(deadline - now, self.next_line()).await {
                Ok(Ok(line)) => line,
                Ok(Err(err)) => return Err(err),
                Err(_) => return Err(ModemError::CommandTimeout),
            };
            if line.as_slice() == b"OK" {
                return Ok(ResponseLine::new());
            }
            let aborted = self
                .shared
                .with_core(|c| matcher::dispatch(c, ABORT_MATCHES, &line));
            if aborted {
                return Err(ModemError::ConnectionAborted);
            }
            self.shared.with_core(|c| {
                let _ = urc::dispatch_urc(c, &line);
            });
        }
    }

    /// Receive one transfer through the framer. The chat layer is detached
    /// for the duration; the two framings are never active simultaneously.
    async fn socket_recv(&mut self, id: u8, len: usize) -> Result<ResponseLine, ModemError> {
        self.ensure_chat()?;
        let cmd = match self
            .shared
            .with_core(|c| c.sockets.by_id(i32::from(id)).map(|s| offload::recv_command(s, len)))
        {
            Some(cmd) => cmd?,
            None => return Err(ModemError::NoSuchSocket),
        };

        self.shared.framer.lock(|f| f.borrow_mut().begin(len));
        self.owner = TransportOwner::Framer;
        let result = self.socket_recv_inner(id, cmd.as_bytes()).await;
        self.owner = TransportOwner::Chat;
        result
    }

    async fn socket_recv_inner(
        &mut self,
        id: u8,
        command: &[u8],
    ) -> Result<ResponseLine, ModemError> {
        self.send_request(command).await?;

        let deadline = Instant::now() + timing::SOCKET_TRANSFER;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(ModemError::CommandTimeout);
            }
            let mut chunk = [0u8; 64];
            let count = match with_timeout(deadline - now, self.uart.read(&mut chunk)).await {
                Ok(Ok(0)) | Ok(Err(_)) => return Err(ModemError::Transport),
                Ok(Ok(count)) => count,
                Err(_) => return Err(ModemError::CommandTimeout),
            };

            let status = self.shared.framer.lock(|f| {
                let mut framer = f.borrow_mut();
                framer.feed_slice(&chunk[..count]);
                framer.status()
            });
            match status {
                FramerStatus::Pending => {}
                FramerStatus::Complete => {
                    let collected = self.shared.framer.lock(|f| f.borrow().collected_len());
                    self.shared
                        .with_core(|c| c.sockets.consume_pending(i32::from(id), collected));
                    return Ok(ResponseLine::new());
                }
                FramerStatus::Error => return Err(ModemError::ConnectionAborted),
            }
        }
    }

    fn ensure_chat(&self) -> Result<(), ModemError> {
        if self.uart_open && self.owner == TransportOwner::Chat {
            Ok(())
        } else {
            Err(ModemError::NotReady)
        }
    }
}

async fn deadline_wait(deadline: Option<Instant>) {
    match deadline {
        Some(at) => Timer::at(at).await,
        None => core::future::pending::<()>().await,
    }
}
