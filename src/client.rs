//! Connection supervision: dialing, I/O loops, keepalive, reconnect, quit.
//!
//! [`Client`] is the top-level owner. It holds the configuration, the two
//! event registries (which outlive any single socket), the capability
//! tracker, and the mutable connection state behind one mutex. Each
//! connection attempt spawns a reader task, a writer task, an optional
//! keepalive prober, a handshake watchdog, and a monitor that implements
//! the reconnect loop.
//!
//! Discipline enforced here:
//! - Exactly one writer touches the socket. Every outbound message, from
//!   negotiation, keepalive, or user code, goes through one unbounded FIFO
//!   queue. Senders never block; the tradeoff is unbounded memory under
//!   sustained backpressure.
//! - The state mutex is never held across `.await` or a user callback.
//! - One cancellation token, closed exactly once by [`Client::quit`]; every
//!   task observes it, and `quit` joins them all before returning.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::caps::CapabilityTracker;
use crate::config::Config;
use crate::dispatch::{Direction, Dispatcher, Handler};
use crate::error::{ClientError, Result};
use crate::event::Event;
use crate::line::LineCodec;
use crate::message::Message;
use crate::negotiate::{Action, Negotiator};
use crate::transport::{ReadHalf, Transport, WriteHalf};

/// Priority used by the engine's own handlers, ahead of user callbacks at
/// the default priority 0.
const INTERNAL_PRIORITY: i32 = -50;

/// Where the current connection attempt stands. Terminal states wake
/// [`Client::wait_for_registration`] exactly once per attempt.
#[derive(Clone, Debug)]
enum Phase {
    Idle,
    Connecting,
    Registered,
    Failed(ClientError),
}

/// Mutable per-connection state. Single owner, one mutex.
struct ConnState {
    running: bool,
    quitting: bool,
    registered: bool,
    ping_outstanding: bool,
    current_nick: String,
    last_error: Option<String>,
    quit_at: Option<DateTime<Utc>>,
    last_inbound: Instant,
}

struct Shared {
    config: Config,
    state: Mutex<ConnState>,
    caps: CapabilityTracker,
    negotiator: Mutex<Negotiator>,
    events_in: Dispatcher,
    events_out: Dispatcher,
    out_tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
    quit_token: CancellationToken,
    conn_token: Mutex<CancellationToken>,
    phase_tx: watch::Sender<Phase>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Handle returned by [`Client::register_event`], used for removal.
#[derive(Clone, Debug)]
pub struct HandlerHandle {
    name: String,
    in_id: Option<u64>,
    out_id: Option<u64>,
}

/// An event-driven IRC client connection.
///
/// Cheap to clone; clones share the same connection and registries.
///
/// ```no_run
/// use slirc_client::{Client, Config, Direction};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), slirc_client::ClientError> {
/// let client = Client::new(Config {
///     server: "irc.libera.chat:6697".to_string(),
///     use_tls: true,
///     nick: "slircbot".to_string(),
///     user: "slirc".to_string(),
///     realname: "slirc example".to_string(),
///     ..Config::default()
/// });
///
/// client.register_event(
///     Direction::In,
///     "PRIVMSG",
///     Arc::new(|event| println!("<{}> {}", event.nick(), event.text())),
///     0,
/// );
///
/// client.connect().await?;
/// client.wait_for_registration().await?;
/// client.send("JOIN", &["#rust"])?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

impl Client {
    /// Build a client from configuration. No I/O happens until
    /// [`Client::connect`].
    pub fn new(config: Config) -> Self {
        let strict = config.strict_callback_faults;
        let (phase_tx, _) = watch::channel(Phase::Idle);

        let shared = Arc::new(Shared {
            state: Mutex::new(ConnState {
                running: false,
                quitting: false,
                registered: false,
                ping_outstanding: false,
                current_nick: config.nick.clone(),
                last_error: None,
                quit_at: None,
                last_inbound: Instant::now(),
            }),
            caps: CapabilityTracker::new(),
            negotiator: Mutex::new(Negotiator::new()),
            events_in: Dispatcher::new(strict),
            events_out: Dispatcher::new(strict),
            out_tx: Mutex::new(None),
            quit_token: CancellationToken::new(),
            conn_token: Mutex::new(CancellationToken::new()),
            phase_tx,
            tasks: Mutex::new(Vec::new()),
            config,
        });

        let wanted: Vec<&str> = shared.config.request_caps.iter().map(String::as_str).collect();
        shared.caps.add_wanted_caps(&wanted);
        if shared.config.use_sasl {
            shared.caps.add_wanted_caps(&["sasl"]);
        }

        install_base_handlers(&shared);
        Self { shared }
    }

    /// Dial the configured server and start the connection tasks.
    ///
    /// Returns as soon as the transport is up and `CAP LS 302` is queued;
    /// registration completes asynchronously. Use
    /// [`Client::wait_for_registration`] to block on the outcome. A dial
    /// failure is returned directly and is not retried here.
    pub async fn connect(&self) -> Result<()> {
        self.shared.config.validate()?;
        self.ensure_not_running()?;

        let config = &self.shared.config;
        let transport = if config.use_tls {
            Transport::dial_tls(&config.server, config.host(), config.tls_config.clone()).await?
        } else {
            Transport::dial(&config.server).await?
        };
        self.shared.attach(transport)
    }

    /// Start the connection tasks over an already-established transport.
    ///
    /// This is the entry point for [`Transport::local`] pipes.
    pub fn connect_with_transport(&self, transport: Transport) -> Result<()> {
        self.shared.config.validate()?;
        self.ensure_not_running()?;
        self.shared.attach(transport)
    }

    fn ensure_not_running(&self) -> Result<()> {
        let state = self.shared.state.lock().unwrap();
        if state.running {
            return Err(ClientError::Config(
                "connect called while a connection is active".to_string(),
            ));
        }
        if state.quitting {
            return Err(ClientError::Config(
                "client has been shut down".to_string(),
            ));
        }
        Ok(())
    }

    /// Queue a message for the writer.
    ///
    /// Never blocks on the network. Fails if the encoded line (excluding
    /// tags) would exceed the configured maximum, or if no connection is
    /// active.
    pub fn send_message(&self, message: Message) -> Result<()> {
        self.shared.send_message(message)
    }

    /// Queue a command with parameters.
    pub fn send(&self, command: &str, params: &[&str]) -> Result<()> {
        self.shared.send_message(Message::new(command, params))
    }

    /// Queue a raw line. The line must parse; framing is never corrupted by
    /// sending unchecked text.
    pub fn send_raw(&self, line: &str) -> Result<()> {
        let message = Message::parse(line).map_err(|cause| ClientError::Parse {
            string: line.to_string(),
            cause,
        })?;
        self.shared.send_message(message)
    }

    /// Attach a callback for the named event (uppercased protocol command,
    /// or the sentinels `ALL` / `RAW`). Lower priorities run first; ties run
    /// in registration order. Registrations survive reconnects.
    pub fn register_event(
        &self,
        direction: Direction,
        name: &str,
        handler: Handler,
        priority: i32,
    ) -> HandlerHandle {
        let name = name.to_ascii_uppercase();
        let in_id = matches!(direction, Direction::In | Direction::Both)
            .then(|| self.shared.events_in.register(&name, handler.clone(), priority));
        let out_id = matches!(direction, Direction::Out | Direction::Both)
            .then(|| self.shared.events_out.register(&name, handler, priority));
        HandlerHandle { name, in_id, out_id }
    }

    /// Remove a previously registered callback. Safe to call from within
    /// that callback during dispatch.
    pub fn remove_event(&self, handle: &HandlerHandle) {
        if let Some(id) = handle.in_id {
            self.shared.events_in.remove(&handle.name, id);
        }
        if let Some(id) = handle.out_id {
            self.shared.events_out.remove(&handle.name, id);
        }
    }

    /// Block until the current connection attempt reaches `001` or fails.
    ///
    /// Never hangs: the handshake watchdog guarantees a terminal outcome
    /// within the configured timeout.
    pub async fn wait_for_registration(&self) -> Result<()> {
        let mut rx = self.shared.phase_tx.subscribe();
        let phase = rx
            .wait_for(|p| matches!(p, Phase::Registered | Phase::Failed(_)))
            .await
            .map_err(|_| ClientError::NotConnected)?;
        match &*phase {
            Phase::Registered => Ok(()),
            Phase::Failed(err) => Err(err.clone()),
            _ => unreachable!(),
        }
    }

    /// Send `QUIT` and shut the client down.
    ///
    /// Closes the shared cancellation signal exactly once and waits for
    /// every spawned task to exit: after this returns there is no residual
    /// socket activity. A quit client never reconnects.
    pub async fn quit(&self, message: Option<&str>) {
        let first = {
            let mut state = self.shared.state.lock().unwrap();
            let first = !state.quitting;
            state.quitting = true;
            if first {
                state.quit_at = Some(Utc::now());
            }
            first
        };

        if first {
            let text = message.unwrap_or(self.shared.config.quit_message.as_str());
            let quit = if text.is_empty() {
                Message::new("QUIT", &[])
            } else {
                Message::new("QUIT", &[text])
            };
            if let Err(e) = self.shared.send_message(quit) {
                debug!("quit without active connection: {}", e);
            }
        }

        // Dropping the sender lets the writer drain the queue (QUIT last)
        // and exit on its own; the token stops everything else.
        *self.shared.out_tx.lock().unwrap() = None;
        self.shared.quit_token.cancel();

        let handles: Vec<JoinHandle<()>> = self.shared.tasks.lock().unwrap().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
        debug!("client shut down");
    }

    /// Whether a transport is currently up.
    pub fn is_connected(&self) -> bool {
        self.shared.state.lock().unwrap().running
    }

    /// Whether registration (`001`) has completed on the current
    /// connection.
    pub fn is_registered(&self) -> bool {
        self.shared.state.lock().unwrap().registered
    }

    /// The nickname currently assigned by the server. May diverge from the
    /// configured nick after a collision.
    pub fn current_nick(&self) -> String {
        self.shared.state.lock().unwrap().current_nick.clone()
    }

    /// The most recent terminal error, if any.
    pub fn last_error(&self) -> Option<String> {
        self.shared.state.lock().unwrap().last_error.clone()
    }

    /// When [`Client::quit`] was first invoked.
    pub fn quit_at(&self) -> Option<DateTime<Utc>> {
        self.shared.state.lock().unwrap().quit_at
    }

    /// Capability negotiation state for feature gating.
    pub fn caps(&self) -> &CapabilityTracker {
        &self.shared.caps
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &Config {
        &self.shared.config
    }
}

impl Shared {
    /// Wire a transport up: reset per-connection state, spawn the task set,
    /// and open negotiation.
    fn attach(self: &Arc<Self>, transport: Transport) -> Result<()> {
        let conn_token = self.quit_token.child_token();
        *self.conn_token.lock().unwrap() = conn_token.clone();

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        *self.out_tx.lock().unwrap() = Some(out_tx);

        {
            let mut state = self.state.lock().unwrap();
            state.running = true;
            state.registered = false;
            state.ping_outstanding = false;
            state.current_nick = self.config.nick.clone();
            state.last_error = None;
            state.last_inbound = Instant::now();
        }
        self.caps.reset_session();
        self.phase_tx.send_replace(Phase::Connecting);

        let (read_half, write_half) = transport.into_split();
        let reader = FramedRead::new(read_half, LineCodec::new("utf-8")?);
        let writer = FramedWrite::new(write_half, LineCodec::new("utf-8")?);

        let mut handles = Vec::with_capacity(5);
        handles.push(tokio::spawn(write_loop(writer, out_rx, conn_token.clone())));
        handles.push(tokio::spawn(read_loop(
            Arc::clone(self),
            reader,
            conn_token.clone(),
        )));
        if let Some(interval) = self.config.keepalive {
            handles.push(tokio::spawn(keepalive_loop(
                Arc::clone(self),
                interval,
                conn_token.clone(),
            )));
        }
        handles.push(tokio::spawn(handshake_watchdog(
            Arc::clone(self),
            conn_token.clone(),
        )));
        handles.push(tokio::spawn(monitor(Arc::clone(self), conn_token)));

        {
            let mut tasks = self.tasks.lock().unwrap();
            tasks.retain(|h| !h.is_finished());
            tasks.extend(handles);
        }

        info!(server = %self.config.server, tls = self.config.use_tls, "connection established");

        let actions = {
            let mut negotiator = self.negotiator.lock().unwrap();
            negotiator.reset();
            negotiator.start()
        };
        self.apply_actions(actions);
        Ok(())
    }

    async fn redial(&self) -> Result<Transport> {
        if self.config.use_tls {
            Transport::dial_tls(&self.config.server, self.config.host(), self.config.tls_config.clone())
                .await
        } else {
            Transport::dial(&self.config.server).await
        }
    }

    fn send_message(&self, message: Message) -> Result<()> {
        let body = message.body();
        if body.len() + 2 > self.config.max_line_len {
            return Err(ClientError::LineTooLong {
                len: body.len(),
                max: self.config.max_line_len,
            });
        }

        let line = message.to_string();
        let tx = self
            .out_tx
            .lock()
            .unwrap()
            .clone()
            .ok_or(ClientError::NotConnected)?;
        tx.send(line.clone()).map_err(|_| ClientError::NotConnected)?;

        let name = message.command.to_ascii_uppercase();
        let event = Event::new(line, Some(message));
        self.events_out.dispatch_raw(&event);
        self.events_out.dispatch(&name, &event);
        Ok(())
    }

    /// One inbound line: stamp liveness, fire `RAW`, parse, fire structured
    /// dispatch. An undecodable line is skipped; it is never fatal.
    fn handle_line(&self, line: String) {
        self.state.lock().unwrap().last_inbound = Instant::now();
        if line.is_empty() {
            return;
        }
        trace!(line = %line, "<-");

        let parsed = Message::parse(&line);
        let event = Event::new(line, parsed.as_ref().ok().cloned());
        self.events_in.dispatch_raw(&event);

        match parsed {
            Ok(message) => {
                let name = message.command.to_ascii_uppercase();
                self.events_in.dispatch(&name, &event);
            }
            Err(e) => debug!(line = %event.raw, "skipping undecodable line: {}", e),
        }
    }

    fn apply_actions(&self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Send(message) => {
                    // Track the candidate nick so `current_nick` is accurate
                    // through collision retries.
                    if message.command == "NICK" {
                        if let Some(nick) = message.params.first() {
                            let mut state = self.state.lock().unwrap();
                            if !state.registered {
                                state.current_nick = nick.clone();
                            }
                        }
                    }
                    if let Err(e) = self.send_message(message) {
                        warn!("failed to queue negotiation message: {}", e);
                    }
                }
                Action::Registered { nick } => {
                    {
                        let mut state = self.state.lock().unwrap();
                        state.registered = true;
                        state.current_nick = nick.clone();
                    }
                    info!(nick = %nick, "registration complete");
                    self.phase_tx.send_replace(Phase::Registered);
                }
                Action::Fatal(err) => {
                    self.fail_connection(ClientError::Negotiation(err));
                }
            }
        }
    }

    /// Record a terminal error for this attempt and tear the connection
    /// down. The phase only moves to `Failed` before registration; later
    /// failures are plain disconnects for the reconnect loop.
    fn fail_connection(&self, err: ClientError) {
        warn!("connection failed: {}", err);
        self.state.lock().unwrap().last_error = Some(err.to_string());
        self.phase_tx.send_if_modified(|phase| match phase {
            Phase::Registered | Phase::Failed(_) => false,
            _ => {
                *phase = Phase::Failed(err.clone());
                true
            }
        });
        self.conn_token.lock().unwrap().cancel();
    }
}

/// Reader: sole consumer of the read half. Exits on cancellation, EOF, or a
/// read error, then cancels the connection token so the rest of the task
/// set follows.
async fn read_loop(
    shared: Arc<Shared>,
    mut reader: FramedRead<ReadHalf, LineCodec>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            item = reader.next() => match item {
                Some(Ok(line)) => shared.handle_line(line),
                Some(Err(e)) => {
                    warn!("read error: {}", e);
                    shared.state.lock().unwrap().last_error = Some(e.to_string());
                    break;
                }
                None => {
                    debug!("connection closed by peer");
                    break;
                }
            }
        }
    }
    shared.state.lock().unwrap().running = false;
    token.cancel();
}

/// Writer: sole producer on the write half, draining the queue strictly in
/// enqueue order, one message per write. On cancellation it flushes what is
/// already queued (a trailing QUIT included) before closing.
async fn write_loop(
    mut writer: FramedWrite<WriteHalf, LineCodec>,
    mut out_rx: mpsc::UnboundedReceiver<String>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            maybe = out_rx.recv() => match maybe {
                Some(line) => {
                    trace!(line = %line, "->");
                    if let Err(e) = writer.send(line).await {
                        warn!("write error: {}", e);
                        token.cancel();
                        break;
                    }
                }
                None => break,
            },
            _ = token.cancelled() => {
                while let Ok(line) = out_rx.try_recv() {
                    if writer.send(line).await.is_err() {
                        break;
                    }
                }
                break;
            }
        }
    }
    let _ = writer.close().await;
}

/// Liveness probe: after a full idle interval, send `PING`; if the matching
/// `PONG` has not arrived by the next tick, declare the link dead.
async fn keepalive_loop(shared: Arc<Shared>, interval: Duration, token: CancellationToken) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {
                let (outstanding, idle) = {
                    let state = shared.state.lock().unwrap();
                    (state.ping_outstanding, state.last_inbound.elapsed())
                };
                if outstanding {
                    warn!("no PONG within keepalive interval, declaring link dead");
                    shared.state.lock().unwrap().last_error =
                        Some("ping timeout".to_string());
                    token.cancel();
                    break;
                }
                if idle >= interval {
                    shared.state.lock().unwrap().ping_outstanding = true;
                    let stamp = Utc::now().timestamp_millis().to_string();
                    if shared.send_message(Message::new("PING", &[&stamp])).is_err() {
                        break;
                    }
                }
            }
        }
    }
}

/// Bounds the whole CAP/SASL/registration sequence, whatever sub-phase it
/// is in.
async fn handshake_watchdog(shared: Arc<Shared>, token: CancellationToken) {
    let timeout = shared.config.handshake_timeout;
    let mut phase_rx = shared.phase_tx.subscribe();
    tokio::select! {
        _ = token.cancelled() => {}
        result = phase_rx.wait_for(|p| matches!(p, Phase::Registered | Phase::Failed(_))) => {
            let _ = result;
        }
        _ = tokio::time::sleep(timeout) => {
            shared.fail_connection(ClientError::HandshakeTimeout);
        }
    }
}

/// Waits out one connection generation, then runs the reconnect loop: every
/// non-quit disconnection is retried at the configured interval,
/// indefinitely; an explicit quit is terminal.
async fn monitor(shared: Arc<Shared>, token: CancellationToken) {
    token.cancelled().await;

    {
        let mut state = shared.state.lock().unwrap();
        state.running = false;
        state.registered = false;
        state.ping_outstanding = false;
    }
    *shared.out_tx.lock().unwrap() = None;

    // Wake pre-registration waiters that no specific failure reached.
    shared.phase_tx.send_if_modified(|phase| match phase {
        Phase::Connecting => {
            *phase = Phase::Failed(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "disconnected during registration",
            )));
            true
        }
        _ => false,
    });

    if shared.state.lock().unwrap().quitting {
        debug!("connection closed after quit");
        return;
    }

    let Some(interval) = shared.config.reconnect_interval else {
        return;
    };

    loop {
        info!(delay = ?interval, "reconnecting after disconnect");
        tokio::select! {
            _ = shared.quit_token.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }
        if shared.state.lock().unwrap().quitting {
            return;
        }
        match shared.redial().await {
            Ok(transport) => match shared.attach(transport) {
                // The new generation's monitor takes over from here.
                Ok(()) => return,
                Err(e) => warn!("reconnect setup failed: {}", e),
            },
            Err(e) => {
                warn!("reconnect attempt failed: {}", e);
                shared.state.lock().unwrap().last_error = Some(e.to_string());
            }
        }
    }
}

/// Install the engine's own inbound handlers: liveness, negotiation
/// triggers, nick tracking, and the optional CTCP responder. They run ahead
/// of user callbacks and hold only a weak reference, so registries owned by
/// the client never keep it alive.
fn install_base_handlers(shared: &Arc<Shared>) {
    fn handler<F>(shared: &Arc<Shared>, f: F) -> Handler
    where
        F: Fn(&Arc<Shared>, &Event) + Send + Sync + 'static,
    {
        let weak: Weak<Shared> = Arc::downgrade(shared);
        Arc::new(move |event| {
            if let Some(shared) = weak.upgrade() {
                f(&shared, event);
            }
        })
    }

    let events_in = &shared.events_in;

    events_in.register(
        "PING",
        handler(shared, |s, e| {
            let reply = if e.text().is_empty() {
                Message::new("PONG", &[])
            } else {
                Message::new("PONG", &[e.text()])
            };
            if let Err(err) = s.send_message(reply) {
                debug!("failed to answer PING: {}", err);
            }
        }),
        INTERNAL_PRIORITY,
    );

    events_in.register(
        "PONG",
        handler(shared, |s, _| {
            s.state.lock().unwrap().ping_outstanding = false;
        }),
        INTERNAL_PRIORITY,
    );

    events_in.register(
        "CAP",
        handler(shared, |s, e| {
            let actions = {
                let mut negotiator = s.negotiator.lock().unwrap();
                negotiator.on_cap(e, &s.caps, &s.config)
            };
            s.apply_actions(actions);
        }),
        INTERNAL_PRIORITY,
    );

    events_in.register(
        "AUTHENTICATE",
        handler(shared, |s, _| {
            let actions = {
                let mut negotiator = s.negotiator.lock().unwrap();
                negotiator.on_authenticate(&s.config)
            };
            s.apply_actions(actions);
        }),
        INTERNAL_PRIORITY,
    );

    for code in [
        "001", "433", "437", "902", "903", "904", "905", "906", "907", "908",
    ] {
        events_in.register(
            code,
            handler(shared, |s, e| {
                let actions = {
                    let mut negotiator = s.negotiator.lock().unwrap();
                    negotiator.on_numeric(e.command(), e, &s.config)
                };
                s.apply_actions(actions);
            }),
            INTERNAL_PRIORITY,
        );
    }

    events_in.register(
        "ERROR",
        handler(shared, |s, e| {
            let actions = {
                let mut negotiator = s.negotiator.lock().unwrap();
                negotiator.on_error(e.text())
            };
            if actions.is_empty() {
                // Post-registration ERROR: the server is closing the link.
                s.state.lock().unwrap().last_error = Some(e.text().to_string());
            }
            s.apply_actions(actions);
        }),
        INTERNAL_PRIORITY,
    );

    events_in.register(
        "NICK",
        handler(shared, |s, e| {
            let ours = {
                let state = s.state.lock().unwrap();
                !e.nick().is_empty() && e.nick() == state.current_nick
            };
            if ours {
                if let Some(new_nick) = e.param(0) {
                    debug!(nick = new_nick, "nickname changed");
                    s.state.lock().unwrap().current_nick = new_nick.to_string();
                }
            }
        }),
        INTERNAL_PRIORITY,
    );

    if shared.config.enable_ctcp {
        events_in.register(
            "PRIVMSG",
            handler(shared, |s, e| {
                let text = e.text();
                let Some(payload) = text
                    .strip_prefix('\u{1}')
                    .and_then(|t| t.strip_suffix('\u{1}'))
                else {
                    return;
                };
                let target = e.nick();
                if target.is_empty() {
                    return;
                }
                let reply = match payload.split_once(' ') {
                    None if payload == "VERSION" => {
                        Some(format!("\u{1}VERSION {}\u{1}", s.config.version))
                    }
                    Some(("PING", args)) => Some(format!("\u{1}PING {}\u{1}", args)),
                    None if payload == "PING" => Some("\u{1}PING\u{1}".to_string()),
                    _ => None,
                };
                if let Some(reply) = reply {
                    if let Err(err) = s.send_message(Message::new("NOTICE", &[target, &reply])) {
                        debug!("failed to answer CTCP: {}", err);
                    }
                }
            }),
            INTERNAL_PRIORITY,
        );
    }
}
