use std::fmt::{self, Display};
use std::time::Duration;

use futures_util::Stream;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_serial::SerialPortBuilderExt;

use crate::{
    Address, Error, ErrorKind, Frequency, GenericReply, Message, Parser, Payload, Pin,
    ReceiveEvent, Result, SharedGpio, VersionReply, LED_GREEN, LED_RED,
};

const BAUD: u32 = 115_200;
const RESET_PULSE: Duration = Duration::from_millis(250);
const INIT_TIMEOUT: Duration = Duration::from_secs(10);
const COM_TIMEOUT: Duration = Duration::from_secs(3);
const MSG_CODE_INITIALIZED: i32 = 1;
const EXPECTED_FW: &str = "202201131742";

/// Radio link state. `Disabled` through `Ready` are the regular bring-up
/// sequence; everything from `Error` up is terminal until `init()` is
/// called again.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum RadioState {
    Disabled = 0x00,
    Resetting = 0x01,
    Initializing = 0x02,
    Ready = 0x03,
    Error = 0x80,
    DevNotFound = 0x81,
    DevOpenFail = 0x82,
    InitTimeout = 0x83,
    ComTimeout = 0x84,
    WrongFw = 0x85,
}

impl RadioState {
    pub fn is_error(self) -> bool {
        self >= RadioState::Error
    }

    /// Error states that are not worth retrying without operator
    /// intervention.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            RadioState::DevNotFound
                | RadioState::DevOpenFail
                | RadioState::InitTimeout
                | RadioState::WrongFw
        )
    }
}

impl Display for RadioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RadioState::Disabled => "disabled",
            RadioState::Resetting => "resetting",
            RadioState::Initializing => "initializing",
            RadioState::Ready => "ready",
            RadioState::Error => "error",
            RadioState::DevNotFound => "device not found",
            RadioState::DevOpenFail => "device open failed",
            RadioState::InitTimeout => "initialization timeout",
            RadioState::ComTimeout => "communication timeout",
            RadioState::WrongFw => "wrong firmware version",
        };
        write!(f, "{}", text)
    }
}

#[derive(Clone, Debug)]
pub struct RadioConfig {
    pub uart: String,
    pub tx_power: i32,
    pub frequency: Frequency,
    pub pin_boot: Pin,
    pub pin_reset: Pin,
    pub invert_boot: bool,
    pub invert_reset: bool,
}

/// The transport the radio task drives: byte stream plus the modem-control
/// lines used as BOOT/RESET on boards without SoC GPIO.
pub trait RadioPort: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + Unpin {
    fn set_modem_line(&mut self, pin: Pin, level: bool) -> Result<()>;
}

impl RadioPort for tokio_serial::SerialStream {
    fn set_modem_line(&mut self, pin: Pin, level: bool) -> Result<()> {
        use tokio_serial::SerialPort;
        match pin {
            Pin::UartRts => self.write_request_to_send(level)?,
            Pin::UartDtr => self.write_data_terminal_ready(level)?,
            _ => {}
        }
        Ok(())
    }
}

enum RadioCommand {
    Init,
    Deinit,
    Transmit {
        addr: Address,
        payload: Payload,
        done: oneshot::Sender<bool>,
    },
    Inject(String),
}

/// Handle to the radio task. Cheap to clone; commands are serialized by the
/// task's event loop.
#[derive(Clone)]
pub struct Radio {
    commands: mpsc::Sender<RadioCommand>,
    state: watch::Receiver<RadioState>,
}

impl Radio {
    /// Opens the configured serial device lazily: the port is (re-)opened by
    /// each `init()` as part of the bring-up sequence.
    pub fn open(config: RadioConfig, gpio: SharedGpio) -> (Radio, PacketReader) {
        let builder = tokio_serial::new(config.uart.clone(), BAUD)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None);
        Self::spawn(config, gpio, move || {
            Ok(builder.clone().open_native_async()?)
        })
    }

    /// Spawns the radio task over an arbitrary transport factory. The
    /// factory is invoked by `init()`.
    pub fn spawn<C, P>(config: RadioConfig, gpio: SharedGpio, connect: C) -> (Radio, PacketReader)
    where
        C: FnMut() -> Result<P> + Send + 'static,
        P: RadioPort + 'static,
    {
        {
            let mut gpio = gpio.lock().expect("poisoned");
            gpio.init_pin(config.pin_boot, config.invert_boot);
            gpio.init_pin(config.pin_reset, config.invert_reset);
            gpio.init_pin(LED_GREEN, false);
            gpio.init_pin(LED_RED, false);
            gpio.clear(LED_GREEN);
            gpio.clear(LED_RED);
        }

        let (commands_tx, commands_rx) = mpsc::channel(8);
        let (states_tx, states_rx) = watch::channel(RadioState::Disabled);
        let (events_tx, events_rx) = mpsc::channel(16);

        let task = RadioTask {
            config,
            gpio,
            connect,
            port: None,
            parser: Parser::new(),
            state: RadioState::Disabled,
            states: states_tx,
            events: events_tx,
            commands: commands_rx,
            deadline: None,
        };
        tokio::spawn(task.run());

        (
            Radio {
                commands: commands_tx,
                state: states_rx,
            },
            PacketReader { rx: events_rx },
        )
    }

    pub async fn init(&self) {
        let _ = self.commands.send(RadioCommand::Init).await;
    }

    pub async fn deinit(&self) {
        let _ = self.commands.send(RadioCommand::Deinit).await;
    }

    /// Sends a payload. Returns false when the address is invalid, the
    /// radio is not ready, or the frame could not be written.
    pub async fn transmit(&self, addr: Address, payload: Payload) -> bool {
        let (done, result) = oneshot::channel();
        if self
            .commands
            .send(RadioCommand::Transmit {
                addr,
                payload,
                done,
            })
            .await
            .is_err()
        {
            return false;
        }
        result.await.unwrap_or(false)
    }

    /// Feeds a synthetic frame body into the message handler (debugging).
    pub async fn inject(&self, frame: &str) {
        let _ = self
            .commands
            .send(RadioCommand::Inject(frame.to_string()))
            .await;
    }

    pub fn states(&self) -> watch::Receiver<RadioState> {
        self.state.clone()
    }

    pub fn state(&self) -> RadioState {
        *self.state.borrow()
    }

    /// The stock firmware does not allow changing the sender address
    /// between transmits.
    pub fn supports_address_change(&self) -> bool {
        false
    }
}

/// Stream of packets received over the air.
pub struct PacketReader {
    rx: mpsc::Receiver<ReceiveEvent>,
}

impl PacketReader {
    pub async fn recv(&mut self) -> Option<ReceiveEvent> {
        self.rx.recv().await
    }

    /// A reader decoupled from any radio, fed by the returned sender.
    pub fn channel(capacity: usize) -> (mpsc::Sender<ReceiveEvent>, PacketReader) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, PacketReader { rx })
    }
}

impl Stream for PacketReader {
    type Item = ReceiveEvent;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

enum TaskEvent {
    Command(Option<RadioCommand>),
    Timeout,
    Serial(std::io::Result<usize>),
}

/// The radio event loop: drives bring-up, watches the single outstanding
/// command timer and decodes inbound frames.
struct RadioTask<C, P> {
    config: RadioConfig,
    gpio: SharedGpio,
    connect: C,
    port: Option<P>,
    parser: Parser,
    state: RadioState,
    states: watch::Sender<RadioState>,
    events: mpsc::Sender<ReceiveEvent>,
    commands: mpsc::Receiver<RadioCommand>,
    deadline: Option<Instant>,
}

impl<C, P> RadioTask<C, P>
where
    C: FnMut() -> Result<P> + Send + 'static,
    P: RadioPort + 'static,
{
    async fn run(mut self) {
        let mut buf = [0u8; 256];
        loop {
            let event = {
                let commands = &mut self.commands;
                let port = &mut self.port;
                let port_open = port.is_some();
                let deadline = self.deadline;
                tokio::select! {
                    cmd = commands.recv() => TaskEvent::Command(cmd),
                    _ = tokio::time::sleep_until(
                        deadline.unwrap_or_else(|| Instant::now() + INIT_TIMEOUT)
                    ), if deadline.is_some() => TaskEvent::Timeout,
                    result = async { port.as_mut().expect("port").read(&mut buf).await },
                        if port_open => TaskEvent::Serial(result),
                }
            };

            match event {
                TaskEvent::Command(None) => break, // all handles dropped
                TaskEvent::Command(Some(cmd)) => self.handle_command(cmd).await,
                TaskEvent::Timeout => {
                    self.deadline = None;
                    self.on_timeout();
                }
                TaskEvent::Serial(Ok(0)) => {
                    error!("serial port closed unexpectedly");
                    self.port = None;
                    self.cancel_timer();
                    self.set_state(RadioState::Error);
                }
                TaskEvent::Serial(Ok(n)) => {
                    for msg in self.parser.push(&buf[..n]) {
                        self.handle_message(msg).await;
                    }
                }
                TaskEvent::Serial(Err(error)) => {
                    error!("serial read failed: {}", error);
                    self.port = None;
                    self.cancel_timer();
                    self.set_state(RadioState::Error);
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: RadioCommand) {
        match cmd {
            RadioCommand::Init => self.init(),
            RadioCommand::Deinit => self.deinit(),
            RadioCommand::Transmit {
                addr,
                payload,
                done,
            } => {
                let ok = self.transmit(addr, payload).await;
                let _ = done.send(ok);
            }
            RadioCommand::Inject(frame) => {
                if let Some(msg) = Parser::parse_body(frame.trim().as_bytes()) {
                    self.handle_message(msg).await;
                }
            }
        }
    }

    fn init(&mut self) {
        if self.port.is_some() {
            self.deinit();
        }

        match (self.connect)() {
            Ok(port) => self.port = Some(port),
            Err(error) => {
                error!(
                    "failed to open serial port '{}': {}",
                    self.config.uart, error
                );
                let state = if is_not_found(&error) {
                    RadioState::DevNotFound
                } else {
                    RadioState::DevOpenFail
                };
                self.set_state(state);
                return;
            }
        }

        info!(
            "serial port opened: {}, resetting radio...",
            self.config.uart
        );
        self.set_state(RadioState::Resetting);
        self.drive_pin(self.config.pin_boot, true);
        self.drive_pin(self.config.pin_reset, false);
        self.arm(RESET_PULSE);
    }

    fn deinit(&mut self) {
        // hold the radio in reset
        self.drive_pin(self.config.pin_reset, false);
        self.cancel_timer();
        self.port = None;
        self.set_state(RadioState::Disabled);
    }

    fn on_timeout(&mut self) {
        match self.state {
            RadioState::Resetting => {
                // release the radio and wait for "#FNR MSG,1,initialized"
                self.drive_pin(self.config.pin_boot, false);
                self.drive_pin(self.config.pin_reset, true);
                self.set_state(RadioState::Initializing);
                self.arm(INIT_TIMEOUT);
            }
            RadioState::Initializing => {
                error!("timeout initializing radio");
                self.set_state(RadioState::InitTimeout);
            }
            RadioState::Ready => {
                error!("communication with radio timed out");
                self.set_state(RadioState::ComTimeout);
            }
            _ => {}
        }
    }

    async fn handle_message(&mut self, msg: Message) {
        match msg {
            Message::PktReceived(event) => self.handle_packet(event),
            Message::FanetReply(reply) => {
                if self.state == RadioState::Initializing {
                    self.on_initialized(reply).await;
                } else {
                    self.handle_fanet_reply(reply);
                }
            }
            Message::RegionReply(reply) => self.handle_region_reply(reply).await,
            Message::VersionReply(reply) => self.handle_version_reply(reply).await,
            other => debug!("ignored unexpected fanet message: {:?}", other),
        }
    }

    fn handle_packet(&mut self, event: ReceiveEvent) {
        info!("{}", event);
        if let Err(mpsc::error::TrySendError::Full(_)) = self.events.try_send(event) {
            warn!("receive event dropped, reader is lagging");
        }
    }

    async fn on_initialized(&mut self, reply: GenericReply) {
        match reply {
            GenericReply::Msg { code, .. } if code == MSG_CODE_INITIALIZED => {}
            other => {
                warn!("received unexpected message: {:?}", other);
                return;
            }
        }
        info!("radio found, checking firmware version...");
        self.arm(COM_TIMEOUT);
        self.send_message(&Message::Version).await;
    }

    async fn handle_version_reply(&mut self, reply: VersionReply) {
        self.cancel_timer();
        let version = match reply.version() {
            Some(version) if !version.is_empty() => version.to_string(),
            _ => {
                error!("radio firmware version check failed");
                self.set_state(RadioState::WrongFw);
                return;
            }
        };
        if version != EXPECTED_FW {
            error!(
                "wrong radio firmware version: '{}' (expected: '{}')",
                version, EXPECTED_FW
            );
            self.set_state(RadioState::WrongFw);
            return;
        }
        info!("firmware version: {}", version);

        info!(
            "setting radio region: tx-power={}dBm, frequency={}",
            self.config.tx_power, self.config.frequency
        );
        let cmd = Message::Region {
            tx_power: self.config.tx_power,
            frequency: self.config.frequency,
        };
        self.send_message(&cmd).await;
        self.arm(COM_TIMEOUT);
    }

    async fn handle_region_reply(&mut self, reply: GenericReply) {
        self.cancel_timer();
        if reply != GenericReply::Ok {
            error!("failed to set radio region/enabled: {:?}", reply);
            self.set_state(RadioState::Error);
            return;
        }

        if self.state == RadioState::Initializing {
            self.send_message(&Message::Enable(true)).await;
            self.arm(COM_TIMEOUT);
            info!("radio ready");
            self.set_state(RadioState::Ready);
        }
    }

    fn handle_fanet_reply(&mut self, reply: GenericReply) {
        if self.state == RadioState::Ready {
            // the single outstanding command is answered
            self.cancel_timer();
        }
        self.gpio.lock().expect("poisoned").clear(LED_GREEN);
        match reply {
            GenericReply::Ok => debug!("fanet command reply: ok"),
            GenericReply::Msg { code, text } => info!("fanet command reply: {} - {}", code, text),
            GenericReply::Ack(addr) => debug!("fanet command: ack from {}", addr),
            GenericReply::Nack(addr) => debug!("fanet command: nack from {}", addr),
            GenericReply::Error { code, text } => {
                error!("fanet command failed: {} - {}", code, text);
                self.set_state(RadioState::Error);
            }
        }
    }

    async fn transmit(&mut self, addr: Address, payload: Payload) -> bool {
        if !addr.is_valid() {
            warn!("failed to send data: invalid address");
            return false;
        }
        if self.state != RadioState::Ready {
            warn!(
                "failed to send data ({}) to '{}': radio is not ready (current state: {})",
                payload.payload_type(),
                addr.to_hex(':'),
                self.state
            );
            return false;
        }
        self.gpio.lock().expect("poisoned").set(LED_GREEN, true);
        self.send_message(&Message::Transmit { addr, payload }).await
    }

    async fn send_message(&mut self, msg: &Message) -> bool {
        let frame = match Parser::frame(msg) {
            Ok(frame) => frame,
            Err(error) => {
                error!("failed to serialize message: {}", error);
                return false;
            }
        };
        if self.port.is_none() {
            error!(
                "cannot write to radio, message dropped: '{}'",
                String::from_utf8_lossy(&frame).trim()
            );
            return false;
        }

        debug!("sending message: '{}'", String::from_utf8_lossy(&frame).trim());
        let result = self.port.as_mut().expect("port").write_all(&frame).await;
        if let Err(error) = result {
            self.cancel_timer();
            error!("failed to write to radio: {}", error);
            self.set_state(RadioState::Error);
            return false;
        }
        true
    }

    fn drive_pin(&mut self, pin: Pin, value: bool) {
        if pin.is_modem_line() {
            let level = self.gpio.lock().expect("poisoned").level(pin, value);
            if let Some(port) = self.port.as_mut() {
                debug!("setting uart {} to {}", pin, level);
                if let Err(error) = port.set_modem_line(pin, level) {
                    warn!("failed to drive {}: {}", pin, error);
                }
            }
        } else {
            self.gpio.lock().expect("poisoned").set(pin, value);
        }
    }

    fn set_state(&mut self, state: RadioState) {
        if state == self.state {
            return;
        }
        info!("radio state changed: {} -> {}", self.state, state);
        {
            let mut gpio = self.gpio.lock().expect("poisoned");
            match state {
                RadioState::Resetting => gpio.set(LED_GREEN, true),
                RadioState::Ready => gpio.set(LED_GREEN, false),
                state if state.is_error() => {
                    gpio.clear(LED_GREEN);
                    gpio.set(LED_RED, true);
                }
                _ => gpio.clear(LED_RED),
            }
        }
        self.state = state;
        let _ = self.states.send(state);
    }

    fn arm(&mut self, timeout: Duration) {
        self.deadline = Some(Instant::now() + timeout);
    }

    fn cancel_timer(&mut self) {
        self.deadline = None;
    }
}

fn is_not_found(error: &Error) -> bool {
    match &error.kind {
        ErrorKind::SerialPort(error) => matches!(
            error.kind(),
            tokio_serial::ErrorKind::NoDevice
                | tokio_serial::ErrorKind::Io(std::io::ErrorKind::NotFound)
        ),
        ErrorKind::Io(error) => error.kind() == std::io::ErrorKind::NotFound,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Gpio;
    use tokio::io::{duplex, DuplexStream};
    use tokio::time::timeout;

    impl RadioPort for DuplexStream {
        fn set_modem_line(&mut self, _pin: Pin, _level: bool) -> Result<()> {
            Ok(())
        }
    }

    fn test_radio() -> (
        Radio,
        PacketReader,
        DuplexStream,
        watch::Receiver<RadioState>,
    ) {
        let (ours, theirs) = duplex(4096);
        let mut side = Some(ours);
        let config = RadioConfig {
            uart: "test".to_string(),
            tx_power: 14,
            frequency: Frequency::Mhz868,
            pin_boot: Pin::UartDtr,
            pin_reset: Pin::UartRts,
            invert_boot: false,
            invert_reset: false,
        };
        let (radio, packets) = Radio::spawn(config, Gpio::shared(), move || {
            side.take()
                .ok_or_else(|| Error::from(ErrorKind::ChannelClosed))
        });
        let states = radio.states();
        (radio, packets, theirs, states)
    }

    async fn expect_state(states: &mut watch::Receiver<RadioState>, expected: RadioState) {
        states.changed().await.expect("radio task gone");
        assert_eq!(*states.borrow_and_update(), expected);
    }

    async fn read_frame(peer: &mut DuplexStream) -> String {
        let mut frame = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            peer.read_exact(&mut byte).await.unwrap();
            frame.push(byte[0]);
            if byte[0] == b'\n' {
                break;
            }
        }
        String::from_utf8(frame).unwrap()
    }

    async fn nothing_written(peer: &mut DuplexStream) -> bool {
        let mut byte = [0u8; 1];
        timeout(Duration::from_secs(30), peer.read_exact(&mut byte))
            .await
            .is_err()
    }

    async fn bring_up(
        peer: &mut DuplexStream,
        states: &mut watch::Receiver<RadioState>,
        radio: &Radio,
    ) {
        radio.init().await;
        expect_state(states, RadioState::Resetting).await;
        expect_state(states, RadioState::Initializing).await;

        peer.write_all(b"#CCCCC\n#FNR MSG,1,initialized\n")
            .await
            .unwrap();
        assert_eq!(read_frame(peer).await, "#DGV\n");

        peer.write_all(b"#DGV build-202201131742\n").await.unwrap();
        assert_eq!(read_frame(peer).await, "#DGL 868,14\n");

        peer.write_all(b"#DGR OK\n").await.unwrap();
        assert_eq!(read_frame(peer).await, "#DGP 1\n");
        expect_state(states, RadioState::Ready).await;

        // implicit ack for the enable command
        peer.write_all(b"#FNR OK\n").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn brings_up_the_radio_in_order() {
        let (radio, _packets, mut peer, mut states) = test_radio();
        bring_up(&mut peer, &mut states, &radio).await;

        // the enable ack stopped the command timer, ready is stable
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(radio.state(), RadioState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_firmware_is_terminal() {
        let (radio, _packets, mut peer, mut states) = test_radio();
        radio.init().await;
        expect_state(&mut states, RadioState::Resetting).await;
        expect_state(&mut states, RadioState::Initializing).await;

        peer.write_all(b"#FNR MSG,1,initialized\n").await.unwrap();
        assert_eq!(read_frame(&mut peer).await, "#DGV\n");

        peer.write_all(b"#DGV build-202001010000\n").await.unwrap();
        expect_state(&mut states, RadioState::WrongFw).await;

        // no region or enable command follows
        assert!(nothing_written(&mut peer).await);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_banner_times_out() {
        let (radio, _packets, _peer, mut states) = test_radio();
        radio.init().await;
        expect_state(&mut states, RadioState::Resetting).await;
        expect_state(&mut states, RadioState::Initializing).await;
        expect_state(&mut states, RadioState::InitTimeout).await;
    }

    #[tokio::test(start_paused = true)]
    async fn transmit_outside_ready_writes_nothing() {
        let (radio, _packets, mut peer, _states) = test_radio();
        assert!(
            !radio
                .transmit(Address::BROADCAST, Payload::name_payload("Koessen"))
                .await
        );
        assert!(nothing_written(&mut peer).await);
    }

    #[tokio::test(start_paused = true)]
    async fn transmit_rejects_invalid_address() {
        let (radio, _packets, mut peer, mut states) = test_radio();
        bring_up(&mut peer, &mut states, &radio).await;
        assert!(
            !radio
                .transmit(Address::INVALID, Payload::name_payload("Koessen"))
                .await
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transmits_when_ready() {
        let (radio, _packets, mut peer, mut states) = test_radio();
        bring_up(&mut peer, &mut states, &radio).await;

        assert!(
            radio
                .transmit(Address::BROADCAST, Payload::name_payload("K"))
                .await
        );
        assert_eq!(read_frame(&mut peer).await, "#FNT 2,00,0000,0,0,1,4b\n");
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_command_degrades_to_com_timeout() {
        let (radio, _packets, mut peer, mut states) = test_radio();
        radio.init().await;
        expect_state(&mut states, RadioState::Resetting).await;
        expect_state(&mut states, RadioState::Initializing).await;

        peer.write_all(b"#FNR MSG,1,initialized\n").await.unwrap();
        assert_eq!(read_frame(&mut peer).await, "#DGV\n");
        peer.write_all(b"#DGV build-202201131742\n").await.unwrap();
        assert_eq!(read_frame(&mut peer).await, "#DGL 868,14\n");
        peer.write_all(b"#DGR OK\n").await.unwrap();
        assert_eq!(read_frame(&mut peer).await, "#DGP 1\n");
        expect_state(&mut states, RadioState::Ready).await;

        // no enable ack: the command timer fires
        expect_state(&mut states, RadioState::ComTimeout).await;

        // absorbing until init() is called again
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(radio.state(), RadioState::ComTimeout);
    }

    #[tokio::test(start_paused = true)]
    async fn fanet_error_reply_degrades_ready_to_error() {
        let (radio, _packets, mut peer, mut states) = test_radio();
        bring_up(&mut peer, &mut states, &radio).await;

        peer.write_all(b"#FNR ERR,3,tx failed\n").await.unwrap();
        expect_state(&mut states, RadioState::Error).await;
    }

    #[tokio::test(start_paused = true)]
    async fn forwards_received_packets() {
        let (radio, mut packets, mut peer, mut states) = test_radio();
        bring_up(&mut peer, &mut states, &radio).await;

        peer.write_all(b"#FNF 11,5C0B,1,0,2,7,4b6f657373656e\n")
            .await
            .unwrap();
        let event = packets.recv().await.expect("event");
        assert_eq!(event.sender, Address::new(0x11, 0x5C0B));
        assert_eq!(event.payload.name().as_deref(), Some("Koessen"));
    }
}
