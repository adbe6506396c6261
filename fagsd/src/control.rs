use clap::Parser;
use fanet::{Address, Payload, Radio};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

use crate::Args;

pub const SOCKET_PATH: &str = "/tmp/fagsd.sock";
const ARG_SEPARATOR: char = ';';

/// Forwards our argv to an already-running daemon. Returns true when one
/// accepted it; the caller should exit in that case.
pub async fn forward_to_running_instance(args: &[String]) -> bool {
    let mut stream = match UnixStream::connect(SOCKET_PATH).await {
        Ok(stream) => stream,
        Err(_) => return false,
    };
    let message = args.join(&ARG_SEPARATOR.to_string());
    if let Err(error) = stream.write_all(message.as_bytes()).await {
        warn!("failed to forward arguments to running instance: {}", error);
        return false;
    }
    let _ = stream.shutdown().await;
    true
}

/// The single-instance control channel. Each connection carries one argv,
/// parsed like a command line: `--quit` shuts the daemon down, `--message`
/// sends a unicast text message, `--inject` feeds a synthetic rx frame.
pub struct ControlServer {
    listener: UnixListener,
    radio: Radio,
    quit: mpsc::Sender<()>,
}

impl ControlServer {
    pub fn bind(radio: Radio, quit: mpsc::Sender<()>) -> std::io::Result<ControlServer> {
        // a stale socket from a crashed instance; nobody answered it above
        let _ = std::fs::remove_file(SOCKET_PATH);
        let listener = UnixListener::bind(SOCKET_PATH)?;
        Ok(ControlServer {
            listener,
            radio,
            quit,
        })
    }

    pub async fn run(self) {
        loop {
            let mut stream = match self.listener.accept().await {
                Ok((stream, _)) => stream,
                Err(error) => {
                    warn!("control channel accept failed: {}", error);
                    continue;
                }
            };
            let mut message = String::new();
            if let Err(error) = stream.read_to_string(&mut message).await {
                warn!("failed to read control message: {}", error);
                continue;
            }
            debug!("control message received: '{}'", message);
            self.handle(&message).await;
        }
    }

    async fn handle(&self, message: &str) {
        let argv: Vec<&str> = message
            .split(ARG_SEPARATOR)
            .filter(|arg| !arg.is_empty())
            .collect();
        let args = match Args::try_parse_from(argv) {
            Ok(args) => args,
            Err(error) => {
                warn!("ignoring control message: {}", error);
                return;
            }
        };

        if args.quit {
            info!("received 'quit' command, shutting down...");
            let _ = self.quit.send(()).await;
            return;
        }
        if let Some(message) = &args.message {
            self.send_text_message(message).await;
        }
        if let Some(frame) = &args.inject {
            info!("injecting frame: '{}'", frame);
            self.radio.inject(frame).await;
        }
    }

    async fn send_text_message(&self, attr: &str) {
        let Some((addr, text)) = attr.split_once(' ') else {
            warn!("message format is '<manufacturerId>:<deviceId> <text>'");
            return;
        };
        match Address::parse(addr) {
            Ok(addr) => {
                if self.radio.transmit(addr, Payload::message_payload(text)).await {
                    info!("{} <- message: {}", addr, text);
                }
            }
            Err(error) => warn!("{}", error),
        }
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(SOCKET_PATH);
    }
}
