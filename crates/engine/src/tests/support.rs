use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tokio::{sync::mpsc, time::Instant};
use transport::Transport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Sent {
    pub message: String,
    pub destination: SocketAddr,
    pub at: Instant,
}

pub(crate) struct RecordingTransport {
    tx: mpsc::UnboundedSender<Sent>,
    log: Mutex<Vec<Sent>>,
}

impl RecordingTransport {
    pub(crate) fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Sent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                tx,
                log: Mutex::new(Vec::new()),
            }),
            rx,
        )
    }

    pub(crate) fn sent(&self) -> Vec<Sent> {
        self.log.lock().expect("log lock").clone()
    }

    pub(crate) fn messages_to(&self, destination: SocketAddr) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|sent| sent.destination == destination)
            .map(|sent| sent.message)
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, message: &str, destination: SocketAddr) {
        let sent = Sent {
            message: message.to_string(),
            destination,
            at: Instant::now(),
        };
        self.log.lock().expect("log lock").push(sent.clone());
        let _ = self.tx.send(sent);
    }
}

pub(crate) fn ip(last: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
}

pub(crate) fn endpoint(last: u8, port: u16) -> SocketAddr {
    SocketAddr::new(ip(last), port)
}
