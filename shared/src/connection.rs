//! Per-connection actor: one task reads and decodes frames, another drains an
//! outbound queue onto the socket.
//!
//! Decoded messages, decode failures and end of stream are reported as
//! [`ConnectionEvent`]s on a channel shared by every connection, so a single
//! consumer sees all inbound traffic in arrival order.

use crate::protocol::{FrameBuffer, GameFail, Message, ProtocolError};
use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Items queued for the writer task
#[derive(Debug)]
enum Outbound {
    Frame(Vec<u8>),
    /// Shut the socket down once everything queued before it is written
    Close,
}

#[derive(Debug)]
pub enum Inbound {
    Message(Message),
    /// A frame failed to decode. Nothing more is read from this connection.
    Malformed(ProtocolError),
    /// End of stream or transport error
    Closed,
}

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Something that happened on connection `id`. `serial` tells apart
/// successive connections that were given the same id.
#[derive(Debug)]
pub struct ConnectionEvent {
    pub id: u8,
    pub serial: u64,
    pub inbound: Inbound,
}

/// Handle to a running connection actor. Dropping it stops the reader; the
/// writer finishes whatever is still queued and then closes the socket.
#[derive(Debug)]
pub struct Connection {
    id: u8,
    serial: u64,
    outbound: mpsc::UnboundedSender<Outbound>,
    reader: JoinHandle<()>,
}

impl Connection {
    /// Starts the reader and writer tasks over an arbitrary byte stream pair
    pub fn spawn<R, W>(
        id: u8,
        reader: R,
        writer: W,
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let serial = NEXT_SERIAL.fetch_add(1, Ordering::Relaxed);
        let (outbound, queue) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_loop(id, serial, reader, events.clone()));
        tokio::spawn(write_loop(id, serial, writer, queue, events));

        Self {
            id,
            serial,
            outbound,
            reader,
        }
    }

    pub fn from_tcp(
        id: u8,
        stream: TcpStream,
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Self {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Connection {} could not disable Nagle: {}", id, e);
        }
        let (reader, writer) = stream.into_split();
        Self::spawn(id, reader, writer, events)
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    /// Unique across every connection spawned by this process
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Queues a message. Returns false once the writer has gone away.
    pub fn send(&self, message: &Message) -> bool {
        self.send_frame(message.encode())
    }

    /// Queues an already encoded frame
    pub fn send_frame(&self, frame: Vec<u8>) -> bool {
        self.outbound.send(Outbound::Frame(frame)).is_ok()
    }

    /// Closes the connection after everything already queued is written
    pub fn close(&self) {
        self.reader.abort();
        let _ = self.outbound.send(Outbound::Close);
    }

    /// Sends a failure notice and closes
    pub fn fail(&self, reason: &str) {
        let notice = GameFail::new(reason).unwrap_or_default();
        self.send(&Message::GameFail(notice));
        self.close();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop<R>(
    id: u8,
    serial: u64,
    mut reader: R,
    events: mpsc::UnboundedSender<ConnectionEvent>,
) where
    R: AsyncRead + Unpin,
{
    let mut buffer = FrameBuffer::new();

    loop {
        let n = match reader.read(buffer.spare_mut()).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!("Connection {} read error: {}", id, e);
                break;
            }
        };
        buffer.commit(n);

        while let Some(frame) = buffer.pop_frame() {
            let inbound = match Message::decode(&frame) {
                Ok(message) => Inbound::Message(message),
                Err(e) => {
                    let _ = events.send(ConnectionEvent {
                        id,
                        serial,
                        inbound: Inbound::Malformed(e),
                    });
                    return;
                }
            };
            let event = ConnectionEvent {
                id,
                serial,
                inbound,
            };
            if events.send(event).is_err() {
                return;
            }
        }
    }

    let _ = events.send(ConnectionEvent {
        id,
        serial,
        inbound: Inbound::Closed,
    });
}

async fn write_loop<W>(
    id: u8,
    serial: u64,
    mut writer: W,
    mut queue: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(first) = queue.recv().await {
        // Drain everything queued so far, then flush once
        let mut batch = vec![first];
        while let Ok(next) = queue.try_recv() {
            batch.push(next);
        }

        let mut closing = false;
        for item in batch {
            match item {
                Outbound::Frame(frame) => {
                    if let Err(e) = writer.write_all(&frame).await {
                        debug!("Connection {} write error: {}", id, e);
                        let _ = events.send(ConnectionEvent {
                            id,
                            serial,
                            inbound: Inbound::Closed,
                        });
                        return;
                    }
                }
                Outbound::Close => {
                    closing = true;
                    break;
                }
            }
        }

        if let Err(e) = writer.flush().await {
            debug!("Connection {} flush error: {}", id, e);
            return;
        }
        if closing {
            break;
        }
    }

    let _ = writer.shutdown().await;
}
