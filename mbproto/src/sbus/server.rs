use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::Instrument;

use crate::address::AddressLimits;
use crate::common::phys::PhysDisplay;
use crate::decode::PhysDecodeLevel;
use crate::error::{InternalError, SBusError};
use crate::sbus::codec::{SBusRequest, SBusResponse, SBusServerCodec};
use crate::server::ServerHandle;
use crate::table::SBusMemory;

// larger than any valid telegram so oversized datagrams are seen as such
const RECEIVE_BUFFER_LENGTH: usize = 512;

/// Answers EtherSBus telegrams from an [`SBusMemory`]
///
/// Every telegram gets exactly one reply. Requests for any station are served.
pub struct SBusServer {
    memory: SBusMemory,
    codec: SBusServerCodec,
}

impl SBusServer {
    /// serve `memory`, validating requests against `limits`
    pub fn new(memory: SBusMemory, limits: AddressLimits) -> Self {
        Self {
            memory,
            codec: SBusServerCodec::new(limits),
        }
    }

    /// Decode a telegram, execute it and encode the reply
    ///
    /// A telegram that cannot be decoded is answered with a NAK carrying
    /// sequence zero. A request that cannot be executed is answered with a NAK
    /// echoing its sequence.
    pub fn handle(&mut self, telegram: &[u8]) -> Result<&[u8], InternalError> {
        let request = match self.codec.decode_request(telegram) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!("undecodable telegram: {}", err);
                return self.codec.encode_nak(0);
            }
        };

        let result = request.body.and_then(|body| {
            tracing::debug!(
                "station {} sequence {}: {} {}",
                request.station,
                request.sequence,
                body.command(),
                body.range()
            );
            self.execute(&body)
        });

        match result {
            Ok(response) => self.codec.encode_response(request.sequence, &response),
            Err(err) => {
                tracing::warn!("NAK for sequence {}: {}", request.sequence, err);
                self.codec.encode_nak(request.sequence)
            }
        }
    }

    fn execute(&self, request: &SBusRequest) -> Result<SBusResponse, SBusError> {
        let table = self.memory.table();
        let response = match request {
            SBusRequest::ReadFlags(range)
            | SBusRequest::ReadInputs(range)
            | SBusRequest::ReadOutputs(range) => {
                SBusResponse::Bits(table.get_bool_range(range.start, range.count as usize)?)
            }
            SBusRequest::ReadRegisters(range) => {
                SBusResponse::Registers(table.get_word_range(range.start, range.count as usize)?)
            }
            SBusRequest::WriteFlags(x) | SBusRequest::WriteOutputs(x) => {
                table.set_bool_range(x.range.start, x.range.count as usize, &x.values)?;
                SBusResponse::Ack
            }
            SBusRequest::WriteRegisters(x) => {
                table.set_word_range(x.range.start, x.range.count as usize, &x.values)?;
                SBusResponse::Ack
            }
        };
        Ok(response)
    }
}

/// Spawns an EtherSBus UDP server task onto the runtime. This method can only
/// be called from within the runtime context.
///
/// * `addr` - A socket address to bind to
/// * `memory` - The SBus data table to serve
/// * `limits` - Address maxima used to validate requests
/// * `level` - Physical layer log level for received and sent datagrams
pub async fn spawn_udp_server_task(
    addr: SocketAddr,
    memory: SBusMemory,
    limits: AddressLimits,
    level: PhysDecodeLevel,
) -> Result<ServerHandle, std::io::Error> {
    let socket = UdpSocket::bind(addr).await?;
    let local_addr = socket.local_addr()?;

    let (tx, rx) = tokio::sync::mpsc::channel(1);
    let mut task = UdpServerTask {
        socket,
        server: SBusServer::new(memory, limits),
        level,
    };
    tokio::spawn(async move {
        task.run(rx)
            .instrument(tracing::info_span!("SBus-Server-UDP", "listen" = ?local_addr))
            .await
    });

    Ok(ServerHandle::new(tx, local_addr))
}

struct UdpServerTask {
    socket: UdpSocket,
    server: SBusServer,
    level: PhysDecodeLevel,
}

impl UdpServerTask {
    async fn run(&mut self, mut shutdown: tokio::sync::mpsc::Receiver<()>) {
        let mut buffer = [0u8; RECEIVE_BUFFER_LENGTH];
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("server shutdown");
                    return;
                }
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Err(err) => {
                            tracing::error!("error receiving datagram: {}", err);
                            return;
                        }
                        Ok((count, addr)) => {
                            if let Err(err) = self.reply(&buffer[..count], addr).await {
                                tracing::warn!("unable to reply to {}: {}", addr, err);
                            }
                        }
                    }
                }
            }
        }
    }

    async fn reply(&mut self, telegram: &[u8], addr: SocketAddr) -> Result<(), SBusError> {
        if self.level.enabled() {
            tracing::info!("PHYS RX - {}", PhysDisplay::new(self.level, telegram));
        }
        let reply = self.server.handle(telegram)?;
        if self.level.enabled() {
            tracing::info!("PHYS TX - {}", PhysDisplay::new(self.level, reply));
        }
        self.socket.send_to(reply, addr).await?;
        Ok(())
    }
}
