use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::common::phys::PhysDisplay;
use crate::decode::PhysDecodeLevel;
use crate::error::SBusError;
use crate::message::WriteMultiple;
use crate::sbus::codec::{SBusClientCodec, SBusRequest, SBusResponse};
use crate::sbus::frame::constants::MAX_TELEGRAM_LENGTH;
use crate::types::AddressRange;

/// An EtherSBus client talking to one station over UDP
///
/// Requests are sent one at a time, each with the next sequence number.
/// A reply carrying any other sequence is an error.
pub struct SBusClient {
    socket: UdpSocket,
    codec: SBusClientCodec,
    station: u8,
    sequence: u16,
    response_timeout: Duration,
    level: PhysDecodeLevel,
}

impl SBusClient {
    /// Bind an ephemeral port and send every request to `addr`
    pub async fn connect(
        addr: SocketAddr,
        station: u8,
        response_timeout: Duration,
        level: PhysDecodeLevel,
    ) -> Result<Self, SBusError> {
        let local: SocketAddr = if addr.is_ipv4() {
            (std::net::Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(addr).await?;
        Ok(Self {
            socket,
            codec: SBusClientCodec::new(),
            station,
            sequence: 0,
            response_timeout,
            level,
        })
    }

    /// station address placed in every request
    pub fn station(&self) -> u8 {
        self.station
    }

    /// Send a request and wait for its reply
    pub async fn request(&mut self, request: &SBusRequest) -> Result<SBusResponse, SBusError> {
        self.sequence = self.sequence.wrapping_add(1);
        let sequence = self.sequence;

        let bytes = self.codec.encode_request(sequence, self.station, request)?;
        if self.level.enabled() {
            tracing::info!("PHYS TX - {}", PhysDisplay::new(self.level, bytes));
        }
        self.socket.send(bytes).await?;

        let mut buffer = [0u8; MAX_TELEGRAM_LENGTH];
        let count = tokio::time::timeout(self.response_timeout, self.socket.recv(&mut buffer)).await??;
        let telegram = &buffer[..count];
        if self.level.enabled() {
            tracing::info!("PHYS RX - {}", PhysDisplay::new(self.level, telegram));
        }

        let reply = self.codec.decode_response(request, telegram)?;
        if reply.header.sequence != sequence {
            return Err(SBusError::SequenceMismatch(sequence, reply.header.sequence));
        }
        Ok(reply.data)
    }

    /// read flags
    pub async fn read_flags(&mut self, range: AddressRange) -> Result<Vec<bool>, SBusError> {
        self.read_bits(SBusRequest::ReadFlags(range)).await
    }

    /// read inputs
    pub async fn read_inputs(&mut self, range: AddressRange) -> Result<Vec<bool>, SBusError> {
        self.read_bits(SBusRequest::ReadInputs(range)).await
    }

    /// read outputs
    pub async fn read_outputs(&mut self, range: AddressRange) -> Result<Vec<bool>, SBusError> {
        self.read_bits(SBusRequest::ReadOutputs(range)).await
    }

    /// read registers
    pub async fn read_registers(&mut self, range: AddressRange) -> Result<Vec<u32>, SBusError> {
        match self.request(&SBusRequest::ReadRegisters(range)).await? {
            SBusResponse::Registers(values) => Ok(values),
            _ => Err(SBusError::MalformedBody),
        }
    }

    /// write flags
    pub async fn write_flags(&mut self, write: WriteMultiple<bool>) -> Result<(), SBusError> {
        self.write(SBusRequest::WriteFlags(write)).await
    }

    /// write outputs
    pub async fn write_outputs(&mut self, write: WriteMultiple<bool>) -> Result<(), SBusError> {
        self.write(SBusRequest::WriteOutputs(write)).await
    }

    /// write registers
    pub async fn write_registers(&mut self, write: WriteMultiple<u32>) -> Result<(), SBusError> {
        self.write(SBusRequest::WriteRegisters(write)).await
    }

    async fn read_bits(&mut self, request: SBusRequest) -> Result<Vec<bool>, SBusError> {
        match self.request(&request).await? {
            SBusResponse::Bits(values) => Ok(values),
            _ => Err(SBusError::MalformedBody),
        }
    }

    async fn write(&mut self, request: SBusRequest) -> Result<(), SBusError> {
        match self.request(&request).await? {
            SBusResponse::Ack => Ok(()),
            _ => Err(SBusError::MalformedBody),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AddressLimits;
    use crate::sbus::server::spawn_udp_server_task;
    use crate::table::SBusMemory;

    #[tokio::test]
    async fn reads_back_its_writes() {
        let limits = AddressLimits::default();
        let server = spawn_udp_server_task(
            "127.0.0.1:0".parse().unwrap(),
            SBusMemory::new(&limits),
            limits,
            PhysDecodeLevel::Nothing,
        )
        .await
        .unwrap();

        let mut client = SBusClient::connect(
            server.local_addr(),
            1,
            Duration::from_secs(1),
            PhysDecodeLevel::Data,
        )
        .await
        .unwrap();

        client
            .write_flags(WriteMultiple::from(20, vec![true, true, false, true]).unwrap())
            .await
            .unwrap();
        assert_eq!(
            client.read_outputs(AddressRange::try_from(20, 4).unwrap()).await,
            Ok(vec![true, true, false, true])
        );

        client
            .write_registers(WriteMultiple::from(0, vec![u32::MAX]).unwrap())
            .await
            .unwrap();
        assert_eq!(
            client.read_registers(AddressRange::try_from(0, 1).unwrap()).await,
            Ok(vec![u32::MAX])
        );

        assert_eq!(
            client.read_inputs(AddressRange::try_from(65535, 2).unwrap()).await,
            Err(SBusError::Address(crate::error::AddressError::OutOfRange {
                start: 65535,
                count: 2,
                max: 65535
            }))
        );
    }

    #[tokio::test]
    async fn silent_station_times_out() {
        // bound but never answers
        let station = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut client = SBusClient::connect(
            station.local_addr().unwrap(),
            1,
            Duration::from_millis(50),
            PhysDecodeLevel::Nothing,
        )
        .await
        .unwrap();
        assert_eq!(
            client.read_flags(AddressRange::try_from(0, 1).unwrap()).await,
            Err(SBusError::ResponseTimeout)
        );
    }

    #[tokio::test]
    async fn stale_sequence_is_rejected() {
        let station = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut client = SBusClient::connect(
            station.local_addr().unwrap(),
            1,
            Duration::from_secs(1),
            PhysDecodeLevel::Nothing,
        )
        .await
        .unwrap();

        let replier = tokio::spawn(async move {
            let mut buffer = [0u8; 255];
            let (_, from) = station.recv_from(&mut buffer).await.unwrap();
            // ACK for sequence 2 while the client waits on 1
            station
                .send_to(&[0x00, 0x00, 0x00, 0x0D, 0x00, 0x00, 0x00, 0x02, 0x02, 0x00, 0x00, 0xD5, 0x6C], from)
                .await
                .unwrap();
        });

        assert_eq!(
            client
                .write_outputs(WriteMultiple::from(0, vec![true]).unwrap())
                .await,
            Err(SBusError::SequenceMismatch(1, 2))
        );
        replier.await.unwrap();
    }
}
