use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::common::phys::PhysLayer;
use crate::decode::DecodeLevel;
use crate::error::{AduParseError, RequestError, ResponseMismatch};
use crate::message::{Request, RequestDisplay, ResponseData, ResponseDisplay, WriteMultiple};
use crate::tcp::codec::{ClientCodec, ResponseFrame};
use crate::tcp::frame::constants::HEADER_LENGTH;
use crate::tcp::frame::{FramedReader, MbapDisplay, MbapHeader, TxId};
use crate::types::{AddressRange, Indexed, UnitId};

/// A Modbus/TCP client bound to one transport
///
/// Requests are sent one at a time. Each carries a fresh transaction id and
/// responses with any other id are discarded while waiting.
pub struct ClientSession<T> {
    phys: PhysLayer<T>,
    reader: FramedReader,
    codec: ClientCodec,
    tx_id: TxId,
    unit_id: UnitId,
    response_timeout: Duration,
    decode: DecodeLevel,
}

impl ClientSession<TcpStream> {
    /// Open a TCP connection to `addr`
    pub async fn connect(
        addr: SocketAddr,
        unit_id: UnitId,
        response_timeout: Duration,
        decode: DecodeLevel,
    ) -> Result<Self, RequestError> {
        let socket = TcpStream::connect(addr).await?;
        tracing::info!("connected to: {}", addr);
        Ok(Self::new(socket, unit_id, response_timeout, decode))
    }
}

impl<T> ClientSession<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// create a session over an established transport
    pub fn new(io: T, unit_id: UnitId, response_timeout: Duration, decode: DecodeLevel) -> Self {
        Self {
            phys: PhysLayer::new(io, decode.physical),
            reader: FramedReader::new(decode.frame),
            codec: ClientCodec::new(),
            tx_id: TxId::default(),
            unit_id,
            response_timeout,
            decode,
        }
    }

    /// recover the transport
    pub fn into_inner(self) -> T {
        self.phys.into_inner()
    }

    /// unit id placed in every request
    pub fn unit_id(&self) -> UnitId {
        self.unit_id
    }

    /// change the unit id placed in subsequent requests
    pub fn set_unit_id(&mut self, unit_id: UnitId) {
        self.unit_id = unit_id;
    }

    /// change the decode level
    pub fn set_decode_level(&mut self, decode: DecodeLevel) {
        self.decode = decode;
        self.phys.set_level(decode.physical);
        self.reader.set_level(decode.frame);
    }

    /// Encode a request into a complete frame without sending it
    pub fn make_raw_request(&mut self, request: &Request) -> Result<(TxId, Vec<u8>), RequestError> {
        let header = MbapHeader::new(self.tx_id.next(), self.unit_id);
        let bytes = self.codec.encode_request(header, request)?;
        if self.decode.app.enabled() {
            tracing::info!("PDU TX - {}", RequestDisplay::new(self.decode.app, request));
        }
        if self.decode.frame.enabled() {
            tracing::info!(
                "MBAP TX - {}",
                MbapDisplay::new(self.decode.frame, header, &bytes[HEADER_LENGTH..])
            );
        }
        Ok((header.tx_id, bytes.to_vec()))
    }

    /// Write an already encoded frame
    pub async fn send_raw_request(&mut self, bytes: &[u8]) -> Result<(), RequestError> {
        self.phys.write(bytes).await?;
        Ok(())
    }

    /// Wait for the next complete frame, whatever it contains
    pub async fn get_raw_response(&mut self) -> Result<Vec<u8>, RequestError> {
        let frame =
            tokio::time::timeout(self.response_timeout, self.reader.next_frame(&mut self.phys))
                .await??;
        Ok(frame.bytes().to_vec())
    }

    /// Encode and send a request, returning the transaction id it carries
    pub async fn send_request(&mut self, request: &Request) -> Result<TxId, RequestError> {
        let (tx_id, bytes) = self.make_raw_request(request)?;
        self.send_raw_request(&bytes).await?;
        Ok(tx_id)
    }

    /// Wait for the next frame and decode it as a response
    pub async fn receive_response(&mut self) -> Result<ResponseFrame, RequestError> {
        let bytes = self.get_raw_response().await?;
        self.decode_response(&bytes)
    }

    fn decode_response(&self, bytes: &[u8]) -> Result<ResponseFrame, RequestError> {
        let response = self.codec.decode_response(bytes)?;
        if self.decode.app.enabled() {
            tracing::info!(
                "PDU RX - {}",
                ResponseDisplay::new(self.decode.app, response.function, response.body.as_ref().map_err(|ex| *ex))
            );
        }
        Ok(response)
    }

    /// Send a request and wait for the response with the same transaction id
    ///
    /// Bit values are truncated to the requested count.
    pub async fn request(&mut self, request: &Request) -> Result<ResponseData, RequestError> {
        let tx_id = self.send_request(request).await?;
        let deadline = tokio::time::Instant::now() + self.response_timeout;

        // loop until we get a response with the correct tx id or we timeout
        let response = loop {
            let frame = tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(RequestError::ResponseTimeout);
                }
                frame = self.reader.next_frame(&mut self.phys) => {
                    frame?
                }
            };

            let response = self.decode_response(frame.bytes())?;
            if response.header.tx_id != tx_id {
                tracing::warn!("received {} while expecting {}", response.header.tx_id, tx_id);
                continue;
            }
            break response;
        };

        let function = request.function();
        if response.function != function.get_value() {
            return Err(ResponseMismatch::Function(function.get_value(), response.function).into());
        }

        let data = response.body?;
        if !data.matches(function) {
            return Err(ResponseMismatch::DataKind.into());
        }

        match data {
            ResponseData::Bits(mut values) => {
                let count = request.range().count as usize;
                if values.len() < count {
                    return Err(AduParseError::InsufficientBytes.into());
                }
                values.truncate(count);
                Ok(ResponseData::Bits(values))
            }
            other => Ok(other),
        }
    }

    /// read coils
    pub async fn read_coils(&mut self, range: AddressRange) -> Result<Vec<Indexed<bool>>, RequestError> {
        let values = self.request(&Request::ReadCoils(range)).await?;
        bits(range, values)
    }

    /// read discrete inputs
    pub async fn read_discrete_inputs(
        &mut self,
        range: AddressRange,
    ) -> Result<Vec<Indexed<bool>>, RequestError> {
        let values = self.request(&Request::ReadDiscreteInputs(range)).await?;
        bits(range, values)
    }

    /// read holding registers
    pub async fn read_holding_registers(
        &mut self,
        range: AddressRange,
    ) -> Result<Vec<Indexed<u16>>, RequestError> {
        let values = self.request(&Request::ReadHoldingRegisters(range)).await?;
        registers(range, values)
    }

    /// read input registers
    pub async fn read_input_registers(
        &mut self,
        range: AddressRange,
    ) -> Result<Vec<Indexed<u16>>, RequestError> {
        let values = self.request(&Request::ReadInputRegisters(range)).await?;
        registers(range, values)
    }

    /// Read an IEEE-754 single from two holding registers, low-order register first
    pub async fn read_holding_float32(&mut self, addr: u32) -> Result<f32, RequestError> {
        let range = AddressRange::try_from(addr, 2).map_err(crate::error::InvalidRequest::from)?;
        let values = self.read_holding_registers(range).await?;
        let low = values.first().map(|x| x.value).unwrap_or_default() as u32;
        let high = values.get(1).map(|x| x.value).unwrap_or_default() as u32;
        Ok(f32::from_bits(low | (high << 16)))
    }

    /// write a single coil
    pub async fn write_single_coil(&mut self, value: Indexed<bool>) -> Result<Indexed<bool>, RequestError> {
        match self.request(&Request::WriteSingleCoil(value)).await? {
            ResponseData::SingleCoil(echo) => Ok(echo),
            _ => Err(ResponseMismatch::DataKind.into()),
        }
    }

    /// write a single register
    pub async fn write_single_register(
        &mut self,
        value: Indexed<u16>,
    ) -> Result<Indexed<u16>, RequestError> {
        match self.request(&Request::WriteSingleRegister(value)).await? {
            ResponseData::SingleRegister(echo) => Ok(echo),
            _ => Err(ResponseMismatch::DataKind.into()),
        }
    }

    /// write multiple coils
    pub async fn write_multiple_coils(
        &mut self,
        value: WriteMultiple<bool>,
    ) -> Result<AddressRange, RequestError> {
        match self.request(&Request::WriteMultipleCoils(value)).await? {
            ResponseData::WriteMultiple(range) => Ok(range),
            _ => Err(ResponseMismatch::DataKind.into()),
        }
    }

    /// write multiple registers
    pub async fn write_multiple_registers(
        &mut self,
        value: WriteMultiple<u16>,
    ) -> Result<AddressRange, RequestError> {
        match self.request(&Request::WriteMultipleRegisters(value)).await? {
            ResponseData::WriteMultiple(range) => Ok(range),
            _ => Err(ResponseMismatch::DataKind.into()),
        }
    }
}

pub(crate) fn bits(range: AddressRange, data: ResponseData) -> Result<Vec<Indexed<bool>>, RequestError> {
    match data {
        ResponseData::Bits(values) => Ok(indexed(range, values)),
        _ => Err(ResponseMismatch::DataKind.into()),
    }
}

pub(crate) fn registers(
    range: AddressRange,
    data: ResponseData,
) -> Result<Vec<Indexed<u16>>, RequestError> {
    match data {
        ResponseData::Registers(values) => Ok(indexed(range, values)),
        _ => Err(ResponseMismatch::DataKind.into()),
    }
}

pub(crate) fn indexed<T>(range: AddressRange, values: Vec<T>) -> Vec<Indexed<T>> {
    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| Indexed::new(range.start + i as u32, value))
        .collect()
}

#[cfg(test)]
mod tests {
    use tokio_test::block_on;
    use tokio_test::io::Builder;

    use super::*;
    use crate::exception::ExceptionCode;

    fn session<T: AsyncRead + AsyncWrite + Unpin>(io: T) -> ClientSession<T> {
        ClientSession::new(
            io,
            UnitId::new(0x01),
            Duration::from_secs(1),
            DecodeLevel::nothing(),
        )
    }

    #[test]
    fn reads_coils_and_truncates_padding() {
        let io = Builder::new()
            .write(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x01, 0x01, 0x00, 0x02, 0x00, 0x03])
            .read(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x04, 0x01, 0x01, 0x01, 0x05])
            .build();
        let mut session = session(io);
        let values = block_on(session.read_coils(AddressRange::try_from(2, 3).unwrap())).unwrap();
        assert_eq!(
            values,
            vec![
                Indexed::new(2, true),
                Indexed::new(3, false),
                Indexed::new(4, true)
            ]
        );
    }

    #[test]
    fn transaction_ids_advance_per_request() {
        let io = Builder::new()
            .write(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x01, 0x06, 0x00, 0x01, 0x00, 0x2A])
            .read(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x01, 0x06, 0x00, 0x01, 0x00, 0x2A])
            .write(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x04, 0x00, 0x07, 0x00, 0x01])
            .read(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x04, 0x02, 0xCA, 0xFE])
            .build();
        let mut session = session(io);
        assert_eq!(
            block_on(session.write_single_register(Indexed::new(1, 42))),
            Ok(Indexed::new(1, 42))
        );
        assert_eq!(
            block_on(session.read_input_registers(AddressRange::try_from(7, 1).unwrap())),
            Ok(vec![Indexed::new(7, 0xCAFE)])
        );
    }

    #[test]
    fn discards_responses_with_other_transaction_ids() {
        let io = Builder::new()
            .write(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x01, 0x05, 0x00, 0x01, 0xFF, 0x00])
            .read(&[0x00, 0x09, 0x00, 0x00, 0x00, 0x06, 0x01, 0x05, 0x00, 0x01, 0x00, 0x00])
            .read(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x01, 0x05, 0x00, 0x01, 0xFF, 0x00])
            .build();
        let mut session = session(io);
        assert_eq!(
            block_on(session.write_single_coil(Indexed::new(1, true))),
            Ok(Indexed::new(1, true))
        );
    }

    #[test]
    fn exception_responses_are_errors() {
        let io = Builder::new()
            .write(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x10, 0x00, 0x01])
            .read(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x01, 0x83, 0x02])
            .build();
        let mut session = session(io);
        assert_eq!(
            block_on(session.read_holding_registers(AddressRange::try_from(0x10, 1).unwrap())),
            Err(RequestError::Exception(ExceptionCode::IllegalDataAddress))
        );
    }

    #[test]
    fn mismatched_function_is_an_error() {
        let io = Builder::new()
            .write(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x10, 0x00, 0x01])
            .read(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x05, 0x01, 0x04, 0x02, 0x00, 0x00])
            .build();
        let mut session = session(io);
        assert_eq!(
            block_on(session.read_holding_registers(AddressRange::try_from(0x10, 1).unwrap())),
            Err(RequestError::Mismatch(ResponseMismatch::Function(0x03, 0x04)))
        );
    }

    #[test]
    fn raw_requests_and_responses() {
        let io = Builder::new()
            .write(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x01, 0x02, 0x00, 0x00, 0x00, 0x08])
            .read(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x04, 0x01, 0x02, 0x01, 0xFF])
            .build();
        let mut session = session(io);
        let (tx_id, bytes) = session
            .make_raw_request(&Request::ReadDiscreteInputs(AddressRange::try_from(0, 8).unwrap()))
            .unwrap();
        assert_eq!(tx_id, TxId::new(0));
        block_on(session.send_raw_request(&bytes)).unwrap();
        let response = block_on(session.receive_response()).unwrap();
        assert_eq!(response.header.tx_id, tx_id);
        assert_eq!(response.body, Ok(ResponseData::Bits(vec![true; 8])));
    }

    #[test]
    fn invalid_requests_are_not_sent() {
        let io = Builder::new().build();
        let mut session = session(io);
        assert!(matches!(
            block_on(session.read_holding_registers(AddressRange::try_from(0, 0x7E).unwrap())),
            Err(RequestError::BadRequest(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_without_a_response() {
        let (io, _handle) = Builder::new()
            .write(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x01, 0x01, 0x00, 0x00, 0x00, 0x01])
            .build_with_handle();
        let mut session = session(io);
        assert_eq!(
            session.read_coils(AddressRange::try_from(0, 1).unwrap()).await,
            Err(RequestError::ResponseTimeout)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_does_not_corrupt_the_next_one() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (io, mut server) = tokio::io::duplex(64);
        let server = tokio::spawn(async move {
            let mut request = [0u8; 12];
            server.read_exact(&mut request).await.unwrap();
            let late = [0x00, 0x00, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0x00, 0x01];
            server.write_all(&late[..5]).await.unwrap();
            tokio::time::sleep(Duration::from_millis(1500)).await;
            server.write_all(&late[5..]).await.unwrap();
            server.read_exact(&mut request).await.unwrap();
            assert_eq!(request[..2], [0x00, 0x01]);
            server
                .write_all(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0xCA, 0xFE])
                .await
                .unwrap();
        });

        let mut session = session(io);
        let range = AddressRange::try_from(0, 1).unwrap();
        assert_eq!(
            session.read_holding_registers(range).await,
            Err(RequestError::ResponseTimeout)
        );
        assert_eq!(
            session.read_holding_registers(range).await,
            Ok(vec![Indexed::new(0, 0xCAFE)])
        );
        server.await.unwrap();
    }

    #[test]
    fn reads_float_from_two_registers() {
        let value = 3.5f32.to_bits();
        let low = (value & 0xFFFF) as u16;
        let high = (value >> 16) as u16;
        let mut response = vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x07, 0x01, 0x03, 0x04];
        response.extend_from_slice(&low.to_be_bytes());
        response.extend_from_slice(&high.to_be_bytes());
        let io = Builder::new()
            .write(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x05, 0x00, 0x02])
            .read(&response)
            .build();
        let mut session = session(io);
        assert_eq!(block_on(session.read_holding_float32(5)), Ok(3.5));
    }
}
