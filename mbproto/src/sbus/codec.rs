use crate::address::{AddressLimits, AddressType};
use crate::common::bits::{num_bytes_for_bits, pack_bits, unpack_bits};
use crate::common::cursor::{ReadCursor, WriteCursor};
use crate::error::{AddressError, InternalError, SBusError};
use crate::message::WriteMultiple;
use crate::sbus::frame::{constants, parse_telegram, SBusFormatter, SBusHeader, TelegramType};
use crate::types::AddressRange;

pub(crate) mod limits {
    pub(crate) const MAX_BIT_COUNT: usize = 128;
    pub(crate) const MAX_REGISTER_COUNT: usize = 32;
    pub(crate) const NAK: u16 = 1;
}

/// EtherSBus commands handled by the codecs
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SBusCommand {
    /// read flags (2)
    ReadFlags,
    /// read inputs (3)
    ReadInputs,
    /// read outputs (5)
    ReadOutputs,
    /// read registers (6)
    ReadRegisters,
    /// write flags (11)
    WriteFlags,
    /// write outputs (13)
    WriteOutputs,
    /// write registers (14)
    WriteRegisters,
}

impl SBusCommand {
    /// the command code on the wire
    pub fn get_value(self) -> u8 {
        match self {
            SBusCommand::ReadFlags => 2,
            SBusCommand::ReadInputs => 3,
            SBusCommand::ReadOutputs => 5,
            SBusCommand::ReadRegisters => 6,
            SBusCommand::WriteFlags => 11,
            SBusCommand::WriteOutputs => 13,
            SBusCommand::WriteRegisters => 14,
        }
    }

    /// map a command code to a supported command
    pub fn get(value: u8) -> Option<Self> {
        match value {
            2 => Some(SBusCommand::ReadFlags),
            3 => Some(SBusCommand::ReadInputs),
            5 => Some(SBusCommand::ReadOutputs),
            6 => Some(SBusCommand::ReadRegisters),
            11 => Some(SBusCommand::WriteFlags),
            13 => Some(SBusCommand::WriteOutputs),
            14 => Some(SBusCommand::WriteRegisters),
            _ => None,
        }
    }

    /// the address type whose maximum bounds the command
    pub fn address_type(self) -> AddressType {
        match self {
            SBusCommand::ReadFlags | SBusCommand::WriteFlags => AddressType::SBusFlag,
            SBusCommand::ReadInputs => AddressType::SBusInput,
            SBusCommand::ReadOutputs | SBusCommand::WriteOutputs => AddressType::SBusOutput,
            SBusCommand::ReadRegisters | SBusCommand::WriteRegisters => AddressType::SBusReg,
        }
    }

    /// most values one telegram may carry
    pub fn max_count(self) -> usize {
        match self {
            SBusCommand::ReadRegisters | SBusCommand::WriteRegisters => limits::MAX_REGISTER_COUNT,
            _ => limits::MAX_BIT_COUNT,
        }
    }
}

impl std::fmt::Display for SBusCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SBusCommand::ReadFlags => "READ FLAGS",
            SBusCommand::ReadInputs => "READ INPUTS",
            SBusCommand::ReadOutputs => "READ OUTPUTS",
            SBusCommand::ReadRegisters => "READ REGISTERS",
            SBusCommand::WriteFlags => "WRITE FLAGS",
            SBusCommand::WriteOutputs => "WRITE OUTPUTS",
            SBusCommand::WriteRegisters => "WRITE REGISTERS",
        };
        write!(f, "{} ({})", name, self.get_value())
    }
}

/// A decoded or to-be-encoded EtherSBus request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SBusRequest {
    /// read flags
    ReadFlags(AddressRange),
    /// read inputs
    ReadInputs(AddressRange),
    /// read outputs
    ReadOutputs(AddressRange),
    /// read 32-bit registers
    ReadRegisters(AddressRange),
    /// write flags
    WriteFlags(WriteMultiple<bool>),
    /// write outputs
    WriteOutputs(WriteMultiple<bool>),
    /// write 32-bit registers
    WriteRegisters(WriteMultiple<u32>),
}

impl SBusRequest {
    /// command carried by the request
    pub fn command(&self) -> SBusCommand {
        match self {
            SBusRequest::ReadFlags(_) => SBusCommand::ReadFlags,
            SBusRequest::ReadInputs(_) => SBusCommand::ReadInputs,
            SBusRequest::ReadOutputs(_) => SBusCommand::ReadOutputs,
            SBusRequest::ReadRegisters(_) => SBusCommand::ReadRegisters,
            SBusRequest::WriteFlags(_) => SBusCommand::WriteFlags,
            SBusRequest::WriteOutputs(_) => SBusCommand::WriteOutputs,
            SBusRequest::WriteRegisters(_) => SBusCommand::WriteRegisters,
        }
    }

    /// addresses read or written
    pub fn range(&self) -> AddressRange {
        match self {
            SBusRequest::ReadFlags(range)
            | SBusRequest::ReadInputs(range)
            | SBusRequest::ReadOutputs(range)
            | SBusRequest::ReadRegisters(range) => *range,
            SBusRequest::WriteFlags(x) | SBusRequest::WriteOutputs(x) => x.range,
            SBusRequest::WriteRegisters(x) => x.range,
        }
    }

    /// Check the count against the per-command maximum and the 16-bit address field
    pub fn validate(&self) -> Result<(), SBusError> {
        let range = self.range();
        let max = self.command().max_count();
        let count = range.count as usize;
        if count == 0 || count > max {
            return Err(SBusError::QuantityOutOfRange(count, max));
        }
        if range.last() > u16::MAX as u64 {
            return Err(AddressError::out_of_range(range, u16::MAX as u32).into());
        }
        let values = match self {
            SBusRequest::WriteFlags(x) | SBusRequest::WriteOutputs(x) => x.values.len(),
            SBusRequest::WriteRegisters(x) => x.values.len(),
            _ => count,
        };
        if values != count {
            return Err(AddressError::CountMismatch(count, values).into());
        }
        Ok(())
    }
}

/// The data carried by a successful reply
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SBusResponse {
    /// flags, inputs or outputs in address order
    Bits(Vec<bool>),
    /// registers in address order
    Registers(Vec<u32>),
    /// a write was acknowledged
    Ack,
}

/// A request decoded by a server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SBusServerRequest {
    /// sequence to echo in the reply
    pub sequence: u16,
    /// station address the request was sent to
    pub station: u8,
    /// the request, or the reason to reply with a NAK
    pub body: Result<SBusRequest, SBusError>,
}

/// A reply decoded by a client
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SBusReply {
    /// header echoed by the station
    pub header: SBusHeader,
    /// the reply data
    pub data: SBusResponse,
}

/// Decodes requests and encodes replies on the station side of EtherSBus
pub struct SBusServerCodec {
    limits: AddressLimits,
    formatter: SBusFormatter,
}

impl SBusServerCodec {
    /// codec that checks request ranges against `limits`
    pub fn new(limits: AddressLimits) -> Self {
        Self {
            limits,
            formatter: SBusFormatter::new(),
        }
    }

    /// Decode one complete telegram
    ///
    /// Length, CRC and telegram attribute faults are returned as errors.
    /// Faults in the command, quantity or range produce a request whose body
    /// is the error to answer with a NAK.
    pub fn decode_request(&self, bytes: &[u8]) -> Result<SBusServerRequest, SBusError> {
        let (header, data) = parse_telegram(bytes)?;
        if header.telegram != TelegramType::Request {
            return Err(SBusError::UnexpectedTelegram(header.telegram.get_value()));
        }
        if bytes.len() < constants::MIN_REQUEST_LENGTH {
            return Err(SBusError::BadLength(
                bytes.len(),
                constants::MIN_REQUEST_LENGTH,
                constants::MAX_TELEGRAM_LENGTH,
            ));
        }

        let mut cursor = ReadCursor::new(data);
        let station = cursor.read_u8()?;
        let command = cursor.read_u8()?;
        let body = self.decode_body(command, &mut cursor);
        Ok(SBusServerRequest {
            sequence: header.sequence,
            station,
            body,
        })
    }

    fn decode_body(&self, raw: u8, cursor: &mut ReadCursor) -> Result<SBusRequest, SBusError> {
        let command = SBusCommand::get(raw).ok_or(SBusError::UnknownCommand(raw))?;
        let request = parse_request(command, cursor)?;
        let range = request.range();
        self.limits
            .check_range(command.address_type(), range.start, range.count as usize)?;
        Ok(request)
    }

    /// Encode the reply to a successful request
    ///
    /// Read data goes in a response telegram, writes are acknowledged.
    pub fn encode_response(
        &mut self,
        sequence: u16,
        data: &SBusResponse,
    ) -> Result<&[u8], InternalError> {
        match data {
            SBusResponse::Bits(values) => {
                let header = SBusHeader {
                    sequence,
                    telegram: TelegramType::Response,
                };
                self.formatter
                    .format(header, |cursor| cursor.write_bytes(&pack_bits(values)))
            }
            SBusResponse::Registers(values) => {
                let header = SBusHeader {
                    sequence,
                    telegram: TelegramType::Response,
                };
                self.formatter.format(header, |cursor| {
                    for value in values {
                        cursor.write_u32_be(*value)?;
                    }
                    Ok(())
                })
            }
            SBusResponse::Ack => self.encode_ack_nak(sequence, 0),
        }
    }

    /// Encode a NAK
    pub fn encode_nak(&mut self, sequence: u16) -> Result<&[u8], InternalError> {
        self.encode_ack_nak(sequence, limits::NAK)
    }

    fn encode_ack_nak(&mut self, sequence: u16, code: u16) -> Result<&[u8], InternalError> {
        let header = SBusHeader {
            sequence,
            telegram: TelegramType::AckNak,
        };
        self.formatter
            .format(header, |cursor| cursor.write_u16_be(code))
    }
}

impl Default for SBusServerCodec {
    fn default() -> Self {
        Self::new(AddressLimits::default())
    }
}

/// Encodes requests and decodes replies on the client side of EtherSBus
pub struct SBusClientCodec {
    formatter: SBusFormatter,
}

impl SBusClientCodec {
    /// create a codec
    pub fn new() -> Self {
        Self {
            formatter: SBusFormatter::new(),
        }
    }

    /// Encode a request addressed to `station`
    pub fn encode_request(
        &mut self,
        sequence: u16,
        station: u8,
        request: &SBusRequest,
    ) -> Result<&[u8], SBusError> {
        request.validate()?;
        let header = SBusHeader {
            sequence,
            telegram: TelegramType::Request,
        };
        let bytes = self.formatter.format(header, |cursor| {
            cursor.write_u8(station)?;
            cursor.write_u8(request.command().get_value())?;
            write_request(request, cursor)
        })?;
        Ok(bytes)
    }

    /// Decode the reply to `request`
    ///
    /// A NAK is returned as `SBusError::Nak`.
    pub fn decode_response(
        &self,
        request: &SBusRequest,
        bytes: &[u8],
    ) -> Result<SBusReply, SBusError> {
        let (header, data) = parse_telegram(bytes)?;
        let mut cursor = ReadCursor::new(data);
        let count = request.range().count as usize;

        let data = match (header.telegram, request) {
            (TelegramType::AckNak, _) => {
                let code = cursor.read_u16_be()?;
                cursor.expect_empty()?;
                if code != 0 {
                    return Err(SBusError::Nak(code));
                }
                if !is_write(request) {
                    return Err(SBusError::UnexpectedTelegram(header.telegram.get_value()));
                }
                SBusResponse::Ack
            }
            (
                TelegramType::Response,
                SBusRequest::ReadFlags(_) | SBusRequest::ReadInputs(_) | SBusRequest::ReadOutputs(_),
            ) => {
                let bytes = cursor.read_bytes(num_bytes_for_bits(count as u16))?;
                cursor.expect_empty()?;
                SBusResponse::Bits(unpack_bits(bytes, count).ok_or(SBusError::MalformedBody)?)
            }
            (TelegramType::Response, SBusRequest::ReadRegisters(_)) => {
                let values = (0..count)
                    .map(|_| cursor.read_u32_be())
                    .collect::<Result<Vec<u32>, _>>()?;
                cursor.expect_empty()?;
                SBusResponse::Registers(values)
            }
            (telegram, _) => return Err(SBusError::UnexpectedTelegram(telegram.get_value())),
        };

        Ok(SBusReply { header, data })
    }
}

impl Default for SBusClientCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn is_write(request: &SBusRequest) -> bool {
    matches!(
        request,
        SBusRequest::WriteFlags(_) | SBusRequest::WriteOutputs(_) | SBusRequest::WriteRegisters(_)
    )
}

fn check_count(count: usize, command: SBusCommand) -> Result<u16, SBusError> {
    let max = command.max_count();
    if count == 0 || count > max {
        return Err(SBusError::QuantityOutOfRange(count, max));
    }
    // max is far below u16::MAX
    Ok(count as u16)
}

fn parse_request(command: SBusCommand, cursor: &mut ReadCursor) -> Result<SBusRequest, SBusError> {
    let request = match command {
        SBusCommand::ReadFlags
        | SBusCommand::ReadInputs
        | SBusCommand::ReadOutputs
        | SBusCommand::ReadRegisters => {
            // the count is sent minus one
            let count = check_count(cursor.read_u8()? as usize + 1, command)?;
            let range = AddressRange {
                start: cursor.read_u16_be()? as u32,
                count,
            };
            match command {
                SBusCommand::ReadFlags => SBusRequest::ReadFlags(range),
                SBusCommand::ReadInputs => SBusRequest::ReadInputs(range),
                SBusCommand::ReadOutputs => SBusRequest::ReadOutputs(range),
                _ => SBusRequest::ReadRegisters(range),
            }
        }
        SBusCommand::WriteFlags | SBusCommand::WriteOutputs => {
            // byte count covers the data plus the address
            let byte_count = cursor.read_u8()? as usize;
            let start = cursor.read_u16_be()? as u32;
            let count = check_count(cursor.read_u8()? as usize + 1, command)?;
            let data_length = num_bytes_for_bits(count);
            if byte_count != data_length + 2 {
                return Err(SBusError::MalformedBody);
            }
            let bytes = cursor.read_bytes(data_length)?;
            let values = unpack_bits(bytes, count as usize).ok_or(SBusError::MalformedBody)?;
            let write = WriteMultiple {
                range: AddressRange { start, count },
                values,
            };
            match command {
                SBusCommand::WriteFlags => SBusRequest::WriteFlags(write),
                _ => SBusRequest::WriteOutputs(write),
            }
        }
        SBusCommand::WriteRegisters => {
            // byte count is four per register plus one
            let byte_count = cursor.read_u8()? as usize;
            if byte_count == 0 || (byte_count - 1) % 4 != 0 {
                return Err(SBusError::MalformedBody);
            }
            let start = cursor.read_u16_be()? as u32;
            let count = check_count((byte_count - 1) / 4, command)?;
            let values = (0..count)
                .map(|_| cursor.read_u32_be())
                .collect::<Result<Vec<u32>, _>>()?;
            SBusRequest::WriteRegisters(WriteMultiple {
                range: AddressRange { start, count },
                values,
            })
        }
    };

    cursor.expect_empty()?;
    Ok(request)
}

fn write_request(request: &SBusRequest, cursor: &mut WriteCursor) -> Result<(), InternalError> {
    match request {
        SBusRequest::ReadFlags(range)
        | SBusRequest::ReadInputs(range)
        | SBusRequest::ReadOutputs(range)
        | SBusRequest::ReadRegisters(range) => {
            cursor.write_u8((range.count - 1) as u8)?;
            cursor.write_u16_be(range.start as u16)
        }
        SBusRequest::WriteFlags(x) | SBusRequest::WriteOutputs(x) => {
            let bytes = pack_bits(&x.values);
            write_byte_count(bytes.len() + 2, cursor)?;
            cursor.write_u16_be(x.range.start as u16)?;
            cursor.write_u8((x.range.count - 1) as u8)?;
            cursor.write_bytes(&bytes)
        }
        SBusRequest::WriteRegisters(x) => {
            write_byte_count(4 * x.values.len() + 1, cursor)?;
            cursor.write_u16_be(x.range.start as u16)?;
            for value in &x.values {
                cursor.write_u32_be(*value)?;
            }
            Ok(())
        }
    }
}

fn write_byte_count(count: usize, cursor: &mut WriteCursor) -> Result<(), InternalError> {
    let count = u8::try_from(count).map_err(|_| InternalError::BadByteCount(count))?;
    cursor.write_u8(count)
}
