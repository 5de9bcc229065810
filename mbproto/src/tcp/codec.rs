use crate::address::AddressLimits;
use crate::common::bits::{num_bytes_for_bits, pack_bits, unpack_bits};
use crate::common::cursor::{ReadCursor, WriteCursor};
use crate::common::function::{FunctionCode, ERROR_BIT};
use crate::error::{AduParseError, FrameParseError, InternalError, InvalidRequest, RequestError};
use crate::exception::ExceptionCode;
use crate::message::{address_type_of, max_count, Request, ResponseData, WriteMultiple};
use crate::tcp::frame::{parse_frame, MbapFormatter, MbapHeader};
use crate::types::{coil_from_u16, coil_to_u16, AddressRange, Indexed};

/// A request decoded by a server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerRequest {
    /// header to echo in the reply
    pub header: MbapHeader,
    /// raw function code of the request
    pub function: u8,
    /// the request, or the exception to reply with
    pub body: Result<Request, ExceptionCode>,
}

/// A response decoded by a client
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseFrame {
    /// header echoed by the server
    pub header: MbapHeader,
    /// function code with the error bit cleared
    pub function: u8,
    /// the response data, or the exception the server returned
    pub body: Result<ResponseData, ExceptionCode>,
}

/// Decodes requests and encodes responses on the server side of Modbus/TCP
pub struct ServerCodec {
    limits: AddressLimits,
    formatter: MbapFormatter,
}

impl ServerCodec {
    /// codec that checks request ranges against `limits`
    pub fn new(limits: AddressLimits) -> Self {
        Self {
            limits,
            formatter: MbapFormatter::new(),
        }
    }

    /// limits used for range checks
    pub fn limits(&self) -> &AddressLimits {
        &self.limits
    }

    /// Decode one complete frame
    ///
    /// MBAP faults are returned as errors. Faults in the PDU produce a
    /// `ServerRequest` whose body is the exception to reply with, checked in
    /// the order illegal function, illegal data value, illegal data address.
    pub fn decode_request(&self, frame: &[u8]) -> Result<ServerRequest, FrameParseError> {
        let (header, pdu) = parse_frame(frame)?;
        // parse_frame guarantees at least the function code
        let function = pdu[0];
        let body = self.decode_body(function, &pdu[1..]);
        Ok(ServerRequest {
            header,
            function,
            body,
        })
    }

    fn decode_body(&self, raw: u8, body: &[u8]) -> Result<Request, ExceptionCode> {
        let function = FunctionCode::get(raw).ok_or(ExceptionCode::IllegalFunction)?;
        let request = parse_request(function, &mut ReadCursor::new(body))
            .map_err(|_| ExceptionCode::IllegalDataValue)?;
        self.limits
            .check(address_type_of(function), request.range())
            .map_err(|_| ExceptionCode::IllegalDataAddress)?;
        Ok(request)
    }

    /// Encode a successful response to `function`
    pub fn encode_response(
        &mut self,
        header: MbapHeader,
        function: FunctionCode,
        data: &ResponseData,
    ) -> Result<&[u8], InternalError> {
        self.formatter
            .format(header, function.get_value(), |cursor| write_response(data, cursor))
    }

    /// Encode an error response
    ///
    /// The high bit of `error_code` is set if it is not already, and the body is
    /// exactly the exception byte.
    pub fn encode_error_response(
        &mut self,
        header: MbapHeader,
        error_code: u8,
        exception: ExceptionCode,
    ) -> Result<&[u8], InternalError> {
        self.formatter.format(header, error_code | ERROR_BIT, |cursor| {
            cursor.write_u8(exception.into())
        })
    }
}

impl Default for ServerCodec {
    fn default() -> Self {
        Self::new(AddressLimits::default())
    }
}

/// Encodes requests and decodes responses on the client side of Modbus/TCP
pub struct ClientCodec {
    formatter: MbapFormatter,
}

impl ClientCodec {
    /// create a codec
    pub fn new() -> Self {
        Self {
            formatter: MbapFormatter::new(),
        }
    }

    /// Encode a request, checking its count and 16-bit address range
    pub fn encode_request(
        &mut self,
        header: MbapHeader,
        request: &Request,
    ) -> Result<&[u8], RequestError> {
        request.validate()?;
        let range = request.range();
        if range.last() > u16::MAX as u64 {
            return Err(InvalidRequest::AddressTooBigForProtocol(range.start).into());
        }
        let bytes = self
            .formatter
            .format(header, request.function().get_value(), |cursor| {
                write_request(request, cursor)
            })?;
        Ok(bytes)
    }

    /// Decode one complete response frame
    ///
    /// Anything that does not match a known response shape is an error, never a panic.
    pub fn decode_response(&self, frame: &[u8]) -> Result<ResponseFrame, RequestError> {
        let (header, pdu) = parse_frame(frame)?;
        let mut cursor = ReadCursor::new(&pdu[1..]);
        let raw = pdu[0];

        if raw & ERROR_BIT != 0 {
            let function = raw & !ERROR_BIT;
            if FunctionCode::get(function).is_none() {
                return Err(AduParseError::UnknownResponseFunction(raw).into());
            }
            let exception = ExceptionCode::from(cursor.read_u8()?);
            cursor.expect_empty()?;
            return Ok(ResponseFrame {
                header,
                function,
                body: Err(exception),
            });
        }

        let function =
            FunctionCode::get(raw).ok_or(AduParseError::UnknownResponseFunction(raw))?;
        let data = parse_response(function, &mut cursor)?;
        Ok(ResponseFrame {
            header,
            function: raw,
            body: Ok(data),
        })
    }
}

impl Default for ClientCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn read_range(cursor: &mut ReadCursor) -> Result<AddressRange, AduParseError> {
    let start = cursor.read_u16_be()?;
    let count = cursor.read_u16_be()?;
    Ok(AddressRange {
        start: start as u32,
        count,
    })
}

// body shape and quantity checks, everything here maps to illegal data value
fn parse_request(function: FunctionCode, cursor: &mut ReadCursor) -> Result<Request, AduParseError> {
    let check_count = |range: AddressRange| {
        let max = max_count(function);
        if range.count == 0 || range.count > max {
            return Err(AduParseError::QuantityOutOfRange(range.count, max));
        }
        Ok(range)
    };

    let request = match function {
        FunctionCode::ReadCoils => Request::ReadCoils(check_count(read_range(cursor)?)?),
        FunctionCode::ReadDiscreteInputs => {
            Request::ReadDiscreteInputs(check_count(read_range(cursor)?)?)
        }
        FunctionCode::ReadHoldingRegisters => {
            Request::ReadHoldingRegisters(check_count(read_range(cursor)?)?)
        }
        FunctionCode::ReadInputRegisters => {
            Request::ReadInputRegisters(check_count(read_range(cursor)?)?)
        }
        FunctionCode::WriteSingleCoil => {
            let index = cursor.read_u16_be()? as u32;
            let value = coil_from_u16(cursor.read_u16_be()?)?;
            Request::WriteSingleCoil(Indexed::new(index, value))
        }
        FunctionCode::WriteSingleRegister => {
            let index = cursor.read_u16_be()? as u32;
            let value = cursor.read_u16_be()?;
            Request::WriteSingleRegister(Indexed::new(index, value))
        }
        FunctionCode::WriteMultipleCoils => {
            let range = check_count(read_range(cursor)?)?;
            let bytes = read_byte_counted(cursor, num_bytes_for_bits(range.count))?;
            let values =
                unpack_bits(bytes, range.count as usize).ok_or(AduParseError::InsufficientBytes)?;
            Request::WriteMultipleCoils(WriteMultiple { range, values })
        }
        FunctionCode::WriteMultipleRegisters => {
            let range = check_count(read_range(cursor)?)?;
            let bytes = read_byte_counted(cursor, 2 * range.count as usize)?;
            let values = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            Request::WriteMultipleRegisters(WriteMultiple { range, values })
        }
    };

    cursor.expect_empty()?;
    Ok(request)
}

fn read_byte_counted<'a>(
    cursor: &mut ReadCursor<'a>,
    expected: usize,
) -> Result<&'a [u8], AduParseError> {
    let byte_count = cursor.read_u8()? as usize;
    if byte_count != expected {
        return Err(AduParseError::InsufficientBytesForByteCount(
            expected, byte_count,
        ));
    }
    if cursor.len() != byte_count {
        return Err(AduParseError::InsufficientBytesForByteCount(
            byte_count,
            cursor.len(),
        ));
    }
    cursor.read_bytes(byte_count)
}

fn parse_response(
    function: FunctionCode,
    cursor: &mut ReadCursor,
) -> Result<ResponseData, AduParseError> {
    let data = match function {
        FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs => {
            let count = cursor.read_u8()? as usize;
            let bytes = cursor.read_bytes(count)?;
            ResponseData::Bits(unpack_bits(bytes, 8 * count).unwrap_or_default())
        }
        FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters => {
            let count = cursor.read_u8()? as usize;
            if count % 2 != 0 {
                return Err(AduParseError::InsufficientBytesForByteCount(
                    count + 1,
                    count,
                ));
            }
            let bytes = cursor.read_bytes(count)?;
            ResponseData::Registers(
                bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect(),
            )
        }
        FunctionCode::WriteSingleCoil => {
            let index = cursor.read_u16_be()? as u32;
            let value = coil_from_u16(cursor.read_u16_be()?)?;
            ResponseData::SingleCoil(Indexed::new(index, value))
        }
        FunctionCode::WriteSingleRegister => {
            let index = cursor.read_u16_be()? as u32;
            let value = cursor.read_u16_be()?;
            ResponseData::SingleRegister(Indexed::new(index, value))
        }
        FunctionCode::WriteMultipleCoils | FunctionCode::WriteMultipleRegisters => {
            ResponseData::WriteMultiple(read_range(cursor)?)
        }
    };
    cursor.expect_empty()?;
    Ok(data)
}

fn write_request(request: &Request, cursor: &mut WriteCursor) -> Result<(), InternalError> {
    match request {
        Request::ReadCoils(range)
        | Request::ReadDiscreteInputs(range)
        | Request::ReadHoldingRegisters(range)
        | Request::ReadInputRegisters(range) => write_range(*range, cursor),
        Request::WriteSingleCoil(x) => {
            cursor.write_u16_be(x.index as u16)?;
            cursor.write_u16_be(coil_to_u16(x.value))
        }
        Request::WriteSingleRegister(x) => {
            cursor.write_u16_be(x.index as u16)?;
            cursor.write_u16_be(x.value)
        }
        Request::WriteMultipleCoils(x) => {
            write_range(x.range, cursor)?;
            let bytes = pack_bits(&x.values);
            write_byte_count(bytes.len(), cursor)?;
            cursor.write_bytes(&bytes)
        }
        Request::WriteMultipleRegisters(x) => {
            write_range(x.range, cursor)?;
            write_byte_count(2 * x.values.len(), cursor)?;
            for value in &x.values {
                cursor.write_u16_be(*value)?;
            }
            Ok(())
        }
    }
}

fn write_response(data: &ResponseData, cursor: &mut WriteCursor) -> Result<(), InternalError> {
    match data {
        ResponseData::Bits(values) => {
            let bytes = pack_bits(values);
            write_byte_count(bytes.len(), cursor)?;
            cursor.write_bytes(&bytes)
        }
        ResponseData::Registers(values) => {
            write_byte_count(2 * values.len(), cursor)?;
            for value in values {
                cursor.write_u16_be(*value)?;
            }
            Ok(())
        }
        ResponseData::SingleCoil(x) => {
            cursor.write_u16_be(x.index as u16)?;
            cursor.write_u16_be(coil_to_u16(x.value))
        }
        ResponseData::SingleRegister(x) => {
            cursor.write_u16_be(x.index as u16)?;
            cursor.write_u16_be(x.value)
        }
        ResponseData::WriteMultiple(range) => write_range(*range, cursor),
    }
}

fn write_range(range: AddressRange, cursor: &mut WriteCursor) -> Result<(), InternalError> {
    cursor.write_u16_be(range.start as u16)?;
    cursor.write_u16_be(range.count)
}

fn write_byte_count(count: usize, cursor: &mut WriteCursor) -> Result<(), InternalError> {
    let count = u8::try_from(count).map_err(|_| InternalError::BadByteCount(count))?;
    cursor.write_u8(count)
}
