use crate::exception::ExceptionCode;
use crate::types::AddressRange;

/// Top level error type returned by client sessions
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// An I/O error occurred on the transport
    Io(std::io::ErrorKind),
    /// The server replied with an exception response
    Exception(ExceptionCode),
    /// The request could not be encoded
    BadRequest(InvalidRequest),
    /// The transport delivered bytes that could not be framed
    BadFrame(FrameParseError),
    /// A frame was received but its contents could not be parsed
    BadResponse(AduParseError),
    /// The response did not correlate with the outstanding request
    Mismatch(ResponseMismatch),
    /// No response was received within the configured timeout
    ResponseTimeout,
    /// An error that indicates a bug in the library
    Internal(InternalError),
}

impl std::error::Error for RequestError {}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RequestError::Io(kind) => std::io::Error::from(*kind).fmt(f),
            RequestError::Exception(err) => err.fmt(f),
            RequestError::BadRequest(err) => err.fmt(f),
            RequestError::BadFrame(err) => err.fmt(f),
            RequestError::BadResponse(err) => err.fmt(f),
            RequestError::Mismatch(err) => err.fmt(f),
            RequestError::ResponseTimeout => {
                f.write_str("no response received from the server within the timeout")
            }
            RequestError::Internal(err) => err.fmt(f),
        }
    }
}

impl From<std::io::Error> for RequestError {
    fn from(err: std::io::Error) -> Self {
        RequestError::Io(err.kind())
    }
}

impl From<ExceptionCode> for RequestError {
    fn from(err: ExceptionCode) -> Self {
        RequestError::Exception(err)
    }
}

impl From<InvalidRequest> for RequestError {
    fn from(err: InvalidRequest) -> Self {
        RequestError::BadRequest(err)
    }
}

impl From<FrameParseError> for RequestError {
    fn from(err: FrameParseError) -> Self {
        RequestError::BadFrame(err)
    }
}

impl From<AduParseError> for RequestError {
    fn from(err: AduParseError) -> Self {
        RequestError::BadResponse(err)
    }
}

impl From<ResponseMismatch> for RequestError {
    fn from(err: ResponseMismatch) -> Self {
        RequestError::Mismatch(err)
    }
}

impl From<InternalError> for RequestError {
    fn from(err: InternalError) -> Self {
        RequestError::Internal(err)
    }
}

impl From<tokio::time::error::Elapsed> for RequestError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        RequestError::ResponseTimeout
    }
}

/// Errors that indicate faulty logic in the library itself
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InternalError {
    /// Attempted to write more bytes than the buffer allows (write size, remaining)
    InsufficientWriteSpace(usize, usize),
    /// The encoded ADU does not fit in the MBAP length field
    AduTooBig(usize),
    /// Cursor seek exceeded the bounds of the buffer
    BadSeekOperation,
    /// A byte count would not fit in a u8
    BadByteCount(usize),
    /// Attempted to consume more bytes than were received (requested, available)
    InsufficientBytesForRead(usize, usize),
}

impl std::error::Error for InternalError {}

impl std::fmt::Display for InternalError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            InternalError::InsufficientWriteSpace(written, remaining) => write!(
                f,
                "attempted to write {written} bytes with {remaining} bytes remaining"
            ),
            InternalError::AduTooBig(size) => {
                write!(f, "ADU length of {size} exceeds the maximum allowed length")
            }
            InternalError::BadSeekOperation => {
                f.write_str("cursor seek operation exceeded the bounds of the underlying buffer")
            }
            InternalError::BadByteCount(size) => {
                write!(f, "byte count would exceed the maximum size of a u8: {size}")
            }
            InternalError::InsufficientBytesForRead(requested, available) => write!(
                f,
                "attempted to read {requested} bytes with only {available} available"
            ),
        }
    }
}

/// Errors that occur while parsing a frame off a stream or out of a buffer
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FrameParseError {
    /// Frame is shorter than the fixed MBAP header plus function code (actual length, minimum)
    TooShort(usize, usize),
    /// MBAP length field is zero
    MbapLengthZero,
    /// MBAP length field exceeds the maximum allowed (actual, maximum)
    MbapLengthTooBig(usize, usize),
    /// MBAP length field does not agree with the number of bytes in the frame (field, actual)
    LengthMismatch(usize, usize),
    /// Non-Modbus protocol identifier
    UnknownProtocolId(u16),
}

impl std::error::Error for FrameParseError {}

impl std::fmt::Display for FrameParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FrameParseError::TooShort(actual, min) => write!(
                f,
                "frame length of {actual} is less than the minimum of {min} bytes"
            ),
            FrameParseError::MbapLengthZero => {
                f.write_str("received MBAP frame with the length field set to zero")
            }
            FrameParseError::MbapLengthTooBig(size, max) => write!(
                f,
                "received MBAP frame with length ({size}) that exceeds the maximum allowed ({max})"
            ),
            FrameParseError::LengthMismatch(field, actual) => write!(
                f,
                "MBAP length field ({field}) does not match the number of bytes received ({actual})"
            ),
            FrameParseError::UnknownProtocolId(id) => {
                write!(f, "received MBAP frame with non-Modbus protocol id: {id}")
            }
        }
    }
}

/// Errors that occur while parsing the body of a request or response
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AduParseError {
    /// Body is too short to be valid
    InsufficientBytes,
    /// Byte count does not match what the quantity implies (expected, actual)
    InsufficientBytesForByteCount(usize, usize),
    /// Body has bytes beyond what the function code defines
    TrailingBytes(usize),
    /// Coil value other than 0xFF00 or 0x0000
    UnknownCoilState(u16),
    /// Response carries a function code that is not supported
    UnknownResponseFunction(u8),
    /// Quantity is zero or above the per-function maximum (quantity, maximum)
    QuantityOutOfRange(u16, u16),
}

impl std::error::Error for AduParseError {}

impl std::fmt::Display for AduParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AduParseError::InsufficientBytes => f.write_str("response is too short to be valid"),
            AduParseError::InsufficientBytesForByteCount(expected, actual) => write!(
                f,
                "byte count ({expected}) does not match the actual number of bytes ({actual})"
            ),
            AduParseError::TrailingBytes(count) => {
                write!(f, "response contains {count} extra trailing bytes")
            }
            AduParseError::UnknownCoilState(value) => {
                write!(f, "received coil state with unspecified value: {value:#06X}")
            }
            AduParseError::UnknownResponseFunction(fc) => {
                write!(f, "received unknown response function code: {fc}")
            }
            AduParseError::QuantityOutOfRange(count, max) => {
                write!(f, "quantity of {count} is outside the allowed range of 1 to {max}")
            }
        }
    }
}

/// Describes how a decoded response failed to correlate with its request
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResponseMismatch {
    /// Transaction id differs (expected, received)
    TxId(u16, u16),
    /// Function code differs (expected, received)
    Function(u8, u8),
    /// Response carries a different kind of data than the request implies
    DataKind,
}

impl std::error::Error for ResponseMismatch {}

impl std::fmt::Display for ResponseMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ResponseMismatch::TxId(expected, received) => write!(
                f,
                "expected transaction id {expected} but received {received}"
            ),
            ResponseMismatch::Function(expected, received) => {
                write!(f, "expected function {expected} but received {received}")
            }
            ResponseMismatch::DataKind => {
                f.write_str("response data does not match the type of the request")
            }
        }
    }
}

/// Errors that result because of bad request parameter
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InvalidRequest {
    /// Request contained an invalid range
    BadRange(AddressError),
    /// Count is too big to fit in a single request (count, max)
    CountTooBigForType(u16, u16),
    /// Start address cannot be carried by a 16-bit protocol field
    AddressTooBigForProtocol(u32),
}

impl std::error::Error for InvalidRequest {}

impl std::fmt::Display for InvalidRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            InvalidRequest::BadRange(err) => write!(f, "{err}"),
            InvalidRequest::CountTooBigForType(count, max) => write!(
                f,
                "the request count of {count} exceeds the maximum allowed count of {max} for this type"
            ),
            InvalidRequest::AddressTooBigForProtocol(addr) => write!(
                f,
                "address {addr} cannot be encoded in a 16-bit Modbus/TCP address field"
            ),
        }
    }
}

impl From<AddressError> for InvalidRequest {
    fn from(err: AddressError) -> Self {
        InvalidRequest::BadRange(err)
    }
}

/// Errors that occur when an address or range does not fit the data table
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Range contains a count of zero
    CountOfZero,
    /// Range ends past the maximum address of its type
    OutOfRange {
        /// first address of the range
        start: u32,
        /// number of addresses in the range
        count: usize,
        /// inclusive maximum address
        max: u32,
    },
    /// Number of supplied values does not equal the count (count, values)
    CountMismatch(usize, usize),
}

impl AddressError {
    pub(crate) fn out_of_range(range: AddressRange, max: u32) -> Self {
        AddressError::OutOfRange {
            start: range.start,
            count: range.count as usize,
            max,
        }
    }
}

impl std::error::Error for AddressError {}

impl std::fmt::Display for AddressError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AddressError::CountOfZero => f.write_str("range contains count == 0"),
            AddressError::OutOfRange { start, count, max } => write!(
                f,
                "range with start {start} and count {count} exceeds the maximum address {max}"
            ),
            AddressError::CountMismatch(count, values) => write!(
                f,
                "range count ({count}) does not match the number of values ({values})"
            ),
        }
    }
}

/// Errors in EtherSBus telegrams and client requests
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SBusError {
    /// An I/O error occurred on the transport
    Io(std::io::ErrorKind),
    /// No reply was received within the configured timeout
    ResponseTimeout,
    /// Telegram length is outside the valid range (actual, minimum, maximum)
    BadLength(usize, usize, usize),
    /// Length field does not match the number of bytes received (field, actual)
    LengthMismatch(usize, usize),
    /// Received CRC does not match the computed CRC (received, computed)
    CrcMismatch(u16, u16),
    /// Telegram attribute is not valid in this direction
    UnexpectedTelegram(u8),
    /// Command code is not supported
    UnknownCommand(u8),
    /// Body does not have the shape the command requires
    MalformedBody,
    /// Quantity is zero or above the per-command maximum (quantity, maximum)
    QuantityOutOfRange(usize, usize),
    /// Range does not fit the data table
    Address(AddressError),
    /// The server answered with a NAK carrying this code
    Nak(u16),
    /// Reply sequence differs (expected, received)
    SequenceMismatch(u16, u16),
    /// An error that indicates a bug in the library
    Internal(InternalError),
}

impl std::error::Error for SBusError {}

impl std::fmt::Display for SBusError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SBusError::Io(kind) => std::io::Error::from(*kind).fmt(f),
            SBusError::ResponseTimeout => {
                f.write_str("no reply received from the station within the timeout")
            }
            SBusError::BadLength(actual, min, max) => write!(
                f,
                "telegram length of {actual} is outside the range of {min} to {max} bytes"
            ),
            SBusError::LengthMismatch(field, actual) => write!(
                f,
                "telegram length field ({field}) does not match the number of bytes received ({actual})"
            ),
            SBusError::CrcMismatch(received, computed) => write!(
                f,
                "received CRC {received:#06X} does not match the computed CRC {computed:#06X}"
            ),
            SBusError::UnexpectedTelegram(value) => {
                write!(f, "unexpected telegram attribute: {value}")
            }
            SBusError::UnknownCommand(value) => write!(f, "unsupported command code: {value}"),
            SBusError::MalformedBody => f.write_str("telegram body does not match its command"),
            SBusError::QuantityOutOfRange(count, max) => {
                write!(f, "quantity of {count} is outside the allowed range of 1 to {max}")
            }
            SBusError::Address(err) => err.fmt(f),
            SBusError::Nak(code) => write!(f, "station replied with NAK code {code}"),
            SBusError::SequenceMismatch(expected, received) => write!(
                f,
                "expected sequence {expected} but received {received}"
            ),
            SBusError::Internal(err) => err.fmt(f),
        }
    }
}

impl From<std::io::Error> for SBusError {
    fn from(err: std::io::Error) -> Self {
        SBusError::Io(err.kind())
    }
}

impl From<tokio::time::error::Elapsed> for SBusError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        SBusError::ResponseTimeout
    }
}

impl From<AddressError> for SBusError {
    fn from(err: AddressError) -> Self {
        SBusError::Address(err)
    }
}

impl From<InternalError> for SBusError {
    fn from(err: InternalError) -> Self {
        SBusError::Internal(err)
    }
}

impl From<AduParseError> for SBusError {
    fn from(_: AduParseError) -> Self {
        SBusError::MalformedBody
    }
}

/// Numeric conversion failures in the extended value codec
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ConversionError {
    /// A finite value whose magnitude cannot be represented as an IEEE-754 single
    FloatOutOfRange(f64),
}

impl std::error::Error for ConversionError {}

impl std::fmt::Display for ConversionError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ConversionError::FloatOutOfRange(value) => {
                write!(f, "value {value} cannot be represented as a 32-bit float")
            }
        }
    }
}

/// Errors returned by the extended value setters
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ValueError {
    /// The cells needed by the value are not addressable
    Address(AddressError),
    /// The value could not be converted and the policy rejects it
    Conversion(ConversionError),
}

impl std::error::Error for ValueError {}

impl std::fmt::Display for ValueError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ValueError::Address(err) => err.fmt(f),
            ValueError::Conversion(err) => err.fmt(f),
        }
    }
}

impl From<AddressError> for ValueError {
    fn from(err: AddressError) -> Self {
        ValueError::Address(err)
    }
}

impl From<ConversionError> for ValueError {
    fn from(err: ConversionError) -> Self {
        ValueError::Conversion(err)
    }
}

/// Transport level faults in Modbus-REST documents and URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestParseError {
    /// The document is not well formed XML
    Xml(String),
    /// A required element is missing from the document
    MissingElement(&'static str),
    /// An element or URL parameter is not a valid integer
    InvalidInteger(&'static str, String),
    /// The URL does not have the form `{fc}/{addr}?...`
    InvalidUrl(String),
    /// `msgdata` cannot be decoded for the function code
    InvalidMsgData(String),
    /// The `status` attribute is neither `ok` nor `fail`
    InvalidStatus(String),
    /// The `protocol` element names a different protocol
    UnknownProtocol(String),
}

impl std::error::Error for RestParseError {}

impl std::fmt::Display for RestParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RestParseError::Xml(err) => write!(f, "malformed XML document: {err}"),
            RestParseError::MissingElement(name) => write!(f, "missing element: {name}"),
            RestParseError::InvalidInteger(name, value) => {
                write!(f, "{name} is not a valid integer: {value}")
            }
            RestParseError::InvalidUrl(url) => write!(f, "invalid request url: {url}"),
            RestParseError::InvalidMsgData(data) => write!(f, "invalid msgdata: {data}"),
            RestParseError::InvalidStatus(status) => write!(f, "invalid status: {status}"),
            RestParseError::UnknownProtocol(name) => write!(f, "unknown protocol: {name}"),
        }
    }
}

impl From<roxmltree::Error> for RestParseError {
    fn from(err: roxmltree::Error) -> Self {
        RestParseError::Xml(err.to_string())
    }
}

/// Errors returned by a Modbus-REST client session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestError {
    /// The transport failed to deliver the request or the reply
    Io(std::io::ErrorKind),
    /// The request could not be encoded
    BadRequest(InvalidRequest),
    /// The reply could not be parsed
    Parse(RestParseError),
    /// The server replied with `status="fail"`
    Exception(ExceptionCode),
    /// The reply did not correlate with the request
    Mismatch(ResponseMismatch),
}

impl std::error::Error for RestError {}

impl std::fmt::Display for RestError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RestError::Io(kind) => std::io::Error::from(*kind).fmt(f),
            RestError::BadRequest(err) => err.fmt(f),
            RestError::Parse(err) => err.fmt(f),
            RestError::Exception(err) => err.fmt(f),
            RestError::Mismatch(err) => err.fmt(f),
        }
    }
}

impl From<std::io::Error> for RestError {
    fn from(err: std::io::Error) -> Self {
        RestError::Io(err.kind())
    }
}

impl From<InvalidRequest> for RestError {
    fn from(err: InvalidRequest) -> Self {
        RestError::BadRequest(err)
    }
}

impl From<RestParseError> for RestError {
    fn from(err: RestParseError) -> Self {
        RestError::Parse(err)
    }
}

impl From<ExceptionCode> for RestError {
    fn from(err: ExceptionCode) -> Self {
        RestError::Exception(err)
    }
}

impl From<ResponseMismatch> for RestError {
    fn from(err: ResponseMismatch) -> Self {
        RestError::Mismatch(err)
    }
}
