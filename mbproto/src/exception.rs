use crate::constants::exceptions;
use crate::error::AddressError;

/// Exception codes carried by Modbus error responses
///
/// The same codes are reported by the Modbus/TCP and the Modbus-REST codecs.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Ord, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum ExceptionCode {
    /// The function code is not supported by the server
    IllegalFunction,
    /// The address range of the request falls outside the data table
    IllegalDataAddress,
    /// A quantity, byte count or value in the request is not acceptable
    IllegalDataValue,
    /// The server failed while reading or writing the data table
    ServerDeviceFailure,
    /// Request accepted, processing continues in the background
    Acknowledge,
    /// The server is busy with a long running command
    ServerDeviceBusy,
    /// Parity error detected while reading extended file memory
    MemoryParityError,
    /// A gateway could not allocate a path to the target
    GatewayPathUnavailable,
    /// A gateway received no response from the target device
    GatewayTargetDeviceFailedToRespond,
    /// Exception code not defined by the Modbus application protocol
    Unknown(u8),
}

impl ExceptionCode {
    /// true for the exceptions a server built on this crate can emit
    pub fn is_validation_failure(self) -> bool {
        matches!(
            self,
            ExceptionCode::IllegalFunction
                | ExceptionCode::IllegalDataAddress
                | ExceptionCode::IllegalDataValue
        )
    }
}

impl From<u8> for ExceptionCode {
    fn from(value: u8) -> Self {
        match value {
            exceptions::ILLEGAL_FUNCTION => ExceptionCode::IllegalFunction,
            exceptions::ILLEGAL_DATA_ADDRESS => ExceptionCode::IllegalDataAddress,
            exceptions::ILLEGAL_DATA_VALUE => ExceptionCode::IllegalDataValue,
            exceptions::SERVER_DEVICE_FAILURE => ExceptionCode::ServerDeviceFailure,
            exceptions::ACKNOWLEDGE => ExceptionCode::Acknowledge,
            exceptions::SERVER_DEVICE_BUSY => ExceptionCode::ServerDeviceBusy,
            exceptions::MEMORY_PARITY_ERROR => ExceptionCode::MemoryParityError,
            exceptions::GATEWAY_PATH_UNAVAILABLE => ExceptionCode::GatewayPathUnavailable,
            exceptions::GATEWAY_TARGET_DEVICE_FAILED_TO_RESPOND => {
                ExceptionCode::GatewayTargetDeviceFailedToRespond
            }
            _ => ExceptionCode::Unknown(value),
        }
    }
}

impl From<ExceptionCode> for u8 {
    fn from(ex: ExceptionCode) -> Self {
        match ex {
            ExceptionCode::IllegalFunction => exceptions::ILLEGAL_FUNCTION,
            ExceptionCode::IllegalDataAddress => exceptions::ILLEGAL_DATA_ADDRESS,
            ExceptionCode::IllegalDataValue => exceptions::ILLEGAL_DATA_VALUE,
            ExceptionCode::ServerDeviceFailure => exceptions::SERVER_DEVICE_FAILURE,
            ExceptionCode::Acknowledge => exceptions::ACKNOWLEDGE,
            ExceptionCode::ServerDeviceBusy => exceptions::SERVER_DEVICE_BUSY,
            ExceptionCode::MemoryParityError => exceptions::MEMORY_PARITY_ERROR,
            ExceptionCode::GatewayPathUnavailable => exceptions::GATEWAY_PATH_UNAVAILABLE,
            ExceptionCode::GatewayTargetDeviceFailedToRespond => {
                exceptions::GATEWAY_TARGET_DEVICE_FAILED_TO_RESPOND
            }
            ExceptionCode::Unknown(value) => value,
        }
    }
}

impl From<AddressError> for ExceptionCode {
    fn from(err: AddressError) -> Self {
        match err {
            AddressError::CountOfZero | AddressError::CountMismatch(_, _) => {
                ExceptionCode::IllegalDataValue
            }
            AddressError::OutOfRange { .. } => ExceptionCode::IllegalDataAddress,
        }
    }
}

impl std::error::Error for ExceptionCode {}

impl std::fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        match self {
            ExceptionCode::IllegalFunction => f.write_str("function code is not supported by the server"),
            ExceptionCode::IllegalDataAddress => f.write_str("address range is not valid for the server"),
            ExceptionCode::IllegalDataValue => f.write_str("request contains a value that is not allowed"),
            ExceptionCode::ServerDeviceFailure => f.write_str("server failed while performing the requested action"),
            ExceptionCode::Acknowledge => f.write_str("server accepted the request and is processing it"),
            ExceptionCode::ServerDeviceBusy => f.write_str("server is busy, try again later"),
            ExceptionCode::MemoryParityError => f.write_str("server detected a memory parity error"),
            ExceptionCode::GatewayPathUnavailable => f.write_str("gateway path unavailable"),
            ExceptionCode::GatewayTargetDeviceFailedToRespond => f.write_str("gateway target device failed to respond"),
            ExceptionCode::Unknown(code) => write!(f, "received unknown exception code: {code}"),
        }
    }
}
