//! Structured requests and responses shared by the Modbus/TCP and Modbus-REST codecs

use crate::address::AddressType;
use crate::common::function::FunctionCode;
use crate::constants::limits;
use crate::decode::AppDecodeLevel;
use crate::error::InvalidRequest;
use crate::types::{AddressRange, Indexed};

/// A range of consecutive values to write
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteMultiple<T> {
    /// addresses written
    pub range: AddressRange,
    /// one value per address in the range
    pub values: Vec<T>,
}

impl<T> WriteMultiple<T> {
    /// Create a write of `values` starting at `start`
    pub fn from(start: u32, values: Vec<T>) -> Result<Self, InvalidRequest> {
        let count = u16::try_from(values.len())
            .map_err(|_| InvalidRequest::CountTooBigForType(u16::MAX, u16::MAX))?;
        let range = AddressRange::try_from(start, count)?;
        Ok(Self { range, values })
    }
}

/// A decoded or to-be-encoded request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    /// read coils
    ReadCoils(AddressRange),
    /// read discrete inputs
    ReadDiscreteInputs(AddressRange),
    /// read holding registers
    ReadHoldingRegisters(AddressRange),
    /// read input registers
    ReadInputRegisters(AddressRange),
    /// write a single coil
    WriteSingleCoil(Indexed<bool>),
    /// write a single holding register
    WriteSingleRegister(Indexed<u16>),
    /// write consecutive coils
    WriteMultipleCoils(WriteMultiple<bool>),
    /// write consecutive holding registers
    WriteMultipleRegisters(WriteMultiple<u16>),
}

impl Request {
    /// function code of the request
    pub fn function(&self) -> FunctionCode {
        match self {
            Request::ReadCoils(_) => FunctionCode::ReadCoils,
            Request::ReadDiscreteInputs(_) => FunctionCode::ReadDiscreteInputs,
            Request::ReadHoldingRegisters(_) => FunctionCode::ReadHoldingRegisters,
            Request::ReadInputRegisters(_) => FunctionCode::ReadInputRegisters,
            Request::WriteSingleCoil(_) => FunctionCode::WriteSingleCoil,
            Request::WriteSingleRegister(_) => FunctionCode::WriteSingleRegister,
            Request::WriteMultipleCoils(_) => FunctionCode::WriteMultipleCoils,
            Request::WriteMultipleRegisters(_) => FunctionCode::WriteMultipleRegisters,
        }
    }

    /// addresses touched by the request
    pub fn range(&self) -> AddressRange {
        match self {
            Request::ReadCoils(range)
            | Request::ReadDiscreteInputs(range)
            | Request::ReadHoldingRegisters(range)
            | Request::ReadInputRegisters(range) => *range,
            Request::WriteSingleCoil(x) => AddressRange {
                start: x.index,
                count: 1,
            },
            Request::WriteSingleRegister(x) => AddressRange {
                start: x.index,
                count: 1,
            },
            Request::WriteMultipleCoils(x) => x.range,
            Request::WriteMultipleRegisters(x) => x.range,
        }
    }

    /// basic address type the request operates on
    pub fn address_type(&self) -> AddressType {
        address_type_of(self.function())
    }

    /// check the count against the per-function protocol limit
    pub fn validate(&self) -> Result<(), InvalidRequest> {
        let range = self.range();
        if range.count == 0 {
            return Err(InvalidRequest::BadRange(crate::error::AddressError::CountOfZero));
        }
        let max = max_count(self.function());
        if range.count > max {
            return Err(InvalidRequest::CountTooBigForType(range.count, max));
        }
        match self {
            Request::WriteMultipleCoils(x) if x.values.len() != range.count as usize => Err(
                crate::error::AddressError::CountMismatch(range.count as usize, x.values.len())
                    .into(),
            ),
            Request::WriteMultipleRegisters(x) if x.values.len() != range.count as usize => Err(
                crate::error::AddressError::CountMismatch(range.count as usize, x.values.len())
                    .into(),
            ),
            _ => Ok(()),
        }
    }
}

pub(crate) fn address_type_of(function: FunctionCode) -> AddressType {
    match function {
        FunctionCode::ReadCoils | FunctionCode::WriteSingleCoil | FunctionCode::WriteMultipleCoils => {
            AddressType::Coil
        }
        FunctionCode::ReadDiscreteInputs => AddressType::Discrete,
        FunctionCode::ReadInputRegisters => AddressType::InputReg,
        FunctionCode::ReadHoldingRegisters
        | FunctionCode::WriteSingleRegister
        | FunctionCode::WriteMultipleRegisters => AddressType::HoldingReg,
    }
}

pub(crate) fn max_count(function: FunctionCode) -> u16 {
    match function {
        FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs => limits::MAX_READ_COILS_COUNT,
        FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters => {
            limits::MAX_READ_REGISTERS_COUNT
        }
        FunctionCode::WriteMultipleCoils => limits::MAX_WRITE_COILS_COUNT,
        FunctionCode::WriteMultipleRegisters => limits::MAX_WRITE_REGISTERS_COUNT,
        FunctionCode::WriteSingleCoil | FunctionCode::WriteSingleRegister => 1,
    }
}

/// The data carried by a successful response
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseData {
    /// coil or discrete input values
    ///
    /// Modbus/TCP responses carry whole bytes, so a decoded value holds
    /// `8 * byte count` bits. Truncate to the requested count.
    Bits(Vec<bool>),
    /// holding or input register values
    Registers(Vec<u16>),
    /// echo of a write single coil
    SingleCoil(Indexed<bool>),
    /// echo of a write single register
    SingleRegister(Indexed<u16>),
    /// echo of the range of a write multiple request
    WriteMultiple(AddressRange),
}

impl ResponseData {
    /// true if the data is the kind of reply `function` produces
    pub fn matches(&self, function: FunctionCode) -> bool {
        matches!(
            (self, function),
            (
                ResponseData::Bits(_),
                FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs
            ) | (
                ResponseData::Registers(_),
                FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters
            ) | (ResponseData::SingleCoil(_), FunctionCode::WriteSingleCoil)
                | (ResponseData::SingleRegister(_), FunctionCode::WriteSingleRegister)
                | (
                    ResponseData::WriteMultiple(_),
                    FunctionCode::WriteMultipleCoils | FunctionCode::WriteMultipleRegisters
                )
        )
    }
}

pub(crate) struct RequestDisplay<'a> {
    level: AppDecodeLevel,
    request: &'a Request,
}

impl<'a> RequestDisplay<'a> {
    pub(crate) fn new(level: AppDecodeLevel, request: &'a Request) -> Self {
        Self { level, request }
    }
}

impl std::fmt::Display for RequestDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.request.function())?;
        if self.level.data_headers() {
            write!(f, " {}", self.request.range())?;
        }
        if self.level.data_values() {
            match self.request {
                Request::WriteSingleCoil(x) => write!(f, "\n{x}")?,
                Request::WriteSingleRegister(x) => write!(f, "\n{x}")?,
                Request::WriteMultipleCoils(x) => {
                    for (i, value) in x.values.iter().enumerate() {
                        write!(f, "\n{}", Indexed::new(x.range.start + i as u32, *value))?;
                    }
                }
                Request::WriteMultipleRegisters(x) => {
                    for (i, value) in x.values.iter().enumerate() {
                        write!(f, "\n{}", Indexed::new(x.range.start + i as u32, *value))?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

pub(crate) struct ResponseDisplay<'a> {
    level: AppDecodeLevel,
    function: u8,
    body: Result<&'a ResponseData, crate::exception::ExceptionCode>,
}

impl<'a> ResponseDisplay<'a> {
    pub(crate) fn new(
        level: AppDecodeLevel,
        function: u8,
        body: Result<&'a ResponseData, crate::exception::ExceptionCode>,
    ) -> Self {
        Self {
            level,
            function,
            body,
        }
    }
}

impl std::fmt::Display for ResponseDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match FunctionCode::get(self.function) {
            Some(x) => write!(f, "{x}")?,
            None => write!(f, "FUNCTION ({:#04X})", self.function)?,
        }
        let data = match self.body {
            Err(ex) => return write!(f, " exception: {ex}"),
            Ok(data) => data,
        };
        if !self.level.data_headers() {
            return Ok(());
        }
        match data {
            ResponseData::Bits(values) => {
                write!(f, " bits: {}", values.len())?;
                if self.level.data_values() {
                    for value in values {
                        write!(f, "\n{}", *value as i32)?;
                    }
                }
            }
            ResponseData::Registers(values) => {
                write!(f, " registers: {}", values.len())?;
                if self.level.data_values() {
                    for value in values {
                        write!(f, "\n{value:#06X}")?;
                    }
                }
            }
            ResponseData::SingleCoil(x) => write!(f, " {x}")?,
            ResponseData::SingleRegister(x) => write!(f, " {x}")?,
            ResponseData::WriteMultiple(range) => write!(f, " {range}")?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AddressError;

    #[test]
    fn validates_per_function_limits() {
        let range = AddressRange::try_from(0, 0x07D0).unwrap();
        assert_eq!(Request::ReadCoils(range).validate(), Ok(()));
        assert_eq!(
            Request::ReadHoldingRegisters(range).validate(),
            Err(InvalidRequest::CountTooBigForType(0x07D0, 0x007D))
        );
        let write = WriteMultiple::from(0, vec![0u16; 0x7C]).unwrap();
        assert_eq!(
            Request::WriteMultipleRegisters(write).validate(),
            Err(InvalidRequest::CountTooBigForType(0x7C, 0x7B))
        );
    }

    #[test]
    fn write_multiple_rejects_empty_values() {
        assert_eq!(
            WriteMultiple::<bool>::from(3, Vec::new()),
            Err(InvalidRequest::BadRange(AddressError::CountOfZero))
        );
    }

    #[test]
    fn requests_map_to_basic_address_types() {
        let single = Request::WriteSingleRegister(Indexed::new(7, 0));
        assert_eq!(single.address_type(), AddressType::HoldingReg);
        assert_eq!(single.range(), AddressRange { start: 7, count: 1 });
        let read = Request::ReadDiscreteInputs(AddressRange::try_from(1, 2).unwrap());
        assert_eq!(read.address_type(), AddressType::Discrete);
    }

    #[test]
    fn response_kinds_match_functions() {
        assert!(ResponseData::Bits(vec![]).matches(FunctionCode::ReadDiscreteInputs));
        assert!(!ResponseData::Bits(vec![]).matches(FunctionCode::ReadHoldingRegisters));
        assert!(ResponseData::WriteMultiple(AddressRange { start: 0, count: 1 })
            .matches(FunctionCode::WriteMultipleCoils));
    }

    #[test]
    fn display_respects_the_decode_level() {
        let request = Request::WriteSingleCoil(Indexed::new(1, true));
        assert_eq!(
            RequestDisplay::new(AppDecodeLevel::FunctionCode, &request).to_string(),
            "WRITE SINGLE COIL (0x05)"
        );
        assert_eq!(
            RequestDisplay::new(AppDecodeLevel::DataValues, &request).to_string(),
            "WRITE SINGLE COIL (0x05) start: 0x0001 qty: 1\nidx: 0x0001 value: 1"
        );
    }
}
