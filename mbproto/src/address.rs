//! Address types and their maximum data table addresses
//!
//! Extended types reinterpret the cells of a basic type and share its maximum.

use std::str::FromStr;

use crate::error::AddressError;
use crate::types::AddressRange;

/// Storage class of an address type within a [`DataTable`](crate::table::DataTable)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StorageClass {
    /// single bit cells
    Bits,
    /// word cells
    Words,
}

/// Logical address types of the Modbus and SBus data tables
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum AddressType {
    /// Modbus coil
    Coil,
    /// Modbus discrete input
    Discrete,
    /// Modbus holding register
    HoldingReg,
    /// signed 32-bit integer over holding registers
    HoldingReg32,
    /// IEEE-754 single over holding registers
    HoldingRegFloat,
    /// IEEE-754 double over holding registers
    HoldingRegDouble,
    /// string packed two characters per holding register
    HoldingRegStr8,
    /// string stored one character per holding register
    HoldingRegStr16,
    /// Modbus input register
    InputReg,
    /// signed 32-bit integer over input registers
    InputReg32,
    /// IEEE-754 single over input registers
    InputRegFloat,
    /// IEEE-754 double over input registers
    InputRegDouble,
    /// string packed two characters per input register
    InputRegStr8,
    /// string stored one character per input register
    InputRegStr16,
    /// SBus flag
    SBusFlag,
    /// SBus input
    SBusInput,
    /// SBus output
    SBusOutput,
    /// SBus register
    SBusReg,
    /// SBus string register
    SBusRegStr,
}

impl AddressType {
    /// every address type, basic types first within each family
    pub const ALL: [AddressType; 19] = [
        AddressType::Coil,
        AddressType::Discrete,
        AddressType::HoldingReg,
        AddressType::HoldingReg32,
        AddressType::HoldingRegFloat,
        AddressType::HoldingRegDouble,
        AddressType::HoldingRegStr8,
        AddressType::HoldingRegStr16,
        AddressType::InputReg,
        AddressType::InputReg32,
        AddressType::InputRegFloat,
        AddressType::InputRegDouble,
        AddressType::InputRegStr8,
        AddressType::InputRegStr16,
        AddressType::SBusFlag,
        AddressType::SBusInput,
        AddressType::SBusOutput,
        AddressType::SBusReg,
        AddressType::SBusRegStr,
    ];

    /// The basic type whose cells this type occupies
    pub fn basic(self) -> AddressType {
        match self {
            AddressType::HoldingReg
            | AddressType::HoldingReg32
            | AddressType::HoldingRegFloat
            | AddressType::HoldingRegDouble
            | AddressType::HoldingRegStr8
            | AddressType::HoldingRegStr16 => AddressType::HoldingReg,
            AddressType::InputReg
            | AddressType::InputReg32
            | AddressType::InputRegFloat
            | AddressType::InputRegDouble
            | AddressType::InputRegStr8
            | AddressType::InputRegStr16 => AddressType::InputReg,
            other => other,
        }
    }

    /// true if the type has its own entry in the limit tables
    pub fn is_basic(self) -> bool {
        self.basic() == self
    }

    /// The storage class of the type
    pub fn storage(self) -> StorageClass {
        match self.basic() {
            AddressType::Coil
            | AddressType::Discrete
            | AddressType::SBusFlag
            | AddressType::SBusInput
            | AddressType::SBusOutput => StorageClass::Bits,
            _ => StorageClass::Words,
        }
    }

    /// lowercase name used in configuration and logs
    pub fn name(self) -> &'static str {
        match self {
            AddressType::Coil => "coil",
            AddressType::Discrete => "discrete",
            AddressType::HoldingReg => "holdingreg",
            AddressType::HoldingReg32 => "holdingreg32",
            AddressType::HoldingRegFloat => "holdingregfloat",
            AddressType::HoldingRegDouble => "holdingregdouble",
            AddressType::HoldingRegStr8 => "holdingregstr8",
            AddressType::HoldingRegStr16 => "holdingregstr16",
            AddressType::InputReg => "inputreg",
            AddressType::InputReg32 => "inputreg32",
            AddressType::InputRegFloat => "inputregfloat",
            AddressType::InputRegDouble => "inputregdouble",
            AddressType::InputRegStr8 => "inputregstr8",
            AddressType::InputRegStr16 => "inputregstr16",
            AddressType::SBusFlag => "sbusflag",
            AddressType::SBusInput => "sbusinput",
            AddressType::SBusOutput => "sbusoutput",
            AddressType::SBusReg => "sbusreg",
            AddressType::SBusRegStr => "sbusregstr",
        }
    }
}

impl std::fmt::Display for AddressType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown address type name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownAddressType(pub String);

impl std::error::Error for UnknownAddressType {}

impl std::fmt::Display for UnknownAddressType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown address type: {}", self.0)
    }
}

impl FromStr for AddressType {
    type Err = UnknownAddressType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AddressType::ALL
            .iter()
            .copied()
            .find(|x| x.name() == s)
            .ok_or_else(|| UnknownAddressType(s.to_string()))
    }
}

/// Anything that can be offered as a candidate address
pub trait AddressCandidate {
    /// integer value of the candidate, or `None` if it does not convert
    fn to_address(&self) -> Option<i64>;
}

impl AddressCandidate for str {
    fn to_address(&self) -> Option<i64> {
        self.trim().parse().ok()
    }
}

impl AddressCandidate for String {
    fn to_address(&self) -> Option<i64> {
        self.as_str().to_address()
    }
}

macro_rules! impl_integer_candidate {
    ($($t:ty),*) => {
        $(
            impl AddressCandidate for $t {
                fn to_address(&self) -> Option<i64> {
                    i64::try_from(*self).ok()
                }
            }
        )*
    };
}

impl_integer_candidate!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

/// Outcome of validating a candidate address that converted to an integer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressCheck {
    /// true if `0 <= address <= max`
    pub in_range: bool,
    /// the converted address
    pub address: i64,
}

/// Maximum data table address, inclusive, of every basic address type
///
/// Fields missing from a deserialized document keep their default value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct AddressLimits {
    /// maximum coil address
    pub coil: u32,
    /// maximum discrete input address
    pub discrete: u32,
    /// maximum holding register address
    pub holdingreg: u32,
    /// maximum input register address
    pub inputreg: u32,
    /// maximum SBus flag address
    pub sbusflag: u32,
    /// maximum SBus input address
    pub sbusinput: u32,
    /// maximum SBus output address
    pub sbusoutput: u32,
    /// maximum SBus register address
    pub sbusreg: u32,
    /// maximum SBus string register address
    pub sbusregstr: u32,
}

impl Default for AddressLimits {
    fn default() -> Self {
        Self {
            coil: 65535,
            discrete: 65535,
            holdingreg: 1_048_575,
            inputreg: 65535,
            sbusflag: 65535,
            sbusinput: 65535,
            sbusoutput: 65535,
            sbusreg: 65535,
            sbusregstr: 65535,
        }
    }
}

impl AddressLimits {
    /// Maximum address of a type, extended types inheriting from their basic type
    pub fn max(&self, address_type: AddressType) -> u32 {
        match address_type.basic() {
            AddressType::Coil => self.coil,
            AddressType::Discrete => self.discrete,
            AddressType::HoldingReg => self.holdingreg,
            AddressType::InputReg => self.inputreg,
            AddressType::SBusFlag => self.sbusflag,
            AddressType::SBusInput => self.sbusinput,
            AddressType::SBusOutput => self.sbusoutput,
            AddressType::SBusReg => self.sbusreg,
            _ => self.sbusregstr,
        }
    }

    /// Convert a candidate and check it against the maximum of its type
    ///
    /// `None` means the candidate is not an integer.
    pub fn validate<C>(&self, address_type: AddressType, candidate: &C) -> Option<AddressCheck>
    where
        C: AddressCandidate + ?Sized,
    {
        let address = candidate.to_address()?;
        Some(AddressCheck {
            in_range: 0 <= address && address <= self.max(address_type) as i64,
            address,
        })
    }

    /// Check that every address of a range lies within the type's maximum
    pub fn check_range(
        &self,
        address_type: AddressType,
        start: u32,
        count: usize,
    ) -> Result<(), AddressError> {
        if count == 0 {
            return Err(AddressError::CountOfZero);
        }
        let max = self.max(address_type);
        let last = start as u64 + (count as u64 - 1);
        if last > max as u64 {
            return Err(AddressError::OutOfRange { start, count, max });
        }
        Ok(())
    }

    pub(crate) fn check(
        &self,
        address_type: AddressType,
        range: AddressRange,
    ) -> Result<(), AddressError> {
        self.check_range(address_type, range.start, range.count as usize)
    }
}
