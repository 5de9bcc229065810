use crate::error::{AddressError, AduParseError};

/// Modbus unit identifier, just a type-safe wrapper around `u8`
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Ord, Eq, Hash)]
pub struct UnitId {
    /// underlying raw value
    pub value: u8,
}

impl UnitId {
    /// Create a new UnitId
    pub fn new(value: u8) -> Self {
        Self { value }
    }
}

/// Create the default UnitId of `0xFF`
impl Default for UnitId {
    fn default() -> Self {
        Self { value: 0xFF }
    }
}

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#04X}", self.value)
    }
}

/// Start and count tuple addressing consecutive cells of one type
///
/// Addresses are data table addresses and may exceed the 16-bit range of Modbus/TCP.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressRange {
    /// Starting address of the range
    pub start: u32,
    /// Count of elements in the range
    pub count: u16,
}

impl AddressRange {
    /// Create a new address range, rejecting a count of zero
    pub fn try_from(start: u32, count: u16) -> Result<Self, AddressError> {
        if count == 0 {
            return Err(AddressError::CountOfZero);
        }
        Ok(Self { start, count })
    }

    /// Last address of the range, computed without overflow
    pub fn last(self) -> u64 {
        self.start as u64 + (self.count as u64).saturating_sub(1)
    }
}

impl std::fmt::Display for AddressRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "start: {:#06X} qty: {}", self.start, self.count)
    }
}

/// Value and its address
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Indexed<T> {
    /// Address of the value
    pub index: u32,
    /// Associated value
    pub value: T,
}

impl<T> Indexed<T> {
    /// Create a new indexed value
    pub fn new(index: u32, value: T) -> Self {
        Indexed { index, value }
    }
}

impl<T> From<(u32, T)> for Indexed<T> {
    fn from((index, value): (u32, T)) -> Self {
        Self::new(index, value)
    }
}

impl std::fmt::Display for Indexed<bool> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "idx: {:#06X} value: {}", self.index, self.value as i32)
    }
}

impl std::fmt::Display for Indexed<u16> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "idx: {:#06X} value: {:#06X}", self.index, self.value)
    }
}

pub(crate) fn coil_from_u16(value: u16) -> Result<bool, AduParseError> {
    match value {
        crate::constants::coil::ON => Ok(true),
        crate::constants::coil::OFF => Ok(false),
        _ => Err(AduParseError::UnknownCoilState(value)),
    }
}

pub(crate) fn coil_to_u16(value: bool) -> u16 {
    if value {
        crate::constants::coil::ON
    } else {
        crate::constants::coil::OFF
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_count_zero_fails_validation() {
        assert_eq!(AddressRange::try_from(0, 0), Err(AddressError::CountOfZero));
    }

    #[test]
    fn ranges_may_extend_past_sixteen_bits() {
        let range = AddressRange::try_from(1_048_570, 6).unwrap();
        assert_eq!(range.last(), 1_048_575);
    }

    #[test]
    fn coil_values_are_strict() {
        assert_eq!(coil_from_u16(0xFF00), Ok(true));
        assert_eq!(coil_from_u16(0x0000), Ok(false));
        assert_eq!(
            coil_from_u16(0x00FF),
            Err(AduParseError::UnknownCoilState(0x00FF))
        );
        assert_eq!(coil_to_u16(true), 0xFF00);
    }
}
