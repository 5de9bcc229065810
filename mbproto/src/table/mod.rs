//! Concurrently accessed bit and word storage

use std::sync::Arc;

use parking_lot::RwLock;

use crate::address::{AddressLimits, AddressType};
use crate::error::AddressError;

pub(crate) mod extended;

pub use extended::*;

/// An unsigned cell of a word table
pub trait Word: Copy + Default + Send + Sync + PartialEq + std::fmt::Debug + 'static {
    /// width of the cell in bits
    const BITS: u32;

    /// keep the low `BITS` bits of `value`
    fn from_bits_truncate(value: u64) -> Self;

    /// widen the cell to a u64
    fn to_bits(self) -> u64;
}

impl Word for u16 {
    const BITS: u32 = 16;

    fn from_bits_truncate(value: u64) -> Self {
        value as u16
    }

    fn to_bits(self) -> u64 {
        self as u64
    }
}

impl Word for u32 {
    const BITS: u32 = 32;

    fn from_bits_truncate(value: u64) -> Self {
        value as u32
    }

    fn to_bits(self) -> u64 {
        self as u64
    }
}

/// Range access to single bit cells
///
/// Each call is atomic with respect to every other range call on the same storage.
pub trait BitAccess {
    /// read `count` bits starting at `addr`
    fn get_bool_range(&self, addr: u32, count: usize) -> Result<Vec<bool>, AddressError>;

    /// write `count` bits starting at `addr`, `values.len()` must equal `count`
    fn set_bool_range(&self, addr: u32, count: usize, values: &[bool]) -> Result<(), AddressError>;
}

/// Range access to word cells
///
/// Each call is atomic with respect to every other range call on the same storage.
pub trait WordAccess {
    /// width of a cell
    type Cell: Word;

    /// read `count` cells starting at `addr`
    fn get_word_range(&self, addr: u32, count: usize) -> Result<Vec<Self::Cell>, AddressError>;

    /// write `count` cells starting at `addr`, `values.len()` must equal `count`
    fn set_word_range(
        &self,
        addr: u32,
        count: usize,
        values: &[Self::Cell],
    ) -> Result<(), AddressError>;
}

/// A bit table and a word table, both zero until written
///
/// Addresses run from zero to the inclusive maximum given at construction.
pub struct DataTable<W: Word> {
    bits: RwLock<Vec<bool>>,
    words: RwLock<Vec<W>>,
}

impl<W: Word> std::fmt::Debug for DataTable<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataTable")
            .field("bit_max", &self.bit_max())
            .field("word_max", &self.word_max())
            .field("cell_bits", &W::BITS)
            .finish()
    }
}

fn checked_range(
    addr: u32,
    count: usize,
    len: usize,
) -> Result<std::ops::Range<usize>, AddressError> {
    if count == 0 {
        return Err(AddressError::CountOfZero);
    }
    let start = addr as usize;
    match start.checked_add(count) {
        Some(end) if end <= len => Ok(start..end),
        _ => Err(AddressError::OutOfRange {
            start: addr,
            count,
            max: len.saturating_sub(1) as u32,
        }),
    }
}

fn check_values(count: usize, len: usize) -> Result<(), AddressError> {
    if count != len {
        return Err(AddressError::CountMismatch(count, len));
    }
    Ok(())
}

impl<W: Word> DataTable<W> {
    /// Create a table addressing bits `0..=bit_max` and words `0..=word_max`
    pub fn new(bit_max: u32, word_max: u32) -> Self {
        Self {
            bits: RwLock::new(vec![false; bit_max as usize + 1]),
            words: RwLock::new(vec![W::default(); word_max as usize + 1]),
        }
    }

    /// maximum bit address
    pub fn bit_max(&self) -> u32 {
        self.bits.read().len().saturating_sub(1) as u32
    }

    /// maximum word address
    pub fn word_max(&self) -> u32 {
        self.words.read().len().saturating_sub(1) as u32
    }

    /// read one bit
    pub fn get_bool(&self, addr: u32) -> Result<bool, AddressError> {
        let bits = self.bits.read();
        let range = checked_range(addr, 1, bits.len())?;
        Ok(bits[range.start])
    }

    /// write one bit
    pub fn set_bool(&self, addr: u32, value: bool) -> Result<(), AddressError> {
        let mut bits = self.bits.write();
        let range = checked_range(addr, 1, bits.len())?;
        bits[range.start] = value;
        Ok(())
    }

    /// read one word
    pub fn get_word(&self, addr: u32) -> Result<W, AddressError> {
        let words = self.words.read();
        let range = checked_range(addr, 1, words.len())?;
        Ok(words[range.start])
    }

    /// write one word, masking the value to the cell width
    pub fn set_word(&self, addr: u32, value: impl Into<u64>) -> Result<(), AddressError> {
        let mut words = self.words.write();
        let range = checked_range(addr, 1, words.len())?;
        words[range.start] = W::from_bits_truncate(value.into());
        Ok(())
    }

    /// read `count` bits starting at `addr`
    pub fn get_bool_range(&self, addr: u32, count: usize) -> Result<Vec<bool>, AddressError> {
        let bits = self.bits.read();
        let range = checked_range(addr, count, bits.len())?;
        Ok(bits[range].to_vec())
    }

    /// write `count` bits starting at `addr`
    pub fn set_bool_range(
        &self,
        addr: u32,
        count: usize,
        values: &[bool],
    ) -> Result<(), AddressError> {
        check_values(count, values.len())?;
        let mut bits = self.bits.write();
        let range = checked_range(addr, count, bits.len())?;
        bits[range].copy_from_slice(values);
        Ok(())
    }

    /// read `count` words starting at `addr`
    pub fn get_word_range(&self, addr: u32, count: usize) -> Result<Vec<W>, AddressError> {
        let words = self.words.read();
        let range = checked_range(addr, count, words.len())?;
        Ok(words[range].to_vec())
    }

    /// write `count` words starting at `addr`
    pub fn set_word_range(&self, addr: u32, count: usize, values: &[W]) -> Result<(), AddressError> {
        check_values(count, values.len())?;
        let mut words = self.words.write();
        let range = checked_range(addr, count, words.len())?;
        words[range].copy_from_slice(values);
        Ok(())
    }

    /// extended value access over the word table
    pub fn extended(&self) -> ExtendedCodec<'_, Self> {
        ExtendedCodec::new(self)
    }
}

impl<W: Word> BitAccess for DataTable<W> {
    fn get_bool_range(&self, addr: u32, count: usize) -> Result<Vec<bool>, AddressError> {
        DataTable::get_bool_range(self, addr, count)
    }

    fn set_bool_range(&self, addr: u32, count: usize, values: &[bool]) -> Result<(), AddressError> {
        DataTable::set_bool_range(self, addr, count, values)
    }
}

impl<W: Word> WordAccess for DataTable<W> {
    type Cell = W;

    fn get_word_range(&self, addr: u32, count: usize) -> Result<Vec<W>, AddressError> {
        DataTable::get_word_range(self, addr, count)
    }

    fn set_word_range(&self, addr: u32, count: usize, values: &[W]) -> Result<(), AddressError> {
        DataTable::set_word_range(self, addr, count, values)
    }
}

/// The Modbus memory map shared by every session
///
/// The *outputs* table holds coils and holding registers, the *inputs* table
/// holds discrete inputs and input registers. Cloning is cheap and every clone
/// refers to the same storage.
#[derive(Clone, Debug)]
pub struct ModbusMemory {
    outputs: Arc<DataTable<u16>>,
    inputs: Arc<DataTable<u16>>,
    unified: bool,
}

impl ModbusMemory {
    /// separate tables for outputs and inputs, sized from the limits
    pub fn new(limits: &AddressLimits) -> Self {
        Self {
            outputs: Arc::new(DataTable::new(limits.coil, limits.holdingreg)),
            inputs: Arc::new(DataTable::new(limits.discrete, limits.inputreg)),
            unified: false,
        }
    }

    /// one table shared by outputs and inputs, so coil N is also discrete input N
    /// and holding register N is also input register N
    pub fn unified(limits: &AddressLimits) -> Self {
        let table = Arc::new(DataTable::new(
            limits.coil.max(limits.discrete),
            limits.holdingreg.max(limits.inputreg),
        ));
        Self {
            outputs: table.clone(),
            inputs: table,
            unified: true,
        }
    }

    /// true if outputs and inputs share storage
    pub fn is_unified(&self) -> bool {
        self.unified
    }

    /// coils and holding registers
    pub fn outputs(&self) -> &DataTable<u16> {
        &self.outputs
    }

    /// discrete inputs and input registers
    pub fn inputs(&self) -> &DataTable<u16> {
        &self.inputs
    }

    /// The table holding the cells of an address type, `None` for SBus types
    pub fn table_for(&self, address_type: AddressType) -> Option<&DataTable<u16>> {
        match address_type.basic() {
            AddressType::Coil | AddressType::HoldingReg => Some(self.outputs()),
            AddressType::Discrete | AddressType::InputReg => Some(self.inputs()),
            _ => None,
        }
    }

    /// extended values over holding registers
    pub fn holding_registers(&self) -> ExtendedCodec<'_, DataTable<u16>> {
        ExtendedCodec::new(self.outputs())
    }

    /// extended values over input registers
    pub fn input_registers(&self) -> ExtendedCodec<'_, DataTable<u16>> {
        ExtendedCodec::new(self.inputs())
    }
}

/// The SBus memory map shared by every session
///
/// Flags, inputs and outputs share the bit table. Registers are 32 bits wide.
#[derive(Clone, Debug)]
pub struct SBusMemory {
    table: Arc<DataTable<u32>>,
}

impl SBusMemory {
    /// create the tables sized from the limits
    pub fn new(limits: &AddressLimits) -> Self {
        let bit_max = limits.sbusflag.max(limits.sbusinput).max(limits.sbusoutput);
        let word_max = limits.sbusreg.max(limits.sbusregstr);
        Self {
            table: Arc::new(DataTable::new(bit_max, word_max)),
        }
    }

    /// the underlying table
    pub fn table(&self) -> &DataTable<u32> {
        &self.table
    }

    /// extended values over registers
    pub fn registers(&self) -> ExtendedCodec<'_, DataTable<u32>> {
        ExtendedCodec::new(self.table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_zero_until_written() {
        let table = DataTable::<u16>::new(15, 15);
        assert_eq!(table.get_bool_range(0, 16).unwrap(), vec![false; 16]);
        assert_eq!(table.get_word_range(0, 16).unwrap(), vec![0u16; 16]);
    }

    #[test]
    fn range_round_trip() {
        let table = DataTable::<u16>::new(15, 15);
        table.set_bool_range(3, 3, &[true, false, true]).unwrap();
        assert_eq!(table.get_bool_range(2, 5).unwrap(), vec![false, true, false, true, false]);
        table.set_word_range(14, 2, &[0xCAFE, 0xBEEF]).unwrap();
        assert_eq!(table.get_word(15), Ok(0xBEEF));
    }

    #[test]
    fn words_are_masked_to_the_cell_width() {
        let modbus = DataTable::<u16>::new(0, 0);
        modbus.set_word(0, 0x1_2345u32).unwrap();
        assert_eq!(modbus.get_word(0), Ok(0x2345));

        let sbus = DataTable::<u32>::new(0, 0);
        sbus.set_word(0, 0x1_2345_6789u64).unwrap();
        assert_eq!(sbus.get_word(0), Ok(0x2345_6789));
    }

    #[test]
    fn out_of_range_access_is_an_error() {
        let table = DataTable::<u16>::new(9, 9);
        assert_eq!(
            table.get_bool_range(8, 3),
            Err(AddressError::OutOfRange {
                start: 8,
                count: 3,
                max: 9
            })
        );
        assert!(table.set_word(10, 1u16).is_err());
        assert!(table.get_word_range(u32::MAX, 2).is_err());
        // nothing was clamped into the table
        assert_eq!(table.get_word(9), Ok(0));
    }

    #[test]
    fn value_count_must_match() {
        let table = DataTable::<u16>::new(9, 9);
        assert_eq!(
            table.set_bool_range(0, 2, &[true]),
            Err(AddressError::CountMismatch(2, 1))
        );
        assert_eq!(
            table.set_word_range(0, 1, &[1, 2]),
            Err(AddressError::CountMismatch(1, 2))
        );
        assert_eq!(table.get_word_range(0, 0), Err(AddressError::CountOfZero));
    }

    #[test]
    fn separate_memory_keeps_inputs_and_outputs_apart() {
        let memory = ModbusMemory::new(&AddressLimits::default());
        memory.outputs().set_bool(7, true).unwrap();
        assert_eq!(memory.inputs().get_bool(7), Ok(false));
        assert_eq!(memory.outputs().word_max(), 1_048_575);
        assert_eq!(memory.inputs().word_max(), 65535);
    }

    #[test]
    fn unified_memory_shares_storage() {
        let memory = ModbusMemory::unified(&AddressLimits::default());
        assert!(memory.is_unified());
        memory.outputs().set_bool(7, true).unwrap();
        memory.outputs().set_word(3, 0x55u16).unwrap();
        assert_eq!(memory.inputs().get_bool(7), Ok(true));
        assert_eq!(
            memory.table_for(AddressType::InputReg).map(|t| t.get_word(3)),
            Some(Ok(0x55))
        );
    }

    #[test]
    fn clones_refer_to_the_same_memory() {
        let memory = ModbusMemory::new(&AddressLimits::default());
        let other = memory.clone();
        other.inputs().set_word(100, 42u16).unwrap();
        assert_eq!(memory.inputs().get_word(100), Ok(42));
        assert!(memory.table_for(AddressType::SBusReg).is_none());
    }

    #[test]
    fn sbus_flags_inputs_and_outputs_share_bits() {
        let memory = SBusMemory::new(&AddressLimits::default());
        memory.table().set_bool(12, true).unwrap();
        assert_eq!(memory.table().get_bool(12), Ok(true));
        memory.table().set_word(0, u32::MAX).unwrap();
        assert_eq!(memory.table().get_word(0), Ok(u32::MAX));
    }
}
