use crate::error::{AddressError, ConversionError, ValueError};
use crate::table::{Word, WordAccess};

/// What a setter does with a value that cannot be converted to the cell format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum ConversionPolicy {
    /// store zero in place of the value and log a warning
    #[default]
    StoreZero,
    /// leave the table untouched and return [`ConversionError`]
    Reject,
}

/// Reads and writes wider values over consecutive word cells
///
/// A value spans `value bits / cell bits` cells (at least one), stored low-order
/// cell first. Every get or set is a single range operation on the table, so a
/// concurrent reader sees either the old or the new value.
#[derive(Debug)]
pub struct ExtendedCodec<'a, A: WordAccess + ?Sized> {
    table: &'a A,
    policy: ConversionPolicy,
}

impl<'a, A: WordAccess + ?Sized> Clone for ExtendedCodec<'a, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, A: WordAccess + ?Sized> Copy for ExtendedCodec<'a, A> {}

fn cells_for<W: Word>(bits: u32) -> usize {
    (bits / W::BITS).max(1) as usize
}

impl<'a, A: WordAccess + ?Sized> ExtendedCodec<'a, A> {
    /// codec over `table` using [`ConversionPolicy::StoreZero`]
    pub fn new(table: &'a A) -> Self {
        Self {
            table,
            policy: ConversionPolicy::default(),
        }
    }

    /// replace the conversion policy
    pub fn with_policy(self, policy: ConversionPolicy) -> Self {
        Self { policy, ..self }
    }

    /// current conversion policy
    pub fn policy(&self) -> ConversionPolicy {
        self.policy
    }

    fn read_bits(&self, addr: u32, bits: u32) -> Result<u64, AddressError> {
        let count = cells_for::<A::Cell>(bits);
        let cells = self.table.get_word_range(addr, count)?;
        let value = cells
            .iter()
            .enumerate()
            .fold(0u64, |acc, (i, cell)| {
                acc | (cell.to_bits() << (i as u32 * A::Cell::BITS))
            });
        Ok(value)
    }

    fn write_bits(&self, addr: u32, bits: u32, value: u64) -> Result<(), AddressError> {
        let count = cells_for::<A::Cell>(bits);
        let cells: Vec<A::Cell> = (0..count)
            .map(|i| A::Cell::from_bits_truncate(value >> (i as u32 * A::Cell::BITS)))
            .collect();
        self.table.set_word_range(addr, count, &cells)
    }

    /// signed 32-bit integer
    pub fn get_int32(&self, addr: u32) -> Result<i32, AddressError> {
        Ok(self.read_bits(addr, 32)? as u32 as i32)
    }

    /// signed 32-bit integer
    pub fn set_int32(&self, addr: u32, value: i32) -> Result<(), AddressError> {
        self.write_bits(addr, 32, value as u32 as u64)
    }

    /// IEEE-754 single precision
    pub fn get_float32(&self, addr: u32) -> Result<f32, AddressError> {
        Ok(f32::from_bits(self.read_bits(addr, 32)? as u32))
    }

    /// IEEE-754 single precision
    ///
    /// NaN and infinities are stored as such. A finite value whose magnitude
    /// exceeds `f32::MAX` is handled by the [`ConversionPolicy`].
    pub fn set_float32(&self, addr: u32, value: f64) -> Result<(), ValueError> {
        let converted = if value.is_finite() && value.abs() > f32::MAX as f64 {
            match self.policy {
                ConversionPolicy::Reject => {
                    return Err(ConversionError::FloatOutOfRange(value).into())
                }
                ConversionPolicy::StoreZero => {
                    tracing::warn!("float {} at {} cannot be stored as f32, storing 0", value, addr);
                    0.0
                }
            }
        } else {
            value as f32
        };
        self.write_bits(addr, 32, converted.to_bits() as u64)?;
        Ok(())
    }

    /// IEEE-754 double precision
    pub fn get_float64(&self, addr: u32) -> Result<f64, AddressError> {
        Ok(f64::from_bits(self.read_bits(addr, 64)?))
    }

    /// IEEE-754 double precision
    pub fn set_float64(&self, addr: u32, value: f64) -> Result<(), AddressError> {
        self.write_bits(addr, 64, value.to_bits())
    }

    /// `length` characters stored one per cell, low 8 bits of each cell
    pub fn get_string(&self, addr: u32, length: usize) -> Result<Vec<u8>, AddressError> {
        if length == 0 {
            return Ok(Vec::new());
        }
        let cells = self.table.get_word_range(addr, length)?;
        Ok(cells.iter().map(|c| (c.to_bits() & 0xFF) as u8).collect())
    }

    /// store `text` one character per cell, null padded or truncated to `length`
    pub fn set_string(&self, addr: u32, length: usize, text: impl AsRef<[u8]>) -> Result<(), AddressError> {
        if length == 0 {
            return Ok(());
        }
        let cells: Vec<A::Cell> = fit(text.as_ref(), length)
            .map(|c| A::Cell::from_bits_truncate(c as u64))
            .collect();
        self.table.set_word_range(addr, length, &cells)
    }

    /// `length` characters packed two per cell, first character in the upper byte
    pub fn get_string_packed(&self, addr: u32, length: usize) -> Result<Vec<u8>, AddressError> {
        if length == 0 {
            return Ok(Vec::new());
        }
        let cells = self.table.get_word_range(addr, (length + 1) / 2)?;
        let mut text: Vec<u8> = cells
            .iter()
            .flat_map(|c| (c.to_bits() as u16).to_be_bytes())
            .collect();
        text.truncate(length);
        Ok(text)
    }

    /// store `text` two characters per cell, null padded or truncated to `length`
    pub fn set_string_packed(
        &self,
        addr: u32,
        length: usize,
        text: impl AsRef<[u8]>,
    ) -> Result<(), AddressError> {
        if length == 0 {
            return Ok(());
        }
        let bytes: Vec<u8> = fit(text.as_ref(), length).collect();
        let cells: Vec<A::Cell> = bytes
            .chunks(2)
            .map(|pair| {
                let high = pair[0];
                let low = pair.get(1).copied().unwrap_or(0);
                A::Cell::from_bits_truncate(u16::from_be_bytes([high, low]) as u64)
            })
            .collect();
        self.table.set_word_range(addr, cells.len(), &cells)
    }
}

fn fit(text: &[u8], length: usize) -> impl Iterator<Item = u8> + '_ {
    text.iter().copied().chain(std::iter::repeat(0)).take(length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::DataTable;

    #[test]
    fn float32_round_trip_is_exact() {
        let modbus = DataTable::<u16>::new(0, 15);
        modbus.extended().set_float32(4, 3.5).unwrap();
        assert_eq!(modbus.extended().get_float32(4), Ok(3.5));

        let sbus = DataTable::<u32>::new(0, 15);
        sbus.extended().set_float32(4, 3.5).unwrap();
        assert_eq!(sbus.extended().get_float32(4), Ok(3.5));
        assert_eq!(sbus.get_word(4), Ok(3.5f32.to_bits()));
    }

    #[test]
    fn float32_spans_two_modbus_registers_low_word_first() {
        let table = DataTable::<u16>::new(0, 15);
        table.extended().set_float32(0, 3.5).unwrap();
        let bits = 3.5f32.to_bits();
        assert_eq!(
            table.get_word_range(0, 3).unwrap(),
            vec![bits as u16, (bits >> 16) as u16, 0]
        );
    }

    #[test]
    fn float64_cell_counts_follow_the_cell_width() {
        let modbus = DataTable::<u16>::new(0, 15);
        modbus.extended().set_float64(0, -1.25e300).unwrap();
        assert_eq!(modbus.extended().get_float64(0), Ok(-1.25e300));
        assert_eq!(modbus.get_word(4), Ok(0));
        assert_ne!(modbus.get_word(3), Ok(0));

        let sbus = DataTable::<u32>::new(0, 15);
        sbus.extended().set_float64(0, -1.25e300).unwrap();
        assert_eq!(sbus.extended().get_float64(0), Ok(-1.25e300));
        assert_eq!(sbus.get_word(2), Ok(0));
    }

    #[test]
    fn float64_needs_every_cell_in_range() {
        let table = DataTable::<u16>::new(0, 15);
        assert!(table.extended().set_float64(13, 1.0).is_err());
        assert_eq!(table.get_word_range(13, 3).unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn int32_preserves_sign() {
        let table = DataTable::<u16>::new(0, 15);
        table.extended().set_int32(2, -123_456).unwrap();
        assert_eq!(table.extended().get_int32(2), Ok(-123_456));
    }

    #[test]
    fn non_finite_floats_convert_normally() {
        let table = DataTable::<u16>::new(0, 15);
        let codec = table.extended().with_policy(ConversionPolicy::Reject);
        codec.set_float32(0, f64::INFINITY).unwrap();
        assert_eq!(codec.get_float32(0), Ok(f32::INFINITY));
        codec.set_float32(0, f64::NAN).unwrap();
        assert!(codec.get_float32(0).unwrap().is_nan());
    }

    #[test]
    fn out_of_range_float_stores_zero_by_default() {
        let table = DataTable::<u16>::new(0, 15);
        table.set_word_range(0, 2, &[0xFFFF, 0xFFFF]).unwrap();
        table.extended().set_float32(0, 1e39).unwrap();
        assert_eq!(table.extended().get_float32(0), Ok(0.0));
    }

    #[test]
    fn out_of_range_float_can_be_rejected() {
        let table = DataTable::<u16>::new(0, 15);
        let codec = table.extended().with_policy(ConversionPolicy::Reject);
        codec.set_float32(0, 2.5).unwrap();
        assert_eq!(
            codec.set_float32(0, -1e39),
            Err(ValueError::Conversion(ConversionError::FloatOutOfRange(-1e39)))
        );
        assert_eq!(codec.get_float32(0), Ok(2.5));
    }

    #[test]
    fn strings_are_padded_and_truncated() {
        let table = DataTable::<u16>::new(0, 31);
        let codec = table.extended();
        codec.set_string(0, 8, "hi").unwrap();
        assert_eq!(codec.get_string(0, 8).unwrap(), b"hi\0\0\0\0\0\0".to_vec());
        codec.set_string(10, 2, "hello").unwrap();
        assert_eq!(codec.get_string(10, 2).unwrap(), b"he".to_vec());
        assert_eq!(table.get_word(12), Ok(0));
    }

    #[test]
    fn string_reads_mask_each_cell_to_eight_bits() {
        let table = DataTable::<u32>::new(0, 3);
        table.set_word_range(0, 2, &[0x1234_5641, 0x142]).unwrap();
        assert_eq!(table.extended().get_string(0, 2).unwrap(), b"AB".to_vec());
    }

    #[test]
    fn packed_strings_put_the_first_character_in_the_upper_byte() {
        let table = DataTable::<u16>::new(0, 15);
        let codec = table.extended();
        codec.set_string_packed(0, 5, "abcdefg").unwrap();
        assert_eq!(
            table.get_word_range(0, 4).unwrap(),
            vec![0x6162, 0x6364, 0x6500, 0]
        );
        assert_eq!(codec.get_string_packed(0, 5).unwrap(), b"abcde".to_vec());
        assert_eq!(codec.get_string_packed(0, 6).unwrap(), b"abcde\0".to_vec());
    }

    #[test]
    fn concurrent_float64_access_never_observes_a_mix_of_writes() {
        const FIRST: f64 = 1.000_000_000_000_2;
        const SECOND: f64 = -98_765.432_1e-200;

        let table = DataTable::<u16>::new(0, 7);
        table.extended().set_float64(0, FIRST).unwrap();

        std::thread::scope(|scope| {
            for value in [FIRST, SECOND] {
                let table = &table;
                scope.spawn(move || {
                    for _ in 0..20_000 {
                        table.extended().set_float64(0, value).unwrap();
                    }
                });
            }

            let table = &table;
            scope.spawn(move || {
                for _ in 0..20_000 {
                    let value = table.extended().get_float64(0).unwrap();
                    assert!(value == FIRST || value == SECOND, "observed {value}");
                }
            });
        });
    }
}
