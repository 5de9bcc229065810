use crate::exception::ExceptionCode;
use crate::message::{Request, ResponseData};
use crate::table::ModbusMemory;

/// Executes decoded requests
///
/// Implementations must be cheap to share between sessions. Each call runs
/// synchronously and must not block on I/O.
pub trait RequestHandler: Send + Sync + 'static {
    /// Perform the request and return the data for the reply
    fn handle(&self, request: &Request) -> Result<ResponseData, ExceptionCode>;
}

impl RequestHandler for ModbusMemory {
    fn handle(&self, request: &Request) -> Result<ResponseData, ExceptionCode> {
        let data = match request {
            Request::ReadCoils(range) => ResponseData::Bits(
                self.outputs()
                    .get_bool_range(range.start, range.count as usize)?,
            ),
            Request::ReadDiscreteInputs(range) => ResponseData::Bits(
                self.inputs()
                    .get_bool_range(range.start, range.count as usize)?,
            ),
            Request::ReadHoldingRegisters(range) => ResponseData::Registers(
                self.outputs()
                    .get_word_range(range.start, range.count as usize)?,
            ),
            Request::ReadInputRegisters(range) => ResponseData::Registers(
                self.inputs()
                    .get_word_range(range.start, range.count as usize)?,
            ),
            Request::WriteSingleCoil(x) => {
                self.outputs().set_bool(x.index, x.value)?;
                ResponseData::SingleCoil(*x)
            }
            Request::WriteSingleRegister(x) => {
                self.outputs().set_word(x.index, x.value)?;
                ResponseData::SingleRegister(*x)
            }
            Request::WriteMultipleCoils(x) => {
                self.outputs()
                    .set_bool_range(x.range.start, x.range.count as usize, &x.values)?;
                ResponseData::WriteMultiple(x.range)
            }
            Request::WriteMultipleRegisters(x) => {
                self.outputs()
                    .set_word_range(x.range.start, x.range.count as usize, &x.values)?;
                ResponseData::WriteMultiple(x.range)
            }
        };
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AddressLimits;
    use crate::message::WriteMultiple;
    use crate::types::{AddressRange, Indexed};

    fn memory() -> ModbusMemory {
        ModbusMemory::new(&AddressLimits {
            coil: 15,
            discrete: 15,
            holdingreg: 15,
            inputreg: 15,
            ..AddressLimits::default()
        })
    }

    #[test]
    fn writes_are_visible_to_reads() {
        let memory = memory();
        let write = Request::WriteMultipleRegisters(WriteMultiple::from(2, vec![7, 8]).unwrap());
        assert_eq!(
            memory.handle(&write),
            Ok(ResponseData::WriteMultiple(AddressRange { start: 2, count: 2 }))
        );
        let read = Request::ReadHoldingRegisters(AddressRange::try_from(1, 3).unwrap());
        assert_eq!(
            memory.handle(&read),
            Ok(ResponseData::Registers(vec![0, 7, 8]))
        );
        assert_eq!(
            memory.handle(&Request::WriteSingleCoil(Indexed::new(3, true))),
            Ok(ResponseData::SingleCoil(Indexed::new(3, true)))
        );
        let read = Request::ReadCoils(AddressRange::try_from(2, 2).unwrap());
        assert_eq!(
            memory.handle(&read),
            Ok(ResponseData::Bits(vec![false, true]))
        );
    }

    #[test]
    fn separate_tables_do_not_alias() {
        let memory = memory();
        memory
            .handle(&Request::WriteSingleCoil(Indexed::new(0, true)))
            .unwrap();
        let read = Request::ReadDiscreteInputs(AddressRange::try_from(0, 1).unwrap());
        assert_eq!(memory.handle(&read), Ok(ResponseData::Bits(vec![false])));
    }

    #[test]
    fn unified_tables_alias_outputs_and_inputs() {
        let memory = ModbusMemory::unified(&AddressLimits::default());
        memory
            .handle(&Request::WriteSingleRegister(Indexed::new(9, 0xABCD)))
            .unwrap();
        let read = Request::ReadInputRegisters(AddressRange::try_from(9, 1).unwrap());
        assert_eq!(
            memory.handle(&read),
            Ok(ResponseData::Registers(vec![0xABCD]))
        );
    }

    #[test]
    fn out_of_range_access_is_illegal_data_address() {
        let memory = memory();
        let read = Request::ReadInputRegisters(AddressRange::try_from(15, 2).unwrap());
        assert_eq!(
            memory.handle(&read),
            Err(ExceptionCode::IllegalDataAddress)
        );
    }
}
