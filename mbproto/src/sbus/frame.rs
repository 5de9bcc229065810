use crc::{Crc, CRC_16_XMODEM};

use crate::common::cursor::{ReadCursor, WriteCursor};
use crate::error::{InternalError, SBusError};

// CCITT V.41, polynomial 0x1021 with a zero initializer
pub(crate) const CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

pub(crate) mod constants {
    /// length (4), version, protocol type, sequence (2), telegram attribute
    pub(crate) const HEADER_LENGTH: usize = 9;
    pub(crate) const CRC_LENGTH: usize = 2;
    pub(crate) const MIN_TELEGRAM_LENGTH: usize = HEADER_LENGTH + CRC_LENGTH;
    pub(crate) const MAX_TELEGRAM_LENGTH: usize = 255;
    /// header, station, command, count, address (2) and CRC
    pub(crate) const MIN_REQUEST_LENGTH: usize = 16;
}

/// Telegram attribute carried in every EtherSBus header
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelegramType {
    /// request from a client
    Request,
    /// reply carrying read data
    Response,
    /// acknowledgement of a write, or a NAK
    AckNak,
}

impl TelegramType {
    pub(crate) fn get_value(self) -> u8 {
        match self {
            TelegramType::Request => 0,
            TelegramType::Response => 1,
            TelegramType::AckNak => 2,
        }
    }

    pub(crate) fn get(value: u8) -> Option<Self> {
        match value {
            0 => Some(TelegramType::Request),
            1 => Some(TelegramType::Response),
            2 => Some(TelegramType::AckNak),
            _ => None,
        }
    }
}

/// The header fields of an EtherSBus telegram
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SBusHeader {
    /// echoed by the station in its reply
    pub sequence: u16,
    /// request, response or ack/nak
    pub telegram: TelegramType,
}

/// Validate length and CRC, then split a telegram into its header and the
/// bytes between the header and the CRC
pub(crate) fn parse_telegram(bytes: &[u8]) -> Result<(SBusHeader, &[u8]), SBusError> {
    if bytes.len() < constants::MIN_TELEGRAM_LENGTH || bytes.len() > constants::MAX_TELEGRAM_LENGTH
    {
        return Err(SBusError::BadLength(
            bytes.len(),
            constants::MIN_TELEGRAM_LENGTH,
            constants::MAX_TELEGRAM_LENGTH,
        ));
    }

    let (data, crc) = bytes.split_at(bytes.len() - constants::CRC_LENGTH);
    let received = u16::from_be_bytes([crc[0], crc[1]]);
    let computed = CRC.checksum(data);
    if received != computed {
        return Err(SBusError::CrcMismatch(received, computed));
    }

    let mut cursor = ReadCursor::new(data);
    let length = cursor.read_u32_be()? as usize;
    if length != bytes.len() {
        return Err(SBusError::LengthMismatch(length, bytes.len()));
    }
    let _version = cursor.read_u8()?;
    let _protocol_type = cursor.read_u8()?;
    let sequence = cursor.read_u16_be()?;
    let raw = cursor.read_u8()?;
    let telegram = TelegramType::get(raw).ok_or(SBusError::UnexpectedTelegram(raw))?;

    Ok((
        SBusHeader { sequence, telegram },
        &data[constants::HEADER_LENGTH..],
    ))
}

/// Writes EtherSBus telegrams into an owned buffer
pub(crate) struct SBusFormatter {
    buffer: [u8; constants::MAX_TELEGRAM_LENGTH],
}

impl SBusFormatter {
    pub(crate) fn new() -> Self {
        Self {
            buffer: [0; constants::MAX_TELEGRAM_LENGTH],
        }
    }

    /// Write the header, whatever `body` writes, and the CRC
    pub(crate) fn format<F>(&mut self, header: SBusHeader, body: F) -> Result<&[u8], InternalError>
    where
        F: FnOnce(&mut WriteCursor) -> Result<(), InternalError>,
    {
        let end_of_data = {
            let mut cursor = WriteCursor::new(self.buffer.as_mut());
            cursor.seek_from_current(4)?; // length is written afterwards
            cursor.write_u8(0)?; // version
            cursor.write_u8(0)?; // protocol type
            cursor.write_u16_be(header.sequence)?;
            cursor.write_u8(header.telegram.get_value())?;
            body(&mut cursor)?;

            let end = cursor.position();
            let total = end + constants::CRC_LENGTH;
            if total > constants::MAX_TELEGRAM_LENGTH {
                return Err(InternalError::InsufficientWriteSpace(
                    constants::CRC_LENGTH,
                    cursor.remaining(),
                ));
            }
            cursor.seek_from_start(0)?;
            cursor.write_u32_be(total as u32)?;
            end
        };

        let crc = CRC.checksum(&self.buffer[..end_of_data]);
        let total = end_of_data + constants::CRC_LENGTH;
        self.buffer[end_of_data..total].copy_from_slice(&crc.to_be_bytes());
        Ok(&self.buffer[..total])
    }
}
