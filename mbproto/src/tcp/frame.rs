use tokio::io::{AsyncRead, AsyncWrite};

use crate::common::buffer::ReadBuffer;
use crate::common::cursor::{ReadCursor, WriteCursor};
use crate::common::phys::{format_bytes, PhysLayer};
use crate::decode::FrameDecodeLevel;
use crate::error::{FrameParseError, InternalError, RequestError};
use crate::types::UnitId;

pub(crate) mod constants {
    pub(crate) const HEADER_LENGTH: usize = 7;
    pub(crate) const MAX_ADU_LENGTH: usize = 253;
    pub(crate) const MAX_FRAME_LENGTH: usize = HEADER_LENGTH + MAX_ADU_LENGTH;
    // includes the 1 byte unit id
    pub(crate) const MAX_LENGTH_FIELD: usize = MAX_ADU_LENGTH + 1;
    // header plus the function code
    pub(crate) const MIN_FRAME_LENGTH: usize = HEADER_LENGTH + 1;
}

/// Transaction identifier carried in the MBAP header
#[derive(PartialEq, Eq, Copy, Clone, Debug, Default, Hash)]
pub struct TxId {
    value: u16,
}

impl TxId {
    /// wrap a raw value
    pub fn new(value: u16) -> Self {
        TxId { value }
    }

    /// raw value
    pub fn to_u16(self) -> u16 {
        self.value
    }

    /// return the current id and advance, wrapping at u16::MAX
    pub fn next(&mut self) -> TxId {
        let ret = *self;
        self.value = self.value.wrapping_add(1);
        ret
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06X}", self.value)
    }
}

/// The MBAP fields that are echoed from request to response
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MbapHeader {
    /// transaction id
    pub tx_id: TxId,
    /// unit id
    pub unit_id: UnitId,
}

impl MbapHeader {
    /// create a header from its fields
    pub fn new(tx_id: TxId, unit_id: UnitId) -> Self {
        Self { tx_id, unit_id }
    }
}

impl std::fmt::Display for MbapHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tx_id: {} unit: {}", self.tx_id, self.unit_id)
    }
}

#[derive(Copy, Clone)]
struct RawHeader {
    header: MbapHeader,
    protocol_id: u16,
    length: usize,
}

fn parse_header(bytes: &[u8]) -> Result<RawHeader, FrameParseError> {
    let mut cursor = ReadCursor::new(bytes);
    let too_short = |_| FrameParseError::TooShort(bytes.len(), constants::MIN_FRAME_LENGTH);
    let tx_id = cursor.read_u16_be().map_err(too_short)?;
    let protocol_id = cursor.read_u16_be().map_err(too_short)?;
    let length = cursor.read_u16_be().map_err(too_short)? as usize;
    let unit_id = cursor.read_u8().map_err(too_short)?;

    Ok(RawHeader {
        header: MbapHeader::new(TxId::new(tx_id), UnitId::new(unit_id)),
        protocol_id,
        length,
    })
}

fn check_length(length: usize) -> Result<(), FrameParseError> {
    // the 1-byte unit identifier counts towards length
    if length == 0 {
        return Err(FrameParseError::MbapLengthZero);
    }

    if length > constants::MAX_LENGTH_FIELD {
        return Err(FrameParseError::MbapLengthTooBig(
            length,
            constants::MAX_LENGTH_FIELD,
        ));
    }

    Ok(())
}

/// Split a complete frame into its header and PDU (function code and body)
pub(crate) fn parse_frame(frame: &[u8]) -> Result<(MbapHeader, &[u8]), FrameParseError> {
    if frame.len() < constants::MIN_FRAME_LENGTH {
        return Err(FrameParseError::TooShort(
            frame.len(),
            constants::MIN_FRAME_LENGTH,
        ));
    }

    let raw = parse_header(frame)?;
    check_length(raw.length)?;

    if raw.protocol_id != 0 {
        return Err(FrameParseError::UnknownProtocolId(raw.protocol_id));
    }

    let actual = frame.len() - (constants::HEADER_LENGTH - 1);
    if raw.length != actual {
        return Err(FrameParseError::LengthMismatch(raw.length, actual));
    }

    Ok((raw.header, &frame[constants::HEADER_LENGTH..]))
}

/// A complete MBAP frame read off a stream
pub(crate) struct Frame {
    length: usize,
    bytes: [u8; constants::MAX_FRAME_LENGTH],
}

impl Frame {
    fn new() -> Self {
        Self {
            length: 0,
            bytes: [0; constants::MAX_FRAME_LENGTH],
        }
    }

    fn set(&mut self, src: &[u8]) -> bool {
        match self.bytes.get_mut(0..src.len()) {
            Some(dest) => {
                dest.copy_from_slice(src);
                self.length = src.len();
                true
            }
            None => false,
        }
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes[..self.length]
    }
}

#[derive(Copy, Clone)]
enum ParseState {
    Begin,
    // body of an oversized frame still to be dropped
    Discard { remaining: usize, length: usize },
}

/// Reads MBAP frames off a stream
///
/// Received bytes and the parse state live here rather than in the read
/// future, so `next_frame` may be cancelled and called again without losing
/// alignment.
pub(crate) struct FramedReader {
    level: FrameDecodeLevel,
    buffer: ReadBuffer,
    state: ParseState,
}

impl FramedReader {
    pub(crate) fn new(level: FrameDecodeLevel) -> Self {
        Self {
            level,
            buffer: ReadBuffer::new(constants::MAX_FRAME_LENGTH),
            state: ParseState::Begin,
        }
    }

    pub(crate) fn set_level(&mut self, level: FrameDecodeLevel) {
        self.level = level;
    }

    /// Read the next frame off the stream
    ///
    /// Frames with a non-zero protocol id or a length field above the maximum
    /// are consumed and reported as `BadFrame` so the stream stays aligned.
    /// A length field of zero leaves the stream unframeable.
    pub(crate) async fn next_frame<T>(&mut self, io: &mut PhysLayer<T>) -> Result<Frame, RequestError>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            match self.parse()? {
                Some(frame) => return Ok(frame),
                None => {
                    self.buffer.read_some(io).await?;
                }
            }
        }
    }

    fn parse(&mut self) -> Result<Option<Frame>, RequestError> {
        match self.state {
            ParseState::Discard { remaining, length } => {
                let count = remaining.min(self.buffer.len());
                self.buffer.read(count)?;
                if count < remaining {
                    self.state = ParseState::Discard {
                        remaining: remaining - count,
                        length,
                    };
                    return Ok(None);
                }
                self.state = ParseState::Begin;
                Err(FrameParseError::MbapLengthTooBig(length, constants::MAX_LENGTH_FIELD).into())
            }
            ParseState::Begin => {
                let raw = match self.buffer.peek(constants::HEADER_LENGTH) {
                    Some(bytes) => parse_header(bytes)?,
                    None => return Ok(None),
                };

                if let Err(err) = check_length(raw.length) {
                    self.buffer.read(constants::HEADER_LENGTH)?;
                    if let FrameParseError::MbapLengthTooBig(length, _) = err {
                        self.state = ParseState::Discard {
                            remaining: length - 1,
                            length,
                        };
                        return self.parse();
                    }
                    return Err(err.into());
                }

                let total = constants::HEADER_LENGTH + raw.length - 1;
                if self.buffer.len() < total {
                    return Ok(None);
                }

                let mut frame = Frame::new();
                if !frame.set(self.buffer.read(total)?) {
                    return Err(InternalError::InsufficientWriteSpace(
                        total,
                        constants::MAX_FRAME_LENGTH,
                    )
                    .into());
                }

                if raw.protocol_id != 0 {
                    return Err(FrameParseError::UnknownProtocolId(raw.protocol_id).into());
                }

                if self.level.enabled() {
                    tracing::info!(
                        "MBAP RX - {}",
                        MbapDisplay::new(self.level, raw.header, &frame.bytes()[constants::HEADER_LENGTH..])
                    );
                }

                Ok(Some(frame))
            }
        }
    }
}

/// Writes MBAP frames into an owned buffer
pub(crate) struct MbapFormatter {
    buffer: [u8; constants::MAX_FRAME_LENGTH],
}

impl MbapFormatter {
    pub(crate) fn new() -> Self {
        Self {
            buffer: [0; constants::MAX_FRAME_LENGTH],
        }
    }

    /// Write the header, the function code and whatever `body` writes
    pub(crate) fn format<F>(
        &mut self,
        header: MbapHeader,
        function: u8,
        body: F,
    ) -> Result<&[u8], InternalError>
    where
        F: FnOnce(&mut WriteCursor) -> Result<(), InternalError>,
    {
        let mut cursor = WriteCursor::new(self.buffer.as_mut());
        cursor.write_u16_be(header.tx_id.to_u16())?;
        cursor.write_u16_be(0)?;
        cursor.seek_from_current(2)?; // length is written afterwards
        cursor.write_u8(header.unit_id.value)?;

        let adu_length = {
            let start = cursor.position();
            cursor.write_u8(function)?;
            body(&mut cursor)?;
            cursor.position() - start
        };

        let length_field =
            u16::try_from(adu_length + 1).map_err(|_| InternalError::AduTooBig(adu_length))?;
        cursor.seek_from_start(4)?;
        cursor.write_u16_be(length_field)?;

        let total = constants::HEADER_LENGTH + adu_length;
        Ok(&self.buffer[..total])
    }
}

pub(crate) struct MbapDisplay<'a> {
    level: FrameDecodeLevel,
    header: MbapHeader,
    pdu: &'a [u8],
}

impl<'a> MbapDisplay<'a> {
    pub(crate) fn new(level: FrameDecodeLevel, header: MbapHeader, pdu: &'a [u8]) -> Self {
        Self { level, header, pdu }
    }
}

impl std::fmt::Display for MbapDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} (len = {})", self.header, self.pdu.len())?;
        if self.level.payload_enabled() {
            format_bytes(f, self.pdu)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_test::block_on;
    use tokio_test::io::Builder;

    use super::*;
    use crate::decode::PhysDecodeLevel;

    //                            |   tx id  |  proto id |  length  | unit |  payload   |
    const SIMPLE_FRAME: &[u8] = &[0x00, 0x07, 0x00, 0x00, 0x00, 0x03, 0x2A, 0x03, 0x04];

    fn read_frame(io: tokio_test::io::Mock) -> Result<Vec<u8>, RequestError> {
        let mut phys = PhysLayer::new(io, PhysDecodeLevel::Nothing);
        let mut reader = FramedReader::new(FrameDecodeLevel::Payload);
        block_on(reader.next_frame(&mut phys)).map(|f| f.bytes().to_vec())
    }

    fn test_segmented_parse(split_at: usize) {
        let (f1, f2) = SIMPLE_FRAME.split_at(split_at);
        let io = Builder::new().read(f1).read(f2).build();
        assert_eq!(read_frame(io).unwrap(), SIMPLE_FRAME);
    }

    #[test]
    fn correctly_formats_frame() {
        let mut formatter = MbapFormatter::new();
        let header = MbapHeader::new(TxId::new(7), UnitId::new(42));
        let output = formatter
            .format(header, 0x03, |cursor| cursor.write_u8(0x04))
            .unwrap();

        assert_eq!(output, SIMPLE_FRAME)
    }

    #[test]
    fn parses_a_complete_frame() {
        let (header, pdu) = parse_frame(SIMPLE_FRAME).unwrap();
        assert_eq!(header, MbapHeader::new(TxId::new(7), UnitId::new(0x2A)));
        assert_eq!(pdu, &[0x03, 0x04]);
    }

    #[test]
    fn frames_shorter_than_the_header_are_length_errors() {
        for len in 0..8 {
            assert_eq!(
                parse_frame(&SIMPLE_FRAME[..len]),
                Err(FrameParseError::TooShort(len, 8))
            );
        }
    }

    #[test]
    fn length_field_must_match_the_frame() {
        assert_eq!(
            parse_frame(&SIMPLE_FRAME[..8]),
            Err(FrameParseError::LengthMismatch(3, 2))
        );
    }

    #[test]
    fn complete_frames_with_bad_protocol_id_are_rejected() {
        let frame = &[0x00, 0x07, 0xCA, 0xFE, 0x00, 0x02, 0x2A, 0x03];
        assert_eq!(
            parse_frame(frame),
            Err(FrameParseError::UnknownProtocolId(0xCAFE))
        );
    }

    #[test]
    fn can_parse_frame_from_stream() {
        let io = Builder::new().read(SIMPLE_FRAME).build();
        assert_eq!(read_frame(io).unwrap(), SIMPLE_FRAME);
    }

    #[test]
    fn can_parse_maximum_size_frame() {
        // maximum ADU length is 253, so max MBAP length value is 254 which is 0xFE
        let header = &[0x00, 0x07, 0x00, 0x00, 0x00, 0xFE, 0x2A];
        let payload = &[0xCC; 253];

        let io = Builder::new().read(header).read(payload).build();
        let frame = read_frame(io).unwrap();
        assert_eq!(&frame[7..], payload.as_ref());
    }

    #[test]
    fn can_parse_frame_if_segmented_in_header() {
        test_segmented_parse(4);
    }

    #[test]
    fn can_parse_frame_if_segmented_in_payload() {
        test_segmented_parse(8);
    }

    #[test]
    fn stream_errors_on_bad_protocol_id() {
        let io = Builder::new()
            .read(&[0x00, 0x07, 0xCA, 0xFE, 0x00, 0x01, 0x2A])
            .build();
        assert_eq!(
            read_frame(io),
            Err(RequestError::BadFrame(FrameParseError::UnknownProtocolId(
                0xCAFE
            )))
        );
    }

    #[test]
    fn stream_errors_on_length_of_zero() {
        let io = Builder::new()
            .read(&[0x00, 0x07, 0x00, 0x00, 0x00, 0x00, 0x2A])
            .build();
        assert_eq!(
            read_frame(io),
            Err(RequestError::BadFrame(FrameParseError::MbapLengthZero))
        );
    }

    #[test]
    fn oversized_frames_are_dropped_and_the_stream_stays_aligned() {
        // length of 0x0100 announces 255 bytes after the unit id
        let header = &[0x00, 0x07, 0x00, 0x00, 0x01, 0x00, 0x2A];
        let body = &[0xCC; 255];
        let io = Builder::new()
            .read(header)
            .read(&body[..100])
            .read(&body[100..])
            .read(SIMPLE_FRAME)
            .build();
        let mut phys = PhysLayer::new(io, PhysDecodeLevel::Nothing);
        let mut reader = FramedReader::new(FrameDecodeLevel::Nothing);
        assert_eq!(
            block_on(reader.next_frame(&mut phys)).map(|f| f.bytes().to_vec()),
            Err(RequestError::BadFrame(FrameParseError::MbapLengthTooBig(
                0x100,
                constants::MAX_LENGTH_FIELD
            )))
        );
        assert_eq!(
            block_on(reader.next_frame(&mut phys)).map(|f| f.bytes().to_vec()),
            Ok(SIMPLE_FRAME.to_vec())
        );
    }

    #[test]
    fn consecutive_frames_in_one_read() {
        let mut bytes = SIMPLE_FRAME.to_vec();
        bytes.extend_from_slice(SIMPLE_FRAME);
        let io = Builder::new().read(&bytes).build();
        let mut phys = PhysLayer::new(io, PhysDecodeLevel::Nothing);
        let mut reader = FramedReader::new(FrameDecodeLevel::Nothing);
        for _ in 0..2 {
            assert_eq!(block_on(reader.next_frame(&mut phys)).unwrap().bytes(), SIMPLE_FRAME);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_read_resumes_mid_frame() {
        let (f1, f2) = SIMPLE_FRAME.split_at(5);
        let io = Builder::new()
            .read(f1)
            .wait(Duration::from_secs(2))
            .read(f2)
            .build();
        let mut phys = PhysLayer::new(io, PhysDecodeLevel::Nothing);
        let mut reader = FramedReader::new(FrameDecodeLevel::Nothing);

        let first = tokio::time::timeout(Duration::from_secs(1), reader.next_frame(&mut phys)).await;
        assert!(first.is_err());

        let frame = reader.next_frame(&mut phys).await.unwrap();
        assert_eq!(frame.bytes(), SIMPLE_FRAME);
    }

    #[test]
    fn tx_id_wraps() {
        let mut id = TxId::new(u16::MAX);
        assert_eq!(id.next(), TxId::new(u16::MAX));
        assert_eq!(id.next(), TxId::new(0));
    }
}
