use tokio::io::{AsyncRead, AsyncWrite};

use crate::common::phys::PhysLayer;
use crate::error::InternalError;

/// Bytes received but not yet consumed by a frame parser
///
/// The buffer outlives any single read call, so a read that is cancelled
/// loses nothing that was already received.
pub(crate) struct ReadBuffer {
    buffer: Vec<u8>,
    begin: usize,
    end: usize,
}

impl ReadBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        ReadBuffer {
            buffer: vec![0; capacity],
            begin: 0,
            end: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.end - self.begin
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    /// the next `count` bytes without consuming them
    pub(crate) fn peek(&self, count: usize) -> Option<&[u8]> {
        if self.len() < count {
            return None;
        }
        self.buffer.get(self.begin..self.begin + count)
    }

    pub(crate) fn read(&mut self, count: usize) -> Result<&[u8], InternalError> {
        if self.len() < count {
            return Err(InternalError::InsufficientBytesForRead(count, self.len()));
        }

        match self.buffer.get(self.begin..(self.begin + count)) {
            Some(ret) => {
                self.begin += count;
                Ok(ret)
            }
            None => Err(InternalError::InsufficientBytesForRead(count, self.len())),
        }
    }

    pub(crate) async fn read_some<T>(&mut self, io: &mut PhysLayer<T>) -> Result<usize, std::io::Error>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        // reset the indices when empty to make the biggest read possible
        if self.is_empty() {
            self.begin = 0;
            self.end = 0;
        }

        // shift unread bytes to the front once the tail is reached
        if self.end == self.buffer.len() {
            let length = self.len();
            self.buffer.copy_within(self.begin..self.end, 0);
            self.begin = 0;
            self.end = length;
        }

        let count = io.read(&mut self.buffer[self.end..]).await?;

        if count == 0 {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
        }
        self.end += count;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::block_on;
    use tokio_test::io::Builder;

    use super::*;
    use crate::decode::PhysDecodeLevel;

    #[test]
    fn errors_when_reading_too_many_bytes() {
        let mut buffer = ReadBuffer::new(10);
        assert_eq!(buffer.peek(1), None);
        assert_eq!(
            buffer.read(1),
            Err(InternalError::InsufficientBytesForRead(1, 0))
        );
    }

    #[test]
    fn peek_does_not_consume() {
        let mut buffer = ReadBuffer::new(4);
        let mut phys = PhysLayer::new(Builder::new().read(&[0x01, 0x02]).build(), PhysDecodeLevel::Nothing);
        assert_eq!(block_on(buffer.read_some(&mut phys)).unwrap(), 2);
        assert_eq!(buffer.peek(2), Some(&[0x01u8, 0x02][..]));
        assert_eq!(buffer.read(2).unwrap(), &[0x01, 0x02]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn shifts_contents_when_buffer_at_capacity() {
        let mut buffer = ReadBuffer::new(3);
        let io = Builder::new()
            .read(&[0x01, 0x02, 0x03])
            .read(&[0x04, 0x05])
            .build();
        let mut phys = PhysLayer::new(io, PhysDecodeLevel::Nothing);
        assert_eq!(block_on(buffer.read_some(&mut phys)).unwrap(), 3);
        assert_eq!(buffer.read(2).unwrap(), &[0x01, 0x02]);
        assert_eq!(block_on(buffer.read_some(&mut phys)).unwrap(), 2);
        assert_eq!(buffer.read(3).unwrap(), &[0x03, 0x04, 0x05]);
    }

    #[test]
    fn end_of_stream_is_an_error() {
        let mut buffer = ReadBuffer::new(3);
        let mut phys = PhysLayer::new(Builder::new().build(), PhysDecodeLevel::Nothing);
        assert_eq!(
            block_on(buffer.read_some(&mut phys)).map_err(|e| e.kind()),
            Err(std::io::ErrorKind::UnexpectedEof)
        );
    }
}
