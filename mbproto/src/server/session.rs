use tokio::io::{AsyncRead, AsyncWrite};

use crate::address::AddressLimits;
use crate::common::phys::PhysLayer;
use crate::decode::DecodeLevel;
use crate::error::{FrameParseError, RequestError};
use crate::message::{RequestDisplay, ResponseDisplay};
use crate::server::handler::RequestHandler;
use crate::tcp::codec::ServerCodec;
use crate::tcp::frame::constants::HEADER_LENGTH;
use crate::tcp::frame::{FramedReader, MbapDisplay};

/// Serves Modbus/TCP requests arriving on one transport
///
/// Requests for every unit id are executed and the unit id is echoed.
pub struct ServerSession<T, H> {
    phys: PhysLayer<T>,
    reader: FramedReader,
    codec: ServerCodec,
    handler: H,
    decode: DecodeLevel,
}

impl<T, H> ServerSession<T, H>
where
    T: AsyncRead + AsyncWrite + Unpin,
    H: RequestHandler,
{
    /// create a session over `io` that executes requests with `handler`
    pub fn new(io: T, handler: H, limits: AddressLimits, decode: DecodeLevel) -> Self {
        Self {
            phys: PhysLayer::new(io, decode.physical),
            reader: FramedReader::new(decode.frame),
            codec: ServerCodec::new(limits),
            handler,
            decode,
        }
    }

    /// change the decode level
    pub fn set_decode_level(&mut self, decode: DecodeLevel) {
        self.decode = decode;
        self.phys.set_level(decode.physical);
        self.reader.set_level(decode.frame);
    }

    /// recover the transport
    pub fn into_inner(self) -> T {
        self.phys.into_inner()
    }

    /// Serve requests until the transport fails or the stream can no longer be framed
    pub async fn run(&mut self) -> Result<(), RequestError> {
        loop {
            self.run_one().await?;
        }
    }

    /// Read one frame and reply to it
    ///
    /// Frames with an unknown protocol id or an oversized length field are
    /// skipped. Any error returned here means the session cannot continue.
    pub async fn run_one(&mut self) -> Result<(), RequestError> {
        let frame = match self.reader.next_frame(&mut self.phys).await {
            Ok(frame) => frame,
            Err(RequestError::BadFrame(FrameParseError::UnknownProtocolId(id))) => {
                tracing::warn!("skipping frame with unknown protocol id: {:#06X}", id);
                return Ok(());
            }
            Err(RequestError::BadFrame(err @ FrameParseError::MbapLengthTooBig(..))) => {
                tracing::warn!("skipping frame: {}", err);
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let request = match self.codec.decode_request(frame.bytes()) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!("skipping frame: {}", err);
                return Ok(());
            }
        };

        let header = request.header;
        let app = self.decode.app;

        let reply = match request.body {
            Err(ex) => {
                tracing::warn!(
                    "rejecting request with function {:#04X}: {}",
                    request.function,
                    ex
                );
                self.codec
                    .encode_error_response(header, request.function, ex)?
            }
            Ok(request) => {
                if app.enabled() {
                    tracing::info!("PDU RX - {}", RequestDisplay::new(app, &request));
                }
                let function = request.function();
                let result = self.handler.handle(&request);
                if app.enabled() {
                    tracing::info!(
                        "PDU TX - {}",
                        ResponseDisplay::new(app, function.get_value(), result.as_ref().map_err(|ex| *ex))
                    );
                }
                match result {
                    Ok(data) => self.codec.encode_response(header, function, &data)?,
                    Err(ex) => {
                        self.codec
                            .encode_error_response(header, function.get_value(), ex)?
                    }
                }
            }
        };

        if self.decode.frame.enabled() {
            tracing::info!(
                "MBAP TX - {}",
                MbapDisplay::new(self.decode.frame, header, &reply[HEADER_LENGTH..])
            );
        }

        self.phys.write(reply).await?;
        Ok(())
    }
}
