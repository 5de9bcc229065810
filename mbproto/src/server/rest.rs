use crate::address::AddressLimits;
use crate::error::RestParseError;
use crate::rest::codec::{RestRequest, RestServerCodec};
use crate::server::handler::RequestHandler;

/// Answers Modbus-REST requests handed over by an HTTP layer
///
/// Every call returns the XML document to send back, or a [`RestParseError`]
/// when the URL or body cannot be understood at all.
pub struct RestServer<H> {
    codec: RestServerCodec,
    handler: H,
}

impl<H: RequestHandler> RestServer<H> {
    /// create a server that executes requests with `handler`
    pub fn new(handler: H, limits: AddressLimits) -> Self {
        Self {
            codec: RestServerCodec::new(limits),
            handler,
        }
    }

    /// handle an HTTP GET
    pub fn handle_get(&self, url: &str) -> Result<String, RestParseError> {
        let request = self.codec.decode_get_request(url)?;
        Ok(self.reply(request))
    }

    /// handle an HTTP POST
    pub fn handle_post(&self, url: &str, body: &str) -> Result<String, RestParseError> {
        let request = self.codec.decode_post_request(url, body)?;
        Ok(self.reply(request))
    }

    fn reply(&self, request: RestRequest) -> String {
        let result = request.body.and_then(|x| self.handler.handle(&x));
        match result {
            Ok(data) => self.codec.encode_response(
                request.tx_id,
                request.unit_id,
                request.function,
                &self.codec.encode_data(&data),
            ),
            Err(ex) => {
                tracing::warn!(
                    "REST request with function {} failed: {}",
                    request.function,
                    ex
                );
                self.codec
                    .encode_error_response(request.tx_id, request.unit_id, request.function, ex)
            }
        }
    }
}
