use std::future::Future;

use crate::client::session::indexed;
use crate::error::{RestError, ResponseMismatch};
use crate::message::{Request, ResponseData, WriteMultiple};
use crate::rest::codec::{RestClientCodec, RestStatus};
use crate::tcp::frame::TxId;
use crate::types::{AddressRange, Indexed, UnitId};

/// HTTP transport used by [`RestClientSession`]
///
/// URLs are relative to the Modbus-REST endpoint, e.g. `3/100?qty=2&tid=1&uid=1`.
/// Both methods resolve to the response body.
pub trait RestTransport {
    /// perform an HTTP GET
    fn get(&mut self, url: &str) -> impl Future<Output = std::io::Result<String>> + Send;

    /// perform an HTTP POST with an XML body
    fn post(&mut self, url: &str, body: &str)
        -> impl Future<Output = std::io::Result<String>> + Send;
}

/// A Modbus-REST client bound to a transport
pub struct RestClientSession<T> {
    transport: T,
    codec: RestClientCodec,
    tx_id: TxId,
    unit_id: UnitId,
}

impl<T: RestTransport> RestClientSession<T> {
    /// create a session that addresses `unit_id`
    pub fn new(transport: T, unit_id: UnitId) -> Self {
        Self {
            transport,
            codec: RestClientCodec::new(),
            tx_id: TxId::default(),
            unit_id,
        }
    }

    /// recover the transport
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Send a request and interpret the reply
    ///
    /// A reply that echoes a different transaction id is a mismatch. An empty
    /// transaction id element is accepted.
    pub async fn request(&mut self, request: &Request) -> Result<ResponseData, RestError> {
        let tx_id = self.tx_id.next();
        let message = self
            .codec
            .encode_request(tx_id.to_u16(), self.unit_id.value, request)?;

        let text = match &message.body {
            None => self.transport.get(&message.url).await?,
            Some(body) => self.transport.post(&message.url, body).await?,
        };

        let response = self.codec.decode_response(&text)?;
        if let Some(received) = response.tx_id {
            if received != tx_id.to_u16() {
                return Err(ResponseMismatch::TxId(tx_id.to_u16(), received).into());
            }
        }

        let function = request.function().get_value();
        if response.status == RestStatus::Fail {
            if let Some(ex) = response.exception() {
                return Err(ex.into());
            }
        }
        if response.function != function {
            return Err(ResponseMismatch::Function(function, response.function).into());
        }

        Ok(self.codec.response_data(request, &response)?)
    }

    /// read coils
    pub async fn read_coils(
        &mut self,
        range: AddressRange,
    ) -> Result<Vec<Indexed<bool>>, RestError> {
        let data = self.request(&Request::ReadCoils(range)).await?;
        bits(range, data)
    }

    /// read discrete inputs
    pub async fn read_discrete_inputs(
        &mut self,
        range: AddressRange,
    ) -> Result<Vec<Indexed<bool>>, RestError> {
        let data = self.request(&Request::ReadDiscreteInputs(range)).await?;
        bits(range, data)
    }

    /// read holding registers
    pub async fn read_holding_registers(
        &mut self,
        range: AddressRange,
    ) -> Result<Vec<Indexed<u16>>, RestError> {
        let data = self.request(&Request::ReadHoldingRegisters(range)).await?;
        registers(range, data)
    }

    /// read input registers
    pub async fn read_input_registers(
        &mut self,
        range: AddressRange,
    ) -> Result<Vec<Indexed<u16>>, RestError> {
        let data = self.request(&Request::ReadInputRegisters(range)).await?;
        registers(range, data)
    }

    /// write a single coil
    pub async fn write_single_coil(
        &mut self,
        value: Indexed<bool>,
    ) -> Result<Indexed<bool>, RestError> {
        match self.request(&Request::WriteSingleCoil(value)).await? {
            ResponseData::SingleCoil(echo) => Ok(echo),
            _ => Err(ResponseMismatch::DataKind.into()),
        }
    }

    /// write a single register
    pub async fn write_single_register(
        &mut self,
        value: Indexed<u16>,
    ) -> Result<Indexed<u16>, RestError> {
        match self.request(&Request::WriteSingleRegister(value)).await? {
            ResponseData::SingleRegister(echo) => Ok(echo),
            _ => Err(ResponseMismatch::DataKind.into()),
        }
    }

    /// write multiple coils
    pub async fn write_multiple_coils(
        &mut self,
        value: WriteMultiple<bool>,
    ) -> Result<AddressRange, RestError> {
        match self.request(&Request::WriteMultipleCoils(value)).await? {
            ResponseData::WriteMultiple(range) => Ok(range),
            _ => Err(ResponseMismatch::DataKind.into()),
        }
    }

    /// write multiple registers
    pub async fn write_multiple_registers(
        &mut self,
        value: WriteMultiple<u16>,
    ) -> Result<AddressRange, RestError> {
        match self.request(&Request::WriteMultipleRegisters(value)).await? {
            ResponseData::WriteMultiple(range) => Ok(range),
            _ => Err(ResponseMismatch::DataKind.into()),
        }
    }
}

fn bits(range: AddressRange, data: ResponseData) -> Result<Vec<Indexed<bool>>, RestError> {
    match data {
        ResponseData::Bits(values) => Ok(indexed(range, values)),
        _ => Err(ResponseMismatch::DataKind.into()),
    }
}

fn registers(range: AddressRange, data: ResponseData) -> Result<Vec<Indexed<u16>>, RestError> {
    match data {
        ResponseData::Registers(values) => Ok(indexed(range, values)),
        _ => Err(ResponseMismatch::DataKind.into()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use tokio_test::block_on;

    use super::*;
    use crate::exception::ExceptionCode;

    /// replays canned replies and records what was sent
    #[derive(Default)]
    struct Canned {
        replies: VecDeque<String>,
        sent: Vec<(String, Option<String>)>,
    }

    impl Canned {
        fn reply(&mut self, url: &str, body: Option<&str>) -> std::io::Result<String> {
            self.sent.push((url.to_string(), body.map(str::to_string)));
            self.replies
                .pop_front()
                .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::ConnectionReset))
        }
    }

    impl RestTransport for Canned {
        fn get(&mut self, url: &str) -> impl Future<Output = std::io::Result<String>> + Send {
            let result = self.reply(url, None);
            async move { result }
        }

        fn post(
            &mut self,
            url: &str,
            body: &str,
        ) -> impl Future<Output = std::io::Result<String>> + Send {
            let result = self.reply(url, Some(body));
            async move { result }
        }
    }

    fn session(replies: &[&str]) -> RestClientSession<Canned> {
        let transport = Canned {
            replies: replies.iter().map(|x| x.to_string()).collect(),
            sent: Vec::new(),
        };
        RestClientSession::new(transport, UnitId::new(1))
    }

    fn ok(tid: u16, function: u8, msgdata: &str) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?><response status=\"ok\"><transactionid>{tid}</transactionid>\
             <protocol>modbusrest_v1.0</protocol><unitid>1</unitid><functioncode>{function}</functioncode>\
             <msgdata>{msgdata}</msgdata></response>"
        )
    }

    #[test]
    fn reads_use_get_and_writes_use_post() {
        let mut session = session(&[&ok(0, 2, "11000000"), &ok(1, 16, "2")]);
        assert_eq!(
            block_on(session.read_discrete_inputs(AddressRange::try_from(4, 2).unwrap())),
            Ok(vec![Indexed::new(4, true), Indexed::new(5, true)])
        );
        assert_eq!(
            block_on(session.write_multiple_registers(WriteMultiple::from(9, vec![1, 2]).unwrap())),
            Ok(AddressRange { start: 9, count: 2 })
        );
        let sent = session.into_inner().sent;
        assert_eq!(sent[0], ("2/4?qty=2&tid=0&uid=1".to_string(), None));
        assert_eq!(sent[1].0, "16/9?qty=2&tid=1&uid=1");
        assert!(sent[1].1.as_deref().unwrap_or_default().contains("<msgdata>00010002</msgdata>"));
    }

    #[test]
    fn fail_documents_become_exceptions() {
        let fail = "<response status=\"fail\"><transactionid>0</transactionid><protocol>modbusrest_v1.0</protocol>\
                    <unitid>1</unitid><functioncode>131</functioncode><msgdata>2</msgdata></response>";
        let mut session = session(&[fail]);
        assert_eq!(
            block_on(session.read_holding_registers(AddressRange::try_from(0, 1).unwrap())),
            Err(RestError::Exception(ExceptionCode::IllegalDataAddress))
        );
    }

    #[test]
    fn transaction_id_must_match() {
        let mut session = session(&[&ok(7, 6, "002a")]);
        assert_eq!(
            block_on(session.write_single_register(Indexed::new(1, 42))),
            Err(RestError::Mismatch(ResponseMismatch::TxId(0, 7)))
        );
    }

    #[test]
    fn transport_failures_are_io_errors() {
        let mut session = session(&[]);
        assert_eq!(
            block_on(session.write_single_coil(Indexed::new(1, true))),
            Err(RestError::Io(std::io::ErrorKind::ConnectionReset))
        );
    }
}
