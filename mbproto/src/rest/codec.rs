use std::str::FromStr;

use crate::address::AddressLimits;
use crate::common::function::{FunctionCode, ERROR_BIT};
use crate::constants::rest::{PROTOCOL, STATUS_FAIL, STATUS_OK};
use crate::error::{InvalidRequest, RestParseError};
use crate::exception::ExceptionCode;
use crate::message::{address_type_of, max_count, Request, ResponseData, WriteMultiple};
use crate::rest::data::{
    bits_to_text, coil_to_text, escape, hex_to_registers, registers_to_hex, text_to_bits,
    text_to_coil,
};
use crate::types::{AddressRange, Indexed};

/// HTTP method that carries a Modbus-REST request
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RestMethod {
    /// reads, functions 1 through 4
    Get,
    /// writes, functions 5, 6, 15 and 16
    Post,
}

/// An encoded client request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestMessage {
    /// relative URL of the form `{fc}/{addr}?qty=..&tid=..&uid=..`
    pub url: String,
    /// XML document for writes, `None` for reads
    pub body: Option<String>,
}

impl RestMessage {
    /// method the message must be sent with
    pub fn method(&self) -> RestMethod {
        match self.body {
            Some(_) => RestMethod::Post,
            None => RestMethod::Get,
        }
    }
}

/// Value of the `status` attribute of a response document
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RestStatus {
    /// request succeeded
    Ok,
    /// `functioncode` holds the error code and `msgdata` the exception code
    Fail,
}

/// A decoded response document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestResponse {
    /// response status
    pub status: RestStatus,
    /// echoed transaction id, `None` if the element is empty
    pub tx_id: Option<u16>,
    /// echoed unit id, `None` if the element is empty
    pub unit_id: Option<u8>,
    /// function code, or error code when the status is `Fail`
    pub function: u8,
    /// raw message data
    pub msgdata: String,
}

impl RestResponse {
    /// exception carried by a `Fail` response
    pub fn exception(&self) -> Option<ExceptionCode> {
        match self.status {
            RestStatus::Ok => None,
            RestStatus::Fail => Some(
                self.msgdata
                    .trim()
                    .parse::<u8>()
                    .map(ExceptionCode::from)
                    .unwrap_or(ExceptionCode::Unknown(0)),
            ),
        }
    }
}

/// A request decoded by a Modbus-REST server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestRequest {
    /// transaction id from the URL, `None` if absent
    pub tx_id: Option<u16>,
    /// unit id from the URL, `None` if absent
    pub unit_id: Option<u8>,
    /// raw function code from the URL
    pub function: u8,
    /// the request, or the exception to reply with
    pub body: Result<Request, ExceptionCode>,
}

/// Encodes requests and decodes responses on the client side of Modbus-REST
#[derive(Copy, Clone, Debug, Default)]
pub struct RestClientCodec;

impl RestClientCodec {
    /// create a codec
    pub fn new() -> Self {
        Self
    }

    /// Build the URL, and for writes the XML body, of a request
    pub fn encode_request(
        &self,
        tx_id: u16,
        unit_id: u8,
        request: &Request,
    ) -> Result<RestMessage, InvalidRequest> {
        request.validate()?;
        let range = request.range();
        let url = format!(
            "{}/{}?qty={}&tid={}&uid={}",
            request.function().get_value(),
            range.start,
            range.count,
            tx_id,
            unit_id
        );

        let msgdata = match request {
            Request::ReadCoils(_)
            | Request::ReadDiscreteInputs(_)
            | Request::ReadHoldingRegisters(_)
            | Request::ReadInputRegisters(_) => None,
            Request::WriteSingleCoil(x) => Some(coil_to_text(x.value).to_string()),
            Request::WriteSingleRegister(x) => Some(registers_to_hex(&[x.value])),
            Request::WriteMultipleCoils(x) => Some(bits_to_text(&x.values)),
            Request::WriteMultipleRegisters(x) => Some(registers_to_hex(&x.values)),
        };

        Ok(RestMessage {
            url,
            body: msgdata.map(|data| {
                format!("<request><protocol>{PROTOCOL}</protocol><msgdata>{data}</msgdata></request>")
            }),
        })
    }

    /// Parse a response document
    pub fn decode_response(&self, text: &str) -> Result<RestResponse, RestParseError> {
        let doc = roxmltree::Document::parse(text.trim())?;
        let root = doc.root_element();
        if !root.has_tag_name("response") {
            return Err(RestParseError::MissingElement("response"));
        }

        let status = match root.attribute("status") {
            Some(STATUS_OK) => RestStatus::Ok,
            Some(STATUS_FAIL) => RestStatus::Fail,
            other => {
                return Err(RestParseError::InvalidStatus(
                    other.unwrap_or_default().to_string(),
                ))
            }
        };

        check_protocol(root)?;

        let function = child_text(root, "functioncode")
            .ok_or(RestParseError::MissingElement("functioncode"))?;

        Ok(RestResponse {
            status,
            tx_id: optional_integer(root, "transactionid")?,
            unit_id: optional_integer(root, "unitid")?,
            function: parse_integer("functioncode", function)?,
            msgdata: child_text(root, "msgdata")
                .unwrap_or_default()
                .trim()
                .to_string(),
        })
    }

    /// Interpret the `msgdata` of a successful response to `request`
    ///
    /// Bit values are truncated to the requested quantity.
    pub fn response_data(
        &self,
        request: &Request,
        response: &RestResponse,
    ) -> Result<ResponseData, RestParseError> {
        let msgdata = response.msgdata.as_str();
        let range = request.range();
        let invalid = || RestParseError::InvalidMsgData(msgdata.to_string());

        let data = match request {
            Request::ReadCoils(_) | Request::ReadDiscreteInputs(_) => {
                ResponseData::Bits(text_to_bits(msgdata, range.count as usize)?)
            }
            Request::ReadHoldingRegisters(_) | Request::ReadInputRegisters(_) => {
                let values = hex_to_registers(msgdata)?;
                if values.len() != range.count as usize {
                    return Err(invalid());
                }
                ResponseData::Registers(values)
            }
            Request::WriteSingleCoil(x) => {
                ResponseData::SingleCoil(Indexed::new(x.index, text_to_coil(msgdata)?))
            }
            Request::WriteSingleRegister(x) => match hex_to_registers(msgdata)?.as_slice() {
                [value] => ResponseData::SingleRegister(Indexed::new(x.index, *value)),
                _ => return Err(invalid()),
            },
            Request::WriteMultipleCoils(_) | Request::WriteMultipleRegisters(_) => {
                let count = parse_integer("msgdata", msgdata)?;
                ResponseData::WriteMultiple(AddressRange {
                    start: range.start,
                    count,
                })
            }
        };

        Ok(data)
    }
}

/// Decodes requests and encodes responses on the server side of Modbus-REST
///
/// Ranges are checked against the data table limits, so addresses above
/// 65535 are accepted where the table allows them.
#[derive(Clone, Debug, Default)]
pub struct RestServerCodec {
    limits: AddressLimits,
}

struct UrlParams {
    function: u8,
    address: u32,
    quantity: u32,
    tx_id: Option<u16>,
    unit_id: Option<u8>,
}

impl RestServerCodec {
    /// codec that checks request ranges against `limits`
    pub fn new(limits: AddressLimits) -> Self {
        Self { limits }
    }

    /// limits used for range checks
    pub fn limits(&self) -> &AddressLimits {
        &self.limits
    }

    /// Decode an HTTP GET request, which may only carry a read
    pub fn decode_get_request(&self, url: &str) -> Result<RestRequest, RestParseError> {
        let params = parse_url(url)?;
        let body = self.read_request(&params);
        Ok(params.into_request(body))
    }

    /// Decode an HTTP POST request, which may only carry a write
    pub fn decode_post_request(
        &self,
        url: &str,
        body: &str,
    ) -> Result<RestRequest, RestParseError> {
        let params = parse_url(url)?;
        let doc = roxmltree::Document::parse(body.trim())?;
        let root = doc.root_element();
        if !root.has_tag_name("request") {
            return Err(RestParseError::MissingElement("request"));
        }
        check_protocol(root)?;
        let msgdata = child_text(root, "msgdata").unwrap_or_default().trim();
        let body = self.write_request(&params, msgdata);
        Ok(params.into_request(body))
    }

    /// Response document with `status="ok"`
    pub fn encode_response(
        &self,
        tx_id: Option<u16>,
        unit_id: Option<u8>,
        function: u8,
        msgdata: &str,
    ) -> String {
        format_response(STATUS_OK, tx_id, unit_id, function, msgdata)
    }

    /// Response document with `status="fail"`, the error code and the exception code
    pub fn encode_error_response(
        &self,
        tx_id: Option<u16>,
        unit_id: Option<u8>,
        error_code: u8,
        exception: ExceptionCode,
    ) -> String {
        let exception: u8 = exception.into();
        format_response(
            STATUS_FAIL,
            tx_id,
            unit_id,
            error_code | ERROR_BIT,
            &exception.to_string(),
        )
    }

    /// The `msgdata` text for the reply to a request
    ///
    /// Writes of multiple values reply with the quantity written.
    pub fn encode_data(&self, data: &ResponseData) -> String {
        match data {
            ResponseData::Bits(values) => bits_to_text(values),
            ResponseData::Registers(values) => registers_to_hex(values),
            ResponseData::SingleCoil(x) => coil_to_text(x.value).to_string(),
            ResponseData::SingleRegister(x) => registers_to_hex(&[x.value]),
            ResponseData::WriteMultiple(range) => range.count.to_string(),
        }
    }

    fn quantity(&self, function: FunctionCode, params: &UrlParams) -> Result<u16, ExceptionCode> {
        u16::try_from(params.quantity)
            .ok()
            .filter(|count| *count > 0 && *count <= max_count(function))
            .ok_or(ExceptionCode::IllegalDataValue)
    }

    fn check_range(&self, request: Request) -> Result<Request, ExceptionCode> {
        self.limits
            .check(address_type_of(request.function()), request.range())
            .map_err(|_| ExceptionCode::IllegalDataAddress)?;
        Ok(request)
    }

    fn read_request(&self, params: &UrlParams) -> Result<Request, ExceptionCode> {
        let function = FunctionCode::get(params.function)
            .filter(|x| x.is_read())
            .ok_or(ExceptionCode::IllegalFunction)?;
        let range = AddressRange {
            start: params.address,
            count: self.quantity(function, params)?,
        };
        let request = match function {
            FunctionCode::ReadCoils => Request::ReadCoils(range),
            FunctionCode::ReadDiscreteInputs => Request::ReadDiscreteInputs(range),
            FunctionCode::ReadHoldingRegisters => Request::ReadHoldingRegisters(range),
            _ => Request::ReadInputRegisters(range),
        };
        self.check_range(request)
    }

    fn write_request(&self, params: &UrlParams, msgdata: &str) -> Result<Request, ExceptionCode> {
        let function = FunctionCode::get(params.function)
            .filter(|x| !x.is_read())
            .ok_or(ExceptionCode::IllegalFunction)?;
        let bad_value = |_| ExceptionCode::IllegalDataValue;

        let request = match function {
            FunctionCode::WriteSingleCoil => Request::WriteSingleCoil(Indexed::new(
                params.address,
                text_to_coil(msgdata).map_err(bad_value)?,
            )),
            FunctionCode::WriteSingleRegister => match hex_to_registers(msgdata)
                .map_err(bad_value)?
                .as_slice()
            {
                [value] => Request::WriteSingleRegister(Indexed::new(params.address, *value)),
                _ => return Err(ExceptionCode::IllegalDataValue),
            },
            FunctionCode::WriteMultipleCoils => {
                let count = self.quantity(function, params)?;
                let values = text_to_bits(msgdata, count as usize).map_err(bad_value)?;
                Request::WriteMultipleCoils(WriteMultiple {
                    range: AddressRange {
                        start: params.address,
                        count,
                    },
                    values,
                })
            }
            _ => {
                let count = self.quantity(function, params)?;
                let values = hex_to_registers(msgdata).map_err(bad_value)?;
                if values.len() != count as usize {
                    return Err(ExceptionCode::IllegalDataValue);
                }
                Request::WriteMultipleRegisters(WriteMultiple {
                    range: AddressRange {
                        start: params.address,
                        count,
                    },
                    values,
                })
            }
        };

        self.check_range(request)
    }
}

impl UrlParams {
    fn into_request(self, body: Result<Request, ExceptionCode>) -> RestRequest {
        RestRequest {
            tx_id: self.tx_id,
            unit_id: self.unit_id,
            function: self.function,
            body,
        }
    }
}

fn parse_integer<T: FromStr>(name: &'static str, text: &str) -> Result<T, RestParseError> {
    text.trim()
        .parse()
        .map_err(|_| RestParseError::InvalidInteger(name, text.to_string()))
}

// empty or missing values are None
fn parse_optional<T: FromStr>(
    name: &'static str,
    text: Option<&str>,
) -> Result<Option<T>, RestParseError> {
    match text.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => parse_integer(name, text).map(Some),
    }
}

fn parse_url(url: &str) -> Result<UrlParams, RestParseError> {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let mut segments = path.trim_matches('/').rsplit('/');
    let (address, function) = match (segments.next(), segments.next()) {
        (Some(address), Some(function)) => (address, function),
        _ => return Err(RestParseError::InvalidUrl(url.to_string())),
    };

    let mut qty = None;
    let mut tid = None;
    let mut uid = None;
    for pair in query.split('&').filter(|x| !x.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match key {
            "qty" => qty = Some(value),
            "tid" => tid = Some(value),
            "uid" => uid = Some(value),
            _ => {}
        }
    }

    Ok(UrlParams {
        function: parse_integer("function", function)?,
        address: parse_integer("address", address)?,
        quantity: parse_optional("qty", qty)?.unwrap_or(1),
        tx_id: parse_optional("tid", tid)?,
        unit_id: parse_optional("uid", uid)?,
    })
}

fn child_text<'a>(node: roxmltree::Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|n| n.has_tag_name(name))
        .map(|n| n.text().unwrap_or_default())
}

fn optional_integer<T: FromStr>(
    node: roxmltree::Node,
    name: &'static str,
) -> Result<Option<T>, RestParseError> {
    parse_optional(name, child_text(node, name))
}

// a document without a protocol element is accepted
fn check_protocol(node: roxmltree::Node) -> Result<(), RestParseError> {
    match child_text(node, "protocol").map(str::trim) {
        None => Ok(()),
        Some(PROTOCOL) => Ok(()),
        Some(other) => Err(RestParseError::UnknownProtocol(other.to_string())),
    }
}

fn format_response(
    status: &str,
    tx_id: Option<u16>,
    unit_id: Option<u8>,
    function: u8,
    msgdata: &str,
) -> String {
    let tx_id = tx_id.map(|x| x.to_string()).unwrap_or_default();
    let unit_id = unit_id.map(|x| x.to_string()).unwrap_or_default();
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <response status=\"{status}\">\
         <transactionid>{tx_id}</transactionid>\
         <protocol>{PROTOCOL}</protocol>\
         <unitid>{unit_id}</unitid>\
         <functioncode>{function}</functioncode>\
         <msgdata>{}</msgdata>\
         </response>",
        escape(msgdata)
    )
}
