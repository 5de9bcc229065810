use std::future::Future;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use mbproto::client::*;
use mbproto::server::*;
use mbproto::table::ModbusMemory;
use mbproto::*;

use tokio::runtime::Runtime;

fn limits() -> AddressLimits {
    AddressLimits {
        holdingreg: 99,
        ..AddressLimits::default()
    }
}

async fn connect(addr: SocketAddr) -> ClientSession<tokio::net::TcpStream> {
    ClientSession::connect(
        addr,
        UnitId::new(0x01),
        Duration::from_secs(1),
        DecodeLevel::default(),
    )
    .await
    .unwrap()
}

async fn test_requests_and_responses() {
    let memory = ModbusMemory::new(&limits());
    let server = spawn_tcp_server_task(
        4,
        SocketAddr::from_str("127.0.0.1:0").unwrap(),
        memory.clone(),
        limits(),
        DecodeLevel::default(),
    )
    .await
    .unwrap();

    let mut client = connect(server.local_addr()).await;

    memory.inputs().set_bool(0, true).unwrap();
    memory.inputs().set_word(0, 0xCAFEu16).unwrap();

    assert_eq!(
        client
            .read_discrete_inputs(AddressRange::try_from(0, 2).unwrap())
            .await
            .unwrap(),
        vec![Indexed::new(0, true), Indexed::new(1, false)]
    );

    assert_eq!(
        client
            .read_input_registers(AddressRange::try_from(0, 2).unwrap())
            .await
            .unwrap(),
        vec![Indexed::new(0, 0xCAFE), Indexed::new(1, 0x0000)]
    );

    // do a single coil write and verify that it was written by reading it
    assert_eq!(
        client.write_single_coil(Indexed::new(1, true)).await.unwrap(),
        Indexed::new(1, true)
    );
    assert_eq!(
        client
            .read_coils(AddressRange::try_from(0, 2).unwrap())
            .await
            .unwrap(),
        vec![Indexed::new(0, false), Indexed::new(1, true)]
    );
    assert_eq!(memory.outputs().get_bool(1), Ok(true));

    // do a single register write and verify that it was written by reading it
    assert_eq!(
        client
            .write_single_register(Indexed::new(1, 0xABCD))
            .await
            .unwrap(),
        Indexed::new(1, 0xABCD)
    );
    assert_eq!(
        client
            .read_holding_registers(AddressRange::try_from(0, 2).unwrap())
            .await
            .unwrap(),
        vec![Indexed::new(0, 0x0000), Indexed::new(1, 0xABCD)]
    );

    // write multiple coils and verify that they were written
    assert_eq!(
        client
            .write_multiple_coils(WriteMultiple::from(0, vec![true, true, true]).unwrap())
            .await
            .unwrap(),
        AddressRange::try_from(0, 3).unwrap()
    );
    assert_eq!(
        client
            .read_coils(AddressRange::try_from(0, 3).unwrap())
            .await
            .unwrap(),
        vec![
            Indexed::new(0, true),
            Indexed::new(1, true),
            Indexed::new(2, true)
        ]
    );

    // write registers and verify that they were written
    assert_eq!(
        client
            .write_multiple_registers(WriteMultiple::from(0, vec![0x0102, 0x0304, 0x0506]).unwrap())
            .await
            .unwrap(),
        AddressRange::try_from(0, 3).unwrap()
    );
    assert_eq!(
        client
            .read_holding_registers(AddressRange::try_from(0, 3).unwrap())
            .await
            .unwrap(),
        vec![
            Indexed::new(0, 0x0102),
            Indexed::new(1, 0x0304),
            Indexed::new(2, 0x0506)
        ]
    );

    // extended values written locally are visible remotely
    memory.holding_registers().set_float32(10, 3.5).unwrap();
    assert_eq!(client.read_holding_float32(10).await.unwrap(), 3.5);

    // past the configured maximum of the table
    assert_eq!(
        client
            .read_holding_registers(AddressRange::try_from(98, 3).unwrap())
            .await,
        Err(RequestError::Exception(ExceptionCode::IllegalDataAddress))
    );

    // the session survives the exception
    assert_eq!(
        client
            .read_holding_registers(AddressRange::try_from(99, 1).unwrap())
            .await
            .unwrap(),
        vec![Indexed::new(99, 0)]
    );
}

async fn test_oldest_session_is_closed() {
    let memory = ModbusMemory::new(&limits());
    let server = spawn_tcp_server_task(
        1,
        SocketAddr::from_str("127.0.0.1:0").unwrap(),
        memory,
        limits(),
        DecodeLevel::default(),
    )
    .await
    .unwrap();

    let mut first = connect(server.local_addr()).await;
    first.write_single_coil(Indexed::new(0, true)).await.unwrap();

    let mut second = connect(server.local_addr()).await;
    assert_eq!(
        second
            .read_coils(AddressRange::try_from(0, 1).unwrap())
            .await
            .unwrap(),
        vec![Indexed::new(0, true)]
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(first
        .read_coils(AddressRange::try_from(0, 1).unwrap())
        .await
        .is_err());
}

struct Loopback {
    server: RestServer<ModbusMemory>,
}

fn into_io(err: RestParseError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, err)
}

impl RestTransport for Loopback {
    fn get(&mut self, url: &str) -> impl Future<Output = std::io::Result<String>> + Send {
        let reply = self.server.handle_get(url).map_err(into_io);
        async move { reply }
    }

    fn post(
        &mut self,
        url: &str,
        body: &str,
    ) -> impl Future<Output = std::io::Result<String>> + Send {
        let reply = self.server.handle_post(url, body).map_err(into_io);
        async move { reply }
    }
}

async fn test_rest_requests_and_responses() {
    let limits = AddressLimits::default();
    let memory = ModbusMemory::new(&limits);
    let transport = Loopback {
        server: RestServer::new(memory.clone(), limits),
    };
    let mut client = RestClientSession::new(transport, UnitId::new(7));

    // REST reaches registers above 65535
    assert_eq!(
        client
            .write_multiple_registers(WriteMultiple::from(1048570, vec![0x0102, 0xABCD]).unwrap())
            .await
            .unwrap(),
        AddressRange::try_from(1048570, 2).unwrap()
    );
    assert_eq!(memory.outputs().get_word(1048571), Ok(0xABCD));
    assert_eq!(
        client
            .read_holding_registers(AddressRange::try_from(1048570, 2).unwrap())
            .await
            .unwrap(),
        vec![Indexed::new(1048570, 0x0102), Indexed::new(1048571, 0xABCD)]
    );

    assert_eq!(
        client
            .write_multiple_coils(WriteMultiple::from(3, vec![true, false, true]).unwrap())
            .await
            .unwrap(),
        AddressRange::try_from(3, 3).unwrap()
    );
    assert_eq!(
        client
            .read_coils(AddressRange::try_from(3, 3).unwrap())
            .await
            .unwrap(),
        vec![
            Indexed::new(3, true),
            Indexed::new(4, false),
            Indexed::new(5, true)
        ]
    );

    assert_eq!(
        client.write_single_coil(Indexed::new(9, true)).await.unwrap(),
        Indexed::new(9, true)
    );
    assert_eq!(
        client
            .write_single_register(Indexed::new(2, 0x1234))
            .await
            .unwrap(),
        Indexed::new(2, 0x1234)
    );

    assert_eq!(
        client
            .read_input_registers(AddressRange::try_from(65535, 2).unwrap())
            .await,
        Err(RestError::Exception(ExceptionCode::IllegalDataAddress))
    );
}

#[test]
fn can_read_and_write_values() {
    let rt = Runtime::new().unwrap();
    rt.block_on(test_requests_and_responses())
}

#[test]
fn closes_oldest_session_beyond_max() {
    let rt = Runtime::new().unwrap();
    rt.block_on(test_oldest_session_is_closed())
}

#[test]
fn can_read_and_write_values_over_rest() {
    let rt = Runtime::new().unwrap();
    rt.block_on(test_rest_requests_and_responses())
}
