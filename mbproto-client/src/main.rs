//! Command-line Modbus/TCP client

use std::fmt::Formatter;
use std::net::SocketAddr;
use std::num::ParseIntError;
use std::str::FromStr;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio::net::TcpStream;

use mbproto::client::ClientSession;
use mbproto::*;

#[derive(Debug)]
enum Error {
    BadRange(AddressError),
    BadInt(ParseIntError),
    BadCharInBitString(char),
    Request(RequestError),
}

#[derive(Parser)]
#[command(name = "mbproto-client")]
#[command(about = "A command line program for making Modbus/TCP client requests using the mbproto crate")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "127.0.0.1:502", help = "A socket address")]
    host: SocketAddr,

    #[arg(short = 'i', long, default_value = "1", help = "The unit id of Modbus server")]
    id: u8,

    #[arg(short = 'p', long, help = "Optional polling period in milliseconds")]
    period: Option<u64>,

    #[arg(short = 't', long, default_value = "1000", help = "Response timeout in milliseconds")]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(name = "rc", about = "read coils")]
    ReadCoils(ReadArgs),

    #[command(name = "rdi", about = "read discrete inputs")]
    ReadDiscreteInputs(ReadArgs),

    #[command(name = "rhr", about = "read holding registers")]
    ReadHoldingRegisters(ReadArgs),

    #[command(name = "rir", about = "read input registers")]
    ReadInputRegisters(ReadArgs),

    #[command(name = "rf", about = "read a 32-bit float from two holding registers, low register first")]
    ReadFloat(ReadFloatArgs),

    #[command(name = "wsc", about = "write single coil")]
    WriteSingleCoil(WriteSingleCoilArgs),

    #[command(name = "wsr", about = "write single register")]
    WriteSingleRegister(WriteSingleRegisterArgs),

    #[command(name = "wmc", about = "write multiple coils")]
    WriteMultipleCoils(WriteMultipleCoilsArgs),

    #[command(name = "wmr", about = "write multiple registers")]
    WriteMultipleRegisters(WriteMultipleRegistersArgs),
}

#[derive(Args)]
struct ReadArgs {
    #[arg(short = 's', long, help = "the starting address")]
    start: u16,

    #[arg(short = 'q', long, help = "quantity of values")]
    quantity: u16,
}

#[derive(Args)]
struct ReadFloatArgs {
    #[arg(short = 's', long, help = "the address of the low register")]
    start: u16,
}

#[derive(Args)]
struct WriteSingleCoilArgs {
    #[arg(short = 'i', long, help = "the address of the coil")]
    index: u16,

    #[arg(short = 'v', long, help = "the value of the coil (true or false)")]
    value: bool,
}

#[derive(Args)]
struct WriteSingleRegisterArgs {
    #[arg(short = 'i', long, help = "the address of the register")]
    index: u16,

    #[arg(short = 'v', long, help = "the value of the register")]
    value: u16,
}

#[derive(Args)]
struct WriteMultipleCoilsArgs {
    #[arg(short = 's', long, help = "the starting address of the coils")]
    start: u16,

    #[arg(
        short = 'v',
        long,
        help = "the values of the coils specified as a string of 1 and 0 (e.g. 10100011)"
    )]
    values: String,
}

#[derive(Args)]
struct WriteMultipleRegistersArgs {
    #[arg(short = 's', long, help = "the starting address of the registers")]
    start: u16,

    #[arg(
        short = 'v',
        long,
        help = "the values of the registers specified as a comma delimited list (e.g. 1,4,7)"
    )]
    values: String,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    if let Err(ref e) = run().await {
        println!("error: {e}");
    }

    Ok(())
}

async fn run() -> Result<(), Error> {
    let cli = Cli::parse();

    let mut session = ClientSession::connect(
        cli.host,
        UnitId::new(cli.id),
        Duration::from_millis(cli.timeout),
        AppDecodeLevel::DataValues.into(),
    )
    .await?;

    match cli.period {
        None => run_command(&cli.command, &mut session).await,
        Some(period_ms) => {
            let period = Duration::from_millis(period_ms);
            loop {
                if let Err(err) = run_command(&cli.command, &mut session).await {
                    match err {
                        // the connection is gone, polling cannot continue
                        Error::Request(RequestError::Io(_)) => return Err(err),
                        _ => tracing::warn!("{err}"),
                    }
                }
                tokio::time::sleep(period).await
            }
        }
    }
}

async fn run_command(
    command: &Command,
    session: &mut ClientSession<TcpStream>,
) -> Result<(), Error> {
    match command {
        Command::ReadCoils(args) => {
            let range = AddressRange::try_from(args.start.into(), args.quantity)?;
            for x in session.read_coils(range).await? {
                println!("index: {} value: {}", x.index, x.value)
            }
        }
        Command::ReadDiscreteInputs(args) => {
            let range = AddressRange::try_from(args.start.into(), args.quantity)?;
            for x in session.read_discrete_inputs(range).await? {
                println!("index: {} value: {}", x.index, x.value)
            }
        }
        Command::ReadHoldingRegisters(args) => {
            let range = AddressRange::try_from(args.start.into(), args.quantity)?;
            for x in session.read_holding_registers(range).await? {
                println!("index: {} value: {}", x.index, x.value)
            }
        }
        Command::ReadInputRegisters(args) => {
            let range = AddressRange::try_from(args.start.into(), args.quantity)?;
            for x in session.read_input_registers(range).await? {
                println!("index: {} value: {}", x.index, x.value)
            }
        }
        Command::ReadFloat(args) => {
            let value = session.read_holding_float32(args.start.into()).await?;
            println!("index: {} value: {}", args.start, value)
        }
        Command::WriteSingleCoil(args) => {
            let indexed = Indexed::new(args.index.into(), args.value);
            session.write_single_coil(indexed).await?;
        }
        Command::WriteSingleRegister(args) => {
            let indexed = Indexed::new(args.index.into(), args.value);
            session.write_single_register(indexed).await?;
        }
        Command::WriteMultipleCoils(args) => {
            let values = parse_bit_values(&args.values)?;
            let write_multiple = WriteMultiple::from(args.start.into(), values)?;
            session.write_multiple_coils(write_multiple).await?;
        }
        Command::WriteMultipleRegisters(args) => {
            let values = parse_register_values(&args.values)?;
            let write_multiple = WriteMultiple::from(args.start.into(), values)?;
            session.write_multiple_registers(write_multiple).await?;
        }
    }
    Ok(())
}

/// first character is the lowest address
fn parse_bit_values(values_str: &str) -> Result<Vec<bool>, Error> {
    values_str
        .chars()
        .map(|c| match c {
            '0' => Ok(false),
            '1' => Ok(true),
            _ => Err(Error::BadCharInBitString(c)),
        })
        .collect()
}

fn parse_register_values(values_str: &str) -> Result<Vec<u16>, ParseIntError> {
    values_str.split(',').map(|x| u16::from_str(x.trim())).collect()
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        match self {
            Error::BadRange(err) => write!(f, "{err}"),
            Error::BadInt(err) => err.fmt(f),
            Error::BadCharInBitString(char) => write!(f, "Bad character in bit string: {char}"),
            Error::Request(err) => err.fmt(f),
        }
    }
}

impl From<RequestError> for Error {
    fn from(err: RequestError) -> Self {
        Error::Request(err)
    }
}

impl From<ParseIntError> for Error {
    fn from(err: ParseIntError) -> Self {
        Error::BadInt(err)
    }
}

impl From<AddressError> for Error {
    fn from(err: AddressError) -> Self {
        Error::BadRange(err)
    }
}

impl From<InvalidRequest> for Error {
    fn from(err: InvalidRequest) -> Self {
        Error::Request(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bit_strings_in_address_order() {
        assert_eq!(parse_bit_values("1101").unwrap(), vec![true, true, false, true]);
        assert!(matches!(
            parse_bit_values("10x"),
            Err(Error::BadCharInBitString('x'))
        ));
    }

    #[test]
    fn parses_register_lists() {
        assert_eq!(parse_register_values("1, 4,7").unwrap(), vec![1, 4, 7]);
        assert!(parse_register_values("1,65536").is_err());
    }
}
