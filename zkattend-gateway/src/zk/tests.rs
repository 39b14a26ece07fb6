//! Gateway against an in-process fake terminal

use std::net::Ipv4Addr;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use zkattend_types::{DeviceDescriptor, PunchMode};

use super::codec::encode_time;
use super::commkey::make_commkey;
use super::packet::FRAME_PREFIX_SIZE;
use super::*;
use crate::Error;

const SESSION_ID: u16 = 0x1234;

async fn read_packet(stream: &mut TcpStream) -> Option<Packet> {
    let mut prefix = [0u8; FRAME_PREFIX_SIZE];
    stream.read_exact(&mut prefix).await.ok()?;
    let len = Packet::frame_len(&prefix).unwrap();
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await.unwrap();
    Some(Packet::decode(Bytes::from(body)).unwrap())
}

async fn reply(stream: &mut TcpStream, to: &Packet, command: Command, payload: impl Into<Bytes>) {
    let packet = Packet::with_payload(command, SESSION_ID, to.reply_id, payload);
    stream.write_all(&packet.encode_frame()).await.unwrap();
}

fn free_sizes(users: i32, records: i32) -> Vec<u8> {
    let mut payload = vec![0u8; 80];
    payload[16..20].copy_from_slice(&users.to_le_bytes());
    payload[32..36].copy_from_slice(&records.to_le_bytes());
    payload
}

fn attendance_table() -> Vec<u8> {
    let mut records = Vec::new();
    for (user, hour, punch) in [("1042", 9, 0u8), ("1042", 17, 1u8)] {
        let when = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap();
        let mut raw = vec![0u8; 40];
        raw[2..2 + user.len()].copy_from_slice(user.as_bytes());
        raw[26] = 1;
        raw[27..31].copy_from_slice(&encode_time(when).unwrap().to_le_bytes());
        raw[31] = punch;
        records.extend(raw);
    }
    let mut table = (records.len() as u32).to_le_bytes().to_vec();
    table.extend(records);
    table
}

/// Terminal that accepts one client and answers until `CMD_EXIT`
async fn fake_terminal(password: Option<u32>) -> (u16, JoinHandle<Vec<Command>>) {
    fake_terminal_announcing(password, None).await
}

/// Like [`fake_terminal`], but `CMD_PREPARE_BUFFER` announces `table_size`
/// instead of the real table length when given
async fn fake_terminal_announcing(
    password: Option<u32>,
    table_size: Option<u32>,
) -> (u16, JoinHandle<Vec<Command>>) {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut seen = Vec::new();
        let table = attendance_table();

        while let Some(request) = read_packet(&mut stream).await {
            seen.push(request.command);
            match request.command {
                Command::Connect if password.is_some() => {
                    reply(&mut stream, &request, Command::AckUnauth, Bytes::new()).await
                }
                Command::Auth => {
                    let expected = make_commkey(password.unwrap_or(0), SESSION_ID, 50);
                    let verdict = if request.payload[..] == expected[..] {
                        Command::AckOk
                    } else {
                        Command::AckUnauth
                    };
                    reply(&mut stream, &request, verdict, Bytes::new()).await
                }
                Command::GetFreeSizes => {
                    reply(&mut stream, &request, Command::AckOk, free_sizes(0, 2)).await
                }
                Command::PrepareBuffer => {
                    let mut payload = BytesMut::new();
                    payload.put_u8(0);
                    payload.put_u32_le(table_size.unwrap_or(table.len() as u32));
                    reply(&mut stream, &request, Command::AckOk, payload.freeze()).await
                }
                Command::ReadBuffer => {
                    // Announce the chunk, stream it in two parts, then acknowledge
                    let announce = (table.len() as u32).to_le_bytes().to_vec();
                    reply(&mut stream, &request, Command::PrepareData, announce).await;
                    let (head, tail) = table.split_at(30);
                    reply(&mut stream, &request, Command::RegEvent, Bytes::new()).await;
                    reply(&mut stream, &request, Command::Data, head.to_vec()).await;
                    reply(&mut stream, &request, Command::Data, tail.to_vec()).await;
                    reply(&mut stream, &request, Command::AckOk, Bytes::new()).await
                }
                Command::OptionsRrq => {
                    let value: &[u8] = if request.payload.starts_with(b"~DeviceName") {
                        b"~DeviceName=K40\0"
                    } else {
                        b"~SerialNumber=A8N5201160123\0"
                    };
                    reply(&mut stream, &request, Command::AckOk, value.to_vec()).await
                }
                Command::GetVersion => {
                    reply(&mut stream, &request, Command::AckOk, b"Ver 6.60 Apr 28 2017\0".to_vec())
                        .await
                }
                Command::Exit => {
                    reply(&mut stream, &request, Command::AckOk, Bytes::new()).await;
                    break;
                }
                _ => reply(&mut stream, &request, Command::AckOk, Bytes::new()).await,
            }
        }
        seen
    });

    (port, handle)
}

fn local_device(port: u16) -> DeviceDescriptor {
    DeviceDescriptor::new("Bench", Ipv4Addr::LOCALHOST)
        .unwrap()
        .with_port(port)
}

fn gateway() -> ZkGateway {
    ZkGateway::new().with_timeout(Duration::from_secs(2))
}

#[tokio::test]
async fn test_device_info() {
    let (port, terminal) = fake_terminal(None).await;

    let mut session = gateway().connect(&local_device(port)).await.unwrap();
    let info = session.device_info().await.unwrap();
    session.close().await.unwrap();

    assert_eq!(info.name, "K40");
    assert_eq!(info.serial_number, "A8N5201160123");
    assert_eq!(info.firmware_version, "Ver 6.60 Apr 28 2017");

    let seen = terminal.await.unwrap();
    assert_eq!(seen.first(), Some(&Command::Connect));
    assert_eq!(seen.last(), Some(&Command::Exit));
}

#[tokio::test]
async fn test_buffered_attendance_read() {
    let (port, terminal) = fake_terminal(None).await;

    let mut session = gateway().connect(&local_device(port)).await.unwrap();
    session.disable().await.unwrap();
    let records = session.list_attendance().await.unwrap();
    session.enable().await.unwrap();
    session.close().await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].user_id, "1042");
    assert_eq!(records[0].punch, PunchMode::CheckIn);
    assert_eq!(records[1].punch, PunchMode::CheckOut);
    assert_eq!(
        records[1].timestamp,
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(17, 0, 0)
            .unwrap()
    );

    let seen = terminal.await.unwrap();
    assert_eq!(
        seen,
        vec![
            Command::Connect,
            Command::DisableDevice,
            Command::GetFreeSizes,
            Command::PrepareBuffer,
            Command::ReadBuffer,
            Command::FreeData,
            Command::EnableDevice,
            Command::Exit,
        ]
    );
}

#[tokio::test]
async fn test_commkey_authentication() {
    let (port, terminal) = fake_terminal(Some(4321)).await;

    let mut session = gateway()
        .with_password(4321)
        .connect(&local_device(port))
        .await
        .unwrap();
    session.close().await.unwrap();

    let seen = terminal.await.unwrap();
    assert_eq!(seen, vec![Command::Connect, Command::Auth, Command::Exit]);
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let (port, _terminal) = fake_terminal(Some(4321)).await;

    let result = gateway()
        .with_password(1)
        .connect(&local_device(port))
        .await;

    assert!(matches!(result, Err(Error::AuthenticationFailed)));
}

#[tokio::test]
async fn test_unreachable_device_is_a_transport_error() {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = match gateway().connect(&local_device(port)).await {
        Ok(_) => panic!("connect to a closed port succeeded"),
        Err(e) => e,
    };
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_per_record_delete_is_unsupported() {
    let (port, _terminal) = fake_terminal(None).await;

    let mut session = gateway().connect(&local_device(port)).await.unwrap();
    let record = zkattend_types::AttendanceRecord::new(
        "1042",
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap(),
        1,
        0,
    );
    assert!(matches!(
        session.delete_attendance(&record).await,
        Err(Error::NotSupported(_))
    ));
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_restart_skips_exit() {
    let (port, terminal) = fake_terminal(None).await;

    let mut session = gateway().connect(&local_device(port)).await.unwrap();
    session.restart().await.unwrap();
    session.enable().await.unwrap();
    assert!(matches!(
        session.list_users().await,
        Err(Error::NotConnected)
    ));
    session.close().await.unwrap();

    let seen = terminal.await.unwrap();
    assert_eq!(seen, vec![Command::Connect, Command::Restart]);
}

#[tokio::test]
async fn test_oversized_transfer_is_refused() {
    let (port, terminal) = fake_terminal_announcing(None, Some(u32::MAX)).await;

    let mut session = gateway().connect(&local_device(port)).await.unwrap();
    assert!(matches!(
        session.list_attendance().await,
        Err(Error::Decode(_))
    ));
    session.close().await.unwrap();

    let seen = terminal.await.unwrap();
    assert_eq!(
        seen,
        vec![
            Command::Connect,
            Command::GetFreeSizes,
            Command::PrepareBuffer,
            Command::Exit,
        ]
    );
}
