//! One authenticated session with a ZKTeco terminal

use std::collections::HashMap;

use async_trait::async_trait;
use byteorder::{ByteOrder, LittleEndian};
use bytes::{BufMut, Bytes, BytesMut};
use chrono::NaiveDateTime;
use tracing::{debug, info, trace, warn};

use zkattend_types::{AttendanceRecord, DeviceInfo, UserRecord};

use super::codec::{self, StoredUser, USER_RECORD_72};
use super::command::Command;
use super::commkey::{DEFAULT_TICKS, make_commkey};
use super::link::TcpLink;
use super::packet::{MAX_FRAME_SIZE, Packet};
use crate::DeviceSession;
use crate::error::{Error, Result};

/// Largest chunk requested per `CMD_READ_BUFFER`
const MAX_CHUNK: usize = 0xFFC0;

/// Largest table accepted through the transfer buffer
const MAX_TABLE_SIZE: usize = 64 * MAX_FRAME_SIZE;

/// Reply id carried by `CMD_CONNECT`
const INITIAL_REPLY_ID: u16 = u16::MAX - 1;

/// Counters reported by `CMD_GET_FREE_SIZES`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FreeSizes {
    pub users: usize,
    pub records: usize,
}

impl FreeSizes {
    fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < 36 {
            return Err(Error::Decode(format!(
                "free sizes need 36 bytes, got {}",
                payload.len()
            )));
        }
        let field =
            |offset: usize| LittleEndian::read_i32(&payload[offset..offset + 4]).max(0) as usize;
        Ok(Self {
            users: field(16),
            records: field(32),
        })
    }
}

pub struct ZkSession {
    link: TcpLink,
    session_id: u16,
    reply_id: u16,
    restarting: bool,
}

impl ZkSession {
    /// Run the connect handshake, authenticating with `password` when asked
    pub async fn handshake(mut link: TcpLink, password: u32) -> Result<Self> {
        match Self::negotiate(&mut link, password).await {
            Ok((session_id, reply_id)) => {
                info!(
                    "Connected to {} (session_id={})",
                    link.addr(),
                    session_id
                );
                Ok(Self {
                    link,
                    session_id,
                    reply_id,
                    restarting: false,
                })
            }
            Err(e) => {
                link.shutdown().await;
                Err(e)
            }
        }
    }

    async fn negotiate(link: &mut TcpLink, password: u32) -> Result<(u16, u16)> {
        let mut reply_id = INITIAL_REPLY_ID;

        link.send(&Packet::new(Command::Connect, 0, reply_id)).await?;
        let response = link.receive().await?;
        let session_id = response.session_id;

        match response.command {
            Command::AckOk => Ok((session_id, reply_id)),
            Command::AckUnauth => {
                debug!("Device requires authentication (session_id={})", session_id);

                reply_id = reply_id.wrapping_add(1);
                let key = make_commkey(password, session_id, DEFAULT_TICKS);
                trace!("Auth key: {}", hex::encode(key));

                link.send(&Packet::with_payload(
                    Command::Auth,
                    session_id,
                    reply_id,
                    key.to_vec(),
                ))
                .await?;

                let response = link.receive().await?;
                match response.command {
                    Command::AckOk => Ok((session_id, reply_id)),
                    Command::AckUnauth | Command::AckError => Err(Error::AuthenticationFailed),
                    other => Err(Error::UnexpectedResponse {
                        command: Command::Auth,
                        response: other,
                    }),
                }
            }
            other if other.is_error() => Err(Error::DeviceRejected {
                command: Command::Connect,
                response: other,
            }),
            other => Err(Error::UnexpectedResponse {
                command: Command::Connect,
                response: other,
            }),
        }
    }

    fn next_packet(&mut self, command: Command, payload: impl Into<Bytes>) -> Packet {
        self.reply_id = self.reply_id.wrapping_add(1);
        Packet::with_payload(command, self.session_id, self.reply_id, payload)
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.restarting || !self.link.is_open() {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    /// Next packet from the terminal, skipping unsolicited realtime events
    async fn receive(&mut self) -> Result<Packet> {
        loop {
            let packet = self.link.receive().await?;
            if packet.command == Command::RegEvent {
                trace!("Ignoring realtime event");
                continue;
            }
            return Ok(packet);
        }
    }

    /// Send `command` and return the raw reply
    async fn request(&mut self, command: Command, payload: impl Into<Bytes>) -> Result<Packet> {
        self.ensure_usable()?;

        let packet = self.next_packet(command, payload);
        self.link.send(&packet).await?;
        self.receive().await
    }

    /// Send `command` and require an acknowledgement
    async fn execute(&mut self, command: Command, payload: impl Into<Bytes>) -> Result<Packet> {
        let response = self.request(command, payload).await?;
        if response.is_success() {
            Ok(response)
        } else if response.command.is_error() || response.command == Command::AckUnauth {
            Err(Error::DeviceRejected {
                command,
                response: response.command,
            })
        } else {
            Err(Error::UnexpectedResponse {
                command,
                response: response.command,
            })
        }
    }

    pub async fn free_sizes(&mut self) -> Result<FreeSizes> {
        let response = self.execute(Command::GetFreeSizes, Bytes::new()).await?;
        FreeSizes::decode(&response.payload)
    }

    /// Read one `~Key=value` option
    pub async fn read_option(&mut self, key: &str) -> Result<String> {
        let mut payload = key.as_bytes().to_vec();
        payload.push(0);

        let response = self.execute(Command::OptionsRrq, payload).await?;
        let text = response.payload_text();
        Ok(text
            .split_once('=')
            .map(|(_, value)| value.trim().to_string())
            .unwrap_or_default())
    }

    /// Pull a whole table through the terminal's transfer buffer
    async fn read_buffered(&mut self, command: Command, fct: u32, ext: u32) -> Result<Bytes> {
        let mut payload = BytesMut::with_capacity(11);
        payload.put_u8(1);
        payload.put_u16_le(command.into());
        payload.put_u32_le(fct);
        payload.put_u32_le(ext);

        let response = self.request(Command::PrepareBuffer, payload.freeze()).await?;
        let size = match response.command {
            Command::Data => return Ok(response.payload),
            Command::AckOk | Command::PrepareData if response.payload.len() >= 5 => {
                LittleEndian::read_u32(&response.payload[1..5]) as usize
            }
            other => {
                return Err(Error::DeviceRejected {
                    command: Command::PrepareBuffer,
                    response: other,
                });
            }
        };

        if size > MAX_TABLE_SIZE {
            return Err(Error::Decode(format!(
                "transfer of {} bytes exceeds the {} byte limit",
                size, MAX_TABLE_SIZE
            )));
        }
        debug!("Reading {} bytes of {}", size, command);

        let mut data = BytesMut::with_capacity(size.min(MAX_FRAME_SIZE));
        let mut start = 0;
        while start < size {
            let chunk = MAX_CHUNK.min(size - start);
            let mut request = BytesMut::with_capacity(8);
            request.put_u32_le(start as u32);
            request.put_u32_le(chunk as u32);

            let part = self.read_chunk(request.freeze(), chunk).await?;
            trace!("Chunk at {} brought {} bytes", start, part.len());
            data.put_slice(&part);
            start += chunk;
        }

        if let Err(e) = self.execute(Command::FreeData, Bytes::new()).await {
            warn!("Failed to free transfer buffer: {}", e);
        }

        Ok(data.freeze())
    }

    /// Read one chunk of at most `requested` bytes
    async fn read_chunk(&mut self, request: Bytes, requested: usize) -> Result<Bytes> {
        let response = self.request(Command::ReadBuffer, request).await?;
        match response.command {
            Command::Data => Ok(response.payload),
            Command::PrepareData if response.payload.len() >= 4 => {
                let expected = LittleEndian::read_u32(&response.payload[..4]) as usize;
                if expected > requested {
                    return Err(Error::Decode(format!(
                        "chunk of {} bytes announced, {} requested",
                        expected, requested
                    )));
                }
                let mut chunk = BytesMut::with_capacity(expected);

                while chunk.len() < expected {
                    let packet = self.receive().await?;
                    match packet.command {
                        Command::Data => chunk.put_slice(&packet.payload),
                        other => {
                            return Err(Error::UnexpectedResponse {
                                command: Command::ReadBuffer,
                                response: other,
                            });
                        }
                    }
                }

                let ack = self.receive().await?;
                if !ack.is_success() {
                    return Err(Error::UnexpectedResponse {
                        command: Command::ReadBuffer,
                        response: ack.command,
                    });
                }
                Ok(chunk.freeze())
            }
            other => Err(Error::DeviceRejected {
                command: Command::ReadBuffer,
                response: other,
            }),
        }
    }

    /// Users with their slot numbers and the terminal's record size
    pub async fn stored_users(&mut self) -> Result<(usize, Vec<StoredUser>)> {
        let sizes = self.free_sizes().await?;
        if sizes.users == 0 {
            return Ok((USER_RECORD_72, Vec::new()));
        }
        let data = self.read_buffered(Command::UserTempRrq, 5, 0).await?;
        codec::decode_users(&data, sizes.users)
    }
}

#[async_trait]
impl DeviceSession for ZkSession {
    async fn disable(&mut self) -> Result<()> {
        debug!("Disabling device...");
        self.execute(Command::DisableDevice, Bytes::new()).await?;
        Ok(())
    }

    async fn enable(&mut self) -> Result<()> {
        if self.restarting {
            return Ok(());
        }
        debug!("Enabling device...");
        self.execute(Command::EnableDevice, Bytes::new()).await?;
        Ok(())
    }

    async fn list_attendance(&mut self) -> Result<Vec<AttendanceRecord>> {
        let sizes = self.free_sizes().await?;
        if sizes.records == 0 {
            return Ok(Vec::new());
        }

        let data = self.read_buffered(Command::AttLogRrq, 0, 0).await?;

        let body = data.len().saturating_sub(4);
        let uid_map: HashMap<u16, String> = if sizes.records * 8 == body {
            self.stored_users()
                .await?
                .1
                .into_iter()
                .map(|stored| (stored.uid, stored.user.user_id))
                .collect()
        } else {
            HashMap::new()
        };

        let records = codec::decode_attendance(&data, sizes.records, &uid_map)?;
        debug!("Read {} attendance records", records.len());
        Ok(records)
    }

    async fn list_users(&mut self) -> Result<Vec<UserRecord>> {
        let (_, users) = self.stored_users().await?;
        Ok(users.into_iter().map(|stored| stored.user).collect())
    }

    async fn set_clock(&mut self, at: NaiveDateTime) -> Result<()> {
        let encoded = codec::encode_time(at)?;
        self.execute(Command::SetTime, encoded.to_le_bytes().to_vec())
            .await?;
        info!("Device clock set to {}", at);
        Ok(())
    }

    async fn restart(&mut self) -> Result<()> {
        self.ensure_usable()?;
        let packet = self.next_packet(Command::Restart, Bytes::new());
        self.link.send(&packet).await?;
        self.restarting = true;
        info!("Restart requested for {}", self.link.addr());
        Ok(())
    }

    async fn create_user(&mut self, user: &UserRecord) -> Result<()> {
        let (size, users) = self.stored_users().await?;

        let uid = match users.iter().find(|stored| stored.user.user_id == user.user_id) {
            Some(existing) => existing.uid,
            None => users
                .iter()
                .map(|stored| stored.uid)
                .max()
                .unwrap_or(0)
                .checked_add(1)
                .ok_or_else(|| Error::InvalidRecord("no free user slot".into()))?,
        };

        let record = codec::encode_user(uid, user, size)?;
        self.execute(Command::UserWrq, record.freeze()).await?;
        self.execute(Command::RefreshData, Bytes::new()).await?;

        info!("Stored user {} in slot {}", user.user_id, uid);
        Ok(())
    }

    async fn delete_attendance(&mut self, _record: &AttendanceRecord) -> Result<()> {
        Err(Error::NotSupported(
            "terminal firmware offers no per-record attendance deletion".into(),
        ))
    }

    async fn device_info(&mut self) -> Result<DeviceInfo> {
        let name = self.read_option("~DeviceName").await?;
        let serial = self.read_option("~SerialNumber").await?;
        let firmware = self
            .execute(Command::GetVersion, Bytes::new())
            .await?
            .payload_text();

        let info = DeviceInfo::new(name, serial, firmware);
        debug!("Device info: {}", info);
        Ok(info)
    }

    async fn close(&mut self) -> Result<()> {
        if !self.link.is_open() {
            return Ok(());
        }

        if !self.restarting {
            let packet = self.next_packet(Command::Exit, Bytes::new());
            if let Err(e) = self.link.send(&packet).await {
                warn!("Failed to send EXIT command: {}", e);
            }
        }

        self.link.shutdown().await;
        debug!("Disconnected");
        Ok(())
    }
}
