//! The request/response channel to a helper process.
//!
//! The protocol is strictly synchronous: one request goes out, its complete
//! response comes back, and only then may the next request be sent. That
//! discipline is enforced at the type level. [`HelperChannel::send`] hands
//! back a [`PendingResponse`] that mutably borrows the channel, so a second
//! send cannot even be written until the response is consumed. Dropping a
//! [`PendingResponse`] without receiving it abandons a response mid-stream,
//! which poisons the channel.
//!
//! Poisoning is one-way. After any framing error, desync, or pipe failure,
//! the stream position is untrustworthy and every further request fails
//! fast; recovery is a new channel to a new helper process.

use bytes::Bytes;
use std::io::{Read, Write};

use porter_core::wire::{ChunkHeader, HelperCommand, HEADER_LEN, MAX_CHUNK_DATA};

use crate::error::ImportError;
use crate::helper::HelperGuard;

pub struct HelperChannel {
    reader: Box<dyn Read + Send>,
    writer: Box<dyn Write + Send>,
    /// Keeps the helper process alive and reaps it on drop.
    guard: Option<HelperGuard>,
    next_request_id: u32,
    poisoned: bool,
}

impl HelperChannel {
    /// Build a channel from raw transport halves. `reader` carries the
    /// helper's output, `writer` feeds its input.
    pub fn from_parts(
        reader: impl Read + Send + 'static,
        writer: impl Write + Send + 'static,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            guard: None,
            next_request_id: 0,
            poisoned: false,
        }
    }

    pub(crate) fn attach_guard(&mut self, guard: HelperGuard) {
        self.guard = Some(guard);
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// PID of the attached helper process, when this channel owns one.
    pub fn helper_pid(&self) -> Option<u32> {
        self.guard.as_ref().map(|g| g.pid())
    }

    pub(crate) fn poison(&mut self) {
        if !self.poisoned {
            self.poisoned = true;
            tracing::warn!("helper channel poisoned");
        }
    }

    /// Send one request. The response must be taken from the returned
    /// [`PendingResponse`] before the channel can be used again.
    pub fn send(
        &mut self,
        command: HelperCommand,
        payload: &[u8],
    ) -> Result<PendingResponse<'_>, ImportError> {
        if self.poisoned {
            return Err(ImportError::Poisoned);
        }
        let data_length = u32::try_from(payload.len())
            .map_err(|_| ImportError::framing("request payload exceeds u32 length"))?;

        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);

        let header = ChunkHeader::new(request_id, command, 0, data_length);
        let io_result = self
            .writer
            .write_all(&header.encode())
            .and_then(|_| self.writer.write_all(payload))
            .and_then(|_| self.writer.flush());
        if let Err(e) = io_result {
            self.poison();
            return Err(ImportError::HelperDied(e));
        }

        tracing::trace!(request_id, command = ?command, payload_len = payload.len(), "request sent");
        Ok(PendingResponse { channel: self, request_id, received: false })
    }

    /// Send a request and block for its complete response.
    pub fn request(
        &mut self,
        command: HelperCommand,
        payload: &[u8],
    ) -> Result<Bytes, ImportError> {
        self.send(command, payload)?.receive()
    }

    fn read_header(&mut self) -> Result<ChunkHeader, ImportError> {
        let mut buf = [0u8; HEADER_LEN];
        if let Err(e) = self.reader.read_exact(&mut buf) {
            self.poison();
            return Err(ImportError::HelperDied(e));
        }
        let header = match ChunkHeader::decode(&buf) {
            Ok(header) => header,
            Err(e) => {
                self.poison();
                return Err(ImportError::framing(e.to_string()));
            }
        };
        if header.data_length() > MAX_CHUNK_DATA {
            self.poison();
            return Err(ImportError::framing(format!(
                "chunk claims {} payload bytes, cap is {}",
                header.data_length(),
                MAX_CHUNK_DATA
            )));
        }
        Ok(header)
    }

    fn read_payload(&mut self, len: usize) -> Result<Vec<u8>, ImportError> {
        let mut buf = vec![0u8; len];
        if let Err(e) = self.reader.read_exact(&mut buf) {
            self.poison();
            return Err(ImportError::HelperDied(e));
        }
        Ok(buf)
    }

    /// Read and reassemble the response for `expected_id`.
    fn receive_response(&mut self, expected_id: u32) -> Result<Bytes, ImportError> {
        let mut assembled: Vec<u8> = Vec::new();
        let mut chunks = 0u32;
        loop {
            let header = self.read_header()?;
            if header.request_id() != expected_id {
                self.poison();
                return Err(ImportError::desync(format!(
                    "response for request {} while request {} is outstanding",
                    header.request_id(),
                    expected_id
                )));
            }

            let payload = self.read_payload(header.data_length() as usize)?;

            // An error chunk terminates the response no matter what was
            // already assembled. The channel itself stays healthy.
            if header.is_error() {
                tracing::debug!(request_id = expected_id, "helper reported an error");
                return Err(ImportError::remote_from_payload(&payload));
            }

            match header.command() {
                Ok(HelperCommand::Response) => {}
                Ok(other) => {
                    self.poison();
                    return Err(ImportError::desync(format!(
                        "chunk for request {expected_id} carries command {other:?}, not a response"
                    )));
                }
                Err(e) => {
                    self.poison();
                    return Err(ImportError::framing(e.to_string()));
                }
            }

            assembled.extend_from_slice(&payload);
            chunks += 1;
            if !header.has_more_chunks() {
                tracing::trace!(
                    request_id = expected_id,
                    chunks,
                    total_len = assembled.len(),
                    "response assembled"
                );
                return Ok(Bytes::from(assembled));
            }
        }
    }

    /// Read the unsolicited STARTED chunk the helper sends before anything
    /// else, returning its raw payload.
    pub(crate) fn read_startup_chunk(&mut self) -> Result<Bytes, ImportError> {
        let header = self.read_header()?;
        let payload = self.read_payload(header.data_length() as usize)?;

        if header.is_error() {
            // Startup failure: repository missing, bad arguments, and so on.
            // Nothing useful can follow.
            self.poison();
            return Err(ImportError::remote_from_payload(&payload));
        }
        match header.command() {
            Ok(HelperCommand::Started) => {}
            _ => {
                self.poison();
                return Err(ImportError::framing(format!(
                    "expected startup chunk, got command code {}",
                    header.command_code()
                )));
            }
        }
        if header.has_more_chunks() {
            self.poison();
            return Err(ImportError::framing("startup payload must be a single chunk"));
        }
        Ok(Bytes::from(payload))
    }
}

/// A request in flight.
///
/// Holds the channel mutably until the response is received, making the
/// one-outstanding-request rule a compile-time property.
#[must_use = "receive the response, or dropping this poisons the channel"]
pub struct PendingResponse<'a> {
    channel: &'a mut HelperChannel,
    request_id: u32,
    received: bool,
}

impl<'a> PendingResponse<'a> {
    pub fn request_id(&self) -> u32 {
        self.request_id
    }

    /// Block until the full response arrives.
    pub fn receive(mut self) -> Result<Bytes, ImportError> {
        self.received = true;
        self.channel.receive_response(self.request_id)
    }
}

impl Drop for PendingResponse<'_> {
    fn drop(&mut self) {
        if !self.received {
            tracing::warn!(
                request_id = self.request_id,
                "request dropped before its response was received"
            );
            self.channel.poison();
        }
    }
}
