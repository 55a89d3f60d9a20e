//! ACBX and ABD payload of an ADATCP data frame.
//!
//! A call is the ACBX, then every ABD header, then the payload of every
//! buffer with something to send. The reply mirrors it with the payload
//! of every buffer that received data. [`decode_request`] and
//! [`encode_reply`] are the server half, used by in-process endpoints.

use bytes::BytesMut;

use crate::abd::{Abd, Buffer, ABD_LENGTH};
use crate::acbx::{Acbx, ACBX_LENGTH};
use crate::codec::{Decoder, Encoder, Endian};
use crate::config::DEFAULT_MAX_PAYLOAD_BYTES;
use crate::error::Result;
use crate::response;

/// Encodes a call. Each ABD announces its full size as receive room.
pub fn encode_request(acbx: &Acbx, buffers: &mut [Buffer], order: Endian) -> BytesMut {
    let payload: usize = buffers
        .iter()
        .filter(|b| b.send_size() > 0)
        .map(|b| b.bytes().len())
        .sum();
    let mut buf = BytesMut::with_capacity(
        usize::from(ACBX_LENGTH) + buffers.len() * usize::from(ABD_LENGTH) + payload,
    );
    let mut enc = Encoder::new(&mut buf, order);
    acbx.encode(&mut enc);
    for buffer in buffers.iter_mut() {
        let size = buffer.size();
        buffer.abd_mut().recv = size;
        buffer.abd().encode(&mut enc);
    }
    for buffer in buffers.iter() {
        if buffer.send_size() > 0 {
            enc.put_slice(buffer.bytes());
        }
    }
    buf
}

/// Applies a reply to the caller's control block and buffers.
///
/// Buffer contents are only present when the response is at most EOF.
pub fn decode_reply(
    data: &[u8],
    acbx: &mut Acbx,
    buffers: &mut [Buffer],
    number_of_buffers: u32,
    order: Endian,
) -> Result<()> {
    let mut dec = Decoder::new(data, order);
    *acbx = Acbx::decode(&mut dec)?;
    if acbx.response > response::EOF || number_of_buffers == 0 {
        return Ok(());
    }
    let mut received = Vec::with_capacity(buffers.len());
    for buffer in buffers.iter_mut() {
        let abd = Abd::decode(&mut dec)?;
        buffer.abd_mut().send = abd.send;
        received.push(abd.recv);
    }
    for (buffer, recv) in buffers.iter_mut().zip(received) {
        if recv > 0 {
            let payload = dec.get_slice(recv as usize)?;
            buffer.set_received(payload);
        } else {
            buffer.abd_mut().recv = 0;
        }
    }
    Ok(())
}

/// Server side: decodes a call into its control block and buffers.
pub fn decode_request(
    data: &[u8],
    number_of_buffers: u32,
    order: Endian,
) -> Result<(Acbx, Vec<Buffer>)> {
    let mut dec = Decoder::new(data, order);
    let acbx = Acbx::decode(&mut dec)?;
    let fitting = data.len() / usize::from(ABD_LENGTH);
    let mut headers = Vec::with_capacity((number_of_buffers as usize).min(fitting));
    for _ in 0..number_of_buffers {
        headers.push(Abd::decode(&mut dec)?);
    }
    let mut buffers = Vec::with_capacity(headers.len());
    for abd in headers {
        let mut buffer = Buffer::from_abd(abd, DEFAULT_MAX_PAYLOAD_BYTES)?;
        if buffer.send_size() > 0 {
            let payload = dec.get_slice(buffer.size() as usize)?;
            buffer.bytes_mut().copy_from_slice(payload);
        }
        buffers.push(buffer);
    }
    Ok((acbx, buffers))
}

/// Server side: encodes a reply carrying `recv` bytes of every buffer.
pub fn encode_reply(acbx: &Acbx, buffers: &[Buffer], order: Endian) -> BytesMut {
    let mut buf = BytesMut::new();
    let mut enc = Encoder::new(&mut buf, order);
    acbx.encode(&mut enc);
    if acbx.response > response::EOF {
        return buf;
    }
    for buffer in buffers {
        buffer.abd().encode(&mut enc);
    }
    for buffer in buffers {
        enc.put_slice(buffer.received_bytes());
    }
    buf
}
