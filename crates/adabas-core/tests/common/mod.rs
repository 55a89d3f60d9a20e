//! Shared fixtures: an in-process ADATCP database on a loopback port.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use adabas_core::abd::Buffer;
use adabas_core::acbx::{Acbx, CommandCode};
use adabas_core::codec::Endian;
use adabas_core::frame::{
    BufferType, ConnectPayload, DataHeader, DataType, OuterHeader, CONNECT_PAYLOAD_LENGTH,
    DATA_HEADER_LENGTH, DISCONNECT_PAYLOAD_LENGTH, OUTER_HEADER_LENGTH,
};
use adabas_core::id::AdaId;
use adabas_core::url::Url;
use adabas_core::wire;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const NEW_EMPLOYEE_FDT: &[u8] = include_bytes!("../data/new_employee.fdt");

/// Database id served by the fake database.
pub const DBID: u32 = 12;

/// Answers one call by editing the control block and buffers in place.
pub type Handler = Arc<dyn Fn(&mut Acbx, &mut [Buffer]) + Send + Sync>;

/// One call as seen by the database.
#[derive(Debug, Clone)]
pub struct Call {
    pub command: CommandCode,
    pub sizes: Vec<u64>,
}

pub struct FakeDatabase {
    pub url: Url,
    pub calls: Arc<Mutex<Vec<Call>>>,
}

impl FakeDatabase {
    pub fn commands(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.command.to_string())
            .collect()
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Copies `data` into the buffer and marks it as received.
pub fn fill(buffer: &mut Buffer, data: &[u8]) {
    if (buffer.size() as usize) < data.len() {
        buffer.grow(data.len());
    }
    buffer.bytes_mut()[..data.len()].copy_from_slice(data);
    buffer.abd_mut().recv = data.len() as u64;
}

async fn read_frame(stream: &mut TcpStream) -> Option<(OuterHeader, Vec<u8>)> {
    let mut head = [0u8; OUTER_HEADER_LENGTH];
    stream.read_exact(&mut head).await.ok()?;
    let header = OuterHeader::decode(&head).ok()?;
    let mut rest = vec![0u8; header.length as usize - OUTER_HEADER_LENGTH];
    stream.read_exact(&mut rest).await.ok()?;
    Some((header, rest))
}

async fn serve(mut stream: TcpStream, handler: Handler, calls: Arc<Mutex<Vec<Call>>>) {
    let order = Endian::host();
    let Some((_, payload)) = read_frame(&mut stream).await else {
        return;
    };
    let Ok(request) = ConnectPayload::decode(&payload) else {
        return;
    };
    let mut reply = OuterHeader::new(BufferType::ConnectReply);
    reply.length = (OUTER_HEADER_LENGTH + CONNECT_PAYLOAD_LENGTH) as u32;
    reply.identification = [0x42; 16];
    reply.database_type = b'C';
    let mut answer = ConnectPayload::request(&AdaId::with_names("fake", "fake"), request.dbid, Endian::Big);
    answer.database_name[..8].copy_from_slice(b"EMPLOYEE");
    let mut frame = BytesMut::new();
    reply.encode(&mut frame);
    answer.encode(&mut frame);
    if stream.write_all(&frame).await.is_err() {
        return;
    }

    while let Some((header, rest)) = read_frame(&mut stream).await {
        if header.kind() == Some(BufferType::DisconnectRequest) {
            let mut reply = OuterHeader::new(BufferType::DisconnectReply);
            reply.length = header.length;
            let mut frame = BytesMut::new();
            reply.encode(&mut frame);
            frame.extend_from_slice(&[0u8; DISCONNECT_PAYLOAD_LENGTH]);
            let _ = stream.write_all(&frame).await;
            return;
        }
        let data_header = DataHeader::decode(&rest, order).unwrap();
        let (mut acbx, mut buffers) =
            wire::decode_request(&rest[DATA_HEADER_LENGTH..], data_header.number_of_buffers, order)
                .unwrap();
        calls.lock().unwrap().push(Call {
            command: acbx.command,
            sizes: buffers.iter().map(Buffer::size).collect(),
        });
        acbx.response = 0;
        for buffer in buffers.iter_mut() {
            buffer.abd_mut().recv = 0;
        }
        handler(&mut acbx, &mut buffers);
        let payload = wire::encode_reply(&acbx, &buffers, order);

        let mut reply = OuterHeader::new(BufferType::DataReply);
        reply.length = (OUTER_HEADER_LENGTH + DATA_HEADER_LENGTH + payload.len()) as u32;
        let mut out_header = DataHeader::new(DataType::AdabasReply);
        out_header.number_of_buffers = buffers.len() as u32;
        out_header.length = (DATA_HEADER_LENGTH + payload.len()) as u32;
        let mut frame = BytesMut::new();
        reply.encode(&mut frame);
        out_header.encode(&mut frame, order);
        frame.extend_from_slice(&payload);
        if stream.write_all(&frame).await.is_err() {
            return;
        }
    }
}

/// Starts a database that answers every connection with `handler`.
pub async fn start(handler: Handler) -> FakeDatabase {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let recorded = calls.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve(stream, handler.clone(), recorded.clone()));
        }
    });
    FakeDatabase {
        url: Url::adatcp(DBID, "127.0.0.1", port).unwrap(),
        calls,
    }
}

/// A database that accepts every call, reports an open-systems platform on
/// OP and returns the new employee FDT on LF.
pub fn employee_handler() -> Handler {
    Arc::new(|acbx: &mut Acbx, buffers: &mut [Buffer]| {
        if acbx.command == CommandCode::OP {
            acbx.isn_lower_limit = 0x2100_0000;
        } else if acbx.command == CommandCode::LF {
            if let Some(record) = buffers.iter_mut().find(|b| b.id() == b'R') {
                fill(record, NEW_EMPLOYEE_FDT);
            }
        }
    })
}
