//! ADATCP driver: connect handshake, data exchange, cluster node list and
//! disconnect over TCP or TLS.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

use crate::abd::Buffer;
use crate::acbx::Acbx;
use crate::codec::Endian;
use crate::config::ClientConfig;
use crate::driver::TransportDriver;
use crate::error::{AdabasError, GenericError, Result};
use crate::frame::{
    trimmed, BufferType, ConnectPayload, DataHeader, DataType, DatabaseType, OuterHeader,
    CONNECT_PAYLOAD_LENGTH, DATA_HEADER_LENGTH, DISCONNECT_PAYLOAD_LENGTH, NODE_LIST_LENGTH,
    OUTER_HEADER_LENGTH,
};
use crate::id::AdaId;
use crate::logging::{hex_dump, Logger};
use crate::tls::TlsConnector;
use crate::url::{Driver, Url};
use crate::wire;

/// Byte stream an ADATCP session runs on.
pub trait AdaStream: AsyncRead + AsyncWrite + Unpin + Send + Sync {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + Sync> AdaStream for T {}

const HEADERS_LENGTH: usize = OUTER_HEADER_LENGTH + DATA_HEADER_LENGTH;

/// What the server announced in its connect reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSession {
    /// Connection id assigned by the server.
    pub uuid: Uuid,
    /// Byte order the server declared.
    pub endianness: Option<Endian>,
    /// Character set code, 1 for ASCII-8.
    pub charset: u8,
    /// Floating point format code, 1 for IEEE.
    pub float_format: u8,
    /// Database version text.
    pub database_version: String,
    /// Database name.
    pub database_name: String,
    /// Database id the server answered for.
    pub dbid: u32,
    /// Single or cluster database.
    pub database_type: Option<DatabaseType>,
}

/// ADATCP connection to one database target.
pub struct AdaTcp {
    url: Url,
    id: AdaId,
    config: ClientConfig,
    logger: Arc<dyn Logger>,
    order: Endian,
    tls: Option<TlsConnector>,
    stream: Option<Box<dyn AdaStream>>,
    session: Option<ServerSession>,
    cluster_nodes: Vec<Url>,
}

impl fmt::Debug for AdaTcp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaTcp")
            .field("url", &self.url.to_string())
            .field("connected", &self.stream.is_some())
            .field("session", &self.session)
            .field("cluster_nodes", &self.cluster_nodes.len())
            .finish()
    }
}

impl AdaTcp {
    /// Driver for an `adatcp` or `adatcps` URL; other schemes fail with 131.
    pub fn new(url: Url, id: AdaId, config: ClientConfig, logger: Arc<dyn Logger>) -> Result<Self> {
        let tls = match url.driver {
            Driver::AdaTcp => None,
            Driver::AdaTcps => Some(TlsConnector::new(&config.tls)?),
            other => return Err(GenericError::unknown_driver(other.as_str()).into()),
        };
        Ok(Self {
            url,
            id,
            config,
            logger,
            order: Endian::host(),
            tls,
            stream: None,
            session: None,
            cluster_nodes: Vec::new(),
        })
    }

    /// Target of this driver.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Server data of the current session.
    pub fn session(&self) -> Option<&ServerSession> {
        self.session.as_ref()
    }

    /// Cluster members announced by the server; the master comes first.
    pub fn cluster_nodes(&self) -> &[Url] {
        &self.cluster_nodes
    }

    async fn dial(&self) -> Result<Box<dyn AdaStream>> {
        let addr = self.url.address();
        let timeout_ms = self.config.tcp.connect_timeout_ms;
        let stream = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            tokio::net::TcpStream::connect(&addr),
        )
        .await
        .map_err(|_| AdabasError::ConnectTimeout {
            addr: addr.clone(),
            timeout_ms,
        })??;
        if self.config.tcp.nodelay {
            stream.set_nodelay(true)?;
        }
        tracing::debug!(addr = %addr, driver = %self.url.driver, "TCP connected");
        match &self.tls {
            None => Ok(Box::new(stream)),
            Some(connector) => {
                let name = self
                    .config
                    .tls
                    .server_name
                    .as_deref()
                    .unwrap_or(&self.url.host);
                let stream = connector.connect(name, stream).await?;
                tracing::debug!(
                    addr = %addr,
                    verified = connector.is_verified(),
                    "TLS handshake complete"
                );
                Ok(Box::new(stream))
            }
        }
    }

    fn stream(&mut self) -> Result<&mut Box<dyn AdaStream>> {
        self.stream
            .as_mut()
            .ok_or_else(|| GenericError::already_disconnected().into())
    }

    fn trace(&self, title: &str, data: &[u8]) {
        if self.logger.is_debug() {
            self.logger.debug(format_args!("{}", hex_dump(title, data, 16)));
        }
    }

    async fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.trace("SND", frame);
        let stream = self.stream()?;
        stream.write_all(frame).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let stream = self.stream()?;
        let mut data = vec![0u8; n];
        stream.read_exact(&mut data).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                AdabasError::from(GenericError::short_read(format!("{} bytes expected", n)))
            } else {
                AdabasError::from(e)
            }
        })?;
        Ok(data)
    }

    async fn handshake(&mut self, dbid: u32) -> Result<()> {
        let mut header = OuterHeader::new(BufferType::ConnectRequest);
        header.length = (OUTER_HEADER_LENGTH + CONNECT_PAYLOAD_LENGTH) as u32;
        let payload = ConnectPayload::request(&self.id, dbid, self.order);
        let mut frame = BytesMut::with_capacity(header.length as usize);
        header.encode(&mut frame);
        payload.encode(&mut frame);
        self.write_frame(&frame).await?;

        let reply = self.read_exact(frame.len()).await?;
        self.trace("RCV", &reply);
        let header = OuterHeader::decode(&reply)?;
        if !header.has_eyecatcher() {
            return Err(GenericError::missing_eyecatcher("Connect reply").into());
        }
        if header.kind() != Some(BufferType::ConnectReply) {
            return Err(GenericError::connect_reply_type(header.buffer_type).into());
        }
        let payload = ConnectPayload::decode(&reply[OUTER_HEADER_LENGTH..])?;
        let session = ServerSession {
            uuid: Uuid::from_bytes(header.identification),
            endianness: Endian::from_wire_flag(payload.endianness),
            charset: payload.charset,
            float_format: payload.float_format,
            database_version: trimmed(&payload.database_version),
            database_name: trimmed(&payload.database_name),
            dbid: payload.dbid,
            database_type: DatabaseType::from_u8(header.database_type),
        };
        tracing::debug!(
            url = %self.url,
            uuid = %session.uuid,
            database = %session.database_name,
            "ADATCP session established"
        );
        self.session = Some(session);
        Ok(())
    }

    async fn establish(&mut self, dbid: u32) -> Result<()> {
        self.handshake(dbid).await?;
        let cluster = self
            .session
            .as_ref()
            .is_some_and(|s| s.database_type == Some(DatabaseType::Cluster));
        if cluster {
            self.request_cluster_nodes().await?;
        }
        Ok(())
    }

    fn identification(&self) -> [u8; 16] {
        self.session
            .as_ref()
            .map(|s| *s.uuid.as_bytes())
            .unwrap_or_default()
    }

    /// Sends a data request frame around `payload`.
    pub async fn send_data(
        &mut self,
        payload: &[u8],
        data_type: DataType,
        number_of_buffers: u32,
    ) -> Result<()> {
        let mut header = OuterHeader::new(BufferType::DataRequest);
        header.identification = self.identification();
        header.length = (HEADERS_LENGTH + payload.len()) as u32;
        let mut data_header = DataHeader::new(data_type);
        data_header.number_of_buffers = number_of_buffers;
        data_header.length = if data_type == DataType::ClusterNodesRequest {
            DATA_HEADER_LENGTH as u32 + NODE_LIST_LENGTH
        } else {
            (DATA_HEADER_LENGTH + payload.len()) as u32
        };
        let mut frame = BytesMut::with_capacity(header.length as usize);
        header.encode(&mut frame);
        data_header.encode(&mut frame, self.order);
        frame.extend_from_slice(payload);
        self.write_frame(&frame).await
    }

    /// Reads a data reply; returns its payload and buffer count.
    pub async fn receive_data(&mut self, expected: DataType) -> Result<(Vec<u8>, u32)> {
        let headers = self.read_exact(HEADERS_LENGTH).await?;
        self.trace("RCV header", &headers);
        let header = OuterHeader::decode(&headers)?;
        if !header.has_eyecatcher() {
            return Err(GenericError::missing_eyecatcher("Data reply").into());
        }
        if header.kind() != Some(BufferType::DataReply) {
            return Err(GenericError::data_reply_type(header.buffer_type).into());
        }
        let data_header = DataHeader::decode(&headers[OUTER_HEADER_LENGTH..], self.order)?;
        let length = header.length as usize;
        if length == HEADERS_LENGTH {
            return Err(GenericError::server_error(header.error_code).into());
        }
        if length < HEADERS_LENGTH {
            return Err(GenericError::header_too_short(header.length).into());
        }
        if data_header.data_type != expected as u32 {
            return Err(
                GenericError::data_type_mismatch(data_header.data_type, expected as u32).into(),
            );
        }
        let payload = length - HEADERS_LENGTH;
        let max = self.config.tcp.max_payload_bytes;
        if payload > max {
            return Err(GenericError::payload_too_large(payload as u64, max as u64).into());
        }
        let data = self.read_exact(payload).await?;
        self.trace("RCV data", &data);
        Ok((data, data_header.number_of_buffers))
    }

    /// Asks the server for the cluster member list.
    pub async fn request_cluster_nodes(&mut self) -> Result<&[Url]> {
        self.send_data(&[], DataType::ClusterNodesRequest, 0).await?;
        let (data, _) = self.receive_data(DataType::ClusterNodesReply).await?;
        let text = String::from_utf8_lossy(&data);
        let nodes = text
            .trim_end_matches('\0')
            .split(';')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(Url::parse)
            .collect::<Result<Vec<_>>>()?;
        if nodes.is_empty() {
            return Err(GenericError::cluster_list_empty().into());
        }
        if nodes[0] == self.url {
            self.logger
                .info(format_args!("Connection to master {} already available", self.url));
        }
        self.cluster_nodes = nodes;
        Ok(&self.cluster_nodes)
    }
}

#[async_trait]
impl TransportDriver for AdaTcp {
    async fn connect(&mut self, acbx: &Acbx) -> Result<()> {
        self.logger
            .debug(format_args!("Open TCP connection to {}", self.url.address()));
        let stream = self.dial().await?;
        self.stream = Some(stream);
        if let Err(e) = self.establish(acbx.dbid).await {
            self.stream = None;
            self.session = None;
            return Err(e);
        }
        Ok(())
    }

    async fn send(&mut self, acbx: &mut Acbx, buffers: &mut [Buffer]) -> Result<()> {
        if self.stream.is_none() {
            self.connect(acbx).await?;
        }
        let request = wire::encode_request(acbx, buffers, self.order);
        self.send_data(&request, DataType::AdabasRequest, buffers.len() as u32)
            .await?;
        let (reply, number_of_buffers) = self.receive_data(DataType::AdabasReply).await?;
        if let Err(e) = wire::decode_reply(&reply, acbx, buffers, number_of_buffers, self.order) {
            self.logger
                .debug(format_args!("Read buffer error, destroy context: {}", e));
            if let Err(d) = self.disconnect().await {
                self.logger
                    .debug(format_args!("Disconnect {} failed: {}", self.url, d));
            }
            return Err(e);
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Err(GenericError::already_disconnected().into());
        };
        self.logger
            .debug(format_args!("Disconnect connection to {}", self.url));
        let mut header = OuterHeader::new(BufferType::DisconnectRequest);
        header.identification = self.identification();
        header.length = (OUTER_HEADER_LENGTH + DISCONNECT_PAYLOAD_LENGTH) as u32;
        let mut frame = BytesMut::with_capacity(header.length as usize);
        header.encode(&mut frame);
        frame.extend_from_slice(&[0u8; DISCONNECT_PAYLOAD_LENGTH]);
        self.session = None;

        stream.write_all(&frame).await?;
        stream.flush().await?;
        let mut reply = vec![0u8; frame.len()];
        stream.read_exact(&mut reply).await?;
        stream.shutdown().await?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn name(&self) -> &'static str {
        self.url.driver.as_str()
    }
}
