//! 传输层
//!
//! 业务层只依赖 [`Connection`] / [`Connector`] / [`Listener`]，TCP 是目前唯一的实现。
//! 每条消息一帧：`[版本: u8][长度: u32 大端][消息体]`，消息体编码由 [`WireFormat`] 决定。

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{ProtocolError, Result};
use crate::{CONNECT_TIMEOUT, MAX_FRAME_SIZE, PROTOCOL_VERSION};

/// 消息体编码
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// JSON，与网页客户端字段一致
    #[default]
    Json,
    /// bincode，紧凑二进制
    Bincode,
}

impl WireFormat {
    fn encode<M: Serialize>(&self, msg: &M) -> Result<Vec<u8>> {
        Ok(match self {
            WireFormat::Json => serde_json::to_vec(msg)?,
            WireFormat::Bincode => bincode::serialize(msg)?,
        })
    }

    fn decode<M: DeserializeOwned>(&self, bytes: &[u8]) -> Result<M> {
        Ok(match self {
            WireFormat::Json => serde_json::from_slice(bytes)?,
            WireFormat::Bincode => bincode::deserialize(bytes)?,
        })
    }
}

/// 网络配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
    pub wire_format: WireFormat,
}

impl NetworkConfig {
    /// `host:port`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
            wire_format: WireFormat::Json,
        }
    }
}

/// 双向、按消息收发的连接
#[async_trait]
pub trait Connection: Send + Sync {
    async fn send<M: Serialize + Send + Sync>(&mut self, msg: &M) -> Result<()>;

    async fn recv<M: DeserializeOwned>(&mut self) -> Result<M>;

    /// 关闭写方向，对端随后读到连接关闭
    async fn close(&mut self) -> Result<()>;

    fn peer_addr(&self) -> Option<String>;
}

/// 主动建立连接的一方
#[async_trait]
pub trait Connector: Send + Sync {
    type Conn: Connection;

    async fn connect(&self, addr: &str) -> Result<Self::Conn>;
}

/// 被动接受连接的一方
#[async_trait]
pub trait Listener: Send + Sync + Sized {
    type Conn: Connection;

    async fn bind(addr: &str) -> Result<Self>;

    async fn accept(&mut self) -> Result<Self::Conn>;

    fn local_addr(&self) -> Option<String>;
}

// ---------------------------------------------------------------------------
// TCP
// ---------------------------------------------------------------------------

/// TCP 客户端，连接超时为 [`CONNECT_TIMEOUT`]
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector {
    pub format: WireFormat,
}

#[async_trait]
impl Connector for TcpConnector {
    type Conn = TcpConnection;

    async fn connect(&self, addr: &str) -> Result<Self::Conn> {
        let stream = match timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await {
            Ok(stream) => stream?,
            Err(_) => return Err(ProtocolError::ConnectionTimeout),
        };
        TcpConnection::from_stream(stream, self.format)
    }
}

/// 一条 TCP 连接，读写两端各自成帧
pub struct TcpConnection {
    reader: FrameReader<OwnedReadHalf>,
    writer: FrameWriter<OwnedWriteHalf>,
    peer: Option<String>,
}

impl TcpConnection {
    pub fn from_stream(stream: TcpStream, format: WireFormat) -> Result<Self> {
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr().ok().map(|a| a.to_string());
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: FrameReader::new(read_half, format),
            writer: FrameWriter::new(write_half, format),
            peer,
        })
    }

    /// 拆成独立的读端和写端，供读循环和写任务分别持有
    pub fn split(self) -> (FrameReader<OwnedReadHalf>, FrameWriter<OwnedWriteHalf>) {
        (self.reader, self.writer)
    }
}

#[async_trait]
impl Connection for TcpConnection {
    async fn send<M: Serialize + Send + Sync>(&mut self, msg: &M) -> Result<()> {
        self.writer.write_frame(msg).await
    }

    async fn recv<M: DeserializeOwned>(&mut self) -> Result<M> {
        self.reader.read_frame().await
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await
    }

    fn peer_addr(&self) -> Option<String> {
        self.peer.clone()
    }
}

/// TCP 服务端
pub struct TcpListener {
    inner: tokio::net::TcpListener,
    format: WireFormat,
}

impl TcpListener {
    /// 接受的连接改用指定的消息体编码
    pub fn with_format(mut self, format: WireFormat) -> Self {
        self.format = format;
        self
    }
}

#[async_trait]
impl Listener for TcpListener {
    type Conn = TcpConnection;

    async fn bind(addr: &str) -> Result<Self> {
        Ok(Self {
            inner: tokio::net::TcpListener::bind(addr).await?,
            format: WireFormat::default(),
        })
    }

    async fn accept(&mut self) -> Result<Self::Conn> {
        let (stream, _) = self.inner.accept().await?;
        TcpConnection::from_stream(stream, self.format)
    }

    fn local_addr(&self) -> Option<String> {
        self.inner.local_addr().ok().map(|a| a.to_string())
    }
}

// ---------------------------------------------------------------------------
// 成帧
// ---------------------------------------------------------------------------

/// 帧头：版本号和消息体长度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameHeader {
    version: u8,
    len: u32,
}

impl FrameHeader {
    const SIZE: usize = 5;

    /// 为长度为 `len` 的消息体构造帧头，超过上限时报错
    fn for_payload(len: usize) -> Result<Self> {
        if len > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: len,
                max: MAX_FRAME_SIZE,
            });
        }
        Ok(Self {
            version: PROTOCOL_VERSION,
            len: len as u32,
        })
    }

    fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0] = self.version;
        bytes[1..].copy_from_slice(&self.len.to_be_bytes());
        bytes
    }

    /// 解析并校验帧头，返回消息体长度
    fn parse(bytes: [u8; Self::SIZE]) -> Result<usize> {
        let version = bytes[0];
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                actual: version,
            });
        }
        let len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: len,
                max: MAX_FRAME_SIZE,
            });
        }
        Ok(len)
    }
}

/// 对端在帧中途关闭视为连接关闭
fn closed_on_eof(e: std::io::Error) -> ProtocolError {
    match e.kind() {
        std::io::ErrorKind::UnexpectedEof => ProtocolError::ConnectionClosed,
        _ => ProtocolError::Io(e),
    }
}

/// 从字节流读取消息帧
pub struct FrameReader<R> {
    inner: R,
    format: WireFormat,
    payload: Vec<u8>,
}

impl<R: AsyncRead + Unpin + Send> FrameReader<R> {
    pub fn new(inner: R, format: WireFormat) -> Self {
        Self {
            inner,
            format,
            payload: Vec::new(),
        }
    }

    /// 读取一整帧再解码；解码失败时该帧已被完整消费
    pub async fn read_frame<M: DeserializeOwned>(&mut self) -> Result<M> {
        let mut header = [0u8; FrameHeader::SIZE];
        self.inner.read_exact(&mut header).await.map_err(closed_on_eof)?;
        let len = FrameHeader::parse(header)?;

        self.payload.resize(len, 0);
        self.inner
            .read_exact(&mut self.payload)
            .await
            .map_err(closed_on_eof)?;

        self.format.decode(&self.payload)
    }
}

/// 向字节流写入消息帧
pub struct FrameWriter<W> {
    inner: W,
    format: WireFormat,
}

impl<W: AsyncWrite + Unpin + Send> FrameWriter<W> {
    pub fn new(inner: W, format: WireFormat) -> Self {
        Self { inner, format }
    }

    pub async fn write_frame<M: Serialize>(&mut self, msg: &M) -> Result<()> {
        let payload = self.format.encode(msg)?;
        let header = FrameHeader::for_payload(payload.len())?;

        self.inner.write_all(&header.to_bytes()).await?;
        self.inner.write_all(&payload).await?;
        self.inner.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
