/*!
按 URI 形式的说明创建输出目标。

```text
null://                  丢弃所有数据
file:///absolute/path    追加写入文件（绝对路径）
file://relative/path     追加写入文件（相对路径）
file://-                 等同于 stdout://
stdout://                标准输出
stderr://                标准错误
tcp://host:port          TCP 连接
udp://host:port          UDP 数据报，单行超过 65507 字节时写入失败
```
*/

use std::fs::{File, OpenOptions};
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::sink::{NullSink, SinkHandle};
use crate::worker::{Datagram, MAX_DATAGRAM, Stream, WorkerSink};

/// 解析后的输出目标说明
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterSpec {
    /// 丢弃
    Null,
    /// 追加写入的文件
    File(PathBuf),
    /// 标准输出
    Stdout,
    /// 标准错误
    Stderr,
    /// TCP `host:port`
    Tcp(String),
    /// UDP `host:port`
    Udp(String),
}

impl FromStr for WriterSpec {
    type Err = Error;

    fn from_str(spec: &str) -> Result<Self> {
        let unsupported = || Error::UnsupportedWriterSpec(spec.to_string());
        let (scheme, name) = spec.split_once("://").ok_or_else(unsupported)?;
        match scheme {
            "null" => Ok(WriterSpec::Null),
            "file" if name == "-" => Ok(WriterSpec::Stdout),
            "file" if !name.is_empty() => Ok(WriterSpec::File(PathBuf::from(name))),
            "stdout" => Ok(WriterSpec::Stdout),
            "stderr" => Ok(WriterSpec::Stderr),
            "tcp" if !name.is_empty() => Ok(WriterSpec::Tcp(name.to_string())),
            "udp" if !name.is_empty() => Ok(WriterSpec::Udp(name.to_string())),
            _ => Err(unsupported()),
        }
    }
}

impl WriterSpec {
    /// 打开输出目标
    pub fn open(&self) -> Result<SinkHandle> {
        let sink: SinkHandle = match self {
            WriterSpec::Null => Arc::new(NullSink::new()),
            WriterSpec::File(path) => {
                let file = open_append(path)?;
                Arc::new(WorkerSink::new(
                    format!("file://{}", path.display()),
                    Stream::new(file),
                )?)
            }
            WriterSpec::Stdout => Arc::new(WorkerSink::new("stdout://", Stream::new(io::stdout()))?),
            WriterSpec::Stderr => Arc::new(WorkerSink::new("stderr://", Stream::new(io::stderr()))?),
            WriterSpec::Tcp(addr) => {
                let spec = format!("tcp://{}", addr);
                let stream = TcpStream::connect(addr.as_str()).map_err(|source| {
                    log::warn!("{}: unable to connect: {}", spec, source);
                    Error::SinkConnect {
                        spec: spec.clone(),
                        source,
                    }
                })?;
                Arc::new(WorkerSink::new(spec, Stream::new(stream))?)
            }
            WriterSpec::Udp(addr) => {
                let spec = format!("udp://{}", addr);
                let connect_err = |source: io::Error| Error::SinkConnect {
                    spec: spec.clone(),
                    source,
                };
                let target = addr
                    .to_socket_addrs()
                    .map_err(connect_err)?
                    .next()
                    .ok_or_else(|| connect_err(io::Error::other("no address resolved")))?;
                let datagram = Datagram::new(target).map_err(connect_err)?;
                Arc::new(WorkerSink::new(spec.clone(), datagram)?.with_max_line(MAX_DATAGRAM))
            }
        };
        log::debug!("created log writer {:?}", self);
        Ok(sink)
    }
}

/// 以追加模式打开文件，必要时创建父目录
fn open_append(path: &Path) -> io::Result<File> {
    // 确保父目录存在
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
    }

    OpenOptions::new().create(true).append(true).open(path)
}

/// 按说明创建输出目标，失败时同步返回错误
pub fn create_writer(spec: &str) -> Result<SinkHandle> {
    spec.parse::<WriterSpec>()?.open()
}

/// 在后台线程创建输出目标，结果（包括所有错误）通过回调交付
pub fn create_writer_with<F>(spec: impl Into<String>, callback: F)
where
    F: FnOnce(Result<SinkHandle>) + Send + 'static,
{
    let spec = spec.into();
    let label = spec.clone();
    if let Err(e) = std::thread::Builder::new()
        .name("qlogger-writer".to_string())
        .spawn(move || callback(create_writer(&spec)))
    {
        log::warn!("{}: cannot spawn writer thread: {}", label, e);
    }
}
