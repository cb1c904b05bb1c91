// 该文件是 Shanan （山南西风） 项目的一部分。
// src/config.rs - 会话配置与后端选择
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  channel::{ChannelWrapper, FileChannel, ProtocolServer, RemoteChannel, RemoteError},
};

/// 远程协议库的最低版本
pub const MIN_PROTOCOL_VERSION: [u32; 3] = [4, 0, 0];

/// 选择远程后端的环境变量，默认 `1`
pub const USE_REMOTE_VAR: &str = "VOT_USE_TRAX";
/// 未显式指定时选择多目标模式的环境变量，默认 `0`
pub const MULTI_OBJECT_VAR: &str = "VOT_MULTI_OBJECT";

#[derive(Error, Debug)]
pub enum BackendUnavailable {
  #[error("未提供远程协议服务")]
  Missing,
  #[error("远程协议服务连接失败: {0}")]
  Connection(#[from] RemoteError),
  #[error("需要 4.0.0 或更新版本的远程协议，实际版本 {0}")]
  Version(String),
}

#[derive(Error, Debug)]
pub enum SessionConfigError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{found}'")]
  SchemeMismatch { expected: String, found: String },
  #[error("非法参数 {key}={value}")]
  InvalidParameter { key: String, value: String },
  #[error("路径解码错误: {0}")]
  PathDecode(#[from] std::string::FromUtf8Error),
}

/// 连接外部协议服务
pub trait ServerConnector {
  fn connect(&self) -> Result<Box<dyn ProtocolServer>, RemoteError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
  Remote,
  File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
  pub prefer_remote: bool,
  pub multiobject: bool,
  /// 本地文件后端的工作目录
  pub workdir: PathBuf,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      prefer_remote: true,
      multiobject: false,
      workdir: PathBuf::from("."),
    }
  }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, SessionConfigError> {
  match value {
    "1" | "true" => Ok(true),
    "0" | "false" => Ok(false),
    _ => Err(SessionConfigError::InvalidParameter {
      key: key.to_string(),
      value: value.to_string(),
    }),
  }
}

fn version_at_least(version: &str, min: [u32; 3]) -> bool {
  let mut parts = [0u32; 3];
  for (part, text) in parts.iter_mut().zip(version.trim().split('.')) {
    let digits: String = text.chars().take_while(char::is_ascii_digit).collect();
    *part = digits.parse().unwrap_or(0);
  }
  parts >= min
}

impl SessionConfig {
  pub fn from_env() -> Self {
    Self::from_vars(|key| std::env::var(key).ok())
  }

  pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
    Self {
      prefer_remote: lookup(USE_REMOTE_VAR).is_none_or(|v| v == "1"),
      multiobject: lookup(MULTI_OBJECT_VAR).is_some_and(|v| v == "1"),
      ..Default::default()
    }
  }

  pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
    self.workdir = workdir.into();
    self
  }

  pub fn with_multiobject(mut self, multiobject: Option<bool>) -> Self {
    if let Some(multiobject) = multiobject {
      self.multiobject = multiobject;
    }
    self
  }

  /// 连接远程服务并检查版本
  pub fn probe(
    &self,
    connector: Option<&dyn ServerConnector>,
  ) -> Result<Box<dyn ProtocolServer>, BackendUnavailable> {
    let server = connector.ok_or(BackendUnavailable::Missing)?.connect()?;
    let version = server.version();
    if !version_at_least(&version, MIN_PROTOCOL_VERSION) {
      return Err(BackendUnavailable::Version(version));
    }
    Ok(server)
  }

  /// 选定后端，远程不可用时回退到本地文件
  pub fn resolve(&self, connector: Option<&dyn ServerConnector>) -> ChannelWrapper {
    if self.prefer_remote {
      match self.probe(connector) {
        Ok(server) => {
          info!("使用远程协议后端");
          return RemoteChannel::new(server).into();
        }
        Err(e) => warn!("远程协议不可用（{}），回退到本地文件后端", e),
      }
    }
    info!("使用本地文件后端: {}", self.workdir.display());
    FileChannel::new(&self.workdir).into()
  }

  pub fn backend(&self, channel: &ChannelWrapper) -> BackendKind {
    match channel {
      ChannelWrapper::Remote(_) => BackendKind::Remote,
      ChannelWrapper::File(_) => BackendKind::File,
    }
  }
}

impl FromUrlWithScheme for SessionConfig {
  const SCHEME: &'static str = "vot";
}

/// `vot:///path/to/workdir?multiobject=1&remote=0`，未给出的参数取环境变量
impl FromUrl for SessionConfig {
  type Error = SessionConfigError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(SessionConfigError::SchemeMismatch {
        expected: Self::SCHEME.to_string(),
        found: url.scheme().to_string(),
      });
    }

    let mut config = Self::from_env();
    let path = urlencoding::decode(url.path())?;
    if !path.is_empty() {
      config.workdir = PathBuf::from(path.into_owned());
    }

    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "multiobject" => config.multiobject = parse_flag(&key, &value)?,
        "remote" => config.prefer_remote = parse_flag(&key, &value)?,
        _ => warn!("忽略未知参数 {}={}", key, value),
      }
    }
    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::channel::{
    ServerRequest,
    remote_testing::{ScriptedServer, images, rect},
  };

  struct Connector(Option<&'static str>);

  impl ServerConnector for Connector {
    fn connect(&self) -> Result<Box<dyn ProtocolServer>, RemoteError> {
      let version = self
        .0
        .ok_or_else(|| RemoteError::Connection("no server".to_string()))?;
      let mut server = ScriptedServer::new(vec![ServerRequest::Initialize {
        objects: vec![rect(0.0)],
        images: images("0.jpg"),
      }]);
      server.version = version.to_string();
      Ok(Box::new(server))
    }
  }

  #[test]
  fn environment_defaults() {
    let config = SessionConfig::from_vars(|_| None);
    assert!(config.prefer_remote);
    assert!(!config.multiobject);

    let config = SessionConfig::from_vars(|key| match key {
      USE_REMOTE_VAR => Some("0".to_string()),
      MULTI_OBJECT_VAR => Some("1".to_string()),
      _ => None,
    });
    assert!(!config.prefer_remote);
    assert!(config.multiobject);
    assert!(!config.with_multiobject(Some(false)).multiobject);
  }

  #[test]
  fn version_comparison() {
    assert!(version_at_least("4.0.0", MIN_PROTOCOL_VERSION));
    assert!(version_at_least("4.1", MIN_PROTOCOL_VERSION));
    assert!(version_at_least("10.0.0", MIN_PROTOCOL_VERSION));
    assert!(!version_at_least("3.9.12", MIN_PROTOCOL_VERSION));
    assert!(!version_at_least("", MIN_PROTOCOL_VERSION));
  }

  #[test]
  fn unavailable_backend_falls_back_to_files() {
    let config = SessionConfig::default().with_workdir("/tmp/seq");
    let channel = config.resolve(None);
    assert_eq!(config.backend(&channel), BackendKind::File);

    let channel = config.resolve(Some(&Connector(None)));
    assert_eq!(config.backend(&channel), BackendKind::File);

    let channel = config.resolve(Some(&Connector(Some("3.0.0"))));
    assert_eq!(config.backend(&channel), BackendKind::File);

    let channel = config.resolve(Some(&Connector(Some("4.0.1"))));
    assert_eq!(config.backend(&channel), BackendKind::Remote);

    let config = SessionConfig {
      prefer_remote: false,
      ..config
    };
    let channel = config.resolve(Some(&Connector(Some("4.0.1"))));
    assert_eq!(config.backend(&channel), BackendKind::File);
  }

  #[test]
  fn config_from_url() {
    let url = Url::parse("vot:///data/my%20seq?multiobject=1&remote=0").unwrap();
    let config = SessionConfig::from_url(&url).unwrap();
    assert_eq!(config.workdir, PathBuf::from("/data/my seq"));
    assert!(config.multiobject);
    assert!(!config.prefer_remote);

    let url = Url::parse("folder:///data").unwrap();
    assert!(matches!(
      SessionConfig::from_url(&url),
      Err(SessionConfigError::SchemeMismatch { .. })
    ));

    let url = Url::parse("vot:///data?multiobject=maybe").unwrap();
    assert!(SessionConfig::from_url(&url).is_err());
  }
}
