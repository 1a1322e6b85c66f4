use std::fmt;

use crate::engine::node::NodeId;

/// 勾配降下の実行と診断図の出力で発生しうるエラー
#[derive(Debug)]
pub enum Error {
    /// 実行対象の`Input`ノードに`Executor::run`でデータが与えられなかった
    MissingInput { node: NodeId },
    /// 読み出し時にノードが値を持っていなかった
    MissingData { node: NodeId },
    /// 目的関数の値が有限でなくなった
    NonFinite { step: usize, value: f32 },
    /// 図の書き込み中のファイルシステムエラー
    Io(std::io::Error),
    /// PNGのエンコードエラー
    Png(png::EncodingError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingInput { node } => write!(f, "input node {node} was not fed"),
            Self::MissingData { node } => write!(f, "node {node} has no data"),
            Self::NonFinite { step, value } => {
                write!(f, "loss became non-finite at step {step}: {value}")
            }
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Png(e) => write!(f, "png encoding error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Png(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<png::EncodingError> for Error {
    fn from(e: png::EncodingError) -> Self {
        Self::Png(e)
    }
}
