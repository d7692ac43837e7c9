use thiserror::Error;

/// 入力ドキュメントが構造的に壊れている場合のエラー。
///
/// レコード単位の不正とは区別され、集計全体を中断する。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid syntax: {message} (at byte {position})")]
pub struct MalformedInputError {
    pub message: String,
    pub position: u64,
}

impl MalformedInputError {
    /// 新しい`MalformedInputError`を返す。
    pub fn new(message: impl Into<String>, position: u64) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}
