use std::fmt;

use log::warn;
#[cfg(test)]
use mockall::automock;

use crate::record::Record;

/// 診断の種類。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// `full_name`属性がない。
    MissingName,
    /// `start`または`end`がパースできない。
    InvalidTimestamp,
    /// `start`または`end`が存在しない。
    MissingBoundary,
    /// 1日の合計が86400秒を超えた。値はそのまま保持される。
    QuotaExceeded,
}

/// スキップや警告の理由を表す、人が読むためのメッセージ。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub record: Option<String>,
}

impl Diagnostic {
    /// レコードをXMLとして添付した`Diagnostic`を返す。
    pub fn with_record(kind: DiagnosticKind, message: impl Into<String>, record: &Record) -> Self {
        Self {
            kind,
            message: message.into(),
            record: Some(record.to_string()),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.record {
            Some(record) => write!(f, "---\n{}\n{}\n---", self.message, record),
            None => write!(f, "---\n{}\n---", self.message),
        }
    }
}

/// 診断の出力先を表すtrait。
///
/// 出力に失敗しても集計結果には影響させないため、戻り値を持たない。
#[cfg_attr(test, automock)]
pub trait DiagnosticsSink {
    /// 診断を1件出力する。
    fn emit(&self, diagnostic: &Diagnostic);
}

/// `log`クレートの`warn`レベルに診断を流す。
#[derive(Debug, Default)]
pub struct LogSink;

impl DiagnosticsSink for LogSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        warn!("{}", diagnostic);
    }
}
