use std::collections::{BTreeMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info};
use serde::Serialize;

use crate::datetime::{parse_timestamp, start_of_day};
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticsSink};
use crate::error::MalformedInputError;
use crate::record::Record;

/// 1人1日あたりの上限秒数。超えても値は保持し、診断だけを出す。
pub const DAILY_QUOTA_SECONDS: i64 = 86_400;

/// 集計対象を絞り込むための条件。
#[derive(Clone, Debug, Default)]
pub struct FilterSet {
    /// `start`がこの日の00:00:00以降のレコードだけを対象にする。
    pub start: Option<NaiveDate>,
    /// `end`がこの日の00:00:00以前のレコードだけを対象にする。
    pub end: Option<NaiveDate>,
    /// 空または`None`の場合は全員を対象にする。
    pub users: Option<HashSet<String>>,
}

impl FilterSet {
    fn allows_user(&self, name: &str) -> bool {
        match &self.users {
            Some(users) if !users.is_empty() => users.contains(name),
            _ => true,
        }
    }

    fn allows_interval(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        let after_floor = self.start.map_or(true, |floor| start >= start_of_day(floor));
        let before_ceiling = self.end.map_or(true, |ceiling| end <= start_of_day(ceiling));
        after_floor && before_ceiling
    }
}

/// 人物ごと、かつ日ごとの経過秒数の合計。
///
/// 人物名、日付ともに昇順で走査される。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Accumulation(BTreeMap<String, BTreeMap<NaiveDate, i64>>);

impl Accumulation {
    /// 経過秒数を加算し、加算後の合計を返す。
    fn add(&mut self, name: &str, day: NaiveDate, elapsed: i64) -> i64 {
        let total = self
            .0
            .entry(name.to_string())
            .or_default()
            .entry(day)
            .or_insert(0);
        *total += elapsed;
        *total
    }

    #[cfg(test)]
    pub fn get(&self, name: &str, day: NaiveDate) -> Option<i64> {
        self.0.get(name).and_then(|days| days.get(&day)).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeMap<NaiveDate, i64>)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
impl<const N: usize> From<[(&str, &[(NaiveDate, i64)]); N]> for Accumulation {
    fn from(people: [(&str, &[(NaiveDate, i64)]); N]) -> Self {
        Self(
            people
                .into_iter()
                .map(|(name, days)| (name.to_string(), days.iter().copied().collect()))
                .collect(),
        )
    }
}

/// 1レコードの評価結果。
enum Evaluation<'r> {
    Contributes {
        name: &'r str,
        day: NaiveDate,
        elapsed: i64,
    },
    /// フィルタによる除外。診断は出さない。
    Excluded,
    Rejected(Diagnostic),
}

#[derive(Debug, Default)]
struct Summary {
    read: usize,
    accepted: usize,
    excluded: usize,
    rejected: usize,
}

/// レコード列を検証、絞り込みしながら集計する。
pub struct Aggregator<'a, S: DiagnosticsSink> {
    sink: &'a S,
    filter: FilterSet,
}

impl<'a, S: DiagnosticsSink> Aggregator<'a, S> {
    /// 新しい`Aggregator`を返す。
    ///
    /// # Arguments
    /// * `sink` - スキップしたレコードや上限超過を通知する出力先
    /// * `filter` - 集計対象の絞り込み条件
    pub fn new(sink: &'a S, filter: FilterSet) -> Self {
        Self { sink, filter }
    }

    /// レコード列を先頭から順に1件ずつ集計する。
    ///
    /// 不正なレコードは診断を出してスキップし、集計は続ける。
    /// レコード列自体が構造的に壊れている場合は、途中までの結果を捨ててエラーを返す。
    pub fn aggregate<I>(&self, source: I) -> Result<Accumulation, MalformedInputError>
    where
        I: IntoIterator<Item = Result<Record, MalformedInputError>>,
    {
        let mut accumulation = Accumulation::default();
        let mut summary = Summary::default();

        for record in source {
            let record = record?;
            summary.read += 1;

            match self.evaluate(&record) {
                Evaluation::Contributes { name, day, elapsed } => {
                    summary.accepted += 1;
                    let total = accumulation.add(name, day, elapsed);
                    if total > DAILY_QUOTA_SECONDS {
                        let message = format!(
                            "Daily quota exceeded: {} has {} seconds on {}",
                            name, total, day
                        );
                        self.sink.emit(&Diagnostic::with_record(
                            DiagnosticKind::QuotaExceeded,
                            message,
                            &record,
                        ));
                    }
                }
                Evaluation::Excluded => summary.excluded += 1,
                Evaluation::Rejected(diagnostic) => {
                    summary.rejected += 1;
                    self.sink.emit(&diagnostic);
                }
            }
        }

        debug!("{:?}", summary);
        info!(
            "Aggregated {} of {} records ({} excluded, {} skipped)",
            summary.accepted, summary.read, summary.excluded, summary.rejected
        );

        Ok(accumulation)
    }

    fn evaluate<'r>(&self, record: &'r Record) -> Evaluation<'r> {
        let Some(name) = record.name.as_deref() else {
            return Evaluation::Rejected(Diagnostic::with_record(
                DiagnosticKind::MissingName,
                "Skipped! field \"full_name\" is not specified",
                record,
            ));
        };
        if !self.filter.allows_user(name) {
            return Evaluation::Excluded;
        }

        let (start, end) = match scan_interval(record) {
            Ok(interval) => interval,
            Err(diagnostic) => return Evaluation::Rejected(diagnostic),
        };
        if !self.filter.allows_interval(start, end) {
            return Evaluation::Excluded;
        }

        Evaluation::Contributes {
            name,
            day: start.date(),
            elapsed: (end - start).num_seconds(),
        }
    }
}

/// 子要素から`start`と`end`を探す。
///
/// パースできないタイムスタンプが見つかった時点で走査をやめる。
fn scan_interval(record: &Record) -> Result<(NaiveDateTime, NaiveDateTime), Diagnostic> {
    let mut start = None;
    let mut end = None;

    for field in &record.fields {
        let slot = if field.is("start") {
            &mut start
        } else if field.is("end") {
            &mut end
        } else {
            continue;
        };
        let timestamp = parse_timestamp(&field.text).map_err(|err| {
            Diagnostic::with_record(
                DiagnosticKind::InvalidTimestamp,
                format!(
                    "Skipped! time data {:?} in <{}> does not match format DD-MM-YYYY HH:MM:SS: {}",
                    field.text, field.tag, err
                ),
                record,
            )
        })?;
        *slot = Some(timestamp);
    }

    match (start, end) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(Diagnostic::with_record(
            DiagnosticKind::MissingBoundary,
            "Skipped! field \"start\" or \"end\" is missing",
            record,
        )),
    }
}
