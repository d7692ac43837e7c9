use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use log::info;

use crate::aggregator::{Accumulation, Aggregator, FilterSet};
use crate::console::{ConsoleTable, JsonPresenter, ReportPresenter};
use crate::datetime::parse_filter_date;
use crate::diagnostics::DiagnosticsSink;
use crate::source::XmlRecordSource;

/// 集計結果の出力形式。
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ArgEnum)]
pub enum OutputFormat {
    Json,
    Console,
}

/// 集計レポートを出力するための引数。
#[derive(Debug, clap::Args)]
pub struct ReportArgs {
    #[clap(value_name = "FILE", help = "Path to the XML time log")]
    pub file: PathBuf,

    #[clap(
        long = "start",
        value_name = "DD-MM-YYYY",
        help = "Only count records starting on or after this date",
        parse(try_from_str = parse_filter_date),
    )]
    pub start: Option<NaiveDate>,

    #[clap(
        long = "end",
        value_name = "DD-MM-YYYY",
        help = "Only count records ending no later than 00:00:00 of this date",
        parse(try_from_str = parse_filter_date),
    )]
    pub end: Option<NaiveDate>,

    #[clap(long = "users", help = "Filter by user. Separated by commas")]
    pub users: Option<String>,

    #[clap(
        long = "output",
        arg_enum,
        default_value = "console",
        help = "Output type"
    )]
    pub output: OutputFormat,
}

impl ReportArgs {
    /// 引数から絞り込み条件を作る。
    pub fn filter(&self) -> FilterSet {
        FilterSet {
            start: self.start,
            end: self.end,
            users: self.users.as_deref().map(parse_users),
        }
    }
}

/// カンマ区切りのユーザー名を集合にする。名前は前後の空白も含めて比較するため、空の要素だけを無視する。
fn parse_users(s: &str) -> HashSet<String> {
    s.split(',')
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

pub struct ReportCommand<'a, S: DiagnosticsSink> {
    sink: &'a S,
}

impl<'a, S: DiagnosticsSink> ReportCommand<'a, S> {
    /// 新しい`ReportCommand`を返す。
    ///
    /// # Arguments
    /// * `sink` - スキップしたレコードを通知する出力先
    pub fn new(sink: &'a S) -> Self {
        Self { sink }
    }

    /// ファイルを読み込み、人物ごと、日ごとの経過時間を集計する。
    ///
    /// ファイルが存在しない場合と、XMLとして壊れている場合はエラーを返す。
    pub fn run(&self, args: &ReportArgs) -> Result<Accumulation> {
        if !args.file.is_file() {
            bail!("file {} not found", args.file.display());
        }

        let source = XmlRecordSource::from_path(&args.file)?;
        let accumulation = Aggregator::new(self.sink, args.filter())
            .aggregate(source)
            .with_context(|| format!("Failed to aggregate {}", args.file.display()))?;
        if accumulation.is_empty() {
            info!("No records matched in {}", args.file.display());
        }

        Ok(accumulation)
    }
}

/// 指定された形式で集計結果を書き出す。
pub fn show_report<W: Write>(
    format: OutputFormat,
    accumulation: &Accumulation,
    writer: &mut W,
) -> Result<()> {
    match format {
        OutputFormat::Json => JsonPresenter::new(writer).show_accumulation(accumulation),
        OutputFormat::Console => ConsoleTable::new(writer).show_accumulation(accumulation),
    }
}
