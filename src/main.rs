use std::io;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use fern::colors::{Color, ColoredLevelConfig};
use log::{error, LevelFilter};

mod aggregator;
mod console;
mod datetime;
mod diagnostics;
mod error;
mod record;
mod report_command;
mod source;

use diagnostics::LogSink;
use report_command::{show_report, ReportArgs, ReportCommand};

/// XMLの時間記録から人物ごと、日ごとの経過時間を集計するCLIアプリケーション。
///
/// # Examples
/// ```
/// $ cargo run -- people.xml
/// $ cargo run -- people.xml --start 01-01-2024 --end 01-02-2024 --users Alice,Bob --output json
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(flatten)]
    report: ReportArgs,

    #[clap(
        short = 'v',
        long = "verbose",
        parse(from_occurrences),
        help = "Increase log verbosity (-v: info, -vv: debug)"
    )]
    verbose: usize,
}

fn main() {
    let args = Args::parse();

    if let Err(err) = setup_logger(level_filter(args.verbose)) {
        eprintln!("{:#}", err);
        process::exit(1);
    }

    if let Err(err) = run(&args.report) {
        error!("{:#}", err);
        process::exit(1);
    }
}

fn run(args: &ReportArgs) -> Result<()> {
    let sink = LogSink;
    let accumulation = ReportCommand::new(&sink).run(args)?;

    let stdout = io::stdout();
    let mut writer = stdout.lock();
    show_report(args.output, &accumulation, &mut writer)
}

/// `-v`の数をログレベルに変換する。
fn level_filter(verbose: usize) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

/// 標準エラー出力にログを出すloggerを設定する。
///
/// 標準出力はレポートだけに使う。
fn setup_logger(level: LevelFilter) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!("[{}] {}", colors.color(record.level()), message))
        })
        .level(level)
        .chain(io::stderr())
        .apply()
        .context("Failed to initialize logger")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use clap::Parser;
    use log::LevelFilter;
    use rstest::rstest;

    use super::{level_filter, Args};
    use crate::report_command::OutputFormat;

    #[rstest]
    #[case::default(0, LevelFilter::Warn)]
    #[case::info(1, LevelFilter::Info)]
    #[case::debug(2, LevelFilter::Debug)]
    #[case::more(5, LevelFilter::Debug)]
    fn test_level_filter(#[case] verbose: usize, #[case] expected: LevelFilter) {
        assert_eq!(level_filter(verbose), expected);
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["worktime", "people.xml"]).unwrap();

        assert_eq!(args.report.file.to_str(), Some("people.xml"));
        assert_eq!(args.report.start, None);
        assert_eq!(args.report.end, None);
        assert_eq!(args.report.users, None);
        assert_eq!(args.report.output, OutputFormat::Console);
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn test_args_all() {
        let args = Args::try_parse_from([
            "worktime",
            "people.xml",
            "--start",
            "01-01-2024",
            "--end",
            "31-01-2024",
            "--users",
            "Alice,Bob",
            "--output",
            "json",
            "-vv",
        ])
        .unwrap();

        assert_eq!(args.report.start, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(args.report.end, NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(args.report.users.as_deref(), Some("Alice,Bob"));
        assert_eq!(args.report.output, OutputFormat::Json);
        assert_eq!(args.verbose, 2);
    }

    #[rstest]
    #[case::missing_file(&["worktime"])]
    #[case::bad_start(&["worktime", "people.xml", "--start", "2024-01-01"])]
    #[case::bad_output(&["worktime", "people.xml", "--output", "xml"])]
    fn test_args_invalid(#[case] argv: &[&str]) {
        assert!(Args::try_parse_from(argv.iter().copied()).is_err());
    }
}
