use std::io::Write;

use anyhow::{Context, Result};
use tabled::settings::object::Columns;
use tabled::settings::{Modify, Padding, Style};
use tabled::{Table, Tabled};

use crate::aggregator::Accumulation;

/// 列と列の間の空白の幅。
const COLUMN_GAP: usize = 2;

/// 表の1行。
#[derive(Tabled)]
struct DayRow {
    #[tabled(rename = "date")]
    date: String,
    #[tabled(rename = "duration")]
    duration: String,
}

/// 集計結果を表示するためのtrait。
pub trait ReportPresenter {
    /// 集計結果を表示する。
    ///
    /// # Arguments
    ///
    /// * `accumulation` - 表示する集計結果
    fn show_accumulation(&mut self, accumulation: &Accumulation) -> Result<()>;
}

/// 人物ごとに日付と経過時間の表を表示する。
pub struct ConsoleTable<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> ConsoleTable<'a, W> {
    /// 新しい`ConsoleTable`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }
}

impl<'a, W: Write> ReportPresenter for ConsoleTable<'a, W> {
    // 人物ごとのブロックを`---`で囲んで出力する。
    fn show_accumulation(&mut self, accumulation: &Accumulation) -> Result<()> {
        for (name, days) in accumulation.iter() {
            let rows = days.iter().map(|(day, seconds)| DayRow {
                date: day.format("%Y-%m-%d").to_string(),
                duration: format_duration(*seconds),
            });
            let mut table = Table::new(rows);
            table
                .with(Style::empty())
                .with(Padding::zero())
                .with(Modify::new(Columns::first()).with(Padding::new(0, COLUMN_GAP, 0, 0)));
            // 最後の列の右側の余白は出さない
            let table = table
                .to_string()
                .lines()
                .map(str::trim_end)
                .collect::<Vec<_>>()
                .join("\n");

            writeln!(self.writer, "---\n{}\n{}\n---", name, table)
                .with_context(|| format!("Failed to write report for {}", name))?;
        }

        Ok(())
    }
}

/// 集計結果を秒数のままJSONで出力する。
pub struct JsonPresenter<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> JsonPresenter<'a, W> {
    /// 新しい`JsonPresenter`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }
}

impl<'a, W: Write> ReportPresenter for JsonPresenter<'a, W> {
    fn show_accumulation(&mut self, accumulation: &Accumulation) -> Result<()> {
        serde_json::to_writer(&mut *self.writer, accumulation)
            .context("Failed to write report as JSON")?;
        writeln!(self.writer).context("Failed to write report as JSON")?;

        Ok(())
    }
}

/// 秒数を`H h, M m, S s`形式にする。
///
/// 負の値は絶対値の前に`-`を付ける。
pub fn format_duration(seconds: i64) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let seconds = seconds.unsigned_abs();
    format!(
        "{}{} h, {} m, {} s",
        sign,
        seconds / 3600,
        seconds % 3600 / 60,
        seconds % 60
    )
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rstest::rstest;

    use super::{format_duration, ConsoleTable, JsonPresenter, ReportPresenter};
    use crate::aggregator::Accumulation;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn render_console(accumulation: &Accumulation) -> String {
        let mut writer = Vec::new();
        let mut presenter = ConsoleTable::new(&mut writer);

        presenter.show_accumulation(accumulation).unwrap();

        String::from_utf8(writer).unwrap()
    }

    #[rstest]
    #[case::zero(0, "0 h, 0 m, 0 s")]
    #[case::seconds(59, "0 h, 0 m, 59 s")]
    #[case::hms(3661, "1 h, 1 m, 1 s")]
    #[case::over_a_day(86500, "24 h, 1 m, 40 s")]
    #[case::negative(-3661, "-1 h, 1 m, 1 s")]
    fn test_format_duration(#[case] seconds: i64, #[case] expected: &str) {
        assert_eq!(format_duration(seconds), expected);
    }

    #[test]
    fn test_console_single_person() {
        let accumulation = Accumulation::from([("Alice", &[(date(2024, 1, 1), 3661)][..])]);

        let output = render_console(&accumulation);

        assert_eq!(
            output,
            "---\nAlice\ndate        duration\n2024-01-01  1 h, 1 m, 1 s\n---\n"
        );
        assert!(output.contains("2024-01-01  1 h, 1 m, 1 s"));
    }

    #[test]
    fn test_console_blocks_in_order() {
        let accumulation = Accumulation::from([
            ("Bob", &[(date(2024, 1, 2), 60), (date(2024, 1, 1), 1)][..]),
            ("Alice", &[(date(2024, 1, 1), 3600)][..]),
        ]);

        let output = render_console(&accumulation);

        assert_eq!(
            output,
            [
                "---\nAlice\ndate        duration\n2024-01-01  1 h, 0 m, 0 s\n---\n",
                "---\nBob\ndate        duration\n2024-01-01  0 h, 0 m, 1 s\n2024-01-02  0 h, 1 m, 0 s\n---\n",
            ]
            .join("")
        );
    }

    #[test]
    fn test_console_widths_follow_longest_cell() {
        let accumulation = Accumulation::from([(
            "Carol",
            &[(date(2024, 1, 1), 86500), (date(2024, 1, 2), 1)][..],
        )]);

        let output = render_console(&accumulation);

        assert_eq!(
            output,
            "---\nCarol\ndate        duration\n2024-01-01  24 h, 1 m, 40 s\n2024-01-02  0 h, 0 m, 1 s\n---\n"
        );
        assert!(output.lines().all(|line| line == line.trim_end()));
    }

    #[test]
    fn test_console_empty() {
        assert_eq!(render_console(&Accumulation::default()), "");
    }

    #[test]
    fn test_json() {
        let accumulation = Accumulation::from([
            ("Alice", &[(date(2024, 1, 1), 3661)][..]),
            ("Bob", &[(date(2024, 1, 2), -5)][..]),
        ]);
        let mut writer = Vec::new();
        let mut presenter = JsonPresenter::new(&mut writer);

        presenter.show_accumulation(&accumulation).unwrap();

        let output: serde_json::Value = serde_json::from_slice(&writer).unwrap();
        assert_eq!(
            output,
            serde_json::json!({
                "Alice": {"2024-01-01": 3661},
                "Bob": {"2024-01-02": -5},
            })
        );
    }
}
