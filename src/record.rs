use std::fmt;

use quick_xml::escape::escape;

/// 入力ドキュメント中の1つの`<person>`要素を表す構造体。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    pub name: Option<String>,
    pub fields: Vec<Field>,
}

/// `<person>`要素の子要素。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub tag: String,
    pub text: String,
}

impl Field {
    pub fn new(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            text: text.into(),
        }
    }

    /// タグ名が`tag`と一致するかを大文字小文字を区別せずに判定する。
    pub fn is(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }
}

impl Record {
    /// 新しい`Record`を返す。
    pub fn new(name: Option<&str>, fields: Vec<Field>) -> Self {
        Self {
            name: name.map(str::to_string),
            fields,
        }
    }
}

/// 診断メッセージに添付するため、XMLとして書き戻す。
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<person")?;
        if let Some(name) = &self.name {
            write!(f, " full_name=\"{}\"", escape(name.as_str()))?;
        }
        if self.fields.is_empty() {
            return write!(f, "/>");
        }
        writeln!(f, ">")?;
        for field in &self.fields {
            writeln!(
                f,
                "    <{tag}>{text}</{tag}>",
                tag = field.tag,
                text = escape(field.text.as_str())
            )?;
        }
        write!(f, "</person>")
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{Field, Record};

    #[rstest]
    #[case::same("start", "start", true)]
    #[case::upper("START", "start", true)]
    #[case::mixed("End", "end", true)]
    #[case::other("stop", "end", false)]
    fn test_field_is(#[case] tag: &str, #[case] query: &str, #[case] expected: bool) {
        assert_eq!(Field::new(tag, "").is(query), expected);
    }

    #[test]
    fn test_display() {
        let record = Record::new(
            Some("Alice"),
            vec![
                Field::new("start", "01-01-2024 10:00:00"),
                Field::new("end", "01-01-2024 11:00:00"),
            ],
        );

        assert_eq!(
            record.to_string(),
            "<person full_name=\"Alice\">\n    <start>01-01-2024 10:00:00</start>\n    <end>01-01-2024 11:00:00</end>\n</person>"
        );
    }

    #[test]
    fn test_display_escapes_and_empty() {
        let record = Record::new(Some("Tom & \"Jerry\""), vec![]);

        assert_eq!(
            record.to_string(),
            "<person full_name=\"Tom &amp; &quot;Jerry&quot;\"/>"
        );
    }

    #[test]
    fn test_display_without_name() {
        let record = Record::new(None, vec![Field::new("start", "a<b")]);

        assert_eq!(
            record.to_string(),
            "<person>\n    <start>a&lt;b</start>\n</person>"
        );
    }
}
