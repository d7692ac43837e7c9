use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::MalformedInputError;
use crate::record::{Field, Record};

/// レコードを表す要素名。
const RECORD_TAG: &[u8] = b"person";

/// 人物名を持つ属性名。
const NAME_ATTRIBUTE: &[u8] = b"full_name";

/// XMLドキュメントから`<person>`要素を1件ずつ読み出すイテレータ。
///
/// ドキュメント全体をメモリに載せず、`quick-xml`のpull parserで逐次読み込む。
/// `<person>`は深さに関係なく、閉じタグの順に返す。入れ子の場合は内側が先になる。
/// 構造的なエラーを返した後は`None`を返し続ける。
///
/// # Examples
///
/// ```
/// fn main() -> anyhow::Result<()> {
///     let source = XmlRecordSource::from_path(Path::new("people.xml"))?;
///     for record in source {
///         let record = record?;
///     }
///     Ok(())
/// }
/// ```
pub struct XmlRecordSource<R: BufRead> {
    reader: Reader<R>,
    depth: usize,
    root_seen: bool,
    finished: bool,
    open_persons: Vec<OpenPerson>,
}

/// 読み込み途中の`<person>`要素。
struct OpenPerson {
    name: Option<String>,
    fields: Vec<Field>,
    /// `<person>`を開いた後の深さ。直接の子要素は`depth + 1`になる。
    depth: usize,
    current: Option<Field>,
    text_open: bool,
}

impl OpenPerson {
    fn new(name: Option<String>, depth: usize) -> Self {
        Self {
            name,
            fields: Vec::new(),
            depth,
            current: None,
            text_open: false,
        }
    }

    /// 子孫要素が開かれた。直接の子要素であればフィールドとして読み始める。
    fn enter_child(&mut self, start: &BytesStart, depth: usize) {
        if depth == self.depth + 1 {
            self.current = Some(Field::new(decode_tag(start), ""));
            self.text_open = true;
        } else {
            // 最初の孫要素より後ろのテキストは使わない
            self.text_open = false;
        }
    }

    fn leave_child(&mut self, depth: usize) {
        if depth == self.depth + 1 {
            if let Some(field) = self.current.take() {
                self.fields.push(field);
            }
        }
        self.text_open = false;
    }

    fn push_text(&mut self, text: &str) {
        if let (true, Some(field)) = (self.text_open, self.current.as_mut()) {
            field.text.push_str(text);
        }
    }

    fn into_record(self) -> Record {
        Record {
            name: self.name,
            fields: self.fields,
        }
    }
}

impl XmlRecordSource<BufReader<File>> {
    /// ファイルを開いて新しい`XmlRecordSource`を返す。
    pub fn from_path(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
        debug!("Reading records from {}", path.display());

        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: BufRead> XmlRecordSource<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader: Reader::from_reader(reader),
            depth: 0,
            root_seen: false,
            finished: false,
            open_persons: Vec::new(),
        }
    }

    fn malformed(&self, message: impl Into<String>) -> MalformedInputError {
        MalformedInputError::new(message, self.reader.buffer_position() as u64)
    }

    fn read_event<'b>(&mut self, buf: &'b mut Vec<u8>) -> Result<Event<'b>, MalformedInputError> {
        let event = self.reader.read_event_into(buf);
        event.map_err(|err| self.malformed(err.to_string()))
    }

    /// ルート要素が2つ以上ないことを確認してから要素を開く。
    fn open_element(&mut self) -> Result<(), MalformedInputError> {
        if self.depth == 0 {
            if self.root_seen {
                return Err(self.malformed("extra content at the end of the document"));
            }
            self.root_seen = true;
        }
        self.depth += 1;
        Ok(())
    }

    fn close_element(&mut self) -> Result<(), MalformedInputError> {
        if self.depth == 0 {
            return Err(self.malformed("unexpected closing tag"));
        }
        self.depth -= 1;
        Ok(())
    }

    /// すべての属性を検証し、`full_name`属性の値を返す。
    fn read_attributes(&self, start: &BytesStart) -> Result<Option<String>, MalformedInputError> {
        let mut name = None;
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|err| self.malformed(err.to_string()))?;
            let value = attribute
                .unescape_value()
                .map_err(|err| self.malformed(err.to_string()))?;
            if name.is_none() && attribute.key.as_ref() == NAME_ATTRIBUTE {
                name = Some(value.into_owned());
            }
        }
        Ok(name)
    }

    /// 次に閉じられる`<person>`要素を読む。ドキュメントの終端に達した場合は`None`を返す。
    fn next_record(&mut self) -> Result<Option<Record>, MalformedInputError> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match self.read_event(&mut buf)? {
                Event::Start(start) => {
                    let name = self.read_attributes(&start)?;
                    self.open_element()?;
                    let depth = self.depth;
                    if let Some(person) = self.open_persons.last_mut() {
                        person.enter_child(&start, depth);
                    }
                    if start.name().as_ref() == RECORD_TAG {
                        self.open_persons.push(OpenPerson::new(name, depth));
                    }
                }
                Event::Empty(start) => {
                    let name = self.read_attributes(&start)?;
                    self.open_element()?;
                    let depth = self.depth;
                    if let Some(person) = self.open_persons.last_mut() {
                        person.enter_child(&start, depth);
                        person.leave_child(depth);
                    }
                    self.close_element()?;
                    if start.name().as_ref() == RECORD_TAG {
                        return Ok(Some(Record {
                            name,
                            fields: vec![],
                        }));
                    }
                }
                Event::End(_) => {
                    let depth = self.depth;
                    let finished = match self.open_persons.last() {
                        Some(person) if person.depth == depth => self.open_persons.pop(),
                        _ => None,
                    };
                    if let Some(person) = self.open_persons.last_mut() {
                        person.leave_child(depth);
                    }
                    self.close_element()?;
                    if let Some(person) = finished {
                        return Ok(Some(person.into_record()));
                    }
                }
                Event::Text(text) => {
                    if self.depth == 0 {
                        if !text.iter().all(u8::is_ascii_whitespace) {
                            return Err(self.malformed("text outside of the root element"));
                        }
                    } else {
                        let text = text
                            .unescape()
                            .map_err(|err| self.malformed(err.to_string()))?;
                        if let Some(person) = self.open_persons.last_mut() {
                            person.push_text(&text);
                        }
                    }
                }
                Event::CData(cdata) => {
                    if self.depth == 0 {
                        return Err(self.malformed("CDATA outside of the root element"));
                    }
                    if let Some(person) = self.open_persons.last_mut() {
                        person.push_text(&String::from_utf8_lossy(&cdata));
                    }
                }
                Event::Eof => {
                    if self.depth > 0 {
                        return Err(self.malformed("unexpected end of document"));
                    }
                    if !self.root_seen {
                        return Err(self.malformed("document is empty"));
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }
}

fn decode_tag(start: &BytesStart) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

impl<R: BufRead> Iterator for XmlRecordSource<R> {
    type Item = Result<Record, MalformedInputError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let item = self.next_record().transpose();
        if !matches!(item, Some(Ok(_))) {
            self.finished = true;
        }
        item
    }
}
