//! Pull-parser plumbing for the XML parts of .xlsx and .ods packages.

use crate::spreadsheet::SheetError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use std::str::FromStr;

/// Event reader over one package part.
///
/// Empty elements are reported as a start and an end event, so the readers
/// only ever match `Event::Start` and `Event::End`.
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    pub(crate) fn new(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        let config = reader.config_mut();
        config.expand_empty_elements = true;
        config.check_end_names = false;
        config.check_comments = false;
        config.trim_text(false);
        Self {
            reader,
            buffer: Vec::with_capacity(1024),
        }
    }

    /// Next event, or `None` at the end of the part.
    pub(crate) fn next(&mut self) -> Result<Option<Event<'_>>, SheetError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer)? {
            Event::Eof => Ok(None),
            event => Ok(Some(event)),
        }
    }
}

/// Attribute lookup on start tags.
pub(crate) trait XmlElementExt<'a> {
    /// Unescaped value of the attribute `name`.
    fn attribute(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, SheetError>;

    /// Value of the attribute `name` parsed as `T`; unparsable values are an error.
    fn parse_attribute<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, SheetError>;

    /// True when the attribute `name` is present and equals `expected`.
    fn attribute_is(&'a self, name: &str, expected: &str) -> Result<bool, SheetError>;
}

impl<'a> XmlElementExt<'a> for BytesStart<'a> {
    fn attribute(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, SheetError> {
        match self.try_get_attribute(name)? {
            Some(attribute) => Ok(Some(attribute.unescape_value()?)),
            None => Ok(None),
        }
    }

    fn parse_attribute<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, SheetError> {
        match self.attribute(name)? {
            Some(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| SheetError::AttributeValueError(name.to_owned(), value.to_string())),
            None => Ok(None),
        }
    }

    fn attribute_is(&'a self, name: &str, expected: &str) -> Result<bool, SheetError> {
        Ok(self.attribute(name)?.is_some_and(|value| value == expected))
    }
}

/// Appends the character data carried by `event` to `text`.
///
/// Text, CDATA and entity or character references contribute; every other
/// event is ignored.
pub(crate) fn push_character_data(text: &mut String, event: &Event) -> Result<(), SheetError> {
    match event {
        Event::Text(content) => text.push_str(&content.xml_content()?),
        Event::CData(content) => text.push_str(&content.xml_content()?),
        Event::GeneralRef(reference) => {
            let name = reference.xml_content()?;
            match name.strip_prefix('#') {
                Some(code) => text.push(character_reference(code).ok_or_else(|| {
                    SheetError::XmlEntityError(name.to_string())
                })?),
                None => text.push_str(
                    resolve_xml_entity(&name).ok_or_else(|| SheetError::XmlEntityError(name.to_string()))?,
                ),
            }
        }
        _ => (),
    }
    Ok(())
}

/// Decodes the part of `&#...;` after the `#`, decimal or `x` hexadecimal.
fn character_reference(code: &str) -> Option<char> {
    let value = match code.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => code.parse::<u32>().ok()?,
    };
    char::from_u32(value)
}

/// Drives `$reader` to the end of its part, dispatching each event to the arms.
/// Events no arm matches are skipped.
#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(result) = $reader.next()? {
            match result {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}
