use crate::helpers::xml::push_character_data;
use crate::helpers::xml::XmlElementExt;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::SheetError;
use crate::spreadsheet::Workbook;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::io::Read;
use std::io::Seek;
use zip::ZipArchive;

/// ODS file MIME type identifier
const MIME_TYPE: &[u8] = b"application/vnd.oasis.opendocument.spreadsheet";
/// XML element name for spreadsheet root
const SPREADSHEET: QName = QName(b"office:spreadsheet");
/// XML element name for table (sheet)
const TABLE: QName = QName(b"table:table");
/// XML element name for table row
const TABLE_ROW: QName = QName(b"table:table-row");
/// XML element name for table cell
const TABLE_CELL: QName = QName(b"table:table-cell");
/// XML element name for covered table cell (merged cells)
const TABLE_COVERED_CELL: QName = QName(b"table:covered-table-cell");
/// XML element name for annotations (comments)
const ANNOTATION: QName = QName(b"office:annotation");
/// XML element name for paragraph text
const PARAGRAPH: QName = QName(b"text:p");
/// XML element name for string (space) text
const STRING: QName = QName(b"text:s");

/// An OpenDocument spreadsheet held in a zip archive.
pub(crate) struct OdsWorkbook<R: Read + Seek> {
    zip: ZipArchive<R>,
}

impl<R: Read + Seek> OdsWorkbook<R> {
    /// Validates the MIME type and rejects encrypted documents.
    pub(crate) fn new(mut zip: ZipArchive<R>) -> Result<Self, SheetError> {
        if !is_ods(&mut zip)? {
            Err(SheetError::OdsMimeTypeError)?;
        }
        if is_password_protected(&mut zip)? {
            Err(SheetError::PasswordProtectedError)?;
        }
        Ok(OdsWorkbook { zip })
    }
}

impl<R: Read + Seek> Workbook for OdsWorkbook<R> {
    fn read_first_sheet(&mut self) -> Result<Sheet, SheetError> {
        let mut reader = self.zip
            .xml_reader("content.xml")?
            .ok_or_else(|| SheetError::MissingPartError("content.xml".to_owned()))?;

        let mut sheet: Option<Sheet> = None;
        match_xml_events!(reader => {
            Event::End(event) if event.name() == SPREADSHEET => break,
            Event::Start(event) if event.name() == TABLE => {
                let table_name = event.attribute("table:name")?.unwrap_or_default();
                sheet = Some(Sheet::new(&table_name));
                break;
            }
        });
        let mut sheet = sheet.ok_or(SheetError::NoSheetsError)?;

        let mut row = 0usize;
        let mut col = 0usize;
        let mut row_count = 0usize;
        let mut col_count = 0usize;
        let mut kind = CellType::default();
        let mut value = String::new();
        let mut element_context = false;
        let mut comment_context = false;
        match_xml_events!(reader => {
            Event::End(event) if event.name() == TABLE => break,
            Event::Start(event) if event.name() == TABLE_ROW => {
                row_count = event.parse_attribute("table:number-rows-repeated")?.unwrap_or(1);
                col = 0;
            }
            Event::End(event) if event.name() == TABLE_ROW => {
                row = row.saturating_add(row_count);
                if Sheet::is_past_last_row(row) {
                    break;
                }
            }
            Event::Start(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                value.clear();
                col_count = event.parse_attribute::<usize>("table:number-columns-repeated")?.unwrap_or(1);
                let value_type = event.attribute("office:value-type")?;
                kind = match value_type.as_deref() {
                    Some("boolean") => CellType::Boolean,
                    Some("date") => CellType::IsoDateTime,
                    Some("time") => CellType::IsoDuration,
                    Some("string") => {
                        if event.attribute_is("calcext:value-type", "error")? {
                            CellType::Error
                        } else {
                            CellType::InlineString
                        }
                    }
                    Some(_) => CellType::Number,
                    None => CellType::Empty,
                };
                match value_type.as_deref() {
                    Some("string") => element_context = true,
                    Some("boolean") => {
                        let is_true = event.attribute("office:boolean-value")?
                            .map(|cow| cow != "false" && cow != "0")
                            .unwrap_or(false);
                        value.push_str(if is_true { "1" } else { "0" });
                    }
                    Some("date") => if let Some(data) = event.attribute("office:date-value")? {
                        value.push_str(&data);
                    }
                    Some("time") => if let Some(data) = event.attribute("office:time-value")? {
                        value.push_str(&data);
                    }
                    Some(_) => if let Some(data) = event.attribute("office:value")? {
                        value.push_str(&data);
                    }
                    None => (),
                }
            }
            Event::End(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                let cell = Cell {
                    row,
                    col,
                    kind,
                    value: std::mem::take(&mut value),
                };
                sheet.push_repeated(cell, row_count, col_count)?;
                col = col.saturating_add(col_count);
                element_context = false;
                comment_context = false;
            }
            Event::Start(event) if element_context && event.name() == ANNOTATION => comment_context = true,
            Event::End(event) if element_context && comment_context && event.name() == ANNOTATION => comment_context = false,
            Event::Start(event) if element_context && !comment_context && event.name() == PARAGRAPH => {
                if !value.is_empty() {
                    value.push('\n');
                }
            }
            Event::Start(event) if element_context && !comment_context && event.name() == STRING => {
                let count = event.parse_attribute("text:c")?.unwrap_or(1);
                for _ in 0..count {
                    value.push(' ');
                }
            }
            event @ (Event::Text(_) | Event::GeneralRef(_)) if element_context && !comment_context => {
                push_character_data(&mut value, &event)?;
            }
        });
        Ok(sheet)
    }
}

/// Returns true if the archive carries the OpenDocument spreadsheet MIME type.
pub(crate) fn is_ods<R: Read + Seek>(zip: &mut ZipArchive<R>) -> Result<bool, SheetError> {
    match zip.file("mimetype")? {
        Some(file) => {
            let mut buffer = Vec::with_capacity(MIME_TYPE.len());
            file.take(MIME_TYPE.len() as u64 + 1).read_to_end(&mut buffer)?;
            Ok(buffer == MIME_TYPE)
        }
        None => Ok(false),
    }
}

/// Checks the manifest for encryption data. A missing manifest means no encryption.
fn is_password_protected<R: Read + Seek>(zip: &mut ZipArchive<R>) -> Result<bool, SheetError> {
    let mut reader = match zip.xml_reader("META-INF/manifest.xml")? {
        Some(reader) => reader,
        None => return Ok(false),
    };
    let mut in_file_entry = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == QName(b"manifest:file-entry") => in_file_entry = true,
        Event::End(event) if event.name() == QName(b"manifest:file-entry") => in_file_entry = false,
        Event::Start(event) if in_file_entry && event.name() == QName(b"manifest:encryption-data") => {
            return Ok(true);
        }
    });
    Ok(false)
}
