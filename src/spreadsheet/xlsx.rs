use crate::helpers::xml::push_character_data;
use crate::helpers::xml::XmlElementExt;
use crate::helpers::xml::XmlReader;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::SheetError;
use crate::spreadsheet::Workbook;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::BufRead;
use std::io::Read;
use std::io::Seek;
use zip::ZipArchive;

// XML tag names for parsing Excel XLSX format
const TAG_RELATIONSHIP: &[u8] = b"Relationship";            // Relationship in a .rels part
const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts");        // Custom number formats container
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");          // Individual custom number format
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");        // Cell format indexes container
const TAG_FORMAT_INDEX: QName = QName(b"xf");               // Individual cell format index
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");         // Shared string table item
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");             // Phonetic text for Asian languages
const TAG_TEXT: QName = QName(b"t");                        // Text content within strings
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr"); // Workbook properties
const TAG_SHEET: QName = QName(b"sheet");                   // Worksheet definition
const TAG_ROW: QName = QName(b"row");                       // Row in worksheet
const TAG_CELL: QName = QName(b"c");                        // Cell in worksheet
const TAG_INLINE_STRING: QName = QName(b"is");              // Inline string value
const TAG_VALUE: QName = QName(b"v");                       // Cell value content

/// An Office Open XML workbook (.xlsx, .xlsm) held in a zip archive.
pub(crate) struct XlsxWorkbook<R: Read + Seek> {
    zip: ZipArchive<R>,
    /// Cell types indexed by style id
    number_formats: Vec<CellType>,
    /// Shared string table
    shared_strings: Vec<String>,
    /// Worksheets in workbook order as (name, zip_path) pairs
    sheets: Vec<(String, String)>,
}

impl<R: Read + Seek> XlsxWorkbook<R> {
    /// Reads the workbook structure, styles and shared strings.
    pub(crate) fn new(mut zip: ZipArchive<R>) -> Result<Self, SheetError> {
        let (sheets, is_1904) = load_workbook(&mut zip)?;
        if sheets.is_empty() {
            Err(SheetError::NoSheetsError)?
        }
        let number_formats = load_number_formats(&mut zip, is_1904)?;
        let shared_strings = load_shared_strings(&mut zip)?;
        Ok(XlsxWorkbook {
            zip,
            number_formats,
            shared_strings,
            sheets,
        })
    }
}

impl<R: Read + Seek> Workbook for XlsxWorkbook<R> {
    fn read_first_sheet(&mut self) -> Result<Sheet, SheetError> {
        let (sheet_name, zip_path) = self.sheets.first().cloned().ok_or(SheetError::NoSheetsError)?;
        let mut sheet = Sheet::new(&sheet_name);
        let mut row_count = 0usize;
        let mut col_count = 0usize;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut kind = CellType::default();
        let mut value = String::new();
        let mut reader = self.zip
            .xml_reader(&zip_path)?
            .ok_or_else(|| SheetError::MissingPartError(zip_path.to_owned()))?;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_ROW => {
                if let Some(number) = event.parse_attribute::<usize>("r")? {
                    row_count = number.saturating_sub(1);
                }
                col_count = 0;
            }
            Event::End(event) if event.name() == TAG_ROW => {
                row_count = row_count.saturating_add(1);
            }
            Event::Start(event) if event.name() == TAG_CELL => {
                (row, col) = event.attribute("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .unwrap_or((row_count, col_count));
                col_count = col + 1;
                value.clear();
                kind = event.attribute("t")?.map(|t| {
                    match t.as_ref() {
                        "inlineStr" | "str" => CellType::InlineString,
                        "s" => CellType::SharedString,
                        "d" => CellType::IsoDateTime,
                        "b" => CellType::Boolean,
                        "e" => CellType::Error,
                        _ => CellType::Number,
                    }
                }).unwrap_or(CellType::Number);
                if let Some(format_id) = event.attribute("s")? {
                    if kind == CellType::Number && !format_id.is_empty() {
                        let index = format_id.parse::<usize>()?;
                        kind = self.number_formats.get(index).copied().unwrap_or(CellType::Number);
                    }
                }
            }
            Event::Start(event) if kind != CellType::Empty && event.name() == TAG_INLINE_STRING => {
                value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
            }
            Event::Start(event) if kind != CellType::Empty && event.name() == TAG_VALUE => {
                value = read_string_value(&mut reader, TAG_VALUE, true)?;
            }
            Event::End(event) if event.name() == TAG_CELL => {
                if kind == CellType::SharedString {
                    let index = value.parse::<usize>()?;
                    value = self.shared_strings.get(index).cloned().unwrap_or_default();
                }
                sheet.push(Cell {
                    row,
                    col,
                    kind,
                    value: std::mem::take(&mut value),
                })?;
                kind = CellType::Empty;
            },
        });
        Ok(sheet)
    }
}

/// Loads worksheet relationships from a .rels part as a mapping of
/// relationship ids to worksheet paths.
fn load_relationships<R: Read + Seek>(zip: &mut ZipArchive<R>, path: &str) -> Result<HashMap<String, String>, SheetError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SheetError::MissingPartError(path.to_string()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.attribute("Id")?;
            let kind = event.attribute("Type")?;
            let target = event.attribute("Target")?;
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Normalizes a relationship target to a path inside the archive.
fn to_zip_path(path: Cow<'_, str>) -> String {
    if let Some(stripped) = path.strip_prefix('/') {
        stripped.to_string()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}

/// Loads the worksheet list from workbook.xml and whether the file uses the
/// 1904 date system.
fn load_workbook<R: Read + Seek>(zip: &mut ZipArchive<R>) -> Result<(Vec<(String, String)>, bool), SheetError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip.xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SheetError::MissingPartError("xl/workbook.xml".to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.unescape_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.unescape_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(id.as_ref()) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.attribute("date1904")?
                .map(|value| value.eq("1") || value.eq("true"))
                .unwrap_or(false);
        }
    });
    Ok((sheets, is_1904))
}

/// Loads cell styles from styles.xml and maps each style id to the cell type
/// its number format implies (dates, times or plain numbers).
fn load_number_formats<R: Read + Seek>(zip: &mut ZipArchive<R>, is_1904: bool) -> Result<Vec<CellType>, SheetError> {
    let mut reader = match zip.xml_reader("xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<String, CellType>::new();
    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<String>::new();

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.attribute("numFmtId")?;
            let format = event.attribute("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                custom_formats.insert(id.to_string(), CellType::parse_custom_number_format(&format, is_1904));
            }
        }
        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = false,
        Event::Start(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEX => {
            format_indexes.push(event.attribute("numFmtId")?.map(|id| id.to_string()).unwrap_or_default());
        }
    });

    Ok(format_indexes
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| CellType::parse_builtin_number_format_id(id, is_1904))
                .unwrap_or(CellType::Number)
        })
        .collect())
}

/// Loads the whole shared string table.
fn load_shared_strings<R: Read + Seek>(zip: &mut ZipArchive<R>) -> Result<Vec<String>, SheetError> {
    let mut shared_strings = Vec::<String>::new();
    let mut reader = match zip.xml_reader("xl/sharedStrings.xml")? {
        Some(reader) => reader,
        None => return Ok(shared_strings),
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            shared_strings.push(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
        }
    });
    Ok(shared_strings)
}

/// Reads string content up to `end_tag`, skipping phonetic annotations.
///
/// With `is_text_content` every text node counts; otherwise only text inside
/// `<t>` elements does (rich text runs).
fn read_string_value<B: BufRead>(
    reader: &mut XmlReader<B>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, SheetError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = is_text_content,
        event @ (Event::Text(_) | Event::CData(_) | Event::GeneralRef(_)) if is_text => {
            push_character_data(&mut text, &event)?;
        }
    });
    Ok(text)
}
