//! # Spreadsheet Loading
//!
//! Reads the first sheet of an Office Open XML (.xlsx, .xlsm) or OpenDocument
//! (.ods) workbook into a [`Grid`]. The container format is detected from the
//! bytes themselves, never from a file name.

mod cell;
mod grid;
mod ods;
mod reference;
mod sheet;
mod xlsx;

pub use cell::CellValue;
pub use grid::Grid;
pub use reference::column_name;

use crate::error::InsightError;
use crate::helpers::zip::ZipHelper;
use crate::spreadsheet::ods::OdsWorkbook;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::xlsx::XlsxWorkbook;
use log::debug;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use thiserror::Error;
use zip::ZipArchive;

/// Signature of a compound file (legacy .xls or an encrypted OOXML package).
const CFB_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Errors raised while decoding a workbook.
#[derive(Error, Debug)]
pub(crate) enum SheetError {
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("not a zip-based .xlsx or .ods workbook")]
    UnknownFormatError,

    #[error("compound file detected; legacy .xls and password-protected workbooks are not supported")]
    CompoundFileError,

    #[error("invalid ODS MIME type")]
    OdsMimeTypeError,

    #[error("password-protected workbook")]
    PasswordProtectedError,

    #[error("missing workbook part '{0}'")]
    MissingPartError(String),

    #[error("workbook has no sheets")]
    NoSheetsError,

    #[error("sheet '{0}' has no cells")]
    EmptySheetError(String),

    #[error("cell at row {} column {} lies outside the worksheet grid", .0 + 1, .1 + 1)]
    CellOutOfRangeError(usize, usize),

    #[error("sheet holds more than {0} cells")]
    SheetTooLargeError(usize),

    #[error("invalid value '{1}' for attribute '{0}'")]
    AttributeValueError(String, String),

    #[error("unknown XML entity '&{0};'")]
    XmlEntityError(String),
}

impl From<SheetError> for InsightError {
    fn from(error: SheetError) -> Self {
        match error {
            SheetError::EmptySheetError(_) => InsightError::EmptyFile,
            error => InsightError::UnreadableFormat(error.to_string()),
        }
    }
}

/// A workbook container able to produce its first worksheet.
pub(crate) trait Workbook {
    fn read_first_sheet(&mut self) -> Result<Sheet, SheetError>;
}

/// Loads the first sheet of a spreadsheet held in memory.
///
/// Fails with [`InsightError::UnreadableFormat`] when the bytes are not a
/// readable workbook and with [`InsightError::EmptyFile`] when the first sheet
/// holds no cells.
pub fn load(bytes: &[u8]) -> Result<Grid, InsightError> {
    let sheet = read_first_sheet(Cursor::new(bytes))?;
    if sheet.is_empty() {
        return Err(SheetError::EmptySheetError(sheet.name).into());
    }
    debug!("Loaded sheet '{}' with {} cells", sheet.name, sheet.cells.len());
    Ok(sheet.into_grid())
}

/// Detects the container format and reads its first sheet.
fn read_first_sheet<R: Read + Seek>(mut reader: R) -> Result<Sheet, SheetError> {
    if is_compound_file(&mut reader)? {
        Err(SheetError::CompoundFileError)?;
    }
    let mut zip = ZipArchive::new(reader).map_err(|_| SheetError::UnknownFormatError)?;
    if ods::is_ods(&mut zip)? {
        OdsWorkbook::new(zip)?.read_first_sheet()
    } else if zip.file("xl/workbook.xml")?.is_some() {
        XlsxWorkbook::new(zip)?.read_first_sheet()
    } else {
        Err(SheetError::UnknownFormatError)
    }
}

/// Checks for the compound file signature and rewinds the reader.
fn is_compound_file<R: Read + Seek>(reader: &mut R) -> Result<bool, SheetError> {
    let mut signature = Vec::with_capacity(CFB_SIGNATURE.len());
    reader.by_ref().take(CFB_SIGNATURE.len() as u64).read_to_end(&mut signature)?;
    reader.rewind()?;
    Ok(signature == CFB_SIGNATURE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::ExcelDateTime;
    use rust_xlsxwriter::Format;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn text(value: &str) -> CellValue {
        CellValue::from(value)
    }

    fn xlsx_bytes() -> Vec<u8> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        let sales = workbook.add_worksheet().set_name("Sales").unwrap();
        sales.write_string(0, 0, "Quarterly sales").unwrap();
        sales.write_string(1, 0, "Region").unwrap();
        sales.write_string(1, 1, "Total").unwrap();
        sales.write_string(1, 2, "Closed").unwrap();
        sales.write_string(1, 3, "Since").unwrap();
        sales.write_string(2, 0, "North").unwrap();
        sales.write_number(2, 1, 1250).unwrap();
        sales.write_boolean(2, 2, true).unwrap();
        let date = ExcelDateTime::from_ymd(2024, 1, 15).unwrap();
        sales.write_datetime_with_format(2, 3, &date, &date_format).unwrap();
        sales.write_string(3, 0, "South").unwrap();
        sales.write_number(3, 1, 980.5).unwrap();
        let other = workbook.add_worksheet().set_name("Other").unwrap();
        other.write_string(0, 0, "ignored").unwrap();
        workbook.save_to_buffer().unwrap()
    }

    fn ods_bytes(content: &str) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        writer.start_file("mimetype", stored).unwrap();
        writer.write_all(b"application/vnd.oasis.opendocument.spreadsheet").unwrap();
        writer.start_file("content.xml", SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    const ODS_CONTENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-content
    xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0"
    xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0"
    xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0">
  <office:body>
    <office:spreadsheet>
      <table:table table:name="Inventory">
        <table:table-row>
          <table:table-cell office:value-type="string"><text:p>Item</text:p></table:table-cell>
          <table:table-cell office:value-type="string"><text:p>Count</text:p></table:table-cell>
          <table:table-cell office:value-type="string"><text:p>Checked</text:p></table:table-cell>
        </table:table-row>
        <table:table-row>
          <table:table-cell office:value-type="string"><text:p>Bolts &amp; nuts</text:p></table:table-cell>
          <table:table-cell office:value-type="float" office:value="12.5"><text:p>12.5</text:p></table:table-cell>
          <table:table-cell office:value-type="date" office:date-value="2024-03-01T08:30:00"><text:p>03/01/24</text:p></table:table-cell>
        </table:table-row>
        <table:table-row>
          <table:table-cell table:number-columns-repeated="2"/>
          <table:table-cell office:value-type="boolean" office:boolean-value="true"><text:p>TRUE</text:p></table:table-cell>
        </table:table-row>
        <table:table-row table:number-rows-repeated="1048573">
          <table:table-cell table:number-columns-repeated="1024"/>
        </table:table-row>
      </table:table>
      <table:table table:name="Second">
        <table:table-row>
          <table:table-cell office:value-type="string"><text:p>ignored</text:p></table:table-cell>
        </table:table-row>
      </table:table>
    </office:spreadsheet>
  </office:body>
</office:document-content>"#;

    #[test]
    fn load_xlsx_first_sheet() {
        let grid = load(&xlsx_bytes()).unwrap();
        assert_eq!(grid.len(), 4);
        assert_eq!(grid.rows()[0], vec![text("Quarterly sales")]);
        assert_eq!(grid.rows()[1], vec![text("Region"), text("Total"), text("Closed"), text("Since")]);
        assert_eq!(
            grid.rows()[2],
            vec![text("North"), CellValue::Number(1250.0), text("true"), text("2024-01-15")]
        );
        assert_eq!(grid.rows()[3], vec![text("South"), CellValue::Number(980.5)]);
    }

    #[test]
    fn load_ods_first_table() {
        let grid = load(&ods_bytes(ODS_CONTENT)).unwrap();
        assert_eq!(grid.len(), 3);
        assert_eq!(grid.rows()[0], vec![text("Item"), text("Count"), text("Checked")]);
        assert_eq!(
            grid.rows()[1],
            vec![text("Bolts & nuts"), CellValue::Number(12.5), text("2024-03-01 08:30:00")]
        );
        assert_eq!(grid.rows()[2], vec![CellValue::Empty, CellValue::Empty, text("true")]);
    }

    #[test]
    fn load_date_past_calendar_as_text() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        let worksheet = workbook.add_worksheet();
        worksheet.write_number_with_format(0, 0, 1.0e9, &date_format).unwrap();
        let grid = load(&workbook.save_to_buffer().unwrap()).unwrap();
        assert_eq!(grid.rows()[0], vec![text("1000000000")]);
    }

    #[test]
    fn load_ods_rejects_oversized_repeats() {
        let content = ODS_CONTENT.replace(
            r#"<table:table-cell table:number-columns-repeated="1024"/>"#,
            r#"<table:table-cell table:number-columns-repeated="1024" office:value-type="float" office:value="1"/>"#,
        );
        match load(&ods_bytes(&content)) {
            Err(InsightError::UnreadableFormat(message)) => assert!(message.contains("more than")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn load_empty_sheet() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        workbook.add_worksheet();
        let bytes = workbook.save_to_buffer().unwrap();
        assert!(matches!(load(&bytes), Err(InsightError::EmptyFile)));
    }

    #[test]
    fn load_unreadable_bytes() {
        assert!(matches!(load(b"region,total\nnorth,3\n"), Err(InsightError::UnreadableFormat(_))));
        assert!(matches!(load(&[]), Err(InsightError::UnreadableFormat(_))));

        let mut compound = CFB_SIGNATURE.to_vec();
        compound.resize(512, 0);
        match load(&compound) {
            Err(InsightError::UnreadableFormat(message)) => assert!(message.contains("compound file")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn load_zip_without_workbook() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("readme.txt", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"hello").unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        assert!(matches!(load(&bytes), Err(InsightError::UnreadableFormat(_))));
    }
}
