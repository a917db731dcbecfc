// Spreadsheet type detection: derives the declared MIME type of a selected file.

pub const CSV_MIME: &str = "text/csv";
pub const LEGACY_EXCEL_MIME: &str = "application/vnd.ms-excel";
pub const MODERN_EXCEL_MIME: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const UNKNOWN_MIME: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    LegacyExcel, // .xls, OLE2 compound document
    ModernExcel, // .xlsx, ZIP container
    Unknown,
}

impl FileKind {
    pub fn mime(self) -> &'static str {
        match self {
            FileKind::Csv => CSV_MIME,
            FileKind::LegacyExcel => LEGACY_EXCEL_MIME,
            FileKind::ModernExcel => MODERN_EXCEL_MIME,
            FileKind::Unknown => UNKNOWN_MIME,
        }
    }
}

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
const OLE2_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Detect the spreadsheet kind from the first bytes of a file and its name.
///
/// Binary formats are recognised by magic bytes; the container alone is not
/// enough (any ZIP is not a workbook), so the extension has to agree.
/// CSV has no magic and is accepted on extension when the header is text.
pub fn detect_file_kind(header: &[u8], file_name: &str) -> FileKind {
    let lower = file_name.to_ascii_lowercase();

    if header.len() >= 4 && header[0..4] == ZIP_MAGIC && lower.ends_with(".xlsx") {
        return FileKind::ModernExcel;
    }

    if header.len() >= 8 && header[0..8] == OLE2_MAGIC && lower.ends_with(".xls") {
        return FileKind::LegacyExcel;
    }

    if lower.ends_with(".csv") && looks_like_text(header) {
        return FileKind::Csv;
    }

    FileKind::Unknown
}

/// Whether a dropped file's declared type is one the backend can process.
pub fn is_accepted_mime(mime: &str) -> bool {
    let essence = mime.split(';').next().unwrap_or("").trim();
    essence.eq_ignore_ascii_case(CSV_MIME)
        || essence.eq_ignore_ascii_case(LEGACY_EXCEL_MIME)
        || essence.eq_ignore_ascii_case(MODERN_EXCEL_MIME)
}

fn looks_like_text(header: &[u8]) -> bool {
    !header.contains(&0)
}
