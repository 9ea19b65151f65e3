use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::CatalogError;

const BLOCK_LEN: usize = 2880;
const CARD_LEN: usize = 80;

pub trait TableReader: Send + Sync {
    fn read_table(&self, path: &Path) -> Result<Table, CatalogError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub repeat: usize,
    pub data: ColumnData,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Bool(Vec<bool>),
    Int(Vec<i64>),
    Float(Vec<f64>),
    Text(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Bool(values) => values.len(),
            ColumnData::Int(values) => values.len(),
            ColumnData::Float(values) => values.len(),
            ColumnData::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnData::Bool(_) => "bool",
            ColumnData::Int(_) => "int",
            ColumnData::Float(_) => "float",
            ColumnData::Text(_) => "text",
        }
    }
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn summary(&self) -> TableSummary {
        TableSummary {
            rows: self.rows,
            columns: self
                .columns
                .iter()
                .map(|column| ColumnSummary {
                    name: column.name.clone(),
                    dtype: column.data.type_name().to_string(),
                    repeat: column.repeat,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub rows: usize,
    pub columns: Vec<ColumnSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub dtype: String,
    pub repeat: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FitsTableReader;

impl TableReader for FitsTableReader {
    fn read_table(&self, path: &Path) -> Result<Table, CatalogError> {
        let bytes = fs::read(path)
            .map_err(|err| CatalogError::Filesystem(format!("read {}: {err}", path.display())))?;
        parse_fits_table(&bytes)
    }
}

pub fn parse_fits_table(bytes: &[u8]) -> Result<Table, CatalogError> {
    let (primary, offset) = read_header(bytes, 0)?;
    if primary.cards.first().map(|(key, _)| key.as_str()) != Some("SIMPLE") {
        return Err(format_error("file does not start with a SIMPLE card"));
    }
    let offset = offset
        .checked_add(padded(primary.data_len()?)?)
        .ok_or_else(|| format_error("primary HDU size overflows"))?;
    if offset >= bytes.len() {
        return Err(format_error("no extension HDU after the primary HDU"));
    }

    let (header, data_start) = read_header(bytes, offset)?;
    let xtension = header.text("XTENSION").unwrap_or_default();
    if xtension.trim() != "BINTABLE" {
        return Err(format_error(format!(
            "first extension is {:?}, expected BINTABLE",
            xtension.trim()
        )));
    }

    let row_len = header.usize("NAXIS1")?;
    let rows = header.usize("NAXIS2")?;
    let fields = header.usize("TFIELDS")?;

    let mut layouts = Vec::with_capacity(fields);
    let mut offset_in_row = 0usize;
    for index in 1..=fields {
        let tform = header
            .text(&format!("TFORM{index}"))
            .ok_or_else(|| format_error(format!("missing TFORM{index}")))?;
        let (repeat, code) = parse_tform(&tform)?;
        let name = header
            .text(&format!("TTYPE{index}"))
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("col{index}"));
        let scale = header.float(&format!("TSCAL{index}")).unwrap_or(1.0);
        let zero = header.float(&format!("TZERO{index}")).unwrap_or(0.0);
        layouts.push(ColumnLayout {
            name,
            repeat,
            code,
            offset: offset_in_row,
            scale,
            zero,
        });
        offset_in_row = repeat
            .checked_mul(code.width())
            .and_then(|width| offset_in_row.checked_add(width))
            .ok_or_else(|| format_error(format!("TFORM{index} width overflows")))?;
    }
    if offset_in_row != row_len {
        return Err(format_error(format!(
            "column widths add up to {offset_in_row} bytes but NAXIS1 is {row_len}"
        )));
    }

    let data_len = row_len
        .checked_mul(rows)
        .ok_or_else(|| format_error("table size overflows"))?;
    let data_end = data_start
        .checked_add(data_len)
        .ok_or_else(|| format_error("table size overflows"))?;
    let data = bytes
        .get(data_start..data_end)
        .ok_or_else(|| format_error("file is shorter than the declared table"))?;

    let columns = layouts
        .iter()
        .map(|layout| layout.decode(data, row_len, rows))
        .collect();

    Ok(Table { columns, rows })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldCode {
    Logical,
    Byte,
    Short,
    Int,
    Long,
    Char,
    Float,
    Double,
}

impl FieldCode {
    fn width(&self) -> usize {
        match self {
            FieldCode::Logical | FieldCode::Byte | FieldCode::Char => 1,
            FieldCode::Short => 2,
            FieldCode::Int | FieldCode::Float => 4,
            FieldCode::Long | FieldCode::Double => 8,
        }
    }
}

fn parse_tform(tform: &str) -> Result<(usize, FieldCode), CatalogError> {
    let trimmed = tform.trim();
    let digits = trimmed
        .chars()
        .take_while(|ch| ch.is_ascii_digit())
        .count();
    let repeat = if digits == 0 {
        1
    } else {
        trimmed[..digits]
            .parse()
            .map_err(|_| format_error(format!("bad TFORM {tform:?}")))?
    };
    let code = match trimmed[digits..].chars().next() {
        Some('L') => FieldCode::Logical,
        Some('B') => FieldCode::Byte,
        Some('I') => FieldCode::Short,
        Some('J') => FieldCode::Int,
        Some('K') => FieldCode::Long,
        Some('A') => FieldCode::Char,
        Some('E') => FieldCode::Float,
        Some('D') => FieldCode::Double,
        _ => {
            return Err(format_error(format!("unsupported TFORM {tform:?}")));
        }
    };
    Ok((repeat, code))
}

struct ColumnLayout {
    name: String,
    repeat: usize,
    code: FieldCode,
    offset: usize,
    scale: f64,
    zero: f64,
}

impl ColumnLayout {
    fn decode(&self, data: &[u8], row_len: usize, rows: usize) -> Column {
        let width = self.code.width();
        let cell = |row: usize, item: usize| {
            let start = row * row_len + self.offset + item * width;
            &data[start..start + width]
        };
        let repeat = self.repeat;
        let cells = move || (0..rows).flat_map(move |row| (0..repeat).map(move |item| (row, item)));

        let values = match self.code {
            FieldCode::Logical => {
                ColumnData::Bool(cells().map(|(row, item)| cell(row, item)[0] == b'T').collect())
            }
            FieldCode::Char => ColumnData::Text(
                (0..rows)
                    .map(|row| {
                        let start = row * row_len + self.offset;
                        let raw = &data[start..start + self.repeat];
                        let end = raw.iter().position(|byte| *byte == 0).unwrap_or(raw.len());
                        String::from_utf8_lossy(&raw[..end]).trim_end().to_string()
                    })
                    .collect(),
            ),
            FieldCode::Byte | FieldCode::Short | FieldCode::Int | FieldCode::Long => {
                let raw = cells().map(|(row, item)| read_integer(self.code, cell(row, item)));
                if self.scale == 1.0 && self.zero.fract() == 0.0 && self.zero.abs() < 9.2e18 {
                    let zero = self.zero as i64;
                    ColumnData::Int(raw.map(|value| value.wrapping_add(zero)).collect())
                } else {
                    ColumnData::Float(
                        raw.map(|value| value as f64 * self.scale + self.zero)
                            .collect(),
                    )
                }
            }
            FieldCode::Float | FieldCode::Double => ColumnData::Float(
                cells()
                    .map(|(row, item)| {
                        let bytes = cell(row, item);
                        let value = if self.code == FieldCode::Float {
                            f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
                        } else {
                            f64::from_be_bytes(eight(bytes))
                        };
                        value * self.scale + self.zero
                    })
                    .collect(),
            ),
        };

        Column {
            name: self.name.clone(),
            repeat: if self.code == FieldCode::Char { 1 } else { repeat },
            data: values,
        }
    }
}

fn read_integer(code: FieldCode, bytes: &[u8]) -> i64 {
    match code {
        FieldCode::Byte => bytes[0] as i64,
        FieldCode::Short => i16::from_be_bytes([bytes[0], bytes[1]]) as i64,
        FieldCode::Int => i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64,
        _ => i64::from_be_bytes(eight(bytes)),
    }
}

fn eight(bytes: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&bytes[..8]);
    out
}

#[derive(Debug, Clone, PartialEq)]
enum CardValue {
    Text(String),
    Int(i64),
    Float(f64),
    Logical(bool),
    Empty,
}

#[derive(Debug, Default)]
struct Header {
    cards: Vec<(String, CardValue)>,
}

impl Header {
    fn get(&self, key: &str) -> Option<&CardValue> {
        self.cards
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    fn text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            CardValue::Text(value) => Some(value.clone()),
            _ => None,
        }
    }

    fn int(&self, key: &str) -> Result<i64, CatalogError> {
        match self.get(key) {
            Some(CardValue::Int(value)) => Ok(*value),
            _ => Err(format_error(format!("missing integer keyword {key}"))),
        }
    }

    fn usize(&self, key: &str) -> Result<usize, CatalogError> {
        let value = self.int(key)?;
        usize::try_from(value).map_err(|_| format_error(format!("{key} is negative: {value}")))
    }

    fn float(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            CardValue::Int(value) => Some(*value as f64),
            CardValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    fn data_len(&self) -> Result<usize, CatalogError> {
        let naxis = self.usize("NAXIS")?;
        if naxis == 0 {
            return Ok(0);
        }
        let bitpix = self.int("BITPIX")?;
        let mut elements = 1usize;
        for axis in 1..=naxis {
            elements = elements
                .checked_mul(self.usize(&format!("NAXIS{axis}"))?)
                .ok_or_else(|| format_error("data size overflows"))?;
        }
        let pcount = self.get("PCOUNT").map(|_| self.usize("PCOUNT")).transpose()?;
        let gcount = self.get("GCOUNT").map(|_| self.usize("GCOUNT")).transpose()?;
        let bytes_per_value = usize::try_from(bitpix.unsigned_abs() / 8)
            .map_err(|_| format_error(format!("bad BITPIX {bitpix}")))?;
        pcount
            .unwrap_or(0)
            .checked_add(elements)
            .and_then(|values| values.checked_mul(gcount.unwrap_or(1)))
            .and_then(|values| values.checked_mul(bytes_per_value))
            .ok_or_else(|| format_error("data size overflows"))
    }
}

fn read_header(bytes: &[u8], offset: usize) -> Result<(Header, usize), CatalogError> {
    let mut header = Header::default();
    let mut block_start = offset;
    loop {
        let block = block_start
            .checked_add(BLOCK_LEN)
            .and_then(|block_end| bytes.get(block_start..block_end))
            .ok_or_else(|| format_error("header ends before the END card"))?;
        block_start += BLOCK_LEN;
        for chunk in block.chunks(CARD_LEN) {
            let text = String::from_utf8_lossy(chunk);
            let card: &str = &text;
            let keyword = card.get(..8).unwrap_or(card).trim_end();
            if keyword == "END" {
                return Ok((header, block_start));
            }
            if card.get(8..10) == Some("= ") {
                let value = parse_card_value(card.get(10..).unwrap_or_default());
                header.cards.push((keyword.to_string(), value));
            }
        }
    }
}

fn parse_card_value(raw: &str) -> CardValue {
    let raw = raw.trim_start();
    if let Some(rest) = raw.strip_prefix('\'') {
        let mut value = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch == '\'' {
                if chars.peek() == Some(&'\'') {
                    value.push('\'');
                    chars.next();
                    continue;
                }
                break;
            }
            value.push(ch);
        }
        return CardValue::Text(value.trim_end().to_string());
    }

    let value = raw.split('/').next().unwrap_or_default().trim();
    match value {
        "" => CardValue::Empty,
        "T" => CardValue::Logical(true),
        "F" => CardValue::Logical(false),
        _ => {
            if let Ok(int) = value.parse::<i64>() {
                CardValue::Int(int)
            } else if let Ok(float) = value.replace(['D', 'd'], "E").parse::<f64>() {
                CardValue::Float(float)
            } else {
                CardValue::Text(value.to_string())
            }
        }
    }
}

fn padded(len: usize) -> Result<usize, CatalogError> {
    len.div_ceil(BLOCK_LEN)
        .checked_mul(BLOCK_LEN)
        .ok_or_else(|| format_error("data size overflows"))
}

fn format_error(message: impl Into<String>) -> CatalogError {
    CatalogError::TableFormat(message.into())
}
