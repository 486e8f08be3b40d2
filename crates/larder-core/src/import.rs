//! Receipt import from externally parsed files
//!
//! OCR happens elsewhere. This module accepts the parser's JSON output, or a
//! CSV of line items, and turns it into a [`Receipt`]. Every import carries a
//! SHA-256 of the raw file so the same receipt is not stored twice.

use std::fs;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Receipt, ReceiptItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptFormat {
    Json,
    Csv,
}

impl ReceiptFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }

    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        ext.parse().ok()
    }
}

impl std::str::FromStr for ReceiptFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(format!("Unknown receipt format: {}", s)),
        }
    }
}

impl std::fmt::Display for ReceiptFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A receipt as read from a file, before it has an id
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReceipt {
    pub store_name: Option<String>,
    pub purchased_on: Option<NaiveDate>,
    pub printed_total: Option<f64>,
    pub items: Vec<ReceiptItem>,
    pub content_hash: String,
}

impl ParsedReceipt {
    pub fn into_receipt(self, id: impl Into<String>) -> Receipt {
        Receipt {
            id: id.into(),
            store_name: self.store_name,
            purchased_on: self.purchased_on,
            printed_total: self.printed_total,
            items: self.items,
            list_id: None,
            content_hash: Some(self.content_hash),
        }
    }
}

/// Read and parse a receipt file. The format defaults to the file extension.
pub fn load_receipt_file(path: &Path, format: Option<ReceiptFormat>) -> Result<ParsedReceipt> {
    let format = format
        .or_else(|| ReceiptFormat::from_path(path))
        .ok_or_else(|| {
            Error::Import(format!(
                "Cannot tell the format of {}; pass json or csv explicitly",
                path.display()
            ))
        })?;
    let content = fs::read(path)?;
    parse_receipt(&content, format)
}

/// Parse receipt bytes in the given format
pub fn parse_receipt(content: &[u8], format: ReceiptFormat) -> Result<ParsedReceipt> {
    let content_hash = content_hash(content);
    let mut parsed = match format {
        ReceiptFormat::Json => parse_json(content)?,
        ReceiptFormat::Csv => parse_csv(content)?,
    };
    if parsed.items.is_empty() {
        return Err(Error::Import("Receipt has no line items".into()));
    }
    parsed.content_hash = content_hash;
    debug!(
        format = %format,
        items = parsed.items.len(),
        hash = %parsed.content_hash,
        "Parsed receipt"
    );
    Ok(parsed)
}

/// SHA-256 of the raw file, hex encoded
pub fn content_hash(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Receipt parser output
#[derive(Debug, Deserialize)]
struct RawReceipt {
    #[serde(default, alias = "store", alias = "merchant")]
    store_name: Option<String>,
    #[serde(default, alias = "purchased_on", alias = "purchase_date")]
    date: Option<String>,
    #[serde(default, alias = "printed_total")]
    total: Option<f64>,
    #[serde(default)]
    items: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(alias = "description")]
    name: String,
    #[serde(default, alias = "qty")]
    quantity: Option<f64>,
    #[serde(default, alias = "price")]
    unit_price: Option<f64>,
    #[serde(default, alias = "total")]
    total_price: Option<f64>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    confidence: Option<u8>,
}

fn parse_json(content: &[u8]) -> Result<ParsedReceipt> {
    let raw: RawReceipt = serde_json::from_slice(content)?;
    let purchased_on = raw.date.as_deref().map(parse_date).transpose()?;

    let items = raw
        .items
        .into_iter()
        .map(|item| {
            build_item(
                item.name,
                item.quantity,
                item.unit_price,
                item.total_price,
                item.category,
                item.size,
                item.unit,
                item.confidence,
            )
        })
        .collect();

    Ok(ParsedReceipt {
        store_name: non_empty(raw.store_name),
        purchased_on,
        printed_total: raw.total,
        items,
        content_hash: String::new(),
    })
}

/// Column positions in a line-item CSV, found by header name
#[derive(Debug, Default)]
struct CsvColumns {
    name: Option<usize>,
    quantity: Option<usize>,
    unit_price: Option<usize>,
    total_price: Option<usize>,
    category: Option<usize>,
    size: Option<usize>,
    unit: Option<usize>,
    confidence: Option<usize>,
}

impl CsvColumns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let mut columns = Self::default();
        for (i, header) in headers.iter().enumerate() {
            let slot = match header.trim().to_lowercase().replace(['_', '-'], " ").as_str() {
                "name" | "item" | "description" => &mut columns.name,
                "quantity" | "qty" => &mut columns.quantity,
                "unit price" | "price" => &mut columns.unit_price,
                "total price" | "total" | "line total" => &mut columns.total_price,
                "category" => &mut columns.category,
                "size" => &mut columns.size,
                "unit" => &mut columns.unit,
                "confidence" => &mut columns.confidence,
                _ => continue,
            };
            slot.get_or_insert(i);
        }
        if columns.name.is_none() {
            return Err(Error::Import("CSV receipt needs a name column".into()));
        }
        Ok(columns)
    }
}

fn parse_csv<R: Read>(reader: R) -> Result<ParsedReceipt> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns = CsvColumns::from_headers(rdr.headers()?)?;
    let mut items = Vec::new();

    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        let field = |col: Option<usize>| {
            col.and_then(|i| record.get(i))
                .map(str::to_string)
                .filter(|s| !s.is_empty())
        };

        let Some(name) = field(columns.name) else {
            // Blank rows are common at the end of exported sheets
            continue;
        };
        let amount = |col: Option<usize>| field(col).map(|s| parse_amount(&s)).transpose();
        let confidence = field(columns.confidence)
            .map(|s| {
                s.parse::<u8>().map_err(|_| {
                    Error::Import(format!("Row {}: invalid confidence '{}'", row + 2, s))
                })
            })
            .transpose()?;

        items.push(build_item(
            name,
            amount(columns.quantity)?,
            amount(columns.unit_price)?,
            amount(columns.total_price)?,
            field(columns.category),
            field(columns.size),
            field(columns.unit),
            confidence,
        ));
    }

    Ok(ParsedReceipt {
        store_name: None,
        purchased_on: None,
        printed_total: None,
        items,
        content_hash: String::new(),
    })
}

/// Fill in whichever of unit/total price the parser left out
#[allow(clippy::too_many_arguments)]
fn build_item(
    name: String,
    quantity: Option<f64>,
    unit_price: Option<f64>,
    total_price: Option<f64>,
    category: Option<String>,
    size: Option<String>,
    unit: Option<String>,
    confidence: Option<u8>,
) -> ReceiptItem {
    let quantity = quantity.unwrap_or(1.0);
    let (unit_price, total_price) = match (unit_price, total_price) {
        (Some(unit), Some(total)) => (unit, total),
        (Some(unit), None) => (unit, unit * quantity),
        (None, Some(total)) if quantity > 0.0 => (total / quantity, total),
        (None, Some(total)) => (0.0, total),
        (None, None) => (0.0, 0.0),
    };

    ReceiptItem {
        name: name.trim().to_string(),
        quantity,
        unit_price,
        total_price,
        category: non_empty(category),
        size: non_empty(size),
        unit: non_empty(unit),
        confidence,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse a receipt date in the formats receipt parsers commonly emit
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();

    let formats = [
        "%Y-%m-%d", // 2024-01-15
        "%m/%d/%Y", // 01/15/2024
        "%m/%d/%y", // 01/15/24
        "%d.%m.%Y", // 15.01.2024
    ];

    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }

    // Full timestamps: keep the date part
    if let Some((date, _)) = s.split_once('T') {
        if let Ok(date) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
            return Ok(date);
        }
    }

    Err(Error::Import(format!("Unable to parse date: {}", s)))
}

/// Parse an amount string, handling currency symbols and thousands separators
fn parse_amount(s: &str) -> Result<f64> {
    let cleaned: String = s
        .trim()
        .replace(['$', '£', '€', ',', ' '], "");

    cleaned
        .parse::<f64>()
        .map_err(|_| Error::Import(format!("Unable to parse amount: {}", s)))
}
