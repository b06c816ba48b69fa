//! Minimal FITS image-HDU codec.
//!
//! Reads and writes the subset of FITS this tool needs: a primary HDU plus
//! any number of IMAGE extensions, each a header of 80-byte cards packed in
//! 2880-byte blocks followed by a big-endian data payload. Integer payloads
//! (BITPIX 8/16/32/64, with BSCALE/BZERO) and float payloads (-32/-64) are
//! all promoted to `f64` on read; everything is written back as BITPIX -64
//! so table round-trips are exact.

use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::error::{ExtractError, Result};

const BLOCK: usize = 2880;
const CARD: usize = 80;

// ---------------------------------------------------------------------------
// Header cards
// ---------------------------------------------------------------------------

/// A parsed FITS header value.
#[derive(Debug, Clone, PartialEq)]
pub enum CardValue {
    Str(String),
    Int(i64),
    Real(f64),
    Logical(bool),
}

impl CardValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CardValue::Real(v) => Some(*v),
            CardValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CardValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for CardValue {
    fn from(s: &str) -> Self {
        CardValue::Str(s.to_string())
    }
}

impl From<String> for CardValue {
    fn from(s: String) -> Self {
        CardValue::Str(s)
    }
}

impl From<f64> for CardValue {
    fn from(v: f64) -> Self {
        CardValue::Real(v)
    }
}

impl From<i64> for CardValue {
    fn from(v: i64) -> Self {
        CardValue::Int(v)
    }
}

impl From<bool> for CardValue {
    fn from(v: bool) -> Self {
        CardValue::Logical(v)
    }
}

// ---------------------------------------------------------------------------
// HDU
// ---------------------------------------------------------------------------

/// One header-data unit: non-structural header cards plus an image payload.
///
/// `shape` is in FITS axis order, `[NAXIS1, NAXIS2, ...]`, with NAXIS1 the
/// fastest-varying axis. `data` is flat in that same order.
#[derive(Debug, Clone)]
pub struct Hdu {
    pub cards: Vec<(String, CardValue)>,
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl Hdu {
    /// A data-less HDU (NAXIS = 0), used as the primary of multi-extension files.
    pub fn empty() -> Hdu {
        Hdu {
            cards: Vec::new(),
            shape: Vec::new(),
            data: Vec::new(),
        }
    }

    /// An image HDU. `shape` is `[NAXIS1, NAXIS2, ...]` and must match `data`.
    pub fn image(shape: &[usize], data: Vec<f64>) -> Result<Hdu> {
        let npix: usize = shape.iter().product();
        if npix != data.len() {
            return Err(ExtractError::shape(
                format!("{npix} elements for shape {shape:?}"),
                format!("{} elements", data.len()),
            ));
        }
        Ok(Hdu {
            cards: Vec::new(),
            shape: shape.to_vec(),
            data,
        })
    }

    /// Append a header card, replacing any existing card with the same key.
    pub fn insert(&mut self, key: &str, value: impl Into<CardValue>) {
        let key = key.to_ascii_uppercase();
        let value = value.into();
        if let Some(slot) = self.cards.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.cards.push((key, value));
        }
    }

    pub fn value(&self, key: &str) -> Option<&CardValue> {
        let key = key.to_ascii_uppercase();
        self.cards.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn f64_value(&self, key: &str) -> Option<f64> {
        self.value(key).and_then(CardValue::as_f64)
    }

    pub fn str_value(&self, key: &str) -> Option<&str> {
        self.value(key).and_then(CardValue::as_str)
    }

    /// EXTNAME, if present.
    pub fn name(&self) -> Option<&str> {
        self.str_value("EXTNAME")
    }
}

// ---------------------------------------------------------------------------
// File-level API
// ---------------------------------------------------------------------------

/// An opened FITS file: all HDUs, fully read into memory.
#[derive(Debug)]
pub struct FitsFile {
    pub hdus: Vec<Hdu>,
}

impl FitsFile {
    /// Read every HDU of the file at `path`.
    pub fn open(path: &Path) -> Result<FitsFile> {
        let file = std::fs::File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut hdus = Vec::new();

        loop {
            match read_hdu(&mut reader)? {
                Some(hdu) => hdus.push(hdu),
                None => break,
            }
        }

        if hdus.is_empty() {
            return Err(ExtractError::data(format!(
                "{}: not a FITS file (no HDUs)",
                path.display()
            )));
        }
        Ok(FitsFile { hdus })
    }

    /// Look up an extension by EXTNAME (case-insensitive).
    pub fn by_name(&self, name: &str) -> Option<&Hdu> {
        self.hdus
            .iter()
            .find(|h| h.name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
    }

    /// Write `hdus` to `path`. The first HDU becomes the primary, the rest
    /// IMAGE extensions; all payloads are BITPIX -64.
    pub fn write(path: &Path, hdus: &[Hdu]) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = BufWriter::new(file);
        for (i, hdu) in hdus.iter().enumerate() {
            write_hdu(&mut writer, hdu, i == 0, hdus.len() > 1)?;
        }
        writer.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Keys the codec owns; they are regenerated on write and not kept as cards.
fn is_structural(key: &str) -> bool {
    matches!(
        key,
        "SIMPLE" | "XTENSION" | "BITPIX" | "NAXIS" | "EXTEND" | "PCOUNT" | "GCOUNT" | "BSCALE"
            | "BZERO"
    ) || (key.starts_with("NAXIS") && key[5..].chars().all(|c| c.is_ascii_digit()))
}

/// Read one HDU, or `None` at a clean end of file.
fn read_hdu(reader: &mut impl Read) -> Result<Option<Hdu>> {
    let mut block = [0u8; BLOCK];

    // Header blocks until an END card.
    let mut cards: Vec<(String, CardValue)> = Vec::new();
    let mut bitpix: i64 = 8;
    let mut naxis: Vec<usize> = Vec::new();
    let mut n_axes: usize = 0;
    let mut bscale = 1.0f64;
    let mut bzero = 0.0f64;
    let mut found_end = false;
    let mut first_block = true;

    while !found_end {
        match read_block(reader, &mut block)? {
            0 if first_block => return Ok(None),
            0 => return Err(ExtractError::data("truncated FITS header")),
            _ => {}
        }
        first_block = false;

        for rec in block.chunks_exact(CARD) {
            let card = std::str::from_utf8(rec).unwrap_or("").trim_end();
            if card.len() < 8 {
                continue;
            }
            let key = card[..8].trim();
            if key == "END" {
                found_end = true;
                break;
            }
            if key.is_empty() || key == "COMMENT" || key == "HISTORY" || key == "CONTINUE" {
                continue;
            }
            let Some(value) = card
                .get(8..10)
                .filter(|ind| *ind == "= ")
                .and_then(|_| parse_value(card[10..].trim()))
            else {
                continue;
            };

            match key {
                "BITPIX" => {
                    if let CardValue::Int(v) = value {
                        bitpix = v;
                    }
                }
                "NAXIS" => {
                    if let CardValue::Int(v) = value {
                        n_axes = v.max(0) as usize;
                    }
                }
                "BSCALE" => bscale = value.as_f64().unwrap_or(1.0),
                "BZERO" => bzero = value.as_f64().unwrap_or(0.0),
                k if k.starts_with("NAXIS") => {
                    let axis: usize = k[5..].parse().unwrap_or(0);
                    if axis > 0 {
                        if naxis.len() < axis {
                            naxis.resize(axis, 0);
                        }
                        if let CardValue::Int(v) = value {
                            naxis[axis - 1] = v.max(0) as usize;
                        }
                    }
                }
                _ if is_structural(key) => {}
                _ => cards.push((key.to_string(), value)),
            }
        }
    }

    naxis.truncate(n_axes);
    let npix: usize = if naxis.is_empty() || naxis.contains(&0) {
        0
    } else {
        naxis.iter().product()
    };

    // Data blocks.
    let mut data = Vec::with_capacity(npix);
    if npix > 0 {
        let nbytes = npix * (bitpix.unsigned_abs() as usize / 8);
        let padded = nbytes.div_ceil(BLOCK) * BLOCK;
        let mut raw = vec![0u8; padded];
        reader
            .read_exact(&mut raw)
            .map_err(|_| ExtractError::data("truncated FITS data payload"))?;

        let mut cur = &raw[..nbytes];
        for _ in 0..npix {
            let v = match bitpix {
                8 => f64::from(cur.read_u8()?),
                16 => f64::from(cur.read_i16::<BigEndian>()?),
                32 => f64::from(cur.read_i32::<BigEndian>()?),
                64 => cur.read_i64::<BigEndian>()? as f64,
                -32 => f64::from(cur.read_f32::<BigEndian>()?),
                -64 => cur.read_f64::<BigEndian>()?,
                other => {
                    return Err(ExtractError::data(format!("unsupported BITPIX {other}")));
                }
            };
            data.push(v * bscale + bzero);
        }
    }

    Ok(Some(Hdu {
        cards,
        shape: naxis,
        data,
    }))
}

/// Fill `block`, returning the byte count: 0 at a clean EOF, otherwise the
/// full block size. A partial block is a malformed file.
fn read_block(reader: &mut impl Read, block: &mut [u8; BLOCK]) -> Result<usize> {
    let mut filled = 0;
    while filled < BLOCK {
        let n = reader.read(&mut block[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(0);
            }
            return Err(ExtractError::data("FITS file is not a multiple of 2880 bytes"));
        }
        filled += n;
    }
    Ok(filled)
}

/// Parse a card's value field (everything after `= `), stripping any
/// `/ comment` part while respecting quoted strings.
fn parse_value(field: &str) -> Option<CardValue> {
    let field = field.trim();
    if field.is_empty() {
        return None;
    }

    if let Some(rest) = field.strip_prefix('\'') {
        // Character string; '' escapes a quote.
        let bytes = rest.as_bytes();
        let mut out = String::new();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'\'' {
                if bytes.get(i + 1) == Some(&b'\'') {
                    out.push('\'');
                    i += 2;
                } else {
                    break;
                }
            } else {
                out.push(bytes[i] as char);
                i += 1;
            }
        }
        return Some(CardValue::Str(out.trim_end().to_string()));
    }

    let bare = match field.find('/') {
        Some(pos) => field[..pos].trim(),
        None => field,
    };
    match bare {
        "T" => Some(CardValue::Logical(true)),
        "F" => Some(CardValue::Logical(false)),
        _ => {
            if let Ok(i) = bare.parse::<i64>() {
                return Some(CardValue::Int(i));
            }
            // Fortran-style D exponents appear in older files.
            bare.replace(['D', 'd'], "E")
                .parse::<f64>()
                .ok()
                .map(CardValue::Real)
        }
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

fn write_hdu(writer: &mut impl Write, hdu: &Hdu, primary: bool, extend: bool) -> Result<()> {
    let mut header: Vec<u8> = Vec::with_capacity(BLOCK);

    if primary {
        push_card(&mut header, "SIMPLE", &CardValue::Logical(true))?;
    } else {
        push_card(&mut header, "XTENSION", &CardValue::Str("IMAGE".into()))?;
    }
    push_card(&mut header, "BITPIX", &CardValue::Int(-64))?;
    push_card(&mut header, "NAXIS", &CardValue::Int(hdu.shape.len() as i64))?;
    for (i, &n) in hdu.shape.iter().enumerate() {
        push_card(&mut header, &format!("NAXIS{}", i + 1), &CardValue::Int(n as i64))?;
    }
    if primary && extend {
        push_card(&mut header, "EXTEND", &CardValue::Logical(true))?;
    }
    if !primary {
        push_card(&mut header, "PCOUNT", &CardValue::Int(0))?;
        push_card(&mut header, "GCOUNT", &CardValue::Int(1))?;
    }
    for (key, value) in &hdu.cards {
        push_card(&mut header, key, value)?;
    }
    header.extend_from_slice(format!("{:<80}", "END").as_bytes());
    pad_to_block(&mut header, b' ');
    writer.write_all(&header)?;

    if !hdu.data.is_empty() {
        let mut payload: Vec<u8> = Vec::with_capacity(hdu.data.len() * 8);
        for &v in &hdu.data {
            payload.write_f64::<BigEndian>(v)?;
        }
        pad_to_block(&mut payload, 0);
        writer.write_all(&payload)?;
    }
    Ok(())
}

fn push_card(header: &mut Vec<u8>, key: &str, value: &CardValue) -> Result<()> {
    if key.len() > 8 || !key.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
    {
        return Err(ExtractError::data(format!("invalid FITS keyword '{key}'")));
    }
    let value_str = match value {
        CardValue::Str(s) => format!("'{:<8}'", s.replace('\'', "''")),
        CardValue::Int(i) => format!("{i:>20}"),
        CardValue::Real(v) => format!("{:>20}", format_real(*v)),
        CardValue::Logical(b) => format!("{:>20}", if *b { "T" } else { "F" }),
    };
    let card = format!("{key:<8}= {value_str}");
    if card.len() > CARD {
        return Err(ExtractError::data(format!("FITS card too long for '{key}'")));
    }
    header.extend_from_slice(format!("{card:<80}").as_bytes());
    Ok(())
}

/// Full-precision real formatting: round-trips f64 exactly and always carries
/// a decimal point or exponent as the standard requires.
fn format_real(v: f64) -> String {
    if !v.is_finite() {
        // Header keywords never carry non-finite values in practice.
        return "0.0".to_string();
    }
    let s = format!("{v:?}");
    if s.contains('.') || s.contains('e') || s.contains('E') {
        s.replace('e', "E")
    } else {
        format!("{s}.0")
    }
}

fn pad_to_block(buf: &mut Vec<u8>, fill: u8) {
    let rem = buf.len() % BLOCK;
    if rem != 0 {
        buf.resize(buf.len() + BLOCK - rem, fill);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
