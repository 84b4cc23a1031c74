use datafusion::arrow::array::{ArrayRef, Float32Array, Float64Array, Int16Array, Int32Array, Int64Array};
use std::sync::Arc;

use crate::error::AstroError;

/// Byte order of a raw numeric buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    /// Byte order of the machine this binary was compiled for.
    pub const fn host() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }
}

/// Fixed-width numeric element types of a FITS binary table column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl ScalarKind {
    /// Map a FITS TFORM type code (`I`, `J`, `K`, `E`, `D`).
    pub fn from_tform(code: char) -> Option<Self> {
        match code.to_ascii_uppercase() {
            'I' => Some(ScalarKind::Int16),
            'J' => Some(ScalarKind::Int32),
            'K' => Some(ScalarKind::Int64),
            'E' => Some(ScalarKind::Float32),
            'D' => Some(ScalarKind::Float64),
            _ => None,
        }
    }

    pub fn width(&self) -> usize {
        match self {
            ScalarKind::Int16 => 2,
            ScalarKind::Int32 | ScalarKind::Float32 => 4,
            ScalarKind::Int64 | ScalarKind::Float64 => 8,
        }
    }
}

/// Reorder `raw`, a packed buffer of `width`-byte elements stored in
/// `stored` order, into `host` order. Pure: the host order is an argument.
pub fn to_host_order(
    raw: &[u8],
    width: usize,
    stored: ByteOrder,
    host: ByteOrder,
) -> Result<Vec<u8>, AstroError> {
    if width == 0 || raw.len() % width != 0 {
        return Err(AstroError::Parse(format!(
            "Buffer of {} bytes is not a whole number of {}-byte elements",
            raw.len(),
            width
        )));
    }

    let mut out = raw.to_vec();
    if stored != host {
        out.chunks_exact_mut(width).for_each(|chunk| chunk.reverse());
    }
    Ok(out)
}

/// Decode a raw column buffer into an Arrow array. FITS stores binary table
/// data big-endian, so callers reading straight from disk pass
/// `ByteOrder::Big`; `host` is normally `ByteOrder::host()`.
pub fn decode_column(
    raw: &[u8],
    kind: ScalarKind,
    stored: ByteOrder,
    host: ByteOrder,
) -> Result<ArrayRef, AstroError> {
    let native = to_host_order(raw, kind.width(), stored, host)?;
    let chunks = native.chunks_exact(kind.width());

    // Elements are now in `host` order
    macro_rules! decode {
        ($ty:ty, $array:ty) => {{
            let values = chunks
                .map(|c| {
                    let bytes = c.try_into().map_err(|_| {
                        AstroError::Internal(format!("Element of {} bytes for {:?}", c.len(), kind))
                    })?;
                    Ok(match host {
                        ByteOrder::Big => <$ty>::from_be_bytes(bytes),
                        ByteOrder::Little => <$ty>::from_le_bytes(bytes),
                    })
                })
                .collect::<Result<Vec<$ty>, AstroError>>()?;
            Arc::new(<$array>::from(values)) as ArrayRef
        }};
    }

    Ok(match kind {
        ScalarKind::Int16 => decode!(i16, Int16Array),
        ScalarKind::Int32 => decode!(i32, Int32Array),
        ScalarKind::Int64 => decode!(i64, Int64Array),
        ScalarKind::Float32 => decode!(f32, Float32Array),
        ScalarKind::Float64 => decode!(f64, Float64Array),
    })
}
