//! Reference host value model.
//!
//! Mirrors what a numerical environment hands over: text, numeric arrays of
//! any element type (column-major, arbitrary rank), and the container kinds
//! that cannot cross the pipe. Only text and 2-D numeric arrays of the wire
//! element types marshal successfully.

use arraypipe_frame::{Frame, Shape, TypeCode};
use bytes::{Buf, BufMut, BytesMut};

use crate::marshal::{MarshalToWire, UnmarshalFromWire};

/// One complex element.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex<T> {
    pub re: T,
    pub im: T,
}

impl<T> Complex<T> {
    pub fn new(re: T, im: T) -> Self {
        Self { re, im }
    }
}

/// Column-major element storage.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericData {
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    UInt16(Vec<u16>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Int64(Vec<i64>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    ComplexFloat32(Vec<Complex<f32>>),
    ComplexFloat64(Vec<Complex<f64>>),
}

macro_rules! for_each_data {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            NumericData::Int8($v) => $body,
            NumericData::UInt8($v) => $body,
            NumericData::Int16($v) => $body,
            NumericData::UInt16($v) => $body,
            NumericData::Int32($v) => $body,
            NumericData::UInt32($v) => $body,
            NumericData::Int64($v) => $body,
            NumericData::UInt64($v) => $body,
            NumericData::Float32($v) => $body,
            NumericData::Float64($v) => $body,
            NumericData::ComplexFloat32($v) => $body,
            NumericData::ComplexFloat64($v) => $body,
        }
    };
}

impl NumericData {
    /// Number of elements.
    pub fn len(&self) -> usize {
        for_each_data!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wire type for this storage, or `None` if it has no wire form.
    pub fn type_code(&self) -> Option<TypeCode> {
        Some(match self {
            NumericData::Int8(_) => TypeCode::Int8,
            NumericData::UInt8(_) => TypeCode::UInt8,
            NumericData::Int16(_) => TypeCode::Int16,
            NumericData::UInt16(_) => TypeCode::UInt16,
            NumericData::Int32(_) => TypeCode::Int32,
            NumericData::UInt32(_) => TypeCode::UInt32,
            NumericData::Float32(_) => TypeCode::Float32,
            NumericData::Float64(_) => TypeCode::Float64,
            NumericData::ComplexFloat32(_) => TypeCode::ComplexFloat32,
            NumericData::ComplexFloat64(_) => TypeCode::ComplexFloat64,
            NumericData::Int64(_) | NumericData::UInt64(_) => return None,
        })
    }

    /// Little-endian element bytes, complex parts interleaved.
    fn to_le_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        match self {
            NumericData::Int8(v) => v.iter().for_each(|x| buf.put_i8(*x)),
            NumericData::UInt8(v) => buf.put_slice(v),
            NumericData::Int16(v) => v.iter().for_each(|x| buf.put_i16_le(*x)),
            NumericData::UInt16(v) => v.iter().for_each(|x| buf.put_u16_le(*x)),
            NumericData::Int32(v) => v.iter().for_each(|x| buf.put_i32_le(*x)),
            NumericData::UInt32(v) => v.iter().for_each(|x| buf.put_u32_le(*x)),
            NumericData::Int64(v) => v.iter().for_each(|x| buf.put_i64_le(*x)),
            NumericData::UInt64(v) => v.iter().for_each(|x| buf.put_u64_le(*x)),
            NumericData::Float32(v) => v.iter().for_each(|x| buf.put_f32_le(*x)),
            NumericData::Float64(v) => v.iter().for_each(|x| buf.put_f64_le(*x)),
            NumericData::ComplexFloat32(v) => v.iter().for_each(|c| {
                buf.put_f32_le(c.re);
                buf.put_f32_le(c.im);
            }),
            NumericData::ComplexFloat64(v) => v.iter().for_each(|c| {
                buf.put_f64_le(c.re);
                buf.put_f64_le(c.im);
            }),
        }
        buf
    }

    /// Decode a payload whose length already matches its shape.
    fn from_le_bytes(type_code: TypeCode, mut src: &[u8]) -> Option<Self> {
        let width = arraypipe_frame::element_width(type_code)? as usize;
        let n = src.len() / width;
        macro_rules! take {
            ($get:ident) => {
                (0..n).map(|_| src.$get()).collect()
            };
        }
        Some(match type_code {
            TypeCode::Int8 => NumericData::Int8(take!(get_i8)),
            TypeCode::UInt8 => NumericData::UInt8(src.to_vec()),
            TypeCode::Int16 => NumericData::Int16(take!(get_i16_le)),
            TypeCode::UInt16 => NumericData::UInt16(take!(get_u16_le)),
            TypeCode::Int32 => NumericData::Int32(take!(get_i32_le)),
            TypeCode::UInt32 => NumericData::UInt32(take!(get_u32_le)),
            TypeCode::Float32 => NumericData::Float32(take!(get_f32_le)),
            TypeCode::Float64 => NumericData::Float64(take!(get_f64_le)),
            TypeCode::ComplexFloat32 => NumericData::ComplexFloat32(
                (0..n)
                    .map(|_| Complex::new(src.get_f32_le(), src.get_f32_le()))
                    .collect(),
            ),
            TypeCode::ComplexFloat64 => NumericData::ComplexFloat64(
                (0..n)
                    .map(|_| Complex::new(src.get_f64_le(), src.get_f64_le()))
                    .collect(),
            ),
            TypeCode::String | TypeCode::Invalid => return None,
        })
    }
}

/// Numeric array with column-major data.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericArray {
    pub dims: Vec<usize>,
    pub data: NumericData,
}

impl NumericArray {
    pub fn new(dims: Vec<usize>, data: NumericData) -> Self {
        Self { dims, data }
    }

    /// A `rows x cols` matrix from column-major data.
    pub fn matrix(rows: usize, cols: usize, data: NumericData) -> Self {
        Self::new(vec![rows, cols], data)
    }

    /// A matrix of doubles from row-major rows.
    pub fn from_rows(rows: &[&[f64]]) -> Self {
        let cols = rows.first().map_or(0, |r| r.len());
        let data = (0..cols)
            .flat_map(|c| rows.iter().map(move |r| r.get(c).copied().unwrap_or_default()))
            .collect();
        Self::matrix(rows.len(), cols, NumericData::Float64(data))
    }

    pub fn rows(&self) -> usize {
        self.dims.first().copied().unwrap_or(1)
    }

    pub fn cols(&self) -> usize {
        self.dims.get(1).copied().unwrap_or(1)
    }
}

/// A value as the host environment sees it.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Numeric(NumericArray),
    Logical(Vec<bool>),
    Cell(Vec<Value>),
    Struct(Vec<(String, Value)>),
}

fn wire_dim(n: usize) -> Result<u32, String> {
    u32::try_from(n).map_err(|_| format!("dimension {n} exceeds the wire limit"))
}

impl MarshalToWire for Value {
    fn marshal_to_wire(&self) -> Result<Frame, String> {
        match self {
            Value::Cell(_) => Err("cell values are not supported".to_string()),
            Value::Struct(_) => Err("struct values are not supported".to_string()),
            Value::Logical(_) => Err("value must be numeric or text".to_string()),
            Value::Text(text) if text.is_empty() => Ok(Frame::empty(TypeCode::String)),
            Value::Text(text) => {
                let shape = Shape::new(1, wire_dim(text.len())?);
                Frame::new(TypeCode::String, shape, text.clone().into_bytes())
                    .map_err(|err| err.to_string())
            }
            Value::Numeric(array) => {
                if array.dims.len() > 2 {
                    return Err("values must have at most 2 dimensions".to_string());
                }
                let type_code = array
                    .data
                    .type_code()
                    .ok_or_else(|| "unsupported element type".to_string())?;
                let (rows, cols) = (array.rows(), array.cols());
                if rows.checked_mul(cols) != Some(array.data.len()) {
                    return Err(format!(
                        "{} elements do not fill a {rows}x{cols} array",
                        array.data.len()
                    ));
                }
                if array.data.is_empty() {
                    return Ok(Frame::empty(type_code));
                }
                let shape = Shape::new(wire_dim(rows)?, wire_dim(cols)?);
                Frame::new(type_code, shape, array.data.to_le_bytes().freeze())
                    .map_err(|err| err.to_string())
            }
        }
    }
}

impl UnmarshalFromWire for Value {
    fn unmarshal_from_wire(frame: Frame) -> Result<Self, String> {
        let Frame {
            type_code,
            shape,
            payload,
        } = frame;
        if type_code == TypeCode::String {
            if shape.rows > 1 {
                return Err("text must be a single row".to_string());
            }
            return String::from_utf8(payload.to_vec())
                .map(Value::Text)
                .map_err(|err| format!("text is not valid UTF-8: {err}"));
        }
        let data = NumericData::from_le_bytes(type_code, &payload)
            .ok_or_else(|| format!("no numeric form for {type_code}"))?;
        Ok(Value::Numeric(NumericArray::matrix(
            shape.rows as usize,
            shape.cols as usize,
            data,
        )))
    }
}
