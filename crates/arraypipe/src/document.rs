//! JSON documents describing a value.
//!
//! ```json
//! {"type": "float64", "rows": 3, "cols": 2, "data": [1, 3, 5, 2, 4, 6]}
//! {"type": "complex64", "rows": 1, "cols": 1, "data": [[1.5, -2]]}
//! {"type": "string", "data": "hello"}
//! ```
//!
//! Numeric data is column-major. `rows`/`cols` default to a single row.
//! `int64`, `uint64` and `logical` documents parse but do not marshal, which
//! is how the unsupported-value path is driven from the command line.

use arraypipe_session::{Complex, NumericArray, NumericData, Value};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Errors converting between documents and values.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown type '{0}'")]
    UnknownType(String),

    #[error("element {index} is not a valid {type_name}")]
    Element { index: usize, type_name: String },

    #[error("data must be {0}")]
    DataShape(&'static str),

    #[error("{len} elements do not fill a {rows}x{cols} array")]
    Count { len: usize, rows: usize, cols: usize },

    #[error("{0} values have no document form")]
    Unrepresentable(&'static str),

    #[error("element {index} is not finite and has no JSON form")]
    NonFinite { index: usize },
}

/// Serialized form of a [`Value`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cols: Option<usize>,
    pub data: Json,
}

impl Document {
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Build the value this document describes.
    pub fn to_value(&self) -> Result<Value, DocumentError> {
        let name = self.type_name.as_str();
        if name == "string" {
            let text = self
                .data
                .as_str()
                .ok_or(DocumentError::DataShape("a string"))?;
            return Ok(Value::Text(text.to_string()));
        }

        let items = self
            .data
            .as_array()
            .ok_or(DocumentError::DataShape("an array"))?;
        if name == "logical" {
            let flags = items
                .iter()
                .enumerate()
                .map(|(index, item)| item.as_bool().ok_or_else(|| element(index, name)))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Value::Logical(flags));
        }

        let data = match name {
            "int8" => NumericData::Int8(integers(items, name)?),
            "uint8" => NumericData::UInt8(unsigned(items, name)?),
            "int16" => NumericData::Int16(integers(items, name)?),
            "uint16" => NumericData::UInt16(unsigned(items, name)?),
            "int32" => NumericData::Int32(integers(items, name)?),
            "uint32" => NumericData::UInt32(unsigned(items, name)?),
            "int64" => NumericData::Int64(integers(items, name)?),
            "uint64" => NumericData::UInt64(unsigned(items, name)?),
            "float32" => NumericData::Float32(
                floats(items, name)?.into_iter().map(|x| x as f32).collect(),
            ),
            "float64" => NumericData::Float64(floats(items, name)?),
            "complex32" => NumericData::ComplexFloat32(
                complexes(items, name)?
                    .into_iter()
                    .map(|c| Complex::new(c.re as f32, c.im as f32))
                    .collect(),
            ),
            "complex64" => NumericData::ComplexFloat64(complexes(items, name)?),
            other => return Err(DocumentError::UnknownType(other.to_string())),
        };

        let len = data.len();
        let rows = self.rows.unwrap_or(if len == 0 { 0 } else { 1 });
        let cols = self
            .cols
            .unwrap_or(if rows == 0 { 0 } else { len / rows.max(1) });
        if rows.checked_mul(cols) != Some(len) {
            return Err(DocumentError::Count { len, rows, cols });
        }
        Ok(Value::Numeric(NumericArray::matrix(rows, cols, data)))
    }

    /// Describe a received value.
    pub fn from_value(value: &Value) -> Result<Self, DocumentError> {
        let array = match value {
            Value::Text(text) => {
                return Ok(Self {
                    type_name: "string".to_string(),
                    rows: None,
                    cols: None,
                    data: Json::String(text.clone()),
                })
            }
            Value::Numeric(array) => array,
            Value::Logical(flags) => {
                return Ok(Self {
                    type_name: "logical".to_string(),
                    rows: Some(1),
                    cols: Some(flags.len()),
                    data: Json::from(flags.clone()),
                })
            }
            Value::Cell(_) => return Err(DocumentError::Unrepresentable("cell")),
            Value::Struct(_) => return Err(DocumentError::Unrepresentable("struct")),
        };

        let (type_name, data) = match &array.data {
            NumericData::Int8(v) => ("int8", Json::from(v.clone())),
            NumericData::UInt8(v) => ("uint8", Json::from(v.clone())),
            NumericData::Int16(v) => ("int16", Json::from(v.clone())),
            NumericData::UInt16(v) => ("uint16", Json::from(v.clone())),
            NumericData::Int32(v) => ("int32", Json::from(v.clone())),
            NumericData::UInt32(v) => ("uint32", Json::from(v.clone())),
            NumericData::Int64(v) => ("int64", Json::from(v.clone())),
            NumericData::UInt64(v) => ("uint64", Json::from(v.clone())),
            NumericData::Float32(v) => ("float32", finite(v.iter().map(|x| f64::from(*x)))?),
            NumericData::Float64(v) => ("float64", finite(v.iter().copied())?),
            NumericData::ComplexFloat32(v) => (
                "complex32",
                finite_pairs(v.iter().map(|c| (f64::from(c.re), f64::from(c.im))))?,
            ),
            NumericData::ComplexFloat64(v) => {
                ("complex64", finite_pairs(v.iter().map(|c| (c.re, c.im)))?)
            }
        };

        Ok(Self {
            type_name: type_name.to_string(),
            rows: Some(array.rows()),
            cols: Some(array.cols()),
            data,
        })
    }
}

/// JSON has no NaN or infinity; refuse them rather than emit `null`.
fn finite(items: impl Iterator<Item = f64>) -> Result<Json, DocumentError> {
    items
        .enumerate()
        .map(|(index, x)| {
            if x.is_finite() {
                Ok(Json::from(x))
            } else {
                Err(DocumentError::NonFinite { index })
            }
        })
        .collect()
}

fn finite_pairs(items: impl Iterator<Item = (f64, f64)>) -> Result<Json, DocumentError> {
    items
        .enumerate()
        .map(|(index, (re, im))| {
            if re.is_finite() && im.is_finite() {
                Ok(Json::from(vec![re, im]))
            } else {
                Err(DocumentError::NonFinite { index })
            }
        })
        .collect()
}

fn element(index: usize, type_name: &str) -> DocumentError {
    DocumentError::Element {
        index,
        type_name: type_name.to_string(),
    }
}

fn integers<T: TryFrom<i64>>(items: &[Json], type_name: &str) -> Result<Vec<T>, DocumentError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.as_i64()
                .and_then(|n| T::try_from(n).ok())
                .ok_or_else(|| element(index, type_name))
        })
        .collect()
}

fn unsigned<T: TryFrom<u64>>(items: &[Json], type_name: &str) -> Result<Vec<T>, DocumentError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.as_u64()
                .and_then(|n| T::try_from(n).ok())
                .ok_or_else(|| element(index, type_name))
        })
        .collect()
}

fn floats(items: &[Json], type_name: &str) -> Result<Vec<f64>, DocumentError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| item.as_f64().ok_or_else(|| element(index, type_name)))
        .collect()
}

fn complexes(items: &[Json], type_name: &str) -> Result<Vec<Complex<f64>>, DocumentError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| match item.as_array().map(Vec::as_slice) {
            Some([re, im]) => match (re.as_f64(), im.as_f64()) {
                (Some(re), Some(im)) => Ok(Complex::new(re, im)),
                _ => Err(element(index, type_name)),
            },
            _ => Err(element(index, type_name)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_float_matrix() {
        let doc = Document::parse(
            r#"{"type":"float64","rows":3,"cols":2,"data":[1,3,5,2,4,6]}"#,
        )
        .unwrap();
        let value = doc.to_value().unwrap();
        assert_eq!(
            value,
            Value::Numeric(NumericArray::from_rows(&[&[1.0, 2.0], &[3.0, 4.0], &[5.0, 6.0]]))
        );
    }

    #[test]
    fn shape_defaults_to_single_row() {
        let doc = Document::parse(r#"{"type":"int16","data":[1,2,3]}"#).unwrap();
        match doc.to_value().unwrap() {
            Value::Numeric(array) => assert_eq!(array.dims, vec![1, 3]),
            other => panic!("unexpected value {other:?}"),
        }

        let empty = Document::parse(r#"{"type":"uint8","data":[]}"#).unwrap();
        match empty.to_value().unwrap() {
            Value::Numeric(array) => assert_eq!(array.dims, vec![0, 0]),
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn complex_elements_are_pairs() {
        let doc = Document::parse(r#"{"type":"complex32","data":[[1,2],[3,-4]]}"#).unwrap();
        let value = doc.to_value().unwrap();
        let back = Document::from_value(&value).unwrap();
        assert_eq!(back.type_name, "complex32");
        assert_eq!(back.to_value().unwrap(), value);

        let bad = Document::parse(r#"{"type":"complex64","data":[[1,2,3]]}"#).unwrap();
        assert!(matches!(
            bad.to_value(),
            Err(DocumentError::Element { index: 0, .. })
        ));
    }

    #[test]
    fn out_of_range_integers_are_rejected() {
        let doc = Document::parse(r#"{"type":"uint8","data":[1,256]}"#).unwrap();
        assert!(matches!(
            doc.to_value(),
            Err(DocumentError::Element { index: 1, .. })
        ));
        let doc = Document::parse(r#"{"type":"int8","data":[-129]}"#).unwrap();
        assert!(doc.to_value().is_err());
    }

    #[test]
    fn count_must_match_shape() {
        let doc = Document::parse(r#"{"type":"float64","rows":2,"cols":2,"data":[1,2,3]}"#)
            .unwrap();
        assert!(matches!(
            doc.to_value(),
            Err(DocumentError::Count {
                len: 3,
                rows: 2,
                cols: 2
            })
        ));
    }

    #[test]
    fn text_round_trip() {
        let doc = Document::parse(r#"{"type":"string","data":"hello"}"#).unwrap();
        let value = doc.to_value().unwrap();
        assert_eq!(value, Value::Text("hello".to_string()));
        assert_eq!(Document::from_value(&value).unwrap(), doc);
    }

    #[test]
    fn non_finite_elements_are_rejected() {
        let value = Value::Numeric(NumericArray::matrix(
            1,
            3,
            NumericData::Float64(vec![1.0, f64::NAN, 2.0]),
        ));
        assert!(matches!(
            Document::from_value(&value),
            Err(DocumentError::NonFinite { index: 1 })
        ));

        let value = Value::Numeric(NumericArray::matrix(
            1,
            1,
            NumericData::ComplexFloat32(vec![Complex::new(0.0, f32::INFINITY)]),
        ));
        assert!(matches!(
            Document::from_value(&value),
            Err(DocumentError::NonFinite { index: 0 })
        ));

        let value = Value::Numeric(NumericArray::matrix(
            1,
            2,
            NumericData::Float32(vec![0.5, -1.5]),
        ));
        let doc = Document::from_value(&value).unwrap();
        assert_eq!(doc.to_value().unwrap(), value);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let doc = Document::parse(r#"{"type":"float16","data":[]}"#).unwrap();
        assert!(matches!(doc.to_value(), Err(DocumentError::UnknownType(_))));
    }
}
