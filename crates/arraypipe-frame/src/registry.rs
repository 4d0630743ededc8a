//! Wire type codes and their element layout.
//!
//! Every payload-bearing type is described by one [`TypeInfo`] row; the rest
//! of the stack sizes and interprets payloads from that row alone.

use std::fmt;

/// Wire tag identifying the element type of a transferred array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TypeCode {
    /// Sentinel sent when the sender could not marshal its value.
    Invalid = 0,
    String = 1,
    Int8 = 2,
    UInt8 = 3,
    Int16 = 4,
    UInt16 = 5,
    Int32 = 6,
    UInt32 = 7,
    Float64 = 8,
    ComplexFloat64 = 9,
    Float32 = 10,
    ComplexFloat32 = 11,
}

/// How the bytes of one element are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// Raw 8-bit text.
    Text,
    /// One little-endian scalar (integer or float).
    Real,
    /// Two same-width scalars, real part then imaginary part.
    Complex,
}

/// Registry row for a payload-bearing type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    pub code: TypeCode,
    /// Bytes per element (both components for complex types).
    pub width: u32,
    pub kind: ElementKind,
}

const REGISTRY: [TypeInfo; 11] = [
    row(TypeCode::String, 1, ElementKind::Text),
    row(TypeCode::Int8, 1, ElementKind::Real),
    row(TypeCode::UInt8, 1, ElementKind::Real),
    row(TypeCode::Int16, 2, ElementKind::Real),
    row(TypeCode::UInt16, 2, ElementKind::Real),
    row(TypeCode::Int32, 4, ElementKind::Real),
    row(TypeCode::UInt32, 4, ElementKind::Real),
    row(TypeCode::Float64, 8, ElementKind::Real),
    row(TypeCode::ComplexFloat64, 16, ElementKind::Complex),
    row(TypeCode::Float32, 4, ElementKind::Real),
    row(TypeCode::ComplexFloat32, 8, ElementKind::Complex),
];

const fn row(code: TypeCode, width: u32, kind: ElementKind) -> TypeInfo {
    TypeInfo { code, width, kind }
}

impl TypeCode {
    /// All codes, including the `Invalid` sentinel.
    pub const ALL: [TypeCode; 12] = [
        TypeCode::Invalid,
        TypeCode::String,
        TypeCode::Int8,
        TypeCode::UInt8,
        TypeCode::Int16,
        TypeCode::UInt16,
        TypeCode::Int32,
        TypeCode::UInt32,
        TypeCode::Float64,
        TypeCode::ComplexFloat64,
        TypeCode::Float32,
        TypeCode::ComplexFloat32,
    ];

    /// Decode a wire value. Returns `None` for codes outside the enumerated set.
    pub fn from_wire(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|tc| tc.wire() == code)
    }

    /// The wire value of this code.
    pub fn wire(self) -> u32 {
        self as u32
    }

    /// Registry row, or `None` for `Invalid`.
    pub fn info(self) -> Option<TypeInfo> {
        REGISTRY.iter().copied().find(|info| info.code == self)
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeCode::Invalid => "invalid",
            TypeCode::String => "string",
            TypeCode::Int8 => "int8",
            TypeCode::UInt8 => "uint8",
            TypeCode::Int16 => "int16",
            TypeCode::UInt16 => "uint16",
            TypeCode::Int32 => "int32",
            TypeCode::UInt32 => "uint32",
            TypeCode::Float64 => "float64",
            TypeCode::ComplexFloat64 => "complex64",
            TypeCode::Float32 => "float32",
            TypeCode::ComplexFloat32 => "complex32",
        }
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Look up a raw wire code. `None` means the code must not be trusted to size
/// a payload: either unknown or the `Invalid` sentinel.
pub fn lookup(code: u32) -> Option<TypeInfo> {
    TypeCode::from_wire(code).and_then(TypeCode::info)
}

/// Bytes per element, or `None` if the type carries no payload.
pub fn element_width(code: TypeCode) -> Option<u32> {
    code.info().map(|info| info.width)
}

/// Returns true for interleaved complex types.
pub fn is_complex(code: TypeCode) -> bool {
    matches!(code.info(), Some(TypeInfo { kind: ElementKind::Complex, .. }))
}
