//! Media pipeline collaborator interface
//!
//! The session never builds or runs media itself. It looks elements up by
//! name, reads and writes their typed properties, and stops the pipeline
//! when the last client leaves. Anything that can answer these calls can
//! back a session: a real media framework binding, or the in-memory
//! pipeline in [`memory`].
//!
//! ```text
//!  Pipeline ──element_by_name()──► Element ──pad()──► Pad
//!     │                              │                  │
//!     └── elements()                 └── PropertyObject ┘
//!                                       properties() / property() / set_property()
//! ```

pub mod introspect;
pub mod memory;

use std::fmt;
use std::sync::Arc;

use crate::error::PipelineError;

pub use introspect::{describe_element, format_value};
pub use memory::{MemoryElement, MemoryPad, MemoryPipeline};

/// Name of the capture element in the default launch line
pub const SOURCE_ELEMENT: &str = "source0";

/// Name of the H.264 encoder in the default launch line
pub const ENCODER_ELEMENT: &str = "enc0";

/// Name of the RTP payloader in the default launch line
pub const PAYLOADER_ELEMENT: &str = "pay0";

/// Declared type of a property
///
/// Platform-width `long` types are folded into the 64-bit kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    String,
    Boolean,
    UInt,
    Int,
    UInt64,
    Int64,
    Float,
    Double,
    Enum,
    Fraction,
    /// Character types, boxed structures, object references, ...
    Other,
}

impl PropertyKind {
    /// Convert a floating-point command value into this kind
    ///
    /// Integer kinds truncate toward zero and reject values outside their
    /// range. Enums take whole numbers only and come back with an empty
    /// nick, which the object fills in when it stores the value. Fraction,
    /// string and opaque kinds have no numeric form.
    pub fn coerce_f64(&self, value: f64) -> Option<PropertyValue> {
        if !value.is_finite() {
            return None;
        }

        let truncated = value.trunc();
        match self {
            PropertyKind::Boolean => Some(PropertyValue::Boolean(value != 0.0)),
            PropertyKind::UInt => in_range(truncated, 0.0, f64::from(u32::MAX))
                .then(|| PropertyValue::UInt(truncated as u32)),
            PropertyKind::Int => in_range(truncated, f64::from(i32::MIN), f64::from(i32::MAX))
                .then(|| PropertyValue::Int(truncated as i32)),
            PropertyKind::UInt64 => in_range(truncated, 0.0, u64::MAX as f64)
                .then(|| PropertyValue::UInt64(truncated as u64)),
            PropertyKind::Int64 => in_range(truncated, i64::MIN as f64, i64::MAX as f64)
                .then(|| PropertyValue::Int64(truncated as i64)),
            PropertyKind::Float => Some(PropertyValue::Float(value as f32)),
            PropertyKind::Double => Some(PropertyValue::Double(value)),
            PropertyKind::Enum => (value.fract() == 0.0
                && in_range(value, f64::from(i32::MIN), f64::from(i32::MAX)))
            .then(|| PropertyValue::Enum {
                value: value as i32,
                nick: String::new(),
            }),
            PropertyKind::String | PropertyKind::Fraction | PropertyKind::Other => None,
        }
    }
}

fn in_range(value: f64, min: f64, max: f64) -> bool {
    value >= min && value <= max
}

/// A typed property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// String, possibly unset
    String(Option<String>),
    Boolean(bool),
    UInt(u32),
    Int(i32),
    UInt64(u64),
    Int64(i64),
    Float(f32),
    Double(f64),
    /// Enumerated value with its symbolic nick
    Enum { value: i32, nick: String },
    /// Numerator / denominator
    Fraction { numerator: i32, denominator: i32 },
    /// Value of a kind the session cannot render
    Opaque,
}

impl PropertyValue {
    /// Declared kind matching this value
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::String(_) => PropertyKind::String,
            PropertyValue::Boolean(_) => PropertyKind::Boolean,
            PropertyValue::UInt(_) => PropertyKind::UInt,
            PropertyValue::Int(_) => PropertyKind::Int,
            PropertyValue::UInt64(_) => PropertyKind::UInt64,
            PropertyValue::Int64(_) => PropertyKind::Int64,
            PropertyValue::Float(_) => PropertyKind::Float,
            PropertyValue::Double(_) => PropertyKind::Double,
            PropertyValue::Enum { .. } => PropertyKind::Enum,
            PropertyValue::Fraction { .. } => PropertyKind::Fraction,
            PropertyValue::Opaque => PropertyKind::Other,
        }
    }

    /// Shorthand for a set string value
    pub fn string(value: impl Into<String>) -> Self {
        PropertyValue::String(Some(value.into()))
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match format_value(self) {
            Some(text) => f.write_str(&text),
            None => f.write_str("<unprintable>"),
        }
    }
}

/// Description of one property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySpec {
    pub name: String,
    pub kind: PropertyKind,
    pub readable: bool,
    pub writable: bool,
}

/// Anything with named, typed properties
pub trait PropertyObject: Send + Sync {
    /// Declared properties in declaration order
    fn properties(&self) -> Vec<PropertySpec>;

    /// Current value, `None` if missing or not readable
    fn property(&self, name: &str) -> Option<PropertyValue>;

    /// Write a property
    fn set_property(&self, name: &str, value: PropertyValue) -> Result<(), PipelineError>;

    /// Write a property from a floating-point number
    ///
    /// Command input carries a single numeric type; the value is converted
    /// to the property's declared kind with [`PropertyKind::coerce_f64`]
    /// before it is written.
    fn set_property_f64(&self, name: &str, value: f64) -> Result<(), PipelineError> {
        let spec = self
            .properties()
            .into_iter()
            .find(|spec| spec.name == name)
            .ok_or_else(|| PipelineError::PropertyNotFound(name.to_string()))?;

        if !spec.writable {
            return Err(PipelineError::PropertyNotWritable(name.to_string()));
        }

        let converted = spec
            .kind
            .coerce_f64(value)
            .ok_or_else(|| PipelineError::InvalidValue {
                property: name.to_string(),
                value: value.to_string(),
            })?;

        self.set_property(name, converted)
    }
}

/// A pad of a pipeline element
pub trait Pad: PropertyObject {
    fn name(&self) -> &str;
}

/// A named stage of the media pipeline
pub trait Element: PropertyObject {
    /// Instance name (`enc0`)
    fn name(&self) -> &str;

    /// Type name (`GstImxVpuEncoderH264`)
    fn class_name(&self) -> &str;

    /// Static pad by name
    fn pad(&self, name: &str) -> Option<Arc<dyn Pad>>;
}

/// The running media pipeline of the shared session
pub trait Pipeline: Send + Sync {
    /// Look an element up by instance name
    fn element_by_name(&self, name: &str) -> Option<Arc<dyn Element>>;

    /// Every element currently in the pipeline
    fn elements(&self) -> Vec<Arc<dyn Element>>;

    /// Stop streaming and drop to the null state
    fn stop(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_integers_truncate() {
        assert_eq!(PropertyKind::UInt.coerce_f64(5000.9), Some(PropertyValue::UInt(5000)));
        assert_eq!(PropertyKind::Int.coerce_f64(-2.5), Some(PropertyValue::Int(-2)));
        assert_eq!(PropertyKind::UInt.coerce_f64(-1.0), None);
        assert_eq!(PropertyKind::Int.coerce_f64(1e12), None);
    }

    #[test]
    fn test_coerce_non_numeric() {
        assert_eq!(PropertyKind::String.coerce_f64(1.0), None);
        assert_eq!(PropertyKind::Fraction.coerce_f64(1.0), None);
        assert_eq!(PropertyKind::Double.coerce_f64(f64::NAN), None);
        assert_eq!(
            PropertyKind::Boolean.coerce_f64(0.0),
            Some(PropertyValue::Boolean(false))
        );
    }

    #[test]
    fn test_coerce_enum_whole_numbers() {
        assert_eq!(
            PropertyKind::Enum.coerce_f64(2.0),
            Some(PropertyValue::Enum {
                value: 2,
                nick: String::new()
            })
        );
        assert_eq!(PropertyKind::Enum.coerce_f64(2.5), None);
        assert_eq!(PropertyKind::Enum.coerce_f64(1e12), None);
    }

    /// Object relying on the provided `set_property_f64`
    struct Recorder {
        specs: Vec<PropertySpec>,
        written: std::sync::Mutex<Vec<(String, PropertyValue)>>,
    }

    impl PropertyObject for Recorder {
        fn properties(&self) -> Vec<PropertySpec> {
            self.specs.clone()
        }

        fn property(&self, _: &str) -> Option<PropertyValue> {
            None
        }

        fn set_property(&self, name: &str, value: PropertyValue) -> Result<(), PipelineError> {
            self.written.lock().unwrap().push((name.to_string(), value));
            Ok(())
        }
    }

    fn spec(name: &str, kind: PropertyKind, writable: bool) -> PropertySpec {
        PropertySpec {
            name: name.into(),
            kind,
            readable: true,
            writable,
        }
    }

    #[test]
    fn test_default_set_property_f64() {
        let object = Recorder {
            specs: vec![
                spec("io-mode", PropertyKind::Enum, true),
                spec("bitrate", PropertyKind::UInt, true),
                spec("stats", PropertyKind::String, false),
            ],
            written: Default::default(),
        };

        object.set_property_f64("io-mode", 2.0).unwrap();
        object.set_property_f64("bitrate", 5000.7).unwrap();

        assert_eq!(
            object.set_property_f64("io-mode", 0.5),
            Err(PipelineError::InvalidValue {
                property: "io-mode".into(),
                value: "0.5".into(),
            })
        );
        assert_eq!(
            object.set_property_f64("stats", 1.0),
            Err(PipelineError::PropertyNotWritable("stats".into()))
        );
        assert_eq!(
            object.set_property_f64("missing", 1.0),
            Err(PipelineError::PropertyNotFound("missing".into()))
        );

        let written = object.written.lock().unwrap();
        assert_eq!(
            *written,
            [
                (
                    "io-mode".to_string(),
                    PropertyValue::Enum {
                        value: 2,
                        nick: String::new()
                    }
                ),
                ("bitrate".to_string(), PropertyValue::UInt(5000)),
            ]
        );
    }

    #[test]
    fn test_value_kind() {
        assert_eq!(PropertyValue::string("x").kind(), PropertyKind::String);
        assert_eq!(
            PropertyValue::Fraction {
                numerator: 30,
                denominator: 1
            }
            .kind(),
            PropertyKind::Fraction
        );
        assert_eq!(PropertyValue::Opaque.kind(), PropertyKind::Other);
    }
}
