//! Property dumps for `printbin`

use crate::protocol::status::{StatusKind, StatusMessage};

use super::{Element, PropertyValue};

/// Render a property value for the status pipe
///
/// Strings are quoted (`null` when unset), enums render as
/// `[value]nick`, fractions as `num/den`. Opaque values have no
/// rendering and return `None`.
pub fn format_value(value: &PropertyValue) -> Option<String> {
    let text = match value {
        PropertyValue::String(Some(s)) => format!("\"{}\"", s),
        PropertyValue::String(None) => "null".to_string(),
        PropertyValue::Boolean(b) => b.to_string(),
        PropertyValue::UInt(v) => v.to_string(),
        PropertyValue::Int(v) => v.to_string(),
        PropertyValue::UInt64(v) => v.to_string(),
        PropertyValue::Int64(v) => v.to_string(),
        PropertyValue::Float(v) => v.to_string(),
        PropertyValue::Double(v) => v.to_string(),
        PropertyValue::Enum { value, nick } => format!("[{}]{}", value, nick),
        PropertyValue::Fraction {
            numerator,
            denominator,
        } => format!("{}/{}", numerator, denominator),
        PropertyValue::Opaque => return None,
    };
    Some(text)
}

/// Dump every readable, printable property of `element`
///
/// The first entry is the element's class name; properties follow in
/// declaration order.
pub fn describe_element(element: &dyn Element) -> StatusMessage {
    let mut message = StatusMessage::new(StatusKind::ElementProps);
    message.field("classname", element.class_name());

    let specs = element.properties();
    if specs.is_empty() {
        tracing::trace!(element = %element.name(), "No properties");
    }

    for spec in specs.iter().filter(|spec| spec.readable) {
        let Some(value) = element.property(&spec.name) else {
            continue;
        };
        if let Some(text) = format_value(&value) {
            message.field(&spec.name, text);
        }
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::MemoryElement;

    #[test]
    fn test_format_scalars() {
        assert_eq!(format_value(&PropertyValue::Boolean(true)).unwrap(), "true");
        assert_eq!(format_value(&PropertyValue::Int(-4)).unwrap(), "-4");
        assert_eq!(
            format_value(&PropertyValue::UInt64(u64::MAX)).unwrap(),
            "18446744073709551615"
        );
        assert_eq!(format_value(&PropertyValue::Double(0.5)).unwrap(), "0.5");
        assert_eq!(format_value(&PropertyValue::Opaque), None);
    }

    #[test]
    fn test_format_strings() {
        assert_eq!(
            format_value(&PropertyValue::string("/dev/video0")).unwrap(),
            "\"/dev/video0\""
        );
        assert_eq!(format_value(&PropertyValue::String(None)).unwrap(), "null");
    }

    #[test]
    fn test_format_enum_and_fraction() {
        let mode = PropertyValue::Enum {
            value: 2,
            nick: "mmap".into(),
        };
        assert_eq!(format_value(&mode).unwrap(), "[2]mmap");

        let rate = PropertyValue::Fraction {
            numerator: 30000,
            denominator: 1001,
        };
        assert_eq!(format_value(&rate).unwrap(), "30000/1001");
    }

    #[test]
    fn test_describe_element_skips_unreadable_and_opaque() {
        let element = MemoryElement::new("enc0", "GstImxVpuEncoderH264")
            .with_property("bitrate", PropertyValue::UInt(5000))
            .with_write_only("secret", PropertyValue::Int(1))
            .with_property("caps", PropertyValue::Opaque)
            .with_property("name", PropertyValue::string("enc0"));

        let message = describe_element(&element);

        assert_eq!(message.kind(), StatusKind::ElementProps);
        assert_eq!(
            message.payload(),
            "classname:GstImxVpuEncoderH264,\nbitrate:5000,\nname:\"enc0\""
        );
    }

    #[test]
    fn test_describe_element_without_properties() {
        let element = MemoryElement::new("q", "GstQueue");
        let message = describe_element(&element);

        assert_eq!(message.payload(), "classname:GstQueue");
    }
}
