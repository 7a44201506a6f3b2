//! In-memory pipeline
//!
//! Elements hold declared, typed properties behind a mutex and count every
//! write, so callers can observe exactly what a session did to them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::PipelineError;

use super::{
    Element, Pad, Pipeline, PropertyKind, PropertyObject, PropertySpec, PropertyValue,
    ENCODER_ELEMENT, PAYLOADER_ELEMENT, SOURCE_ELEMENT,
};

#[derive(Debug, Clone)]
struct Property {
    spec: PropertySpec,
    value: PropertyValue,
    /// `(value, nick)` pairs for enum properties
    enum_values: Vec<(i32, String)>,
    writes: usize,
}

/// Ordered property table shared by elements and pads
#[derive(Debug, Default)]
struct PropertyTable {
    properties: Mutex<Vec<Property>>,
}

impl PropertyTable {
    fn lock(&self) -> MutexGuard<'_, Vec<Property>> {
        // A panic while holding the lock leaves the table itself consistent
        self.properties
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert(&self, property: Property) {
        let mut properties = self.lock();
        properties.retain(|p| p.spec.name != property.spec.name);
        properties.push(property);
    }

    fn specs(&self) -> Vec<PropertySpec> {
        self.lock().iter().map(|p| p.spec.clone()).collect()
    }

    fn get(&self, name: &str) -> Option<PropertyValue> {
        self.lock()
            .iter()
            .find(|p| p.spec.name == name && p.spec.readable)
            .map(|p| p.value.clone())
    }

    fn set(&self, name: &str, value: PropertyValue) -> Result<(), PipelineError> {
        let mut properties = self.lock();
        let property = properties
            .iter_mut()
            .find(|p| p.spec.name == name)
            .ok_or_else(|| PipelineError::PropertyNotFound(name.to_string()))?;

        if !property.spec.writable {
            return Err(PipelineError::PropertyNotWritable(name.to_string()));
        }

        let value = match (property.spec.kind, value) {
            (PropertyKind::Enum, PropertyValue::Enum { value, .. }) => {
                enum_value(property, name, value)?
            }
            (kind, value) if kind == value.kind() => value,
            (_, value) => {
                return Err(PipelineError::InvalidValue {
                    property: name.to_string(),
                    value: value.to_string(),
                })
            }
        };

        property.value = value;
        property.writes += 1;
        Ok(())
    }

    fn writes(&self, name: &str) -> usize {
        self.lock()
            .iter()
            .find(|p| p.spec.name == name)
            .map(|p| p.writes)
            .unwrap_or(0)
    }
}

fn enum_value(property: &Property, name: &str, value: i32) -> Result<PropertyValue, PipelineError> {
    property
        .enum_values
        .iter()
        .find(|(v, _)| *v == value)
        .map(|(v, nick)| PropertyValue::Enum {
            value: *v,
            nick: nick.clone(),
        })
        .ok_or_else(|| PipelineError::InvalidValue {
            property: name.to_string(),
            value: value.to_string(),
        })
}

fn property(name: &str, value: PropertyValue, readable: bool, writable: bool) -> Property {
    Property {
        spec: PropertySpec {
            name: name.to_string(),
            kind: value.kind(),
            readable,
            writable,
        },
        value,
        enum_values: Vec::new(),
        writes: 0,
    }
}

/// Pad of a [`MemoryElement`]
#[derive(Debug)]
pub struct MemoryPad {
    name: String,
    table: PropertyTable,
}

impl MemoryPad {
    /// Create a pad without properties
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: PropertyTable::default(),
        }
    }

    /// Add a readable, writable property
    pub fn with_property(self, name: &str, value: PropertyValue) -> Self {
        self.table.insert(property(name, value, true, true));
        self
    }

    /// Number of successful writes to `name`
    pub fn writes(&self, name: &str) -> usize {
        self.table.writes(name)
    }
}

impl PropertyObject for MemoryPad {
    fn properties(&self) -> Vec<PropertySpec> {
        self.table.specs()
    }

    fn property(&self, name: &str) -> Option<PropertyValue> {
        self.table.get(name)
    }

    fn set_property(&self, name: &str, value: PropertyValue) -> Result<(), PipelineError> {
        self.table.set(name, value)
    }
}

impl Pad for MemoryPad {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Element with a declared property table
#[derive(Debug)]
pub struct MemoryElement {
    name: String,
    class_name: String,
    table: PropertyTable,
    pads: HashMap<String, Arc<MemoryPad>>,
}

impl MemoryElement {
    /// Create an element without properties or pads
    pub fn new(name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_name: class_name.into(),
            table: PropertyTable::default(),
            pads: HashMap::new(),
        }
    }

    /// Add a readable, writable property
    pub fn with_property(self, name: &str, value: PropertyValue) -> Self {
        self.table.insert(property(name, value, true, true));
        self
    }

    /// Add a property that can only be read
    pub fn with_read_only(self, name: &str, value: PropertyValue) -> Self {
        self.table.insert(property(name, value, true, false));
        self
    }

    /// Add a property that can only be written
    pub fn with_write_only(self, name: &str, value: PropertyValue) -> Self {
        self.table.insert(property(name, value, false, true));
        self
    }

    /// Add an enum property with its allowed `(value, nick)` pairs
    pub fn with_enum(self, name: &str, current: i32, values: &[(i32, &str)]) -> Self {
        let enum_values: Vec<(i32, String)> =
            values.iter().map(|(v, n)| (*v, n.to_string())).collect();
        let nick = enum_values
            .iter()
            .find(|(v, _)| *v == current)
            .map(|(_, n)| n.clone())
            .unwrap_or_default();

        let mut prop = property(
            name,
            PropertyValue::Enum {
                value: current,
                nick,
            },
            true,
            true,
        );
        prop.enum_values = enum_values;
        self.table.insert(prop);
        self
    }

    /// Attach a static pad
    pub fn with_pad(mut self, pad: MemoryPad) -> Self {
        self.pads.insert(pad.name.clone(), Arc::new(pad));
        self
    }

    /// Concrete pad handle, for inspecting writes
    pub fn memory_pad(&self, name: &str) -> Option<Arc<MemoryPad>> {
        self.pads.get(name).cloned()
    }

    /// Number of successful writes to `name`
    pub fn writes(&self, name: &str) -> usize {
        self.table.writes(name)
    }
}

impl PropertyObject for MemoryElement {
    fn properties(&self) -> Vec<PropertySpec> {
        self.table.specs()
    }

    fn property(&self, name: &str) -> Option<PropertyValue> {
        self.table.get(name)
    }

    fn set_property(&self, name: &str, value: PropertyValue) -> Result<(), PipelineError> {
        self.table.set(name, value)
    }
}

impl Element for MemoryElement {
    fn name(&self) -> &str {
        &self.name
    }

    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn pad(&self, name: &str) -> Option<Arc<dyn Pad>> {
        self.pads.get(name).map(|pad| Arc::clone(pad) as Arc<dyn Pad>)
    }
}

/// Pipeline made of [`MemoryElement`]s
#[derive(Debug, Default)]
pub struct MemoryPipeline {
    elements: Vec<Arc<MemoryElement>>,
    stops: AtomicUsize,
}

impl MemoryPipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an element
    pub fn with_element(mut self, element: MemoryElement) -> Self {
        self.elements.push(Arc::new(element));
        self
    }

    /// Pipeline shaped like the default launch line
    ///
    /// `source0 ! caps0 ! enc0 ! pay0`, with the properties the session
    /// touches plus a few read-only ones for introspection.
    pub fn default_launch() -> Self {
        let source = MemoryElement::new(SOURCE_ELEMENT, "GstV4l2Src")
            .with_property("device", PropertyValue::string("/dev/video0"))
            .with_property("num-buffers", PropertyValue::Int(-1))
            .with_enum(
                "io-mode",
                0,
                &[(0, "auto"), (1, "rw"), (2, "mmap"), (3, "userptr"), (4, "dmabuf")],
            )
            .with_property("do-timestamp", PropertyValue::Boolean(false))
            .with_pad(MemoryPad::new("src"));

        let caps = MemoryElement::new("caps0", "GstImxIpuVideoTransform")
            .with_property("input-crop", PropertyValue::Boolean(true))
            .with_pad(MemoryPad::new("sink"))
            .with_pad(MemoryPad::new("src"));

        let encoder = MemoryElement::new(ENCODER_ELEMENT, "GstImxVpuEncoderH264")
            .with_property("bitrate", PropertyValue::UInt(0))
            .with_property("quant-param", PropertyValue::UInt(0))
            .with_property("idr-interval", PropertyValue::UInt(0))
            .with_property("gop-size", PropertyValue::UInt(16))
            .with_pad(MemoryPad::new("sink"))
            .with_pad(MemoryPad::new("src"));

        let payloader = MemoryElement::new(PAYLOADER_ELEMENT, "GstRtpH264Pay")
            .with_property("config-interval", PropertyValue::Int(0))
            .with_property("pt", PropertyValue::UInt(96))
            .with_property("mtu", PropertyValue::UInt(1400))
            .with_read_only("stats", PropertyValue::string("application/x-rtp-payload-stats"))
            .with_pad(MemoryPad::new("sink"))
            .with_pad(MemoryPad::new("src"));

        Self::new()
            .with_element(source)
            .with_element(caps)
            .with_element(encoder)
            .with_element(payloader)
    }

    /// Concrete element handle, for inspecting writes
    pub fn memory_element(&self, name: &str) -> Option<Arc<MemoryElement>> {
        self.elements.iter().find(|e| e.name == name).cloned()
    }

    /// How many times the pipeline was stopped
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::Relaxed)
    }
}

impl Pipeline for MemoryPipeline {
    fn element_by_name(&self, name: &str) -> Option<Arc<dyn Element>> {
        self.memory_element(name)
            .map(|element| element as Arc<dyn Element>)
    }

    fn elements(&self) -> Vec<Arc<dyn Element>> {
        self.elements
            .iter()
            .map(|element| Arc::clone(element) as Arc<dyn Element>)
            .collect()
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(elements = self.elements.len(), "Pipeline stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_launch_elements() {
        let pipeline = MemoryPipeline::default_launch();

        assert!(pipeline.element_by_name(SOURCE_ELEMENT).is_some());
        assert!(pipeline.element_by_name(ENCODER_ELEMENT).is_some());
        assert!(pipeline.element_by_name(PAYLOADER_ELEMENT).is_some());
        assert!(pipeline.element_by_name("missing").is_none());
        assert_eq!(pipeline.elements().len(), 4);
    }

    #[test]
    fn test_set_property_typed() {
        let element = MemoryElement::new("enc0", "Encoder")
            .with_property("bitrate", PropertyValue::UInt(0));

        element
            .set_property("bitrate", PropertyValue::UInt(5000))
            .unwrap();
        assert_eq!(element.property("bitrate"), Some(PropertyValue::UInt(5000)));
        assert_eq!(element.writes("bitrate"), 1);

        // Kind mismatch is rejected
        let result = element.set_property("bitrate", PropertyValue::string("fast"));
        assert!(matches!(result, Err(PipelineError::InvalidValue { .. })));
        assert_eq!(element.writes("bitrate"), 1);
    }

    #[test]
    fn test_set_property_f64_converts() {
        let element = MemoryElement::new("enc0", "Encoder")
            .with_property("bitrate", PropertyValue::UInt(0))
            .with_property("gain", PropertyValue::Double(1.0));

        element.set_property_f64("bitrate", 2500.7).unwrap();
        element.set_property_f64("gain", 0.25).unwrap();

        assert_eq!(element.property("bitrate"), Some(PropertyValue::UInt(2500)));
        assert_eq!(element.property("gain"), Some(PropertyValue::Double(0.25)));
    }

    #[test]
    fn test_set_enum_by_number() {
        let element = MemoryElement::new("src", "Source").with_enum(
            "io-mode",
            0,
            &[(0, "auto"), (2, "mmap")],
        );

        element.set_property_f64("io-mode", 2.0).unwrap();
        assert_eq!(
            element.property("io-mode"),
            Some(PropertyValue::Enum {
                value: 2,
                nick: "mmap".into()
            })
        );

        assert!(element.set_property_f64("io-mode", 7.0).is_err());
    }

    #[test]
    fn test_access_flags() {
        let element = MemoryElement::new("pay0", "Payloader")
            .with_read_only("stats", PropertyValue::string("x"))
            .with_write_only("secret", PropertyValue::Int(0));

        assert!(matches!(
            element.set_property("stats", PropertyValue::string("y")),
            Err(PipelineError::PropertyNotWritable(_))
        ));
        assert_eq!(element.property("secret"), None);
        assert!(element.set_property("secret", PropertyValue::Int(3)).is_ok());
        assert!(matches!(
            element.set_property("nope", PropertyValue::Int(3)),
            Err(PipelineError::PropertyNotFound(_))
        ));
    }

    #[test]
    fn test_pad_properties() {
        let element = MemoryElement::new("mix", "Mixer")
            .with_pad(MemoryPad::new("sink_0").with_property("alpha", PropertyValue::Double(1.0)));

        let pad = element.pad("sink_0").unwrap();
        pad.set_property_f64("alpha", 0.5).unwrap();
        assert_eq!(pad.property("alpha"), Some(PropertyValue::Double(0.5)));
        assert_eq!(element.memory_pad("sink_0").unwrap().writes("alpha"), 1);
        assert!(element.pad("sink_1").is_none());
    }

    #[test]
    fn test_stop_count() {
        let pipeline = MemoryPipeline::default_launch();
        assert_eq!(pipeline.stop_count(), 0);

        pipeline.stop();
        assert_eq!(pipeline.stop_count(), 1);
    }
}
