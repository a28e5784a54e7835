//! Record descriptors and destination capabilities
//!
//! A record type describes its fields once (name, column alias, options) and
//! exposes typed slots the mapper reads and writes. The [`record!`] macro
//! generates all of it from a struct definition with tag attributes:
//!
//! ```
//! datamap::record! {
//!     #[derive(Debug, Default, Clone, PartialEq)]
//!     pub struct Account {
//!         #[db = "id,omitempty"]
//!         pub id: i64,
//!         #[field = "full_name"]
//!         pub name: String,
//!         pub email: Option<String>,
//!     }
//! }
//! ```
//!
//! Supported tags: `db = "name,opt,..."` (options `omitempty`, `inline`),
//! and the legacy `field = "name"`, `omitempty = "true"`, `inline = "true"`.
//! A name of `-` skips the field. Non-`pub` fields are never mapped.
//!
//! [`record!`]: crate::record

use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, Utc};

use super::value::{Kind, Value};

// =============================================================================
// Descriptors
// =============================================================================

/// Field metadata resolved from tags
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    ident: &'static str,
    exported: bool,
    name: Option<String>,
    omitempty: bool,
    inline: bool,
    nested: fn() -> Option<&'static RecordDescriptor>,
}

impl FieldDescriptor {
    /// Build from `(tag, value)` pairs
    ///
    /// The current `db` tag wins over the legacy `field`, `omitempty` and
    /// `inline` tags; unknown tags (including doc comments) are ignored.
    pub fn from_tags(
        ident: &'static str,
        exported: bool,
        tags: &[(&str, &str)],
        nested: fn() -> Option<&'static RecordDescriptor>,
    ) -> Self {
        let mut name = None;
        let mut omitempty = false;
        let mut inline = false;
        let mut legacy_name = None;

        for (tag, value) in tags {
            match *tag {
                "db" => {
                    let (tag_name, options) = parse_tag(value);
                    if !tag_name.is_empty() {
                        name = Some(tag_name.to_string());
                    }
                    omitempty |= options.contains(&"omitempty");
                    inline |= options.contains(&"inline");
                }
                "field" if !value.is_empty() => legacy_name = Some(value.to_string()),
                "omitempty" if !value.is_empty() => omitempty = true,
                "inline" if !value.is_empty() => inline = true,
                _ => {}
            }
        }

        Self {
            ident,
            exported,
            name: name.or(legacy_name),
            omitempty,
            inline,
            nested,
        }
    }

    /// Declared field identifier
    pub fn ident(&self) -> &'static str {
        self.ident
    }

    /// Explicit column name from tags, if any
    pub fn tag_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn omitempty(&self) -> bool {
        self.omitempty
    }

    pub fn inline(&self) -> bool {
        self.inline
    }

    /// Unexported or tagged `-`
    pub fn is_skipped(&self) -> bool {
        !self.exported || self.name.as_deref() == Some("-")
    }

    /// Descriptor of the nested record type, for record-typed fields
    pub fn nested(&self) -> Option<&'static RecordDescriptor> {
        (self.nested)()
    }
}

/// Split `name,opt1,opt2` into the name and its options
fn parse_tag(tag: &str) -> (&str, Vec<&str>) {
    let mut parts = tag.split(',').map(str::trim);
    let name = parts.next().unwrap_or_default();
    (name, parts.filter(|p| !p.is_empty()).collect())
}

/// Field list of a record type, built once per type
#[derive(Debug, Clone)]
pub struct RecordDescriptor {
    type_name: &'static str,
    fields: Vec<FieldDescriptor>,
}

impl RecordDescriptor {
    pub fn new(type_name: &'static str, fields: Vec<FieldDescriptor>) -> Self {
        Self { type_name, fields }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
}

// =============================================================================
// Slots and fields
// =============================================================================

/// Typed scalar storage the mapper can read and assign
pub trait Slot {
    /// Declared kind; `Any` for generic slots
    fn kind(&self) -> Kind;

    fn value(&self) -> Value;

    /// Store `value`, `false` when it does not fit this slot
    fn assign(&mut self, value: Value) -> bool;

    /// Equal to the zero value of the slot type
    fn is_zero(&self) -> bool;
}

macro_rules! int_slot {
    ($ty:ty, $kind:expr, $wrap:expr) => {
        impl Slot for $ty {
            fn kind(&self) -> Kind {
                $kind
            }

            fn value(&self) -> Value {
                $wrap(*self)
            }

            fn assign(&mut self, value: Value) -> bool {
                let converted = match value {
                    Value::Int(i) => <$ty>::try_from(i).ok(),
                    Value::Uint(u) => <$ty>::try_from(u).ok(),
                    _ => None,
                };
                match converted {
                    Some(v) => {
                        *self = v;
                        true
                    }
                    None => false,
                }
            }

            fn is_zero(&self) -> bool {
                *self == 0
            }
        }
    };
}

int_slot!(i64, Kind::Int, Value::Int);
int_slot!(i32, Kind::Int, |v: i32| Value::Int(i64::from(v)));
int_slot!(u64, Kind::Uint, Value::Uint);
int_slot!(u32, Kind::Uint, |v: u32| Value::Uint(u64::from(v)));

impl Slot for f64 {
    fn kind(&self) -> Kind {
        Kind::Float
    }

    fn value(&self) -> Value {
        Value::Float(*self)
    }

    fn assign(&mut self, value: Value) -> bool {
        match value {
            Value::Float(f) => *self = f,
            Value::Int(i) => *self = i as f64,
            Value::Uint(u) => *self = u as f64,
            _ => return false,
        }
        true
    }

    fn is_zero(&self) -> bool {
        *self == 0.0
    }
}

impl Slot for f32 {
    fn kind(&self) -> Kind {
        Kind::Float
    }

    fn value(&self) -> Value {
        Value::Float(f64::from(*self))
    }

    fn assign(&mut self, value: Value) -> bool {
        match value {
            Value::Float(f) => *self = f as f32,
            Value::Int(i) => *self = i as f32,
            Value::Uint(u) => *self = u as f32,
            _ => return false,
        }
        true
    }

    fn is_zero(&self) -> bool {
        *self == 0.0
    }
}

impl Slot for String {
    fn kind(&self) -> Kind {
        Kind::String
    }

    fn value(&self) -> Value {
        Value::String(self.clone())
    }

    fn assign(&mut self, value: Value) -> bool {
        match value {
            Value::String(s) => *self = s,
            Value::Bytes(b) => *self = String::from_utf8_lossy(&b).into_owned(),
            _ => return false,
        }
        true
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl Slot for bool {
    fn kind(&self) -> Kind {
        Kind::Bool
    }

    fn value(&self) -> Value {
        Value::Bool(*self)
    }

    fn assign(&mut self, value: Value) -> bool {
        match value {
            Value::Bool(b) => {
                *self = b;
                true
            }
            _ => false,
        }
    }

    fn is_zero(&self) -> bool {
        !*self
    }
}

impl Slot for DateTime<Utc> {
    fn kind(&self) -> Kind {
        Kind::Time
    }

    fn value(&self) -> Value {
        Value::Time(*self)
    }

    fn assign(&mut self, value: Value) -> bool {
        match value {
            Value::Time(t) => {
                *self = t;
                true
            }
            _ => false,
        }
    }

    fn is_zero(&self) -> bool {
        *self == DateTime::<Utc>::default()
    }
}

impl Slot for Vec<u8> {
    fn kind(&self) -> Kind {
        Kind::Bytes
    }

    fn value(&self) -> Value {
        Value::Bytes(self.clone())
    }

    fn assign(&mut self, value: Value) -> bool {
        match value {
            Value::Bytes(b) => *self = b,
            Value::String(s) => *self = s.into_bytes(),
            _ => return false,
        }
        true
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl Slot for Value {
    fn kind(&self) -> Kind {
        Kind::Any
    }

    fn value(&self) -> Value {
        self.clone()
    }

    fn assign(&mut self, value: Value) -> bool {
        *self = value;
        true
    }

    fn is_zero(&self) -> bool {
        self.is_null()
    }
}

impl<T: Slot + Default> Slot for Option<T> {
    fn kind(&self) -> Kind {
        match self {
            Some(inner) => inner.kind(),
            None => T::default().kind(),
        }
    }

    fn value(&self) -> Value {
        self.as_ref().map(Slot::value).unwrap_or_default()
    }

    fn assign(&mut self, value: Value) -> bool {
        if value.is_null() {
            *self = None;
            return true;
        }
        let mut inner = T::default();
        if inner.assign(value) {
            *self = Some(inner);
            true
        } else {
            false
        }
    }

    fn is_zero(&self) -> bool {
        self.is_none()
    }
}

/// Read access to one record field
pub enum FieldRef<'a> {
    Slot(&'a dyn Slot),
    Record(&'a dyn Record),
}

/// Write access to one record field
pub enum FieldMut<'a> {
    Slot(&'a mut dyn Slot),
    Record(&'a mut dyn Record),
}

/// A type that can be declared as a record field
pub trait Field {
    fn as_field(&self) -> FieldRef<'_>;

    fn as_field_mut(&mut self) -> FieldMut<'_>;

    /// Descriptor of the field type when it is itself a record
    fn nested_descriptor() -> Option<&'static RecordDescriptor>
    where
        Self: Sized,
    {
        None
    }
}

macro_rules! slot_field {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Field for $ty {
                fn as_field(&self) -> FieldRef<'_> {
                    FieldRef::Slot(self)
                }

                fn as_field_mut(&mut self) -> FieldMut<'_> {
                    FieldMut::Slot(self)
                }
            }
        )*
    };
}

slot_field!(String, i64, i32, u64, u32, f64, f32, bool, DateTime<Utc>, Vec<u8>, Value);

impl<T: Slot + Default> Field for Option<T> {
    fn as_field(&self) -> FieldRef<'_> {
        FieldRef::Slot(self)
    }

    fn as_field_mut(&mut self) -> FieldMut<'_> {
        FieldMut::Slot(self)
    }
}

// =============================================================================
// Records
// =============================================================================

/// Structured record with a static field layout
pub trait Record {
    fn descriptor(&self) -> &'static RecordDescriptor;

    /// Field by declared identifier
    fn field(&self, ident: &str) -> Option<FieldRef<'_>>;

    fn field_mut(&mut self, ident: &str) -> Option<FieldMut<'_>>;
}

/// Static access to a record type's descriptor
pub trait Describe {
    fn describe() -> &'static RecordDescriptor;
}

/// True when every field of `record` holds its zero value
pub fn record_is_zero(record: &dyn Record) -> bool {
    record
        .descriptor()
        .fields()
        .iter()
        .all(|f| match record.field(f.ident()) {
            Some(FieldRef::Slot(slot)) => slot.is_zero(),
            Some(FieldRef::Record(nested)) => record_is_zero(nested),
            None => true,
        })
}

// =============================================================================
// Destinations
// =============================================================================

/// Element kind of a destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Map,
    Record,
    Scalar,
}

/// Map destination the mapper can insert into
pub trait MapTarget {
    /// Declared value kind; `Any` for generic maps
    fn value_kind(&self) -> Kind;

    /// Insert `value` under `key`, `false` when it does not fit
    fn insert_value(&mut self, key: String, value: Value) -> bool;
}

/// Map source the mapper can read entries from
pub trait MapSource {
    fn entries(&self) -> Vec<(String, Value)>;
}

/// A value that can be populated from, or flattened into, one row
pub trait Element {
    fn shape() -> Shape
    where
        Self: Sized;

    fn as_map(&self) -> Option<&dyn MapSource> {
        None
    }

    fn as_map_mut(&mut self) -> Option<&mut dyn MapTarget> {
        None
    }

    fn as_record(&self) -> Option<&dyn Record> {
        None
    }

    fn as_record_mut(&mut self) -> Option<&mut dyn Record> {
        None
    }
}

macro_rules! scalar_element {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Element for $ty {
                fn shape() -> Shape {
                    Shape::Scalar
                }
            }
        )*
    };
}

scalar_element!(String, i64, i32, u64, u32, f64, f32, bool, Value);

macro_rules! map_element {
    ($($map:ident),* $(,)?) => {
        $(
            impl<V: Slot + Default> MapTarget for $map<String, V> {
                fn value_kind(&self) -> Kind {
                    V::default().kind()
                }

                fn insert_value(&mut self, key: String, value: Value) -> bool {
                    let mut slot = V::default();
                    if slot.assign(value) {
                        self.insert(key, slot);
                        true
                    } else {
                        false
                    }
                }
            }

            impl<V: Slot + Default> MapSource for $map<String, V> {
                fn entries(&self) -> Vec<(String, Value)> {
                    self.iter().map(|(k, v)| (k.clone(), v.value())).collect()
                }
            }

            impl<V: Slot + Default> Element for $map<String, V> {
                fn shape() -> Shape {
                    Shape::Map
                }

                fn as_map(&self) -> Option<&dyn MapSource> {
                    Some(self)
                }

                fn as_map_mut(&mut self) -> Option<&mut dyn MapTarget> {
                    Some(self)
                }
            }
        )*
    };
}

map_element!(HashMap, BTreeMap);

impl<T: Element> Element for Box<T> {
    fn shape() -> Shape {
        T::shape()
    }

    fn as_map(&self) -> Option<&dyn MapSource> {
        (**self).as_map()
    }

    fn as_map_mut(&mut self) -> Option<&mut dyn MapTarget> {
        (**self).as_map_mut()
    }

    fn as_record(&self) -> Option<&dyn Record> {
        (**self).as_record()
    }

    fn as_record_mut(&mut self) -> Option<&mut dyn Record> {
        (**self).as_record_mut()
    }
}

/// A shared reference reads through to the referenced element
impl<T: Element> Element for &T {
    fn shape() -> Shape {
        T::shape()
    }

    fn as_map(&self) -> Option<&dyn MapSource> {
        (**self).as_map()
    }

    fn as_record(&self) -> Option<&dyn Record> {
        (**self).as_record()
    }
}

/// Caller-supplied destination; only exclusive references are writable
pub trait Destination<'a> {
    type Target: ?Sized + 'a;

    fn into_target(self) -> Option<&'a mut Self::Target>;
}

impl<'a, T: ?Sized + 'a> Destination<'a> for &'a mut T {
    type Target = T;

    fn into_target(self) -> Option<&'a mut T> {
        Some(self)
    }
}

impl<'a, T: ?Sized + 'a> Destination<'a> for &'a T {
    type Target = T;

    fn into_target(self) -> Option<&'a mut T> {
        None
    }
}

/// Sequence destination for multi-row fetches
pub trait Sink {
    type Item: Element + Default;

    /// Whether rows can be appended
    fn is_growable(&self) -> bool;

    /// Append one row, `false` for fixed-size sequences
    fn push_item(&mut self, item: Self::Item) -> bool;
}

impl<T: Element + Default> Sink for Vec<T> {
    type Item = T;

    fn is_growable(&self) -> bool {
        true
    }

    fn push_item(&mut self, item: T) -> bool {
        self.push(item);
        true
    }
}

impl<T: Element + Default> Sink for VecDeque<T> {
    type Item = T;

    fn is_growable(&self) -> bool {
        true
    }

    fn push_item(&mut self, item: T) -> bool {
        self.push_back(item);
        true
    }
}

impl<T: Element + Default> Sink for [T] {
    type Item = T;

    fn is_growable(&self) -> bool {
        false
    }

    fn push_item(&mut self, _item: T) -> bool {
        false
    }
}

/// Declare a record struct together with its mapping metadata
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$tag:ident = $val:literal])*
                $fvis:vis $field:ident : $fty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $fvis $field: $fty, )*
        }

        impl $crate::data::record::Describe for $name {
            fn describe() -> &'static $crate::data::record::RecordDescriptor {
                static DESCRIPTOR: ::std::sync::OnceLock<$crate::data::record::RecordDescriptor> =
                    ::std::sync::OnceLock::new();
                DESCRIPTOR.get_or_init(|| {
                    $crate::data::record::RecordDescriptor::new(
                        ::std::any::type_name::<$name>(),
                        vec![
                            $(
                                $crate::data::record::FieldDescriptor::from_tags(
                                    stringify!($field),
                                    !stringify!($fvis).is_empty(),
                                    &[ $( (stringify!($tag), $val) ),* ],
                                    <$fty as $crate::data::record::Field>::nested_descriptor,
                                ),
                            )*
                        ],
                    )
                })
            }
        }

        impl $crate::data::record::Record for $name {
            fn descriptor(&self) -> &'static $crate::data::record::RecordDescriptor {
                <Self as $crate::data::record::Describe>::describe()
            }

            fn field(&self, ident: &str) -> Option<$crate::data::record::FieldRef<'_>> {
                match ident {
                    $( stringify!($field) => Some($crate::data::record::Field::as_field(&self.$field)), )*
                    _ => None,
                }
            }

            fn field_mut(&mut self, ident: &str) -> Option<$crate::data::record::FieldMut<'_>> {
                match ident {
                    $( stringify!($field) => Some($crate::data::record::Field::as_field_mut(&mut self.$field)), )*
                    _ => None,
                }
            }
        }

        impl $crate::data::record::Field for $name {
            fn as_field(&self) -> $crate::data::record::FieldRef<'_> {
                $crate::data::record::FieldRef::Record(self)
            }

            fn as_field_mut(&mut self) -> $crate::data::record::FieldMut<'_> {
                $crate::data::record::FieldMut::Record(self)
            }

            fn nested_descriptor() -> Option<&'static $crate::data::record::RecordDescriptor> {
                Some(<Self as $crate::data::record::Describe>::describe())
            }
        }

        impl $crate::data::record::Element for $name {
            fn shape() -> $crate::data::record::Shape {
                $crate::data::record::Shape::Record
            }

            fn as_record(&self) -> Option<&dyn $crate::data::record::Record> {
                Some(self)
            }

            fn as_record_mut(&mut self) -> Option<&mut dyn $crate::data::record::Record> {
                Some(self)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        pub struct Audit {
            pub created_by: String,
            pub revision: i32,
        }
    }

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        pub struct Tagged {
            #[db = "id,omitempty"]
            pub id: i64,
            #[field = "full_name"]
            pub name: String,
            #[db = "-"]
            pub secret: String,
            #[db = ",inline"]
            pub audit: Audit,
            #[db = "label"]
            #[field = "legacy_label"]
            pub label: String,
            #[omitempty = "true"]
            pub note: Option<String>,
            hidden: bool,
        }
    }

    fn field<'a>(desc: &'a RecordDescriptor, ident: &str) -> &'a FieldDescriptor {
        desc.fields().iter().find(|f| f.ident() == ident).unwrap()
    }

    #[test]
    fn test_descriptor_reads_tags() {
        let desc = Tagged::describe();
        assert_eq!(desc.fields().len(), 7);

        let id = field(desc, "id");
        assert_eq!(id.tag_name(), Some("id"));
        assert!(id.omitempty());
        assert!(!id.inline());

        assert_eq!(field(desc, "name").tag_name(), Some("full_name"));
        assert!(field(desc, "secret").is_skipped());
        assert!(field(desc, "audit").inline());
        assert_eq!(field(desc, "audit").tag_name(), None);
        assert!(field(desc, "note").omitempty());
    }

    #[test]
    fn test_current_tag_wins_over_legacy() {
        assert_eq!(field(Tagged::describe(), "label").tag_name(), Some("label"));
    }

    #[test]
    fn test_private_fields_are_skipped() {
        assert!(field(Tagged::describe(), "hidden").is_skipped());
        assert!(!field(Tagged::describe(), "name").is_skipped());
    }

    #[test]
    fn test_descriptor_is_built_once() {
        assert!(std::ptr::eq(Tagged::describe(), Tagged::describe()));
        let record = Tagged::default();
        assert!(std::ptr::eq(record.descriptor(), Tagged::describe()));
    }

    #[test]
    fn test_nested_descriptor() {
        let audit = field(Tagged::describe(), "audit");
        assert!(std::ptr::eq(audit.nested().unwrap(), Audit::describe()));
        assert!(field(Tagged::describe(), "id").nested().is_none());
    }

    #[test]
    fn test_field_access() {
        let mut record = Tagged::default();
        match record.field_mut("name") {
            Some(FieldMut::Slot(slot)) => assert!(slot.assign(Value::from("ada"))),
            _ => panic!("expected slot"),
        }
        assert_eq!(record.name, "ada");
        assert!(matches!(record.field("audit"), Some(FieldRef::Record(_))));
        assert!(record.field("nope").is_none());
    }

    #[test]
    fn test_parse_tag() {
        assert_eq!(parse_tag("name,omitempty"), ("name", vec!["omitempty"]));
        assert_eq!(parse_tag(",inline"), ("", vec!["inline"]));
        assert_eq!(parse_tag(""), ("", vec![]));
    }

    #[test]
    fn test_int_slot_range() {
        let mut small = 0i32;
        assert!(small.assign(Value::Int(7)));
        assert_eq!(small, 7);
        assert!(!small.assign(Value::Int(i64::MAX)));
        assert!(!small.assign(Value::from("7")));
        let mut unsigned = 0u64;
        assert!(!unsigned.assign(Value::Int(-1)));
    }

    #[test]
    fn test_option_slot() {
        let mut slot: Option<i64> = None;
        assert_eq!(slot.kind(), Kind::Int);
        assert!(slot.is_zero());
        assert!(slot.assign(Value::Int(3)));
        assert_eq!(slot, Some(3));
        assert!(slot.assign(Value::Null));
        assert_eq!(slot, None);
    }

    #[test]
    fn test_record_is_zero() {
        let mut audit = Audit::default();
        assert!(record_is_zero(&audit));
        audit.revision = 2;
        assert!(!record_is_zero(&audit));
    }

    #[test]
    fn test_shapes() {
        assert_eq!(Tagged::shape(), Shape::Record);
        assert_eq!(<HashMap<String, Value>>::shape(), Shape::Map);
        assert_eq!(<BTreeMap<String, i64>>::shape(), Shape::Map);
        assert_eq!(String::shape(), Shape::Scalar);
        assert_eq!(<Box<Audit>>::shape(), Shape::Record);
    }

    #[test]
    fn test_map_target_checks_value_kind() {
        let mut map: HashMap<String, i64> = HashMap::new();
        assert_eq!(map.value_kind(), Kind::Int);
        assert!(map.insert_value("a".into(), Value::Int(1)));
        assert!(!map.insert_value("b".into(), Value::from("x")));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_destination_requires_exclusive_reference() {
        let mut audit = Audit::default();
        assert!((&audit).into_target().is_none());
        assert!((&mut audit).into_target().is_some());
    }

    #[test]
    fn test_sink_growable() {
        let rows: Vec<Audit> = Vec::new();
        assert!(rows.is_growable());
        let mut fixed = [Audit::default()];
        let slice: &mut [Audit] = &mut fixed;
        assert!(!slice.is_growable());
        assert!(!slice.push_item(Audit::default()));
    }
}
