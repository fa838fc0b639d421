//! Type-erased descriptors for reflected fields.
//!
//! A [`UProperty`] never knows the Rust type of the value it describes at the call site.
//! Every operation dispatches on [`PropertyKind`], and the per-type work is done by
//! [`TypeFundamentals`] for all kinds that store a plain value type.

use std::mem::{align_of, size_of};
use std::ptr::{self, NonNull};
use std::sync::{Arc, Weak};

use crate::archive::Archive;
use crate::error::{PropertyError, Result};
use crate::flags::{EClassCastFlags, EPropertyFlags, EPropertyPortFlags, EStructFlags};
use crate::name::{FName, NAME_NONE};
use crate::object::{FUObjectArray, UObject};
use crate::script_array::FScriptArray;
use crate::text::FOutputDevice;
use crate::ustruct::{UClass, UEnum, UFunction, UScriptStruct, UStruct};

/// Dispatches on the value type of a property kind.
///
/// Kinds that do not store a plain value type (`Bool`, `Array`, `Struct`) must be
/// matched by the leading arms. Every other kind evaluates `$body` with `$f` bound
/// to the `TypeFundamentals` of its value type.
macro_rules! match_fundamentals {
    ($kind:expr, $f:ident => $body:expr, $($special:pat => $special_body:expr),+ $(,)?) => {{
        use $crate::fundamentals::TypeFundamentals as __TF;
        use $crate::object as __o;
        match $kind {
            $($special => $special_body,)+
            #[allow(unreachable_patterns)]
            PropertyKind::Byte(_) => { type $f = __TF<u8>; $body }
            #[allow(unreachable_patterns)]
            PropertyKind::Int8 => { type $f = __TF<i8>; $body }
            #[allow(unreachable_patterns)]
            PropertyKind::Int16 => { type $f = __TF<i16>; $body }
            #[allow(unreachable_patterns)]
            PropertyKind::Int => { type $f = __TF<i32>; $body }
            #[allow(unreachable_patterns)]
            PropertyKind::Int64 => { type $f = __TF<i64>; $body }
            #[allow(unreachable_patterns)]
            PropertyKind::UInt16 => { type $f = __TF<u16>; $body }
            #[allow(unreachable_patterns)]
            PropertyKind::UInt32 => { type $f = __TF<u32>; $body }
            #[allow(unreachable_patterns)]
            PropertyKind::UInt64 => { type $f = __TF<u64>; $body }
            #[allow(unreachable_patterns)]
            PropertyKind::Float => { type $f = __TF<f32>; $body }
            #[allow(unreachable_patterns)]
            PropertyKind::Double => { type $f = __TF<f64>; $body }
            #[allow(unreachable_patterns)]
            PropertyKind::Object(_) => { type $f = __TF<__o::ObjectPtr>; $body }
            #[allow(unreachable_patterns)]
            PropertyKind::WeakObject(_) => { type $f = __TF<__o::FWeakObjectPtr>; $body }
            #[allow(unreachable_patterns)]
            PropertyKind::LazyObject(_) => { type $f = __TF<__o::FLazyObjectPtr>; $body }
            #[allow(unreachable_patterns)]
            PropertyKind::Asset(_) => { type $f = __TF<__o::FAssetPtr>; $body }
            #[allow(unreachable_patterns)]
            PropertyKind::Class { .. } => { type $f = __TF<__o::ClassPtr>; $body }
            #[allow(unreachable_patterns)]
            PropertyKind::AssetClass { .. } => { type $f = __TF<__o::FAssetPtr>; $body }
            #[allow(unreachable_patterns)]
            PropertyKind::Interface(_) => { type $f = __TF<__o::FScriptInterface>; $body }
            #[allow(unreachable_patterns)]
            PropertyKind::Name => { type $f = __TF<$crate::name::FName>; $body }
            #[allow(unreachable_patterns)]
            PropertyKind::Str => { type $f = __TF<$crate::containers::FString>; $body }
            #[allow(unreachable_patterns)]
            PropertyKind::Delegate(_) => { type $f = __TF<__o::FScriptDelegate>; $body }
            #[allow(unreachable_patterns)]
            PropertyKind::MulticastDelegate(_) => {
                type $f = __TF<__o::FMulticastScriptDelegate>;
                $body
            }
        }
    }};
}

mod array;
mod boolean;
mod cpp;
mod delegate;
mod import;
mod numeric;
mod object;
mod script_struct;
mod string;

pub use array::FScriptArrayHelper;
pub use boolean::BoolProperty;
pub use cpp::EExportedDeclaration;
pub use import::{import_single_property, FDefinedProperty};
pub use numeric::NumericValue;

/// Type names as they appear in property tags.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
pub enum EPropertyType {
    ByteProperty,
    Int8Property,
    Int16Property,
    IntProperty,
    Int64Property,
    UInt16Property,
    UInt32Property,
    UInt64Property,
    FloatProperty,
    DoubleProperty,
    BoolProperty,
    ObjectProperty,
    WeakObjectProperty,
    LazyObjectProperty,
    AssetObjectProperty,
    ClassProperty,
    AssetClassProperty,
    InterfaceProperty,
    NameProperty,
    StrProperty,
    ArrayProperty,
    StructProperty,
    DelegateProperty,
    MulticastDelegateProperty,
}

/// Kind specific data of a property.
///
/// Class references are weak so a class may hold properties referring to itself.
#[derive(Debug, Clone)]
pub enum PropertyKind {
    Byte(Option<Arc<UEnum>>),
    Int8,
    Int16,
    Int,
    Int64,
    UInt16,
    UInt32,
    UInt64,
    Float,
    Double,
    Bool(BoolProperty),
    Object(Weak<UClass>),
    WeakObject(Weak<UClass>),
    LazyObject(Weak<UClass>),
    Asset(Weak<UClass>),
    Class { meta_class: Weak<UClass> },
    AssetClass { meta_class: Weak<UClass> },
    Interface(Weak<UClass>),
    Name,
    Str,
    Array(Box<UProperty>),
    Struct(Arc<UScriptStruct>),
    Delegate(Option<Arc<UFunction>>),
    MulticastDelegate(Option<Arc<UFunction>>),
}

impl PropertyKind {
    pub fn property_type(&self) -> EPropertyType {
        use EPropertyType as T;
        match self {
            PropertyKind::Byte(_) => T::ByteProperty,
            PropertyKind::Int8 => T::Int8Property,
            PropertyKind::Int16 => T::Int16Property,
            PropertyKind::Int => T::IntProperty,
            PropertyKind::Int64 => T::Int64Property,
            PropertyKind::UInt16 => T::UInt16Property,
            PropertyKind::UInt32 => T::UInt32Property,
            PropertyKind::UInt64 => T::UInt64Property,
            PropertyKind::Float => T::FloatProperty,
            PropertyKind::Double => T::DoubleProperty,
            PropertyKind::Bool(_) => T::BoolProperty,
            PropertyKind::Object(_) => T::ObjectProperty,
            PropertyKind::WeakObject(_) => T::WeakObjectProperty,
            PropertyKind::LazyObject(_) => T::LazyObjectProperty,
            PropertyKind::Asset(_) => T::AssetObjectProperty,
            PropertyKind::Class { .. } => T::ClassProperty,
            PropertyKind::AssetClass { .. } => T::AssetClassProperty,
            PropertyKind::Interface(_) => T::InterfaceProperty,
            PropertyKind::Name => T::NameProperty,
            PropertyKind::Str => T::StrProperty,
            PropertyKind::Array(_) => T::ArrayProperty,
            PropertyKind::Struct(_) => T::StructProperty,
            PropertyKind::Delegate(_) => T::DelegateProperty,
            PropertyKind::MulticastDelegate(_) => T::MulticastDelegateProperty,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            PropertyKind::Byte(_)
                | PropertyKind::Int8
                | PropertyKind::Int16
                | PropertyKind::Int
                | PropertyKind::Int64
                | PropertyKind::UInt16
                | PropertyKind::UInt32
                | PropertyKind::UInt64
                | PropertyKind::Float
                | PropertyKind::Double
        )
    }

    /// Any of the kinds holding a reference to an object.
    pub fn is_object_property_base(&self) -> bool {
        matches!(
            self,
            PropertyKind::Object(_)
                | PropertyKind::WeakObject(_)
                | PropertyKind::LazyObject(_)
                | PropertyKind::Asset(_)
                | PropertyKind::Class { .. }
                | PropertyKind::AssetClass { .. }
        )
    }
}

pub(crate) fn align(value: i32, alignment: i32) -> i32 {
    debug_assert!(alignment > 0 && alignment & (alignment - 1) == 0);
    (value + alignment - 1) & !(alignment - 1)
}

/// Describes one field of a struct: where its value lives and how to handle it.
#[derive(Debug, Clone)]
pub struct UProperty {
    name: FName,
    array_dim: i32,
    element_size: i32,
    property_flags: EPropertyFlags,
    rep_index: u16,
    rep_notify_func: FName,
    offset_internal: i32,
    explicit_offset: Option<i32>,
    owner: Weak<UStruct>,
    kind: PropertyKind,
}

fn weak_class(class: Option<&Arc<UClass>>) -> Weak<UClass> {
    class.map(Arc::downgrade).unwrap_or_default()
}

impl UProperty {
    pub fn new(name: &str, kind: PropertyKind) -> Self {
        Self {
            name: FName::new(name),
            array_dim: 1,
            element_size: 0,
            property_flags: EPropertyFlags::CPF_None,
            rep_index: 0,
            rep_notify_func: NAME_NONE,
            offset_internal: 0,
            explicit_offset: None,
            owner: Weak::new(),
            kind,
        }
    }

    pub fn byte(name: &str) -> Self {
        Self::new(name, PropertyKind::Byte(None))
    }
    pub fn byte_enum(name: &str, uenum: Arc<UEnum>) -> Self {
        Self::new(name, PropertyKind::Byte(Some(uenum)))
    }
    pub fn int8(name: &str) -> Self {
        Self::new(name, PropertyKind::Int8)
    }
    pub fn int16(name: &str) -> Self {
        Self::new(name, PropertyKind::Int16)
    }
    pub fn int(name: &str) -> Self {
        Self::new(name, PropertyKind::Int)
    }
    pub fn int64(name: &str) -> Self {
        Self::new(name, PropertyKind::Int64)
    }
    pub fn uint16(name: &str) -> Self {
        Self::new(name, PropertyKind::UInt16)
    }
    pub fn uint32(name: &str) -> Self {
        Self::new(name, PropertyKind::UInt32)
    }
    pub fn uint64(name: &str) -> Self {
        Self::new(name, PropertyKind::UInt64)
    }
    pub fn float(name: &str) -> Self {
        Self::new(name, PropertyKind::Float)
    }
    pub fn double(name: &str) -> Self {
        Self::new(name, PropertyKind::Double)
    }

    /// A native `bool` occupying a whole byte.
    pub fn bool(name: &str) -> Self {
        Self::new(name, PropertyKind::Bool(BoolProperty::native()))
    }
    /// A one bit bitfield. Consecutive bitfields share storage when the struct is linked.
    pub fn bitfield(name: &str) -> Self {
        Self::new(name, PropertyKind::Bool(BoolProperty::unassigned()))
    }
    /// A bitfield at a known native position, `mask` selecting its bit within
    /// storage of `field_size` bytes.
    pub fn bool_with_mask(name: &str, field_size: i32, mask: u64) -> Self {
        let mut property = Self::new(name, PropertyKind::Bool(BoolProperty::native()));
        property.set_bool_size(field_size, false, mask);
        property
    }

    pub fn object(name: &str, class: Option<&Arc<UClass>>) -> Self {
        Self::new(name, PropertyKind::Object(weak_class(class)))
    }
    pub fn weak_object(name: &str, class: Option<&Arc<UClass>>) -> Self {
        Self::new(name, PropertyKind::WeakObject(weak_class(class)))
    }
    pub fn lazy_object(name: &str, class: Option<&Arc<UClass>>) -> Self {
        Self::new(name, PropertyKind::LazyObject(weak_class(class)))
    }
    pub fn asset(name: &str, class: Option<&Arc<UClass>>) -> Self {
        Self::new(name, PropertyKind::Asset(weak_class(class)))
    }
    pub fn class(name: &str, meta_class: Option<&Arc<UClass>>) -> Self {
        Self::new(
            name,
            PropertyKind::Class {
                meta_class: weak_class(meta_class),
            },
        )
    }
    pub fn asset_class(name: &str, meta_class: Option<&Arc<UClass>>) -> Self {
        Self::new(
            name,
            PropertyKind::AssetClass {
                meta_class: weak_class(meta_class),
            },
        )
    }
    pub fn interface(name: &str, interface_class: &Arc<UClass>) -> Self {
        Self::new(name, PropertyKind::Interface(Arc::downgrade(interface_class)))
    }
    pub fn fname(name: &str) -> Self {
        Self::new(name, PropertyKind::Name)
    }
    pub fn str(name: &str) -> Self {
        Self::new(name, PropertyKind::Str)
    }
    pub fn array(name: &str, inner: UProperty) -> Self {
        Self::new(name, PropertyKind::Array(Box::new(inner)))
    }
    pub fn script_struct(name: &str, ustruct: &Arc<UScriptStruct>) -> Self {
        Self::new(name, PropertyKind::Struct(ustruct.clone()))
    }
    pub fn delegate(name: &str, signature: Option<&Arc<UFunction>>) -> Self {
        Self::new(
            name,
            PropertyKind::Delegate(signature.cloned()),
        )
    }
    pub fn multicast_delegate(name: &str, signature: Option<&Arc<UFunction>>) -> Self {
        Self::new(
            name,
            PropertyKind::MulticastDelegate(signature.cloned()),
        )
    }

    pub fn with_array_dim(mut self, array_dim: i32) -> Self {
        assert!(array_dim >= 1, "array dimension must be positive");
        self.array_dim = array_dim;
        self
    }

    /// Adds declared flags. Computed flags are derived from the type and ignored here.
    pub fn with_flags(mut self, flags: EPropertyFlags) -> Self {
        self.property_flags |= flags - EPropertyFlags::CPF_ComputedFlags;
        self
    }

    /// Places the property at a fixed offset instead of packing it automatically.
    pub fn with_offset(mut self, offset: i32) -> Self {
        self.explicit_offset = Some(offset);
        self
    }

    pub fn with_rep_notify(mut self, function: &str) -> Self {
        self.rep_notify_func = FName::new(function);
        self.property_flags |= EPropertyFlags::CPF_Net | EPropertyFlags::CPF_RepNotify;
        self
    }

    pub fn get_fname(&self) -> FName {
        self.name
    }

    pub fn get_name(&self) -> String {
        self.name.to_string()
    }

    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    pub fn property_type(&self) -> EPropertyType {
        self.kind.property_type()
    }

    /// Type name written into property tags, e.g. `IntProperty`.
    pub fn get_id(&self) -> FName {
        FName::new(self.property_type().into())
    }

    pub fn array_dim(&self) -> i32 {
        self.array_dim
    }

    pub fn element_size(&self) -> i32 {
        self.element_size
    }

    pub fn get_size(&self) -> i32 {
        self.array_dim * self.element_size
    }

    pub fn property_flags(&self) -> EPropertyFlags {
        self.property_flags
    }

    pub fn rep_index(&self) -> u16 {
        self.rep_index
    }

    pub fn set_rep_index(&mut self, rep_index: u16) {
        self.rep_index = rep_index;
    }

    pub fn rep_notify_func(&self) -> FName {
        self.rep_notify_func
    }

    pub fn explicit_offset(&self) -> Option<i32> {
        self.explicit_offset
    }

    pub fn get_owner_struct(&self) -> Option<Arc<UStruct>> {
        self.owner.upgrade()
    }

    pub fn get_owner_class(&self) -> Option<Arc<UClass>> {
        self.get_owner_struct().filter(|owner| owner.is_class())
    }

    /// Inner property of an array property.
    pub fn inner(&self) -> Option<&UProperty> {
        match &self.kind {
            PropertyKind::Array(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn script_struct_type(&self) -> Option<&Arc<UScriptStruct>> {
        match &self.kind {
            PropertyKind::Struct(ustruct) => Some(ustruct),
            _ => None,
        }
    }

    /// Class of the referenced objects. `None` accepts any object.
    pub fn property_class(&self) -> Option<Arc<UClass>> {
        match &self.kind {
            PropertyKind::Object(class)
            | PropertyKind::WeakObject(class)
            | PropertyKind::LazyObject(class)
            | PropertyKind::Asset(class)
            | PropertyKind::Interface(class) => class.upgrade(),
            _ => None,
        }
    }

    pub fn meta_class(&self) -> Option<Arc<UClass>> {
        match &self.kind {
            PropertyKind::Class { meta_class } | PropertyKind::AssetClass { meta_class } => {
                meta_class.upgrade()
            }
            _ => None,
        }
    }

    pub fn signature_function(&self) -> Option<Arc<UFunction>> {
        match &self.kind {
            PropertyKind::Delegate(f) | PropertyKind::MulticastDelegate(f) => f.clone(),
            _ => None,
        }
    }

    pub fn class_cast_flags(&self) -> EClassCastFlags {
        use EClassCastFlags as C;
        let base = C::CASTCLASS_UField | C::CASTCLASS_UProperty;
        let numeric = base | C::CASTCLASS_UNumericProperty;
        let object = base | C::CASTCLASS_UObjectPropertyBase;
        match &self.kind {
            PropertyKind::Byte(_) => numeric | C::CASTCLASS_UByteProperty,
            PropertyKind::Int8 => numeric | C::CASTCLASS_UInt8Property,
            PropertyKind::Int16 => numeric | C::CASTCLASS_UInt16Property,
            PropertyKind::Int => numeric | C::CASTCLASS_UIntProperty,
            PropertyKind::Int64 => numeric | C::CASTCLASS_UInt64Property,
            PropertyKind::UInt16 => numeric | C::CASTCLASS_UUInt16Property,
            PropertyKind::UInt32 => numeric | C::CASTCLASS_UUInt32Property,
            PropertyKind::UInt64 => numeric | C::CASTCLASS_UUInt64Property,
            PropertyKind::Float => numeric | C::CASTCLASS_UFloatProperty,
            PropertyKind::Double => numeric | C::CASTCLASS_UDoubleProperty,
            PropertyKind::Bool(_) => base | C::CASTCLASS_UBoolProperty,
            PropertyKind::Object(_) => object | C::CASTCLASS_UObjectProperty,
            PropertyKind::WeakObject(_) => object | C::CASTCLASS_UWeakObjectProperty,
            PropertyKind::LazyObject(_) => object | C::CASTCLASS_ULazyObjectProperty,
            PropertyKind::Asset(_) => object | C::CASTCLASS_UAssetObjectProperty,
            PropertyKind::Class { .. } => object | C::CASTCLASS_UClassProperty,
            PropertyKind::AssetClass { .. } => {
                object | C::CASTCLASS_UAssetObjectProperty | C::CASTCLASS_UAssetClassProperty
            }
            PropertyKind::Interface(_) => base | C::CASTCLASS_UInterfaceProperty,
            PropertyKind::Name => base | C::CASTCLASS_UNameProperty,
            PropertyKind::Str => base | C::CASTCLASS_UStrProperty,
            PropertyKind::Array(_) => base | C::CASTCLASS_UArrayProperty,
            PropertyKind::Struct(_) => base | C::CASTCLASS_UStructProperty,
            PropertyKind::Delegate(_) => base | C::CASTCLASS_UDelegateProperty,
            PropertyKind::MulticastDelegate(_) => base | C::CASTCLASS_UMulticastDelegateProperty,
        }
    }

    pub fn is_a(&self, flags: EClassCastFlags) -> bool {
        self.class_cast_flags().contains(flags)
    }

    // layout

    /// Computes the element size and the flags derived from the value type.
    pub(crate) fn link(&mut self, owner: &Weak<UStruct>) -> Result<()> {
        use EPropertyFlags as C;
        self.owner = owner.clone();
        let propagated = self.property_flags & C::CPF_PropagateToArrayInner;
        let (element_size, computed) = match_fundamentals!(&mut self.kind, F => (F::CPP_SIZE, F::computed_flags()),
            PropertyKind::Bool(b) => {
                let (size, native, mask) = b.layout();
                self.set_bool_size(size, native, mask);
                return Ok(());
            },
            PropertyKind::Array(inner) => {
                inner.property_flags |= propagated;
                inner.link(owner)?;
                (size_of::<FScriptArray>() as i32, C::CPF_ZeroConstructor)
            },
            PropertyKind::Struct(ustruct) => {
                let link = ustruct
                    .get_link()
                    .map_err(|_| PropertyError::NotLinked(ustruct.get_fname()))?;
                let mut computed = C::CPF_None;
                if link.struct_flags.contains(EStructFlags::STRUCT_IsPlainOldData) {
                    computed |= C::CPF_IsPlainOldData;
                }
                if link.struct_flags.contains(EStructFlags::STRUCT_NoDestructor) {
                    computed |= C::CPF_NoDestructor;
                }
                if link.struct_flags.contains(EStructFlags::STRUCT_ZeroConstructor) {
                    computed |= C::CPF_ZeroConstructor;
                }
                if link.struct_flags.contains(EStructFlags::STRUCT_HasInstancedReference) {
                    self.property_flags |= C::CPF_ContainsInstancedReference;
                }
                (align(link.properties_size, link.min_alignment), computed)
            },
        );
        if matches!(self.kind, PropertyKind::Interface(_)) {
            self.property_flags -= C::CPF_InterfaceClearMask;
        }
        self.element_size = element_size;
        self.property_flags = (self.property_flags - C::CPF_ComputedFlags) | computed;
        Ok(())
    }

    pub fn get_min_alignment(&self) -> i32 {
        match_fundamentals!(&self.kind, F => F::CPP_ALIGNMENT,
            PropertyKind::Bool(b) => if b.is_native_bool() { 1 } else { b.field_size() },
            PropertyKind::Array(_) => align_of::<FScriptArray>() as i32,
            PropertyKind::Struct(ustruct) => ustruct.min_alignment(),
        )
    }

    /// Places the property at the next aligned offset and returns the end of its storage.
    pub fn setup_offset(&mut self, running_size: i32) -> i32 {
        self.offset_internal = align(running_size, self.get_min_alignment());
        self.offset_internal + self.get_size()
    }

    pub(crate) fn set_offset(&mut self, offset: i32) {
        self.offset_internal = offset;
    }

    pub fn get_offset_for_debug(&self) -> i32 {
        self.offset_internal
    }

    pub fn get_offset_for_ufunction(&self) -> i32 {
        self.offset_internal
    }

    pub fn get_offset_for_gc(&self) -> i32 {
        self.offset_internal
    }

    /// Whether the whole property fits in a container of `container_size` bytes.
    pub fn is_in_container(&self, container_size: i32) -> bool {
        self.offset_internal + self.get_size() <= container_size
    }

    // addressing

    pub fn container_ptr_to_value_ptr(&self, container: *const u8, array_index: i32) -> *mut u8 {
        assert!(
            array_index >= 0 && array_index < self.array_dim,
            "array index {array_index} out of range for '{}' (dim {})",
            self.name,
            self.array_dim
        );
        assert!(!container.is_null(), "null container for '{}'", self.name);
        container
            .cast_mut()
            .wrapping_add((self.offset_internal + self.element_size * array_index) as usize)
    }

    /// Address of the default value, if the defaults container is large enough to hold it.
    pub fn container_ptr_to_value_ptr_for_defaults(
        &self,
        containing_struct: Option<&UStruct>,
        container: Option<*const u8>,
        array_index: i32,
    ) -> Option<*const u8> {
        let container = container?;
        if let Some(containing_struct) = containing_struct {
            if !self.is_in_container(containing_struct.properties_size()) {
                return None;
            }
        }
        Some(self.container_ptr_to_value_ptr(container, array_index).cast_const())
    }

    /// Address of the value inside `object`, checking the object owns this property.
    ///
    /// # Safety
    /// `object` must point at a live object.
    pub unsafe fn object_ptr_to_value_ptr(
        &self,
        object: NonNull<UObject>,
        array_index: i32,
    ) -> Result<*mut u8> {
        let object = object.as_ref();
        if let Some(owner) = self.get_owner_struct() {
            if !object.is_a(&owner) {
                return Err(PropertyError::ClassMismatch {
                    object: object.get_full_name(),
                    class: object.class().get_fname(),
                    property: self.name,
                    owner: owner.get_fname(),
                });
            }
        }
        if array_index < 0 || array_index >= self.array_dim {
            return Err(PropertyError::IndexOutOfRange {
                index: array_index,
                len: self.array_dim,
            });
        }
        Ok(self.container_ptr_to_value_ptr(object.as_container(), array_index))
    }

    // value operations

    fn is_pod(&self) -> bool {
        self.property_flags
            .contains(EPropertyFlags::CPF_IsPlainOldData)
    }

    /// # Safety
    /// Both pointers must address initialized values of this property.
    pub unsafe fn copy_single_value(&self, dest: *mut u8, src: *const u8) {
        if dest.cast_const() == src {
            return;
        }
        if self.is_pod() {
            ptr::copy_nonoverlapping(src, dest, self.element_size as usize);
        } else {
            self.copy_values_internal(dest, src, 1);
        }
    }

    /// Copies all `array_dim` elements.
    ///
    /// # Safety
    /// Both pointers must address initialized values of this property.
    pub unsafe fn copy_complete_value(&self, dest: *mut u8, src: *const u8) {
        if dest.cast_const() == src {
            return;
        }
        if self.is_pod() {
            ptr::copy_nonoverlapping(src, dest, self.get_size() as usize);
        } else {
            self.copy_values_internal(dest, src, self.array_dim);
        }
    }

    /// # Safety
    /// Both containers must hold initialized values of this property.
    pub unsafe fn copy_complete_value_in_container(&self, dest: *mut u8, src: *const u8) {
        self.copy_complete_value(
            self.container_ptr_to_value_ptr(dest, 0),
            self.container_ptr_to_value_ptr(src, 0),
        );
    }

    /// # Safety
    /// Both containers must hold initialized values of this property.
    pub unsafe fn copy_single_value_in_container(
        &self,
        dest: *mut u8,
        src: *const u8,
        array_index: i32,
    ) {
        self.copy_single_value(
            self.container_ptr_to_value_ptr(dest, array_index),
            self.container_ptr_to_value_ptr(src, array_index),
        );
    }

    unsafe fn copy_values_internal(&self, dest: *mut u8, src: *const u8, count: i32) {
        match_fundamentals!(&self.kind, F => F::copy_values(dest, src, count),
            PropertyKind::Bool(b) => {
                for i in 0..count as usize {
                    let size = self.element_size as usize;
                    b.set_property_value(dest.add(i * size), b.get_property_value(src.add(i * size)));
                }
            },
            PropertyKind::Array(inner) => {
                for i in 0..count as usize {
                    let offset = i * self.element_size as usize;
                    array::copy_array(inner, dest.add(offset), src.add(offset));
                }
            },
            PropertyKind::Struct(ustruct) => ustruct.copy_script_struct(dest, src, count),
        )
    }

    /// Resets a single element to its default value.
    ///
    /// # Safety
    /// `data` must address an initialized value of this property.
    pub unsafe fn clear_value(&self, data: *mut u8) {
        use EPropertyFlags as C;
        if self
            .property_flags
            .contains(C::CPF_NoDestructor | C::CPF_ZeroConstructor)
        {
            ptr::write_bytes(data, 0, self.element_size as usize);
        } else {
            self.clear_value_internal(data);
        }
    }

    /// # Safety
    /// `container` must hold an initialized value of this property.
    pub unsafe fn clear_value_in_container(&self, container: *mut u8, array_index: i32) {
        self.clear_value(self.container_ptr_to_value_ptr(container, array_index));
    }

    unsafe fn clear_value_internal(&self, data: *mut u8) {
        match_fundamentals!(&self.kind, F => F::clear_value(data),
            PropertyKind::Bool(b) => b.set_property_value(data, false),
            PropertyKind::Array(inner) => FScriptArrayHelper::from_inner(inner, data).empty_values(0),
            PropertyKind::Struct(ustruct) => ustruct.clear_script_struct(data, 1),
        )
    }

    /// Destroys all elements, leaving the memory uninitialized.
    ///
    /// # Safety
    /// `dest` must address initialized values of this property.
    pub unsafe fn destroy_value(&self, dest: *mut u8) {
        if self.has_any_property_flags(EPropertyFlags::CPF_NoDestructor) {
            return;
        }
        self.destroy_value_internal(dest);
    }

    /// # Safety
    /// `container` must hold an initialized value of this property.
    pub unsafe fn destroy_value_in_container(&self, container: *mut u8) {
        self.destroy_value(self.container_ptr_to_value_ptr(container, 0));
    }

    unsafe fn destroy_value_internal(&self, dest: *mut u8) {
        match_fundamentals!(&self.kind, F => F::destroy_value(dest, self.array_dim),
            PropertyKind::Bool(_) => {},
            PropertyKind::Array(inner) => {
                for i in 0..self.array_dim as usize {
                    array::destroy_array(inner, dest.add(i * self.element_size as usize));
                }
            },
            PropertyKind::Struct(ustruct) => ustruct.destroy_struct(dest, self.array_dim),
        )
    }

    /// Writes default values for all elements into uninitialized memory.
    ///
    /// # Safety
    /// `dest` must be valid for writes of `get_size()` bytes.
    pub unsafe fn initialize_value(&self, dest: *mut u8) {
        if self.has_any_property_flags(EPropertyFlags::CPF_ZeroConstructor) {
            ptr::write_bytes(dest, 0, self.get_size() as usize);
        } else {
            self.initialize_value_internal(dest);
        }
    }

    /// # Safety
    /// `container` must be valid for writes over this property's storage.
    pub unsafe fn initialize_value_in_container(&self, container: *mut u8) {
        self.initialize_value(self.container_ptr_to_value_ptr(container, 0));
    }

    unsafe fn initialize_value_internal(&self, dest: *mut u8) {
        match_fundamentals!(&self.kind, F => F::initialize_value(dest, self.array_dim),
            PropertyKind::Bool(b) => {
                for i in 0..self.array_dim as usize {
                    b.clear_bits(dest.add(i * self.element_size as usize));
                }
            },
            PropertyKind::Array(_) => {
                for i in 0..self.array_dim as usize {
                    dest.add(i * self.element_size as usize)
                        .cast::<FScriptArray>()
                        .write(FScriptArray::new());
                }
            },
            PropertyKind::Struct(ustruct) => ustruct.initialize_struct(dest, self.array_dim),
        )
    }

    /// Compares a single element. A missing `b` compares against the default value.
    ///
    /// # Safety
    /// `a` and `b` must address initialized values of this property.
    pub unsafe fn identical(
        &self,
        a: *const u8,
        b: Option<*const u8>,
        port_flags: EPropertyPortFlags,
    ) -> bool {
        match_fundamentals!(&self.kind, F => F::identical(a, b),
            PropertyKind::Bool(bool_property) => bool_property.identical(a, b),
            PropertyKind::Array(inner) => array::identical_arrays(inner, a, b, port_flags),
            PropertyKind::Struct(ustruct) => ustruct.compare_script_struct(a, b, port_flags),
        )
    }

    /// # Safety
    /// Both containers must hold initialized values of this property.
    pub unsafe fn identical_in_container(
        &self,
        a: *const u8,
        b: Option<*const u8>,
        array_index: i32,
        port_flags: EPropertyPortFlags,
    ) -> bool {
        self.identical(
            self.container_ptr_to_value_ptr(a, array_index),
            b.map(|b| self.container_ptr_to_value_ptr(b, array_index).cast_const()),
            port_flags,
        )
    }

    // flags

    pub fn has_any_property_flags(&self, flags: EPropertyFlags) -> bool {
        flags == EPropertyFlags::CPF_AllFlags || self.property_flags.intersects(flags)
    }

    pub fn has_all_property_flags(&self, flags: EPropertyFlags) -> bool {
        self.property_flags.contains(flags)
    }

    pub fn set_property_flags(&mut self, flags: EPropertyFlags) {
        self.property_flags |= flags;
    }

    pub fn clear_property_flags(&mut self, flags: EPropertyFlags) {
        self.property_flags -= flags;
    }

    pub fn is_editor_only_property(&self) -> bool {
        self.has_any_property_flags(EPropertyFlags::CPF_DevelopmentAssets)
    }

    pub fn is_localized(&self) -> bool {
        self.has_any_property_flags(EPropertyFlags::CPF_Localized)
    }

    /// Whether values hold strong references the garbage collector must follow.
    pub fn contains_object_reference(&self) -> bool {
        match &self.kind {
            PropertyKind::Object(_) | PropertyKind::Class { .. } | PropertyKind::Interface(_) => {
                true
            }
            PropertyKind::Array(inner) => inner.contains_object_reference(),
            PropertyKind::Struct(ustruct) => ustruct
                .get_link()
                .map(|link| link.property_link.iter().any(|p| p.contains_object_reference()))
                .unwrap_or(false),
            _ => false,
        }
    }

    pub fn contains_weak_object_reference(&self) -> bool {
        match &self.kind {
            PropertyKind::WeakObject(_)
            | PropertyKind::LazyObject(_)
            | PropertyKind::Asset(_)
            | PropertyKind::AssetClass { .. }
            | PropertyKind::Delegate(_)
            | PropertyKind::MulticastDelegate(_) => true,
            PropertyKind::Array(inner) => inner.contains_weak_object_reference(),
            PropertyKind::Struct(ustruct) => ustruct
                .get_link()
                .map(|link| {
                    link.property_link
                        .iter()
                        .any(|p| p.contains_weak_object_reference())
                })
                .unwrap_or(false),
            _ => false,
        }
    }

    pub fn contains_instanced_object_property(&self) -> bool {
        self.has_any_property_flags(
            EPropertyFlags::CPF_ContainsInstancedReference | EPropertyFlags::CPF_InstancedReference,
        )
    }

    /// Whether duplicating an owning object copies this value.
    pub fn should_duplicate_value(&self) -> bool {
        self.should_port(EPropertyPortFlags::PPF_Copy) && self.get_owner_class().is_some()
    }

    /// Whether both properties store the same type of value.
    pub fn same_type(&self, other: &UProperty) -> bool {
        fn same_class(a: &Weak<UClass>, b: &Weak<UClass>) -> bool {
            Weak::ptr_eq(a, b)
        }
        match (&self.kind, &other.kind) {
            (PropertyKind::Byte(a), PropertyKind::Byte(b)) => match (a, b) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            },
            (PropertyKind::Object(a), PropertyKind::Object(b))
            | (PropertyKind::WeakObject(a), PropertyKind::WeakObject(b))
            | (PropertyKind::LazyObject(a), PropertyKind::LazyObject(b))
            | (PropertyKind::Asset(a), PropertyKind::Asset(b))
            | (PropertyKind::Interface(a), PropertyKind::Interface(b)) => same_class(a, b),
            (PropertyKind::Class { meta_class: a }, PropertyKind::Class { meta_class: b })
            | (
                PropertyKind::AssetClass { meta_class: a },
                PropertyKind::AssetClass { meta_class: b },
            ) => same_class(a, b),
            (PropertyKind::Array(a), PropertyKind::Array(b)) => a.same_type(b),
            (PropertyKind::Struct(a), PropertyKind::Struct(b)) => Arc::ptr_eq(a, b),
            (PropertyKind::Bool(a), PropertyKind::Bool(b)) => {
                a.is_native_bool() == b.is_native_bool()
            }
            (a, b) => a.property_type() == b.property_type(),
        }
    }

    // policy

    /// Whether the property takes part in text import/export with `port_flags`.
    pub fn should_port(&self, port_flags: EPropertyPortFlags) -> bool {
        use EPropertyFlags as C;
        use EPropertyPortFlags as P;
        if self.get_size() <= 0 {
            return false;
        }
        if self.has_any_property_flags(C::CPF_Deprecated)
            && !port_flags.intersects(P::PPF_ParsingDefaultProperties | P::PPF_UseDeprecatedProperties)
        {
            return false;
        }
        let include_transient =
            port_flags.intersects(P::PPF_ParsingDefaultProperties | P::PPF_IncludeTransient);
        if self.has_any_property_flags(C::CPF_Transient) && !include_transient {
            return false;
        }
        let transient_like = if port_flags.contains(P::PPF_Copy) {
            C::CPF_DuplicateTransient | C::CPF_TextExportTransient
        } else {
            C::CPF_TextExportTransient
        };
        if self.has_any_property_flags(transient_like) && !include_transient {
            return false;
        }
        if port_flags.contains(P::PPF_SubobjectsOnly) && !self.contains_instanced_object_property() {
            return false;
        }
        if port_flags.contains(P::PPF_PropertyWindow) && !self.has_any_property_flags(C::CPF_Edit) {
            return false;
        }
        true
    }

    /// Whether the property is written to or read from `ar`.
    pub fn should_serialize_value(&self, ar: &dyn Archive) -> bool {
        use EPropertyFlags as C;
        use EPropertyPortFlags as P;
        let port_flags = ar.port_flags();
        let skip = (self.has_any_property_flags(C::CPF_Transient) && ar.is_persistent())
            || (self.has_any_property_flags(C::CPF_DuplicateTransient)
                && port_flags.contains(P::PPF_Duplicate))
            || (self.has_any_property_flags(C::CPF_NonPIEDuplicateTransient)
                && port_flags.contains(P::PPF_Duplicate)
                && !port_flags.contains(P::PPF_DuplicateForPIE))
            || (self.has_any_property_flags(C::CPF_NonTransactional) && ar.is_transacting())
            || (self.has_any_property_flags(C::CPF_Deprecated)
                && !port_flags.contains(P::PPF_UseDeprecatedProperties)
                && (ar.is_saving() || ar.is_transacting() || ar.want_binary_property_serialization()))
            || (self.is_editor_only_property() && ar.is_filter_editor_only());
        !skip
    }

    pub fn validate_import_flags(
        &self,
        port_flags: EPropertyPortFlags,
        error_text: &mut dyn FOutputDevice,
    ) -> Result<()> {
        if port_flags.contains(EPropertyPortFlags::PPF_RestrictImportTypes)
            && self.has_any_property_flags(EPropertyFlags::CPF_Config)
        {
            let message = format!(
                "Import failed for '{}': property is config (Check to see if the property is listed in the DefaultProperties.  It should only be listed in the specific .ini file)",
                self.name
            );
            error_text.log(&message);
            return Err(PropertyError::Import {
                property: self.name,
                message,
            });
        }
        Ok(())
    }

    // text

    /// Appends the text form of a single element to `out`.
    ///
    /// # Safety
    /// `value` and `default` must address initialized values of this property.
    pub unsafe fn export_text_item(
        &self,
        out: &mut String,
        value: *const u8,
        default: Option<*const u8>,
        port_flags: EPropertyPortFlags,
        objects: &FUObjectArray,
    ) {
        match &self.kind {
            kind if kind.is_numeric() => self.export_numeric_text(out, value, port_flags),
            PropertyKind::Bool(b) => b.export_text(out, value, port_flags),
            PropertyKind::Name | PropertyKind::Str => {
                self.export_string_text(out, value, port_flags)
            }
            PropertyKind::Array(inner) => {
                array::export_array_text(inner, out, value, default, port_flags, objects)
            }
            PropertyKind::Struct(ustruct) => {
                ustruct.export_text(out, value, default, port_flags, objects)
            }
            PropertyKind::Delegate(_) | PropertyKind::MulticastDelegate(_) => {
                self.export_delegate_text(out, value, objects)
            }
            _ => self.export_object_text(out, value, port_flags, objects),
        }
    }

    /// Exports the value unless it equals `delta`. Returns whether anything was written.
    ///
    /// # Safety
    /// `data` and `delta` must address initialized values of this property.
    pub unsafe fn export_text_direct(
        &self,
        out: &mut String,
        data: *const u8,
        delta: Option<*const u8>,
        port_flags: EPropertyPortFlags,
        objects: &FUObjectArray,
    ) -> bool {
        if delta == Some(data) || !self.identical(data, delta, port_flags) {
            self.export_text_item(out, data, delta, port_flags, objects);
            true
        } else {
            false
        }
    }

    /// # Safety
    /// The containers must hold initialized values of this property.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn export_text_in_container(
        &self,
        array_index: i32,
        out: &mut String,
        container: *const u8,
        defaults_container: Option<*const u8>,
        defaults_struct: Option<&UStruct>,
        port_flags: EPropertyPortFlags,
        objects: &FUObjectArray,
    ) -> bool {
        self.export_text_direct(
            out,
            self.container_ptr_to_value_ptr(container, array_index),
            self.container_ptr_to_value_ptr_for_defaults(
                defaults_struct,
                defaults_container,
                array_index,
            ),
            port_flags,
            objects,
        )
    }

    /// Parses a single element from the start of `buffer` into `data`, returning the
    /// rest of the buffer. Failures are also written to `error_text`.
    ///
    /// # Safety
    /// `data` must address an initialized value of this property.
    pub unsafe fn import_text<'a>(
        &self,
        buffer: &'a str,
        data: *mut u8,
        port_flags: EPropertyPortFlags,
        objects: &FUObjectArray,
        error_text: &mut dyn FOutputDevice,
    ) -> Result<&'a str> {
        self.validate_import_flags(port_flags, error_text)?;
        let result = match &self.kind {
            kind if kind.is_numeric() => self.import_numeric_text(buffer, data),
            PropertyKind::Bool(b) => b.import_text(buffer, data),
            PropertyKind::Name | PropertyKind::Str => {
                self.import_string_text(buffer, data, port_flags)
            }
            PropertyKind::Array(inner) => {
                array::import_array_text(inner, buffer, data, port_flags, objects, error_text)
            }
            PropertyKind::Struct(ustruct) => {
                ustruct.import_text(buffer, data, port_flags, objects, error_text)
            }
            PropertyKind::Delegate(_) => self.import_delegate_text(buffer, data, objects),
            PropertyKind::MulticastDelegate(_) => {
                self.import_multicast_text(buffer, data, objects)
            }
            _ => self.import_object_text(buffer, data, port_flags, objects),
        };
        result.map_err(|err| {
            let message = match err {
                PropertyError::Msg(message) => message.into_owned(),
                PropertyError::Import { message, .. } => message,
                other => other.to_string(),
            };
            error_text.log(&message);
            PropertyError::Import {
                property: self.name,
                message,
            }
        })
    }

    // binary

    /// Serializes a single element.
    ///
    /// # Safety
    /// `value` must address an initialized value of this property.
    pub unsafe fn serialize_item(
        &self,
        ar: &mut dyn Archive,
        value: *mut u8,
        defaults: Option<*const u8>,
    ) -> Result<()> {
        match_fundamentals!(&self.kind, F => F::serialize_item(ar, value),
            PropertyKind::Bool(b) => b.serialize_item(ar, value),
            PropertyKind::Array(inner) => array::serialize_array(inner, ar, value),
            PropertyKind::Struct(ustruct) => script_struct::serialize_struct_item(ustruct, ar, value, defaults),
        )
    }

    /// Serializes every element of the property inside `data`.
    ///
    /// # Safety
    /// `data` must be a container holding initialized values of this property.
    pub unsafe fn serialize_bin_property(&self, ar: &mut dyn Archive, data: *mut u8) -> Result<()> {
        if self.should_serialize_value(ar) {
            for index in 0..self.array_dim {
                self.serialize_item(ar, self.container_ptr_to_value_ptr(data, index), None)?;
            }
        }
        Ok(())
    }

    /// Like [`UProperty::serialize_bin_property`] but skips elements identical to the
    /// defaults, unless the archive wants every property in binary form.
    ///
    /// # Safety
    /// The containers must hold initialized values of this property.
    pub unsafe fn serialize_non_matching_bin_property(
        &self,
        ar: &mut dyn Archive,
        data: *mut u8,
        default_data: Option<*const u8>,
        default_struct: Option<&UStruct>,
    ) -> Result<()> {
        if !self.should_serialize_value(ar) {
            return Ok(());
        }
        for index in 0..self.array_dim {
            let target = self.container_ptr_to_value_ptr(data, index);
            let default =
                self.container_ptr_to_value_ptr_for_defaults(default_struct, default_data, index);
            if ar.want_binary_property_serialization()
                || !self.identical(target, default, ar.port_flags())
            {
                self.serialize_item(ar, target, default)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{MemoryReader, MemoryWriter};
    use crate::containers::FString;
    use crate::fundamentals::TypeFundamentals;
    use crate::object::FUObjectArray;
    use crate::text::FStringOutputDevice;
    use crate::ustruct::StructBuilder;
    use crate::EObjectFlags;

    fn actor_class() -> Arc<UClass> {
        StructBuilder::class("PropTestActor")
            .property(UProperty::int("Health").with_flags(EPropertyFlags::CPF_Edit))
            .property(UProperty::str("Label"))
            .property(UProperty::float("Speed").with_array_dim(3))
            .property(UProperty::bitfield("bHidden"))
            .property(UProperty::bitfield("bActive"))
            .property(UProperty::fname("Tag").with_flags(EPropertyFlags::CPF_Transient))
            .build()
            .unwrap()
    }

    #[test]
    fn test_link_layout_and_flags() {
        use EPropertyFlags as C;
        let class = actor_class();
        let health = class.find_property(FName::new("Health")).unwrap();
        assert_eq!(health.element_size(), 4);
        assert_eq!(health.get_id(), FName::new("IntProperty"));
        assert!(health.has_all_property_flags(
            C::CPF_IsPlainOldData | C::CPF_NoDestructor | C::CPF_ZeroConstructor | C::CPF_Edit
        ));
        assert_eq!(
            health.get_offset_for_debug(),
            align(size_of::<UObject>() as i32, 4)
        );

        let label = class.find_property(FName::new("Label")).unwrap();
        assert!(!label.has_any_property_flags(C::CPF_IsPlainOldData));
        assert!(label.has_any_property_flags(C::CPF_ZeroConstructor));
        assert_eq!(label.get_offset_for_debug() % 8, 0);

        let speed = class.find_property(FName::new("Speed")).unwrap();
        assert_eq!(speed.get_size(), 12);
        assert!(class.properties_size() >= speed.get_offset_for_debug() + 12);
        assert!(speed.is_a(EClassCastFlags::CASTCLASS_UNumericProperty));
        assert!(!speed.is_a(EClassCastFlags::CASTCLASS_UIntProperty));

        // consecutive bitfields share a byte
        let hidden = class.find_property(FName::new("bHidden")).unwrap();
        let active = class.find_property(FName::new("bActive")).unwrap();
        assert_eq!(hidden.get_offset_for_debug(), active.get_offset_for_debug());
        assert!(hidden.has_any_property_flags(C::CPF_NoDestructor));
        assert!(!hidden.has_any_property_flags(C::CPF_IsPlainOldData | C::CPF_ZeroConstructor));

        assert!(health.has_any_property_flags(C::CPF_AllFlags));
        assert!(!health.has_any_property_flags(C::CPF_Transient));
    }

    #[test]
    fn test_container_pointers() {
        let class = actor_class();
        let speed = class.find_property(FName::new("Speed")).unwrap();
        let base = 0x1000 as *const u8;
        let second = speed.container_ptr_to_value_ptr(base, 1);
        assert_eq!(
            second as usize,
            0x1000 + speed.get_offset_for_debug() as usize + 4
        );
        assert_eq!(
            speed.container_ptr_to_value_ptr_for_defaults(Some(&*class), Some(base), 2),
            Some(speed.container_ptr_to_value_ptr(base, 2).cast_const())
        );
        assert_eq!(
            speed.container_ptr_to_value_ptr_for_defaults(Some(&*class), None, 0),
            None
        );
        let small = StructBuilder::script_struct("PropTestSmall")
            .property(UProperty::byte("B"))
            .build()
            .unwrap();
        assert_eq!(
            speed.container_ptr_to_value_ptr_for_defaults(Some(&*small), Some(base), 0),
            None
        );
    }

    #[test]
    #[should_panic]
    fn test_container_pointer_index_checked() {
        let class = actor_class();
        let speed = class.find_property(FName::new("Speed")).unwrap();
        speed.container_ptr_to_value_ptr(0x1000 as *const u8, 3);
    }

    #[test]
    fn test_object_value_pointer_checks_class() {
        let actor = actor_class();
        let other = StructBuilder::class("PropTestOther")
            .property(UProperty::int("Count"))
            .build()
            .unwrap();
        let mut objects = FUObjectArray::new();
        let object = objects
            .new_object(&other, None, FName::default(), EObjectFlags::RF_NoFlags)
            .unwrap();
        let health = actor.find_property(FName::new("Health")).unwrap();
        let result = unsafe { health.object_ptr_to_value_ptr(object, 0) };
        assert!(matches!(result, Err(PropertyError::ClassMismatch { .. })));
        let count = other.find_property(FName::new("Count")).unwrap();
        assert!(unsafe { count.object_ptr_to_value_ptr(object, 0) }.is_ok());
    }

    #[test]
    fn test_copy_clear_identical() {
        let class = actor_class();
        let mut objects = FUObjectArray::new();
        let a = objects
            .new_object(&class, None, FName::new("A"), EObjectFlags::RF_NoFlags)
            .unwrap();
        let b = objects
            .new_object(&class, None, FName::new("B"), EObjectFlags::RF_NoFlags)
            .unwrap();
        let label = class.find_property(FName::new("Label")).unwrap();
        let health = class.find_property(FName::new("Health")).unwrap();
        let none = EPropertyPortFlags::PPF_None;
        unsafe {
            let a_label = label.object_ptr_to_value_ptr(a, 0).unwrap();
            let b_label = label.object_ptr_to_value_ptr(b, 0).unwrap();
            TypeFundamentals::<FString>::set_property_value(a_label, "hello".into());
            assert!(!label.identical(a_label, Some(b_label), none));
            label.copy_single_value(b_label, a_label);
            assert!(label.identical(a_label, Some(b_label), none));
            assert_eq!(
                TypeFundamentals::<FString>::get_property_value(b_label).to_string(),
                "hello"
            );
            label.clear_value(a_label);
            assert!(label.identical(a_label, None, none));

            let a_health = health.object_ptr_to_value_ptr(a, 0).unwrap();
            TypeFundamentals::<i32>::set_property_value(a_health, 7);
            health.copy_complete_value_in_container(
                b.as_ref().as_container(),
                a.as_ref().as_container(),
            );
            assert!(health.identical_in_container(
                a.as_ref().as_container(),
                Some(b.as_ref().as_container()),
                0,
                none
            ));
        }
    }

    #[test]
    fn test_should_port() {
        use EPropertyFlags as C;
        use EPropertyPortFlags as P;
        let class = actor_class();
        let tag = class.find_property(FName::new("Tag")).unwrap();
        let health = class.find_property(FName::new("Health")).unwrap();
        let label = class.find_property(FName::new("Label")).unwrap();
        assert!(!tag.should_port(P::PPF_None));
        assert!(tag.should_port(P::PPF_IncludeTransient));
        assert!(health.should_port(P::PPF_PropertyWindow));
        assert!(!label.should_port(P::PPF_PropertyWindow));
        assert!(!health.should_port(P::PPF_SubobjectsOnly));
        assert!(health.should_duplicate_value());

        let mut deprecated = UProperty::int("Old").with_flags(C::CPF_Deprecated);
        deprecated.link(&Weak::new()).unwrap();
        assert!(!deprecated.should_port(P::PPF_None));
        assert!(deprecated.should_port(P::PPF_UseDeprecatedProperties));
        let mut dup = UProperty::int("Dup").with_flags(C::CPF_DuplicateTransient);
        dup.link(&Weak::new()).unwrap();
        assert!(dup.should_port(P::PPF_None));
        assert!(!dup.should_port(P::PPF_Copy));

        let unlinked = UProperty::int("Unlinked");
        assert!(!unlinked.should_port(P::PPF_None));
    }

    #[test]
    fn test_should_serialize_value() {
        use EPropertyFlags as C;
        let mut transient = UProperty::int("T").with_flags(C::CPF_Transient);
        transient.link(&Weak::new()).unwrap();
        assert!(!transient.should_serialize_value(&MemoryWriter::new()));
        assert!(transient.should_serialize_value(&MemoryWriter::new().transient()));

        let mut editor = UProperty::int("E").with_flags(C::CPF_EditorOnly);
        editor.link(&Weak::new()).unwrap();
        assert!(editor.should_serialize_value(&MemoryWriter::new()));
        assert!(!editor.should_serialize_value(&MemoryWriter::new().filter_editor_only()));

        let mut deprecated = UProperty::int("D").with_flags(C::CPF_Deprecated);
        deprecated.link(&Weak::new()).unwrap();
        assert!(!deprecated.should_serialize_value(&MemoryWriter::new()));
        assert!(deprecated.should_serialize_value(&MemoryReader::new(&[])));

        let mut non_transactional = UProperty::int("N").with_flags(C::CPF_NonTransactional);
        non_transactional.link(&Weak::new()).unwrap();
        assert!(!non_transactional.should_serialize_value(&MemoryWriter::new().transacting()));
    }

    #[test]
    fn test_validate_import_flags() {
        let mut config = UProperty::int("Config").with_flags(EPropertyFlags::CPF_Config);
        config.link(&Weak::new()).unwrap();
        let objects = FUObjectArray::new();
        let mut errors = FStringOutputDevice::new();
        let mut value = 0i32;
        let data = ptr::addr_of_mut!(value).cast::<u8>();
        let result = unsafe {
            config.import_text(
                "5",
                data,
                EPropertyPortFlags::PPF_RestrictImportTypes,
                &objects,
                &mut errors,
            )
        };
        assert!(matches!(result, Err(PropertyError::Import { .. })));
        assert!(errors.as_str().contains("property is config"));
        assert_eq!(value, 0);
        assert_eq!(
            unsafe { config.import_text("5", data, EPropertyPortFlags::PPF_None, &objects, &mut errors) }
                .unwrap(),
            ""
        );
        assert_eq!(value, 5);
    }

    #[test]
    fn test_contains_references_and_same_type() {
        let target = StructBuilder::class("PropTestTarget").build().unwrap();
        let holder = StructBuilder::script_struct("PropTestHolder")
            .property(UProperty::object("Ref", Some(&target)))
            .build()
            .unwrap();
        let weak_holder = StructBuilder::script_struct("PropTestWeakHolder")
            .property(UProperty::weak_object("Ref", Some(&target)))
            .build()
            .unwrap();

        let by_struct = UProperty::script_struct("S", &holder);
        assert!(by_struct.contains_object_reference());
        let by_weak = UProperty::script_struct("W", &weak_holder);
        assert!(!by_weak.contains_object_reference());
        assert!(by_weak.contains_weak_object_reference());
        let array = UProperty::array("A", UProperty::object("Inner", Some(&target)));
        assert!(array.contains_object_reference());
        assert!(UProperty::class("C", Some(&target)).contains_object_reference());
        assert!(!UProperty::str("S").contains_object_reference());

        assert!(UProperty::int("A").same_type(&UProperty::int("B")));
        assert!(!UProperty::int("A").same_type(&UProperty::uint32("B")));
        assert!(array.same_type(&UProperty::array("B", UProperty::object("X", Some(&target)))));
        assert!(!array.same_type(&UProperty::array("B", UProperty::object("X", None))));
        assert!(!UProperty::bool("A").same_type(&UProperty::bitfield("B")));
    }
}
