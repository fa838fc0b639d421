//! Typed iteration over the fields of a struct and its supers.

#![allow(non_upper_case_globals)]

use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{PropertyError, Result};
use crate::flags::{EClassCastFlags, EPropertyFlags};
use crate::name::FName;
use crate::properties::{BoolProperty, UProperty};
use crate::ustruct::{UEnum, UField, UStruct};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EFieldIteratorFlags: u8 {
        const IncludeSuper = 0x01;
        const IncludeDeprecated = 0x02;
        const IncludeInterfaces = 0x04;
    }
}

impl EFieldIteratorFlags {
    pub const ExcludeSuper: Self = Self::empty();
    pub const ExcludeDeprecated: Self = Self::empty();
    pub const ExcludeInterfaces: Self = Self::empty();
}

impl Default for EFieldIteratorFlags {
    fn default() -> Self {
        Self::IncludeSuper | Self::IncludeDeprecated
    }
}

/// A kind of field that can be picked out of a struct's children.
pub trait FieldClass {
    type Item: 'static;
    const NAME: &'static str;

    fn cast(field: &UField) -> Option<&Arc<Self::Item>>;
}

/// A property class, identified by its cast flags.
pub trait PropertyClass: FieldClass<Item = UProperty> {
    const CAST_FLAGS: EClassCastFlags;
}

impl FieldClass for UStruct {
    type Item = UStruct;
    const NAME: &'static str = "Function";

    fn cast(field: &UField) -> Option<&Arc<UStruct>> {
        field.as_function()
    }
}

impl FieldClass for UEnum {
    type Item = UEnum;
    const NAME: &'static str = "Enum";

    fn cast(field: &UField) -> Option<&Arc<UEnum>> {
        field.as_enum()
    }
}

macro_rules! property_class {
    ($ty:ty, $name:literal, $flags:ident) => {
        impl FieldClass for $ty {
            type Item = UProperty;
            const NAME: &'static str = $name;

            fn cast(field: &UField) -> Option<&Arc<UProperty>> {
                field
                    .as_property()
                    .filter(|property| property.is_a(EClassCastFlags::$flags))
            }
        }

        impl PropertyClass for $ty {
            const CAST_FLAGS: EClassCastFlags = EClassCastFlags::$flags;
        }
    };
    ($($marker:ident => $name:literal, $flags:ident;)*) => {
        $(
            #[derive(Debug, Clone, Copy)]
            pub struct $marker;
            property_class!($marker, $name, $flags);
        )*
    };
}

property_class!(UProperty, "Property", CASTCLASS_UProperty);
property_class!(BoolProperty, "BoolProperty", CASTCLASS_UBoolProperty);
property_class! {
    UNumericProperty => "NumericProperty", CASTCLASS_UNumericProperty;
    UByteProperty => "ByteProperty", CASTCLASS_UByteProperty;
    UIntProperty => "IntProperty", CASTCLASS_UIntProperty;
    UFloatProperty => "FloatProperty", CASTCLASS_UFloatProperty;
    UObjectPropertyBase => "ObjectPropertyBase", CASTCLASS_UObjectPropertyBase;
    UObjectProperty => "ObjectProperty", CASTCLASS_UObjectProperty;
    UClassProperty => "ClassProperty", CASTCLASS_UClassProperty;
    UInterfaceProperty => "InterfaceProperty", CASTCLASS_UInterfaceProperty;
    UNameProperty => "NameProperty", CASTCLASS_UNameProperty;
    UStrProperty => "StrProperty", CASTCLASS_UStrProperty;
    UArrayProperty => "ArrayProperty", CASTCLASS_UArrayProperty;
    UStructProperty => "StructProperty", CASTCLASS_UStructProperty;
    UDelegateProperty => "DelegateProperty", CASTCLASS_UDelegateProperty;
    UMulticastDelegateProperty => "MulticastDelegateProperty", CASTCLASS_UMulticastDelegateProperty;
}

/// Fields of type `T` of a struct, then of its implemented interfaces and supers as
/// selected by the flags.
pub struct TFieldIterator<'a, T: FieldClass> {
    scopes: Vec<&'a UStruct>,
    scope: usize,
    child: usize,
    include_deprecated: bool,
    _marker: PhantomData<T>,
}

impl<'a, T: FieldClass> TFieldIterator<'a, T> {
    pub fn new(owner: &'a UStruct, flags: EFieldIteratorFlags) -> Self {
        let mut scopes = vec![];
        for ustruct in owner.super_chain() {
            scopes.push(ustruct);
            if flags.contains(EFieldIteratorFlags::IncludeInterfaces) {
                scopes.extend(ustruct.interfaces().iter().map(|i| &*i.class));
            }
            if !flags.contains(EFieldIteratorFlags::IncludeSuper) {
                break;
            }
        }
        Self {
            scopes,
            scope: 0,
            child: 0,
            include_deprecated: flags.contains(EFieldIteratorFlags::IncludeDeprecated),
            _marker: PhantomData,
        }
    }

    /// The struct whose children are currently iterated.
    pub fn get_struct(&self) -> Option<&'a UStruct> {
        self.scopes.get(self.scope).copied()
    }
}

impl<'a, T: FieldClass> Iterator for TFieldIterator<'a, T> {
    type Item = &'a Arc<T::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(scope) = self.scopes.get(self.scope).copied() {
            let children = scope.children();
            while let Some(field) = children.get(self.child) {
                self.child += 1;
                if !self.include_deprecated {
                    if let UField::Property(property) = field {
                        if property.has_any_property_flags(EPropertyFlags::CPF_Deprecated) {
                            continue;
                        }
                    }
                }
                if let Some(item) = T::cast(field) {
                    return Some(item);
                }
            }
            self.scope += 1;
            self.child = 0;
        }
        None
    }
}

/// Range form of [`TFieldIterator`] for `for` loops.
pub struct TFieldRange<'a, T: FieldClass> {
    owner: &'a UStruct,
    flags: EFieldIteratorFlags,
    _marker: PhantomData<T>,
}

impl<'a, T: FieldClass> TFieldRange<'a, T> {
    pub fn new(owner: &'a UStruct, flags: EFieldIteratorFlags) -> Self {
        Self {
            owner,
            flags,
            _marker: PhantomData,
        }
    }
}

impl<'a, T: FieldClass> IntoIterator for TFieldRange<'a, T> {
    type Item = &'a Arc<T::Item>;
    type IntoIter = TFieldIterator<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        TFieldIterator::new(self.owner, self.flags)
    }
}

/// Finds a field of type `T` by name in `owner` or its supers.
pub fn find_field<T: FieldClass>(owner: &UStruct, name: FName) -> Option<Arc<T::Item>> {
    owner.super_chain().find_map(|scope| {
        scope
            .children()
            .iter()
            .find(|field| field.get_fname() == name)
            .and_then(T::cast)
            .cloned()
    })
}

pub fn find_field_checked<T: FieldClass>(owner: &UStruct, name: FName) -> Result<Arc<T::Item>> {
    find_field::<T>(owner, name).ok_or_else(|| PropertyError::FieldNotFound {
        name: format!("{} '{name}'", T::NAME),
        scope: owner.get_fname().to_string(),
    })
}

/// `property` itself if it is a `T`, otherwise the inner property of an array of `T`.
pub fn smart_cast_property<T: PropertyClass>(property: &UProperty) -> Option<&UProperty> {
    if property.is_a(T::CAST_FLAGS) {
        return Some(property);
    }
    property.inner().filter(|inner| inner.is_a(T::CAST_FLAGS))
}
