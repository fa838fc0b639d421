//! Per value-type operations shared by every property kind storing that type.

use std::marker::PhantomData;
use std::mem::{align_of, size_of};
use std::ptr;

use crate::archive::Archive;
use crate::containers::FString;
use crate::error::Result;
use crate::flags::EPropertyFlags;
use crate::name::FName;
use crate::object::{
    ClassPtr, FAssetPtr, FLazyObjectPtr, FMulticastScriptDelegate, FScriptDelegate,
    FScriptInterface, FWeakObjectPtr, ObjectPtr,
};

/// A Rust type that can be stored in property memory.
///
/// `ZERO_CONSTRUCT` types must be valid when every byte is zero, `IS_POD` types
/// must be copyable with `memcpy` and need no drop.
pub trait PropertyType: Default + Clone + PartialEq + 'static {
    const CPP_TYPE: &'static str;
    const IS_POD: bool = false;
    const ZERO_CONSTRUCT: bool = true;

    fn serialize_value(value: &mut Self, ar: &mut dyn Archive) -> Result<()>;
}

macro_rules! impl_pod_type {
    ($ty:ty, $cpp:literal, $serialize:ident) => {
        impl PropertyType for $ty {
            const CPP_TYPE: &'static str = $cpp;
            const IS_POD: bool = true;
            fn serialize_value(value: &mut Self, ar: &mut dyn Archive) -> Result<()> {
                ar.$serialize(value)
            }
        }
    };
}
impl_pod_type!(i8, "int8", serialize_i8);
impl_pod_type!(i16, "int16", serialize_i16);
impl_pod_type!(i32, "int32", serialize_i32);
impl_pod_type!(i64, "int64", serialize_i64);
impl_pod_type!(u8, "uint8", serialize_u8);
impl_pod_type!(u16, "uint16", serialize_u16);
impl_pod_type!(u32, "uint32", serialize_u32);
impl_pod_type!(u64, "uint64", serialize_u64);
impl_pod_type!(f32, "float", serialize_f32);
impl_pod_type!(f64, "double", serialize_f64);
impl_pod_type!(FName, "FName", serialize_name);
impl_pod_type!(ObjectPtr, "UObject*", serialize_object);

impl PropertyType for bool {
    const CPP_TYPE: &'static str = "bool";
    const IS_POD: bool = true;
    fn serialize_value(value: &mut Self, ar: &mut dyn Archive) -> Result<()> {
        let mut byte = u8::from(*value);
        ar.serialize_u8(&mut byte)?;
        *value = byte != 0;
        Ok(())
    }
}

impl PropertyType for FString {
    const CPP_TYPE: &'static str = "FString";
    fn serialize_value(value: &mut Self, ar: &mut dyn Archive) -> Result<()> {
        ar.serialize_string(value)
    }
}

impl PropertyType for ClassPtr {
    const CPP_TYPE: &'static str = "UClass*";
    const ZERO_CONSTRUCT: bool = false;
    fn serialize_value(value: &mut Self, ar: &mut dyn Archive) -> Result<()> {
        let mut name = value
            .as_ref()
            .map(|class| class.get_fname())
            .unwrap_or_default();
        ar.serialize_name(&mut name)?;
        if ar.is_loading() {
            *value = if name.is_none() {
                None
            } else {
                let found = ar.objects().and_then(|objects| objects.find_struct(name));
                if found.is_none() {
                    tracing::warn!("Failed to resolve class reference '{name}'");
                }
                found
            };
        }
        Ok(())
    }
}

impl PropertyType for FWeakObjectPtr {
    const CPP_TYPE: &'static str = "FWeakObjectPtr";
    fn serialize_value(value: &mut Self, ar: &mut dyn Archive) -> Result<()> {
        let mut object = ar.objects().and_then(|objects| value.get(objects));
        ar.serialize_object(&mut object)?;
        if ar.is_loading() {
            *value = match ar.objects() {
                Some(objects) => FWeakObjectPtr::new(object, objects),
                None => FWeakObjectPtr::default(),
            };
        }
        Ok(())
    }
}

impl PropertyType for FLazyObjectPtr {
    const CPP_TYPE: &'static str = "FLazyObjectPtr";
    fn serialize_value(value: &mut Self, ar: &mut dyn Archive) -> Result<()> {
        if ar.is_saving() {
            if let Some(objects) = ar.objects() {
                value.refresh_guid(objects);
            }
        }
        value.guid.serialize(ar)?;
        if ar.is_loading() {
            value.weak = FWeakObjectPtr::default();
        }
        Ok(())
    }
}

impl PropertyType for FAssetPtr {
    const CPP_TYPE: &'static str = "FAssetPtr";
    fn serialize_value(value: &mut Self, ar: &mut dyn Archive) -> Result<()> {
        if ar.is_saving() {
            if let Some(objects) = ar.objects() {
                value.refresh_path(objects);
            }
        }
        ar.serialize_string(&mut value.asset_path)?;
        if ar.is_loading() {
            value.weak = FWeakObjectPtr::default();
        }
        Ok(())
    }
}

impl PropertyType for FScriptInterface {
    const CPP_TYPE: &'static str = "FScriptInterface";
    const IS_POD: bool = true;
    fn serialize_value(value: &mut Self, ar: &mut dyn Archive) -> Result<()> {
        ar.serialize_object(&mut value.object)?;
        if ar.is_loading() {
            value.interface = value.object.map(|object| object.cast());
        }
        Ok(())
    }
}

impl PropertyType for FScriptDelegate {
    const CPP_TYPE: &'static str = "FScriptDelegate";
    fn serialize_value(value: &mut Self, ar: &mut dyn Archive) -> Result<()> {
        FWeakObjectPtr::serialize_value(&mut value.object, ar)?;
        ar.serialize_name(&mut value.function_name)
    }
}

impl PropertyType for FMulticastScriptDelegate {
    const CPP_TYPE: &'static str = "FMulticastScriptDelegate";
    fn serialize_value(value: &mut Self, ar: &mut dyn Archive) -> Result<()> {
        let mut count = value.invocation_list.len() as i32;
        ar.serialize_i32(&mut count)?;
        if ar.is_loading() {
            if count < 0 || i64::from(count) > ar.total_size() - ar.tell() {
                return Err(crate::error::PropertyError::Archive(
                    format!("invalid delegate count {count}").into(),
                ));
            }
            value.invocation_list.clear();
            for _ in 0..count {
                let mut delegate = FScriptDelegate::default();
                FScriptDelegate::serialize_value(&mut delegate, ar)?;
                value.invocation_list.push(delegate);
            }
        } else {
            for delegate in value.invocation_list.as_mut_slice() {
                FScriptDelegate::serialize_value(delegate, ar)?;
            }
        }
        Ok(())
    }
}

/// Raw memory operations for values of type `T`.
pub struct TypeFundamentals<T>(PhantomData<T>);

impl<T: PropertyType> TypeFundamentals<T> {
    pub const CPP_SIZE: i32 = size_of::<T>() as i32;
    pub const CPP_ALIGNMENT: i32 = align_of::<T>() as i32;

    pub fn get_type_name() -> &'static str {
        T::CPP_TYPE
    }

    pub fn computed_flags() -> EPropertyFlags {
        let mut flags = EPropertyFlags::CPF_None;
        if T::IS_POD {
            flags |= EPropertyFlags::CPF_IsPlainOldData | EPropertyFlags::CPF_NoDestructor;
        }
        if T::ZERO_CONSTRUCT {
            flags |= EPropertyFlags::CPF_ZeroConstructor;
        }
        flags
    }

    pub unsafe fn get_property_value_ptr(a: *mut u8) -> *mut T {
        a.cast()
    }

    pub unsafe fn get_property_value_ref<'a>(a: *const u8) -> &'a T {
        &*a.cast::<T>()
    }

    pub unsafe fn get_property_value(a: *const u8) -> T {
        (*a.cast::<T>()).clone()
    }

    /// Value at `b`, or the default value when there is none.
    pub unsafe fn get_optional_property_value(b: Option<*const u8>) -> T {
        match b {
            Some(b) => Self::get_property_value(b),
            None => Self::get_default_property_value(),
        }
    }

    pub unsafe fn set_property_value(a: *mut u8, value: T) {
        *a.cast::<T>() = value;
    }

    pub fn get_default_property_value() -> T {
        T::default()
    }

    /// Writes `count` default values into uninitialized memory.
    pub unsafe fn initialize_value(dest: *mut u8, count: i32) {
        let dest = dest.cast::<T>();
        for i in 0..count as usize {
            dest.add(i).write(T::default());
        }
    }

    pub unsafe fn destroy_value(dest: *mut u8, count: i32) {
        ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
            dest.cast::<T>(),
            count as usize,
        ));
    }

    pub unsafe fn copy_values(dest: *mut u8, src: *const u8, count: i32) {
        let (dest, src) = (dest.cast::<T>(), src.cast::<T>());
        for i in 0..count as usize {
            (*dest.add(i)).clone_from(&*src.add(i));
        }
    }

    pub unsafe fn clear_value(dest: *mut u8) {
        *dest.cast::<T>() = T::default();
    }

    pub unsafe fn identical(a: *const u8, b: Option<*const u8>) -> bool {
        let a = &*a.cast::<T>();
        match b {
            Some(b) => *a == *b.cast::<T>(),
            None => *a == T::default(),
        }
    }

    pub unsafe fn serialize_item(ar: &mut dyn Archive, value: *mut u8) -> Result<()> {
        T::serialize_value(&mut *value.cast::<T>(), ar)
    }
}

/// Conversions shared by the numeric property kinds.
pub trait NumericType: PropertyType + Copy + PartialOrd {
    const IS_FLOAT: bool;

    fn from_i64(value: i64) -> Self;
    fn from_u64(value: u64) -> Self;
    fn from_f64(value: f64) -> Self;
    fn to_i64(self) -> i64;
    fn to_u64(self) -> u64;
    fn to_f64(self) -> f64;

    /// Whether `value` survives a round trip through this type.
    fn can_hold_i64(value: i64) -> bool {
        Self::from_i64(value).to_i64() == value && (value < 0) == (Self::from_i64(value).to_f64() < 0.0)
    }
    fn can_hold_u64(value: u64) -> bool {
        Self::from_u64(value).to_u64() == value && Self::from_u64(value).to_f64() >= 0.0
    }
    fn can_hold_f64(value: f64) -> bool {
        Self::from_f64(value).to_f64() == value
    }

    fn parse(text: &str) -> Option<Self>;
    fn format(self) -> String;
}

fn parse_integer(text: &str) -> Option<i128> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let value = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i128::from_str_radix(hex, 16).ok()?
    } else if let Ok(value) = digits.parse::<i128>() {
        value
    } else {
        digits
            .trim_end_matches(['f', 'F'])
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())? as i128
    };
    if negative {
        value.checked_neg()
    } else {
        Some(value)
    }
}

macro_rules! impl_integer {
    ($($ty:ty),*) => {$(
        impl NumericType for $ty {
            const IS_FLOAT: bool = false;
            fn from_i64(value: i64) -> Self {
                value as $ty
            }
            fn from_u64(value: u64) -> Self {
                value as $ty
            }
            fn from_f64(value: f64) -> Self {
                value as $ty
            }
            fn to_i64(self) -> i64 {
                self as i64
            }
            fn to_u64(self) -> u64 {
                self as u64
            }
            fn to_f64(self) -> f64 {
                self as f64
            }
            fn parse(text: &str) -> Option<Self> {
                let value = parse_integer(text)?;
                // out of range values wrap like a C cast
                Some(value as $ty)
            }
            fn format(self) -> String {
                self.to_string()
            }
        }
    )*};
}
impl_integer!(i8, i16, i32, i64, u8, u16, u32, u64);

macro_rules! impl_float {
    ($($ty:ty),*) => {$(
        impl NumericType for $ty {
            const IS_FLOAT: bool = true;
            fn from_i64(value: i64) -> Self {
                value as $ty
            }
            fn from_u64(value: u64) -> Self {
                value as $ty
            }
            fn from_f64(value: f64) -> Self {
                value as $ty
            }
            fn to_i64(self) -> i64 {
                self as i64
            }
            fn to_u64(self) -> u64 {
                self as u64
            }
            fn to_f64(self) -> f64 {
                self as f64
            }
            fn can_hold_i64(value: i64) -> bool {
                (value as $ty) as i64 == value
            }
            fn can_hold_u64(value: u64) -> bool {
                (value as $ty) as u64 == value
            }
            fn parse(text: &str) -> Option<Self> {
                let text = text.trim().trim_end_matches(['f', 'F']);
                text.parse::<$ty>()
                    .ok()
                    .or_else(|| parse_integer(text).map(|v| v as $ty))
            }
            fn format(self) -> String {
                format!("{:.6}", self)
            }
        }
    )*};
}
impl_float!(f32, f64);
