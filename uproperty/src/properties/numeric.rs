use std::sync::Arc;

use crate::archive::{Archive, FPropertyTag};
use crate::containers::FString;
use crate::error::{bail_out, PropertyError, Result};
use crate::flags::EPropertyPortFlags;
use crate::fundamentals::{NumericType, TypeFundamentals};
use crate::name::{FName, NAME_NONE};
use crate::text::{numeric_literal_len, read_token};
use crate::ustruct::UEnum;

use super::{EPropertyType, PropertyKind, UProperty};

/// Binds `$n` to the value type of a numeric kind.
macro_rules! match_numeric {
    ($kind:expr, $n:ident => $body:expr, _ => $other:expr) => {
        match $kind {
            PropertyKind::Byte(_) => { type $n = u8; $body }
            PropertyKind::Int8 => { type $n = i8; $body }
            PropertyKind::Int16 => { type $n = i16; $body }
            PropertyKind::Int => { type $n = i32; $body }
            PropertyKind::Int64 => { type $n = i64; $body }
            PropertyKind::UInt16 => { type $n = u16; $body }
            PropertyKind::UInt32 => { type $n = u32; $body }
            PropertyKind::UInt64 => { type $n = u64; $body }
            PropertyKind::Float => { type $n = f32; $body }
            PropertyKind::Double => { type $n = f64; $body }
            _ => $other,
        }
    };
}

/// A numeric value independent of the property type holding it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericValue {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl NumericValue {
    fn of<N: NumericType>(value: N) -> Self {
        if N::IS_FLOAT {
            NumericValue::Float(value.to_f64())
        } else if N::can_hold_i64(-1) {
            NumericValue::Signed(value.to_i64())
        } else {
            NumericValue::Unsigned(value.to_u64())
        }
    }

    fn fits<N: NumericType>(self) -> bool {
        match self {
            NumericValue::Signed(v) => N::can_hold_i64(v),
            NumericValue::Unsigned(v) => N::can_hold_u64(v),
            NumericValue::Float(v) => N::can_hold_f64(v),
        }
    }

    fn convert<N: NumericType>(self) -> N {
        match self {
            NumericValue::Signed(v) => N::from_i64(v),
            NumericValue::Unsigned(v) => N::from_u64(v),
            NumericValue::Float(v) => N::from_f64(v),
        }
    }
}

fn read_number<N: NumericType>(ar: &mut dyn Archive) -> Result<NumericValue> {
    let mut value = N::default();
    N::serialize_value(&mut value, ar)?;
    Ok(NumericValue::of(value))
}

/// Reads a value stored as `tag_type`, `None` if that is not a numeric type.
fn read_tag_number(tag_type: EPropertyType, ar: &mut dyn Archive) -> Result<Option<NumericValue>> {
    use EPropertyType as T;
    Ok(Some(match tag_type {
        T::ByteProperty => read_number::<u8>(ar)?,
        T::Int8Property => read_number::<i8>(ar)?,
        T::Int16Property => read_number::<i16>(ar)?,
        T::IntProperty => read_number::<i32>(ar)?,
        T::Int64Property => read_number::<i64>(ar)?,
        T::UInt16Property => read_number::<u16>(ar)?,
        T::UInt32Property => read_number::<u32>(ar)?,
        T::UInt64Property => read_number::<u64>(ar)?,
        T::FloatProperty => read_number::<f32>(ar)?,
        T::DoubleProperty => read_number::<f64>(ar)?,
        _ => return Ok(None),
    }))
}

impl UProperty {
    fn type_mismatch(&self, expected: &'static str) -> PropertyError {
        PropertyError::TypeMismatch {
            property: self.name,
            expected,
        }
    }

    pub fn is_floating_point(&self) -> bool {
        matches!(self.kind, PropertyKind::Float | PropertyKind::Double)
    }

    pub fn is_integer(&self) -> bool {
        self.kind.is_numeric() && !self.is_floating_point()
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.kind, PropertyKind::Byte(Some(_)))
    }

    pub fn get_int_property_enum(&self) -> Option<&Arc<UEnum>> {
        match &self.kind {
            PropertyKind::Byte(uenum) => uenum.as_ref(),
            _ => None,
        }
    }

    /// Whether `value` survives being stored in this property. Always false for
    /// non numeric properties.
    pub fn can_hold_value(&self, value: NumericValue) -> bool {
        match_numeric!(&self.kind, N => value.fits::<N>(), _ => false)
    }

    /// # Safety
    /// `data` must address a value of this property.
    pub unsafe fn set_int_property_value_u64(&self, data: *mut u8, value: u64) -> Result<()> {
        if !self.is_integer() {
            return Err(self.type_mismatch("integer"));
        }
        self.store_number(data, NumericValue::Unsigned(value))
    }

    /// # Safety
    /// `data` must address a value of this property.
    pub unsafe fn set_int_property_value_i64(&self, data: *mut u8, value: i64) -> Result<()> {
        if !self.is_integer() {
            return Err(self.type_mismatch("integer"));
        }
        self.store_number(data, NumericValue::Signed(value))
    }

    /// # Safety
    /// `data` must address a value of this property.
    pub unsafe fn set_floating_point_property_value(&self, data: *mut u8, value: f64) -> Result<()> {
        if !self.is_floating_point() {
            return Err(self.type_mismatch("floating point"));
        }
        self.store_number(data, NumericValue::Float(value))
    }

    /// # Safety
    /// `data` must address a value of this property.
    pub unsafe fn set_numeric_property_value_from_string(&self, data: *mut u8, value: &str) -> Result<()> {
        match_numeric!(&self.kind, N => {
            let Some(parsed) = N::parse(value) else {
                bail_out!("'{value}' is not a valid {}", TypeFundamentals::<N>::get_type_name());
            };
            TypeFundamentals::<N>::set_property_value(data, parsed);
            Ok(())
        }, _ => Err(self.type_mismatch("numeric")))
    }

    /// # Safety
    /// `data` must address a value of this property.
    pub unsafe fn get_signed_int_property_value(&self, data: *const u8) -> Result<i64> {
        if !self.is_integer() {
            return Err(self.type_mismatch("integer"));
        }
        self.load_number(data).map(|value| value.convert::<i64>())
    }

    /// # Safety
    /// `data` must address a value of this property.
    pub unsafe fn get_unsigned_int_property_value(&self, data: *const u8) -> Result<u64> {
        if !self.is_integer() {
            return Err(self.type_mismatch("integer"));
        }
        self.load_number(data).map(|value| value.convert::<u64>())
    }

    /// # Safety
    /// `data` must address a value of this property.
    pub unsafe fn get_floating_point_property_value(&self, data: *const u8) -> Result<f64> {
        if !self.is_floating_point() {
            return Err(self.type_mismatch("floating point"));
        }
        self.load_number(data).map(|value| value.convert::<f64>())
    }

    /// # Safety
    /// `data` must address a value of this property.
    pub unsafe fn get_numeric_property_value_to_string(&self, data: *const u8) -> Result<String> {
        match_numeric!(&self.kind, N => {
            Ok(TypeFundamentals::<N>::get_property_value(data).format())
        }, _ => Err(self.type_mismatch("numeric")))
    }

    unsafe fn load_number(&self, data: *const u8) -> Result<NumericValue> {
        match_numeric!(&self.kind, N => {
            Ok(NumericValue::of(TypeFundamentals::<N>::get_property_value(data)))
        }, _ => Err(self.type_mismatch("numeric")))
    }

    unsafe fn store_number(&self, data: *mut u8, value: NumericValue) -> Result<()> {
        match_numeric!(&self.kind, N => {
            TypeFundamentals::<N>::set_property_value(data, value.convert::<N>());
            Ok(())
        }, _ => Err(self.type_mismatch("numeric")))
    }

    pub(super) unsafe fn export_numeric_text(
        &self,
        out: &mut String,
        value: *const u8,
        port_flags: EPropertyPortFlags,
    ) {
        let export_cpp = port_flags.contains(EPropertyPortFlags::PPF_ExportCpp);
        if let PropertyKind::Byte(Some(uenum)) = &self.kind {
            let byte = *value;
            match uenum.get_name_by_value(i64::from(byte)) {
                Some(name) if export_cpp => out.push_str(&format!("{}::{name}", uenum.get_fname())),
                Some(name) => out.push_str(&name.to_string()),
                None => out.push_str(&byte.to_string()),
            }
            return;
        }
        match_numeric!(&self.kind, N => {
            out.push_str(&TypeFundamentals::<N>::get_property_value(value).format());
            if export_cpp && matches!(self.kind, PropertyKind::Float) {
                out.push('f');
            }
        }, _ => {})
    }

    pub(super) unsafe fn import_numeric_text<'a>(&self, buffer: &'a str, data: *mut u8) -> Result<&'a str> {
        if let PropertyKind::Byte(Some(uenum)) = &self.kind {
            let Some((token, rest)) = read_token(buffer, true) else {
                bail_out!("Bad quoted string");
            };
            let by_name = FName::find(&token).and_then(|name| uenum.get_value_by_name(name));
            let by_number = || {
                token
                    .parse::<i64>()
                    .ok()
                    .filter(|value| uenum.get_name_by_value(*value).is_some())
            };
            match by_name.or_else(by_number) {
                Some(value) => {
                    *data = value as u8;
                    return Ok(rest);
                }
                None => bail_out!("Invalid enum value token '{token}' for {}", uenum.get_fname()),
            }
        }
        let len = numeric_literal_len(buffer);
        if len == 0 {
            bail_out!("Invalid numeric value '{buffer}'");
        }
        let (text, rest) = buffer.split_at(len);
        self.set_numeric_property_value_from_string(data, text)?;
        Ok(rest)
    }

    /// Loads a tagged value written by a property of a different type. Returns false
    /// when there is no conversion, leaving the archive untouched.
    pub(crate) unsafe fn convert_from_tag(
        &self,
        tag: &FPropertyTag,
        ar: &mut dyn Archive,
        value: *mut u8,
    ) -> Result<bool> {
        let Ok(tag_type) = tag.type_.to_string().parse::<EPropertyType>() else {
            return Ok(false);
        };
        match (&self.kind, tag_type) {
            (PropertyKind::Str, EPropertyType::NameProperty) => {
                let mut name = NAME_NONE;
                ar.serialize_name(&mut name)?;
                TypeFundamentals::<FString>::set_property_value(value, FString::from(name.to_string()));
                Ok(true)
            }
            (PropertyKind::Name, EPropertyType::StrProperty) => {
                let mut text = FString::new();
                ar.serialize_string(&mut text)?;
                TypeFundamentals::<FName>::set_property_value(value, FName::new(&text.to_string()));
                Ok(true)
            }
            (kind, _) if kind.is_numeric() => {
                let Some(number) = read_tag_number(tag_type, ar)? else {
                    return Ok(false);
                };
                if self.can_hold_value(number) {
                    self.store_number(value, number)?;
                } else {
                    tracing::warn!(
                        "{} loading {tag_type} value {number:?} into {}: value does not fit, keeping the current value",
                        self.name,
                        self.property_type()
                    );
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
