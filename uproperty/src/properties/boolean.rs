use crate::archive::Archive;
use crate::error::{bail_out, Result};
use crate::flags::{EPropertyFlags, EPropertyPortFlags};
use crate::text::read_token;

use super::{PropertyKind, UProperty};

/// Where a bool lives inside its storage: a whole native `bool` byte, or one bit
/// of a bitfield of `field_size` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoolProperty {
    field_size: u8,
    byte_offset: u8,
    byte_mask: u8,
    field_mask: u8,
}

impl BoolProperty {
    pub(super) fn native() -> Self {
        Self {
            field_size: 1,
            byte_offset: 0,
            byte_mask: 1,
            field_mask: 0xff,
        }
    }

    /// A bitfield whose bit is picked when the owning struct is linked.
    pub(super) fn unassigned() -> Self {
        Self {
            field_size: 1,
            byte_offset: 0,
            byte_mask: 0,
            field_mask: 0,
        }
    }

    pub fn is_native_bool(&self) -> bool {
        self.field_mask == 0xff
    }

    pub(crate) fn is_unassigned_bitfield(&self) -> bool {
        self.field_mask == 0
    }

    pub fn field_size(&self) -> i32 {
        i32::from(self.field_size)
    }

    pub fn byte_offset(&self) -> u8 {
        self.byte_offset
    }

    pub fn byte_mask(&self) -> u8 {
        self.byte_mask
    }

    pub fn field_mask(&self) -> u8 {
        self.field_mask
    }

    /// Mask over the whole field, e.g. `0x10000` for the first bit of the third byte.
    pub fn bit_mask(&self) -> u64 {
        u64::from(self.byte_mask) << (8 * u32::from(self.byte_offset))
    }

    /// Arguments for [`UProperty::set_bool_size`] reproducing this layout.
    pub(super) fn layout(&self) -> (i32, bool, u64) {
        if self.is_unassigned_bitfield() {
            (self.field_size(), false, 1)
        } else {
            (self.field_size(), self.is_native_bool(), self.bit_mask())
        }
    }

    /// # Safety
    /// `a` must point at the start of the bool's storage.
    pub unsafe fn get_property_value(&self, a: *const u8) -> bool {
        (*a.add(self.byte_offset as usize) & self.field_mask) != 0
    }

    /// # Safety
    /// `a` must point at the start of the bool's storage.
    pub unsafe fn set_property_value(&self, a: *mut u8, value: bool) {
        let byte = a.add(self.byte_offset as usize);
        *byte = (*byte & !self.field_mask) | if value { self.byte_mask } else { 0 };
    }

    pub(super) unsafe fn clear_bits(&self, a: *mut u8) {
        *a.add(self.byte_offset as usize) &= !self.field_mask;
    }

    pub(super) unsafe fn identical(&self, a: *const u8, b: Option<*const u8>) -> bool {
        let offset = self.byte_offset as usize;
        let b = b.map(|b| *b.add(offset)).unwrap_or(0);
        ((*a.add(offset) ^ b) & self.field_mask) == 0
    }

    pub(super) unsafe fn serialize_item(&self, ar: &mut dyn Archive, value: *mut u8) -> Result<()> {
        let mut byte = u8::from(self.get_property_value(value));
        ar.serialize_u8(&mut byte)?;
        self.set_property_value(value, byte != 0);
        Ok(())
    }

    pub(super) unsafe fn export_text(
        &self,
        out: &mut String,
        value: *const u8,
        port_flags: EPropertyPortFlags,
    ) {
        let value = self.get_property_value(value);
        out.push_str(match (value, port_flags.contains(EPropertyPortFlags::PPF_ExportCpp)) {
            (true, false) => "True",
            (false, false) => "False",
            (true, true) => "true",
            (false, true) => "false",
        });
    }

    pub(super) unsafe fn import_text<'a>(&self, buffer: &'a str, data: *mut u8) -> Result<&'a str> {
        let Some((token, rest)) = read_token(buffer, false) else {
            bail_out!("Bad quoted string");
        };
        let is = |word: &str| token.eq_ignore_ascii_case(word);
        if is("1") || is("True") || is("Yes") {
            self.set_property_value(data, true);
        } else if is("0") || is("False") || is("No") {
            self.set_property_value(data, false);
        } else {
            bail_out!("Invalid bool value '{token}'");
        }
        Ok(rest)
    }
}

impl UProperty {
    /// Sets the storage of a bool property. A bitfield's byte offset is the first
    /// non zero byte of `bit_mask`, a zero mask selects the lowest bit.
    pub fn set_bool_size(&mut self, size: i32, is_native_bool: bool, bit_mask: u64) {
        use EPropertyFlags as C;
        assert!(
            matches!(size, 1 | 2 | 4 | 8),
            "invalid bool field size {size} for '{}'",
            self.name
        );
        let PropertyKind::Bool(b) = &mut self.kind else {
            panic!("'{}' is not a bool property", self.name);
        };
        if is_native_bool {
            self.property_flags |= C::CPF_IsPlainOldData | C::CPF_NoDestructor | C::CPF_ZeroConstructor;
        } else {
            self.property_flags -= C::CPF_IsPlainOldData | C::CPF_ZeroConstructor;
            self.property_flags |= C::CPF_NoDestructor;
        }
        let mask = if bit_mask == 0 { 1 } else { bit_mask };
        self.element_size = size;
        b.field_size = size as u8;
        if is_native_bool {
            b.byte_offset = 0;
            b.byte_mask = 1;
            b.field_mask = 0xff;
        } else {
            let (offset, byte) = mask
                .to_le_bytes()
                .into_iter()
                .take(size as usize)
                .enumerate()
                .find(|(_, byte)| *byte != 0)
                .unwrap_or((size as usize - 1, 0));
            b.byte_offset = offset as u8;
            b.byte_mask = byte;
            b.field_mask = byte;
        }
    }

    pub fn is_native_bool(&self) -> bool {
        matches!(&self.kind, PropertyKind::Bool(b) if b.is_native_bool())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Weak;

    use super::*;
    use crate::archive::{MemoryReader, MemoryWriter};
    use crate::object::FUObjectArray;
    use crate::text::FStringOutputDevice;

    fn linked(mut property: UProperty) -> UProperty {
        property.link(&Weak::new()).unwrap();
        property
    }

    fn bool_of(property: &UProperty) -> BoolProperty {
        match property.kind() {
            PropertyKind::Bool(b) => *b,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_set_bool_size() {
        use EPropertyFlags as C;
        let native = linked(UProperty::bool("bNative"));
        let b = bool_of(&native);
        assert!(native.is_native_bool());
        assert_eq!((b.byte_offset(), b.byte_mask(), b.field_mask()), (0, 1, 0xff));
        assert!(native.has_all_property_flags(C::CPF_IsPlainOldData | C::CPF_ZeroConstructor));

        let bitfield = linked(UProperty::bool_with_mask("bBit", 4, 0x0004_0000));
        let b = bool_of(&bitfield);
        assert!(!bitfield.is_native_bool());
        assert_eq!((b.byte_offset(), b.byte_mask(), b.field_mask()), (2, 0x04, 0x04));
        assert_eq!(b.bit_mask(), 0x0004_0000);
        assert_eq!(bitfield.element_size(), 4);
        assert_eq!(bitfield.get_min_alignment(), 4);
        assert!(bitfield.has_any_property_flags(C::CPF_NoDestructor));
        assert!(!bitfield.has_any_property_flags(C::CPF_IsPlainOldData | C::CPF_ZeroConstructor));

        let unassigned = linked(UProperty::bitfield("bLow"));
        assert_eq!(bool_of(&unassigned).bit_mask(), 1);
    }

    #[test]
    fn test_bitfield_access_keeps_neighbours() {
        let bit = linked(UProperty::bool_with_mask("bBit", 4, 0x0000_0200));
        let b = bool_of(&bit);
        let mut storage = 0xffff_fdffu32;
        let data = std::ptr::addr_of_mut!(storage).cast::<u8>();
        unsafe {
            assert!(!b.get_property_value(data));
            b.set_property_value(data, true);
            assert_eq!(storage, u32::MAX);
            assert!(b.get_property_value(data));

            let other = 0x0000_0200u32;
            let other_ptr = std::ptr::addr_of!(other).cast::<u8>();
            assert!(b.identical(data, Some(other_ptr)));
            assert!(!b.identical(data, None));
            bit.clear_value(data);
            assert_eq!(storage, 0xffff_fdff);
            assert!(bit.identical(data, None, EPropertyPortFlags::PPF_None));
        }
    }

    #[test]
    fn test_bool_text() {
        let property = linked(UProperty::bool("bFlag"));
        let objects = FUObjectArray::new();
        let mut errors = FStringOutputDevice::new();
        let mut value = 0u8;
        let data = std::ptr::addr_of_mut!(value);
        let import = |text: &str, value: *mut u8, errors: &mut FStringOutputDevice| unsafe {
            property
                .import_text(text, value, EPropertyPortFlags::PPF_None, &objects, errors)
                .map(str::to_string)
        };
        assert_eq!(import("yes,", data, &mut errors).unwrap(), ",");
        assert_eq!(value, 1);
        assert_eq!(import("FALSE", data, &mut errors).unwrap(), "");
        assert_eq!(value, 0);
        assert_eq!(import("1", data, &mut errors).unwrap(), "");
        assert_eq!(value, 1);
        assert!(import("maybe", data, &mut errors).is_err());
        assert_eq!(value, 1);

        let mut out = String::new();
        unsafe {
            property.export_text_item(&mut out, data, None, EPropertyPortFlags::PPF_None, &objects);
            out.push(' ');
            property.export_text_item(&mut out, data, None, EPropertyPortFlags::PPF_ExportCpp, &objects);
        }
        assert_eq!(out, "True true");
    }

    #[test]
    fn test_bool_serializes_one_byte() {
        let bit = linked(UProperty::bool_with_mask("bBit", 1, 0x80));
        let mut storage = 0x80u8;
        let mut writer = MemoryWriter::new();
        unsafe { bit.serialize_item(&mut writer, &mut storage, None) }.unwrap();
        assert_eq!(writer.bytes(), &[1]);

        let bytes = writer.into_bytes();
        let mut loaded = 0x7fu8;
        let mut reader = MemoryReader::new(&bytes);
        unsafe { bit.serialize_item(&mut reader, &mut loaded, None) }.unwrap();
        assert_eq!(loaded, 0xff);
    }
}
