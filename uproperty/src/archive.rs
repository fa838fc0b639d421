use byteorder::{ByteOrder, LittleEndian as LE};

use crate::containers::FString;
use crate::error::{PropertyError, Result};
use crate::flags::EPropertyPortFlags;
use crate::name::{FName, NAME_NONE};
use crate::object::{FUObjectArray, ObjectPtr, UObject};
use crate::properties::{PropertyKind, UProperty};

pub const PACKAGE_FILE_TAG: u32 = 0x9E2A83C1;

pub const VER_UE_OLDEST_LOADABLE_PACKAGE: i32 = 214;
/// Array property tags carry the inner property type.
pub const VER_UE_ARRAY_PROPERTY_INNER_TAGS: i32 = 500;
pub const VER_UE_LATEST: i32 = VER_UE_ARRAY_PROPERTY_INNER_TAGS;

/// Refuse strings longer than this when loading instead of allocating blindly.
const MAX_SERIALIZED_STRING_LEN: i64 = 1 << 24;

macro_rules! archive_primitive {
    ($name:ident, $ty:ty, $read:ident, $write:ident) => {
        fn $name(&mut self, value: &mut $ty) -> Result<()> {
            let mut buf = [0u8; std::mem::size_of::<$ty>()];
            if self.is_saving() {
                LE::$write(&mut buf, *value);
            }
            self.serialize(&mut buf)?;
            if self.is_loading() {
                *value = LE::$read(&buf);
            }
            Ok(())
        }
    };
}

/// Bidirectional binary stream. The same code path loads and saves a value.
pub trait Archive {
    fn is_loading(&self) -> bool;
    fn is_saving(&self) -> bool {
        !self.is_loading()
    }
    fn is_persistent(&self) -> bool {
        true
    }
    fn is_filter_editor_only(&self) -> bool {
        false
    }
    fn want_binary_property_serialization(&self) -> bool {
        false
    }
    fn is_transacting(&self) -> bool {
        false
    }
    fn port_flags(&self) -> EPropertyPortFlags {
        EPropertyPortFlags::PPF_None
    }
    fn ue_version(&self) -> i32 {
        VER_UE_LATEST
    }
    fn set_ue_version(&mut self, version: i32);

    /// Copies raw bytes to or from the stream.
    fn serialize(&mut self, data: &mut [u8]) -> Result<()>;
    fn tell(&self) -> i64;
    fn seek(&mut self, position: i64) -> Result<()>;
    fn total_size(&self) -> i64;

    /// Registry used to resolve object references while loading.
    fn objects(&self) -> Option<&FUObjectArray> {
        None
    }

    fn serialize_u8(&mut self, value: &mut u8) -> Result<()> {
        let mut buf = [*value];
        self.serialize(&mut buf)?;
        *value = buf[0];
        Ok(())
    }
    fn serialize_i8(&mut self, value: &mut i8) -> Result<()> {
        let mut buf = [*value as u8];
        self.serialize(&mut buf)?;
        *value = buf[0] as i8;
        Ok(())
    }
    fn serialize_bool(&mut self, value: &mut bool) -> Result<()> {
        let mut raw = u32::from(*value);
        self.serialize_u32(&mut raw)?;
        *value = raw != 0;
        Ok(())
    }
    archive_primitive!(serialize_i16, i16, read_i16, write_i16);
    archive_primitive!(serialize_u16, u16, read_u16, write_u16);
    archive_primitive!(serialize_i32, i32, read_i32, write_i32);
    archive_primitive!(serialize_u32, u32, read_u32, write_u32);
    archive_primitive!(serialize_i64, i64, read_i64, write_i64);
    archive_primitive!(serialize_u64, u64, read_u64, write_u64);
    archive_primitive!(serialize_f32, f32, read_f32, write_f32);
    archive_primitive!(serialize_f64, f64, read_f64, write_f64);

    /// Length prefixed string. A positive length is a Latin-1 string, a negative
    /// one UTF-16. Both lengths include the terminator, zero is the empty string.
    fn serialize_string(&mut self, value: &mut FString) -> Result<()> {
        if self.is_loading() {
            let mut len = 0i32;
            self.serialize_i32(&mut len)?;
            let unicode = len < 0;
            let count = i64::from(len).abs();
            let width = if unicode { 2 } else { 1 };
            if count > MAX_SERIALIZED_STRING_LEN || count * width > self.total_size() - self.tell() {
                return Err(PropertyError::Archive(
                    format!("string length {len} exceeds archive").into(),
                ));
            }
            let mut chars = vec![0u16; count as usize];
            if unicode {
                let mut buf = vec![0u8; count as usize * 2];
                self.serialize(&mut buf)?;
                LE::read_u16_into(&buf, &mut chars);
            } else {
                let mut buf = vec![0u8; count as usize];
                self.serialize(&mut buf)?;
                for (c, b) in chars.iter_mut().zip(buf) {
                    *c = u16::from(b);
                }
            }
            *value = FString::from_utf16(&chars);
        } else {
            let chars = value.as_utf16_with_nul();
            if chars.is_empty() {
                self.serialize_i32(&mut 0)?;
            } else if chars.iter().all(|c| *c < 0x100) {
                self.serialize_i32(&mut (chars.len() as i32))?;
                let mut buf: Vec<u8> = chars.iter().map(|c| *c as u8).collect();
                self.serialize(&mut buf)?;
            } else {
                self.serialize_i32(&mut -(chars.len() as i32))?;
                let mut buf = vec![0u8; chars.len() * 2];
                LE::write_u16_into(chars, &mut buf);
                self.serialize(&mut buf)?;
            }
        }
        Ok(())
    }

    fn serialize_name(&mut self, value: &mut FName) -> Result<()> {
        let mut text = if self.is_saving() {
            FString::from(value.to_string())
        } else {
            FString::new()
        };
        self.serialize_string(&mut text)?;
        if self.is_loading() {
            *value = if text.is_empty() {
                NAME_NONE
            } else {
                FName::new(&text.to_string())
            };
        }
        Ok(())
    }

    /// Object references travel as path names. Unresolvable paths load as null.
    fn serialize_object(&mut self, value: &mut ObjectPtr) -> Result<()> {
        let mut path = if self.is_saving() {
            FString::from(UObject::path_name_of(*value))
        } else {
            FString::new()
        };
        self.serialize_string(&mut path)?;
        if self.is_loading() {
            *value = if path.is_empty() {
                None
            } else {
                let path = path.to_string();
                let found = self.objects().and_then(|objects| objects.find_object(&path));
                if found.is_none() {
                    tracing::warn!("Failed to resolve object reference '{path}'");
                }
                found
            };
        }
        Ok(())
    }
}

/// Archive options shared by the memory archives.
#[derive(Debug, Clone, Copy)]
struct ArchiveSettings {
    ue_version: i32,
    port_flags: EPropertyPortFlags,
    persistent: bool,
    want_binary: bool,
    filter_editor_only: bool,
    transacting: bool,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            ue_version: VER_UE_LATEST,
            port_flags: EPropertyPortFlags::PPF_None,
            persistent: true,
            want_binary: false,
            filter_editor_only: false,
            transacting: false,
        }
    }
}

macro_rules! impl_archive_settings {
    ($ty:ident) => {
        impl $ty<'_> {
            pub fn with_port_flags(mut self, port_flags: EPropertyPortFlags) -> Self {
                self.settings.port_flags = port_flags;
                self
            }
            pub fn with_ue_version(mut self, version: i32) -> Self {
                self.settings.ue_version = version;
                self
            }
            /// Serialize every property as raw binary instead of tagged.
            pub fn binary(mut self) -> Self {
                self.settings.want_binary = true;
                self
            }
            pub fn transient(mut self) -> Self {
                self.settings.persistent = false;
                self
            }
            pub fn transacting(mut self) -> Self {
                self.settings.transacting = true;
                self
            }
            pub fn filter_editor_only(mut self) -> Self {
                self.settings.filter_editor_only = true;
                self
            }
        }
    };
}

#[derive(Debug, Default)]
pub struct MemoryWriter<'a> {
    bytes: Vec<u8>,
    position: usize,
    settings: ArchiveSettings,
    objects: Option<&'a FUObjectArray>,
}
impl_archive_settings!(MemoryWriter);

impl<'a> MemoryWriter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry consulted for weak, lazy and asset references while saving.
    pub fn with_objects(mut self, objects: &'a FUObjectArray) -> Self {
        self.objects = Some(objects);
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl Archive for MemoryWriter<'_> {
    fn is_loading(&self) -> bool {
        false
    }
    fn is_persistent(&self) -> bool {
        self.settings.persistent
    }
    fn is_filter_editor_only(&self) -> bool {
        self.settings.filter_editor_only
    }
    fn want_binary_property_serialization(&self) -> bool {
        self.settings.want_binary
    }
    fn is_transacting(&self) -> bool {
        self.settings.transacting
    }
    fn port_flags(&self) -> EPropertyPortFlags {
        self.settings.port_flags
    }
    fn ue_version(&self) -> i32 {
        self.settings.ue_version
    }
    fn set_ue_version(&mut self, version: i32) {
        self.settings.ue_version = version;
    }
    fn serialize(&mut self, data: &mut [u8]) -> Result<()> {
        let end = self.position + data.len();
        if end > self.bytes.len() {
            self.bytes.resize(end, 0);
        }
        self.bytes[self.position..end].copy_from_slice(data);
        self.position = end;
        Ok(())
    }
    fn tell(&self) -> i64 {
        self.position as i64
    }
    fn seek(&mut self, position: i64) -> Result<()> {
        if position < 0 || position as usize > self.bytes.len() {
            return Err(PropertyError::Archive(
                format!("seek to {position} outside of {} bytes", self.bytes.len()).into(),
            ));
        }
        self.position = position as usize;
        Ok(())
    }
    fn total_size(&self) -> i64 {
        self.bytes.len() as i64
    }
    fn objects(&self) -> Option<&FUObjectArray> {
        self.objects
    }
}

#[derive(Debug)]
pub struct MemoryReader<'a> {
    bytes: &'a [u8],
    position: usize,
    settings: ArchiveSettings,
    objects: Option<&'a FUObjectArray>,
}
impl_archive_settings!(MemoryReader);

impl<'a> MemoryReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            position: 0,
            settings: Default::default(),
            objects: None,
        }
    }

    /// Resolve object references against `objects` while loading.
    pub fn with_objects(mut self, objects: &'a FUObjectArray) -> Self {
        self.objects = Some(objects);
        self
    }

    pub fn at_end(&self) -> bool {
        self.position >= self.bytes.len()
    }
}

impl Archive for MemoryReader<'_> {
    fn is_loading(&self) -> bool {
        true
    }
    fn is_persistent(&self) -> bool {
        self.settings.persistent
    }
    fn is_filter_editor_only(&self) -> bool {
        self.settings.filter_editor_only
    }
    fn want_binary_property_serialization(&self) -> bool {
        self.settings.want_binary
    }
    fn is_transacting(&self) -> bool {
        self.settings.transacting
    }
    fn port_flags(&self) -> EPropertyPortFlags {
        self.settings.port_flags
    }
    fn ue_version(&self) -> i32 {
        self.settings.ue_version
    }
    fn set_ue_version(&mut self, version: i32) {
        self.settings.ue_version = version;
    }
    fn serialize(&mut self, data: &mut [u8]) -> Result<()> {
        let end = self.position + data.len();
        let Some(source) = self.bytes.get(self.position..end) else {
            return Err(PropertyError::Archive(
                format!(
                    "read of {} bytes at {} past end of archive ({} bytes)",
                    data.len(),
                    self.position,
                    self.bytes.len()
                )
                .into(),
            ));
        };
        data.copy_from_slice(source);
        self.position = end;
        Ok(())
    }
    fn tell(&self) -> i64 {
        self.position as i64
    }
    fn seek(&mut self, position: i64) -> Result<()> {
        if position < 0 || position as usize > self.bytes.len() {
            return Err(PropertyError::Archive(
                format!("seek to {position} outside of {} bytes", self.bytes.len()).into(),
            ));
        }
        self.position = position as usize;
        Ok(())
    }
    fn total_size(&self) -> i64 {
        self.bytes.len() as i64
    }
    fn objects(&self) -> Option<&FUObjectArray> {
        self.objects
    }
}

/// Leading header of a serialized package. Loading it adopts the stored version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FPackageFileSummary {
    pub tag: u32,
    pub file_version_ue: i32,
}

impl Default for FPackageFileSummary {
    fn default() -> Self {
        Self {
            tag: PACKAGE_FILE_TAG,
            file_version_ue: VER_UE_LATEST,
        }
    }
}

impl FPackageFileSummary {
    pub fn serialize(&mut self, ar: &mut dyn Archive) -> Result<()> {
        ar.serialize_u32(&mut self.tag)?;
        if self.tag != PACKAGE_FILE_TAG {
            return Err(PropertyError::Archive(
                format!("bad package file tag {:#x}", self.tag).into(),
            ));
        }
        ar.serialize_i32(&mut self.file_version_ue)?;
        if ar.is_loading() {
            if self.file_version_ue < VER_UE_OLDEST_LOADABLE_PACKAGE
                || self.file_version_ue > VER_UE_LATEST
            {
                return Err(PropertyError::Archive(
                    format!("unsupported package version {}", self.file_version_ue).into(),
                ));
            }
            ar.set_ue_version(self.file_version_ue);
        }
        Ok(())
    }
}

/// Header written in front of every tagged property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FPropertyTag {
    pub type_: FName,
    pub bool_val: u8,
    pub name: FName,
    pub struct_name: FName,
    pub enum_name: FName,
    pub inner_type: FName,
    pub size: i32,
    pub array_index: i32,
    /// Stream position of `size`, used to patch it after the value is written.
    pub size_offset: i64,
}

impl Default for FPropertyTag {
    fn default() -> Self {
        Self {
            type_: NAME_NONE,
            bool_val: 0,
            name: NAME_NONE,
            struct_name: NAME_NONE,
            enum_name: NAME_NONE,
            inner_type: NAME_NONE,
            size: 0,
            array_index: 0,
            size_offset: -1,
        }
    }
}

impl FPropertyTag {
    /// Describes element `array_index` of `property`, whose value lives at `value`.
    ///
    /// # Safety
    /// `value` must point at a live value of `property`.
    pub unsafe fn new(property: &UProperty, array_index: i32, value: *const u8) -> Self {
        let mut tag = Self {
            type_: property.get_id(),
            name: property.get_fname(),
            array_index,
            ..Default::default()
        };
        match property.kind() {
            PropertyKind::Struct(s) => tag.struct_name = s.get_fname(),
            PropertyKind::Byte(e) => {
                tag.enum_name = e.as_ref().map(|e| e.get_fname()).unwrap_or(NAME_NONE)
            }
            PropertyKind::Bool(b) => tag.bool_val = u8::from(b.get_property_value(value)),
            PropertyKind::Array(inner) => tag.inner_type = inner.get_id(),
            _ => {}
        }
        tag
    }

    pub fn serialize(&mut self, ar: &mut dyn Archive) -> Result<()> {
        ar.serialize_name(&mut self.name)?;
        if self.name.is_none() {
            return Ok(());
        }
        ar.serialize_name(&mut self.type_)?;
        if ar.is_saving() {
            self.size_offset = ar.tell();
        }
        ar.serialize_i32(&mut self.size)?;
        ar.serialize_i32(&mut self.array_index)?;

        let type_name = self.type_.to_string();
        match type_name.as_str() {
            "StructProperty" => ar.serialize_name(&mut self.struct_name)?,
            "BoolProperty" => ar.serialize_u8(&mut self.bool_val)?,
            "ByteProperty" => ar.serialize_name(&mut self.enum_name)?,
            "ArrayProperty" if ar.ue_version() >= VER_UE_ARRAY_PROPERTY_INNER_TAGS => {
                ar.serialize_name(&mut self.inner_type)?
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives() {
        let mut writer = MemoryWriter::new();
        writer.serialize_i32(&mut -2).unwrap();
        writer.serialize_f32(&mut 1.5).unwrap();
        writer.serialize_bool(&mut true).unwrap();
        writer.serialize_u8(&mut 7).unwrap();
        assert_eq!(writer.bytes().len(), 13);
        assert_eq!(&writer.bytes()[..4], &[0xfe, 0xff, 0xff, 0xff]);

        let bytes = writer.into_bytes();
        let mut reader = MemoryReader::new(&bytes);
        let (mut a, mut b, mut c, mut d) = (0i32, 0f32, false, 0u8);
        reader.serialize_i32(&mut a).unwrap();
        reader.serialize_f32(&mut b).unwrap();
        reader.serialize_bool(&mut c).unwrap();
        reader.serialize_u8(&mut d).unwrap();
        assert_eq!((a, b, c, d), (-2, 1.5, true, 7));
        assert!(reader.at_end());
        assert!(matches!(
            reader.serialize_u8(&mut d),
            Err(PropertyError::Archive(_))
        ));
    }

    #[test]
    fn test_string_encoding() {
        let mut writer = MemoryWriter::new();
        writer.serialize_string(&mut FString::from("abc")).unwrap();
        writer.serialize_string(&mut FString::new()).unwrap();
        writer.serialize_string(&mut FString::from("\u{3042}")).unwrap();
        let bytes = writer.into_bytes();
        assert_eq!(&bytes[..8], &[4, 0, 0, 0, b'a', b'b', b'c', 0]);
        assert_eq!(&bytes[8..12], &[0, 0, 0, 0]);
        assert_eq!(&bytes[12..16], &(-2i32).to_le_bytes());

        let mut reader = MemoryReader::new(&bytes);
        let mut s = FString::new();
        reader.serialize_string(&mut s).unwrap();
        assert_eq!(s.to_string(), "abc");
        reader.serialize_string(&mut s).unwrap();
        assert!(s.is_empty());
        reader.serialize_string(&mut s).unwrap();
        assert_eq!(s.to_string(), "\u{3042}");
    }

    #[test]
    fn test_string_length_is_checked() {
        let bytes = 1000i32.to_le_bytes();
        let mut reader = MemoryReader::new(&bytes);
        assert!(reader.serialize_string(&mut FString::new()).is_err());
    }

    #[test]
    fn test_summary_version() {
        let mut writer = MemoryWriter::new();
        let mut summary = FPackageFileSummary {
            file_version_ue: VER_UE_ARRAY_PROPERTY_INNER_TAGS - 1,
            ..Default::default()
        };
        summary.serialize(&mut writer).unwrap();
        let bytes = writer.into_bytes();

        let mut reader = MemoryReader::new(&bytes);
        let mut loaded = FPackageFileSummary::default();
        loaded.serialize(&mut reader).unwrap();
        assert_eq!(loaded, summary);
        assert_eq!(reader.ue_version(), VER_UE_ARRAY_PROPERTY_INNER_TAGS - 1);

        let garbage = [0u8; 8];
        let mut reader = MemoryReader::new(&garbage);
        assert!(FPackageFileSummary::default().serialize(&mut reader).is_err());
    }

    #[test]
    fn test_tag_layout() {
        let mut tag = FPropertyTag {
            type_: FName::new("BoolProperty"),
            name: FName::new("bTagTestFlag"),
            bool_val: 1,
            ..Default::default()
        };
        let mut writer = MemoryWriter::new();
        tag.serialize(&mut writer).unwrap();
        let mut none = FPropertyTag::default();
        none.serialize(&mut writer).unwrap();
        assert!(tag.size_offset > 0);
        let bytes = writer.into_bytes();

        let mut reader = MemoryReader::new(&bytes);
        let mut loaded = FPropertyTag::default();
        loaded.serialize(&mut reader).unwrap();
        assert_eq!(loaded.name, tag.name);
        assert_eq!(loaded.bool_val, 1);
        let mut end = FPropertyTag::default();
        end.serialize(&mut reader).unwrap();
        assert!(end.name.is_none());
        assert!(reader.at_end());
    }
}
