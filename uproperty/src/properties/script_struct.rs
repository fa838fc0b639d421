use crate::archive::Archive;
use crate::error::Result;
use crate::flags::{EPropertyPortFlags, EStructFlags};
use crate::ustruct::UScriptStruct;

/// Binary when the archive asks for it or the struct layout is immutable,
/// tagged otherwise.
pub(super) fn use_binary_serialization(ustruct: &UScriptStruct, ar: &dyn Archive) -> bool {
    ar.want_binary_property_serialization()
        || ustruct.struct_flags().contains(EStructFlags::STRUCT_Immutable)
}

pub(super) unsafe fn serialize_struct_item(
    ustruct: &UScriptStruct,
    ar: &mut dyn Archive,
    value: *mut u8,
    defaults: Option<*const u8>,
) -> Result<()> {
    if !use_binary_serialization(ustruct, ar) {
        return ustruct.serialize_tagged_properties(ar, value, Some(ustruct), defaults);
    }
    match defaults {
        // transient copies only carry what differs from the defaults
        Some(defaults) if !ar.is_persistent() && ar.port_flags() != EPropertyPortFlags::PPF_None => {
            ustruct.serialize_bin_ex(ar, value, Some(defaults), Some(ustruct))
        }
        _ => ustruct.serialize_bin(ar, value),
    }
}
