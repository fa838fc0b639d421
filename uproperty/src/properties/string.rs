use crate::containers::FString;
use crate::error::{bail_out, Result};
use crate::flags::EPropertyPortFlags;
use crate::fundamentals::TypeFundamentals;
use crate::name::FName;
use crate::text::{escape_string, quoted, read_token};

use super::{PropertyKind, UProperty};

impl UProperty {
    pub(super) unsafe fn export_string_text(
        &self,
        out: &mut String,
        value: *const u8,
        port_flags: EPropertyPortFlags,
    ) {
        let delimited = port_flags.contains(EPropertyPortFlags::PPF_Delimited);
        let export_cpp = port_flags.contains(EPropertyPortFlags::PPF_ExportCpp);
        match self.kind {
            PropertyKind::Name => {
                let name = TypeFundamentals::<FName>::get_property_value_ref(value).to_string();
                if export_cpp {
                    out.push_str(&format!("FName(TEXT({}))", quoted(&name)));
                } else if delimited {
                    out.push_str(&quoted(&name));
                } else {
                    out.push_str(&name);
                }
            }
            _ => {
                let text = TypeFundamentals::<FString>::get_property_value_ref(value).to_string();
                if export_cpp {
                    out.push_str("TEXT(\"");
                    escape_string(out, &text);
                    out.push_str("\")");
                } else if delimited {
                    out.push_str(&quoted(&text));
                } else {
                    out.push_str(&text);
                }
            }
        }
    }

    pub(super) unsafe fn import_string_text<'a>(
        &self,
        buffer: &'a str,
        data: *mut u8,
        port_flags: EPropertyPortFlags,
    ) -> Result<&'a str> {
        if let PropertyKind::Name = self.kind {
            let Some((token, rest)) = read_token(buffer, true) else {
                bail_out!("Bad quoted string in name property value: {buffer}");
            };
            TypeFundamentals::<FName>::set_property_value(data, FName::new(&token));
            return Ok(rest);
        }
        if !port_flags.contains(EPropertyPortFlags::PPF_Delimited) {
            TypeFundamentals::<FString>::set_property_value(data, FString::from(buffer));
            return Ok(&buffer[buffer.len()..]);
        }
        if !buffer.starts_with('"') {
            bail_out!("Missing opening '\"' in string property value: {buffer}");
        }
        let Some((token, rest)) = read_token(buffer, false) else {
            bail_out!("Missing terminating '\"' in string property value: {buffer}");
        };
        TypeFundamentals::<FString>::set_property_value(data, FString::from(token));
        Ok(rest)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Weak;

    use super::*;
    use crate::object::FUObjectArray;
    use crate::text::FStringOutputDevice;

    fn linked(mut property: UProperty) -> UProperty {
        property.link(&Weak::new()).unwrap();
        property
    }

    #[test]
    fn test_name_text() {
        let property = linked(UProperty::fname("N"));
        let objects = FUObjectArray::new();
        let mut errors = FStringOutputDevice::new();
        let mut value = FName::default();
        let data = std::ptr::addr_of_mut!(value).cast::<u8>();
        unsafe {
            let rest = property
                .import_text("Level.Spawn_2,", data, EPropertyPortFlags::PPF_None, &objects, &mut errors)
                .unwrap();
            assert_eq!(rest, ",");
            assert_eq!(value.to_string(), "Level.Spawn_2");

            let mut out = String::new();
            property.export_text_item(&mut out, data, None, EPropertyPortFlags::PPF_None, &objects);
            out.push(' ');
            property.export_text_item(&mut out, data, None, EPropertyPortFlags::PPF_Delimited, &objects);
            assert_eq!(out, "Level.Spawn_2 \"Level.Spawn_2\"");
        }
    }

    #[test]
    fn test_str_text() {
        let property = linked(UProperty::str("S"));
        let objects = FUObjectArray::new();
        let mut errors = FStringOutputDevice::new();
        let mut value = FString::new();
        let data = std::ptr::addr_of_mut!(value).cast::<u8>();
        let delimited = EPropertyPortFlags::PPF_Delimited;
        unsafe {
            let rest = property
                .import_text("raw, (text)", data, EPropertyPortFlags::PPF_None, &objects, &mut errors)
                .unwrap();
            assert!(rest.is_empty());
            assert_eq!(value.to_string(), "raw, (text)");

            let mut out = String::new();
            property.export_text_item(&mut out, data, None, delimited, &objects);
            assert_eq!(out, "\"raw, (text)\"");

            let rest = property
                .import_text("\"say \\\"hi\\\"\",Next", data, delimited, &objects, &mut errors)
                .unwrap();
            assert_eq!(rest, ",Next");
            assert_eq!(value.to_string(), "say \"hi\"");
            out.clear();
            property.export_text_item(&mut out, data, None, EPropertyPortFlags::PPF_ExportCpp, &objects);
            assert_eq!(out, "TEXT(\"say \\\"hi\\\"\")");

            assert!(property.import_text("bare", data, delimited, &objects, &mut errors).is_err());
            assert!(errors.as_str().contains("Missing opening"));
            assert!(property.import_text("\"open", data, delimited, &objects, &mut errors).is_err());

            TypeFundamentals::<FString>::set_property_value(data, FString::new());
            out.clear();
            property.export_text_item(&mut out, data, None, delimited, &objects);
            assert_eq!(out, "\"\"");
        }
    }
}
