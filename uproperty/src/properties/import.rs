use crate::flags::EPropertyPortFlags;
use crate::malloc;
use crate::name::FName;
use crate::object::FUObjectArray;
use crate::text::{logf, parse_command, skip_whitespace, FOutputDevice, FStringOutputDevice};
use crate::ustruct::UStruct;

use super::{FScriptArrayHelper, UProperty};

const INDEX_NONE: i32 = -1;
/// Furthest a subscript may reach past the end of a dynamic array.
const MAX_SUBSCRIPT_GROWTH: i32 = 1 << 16;

/// An element already assigned during one import pass. A second assignment of
/// the same element is reported as redundant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FDefinedProperty {
    pub property: FName,
    pub index: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayOp {
    Empty,
    Add,
    Remove,
    RemoveIndex,
}

/// Uninitialized scratch storage holding one default constructed element.
struct TempValue<'a> {
    property: &'a UProperty,
    data: *mut u8,
}

impl<'a> TempValue<'a> {
    fn new(property: &'a UProperty) -> Self {
        unsafe {
            let data = malloc::malloc(
                property.get_size().max(1) as usize,
                property.get_min_alignment() as usize,
            );
            property.initialize_value(data);
            Self { property, data }
        }
    }
}

impl Drop for TempValue<'_> {
    fn drop(&mut self) {
        unsafe {
            self.property.destroy_value(self.data);
            malloc::free(self.data);
        }
    }
}

/// `atoi` semantics: an optional sign and leading digits, zero otherwise.
fn atoi(text: &str) -> i64 {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let value = digits[..end].parse::<i64>().unwrap_or(0);
    if negative {
        -value
    } else {
        value
    }
}

/// Reads an optional `[index]` or `(index)` subscript. The index may be a number,
/// a `0x` hex number or the name of an enum entry.
fn read_array_index<'a>(
    buffer: &'a str,
    objects: &FUObjectArray,
    start: &str,
    warn: &mut dyn FOutputDevice,
) -> (i32, &'a str) {
    let rest = skip_whitespace(buffer);
    let Some(inside) = rest.strip_prefix(['(', '[']) else {
        return (INDEX_NONE, rest);
    };
    let Some(end) = inside.find([')', ']', '=']) else {
        logf(warn, format_args!("Missing ')' in default properties subscript: {start}"));
        return (0, &inside[inside.len()..]);
    };
    if inside[end..].starts_with('=') {
        logf(warn, format_args!("Missing ')' in default properties subscript: {start}"));
        return (0, &inside[end..]);
    }
    let text = inside[..end].trim();
    let rest = &inside[end + 1..];
    let index = if text.starts_with(|c: char| c.is_alphabetic()) {
        FName::find(text).and_then(|name| objects.lookup_enum_name(name))
    } else if let Some(hex) = text.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()
    } else if text.is_empty() {
        None
    } else {
        Some(atoi(text))
    };
    match index.and_then(|index| i32::try_from(index).ok()).filter(|index| *index >= 0) {
        Some(index) => (index, rest),
        None => {
            logf(warn, format_args!("Invalid subscript in default properties: {start}"));
            (0, rest)
        }
    }
}

fn expect_char<'a>(buffer: &'a str, c: char) -> Option<&'a str> {
    skip_whitespace(buffer).strip_prefix(c)
}

/// Imports one `Name=Value` line into the container `dest` of `owner`.
///
/// Also understands `Name[i]=Value`, `Name(i)=Value` and the array operations
/// `Name.Add(v)`, `Name.Remove(v)`, `Name.RemoveIndex(i)` and `Name.Empty()`.
/// Problems are reported to `warn` and never abort the import. Returns the
/// unconsumed rest of the line.
///
/// # Safety
/// `dest` must be a container holding initialized values for every property of
/// `owner`.
pub unsafe fn import_single_property<'a>(
    buffer: &'a str,
    dest: *mut u8,
    owner: &UStruct,
    objects: &FUObjectArray,
    port_flags: EPropertyPortFlags,
    warn: &mut dyn FOutputDevice,
    defined: &mut Vec<FDefinedProperty>,
) -> &'a str {
    let start = buffer.trim_end();
    let line = skip_whitespace(buffer);
    let Some(name_end) = line.find(['=', '(', '[', '.']) else {
        if !line.trim().is_empty() {
            logf(warn, format_args!("Missing '=' in default properties assignment: {start}"));
        }
        return &line[line.len()..];
    };
    let name = line[..name_end].trim();
    let mut rest = &line[name_end..];

    let property = FName::find(name).and_then(|name| owner.find_property(name));
    let Some(property) = property else {
        logf(
            warn,
            format_args!("Unknown property in {}: {start}", owner.get_fname()),
        );
        return rest;
    };
    if !property.should_port(port_flags) {
        logf(
            warn,
            format_args!(
                "Cannot perform text import on property '{}' here: {start}",
                property.get_fname()
            ),
        );
        return rest;
    }

    let mut array_op = None;
    if let Some(after) = rest.strip_prefix('.') {
        rest = after;
        for (keyword, op) in [
            ("Empty", ArrayOp::Empty),
            ("Add", ArrayOp::Add),
            ("Remove", ArrayOp::Remove),
            ("RemoveIndex", ArrayOp::RemoveIndex),
        ] {
            if let Some(after) = parse_command(rest, keyword) {
                rest = after;
                array_op = Some(op);
                break;
            }
        }
    }

    if let Some(op) = array_op {
        let (Some(inner), Ok(mut helper)) = (
            property.inner(),
            FScriptArrayHelper::new_in_container(&property, dest, 0),
        ) else {
            logf(
                warn,
                format_args!("Array operation performed on non-array variable: {start}"),
            );
            return rest;
        };
        let Some(after) = expect_char(rest, '(') else {
            logf(
                warn,
                format_args!("Missing '(' in default properties array operation: {start}"),
            );
            return rest;
        };
        rest = skip_whitespace(after);
        let element_flags = port_flags | EPropertyPortFlags::PPF_Delimited;
        let mut errors = FStringOutputDevice::new();
        match op {
            ArrayOp::Empty => helper.empty_values(0),
            ArrayOp::Add => {
                let index = helper.add_value();
                match inner.import_text(rest, helper.get_raw_ptr(index), element_flags, objects, &mut errors) {
                    Ok(after) if after.len() != rest.len() => rest = after,
                    _ => {
                        logf(
                            warn,
                            format_args!(
                                "Unable to parse parameter value '{rest}' in defaultproperties array operation: {start}"
                            ),
                        );
                        helper.remove_values(index, 1);
                        return rest;
                    }
                }
            }
            ArrayOp::Remove => {
                let temp = TempValue::new(inner);
                match inner.import_text(rest, temp.data, element_flags, objects, &mut errors) {
                    Ok(after) if after.len() != rest.len() => rest = after,
                    _ => {
                        logf(
                            warn,
                            format_args!(
                                "Unable to parse parameter value '{rest}' in defaultproperties array operation: {start}"
                            ),
                        );
                        return rest;
                    }
                }
                let mut found = false;
                let mut index = 0;
                while index < helper.num() {
                    if inner.identical(temp.data, Some(helper.get_raw_ptr(index)), EPropertyPortFlags::PPF_None) {
                        helper.remove_values(index, 1);
                        found = true;
                    } else {
                        index += 1;
                    }
                }
                if !found {
                    logf(
                        warn,
                        format_args!("{}.Remove(): Value not found in array", property.get_fname()),
                    );
                }
            }
            ArrayOp::RemoveIndex => {
                let Some(end) = rest.find(')') else {
                    logf(
                        warn,
                        format_args!("Missing ')' in default properties array operation: {start}"),
                    );
                    return rest;
                };
                let index = atoi(&rest[..end]);
                match i32::try_from(index) {
                    Ok(index) if helper.is_valid_index(index) => helper.remove_values(index, 1),
                    _ => logf(
                        warn,
                        format_args!("Invalid index {index} for {}.RemoveIndex(): {start}", property.get_fname()),
                    ),
                }
                rest = &rest[end..];
            }
        }
        return match expect_char(rest, ')') {
            Some(after) => after,
            None => {
                logf(
                    warn,
                    format_args!("Missing ')' in default properties array operation: {start}"),
                );
                rest
            }
        };
    }

    let (index, after) = read_array_index(rest, objects, start, warn);
    rest = after;
    let is_array = property.inner().is_some();
    if !is_array && index >= property.array_dim() {
        logf(
            warn,
            format_args!(
                "Out of bound array default property ({index}/{}): {start}",
                property.array_dim()
            ),
        );
        return rest;
    }
    let defined_property = FDefinedProperty {
        property: property.get_fname(),
        index,
    };
    if defined.contains(&defined_property) {
        logf(warn, format_args!("redundant data: {start}"));
        return rest;
    }
    defined.push(defined_property);

    let Some(after) = expect_char(rest, '=') else {
        logf(warn, format_args!("Missing '=' in default properties assignment: {start}"));
        return rest;
    };
    rest = skip_whitespace(after);

    let mut errors = FStringOutputDevice::new();
    match (index, property.inner()) {
        (index, Some(inner)) if index > INDEX_NONE => {
            // a subscript on a dynamic array grows it to fit
            let Ok(mut helper) = FScriptArrayHelper::new_in_container(&property, dest, 0) else {
                return rest;
            };
            if index - helper.num() >= MAX_SUBSCRIPT_GROWTH {
                logf(
                    warn,
                    format_args!(
                        "Subscript too far past the end of dynamic array ({index}/{}): {start}",
                        helper.num()
                    ),
                );
                return rest;
            }
            helper.expand_for_index(index);
            match inner.import_text(rest, helper.get_raw_ptr(index), port_flags, objects, &mut errors) {
                Ok(after) => rest = after,
                Err(_) if !rest.is_empty() => {
                    logf(warn, format_args!("Invalid property value in defaults: {start}"))
                }
                Err(_) => {}
            }
        }
        (index, _) => {
            let value = property.container_ptr_to_value_ptr(dest, index.max(0));
            let result = property.import_text(rest, value, port_flags, objects, &mut errors);
            if !errors.is_empty() {
                for line in errors.lines() {
                    warn.log(line);
                }
            } else if matches!(result, Ok(after) if after.len() == rest.len() && !rest.is_empty()) {
                logf(warn, format_args!("Invalid property value in defaults: {start}"));
            }
            if let Ok(after) = result {
                rest = after;
            }
        }
    }
    rest
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::fundamentals::TypeFundamentals;
    use crate::script_array::FScriptArray;
    use crate::ustruct::{FStructOnScope, StructBuilder, UEnum, UScriptStruct};

    struct Fixture {
        ustruct: Arc<UScriptStruct>,
        objects: FUObjectArray,
        scope: FStructOnScope,
        defined: Vec<FDefinedProperty>,
        warnings: FStringOutputDevice,
    }

    impl Fixture {
        fn new() -> Self {
            let ustruct = StructBuilder::script_struct("ImportTestDefaults")
                .property(UProperty::int("Health"))
                .property(UProperty::int("Scores").with_array_dim(3))
                .property(UProperty::array("Values", UProperty::int("Values")))
                .property(UProperty::str("Title"))
                .build()
                .unwrap();
            let objects = FUObjectArray::new();
            objects.register_enum(Arc::new(UEnum::new(
                "EImportTestSlot",
                &[("ImportSlotA", 0), ("ImportSlotC", 2)],
            )));
            let scope = FStructOnScope::new(&ustruct).unwrap();
            Self {
                ustruct,
                objects,
                scope,
                defined: vec![],
                warnings: FStringOutputDevice::new(),
            }
        }

        fn import(&mut self, line: &str) -> String {
            unsafe {
                import_single_property(
                    line,
                    self.scope.get_struct_memory(),
                    &self.ustruct,
                    &self.objects,
                    EPropertyPortFlags::PPF_None,
                    &mut self.warnings,
                    &mut self.defined,
                )
                .to_string()
            }
        }

        fn int(&self, name: &str, index: i32) -> i32 {
            let property = self.ustruct.find_property(FName::new(name)).unwrap();
            unsafe {
                TypeFundamentals::<i32>::get_property_value(
                    property.container_ptr_to_value_ptr(self.scope.get_struct_memory(), index),
                )
            }
        }

        fn values(&self) -> Vec<i32> {
            let property = self.ustruct.find_property(FName::new("Values")).unwrap();
            let array = property
                .container_ptr_to_value_ptr(self.scope.get_struct_memory(), 0)
                .cast::<FScriptArray>();
            unsafe { (*array).as_slice::<i32>().to_vec() }
        }

        fn last_warning(&self) -> &str {
            self.warnings.lines().last().unwrap_or_default()
        }
    }

    #[test]
    fn test_assignments_and_subscripts() {
        let mut f = Fixture::new();
        assert_eq!(f.import("  Health = 25"), "");
        assert_eq!(f.int("Health", 0), 25);
        assert!(f.warnings.is_empty());

        f.import("Scores[1]=7");
        f.import("Scores(0x2)=8");
        assert_eq!((f.int("Scores", 0), f.int("Scores", 1), f.int("Scores", 2)), (0, 7, 8));

        f.import("Title=Hello there");
        let title = f.ustruct.find_property(FName::new("Title")).unwrap();
        let text = unsafe {
            TypeFundamentals::<crate::containers::FString>::get_property_value_ref(
                title.container_ptr_to_value_ptr(f.scope.get_struct_memory(), 0),
            )
        };
        assert_eq!(text.to_string(), "Hello there");
        assert!(f.warnings.is_empty());
    }

    #[test]
    fn test_enum_subscript() {
        let mut f = Fixture::new();
        f.import("Scores[ImportSlotC]=9");
        assert_eq!(f.int("Scores", 2), 9);
        f.import("Scores[NoSuchSlot]=4");
        assert!(f.last_warning().starts_with("Invalid subscript"));
        assert_eq!(f.int("Scores", 0), 4);
    }

    #[test]
    fn test_reported_problems() {
        let mut f = Fixture::new();
        f.import("Health=1");
        f.import("Health=2");
        assert_eq!(f.last_warning(), "redundant data: Health=2");
        assert_eq!(f.int("Health", 0), 1);

        f.import("Scores[3]=1");
        assert_eq!(f.last_warning(), "Out of bound array default property (3/3): Scores[3]=1");

        f.import("Missing=1");
        assert_eq!(f.last_warning(), "Unknown property in ImportTestDefaults: Missing=1");

        f.import("Health.Add(3)");
        assert!(f.last_warning().starts_with("Array operation performed on non-array variable"));

        f.import("Scores[1] 5");
        assert!(f.last_warning().starts_with("Missing '='"));

        let before = f.warnings.lines().count();
        f.import("Scores[0]=abc");
        assert!(f.warnings.lines().count() > before);
        assert_eq!(f.int("Scores", 0), 0);

        let mut f = Fixture::new();
        f.import("Scores[2 =1");
        assert!(f
            .warnings
            .as_str()
            .starts_with("Missing ')' in default properties subscript"));
        assert_eq!(f.int("Scores", 0), 1);
    }

    #[test]
    fn test_array_operations() {
        let mut f = Fixture::new();
        f.import("Values.Add(4)");
        f.import("Values.Add( 5 )");
        f.import("Values.Add(4)");
        assert_eq!(f.values(), [4, 5, 4]);

        f.import("Values.Remove(4)");
        assert_eq!(f.values(), [5]);
        f.import("Values.Remove(9)");
        assert_eq!(f.last_warning(), "Values.Remove(): Value not found in array");

        f.import("Values.Add()");
        assert!(f.last_warning().starts_with("Unable to parse parameter value"));
        assert_eq!(f.values(), [5]);

        f.import("Values.RemoveIndex(0)");
        assert!(f.values().is_empty());
        f.import("Values.RemoveIndex(3)");
        assert!(f.last_warning().starts_with("Invalid index 3"));

        f.import("Values[2]=3");
        assert_eq!(f.values(), [0, 0, 3]);
        f.import("Values.Empty()");
        assert!(f.values().is_empty());
        f.import("Values.Empty");
        assert!(f.last_warning().starts_with("Missing '('"));

        f.import("Values=(1,2)");
        assert_eq!(f.values(), [1, 2]);
    }

    #[test]
    fn test_huge_dynamic_subscripts() {
        let mut f = Fixture::new();
        f.import("Values[2147483647]=1");
        assert_eq!(
            f.last_warning(),
            "Subscript too far past the end of dynamic array (2147483647/0): Values[2147483647]=1"
        );
        f.import("Values[100000000]=1");
        assert!(f.last_warning().starts_with("Subscript too far past the end"));
        assert!(f.values().is_empty());

        f.import("Values[99999999999]=1");
        assert!(f.last_warning().starts_with("Invalid subscript"));
        assert_eq!(f.values(), [1]);

        f.import("Values[9]=2");
        assert_eq!(f.values().len(), 10);
    }
}
