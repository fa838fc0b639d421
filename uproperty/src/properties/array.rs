use std::ptr;

use crate::archive::Archive;
use crate::error::{PropertyError, Result};
use crate::flags::{EPropertyFlags, EPropertyPortFlags};
use crate::object::FUObjectArray;
use crate::script_array::FScriptArray;
use crate::text::{logf, skip_whitespace, FOutputDevice};
use crate::ustruct::FStructOnScope;

use super::{PropertyKind, UProperty};

/// Typed view of the `FScriptArray` behind an array property value. Elements are
/// constructed and destroyed through the inner property.
pub struct FScriptArrayHelper<'a> {
    inner: &'a UProperty,
    array: *mut FScriptArray,
    element_size: i32,
}

impl<'a> FScriptArrayHelper<'a> {
    /// # Safety
    /// `array` must address a live value of `property`.
    pub unsafe fn new(property: &'a UProperty, array: *mut u8) -> Result<Self> {
        match property.inner() {
            Some(inner) => Ok(Self::from_inner(inner, array)),
            None => Err(PropertyError::TypeMismatch {
                property: property.get_fname(),
                expected: "array",
            }),
        }
    }

    /// # Safety
    /// `container` must hold a live value of `property`.
    pub unsafe fn new_in_container(
        property: &'a UProperty,
        container: *mut u8,
        fixed_index: i32,
    ) -> Result<Self> {
        Self::new(property, property.container_ptr_to_value_ptr(container, fixed_index))
    }

    pub(crate) unsafe fn from_inner(inner: &'a UProperty, array: *mut u8) -> Self {
        Self {
            inner,
            array: array.cast(),
            element_size: inner.element_size(),
        }
    }

    fn array(&self) -> &FScriptArray {
        unsafe { &*self.array }
    }

    fn array_mut(&mut self) -> &mut FScriptArray {
        unsafe { &mut *self.array }
    }

    pub fn inner(&self) -> &'a UProperty {
        self.inner
    }

    pub fn is_valid_index(&self, index: i32) -> bool {
        self.array().is_valid_index(index)
    }

    pub fn num(&self) -> i32 {
        self.array().num()
    }

    /// Address of element `index`, null for index 0 of an empty array.
    pub fn get_raw_ptr(&self, index: i32) -> *mut u8 {
        if self.num() == 0 {
            assert_eq!(index, 0, "index {index} into an empty array");
            return ptr::null_mut();
        }
        assert!(
            self.is_valid_index(index),
            "array index {index} out of range ({})",
            self.num()
        );
        unsafe {
            self.array()
                .get_data()
                .cast_mut()
                .add(index as usize * self.element_size as usize)
        }
    }

    pub fn empty_and_add_values(&mut self, count: i32) {
        assert!(count >= 0);
        self.empty_values(count);
        if count > 0 {
            self.add_values(count);
        }
    }

    pub fn empty_and_add_uninitialized_values(&mut self, count: i32) {
        assert!(count >= 0);
        self.empty_values(count);
        if count > 0 {
            self.add_uninitialized_values(count);
        }
    }

    /// Grows the array so `index` is valid. Returns whether it grew.
    pub fn expand_for_index(&mut self, index: i32) -> bool {
        if index >= self.num() {
            self.add_values(index - self.num() + 1);
            true
        } else {
            false
        }
    }

    pub fn resize(&mut self, new_num: i32) {
        assert!(new_num >= 0);
        let old_num = self.num();
        if new_num > old_num {
            self.add_values(new_num - old_num);
        } else if new_num < old_num {
            self.remove_values(new_num, old_num - new_num);
        }
    }

    /// Appends default constructed elements, returning the index of the first.
    pub fn add_values(&mut self, count: i32) -> i32 {
        let old_num = self.add_uninitialized_values(count);
        self.construct_items(old_num, count);
        old_num
    }

    pub fn add_value(&mut self) -> i32 {
        self.add_values(1)
    }

    pub fn add_uninitialized_values(&mut self, count: i32) -> i32 {
        assert!(count > 0);
        let element_size = self.element_size;
        self.array_mut().add(count, element_size)
    }

    pub fn insert_values(&mut self, index: i32, count: i32) {
        assert!(count > 0);
        assert!(index >= 0 && index <= self.num());
        let element_size = self.element_size;
        self.array_mut().insert(index, count, element_size);
        self.construct_items(index, count);
    }

    /// Destroys every element, keeping room for `slack` elements.
    pub fn empty_values(&mut self, slack: i32) {
        assert!(slack >= 0);
        let old_num = self.num();
        if old_num > 0 {
            self.destruct_items(0, old_num);
        }
        if old_num > 0 || slack > 0 {
            let element_size = self.element_size;
            self.array_mut().empty(slack, element_size);
        }
    }

    pub fn remove_values(&mut self, index: i32, count: i32) {
        assert!(count >= 0);
        assert!(index >= 0 && index + count <= self.num());
        self.destruct_items(index, count);
        let element_size = self.element_size;
        self.array_mut().remove(index, count, element_size);
    }

    /// Resets elements to their default values in place.
    pub fn clear_values(&mut self, index: i32, count: i32) {
        assert!(count >= 0);
        assert!(index >= 0 && index + count <= self.num());
        use EPropertyFlags as C;
        if count == 0 {
            return;
        }
        let dest = self.get_raw_ptr(index);
        unsafe {
            if self
                .inner
                .has_all_property_flags(C::CPF_ZeroConstructor | C::CPF_NoDestructor)
            {
                ptr::write_bytes(dest, 0, (count * self.element_size) as usize);
            } else {
                for i in 0..count as usize {
                    self.inner
                        .clear_value(dest.add(i * self.element_size as usize));
                }
            }
        }
    }

    pub fn swap_values(&mut self, a: i32, b: i32) {
        let element_size = self.element_size;
        self.array_mut().swap_memory(a, b, element_size);
    }

    /// Takes over the elements of `other`, leaving it empty.
    ///
    /// # Safety
    /// `other` must address a live array with the same inner property.
    pub unsafe fn move_assign(&mut self, other: *mut u8) {
        self.empty_values(0);
        self.array_mut().move_assign(&mut *other.cast::<FScriptArray>());
    }

    fn construct_items(&mut self, index: i32, count: i32) {
        debug_assert!(count > 0 && index >= 0 && index + count <= self.num());
        let dest = self.get_raw_ptr(index);
        unsafe {
            if self
                .inner
                .has_any_property_flags(EPropertyFlags::CPF_ZeroConstructor)
            {
                ptr::write_bytes(dest, 0, (count * self.element_size) as usize);
            } else {
                for i in 0..count as usize {
                    self.inner
                        .initialize_value(dest.add(i * self.element_size as usize));
                }
            }
        }
    }

    fn destruct_items(&mut self, index: i32, count: i32) {
        use EPropertyFlags as C;
        if count == 0
            || self
                .inner
                .has_any_property_flags(C::CPF_IsPlainOldData | C::CPF_NoDestructor)
        {
            return;
        }
        let dest = self.get_raw_ptr(index);
        for i in 0..count as usize {
            unsafe {
                self.inner
                    .destroy_value(dest.add(i * self.element_size as usize))
            };
        }
    }
}

pub(super) unsafe fn copy_array(inner: &UProperty, dest: *mut u8, src: *const u8) {
    let src = FScriptArrayHelper::from_inner(inner, src.cast_mut());
    let mut dest = FScriptArrayHelper::from_inner(inner, dest);
    let num = src.num();
    let pod = inner.has_any_property_flags(EPropertyFlags::CPF_IsPlainOldData);
    if pod {
        dest.empty_and_add_uninitialized_values(num);
    } else {
        dest.empty_and_add_values(num);
    }
    if num == 0 {
        return;
    }
    let size = inner.element_size() as usize;
    let (src_data, dest_data) = (src.get_raw_ptr(0), dest.get_raw_ptr(0));
    if pod {
        ptr::copy_nonoverlapping(src_data, dest_data, num as usize * size);
    } else {
        for i in 0..num as usize {
            inner.copy_complete_value(dest_data.add(i * size), src_data.add(i * size));
        }
    }
}

/// Destroys the elements and frees the storage, leaving `dest` uninitialized.
pub(super) unsafe fn destroy_array(inner: &UProperty, dest: *mut u8) {
    FScriptArrayHelper::from_inner(inner, dest).empty_values(0);
    ptr::drop_in_place(dest.cast::<FScriptArray>());
}

pub(super) unsafe fn identical_arrays(
    inner: &UProperty,
    a: *const u8,
    b: Option<*const u8>,
    port_flags: EPropertyPortFlags,
) -> bool {
    let a = FScriptArrayHelper::from_inner(inner, a.cast_mut());
    let Some(b) = b else {
        return a.num() == 0;
    };
    let b = FScriptArrayHelper::from_inner(inner, b.cast_mut());
    a.num() == b.num()
        && (0..a.num()).all(|i| inner.identical(a.get_raw_ptr(i), Some(b.get_raw_ptr(i)), port_flags))
}

/// Count followed by each element. Loading replaces the contents.
pub(super) unsafe fn serialize_array(inner: &UProperty, ar: &mut dyn Archive, value: *mut u8) -> Result<()> {
    let mut helper = FScriptArrayHelper::from_inner(inner, value);
    let mut num = helper.num();
    ar.serialize_i32(&mut num)?;
    if ar.is_loading() {
        // every element but an empty struct takes at least one byte
        let remaining = ar.total_size() - ar.tell();
        let is_struct = matches!(inner.kind, PropertyKind::Struct(_));
        if num < 0 || (i64::from(num) > remaining && !is_struct) {
            return Err(PropertyError::Archive(
                format!(
                    "array '{}' count {num} exceeds remaining {remaining} bytes",
                    inner.get_fname()
                )
                .into(),
            ));
        }
        helper.empty_and_add_values(num);
    }
    for i in 0..num {
        inner.serialize_item(ar, helper.get_raw_ptr(i), None)?;
    }
    Ok(())
}

/// `(a,b,c)`, or nothing for an empty array. Elements are compared against the
/// matching default element, struct elements against the struct defaults.
pub(super) unsafe fn export_array_text(
    inner: &UProperty,
    out: &mut String,
    value: *const u8,
    default: Option<*const u8>,
    port_flags: EPropertyPortFlags,
    objects: &FUObjectArray,
) {
    let helper = FScriptArrayHelper::from_inner(inner, value.cast_mut());
    let defaults = default.map(|default| FScriptArrayHelper::from_inner(inner, default.cast_mut()));
    let struct_defaults = match &inner.kind {
        PropertyKind::Struct(ustruct) => FStructOnScope::new(ustruct).ok(),
        _ => None,
    };
    for i in 0..helper.num() {
        out.push(if i == 0 { '(' } else { ',' });
        let element_default = match (&defaults, &struct_defaults) {
            (Some(defaults), _) if defaults.num() > i => Some(defaults.get_raw_ptr(i).cast_const()),
            (_, Some(scope)) => Some(scope.get_struct_memory().cast_const()),
            _ => None,
        };
        inner.export_text_item(
            out,
            helper.get_raw_ptr(i),
            element_default,
            port_flags | EPropertyPortFlags::PPF_Delimited,
            objects,
        );
    }
    if helper.num() > 0 {
        out.push(')');
    }
}

/// Reads `(a,b,c)`. An empty buffer or one at a delimiter empties the array, and
/// skipped entries such as `(,5)` keep their default value.
pub(super) unsafe fn import_array_text<'a>(
    inner: &UProperty,
    buffer: &'a str,
    data: *mut u8,
    port_flags: EPropertyPortFlags,
    objects: &FUObjectArray,
    error_text: &mut dyn FOutputDevice,
) -> Result<&'a str> {
    let mut helper = FScriptArrayHelper::from_inner(inner, data);
    if buffer.is_empty() || buffer.starts_with([')', ',']) {
        helper.empty_values(0);
        return Ok(buffer);
    }
    let Some(mut rest) = buffer.strip_prefix('(') else {
        return Err(PropertyError::Msg(
            format!("Missing '(' in array property value: {buffer}").into(),
        ));
    };
    helper.empty_values(0);
    rest = skip_whitespace(rest);
    let mut index = 0;
    helper.expand_for_index(0);
    while !rest.starts_with(')') {
        rest = skip_whitespace(rest);
        if !rest.starts_with(',') {
            rest = inner.import_text(
                rest,
                helper.get_raw_ptr(index),
                port_flags | EPropertyPortFlags::PPF_Delimited,
                objects,
                error_text,
            )?;
            rest = skip_whitespace(rest);
        }
        match rest.strip_prefix(',') {
            Some(after) => {
                rest = after;
                index += 1;
                helper.expand_for_index(index);
            }
            None => break,
        }
    }
    match rest.strip_prefix(')') {
        Some(rest) => Ok(rest),
        None => {
            logf(
                error_text,
                format_args!("Missing ')' in default properties subscript: {rest}"),
            );
            Err(PropertyError::Msg(
                format!("Missing ')' in array property value: {buffer}").into(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Weak;

    use super::*;
    use crate::archive::{MemoryReader, MemoryWriter};
    use crate::containers::{FString, TArray};
    use crate::fundamentals::TypeFundamentals;
    use crate::name::FName;
    use crate::text::FStringOutputDevice;

    fn linked(mut property: UProperty) -> UProperty {
        property.link(&Weak::new()).unwrap();
        property
    }

    fn ints() -> UProperty {
        linked(UProperty::array("Values", UProperty::int("Values")))
    }

    fn strings() -> UProperty {
        linked(UProperty::array("Names", UProperty::str("Names")))
    }

    fn int_values(array: &FScriptArray) -> Vec<i32> {
        array.as_slice::<i32>().to_vec()
    }

    fn string_values(array: &FScriptArray) -> Vec<String> {
        array.as_slice::<FString>().iter().map(|s| s.to_string()).collect()
    }

    fn data(array: &mut FScriptArray) -> *mut u8 {
        ptr::addr_of_mut!(*array).cast()
    }

    #[test]
    fn test_helper_rejects_non_array() {
        let property = linked(UProperty::int("Count"));
        let mut value = 0i32;
        let result = unsafe { FScriptArrayHelper::new(&property, ptr::addr_of_mut!(value).cast()) };
        assert!(matches!(result, Err(PropertyError::TypeMismatch { .. })));
    }

    #[test]
    fn test_helper_operations() {
        let property = ints();
        let mut array = FScriptArray::new();
        let mut helper = unsafe { FScriptArrayHelper::new(&property, data(&mut array)) }.unwrap();
        assert!(helper.get_raw_ptr(0).is_null());

        assert_eq!(helper.add_values(3), 0);
        for i in 0..3 {
            unsafe { TypeFundamentals::<i32>::set_property_value(helper.get_raw_ptr(i), i + 1) };
        }
        helper.insert_values(1, 2);
        assert_eq!(int_values(&array), [1, 0, 0, 2, 3]);

        let mut helper = unsafe { FScriptArrayHelper::new(&property, data(&mut array)) }.unwrap();
        helper.swap_values(0, 4);
        helper.remove_values(1, 2);
        assert_eq!(int_values(&array), [3, 2, 1]);

        let mut helper = unsafe { FScriptArrayHelper::new(&property, data(&mut array)) }.unwrap();
        assert!(helper.expand_for_index(4));
        assert!(!helper.expand_for_index(1));
        helper.clear_values(0, 1);
        assert_eq!(int_values(&array), [0, 2, 1, 0, 0]);

        let mut helper = unsafe { FScriptArrayHelper::new(&property, data(&mut array)) }.unwrap();
        helper.resize(2);
        assert_eq!(helper.num(), 2);
        helper.empty_and_add_values(2);
        assert_eq!(int_values(&array), [0, 0]);

        let mut helper = unsafe { FScriptArrayHelper::new(&property, data(&mut array)) }.unwrap();
        helper.empty_values(0);
        assert_eq!(array.num(), 0);
        assert_eq!(array.max(), 0);
    }

    #[test]
    fn test_helper_in_container() {
        #[repr(C)]
        struct Container {
            header: u64,
            values: FScriptArray,
        }
        let mut property = ints();
        property.set_offset(8);
        let mut container = Container {
            header: 0,
            values: FScriptArray::new(),
        };
        let container_ptr = ptr::addr_of_mut!(container).cast::<u8>();
        let mut helper =
            unsafe { FScriptArrayHelper::new_in_container(&property, container_ptr, 0) }.unwrap();
        helper.add_value();
        assert_eq!(container.values.num(), 1);
        assert_eq!(container.header, 0);
    }

    #[test]
    fn test_non_pod_elements_are_constructed_and_destroyed() {
        let property = strings();
        let mut a = FScriptArray::new();
        let mut b = FScriptArray::new();
        unsafe {
            let mut helper = FScriptArrayHelper::new(&property, data(&mut a)).unwrap();
            helper.add_values(2);
            TypeFundamentals::<FString>::set_property_value(helper.get_raw_ptr(0), "alpha".into());
            TypeFundamentals::<FString>::set_property_value(helper.get_raw_ptr(1), "beta".into());

            property.copy_complete_value(data(&mut b), data(&mut a));
            assert_eq!(string_values(&b), ["alpha", "beta"]);
            assert!(property.identical(data(&mut a), Some(data(&mut b)), EPropertyPortFlags::PPF_None));

            TypeFundamentals::<FString>::set_property_value(helper.get_raw_ptr(1), "gamma".into());
            assert!(!property.identical(data(&mut a), Some(data(&mut b)), EPropertyPortFlags::PPF_None));
            assert!(!property.identical(data(&mut a), None, EPropertyPortFlags::PPF_None));

            property.clear_value(data(&mut b));
            assert_eq!(b.num(), 0);
            assert!(property.identical(data(&mut b), None, EPropertyPortFlags::PPF_None));

            let mut moved = FScriptArray::new();
            let mut target = FScriptArrayHelper::new(&property, data(&mut moved)).unwrap();
            target.move_assign(data(&mut a));
            assert_eq!(string_values(&moved), ["alpha", "gamma"]);
            assert_eq!(a.num(), 0);

            property.destroy_value(data(&mut moved));
            ptr::write(ptr::addr_of_mut!(moved), FScriptArray::new());
        }
    }

    #[test]
    fn test_array_text() {
        let property = strings();
        let objects = FUObjectArray::new();
        let mut errors = FStringOutputDevice::new();
        let mut array = FScriptArray::new();
        let flags = EPropertyPortFlags::PPF_None;
        unsafe {
            let rest = property
                .import_text("(\"a\", \"b,c\",),Next", data(&mut array), flags, &objects, &mut errors)
                .unwrap();
            assert_eq!(rest, ",Next");
            assert_eq!(string_values(&array), ["a", "b,c", ""]);

            let mut out = String::new();
            property.export_text_item(&mut out, data(&mut array), None, flags, &objects);
            assert_eq!(out, "(\"a\",\"b,c\",\"\")");

            property
                .import_text("(,\"x\")", data(&mut array), flags, &objects, &mut errors)
                .unwrap();
            assert_eq!(string_values(&array), ["", "x"]);

            property.import_text("()", data(&mut array), flags, &objects, &mut errors).unwrap();
            assert_eq!(array.num(), 1);

            assert_eq!(
                property.import_text(",", data(&mut array), flags, &objects, &mut errors).unwrap(),
                ","
            );
            assert_eq!(array.num(), 0);
            out.clear();
            property.export_text_item(&mut out, data(&mut array), None, flags, &objects);
            assert!(out.is_empty());

            assert!(property
                .import_text("(\"a\"", data(&mut array), flags, &objects, &mut errors)
                .is_err());
            assert!(errors.as_str().contains("Missing ')'"));
            assert!(property
                .import_text("\"a\"", data(&mut array), flags, &objects, &mut errors)
                .is_err());
        }
    }

    #[test]
    fn test_struct_elements_export_against_default_elements() {
        let point = crate::ustruct::StructBuilder::script_struct("ArrayTestPoint")
            .property(UProperty::int("A"))
            .property(UProperty::int("B"))
            .build()
            .unwrap();
        let property = linked(UProperty::array("Points", UProperty::script_struct("Points", &point)));
        let objects = FUObjectArray::new();
        let set = |array: &mut FScriptArray, values: &[(i32, i32)]| {
            let mut helper = unsafe { FScriptArrayHelper::new(&property, data(array)) }.unwrap();
            helper.add_values(values.len() as i32);
            for (i, (a, b)) in values.iter().enumerate() {
                let element = helper.get_raw_ptr(i as i32);
                for (name, value) in [("A", *a), ("B", *b)] {
                    let field = point.find_property(FName::new(name)).unwrap();
                    unsafe {
                        TypeFundamentals::<i32>::set_property_value(field.container_ptr_to_value_ptr(element, 0), value)
                    };
                }
            }
        };
        let mut value = FScriptArray::new();
        set(&mut value, &[(1, 2), (1, 2)]);
        let mut default = FScriptArray::new();
        set(&mut default, &[(1, 0)]);

        let mut out = String::new();
        unsafe {
            property.export_text_item(
                &mut out,
                data(&mut value),
                Some(data(&mut default).cast_const()),
                EPropertyPortFlags::PPF_None,
                &objects,
            )
        };
        assert_eq!(out, "((B=2),(A=1,B=2))");
    }

    #[test]
    fn test_array_serialization() {
        let property = ints();
        let mut array: TArray<i32> = [5, -6, 7].into_iter().collect();
        let value = ptr::addr_of_mut!(array).cast::<u8>();
        let mut writer = MemoryWriter::new();
        unsafe { property.serialize_item(&mut writer, value, None) }.unwrap();
        assert_eq!(writer.bytes().len(), 4 + 3 * 4);

        let bytes = writer.into_bytes();
        let mut loaded = FScriptArray::new();
        let mut reader = MemoryReader::new(&bytes);
        unsafe { property.serialize_item(&mut reader, data(&mut loaded), None) }.unwrap();
        assert_eq!(int_values(&loaded), [5, -6, 7]);
        assert!(reader.at_end());

        let mut corrupt = bytes.clone();
        corrupt[..4].copy_from_slice(&1000i32.to_le_bytes());
        let mut reader = MemoryReader::new(&corrupt);
        assert!(unsafe { property.serialize_item(&mut reader, data(&mut loaded), None) }.is_err());
    }
}
