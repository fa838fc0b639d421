//! Type descriptors: plain structs, script structs, classes and functions, plus enums.
//!
//! A [`UStruct`] is declared first and linked once. Linking lays out the properties,
//! derives the struct flags and builds the traversal lists every value operation
//! walks. Declaring before linking lets properties refer back to their own struct.

use std::fmt;
use std::ptr::{self, NonNull};
use std::sync::{Arc, OnceLock};

use itertools::Itertools;

use crate::archive::{Archive, FPropertyTag};
use crate::error::{bail_out, PropertyError, Result};
use crate::flags::{
    EClassCastFlags, EClassFlags, EFunctionFlags, EPropertyFlags, EPropertyPortFlags, EStructFlags,
};
use crate::gc::{
    assemble_reference_token_stream, AddReferencedObjectsFn, AddStructReferencedObjectsFn,
    FGCReferenceTokenStream,
};
use crate::malloc;
use crate::name::{FName, NAME_NONE};
use crate::object::{FUObjectArray, UObject};
use crate::properties::{align, import_single_property, FDefinedProperty, PropertyKind, UProperty};
use crate::text::{logf, skip_whitespace, FOutputDevice};

pub type UClass = UStruct;
pub type UScriptStruct = UStruct;
pub type UFunction = UStruct;

/// Named integer constants, as referenced by enum backed byte properties.
#[derive(Debug)]
pub struct UEnum {
    name: FName,
    names: Vec<(FName, i64)>,
}

impl UEnum {
    pub fn new(name: &str, entries: &[(&str, i64)]) -> Self {
        Self {
            name: FName::new(name),
            names: entries
                .iter()
                .map(|(entry, value)| (FName::new(entry), *value))
                .collect(),
        }
    }

    pub fn get_fname(&self) -> FName {
        self.name
    }

    pub fn num_enums(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[(FName, i64)] {
        &self.names
    }

    pub fn get_name_by_index(&self, index: usize) -> Option<FName> {
        self.names.get(index).map(|(name, _)| *name)
    }

    pub fn get_name_by_value(&self, value: i64) -> Option<FName> {
        self.names
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(name, _)| *name)
    }

    pub fn get_value_by_name(&self, name: FName) -> Option<i64> {
        self.names.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }

    pub fn is_valid_enum_value(&self, value: i64) -> bool {
        self.get_name_by_value(value).is_some()
    }

    /// Largest value of any entry, zero for an empty enum.
    pub fn max_enum_value(&self) -> i64 {
        self.names.iter().map(|(_, v)| *v).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum StructKind {
    Struct,
    ScriptStruct,
    Class,
    Function,
}

/// An interface listed by a class.
#[derive(Debug, Clone)]
pub struct FImplementedInterface {
    pub class: Arc<UClass>,
    pub pointer_offset: i32,
}

/// A member of a struct's field list.
#[derive(Debug, Clone)]
pub enum UField {
    Property(Arc<UProperty>),
    Function(Arc<UFunction>),
    Enum(Arc<UEnum>),
}

impl UField {
    pub fn get_fname(&self) -> FName {
        match self {
            UField::Property(property) => property.get_fname(),
            UField::Function(function) => function.get_fname(),
            UField::Enum(uenum) => uenum.get_fname(),
        }
    }

    pub fn as_property(&self) -> Option<&Arc<UProperty>> {
        match self {
            UField::Property(property) => Some(property),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Arc<UFunction>> {
        match self {
            UField::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&Arc<UEnum>> {
        match self {
            UField::Enum(uenum) => Some(uenum),
            _ => None,
        }
    }
}

/// Everything decided when a struct is linked.
pub struct StructLink {
    pub super_struct: Option<Arc<UStruct>>,
    /// Own fields in declaration order.
    pub children: Vec<UField>,
    /// Every property including inherited ones: own first, then the super's link.
    pub property_link: Vec<Arc<UProperty>>,
    /// Properties holding strong object references.
    pub ref_link: Vec<Arc<UProperty>>,
    /// Properties that need destruction.
    pub destructor_link: Vec<Arc<UProperty>>,
    /// Properties that are not zero constructible.
    pub post_construct_link: Vec<Arc<UProperty>>,
    pub properties_size: i32,
    pub min_alignment: i32,
    pub struct_flags: EStructFlags,
    pub class_flags: EClassFlags,
    pub class_cast_flags: EClassCastFlags,
    pub function_flags: EFunctionFlags,
    pub interfaces: Vec<FImplementedInterface>,
    pub add_referenced_objects: Option<AddReferencedObjectsFn>,
    pub add_struct_referenced_objects: Option<AddStructReferencedObjectsFn>,
}

pub struct UStruct {
    name: FName,
    kind: StructKind,
    link: OnceLock<StructLink>,
    reference_token_stream: OnceLock<FGCReferenceTokenStream>,
}

impl fmt::Debug for UStruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("UStruct");
        s.field("name", &self.name).field("kind", &self.kind);
        if let Some(link) = self.link.get() {
            s.field("super", &link.super_struct.as_ref().map(|s| s.get_fname()))
                .field("size", &link.properties_size)
                .field("alignment", &link.min_alignment)
                .field(
                    "children",
                    &link.children.iter().map(UField::get_fname).collect_vec(),
                );
        }
        s.finish()
    }
}

/// Types compare by identity.
impl PartialEq for UStruct {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self, other)
    }
}

impl Eq for UStruct {}

impl UStruct {
    pub fn get_fname(&self) -> FName {
        self.name
    }

    pub fn kind(&self) -> StructKind {
        self.kind
    }

    pub fn is_class(&self) -> bool {
        self.kind == StructKind::Class
    }

    pub fn is_script_struct(&self) -> bool {
        self.kind == StructKind::ScriptStruct
    }

    pub fn is_function(&self) -> bool {
        self.kind == StructKind::Function
    }

    pub fn is_linked(&self) -> bool {
        self.link.get().is_some()
    }

    pub fn get_link(&self) -> Result<&StructLink> {
        self.link.get().ok_or(PropertyError::NotLinked(self.name))
    }

    pub fn get_super_struct(&self) -> Option<&Arc<UStruct>> {
        self.link.get()?.super_struct.as_ref()
    }

    pub fn children(&self) -> &[UField] {
        self.link.get().map(|link| &link.children[..]).unwrap_or_default()
    }

    /// Own properties in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = &Arc<UProperty>> {
        self.children().iter().filter_map(UField::as_property)
    }

    pub fn property_link(&self) -> &[Arc<UProperty>] {
        self.link
            .get()
            .map(|link| &link.property_link[..])
            .unwrap_or_default()
    }

    pub fn properties_size(&self) -> i32 {
        self.link.get().map(|link| link.properties_size).unwrap_or(0)
    }

    pub fn min_alignment(&self) -> i32 {
        self.link.get().map(|link| link.min_alignment).unwrap_or(1)
    }

    /// Distance between consecutive values in an array of this struct.
    pub fn get_structure_size(&self) -> i32 {
        align(self.properties_size(), self.min_alignment())
    }

    pub fn struct_flags(&self) -> EStructFlags {
        self.link
            .get()
            .map(|link| link.struct_flags)
            .unwrap_or(EStructFlags::STRUCT_NoFlags)
    }

    pub fn class_flags(&self) -> EClassFlags {
        self.link
            .get()
            .map(|link| link.class_flags)
            .unwrap_or(EClassFlags::CLASS_None)
    }

    pub fn has_any_class_flags(&self, flags: EClassFlags) -> bool {
        self.class_flags().intersects(flags)
    }

    pub fn class_cast_flags(&self) -> EClassCastFlags {
        self.link
            .get()
            .map(|link| link.class_cast_flags)
            .unwrap_or(EClassCastFlags::CASTCLASS_None)
    }

    pub fn function_flags(&self) -> EFunctionFlags {
        self.link
            .get()
            .map(|link| link.function_flags)
            .unwrap_or(EFunctionFlags::FUNC_None)
    }

    pub fn interfaces(&self) -> &[FImplementedInterface] {
        self.link
            .get()
            .map(|link| &link.interfaces[..])
            .unwrap_or_default()
    }

    /// This struct followed by its supers.
    pub fn super_chain(&self) -> impl Iterator<Item = &UStruct> {
        std::iter::successors(Some(self), |s| s.get_super_struct().map(|s| &**s))
    }

    pub fn is_child_of(&self, other: &UStruct) -> bool {
        self.super_chain().any(|s| ptr::eq(s, other))
    }

    pub fn implements_interface(&self, interface: &UClass) -> bool {
        self.super_chain().any(|class| {
            class
                .interfaces()
                .iter()
                .any(|implemented| implemented.class.is_child_of(interface))
        })
    }

    /// Finds a property of this struct or any super.
    pub fn find_property(&self, name: FName) -> Option<Arc<UProperty>> {
        self.super_chain()
            .find_map(|s| s.properties().find(|p| p.get_fname() == name).cloned())
    }

    /// Finds a function of this class or any super.
    pub fn find_function(&self, name: FName) -> Option<Arc<UFunction>> {
        self.super_chain().find_map(|s| {
            s.children()
                .iter()
                .filter_map(UField::as_function)
                .find(|f| f.get_fname() == name)
                .cloned()
        })
    }

    /// Parameters of a function in declaration order.
    pub fn parameters(&self) -> impl Iterator<Item = &Arc<UProperty>> {
        self.properties()
            .filter(|p| p.has_any_property_flags(EPropertyFlags::CPF_Parm))
    }

    pub fn num_parms(&self) -> usize {
        self.parameters().count()
    }

    /// Whether a function with this signature can be bound where `other` is expected.
    pub fn is_signature_compatible_with(&self, other: &UFunction) -> bool {
        if ptr::eq(self, other) {
            return true;
        }
        let compared = EPropertyFlags::CPF_ParmFlags - EPropertyFlags::CPF_ConstParm;
        self.parameters()
            .zip_longest(other.parameters())
            .all(|pair| match pair {
                itertools::EitherOrBoth::Both(a, b) => {
                    a.same_type(b)
                        && (a.property_flags() & compared) == (b.property_flags() & compared)
                }
                _ => false,
            })
    }

    /// Garbage collection tokens describing where instances hold references.
    pub fn reference_token_stream(&self) -> &FGCReferenceTokenStream {
        self.reference_token_stream
            .get_or_init(|| assemble_reference_token_stream(self))
    }

    /// Start of the first property that is not part of the object header.
    fn first_property_offset(&self) -> i32 {
        match self.kind {
            StructKind::Class => std::mem::size_of::<UObject>() as i32,
            _ => 0,
        }
    }

    // value operations

    /// Constructs `count` consecutive values in zeroed or uninitialized memory.
    /// For classes only the property range after the object header is touched.
    ///
    /// # Safety
    /// `dest` must be valid for writes of `count` structure sizes.
    pub unsafe fn initialize_struct(&self, dest: *mut u8, count: i32) {
        let Some(link) = self.link.get() else {
            return;
        };
        let stride = self.get_structure_size() as usize;
        if link.struct_flags.contains(EStructFlags::STRUCT_ZeroConstructor) && !self.is_class() {
            ptr::write_bytes(dest, 0, stride * count as usize);
            return;
        }
        for index in 0..count as usize {
            let element = dest.add(index * stride);
            if !self.is_class() {
                ptr::write_bytes(element, 0, stride);
            } else {
                let start = self.first_property_offset() as usize;
                ptr::write_bytes(element.add(start), 0, stride.saturating_sub(start));
            }
            for property in &link.post_construct_link {
                property.initialize_value_in_container(element);
            }
        }
    }

    /// # Safety
    /// `dest` must hold `count` initialized values of this struct.
    pub unsafe fn destroy_struct(&self, dest: *mut u8, count: i32) {
        let Some(link) = self.link.get() else {
            return;
        };
        if link.struct_flags.contains(EStructFlags::STRUCT_NoDestructor) && !self.is_class() {
            return;
        }
        let stride = self.get_structure_size() as usize;
        for index in 0..count as usize {
            let element = dest.add(index * stride);
            for property in &link.destructor_link {
                property.destroy_value_in_container(element);
            }
        }
    }

    /// # Safety
    /// Both pointers must hold `count` initialized values of this struct.
    pub unsafe fn copy_script_struct(&self, dest: *mut u8, src: *const u8, count: i32) {
        let Some(link) = self.link.get() else {
            return;
        };
        let stride = self.get_structure_size() as usize;
        if link.struct_flags.contains(EStructFlags::STRUCT_IsPlainOldData) {
            ptr::copy_nonoverlapping(src, dest, stride * count as usize);
            return;
        }
        for index in 0..count as usize {
            let offset = index * stride;
            for property in &link.property_link {
                property.copy_complete_value_in_container(dest.add(offset), src.add(offset));
            }
        }
    }

    /// Compares two values property by property. A missing `b` compares against a
    /// default constructed value.
    ///
    /// # Safety
    /// `a` and `b` must hold initialized values of this struct.
    pub unsafe fn compare_script_struct(
        &self,
        a: *const u8,
        b: Option<*const u8>,
        port_flags: EPropertyPortFlags,
    ) -> bool {
        let Some(b) = b else {
            let Ok(defaults) = ScratchValue::new(self) else {
                return false;
            };
            return self.compare_script_struct(a, Some(defaults.memory), port_flags);
        };
        self.property_link().iter().all(|property| {
            (0..property.array_dim())
                .all(|index| property.identical_in_container(a, Some(b), index, port_flags))
        })
    }

    /// Resets every property of `count` values to its default.
    ///
    /// # Safety
    /// `dest` must hold `count` initialized values of this struct.
    pub unsafe fn clear_script_struct(&self, dest: *mut u8, count: i32) {
        let stride = self.get_structure_size() as usize;
        for index in 0..count as usize {
            let element = dest.add(index * stride);
            for property in self.property_link() {
                for array_index in 0..property.array_dim() {
                    property.clear_value_in_container(element, array_index);
                }
            }
        }
    }

    // binary

    /// Serializes every property in link order without tags.
    ///
    /// # Safety
    /// `data` must hold an initialized value of this struct.
    pub unsafe fn serialize_bin(&self, ar: &mut dyn Archive, data: *mut u8) -> Result<()> {
        for property in self.get_link()?.property_link.iter() {
            property.serialize_bin_property(ar, data)?;
        }
        Ok(())
    }

    /// Like [`UStruct::serialize_bin`] but elements matching `defaults` are left out.
    ///
    /// # Safety
    /// `data` and `defaults` must hold initialized values of this struct.
    pub unsafe fn serialize_bin_ex(
        &self,
        ar: &mut dyn Archive,
        data: *mut u8,
        defaults: Option<*const u8>,
        default_struct: Option<&UStruct>,
    ) -> Result<()> {
        if defaults.is_none() {
            return self.serialize_bin(ar, data);
        }
        for property in self.get_link()?.property_link.iter() {
            property.serialize_non_matching_bin_property(ar, data, defaults, default_struct)?;
        }
        Ok(())
    }

    /// Serializes properties as tag and value pairs ended by a `None` tag.
    ///
    /// Saving writes the elements that differ from `defaults`. Loading skips tags that
    /// name unknown properties or whose type no longer matches.
    ///
    /// # Safety
    /// `data` and `defaults` must hold initialized values of this struct.
    pub unsafe fn serialize_tagged_properties(
        &self,
        ar: &mut dyn Archive,
        data: *mut u8,
        default_struct: Option<&UStruct>,
        defaults: Option<*const u8>,
    ) -> Result<()> {
        if ar.is_loading() {
            self.load_tagged_properties(ar, data)
        } else {
            self.save_tagged_properties(ar, data, default_struct, defaults)
        }
    }

    unsafe fn save_tagged_properties(
        &self,
        ar: &mut dyn Archive,
        data: *mut u8,
        default_struct: Option<&UStruct>,
        defaults: Option<*const u8>,
    ) -> Result<()> {
        let write_all = ar.is_transacting() || (defaults.is_none() && !self.is_class());
        for property in self.get_link()?.property_link.iter() {
            if !property.should_serialize_value(ar) {
                continue;
            }
            for index in 0..property.array_dim() {
                let value = property.container_ptr_to_value_ptr(data, index);
                let default =
                    property.container_ptr_to_value_ptr_for_defaults(default_struct, defaults, index);
                if !write_all && property.identical(value, default, ar.port_flags()) {
                    continue;
                }
                let mut tag = FPropertyTag::new(property, index, value);
                tag.serialize(ar)?;
                if matches!(property.kind(), PropertyKind::Bool(_)) {
                    continue;
                }
                let start = ar.tell();
                property.serialize_item(ar, value, default)?;
                let end = ar.tell();
                let mut size = i32::try_from(end - start)
                    .map_err(|_| PropertyError::Archive("property value too large".into()))?;
                ar.seek(tag.size_offset)?;
                ar.serialize_i32(&mut size)?;
                ar.seek(end)?;
            }
        }
        let mut terminator = NAME_NONE;
        ar.serialize_name(&mut terminator)
    }

    unsafe fn load_tagged_properties(&self, ar: &mut dyn Archive, data: *mut u8) -> Result<()> {
        loop {
            let mut tag = FPropertyTag::default();
            tag.serialize(ar)?;
            if tag.name.is_none() {
                return Ok(());
            }
            let start = ar.tell();
            if tag.size < 0 {
                return Err(PropertyError::Archive(
                    format!("{}: tag {} has negative size {}", self.name, tag.name, tag.size).into(),
                ));
            }
            let skip_to = start + i64::from(tag.size);
            if skip_to > ar.total_size() {
                return Err(PropertyError::Archive(
                    format!(
                        "{}: tag {} of size {} runs past the end of the archive",
                        self.name, tag.name, tag.size
                    )
                    .into(),
                ));
            }
            let property = self
                .find_property(tag.name)
                .filter(|property| property.should_serialize_value(ar));
            let Some(property) = property else {
                tracing::warn!("{}: skipping unknown property {} ({})", self.name, tag.name, tag.type_);
                ar.seek(skip_to)?;
                continue;
            };
            if tag.array_index < 0 || tag.array_index >= property.array_dim() {
                tracing::warn!(
                    "{}: array index {} out of range for {}[{}]",
                    self.name,
                    tag.array_index,
                    tag.name,
                    property.array_dim()
                );
                ar.seek(skip_to)?;
                continue;
            }
            let value = property.container_ptr_to_value_ptr(data, tag.array_index);

            if tag.type_ != property.get_id() {
                if !property.convert_from_tag(&tag, ar, value)? {
                    tracing::warn!(
                        "{}: type mismatch for {}, expected {} but found {}",
                        self.name,
                        tag.name,
                        property.get_id(),
                        tag.type_
                    );
                }
                ar.seek(skip_to)?;
                continue;
            }
            let matches = match property.kind() {
                PropertyKind::Struct(ustruct) => tag.struct_name == ustruct.get_fname(),
                PropertyKind::Array(inner) => tag.inner_type.is_none() || tag.inner_type == inner.get_id(),
                _ => true,
            };
            if !matches {
                tracing::warn!(
                    "{}: skipping {} whose stored layout ({} {}) no longer matches",
                    self.name,
                    tag.name,
                    tag.struct_name,
                    tag.inner_type
                );
                ar.seek(skip_to)?;
                continue;
            }

            match property.kind() {
                PropertyKind::Bool(b) => b.set_property_value(value, tag.bool_val != 0),
                _ => {
                    property.serialize_item(ar, value, None)?;
                    if ar.tell() != skip_to {
                        tracing::warn!(
                            "{}: {} read {} bytes but the tag says {}",
                            self.name,
                            tag.name,
                            ar.tell() - start,
                            tag.size
                        );
                        ar.seek(skip_to)?;
                    }
                }
            }
        }
    }

    // text

    /// Exports a struct value as `(Name=Value,Arr[1]=Value)`, leaving out properties
    /// identical to `default`. Writes nothing when every property matches.
    ///
    /// # Safety
    /// `value` and `default` must hold initialized values of this struct.
    pub unsafe fn export_text(
        &self,
        out: &mut String,
        value: *const u8,
        default: Option<*const u8>,
        port_flags: EPropertyPortFlags,
        objects: &FUObjectArray,
    ) {
        // atomic structs are exported as a unit
        let default = if self.struct_flags().contains(EStructFlags::STRUCT_Atomic) {
            Some(value)
        } else {
            default
        };
        let mut count = 0;
        for property in self.property_link() {
            if !property.should_port(port_flags) {
                continue;
            }
            for index in 0..property.array_dim() {
                let mut inner = String::new();
                if !property.export_text_in_container(
                    index,
                    &mut inner,
                    value,
                    default,
                    Some(self),
                    port_flags | EPropertyPortFlags::PPF_Delimited,
                    objects,
                ) {
                    continue;
                }
                count += 1;
                out.push(if count == 1 { '(' } else { ',' });
                if property.array_dim() == 1 {
                    out.push_str(&format!("{}=", property.get_fname()));
                } else {
                    out.push_str(&format!("{}[{index}]=", property.get_fname()));
                }
                out.push_str(&inner);
            }
        }
        if count > 0 {
            out.push(')');
        }
    }

    /// Imports the text form written by [`UStruct::export_text`]. Field level problems
    /// are reported to `error_text` and do not stop the import.
    ///
    /// # Safety
    /// `data` must hold an initialized value of this struct.
    pub unsafe fn import_text<'a>(
        &self,
        buffer: &'a str,
        data: *mut u8,
        port_flags: EPropertyPortFlags,
        objects: &FUObjectArray,
        error_text: &mut dyn FOutputDevice,
    ) -> Result<&'a str> {
        let Some(mut rest) = buffer.strip_prefix('(') else {
            bail_out!("Missing opening parenthesis: {buffer}");
        };
        let mut defined: Vec<FDefinedProperty> = vec![];
        loop {
            rest = skip_whitespace(rest);
            if let Some(after) = rest.strip_prefix(')') {
                return Ok(after);
            }
            if rest.is_empty() {
                bail_out!("Missing closing parenthesis: {buffer}");
            }
            rest = import_single_property(
                rest,
                data,
                self,
                objects,
                port_flags | EPropertyPortFlags::PPF_Delimited,
                error_text,
                &mut defined,
            );
            rest = skip_remaining_value(skip_whitespace(rest), buffer)?;
            match rest.chars().next() {
                Some(',') => rest = &rest[1..],
                Some(')') => {}
                _ => bail_out!("Missing closing parenthesis: {buffer}"),
            }
        }
    }

    /// Writes one `Name=Value` line per element that differs from `defaults`. Static
    /// array elements are written as `Name(i)=Value`.
    ///
    /// # Safety
    /// `container` and `defaults` must hold initialized values of this struct.
    pub unsafe fn export_properties(
        &self,
        out: &mut String,
        container: *const u8,
        defaults: Option<*const u8>,
        port_flags: EPropertyPortFlags,
        objects: &FUObjectArray,
    ) {
        for property in self.property_link() {
            if !property.should_port(port_flags) {
                continue;
            }
            for index in 0..property.array_dim() {
                let mut value = String::new();
                let default_struct = defaults.map(|_| self);
                if !property.export_text_in_container(
                    index,
                    &mut value,
                    container,
                    defaults,
                    default_struct,
                    port_flags,
                    objects,
                ) {
                    continue;
                }
                if property.array_dim() == 1 {
                    out.push_str(&format!("{}={value}\n", property.get_fname()));
                } else {
                    out.push_str(&format!("{}({index})={value}\n", property.get_fname()));
                }
            }
        }
    }

    /// Imports `Name=Value` assignments, one per line.
    ///
    /// # Safety
    /// `dest` must hold an initialized value of this struct.
    pub unsafe fn import_properties(
        &self,
        buffer: &str,
        dest: *mut u8,
        port_flags: EPropertyPortFlags,
        objects: &FUObjectArray,
        warn: &mut dyn FOutputDevice,
    ) {
        let mut defined = vec![];
        for line in buffer.lines().map(str::trim).filter(|line| !line.is_empty()) {
            let rest = import_single_property(line, dest, self, objects, port_flags, warn, &mut defined);
            if !rest.trim().is_empty() {
                logf(warn, format_args!("Unexpected text after assignment: {rest}"));
            }
        }
    }
}

/// Skips to the `,` or `)` ending the current field, honoring nested parentheses and
/// quoted strings.
fn skip_remaining_value<'a>(rest: &'a str, whole: &str) -> Result<&'a str> {
    let mut depth = 0;
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\r' | '\n' => return Ok(&rest[i..]),
            ')' | ',' if depth == 0 => return Ok(&rest[i..]),
            '"' => {
                let closed = chars.by_ref().find(|(_, c)| matches!(c, '"' | '\n' | '\r'));
                if !matches!(closed, Some((_, '"'))) {
                    bail_out!("Bad quoted string at: {}", &rest[i..]);
                }
            }
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
    }
    if depth > 0 {
        bail_out!("Not enough closing parenthesis in: {whole}");
    }
    Ok("")
}

/// Heap storage for one default constructed value.
struct ScratchValue<'a> {
    ustruct: &'a UStruct,
    memory: *mut u8,
}

impl<'a> ScratchValue<'a> {
    fn new(ustruct: &'a UStruct) -> Result<Self> {
        if ustruct.is_class() {
            bail_out!("'{}' is a class, create an object instead", ustruct.get_fname());
        }
        ustruct.get_link()?;
        unsafe {
            let size = ustruct.get_structure_size().max(1) as usize;
            let memory = malloc::malloc(size, ustruct.min_alignment() as usize);
            ptr::write_bytes(memory, 0, size);
            ustruct.initialize_struct(memory, 1);
            Ok(Self { ustruct, memory })
        }
    }
}

impl Drop for ScratchValue<'_> {
    fn drop(&mut self) {
        unsafe {
            self.ustruct.destroy_struct(self.memory, 1);
            malloc::free(self.memory);
        }
    }
}

/// An initialized struct value owned on the heap.
pub struct FStructOnScope {
    ustruct: Arc<UStruct>,
    memory: NonNull<u8>,
}

impl FStructOnScope {
    pub fn new(ustruct: &Arc<UStruct>) -> Result<Self> {
        let scratch = ScratchValue::new(ustruct)?;
        let memory = scratch.memory;
        std::mem::forget(scratch);
        Ok(Self {
            ustruct: ustruct.clone(),
            memory: NonNull::new(memory).ok_or(PropertyError::Msg("allocation failed".into()))?,
        })
    }

    pub fn get_struct(&self) -> &Arc<UStruct> {
        &self.ustruct
    }

    pub fn get_struct_memory(&self) -> *mut u8 {
        self.memory.as_ptr()
    }
}

impl Drop for FStructOnScope {
    fn drop(&mut self) {
        drop(ScratchValue {
            ustruct: &self.ustruct,
            memory: self.memory.as_ptr(),
        });
    }
}

impl fmt::Debug for FStructOnScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FStructOnScope")
            .field("struct", &self.ustruct.get_fname())
            .field("memory", &self.memory)
            .finish()
    }
}

enum ChildDecl {
    Property(UProperty),
    Function(Arc<UFunction>),
    Enum(Arc<UEnum>),
}

/// Describes a struct and links it.
///
/// ```
/// # use uproperty::{StructBuilder, UProperty};
/// let vector = StructBuilder::script_struct("Vector")
///     .property(UProperty::float("X"))
///     .property(UProperty::float("Y"))
///     .property(UProperty::float("Z"))
///     .build()
///     .unwrap();
/// assert_eq!(vector.properties_size(), 12);
/// ```
pub struct StructBuilder {
    name: FName,
    kind: StructKind,
    super_struct: Option<Arc<UStruct>>,
    struct_flags: EStructFlags,
    class_flags: EClassFlags,
    class_cast_flags: EClassCastFlags,
    function_flags: EFunctionFlags,
    interfaces: Vec<FImplementedInterface>,
    children: Vec<ChildDecl>,
    add_referenced_objects: Option<AddReferencedObjectsFn>,
    add_struct_referenced_objects: Option<AddStructReferencedObjectsFn>,
}

impl StructBuilder {
    fn new(name: &str, kind: StructKind) -> Self {
        Self {
            name: FName::new(name),
            kind,
            super_struct: None,
            struct_flags: EStructFlags::STRUCT_NoFlags,
            class_flags: EClassFlags::CLASS_None,
            class_cast_flags: EClassCastFlags::CASTCLASS_None,
            function_flags: EFunctionFlags::FUNC_None,
            interfaces: vec![],
            children: vec![],
            add_referenced_objects: None,
            add_struct_referenced_objects: None,
        }
    }

    pub fn plain(name: &str) -> Self {
        Self::new(name, StructKind::Struct)
    }
    pub fn script_struct(name: &str) -> Self {
        Self::new(name, StructKind::ScriptStruct)
    }
    pub fn class(name: &str) -> Self {
        Self::new(name, StructKind::Class)
    }
    pub fn function(name: &str) -> Self {
        Self::new(name, StructKind::Function)
    }

    pub fn super_struct(mut self, super_struct: &Arc<UStruct>) -> Self {
        self.super_struct = Some(super_struct.clone());
        self
    }

    /// Declared flags. Computed flags are derived when linking.
    pub fn struct_flags(mut self, flags: EStructFlags) -> Self {
        self.struct_flags |= flags - EStructFlags::STRUCT_ComputedFlags;
        self
    }

    pub fn class_flags(mut self, flags: EClassFlags) -> Self {
        self.class_flags |= flags;
        self
    }

    pub fn class_cast_flags(mut self, flags: EClassCastFlags) -> Self {
        self.class_cast_flags |= flags;
        self
    }

    pub fn function_flags(mut self, flags: EFunctionFlags) -> Self {
        self.function_flags |= flags;
        self
    }

    pub fn interface(mut self, interface: &Arc<UClass>) -> Self {
        self.interfaces.push(FImplementedInterface {
            class: interface.clone(),
            pointer_offset: 0,
        });
        self
    }

    pub fn property(mut self, property: UProperty) -> Self {
        self.children.push(ChildDecl::Property(property));
        self
    }

    pub fn with_function(mut self, function: &Arc<UFunction>) -> Self {
        self.children.push(ChildDecl::Function(function.clone()));
        self
    }

    pub fn enum_(mut self, uenum: &Arc<UEnum>) -> Self {
        self.children.push(ChildDecl::Enum(uenum.clone()));
        self
    }

    /// Reports references the token stream cannot describe, for objects of this class.
    pub fn add_referenced_objects(mut self, callback: AddReferencedObjectsFn) -> Self {
        self.add_referenced_objects = Some(callback);
        self
    }

    /// Reports references the token stream cannot describe, for values of this struct.
    pub fn add_struct_referenced_objects(mut self, callback: AddStructReferencedObjectsFn) -> Self {
        self.add_struct_referenced_objects = Some(callback);
        self
    }

    /// Creates the unlinked struct so properties can refer to it before it is linked.
    pub fn declare(&self) -> Arc<UStruct> {
        Arc::new(UStruct {
            name: self.name,
            kind: self.kind,
            link: OnceLock::new(),
            reference_token_stream: OnceLock::new(),
        })
    }

    pub fn build(self) -> Result<Arc<UStruct>> {
        let target = self.declare();
        self.link(&target)?;
        Ok(target)
    }

    /// Lays out the properties and links `target`, which must come from [`StructBuilder::declare`].
    pub fn link(self, target: &Arc<UStruct>) -> Result<()> {
        use EPropertyFlags as C;
        if target.name != self.name || target.kind != self.kind {
            bail_out!(
                "cannot link {} '{}' into {} '{}'",
                self.kind,
                self.name,
                target.kind,
                target.name
            );
        }
        if target.is_linked() {
            bail_out!("'{}' is already linked", self.name);
        }
        let super_struct = self.super_struct.clone();
        let super_link = match &super_struct {
            Some(super_struct) => {
                if super_struct.kind != self.kind {
                    bail_out!(
                        "{} '{}' cannot derive from {} '{}'",
                        self.kind,
                        self.name,
                        super_struct.kind,
                        super_struct.name
                    );
                }
                Some(super_struct.get_link()?)
            }
            None => None,
        };
        if let Some(interface) = self.interfaces.iter().find(|i| !i.class.is_class()) {
            bail_out!("'{}' is not an interface class", interface.class.get_fname());
        }

        let owner = Arc::downgrade(target);
        let (mut size, mut min_alignment) = match (super_link, self.kind) {
            (Some(link), _) => (link.properties_size, link.min_alignment),
            (None, StructKind::Class) => (
                std::mem::size_of::<UObject>() as i32,
                std::mem::align_of::<UObject>() as i32,
            ),
            (None, _) => (0, 1),
        };

        // storage byte shared by consecutive bitfields and the next free bit in it
        let mut bitfield: Option<(i32, u32)> = None;
        let mut children = vec![];
        let mut own_properties = vec![];
        for child in self.children {
            let mut property = match child {
                ChildDecl::Property(property) => property,
                ChildDecl::Function(function) => {
                    children.push(UField::Function(function));
                    continue;
                }
                ChildDecl::Enum(uenum) => {
                    children.push(UField::Enum(uenum));
                    continue;
                }
            };
            if own_properties
                .iter()
                .any(|p: &Arc<UProperty>| p.get_fname() == property.get_fname())
            {
                bail_out!("duplicate property '{}' in '{}'", property.get_fname(), self.name);
            }
            let packable = matches!(property.kind(), PropertyKind::Bool(b) if b.is_unassigned_bitfield())
                && property.array_dim() == 1;
            property.link(&owner)?;

            if let Some(offset) = property.explicit_offset() {
                property.set_offset(offset);
                size = size.max(offset + property.get_size());
                bitfield = None;
            } else if packable {
                match bitfield {
                    Some((offset, bit)) if bit < 8 => {
                        property.set_bool_size(1, false, 1 << bit);
                        property.set_offset(offset);
                        bitfield = Some((offset, bit + 1));
                    }
                    _ => {
                        property.set_bool_size(1, false, 1);
                        size = property.setup_offset(size);
                        bitfield = Some((property.get_offset_for_debug(), 1));
                    }
                }
            } else {
                size = property.setup_offset(size);
                bitfield = None;
            }
            min_alignment = min_alignment.max(property.get_min_alignment());
            tracing::trace!(
                "{}.{} at {} size {}",
                self.name,
                property.get_fname(),
                property.get_offset_for_debug(),
                property.get_size()
            );

            let property = Arc::new(property);
            children.push(UField::Property(property.clone()));
            own_properties.push(property);
        }
        let properties_size = align(size, min_alignment);

        let property_link = own_properties
            .iter()
            .cloned()
            .chain(super_link.into_iter().flat_map(|link| link.property_link.iter().cloned()))
            .collect_vec();
        let ref_link = property_link
            .iter()
            .filter(|p| p.contains_object_reference())
            .cloned()
            .collect_vec();
        let destructor_link = property_link
            .iter()
            .filter(|p| !p.has_any_property_flags(C::CPF_NoDestructor))
            .cloned()
            .collect_vec();
        let post_construct_link = property_link
            .iter()
            .filter(|p| !p.has_any_property_flags(C::CPF_ZeroConstructor))
            .cloned()
            .collect_vec();

        let mut struct_flags = self.struct_flags;
        if let Some(link) = super_link {
            struct_flags |= link.struct_flags & EStructFlags::STRUCT_Inherit;
        }
        let all = |flag: C| property_link.iter().all(|p| p.has_any_property_flags(flag));
        if all(C::CPF_IsPlainOldData) {
            struct_flags |= EStructFlags::STRUCT_IsPlainOldData;
        }
        if all(C::CPF_NoDestructor) {
            struct_flags |= EStructFlags::STRUCT_NoDestructor;
        }
        if all(C::CPF_ZeroConstructor) {
            struct_flags |= EStructFlags::STRUCT_ZeroConstructor;
        }
        if property_link
            .iter()
            .any(|p| p.contains_instanced_object_property())
        {
            struct_flags |= EStructFlags::STRUCT_HasInstancedReference;
        }
        let add_struct_referenced_objects = self
            .add_struct_referenced_objects
            .or(super_link.and_then(|link| link.add_struct_referenced_objects));
        if add_struct_referenced_objects.is_some() {
            struct_flags |= EStructFlags::STRUCT_AddStructReferencedObjects;
        }

        let mut class_cast_flags = self.class_cast_flags;
        let mut class_flags = self.class_flags;
        match self.kind {
            StructKind::Class => class_cast_flags |= EClassCastFlags::CASTCLASS_UClass,
            StructKind::ScriptStruct => class_cast_flags |= EClassCastFlags::CASTCLASS_UScriptStruct,
            StructKind::Function => class_cast_flags |= EClassCastFlags::CASTCLASS_UFunction,
            StructKind::Struct => {}
        }
        class_cast_flags |= EClassCastFlags::CASTCLASS_UField | EClassCastFlags::CASTCLASS_UStruct;
        if let Some(link) = super_link {
            class_cast_flags |= link.class_cast_flags;
            class_flags |= link.class_flags & EClassFlags::CLASS_Inherit;
        }

        tracing::debug!(
            "Linked {} '{}': size {properties_size}, alignment {min_alignment}, {} properties ({} own), flags {:?}",
            self.kind,
            self.name,
            property_link.len(),
            own_properties.len(),
            struct_flags
        );

        let link = StructLink {
            super_struct: self.super_struct,
            children,
            property_link,
            ref_link,
            destructor_link,
            post_construct_link,
            properties_size,
            min_alignment,
            struct_flags,
            class_flags,
            class_cast_flags,
            function_flags: self.function_flags,
            interfaces: self.interfaces,
            add_referenced_objects: self
                .add_referenced_objects
                .or(super_link.and_then(|link| link.add_referenced_objects)),
            add_struct_referenced_objects,
        };
        target
            .link
            .set(link)
            .map_err(|_| PropertyError::Msg(format!("'{}' is already linked", target.name).into()))
    }
}
