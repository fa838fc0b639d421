//! Reference token streams and a mark and sweep collector driven by them.
//!
//! Every class describes where its instances hold strong object references as a
//! flat list of tokens. Fixed and dynamic arrays open a loop that the token after
//! the array's last reference closes again through its return count.

use std::collections::HashSet;
use std::fmt;
use std::mem::size_of;
use std::ptr::NonNull;

use crate::error::{PropertyError, Result};
use crate::flags::{EObjectFlags, EStructFlags};
use crate::object::{FScriptInterface, FUObjectArray, ObjectPtr, UObject, OUTER_OFFSET};
use crate::properties::{PropertyKind, UProperty};
use crate::script_array::FScriptArray;
use crate::ustruct::UStruct;

/// Reports references for objects of a class beyond what its properties describe.
pub type AddReferencedObjectsFn = fn(NonNull<UObject>, &mut dyn FReferenceCollector);
/// Reports references held by a struct value beyond what its properties describe.
pub type AddStructReferencedObjectsFn = unsafe fn(*mut u8, &mut dyn FReferenceCollector);

/// Receives object references while an object graph is traversed.
pub trait FReferenceCollector {
    /// `object` may be cleared when it no longer refers to a live object.
    fn add_referenced_object(&mut self, object: &mut ObjectPtr, referencing_object: ObjectPtr);

    fn add_referenced_objects(&mut self, objects: &mut [ObjectPtr], referencing_object: ObjectPtr) {
        for object in objects {
            self.add_referenced_object(object, referencing_object);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum EGCReferenceType {
    None,
    Object,
    /// Object reference that is never cleared, like an object's outer.
    PersistentObject,
    ArrayObject,
    ArrayStruct,
    FixedArray,
    AddStructReferencedObjects,
    AddReferencedObjects,
    EndOfStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FGCReferenceInfo {
    pub type_: EGCReferenceType,
    pub offset: u32,
    /// Number of array loops closed after this token.
    pub return_count: u32,
}

impl FGCReferenceInfo {
    pub fn new(type_: EGCReferenceType, offset: u32) -> Self {
        Self {
            type_,
            offset,
            return_count: 0,
        }
    }
}

/// Where to continue when a dynamic array is empty, relative to the skip token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FGCSkipInfo {
    pub skip_index: u32,
    pub inner_return_count: u32,
}

#[derive(Debug, Clone, Copy)]
pub enum GCToken {
    Reference(FGCReferenceInfo),
    Stride(u32),
    Count(u32),
    SkipPlaceholder,
    Skip(FGCSkipInfo),
    StructReferencer(AddStructReferencedObjectsFn),
    ObjectReferencer(AddReferencedObjectsFn),
}

#[derive(Debug, Clone, Default)]
pub struct FGCReferenceTokenStream {
    tokens: Vec<GCToken>,
}

impl FGCReferenceTokenStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GCToken> {
        self.tokens.iter()
    }

    pub fn emit_reference_info(&mut self, info: FGCReferenceInfo) {
        tracing::trace!("emit {} at {}", info.type_, info.offset);
        self.tokens.push(GCToken::Reference(info));
    }

    pub fn emit_stride(&mut self, stride: u32) {
        self.tokens.push(GCToken::Stride(stride));
    }

    pub fn emit_count(&mut self, count: u32) {
        self.tokens.push(GCToken::Count(count));
    }

    /// Returns the index to pass to [`FGCReferenceTokenStream::update_skip_index_placeholder`].
    pub fn emit_skip_index_placeholder(&mut self) -> usize {
        self.tokens.push(GCToken::SkipPlaceholder);
        self.tokens.len() - 1
    }

    /// Closes one array loop at the last emitted reference. Returns the index of the
    /// next token.
    pub fn emit_return(&mut self) -> usize {
        let last = self.tokens.iter_mut().rev().find_map(|token| match token {
            GCToken::Reference(info) => Some(info),
            _ => None,
        });
        match last {
            Some(info) => info.return_count += 1,
            None => panic!("return emitted into a token stream without references"),
        }
        self.tokens.len()
    }

    pub fn update_skip_index_placeholder(&mut self, skip_index_index: usize, skip_index: usize) {
        assert!(skip_index_index < skip_index && skip_index <= self.tokens.len());
        assert!(matches!(self.tokens[skip_index_index], GCToken::SkipPlaceholder));
        let return_count = self.return_count_before(skip_index);
        assert!(return_count >= 1, "array loop was not closed");
        self.tokens[skip_index_index] = GCToken::Skip(FGCSkipInfo {
            skip_index: (skip_index - skip_index_index) as u32,
            // the loop's own return is not part of the inner count
            inner_return_count: return_count - 1,
        });
    }

    fn return_count_before(&self, index: usize) -> u32 {
        self.tokens[..index]
            .iter()
            .rev()
            .find_map(|token| match token {
                GCToken::Reference(info) => Some(info.return_count),
                _ => None,
            })
            .unwrap_or(0)
    }

    /// Puts `other` in front of this stream, dropping its end of stream token.
    pub fn prepend_stream(&mut self, other: &FGCReferenceTokenStream) {
        let mut tokens = other.tokens.clone();
        if matches!(
            tokens.last(),
            Some(GCToken::Reference(FGCReferenceInfo {
                type_: EGCReferenceType::EndOfStream,
                ..
            }))
        ) {
            tokens.pop();
        }
        tokens.append(&mut self.tokens);
        self.tokens = tokens;
    }

    /// Sets the class callback, replacing one inherited from a super class.
    pub fn replace_or_add_add_referenced_objects_call(&mut self, callback: AddReferencedObjectsFn) {
        let existing = self.tokens.iter_mut().find(|token| matches!(token, GCToken::ObjectReferencer(_)));
        match existing {
            Some(token) => *token = GCToken::ObjectReferencer(callback),
            None => {
                self.emit_reference_info(FGCReferenceInfo::new(EGCReferenceType::AddReferencedObjects, 0));
                self.tokens.push(GCToken::ObjectReferencer(callback));
            }
        }
    }

    fn reference_at(&self, index: usize) -> Result<FGCReferenceInfo> {
        match self.tokens.get(index) {
            Some(GCToken::Reference(info)) => Ok(*info),
            other => Err(self.corrupt(index, other)),
        }
    }

    fn read_stride(&self, index: &mut usize) -> Result<usize> {
        let token = self.tokens.get(*index);
        *index += 1;
        match token {
            Some(GCToken::Stride(stride)) => Ok(*stride as usize),
            other => Err(self.corrupt(*index - 1, other)),
        }
    }

    fn read_count(&self, index: &mut usize) -> Result<i32> {
        let token = self.tokens.get(*index);
        *index += 1;
        match token {
            Some(GCToken::Count(count)) => Ok(*count as i32),
            other => Err(self.corrupt(*index - 1, other)),
        }
    }

    /// Returns the absolute index to continue at for an empty array.
    fn read_skip_info(&self, index: &mut usize) -> Result<(usize, FGCSkipInfo)> {
        let at = *index;
        let token = self.tokens.get(at);
        *index += 1;
        match token {
            Some(GCToken::Skip(info)) => Ok((at + info.skip_index as usize, *info)),
            other => Err(self.corrupt(at, other)),
        }
    }

    fn corrupt(&self, index: usize, token: Option<&GCToken>) -> PropertyError {
        PropertyError::Msg(format!("unexpected token {token:?} at {index} in reference token stream").into())
    }
}

impl fmt::Display for FGCReferenceTokenStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, token) in self.tokens.iter().enumerate() {
            write!(f, "{index:4} ")?;
            match token {
                GCToken::Reference(info) => {
                    write!(f, "{} offset={}", info.type_, info.offset)?;
                    if info.return_count > 0 {
                        write!(f, " return={}", info.return_count)?;
                    }
                }
                GCToken::Stride(stride) => write!(f, "  stride={stride}")?,
                GCToken::Count(count) => write!(f, "  count={count}")?,
                GCToken::SkipPlaceholder => write!(f, "  skip=?")?,
                GCToken::Skip(info) => write!(
                    f,
                    "  skip=+{} inner_return={}",
                    info.skip_index, info.inner_return_count
                )?,
                GCToken::StructReferencer(_) => write!(f, "  struct callback")?,
                GCToken::ObjectReferencer(_) => write!(f, "  class callback")?,
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Wraps the tokens emitted by `emit` in a fixed array loop when `count > 1`.
fn with_fixed_array(
    stream: &mut FGCReferenceTokenStream,
    offset: i32,
    count: i32,
    stride: usize,
    emit: impl FnOnce(&mut FGCReferenceTokenStream),
) {
    if count > 1 {
        stream.emit_reference_info(FGCReferenceInfo::new(EGCReferenceType::FixedArray, offset as u32));
        stream.emit_stride(stride as u32);
        stream.emit_count(count as u32);
    }
    emit(stream);
    if count > 1 {
        stream.emit_return();
    }
}

fn struct_emits_tokens(ustruct: &UStruct) -> bool {
    ustruct
        .struct_flags()
        .contains(EStructFlags::STRUCT_AddStructReferencedObjects)
        || ustruct.property_link().iter().any(|p| p.emits_reference_tokens())
}

impl UProperty {
    /// Whether [`UProperty::emit_reference_info`] emits anything. Class references are
    /// kept alive by the type registry and need no tokens.
    pub fn emits_reference_tokens(&self) -> bool {
        match self.kind() {
            PropertyKind::Object(_) | PropertyKind::Interface(_) => true,
            PropertyKind::Array(inner) => inner.emits_reference_tokens(),
            PropertyKind::Struct(ustruct) => struct_emits_tokens(ustruct),
            _ => false,
        }
    }

    /// Emits the tokens describing references held by this property, at offsets
    /// relative to `base_offset`.
    pub fn emit_reference_info(&self, stream: &mut FGCReferenceTokenStream, base_offset: i32) {
        let offset = base_offset + self.get_offset_for_gc();
        match self.kind() {
            PropertyKind::Object(_) => {
                with_fixed_array(stream, offset, self.array_dim(), size_of::<ObjectPtr>(), |stream| {
                    stream.emit_reference_info(FGCReferenceInfo::new(EGCReferenceType::Object, offset as u32))
                })
            }
            PropertyKind::Interface(_) => with_fixed_array(
                stream,
                offset,
                self.array_dim(),
                size_of::<FScriptInterface>(),
                |stream| stream.emit_reference_info(FGCReferenceInfo::new(EGCReferenceType::Object, offset as u32)),
            ),
            PropertyKind::Array(inner) if inner.emits_reference_tokens() => match inner.kind() {
                PropertyKind::Object(_) => {
                    stream.emit_reference_info(FGCReferenceInfo::new(EGCReferenceType::ArrayObject, offset as u32))
                }
                _ => {
                    stream.emit_reference_info(FGCReferenceInfo::new(EGCReferenceType::ArrayStruct, offset as u32));
                    stream.emit_stride(inner.element_size() as u32);
                    let skip_index_index = stream.emit_skip_index_placeholder();
                    inner.emit_reference_info(stream, 0);
                    let skip_index = stream.emit_return();
                    stream.update_skip_index_placeholder(skip_index_index, skip_index);
                }
            },
            PropertyKind::Struct(ustruct) => {
                let callback = ustruct
                    .get_link()
                    .ok()
                    .and_then(|link| link.add_struct_referenced_objects);
                if let Some(callback) = callback {
                    with_fixed_array(stream, offset, self.array_dim(), self.element_size() as usize, |stream| {
                        stream.emit_reference_info(FGCReferenceInfo::new(
                            EGCReferenceType::AddStructReferencedObjects,
                            offset as u32,
                        ));
                        stream.tokens.push(GCToken::StructReferencer(callback));
                    });
                } else if struct_emits_tokens(ustruct) {
                    with_fixed_array(stream, offset, self.array_dim(), self.element_size() as usize, |stream| {
                        for property in ustruct.property_link() {
                            property.emit_reference_info(stream, offset);
                        }
                    });
                }
            }
            _ => {}
        }
    }
}

/// Builds the token stream of a struct: its own properties after the super's stream,
/// the object header for root classes and the class callback.
pub fn assemble_reference_token_stream(ustruct: &UStruct) -> FGCReferenceTokenStream {
    let mut stream = FGCReferenceTokenStream::new();
    for property in ustruct.properties() {
        property.emit_reference_info(&mut stream, 0);
    }
    match ustruct.get_super_struct() {
        Some(super_struct) => {
            let super_stream = super_struct.reference_token_stream();
            if !super_stream.is_empty() {
                stream.prepend_stream(super_stream);
            }
        }
        None if ustruct.is_class() => {
            let mut base = FGCReferenceTokenStream::new();
            base.emit_reference_info(FGCReferenceInfo::new(
                EGCReferenceType::PersistentObject,
                OUTER_OFFSET as u32,
            ));
            stream.prepend_stream(&base);
        }
        None => {}
    }
    if let Some(callback) = ustruct.get_link().ok().and_then(|link| link.add_referenced_objects) {
        stream.replace_or_add_add_referenced_objects_call(callback);
    }
    if !stream.is_empty() {
        stream.emit_reference_info(FGCReferenceInfo::new(EGCReferenceType::EndOfStream, 0));
    }
    tracing::debug!(
        "Assembled reference token stream for '{}': {} tokens",
        ustruct.get_fname(),
        stream.len()
    );
    stream
}

/// Marks objects reachable from the roots.
struct ReachabilityCollector<'a> {
    objects: &'a FUObjectArray,
    reachable: HashSet<NonNull<UObject>>,
    pending: Vec<NonNull<UObject>>,
    eliminated: usize,
}

impl ReachabilityCollector<'_> {
    fn handle(&mut self, object: &mut ObjectPtr, allow_elimination: bool) {
        let Some(target) = *object else {
            return;
        };
        if !self.objects.is_valid(Some(target)) {
            if allow_elimination {
                *object = None;
                self.eliminated += 1;
            }
            return;
        }
        if self.reachable.insert(target) {
            self.pending.push(target);
        }
    }
}

impl FReferenceCollector for ReachabilityCollector<'_> {
    fn add_referenced_object(&mut self, object: &mut ObjectPtr, _referencing_object: ObjectPtr) {
        self.handle(object, true);
    }
}

struct StackEntry {
    data: *mut u8,
    stride: usize,
    count: i32,
    loop_start: usize,
}

/// Reports every reference `object` holds according to `stream`.
unsafe fn process_object(
    object: NonNull<UObject>,
    stream: &FGCReferenceTokenStream,
    collector: &mut ReachabilityCollector,
) -> Result<()> {
    if stream.is_empty() {
        return Ok(());
    }
    let base = object.as_ptr().cast::<u8>();
    let mut stack = vec![StackEntry {
        data: base,
        stride: 0,
        count: -1,
        loop_start: 0,
    }];
    let mut data = base;
    let mut index = 0;
    let mut return_count = 0;
    loop {
        let mut reference_index = index;
        for _ in 0..return_count {
            let Some(entry) = stack.last_mut() else {
                return Err(PropertyError::Msg("reference token stream returned too often".into()));
            };
            entry.count -= 1;
            if entry.count > 0 {
                entry.data = entry.data.add(entry.stride);
                data = entry.data;
                index = entry.loop_start;
                reference_index = entry.loop_start;
                break;
            }
            stack.pop();
            data = stack.last().map(|entry| entry.data).unwrap_or(base);
        }

        index += 1;
        let info = stream.reference_at(reference_index)?;
        let target = data.add(info.offset as usize);
        match info.type_ {
            EGCReferenceType::Object => {
                collector.handle(&mut *target.cast::<ObjectPtr>(), true);
                return_count = info.return_count;
            }
            EGCReferenceType::PersistentObject => {
                collector.handle(&mut *target.cast::<ObjectPtr>(), false);
                return_count = info.return_count;
            }
            EGCReferenceType::ArrayObject => {
                let array = &mut *target.cast::<FScriptArray>();
                for element in array.as_mut_slice::<ObjectPtr>() {
                    collector.handle(element, true);
                }
                return_count = info.return_count;
            }
            EGCReferenceType::ArrayStruct => {
                let array = &mut *target.cast::<FScriptArray>();
                let stride = stream.read_stride(&mut index)?;
                let (skip_to, skip) = stream.read_skip_info(&mut index)?;
                let entry = StackEntry {
                    data: array.get_data_mut(),
                    stride,
                    count: array.num(),
                    loop_start: index,
                };
                data = entry.data;
                if entry.count == 0 {
                    index = skip_to;
                    return_count = stream.return_count_before(skip_to) - skip.inner_return_count;
                } else {
                    return_count = 0;
                }
                stack.push(entry);
            }
            EGCReferenceType::FixedArray => {
                let stride = stream.read_stride(&mut index)?;
                let count = stream.read_count(&mut index)?;
                stack.push(StackEntry {
                    data,
                    stride,
                    count,
                    loop_start: index,
                });
                return_count = 0;
            }
            EGCReferenceType::AddStructReferencedObjects => {
                let Some(GCToken::StructReferencer(callback)) = stream.tokens.get(index).copied() else {
                    return Err(stream.corrupt(index, stream.tokens.get(index)));
                };
                index += 1;
                callback(target, collector);
                return_count = info.return_count;
            }
            EGCReferenceType::AddReferencedObjects => {
                let Some(GCToken::ObjectReferencer(callback)) = stream.tokens.get(index).copied() else {
                    return Err(stream.corrupt(index, stream.tokens.get(index)));
                };
                index += 1;
                callback(object, collector);
                return_count = info.return_count;
            }
            EGCReferenceType::EndOfStream => return Ok(()),
            EGCReferenceType::None => {
                return Err(stream.corrupt(reference_index, stream.tokens.get(reference_index)))
            }
        }
    }
}

/// Destroys every object that cannot be reached from the root set or from objects
/// carrying any of `keep_flags`. References to dead objects found on the way are
/// cleared. Returns the number of destroyed objects.
pub fn collect_garbage(objects: &mut FUObjectArray, keep_flags: EObjectFlags) -> Result<usize> {
    let root_flags = EObjectFlags::RF_MarkAsRootSet | keep_flags;
    let unreachable = {
        let mut collector = ReachabilityCollector {
            objects,
            reachable: HashSet::new(),
            pending: vec![],
            eliminated: 0,
        };
        for object in objects.iter() {
            if unsafe { object.as_ref() }.has_any_flags(root_flags) && collector.reachable.insert(object) {
                collector.pending.push(object);
            }
        }
        let roots = collector.pending.len();
        while let Some(object) = collector.pending.pop() {
            let class = unsafe { object.as_ref() }.class().clone();
            unsafe { process_object(object, class.reference_token_stream(), &mut collector)? };
        }
        tracing::debug!(
            "Marked {} reachable objects from {roots} roots, cleared {} stale references",
            collector.reachable.len(),
            collector.eliminated
        );
        objects
            .iter()
            .filter(|object| !collector.reachable.contains(object))
            .collect::<Vec<_>>()
    };
    for object in &unreachable {
        tracing::debug!("Purging {}", unsafe { object.as_ref() }.get_full_name());
        objects.destroy_object(*object)?;
    }
    tracing::debug!("Collected {} of {} objects", unreachable.len(), objects.num() + unreachable.len());
    Ok(unreachable.len())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::fundamentals::TypeFundamentals;
    use crate::name::FName;
    use crate::object::FWeakObjectPtr;
    use crate::properties::FScriptArrayHelper;
    use crate::ustruct::{StructBuilder, UClass};

    fn types(stream: &FGCReferenceTokenStream) -> Vec<String> {
        stream
            .iter()
            .map(|token| match token {
                GCToken::Reference(info) if info.return_count > 0 => {
                    format!("{}@{}^{}", info.type_, info.offset, info.return_count)
                }
                GCToken::Reference(info) => format!("{}@{}", info.type_, info.offset),
                GCToken::Stride(stride) => format!("stride {stride}"),
                GCToken::Count(count) => format!("count {count}"),
                GCToken::Skip(skip) => format!("skip {}/{}", skip.skip_index, skip.inner_return_count),
                GCToken::SkipPlaceholder => "skip ?".to_string(),
                GCToken::StructReferencer(_) => "struct callback".to_string(),
                GCToken::ObjectReferencer(_) => "class callback".to_string(),
            })
            .collect()
    }

    fn node_class() -> Arc<UClass> {
        let holder = StructBuilder::script_struct("GcTestHolder")
            .property(UProperty::int("Id"))
            .property(UProperty::object("Target", None));
        let holder_struct = holder.build().unwrap();
        StructBuilder::class("GcTestNode")
            .property(UProperty::object("Next", None))
            .property(UProperty::int("Value"))
            .property(UProperty::array("Children", UProperty::object("Children", None)))
            .property(UProperty::array("Holders", UProperty::script_struct("Holders", &holder_struct)))
            .property(UProperty::object("Pair", None).with_array_dim(2))
            .property(UProperty::weak_object("Watch", None))
            .build()
            .unwrap()
    }

    unsafe fn set_object(object: NonNull<UObject>, name: &str, index: i32, value: ObjectPtr) {
        let property = object.as_ref().class().find_property(FName::new(name)).unwrap();
        let value_ptr = property.container_ptr_to_value_ptr(object.as_ref().as_container(), index);
        TypeFundamentals::<ObjectPtr>::set_property_value(value_ptr, value);
    }

    #[test]
    fn test_token_stream_layout() {
        let class = node_class();
        let stream = class.reference_token_stream();
        let offset = |name: &str| class.find_property(FName::new(name)).unwrap().get_offset_for_gc();
        let (next, children, holders, pair) =
            (offset("Next"), offset("Children"), offset("Holders"), offset("Pair"));
        assert_eq!(
            types(stream),
            [
                format!("PersistentObject@{OUTER_OFFSET}"),
                format!("Object@{next}"),
                format!("ArrayObject@{children}"),
                format!("ArrayStruct@{holders}"),
                "stride 16".to_string(),
                "skip 2/0".to_string(),
                "Object@8^1".to_string(),
                format!("FixedArray@{pair}"),
                "stride 8".to_string(),
                "count 2".to_string(),
                format!("Object@{pair}^1"),
                "EndOfStream@0".to_string(),
            ]
        );
        assert!(stream.to_string().contains("skip=+2"));
    }

    #[test]
    fn test_prepend_drops_end_of_stream() {
        let base = node_class();
        let derived = StructBuilder::class("GcTestDerived")
            .super_struct(&base)
            .property(UProperty::object("Extra", None))
            .build()
            .unwrap();
        let base_tokens = types(base.reference_token_stream());
        let derived_tokens = types(derived.reference_token_stream());
        assert_eq!(derived_tokens.len(), base_tokens.len() + 1);
        assert_eq!(derived_tokens[..base_tokens.len() - 1], base_tokens[..base_tokens.len() - 1]);
        assert!(derived_tokens[base_tokens.len() - 1].starts_with("Object@"));
        assert_eq!(derived_tokens.last().unwrap(), "EndOfStream@0");
        assert_eq!(
            derived_tokens.iter().filter(|t| t.starts_with("EndOfStream")).count(),
            1
        );
    }

    #[test]
    fn test_nested_empty_array_skip() {
        let inner = StructBuilder::script_struct("GcTestInner")
            .property(UProperty::array("Refs", UProperty::object("Refs", None)))
            .property(UProperty::object("Last", None))
            .build()
            .unwrap();
        let outer = StructBuilder::script_struct("GcTestOuter")
            .property(UProperty::array("Items", UProperty::script_struct("Items", &inner)))
            .build()
            .unwrap();
        let mut stream = FGCReferenceTokenStream::new();
        for property in outer.properties() {
            property.emit_reference_info(&mut stream, 0);
        }
        assert_eq!(
            types(&stream),
            ["ArrayStruct@0", "stride 24", "skip 3/0", "ArrayObject@0", "Object@16^1"]
        );
    }

    #[test]
    fn test_collect_garbage() {
        let class = node_class();
        let mut objects = FUObjectArray::new();
        let mut spawn = |name: &str| {
            objects
                .new_object(&class, None, FName::new(name), EObjectFlags::RF_NoFlags)
                .unwrap()
        };
        let root = spawn("Root");
        let child = spawn("Child");
        let grandchild = spawn("Grandchild");
        let held = spawn("Held");
        let paired = spawn("Paired");
        let orphan = spawn("Orphan");
        let back_reference = spawn("BackReference");
        let kept = spawn("Kept");
        objects.add_to_root(root);
        unsafe {
            (*kept.as_ptr()).set_flags(EObjectFlags::RF_Standalone);
            set_object(root, "Next", 0, Some(child));
            set_object(root, "Pair", 1, Some(paired));
            set_object(back_reference, "Next", 0, Some(root));

            let children = class.find_property(FName::new("Children")).unwrap();
            let mut helper = FScriptArrayHelper::new_in_container(&children, child.as_ref().as_container(), 0).unwrap();
            let index = helper.add_value();
            TypeFundamentals::<ObjectPtr>::set_property_value(helper.get_raw_ptr(index), Some(grandchild));

            let holders = class.find_property(FName::new("Holders")).unwrap();
            let mut helper =
                FScriptArrayHelper::new_in_container(&holders, grandchild.as_ref().as_container(), 0).unwrap();
            helper.add_values(2);
            let PropertyKind::Array(inner) = holders.kind() else { unreachable!() };
            let holder = inner.script_struct_type().unwrap();
            let target = holder.find_property(FName::new("Target")).unwrap();
            TypeFundamentals::<ObjectPtr>::set_property_value(
                target.container_ptr_to_value_ptr(helper.get_raw_ptr(1), 0),
                Some(held),
            );

            let watch = class.find_property(FName::new("Watch")).unwrap();
            TypeFundamentals::<FWeakObjectPtr>::set_property_value(
                watch.container_ptr_to_value_ptr(root.as_ref().as_container(), 0),
                FWeakObjectPtr::new(Some(orphan), &objects),
            );
        }

        let purged = collect_garbage(&mut objects, EObjectFlags::RF_Standalone).unwrap();
        assert_eq!(purged, 2);
        for object in [root, child, grandchild, held, paired, kept] {
            assert!(objects.is_valid(Some(object)));
        }
        assert!(!objects.is_valid(Some(orphan)));
        assert!(!objects.is_valid(Some(back_reference)));
        let watch = class.find_property(FName::new("Watch")).unwrap();
        let weak = unsafe {
            TypeFundamentals::<FWeakObjectPtr>::get_property_value(
                watch.container_ptr_to_value_ptr(root.as_ref().as_container(), 0),
            )
        };
        assert!(weak.is_stale(&objects));

        // without the standalone flag kept is only reachable from nothing
        let purged = collect_garbage(&mut objects, EObjectFlags::RF_NoFlags).unwrap();
        assert_eq!(purged, 1);
        assert!(!objects.is_valid(Some(kept)));
    }

    fn keep_secret(object: NonNull<UObject>, collector: &mut dyn FReferenceCollector) {
        unsafe {
            let property = object.as_ref().class().find_property(FName::new("Secret")).unwrap();
            let raw = TypeFundamentals::<u64>::get_property_value(
                property.container_ptr_to_value_ptr(object.as_ref().as_container(), 0),
            );
            let mut secret = NonNull::new(raw as usize as *mut UObject);
            collector.add_referenced_object(&mut secret, Some(object));
        }
    }

    #[test]
    fn test_add_referenced_objects_callback() {
        let class = StructBuilder::class("GcTestSecretive")
            .property(UProperty::uint64("Secret"))
            .add_referenced_objects(keep_secret)
            .build()
            .unwrap();
        assert!(types(class.reference_token_stream()).contains(&"class callback".to_string()));

        let mut objects = FUObjectArray::new();
        let owner = objects
            .new_object(&class, None, FName::new("Owner"), EObjectFlags::RF_NoFlags)
            .unwrap();
        let hidden = objects
            .new_object(&class, None, FName::new("Hidden"), EObjectFlags::RF_NoFlags)
            .unwrap();
        objects.add_to_root(owner);
        unsafe {
            let property = class.find_property(FName::new("Secret")).unwrap();
            TypeFundamentals::<u64>::set_property_value(
                property.container_ptr_to_value_ptr(owner.as_ref().as_container(), 0),
                hidden.as_ptr() as usize as u64,
            );
        }
        assert_eq!(collect_garbage(&mut objects, EObjectFlags::RF_NoFlags).unwrap(), 0);
        assert!(objects.is_valid(Some(hidden)));
    }
}
