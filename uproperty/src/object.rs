use std::collections::HashMap;
use std::fmt;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::archive::Archive;
use crate::containers::{FString, TArray};
use crate::error::{bail_out, Result};
use crate::flags::{EClassFlags, EObjectFlags};
use crate::malloc;
use crate::name::FName;
use crate::ustruct::{UClass, UEnum, UStruct};

/// Strong, nullable object reference as stored in property memory.
pub type ObjectPtr = Option<NonNull<UObject>>;

/// Class reference as stored by class properties.
pub type ClassPtr = Option<Arc<UClass>>;

/// Header of every object. Property values of the class follow it in the same allocation.
#[repr(C)]
pub struct UObject {
    class_private: Arc<UClass>,
    name_private: FName,
    outer_private: ObjectPtr,
    object_flags: EObjectFlags,
    internal_index: i32,
}

/// Offset of the outer reference inside the header, traced by the garbage collector.
pub(crate) const OUTER_OFFSET: usize = std::mem::offset_of!(UObject, outer_private);

impl UObject {
    pub fn class(&self) -> &Arc<UClass> {
        &self.class_private
    }

    pub fn get_fname(&self) -> FName {
        self.name_private
    }

    pub fn outer(&self) -> ObjectPtr {
        self.outer_private
    }

    pub fn flags(&self) -> EObjectFlags {
        self.object_flags
    }

    pub fn has_any_flags(&self, flags: EObjectFlags) -> bool {
        self.object_flags.intersects(flags)
    }

    pub fn set_flags(&mut self, flags: EObjectFlags) {
        self.object_flags |= flags;
    }

    pub fn clear_flags(&mut self, flags: EObjectFlags) {
        self.object_flags &= !flags;
    }

    pub fn internal_index(&self) -> i32 {
        self.internal_index
    }

    pub fn is_a(&self, class: &UClass) -> bool {
        self.class_private.is_child_of(class)
    }

    /// Start of the object, the container address for its class properties.
    pub fn as_container(&self) -> *mut u8 {
        ptr::from_ref(self).cast_mut().cast()
    }

    pub fn get_path_name(&self) -> String {
        match self.outer_private {
            Some(outer) => format!(
                "{}.{}",
                unsafe { outer.as_ref() }.get_path_name(),
                self.name_private
            ),
            None => self.name_private.to_string(),
        }
    }

    pub fn get_full_name(&self) -> String {
        format!("{} {}", self.class_private.get_fname(), self.get_path_name())
    }

    /// Path name of a possibly null reference, empty for null.
    pub fn path_name_of(object: ObjectPtr) -> String {
        object
            .map(|object| unsafe { object.as_ref() }.get_path_name())
            .unwrap_or_default()
    }
}

impl fmt::Debug for UObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UObject")
            .field("class", &self.class_private.get_fname())
            .field("path", &self.get_path_name())
            .field("flags", &self.object_flags)
            .field("index", &self.internal_index)
            .finish()
    }
}

/// Persistent object identity used by lazy pointers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(C)]
pub struct FUniqueObjectGuid {
    pub a: u32,
    pub b: u32,
    pub c: u32,
    pub d: u32,
}

impl FUniqueObjectGuid {
    pub fn is_valid(&self) -> bool {
        (self.a | self.b | self.c | self.d) != 0
    }

    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.len() != 32 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let part = |i: usize| u32::from_str_radix(&text[i * 8..(i + 1) * 8], 16).ok();
        Some(Self {
            a: part(0)?,
            b: part(1)?,
            c: part(2)?,
            d: part(3)?,
        })
    }

    pub fn serialize(&mut self, ar: &mut dyn Archive) -> Result<()> {
        ar.serialize_u32(&mut self.a)?;
        ar.serialize_u32(&mut self.b)?;
        ar.serialize_u32(&mut self.c)?;
        ar.serialize_u32(&mut self.d)
    }
}

impl fmt::Display for FUniqueObjectGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}{:08X}{:08X}{:08X}", self.a, self.b, self.c, self.d)
    }
}

/// Weak reference by slot index and serial number. It resolves to null once the
/// object in the slot is destroyed, even if the slot is reused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct FWeakObjectPtr {
    object_index: i32,
    object_serial_number: i32,
}

impl FWeakObjectPtr {
    /// Null for objects the registry does not know.
    pub fn new(object: ObjectPtr, objects: &FUObjectArray) -> Self {
        match object.and_then(|object| objects.object_to_index(object)) {
            Some(index) => Self {
                object_index: index,
                object_serial_number: objects.allocate_serial_number(index),
            },
            None => Self::default(),
        }
    }

    pub fn get(&self, objects: &FUObjectArray) -> ObjectPtr {
        if self.object_serial_number == 0 {
            return None;
        }
        if objects.get_serial_number(self.object_index) != self.object_serial_number {
            return None;
        }
        objects.index_to_object(self.object_index)
    }

    pub fn is_valid(&self, objects: &FUObjectArray) -> bool {
        self.get(objects).is_some()
    }

    /// Set once but no longer resolvable.
    pub fn is_stale(&self, objects: &FUObjectArray) -> bool {
        self.object_serial_number != 0 && self.get(objects).is_none()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn object_index(&self) -> i32 {
        self.object_index
    }

    pub fn serial_number(&self) -> i32 {
        self.object_serial_number
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
#[repr(C)]
pub struct FLazyObjectPtr {
    pub weak: FWeakObjectPtr,
    pub guid: FUniqueObjectGuid,
}

impl FLazyObjectPtr {
    pub fn new(object: ObjectPtr, objects: &FUObjectArray) -> Self {
        Self {
            weak: FWeakObjectPtr::new(object, objects),
            guid: object
                .map(|object| objects.get_or_create_guid(object))
                .unwrap_or_default(),
        }
    }

    pub fn from_guid(guid: FUniqueObjectGuid) -> Self {
        Self {
            weak: Default::default(),
            guid,
        }
    }

    pub fn get(&self, objects: &FUObjectArray) -> ObjectPtr {
        self.weak
            .get(objects)
            .or_else(|| objects.find_object_by_guid(self.guid))
    }

    pub fn is_null(&self) -> bool {
        !self.guid.is_valid() && self.weak.serial_number() == 0
    }

    /// Makes sure a live referenced object has a guid recorded.
    pub fn refresh_guid(&mut self, objects: &FUObjectArray) {
        if let Some(object) = self.weak.get(objects) {
            self.guid = objects.get_or_create_guid(object);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
#[repr(C)]
pub struct FAssetPtr {
    pub weak: FWeakObjectPtr,
    pub asset_path: FString,
}

impl FAssetPtr {
    pub fn new(object: ObjectPtr, objects: &FUObjectArray) -> Self {
        Self {
            weak: FWeakObjectPtr::new(object, objects),
            asset_path: FString::from(UObject::path_name_of(object)),
        }
    }

    pub fn from_path(path: &str) -> Self {
        Self {
            weak: Default::default(),
            asset_path: FString::from(path),
        }
    }

    pub fn get(&self, objects: &FUObjectArray) -> ObjectPtr {
        self.weak.get(objects).or_else(|| {
            if self.asset_path.is_empty() {
                None
            } else {
                objects.find_object(&self.asset_path.to_string())
            }
        })
    }

    pub fn is_null(&self) -> bool {
        self.asset_path.is_empty() && self.weak.serial_number() == 0
    }

    pub fn refresh_path(&mut self, objects: &FUObjectArray) {
        if let Some(object) = self.weak.get(objects) {
            self.asset_path = FString::from(UObject::path_name_of(Some(object)));
        }
    }
}

/// Object reference paired with the address of the implemented interface.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct FScriptInterface {
    pub object: ObjectPtr,
    pub interface: Option<NonNull<u8>>,
}

impl FScriptInterface {
    pub fn new(object: ObjectPtr) -> Self {
        Self {
            object,
            interface: object.map(|object| object.cast()),
        }
    }

    pub fn get_object(&self) -> ObjectPtr {
        self.object
    }
}

/// Single function binding on a weakly referenced object.
#[derive(Debug, Clone, Default, PartialEq)]
#[repr(C)]
pub struct FScriptDelegate {
    pub object: FWeakObjectPtr,
    pub function_name: FName,
}

impl FScriptDelegate {
    pub fn bind_ufunction(object: ObjectPtr, function_name: FName, objects: &FUObjectArray) -> Self {
        Self {
            object: FWeakObjectPtr::new(object, objects),
            function_name,
        }
    }

    /// True while the object is alive and its class still has the function.
    pub fn is_bound(&self, objects: &FUObjectArray) -> bool {
        match self.object.get(objects) {
            Some(object) => unsafe { object.as_ref() }
                .class()
                .find_function(self.function_name)
                .is_some(),
            None => false,
        }
    }

    pub fn is_bound_to_object(&self, object: ObjectPtr, objects: &FUObjectArray) -> bool {
        object.is_some() && self.object.get(objects) == object
    }

    pub fn get_uobject(&self, objects: &FUObjectArray) -> ObjectPtr {
        self.object.get(objects)
    }

    pub fn unbind(&mut self) {
        *self = Self::default();
    }

    pub fn to_string(&self, objects: &FUObjectArray) -> String {
        match self.object.get(objects) {
            Some(object) => format!(
                "{}.{}",
                unsafe { object.as_ref() }.get_path_name(),
                self.function_name
            ),
            None => "None".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
#[repr(C)]
pub struct FMulticastScriptDelegate {
    pub invocation_list: TArray<FScriptDelegate>,
}

impl FMulticastScriptDelegate {
    pub fn contains(&self, delegate: &FScriptDelegate) -> bool {
        self.invocation_list.iter().any(|d| d == delegate)
    }

    pub fn add_unique(&mut self, delegate: FScriptDelegate) {
        if !self.contains(&delegate) {
            self.invocation_list.push(delegate);
        }
    }

    pub fn remove(&mut self, delegate: &FScriptDelegate) {
        self.invocation_list.retain(|d| d != delegate);
    }

    pub fn remove_all(&mut self, object: ObjectPtr, objects: &FUObjectArray) {
        self.invocation_list
            .retain(|d| !d.is_bound_to_object(object, objects));
    }

    /// Drops bindings whose objects are gone.
    pub fn compact(&mut self, objects: &FUObjectArray) {
        self.invocation_list.retain(|d| !d.object.is_stale(objects));
    }

    pub fn clear(&mut self) {
        self.invocation_list.clear();
    }

    pub fn is_bound(&self, objects: &FUObjectArray) -> bool {
        self.invocation_list.iter().any(|d| d.is_bound(objects))
    }

    pub fn num(&self) -> usize {
        self.invocation_list.len()
    }

    pub fn to_string(&self, objects: &FUObjectArray) -> String {
        let entries: Vec<String> = self
            .invocation_list
            .iter()
            .map(|d| d.to_string(objects))
            .collect();
        format!("({})", entries.join(","))
    }
}

struct FUObjectItem {
    object: ObjectPtr,
    serial_number: AtomicI32,
}

#[derive(Default)]
struct GuidAnnotation {
    by_index: HashMap<i32, FUniqueObjectGuid>,
    by_guid: HashMap<FUniqueObjectGuid, i32>,
}

/// Registry of live objects and the types they are built from.
pub struct FUObjectArray {
    objects: Vec<FUObjectItem>,
    live: HashMap<NonNull<UObject>, i32>,
    available: Vec<i32>,
    master_serial_number: AtomicI32,
    guids: RwLock<GuidAnnotation>,
    next_guid: AtomicU32,
    name_counters: HashMap<FName, u32>,
    structs: RwLock<IndexMap<FName, Arc<UStruct>>>,
    enums: RwLock<IndexMap<FName, Arc<UEnum>>>,
}

const START_SERIAL_NUMBER: i32 = 1000;

impl Default for FUObjectArray {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FUObjectArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FUObjectArray")
            .field("num", &self.num())
            .field("capacity", &self.objects.len())
            .field("structs", &self.structs.read().len())
            .finish()
    }
}

impl FUObjectArray {
    pub fn new() -> Self {
        Self {
            objects: vec![],
            live: Default::default(),
            available: vec![],
            master_serial_number: AtomicI32::new(START_SERIAL_NUMBER),
            guids: Default::default(),
            next_guid: AtomicU32::new(1),
            name_counters: Default::default(),
            structs: Default::default(),
            enums: Default::default(),
        }
    }

    pub fn register_struct(&self, ustruct: Arc<UStruct>) {
        self.structs.write().insert(ustruct.get_fname(), ustruct);
    }

    pub fn find_struct(&self, name: FName) -> Option<Arc<UStruct>> {
        self.structs.read().get(&name).cloned()
    }

    pub fn structs(&self) -> Vec<Arc<UStruct>> {
        self.structs.read().values().cloned().collect()
    }

    pub fn register_enum(&self, uenum: Arc<UEnum>) {
        self.enums.write().insert(uenum.get_fname(), uenum);
    }

    pub fn find_enum(&self, name: FName) -> Option<Arc<UEnum>> {
        self.enums.read().get(&name).cloned()
    }

    /// Value of an enum entry name searched across every registered enum.
    pub fn lookup_enum_name(&self, entry: FName) -> Option<i64> {
        self.enums
            .read()
            .values()
            .find_map(|uenum| uenum.get_value_by_name(entry))
    }

    /// Allocates and initializes an object of `class`. A `None` name picks a unique one.
    pub fn new_object(
        &mut self,
        class: &Arc<UClass>,
        outer: ObjectPtr,
        name: FName,
        flags: EObjectFlags,
    ) -> Result<NonNull<UObject>> {
        if !class.is_class() {
            bail_out!("'{}' is not a class", class.get_fname());
        }
        if class.has_any_class_flags(EClassFlags::CLASS_Abstract) {
            bail_out!("cannot create an object of abstract class '{}'", class.get_fname());
        }
        let link = class.get_link()?;
        let size = (link.properties_size as usize).max(std::mem::size_of::<UObject>());
        let alignment = (link.min_alignment as usize).max(std::mem::align_of::<UObject>());

        let name = if name.is_none() {
            let counter = self.name_counters.entry(class.get_fname()).or_default();
            let name = class.get_fname().with_number(*counter + 1);
            *counter += 1;
            name
        } else {
            name
        };

        let index = match self.available.pop() {
            Some(index) => index,
            None => {
                self.objects.push(FUObjectItem {
                    object: None,
                    serial_number: AtomicI32::new(0),
                });
                self.objects.len() as i32 - 1
            }
        };

        let object = unsafe {
            let raw = malloc::malloc(size, alignment);
            ptr::write_bytes(raw, 0, size);
            raw.cast::<UObject>().write(UObject {
                class_private: class.clone(),
                name_private: name,
                outer_private: outer,
                object_flags: flags,
                internal_index: index,
            });
            class.initialize_struct(raw, 1);
            NonNull::new_unchecked(raw.cast::<UObject>())
        };
        self.objects[index as usize].object = Some(object);
        self.live.insert(object, index);
        tracing::debug!(
            "Created {} at index {index}",
            unsafe { object.as_ref() }.get_full_name()
        );
        Ok(object)
    }

    /// Destroys the object's properties and frees it. Weak references to it go stale.
    pub fn destroy_object(&mut self, object: NonNull<UObject>) -> Result<()> {
        let Some(index) = self.live.remove(&object) else {
            bail_out!("object at {object:?} is not registered");
        };
        let item = &mut self.objects[index as usize];
        item.object = None;
        *item.serial_number.get_mut() = 0;
        {
            let mut guids = self.guids.write();
            if let Some(guid) = guids.by_index.remove(&index) {
                guids.by_guid.remove(&guid);
            }
        }
        self.available.push(index);

        unsafe {
            let raw = object.as_ptr().cast::<u8>();
            let class = object.as_ref().class().clone();
            class.destroy_struct(raw, 1);
            ptr::drop_in_place(object.as_ptr());
            malloc::free(raw);
        }
        Ok(())
    }

    pub fn index_to_object(&self, index: i32) -> ObjectPtr {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.objects.get(index))
            .and_then(|item| item.object)
    }

    /// Never dereferences `object`, so dangling addresses are safe to test.
    pub fn is_valid(&self, object: ObjectPtr) -> bool {
        object.is_some_and(|object| self.live.contains_key(&object))
    }

    pub fn object_to_index(&self, object: NonNull<UObject>) -> Option<i32> {
        self.live.get(&object).copied()
    }

    /// Current serial number of a slot, zero when none has been handed out.
    pub fn get_serial_number(&self, index: i32) -> i32 {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.objects.get(index))
            .map(|item| item.serial_number.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    /// Serial number for the object in slot `index`, assigning one on first use.
    pub fn allocate_serial_number(&self, index: i32) -> i32 {
        let Some(item) = usize::try_from(index)
            .ok()
            .and_then(|index| self.objects.get(index))
        else {
            return 0;
        };
        let current = item.serial_number.load(Ordering::Acquire);
        if current != 0 {
            return current;
        }
        let new = self.master_serial_number.fetch_add(1, Ordering::AcqRel) + 1;
        match item
            .serial_number
            .compare_exchange(0, new, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => new,
            Err(existing) => existing,
        }
    }

    /// Guid of a live object, the zero guid for anything else.
    pub fn get_or_create_guid(&self, object: NonNull<UObject>) -> FUniqueObjectGuid {
        let Some(index) = self.object_to_index(object) else {
            return FUniqueObjectGuid::default();
        };
        if let Some(guid) = self.guids.read().by_index.get(&index) {
            return *guid;
        }
        let guid = FUniqueObjectGuid {
            a: self.next_guid.fetch_add(1, Ordering::AcqRel),
            b: 0x5550_524f,
            c: index as u32,
            d: self.allocate_serial_number(index) as u32,
        };
        self.set_guid(object, guid);
        guid
    }

    pub fn set_guid(&self, object: NonNull<UObject>, guid: FUniqueObjectGuid) {
        let Some(index) = self.object_to_index(object) else {
            return;
        };
        let mut guids = self.guids.write();
        if let Some(old) = guids.by_index.insert(index, guid) {
            guids.by_guid.remove(&old);
        }
        guids.by_guid.insert(guid, index);
    }

    pub fn find_object_by_guid(&self, guid: FUniqueObjectGuid) -> ObjectPtr {
        if !guid.is_valid() {
            return None;
        }
        let index = *self.guids.read().by_guid.get(&guid)?;
        self.index_to_object(index)
    }

    /// Finds a live object by its dotted path name, ignoring case.
    pub fn find_object(&self, path: &str) -> ObjectPtr {
        let path = path.trim();
        self.iter()
            .find(|object| {
                unsafe { object.as_ref() }
                    .get_path_name()
                    .eq_ignore_ascii_case(path)
            })
    }

    pub fn add_to_root(&mut self, object: NonNull<UObject>) {
        if self.is_valid(Some(object)) {
            unsafe { (*object.as_ptr()).set_flags(EObjectFlags::RF_MarkAsRootSet) };
        }
    }

    pub fn remove_from_root(&mut self, object: NonNull<UObject>) {
        if self.is_valid(Some(object)) {
            unsafe { (*object.as_ptr()).clear_flags(EObjectFlags::RF_MarkAsRootSet) };
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = NonNull<UObject>> + '_ {
        self.objects.iter().filter_map(|item| item.object)
    }

    pub fn num(&self) -> usize {
        self.iter().count()
    }
}

impl Drop for FUObjectArray {
    fn drop(&mut self) {
        let live: Vec<_> = self.iter().collect();
        for object in live {
            if let Err(err) = self.destroy_object(object) {
                tracing::error!("{err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::UProperty;
    use crate::ustruct::StructBuilder;

    fn test_class() -> Arc<UClass> {
        StructBuilder::class("ObjectTestThing")
            .property(UProperty::int("Health"))
            .property(UProperty::str("Label"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_new_object_and_paths() {
        let class = test_class();
        let mut objects = FUObjectArray::new();
        let outer = objects
            .new_object(&class, None, FName::new("Level"), EObjectFlags::RF_NoFlags)
            .unwrap();
        let inner = objects
            .new_object(&class, Some(outer), FName::default(), EObjectFlags::RF_Public)
            .unwrap();
        let inner_ref = unsafe { inner.as_ref() };
        assert_eq!(inner_ref.get_path_name(), "Level.ObjectTestThing_0");
        assert_eq!(inner_ref.get_full_name(), "ObjectTestThing Level.ObjectTestThing_0");
        assert!(inner_ref.is_a(&class));
        assert!(inner_ref.has_any_flags(EObjectFlags::RF_Public));
        assert_eq!(objects.find_object("level.objecttestthing_0"), Some(inner));
        assert_eq!(objects.find_object("Level"), Some(outer));
        assert_eq!(objects.find_object("Nope"), None);
        assert_eq!(objects.num(), 2);
    }

    #[test]
    fn test_weak_pointer_goes_stale() {
        let class = test_class();
        let mut objects = FUObjectArray::new();
        let object = objects
            .new_object(&class, None, FName::new("Target"), EObjectFlags::RF_NoFlags)
            .unwrap();
        let weak = FWeakObjectPtr::new(Some(object), &objects);
        assert_eq!(weak.get(&objects), Some(object));
        assert!(!weak.is_stale(&objects));

        objects.destroy_object(object).unwrap();
        assert_eq!(weak.get(&objects), None);
        assert!(weak.is_stale(&objects));

        // the slot is reused but the serial number is not
        let replacement = objects
            .new_object(&class, None, FName::new("Other"), EObjectFlags::RF_NoFlags)
            .unwrap();
        assert_eq!(unsafe { replacement.as_ref() }.internal_index(), weak.object_index());
        assert_eq!(weak.get(&objects), None);
    }

    #[test]
    fn test_lazy_and_asset_pointers() {
        let class = test_class();
        let mut objects = FUObjectArray::new();
        let object = objects
            .new_object(&class, None, FName::new("Asset"), EObjectFlags::RF_NoFlags)
            .unwrap();

        let lazy = FLazyObjectPtr::new(Some(object), &objects);
        assert!(lazy.guid.is_valid());
        let by_guid = FLazyObjectPtr::from_guid(lazy.guid);
        assert_eq!(by_guid.get(&objects), Some(object));
        assert_eq!(FUniqueObjectGuid::parse(&lazy.guid.to_string()), Some(lazy.guid));

        let asset = FAssetPtr::from_path("Asset");
        assert_eq!(asset.get(&objects), Some(object));
        assert_eq!(FAssetPtr::new(Some(object), &objects).asset_path.to_string(), "Asset");

        objects.destroy_object(object).unwrap();
        assert_eq!(by_guid.get(&objects), None);
        assert_eq!(asset.get(&objects), None);
    }

    #[test]
    fn test_multicast_delegate() {
        let class = test_class();
        let mut objects = FUObjectArray::new();
        let a = objects
            .new_object(&class, None, FName::new("A"), EObjectFlags::RF_NoFlags)
            .unwrap();
        let b = objects
            .new_object(&class, None, FName::new("B"), EObjectFlags::RF_NoFlags)
            .unwrap();

        let mut multicast = FMulticastScriptDelegate::default();
        let on_a = FScriptDelegate::bind_ufunction(Some(a), FName::new("OnHit"), &objects);
        multicast.add_unique(on_a.clone());
        multicast.add_unique(on_a.clone());
        multicast.add_unique(FScriptDelegate::bind_ufunction(Some(b), FName::new("OnHit"), &objects));
        assert_eq!(multicast.num(), 2);
        assert_eq!(multicast.to_string(&objects), "(A.OnHit,B.OnHit)");
        // the class has no such function
        assert!(!on_a.is_bound(&objects));

        objects.destroy_object(b).unwrap();
        multicast.compact(&objects);
        assert_eq!(multicast.num(), 1);
        multicast.remove(&on_a);
        assert_eq!(multicast.num(), 0);
    }

    #[test]
    fn test_abstract_class_rejected() {
        let class = StructBuilder::class("ObjectTestAbstract")
            .class_flags(EClassFlags::CLASS_Abstract)
            .build()
            .unwrap();
        let mut objects = FUObjectArray::new();
        assert!(objects
            .new_object(&class, None, FName::default(), EObjectFlags::RF_NoFlags)
            .is_err());
    }
}
