use std::ptr::NonNull;
use std::sync::Arc;

use crate::error::{bail_out, PropertyError, Result};
use crate::flags::EPropertyPortFlags;
use crate::fundamentals::TypeFundamentals;
use crate::name::FName;
use crate::object::{
    ClassPtr, FAssetPtr, FLazyObjectPtr, FScriptInterface, FUObjectArray, FUniqueObjectGuid,
    FWeakObjectPtr, ObjectPtr, UObject,
};
use crate::text::read_token;
use crate::ustruct::UClass;

use super::{PropertyKind, UProperty};

/// `Class'Path'` for a live object, `None` otherwise.
fn object_text(object: ObjectPtr, objects: &FUObjectArray) -> String {
    match live_object(object, objects) {
        Some(object) => {
            let object = unsafe { object.as_ref() };
            format!("{}'{}'", object.class().get_fname(), object.get_path_name())
        }
        None => "None".to_string(),
    }
}

struct ObjectReference<'a> {
    class: Option<String>,
    /// `None` for an explicit null reference.
    path: Option<String>,
    rest: &'a str,
}

/// Parses `None`, `Class'Path'` or a bare path.
fn parse_object_reference(buffer: &str) -> Result<ObjectReference<'_>> {
    let Some((token, rest)) = read_token(buffer, true) else {
        bail_out!("Bad quoted string in object reference '{buffer}'");
    };
    if token.is_empty() || rest.len() == buffer.len() {
        bail_out!("Missing object reference in '{buffer}'");
    }
    if token.eq_ignore_ascii_case("None") {
        return Ok(ObjectReference {
            class: None,
            path: None,
            rest,
        });
    }
    if let Some(quoted) = rest.strip_prefix('\'') {
        let Some(end) = quoted.find('\'') else {
            bail_out!("Missing closing quote in '{buffer}'");
        };
        return Ok(ObjectReference {
            class: Some(token),
            path: Some(quoted[..end].trim().to_string()),
            rest: &quoted[end + 1..],
        });
    }
    Ok(ObjectReference {
        class: None,
        path: Some(token),
        rest,
    })
}

impl UProperty {
    /// Looks up a class named in an object reference, checking it derives from `required`.
    fn resolve_class_token(
        &self,
        class_name: &str,
        required: Option<&UClass>,
        objects: &FUObjectArray,
        buffer: &str,
    ) -> Result<Arc<UClass>> {
        let class = FName::find(class_name)
            .and_then(|name| objects.find_struct(name))
            .filter(|class| class.is_class());
        let Some(class) = class else {
            bail_out!("{}: unresolved cast in '{buffer}'", self.name);
        };
        if let Some(required) = required {
            if !class.is_child_of(required) {
                bail_out!("{}: invalid cast in '{buffer}'", self.name);
            }
        }
        Ok(class)
    }

    fn resolve_object_reference(
        &self,
        reference: &ObjectReference,
        property_class: Option<Arc<UClass>>,
        objects: &FUObjectArray,
        buffer: &str,
    ) -> Result<ObjectPtr> {
        let Some(path) = &reference.path else {
            return Ok(None);
        };
        if let Some(class_name) = &reference.class {
            self.resolve_class_token(class_name, property_class.as_deref(), objects, buffer)?;
        }
        let Some(object) = objects.find_object(path) else {
            bail_out!("{}: unresolved reference '{path}'", self.name);
        };
        if let Some(property_class) = &property_class {
            if !unsafe { object.as_ref() }.is_a(property_class) {
                bail_out!("{}: bad cast in '{buffer}'", self.name);
            }
        }
        Ok(Some(object))
    }

    /// Class named by a class reference, checked against the meta class.
    fn resolve_class_reference(
        &self,
        reference: &ObjectReference,
        objects: &FUObjectArray,
    ) -> Result<ClassPtr> {
        let Some(path) = &reference.path else {
            return Ok(None);
        };
        let class = FName::find(path)
            .and_then(|name| objects.find_struct(name))
            .filter(|class| class.is_class());
        let Some(class) = class else {
            bail_out!("Invalid object; '{path}' is not a known class");
        };
        if let Some(meta_class) = self.meta_class() {
            if !class.is_child_of(&meta_class) {
                bail_out!(
                    "Invalid object; '{path}' is not a child of '{}'",
                    meta_class.get_fname()
                );
            }
        }
        Ok(Some(class))
    }

    pub(super) unsafe fn export_object_text(
        &self,
        out: &mut String,
        value: *const u8,
        _port_flags: EPropertyPortFlags,
        objects: &FUObjectArray,
    ) {
        let text = match &self.kind {
            PropertyKind::Object(_) => {
                object_text(TypeFundamentals::<ObjectPtr>::get_property_value(value), objects)
            }
            PropertyKind::WeakObject(_) => object_text(
                TypeFundamentals::<FWeakObjectPtr>::get_property_value_ref(value).get(objects),
                objects,
            ),
            PropertyKind::Interface(_) => object_text(
                TypeFundamentals::<FScriptInterface>::get_property_value_ref(value).get_object(),
                objects,
            ),
            PropertyKind::LazyObject(_) => {
                let lazy = TypeFundamentals::<FLazyObjectPtr>::get_property_value_ref(value);
                match lazy.get(objects) {
                    Some(object) => object_text(Some(object), objects),
                    None if lazy.guid.is_valid() => lazy.guid.to_string(),
                    None => "None".to_string(),
                }
            }
            PropertyKind::Asset(_) | PropertyKind::AssetClass { .. } => {
                let asset = TypeFundamentals::<FAssetPtr>::get_property_value_ref(value);
                if asset.asset_path.is_empty() {
                    match asset.get(objects) {
                        Some(object) => UObject::path_name_of(Some(object)),
                        None => "None".to_string(),
                    }
                } else {
                    asset.asset_path.to_string()
                }
            }
            PropertyKind::Class { .. } => {
                match TypeFundamentals::<ClassPtr>::get_property_value_ref(value) {
                    Some(class) => format!("Class'{}'", class.get_fname()),
                    None => "None".to_string(),
                }
            }
            _ => return,
        };
        out.push_str(&text);
    }

    pub(super) unsafe fn import_object_text<'a>(
        &self,
        buffer: &'a str,
        data: *mut u8,
        _port_flags: EPropertyPortFlags,
        objects: &FUObjectArray,
    ) -> Result<&'a str> {
        if let PropertyKind::LazyObject(_) = &self.kind {
            if let Some((token, rest)) = read_token(buffer, false) {
                if let Some(guid) = FUniqueObjectGuid::parse(&token) {
                    TypeFundamentals::<FLazyObjectPtr>::set_property_value(
                        data,
                        FLazyObjectPtr::from_guid(guid),
                    );
                    return Ok(rest);
                }
            }
        }

        let reference = parse_object_reference(buffer)?;
        match &self.kind {
            PropertyKind::Object(_) => {
                let object = self.resolve_object_reference(&reference, self.property_class(), objects, buffer)?;
                TypeFundamentals::<ObjectPtr>::set_property_value(data, object);
            }
            PropertyKind::WeakObject(_) => {
                let object = self.resolve_object_reference(&reference, self.property_class(), objects, buffer)?;
                TypeFundamentals::<FWeakObjectPtr>::set_property_value(
                    data,
                    FWeakObjectPtr::new(object, objects),
                );
            }
            PropertyKind::LazyObject(_) => {
                let object = self.resolve_object_reference(&reference, self.property_class(), objects, buffer)?;
                TypeFundamentals::<FLazyObjectPtr>::set_property_value(
                    data,
                    FLazyObjectPtr::new(object, objects),
                );
            }
            PropertyKind::Interface(interface_class) => {
                // implementing classes need not derive from the interface
                let object = self.resolve_object_reference(&reference, None, objects, buffer)?;
                if let (Some(object), Some(interface_class)) = (object, interface_class.upgrade()) {
                    if !object.as_ref().class().implements_interface(&interface_class) {
                        bail_out!(
                            "{}: object '{}' does not implement '{}'",
                            self.name,
                            object.as_ref().get_path_name(),
                            interface_class.get_fname()
                        );
                    }
                }
                TypeFundamentals::<FScriptInterface>::set_property_value(
                    data,
                    FScriptInterface::new(object),
                );
            }
            PropertyKind::Asset(_) => {
                // the asset does not have to be loaded
                let asset = match &reference.path {
                    None => FAssetPtr::default(),
                    Some(path) => {
                        let object = objects.find_object(path);
                        if let (Some(object), Some(class)) = (object, self.property_class()) {
                            if !object.as_ref().is_a(&class) {
                                bail_out!("{}: bad cast in '{buffer}'", self.name);
                            }
                        }
                        let mut asset = FAssetPtr::from_path(path);
                        asset.weak = FWeakObjectPtr::new(object, objects);
                        asset
                    }
                };
                TypeFundamentals::<FAssetPtr>::set_property_value(data, asset);
            }
            PropertyKind::AssetClass { .. } => {
                let asset = match &reference.path {
                    None => FAssetPtr::default(),
                    Some(path) => {
                        if FName::find(path).and_then(|name| objects.find_struct(name)).is_some() {
                            self.resolve_class_reference(&reference, objects)?;
                        }
                        FAssetPtr::from_path(path)
                    }
                };
                TypeFundamentals::<FAssetPtr>::set_property_value(data, asset);
            }
            PropertyKind::Class { .. } => {
                if let Some(class_name) = &reference.class {
                    if !class_name.eq_ignore_ascii_case("Class") {
                        bail_out!("{}: invalid cast in '{buffer}'", self.name);
                    }
                }
                let class = self.resolve_class_reference(&reference, objects)?;
                TypeFundamentals::<ClassPtr>::set_property_value(data, class);
            }
            _ => bail_out!("{} does not hold an object reference", self.name),
        }
        Ok(reference.rest)
    }

    /// Referenced object, resolving weak, lazy and asset references.
    ///
    /// # Safety
    /// `value` must address a value of this property.
    pub unsafe fn get_object_property_value(
        &self,
        value: *const u8,
        objects: &FUObjectArray,
    ) -> Result<ObjectPtr> {
        Ok(match &self.kind {
            PropertyKind::Object(_) => TypeFundamentals::<ObjectPtr>::get_property_value(value),
            PropertyKind::WeakObject(_) => {
                TypeFundamentals::<FWeakObjectPtr>::get_property_value_ref(value).get(objects)
            }
            PropertyKind::LazyObject(_) => {
                TypeFundamentals::<FLazyObjectPtr>::get_property_value_ref(value).get(objects)
            }
            PropertyKind::Asset(_) => {
                TypeFundamentals::<FAssetPtr>::get_property_value_ref(value).get(objects)
            }
            PropertyKind::Interface(_) => {
                TypeFundamentals::<FScriptInterface>::get_property_value_ref(value).get_object()
            }
            _ => {
                return Err(PropertyError::TypeMismatch {
                    property: self.name,
                    expected: "object reference",
                })
            }
        })
    }

    /// # Safety
    /// `value` must address a value of this property.
    pub unsafe fn set_object_property_value(
        &self,
        value: *mut u8,
        object: ObjectPtr,
        objects: &FUObjectArray,
    ) -> Result<()> {
        match &self.kind {
            PropertyKind::Object(_) => TypeFundamentals::<ObjectPtr>::set_property_value(value, object),
            PropertyKind::WeakObject(_) => TypeFundamentals::<FWeakObjectPtr>::set_property_value(
                value,
                FWeakObjectPtr::new(object, objects),
            ),
            PropertyKind::LazyObject(_) => TypeFundamentals::<FLazyObjectPtr>::set_property_value(
                value,
                FLazyObjectPtr::new(object, objects),
            ),
            PropertyKind::Asset(_) => TypeFundamentals::<FAssetPtr>::set_property_value(
                value,
                FAssetPtr::new(object, objects),
            ),
            PropertyKind::Interface(_) => TypeFundamentals::<FScriptInterface>::set_property_value(
                value,
                FScriptInterface::new(object),
            ),
            _ => {
                return Err(PropertyError::TypeMismatch {
                    property: self.name,
                    expected: "object reference",
                })
            }
        }
        Ok(())
    }

    /// # Safety
    /// `value` must address a value of this property.
    pub unsafe fn get_class_property_value(&self, value: *const u8) -> Result<ClassPtr> {
        match &self.kind {
            PropertyKind::Class { .. } => Ok(TypeFundamentals::<ClassPtr>::get_property_value(value)),
            _ => Err(PropertyError::TypeMismatch {
                property: self.name,
                expected: "class reference",
            }),
        }
    }

    /// # Safety
    /// `value` must address a value of this property.
    pub unsafe fn set_class_property_value(&self, value: *mut u8, class: ClassPtr) -> Result<()> {
        match &self.kind {
            PropertyKind::Class { .. } => {
                TypeFundamentals::<ClassPtr>::set_property_value(value, class);
                Ok(())
            }
            _ => Err(PropertyError::TypeMismatch {
                property: self.name,
                expected: "class reference",
            }),
        }
    }
}

/// Null for references to objects that are no longer alive.
pub(crate) fn live_object(object: Option<NonNull<UObject>>, objects: &FUObjectArray) -> ObjectPtr {
    object.filter(|object| objects.is_valid(Some(*object)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{EClassFlags, EObjectFlags};
    use crate::text::FStringOutputDevice;
    use crate::ustruct::StructBuilder;

    struct World {
        objects: FUObjectArray,
        actor: Arc<UClass>,
        pawn: Arc<UClass>,
        prop: Arc<UClass>,
        holder: Arc<UClass>,
    }

    fn world() -> World {
        let actor = StructBuilder::class("ObjTestActor").build().unwrap();
        let interface = StructBuilder::class("ObjTestUsable")
            .class_flags(EClassFlags::CLASS_Interface | EClassFlags::CLASS_Abstract)
            .build()
            .unwrap();
        let pawn = StructBuilder::class("ObjTestPawn")
            .super_struct(&actor)
            .interface(&interface)
            .build()
            .unwrap();
        let prop = StructBuilder::class("ObjTestProp").build().unwrap();
        let builder = StructBuilder::class("ObjTestHolder");
        let holder = builder.declare();
        builder
            .property(UProperty::object("Target", Some(&actor)))
            .property(UProperty::object("Owner", Some(&holder)))
            .property(UProperty::weak_object("Weak", Some(&actor)))
            .property(UProperty::lazy_object("Lazy", Some(&actor)))
            .property(UProperty::asset("Asset", Some(&actor)))
            .property(UProperty::class("PawnClass", Some(&actor)))
            .property(UProperty::asset_class("AssetClass", Some(&actor)))
            .property(UProperty::interface("Usable", &interface))
            .link(&holder)
            .unwrap();

        let objects = FUObjectArray::new();
        for class in [&actor, &interface, &pawn, &prop, &holder] {
            objects.register_struct(class.clone());
        }
        World {
            objects,
            actor,
            pawn,
            prop,
            holder,
        }
    }

    fn import(world: &World, object: NonNull<UObject>, name: &str, text: &str) -> Result<String> {
        let property = world.holder.find_property(FName::new(name)).unwrap();
        let mut errors = FStringOutputDevice::new();
        unsafe {
            let value = property.object_ptr_to_value_ptr(object, 0)?;
            property
                .import_text(text, value, EPropertyPortFlags::PPF_None, &world.objects, &mut errors)
                .map(str::to_string)
        }
    }

    fn export(world: &World, object: NonNull<UObject>, name: &str) -> String {
        let property = world.holder.find_property(FName::new(name)).unwrap();
        let mut out = String::new();
        unsafe {
            let value = property.object_ptr_to_value_ptr(object, 0).unwrap();
            property.export_text_item(&mut out, value, None, EPropertyPortFlags::PPF_None, &world.objects);
        }
        out
    }

    #[test]
    fn test_object_reference_text() {
        let mut world = world();
        let pawn = world
            .objects
            .new_object(&world.pawn, None, FName::new("Hero"), EObjectFlags::RF_NoFlags)
            .unwrap();
        let rock = world
            .objects
            .new_object(&world.prop, None, FName::new("Rock"), EObjectFlags::RF_NoFlags)
            .unwrap();
        let holder = world
            .objects
            .new_object(&world.holder, None, FName::new("Holder"), EObjectFlags::RF_NoFlags)
            .unwrap();

        assert_eq!(export(&world, holder, "Target"), "None");
        assert_eq!(import(&world, holder, "Target", "Hero,").unwrap(), ",");
        assert_eq!(export(&world, holder, "Target"), "ObjTestPawn'Hero'");
        import(&world, holder, "Target", "ObjTestPawn'Hero'").unwrap();
        import(&world, holder, "Target", "ObjTestActor'Hero'").unwrap();
        assert!(import(&world, holder, "Target", "Rock").is_err());
        assert!(import(&world, holder, "Target", "ObjTestProp'Rock'").is_err());
        assert!(import(&world, holder, "Target", "Missing").is_err());
        assert!(import(&world, holder, "Target", "ObjTestPawn'Hero").is_err());
        import(&world, holder, "Target", "None").unwrap();
        assert_eq!(export(&world, holder, "Target"), "None");

        // a class may reference itself
        import(&world, holder, "Owner", "Holder").unwrap();
        assert_eq!(export(&world, holder, "Owner"), "ObjTestHolder'Holder'");

        import(&world, holder, "Weak", "Hero").unwrap();
        assert_eq!(export(&world, holder, "Weak"), "ObjTestPawn'Hero'");
        import(&world, holder, "Usable", "Hero").unwrap();
        assert_eq!(export(&world, holder, "Usable"), "ObjTestPawn'Hero'");
        assert!(import(&world, holder, "Usable", "Rock").is_err());

        world.objects.destroy_object(pawn).unwrap();
        assert_eq!(export(&world, holder, "Weak"), "None");
        let _ = rock;
    }

    #[test]
    fn test_lazy_and_asset_text() {
        let mut world = world();
        let hero = world
            .objects
            .new_object(&world.actor, None, FName::new("Hero"), EObjectFlags::RF_NoFlags)
            .unwrap();
        let holder = world
            .objects
            .new_object(&world.holder, None, FName::new("Holder"), EObjectFlags::RF_NoFlags)
            .unwrap();

        import(&world, holder, "Lazy", "Hero").unwrap();
        assert_eq!(export(&world, holder, "Lazy"), "ObjTestActor'Hero'");
        let guid = world.objects.get_or_create_guid(hero);
        world.objects.destroy_object(hero).unwrap();
        assert_eq!(export(&world, holder, "Lazy"), guid.to_string());
        import(&world, holder, "Lazy", &guid.to_string()).unwrap();
        assert_eq!(export(&world, holder, "Lazy"), guid.to_string());

        // assets do not need to exist
        import(&world, holder, "Asset", "Maps.Level.Tree").unwrap();
        assert_eq!(export(&world, holder, "Asset"), "Maps.Level.Tree");
        import(&world, holder, "Asset", "None").unwrap();
        assert_eq!(export(&world, holder, "Asset"), "None");
    }

    #[test]
    fn test_class_reference_text() {
        let mut world = world();
        let holder = world
            .objects
            .new_object(&world.holder, None, FName::new("Holder"), EObjectFlags::RF_NoFlags)
            .unwrap();
        import(&world, holder, "PawnClass", "ObjTestPawn").unwrap();
        assert_eq!(export(&world, holder, "PawnClass"), "Class'ObjTestPawn'");
        import(&world, holder, "PawnClass", "Class'ObjTestActor'").unwrap();
        assert!(import(&world, holder, "PawnClass", "ObjTestProp").is_err());
        assert!(import(&world, holder, "PawnClass", "Nope").is_err());

        import(&world, holder, "AssetClass", "Blueprints.Unloaded_C").unwrap();
        assert_eq!(export(&world, holder, "AssetClass"), "Blueprints.Unloaded_C");
        assert!(import(&world, holder, "AssetClass", "ObjTestProp").is_err());

        let property = world.holder.find_property(FName::new("PawnClass")).unwrap();
        unsafe {
            let value = property.object_ptr_to_value_ptr(holder, 0).unwrap();
            let class = property.get_class_property_value(value).unwrap();
            assert!(Arc::ptr_eq(class.as_ref().unwrap(), &world.actor));
            assert!(property.get_object_property_value(value, &world.objects).is_err());
        }
    }

    #[test]
    fn test_object_value_accessors() {
        let mut world = world();
        let hero = world
            .objects
            .new_object(&world.actor, None, FName::new("Hero"), EObjectFlags::RF_NoFlags)
            .unwrap();
        let holder = world
            .objects
            .new_object(&world.holder, None, FName::new("Holder"), EObjectFlags::RF_NoFlags)
            .unwrap();
        for name in ["Target", "Weak", "Lazy", "Asset"] {
            let property = world.holder.find_property(FName::new(name)).unwrap();
            unsafe {
                let value = property.object_ptr_to_value_ptr(holder, 0).unwrap();
                property
                    .set_object_property_value(value, Some(hero), &world.objects)
                    .unwrap();
                assert_eq!(
                    property.get_object_property_value(value, &world.objects).unwrap(),
                    Some(hero),
                    "{name}"
                );
            }
        }
        assert_eq!(live_object(Some(hero), &world.objects), Some(hero));
        world.objects.destroy_object(hero).unwrap();
        assert_eq!(live_object(Some(hero), &world.objects), None);
    }
}
