use crate::error::{bail_out, PropertyError, Result};
use crate::fundamentals::TypeFundamentals;
use crate::name::FName;
use crate::object::{FMulticastScriptDelegate, FScriptDelegate, FUObjectArray};
use crate::text::skip_whitespace;

use super::{PropertyKind, UProperty};

impl UProperty {
    pub(super) unsafe fn export_delegate_text(
        &self,
        out: &mut String,
        value: *const u8,
        objects: &FUObjectArray,
    ) {
        match &self.kind {
            PropertyKind::Delegate(_) => out.push_str(
                &TypeFundamentals::<FScriptDelegate>::get_property_value_ref(value).to_string(objects),
            ),
            PropertyKind::MulticastDelegate(_) => out.push_str(
                &TypeFundamentals::<FMulticastScriptDelegate>::get_property_value_ref(value)
                    .to_string(objects),
            ),
            _ => {}
        }
    }

    /// Parses `Outer.Object.Function` or `None` up to the next `,` or `)`.
    ///
    /// The function must exist on the object's class and match the signature of
    /// this property.
    pub fn import_single_delegate<'a>(
        &self,
        buffer: &'a str,
        objects: &FUObjectArray,
    ) -> Result<(FScriptDelegate, &'a str)> {
        let end = buffer.find([',', ')']).unwrap_or(buffer.len());
        let (text, rest) = buffer.split_at(end);
        let text = text.trim();
        if text.eq_ignore_ascii_case("None") {
            return Ok((FScriptDelegate::default(), rest));
        }
        let Some((path, function_name)) = text.rsplit_once('.') else {
            bail_out!("{}: missing function name in delegate '{text}'", self.name);
        };
        let Some(object) = objects.find_object(path) else {
            bail_out!("{}: unresolved delegate object '{path}'", self.name);
        };
        let class = unsafe { object.as_ref() }.class();
        let function = FName::find(function_name).and_then(|name| class.find_function(name));
        let Some(function) = function else {
            bail_out!(
                "{}: function '{function_name}' not found on class '{}'",
                self.name,
                class.get_fname()
            );
        };
        if let Some(signature) = self.signature_function() {
            if !function.is_signature_compatible_with(&signature) {
                bail_out!(
                    "{}: function '{function_name}' does not match signature '{}'",
                    self.name,
                    signature.get_fname()
                );
            }
        }
        let delegate = FScriptDelegate::bind_ufunction(Some(object), function.get_fname(), objects);
        Ok((delegate, rest))
    }

    pub(super) unsafe fn import_delegate_text<'a>(
        &self,
        buffer: &'a str,
        data: *mut u8,
        objects: &FUObjectArray,
    ) -> Result<&'a str> {
        let (delegate, rest) = self.import_single_delegate(buffer, objects)?;
        TypeFundamentals::<FScriptDelegate>::set_property_value(data, delegate);
        Ok(rest)
    }

    /// Replaces the invocation list with the bindings in `(a,b)`.
    pub(super) unsafe fn import_multicast_text<'a>(
        &self,
        buffer: &'a str,
        data: *mut u8,
        objects: &FUObjectArray,
    ) -> Result<&'a str> {
        // a bare binding would silently drop the existing list
        let Some(mut rest) = buffer.strip_prefix('(') else {
            bail_out!("{}: multicast delegate value must start with '('", self.name);
        };
        let mut list = FMulticastScriptDelegate::default();
        rest = skip_whitespace(rest);
        if !rest.starts_with(')') {
            loop {
                let (delegate, after) = self.import_single_delegate(rest, objects)?;
                list.add_unique(delegate);
                rest = skip_whitespace(after);
                match rest.strip_prefix(',') {
                    Some(after) => rest = skip_whitespace(after),
                    None => break,
                }
            }
        }
        let Some(rest) = rest.strip_prefix(')') else {
            bail_out!("{}: missing closing ')' in '{buffer}'", self.name);
        };
        TypeFundamentals::<FMulticastScriptDelegate>::set_property_value(data, list);
        Ok(rest)
    }

    unsafe fn multicast_value(&self, data: *mut u8) -> Result<&mut FMulticastScriptDelegate> {
        match self.kind {
            PropertyKind::MulticastDelegate(_) => {
                Ok(&mut *TypeFundamentals::<FMulticastScriptDelegate>::get_property_value_ptr(data))
            }
            _ => Err(PropertyError::TypeMismatch {
                property: self.name,
                expected: "multicast delegate",
            }),
        }
    }

    /// Adds a binding parsed from `Object.Function` unless it is already bound.
    ///
    /// # Safety
    /// `data` must address a value of this property.
    pub unsafe fn add_delegate(&self, buffer: &str, data: *mut u8, objects: &FUObjectArray) -> Result<()> {
        let list = self.multicast_value(data)?;
        let (delegate, _) = self.import_single_delegate(buffer, objects)?;
        list.add_unique(delegate);
        Ok(())
    }

    /// # Safety
    /// `data` must address a value of this property.
    pub unsafe fn remove_delegate(
        &self,
        buffer: &str,
        data: *mut u8,
        objects: &FUObjectArray,
    ) -> Result<()> {
        let list = self.multicast_value(data)?;
        let (delegate, _) = self.import_single_delegate(buffer, objects)?;
        list.remove(&delegate);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::ptr::NonNull;
    use std::sync::Arc;

    use super::*;
    use crate::flags::{EObjectFlags, EPropertyFlags, EPropertyPortFlags};
    use crate::object::UObject;
    use crate::text::FStringOutputDevice;
    use crate::ustruct::{StructBuilder, UClass};

    struct World {
        objects: FUObjectArray,
        class: Arc<UClass>,
        target: NonNull<UObject>,
        holder: NonNull<UObject>,
    }

    fn parm(property: UProperty) -> UProperty {
        property.with_flags(EPropertyFlags::CPF_Parm)
    }

    fn world() -> World {
        let signature = StructBuilder::function("OnHitSignature")
            .property(parm(UProperty::float("Damage")))
            .build()
            .unwrap();
        let handle_hit = StructBuilder::function("HandleHit")
            .property(parm(UProperty::float("Amount")))
            .build()
            .unwrap();
        let handle_count = StructBuilder::function("HandleCount")
            .property(parm(UProperty::int("Count")))
            .build()
            .unwrap();
        let class = StructBuilder::class("DelegateTestActor")
            .with_function(&handle_hit)
            .with_function(&handle_count)
            .property(UProperty::delegate("OnHit", Some(&signature)))
            .property(UProperty::multicast_delegate("OnHits", Some(&signature)))
            .build()
            .unwrap();
        let mut objects = FUObjectArray::new();
        let target = objects
            .new_object(&class, None, FName::new("Target"), EObjectFlags::RF_NoFlags)
            .unwrap();
        let holder = objects
            .new_object(&class, None, FName::new("Holder"), EObjectFlags::RF_NoFlags)
            .unwrap();
        World {
            objects,
            class,
            target,
            holder,
        }
    }

    fn value(world: &World, name: &str) -> (Arc<UProperty>, *mut u8) {
        let property = world.class.find_property(FName::new(name)).unwrap();
        let value = unsafe { property.object_ptr_to_value_ptr(world.holder, 0) }.unwrap();
        (property, value)
    }

    fn export(world: &World, name: &str) -> String {
        let (property, value) = value(world, name);
        let mut out = String::new();
        unsafe {
            property.export_text_item(&mut out, value, None, EPropertyPortFlags::PPF_None, &world.objects)
        };
        out
    }

    fn import(world: &World, name: &str, text: &str) -> Result<String> {
        let (property, value) = value(world, name);
        let mut errors = FStringOutputDevice::new();
        unsafe {
            property
                .import_text(text, value, EPropertyPortFlags::PPF_None, &world.objects, &mut errors)
                .map(str::to_string)
        }
    }

    #[test]
    fn test_single_delegate_text() {
        let world = world();
        assert_eq!(export(&world, "OnHit"), "None");
        assert_eq!(import(&world, "OnHit", "Target.HandleHit,").unwrap(), ",");
        assert_eq!(export(&world, "OnHit"), "Target.HandleHit");

        let (_, data) = value(&world, "OnHit");
        let delegate = unsafe { TypeFundamentals::<FScriptDelegate>::get_property_value_ref(data) };
        assert!(delegate.is_bound(&world.objects));
        assert!(delegate.is_bound_to_object(Some(world.target), &world.objects));

        let (property, _) = value(&world, "OnHit");
        assert_eq!(property.signature_function().unwrap().get_fname(), FName::new("OnHitSignature"));
        assert!(import(&world, "OnHit", "Target.HandleCount").is_err());
        assert!(import(&world, "OnHit", "Target.Missing").is_err());
        assert!(import(&world, "OnHit", "Nobody.HandleHit").is_err());
        assert!(import(&world, "OnHit", "Target").is_err());
        assert_eq!(export(&world, "OnHit"), "Target.HandleHit");

        import(&world, "OnHit", "None").unwrap();
        assert_eq!(export(&world, "OnHit"), "None");
    }

    #[test]
    fn test_multicast_delegate_text() {
        let world = world();
        assert_eq!(export(&world, "OnHits"), "()");
        assert_eq!(
            import(&world, "OnHits", "(Target.HandleHit, Holder.HandleHit),X").unwrap(),
            ",X"
        );
        assert_eq!(export(&world, "OnHits"), "(Target.HandleHit,Holder.HandleHit)");
        import(&world, "OnHits", "(Target.HandleHit,Target.HandleHit)").unwrap();
        assert_eq!(export(&world, "OnHits"), "(Target.HandleHit)");

        assert!(import(&world, "OnHits", "Target.HandleHit").is_err());
        assert!(import(&world, "OnHits", "(Target.HandleHit").is_err());
        assert!(import(&world, "OnHits", "(Target.HandleCount)").is_err());
        assert_eq!(export(&world, "OnHits"), "(Target.HandleHit)");

        assert_eq!(import(&world, "OnHits", "( )").unwrap(), "");
        assert_eq!(export(&world, "OnHits"), "()");
    }

    #[test]
    fn test_add_and_remove_delegate() {
        let world = world();
        let (property, data) = value(&world, "OnHits");
        unsafe {
            property.add_delegate("Target.HandleHit", data, &world.objects).unwrap();
            property.add_delegate("Holder.HandleHit", data, &world.objects).unwrap();
            property.add_delegate("Target.HandleHit", data, &world.objects).unwrap();
            assert_eq!(export(&world, "OnHits"), "(Target.HandleHit,Holder.HandleHit)");
            property.remove_delegate("Target.HandleHit", data, &world.objects).unwrap();
            assert_eq!(export(&world, "OnHits"), "(Holder.HandleHit)");

            let (single, single_data) = value(&world, "OnHit");
            assert!(single.add_delegate("Target.HandleHit", single_data, &world.objects).is_err());
        }
    }
}
