//! JSON type libraries describing enums, structs and classes.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use uproperty::{
    EClassFlags, EFunctionFlags, EPropertyFlags, EStructFlags, FName, FUObjectArray, StructBuilder,
    UClass, UEnum, UFunction, UProperty, UStruct,
};

pub const DEMO_SCHEMA: &str = include_str!("demo_schema.json");

#[derive(Debug, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub enums: Vec<EnumSchema>,
    #[serde(default)]
    pub structs: Vec<StructSchema>,
    /// Delegate signature functions, referenced as `TDelegate<Name>`.
    #[serde(default)]
    pub delegates: Vec<FunctionSchema>,
    #[serde(default)]
    pub classes: Vec<ClassSchema>,
}

#[derive(Debug, Deserialize)]
pub struct EnumSchema {
    pub name: String,
    /// Entry names, valued by position.
    pub entries: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct StructSchema {
    pub name: String,
    #[serde(rename = "super")]
    pub super_struct: Option<String>,
    /// `STRUCT_*` flag names without the prefix.
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub properties: Vec<PropertySchema>,
}

#[derive(Debug, Deserialize)]
pub struct ClassSchema {
    pub name: String,
    #[serde(rename = "super")]
    pub super_struct: Option<String>,
    /// `CLASS_*` flag names without the prefix.
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub properties: Vec<PropertySchema>,
    #[serde(default)]
    pub functions: Vec<FunctionSchema>,
}

#[derive(Debug, Deserialize)]
pub struct FunctionSchema {
    pub name: String,
    /// `FUNC_*` flag names without the prefix.
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub params: Vec<PropertySchema>,
}

#[derive(Debug, Deserialize)]
pub struct PropertySchema {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "default_array_dim")]
    pub array_dim: i32,
    /// `CPF_*` flag names without the prefix.
    #[serde(default)]
    pub flags: Vec<String>,
    pub rep_notify: Option<String>,
    pub offset: Option<i32>,
}

fn default_array_dim() -> i32 {
    1
}

macro_rules! parse_flags {
    ($ty:ty, $prefix:literal, $names:expr) => {
        $names.iter().try_fold(<$ty>::empty(), |flags, name| {
            <$ty>::from_name(&format!(concat!($prefix, "{}"), name))
                .map(|flag| flags | flag)
                .with_context(|| format!("unknown flag {}{name}", $prefix))
        })
    };
}

impl Schema {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse schema")
    }

    /// Builds and registers every type. Types must come after the types they derive from
    /// or embed by value; object references may point anywhere. Delegate signatures are
    /// built after the structs, so only classes hold delegate properties.
    pub fn register(&self, objects: &FUObjectArray) -> Result<()> {
        let mut library = Library {
            objects,
            declared: HashMap::new(),
            signatures: HashMap::new(),
        };

        for uenum in &self.enums {
            let entries = uenum
                .entries
                .iter()
                .enumerate()
                .map(|(i, name)| (name.as_str(), i as i64))
                .collect::<Vec<_>>();
            objects.register_enum(Arc::new(UEnum::new(&uenum.name, &entries)));
        }

        for ustruct in &self.structs {
            let builder = StructBuilder::script_struct(&ustruct.name);
            library.declare(&ustruct.name, builder.declare())?;
        }
        for class in &self.classes {
            let builder = StructBuilder::class(&class.name);
            library.declare(&class.name, builder.declare())?;
        }

        for ustruct in &self.structs {
            let mut builder = StructBuilder::script_struct(&ustruct.name)
                .struct_flags(parse_flags!(EStructFlags, "STRUCT_", ustruct.flags)?);
            if let Some(super_name) = &ustruct.super_struct {
                builder = builder.super_struct(&library.find(super_name)?);
            }
            for property in &ustruct.properties {
                builder = builder.property(library.property(property)?);
            }
            library.link(&ustruct.name, builder)?;
        }

        for signature in &self.delegates {
            let function = library.function("delegate", signature)?;
            if library
                .signatures
                .insert(signature.name.clone(), function)
                .is_some()
            {
                bail!("delegate signature '{}' is defined more than once", signature.name);
            }
        }

        for class in &self.classes {
            let mut builder = StructBuilder::class(&class.name)
                .class_flags(parse_flags!(EClassFlags, "CLASS_", class.flags)?);
            if let Some(super_name) = &class.super_struct {
                builder = builder.super_struct(&library.find(super_name)?);
            }
            for interface in &class.interfaces {
                builder = builder.interface(&library.find(interface)?);
            }
            for property in &class.properties {
                builder = builder.property(library.property(property)?);
            }
            for function in &class.functions {
                builder = builder.with_function(&library.function(&class.name, function)?);
            }
            library.link(&class.name, builder)?;
        }

        tracing::info!(
            "Registered {} enums, {} structs and {} classes",
            self.enums.len(),
            self.structs.len(),
            self.classes.len()
        );
        Ok(())
    }
}

struct Library<'a> {
    objects: &'a FUObjectArray,
    declared: HashMap<String, Arc<UStruct>>,
    signatures: HashMap<String, Arc<UFunction>>,
}

impl Library<'_> {
    fn declare(&mut self, name: &str, ustruct: Arc<UStruct>) -> Result<()> {
        if self.declared.insert(name.to_string(), ustruct).is_some() {
            bail!("type '{name}' is defined more than once");
        }
        Ok(())
    }

    fn link(&self, name: &str, builder: StructBuilder) -> Result<()> {
        let target = self.find(name)?;
        builder
            .link(&target)
            .with_context(|| format!("failed to link '{name}'"))?;
        self.objects.register_struct(target);
        Ok(())
    }

    fn find(&self, name: &str) -> Result<Arc<UStruct>> {
        self.find_type(name)
            .with_context(|| format!("unknown type '{name}'"))
    }

    /// Looks a type up by name, also trying it without its C++ prefix.
    fn find_type(&self, name: &str) -> Option<Arc<UStruct>> {
        let name = name.trim();
        self.declared.get(name).cloned().or_else(|| {
            name.strip_prefix(['U', 'A', 'F', 'I'])
                .and_then(|name| self.declared.get(name).cloned())
        })
    }

    fn find_enum(&self, name: &str) -> Option<Arc<UEnum>> {
        self.objects.find_enum(FName::new(name.trim()))
    }

    fn signature(&self, name: &str) -> Result<Arc<UFunction>> {
        self.signatures
            .get(name)
            .cloned()
            .with_context(|| format!("unknown delegate signature '{name}'"))
    }

    /// Class of an object reference. `UObject` itself maps to no class.
    fn object_class(&self, name: &str) -> Result<Option<Arc<UClass>>> {
        let name = name.trim();
        if name == "UObject" || name == "Object" {
            return Ok(None);
        }
        let class = self.find(name)?;
        if !class.is_class() {
            bail!("'{name}' is not a class");
        }
        Ok(Some(class))
    }

    fn function(&self, owner: &str, function: &FunctionSchema) -> Result<Arc<UFunction>> {
        let mut builder = StructBuilder::function(&function.name).function_flags(parse_flags!(
            EFunctionFlags,
            "FUNC_",
            function.flags
        )?);
        for param in &function.params {
            let property = self.property(param)?.with_flags(EPropertyFlags::CPF_Parm);
            builder = builder.property(property);
        }
        builder
            .build()
            .with_context(|| format!("failed to build function {owner}::{}", function.name))
    }

    fn property(&self, schema: &PropertySchema) -> Result<UProperty> {
        let mut property = self
            .property_of_type(&schema.name, &schema.type_name)
            .with_context(|| format!("bad type for property '{}'", schema.name))?
            .with_array_dim(schema.array_dim)
            .with_flags(parse_flags!(EPropertyFlags, "CPF_", schema.flags)?);
        if let Some(function) = &schema.rep_notify {
            property = property.with_rep_notify(function);
        }
        if let Some(offset) = schema.offset {
            property = property.with_offset(offset);
        }
        Ok(property)
    }

    /// Parses type strings such as `int32`, `TArray<float>`, `FVector` or `Actor*`.
    fn property_of_type(&self, name: &str, type_name: &str) -> Result<UProperty> {
        let type_name = type_name.trim();
        if let Some(class) = type_name.strip_suffix('*') {
            return Ok(match class.trim() {
                "UClass" | "Class" => UProperty::class(name, None),
                class => UProperty::object(name, self.object_class(class)?.as_ref()),
            });
        }
        if let Some((template, argument)) = type_name
            .strip_suffix('>')
            .and_then(|t| t.split_once('<'))
        {
            let argument = argument.trim();
            return Ok(match template.trim() {
                "TArray" => UProperty::array(name, self.property_of_type(name, argument)?),
                "TEnumAsByte" => UProperty::byte_enum(
                    name,
                    self.find_enum(argument)
                        .with_context(|| format!("unknown enum '{argument}'"))?,
                ),
                "TWeakObjectPtr" => {
                    UProperty::weak_object(name, self.object_class(argument)?.as_ref())
                }
                "TLazyObjectPtr" => {
                    UProperty::lazy_object(name, self.object_class(argument)?.as_ref())
                }
                "TAssetPtr" => UProperty::asset(name, self.object_class(argument)?.as_ref()),
                "TSubclassOf" => UProperty::class(name, self.object_class(argument)?.as_ref()),
                "TAssetSubclassOf" => {
                    UProperty::asset_class(name, self.object_class(argument)?.as_ref())
                }
                "TScriptInterface" => match self.object_class(argument)? {
                    Some(interface) => UProperty::interface(name, &interface),
                    None => bail!("TScriptInterface needs an interface class"),
                },
                "TDelegate" => UProperty::delegate(name, Some(&self.signature(argument)?)),
                "TMulticastDelegate" => {
                    UProperty::multicast_delegate(name, Some(&self.signature(argument)?))
                }
                template => bail!("unsupported template '{template}'"),
            });
        }
        Ok(match type_name {
            "uint8" | "byte" => UProperty::byte(name),
            "int8" => UProperty::int8(name),
            "int16" => UProperty::int16(name),
            "int32" | "int" => UProperty::int(name),
            "int64" => UProperty::int64(name),
            "uint16" => UProperty::uint16(name),
            "uint32" => UProperty::uint32(name),
            "uint64" => UProperty::uint64(name),
            "float" => UProperty::float(name),
            "double" => UProperty::double(name),
            "bool" => UProperty::bool(name),
            "bitfield" => UProperty::bitfield(name),
            "FName" => UProperty::fname(name),
            "FString" => UProperty::str(name),
            "FScriptDelegate" => UProperty::delegate(name, None),
            "FMulticastScriptDelegate" => UProperty::multicast_delegate(name, None),
            other => {
                if let Some(uenum) = self.find_enum(other) {
                    UProperty::byte_enum(name, uenum)
                } else if let Some(ustruct) = self.find_type(other) {
                    if !ustruct.is_script_struct() {
                        bail!("'{other}' is not a struct, use '{other}*' for object references");
                    }
                    UProperty::script_struct(name, &ustruct)
                } else {
                    bail!("unknown type '{other}'")
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uproperty::EObjectFlags;

    #[test]
    fn test_demo_schema_registers() {
        let objects = FUObjectArray::new();
        Schema::parse(DEMO_SCHEMA)
            .unwrap()
            .register(&objects)
            .unwrap();
        let pawn = objects.find_struct(FName::new("Pawn")).unwrap();
        assert!(pawn.is_class());
        assert!(pawn.is_linked());
        assert!(pawn.find_property(FName::new("Health")).is_some());
        assert!(objects.find_enum(FName::new("ETeam")).is_some());
    }

    #[test]
    fn test_schema_errors() {
        let objects = FUObjectArray::new();
        let unknown_type = r#"{ "structs": [ { "name": "Bad", "properties": [ { "name": "A", "type": "FWhatever" } ] } ] }"#;
        let err = Schema::parse(unknown_type).unwrap().register(&objects).unwrap_err();
        assert!(format!("{err:#}").contains("unknown type 'FWhatever'"));

        let unknown_flag = r#"{ "classes": [ { "name": "Bad", "flags": ["Nope"] } ] }"#;
        let err = Schema::parse(unknown_flag).unwrap().register(&objects).unwrap_err();
        assert!(format!("{err:#}").contains("unknown flag CLASS_Nope"));

        let unknown_signature = r#"{ "classes": [ { "name": "Bad", "properties": [ { "name": "OnHit", "type": "TDelegate<FOnNothing>" } ] } ] }"#;
        let err = Schema::parse(unknown_signature).unwrap().register(&objects).unwrap_err();
        assert!(format!("{err:#}").contains("unknown delegate signature 'FOnNothing'"));
    }

    #[test]
    fn test_delegate_signatures_are_checked() {
        let mut objects = FUObjectArray::new();
        Schema::parse(DEMO_SCHEMA)
            .unwrap()
            .register(&objects)
            .unwrap();
        let actor = objects.find_struct(FName::new("Actor")).unwrap();
        let pawn = objects.find_struct(FName::new("Pawn")).unwrap();
        let on_death = pawn.find_property(FName::new("OnDeath")).unwrap();
        assert_eq!(
            on_death.signature_function().unwrap().get_fname(),
            FName::new("OnDeathSignature")
        );

        let victim = objects
            .new_object(&pawn, None, FName::new("Victim"), EObjectFlags::RF_NoFlags)
            .unwrap();
        objects
            .new_object(&actor, None, FName::new("Listener"), EObjectFlags::RF_NoFlags)
            .unwrap();
        let value = unsafe { on_death.object_ptr_to_value_ptr(victim, 0) }.unwrap();
        unsafe {
            on_death
                .add_delegate("Listener.OnDestroyed", value, &objects)
                .unwrap();
            let err = on_death
                .add_delegate("Listener.ReceiveDamage", value, &objects)
                .unwrap_err();
            assert!(err.to_string().contains("does not match signature"));
        }
    }
}
