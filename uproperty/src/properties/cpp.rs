use crate::flags::{EClassFlags, EPropertyExportCPPFlags as CPPF, EPropertyFlags};
use crate::ustruct::UStruct;

use super::{PropertyKind, UProperty};

/// Where an exported declaration is going to be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum EExportedDeclaration {
    Local,
    Member,
    Parameter,
}

fn class_cpp_name(class: Option<&UStruct>) -> String {
    match class {
        Some(class) => format!("U{}", class.get_fname()),
        None => "UObject".to_string(),
    }
}

fn delegate_cpp_name(signature: Option<&UStruct>, fallback: &str) -> String {
    match signature {
        Some(signature) => {
            let name = signature.get_fname().to_string();
            format!("F{}", name.strip_suffix("__DelegateSignature").unwrap_or(&name))
        }
        None => fallback.to_string(),
    }
}

/// `TArray<TArray<int32> >` keeps the closing brackets apart.
fn template_argument(text: &str) -> String {
    if text.ends_with('>') {
        format!("<{text} >")
    } else {
        format!("<{text}>")
    }
}

impl UProperty {
    /// C++ type of a single element. Template arguments go to `extended`, so
    /// an array of ints is `TArray` with `<int32>`.
    pub fn get_cpp_type(&self, extended: Option<&mut String>, flags: CPPF) -> String {
        let mut extended_text = String::new();
        let base = match &self.kind {
            PropertyKind::Byte(Some(uenum)) => format!("TEnumAsByte<{}>", uenum.get_fname()),
            PropertyKind::Byte(None) => "uint8".to_string(),
            PropertyKind::Int8 => "int8".to_string(),
            PropertyKind::Int16 => "int16".to_string(),
            PropertyKind::Int => "int32".to_string(),
            PropertyKind::Int64 => "int64".to_string(),
            PropertyKind::UInt16 => "uint16".to_string(),
            PropertyKind::UInt32 => "uint32".to_string(),
            PropertyKind::UInt64 => "uint64".to_string(),
            PropertyKind::Float => "float".to_string(),
            PropertyKind::Double => "double".to_string(),
            PropertyKind::Bool(b) => {
                let argument = flags.contains(CPPF::CPPF_ArgumentOrReturnValue | CPPF::CPPF_Implementation);
                if b.is_native_bool() || argument {
                    "bool".to_string()
                } else {
                    format!("uint{}", b.field_size() * 8)
                }
            }
            PropertyKind::Object(class) => format!("{}*", class_cpp_name(class.upgrade().as_deref())),
            PropertyKind::WeakObject(class) => format!(
                "TWeakObjectPtr{}",
                template_argument(&class_cpp_name(class.upgrade().as_deref()))
            ),
            PropertyKind::LazyObject(class) => format!(
                "TLazyObjectPtr{}",
                template_argument(&class_cpp_name(class.upgrade().as_deref()))
            ),
            PropertyKind::Asset(class) => format!(
                "TAssetPtr{}",
                template_argument(&class_cpp_name(class.upgrade().as_deref()))
            ),
            PropertyKind::Class { meta_class } => match meta_class.upgrade() {
                Some(meta) => format!("TSubclassOf{}", template_argument(&class_cpp_name(Some(&meta)))),
                None => "UClass*".to_string(),
            },
            PropertyKind::AssetClass { meta_class } => format!(
                "TAssetSubclassOf{}",
                template_argument(&class_cpp_name(meta_class.upgrade().as_deref()))
            ),
            PropertyKind::Interface(class) => {
                let name = class
                    .upgrade()
                    .map(|class| format!("I{}", class.get_fname()))
                    .unwrap_or_else(|| "IInterface".to_string());
                format!("TScriptInterface{}", template_argument(&name))
            }
            PropertyKind::Name => "FName".to_string(),
            PropertyKind::Str => "FString".to_string(),
            PropertyKind::Array(inner) => {
                let mut inner_extended = String::new();
                let inner_type = inner.get_cpp_type(Some(&mut inner_extended), flags);
                extended_text = template_argument(&(inner_type + &inner_extended));
                "TArray".to_string()
            }
            PropertyKind::Struct(ustruct) => format!("F{}", ustruct.get_fname()),
            PropertyKind::Delegate(signature) => {
                delegate_cpp_name(signature.as_deref(), "FScriptDelegate")
            }
            PropertyKind::MulticastDelegate(signature) => {
                delegate_cpp_name(signature.as_deref(), "FMulticastScriptDelegate")
            }
        };
        match extended {
            Some(extended) => {
                extended.push_str(&extended_text);
                base
            }
            None => base + &extended_text,
        }
    }

    /// Macro flavour used by generated code together with its type argument.
    pub fn get_cpp_macro_type(&self) -> (&'static str, String) {
        let macro_type = match &self.kind {
            PropertyKind::Byte(Some(uenum)) => return ("TENUM", uenum.get_fname().to_string()),
            PropertyKind::Bool(_) => "UBOOL",
            PropertyKind::Object(_) | PropertyKind::Class { .. } => "OBJECT",
            PropertyKind::WeakObject(_) => "WEAKOBJECT",
            PropertyKind::LazyObject(_) => "LAZYOBJECT",
            PropertyKind::Asset(_) | PropertyKind::AssetClass { .. } => "ASSETOBJECT",
            PropertyKind::Interface(_) => "TINTERFACE",
            PropertyKind::Array(inner) => return ("TARRAY", inner.get_cpp_type(None, CPPF::CPPF_None)),
            PropertyKind::Struct(_) => "STRUCT",
            _ => "PROPERTY",
        };
        (macro_type, self.get_cpp_type(None, CPPF::CPPF_None))
    }

    /// Values too large to copy cheaply are passed by reference.
    fn pass_cpp_args_by_ref(&self) -> bool {
        matches!(
            self.kind,
            PropertyKind::Str | PropertyKind::Array(_) | PropertyKind::Struct(_)
        )
    }

    /// Appends a C++ declaration of this property, e.g. `int32 Scores[3]` or
    /// `const FString& Title`.
    ///
    /// A bitfield parameter is `uint8` unless `CPPF_Implementation` is also passed.
    pub fn export_cpp_declaration(
        &self,
        out: &mut String,
        declaration: EExportedDeclaration,
        array_dim_override: Option<&str>,
        additional_flags: CPPF,
        skip_parameter_name: bool,
    ) {
        use EPropertyFlags as C;
        let is_parameter = declaration == EExportedDeclaration::Parameter;
        let is_interface = matches!(self.kind, PropertyKind::Interface(_));
        let is_bool = matches!(self.kind, PropertyKind::Bool(_));
        let flags = if is_parameter {
            additional_flags | CPPF::CPPF_ArgumentOrReturnValue
        } else {
            additional_flags
        };

        let mut extended = String::new();
        let mut type_text = self.get_cpp_type(Some(&mut extended), flags);
        let can_have_ref = !additional_flags.contains(CPPF::CPPF_NoRef);
        let can_have_const = !additional_flags.contains(CPPF::CPPF_NoConst);

        // bitfields cannot be const
        if !is_bool && can_have_const {
            let is_const_param = is_parameter
                && (self.has_any_property_flags(C::CPF_ConstParm)
                    || (is_interface && !self.has_all_property_flags(C::CPF_OutParm)));
            let is_on_const_class = matches!(&self.kind, PropertyKind::Object(class)
                if class.upgrade().is_some_and(|class| class.has_any_class_flags(EClassFlags::CLASS_Const)));
            let should_have_ref =
                can_have_ref && self.has_any_property_flags(C::CPF_OutParm | C::CPF_ReferenceParm);
            if is_on_const_class || (is_const_param && !should_have_ref) {
                type_text = format!("const {type_text}");
            }
            let from_const_class = declaration == EExportedDeclaration::Member
                && self
                    .get_owner_class()
                    .is_some_and(|class| class.has_any_class_flags(EClassFlags::CLASS_Const));
            if from_const_class || (is_const_param && should_have_ref) {
                extended.push_str(" const");
            }
        }

        let name = if skip_parameter_name {
            String::new()
        } else {
            self.get_name()
        };
        let array = if self.array_dim != 1 && !additional_flags.contains(CPPF::CPPF_NoStaticArray) {
            match array_dim_override {
                Some(dim) => format!("[{dim}]"),
                None => format!("[{}]", self.array_dim),
            }
        } else {
            String::new()
        };

        let declaration_text = match &self.kind {
            PropertyKind::Bool(b) => {
                if self.array_dim == 1 && declaration == EExportedDeclaration::Member {
                    let bitfield = if b.is_native_bool() { "" } else { ":1" };
                    format!("{type_text}{extended} {name}{array}{bitfield}")
                } else if is_parameter && self.has_any_property_flags(C::CPF_OutParm) {
                    let reference = if can_have_ref { "&" } else { "" };
                    format!("{type_text}{extended}{reference} {name}{array}")
                } else {
                    format!("{type_text}{extended} {name}{array}")
                }
            }
            _ if is_parameter && self.array_dim > 1 => format!("{type_text}{extended} {name}{array}"),
            _ if is_parameter && self.pass_cpp_args_by_ref() => {
                let constness = if can_have_const
                    && !self.has_any_property_flags(C::CPF_OutParm | C::CPF_ConstParm)
                {
                    "const "
                } else {
                    ""
                };
                let reference = if can_have_ref { "&" } else { "" };
                format!("{constness}{type_text}{extended}{reference} {name}")
            }
            _ if is_parameter => {
                let reference = if can_have_ref
                    && (self.has_any_property_flags(C::CPF_OutParm | C::CPF_ReferenceParm) || is_interface)
                {
                    "&"
                } else {
                    ""
                };
                format!("{type_text}{extended}{reference} {name}{array}")
            }
            _ => format!("{type_text}{extended} {name}{array}"),
        };
        out.push_str(declaration_text.trim_end());
    }
}
