#![allow(non_upper_case_globals)]

bitflags::bitflags! {
    /// Flags associated with each property.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EPropertyFlags: u64 {
        const CPF_None = 0;
        const CPF_Edit = 0x0000000000000001;
        const CPF_ConstParm = 0x0000000000000002;
        const CPF_BlueprintVisible = 0x0000000000000004;
        const CPF_ExportObject = 0x0000000000000008;
        const CPF_BlueprintReadOnly = 0x0000000000000010;
        const CPF_Net = 0x0000000000000020;
        const CPF_EditFixedSize = 0x0000000000000040;
        const CPF_Parm = 0x0000000000000080;
        const CPF_OutParm = 0x0000000000000100;
        const CPF_ZeroConstructor = 0x0000000000000200;
        const CPF_ReturnParm = 0x0000000000000400;
        const CPF_DisableEditOnTemplate = 0x0000000000000800;
        const CPF_Transient = 0x0000000000002000;
        const CPF_Config = 0x0000000000004000;
        const CPF_Localized = 0x0000000000008000;
        const CPF_DisableEditOnInstance = 0x0000000000010000;
        const CPF_EditConst = 0x0000000000020000;
        const CPF_GlobalConfig = 0x0000000000040000;
        const CPF_InstancedReference = 0x0000000000080000;
        const CPF_DuplicateTransient = 0x0000000000200000;
        const CPF_SubobjectReference = 0x0000000000400000;
        const CPF_SaveGame = 0x0000000001000000;
        const CPF_NoClear = 0x0000000002000000;
        const CPF_ReferenceParm = 0x0000000008000000;
        const CPF_BlueprintAssignable = 0x0000000010000000;
        const CPF_Deprecated = 0x0000000020000000;
        const CPF_IsPlainOldData = 0x0000000040000000;
        const CPF_RepSkip = 0x0000000080000000;
        const CPF_RepNotify = 0x0000000100000000;
        const CPF_Interp = 0x0000000200000000;
        const CPF_NonTransactional = 0x0000000400000000;
        const CPF_EditorOnly = 0x0000000800000000;
        const CPF_NoDestructor = 0x0000001000000000;
        const CPF_AutoWeak = 0x0000004000000000;
        const CPF_ContainsInstancedReference = 0x0000008000000000;
        const CPF_AssetRegistrySearchable = 0x0000010000000000;
        const CPF_SimpleDisplay = 0x0000020000000000;
        const CPF_AdvancedDisplay = 0x0000040000000000;
        const CPF_Protected = 0x0000080000000000;
        const CPF_BlueprintCallable = 0x0000100000000000;
        const CPF_BlueprintAuthorityOnly = 0x0000200000000000;
        const CPF_TextExportTransient = 0x0000400000000000;
        const CPF_NonPIEDuplicateTransient = 0x0000800000000000;
        const CPF_ExposeOnSpawn = 0x0001000000000000;
        const CPF_PersistentInstance = 0x0002000000000000;
        const CPF_UObjectWrapper = 0x0004000000000000;

        const CPF_DevelopmentAssets = Self::CPF_EditorOnly.bits();
        const CPF_ParmFlags = Self::CPF_Parm.bits()
            | Self::CPF_OutParm.bits()
            | Self::CPF_ReturnParm.bits()
            | Self::CPF_ReferenceParm.bits()
            | Self::CPF_ConstParm.bits();
        const CPF_PropagateToArrayInner = Self::CPF_ExportObject.bits()
            | Self::CPF_PersistentInstance.bits()
            | Self::CPF_InstancedReference.bits()
            | Self::CPF_ContainsInstancedReference.bits()
            | Self::CPF_Config.bits()
            | Self::CPF_EditConst.bits()
            | Self::CPF_Deprecated.bits()
            | Self::CPF_EditorOnly.bits()
            | Self::CPF_AutoWeak.bits()
            | Self::CPF_UObjectWrapper.bits();
        const CPF_InterfaceClearMask = Self::CPF_ExportObject.bits()
            | Self::CPF_InstancedReference.bits()
            | Self::CPF_ContainsInstancedReference.bits();
        /// Flags derived from the value type, never set by hand.
        const CPF_ComputedFlags = Self::CPF_IsPlainOldData.bits()
            | Self::CPF_NoDestructor.bits()
            | Self::CPF_ZeroConstructor.bits();
        const CPF_AllFlags = u64::MAX;
    }

    /// Flags controlling text import/export and comparison.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EPropertyPortFlags: u32 {
        const PPF_None = 0x00000000;
        const PPF_Localized = 0x00000001;
        const PPF_Delimited = 0x00000002;
        const PPF_CheckReferences = 0x00000004;
        const PPF_ExportsNotFullyQualified = 0x00000008;
        const PPF_AttemptNonQualifiedSearch = 0x00000010;
        const PPF_RestrictImportTypes = 0x00000020;
        const PPF_LocalizedOnly = 0x00000080;
        const PPF_SubobjectsOnly = 0x00000100;
        const PPF_DeepComparison = 0x00000200;
        const PPF_DeepCompareInstances = 0x00000400;
        const PPF_Copy = 0x00000800;
        const PPF_Duplicate = 0x00001000;
        const PPF_SimpleObjectText = 0x00002000;
        const PPF_ParsingDefaultProperties = 0x00008000;
        const PPF_IncludeTransient = 0x00020000;
        const PPF_DeltaComparison = 0x00040000;
        const PPF_PropertyWindow = 0x00080000;
        const PPF_NoInternalArcheType = 0x00100000;
        const PPF_DebugDump = 0x00200000;
        const PPF_DuplicateForPIE = 0x00400000;
        const PPF_SeparateDeclare = 0x00800000;
        const PPF_SeparateDefine = 0x01000000;
        const PPF_BlueprintDebugView = 0x02000000;
        const PPF_ConsoleVariable = 0x04000000;
        const PPF_UseDeprecatedProperties = 0x08000000;
        const PPF_ExportCpp = 0x10000000;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EStructFlags: u32 {
        const STRUCT_NoFlags = 0x00000000;
        const STRUCT_Native = 0x00000001;
        const STRUCT_IdenticalNative = 0x00000002;
        const STRUCT_HasInstancedReference = 0x00000004;
        /// Exported and serialized as a unit.
        const STRUCT_Atomic = 0x00000010;
        /// Always serialized in binary form, even in tagged archives.
        const STRUCT_Immutable = 0x00000020;
        const STRUCT_AddStructReferencedObjects = 0x00000040;
        const STRUCT_RequiredAPI = 0x00000200;
        const STRUCT_NetSerializeNative = 0x00000400;
        const STRUCT_SerializeNative = 0x00000800;
        const STRUCT_CopyNative = 0x00001000;
        const STRUCT_IsPlainOldData = 0x00002000;
        const STRUCT_NoDestructor = 0x00004000;
        const STRUCT_ZeroConstructor = 0x00008000;
        const STRUCT_ExportTextItemNative = 0x00010000;
        const STRUCT_ImportTextItemNative = 0x00020000;
        const STRUCT_PostSerializeNative = 0x00040000;
        const STRUCT_SerializeFromMismatchedTag = 0x00080000;
        const STRUCT_NetDeltaSerializeNative = 0x00100000;

        /// Flags inherited from the super struct.
        const STRUCT_Inherit = Self::STRUCT_HasInstancedReference.bits() | Self::STRUCT_Atomic.bits();
        const STRUCT_ComputedFlags = Self::STRUCT_NetDeltaSerializeNative.bits()
            | Self::STRUCT_NetSerializeNative.bits()
            | Self::STRUCT_SerializeNative.bits()
            | Self::STRUCT_PostSerializeNative.bits()
            | Self::STRUCT_CopyNative.bits()
            | Self::STRUCT_IsPlainOldData.bits()
            | Self::STRUCT_NoDestructor.bits()
            | Self::STRUCT_ZeroConstructor.bits()
            | Self::STRUCT_IdenticalNative.bits()
            | Self::STRUCT_AddStructReferencedObjects.bits()
            | Self::STRUCT_ExportTextItemNative.bits()
            | Self::STRUCT_ImportTextItemNative.bits()
            | Self::STRUCT_SerializeFromMismatchedTag.bits();
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EClassFlags: u32 {
        const CLASS_None = 0x0000;
        const CLASS_Abstract = 0x0001;
        const CLASS_DefaultConfig = 0x0002;
        const CLASS_Config = 0x0004;
        const CLASS_Transient = 0x0008;
        const CLASS_Parsed = 0x0010;
        const CLASS_Native = 0x0080;
        const CLASS_NoExport = 0x0100;
        const CLASS_NotPlaceable = 0x0200;
        const CLASS_PerObjectConfig = 0x0400;
        const CLASS_EditInlineNew = 0x1000;
        const CLASS_CollapseCategories = 0x2000;
        const CLASS_Interface = 0x4000;
        const CLASS_Const = 0x00010000;
        const CLASS_CompiledFromBlueprint = 0x00040000;
        const CLASS_MinimalAPI = 0x00080000;
        const CLASS_RequiredAPI = 0x00100000;
        const CLASS_DefaultToInstanced = 0x00200000;
        const CLASS_TokenStreamAssembled = 0x00400000;
        const CLASS_HasInstancedReference = 0x00800000;
        const CLASS_Hidden = 0x01000000;
        const CLASS_Deprecated = 0x02000000;
        const CLASS_HideDropDown = 0x04000000;
        const CLASS_Intrinsic = 0x10000000;
        const CLASS_Constructed = 0x20000000;
        const CLASS_NewerVersionExists = 0x80000000;
        /// Flags inherited from the super class.
        const CLASS_Inherit = Self::CLASS_Transient.bits()
            | Self::CLASS_DefaultConfig.bits()
            | Self::CLASS_Config.bits()
            | Self::CLASS_PerObjectConfig.bits()
            | Self::CLASS_Const.bits()
            | Self::CLASS_HasInstancedReference.bits()
            | Self::CLASS_Deprecated.bits()
            | Self::CLASS_DefaultToInstanced.bits();
    }

    /// Identifies the concrete field type without a dynamic cast.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EClassCastFlags: u64 {
        const CASTCLASS_None = 0x0000000000000000;
        const CASTCLASS_UField = 0x0000000000000001;
        const CASTCLASS_UInt8Property = 0x0000000000000002;
        const CASTCLASS_UEnum = 0x0000000000000004;
        const CASTCLASS_UStruct = 0x0000000000000008;
        const CASTCLASS_UScriptStruct = 0x0000000000000010;
        const CASTCLASS_UClass = 0x0000000000000020;
        const CASTCLASS_UByteProperty = 0x0000000000000040;
        const CASTCLASS_UIntProperty = 0x0000000000000080;
        const CASTCLASS_UFloatProperty = 0x0000000000000100;
        const CASTCLASS_UUInt64Property = 0x0000000000000200;
        const CASTCLASS_UClassProperty = 0x0000000000000400;
        const CASTCLASS_UUInt32Property = 0x0000000000000800;
        const CASTCLASS_UInterfaceProperty = 0x0000000000001000;
        const CASTCLASS_UNameProperty = 0x0000000000002000;
        const CASTCLASS_UStrProperty = 0x0000000000004000;
        const CASTCLASS_UProperty = 0x0000000000008000;
        const CASTCLASS_UObjectProperty = 0x0000000000010000;
        const CASTCLASS_UBoolProperty = 0x0000000000020000;
        const CASTCLASS_UUInt16Property = 0x0000000000040000;
        const CASTCLASS_UFunction = 0x0000000000080000;
        const CASTCLASS_UStructProperty = 0x0000000000100000;
        const CASTCLASS_UArrayProperty = 0x0000000000200000;
        const CASTCLASS_UInt64Property = 0x0000000000400000;
        const CASTCLASS_UDelegateProperty = 0x0000000000800000;
        const CASTCLASS_UNumericProperty = 0x0000000001000000;
        const CASTCLASS_UMulticastDelegateProperty = 0x0000000002000000;
        const CASTCLASS_UObjectPropertyBase = 0x0000000004000000;
        const CASTCLASS_UWeakObjectProperty = 0x0000000008000000;
        const CASTCLASS_ULazyObjectProperty = 0x0000000010000000;
        const CASTCLASS_UAssetObjectProperty = 0x0000000020000000;
        const CASTCLASS_UInt16Property = 0x0000000080000000;
        const CASTCLASS_UDoubleProperty = 0x0000000100000000;
        const CASTCLASS_UAssetClassProperty = 0x0000000200000000;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EObjectFlags: u32 {
        const RF_NoFlags = 0x0000;
        const RF_Public = 0x0001;
        const RF_Standalone = 0x0002;
        const RF_MarkAsNative = 0x0004;
        const RF_Transactional = 0x0008;
        const RF_ClassDefaultObject = 0x0010;
        const RF_ArchetypeObject = 0x0020;
        const RF_Transient = 0x0040;
        const RF_MarkAsRootSet = 0x0080;
        const RF_TagGarbageTemp = 0x0100;
        const RF_NeedLoad = 0x0400;
        const RF_NeedPostLoad = 0x1000;
        const RF_BeginDestroyed = 0x8000;
        const RF_FinishDestroyed = 0x00010000;
        const RF_DefaultSubObject = 0x00040000;
        const RF_WasLoaded = 0x00080000;
        const RF_TextExportTransient = 0x00100000;
        const RF_DuplicateTransient = 0x00800000;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EFunctionFlags: u32 {
        const FUNC_None = 0x0000;
        const FUNC_Final = 0x0001;
        const FUNC_RequiredAPI = 0x0002;
        const FUNC_BlueprintAuthorityOnly = 0x0004;
        const FUNC_BlueprintCosmetic = 0x0008;
        const FUNC_Net = 0x0040;
        const FUNC_NetReliable = 0x0080;
        const FUNC_NetRequest = 0x0100;
        const FUNC_Exec = 0x0200;
        const FUNC_Native = 0x0400;
        const FUNC_Event = 0x0800;
        const FUNC_NetResponse = 0x1000;
        const FUNC_Static = 0x2000;
        const FUNC_NetMulticast = 0x4000;
        const FUNC_MulticastDelegate = 0x00010000;
        const FUNC_Public = 0x00020000;
        const FUNC_Private = 0x00040000;
        const FUNC_Protected = 0x00080000;
        const FUNC_Delegate = 0x00100000;
        const FUNC_NetServer = 0x00200000;
        const FUNC_HasOutParms = 0x00400000;
        const FUNC_HasDefaults = 0x00800000;
        const FUNC_NetClient = 0x01000000;
        const FUNC_BlueprintCallable = 0x04000000;
        const FUNC_BlueprintEvent = 0x08000000;
        const FUNC_BlueprintPure = 0x10000000;
        const FUNC_Const = 0x40000000;
        const FUNC_AllFlags = 0xffffffff;
    }

    /// What kind of edit produced a property change notification.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EPropertyChangeType: u32 {
        const Unspecified = 1 << 0;
        const ArrayAdd = 1 << 1;
        const ValueSet = 1 << 2;
        const Duplicate = 1 << 3;
        /// Value is still being changed, e.g. while dragging a slider.
        const Interactive = 1 << 4;
    }

    /// Options for C++ type and declaration export.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EPropertyExportCPPFlags: u32 {
        const CPPF_None = 0x00;
        const CPPF_OptionalValue = 0x01;
        const CPPF_ArgumentOrReturnValue = 0x02;
        const CPPF_Implementation = 0x04;
        const CPPF_NoConst = 0x08;
        const CPPF_NoRef = 0x10;
        const CPPF_NoStaticArray = 0x20;
    }
}

impl Default for EPropertyPortFlags {
    fn default() -> Self {
        Self::PPF_None
    }
}

impl Default for EPropertyChangeType {
    fn default() -> Self {
        Self::Unspecified
    }
}
