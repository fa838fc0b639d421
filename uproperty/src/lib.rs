//! Runtime reflection for engine-style object graphs.
//!
//! Types ([`UStruct`]) own an ordered list of fields. Every reflected field is a
//! [`UProperty`] that knows where its value lives inside a container, how large it is and
//! how to copy, compare, clear, destroy, serialize and import/export that value without
//! knowing its Rust type at the call site.

pub mod archive;
pub mod containers;
pub mod edit;
pub mod error;
pub mod field_iterator;
pub mod flags;
pub mod fundamentals;
pub mod gc;
pub mod malloc;
pub mod name;
pub mod object;
pub mod properties;
pub mod script_array;
pub mod text;
pub mod ustruct;

pub use archive::{Archive, FPropertyTag, MemoryReader, MemoryWriter};
pub use containers::{FString, TArray};
pub use edit::{EditChangeListener, FEditPropertyChain, FPropertyChangedChainEvent, FPropertyChangedEvent};
pub use error::{Context, PropertyError, Result};
pub use field_iterator::{
    find_field, find_field_checked, smart_cast_property, EFieldIteratorFlags, FieldClass,
    PropertyClass, TFieldIterator, TFieldRange,
};
pub use flags::*;
pub use fundamentals::{NumericType, PropertyType, TypeFundamentals};
pub use gc::{collect_garbage, FGCReferenceTokenStream, FReferenceCollector};
pub use name::{FName, NAME_NONE};
pub use object::{
    ClassPtr, FAssetPtr, FLazyObjectPtr, FMulticastScriptDelegate, FScriptDelegate,
    FScriptInterface, FUObjectArray, FUniqueObjectGuid, FWeakObjectPtr, ObjectPtr, UObject,
};
pub use properties::{
    BoolProperty, EPropertyType, FDefinedProperty, FScriptArrayHelper, PropertyKind, UProperty,
};
pub use script_array::FScriptArray;
pub use text::{FOutputDevice, FStringOutputDevice};
pub use ustruct::{
    FImplementedInterface, FStructOnScope, StructBuilder, UClass, UEnum, UField, UFunction,
    UScriptStruct, UStruct,
};
