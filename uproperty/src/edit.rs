//! Change notifications for properties edited through reflection.

use std::collections::VecDeque;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::flags::EPropertyChangeType;
use crate::name::{FName, NAME_NONE};
use crate::object::UObject;
use crate::properties::UProperty;

/// Path from an outermost member property down to the property being edited.
#[derive(Debug, Default, Clone)]
pub struct FEditPropertyChain {
    nodes: VecDeque<Arc<UProperty>>,
    active: Option<Arc<UProperty>>,
    active_member: Option<Arc<UProperty>>,
}

impl FEditPropertyChain {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, property: &UProperty) -> Option<usize> {
        self.nodes
            .iter()
            .position(|node| std::ptr::eq(&**node, property))
    }

    pub fn add_head(&mut self, property: &Arc<UProperty>) {
        self.nodes.push_front(property.clone());
    }

    pub fn add_tail(&mut self, property: &Arc<UProperty>) {
        self.nodes.push_back(property.clone());
    }

    /// Inserts `property` after `after`. Returns false when `after` is not in the chain.
    pub fn insert_after(&mut self, after: &UProperty, property: &Arc<UProperty>) -> bool {
        match self.position(after) {
            Some(index) => {
                self.nodes.insert(index + 1, property.clone());
                true
            }
            None => false,
        }
    }

    /// Removes `property` and clears the active nodes that pointed at it.
    pub fn remove(&mut self, property: &UProperty) -> bool {
        let Some(index) = self.position(property) else {
            return false;
        };
        self.nodes.remove(index);
        let is = |node: &Option<Arc<UProperty>>| {
            node.as_deref().is_some_and(|node| std::ptr::eq(node, property))
        };
        if is(&self.active) {
            self.active = None;
        }
        if is(&self.active_member) {
            self.active_member = None;
        }
        true
    }

    pub fn set_active_property_node(&mut self, property: &UProperty) -> bool {
        match self.position(property) {
            Some(index) => {
                self.active = Some(self.nodes[index].clone());
                true
            }
            None => false,
        }
    }

    pub fn set_active_member_property_node(&mut self, property: &UProperty) -> bool {
        match self.position(property) {
            Some(index) => {
                self.active_member = Some(self.nodes[index].clone());
                true
            }
            None => false,
        }
    }

    pub fn get_active_node(&self) -> Option<&Arc<UProperty>> {
        self.active.as_ref()
    }

    pub fn get_active_member_node(&self) -> Option<&Arc<UProperty>> {
        self.active_member.as_ref()
    }

    pub fn get_head(&self) -> Option<&Arc<UProperty>> {
        self.nodes.front()
    }

    pub fn get_tail(&self) -> Option<&Arc<UProperty>> {
        self.nodes.back()
    }

    pub fn num(&self) -> usize {
        self.nodes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<UProperty>> {
        self.nodes.iter()
    }
}

#[derive(Debug, Clone)]
pub struct FPropertyChangedEvent {
    /// The property that changed.
    pub property: Option<Arc<UProperty>>,
    /// The outermost property of the edited object containing `property`.
    pub member_property: Option<Arc<UProperty>>,
    pub change_type: EPropertyChangeType,
    /// Index of the object being notified when several objects were edited at once, or -1.
    pub object_iterator_index: i32,
    array_indices_per_object: Vec<IndexMap<FName, i32>>,
}

impl FPropertyChangedEvent {
    pub fn new(property: Option<&Arc<UProperty>>, change_type: EPropertyChangeType) -> Self {
        Self {
            property: property.cloned(),
            member_property: property.cloned(),
            change_type,
            object_iterator_index: -1,
            array_indices_per_object: vec![],
        }
    }

    pub fn set_active_member_property(&mut self, member_property: Option<&Arc<UProperty>>) {
        self.member_property = member_property.cloned();
    }

    /// Array indices of each property on the chain, per edited object.
    pub fn set_array_index_per_object(&mut self, indices: Vec<IndexMap<FName, i32>>) {
        self.array_indices_per_object = indices;
    }

    /// Array index of `property_name` for the object currently being notified, or -1.
    pub fn get_array_index(&self, property_name: &str) -> i32 {
        usize::try_from(self.object_iterator_index)
            .ok()
            .and_then(|index| self.array_indices_per_object.get(index))
            .and_then(|indices| indices.get(&FName::new(property_name)))
            .copied()
            .unwrap_or(-1)
    }

    pub fn get_property_name(&self) -> FName {
        self.property
            .as_ref()
            .map(|p| p.get_fname())
            .unwrap_or(NAME_NONE)
    }

    pub fn get_member_property_name(&self) -> FName {
        self.member_property
            .as_ref()
            .map(|p| p.get_fname())
            .unwrap_or(NAME_NONE)
    }
}

#[derive(Debug, Clone)]
pub struct FPropertyChangedChainEvent {
    pub event: FPropertyChangedEvent,
    pub property_chain: FEditPropertyChain,
}

impl FPropertyChangedChainEvent {
    pub fn new(property_chain: FEditPropertyChain, event: FPropertyChangedEvent) -> Self {
        Self {
            event,
            property_chain,
        }
    }
}

/// Receives notifications around edits made to an object's properties.
pub trait EditChangeListener {
    fn pre_edit_change(&mut self, _object: &UObject, _chain: &FEditPropertyChain) {}

    fn post_edit_change_property(&mut self, object: &UObject, event: &FPropertyChangedEvent);

    fn post_edit_change_chain_property(
        &mut self,
        object: &UObject,
        event: &FPropertyChangedChainEvent,
    ) {
        self.post_edit_change_property(object, &event.event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props() -> Vec<Arc<UProperty>> {
        ["Outer", "Middle", "Inner", "Other"]
            .into_iter()
            .map(|name| Arc::new(UProperty::int(name)))
            .collect()
    }

    fn chain_names(chain: &FEditPropertyChain) -> Vec<String> {
        chain.iter().map(|p| p.get_name()).collect()
    }

    #[test]
    fn test_chain_editing() {
        let p = props();
        let mut chain = FEditPropertyChain::new();
        assert!(chain.get_head().is_none());

        chain.add_tail(&p[2]);
        chain.add_head(&p[0]);
        assert!(chain.insert_after(&p[0], &p[1]));
        assert!(!chain.insert_after(&p[3], &p[3]));
        assert_eq!(chain_names(&chain), ["Outer", "Middle", "Inner"]);
        assert_eq!(chain.num(), 3);
        assert_eq!(chain.get_head().unwrap().get_name(), "Outer");
        assert_eq!(chain.get_tail().unwrap().get_name(), "Inner");

        assert!(chain.set_active_property_node(&p[2]));
        assert!(chain.set_active_member_property_node(&p[0]));
        assert!(!chain.set_active_property_node(&p[3]));
        assert_eq!(chain.get_active_node().unwrap().get_name(), "Inner");

        assert!(chain.remove(&p[1]));
        assert!(!chain.remove(&p[1]));
        assert_eq!(chain.get_active_node().unwrap().get_name(), "Inner");

        assert!(chain.remove(&p[2]));
        assert!(chain.get_active_node().is_none());
        assert_eq!(chain.get_active_member_node().unwrap().get_name(), "Outer");
        assert_eq!(chain_names(&chain), ["Outer"]);
    }

    #[test]
    fn test_changed_event() {
        let p = props();
        let mut event = FPropertyChangedEvent::new(Some(&p[2]), EPropertyChangeType::ValueSet);
        assert_eq!(event.get_property_name(), FName::new("Inner"));
        assert_eq!(event.get_member_property_name(), FName::new("Inner"));
        event.set_active_member_property(Some(&p[0]));
        assert_eq!(event.get_member_property_name(), FName::new("Outer"));

        assert_eq!(event.get_array_index("Outer"), -1);
        event.set_array_index_per_object(vec![
            IndexMap::from([(FName::new("Outer"), 3)]),
            IndexMap::from([(FName::new("Outer"), 5)]),
        ]);
        assert_eq!(event.get_array_index("Outer"), -1);
        event.object_iterator_index = 1;
        assert_eq!(event.get_array_index("Outer"), 5);
        assert_eq!(event.get_array_index("Inner"), -1);

        let empty = FPropertyChangedEvent::new(None, EPropertyChangeType::default());
        assert_eq!(empty.get_property_name(), NAME_NONE);
        assert_eq!(empty.change_type, EPropertyChangeType::Unspecified);
    }
}
