//! Component and service graphs derived from a trace model

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::description::{CallKind, Component, Group};
use super::trace::{ROOT_INDEX, TraceLensModel};
use crate::data::types::ComponentMetadataRow;

/// Graph granularity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphLevel {
    /// Every component, grouped
    #[default]
    Component,
    /// Groups only; group-less components stand alone
    Service,
}

/// A deduplicated edge between two nodes, counted per occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Call {
    pub to_id: String,
    pub operation: String,
    pub kind: CallKind,
    pub from_id: String,
    pub count: usize,
    /// Index in `calls` of the call that led here, recorded at first occurrence
    pub parent: Option<usize>,
}

type CallKey = (String, String, CallKind, String);

#[derive(Debug)]
pub struct ComponentGraph {
    level: GraphLevel,
    components: Vec<Component>,
    component_index: FxHashMap<String, usize>,
    groups: Vec<Group>,
    group_index: FxHashMap<String, usize>,
    calls: Vec<Call>,
    call_index: FxHashMap<CallKey, usize>,
    metadata: FxHashMap<String, ComponentMetadataRow>,
}

impl ComponentGraph {
    pub fn build(
        model: &TraceLensModel,
        level: GraphLevel,
        metadata: Vec<ComponentMetadataRow>,
    ) -> Self {
        let mut graph = Self {
            level,
            components: Vec::new(),
            component_index: FxHashMap::default(),
            groups: Vec::new(),
            group_index: FxHashMap::default(),
            calls: Vec::new(),
            call_index: FxHashMap::default(),
            metadata: metadata
                .into_iter()
                .map(|m| (m.name_path.clone(), m))
                .collect(),
        };
        match level {
            GraphLevel::Component => {
                for i in 0..model.len() {
                    graph.register(model, i);
                }
            }
            GraphLevel::Service => {
                for i in preorder(model) {
                    graph.register(model, i);
                }
            }
        }
        graph.build_calls(model);
        graph
    }

    pub fn level(&self) -> GraphLevel {
        self.level
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn component(&self, id: &str) -> Option<&Component> {
        self.component_index.get(id).map(|&i| &self.components[i])
    }

    pub fn group(&self, id: &str) -> Option<&Group> {
        self.group_index.get(id).map(|&i| &self.groups[i])
    }

    /// Metadata key for a node: `group:component`, `group:` or empty
    pub fn metadata_key_for_id(&self, id: &str) -> String {
        if let Some(component) = self.component(id) {
            let group = self
                .group(&component.group_id)
                .map(|g| g.name.as_str())
                .unwrap_or_default();
            return format!("{}:{}", group, component.name);
        }
        if let Some(group) = self.group(id) {
            return format!("{}:", group.name);
        }
        String::new()
    }

    pub fn metadata_for_id(&self, id: &str) -> Option<&ComponentMetadataRow> {
        self.metadata.get(&self.metadata_key_for_id(id))
    }

    fn register(&mut self, model: &TraceLensModel, index: usize) {
        if model.is_elided(index) {
            return;
        }
        let description = model.description(index);
        if self.component_index.contains_key(&description.id) {
            return;
        }

        let has_group = !description.group.name.is_empty();
        if has_group && !self.group_index.contains_key(&description.group.id) {
            self.group_index
                .insert(description.group.id.clone(), self.groups.len());
            self.groups.push(description.group.clone());
        }
        if self.level == GraphLevel::Component || !has_group {
            self.component_index
                .insert(description.id.clone(), self.components.len());
            self.components.push(description.component.clone());
        }
    }

    /// Walk the tree from the root; elided spans pass their caller through
    fn build_calls(&mut self, model: &TraceLensModel) {
        let root_id = model.description(ROOT_INDEX).id.clone();
        let mut stack: Vec<(usize, String, Option<usize>)> = model
            .children(ROOT_INDEX)
            .iter()
            .rev()
            .map(|&c| (c, root_id.clone(), None))
            .collect();

        while let Some((index, from_id, parent)) = stack.pop() {
            let (caller, call) = if model.is_elided(index) {
                (from_id, parent)
            } else {
                let description = model.description(index);
                let to_id = match self.level {
                    GraphLevel::Service if self.group_index.contains_key(&description.group.id) => {
                        description.group.id.clone()
                    }
                    _ => description.id.clone(),
                };
                let key = (
                    to_id.clone(),
                    description.operation.clone(),
                    description.call_kind,
                    from_id,
                );
                let call = match self.call_index.get(&key) {
                    Some(&existing) => {
                        self.calls[existing].count += 1;
                        existing
                    }
                    None => {
                        let created = self.calls.len();
                        self.call_index.insert(key.clone(), created);
                        self.calls.push(Call {
                            to_id: key.0,
                            operation: key.1,
                            kind: key.2,
                            from_id: key.3,
                            count: 1,
                            parent,
                        });
                        created
                    }
                };
                (to_id, Some(call))
            };
            stack.extend(
                model
                    .children(index)
                    .iter()
                    .rev()
                    .map(|&c| (c, caller.clone(), call)),
            );
        }
    }
}

fn preorder(model: &TraceLensModel) -> Vec<usize> {
    let mut order = Vec::with_capacity(model.len());
    let mut stack = vec![ROOT_INDEX];
    while let Some(index) = stack.pop() {
        order.push(index);
        stack.extend(model.children(index).iter().rev());
    }
    order
}
