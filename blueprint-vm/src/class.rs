//! Class table: single-parent inheritance resolved at registration time.
//!
//! A class is either native (its event bodies live on the object) or
//! generated from a blueprint, in which case it carries the compiled graph.
//! Parents must be registered before their children, so chains never cycle.

use crate::{compile::CompiledBlueprint, error::ClassError, error::Diagnostic};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub name: String,
    /// Fallback chain link.
    pub parent: Option<String>,
    pub blueprint: Option<Arc<CompiledBlueprint>>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ClassInfo {
    pub fn is_generated(&self) -> bool {
        self.blueprint.is_some()
    }
}

#[derive(Debug, Default)]
pub struct ClassTable {
    classes: HashMap<String, ClassInfo>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_native(&mut self, name: &str, parent: Option<&str>) -> Result<(), ClassError> {
        self.insert(ClassInfo {
            name: name.to_string(),
            parent: parent.map(str::to_string),
            blueprint: None,
            diagnostics: Vec::new(),
        })
    }

    pub fn register_generated(
        &mut self,
        name: &str,
        parent: Option<&str>,
        blueprint: CompiledBlueprint,
        diagnostics: Vec<Diagnostic>,
    ) -> Result<(), ClassError> {
        self.insert(ClassInfo {
            name: name.to_string(),
            parent: parent.map(str::to_string),
            blueprint: Some(Arc::new(blueprint)),
            diagnostics,
        })
    }

    fn insert(&mut self, info: ClassInfo) -> Result<(), ClassError> {
        if self.classes.contains_key(&info.name) {
            return Err(ClassError::Duplicate(info.name));
        }
        if let Some(parent) = &info.parent {
            if !self.classes.contains_key(parent) {
                return Err(ClassError::UnknownParent {
                    class: info.name,
                    parent: parent.clone(),
                });
            }
        }
        self.classes.insert(info.name.clone(), info);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn parent_of(&self, name: &str) -> Option<&str> {
        self.classes.get(name)?.parent.as_deref()
    }

    /// `name` followed by its ancestors, most-derived first. Unregistered names
    /// yield an empty chain.
    pub fn chain<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a ClassInfo> + 'a {
        let mut next = self.classes.get(name);
        std::iter::from_fn(move || {
            let current = next?;
            next = current
                .parent
                .as_deref()
                .and_then(|parent| self.classes.get(parent));
            Some(current)
        })
    }

    /// Whether `class` is `ancestor` or inherits from it.
    pub fn is_a(&self, class: &str, ancestor: &str) -> bool {
        class == ancestor || self.chain(class).any(|info| info.name == ancestor)
    }

    /// Whether any generated class in `class`'s chain has a graph for `event`.
    pub fn graph_defines(&self, class: &str, event: &str) -> bool {
        self.chain(class).any(|info| {
            info.blueprint
                .as_ref()
                .is_some_and(|blueprint| blueprint.defines(event))
        })
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parents_must_exist_first() {
        let mut table = ClassTable::new();
        let err = table.register_native("Enemy", Some("Pawn")).unwrap_err();
        assert_eq!(
            err,
            ClassError::UnknownParent {
                class: "Enemy".to_string(),
                parent: "Pawn".to_string()
            }
        );

        table.register_native("Pawn", None).unwrap();
        table.register_native("Enemy", Some("Pawn")).unwrap();
        assert_eq!(
            table.register_native("Pawn", None),
            Err(ClassError::Duplicate("Pawn".to_string()))
        );
    }

    #[test]
    fn chain_walks_most_derived_first() {
        let mut table = ClassTable::new();
        table.register_native("Actor", None).unwrap();
        table.register_native("Pawn", Some("Actor")).unwrap();
        table.register_native("Enemy", Some("Pawn")).unwrap();

        let names: Vec<_> = table.chain("Enemy").map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Enemy", "Pawn", "Actor"]);
        assert!(table.is_a("Enemy", "Actor"));
        assert!(!table.is_a("Actor", "Enemy"));
        assert!(table.is_a("Unregistered", "Unregistered"));
        assert_eq!(table.chain("Unregistered").count(), 0);
    }
}
