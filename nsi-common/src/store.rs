//! In-memory component store
//!
//! Holds components and the three directories they relate to (object
//! types, parameters, defects) with one monotonic id counter per
//! collection. Each store is an ordinary value: the component repository
//! owns one behind a lock, and tests build as many independent stores as
//! they need.

use std::collections::BTreeMap;

use crate::directory::DirectoryOption;
use crate::value::normalize_text;

/// Backend class tag of components
pub const COMPONENT_CLS: i64 = 1027;

/// One component with its relation ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredComponent {
    pub id: i64,
    pub cls: i64,
    pub name: String,
    pub object_type_ids: Vec<String>,
    pub parameter_ids: Vec<String>,
    pub defect_ids: Vec<String>,
}

impl StoredComponent {
    pub fn new(id: i64, cls: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            cls,
            name: name.into(),
            object_type_ids: Vec::new(),
            parameter_ids: Vec::new(),
            defect_ids: Vec::new(),
        }
    }
}

/// Directory a component can relate to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    ObjectType,
    Parameter,
    Defect,
}

impl RelationKind {
    fn placeholder(self) -> &'static str {
        match self {
            RelationKind::ObjectType => "Новый тип объекта",
            RelationKind::Parameter => "Новый параметр",
            RelationKind::Defect => "Новый дефект",
        }
    }
}

#[derive(Debug, Clone, Default)]
struct DirectoryCollection {
    entries: BTreeMap<String, DirectoryOption>,
    last_id: i64,
}

impl DirectoryCollection {
    fn seeded(entries: &[(&str, &str, &str)]) -> Self {
        let mut collection = Self::default();
        for (id, name, cls) in entries {
            let mut option = DirectoryOption::new(*id, *name);
            option.cls = Some(cls.to_string());
            collection.insert(option);
        }
        collection
    }

    fn insert(&mut self, option: DirectoryOption) {
        if let Ok(numeric) = option.id.parse::<i64>() {
            self.last_id = self.last_id.max(numeric);
        }
        self.entries.insert(option.id.clone(), option);
    }

    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

/// Components plus object type, parameter and defect directories
#[derive(Debug, Clone, Default)]
pub struct MemoryComponentStore {
    components: BTreeMap<i64, StoredComponent>,
    last_component_id: i64,
    object_types: DirectoryCollection,
    parameters: DirectoryCollection,
    defects: DirectoryCollection,
}

impl MemoryComponentStore {
    /// Store with no entries
    pub fn empty() -> Self {
        Self::default()
    }

    /// Store pre-filled with demo data
    pub fn seeded() -> Self {
        let mut store = Self {
            object_types: DirectoryCollection::seeded(&[
                ("1", "ЖД путь", "1001"),
                ("2", "Стрелочный перевод", "1001"),
                ("3", "Мост", "1001"),
            ]),
            parameters: DirectoryCollection::seeded(&[
                ("101", "Температура", "1041"),
                ("102", "Влажность", "1041"),
                ("103", "Длина", "1041"),
            ]),
            defects: DirectoryCollection::seeded(&[
                ("201", "Коррозия", "1061"),
                ("202", "Трещина", "1061"),
                ("203", "Скол", "1061"),
            ]),
            ..Self::default()
        };

        let demo = [
            (1, "Рельс", &["1"][..], &["101"][..], &["201"][..]),
            (2, "Шпала", &["1", "2"][..], &["102"][..], &["202"][..]),
            (3, "Опора", &["3"][..], &["103"][..], &[][..]),
        ];
        for (id, name, types, params, defects) in demo {
            let mut component = StoredComponent::new(id, COMPONENT_CLS, name);
            component.object_type_ids = types.iter().map(|s| s.to_string()).collect();
            component.parameter_ids = params.iter().map(|s| s.to_string()).collect();
            component.defect_ids = defects.iter().map(|s| s.to_string()).collect();
            store.put_component(component);
        }
        store
    }

    fn collection(&self, kind: RelationKind) -> &DirectoryCollection {
        match kind {
            RelationKind::ObjectType => &self.object_types,
            RelationKind::Parameter => &self.parameters,
            RelationKind::Defect => &self.defects,
        }
    }

    fn collection_mut(&mut self, kind: RelationKind) -> &mut DirectoryCollection {
        match kind {
            RelationKind::ObjectType => &mut self.object_types,
            RelationKind::Parameter => &mut self.parameters,
            RelationKind::Defect => &mut self.defects,
        }
    }

    /// Allocate the next component id
    pub fn next_component_id(&mut self) -> i64 {
        self.last_component_id += 1;
        self.last_component_id
    }

    /// Insert or replace a component; the id counter never moves backwards
    pub fn put_component(&mut self, component: StoredComponent) {
        self.last_component_id = self.last_component_id.max(component.id);
        self.components.insert(component.id, component);
    }

    pub fn component(&self, id: i64) -> Option<&StoredComponent> {
        self.components.get(&id)
    }

    pub fn remove_component(&mut self, id: i64) -> Option<StoredComponent> {
        self.components.remove(&id)
    }

    pub fn components(&self) -> impl Iterator<Item = &StoredComponent> {
        self.components.values()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Refresh names and classes from a backend listing; unknown ids are added
    /// without relations
    pub fn merge_components(&mut self, listed: impl IntoIterator<Item = (i64, i64, String)>) {
        for (id, cls, name) in listed {
            match self.components.get_mut(&id) {
                Some(existing) => {
                    existing.cls = cls;
                    existing.name = name;
                }
                None => self.put_component(StoredComponent::new(id, cls, name)),
            }
        }
    }

    /// Directory entry by id
    pub fn directory_entry(&self, kind: RelationKind, id: &str) -> Option<&DirectoryOption> {
        self.collection(kind).entries.get(id)
    }

    /// All entries of one directory, in id order
    pub fn directory(&self, kind: RelationKind) -> Vec<DirectoryOption> {
        self.collection(kind).entries.values().cloned().collect()
    }

    /// Entry whose normalised name equals `name`, created when missing
    pub fn ensure_directory_entry(&mut self, kind: RelationKind, name: &str) -> DirectoryOption {
        let wanted = normalize_text(name);
        let collection = self.collection_mut(kind);
        if let Some(existing) = collection
            .entries
            .values()
            .find(|entry| normalize_text(&entry.name) == wanted)
        {
            return existing.clone();
        }

        let id = collection.next_id().to_string();
        let trimmed = name.trim();
        let name = if trimmed.is_empty() {
            kind.placeholder().to_string()
        } else {
            trimmed.to_string()
        };
        let option = DirectoryOption::new(id, name);
        collection.insert(option.clone());
        option
    }
}
