use crate::error::Result;
use crate::store::{DependencyStore, EdgeType};

/// A package that refers to the queried name through one edge type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependent {
    pub name: String,
    pub version: String,
    pub edge: EdgeType,
}

impl Dependent {
    /// `[R]`, `[B]`, `[A]` or `[C]`.
    pub fn flag(&self) -> String {
        format!("[{}]", self.edge.flag())
    }
}

/// Answers "what depends on X" by scanning every record in the store.
pub struct ReverseLookup<'a> {
    store: &'a DependencyStore,
}

impl<'a> ReverseLookup<'a> {
    pub fn new(store: &'a DependencyStore) -> Self {
        Self { store }
    }

    /// Every (record, edge type) pair whose edge list names `name`, in store
    /// order.
    #[tracing::instrument(skip(self))]
    pub fn what_requires(&self, name: &str) -> Result<Vec<Dependent>> {
        let mut dependents = Vec::new();
        for record in self.store.records()? {
            for edge in EdgeType::ALL {
                if record.requires(edge, name) {
                    dependents.push(Dependent {
                        name: record.name.clone(),
                        version: record.version.clone(),
                        edge,
                    });
                }
            }
        }
        Ok(dependents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DependencyRecord;

    fn tokens(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    fn sample_store() -> DependencyStore {
        let mut store = DependencyStore::in_memory("universe").unwrap();
        store
            .insert_all(&[
                DependencyRecord {
                    name: "lxpanel".into(),
                    version: "0.5.12".into(),
                    rdep: tokens("gtk2(>=2.24) menu-cache"),
                    bdep: tokens("gtk2 intltool"),
                    redep: tokens("lxmenu-data"),
                    cdep: tokens(""),
                },
                DependencyRecord {
                    name: "lxrandr".into(),
                    version: "0.1.2".into(),
                    rdep: tokens("gtk2"),
                    cdep: tokens("gtk2-old"),
                    ..Default::default()
                },
                DependencyRecord {
                    name: "gtk2".into(),
                    version: "2.24.10".into(),
                    ..Default::default()
                },
            ])
            .unwrap();
        store
    }

    #[test]
    fn test_what_requires_all_edge_types() {
        let store = sample_store();
        let lookup = ReverseLookup::new(&store);

        let dependents = lookup.what_requires("gtk2").unwrap();
        let flags: Vec<_> = dependents
            .iter()
            .map(|d| format!("{} {} {}", d.flag(), d.name, d.version))
            .collect();
        assert_eq!(
            flags,
            vec![
                "[R] lxpanel 0.5.12",
                "[B] lxpanel 0.5.12",
                "[R] lxrandr 0.1.2",
            ]
        );

        let recommended = lookup.what_requires("lxmenu-data").unwrap();
        assert_eq!(recommended.len(), 1);
        assert_eq!(recommended[0].edge, EdgeType::Recommended);
    }

    #[test]
    fn test_what_requires_exact_names_only() {
        let store = sample_store();
        let lookup = ReverseLookup::new(&store);
        // `gtk2-old` and `gtk2(>=2.24)` must not match `gtk`.
        assert!(lookup.what_requires("gtk").unwrap().is_empty());

        let conflicts = lookup.what_requires("gtk2-old").unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].flag(), "[C]");
    }

    #[test]
    fn test_reverse_matches_forward_edges() {
        let store = sample_store();
        let lookup = ReverseLookup::new(&store);
        for record in store.records().unwrap() {
            for dep in record.edges(EdgeType::Runtime) {
                let dependents = lookup.what_requires(&dep).unwrap();
                assert!(dependents.contains(&Dependent {
                    name: record.name.clone(),
                    version: record.version.clone(),
                    edge: EdgeType::Runtime,
                }));
            }
        }
    }
}
