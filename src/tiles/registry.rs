use super::constants::MAX_PROTOTYPES;
use super::types::{Direction, PrototypeId};
use crate::wfc::CandidateSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque handle owned by the rendering side (mesh/prefab path, atlas key...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisualHandle(pub String);

/// Per-direction prototype name lists, as authored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionalConnections {
    pub left: Vec<String>,
    pub right: Vec<String>,
    pub back: Vec<String>,
    pub forward: Vec<String>,
}

impl DirectionalConnections {
    pub fn get(&self, direction: Direction) -> &[String] {
        match direction {
            Direction::Left => &self.left,
            Direction::Right => &self.right,
            Direction::Back => &self.back,
            Direction::Forward => &self.forward,
        }
    }

    pub fn get_mut(&mut self, direction: Direction) -> &mut Vec<String> {
        match direction {
            Direction::Left => &mut self.left,
            Direction::Right => &mut self.right,
            Direction::Back => &mut self.back,
            Direction::Forward => &mut self.forward,
        }
    }
}

/// Catalog input record, produced by whatever loads the tile definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrototypeRecord {
    pub name: String,
    pub weight: f32,
    #[serde(default)]
    pub visual: VisualHandle,
    #[serde(default)]
    pub connections: DirectionalConnections,
}

impl PrototypeRecord {
    pub fn new(name: impl Into<String>, weight: f32) -> Self {
        Self {
            name: name.into(),
            weight,
            visual: VisualHandle::default(),
            connections: DirectionalConnections::default(),
        }
    }

    /// Allow `names` in the neighbor cell one step in `direction`
    pub fn allow(mut self, direction: Direction, names: &[&str]) -> Self {
        self.connections
            .get_mut(direction)
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    /// Allow `names` on every side
    pub fn allow_all(mut self, names: &[&str]) -> Self {
        for dir in Direction::ALL {
            self = self.allow(dir, names);
        }
        self
    }

    pub fn with_visual(mut self, visual: impl Into<String>) -> Self {
        self.visual = VisualHandle(visual.into());
        self
    }
}

/// A resolved tile prototype. Immutable once the catalog is built.
#[derive(Debug, Clone)]
pub struct Prototype {
    pub id: PrototypeId,
    pub name: String,
    pub weight: f32,
    pub visual: VisualHandle,
    /// `connections[d]` lists the prototypes permitted one step in direction `d`,
    /// in authored order without duplicates
    connections: [Vec<PrototypeId>; 4],
}

impl Prototype {
    pub fn connections(&self, direction: Direction) -> &[PrototypeId] {
        &self.connections[direction.index()]
    }
}

/// Error type for catalog construction
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogError {
    Empty,
    TooManyPrototypes(usize),
    DuplicateName(String),
    UnknownPrototype { owner: String, name: String },
    InvalidWeight { name: String, weight: f32 },
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Empty => write!(f, "Catalog has no prototypes"),
            CatalogError::TooManyPrototypes(n) => {
                write!(f, "Too many prototypes: {} (max {})", n, MAX_PROTOTYPES)
            }
            CatalogError::DuplicateName(name) => write!(f, "Duplicate prototype name: {}", name),
            CatalogError::UnknownPrototype { owner, name } => {
                write!(f, "Prototype {} references unknown prototype {}", owner, name)
            }
            CatalogError::InvalidWeight { name, weight } => {
                write!(f, "Prototype {} has invalid weight {}", name, weight)
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// Adjacency catalog: the fixed prototype set every solve reads from.
///
/// Built once, then shared behind an `Arc` by the scheduler and every worker.
#[derive(Debug, Clone)]
pub struct PrototypeCatalog {
    prototypes: Vec<Prototype>,
    by_name: HashMap<String, PrototypeId>,
    /// `allowed[p][d]`: bitset form of `prototypes[p].connections[d]`
    allowed: Vec<[CandidateSet; 4]>,
    /// `compatible[p][d]`: prototypes `q` with `pair_allowed(p, d, q)`.
    /// Mirrored: `q ∈ compatible[p][d]` iff `p ∈ compatible[q][opposite(d)]`
    compatible: Vec<[CandidateSet; 4]>,
}

impl PrototypeCatalog {
    /// Resolve names to ids (record order) and validate the records
    pub fn from_records(records: Vec<PrototypeRecord>) -> Result<Self, CatalogError> {
        if records.is_empty() {
            return Err(CatalogError::Empty);
        }
        if records.len() > MAX_PROTOTYPES {
            return Err(CatalogError::TooManyPrototypes(records.len()));
        }

        let mut by_name = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if !record.weight.is_finite() || record.weight < 0.0 {
                return Err(CatalogError::InvalidWeight {
                    name: record.name.clone(),
                    weight: record.weight,
                });
            }
            if by_name
                .insert(record.name.clone(), PrototypeId(i as u16))
                .is_some()
            {
                return Err(CatalogError::DuplicateName(record.name.clone()));
            }
        }

        let capacity = records.len();
        let mut prototypes = Vec::with_capacity(capacity);
        let mut allowed = Vec::with_capacity(capacity);

        for (i, record) in records.into_iter().enumerate() {
            let mut connections: [Vec<PrototypeId>; 4] = Default::default();
            let mut sets: [CandidateSet; 4] = std::array::from_fn(|_| CandidateSet::empty(capacity));

            for dir in Direction::ALL {
                for name in record.connections.get(dir) {
                    let Some(&id) = by_name.get(name) else {
                        return Err(CatalogError::UnknownPrototype {
                            owner: record.name.clone(),
                            name: name.clone(),
                        });
                    };
                    if sets[dir.index()].insert(id) {
                        connections[dir.index()].push(id);
                    }
                }
            }

            prototypes.push(Prototype {
                id: PrototypeId(i as u16),
                name: record.name,
                weight: record.weight,
                visual: record.visual,
                connections,
            });
            allowed.push(sets);
        }

        // q may sit at d from p if p lists q that way or q lists p on the way back
        let mut compatible: Vec<[CandidateSet; 4]> = allowed.clone();
        for q in 0..capacity {
            for dir in Direction::ALL {
                let back = dir.opposite().index();
                for p in allowed[q][dir.index()].iter() {
                    compatible[p.index()][back].insert(PrototypeId(q as u16));
                }
            }
        }

        Ok(Self {
            prototypes,
            by_name,
            allowed,
            compatible,
        })
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }

    pub fn get(&self, id: PrototypeId) -> Option<&Prototype> {
        self.prototypes.get(id.index())
    }

    pub fn id_of(&self, name: &str) -> Option<PrototypeId> {
        self.by_name.get(name).copied()
    }

    pub fn prototypes(&self) -> &[Prototype] {
        &self.prototypes
    }

    /// Selection weight, 0 for ids outside the catalog
    pub fn weight(&self, id: PrototypeId) -> f32 {
        self.get(id).map_or(0.0, |p| p.weight)
    }

    /// Bitset of prototypes `id` permits one step in `direction`
    pub fn allowed(&self, id: PrototypeId, direction: Direction) -> &CandidateSet {
        &self.allowed[id.index()][direction.index()]
    }

    /// Prototypes that may sit one step in `direction` from `id`, by either side's list
    pub fn compatible(&self, id: PrototypeId, direction: Direction) -> &CandidateSet {
        &self.compatible[id.index()][direction.index()]
    }

    /// True if `a` may sit with `b` one step in `direction` from it.
    /// One list is enough: `a` permits `b` that way, or `b` permits `a` back.
    pub fn pair_allowed(&self, a: PrototypeId, direction: Direction, b: PrototypeId) -> bool {
        a.index() < self.len() && self.compatible(a, direction).contains(b)
    }

    /// Set containing every prototype in the catalog
    pub fn all(&self) -> CandidateSet {
        CandidateSet::full(self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grass_water() -> Vec<PrototypeRecord> {
        vec![
            PrototypeRecord::new("grass", 2.0).allow_all(&["grass", "sand"]),
            PrototypeRecord::new("sand", 1.0).allow_all(&["grass", "sand", "water", "sand"]),
            PrototypeRecord::new("water", 1.0)
                .allow_all(&["sand", "water"])
                .with_visual("tiles/water.glb"),
        ]
    }

    #[test]
    fn test_from_records_resolves_ids_in_order() {
        let catalog = PrototypeCatalog::from_records(grass_water()).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.id_of("grass"), Some(PrototypeId(0)));
        assert_eq!(catalog.id_of("water"), Some(PrototypeId(2)));
        assert_eq!(catalog.id_of("lava"), None);

        let water = catalog.get(PrototypeId(2)).unwrap();
        assert_eq!(water.visual, VisualHandle("tiles/water.glb".into()));
        assert_eq!(catalog.weight(PrototypeId(0)), 2.0);
    }

    #[test]
    fn test_connections_are_deduplicated_and_ordered() {
        let catalog = PrototypeCatalog::from_records(grass_water()).unwrap();
        let sand = catalog.get(PrototypeId(1)).unwrap();
        assert_eq!(
            sand.connections(Direction::Left),
            &[PrototypeId(0), PrototypeId(1), PrototypeId(2)]
        );
        assert_eq!(catalog.allowed(PrototypeId(1), Direction::Left).len(), 3);
    }

    #[test]
    fn test_pair_allowed_when_either_side_lists_it() {
        // b lists nothing; a alone permits b on its right
        let records = vec![
            PrototypeRecord::new("a", 1.0).allow(Direction::Right, &["b"]),
            PrototypeRecord::new("b", 1.0),
        ];
        let catalog = PrototypeCatalog::from_records(records).unwrap();
        let (a, b) = (PrototypeId(0), PrototypeId(1));
        assert!(catalog.pair_allowed(a, Direction::Right, b));
        assert!(catalog.pair_allowed(b, Direction::Left, a));
        assert!(!catalog.pair_allowed(b, Direction::Right, a));
        assert!(!catalog.pair_allowed(a, Direction::Left, b));
        assert!(!catalog.pair_allowed(a, Direction::Right, a));

        // The authored list is untouched; only the pair relation is mirrored
        assert!(catalog.allowed(b, Direction::Left).is_empty());
        assert_eq!(catalog.compatible(b, Direction::Left).iter().collect::<Vec<_>>(), vec![a]);
    }

    #[test]
    fn test_compatible_is_mirrored() {
        let records = vec![
            PrototypeRecord::new("road", 1.0)
                .allow(Direction::Forward, &["road", "bridge"])
                .allow(Direction::Left, &["field"]),
            PrototypeRecord::new("bridge", 1.0).allow(Direction::Back, &["road"]),
            PrototypeRecord::new("field", 1.0).allow_all(&["field"]),
        ];
        let catalog = PrototypeCatalog::from_records(records).unwrap();
        for p in catalog.prototypes() {
            for dir in Direction::ALL {
                for q in catalog.compatible(p.id, dir).iter() {
                    assert!(catalog.compatible(q, dir.opposite()).contains(p.id));
                }
            }
        }
    }

    #[test]
    fn test_invalid_catalogs() {
        assert_eq!(PrototypeCatalog::from_records(vec![]).unwrap_err(), CatalogError::Empty);

        let dup = vec![PrototypeRecord::new("a", 1.0), PrototypeRecord::new("a", 1.0)];
        assert_eq!(
            PrototypeCatalog::from_records(dup).unwrap_err(),
            CatalogError::DuplicateName("a".into())
        );

        let unknown = vec![PrototypeRecord::new("a", 1.0).allow(Direction::Back, &["b"])];
        assert!(matches!(
            PrototypeCatalog::from_records(unknown),
            Err(CatalogError::UnknownPrototype { .. })
        ));

        let negative = vec![PrototypeRecord::new("a", -1.0)];
        assert!(matches!(
            PrototypeCatalog::from_records(negative),
            Err(CatalogError::InvalidWeight { .. })
        ));

        let nan = vec![PrototypeRecord::new("a", f32::NAN)];
        assert!(PrototypeCatalog::from_records(nan).is_err());
    }
}
