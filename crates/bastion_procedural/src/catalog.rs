//! # Prototype Catalog
//!
//! The immutable set of building blocks a structure is assembled from.
//!
//! ## Source Format
//!
//! A catalog is a mapping from prototype name to a record:
//!
//! ```json
//! {
//!   "wall_0": {
//!     "mesh_name": "wall", "mesh_rotation": 0,
//!     "posX": "1s", "negX": "1s", "posY": "-1", "negY": "0",
//!     "posZ": "-1", "negZ": "-1",
//!     "constrain_to": "-1", "constrain_from": "bot",
//!     "weight": 4,
//!     "valid_neighbours": [["wall_0"], ["wall_0"], ["empty"], ["floor"], ["empty"], ["empty"]]
//!   }
//! }
//! ```
//!
//! `valid_neighbours` holds exactly six lists in direction-index order
//! (`+x, -x, +y, -y, +z, -z`). Adjacency is trusted as written: symmetry is
//! a convention of the catalog author and is never validated here.
//!
//! ## Loading
//!
//! Loading either yields a complete catalog or an error. Prototype indices
//! are assigned in ascending name order, so the same source always produces
//! the same indices (and therefore the same seeded output).

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::grid::Direction;
use crate::prototype_set::{PrototypeId, PrototypeSet, MAX_PROTOTYPES};

/// Face tag meaning "nothing attaches here".
pub const OPEN_TAG: &str = "-1";

/// Vertical placement rule carried by `constrain_to` / `constrain_from`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum LayerTag {
    /// No layer rule.
    #[default]
    Unconstrained,
    /// Refers to the top layer of the grid.
    Top,
    /// Refers to the bottom layer of the grid.
    Bottom,
    /// An author-defined tag the core does not interpret.
    Other(String),
}

impl LayerTag {
    /// Parses a raw tag. Accepts `top`, `bot`/`bottom`, and `""`/`-1` for none.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == OPEN_TAG {
            Self::Unconstrained
        } else if trimmed.eq_ignore_ascii_case("top") {
            Self::Top
        } else if trimmed.eq_ignore_ascii_case("bot") || trimmed.eq_ignore_ascii_case("bottom") {
            Self::Bottom
        } else {
            Self::Other(trimmed.to_string())
        }
    }
}

/// One catalog entry as it appears in a source file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrototypeRecord {
    /// Downstream mesh reference, opaque to the core.
    pub mesh_name: String,
    /// Downstream mesh rotation, opaque to the core.
    pub mesh_rotation: i32,
    /// Face tag on +X.
    #[serde(rename = "posX", deserialize_with = "tag")]
    pub pos_x: String,
    /// Face tag on -X.
    #[serde(rename = "negX", deserialize_with = "tag")]
    pub neg_x: String,
    /// Face tag on +Y.
    #[serde(rename = "posY", deserialize_with = "tag")]
    pub pos_y: String,
    /// Face tag on -Y.
    #[serde(rename = "negY", deserialize_with = "tag")]
    pub neg_y: String,
    /// Face tag on +Z.
    #[serde(rename = "posZ", deserialize_with = "tag")]
    pub pos_z: String,
    /// Face tag on -Z.
    #[serde(rename = "negZ", deserialize_with = "tag")]
    pub neg_z: String,
    /// Layer the prototype is restricted to.
    #[serde(deserialize_with = "tag")]
    pub constrain_to: String,
    /// Layer the prototype is kept away from.
    #[serde(deserialize_with = "tag")]
    pub constrain_from: String,
    /// Declared weight; higher almost always wins a collapse.
    pub weight: u32,
    /// Compatible neighbours per direction.
    pub valid_neighbours: Vec<Vec<String>>,
}

impl PrototypeRecord {
    /// A record with every face open, no layer rules and no neighbours.
    #[must_use]
    pub fn open(weight: u32) -> Self {
        Self {
            mesh_name: String::new(),
            mesh_rotation: 0,
            pos_x: OPEN_TAG.to_string(),
            neg_x: OPEN_TAG.to_string(),
            pos_y: OPEN_TAG.to_string(),
            neg_y: OPEN_TAG.to_string(),
            pos_z: OPEN_TAG.to_string(),
            neg_z: OPEN_TAG.to_string(),
            constrain_to: OPEN_TAG.to_string(),
            constrain_from: OPEN_TAG.to_string(),
            weight,
            valid_neighbours: vec![Vec::new(); 6],
        }
    }

    /// Sets the neighbour list for one direction.
    #[must_use]
    pub fn with_neighbours(mut self, dir: Direction, names: &[&str]) -> Self {
        if self.valid_neighbours.len() < 6 {
            self.valid_neighbours.resize(6, Vec::new());
        }
        self.valid_neighbours[dir.index()] = names.iter().map(ToString::to_string).collect();
        self
    }

    /// Sets the same neighbour list for every direction.
    #[must_use]
    pub fn with_all_neighbours(mut self, names: &[&str]) -> Self {
        for dir in Direction::ALL {
            self = self.with_neighbours(dir, names);
        }
        self
    }

    /// Sets the face tag for one direction.
    #[must_use]
    pub fn with_face(mut self, dir: Direction, tag: &str) -> Self {
        *self.face_mut(dir) = tag.to_string();
        self
    }

    /// Sets the `constrain_to` tag.
    #[must_use]
    pub fn with_constrain_to(mut self, tag: &str) -> Self {
        self.constrain_to = tag.to_string();
        self
    }

    /// Sets the `constrain_from` tag.
    #[must_use]
    pub fn with_constrain_from(mut self, tag: &str) -> Self {
        self.constrain_from = tag.to_string();
        self
    }

    fn face_mut(&mut self, dir: Direction) -> &mut String {
        match dir {
            Direction::PosX => &mut self.pos_x,
            Direction::NegX => &mut self.neg_x,
            Direction::PosY => &mut self.pos_y,
            Direction::NegY => &mut self.neg_y,
            Direction::PosZ => &mut self.pos_z,
            Direction::NegZ => &mut self.neg_z,
        }
    }

    fn faces(&self) -> [String; 6] {
        [
            self.pos_x.clone(),
            self.neg_x.clone(),
            self.pos_y.clone(),
            self.neg_y.clone(),
            self.pos_z.clone(),
            self.neg_z.clone(),
        ]
    }
}

/// Tags are strings, but exporters often write them as bare integers.
fn tag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    struct TagVisitor;

    impl Visitor<'_> for TagVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a string or integer tag")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(TagVisitor)
}

/// A loaded building block.
#[derive(Clone, Debug, PartialEq)]
pub struct Prototype {
    /// Catalog name.
    pub name: String,
    /// Downstream mesh reference.
    pub mesh_name: String,
    /// Downstream mesh rotation.
    pub mesh_rotation: i32,
    /// Face tags in direction-index order.
    pub faces: [String; 6],
    /// Layer the prototype is restricted to.
    pub constrain_to: LayerTag,
    /// Layer the prototype is kept away from.
    pub constrain_from: LayerTag,
    /// Declared weight.
    pub weight: u32,
    neighbours: [PrototypeSet; 6],
}

impl Prototype {
    /// Face tag in `dir`.
    #[inline]
    #[must_use]
    pub fn face(&self, dir: Direction) -> &str {
        &self.faces[dir.index()]
    }

    /// Prototypes allowed next to this one in `dir`.
    #[inline]
    #[must_use]
    pub const fn neighbours(&self, dir: Direction) -> PrototypeSet {
        self.neighbours[dir as usize]
    }
}

/// The immutable prototype catalog.
///
/// Cloning produces a fully independent deep copy. Generation runs share one
/// catalog behind an `Arc` and keep their mutable candidate sets in their own
/// grid, so the catalog itself is never written after load.
#[derive(Clone, Debug, PartialEq)]
pub struct Catalog {
    prototypes: Vec<Prototype>,
    by_name: HashMap<String, PrototypeId>,
}

impl Catalog {
    /// Parses a JSON catalog.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` on malformed JSON, missing fields or invalid
    /// references.
    pub fn from_json_str(source: &str) -> Result<Self, CatalogError> {
        let records: BTreeMap<String, PrototypeRecord> = serde_json::from_str(source)?;
        Self::from_records(records)
    }

    /// Parses a TOML catalog (one table per prototype).
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` on malformed TOML, missing fields or invalid
    /// references.
    pub fn from_toml_str(source: &str) -> Result<Self, CatalogError> {
        let records: BTreeMap<String, PrototypeRecord> = toml::from_str(source)?;
        Self::from_records(records)
    }

    /// Loads a catalog file, choosing the parser from the extension.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let source = std::fs::read_to_string(path)?;
        let catalog = match extension.as_str() {
            "json" => Self::from_json_str(&source)?,
            "toml" => Self::from_toml_str(&source)?,
            other => return Err(CatalogError::UnsupportedFormat(other.to_string())),
        };
        tracing::debug!(path = %path.display(), prototypes = catalog.len(), "catalog loaded");
        Ok(catalog)
    }

    /// Builds a catalog from already-parsed records.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the records are empty, too many, declare the
    /// wrong number of neighbour lists, or reference unknown names.
    pub fn from_records<I>(records: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (String, PrototypeRecord)>,
    {
        let records: BTreeMap<String, PrototypeRecord> = records.into_iter().collect();
        if records.is_empty() {
            return Err(CatalogError::Empty);
        }
        if records.len() > MAX_PROTOTYPES {
            return Err(CatalogError::TooManyPrototypes {
                count: records.len(),
                limit: MAX_PROTOTYPES,
            });
        }

        // Bounded by MAX_PROTOTYPES above.
        #[allow(clippy::cast_possible_truncation)]
        let by_name: HashMap<String, PrototypeId> = records
            .keys()
            .enumerate()
            .map(|(i, name)| (name.clone(), PrototypeId(i as u16)))
            .collect();

        let mut prototypes = Vec::with_capacity(records.len());
        for (name, record) in &records {
            if record.valid_neighbours.len() != 6 {
                return Err(CatalogError::NeighbourCount {
                    prototype: name.clone(),
                    found: record.valid_neighbours.len(),
                });
            }

            let mut neighbours = [PrototypeSet::EMPTY; 6];
            for (mask, list) in neighbours.iter_mut().zip(&record.valid_neighbours) {
                for neighbour in list {
                    let id = by_name.get(neighbour).ok_or_else(|| CatalogError::UnknownNeighbour {
                        prototype: name.clone(),
                        neighbour: neighbour.clone(),
                    })?;
                    mask.insert(*id);
                }
            }

            prototypes.push(Prototype {
                name: name.clone(),
                mesh_name: record.mesh_name.clone(),
                mesh_rotation: record.mesh_rotation,
                faces: record.faces(),
                constrain_to: LayerTag::parse(&record.constrain_to),
                constrain_from: LayerTag::parse(&record.constrain_from),
                weight: record.weight,
                neighbours,
            });
        }

        Ok(Self { prototypes, by_name })
    }

    /// Number of prototypes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    /// Always false for a loaded catalog.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }

    /// The set of every prototype.
    #[inline]
    #[must_use]
    pub fn all(&self) -> PrototypeSet {
        PrototypeSet::first_n(self.prototypes.len())
    }

    /// Prototype by index.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this catalog.
    #[inline]
    #[must_use]
    pub fn get(&self, id: PrototypeId) -> &Prototype {
        &self.prototypes[id.index()]
    }

    /// Index of a prototype by name.
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<PrototypeId> {
        self.by_name.get(name).copied()
    }

    /// Name of a prototype.
    #[must_use]
    pub fn name(&self, id: PrototypeId) -> &str {
        &self.get(id).name
    }

    /// Iterates prototypes with their indices.
    #[allow(clippy::cast_possible_truncation)]
    pub fn iter(&self) -> impl Iterator<Item = (PrototypeId, &Prototype)> {
        // Bounded by MAX_PROTOTYPES at load.
        self.prototypes
            .iter()
            .enumerate()
            .map(|(i, p)| (PrototypeId(i as u16), p))
    }

    /// Prototypes allowed next to `id` in `dir`.
    #[inline]
    #[must_use]
    pub fn neighbours(&self, id: PrototypeId, dir: Direction) -> PrototypeSet {
        self.get(id).neighbours(dir)
    }

    /// Union of the allowed neighbours in `dir` over every member of `set`.
    #[inline]
    #[must_use]
    pub fn neighbour_union(&self, set: PrototypeSet, dir: Direction) -> PrototypeSet {
        let mut union = PrototypeSet::EMPTY;
        for id in &set {
            union |= self.prototypes[id.index()].neighbours[dir.index()];
        }
        union
    }

    /// Prototypes matching `predicate`.
    pub fn select(&self, mut predicate: impl FnMut(&Prototype) -> bool) -> PrototypeSet {
        self.iter().filter(|(_, p)| predicate(p)).map(|(id, _)| id).collect()
    }
}
