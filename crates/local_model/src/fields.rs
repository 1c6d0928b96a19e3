//! Field registry
//!
//! Read-only mapping from field id to display name, optype and (for
//! categorical fields) the ordered set of known labels. Built once when a
//! tree is loaded and shared by predicate evaluation and rule rendering.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// How a field's values are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Optype {
    Categorical,
    Numeric,
    Text,
}

impl Optype {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "categorical" => Some(Self::Categorical),
            "numeric" => Some(Self::Numeric),
            "text" => Some(Self::Text),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Categorical => "categorical",
            Self::Numeric => "numeric",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for Optype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for a single input field
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Field {
    id: String,
    name: String,
    optype: Optype,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    categories: Vec<String>,
}

impl Field {
    pub fn new(id: impl Into<String>, name: impl Into<String>, optype: Optype) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            optype,
            categories: Vec::new(),
        }
    }

    /// Attach the ordered label set of a categorical field.
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn optype(&self) -> Optype {
        self.optype
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// True when the label is known, or when no label set was recorded.
    pub fn accepts_category(&self, label: &str) -> bool {
        self.categories.is_empty() || self.categories.iter().any(|c| c == label)
    }
}

/// Immutable field lookup table, ordered by field id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldRegistry {
    fields: BTreeMap<String, Field>,
    by_name: HashMap<String, String>,
}

impl FieldRegistry {
    /// Build a registry. When two fields share a display name, name lookup
    /// resolves to the one with the smallest id.
    pub fn new(fields: impl IntoIterator<Item = Field>) -> Self {
        let fields: BTreeMap<String, Field> = fields
            .into_iter()
            .map(|field| (field.id.clone(), field))
            .collect();

        let mut by_name = HashMap::with_capacity(fields.len());
        for field in fields.values() {
            by_name
                .entry(field.name.clone())
                .or_insert_with(|| field.id.clone());
        }

        Self { fields, by_name }
    }

    pub fn get(&self, id: &str) -> Option<&Field> {
        self.fields.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.fields.contains_key(id)
    }

    /// Display name of a field, if the id is registered.
    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.fields.get(id).map(Field::name)
    }

    /// Field id registered under a display name.
    pub fn id_for_name(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for FieldRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (id, field) in &self.fields {
            map.serialize_entry(id, field)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iris_fields() -> FieldRegistry {
        FieldRegistry::new(vec![
            Field::new("000002", "petal length", Optype::Numeric),
            Field::new("000003", "petal width", Optype::Numeric),
            Field::new("000004", "species", Optype::Categorical).with_categories([
                "Iris-setosa",
                "Iris-versicolor",
                "Iris-virginica",
            ]),
        ])
    }

    #[test]
    fn lookup_by_id_and_name() {
        let fields = iris_fields();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields.name_of("000003"), Some("petal width"));
        assert_eq!(fields.id_for_name("species"), Some("000004"));
        assert!(fields.get("000009").is_none());
        assert!(fields.id_for_name("sepal length").is_none());
    }

    #[test]
    fn iteration_is_ordered_by_id() {
        let fields = FieldRegistry::new(vec![
            Field::new("b", "second", Optype::Text),
            Field::new("a", "first", Optype::Text),
        ]);
        let ids: Vec<&str> = fields.iter().map(Field::id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn duplicate_names_resolve_to_smallest_id() {
        let fields = FieldRegistry::new(vec![
            Field::new("000007", "size", Optype::Numeric),
            Field::new("000001", "size", Optype::Numeric),
        ]);
        assert_eq!(fields.id_for_name("size"), Some("000001"));
    }

    #[test]
    fn category_acceptance() {
        let fields = iris_fields();
        let species = fields.get("000004").unwrap();
        assert!(species.accepts_category("Iris-setosa"));
        assert!(!species.accepts_category("Iris-germanica"));

        let open = Field::new("x", "x", Optype::Categorical);
        assert!(open.accepts_category("anything"));
    }

    #[test]
    fn optype_parse_roundtrip() {
        for optype in [Optype::Categorical, Optype::Numeric, Optype::Text] {
            assert_eq!(Optype::parse(optype.as_str()), Some(optype));
        }
        assert_eq!(Optype::parse("datetime"), None);
    }
}
