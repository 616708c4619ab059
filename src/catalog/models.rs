use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Store-native record identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PokemonId(Uuid);

impl PokemonId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns `None` when `raw` is not in the store's identifier format.
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(Self)
    }

}

impl Default for PokemonId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PokemonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for PokemonId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for PokemonId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Pokemon {
    pub id: PokemonId,
    pub no: u32,
    pub name: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// Record fields that an attribute key may never shadow.
pub const RESERVED_KEYS: [&str; 3] = ["id", "no", "name"];

pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Drops reserved keys from `attributes`, returning how many were removed.
pub fn strip_reserved(attributes: &mut Map<String, Value>) -> usize {
    let before = attributes.len();
    attributes.retain(|key, _| !is_reserved_key(key));
    before - attributes.len()
}

fn check_attributes(attributes: &Map<String, Value>) -> Result<(), ValidationError> {
    match attributes.keys().find(|key| is_reserved_key(key)) {
        Some(key) => Err(ValidationError::ReservedAttribute(key.clone())),
        None => Ok(()),
    }
}

impl Pokemon {
    /// JSON view of the record. Record fields always win over attributes.
    pub fn to_json(&self) -> Value {
        let mut view: Map<String, Value> = self
            .attributes
            .iter()
            .filter(|(key, _)| !is_reserved_key(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        view.insert("id".to_string(), Value::String(self.id.to_string()));
        view.insert("no".to_string(), Value::from(self.no));
        view.insert("name".to_string(), Value::String(self.name.clone()));
        Value::Object(view)
    }
}

impl Serialize for Pokemon {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPokemon {
    pub no: u32,
    pub name: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl NewPokemon {
    pub fn new(no: u32, name: impl Into<String>) -> Self {
        Self {
            no,
            name: name.into(),
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_no(self.no)?;
        validate_name(&self.name)?;
        check_attributes(&self.attributes)
    }
}

/// Partial update. Absent fields are left untouched; `attributes` are
/// merged key by key onto the stored ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PokemonPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl PokemonPatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn no(no: u32) -> Self {
        Self {
            no: Some(no),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.no.is_none() && self.name.is_none() && self.attributes.is_empty()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(no) = self.no {
            validate_no(no)?;
        }
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        check_attributes(&self.attributes)
    }

    /// Writes the patch onto `pokemon` in place.
    pub fn apply_to(&self, pokemon: &mut Pokemon) {
        if let Some(no) = self.no {
            pokemon.no = no;
        }
        if let Some(name) = &self.name {
            pokemon.name = name.clone();
        }
        for (key, value) in &self.attributes {
            if !is_reserved_key(key) {
                pokemon.attributes.insert(key.clone(), value.clone());
            }
        }
    }

    /// JSON view of `before` with the patch fields laid over it.
    pub fn overlay(&self, before: &Pokemon) -> Value {
        let mut after = before.clone();
        self.apply_to(&mut after);
        after.to_json()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub ok: bool,
    pub message: String,
    pub results: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAck {
    pub ok: bool,
    pub message: String,
}

impl DeleteAck {
    pub fn deleted() -> Self {
        Self {
            ok: true,
            message: "Pokemon deleted".to_string(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("no must be a positive integer, got {0}")]
    NonPositiveNo(u32),
    #[error("attribute {0:?} is a record field")]
    ReservedAttribute(String),
}

fn validate_no(no: u32) -> Result<(), ValidationError> {
    if no == 0 {
        return Err(ValidationError::NonPositiveNo(no));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(())
}

/// Names are compared and stored trimmed and lowercase.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pokemon_id_parse() {
        let id = PokemonId::new();
        assert_eq!(PokemonId::parse(&id.to_string()), Some(id));
        assert_eq!(PokemonId::parse("25"), None);
        assert_eq!(PokemonId::parse("pikachu"), None);
    }

    #[test]
    fn test_pokemon_flattens_attributes() {
        let raw = json!({
            "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "no": 25,
            "name": "pikachu",
            "type": "electric"
        });
        let pokemon: Pokemon = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(pokemon.no, 25);
        assert_eq!(pokemon.attributes.get("type"), Some(&json!("electric")));
        assert_eq!(pokemon.to_json(), raw);
    }

    #[test]
    fn test_patch_overlay_prefers_patch_fields() {
        let before = Pokemon {
            id: PokemonId::new(),
            no: 25,
            name: "pikachu".to_string(),
            attributes: Map::new(),
        };
        let mut patch = PokemonPatch::name("raichu");
        patch.attributes.insert("stage".to_string(), json!(2));

        let view = patch.overlay(&before);
        assert_eq!(view["name"], json!("raichu"));
        assert_eq!(view["no"], json!(25));
        assert_eq!(view["stage"], json!(2));
        assert_eq!(view["id"], json!(before.id.to_string()));
    }

    #[test]
    fn test_patch_apply_merges_attributes() {
        let mut pokemon = Pokemon {
            id: PokemonId::new(),
            no: 1,
            name: "bulbasaur".to_string(),
            attributes: Map::from_iter([("type".to_string(), json!("grass"))]),
        };
        let mut patch = PokemonPatch::no(2);
        patch.attributes.insert("height".to_string(), json!(7));
        patch.apply_to(&mut pokemon);

        assert_eq!(pokemon.no, 2);
        assert_eq!(pokemon.name, "bulbasaur");
        assert_eq!(pokemon.attributes.len(), 2);
    }

    #[test]
    fn test_validation() {
        assert!(NewPokemon::new(1, "bulbasaur").validate().is_ok());
        assert_eq!(
            NewPokemon::new(0, "missingno").validate(),
            Err(ValidationError::NonPositiveNo(0))
        );
        assert_eq!(
            NewPokemon::new(1, "   ").validate(),
            Err(ValidationError::EmptyName)
        );
        assert!(PokemonPatch::default().validate().is_ok());
        assert!(PokemonPatch::name("").validate().is_err());
    }

    #[test]
    fn test_reserved_attribute_keys() {
        let input = NewPokemon::new(25, "pikachu").with_attribute("name", json!("PiKaChU"));
        assert_eq!(
            input.validate(),
            Err(ValidationError::ReservedAttribute("name".to_string()))
        );

        let patch: PokemonPatch = serde_json::from_value(json!({"id": "hijacked", "no": 26})).unwrap();
        assert_eq!(patch.attributes.get("id"), Some(&json!("hijacked")));
        assert_eq!(
            patch.validate(),
            Err(ValidationError::ReservedAttribute("id".to_string()))
        );

        let mut attributes = Map::from_iter([
            ("id".to_string(), json!("hijacked")),
            ("type".to_string(), json!("electric")),
        ]);
        assert_eq!(strip_reserved(&mut attributes), 1);
        assert!(attributes.contains_key("type"));
    }

    #[test]
    fn test_record_fields_win_over_attributes() {
        let id = PokemonId::new();
        let mut pokemon = Pokemon {
            id,
            no: 25,
            name: "pikachu".to_string(),
            attributes: Map::from_iter([
                ("id".to_string(), json!("hijacked")),
                ("name".to_string(), json!("PiKaChU")),
            ]),
        };
        let view = pokemon.to_json();
        assert_eq!(view["id"], json!(id.to_string()));
        assert_eq!(view["name"], json!("pikachu"));

        let mut patch = PokemonPatch::no(26);
        patch.attributes.insert("id".to_string(), json!("hijacked"));
        patch.attributes.insert("name".to_string(), json!("PiKaChU"));
        assert_eq!(
            patch.overlay(&pokemon),
            json!({"id": id.to_string(), "no": 26, "name": "pikachu"})
        );
        assert_eq!(serde_json::to_value(&pokemon).unwrap(), view);

        pokemon.attributes.clear();
        patch.apply_to(&mut pokemon);
        assert_eq!(pokemon.id, id);
        assert!(pokemon.attributes.is_empty());
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Mr. Mime "), "mr. mime");
    }
}
