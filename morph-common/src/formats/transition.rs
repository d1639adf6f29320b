//! Transition-morph records
//!
//! Transition morphs are blended from a runtime transition state and are
//! stored apart from the regular blendshapes. The tools never interpret
//! their blend-weight configuration; every field besides `name` is carried
//! through verbatim.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One named transition morph with its opaque blend-weight settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionMorph {
    pub name: String,

    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

impl TransitionMorph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: Map::new(),
        }
    }
}

/// Portable collection of transition morphs
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransitionMorphList {
    #[serde(default)]
    pub morphs: Vec<TransitionMorph>,
}

impl TransitionMorphList {
    pub fn new(morphs: Vec<TransitionMorph>) -> Self {
        Self { morphs }
    }

    pub fn find(&self, name: &str) -> Option<&TransitionMorph> {
        self.morphs.iter().find(|m| m.name == name)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_fields_preserved() {
        let json = r#"{"morphs":[{"name":"elbow_bend","bone":"lForearmBend","weights":[0.0,0.5,1.0],"axis":{"x":1}}]}"#;
        let list = TransitionMorphList::from_json(json).unwrap();
        let morph = list.find("elbow_bend").unwrap();
        assert_eq!(morph.settings["bone"], "lForearmBend");
        assert_eq!(morph.settings["weights"][1], 0.5);

        let again = TransitionMorphList::from_json(&list.to_json().unwrap()).unwrap();
        assert_eq!(again, list);
    }

    #[test]
    fn test_missing_name_rejected() {
        let json = r#"{"morphs":[{"bone":"lShin"}]}"#;
        assert!(TransitionMorphList::from_json(json).is_err());
    }

    #[test]
    fn test_empty_record() {
        let list = TransitionMorphList::from_json("{}").unwrap();
        assert!(list.morphs.is_empty());
    }
}
