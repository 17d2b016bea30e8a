//! Long Tier Type Definitions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Named partition of the vector index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Knowledge,
    Interactions,
    Persona,
}

impl Collection {
    /// Every collection, in the order status reports list them
    pub const ALL: [Self; 3] = [Self::Knowledge, Self::Interactions, Self::Persona];

    /// Convert from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "knowledge" => Some(Self::Knowledge),
            "interactions" => Some(Self::Interactions),
            "persona" => Some(Self::Persona),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Knowledge => "knowledge",
            Self::Interactions => "interactions",
            Self::Persona => "persona",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A text document stored in a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// A document returned by a single-collection query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryHit {
    #[serde(flatten)]
    pub document: Document,

    /// Cosine distance to the query (smaller is closer)
    pub distance: Option<f32>,
}

/// A document returned by a cross-collection search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub document: Document,
    pub collection: Collection,
    pub distance: Option<f32>,
}

impl SearchHit {
    /// Tag a query hit with the collection it came from
    pub fn from_query_hit(hit: QueryHit, collection: Collection) -> Self {
        Self {
            document: hit.document,
            collection,
            distance: hit.distance,
        }
    }
}
