use serde::{Deserialize, Serialize};

/// One record-type property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    pub type_text: String,
    pub optional: bool,
    pub doc: Option<String>,
}

/// A referenced record type, exported or not: an exported signature may
/// transitively reach an internal type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    pub properties: Vec<PropertyDef>,
}

/// Structured documentation parsed from a leading `/** ... */` comment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Doc {
    pub description: Option<String>,
    pub param_doc: Vec<(String, String)>,
    pub returns: Option<String>,
    pub examples: Vec<String>,
    pub deprecated: Option<String>,
    pub tags: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    /// Textual type of the single `args` parameter.
    pub args_type: String,
    pub return_type: String,
    pub is_async: bool,
    pub doc: Doc,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamespaceMetadata {
    pub description: Option<String>,
    pub use_when: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionWarning {
    pub message: String,
    pub line: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub source_name: String,
    pub signatures: Vec<Signature>,
    pub types: Vec<TypeDefinition>,
    pub metadata: Option<NamespaceMetadata>,
    pub warnings: Vec<ExtractionWarning>,
}
