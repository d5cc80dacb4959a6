//! Core document types for docindex.
//!
//! A `Document` is the unit of indexing and querying: a unique string id, an
//! optional fixed-shape [`Embedding`], an opaque payload (`content`, `tags`,
//! `chunks`) and the `matches` list populated by search. Match documents carry
//! their per-metric score in `scores`.

use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use uuid::Uuid;

/// A typed metadata value attached to a document.
///
/// Uses the default externally-tagged serde representation for bincode compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetadataValue {
    /// Boolean value (`true` / `false`).
    Boolean(bool),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit floating-point number.
    Float(f64),
    /// UTF-8 string.
    String(String),
}

/// Opaque document payload. Never interpreted by the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Content {
    Text(String),
    Bytes(Vec<u8>),
}

/// Dimensional signature of an embedding, e.g. `[4]` or `[2, 3]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape(pub Vec<usize>);

impl Shape {
    /// Number of scalar elements described by this shape.
    pub fn element_count(&self) -> usize {
        self.0.iter().product()
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, dim) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{dim}")?;
        }
        if self.0.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }
}

/// A dense embedding stored row-major together with its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEmbedding")]
pub struct Embedding {
    values: Vec<f32>,
    shape: Shape,
}

impl Embedding {
    /// Creates a 1-D embedding whose shape is `[values.len()]`.
    pub fn new(values: Vec<f32>) -> Self {
        let shape = Shape(vec![values.len()]);
        Self { values, shape }
    }

    /// Creates an embedding with an explicit shape.
    ///
    /// Fails with [`IndexError::InvalidShape`] when the shape does not describe
    /// exactly `values.len()` elements.
    pub fn with_shape(values: Vec<f32>, shape: Vec<usize>) -> Result<Self> {
        let shape = Shape(shape);
        if shape.0.is_empty() || shape.element_count() != values.len() {
            return Err(IndexError::InvalidShape(format!(
                "shape {} does not hold {} values",
                shape,
                values.len()
            )));
        }
        Ok(Self { values, shape })
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }
}

/// Unchecked wire form; deserialization goes through [`Embedding::with_shape`].
#[derive(Deserialize)]
struct RawEmbedding {
    values: Vec<f32>,
    shape: Vec<usize>,
}

impl TryFrom<RawEmbedding> for Embedding {
    type Error = IndexError;

    fn try_from(raw: RawEmbedding) -> Result<Self> {
        Embedding::with_shape(raw.values, raw.shape)
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// A stored or queried document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier within a store. Immutable once assigned.
    pub id: String,
    /// `None` means "not yet embedded".
    #[serde(default)]
    pub embedding: Option<Embedding>,
    #[serde(default)]
    pub content: Option<Content>,
    /// Arbitrary key-value metadata.
    #[serde(default)]
    pub tags: HashMap<String, MetadataValue>,
    #[serde(default)]
    pub chunks: Vec<Document>,
    /// Ranked matches attached by search, nearest first.
    #[serde(default)]
    pub matches: Vec<Document>,
    /// Score per metric name. Only populated on match documents.
    #[serde(default)]
    pub scores: BTreeMap<String, f32>,
}

impl Default for Document {
    fn default() -> Self {
        Self::with_id(Uuid::new_v4().simple().to_string())
    }
}

impl Document {
    /// Creates an empty document with a random hex id.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty document with a specific id.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            embedding: None,
            content: None,
            tags: HashMap::new(),
            chunks: Vec::new(),
            matches: Vec::new(),
            scores: BTreeMap::new(),
        }
    }

    pub fn embedding(mut self, embedding: impl Into<Embedding>) -> Self {
        self.embedding = Some(embedding.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.content = Some(Content::Text(text.into()));
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.tags.insert(key.into(), value);
        self
    }

    pub fn chunk(mut self, chunk: Document) -> Self {
        self.chunks.push(chunk);
        self
    }

    /// Shape of the embedding, if any.
    pub fn embedding_shape(&self) -> Option<&Shape> {
        self.embedding.as_ref().map(Embedding::shape)
    }

    /// Score recorded under `metric_name`, if this is a match document.
    pub fn score(&self, metric_name: &str) -> Option<f32> {
        self.scores.get(metric_name).copied()
    }
}
