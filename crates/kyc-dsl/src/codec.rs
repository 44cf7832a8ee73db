//! # Case Codec Contract
//!
//! The parse / serialize / validate collaborator the amendment pipeline
//! talks to. [`CaseCodec`] is async because a deployment may put it behind
//! a remote service; [`SexprCodec`] is the in-process implementation.

use async_trait::async_trait;

use kyc_core::Case;

use crate::bind::bind_document;
use crate::error::CodecError;
use crate::serialize::serialize_cases;
use crate::sexpr::read_all;
use crate::validate::{validate_case, SchemaRegistry};

/// Parse, serialize, and validate case snapshots.
#[async_trait]
pub trait CaseCodec: Send + Sync {
    /// Reconstruct every case in `text`.
    async fn parse(&self, text: &str) -> Result<Vec<Case>, CodecError>;

    /// Render `cases` as snapshot text.
    async fn serialize(&self, cases: &[Case]) -> Result<String, CodecError>;

    /// Check `case`, additionally against `schema_ref` when given.
    async fn validate(&self, case: &Case, schema_ref: Option<&str>) -> Result<(), CodecError>;
}

/// In-process S-expression codec.
#[derive(Debug)]
pub struct SexprCodec {
    schemas: SchemaRegistry,
}

impl SexprCodec {
    /// A codec with the built-in case schema registered.
    pub fn new() -> Result<Self, CodecError> {
        Ok(Self {
            schemas: SchemaRegistry::builtin()?,
        })
    }

    pub fn with_schemas(schemas: SchemaRegistry) -> Self {
        Self { schemas }
    }

    pub fn schemas_mut(&mut self) -> &mut SchemaRegistry {
        &mut self.schemas
    }
}

#[async_trait]
impl CaseCodec for SexprCodec {
    async fn parse(&self, text: &str) -> Result<Vec<Case>, CodecError> {
        let forms = read_all(text).map_err(CodecError::Parse)?;
        let cases = bind_document(&forms)?;
        tracing::debug!(cases = cases.len(), "parsed snapshot");
        Ok(cases)
    }

    async fn serialize(&self, cases: &[Case]) -> Result<String, CodecError> {
        Ok(serialize_cases(cases))
    }

    async fn validate(&self, case: &Case, schema_ref: Option<&str>) -> Result<(), CodecError> {
        validate_case(&self.schemas, case, schema_ref)
    }
}
