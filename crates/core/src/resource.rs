use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::etag::Etag;
use crate::ids::ResourceId;
use crate::value::Value;

/// Selects which operation vocabulary applies to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Model,
    Layout,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Layout => "layout",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "model" => Ok(Self::Model),
            "layout" => Ok(Self::Layout),
            _ => Err(CoreError::InvalidData(format!("unknown resource kind: {s}"))),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An independent copy of a published resource state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub resource_id: ResourceId,
    pub kind: ResourceKind,
    pub value: Value,
    pub etag: Etag,
}
