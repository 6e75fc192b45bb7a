use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::ServiceError;

/// Sentinel used by the persistence layer for in-house production.
pub const INTERNAL_PRODUCER: &str = "internal";

/// Who produces a budget line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ProducerRef {
    Internal,
    External(Uuid),
}

impl ProducerRef {
    /// Producer id when the line must be fanned out to an external producer.
    pub fn external_id(&self) -> Option<Uuid> {
        match self {
            Self::Internal => None,
            Self::External(id) => Some(*id),
        }
    }

    /// Reads the nullable `producer_ref` column.
    pub fn from_column(raw: Option<&str>) -> Result<Option<Self>, ServiceError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(None),
            Some(INTERNAL_PRODUCER) => Ok(Some(Self::Internal)),
            Some(other) => Uuid::parse_str(other)
                .map(|id| Some(Self::External(id)))
                .map_err(|_| {
                    ServiceError::InternalError(format!("Malformed producer reference '{other}'"))
                }),
        }
    }

    pub fn to_column(producer: Option<Self>) -> Option<String> {
        producer.map(|p| p.to_string())
    }
}

impl fmt::Display for ProducerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal => f.write_str(INTERNAL_PRODUCER),
            Self::External(id) => write!(f, "{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_round_trip_keeps_sentinel_at_the_edge() {
        let id = Uuid::new_v4();
        let external = ProducerRef::to_column(Some(ProducerRef::External(id)));
        assert_eq!(
            ProducerRef::from_column(external.as_deref()).unwrap(),
            Some(ProducerRef::External(id))
        );
        assert_eq!(
            ProducerRef::from_column(Some("internal")).unwrap(),
            Some(ProducerRef::Internal)
        );
        assert_eq!(ProducerRef::from_column(None).unwrap(), None);
        assert!(ProducerRef::from_column(Some("acme")).is_err());
    }

    #[test]
    fn internal_is_never_fanned_out() {
        assert_eq!(ProducerRef::Internal.external_id(), None);
    }
}
