use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use sluice_store::WriteDescriptor;
use snafu::ResultExt;

use crate::error::{Result, SerializationSnafu, ValidationSnafu};

/// A record waiting in the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedItem {
    /// The stream or collection the record is written into.
    pub destination: Arc<str>,
    /// The serialized record.
    pub payload: Bytes,
    /// Payload size plus the bulk envelope overhead.
    pub size_bytes: u64,
}

impl BufferedItem {
    /// Creates an item from an already serialized record.
    ///
    /// The payload must be a single non-empty line.
    pub fn new(destination: impl Into<Arc<str>>, payload: Bytes) -> Result<Self> {
        let destination = destination.into();
        validate_destination(&destination)?;

        if payload.is_empty() {
            return ValidationSnafu {
                message: format!("empty payload for destination {destination}"),
            }
            .fail();
        }

        if payload.contains(&b'\n') {
            return ValidationSnafu {
                message: format!("payload for destination {destination} spans multiple lines"),
            }
            .fail();
        }

        let size_bytes = payload.len() as u64 + WriteDescriptor::envelope_size(&destination);

        Ok(Self {
            destination,
            payload,
            size_bytes,
        })
    }

    /// Serializes `record` as JSON and creates an item from it.
    pub fn from_record<T>(destination: impl Into<Arc<str>>, record: &T) -> Result<Self>
    where
        T: Serialize + ?Sized,
    {
        let destination = destination.into();
        validate_destination(&destination)?;

        let payload = serde_json::to_vec(record).context(SerializationSnafu {
            destination: destination.to_string(),
        })?;

        Self::new(destination, payload.into())
    }

    pub fn into_descriptor(self) -> WriteDescriptor {
        WriteDescriptor::new(self.destination, self.payload)
    }
}

fn validate_destination(destination: &str) -> Result<()> {
    if destination.is_empty() {
        return ValidationSnafu {
            message: "destination must not be empty",
        }
        .fail();
    }

    Ok(())
}
