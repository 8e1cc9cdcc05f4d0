//! Opaque serializer/comparator descriptors and user-code references.
//!
//! The generator never interprets these; it copies them into task configs and
//! compares serializers for equality.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::Configuration;

macro_rules! descriptor {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name {
            /// Implementation identifier understood by the runtime.
            pub class: String,
            /// Implementation parameters (e.g. key field positions).
            #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
            pub params: BTreeMap<String, String>,
        }

        impl $name {
            pub fn new(class: impl Into<String>) -> Self {
                Self {
                    class: class.into(),
                    params: BTreeMap::new(),
                }
            }

            pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
                self.params.insert(key.into(), value.into());
                self
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.class)?;
                if !self.params.is_empty() {
                    let params: Vec<String> =
                        self.params.iter().map(|(k, v)| format!("{k}={v}")).collect();
                    write!(f, "[{}]", params.join(","))?;
                }
                Ok(())
            }
        }
    };
}

descriptor!(
    /// Describes how records on a channel are serialized.
    SerializerDescriptor
);
descriptor!(
    /// Describes a key comparator over one input.
    ComparatorDescriptor
);
descriptor!(
    /// Describes a comparator between the keys of two inputs.
    PairComparatorDescriptor
);

/// User-code class and its parameters, copied verbatim into task configs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserCode {
    pub class: String,
    pub parameters: Configuration,
}

impl UserCode {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            parameters: Configuration::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: Configuration) -> Self {
        self.parameters = parameters;
        self
    }
}
