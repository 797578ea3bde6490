// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ID generation for long-lived entities.
//!
//! Every entity carries a prefixed nanoid (`agt-…`, `tsk-…`) so an ID is
//! self-describing in logs and RPC payloads. IDs are opaque to consumers;
//! only the owning component may mint them.

/// Returns a string slice truncated to at most `n` characters.
pub fn short(s: &str, n: usize) -> &str {
    if s.len() <= n {
        s
    } else {
        &s[..n]
    }
}

/// Define a newtype ID wrapper with a type prefix.
///
/// Generates `new()` for random ID generation, `from_string()` for parsing,
/// `as_str()`, `short()`, `Display`, `From<String>`, `From<&str>`,
/// `PartialEq<str>` and `Borrow<str>` implementations.
///
/// The ID format is `{prefix}{nanoid}` where `prefix` is a short type
/// indicator (e.g. `"agt-"`) and the nanoid is 16 random characters.
///
/// ```ignore
/// hq_core::define_id! {
///     /// Doc comment for the ID type.
///     pub struct AgentId("agt-");
/// }
/// ```
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($prefix:literal);
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord,
                 serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Generate a new random ID with the type prefix.
            pub fn new() -> Self {
                Self(format!("{}{}", Self::PREFIX, nanoid::nanoid!(16)))
            }

            /// Create an ID from an existing string (parsing, deserialization).
            pub fn from_string(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns the ID truncated to at most `n` characters.
            pub fn short(&self, n: usize) -> &str {
                $crate::id::short(&self.0, n)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::from_string(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::from_string(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

crate::define_id! {
    /// Identifier for a running agent instance.
    pub struct AgentId("agt-");
}

crate::define_id! {
    /// Identifier for a kanban task.
    pub struct TaskId("tsk-");
}

crate::define_id! {
    /// Identifier for a swimlane.
    pub struct LaneId("lane-");
}

crate::define_id! {
    /// Identifier for a team of agents.
    pub struct TeamId("team-");
}

crate::define_id! {
    /// Identifier for a pipeline definition.
    pub struct PipelineId("pipe-");
}

crate::define_id! {
    /// Identifier for a pipeline run.
    pub struct RunId("run-");
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
