use std::fmt;
use ulid::Ulid;

/// Self-assigned peer identity, unique with high probability for the life of
/// the process. Every request carries it so the sender can pick its own reply
/// out of the broadcast stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Generate a fresh identity prefixed with a short role tag, e.g.
    /// `file-get-01j3ekz...`. The role prefix exists purely for human
    /// debuggability of bus traffic. Generation cannot fail; collisions are
    /// an accepted risk of the random scheme.
    pub fn generate(role: &str) -> Self {
        Self(format!("{}-{}", role, Ulid::new().to_string().to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
