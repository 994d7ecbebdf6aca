/// Storage backend definitions
///
/// A content version records which backend holds its payload. The database
/// backend keeps the payload inline next to the metadata; the other backends
/// only record a location and leave the payload bytes to an external storage
/// collaborator.
use std::fmt;

/// Where the payload of a content version is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageBackend {
    /// Payload stored inline in the metadata database
    Database,

    /// Payload stored as a file on a local or mounted filesystem
    Filesystem,

    /// Payload stored in an object storage bucket
    Bucket,
}

impl StorageBackend {
    /// Returns true if payloads for this backend live inside the database
    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Database)
    }

    /// Converts the backend to its database code
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Filesystem => "filesystem",
            Self::Bucket => "bucket",
        }
    }

    /// Parses a backend from its database code
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "database" => Some(Self::Database),
            "filesystem" => Some(Self::Filesystem),
            "bucket" => Some(Self::Bucket),
            _ => None,
        }
    }

    /// Human-readable description, used when seeding the reference table
    pub fn description(&self) -> &'static str {
        match self {
            Self::Database => "payload stored inline in the database",
            Self::Filesystem => "payload stored on a filesystem path",
            Self::Bucket => "payload stored in an object storage bucket",
        }
    }

    /// Returns all known backends
    pub fn all() -> Vec<Self> {
        vec![Self::Database, Self::Filesystem, Self::Bucket]
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_db_string() {
        for backend in StorageBackend::all() {
            let db_str = backend.to_db_string();
            assert_eq!(Some(backend), StorageBackend::from_db_string(db_str));
        }
    }

    #[test]
    fn test_from_db_string_invalid() {
        assert_eq!(StorageBackend::from_db_string("tape"), None);
    }

    #[test]
    fn test_is_inline() {
        assert!(StorageBackend::Database.is_inline());
        assert!(!StorageBackend::Filesystem.is_inline());
        assert!(!StorageBackend::Bucket.is_inline());
    }
}
