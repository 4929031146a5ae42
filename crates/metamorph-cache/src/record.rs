/// The result of a cache `Lookup`: where the artifact lives, whether it's
/// still within its declared freshness window, and whether a worker is
/// already producing a fresh copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    /// Fully-qualified URL of the cached artifact (endpoint + object key).
    pub url: String,
    /// The origin's entity tag, if one was known at store time.
    pub etag: Option<String>,
    /// `true` if the freshness marker is absent.
    pub expired: bool,
    /// `true` if a worker currently holds the in-flight marker for this
    /// conversion identity.
    pub converting: bool,
    /// The textual target name the record was stored under.
    pub format: String,
}
