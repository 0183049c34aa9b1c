use serde::{Deserialize, Serialize};

/// Geographic sanity bounds for the Indian-subcontinent domain this pipeline
/// serves. Numerically well-formed pairs outside this box are rejected as
/// resolution failures.
pub const LAT_MIN: f64 = 6.0;
pub const LAT_MAX: f64 = 37.0;
pub const LNG_MIN: f64 = 68.0;
pub const LNG_MAX: f64 = 97.0;

/// Returns true when the pair falls inside the accepted bounding box.
pub fn in_bounds(lat: f64, lng: f64) -> bool {
    (LAT_MIN..=LAT_MAX).contains(&lat) && (LNG_MIN..=LNG_MAX).contains(&lng)
}

/// A raw record handed to the engine by an out-of-scope scraper.
/// Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub state: String,
    pub city: String,
    pub branch_name: String,
    pub raw_address: String,
    pub source_url: Option<String>,
}

/// Why a resolution attempt (or the whole item) failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolveErrorKind {
    /// Record had no resolvable link; not retried.
    NoUrl,
    /// Connection, timeout, DNS failure, or a non-2xx status.
    Transport,
    /// Response obtained but no pattern matched, or the matched pair
    /// failed the bounding-box check.
    Parse,
}

impl ResolveErrorKind {
    /// Human-readable description written into the output row.
    pub fn describe(&self) -> &'static str {
        match self {
            ResolveErrorKind::NoUrl => "No URL provided",
            ResolveErrorKind::Transport => "Request failed",
            ResolveErrorKind::Parse => "Failed to extract coordinates",
        }
    }
}

/// Outcome of one item's URL resolution. Created per attempt, folded into
/// an `EnrichedRecord` once the item settles.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateResult {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub expanded_url: Option<String>,
    pub success: bool,
    pub error: Option<ResolveErrorKind>,
}

impl CoordinateResult {
    pub fn resolved(lat: f64, lng: f64, expanded_url: String) -> Self {
        Self {
            latitude: Some(lat),
            longitude: Some(lng),
            expanded_url: Some(expanded_url),
            success: true,
            error: None,
        }
    }

    pub fn failed(kind: ResolveErrorKind) -> Self {
        Self {
            latitude: None,
            longitude: None,
            expanded_url: None,
            success: false,
            error: Some(kind),
        }
    }
}

/// A candidate record plus everything the resolver learned about it. Each
/// record is owned by exactly one in-flight task; fields are only appended,
/// never rewritten concurrently. Geocoder output lives in the separate
/// api_* columns of the geocode pass, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub state: String,
    pub city: String,
    pub branch_name: String,
    pub raw_address: String,
    pub source_url: Option<String>,
    pub expanded_url: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub success: bool,
    pub error: Option<String>,
}

impl EnrichedRecord {
    /// Fold a settled resolution outcome into the candidate it belongs to.
    pub fn from_resolution(candidate: CandidateRecord, result: CoordinateResult) -> Self {
        Self {
            state: candidate.state,
            city: candidate.city,
            branch_name: candidate.branch_name,
            raw_address: candidate.raw_address,
            source_url: candidate.source_url,
            expanded_url: result.expanded_url,
            latitude: result.latitude,
            longitude: result.longitude,
            success: result.success,
            error: result.error.map(|k| k.describe().to_string()),
        }
    }
}

/// Output of `normalize::normalize`. An empty pincode means "no pincode
/// found", which is distinct from a field that was never computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedAddress {
    pub cleaned_text: String,
    pub pincode: String,
}

impl NormalizedAddress {
    /// Exact-match deduplication key: cleaned text joined to the pincode.
    pub fn match_key(&self) -> String {
        format!("{}_{}", self.cleaned_text, self.pincode)
    }
}

/// Best-candidate mapping of a forward-geocoding response. Every field is
/// optional; a missing role in the provider's answer leaves the field
/// absent rather than failing the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub formatted_address: Option<String>,
    pub pincode: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}
