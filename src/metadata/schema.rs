//! The fixed metadata schema.
//!
//! Every key that may ever appear in a [`MetaData`](super::MetaData) instance
//! is declared here, together with its topical section, human-readable
//! description, physical unit, and value kind. The table is static by
//! design: format loaders and downstream consumers share one vocabulary, and
//! assigning a key outside of it is a programming error, not a runtime
//! condition.

/// Topical section a metadata key belongs to.
///
/// Sections group keys for tabular display (see
/// [`MetaData::get_summary`](super::MetaData::get_summary)); they carry no
/// validation semantics of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// Acquisition settings (feedback, calibration, rates).
    Acquisition,
    /// Properties of the recorded dataset (timing, size, identifiers).
    Dataset,
    /// Per-phase dataset properties, only meaningful for modalities with an
    /// intermediate segment.
    DatasetMod,
    /// Quantitative-map grid placement.
    QMap,
    /// Instrument and software provenance.
    Setup,
    /// Storage location and format label.
    Storage,
}

impl Section {
    /// Section title used in summaries.
    pub fn title(&self) -> &'static str {
        match self {
            Section::Acquisition => "acquisition",
            Section::Dataset => "dataset",
            Section::DatasetMod => "dataset-mod",
            Section::QMap => "qmap",
            Section::Setup => "setup",
            Section::Storage => "storage",
        }
    }
}

/// Value kind of a metadata key, driving coercion and validation on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Floating point quantity.
    Float,
    /// Integer quantity (floats are accepted and rounded).
    Int,
    /// Free-form string.
    Str,
    /// ISO calendar day, kept as a string.
    Date,
    /// Time of day, routed through the time-string normalizer.
    Time,
    /// One of [`IMAGING_MODALITIES`].
    Modality,
    /// One of the known feedback modes.
    FeedbackMode,
}

/// One entry of the metadata schema.
#[derive(Debug, Clone, Copy)]
pub struct MetaField {
    /// The metadata key.
    pub key: &'static str,
    /// Section the key belongs to.
    pub section: Section,
    /// Human-readable description.
    pub descr: &'static str,
    /// Physical unit ("" for dimensionless or textual values).
    pub unit: &'static str,
    /// Value kind driving coercion.
    pub kind: ValueKind,
}

/// Imaging modalities understood by this crate.
pub const IMAGING_MODALITIES: &[&str] =
    &["creep-compliance", "force-distance", "stress-relaxation"];

/// Known feedback modes.
pub const FEEDBACK_MODES: &[&str] = &["contact"];

const fn field(
    key: &'static str,
    section: Section,
    descr: &'static str,
    unit: &'static str,
    kind: ValueKind,
) -> MetaField {
    MetaField {
        key,
        section,
        descr,
        unit,
        kind,
    }
}

/// The complete metadata schema, ordered by section and key.
pub const META_FIELDS: &[MetaField] = &[
    // acquisition
    field(
        "feedback mode",
        Section::Acquisition,
        "Feedback mode",
        "",
        ValueKind::FeedbackMode,
    ),
    field(
        "imaging mode",
        Section::Acquisition,
        "Imaging modality",
        "",
        ValueKind::Modality,
    ),
    field(
        "rate approach",
        Section::Acquisition,
        "Sampling rate of approach",
        "Hz",
        ValueKind::Float,
    ),
    field(
        "rate retract",
        Section::Acquisition,
        "Sampling rate of retract",
        "Hz",
        ValueKind::Float,
    ),
    field(
        "segment count",
        Section::Acquisition,
        "Number of segments",
        "",
        ValueKind::Int,
    ),
    field(
        "sensitivity",
        Section::Acquisition,
        "Sensitivity",
        "m/V",
        ValueKind::Float,
    ),
    field(
        "setpoint",
        Section::Acquisition,
        "Active feedback loop setpoint",
        "N",
        ValueKind::Float,
    ),
    field(
        "speed approach",
        Section::Acquisition,
        "Piezo speed of approach",
        "m/s",
        ValueKind::Float,
    ),
    field(
        "speed retract",
        Section::Acquisition,
        "Piezo speed of retract",
        "m/s",
        ValueKind::Float,
    ),
    field(
        "spring constant",
        Section::Acquisition,
        "Cantilever spring constant",
        "N/m",
        ValueKind::Float,
    ),
    // dataset
    field(
        "curve id",
        Section::Dataset,
        "Curve identifier",
        "",
        ValueKind::Str,
    ),
    field(
        "date",
        Section::Dataset,
        "Recording date (YYYY-MM-DD)",
        "",
        ValueKind::Date,
    ),
    field(
        "duration",
        Section::Dataset,
        "Duration of the measurement",
        "s",
        ValueKind::Float,
    ),
    field(
        "enum",
        Section::Dataset,
        "Dataset index within the file",
        "",
        ValueKind::Int,
    ),
    field(
        "point count",
        Section::Dataset,
        "Size of the dataset in points",
        "",
        ValueKind::Int,
    ),
    field(
        "session id",
        Section::Dataset,
        "Dataset session identifier",
        "",
        ValueKind::Str,
    ),
    field(
        "time",
        Section::Dataset,
        "Recording time (HH:MM:SS[.f])",
        "",
        ValueKind::Time,
    ),
    field(
        "z range",
        Section::Dataset,
        "Axial piezo range covered",
        "m",
        ValueKind::Float,
    ),
    // dataset-mod (3-segment modalities)
    field(
        "duration approach",
        Section::DatasetMod,
        "Duration of approach segment",
        "s",
        ValueKind::Float,
    ),
    field(
        "duration intermediate",
        Section::DatasetMod,
        "Duration of intermediate segment",
        "s",
        ValueKind::Float,
    ),
    field(
        "duration retract",
        Section::DatasetMod,
        "Duration of retract segment",
        "s",
        ValueKind::Float,
    ),
    field(
        "point count approach",
        Section::DatasetMod,
        "Points in approach segment",
        "",
        ValueKind::Int,
    ),
    field(
        "point count intermediate",
        Section::DatasetMod,
        "Points in intermediate segment",
        "",
        ValueKind::Int,
    ),
    field(
        "point count retract",
        Section::DatasetMod,
        "Points in retract segment",
        "",
        ValueKind::Int,
    ),
    // qmap
    field(
        "grid center x",
        Section::QMap,
        "Horizontal center of grid",
        "m",
        ValueKind::Float,
    ),
    field(
        "grid center y",
        Section::QMap,
        "Vertical center of grid",
        "m",
        ValueKind::Float,
    ),
    field(
        "grid index x",
        Section::QMap,
        "Horizontal grid position index",
        "",
        ValueKind::Int,
    ),
    field(
        "grid index y",
        Section::QMap,
        "Vertical grid position index",
        "",
        ValueKind::Int,
    ),
    field(
        "grid shape x",
        Section::QMap,
        "Horizontal grid shape",
        "px",
        ValueKind::Int,
    ),
    field(
        "grid shape y",
        Section::QMap,
        "Vertical grid shape",
        "px",
        ValueKind::Int,
    ),
    field(
        "grid size x",
        Section::QMap,
        "Horizontal grid size",
        "m",
        ValueKind::Float,
    ),
    field(
        "grid size y",
        Section::QMap,
        "Vertical grid size",
        "m",
        ValueKind::Float,
    ),
    field(
        "position x",
        Section::QMap,
        "Horizontal position",
        "m",
        ValueKind::Float,
    ),
    field(
        "position y",
        Section::QMap,
        "Vertical position",
        "m",
        ValueKind::Float,
    ),
    // setup
    field(
        "instrument",
        Section::Setup,
        "Instrument name",
        "",
        ValueKind::Str,
    ),
    field(
        "software",
        Section::Setup,
        "Acquisition software",
        "",
        ValueKind::Str,
    ),
    field(
        "software version",
        Section::Setup,
        "Acquisition software version",
        "",
        ValueKind::Str,
    ),
    // storage
    field(
        "format",
        Section::Storage,
        "File format label",
        "",
        ValueKind::Str,
    ),
    field(
        "path",
        Section::Storage,
        "Path to the measurement file",
        "",
        ValueKind::Str,
    ),
];

/// Look up a schema field by key.
pub fn lookup(key: &str) -> Option<&'static MetaField> {
    META_FIELDS.iter().find(|f| f.key == key)
}

/// Number of segments implied by an imaging modality, if known.
pub fn segment_count_for_modality(modality: &str) -> Option<i64> {
    match modality {
        "force-distance" => Some(2),
        "creep-compliance" | "stress-relaxation" => Some(3),
        _ => None,
    }
}
