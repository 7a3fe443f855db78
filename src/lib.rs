//! # afmcurve - Uniform AFM Force-Curve Reading
//!
//! `afmcurve` parses the heterogeneous binary and text file formats
//! produced by atomic-force-microscope instruments and normalizes them into
//! a uniform in-memory curve representation with validated metadata.
//!
//! ## Key Features
//!
//! - **JPK archive reader**: ZIP containers with a two-level key/value
//!   property system (shared blocks referenced via indirection tags),
//!   multi-stage unit-conversion chains, and lazy, cached access across
//!   thousands of curves per archive.
//!
//! - **Validated metadata**: a schema-constrained mapping with typed
//!   coercion, deferred (lazy) values, derived identifiers, and automatic
//!   grid-index completion for quantitative maps.
//!
//! - **Uniform curves**: one [`curve::Curve`] type for all imaging
//!   modalities, with segment views generated from a layout descriptor and
//!   a non-destructive user overlay over the raw data.
//!
//! - **Explicit format registry**: recipes are registered on an injectable
//!   [`formats::FormatRegistry`] object, so applications and tests control
//!   exactly which formats participate in dispatch.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use afmcurve::formats::{FormatRegistry, LoadOptions};
//!
//! let registry = FormatRegistry::with_defaults();
//! let curves = registry.load_data("map.jpk-force-map".as_ref(), &LoadOptions::default())?;
//! for curve in &curves {
//!     let metadata = curve.metadata();
//!     println!(
//!         "curve {}: {} points, spring constant {}",
//!         metadata.get("curve id")?,
//!         curve.len()?,
//!         metadata.get("spring constant")?,
//!     );
//!     let force = curve.approach().column("force")?;
//!     println!("  max approach force: {:?}", force.iter().cloned().fold(f64::MIN, f64::max));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Recovering from missing calibration metadata
//!
//! Files recorded without a spring constant or sensitivity report a
//! recoverable [`errors::FormatError::MissingMetadata`] naming the missing
//! keys; retry the identical call with those keys in
//! [`formats::LoadOptions::meta_override`]:
//!
//! ```rust,no_run
//! use afmcurve::errors::FormatError;
//! use afmcurve::formats::{FormatRegistry, LoadOptions};
//!
//! let registry = FormatRegistry::with_defaults();
//! let path = "uncalibrated.jpk-force".as_ref();
//! let curves = match registry.load_data(path, &LoadOptions::default()) {
//!     Err(FormatError::MissingMetadata { keys }) => {
//!         let mut options = LoadOptions::default();
//!         for key in keys {
//!             options.meta_override.insert(key, 0.05.into());
//!         }
//!         registry.load_data(path, &options)?
//!     }
//!     other => other?,
//! };
//! # let _ = curves;
//! # Ok::<(), FormatError>(())
//! ```
//!
//! ## Architecture
//!
//! - [`metadata`]: the schema-validated metadata model
//! - [`curve`]: curve container, segment views, export
//! - [`formats`]: format registry plus the JPK, tab and AFM-workshop
//!   readers (HDF5 behind the `hdf5` feature)
//! - [`errors`]: the error taxonomy
//!
//! ## Supported formats
//!
//! | Suffix | Description | Maker |
//! |--------|-------------|-------|
//! | `.jpk-force` | binary FD data | JPK Instruments |
//! | `.jpk-force-map` | binary QMap data | JPK Instruments |
//! | `.jpk-qi-data` | binary QMap data | JPK Instruments |
//! | `.tab` | tab-separated values | afmcurve |
//! | `.csv` | AFM-workshop CSV data | AFM workshop |
//! | `.zip` | zipped AFM-workshop map data | AFM workshop |
//! | `.h5` | HDF5-based (feature `hdf5`) | afmcurve |

// Documentation lints - enforce complete documentation for publication
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod curve;
pub mod errors;
pub mod formats;
pub mod metadata;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::curve::{Curve, ExportFormat, SegmentLayout, SegmentView, KNOWN_COLUMNS};
    pub use crate::errors::{FormatError, MetaDataError};
    pub use crate::formats::{
        FormatRecipe, FormatRegistry, LoadContext, LoadOptions, MetaOverride, RawDataset,
    };
    pub use crate::metadata::{LazyMetaValue, MetaData, MetaValue, IMAGING_MODALITIES};
}
