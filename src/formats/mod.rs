//! # Format Registry and Dispatch
//!
//! Every supported file format is described by a [`FormatRecipe`]: a
//! suffix, an optional content sniffer, and a loader returning raw
//! datasets. Recipes live in an explicit [`FormatRegistry`] constructed at
//! startup and passed by reference, so tests can work with isolated
//! registries instead of process-wide state.
//!
//! ```no_run
//! use afmcurve::formats::{FormatRegistry, LoadOptions};
//!
//! let registry = FormatRegistry::with_defaults();
//! let curves = registry.load_data("curve.jpk-force".as_ref(), &LoadOptions::default())?;
//! # Ok::<(), afmcurve::errors::FormatError>(())
//! ```

pub mod jpk;
pub mod tab;
pub mod workshop;

#[cfg(feature = "hdf5")]
pub mod hdf5;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::curve::{ColumnMap, Curve};
use crate::errors::FormatError;
use crate::metadata::{MetaData, MetaValue};

/// Metadata entries that always win over parsed values.
pub type MetaOverride = BTreeMap<String, MetaValue>;

/// Advisory progress callback: monotonic, in `[0, 1]`, called once per
/// curve as it completes, final call at exactly 1.0.
pub type ProgressCallback<'a> = dyn Fn(f64) + 'a;

/// Context handed to format loaders.
pub struct LoadContext<'a> {
    /// Progress callback, if the caller wants one.
    pub callback: Option<&'a ProgressCallback<'a>>,
    /// Metadata overrides, merged last.
    pub meta_override: &'a MetaOverride,
}

/// Loader output for one curve: column sources plus validated metadata.
pub struct RawDataset {
    /// Column data, possibly lazily loaded.
    pub data: ColumnMap,
    /// Validated metadata.
    pub metadata: MetaData,
}

/// Loader entry point of a format recipe.
pub type LoaderFn = fn(&Path, &LoadContext<'_>) -> Result<Vec<RawDataset>, FormatError>;

/// Content sniffer of a format recipe.
pub type DetectFn = fn(&Path) -> bool;

/// Description of one supported file format.
#[derive(Clone, Copy)]
pub struct FormatRecipe {
    /// Short description of the format.
    pub descr: &'static str,
    /// Who introduced the format.
    pub maker: &'static str,
    /// File suffix including the leading dot.
    pub suffix: &'static str,
    /// Imaging modalities the format can carry.
    pub modalities: &'static [&'static str],
    /// Loader entry point.
    pub loader: LoaderFn,
    /// Optional content sniffer beyond the suffix match.
    pub detect: Option<DetectFn>,
}

impl FormatRecipe {
    /// Label stamped into loaded metadata, e.g. "JPK Instruments (binary
    /// FD data)".
    pub fn label(&self) -> String {
        format!("{} ({})", self.maker, self.descr)
    }

    /// Whether `path` matches this recipe's suffix.
    pub fn matches_suffix(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with(self.suffix))
            .unwrap_or(false)
    }

    /// Whether `path` can be opened with this recipe.
    ///
    /// Checks the suffix first; if the recipe carries a content sniffer,
    /// that decides.
    pub fn detect(&self, path: &Path) -> bool {
        if !self.matches_suffix(path) {
            return false;
        }
        match self.detect {
            Some(sniff) => sniff(path),
            None => true,
        }
    }
}

impl std::fmt::Debug for FormatRecipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatRecipe")
            .field("suffix", &self.suffix)
            .field("maker", &self.maker)
            .field("descr", &self.descr)
            .finish()
    }
}

/// Options for [`FormatRegistry::load_data`].
#[derive(Default)]
pub struct LoadOptions<'a> {
    /// Metadata overrides, merged last (they always win).
    pub meta_override: MetaOverride,
    /// Restrict loading to one imaging modality.
    pub modality: Option<&'a str>,
    /// Progress callback.
    pub callback: Option<&'a ProgressCallback<'a>>,
}

/// An explicit, injectable collection of format recipes.
pub struct FormatRegistry {
    recipes: Vec<FormatRecipe>,
}

impl FormatRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        FormatRegistry {
            recipes: Vec::new(),
        }
    }

    /// A registry with all built-in formats registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(jpk::RECIPE_JPK_FORCE);
        registry.register(jpk::RECIPE_JPK_FORCE_MAP);
        registry.register(jpk::RECIPE_JPK_QI_DATA);
        registry.register(tab::RECIPE_TAB);
        registry.register(workshop::RECIPE_WORKSHOP_SINGLE);
        registry.register(workshop::RECIPE_WORKSHOP_MAP);
        #[cfg(feature = "hdf5")]
        registry.register(hdf5::RECIPE_HDF5);
        registry
    }

    /// Register an additional format recipe.
    pub fn register(&mut self, recipe: FormatRecipe) {
        self.recipes.push(recipe);
    }

    /// All registered recipes.
    pub fn recipes(&self) -> &[FormatRecipe] {
        &self.recipes
    }

    /// Sorted list of supported file suffixes.
    pub fn supported_extensions(&self) -> Vec<&'static str> {
        let mut suffixes: Vec<&'static str> =
            self.recipes.iter().map(|r| r.suffix).collect();
        suffixes.sort_unstable();
        suffixes.dedup();
        suffixes
    }

    /// The recipe able to open `path`, optionally restricted to a
    /// modality.
    ///
    /// A file whose suffix or content matches no recipe is
    /// format-not-supported; directory-walking callers skip those.
    pub fn get_recipe(
        &self,
        path: &Path,
        modality: Option<&str>,
    ) -> Result<&FormatRecipe, FormatError> {
        let by_suffix: Vec<&FormatRecipe> = self
            .recipes
            .iter()
            .filter(|r| r.matches_suffix(path))
            .collect();
        if by_suffix.is_empty() {
            return Err(FormatError::NotSupported(format!(
                "no recipe for suffix of '{}'",
                path.display()
            )));
        }
        by_suffix
            .into_iter()
            .find(|r| {
                modality
                    .map(|m| r.modalities.contains(&m))
                    .unwrap_or(true)
                    && r.detect(path)
            })
            .ok_or_else(|| {
                FormatError::NotSupported(format!(
                    "could not determine file format recipe for '{}'",
                    path.display()
                ))
            })
    }

    /// Load all curves from a data file.
    ///
    /// Applies the recipe's loader, stamps the `format` label, filters by
    /// the requested modality (when fixed), and wraps each dataset into a
    /// [`Curve`]. Either a curve's full data/metadata pair is produced or
    /// the error propagates; there are no partial curves.
    pub fn load_data(
        &self,
        path: &Path,
        options: &LoadOptions<'_>,
    ) -> Result<Vec<Curve>, FormatError> {
        let recipe = self.get_recipe(path, options.modality)?;
        let ctx = LoadContext {
            callback: options.callback,
            meta_override: &options.meta_override,
        };
        let datasets = (recipe.loader)(path, &ctx)?;
        log::debug!(
            "loaded {} dataset(s) from '{}' via {}",
            datasets.len(),
            path.display(),
            recipe.label()
        );

        let mut curves = Vec::with_capacity(datasets.len());
        for dataset in datasets {
            let RawDataset { data, mut metadata } = dataset;
            metadata.set("format", recipe.label())?;
            let modality = match metadata.get("imaging mode") {
                Ok(value) => value.as_str().map(String::from).ok_or_else(|| {
                    FormatError::FormatMetadata("non-text 'imaging mode'".to_string())
                })?,
                // fall back to the recipe's first declared modality
                Err(_) => recipe.modalities[0].to_string(),
            };
            if let Some(fixed) = options.modality {
                if fixed != modality {
                    // the caller explicitly requested another modality
                    continue;
                }
            }
            curves.push(Curve::new(data, metadata, &modality)?);
        }
        Ok(curves)
    }

    /// Recursively find loadable data files below `path`.
    ///
    /// Files that match no recipe are skipped silently; this never fails on
    /// unreadable entries.
    pub fn find_data(&self, path: &Path, modality: Option<&str>) -> Vec<PathBuf> {
        let mut found = Vec::new();
        if path.is_dir() {
            for entry in walkdir::WalkDir::new(path)
                .into_iter()
                .filter_map(Result::ok)
            {
                if entry.file_type().is_file()
                    && self.get_recipe(entry.path(), modality).is_ok()
                {
                    found.push(entry.path().to_path_buf());
                }
            }
        } else if self.get_recipe(path, modality).is_ok() {
            found.push(path.to_path_buf());
        }
        found.sort();
        found
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("recipes", &self.recipes.len())
            .finish()
    }
}
