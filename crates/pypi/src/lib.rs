//! Python Package Index release backend for relbot.
//!
//! [`PypiBackend`] reads the latest published version from the PyPI JSON API
//! and publishes a release by building the checked-out tag with
//! `setup.py sdist bdist_wheel` and uploading the result with `twine`.

#![warn(missing_docs)]

pub mod backend;
pub mod index;

pub use backend::PypiBackend;
pub use index::PackageIndex;
