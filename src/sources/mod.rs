//! Dependency sources: fetching pinned packages into `deps/`.

pub mod installer;
