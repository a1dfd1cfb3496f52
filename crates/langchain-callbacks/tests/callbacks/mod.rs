//! Unit tests for the callbacks public surface.

mod test_exports;
mod test_imports;
