//! Parse-time options.

/// Options controlling how a document is decoded.
///
/// The defaults accept everything a conforming writer produces, plus trailing
/// bytes after the last output map.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ParseConfig {
    /// Render derivation paths as `m/...` instead of relative.
    bip32_paths_absolute: bool,

    /// Fail instead of warning when bytes follow the last output map.
    reject_trailing_bytes: bool,
}

impl ParseConfig {
    /// Constructs a new instance with the default options.
    pub fn new() -> Self {
        Self {
            bip32_paths_absolute: true,
            reject_trailing_bytes: false,
        }
    }

    /// Sets whether decoded derivation paths are prefixed with `m`.
    pub fn with_bip32_paths_absolute(mut self, v: bool) -> Self {
        self.bip32_paths_absolute = v;
        self
    }

    /// Sets whether trailing bytes are an error.
    pub fn with_reject_trailing_bytes(mut self, v: bool) -> Self {
        self.reject_trailing_bytes = v;
        self
    }

    /// Returns whether decoded derivation paths are prefixed with `m`.
    pub fn bip32_paths_absolute(&self) -> bool {
        self.bip32_paths_absolute
    }

    /// Returns whether trailing bytes are an error.
    pub fn reject_trailing_bytes(&self) -> bool {
        self.reject_trailing_bytes
    }
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self::new()
    }
}
