/// Controls handler lookup behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// When true, key lookup ignores ASCII case.
    pub case_insensitive_keys: bool,
    /// When true, a key with no handler returns `DispatchError::UnknownKey`.
    pub fail_on_unhandled: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            case_insensitive_keys: true,
            fail_on_unhandled: false,
        }
    }
}
