use hcn_wire::{Datapoint, PeerIndex, TextBatch, VectorEntry, WireError, WIDE_TEXT_FLAG};
use tracing::{debug, trace, warn};

use crate::config::RegistryConfig;
use crate::error::{DispatchError, Result};
use crate::handler::{DatapointHandler, KeyValueHandler, TextHandler, VectorHandler};
use crate::keyvalue::parse_key_value;

/// Where a batch stopped because an entry type was zero or out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchAbort {
    /// Position of the offending entry in the batch.
    pub index: usize,
    /// The type value it carried.
    pub entry_type: u8,
}

impl From<BatchAbort> for DispatchError {
    fn from(abort: BatchAbort) -> Self {
        DispatchError::BatchEntryOutOfRange {
            index: abort.index,
            entry_type: abort.entry_type,
        }
    }
}

/// What a single dispatch call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    /// Entries that reached a handler.
    pub handled: usize,
    /// Entries with no registered handler.
    pub unhandled: usize,
    /// Set when the remaining entries of a batch were skipped.
    pub aborted: Option<BatchAbort>,
}

impl DispatchOutcome {
    /// True when at least one handler ran.
    pub fn is_handled(&self) -> bool {
        self.handled > 0
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }
}

struct KeyEntry {
    key: String,
    handler: Box<dyn KeyValueHandler>,
}

/// Handler tables for every application payload kind.
///
/// Key handlers are scanned linearly in registration order; the first match
/// wins. Datapoint, vector and text handlers live in tables indexed by entry
/// type, whose length is one past the highest registered type.
pub struct DispatchRegistry {
    keys: Vec<KeyEntry>,
    datapoints: Vec<Option<Box<dyn DatapointHandler>>>,
    vectors: Vec<Option<Box<dyn VectorHandler>>>,
    texts: Vec<Option<Box<dyn TextHandler>>>,
    config: RegistryConfig,
}

impl DispatchRegistry {
    /// Create an empty registry with default config.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry with explicit config.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            keys: Vec::new(),
            datapoints: Vec::new(),
            vectors: Vec::new(),
            texts: Vec::new(),
            config,
        }
    }

    /// Register a handler for a key/value key.
    pub fn on_key(
        &mut self,
        key: impl Into<String>,
        handler: impl KeyValueHandler + 'static,
    ) -> &mut Self {
        self.keys.push(KeyEntry {
            key: key.into(),
            handler: Box::new(handler),
        });
        self
    }

    /// Register a handler for a datapoint type. Type zero is reserved.
    pub fn on_datapoint(
        &mut self,
        kind: u8,
        handler: impl DatapointHandler + 'static,
    ) -> Result<&mut Self> {
        let handler: Box<dyn DatapointHandler> = Box::new(handler);
        insert(&mut self.datapoints, "datapoint type", kind, handler)?;
        Ok(self)
    }

    /// Register a handler for a vector type. Type zero is reserved.
    pub fn on_vector(
        &mut self,
        kind: u8,
        handler: impl VectorHandler + 'static,
    ) -> Result<&mut Self> {
        let handler: Box<dyn VectorHandler> = Box::new(handler);
        insert(&mut self.vectors, "vector type", kind, handler)?;
        Ok(self)
    }

    /// Register a handler for a text type.
    ///
    /// The wide-text flag is ignored, so one handler sees both encodings.
    pub fn on_text(
        &mut self,
        text_type: u8,
        handler: impl TextHandler + 'static,
    ) -> Result<&mut Self> {
        let base = text_type & !WIDE_TEXT_FLAG;
        let handler: Box<dyn TextHandler> = Box::new(handler);
        insert(&mut self.texts, "text type", base, handler)?;
        Ok(self)
    }

    /// Route a `key=value` string to the first handler whose key matches.
    pub fn dispatch_key_value(&self, slot: PeerIndex, text: &str) -> Result<DispatchOutcome> {
        let pair = parse_key_value(text)?;

        match self.find_key(pair.key) {
            Some(handler) => {
                trace!(%slot, key = pair.key, "dispatching key/value");
                handler.handle(slot, pair.key, pair.value);
                Ok(DispatchOutcome {
                    handled: 1,
                    ..DispatchOutcome::default()
                })
            }
            None if self.config.fail_on_unhandled => {
                Err(DispatchError::UnknownKey(pair.key.to_string()))
            }
            None => {
                debug!(%slot, key = pair.key, "no handler registered for key");
                Ok(DispatchOutcome {
                    unhandled: 1,
                    ..DispatchOutcome::default()
                })
            }
        }
    }

    /// Route each datapoint entry to its type's handler, in order.
    pub fn dispatch_datapoints(&self, slot: PeerIndex, entries: &[Datapoint]) -> DispatchOutcome {
        dispatch_batch(
            self.datapoints.as_slice(),
            "datapoint",
            slot,
            entries,
            |entry| entry.kind,
            |handler, entry| handler.handle(slot, entry),
        )
    }

    /// Route each vector entry to its type's handler, in order.
    pub fn dispatch_vectors(&self, slot: PeerIndex, entries: &[VectorEntry]) -> DispatchOutcome {
        dispatch_batch(
            self.vectors.as_slice(),
            "vector",
            slot,
            entries,
            |entry| entry.kind,
            |handler, entry| handler.handle(slot, entry),
        )
    }

    /// Route a text packet to its type's handler.
    pub fn dispatch_text(&self, slot: PeerIndex, text: &TextBatch) -> DispatchOutcome {
        dispatch_batch(
            self.texts.as_slice(),
            "text",
            slot,
            std::slice::from_ref(text),
            |text| text.text_type.0 & !WIDE_TEXT_FLAG,
            |handler, text| handler.handle(slot, text),
        )
    }

    /// Check if a key has a registered handler under the current case rule.
    pub fn has_key(&self, key: &str) -> bool {
        self.find_key(key).is_some()
    }

    /// Registered keys in registration order.
    pub fn keys(&self) -> Vec<&str> {
        self.keys.iter().map(|entry| entry.key.as_str()).collect()
    }

    /// Get registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn find_key(&self, key: &str) -> Option<&dyn KeyValueHandler> {
        self.keys
            .iter()
            .find(|entry| {
                if self.config.case_insensitive_keys {
                    entry.key.eq_ignore_ascii_case(key)
                } else {
                    entry.key == key
                }
            })
            .map(|entry| entry.handler.as_ref())
    }
}

impl Default for DispatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DispatchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchRegistry")
            .field("keys", &self.keys())
            .field("datapoint_types", &self.datapoints.len())
            .field("vector_types", &self.vectors.len())
            .field("text_types", &self.texts.len())
            .field("config", &self.config)
            .finish()
    }
}

fn insert<H: ?Sized>(
    table: &mut Vec<Option<Box<H>>>,
    field: &'static str,
    kind: u8,
    handler: Box<H>,
) -> Result<()> {
    if kind == 0 {
        return Err(WireError::InvalidField { field, value: 0 }.into());
    }
    let index = usize::from(kind);
    if table.len() <= index {
        table.resize_with(index + 1, || None);
    }
    table[index] = Some(handler);
    Ok(())
}

fn dispatch_batch<E, H: ?Sized>(
    table: &[Option<Box<H>>],
    kind: &'static str,
    slot: PeerIndex,
    entries: &[E],
    entry_type: impl Fn(&E) -> u8,
    mut invoke: impl FnMut(&H, &E),
) -> DispatchOutcome {
    let mut outcome = DispatchOutcome::default();

    for (index, entry) in entries.iter().enumerate() {
        let ty = entry_type(entry);
        let handler = match table.get(usize::from(ty)) {
            Some(handler) if ty != 0 => handler,
            _ => {
                let abort = BatchAbort {
                    index,
                    entry_type: ty,
                };
                warn!(
                    %slot,
                    kind,
                    skipped = entries.len() - index,
                    error = %DispatchError::from(abort),
                    "aborting batch"
                );
                outcome.aborted = Some(abort);
                break;
            }
        };

        match handler {
            Some(handler) => {
                trace!(%slot, kind, entry_type = ty, "dispatching entry");
                invoke(handler.as_ref(), entry);
                outcome.handled += 1;
            }
            None => {
                debug!(%slot, kind, entry_type = ty, "no handler registered for type");
                outcome.unhandled += 1;
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use hcn_wire::{DatapointValue, TextType, Vec3};

    use super::*;

    type Log = Arc<Mutex<Vec<String>>>;

    fn slot() -> PeerIndex {
        PeerIndex::new(3).unwrap()
    }

    fn recording_key(log: &Log, name: &'static str) -> impl KeyValueHandler + 'static {
        let log = Arc::clone(log);
        move |_: PeerIndex, _: &str, value: &str| {
            log.lock().unwrap().push(format!("{name}:{value}"));
        }
    }

    fn recording_datapoint(log: &Log) -> impl DatapointHandler + 'static {
        let log = Arc::clone(log);
        move |_: PeerIndex, entry: &Datapoint| {
            log.lock().unwrap().push(format!("dp{}:{}", entry.kind, entry.value.as_i32()));
        }
    }

    fn entries(kinds: &[u8]) -> Vec<Datapoint> {
        kinds
            .iter()
            .enumerate()
            .map(|(i, &kind)| Datapoint::new(kind, DatapointValue::from_i32(i as i32 + 1)))
            .collect()
    }

    #[test]
    fn key_routing_invokes_only_matching_handler() {
        let log = Log::default();
        let mut registry = DispatchRegistry::new();
        registry
            .on_key("SJ", recording_key(&log, "SJ"))
            .on_key("MTV", recording_key(&log, "MTV"));

        let outcome = registry.dispatch_key_value(slot(), "SJ=ON").unwrap();
        assert_eq!(outcome.handled, 1);
        assert_eq!(*log.lock().unwrap(), vec!["SJ:ON"]);
    }

    #[test]
    fn unknown_key_is_unhandled_not_error() {
        let log = Log::default();
        let mut registry = DispatchRegistry::new();
        registry.on_key("SJ", recording_key(&log, "SJ"));

        let outcome = registry.dispatch_key_value(slot(), "UNKNOWN=1").unwrap();
        assert!(!outcome.is_handled());
        assert_eq!(outcome.unhandled, 1);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn unknown_key_fails_when_configured() {
        let registry = DispatchRegistry::with_config(RegistryConfig {
            fail_on_unhandled: true,
            ..RegistryConfig::default()
        });
        assert_eq!(
            registry.dispatch_key_value(slot(), "UNKNOWN=1"),
            Err(DispatchError::UnknownKey("UNKNOWN".into()))
        );
    }

    #[test]
    fn key_lookup_ignores_case_by_default() {
        let log = Log::default();
        let mut registry = DispatchRegistry::new();
        registry.on_key("mtv", recording_key(&log, "mtv"));

        assert!(registry.dispatch_key_value(slot(), "MTV=1").unwrap().is_handled());
        assert!(registry.has_key("Mtv"));

        let mut strict = DispatchRegistry::with_config(RegistryConfig {
            case_insensitive_keys: false,
            ..RegistryConfig::default()
        });
        strict.on_key("mtv", recording_key(&log, "mtv"));
        assert!(!strict.dispatch_key_value(slot(), "MTV=1").unwrap().is_handled());
    }

    #[test]
    fn first_registered_key_wins() {
        let log = Log::default();
        let mut registry = DispatchRegistry::new();
        registry
            .on_key("SJ", recording_key(&log, "first"))
            .on_key("sj", recording_key(&log, "second"));

        registry.dispatch_key_value(slot(), "Sj=x").unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["first:x"]);
    }

    #[test]
    fn missing_separator_is_reported() {
        let registry = DispatchRegistry::new();
        assert_eq!(
            registry.dispatch_key_value(slot(), "noseparator"),
            Err(DispatchError::MissingSeparator)
        );
    }

    #[test]
    fn batch_aborts_at_out_of_range_type() {
        let log = Log::default();
        let mut registry = DispatchRegistry::new();
        registry
            .on_datapoint(1, recording_datapoint(&log))
            .unwrap()
            .on_datapoint(2, recording_datapoint(&log))
            .unwrap();

        let outcome = registry.dispatch_datapoints(slot(), &entries(&[1, 9, 2]));

        assert_eq!(*log.lock().unwrap(), vec!["dp1:1"]);
        assert_eq!(outcome.handled, 1);
        assert_eq!(
            outcome.aborted,
            Some(BatchAbort {
                index: 1,
                entry_type: 9
            })
        );
    }

    #[test]
    fn batch_aborts_at_zero_type() {
        let log = Log::default();
        let mut registry = DispatchRegistry::new();
        registry.on_datapoint(1, recording_datapoint(&log)).unwrap();

        let outcome = registry.dispatch_datapoints(slot(), &entries(&[0, 1]));
        assert_eq!(outcome.handled, 0);
        assert_eq!(outcome.aborted.unwrap().index, 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn hole_in_table_is_unhandled_and_continues() {
        let log = Log::default();
        let mut registry = DispatchRegistry::new();
        registry.on_datapoint(3, recording_datapoint(&log)).unwrap();

        let outcome = registry.dispatch_datapoints(slot(), &entries(&[2, 3]));
        assert_eq!(outcome.unhandled, 1);
        assert_eq!(outcome.handled, 1);
        assert!(!outcome.is_aborted());
        assert_eq!(*log.lock().unwrap(), vec!["dp3:2"]);
    }

    #[test]
    fn zero_type_cannot_be_registered() {
        let mut registry = DispatchRegistry::new();
        assert!(registry
            .on_vector(0, |_: PeerIndex, _: &VectorEntry| {})
            .is_err());
    }

    #[test]
    fn vectors_route_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut registry = DispatchRegistry::new();
        registry
            .on_vector(4, move |_: PeerIndex, entry: &VectorEntry| {
                sink.lock().unwrap().push(entry.vector.x);
            })
            .unwrap();

        let batch = [
            VectorEntry::new(4, Vec3::new(1.0, 0.0, 0.0)),
            VectorEntry::new(4, Vec3::new(2.0, 0.0, 0.0)),
        ];
        let outcome = registry.dispatch_vectors(slot(), &batch);
        assert_eq!(outcome.handled, 2);
        assert_eq!(*seen.lock().unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn text_routes_by_base_type() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut registry = DispatchRegistry::new();
        registry
            .on_text(1, move |_: PeerIndex, text: &TextBatch| {
                sink.lock().unwrap().push(text.text.to_string_lossy());
            })
            .unwrap();

        let narrow = TextBatch::new(TextType(0x01), 0, "hello");
        let wide = TextBatch::new(TextType(0x81), 0, "wide");
        assert!(registry.dispatch_text(slot(), &narrow).is_handled());
        assert!(registry.dispatch_text(slot(), &wide).is_handled());
        assert_eq!(*seen.lock().unwrap(), vec!["hello", "wide"]);

        let other = TextBatch::new(TextType(0x05), 0, "x");
        assert!(registry.dispatch_text(slot(), &other).is_aborted());
    }

    #[test]
    fn registry_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DispatchRegistry>();
    }

    #[test]
    fn abort_converts_to_error() {
        let err = DispatchError::from(BatchAbort {
            index: 2,
            entry_type: 0,
        });
        assert_eq!(err.to_string(), "batch entry 2 has out-of-range type 0");
    }
}
