//! Per-protocol-version packet tables.
//!
//! A `VersionedRegistry<F>` holds one table of `packet_id -> F` per
//! registered `ProtocolVersion`. Resolution for an observed version
//! picks the registered version with the minimum absolute distance,
//! ties broken toward the older version.

use std::collections::HashMap;

pub type ProtocolVersion = i32;

pub struct VersionedRegistry<F> {
    /// Kept sorted ascending by version so resolution is a linear scan;
    /// registries are small (a handful of versions) so this is simpler
    /// than a BTreeMap and just as fast in practice.
    tables: Vec<(ProtocolVersion, HashMap<u16, F>)>,
}

impl<F> Default for VersionedRegistry<F> {
    fn default() -> Self {
        Self { tables: Vec::new() }
    }
}

impl<F> VersionedRegistry<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `f` for `(version, packet_id)`, replacing any prior
    /// registration.
    pub fn register(&mut self, version: ProtocolVersion, packet_id: u16, f: F) {
        match self.tables.binary_search_by_key(&version, |(v, _)| *v) {
            Ok(idx) => {
                self.tables[idx].1.insert(packet_id, f);
            }
            Err(idx) => {
                let mut table = HashMap::new();
                table.insert(packet_id, f);
                self.tables.insert(idx, (version, table));
            }
        }
    }

    /// Resolves the table whose version is nearest to `observed`,
    /// ties broken toward the older (smaller) version.
    pub fn resolve(&self, observed: ProtocolVersion) -> Option<&HashMap<u16, F>> {
        self.tables
            .iter()
            .min_by_key(|(v, _)| ((*v as i64 - observed as i64).abs(), *v))
            .map(|(_, table)| table)
    }

    pub fn versions(&self) -> impl Iterator<Item = ProtocolVersion> + '_ {
        self.tables.iter().map(|(v, _)| *v)
    }
}

/// A resolved pair of lookup tables handed to a session at login.
pub struct CodecTables<D, E> {
    pub decoders: HashMap<u16, D>,
    pub encoders: HashMap<u16, E>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_to_nearest_older_version_on_tie() {
        let mut reg: VersionedRegistry<()> = VersionedRegistry::new();
        reg.register(535, 1, ());
        reg.register(504, 1, ());
        reg.register(20_120_812, 1, ());

        // |900-535| = 365< |900-504| = 396, not actually a tie here but
        // 535 is still nearest of the three.
        assert!(reg.resolve(900).unwrap().contains_key(&1));
        let nearest_version = reg
            .versions()
            .min_by_key(|v| (*v as i64 - 900).abs())
            .unwrap();
        assert_eq!(nearest_version, 535);
    }

    #[test]
    fn exact_tie_breaks_toward_older_version() {
        let mut reg: VersionedRegistry<()> = VersionedRegistry::new();
        reg.register(100, 1, ());
        reg.register(200, 1, ());
        // observed 150 is equidistant from 100 and 200.
        let nearest = reg
            .versions()
            .min_by_key(|v| ((*v as i64 - 150).abs(), *v))
            .unwrap();
        assert_eq!(nearest, 100);
    }

    #[test]
    fn register_replaces_existing_entry_for_same_version_and_packet() {
        let mut reg: VersionedRegistry<u32> = VersionedRegistry::new();
        reg.register(1, 1, 10);
        reg.register(1, 1, 20);
        assert_eq!(*reg.resolve(1).unwrap().get(&1).unwrap(), 20);
    }

    #[test]
    fn unregistered_packet_in_resolved_table_is_absent() {
        let mut reg: VersionedRegistry<()> = VersionedRegistry::new();
        reg.register(1, 5, ());
        let table = reg.resolve(1).unwrap();
        assert!(!table.contains_key(&99));
    }
}
