use std::collections::HashMap;

use super::instrument::Instrument;

/// The five read-optimized indexes built together from one snapshot.
/// Replaced as a whole unit on update — never mutated field-by-field
/// once published, so a reader can only ever observe one
/// fully-consistent generation.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndexes {
    pub by_token: HashMap<u32, Instrument>,
    pub by_id: HashMap<String, Instrument>,
    pub id_to_token: HashMap<String, u32>,
    pub by_isin: HashMap<String, Vec<Instrument>>,
    pub segment_to_id: HashMap<String, u8>,
}

impl CatalogIndexes {
    pub fn insert(&mut self, instrument: Instrument) {
        let id = instrument.id();
        let token = instrument.instrument_token;
        let segment_id = instrument.segment_id();

        self.by_token.insert(token, instrument.clone());
        self.id_to_token.insert(id.clone(), token);
        self.segment_to_id.insert(instrument.segment.clone(), segment_id);

        if !instrument.isin.is_empty() {
            self.by_isin.entry(instrument.isin.clone()).or_default().push(instrument.clone());
        }

        if let Some(alias) = instrument.indices_alias_id() {
            self.by_id.insert(alias, instrument.clone());
        }

        self.by_id.insert(id, instrument);
    }

    pub fn from_snapshot(instruments: impl IntoIterator<Item = Instrument>) -> Self {
        let mut indexes = CatalogIndexes::default();
        for instrument in instruments {
            indexes.insert(instrument);
        }
        indexes
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }
}
