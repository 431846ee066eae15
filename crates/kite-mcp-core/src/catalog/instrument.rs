use serde::{Deserialize, Serialize};

/// A single tradable instrument record, as published in the brokerage's
/// daily JSON-lines master. Field names follow the real upstream Kite
/// Connect instrument dump's column names so the catalog can
/// deserialize it without a translation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub instrument_token: u32,
    pub exchange_token: u32,
    pub tradingsymbol: String,
    pub name: String,
    pub last_price: f64,
    #[serde(default)]
    pub expiry: String,
    #[serde(default)]
    pub strike: f64,
    pub tick_size: f64,
    pub lot_size: u32,
    pub instrument_type: String,
    pub segment: String,
    pub exchange: String,
    #[serde(default)]
    pub isin: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

pub const INDICES_SEGMENT: &str = "INDICES";

impl Instrument {
    /// `id` form `"<exchange>:<tradingsymbol>"`.
    pub fn id(&self) -> String {
        format!("{}:{}", self.exchange, self.tradingsymbol)
    }

    /// `segmentID = instrumentToken & 0xFF`.
    pub fn segment_id(&self) -> u8 {
        (self.instrument_token & 0xFF) as u8
    }

    /// Inverse of `segment_id`:
    /// `instrumentToken = (exchangeToken << 8) | segmentID`.
    pub fn token_from_exchange_token(segment_id: u8, exchange_token: u32) -> u32 {
        (exchange_token << 8) | segment_id as u32
    }

    /// Extra id inserted for index instruments: `"INDICES:<tradingsymbol>"`.
    pub fn indices_alias_id(&self) -> Option<String> {
        if self.segment == INDICES_SEGMENT {
            Some(format!("{}:{}", INDICES_SEGMENT, self.tradingsymbol))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Instrument {
        Instrument {
            instrument_token: 779521,
            exchange_token: 3045,
            tradingsymbol: "SBIN".into(),
            name: "STATE BANK OF INDIA".into(),
            last_price: 600.0,
            expiry: String::new(),
            strike: 0.0,
            tick_size: 0.05,
            lot_size: 1,
            instrument_type: "EQ".into(),
            segment: "NSE".into(),
            exchange: "NSE".into(),
            isin: "INE062A01020".into(),
            active: true,
        }
    }

    #[test]
    fn id_combines_exchange_and_symbol() {
        assert_eq!(sample().id(), "NSE:SBIN");
    }

    #[test]
    fn segment_inverse_round_trips() {
        let inst = sample();
        let segment_id = inst.segment_id();
        assert_eq!(segment_id, (inst.instrument_token & 0xFF) as u8);
        let round_tripped = Instrument::token_from_exchange_token(segment_id, inst.exchange_token);
        assert_eq!(round_tripped, inst.instrument_token);
    }

    #[test]
    fn indices_segment_gets_alias_id() {
        let mut inst = sample();
        inst.segment = "INDICES".into();
        inst.tradingsymbol = "NIFTY 50".into();
        assert_eq!(inst.indices_alias_id(), Some("INDICES:NIFTY 50".to_string()));
        inst.segment = "NSE".into();
        assert_eq!(inst.indices_alias_id(), None);
    }
}
