//! Persistence for tuned classifier parameters.
//!
//! A [`KnnCustomizer`] produced by an optimization run is saved as CBOR so a
//! later process can load it and classify with the tuned thresholds without
//! re-running the grid search.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::ConfigError;

use super::KnnCustomizer;

impl KnnCustomizer {
    pub fn save_to<W: Write>(&self, writer: W) -> Result<(), ConfigError> {
        serde_cbor::to_writer(writer, self)?;
        Ok(())
    }

    pub fn load_from<R: Read>(reader: R) -> Result<Self, ConfigError> {
        Ok(serde_cbor::from_reader(reader)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let file = File::create(path)?;
        self.save_to(BufWriter::new(file))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        Self::load_from(BufReader::new(file))
    }
}

#[cfg(test)]
mod tests {
    use crate::classify::{ClassifierRange, KnnCustomizer, KnnPolicy};

    #[test]
    fn customizer_survives_a_cbor_round_trip() {
        let mut customizer = KnnCustomizer::new(KnnPolicy::Galavotti);
        customizer
            .set_k(3, 45)
            .set_range(3, ClassifierRange::new(0.25, 1.0, -1.0))
            .set_efficacy(3, 0.875)
            .set_efficacy(7, 0.5);

        let mut buf = Vec::new();
        customizer.save_to(&mut buf).unwrap();
        let loaded = KnnCustomizer::load_from(buf.as_slice()).unwrap();

        assert_eq!(loaded.k(3), 45);
        assert_eq!(loaded.k(0), crate::classify::DEFAULT_K);
        assert_eq!(loaded.range(3), ClassifierRange::new(0.25, 1.0, -1.0));
        assert_eq!(loaded.efficacy(3), 0.875);
        assert_eq!(loaded.efficacy(7), 0.5);
        assert_eq!(loaded.policy(), KnnPolicy::Galavotti);
    }

    #[test]
    fn defaults_round_trip_to_defaults() {
        let customizer = KnnCustomizer::new(KnnPolicy::Classic);
        let mut buf = Vec::new();
        customizer.save_to(&mut buf).unwrap();
        let loaded = KnnCustomizer::load_from(buf.as_slice()).unwrap();
        assert_eq!(loaded, customizer);
    }
}
