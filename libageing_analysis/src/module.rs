use bit_set::BitSet;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use super::channel::Channel;
use super::error::DatasetError;

/// Check that an identifier names a PM module: PMA0-PMA9 or PMC0-PMC9
pub fn is_valid_identifier(identifier: &str) -> bool {
    let bytes = identifier.as_bytes();
    bytes.len() == 4
        && bytes.starts_with(b"PM")
        && (bytes[2] == b'A' || bytes[2] == b'C')
        && bytes[3].is_ascii_digit()
}

/// A PM module (detector board) and the channels extracted from its trace file.
///
/// Which channels are reference channels is stored as a set of channel numbers; the
/// reference Channel list is derived on demand instead of being kept as a second set of
/// handles into `channels`.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub identifier: String,
    pub path: PathBuf,
    pub is_reference: bool,
    ref_channels: BitSet,
    pub channels: Vec<Channel>,
}

impl Module {
    /// Create a new Module with no channels.
    ///
    /// Reference channel numbers are only kept for the reference module.
    pub fn new(
        identifier: &str,
        path: &Path,
        is_reference: bool,
        ref_channels: &[usize],
    ) -> Result<Self, DatasetError> {
        if !is_valid_identifier(identifier) {
            return Err(DatasetError::InvalidIdentifier(identifier.to_string()));
        }
        let ref_channels = if is_reference {
            ref_channels.iter().copied().collect()
        } else {
            BitSet::new()
        };
        Ok(Self {
            identifier: identifier.to_string(),
            path: path.to_path_buf(),
            is_reference,
            ref_channels,
            channels: Vec::new(),
        })
    }

    /// Make sure the module's trace file exists and is not empty
    pub fn validate_file(&self) -> Result<(), DatasetError> {
        if !self.path.exists() {
            return Err(DatasetError::MissingFile {
                identifier: self.identifier.clone(),
                path: self.path.clone(),
            });
        }
        if self.path.metadata()?.len() == 0 {
            return Err(DatasetError::EmptyFile {
                identifier: self.identifier.clone(),
                path: self.path.clone(),
            });
        }
        Ok(())
    }

    /// Is the given (1-based) channel number a reference channel of this module
    pub fn is_reference_channel(&self, channel_number: usize) -> bool {
        self.is_reference && self.ref_channels.contains(channel_number)
    }

    pub fn reference_channel_numbers(&self) -> Vec<usize> {
        self.ref_channels.iter().collect()
    }

    /// The reference channels of this module, in channel order
    pub fn reference_channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels
            .iter()
            .filter(|ch| self.is_reference_channel(ch.number))
    }

    pub fn get_channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|ch| ch.name == name)
    }

    pub fn with_channels(mut self, channels: Vec<Channel>) -> Self {
        self.channels = channels;
        self
    }

    /// Produce a new Module by transforming every channel
    pub fn map_channels<F>(mut self, f: F) -> Self
    where
        F: FnMut(Channel) -> Channel,
    {
        self.channels = self.channels.into_iter().map(f).collect();
        self
    }
}

impl Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Module(identifier={}, path={}, is_reference={})",
            self.identifier,
            self.path.display(),
            self.is_reference
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_identifier_validation() {
        for good in ["PMA0", "PMA9", "PMC5"] {
            assert!(is_valid_identifier(good));
        }
        for bad in ["PMB0", "PMA", "PMA10", "pma0", "XXA0", ""] {
            assert!(!is_valid_identifier(bad));
        }
        assert!(matches!(
            Module::new("PMB1", Path::new("x"), false, &[]),
            Err(DatasetError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_reference_channels_derived() {
        let channels = (1..=4)
            .map(|n| Channel::new(n, array![1.0], array![1.0], n == 2 || n == 4))
            .collect();
        let module = Module::new("PMA0", Path::new("pma0.txt"), true, &[2, 4])
            .unwrap()
            .with_channels(channels);
        let names: Vec<&str> = module
            .reference_channels()
            .map(|ch| ch.name.as_str())
            .collect();
        assert_eq!(names, vec!["CH02", "CH04"]);
        assert_eq!(module.reference_channel_numbers(), vec![2, 4]);
    }

    #[test]
    fn test_non_reference_module_ignores_channel_list() {
        let module = Module::new("PMC3", Path::new("pmc3.txt"), false, &[1]).unwrap();
        assert!(!module.is_reference_channel(1));
        assert!(module.reference_channel_numbers().is_empty());
    }

    #[test]
    fn test_missing_file() {
        let module = Module::new(
            "PMA1",
            Path::new("/definitely/not/here/pma1.txt"),
            false,
            &[],
        )
        .unwrap();
        assert!(matches!(
            module.validate_file(),
            Err(DatasetError::MissingFile { .. })
        ));
    }
}
