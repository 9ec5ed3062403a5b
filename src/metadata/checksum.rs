//! CRC32 checksum over metadata records
//!
//! Uses CRC32 (IEEE polynomial), the same checksum bootloaders commonly carry
//! for their control blocks. The checksum occupies the last four bytes of a
//! record and covers every byte before it.

use crc32fast::Hasher;

/// Size of the trailing checksum field
pub const CHECKSUM_LEN: usize = 4;

/// Computes a CRC32 checksum over the provided data.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Write the checksum of `record[..len - 4]` into its last four bytes
pub fn seal(record: &mut [u8]) {
    let body_len = record.len() - CHECKSUM_LEN;
    let crc = compute_checksum(&record[..body_len]);
    record[body_len..].copy_from_slice(&crc.to_le_bytes());
}

/// Check a sealed record; records shorter than the checksum never verify
pub fn verify_sealed(record: &[u8]) -> bool {
    if record.len() < CHECKSUM_LEN {
        return false;
    }
    let body_len = record.len() - CHECKSUM_LEN;
    let mut stored = [0u8; CHECKSUM_LEN];
    stored.copy_from_slice(&record[body_len..]);
    compute_checksum(&record[..body_len]) == u32::from_le_bytes(stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_deterministic() {
        let data = b"slot metadata";
        assert_eq!(compute_checksum(data), compute_checksum(data));
    }

    #[test]
    fn test_seal_then_verify() {
        let mut record = vec![0x5Au8; 32];
        seal(&mut record);
        assert!(verify_sealed(&record));
    }

    #[test]
    fn test_verify_detects_bit_flip() {
        let mut record = vec![0x11u8; 32];
        seal(&mut record);
        record[3] ^= 0x01;
        assert!(!verify_sealed(&record));
    }

    #[test]
    fn test_verify_short_record() {
        assert!(!verify_sealed(&[0x00, 0x01]));
    }
}
