//! Reed-Solomon erasure coding.
//!
//! Splits a byte buffer into D data + P parity shards of equal size so the
//! original survives the loss of up to P shards. This lane is independent of
//! the stream transport; it exists for future unreliable-transport use.

use reed_solomon_erasure::galois_8::ReedSolomon;

use crate::error::{Error, Result};

/// Encoder/decoder for a fixed (data, parity) shard geometry.
pub struct ErasureCoder {
    data_shards: usize,
    parity_shards: usize,
    shard_size: usize,
    codec: ReedSolomon,
}

impl ErasureCoder {
    /// Create a coder; both shard counts must be positive.
    pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self> {
        if data_shards == 0 || parity_shards == 0 {
            return Err(Error::Validation {
                message: "data and parity shard counts must be greater than zero".into(),
            });
        }
        let codec = ReedSolomon::new(data_shards, parity_shards).map_err(|e| Error::Codec {
            message: format!("create reed-solomon codec: {}", e),
        })?;
        Ok(Self {
            data_shards,
            parity_shards,
            shard_size: 0,
            codec,
        })
    }

    pub fn data_shards(&self) -> usize {
        self.data_shards
    }

    pub fn parity_shards(&self) -> usize {
        self.parity_shards
    }

    /// Shard size chosen by the last `encode` (or `calculate_shard_size`).
    pub fn shard_size(&self) -> usize {
        self.shard_size
    }

    /// Shard size that evenly splits `data_size` across the data shards;
    /// stored on the coder for later joining.
    pub fn calculate_shard_size(&mut self, data_size: usize) -> usize {
        if data_size == 0 {
            self.shard_size = 0;
        } else {
            self.shard_size = data_size.div_ceil(self.data_shards);
        }
        self.shard_size
    }

    /// Split `data` into D+P shards, zero-padding the data tail, and compute
    /// the parity shards.
    pub fn encode(&mut self, data: &[u8]) -> Result<Vec<Vec<u8>>> {
        if data.is_empty() {
            return Err(Error::Validation {
                message: "cannot erasure-encode an empty buffer".into(),
            });
        }

        let shard_size = if self.shard_size > 0 {
            self.shard_size
        } else {
            self.calculate_shard_size(data.len())
        };

        let total = self.data_shards + self.parity_shards;
        let mut shards: Vec<Vec<u8>> = Vec::with_capacity(total);
        for i in 0..self.data_shards {
            let start = (i * shard_size).min(data.len());
            let end = ((i + 1) * shard_size).min(data.len());
            let mut shard = vec![0u8; shard_size];
            shard[..end - start].copy_from_slice(&data[start..end]);
            shards.push(shard);
        }
        for _ in 0..self.parity_shards {
            shards.push(vec![0u8; shard_size]);
        }

        self.codec.encode(&mut shards).map_err(|e| Error::Codec {
            message: format!("reed-solomon encode: {}", e),
        })?;
        Ok(shards)
    }

    /// Reconstruct erased shards (`None` entries) and return the
    /// concatenation of the D data shards, tail padding included; the caller
    /// trims to the original length if known.
    pub fn decode(&self, mut shards: Vec<Option<Vec<u8>>>) -> Result<Vec<u8>> {
        self.validate_shards(&shards)?;

        self.codec
            .reconstruct(&mut shards)
            .map_err(|e| Error::Codec {
                message: format!("reed-solomon reconstruct: {}", e),
            })?;

        let mut data = Vec::with_capacity(
            shards
                .first()
                .and_then(|s| s.as_ref())
                .map_or(0, |s| s.len())
                * self.data_shards,
        );
        for shard in shards.iter().take(self.data_shards) {
            // reconstruct fills every erased slot on success
            let shard = shard.as_ref().ok_or_else(|| Error::Codec {
                message: "reconstruction left a missing data shard".into(),
            })?;
            data.extend_from_slice(shard);
        }
        Ok(data)
    }

    /// Check shard count, consistent lengths, and that at least D shards are
    /// present.
    pub fn validate_shards(&self, shards: &[Option<Vec<u8>>]) -> Result<()> {
        let total = self.data_shards + self.parity_shards;
        if shards.len() != total {
            return Err(Error::Validation {
                message: format!("expected {} shards, got {}", total, shards.len()),
            });
        }

        let mut shard_len = 0;
        let mut present = 0;
        for (i, shard) in shards.iter().enumerate() {
            let Some(shard) = shard else { continue };
            if shard_len == 0 {
                shard_len = shard.len();
            } else if shard.len() != shard_len {
                return Err(Error::Validation {
                    message: format!("shard {} has inconsistent length", i),
                });
            }
            present += 1;
        }

        if present < self.data_shards {
            return Err(Error::Validation {
                message: format!(
                    "not enough shards present: have {}, need {}",
                    present, self.data_shards
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    #[test]
    fn rejects_zero_shard_counts() {
        assert!(ErasureCoder::new(0, 3).is_err());
        assert!(ErasureCoder::new(10, 0).is_err());
    }

    #[test]
    fn shard_size_is_ceiling_division() {
        let mut coder = ErasureCoder::new(10, 3).unwrap();
        assert_eq!(coder.calculate_shard_size(1000), 100);
        assert_eq!(coder.calculate_shard_size(1001), 101);
        assert_eq!(coder.calculate_shard_size(0), 0);
    }

    #[test]
    fn roundtrip_without_erasures() {
        let mut coder = ErasureCoder::new(4, 2).unwrap();
        let data = pattern(1000);

        let shards = coder.encode(&data).unwrap();
        assert_eq!(shards.len(), 6);

        let decoded = coder
            .decode(shards.into_iter().map(Some).collect())
            .unwrap();
        assert_eq!(&decoded[..data.len()], &data[..]);
    }

    #[test]
    fn reconstructs_with_max_erasures() {
        let mut coder = ErasureCoder::new(10, 3).unwrap();
        let data = pattern(64 * 1024);

        let shards = coder.encode(&data).unwrap();
        let mut with_losses: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
        with_losses[2] = None;
        with_losses[5] = None;
        with_losses[9] = None;

        let decoded = coder.decode(with_losses).unwrap();
        assert_eq!(&decoded[..data.len()], &data[..]);
    }

    #[test]
    fn parity_shard_loss_alone_recovers() {
        let mut coder = ErasureCoder::new(4, 2).unwrap();
        let data = pattern(500);

        let shards = coder.encode(&data).unwrap();
        let mut with_losses: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
        with_losses[4] = None;
        with_losses[5] = None;

        let decoded = coder.decode(with_losses).unwrap();
        assert_eq!(&decoded[..data.len()], &data[..]);
    }

    #[test]
    fn too_many_erasures_fails() {
        let mut coder = ErasureCoder::new(4, 2).unwrap();
        let data = pattern(400);

        let shards = coder.encode(&data).unwrap();
        let mut with_losses: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
        with_losses[0] = None;
        with_losses[1] = None;
        with_losses[2] = None;

        assert!(coder.decode(with_losses).is_err());
    }

    #[test]
    fn validate_rejects_wrong_count() {
        let coder = ErasureCoder::new(4, 2).unwrap();
        let shards: Vec<Option<Vec<u8>>> = vec![Some(vec![0u8; 10]); 5];
        assert!(coder.validate_shards(&shards).is_err());
    }

    #[test]
    fn validate_rejects_inconsistent_lengths() {
        let coder = ErasureCoder::new(2, 2).unwrap();
        let shards = vec![
            Some(vec![0u8; 10]),
            Some(vec![0u8; 11]),
            Some(vec![0u8; 10]),
            Some(vec![0u8; 10]),
        ];
        assert!(coder.validate_shards(&shards).is_err());
    }

    #[test]
    fn encode_rejects_empty_buffer() {
        let mut coder = ErasureCoder::new(4, 2).unwrap();
        assert!(coder.encode(b"").is_err());
    }

    #[test]
    fn short_buffer_pads_trailing_shards() {
        let mut coder = ErasureCoder::new(4, 2).unwrap();
        // Shorter than the shard count: one byte per shard, last shard padded.
        let data = vec![0xEE; 3];
        let shards = coder.encode(&data).unwrap();

        assert!(shards.iter().all(|s| s.len() == 1));
        let decoded = coder
            .decode(shards.into_iter().map(Some).collect())
            .unwrap();
        assert_eq!(&decoded[..3], &data[..]);
    }
}
