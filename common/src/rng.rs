use rand::prelude::{SeedableRng, StdRng};

/// Builds the rng for one stream out of a family of streams. With a base seed the
/// result is reproducible: stream `n` of seed `s` always yields the same sequence.
/// Without one the rng is seeded from entropy.
pub fn create_rng_for_stream(seed: Option<u64>, stream: u64) -> StdRng {
    match seed {
        Some(seed) => {
            let mut bytes = [0; 32];
            bytes[..8].copy_from_slice(&seed.to_le_bytes());
            bytes[8..16].copy_from_slice(&stream.to_le_bytes());
            bytes[16..24].copy_from_slice(&seed.to_le_bytes());
            bytes[24..32].copy_from_slice(&stream.to_le_bytes());

            StdRng::from_seed(bytes)
        }
        None => StdRng::from_entropy(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_same_seed_same_stream_repeats() {
        let a = create_rng_for_stream(Some(7), 3).gen::<u64>();
        let b = create_rng_for_stream(Some(7), 3).gen::<u64>();
        assert_eq!(a, b);
    }

    #[test]
    fn test_streams_differ() {
        let a = create_rng_for_stream(Some(7), 0).gen::<u64>();
        let b = create_rng_for_stream(Some(7), 1).gen::<u64>();
        assert_ne!(a, b);
    }
}
