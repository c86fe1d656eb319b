//! Process-lifetime randomness behind a mutex.
//!
//! Seeded once at startup; every identifier and jitter draw comes from the
//! same generator, so outputs stay uncorrelated across calls.
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;

const DIGITS: &[u8] = b"0123456789";
const HEX_LOWER: &[u8] = b"0123456789abcdef";
const ALNUM_LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

pub struct MutexRng {
    inner: Mutex<rand::rngs::StdRng>,
}

impl MutexRng {
    pub fn new() -> Self {
        let seed = rand::thread_rng().gen::<[u8; 32]>();
        Self {
            inner: Mutex::new(rand::rngs::StdRng::from_seed(seed)),
        }
    }

    /// Uniform draw in `[low, high)` seconds, used to smear tracker startup.
    pub async fn jitter_secs(&self, low: u64, high: u64) -> u64 {
        let mut g = self.inner.lock().await;
        g.gen_range(low..high)
    }

    /// Random lowercase alphanumeric string of length `n`.
    pub async fn alnum_lower(&self, n: usize) -> String {
        self.from_alphabet(ALNUM_LOWER, n).await
    }

    /// Random numeric string of length `n`.
    pub async fn digits(&self, n: usize) -> String {
        self.from_alphabet(DIGITS, n).await
    }

    /// UUID-shaped delivery identifier: lowercase hex groups 8-4-4-4-12.
    pub async fn delivery_id(&self) -> String {
        let mut g = self.inner.lock().await;
        let mut group = |n: usize| -> String {
            (0..n)
                .map(|_| HEX_LOWER[g.gen_range(0..HEX_LOWER.len())] as char)
                .collect()
        };
        let (a, b, c, d, e) = (group(8), group(4), group(4), group(4), group(12));
        format!("{a}-{b}-{c}-{d}-{e}")
    }

    async fn from_alphabet(&self, alphabet: &[u8], n: usize) -> String {
        let mut g = self.inner.lock().await;
        (0..n)
            .map(|_| alphabet[g.gen_range(0..alphabet.len())] as char)
            .collect()
    }
}

impl Default for MutexRng {
    fn default() -> Self {
        Self::new()
    }
}
