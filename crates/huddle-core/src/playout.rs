use std::collections::VecDeque;
use std::sync::Mutex;

/// Default depth: two seconds of 48 kHz mono PCM.
const DEFAULT_MAX_SAMPLES: usize = 48_000 * 2;

/// Thread-safe ring buffer between the engine's decoded remote audio
/// streams and the host's audio-output pull path.
///
/// Bounded: when the consumer falls behind, the oldest samples are
/// discarded so playout skips rather than accumulating latency.
pub struct PlayoutBuffer {
    samples: Mutex<VecDeque<i16>>,
    max_samples: usize,
}

impl PlayoutBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_SAMPLES)
    }

    /// `max_samples` is the retention bound in i16 samples.
    pub fn with_capacity(max_samples: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(max_samples)),
            max_samples,
        }
    }

    /// Append decoded PCM; drops the oldest samples past the bound.
    pub fn push(&self, pcm: &[i16]) {
        let mut queue = self.samples.lock().unwrap();
        queue.extend(pcm.iter().copied());
        let overflow = queue.len().saturating_sub(self.max_samples);
        if overflow > 0 {
            queue.drain(..overflow);
        }
    }

    /// Fill `out` from the buffer, zero-padding on underrun.
    /// Returns how many samples were actually available.
    pub fn pull(&self, out: &mut [i16]) -> usize {
        let mut queue = self.samples.lock().unwrap();
        let available = queue.len().min(out.len());
        for (slot, sample) in out.iter_mut().zip(queue.drain(..available)) {
            *slot = sample;
        }
        for slot in out[available..].iter_mut() {
            *slot = 0;
        }
        available
    }

    pub fn buffered(&self) -> usize {
        self.samples.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.samples.lock().unwrap().clear();
    }
}

impl Default for PlayoutBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_returns_pushed_samples_in_order() {
        let buffer = PlayoutBuffer::new();
        buffer.push(&[10, 20, 30, 40, 50]);

        let mut out = [0i16; 3];
        assert_eq!(buffer.pull(&mut out), 3);
        assert_eq!(out, [10, 20, 30]);
        assert_eq!(buffer.buffered(), 2);

        let mut rest = [0i16; 5];
        assert_eq!(buffer.pull(&mut rest), 2);
        assert_eq!(rest, [40, 50, 0, 0, 0]);
    }

    #[test]
    fn overflow_discards_oldest() {
        let buffer = PlayoutBuffer::with_capacity(4);
        buffer.push(&[1, 2, 3, 4]);
        buffer.push(&[5, 6]);

        let mut out = [0i16; 6];
        assert_eq!(buffer.pull(&mut out), 4);
        assert_eq!(out, [3, 4, 5, 6, 0, 0]);
    }

    #[test]
    fn underrun_is_silence() {
        let buffer = PlayoutBuffer::new();
        let mut out = [99i16; 4];
        assert_eq!(buffer.pull(&mut out), 0);
        assert_eq!(out, [0, 0, 0, 0]);
    }

    #[test]
    fn clear_discards_everything() {
        let buffer = PlayoutBuffer::new();
        buffer.push(&[1, 2, 3]);
        buffer.clear();
        assert_eq!(buffer.buffered(), 0);
    }
}
