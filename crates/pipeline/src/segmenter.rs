//! Windowing buffer
//!
//! Accumulates raw PCM bytes and releases windows for incremental
//! transcription. A window is released as soon as `min_bytes` are buffered
//! (favouring latency), and never exceeds `max_bytes`.

/// Windowing buffer with latency and size bounds
#[derive(Debug, Clone)]
pub struct Segmenter {
    buffer: Vec<u8>,
    min_bytes: usize,
    max_bytes: usize,
}

impl Segmenter {
    /// Create a segmenter; `max_bytes` is raised to `min_bytes` if smaller
    pub fn new(min_bytes: usize, max_bytes: usize) -> Self {
        let min_bytes = min_bytes.max(1);
        Self {
            buffer: Vec::with_capacity(max_bytes.max(min_bytes)),
            min_bytes,
            max_bytes: max_bytes.max(min_bytes),
        }
    }

    /// Append a chunk, returning a window if one is ready
    pub fn push(&mut self, chunk: &[u8]) -> Option<Vec<u8>> {
        if chunk.is_empty() {
            return None;
        }
        self.buffer.extend_from_slice(chunk);

        if self.buffer.len() >= self.max_bytes {
            let rest = self.buffer.split_off(self.max_bytes);
            return Some(std::mem::replace(&mut self.buffer, rest));
        }

        if self.buffer.len() >= self.min_bytes {
            return Some(std::mem::take(&mut self.buffer));
        }

        None
    }

    /// Drain whatever remains, possibly shorter than `min_bytes`
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }

    /// Bytes currently held
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_three_chunks() {
        let mut seg = Segmenter::new(8000, 16000);
        let chunk = vec![7u8; 4000];

        assert!(seg.push(&chunk).is_none());
        let window = seg.push(&chunk).unwrap();
        assert_eq!(window.len(), 8000);
        assert_eq!(seg.buffered(), 0);
        assert!(seg.push(&chunk).is_none());
        assert_eq!(seg.flush().unwrap().len(), 4000);
        assert!(seg.flush().is_none());
    }

    #[test]
    fn test_max_bytes_slices_front() {
        let mut seg = Segmenter::new(8000, 16000);
        let chunk: Vec<u8> = (0..20000u32).map(|i| (i % 251) as u8).collect();

        let window = seg.push(&chunk).unwrap();
        assert_eq!(window, chunk[..16000]);
        assert_eq!(seg.buffered(), 4000);
        assert_eq!(seg.flush().unwrap(), chunk[16000..]);
    }

    #[test]
    fn test_empty_push_is_noop() {
        let mut seg = Segmenter::new(10, 20);
        assert!(seg.push(&[]).is_none());
        assert_eq!(seg.buffered(), 0);
        assert!(seg.flush().is_none());
    }

    #[test]
    fn test_conservation_and_bounds() {
        let mut seg = Segmenter::new(300, 700);
        let sizes = [1usize, 120, 299, 0, 1, 650, 2000, 13, 700, 333, 7, 1500];

        let mut pushed = Vec::new();
        let mut emitted = Vec::new();
        let mut counter = 0u8;

        for size in sizes {
            let chunk: Vec<u8> = (0..size)
                .map(|_| {
                    counter = counter.wrapping_add(1);
                    counter
                })
                .collect();
            pushed.extend_from_slice(&chunk);

            match seg.push(&chunk) {
                Some(window) => {
                    assert!(window.len() >= 300 && window.len() <= 700);
                    emitted.extend_from_slice(&window);
                }
                None => assert!(seg.buffered() < 300),
            }
        }
        if let Some(rest) = seg.flush() {
            emitted.extend_from_slice(&rest);
        }

        assert_eq!(emitted, pushed);
    }
}
