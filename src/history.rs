// ABOUTME: Fixed-capacity rolling buffers for rate and latency history
// ABOUTME: Provides pre-filled ring buffers, moving-average windows, and per-tick rate samples

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// A ring buffer that is always exactly at capacity.
///
/// Created full of placeholder values; every push evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> RingBuffer<T> {
    pub fn filled(capacity: usize, placeholder: T) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: std::iter::repeat(placeholder).take(capacity).collect(),
            capacity,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Change capacity, keeping the newest entries and padding the oldest
    /// side with `placeholder` when growing.
    pub fn resize(&mut self, capacity: usize, placeholder: T) {
        let capacity = capacity.max(1);
        while self.items.len() > capacity {
            self.items.pop_front();
        }
        while self.items.len() < capacity {
            self.items.push_front(placeholder.clone());
        }
        self.capacity = capacity;
    }
}

/// Moving average over the last `len` values, starting at zero.
#[derive(Debug, Clone)]
pub struct SmoothingWindow {
    values: RingBuffer<f64>,
}

impl SmoothingWindow {
    pub fn new(len: usize) -> Self {
        Self {
            values: RingBuffer::filled(len, 0.0),
        }
    }

    pub fn push(&mut self, value: f64) {
        self.values.push(value);
    }

    pub fn mean(&self) -> f64 {
        let n = self.values.len().max(1);
        self.values.iter().sum::<f64>() / n as f64
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn resize(&mut self, len: usize) {
        self.values.resize(len, 0.0);
    }
}

/// One stats tick worth of graph data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSample {
    pub timestamp: DateTime<Utc>,
    pub total_mbps: f64,
    pub latency_ms: Option<u32>,
}

impl RateSample {
    pub fn placeholder(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            total_mbps: 0.0,
            latency_ms: None,
        }
    }
}

/// Rolling time series for the graph view.
#[derive(Debug, Clone)]
pub struct History {
    samples: RingBuffer<RateSample>,
}

impl History {
    pub fn new(capacity: usize, created_at: DateTime<Utc>) -> Self {
        Self {
            samples: RingBuffer::filled(capacity, RateSample::placeholder(created_at)),
        }
    }

    pub fn push(&mut self, sample: RateSample) {
        self.samples.push(sample);
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn capacity(&self) -> usize {
        self.samples.capacity()
    }

    #[allow(dead_code)]
    pub fn latest(&self) -> Option<&RateSample> {
        self.samples.latest()
    }

    /// Timestamps as fractional unix seconds, oldest first.
    pub fn timestamps(&self) -> Vec<f64> {
        self.samples
            .iter()
            .map(|s| s.timestamp.timestamp_millis() as f64 / 1000.0)
            .collect()
    }

    pub fn rate_series(&self) -> Vec<Option<f64>> {
        self.samples.iter().map(|s| Some(s.total_mbps)).collect()
    }

    pub fn latency_series(&self) -> Vec<Option<f64>> {
        self.samples
            .iter()
            .map(|s| s.latency_ms.map(f64::from))
            .collect()
    }

    pub fn resize(&mut self, capacity: usize) {
        let oldest = self
            .samples
            .iter()
            .next()
            .map(|s| s.timestamp)
            .unwrap_or_else(Utc::now);
        self.samples.resize(capacity, RateSample::placeholder(oldest));
    }
}
