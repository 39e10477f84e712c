//! Fake stretch engine shared by the pipeline tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lf_core::SampleBuffer;
use lf_worker::{EngineError, EngineFactory, EngineResult, EngineSpec, StretchEngine};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Behaviour {
    Normal,
    InitFails,
    ProcessFails,
}

/// Counts units and engines and records every spec it is asked for
#[derive(Clone)]
pub struct CountingFactory {
    behaviour: Behaviour,
    block_delay: Duration,
    units: Arc<AtomicUsize>,
    specs: Arc<Mutex<Vec<EngineSpec>>>,
}

impl CountingFactory {
    pub fn new() -> Self {
        Self {
            behaviour: Behaviour::Normal,
            block_delay: Duration::ZERO,
            units: Arc::new(AtomicUsize::new(0)),
            specs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            ..Self::new()
        }
    }

    /// Every processed block takes at least `delay`
    pub fn slow(delay: Duration) -> Self {
        Self {
            block_delay: delay,
            ..Self::new()
        }
    }

    /// Units that ran initialization
    pub fn units(&self) -> usize {
        self.units.load(Ordering::SeqCst)
    }

    /// Specs of every engine created so far
    pub fn specs(&self) -> Vec<EngineSpec> {
        self.specs.lock().unwrap().clone()
    }
}

impl EngineFactory for CountingFactory {
    fn initialize(&self) -> EngineResult<()> {
        self.units.fetch_add(1, Ordering::SeqCst);
        if self.behaviour == Behaviour::InitFails {
            return Err(EngineError::Init("engine module unavailable".into()));
        }
        Ok(())
    }

    fn create(&self, spec: &EngineSpec) -> EngineResult<Box<dyn StretchEngine>> {
        self.specs.lock().unwrap().push(*spec);
        Ok(Box::new(NearestEngine {
            spec: *spec,
            behaviour: self.behaviour,
            block_delay: self.block_delay,
            input: vec![Vec::new(); spec.channels],
            produced: 0,
            finished: false,
        }))
    }
}

/// Nearest-sample time stretch; pitch is ignored
struct NearestEngine {
    spec: EngineSpec,
    behaviour: Behaviour,
    block_delay: Duration,
    input: Vec<Vec<f32>>,
    produced: usize,
    finished: bool,
}

impl NearestEngine {
    fn reachable(&self) -> usize {
        let consumed = self.input.first().map_or(0, Vec::len);
        if self.finished {
            self.spec.expected_output_frames(consumed)
        } else {
            (consumed as f64 * self.spec.time_ratio).floor() as usize
        }
    }
}

impl StretchEngine for NearestEngine {
    fn samples_required(&self) -> usize {
        256
    }

    fn set_expected_input_duration(&mut self, _frames: usize) {}

    fn study(&mut self, _input: &[&[f32]], _is_final: bool) -> EngineResult<()> {
        Ok(())
    }

    fn process(&mut self, input: &[&[f32]], is_final: bool) -> EngineResult<()> {
        if !self.block_delay.is_zero() {
            std::thread::sleep(self.block_delay);
        }
        if self.behaviour == Behaviour::ProcessFails {
            return Err(EngineError::Processing("phase vocoder diverged".into()));
        }
        for (buffer, block) in self.input.iter_mut().zip(input) {
            buffer.extend_from_slice(block);
        }
        self.finished = is_final;
        Ok(())
    }

    fn available(&self) -> usize {
        self.reachable().saturating_sub(self.produced)
    }

    fn retrieve(&mut self, max_frames: usize) -> Vec<Vec<f32>> {
        let count = max_frames.min(self.available());
        let start = self.produced;
        self.produced += count;
        self.input
            .iter()
            .map(|channel| {
                (start..start + count)
                    .map(|i| {
                        let src = (i as f64 / self.spec.time_ratio) as usize;
                        channel[src.min(channel.len() - 1)]
                    })
                    .collect()
            })
            .collect()
    }
}

/// Mono ramp at 100 Hz, `seconds` long
pub fn track(seconds: usize) -> SampleBuffer {
    let frames = seconds * 100;
    let samples = (0..frames).map(|i| i as f32 / frames as f32).collect();
    SampleBuffer::new(vec![samples], 100).unwrap()
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
