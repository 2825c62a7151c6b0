//! In-memory hosts for driving the engine in tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use manifold_core::{HostPolicy, ParameterMap, RtProcessor, SinkPort, SourcePort};

/// Blocks exchanged with the "device": one slot per registered port.
pub struct SharedIo {
    block_size: usize,
    inputs: Mutex<Vec<Vec<f32>>>,
    outputs: Mutex<Vec<Vec<f32>>>,
}

impl SharedIo {
    pub fn new(block_size: usize) -> Arc<Self> {
        Arc::new(Self {
            block_size,
            inputs: Mutex::new(Vec::new()),
            outputs: Mutex::new(Vec::new()),
        })
    }

    /// Set the block input port `idx` serves on the next cycles.
    pub fn set_input(&self, idx: usize, data: &[f32]) {
        let mut inputs = self.inputs.lock().unwrap();
        inputs[idx].copy_from_slice(data);
    }

    /// Last block published by output port `idx`.
    pub fn output(&self, idx: usize) -> Vec<f32> {
        self.outputs.lock().unwrap()[idx].clone()
    }

    fn add_input_port(self: &Arc<Self>) -> Box<dyn SourcePort<f32>> {
        let idx = {
            let mut inputs = self.inputs.lock().unwrap();
            inputs.push(vec![0.0; self.block_size]);
            inputs.len() - 1
        };
        let io = Arc::clone(self);
        Box::new(move |block: &mut [f32]| {
            let inputs = io.inputs.lock().unwrap();
            block.copy_from_slice(&inputs[idx]);
        })
    }

    fn add_output_port(self: &Arc<Self>) -> Box<dyn SinkPort<f32>> {
        let idx = {
            let mut outputs = self.outputs.lock().unwrap();
            outputs.push(vec![0.0; self.block_size]);
            outputs.len() - 1
        };
        let io = Arc::clone(self);
        Box::new(move |block: &[f32]| {
            let mut outputs = io.outputs.lock().unwrap();
            outputs[idx].copy_from_slice(block);
        })
    }
}

/// Host whose cycles are driven explicitly by the test thread.
///
/// Also models the "stalled host" case: once active, no cycle runs until
/// [`cycle`](ManualHost::cycle) is called, so pushed commands sit in the
/// inbound ring.
pub struct ManualHost {
    pub io: Arc<SharedIo>,
    rt: Option<RtProcessor>,
}

impl ManualHost {
    pub fn new(io: Arc<SharedIo>) -> Self {
        Self { io, rt: None }
    }

    /// Run one audio cycle on the calling thread.
    pub fn cycle(&mut self) {
        self.rt
            .as_mut()
            .expect("host is not active")
            .process();
    }

    /// Direct access to the processor while active.
    pub fn rt_mut(&mut self) -> &mut RtProcessor {
        self.rt.as_mut().expect("host is not active")
    }
}

impl HostPolicy<f32> for ManualHost {
    fn activate(&mut self, rt: RtProcessor) -> Result<(), RtProcessor> {
        self.rt = Some(rt);
        Ok(())
    }

    fn deactivate(&mut self) -> Option<RtProcessor> {
        self.rt.take()
    }

    fn make_source(&mut self, _params: &ParameterMap) -> Result<Box<dyn SourcePort<f32>>, String> {
        Ok(self.io.add_input_port())
    }

    fn make_sink(&mut self, _params: &ParameterMap) -> Result<Box<dyn SinkPort<f32>>, String> {
        Ok(self.io.add_output_port())
    }
}

/// Host running cycles continuously on its own "audio" thread.
pub struct ThreadedHost {
    pub io: Arc<SharedIo>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<RtProcessor>>,
}

impl ThreadedHost {
    pub fn new(io: Arc<SharedIo>) -> Self {
        Self {
            io,
            stop: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }
}

impl HostPolicy<f32> for ThreadedHost {
    fn activate(&mut self, mut rt: RtProcessor) -> Result<(), RtProcessor> {
        self.stop.store(false, Ordering::Release);
        let stop = Arc::clone(&self.stop);
        let handle = std::thread::Builder::new()
            .name("test-audio".to_string())
            .spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    rt.process();
                    std::thread::sleep(Duration::from_micros(100));
                }
                rt
            })
            .expect("failed to spawn audio thread");
        self.handle = Some(handle);
        Ok(())
    }

    fn deactivate(&mut self) -> Option<RtProcessor> {
        let handle = self.handle.take()?;
        self.stop.store(true, Ordering::Release);
        Some(handle.join().expect("audio thread panicked"))
    }

    fn make_source(&mut self, _params: &ParameterMap) -> Result<Box<dyn SourcePort<f32>>, String> {
        Ok(self.io.add_input_port())
    }

    fn make_sink(&mut self, _params: &ParameterMap) -> Result<Box<dyn SinkPort<f32>>, String> {
        Ok(self.io.add_output_port())
    }
}

/// Engine parameters for a block size of `block_size` and `threads`
/// total threads.
pub fn engine_params(block_size: usize, threads: usize) -> ParameterMap {
    ParameterMap::new()
        .with("block_size", block_size)
        .with("sample_rate", 48000usize)
        .with("threads", threads)
}
