//! Minimal engine wiring: N inputs averaged into M outputs.
//!
//! The host here is a stand-in for a device binding: it serves ramp
//! signals as input blocks and prints what the outputs publish. Run with
//! `cargo run --example passthrough`.

use std::sync::{Arc, Mutex};

use manifold_core::{
    combine_transform, CombineRule, Engine, HostPolicy, ParameterMap, RtProcessor, Selection,
    SinkPort, SourcePort, SourceRef,
};

/// Averages every selected source.
struct Average {
    weight: f32,
}

impl CombineRule<SourceRef<f32>, f32> for Average {
    fn select(&mut self, _src: &SourceRef<f32>) -> Selection {
        Selection::Take
    }
    fn map(&mut self, x: f32) -> f32 {
        self.weight * x
    }
}

struct DemoIo {
    block_size: usize,
    cycle: Mutex<u64>,
    published: Mutex<Vec<Vec<f32>>>,
}

/// Host that synthesizes inputs and collects outputs in memory.
struct DemoHost {
    io: Arc<DemoIo>,
    rt: Option<RtProcessor>,
    inputs: usize,
}

impl DemoHost {
    fn new(block_size: usize) -> Self {
        Self {
            io: Arc::new(DemoIo {
                block_size,
                cycle: Mutex::new(0),
                published: Mutex::new(Vec::new()),
            }),
            rt: None,
            inputs: 0,
        }
    }

    fn run_cycle(&mut self) {
        *self.io.cycle.lock().unwrap() += 1;
        if let Some(rt) = self.rt.as_mut() {
            rt.process();
        }
    }
}

impl HostPolicy<f32> for DemoHost {
    fn activate(&mut self, rt: RtProcessor) -> Result<(), RtProcessor> {
        self.rt = Some(rt);
        Ok(())
    }

    fn deactivate(&mut self) -> Option<RtProcessor> {
        self.rt.take()
    }

    fn make_source(&mut self, _params: &ParameterMap) -> Result<Box<dyn SourcePort<f32>>, String> {
        // Each input serves a ramp offset by its channel number
        let channel = self.inputs as f32;
        self.inputs += 1;
        let io = Arc::clone(&self.io);
        Ok(Box::new(move |block: &mut [f32]| {
            let cycle = *io.cycle.lock().unwrap() as f32;
            for (n, s) in block.iter_mut().enumerate() {
                *s = channel + cycle * 0.1 + n as f32 / io.block_size as f32;
            }
        }))
    }

    fn make_sink(&mut self, _params: &ParameterMap) -> Result<Box<dyn SinkPort<f32>>, String> {
        let io = Arc::clone(&self.io);
        let idx = {
            let mut published = self.io.published.lock().unwrap();
            published.push(vec![0.0; self.io.block_size]);
            published.len() - 1
        };
        Ok(Box::new(move |block: &[f32]| {
            io.published.lock().unwrap()[idx].copy_from_slice(block);
        }))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let params = ParameterMap::new()
        .with("block_size", 8usize)
        .with("sample_rate", 48000usize)
        .with("threads", 2usize)
        .with("in_channels", 3usize)
        .with("out_channels", 2usize);

    let mut engine = Engine::new(DemoHost::new(8), params)?;

    let in_channels = engine.config().in_channels.unwrap_or(1);
    let out_channels = engine.config().out_channels.unwrap_or(1);

    let mut sources = Vec::new();
    for _ in 0..in_channels {
        sources.push(engine.add_input(&ParameterMap::new())?.source());
    }

    for _ in 0..out_channels {
        let sources = sources.clone();
        let mut rule = Average {
            weight: 1.0 / in_channels as f32,
        };
        engine.add_output(&ParameterMap::new(), move |block: &mut [f32]| {
            combine_transform(sources.iter(), block, &mut rule);
        })?;
    }

    engine.activate();

    for _ in 0..3 {
        engine.host_mut().run_cycle();
        let published = engine.host().io.published.lock().unwrap().clone();
        for (idx, block) in published.iter().enumerate() {
            println!("out {idx}: {block:?}");
        }
    }

    engine.deactivate()?;
    Ok(())
}
