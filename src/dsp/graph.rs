//! Sample graph evaluator.
//!
//! Every signal source in the engine is a [`Sampler`]: a constant, a product of
//! other samplers, or a stateful [`Generator`]. Graphs are evaluated one frame
//! at a time against a [`RenderContext`], and a generator is computed at most
//! once per tick no matter how many downstream consumers read it.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared handle to a sampler. The same node may appear in several graphs.
pub type SamplerRef = Rc<Sampler>;

/// Clock and rate for one evaluation run.
///
/// Created fresh for each offline render (or once for a live graph) and
/// advanced by exactly one tick per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    sample_rate: f64,
    tick: u64,
}

impl RenderContext {
    pub fn new(sample_rate: f64) -> Self {
        RenderContext {
            sample_rate,
            tick: 0,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Index of the frame currently being computed.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Move on to the next frame.
    pub fn advance(&mut self) {
        self.tick += 1;
    }

    /// Rewind the clock to frame 0.
    pub fn reset(&mut self) {
        self.tick = 0;
    }
}

/// Per-tick computation behind a [`Generator`].
///
/// `time` is the generator's own elapsed time in seconds: 0 on the first
/// computation, then one sample period more on each following tick.
pub trait Kernel {
    fn next_sample(&mut self, ctx: &RenderContext, time: f64) -> f64;
}

/// Bookkeeping owned by every generator.
#[derive(Debug, Clone, Default)]
struct GeneratorState {
    time: f64,
    last_sample: f64,
    last_tick: Option<u64>,
}

/// A stateful sampler with a memoized output.
pub struct Generator {
    state: RefCell<GeneratorState>,
    kernel: RefCell<Box<dyn Kernel>>,
}

impl Generator {
    pub fn new(kernel: impl Kernel + 'static) -> Self {
        Generator {
            state: RefCell::new(GeneratorState::default()),
            kernel: RefCell::new(Box::new(kernel)),
        }
    }

    /// Elapsed time in seconds, advanced once per computed tick.
    pub fn time(&self) -> f64 {
        self.state.borrow().time
    }

    fn evaluate(&self, ctx: &RenderContext) -> f64 {
        let time = {
            let state = self.state.borrow();
            if state.last_tick == Some(ctx.tick()) {
                return state.last_sample;
            }
            state.time
        };

        let sample = self.kernel.borrow_mut().next_sample(ctx, time);

        let mut state = self.state.borrow_mut();
        state.last_sample = sample;
        state.time += 1.0 / ctx.sample_rate();
        state.last_tick = Some(ctx.tick());
        sample
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Generator")
            .field("time", &state.time)
            .field("last_sample", &state.last_sample)
            .field("last_tick", &state.last_tick)
            .finish_non_exhaustive()
    }
}

/// A unit of signal generation.
#[derive(Debug)]
pub enum Sampler {
    /// DC offset: always evaluates to itself.
    Constant(f64),
    /// Multiplies all members; an empty product is 1.
    Product(Vec<SamplerRef>),
    Generator(Generator),
}

impl Sampler {
    pub fn constant(value: f64) -> SamplerRef {
        Rc::new(Sampler::Constant(value))
    }

    pub fn product(members: Vec<SamplerRef>) -> SamplerRef {
        Rc::new(Sampler::Product(members))
    }

    pub fn generator(kernel: impl Kernel + 'static) -> SamplerRef {
        Rc::new(Sampler::Generator(Generator::new(kernel)))
    }

    /// Value of this sampler for the context's current tick.
    pub fn evaluate(&self, ctx: &RenderContext) -> f64 {
        match self {
            Sampler::Constant(value) => *value,
            Sampler::Product(members) => members
                .iter()
                .fold(1.0, |acc, member| acc * member.evaluate(ctx)),
            Sampler::Generator(generator) => generator.evaluate(ctx),
        }
    }
}

impl From<f64> for Sampler {
    fn from(value: f64) -> Self {
        Sampler::Constant(value)
    }
}
