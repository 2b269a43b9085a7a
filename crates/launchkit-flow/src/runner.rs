use std::collections::VecDeque;

use anyhow::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepFlow {
    Continue,
    Interrupt,
}

/// One unit of a sequential startup/update workflow. Steps are expected to
/// catch their own recoverable errors and report them through the context;
/// an error returned here is terminal for the whole sequence.
pub trait ProcessStep<C> {
    fn name(&self) -> &'static str;
    fn run(&mut self, cx: &mut C) -> Result<StepFlow>;
}

/// An explicit queue value owned by the caller. Independent sequences each
/// own their queue, so two runs can never interfere through shared state.
pub struct StepQueue<C> {
    steps: VecDeque<Box<dyn ProcessStep<C>>>,
}

impl<C> std::fmt::Debug for StepQueue<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepQueue")
            .field("steps", &self.names())
            .finish()
    }
}

impl<C> Default for StepQueue<C> {
    fn default() -> Self {
        Self {
            steps: VecDeque::new(),
        }
    }
}

impl<C> StepQueue<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: impl ProcessStep<C> + 'static) {
        self.steps.push_back(Box::new(step));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }
}

/// Execute steps strictly in order, awaiting each before the next. A step
/// returning `Interrupt` stops the run immediately — the interrupting step
/// is consumed and the remaining steps come back as the checkpoint queue;
/// resuming is re-invoking `run_steps` on that queue, so no step ever
/// re-runs. Step errors are not caught here.
pub fn run_steps<C>(mut queue: StepQueue<C>, cx: &mut C) -> Result<StepQueue<C>> {
    while let Some(mut step) = queue.steps.pop_front() {
        match step.run(cx)? {
            StepFlow::Continue => {}
            StepFlow::Interrupt => break,
        }
    }
    Ok(queue)
}
