//! The ordered worker pool

use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Select, Sender};
use sylva_core::CancelToken;
use sylva_engine::LSystem;

use crate::config::PipelineConfig;
use crate::error::PipelineError;

/// Envelope pairing an L-system with its submission index
struct Order {
    lsystem: LSystem,
    seq: u64,
    outcome: Result<(), sylva_engine::DeriveError>,
}

/// A pool deriving independent L-systems concurrently while emitting results
/// in strict submission order.
pub struct Pipeline {
    input: Option<Sender<LSystem>>,
    output: Receiver<Result<LSystem, PipelineError>>,
    token: CancelToken,
    handles: Vec<JoinHandle<()>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let workers = config.workers.max(1);
        let (input_tx, input_rx) = bounded::<LSystem>(config.input_capacity);
        let (work_tx, work_rx) = bounded::<Order>(config.work_capacity);
        let (output_tx, output_rx) = bounded(config.output_capacity);
        let token = CancelToken::new();

        let mut handles = Vec::with_capacity(workers + 2);

        // Sequencer: single reader of the input queue, assigns dense
        // sequence numbers starting at 0. Exiting drops the only work
        // sender, which closes the work queue.
        handles.push(spawn("sylva-sequencer", move || {
            for (lsystem, seq) in input_rx.iter().zip(0u64..) {
                let order = Order {
                    lsystem,
                    seq,
                    outcome: Ok(()),
                };
                if work_tx.send(order).is_err() {
                    return;
                }
            }
        }));

        // Workers: derive each job to the configured tier bound and forward
        // it on their own output queue.
        let mut worker_rxs = Vec::with_capacity(workers);
        for index in 0..workers {
            let (done_tx, done_rx) = bounded::<Order>(config.worker_output_capacity);
            worker_rxs.push(done_rx);

            let work_rx = work_rx.clone();
            let token = token.clone();
            let max_tiers = config.max_tiers;
            handles.push(spawn(&format!("sylva-worker-{index}"), move || {
                for mut order in work_rx.iter() {
                    order.outcome = order.lsystem.derivate_until(&token, max_tiers);
                    if let Err(err) = &order.outcome {
                        log::warn!("sequence {} failed: {err}", order.seq);
                    }
                    if done_tx.send(order).is_err() {
                        return;
                    }
                }
            }));
        }
        drop(work_rx);

        handles.push(spawn("sylva-resolver", move || {
            resolve(&worker_rxs, &output_tx);
        }));

        Self {
            input: Some(input_tx),
            output: output_rx,
            token,
            handles,
        }
    }

    /// Submit an L-system; blocks on back-pressure.
    ///
    /// Returns the system back if the submission side has been closed.
    pub fn submit(&self, lsystem: LSystem) -> Result<(), LSystem> {
        match &self.input {
            Some(input) => input.send(lsystem).map_err(|err| err.0),
            None => Err(lsystem),
        }
    }

    /// Close the submission side; in-flight work drains to the output and
    /// the stage threads exit.
    pub fn close(&mut self) {
        self.input = None;
    }

    /// Receiving side of the pool, one result per submission in submission
    /// order. Use a single consumer; cloning the receiver splits the stream.
    pub fn output(&self) -> Receiver<Result<LSystem, PipelineError>> {
        self.output.clone()
    }

    /// Make in-flight and queued derivations return promptly with a
    /// cancellation error.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Close the submission side and wait for every stage thread to exit
    pub fn join(mut self) {
        self.close();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn spawn<F>(name: &str, body: F) -> JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.into())
        .spawn(body)
        .expect("failed to spawn pipeline thread")
}

/// Re-emit worker results in strictly increasing sequence order.
///
/// Holds at most one out-of-order result per worker. A worker whose buffer
/// slot is occupied is excluded from selection, so the queue that will
/// deliver `next_seq` is always selectable: sequence numbers are dense, and
/// a non-closed queue with an empty slot still owes at least one value.
fn resolve(worker_rxs: &[Receiver<Order>], output_tx: &Sender<Result<LSystem, PipelineError>>) {
    let mut next_seq = 0u64;
    let mut buffers: Vec<Option<Order>> = (0..worker_rxs.len()).map(|_| None).collect();
    let mut closed = vec![false; worker_rxs.len()];

    loop {
        if closed.iter().all(|&queue_closed| queue_closed) {
            let _ = drain(&mut buffers, &mut next_seq, output_tx);
            return;
        }

        // Select only among queues that can still make progress.
        let mut selection = Select::new();
        let mut queue_of_case = Vec::with_capacity(worker_rxs.len());
        for (queue, done_rx) in worker_rxs.iter().enumerate() {
            if buffers[queue].is_none() && !closed[queue] {
                selection.recv(done_rx);
                queue_of_case.push(queue);
            }
        }
        if queue_of_case.is_empty() {
            panic!("resolver stalled: sequence numbers are not incremental");
        }

        let oper = selection.select();
        let queue = queue_of_case[oper.index()];
        match oper.recv(&worker_rxs[queue]) {
            Err(_) => {
                closed[queue] = true;
                if drain(&mut buffers, &mut next_seq, output_tx).is_err() {
                    return;
                }
            }
            Ok(order) if order.seq == next_seq => {
                if emit(order, output_tx).is_err() {
                    return;
                }
                next_seq += 1;
                if drain(&mut buffers, &mut next_seq, output_tx).is_err() {
                    return;
                }
            }
            Ok(order) => {
                // The slot is empty by the selection invariant.
                buffers[queue] = Some(order);
            }
        }
    }
}

/// Emit buffered orders for as long as one carries `next_seq`; emitting one
/// can unblock another.
fn drain(
    buffers: &mut [Option<Order>],
    next_seq: &mut u64,
    output_tx: &Sender<Result<LSystem, PipelineError>>,
) -> Result<(), ()> {
    loop {
        let slot = buffers
            .iter_mut()
            .find(|slot| matches!(slot, Some(order) if order.seq == *next_seq));
        let Some(slot) = slot else {
            return Ok(());
        };
        if let Some(order) = slot.take() {
            emit(order, output_tx)?;
            *next_seq += 1;
        }
    }
}

fn emit(order: Order, output_tx: &Sender<Result<LSystem, PipelineError>>) -> Result<(), ()> {
    let Order {
        lsystem,
        seq,
        outcome,
    } = order;
    let result = match outcome {
        Ok(()) => Ok(lsystem),
        Err(source) => Err(PipelineError::Derive { seq, source }),
    };
    output_tx.send(result).map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use sylva_core::{
        CustomRule, Environment, Module, Parameters, Rule, RuleError,
    };

    use super::*;

    /// Rewrites `S(i)` to itself after sleeping, simulating compute skew
    struct SleepRule {
        delay: Duration,
    }

    impl CustomRule for SleepRule {
        fn priority(&self) -> i32 {
            0
        }

        fn matches(&self, predecessor: &Module, _: &[Module], _: &[Module]) -> bool {
            predecessor.letter == 'S'
        }

        fn probability(&self) -> f64 {
            1.0
        }

        fn output_size(&self) -> usize {
            1
        }

        fn execute(
            &self,
            output: &mut [Module],
            predecessor: &Module,
            _: &dyn Environment,
        ) -> Result<usize, RuleError> {
            std::thread::sleep(self.delay);
            output[0] = predecessor.clone();
            Ok(1)
        }
    }

    fn job(index: u64, delay: Duration) -> LSystem {
        LSystem::new(Parameters {
            axiom: vec![Module::with_parameters('S', vec![index as f64])],
            rules: vec![Rule::Custom(Arc::new(SleepRule { delay }))],
            seed: index,
            ..Parameters::default()
        })
    }

    fn job_index(lsystem: &LSystem) -> u64 {
        lsystem.export()[0].parameters[0] as u64
    }

    #[test]
    fn test_results_arrive_in_submission_order() {
        let mut pipeline =
            Pipeline::new(PipelineConfig::default().with_workers(4).with_max_tiers(0));
        let output = pipeline.output();

        let consumer = thread::spawn(move || {
            output
                .iter()
                .map(|result| job_index(&result.unwrap()))
                .collect::<Vec<_>>()
        });

        for index in 0..20 {
            pipeline
                .submit(job(index, Duration::ZERO))
                .map_err(|_| ())
                .unwrap();
        }
        pipeline.close();

        let indices = consumer.join().unwrap();
        assert_eq!(indices, (0..20).collect::<Vec<_>>());
        pipeline.join();
    }

    #[test]
    fn test_order_is_preserved_under_compute_skew() {
        // Even-indexed jobs run 10x longer than odd-indexed ones.
        let mut pipeline =
            Pipeline::new(PipelineConfig::default().with_workers(4).with_max_tiers(0));
        let output = pipeline.output();

        let consumer = thread::spawn(move || {
            output
                .iter()
                .map(|result| job_index(&result.unwrap()))
                .collect::<Vec<_>>()
        });

        for index in 0..100 {
            let delay = if index % 2 == 0 {
                Duration::from_millis(2)
            } else {
                Duration::from_micros(200)
            };
            pipeline.submit(job(index, delay)).map_err(|_| ()).unwrap();
        }
        pipeline.close();

        let indices = consumer.join().unwrap();
        assert_eq!(indices, (0..100).collect::<Vec<_>>());
        pipeline.join();
    }

    /// Always fails, for error propagation tests
    struct FailingRule;

    impl CustomRule for FailingRule {
        fn priority(&self) -> i32 {
            0
        }

        fn matches(&self, predecessor: &Module, _: &[Module], _: &[Module]) -> bool {
            predecessor.letter == 'F'
        }

        fn probability(&self) -> f64 {
            1.0
        }

        fn output_size(&self) -> usize {
            1
        }

        fn execute(
            &self,
            _: &mut [Module],
            _: &Module,
            _: &dyn Environment,
        ) -> Result<usize, RuleError> {
            Err(RuleError::Rewrite("broken on purpose".to_string()))
        }
    }

    #[test]
    fn test_derivation_errors_keep_their_sequence_position() {
        let mut pipeline =
            Pipeline::new(PipelineConfig::default().with_workers(2).with_max_tiers(0));
        let output = pipeline.output();

        let consumer = thread::spawn(move || output.iter().collect::<Vec<_>>());

        pipeline.submit(job(0, Duration::ZERO)).map_err(|_| ()).unwrap();
        let failing = LSystem::new(Parameters {
            axiom: vec![Module::new('F')],
            rules: vec![Rule::Custom(Arc::new(FailingRule))],
            ..Parameters::default()
        });
        pipeline.submit(failing).map_err(|_| ()).unwrap();
        pipeline.submit(job(2, Duration::ZERO)).map_err(|_| ()).unwrap();
        pipeline.close();

        let results = consumer.join().unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(
            matches!(&results[1], Err(PipelineError::Derive { seq: 1, .. })),
            "the failure must surface at its submission position"
        );
        assert!(results[2].is_ok());
        pipeline.join();
    }

    #[test]
    fn test_empty_pipeline_shuts_down() {
        let mut pipeline = Pipeline::new(PipelineConfig::default().with_workers(2));
        let output = pipeline.output();
        pipeline.close();

        assert!(output.iter().next().is_none());
        pipeline.join();
    }

    #[test]
    fn test_cancelled_pipeline_reports_cancellation() {
        let pipeline = Pipeline::new(PipelineConfig::default().with_workers(2));
        let output = pipeline.output();
        pipeline.cancel();

        pipeline.submit(job(0, Duration::ZERO)).map_err(|_| ()).unwrap();

        let result = output.recv().unwrap();
        assert!(matches!(result, Err(PipelineError::Derive { seq: 0, .. })));
        pipeline.join();
    }
}
