//! Memoization and worker offload for the line-information computation.
//!
//! The diff pipeline is a pure function of its inputs, so results are cached
//! by input tuple. The cache is insert-only and coalescing: a second caller
//! arriving with a key whose computation is still in flight blocks on the
//! same slot instead of recomputing.

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;

use crate::compute_lines::{
    compute_line_information, DiffInput, DiffOptions, LineDiff, LineInformation,
};
use crate::error::DiffError;
use crate::hidden_blocks::{compute_hidden_blocks, Block, HiddenBlocks};

/// Input tuple identifying one diff computation. Pre-rendered HTML is
/// deliberately absent: it decorates the output but does not influence the
/// alignment, so re-supplying different highlighting must not fork the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    old: String,
    new: String,
    disable_word_diff: bool,
    compare_method: String,
    lines_offset: u32,
    always_show_lines: Vec<crate::compute_lines::LineId>,
    extra_lines_surrounding_diff: i32,
    ignore_whitespace: bool,
}

impl CacheKey {
    pub fn from_options(options: &DiffOptions) -> Self {
        Self {
            old: input_key(&options.old),
            new: input_key(&options.new),
            disable_word_diff: options.disable_word_diff,
            compare_method: options.compare_method.key_name().to_string(),
            lines_offset: options.lines_offset,
            always_show_lines: options.always_show_lines.clone(),
            extra_lines_surrounding_diff: options.extra_lines_surrounding_diff,
            ignore_whitespace: options.ignore_whitespace,
        }
    }
}

fn input_key(input: &DiffInput) -> String {
    match input {
        DiffInput::Text(text) => text.clone(),
        DiffInput::Json(value) => value.to_string(),
    }
}

/// The full result of one diff computation: aligned rows plus the foldable
/// block metadata derived from them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComputedDiff {
    pub line_information: Vec<LineInformation>,
    pub diff_lines: std::collections::BTreeSet<usize>,
    /// Row index -> block index for O(1) membership tests.
    pub line_blocks: HashMap<usize, usize>,
    pub blocks: Vec<Block>,
}

/// Run the whole pipeline once: alignment, classification, word diffs, then
/// hidden-block grouping. Referentially transparent given its inputs.
pub fn compute_diff_view(options: &DiffOptions) -> Result<ComputedDiff, DiffError> {
    let LineDiff {
        line_information,
        diff_lines,
    } = compute_line_information(options)?;

    let extra = options.extra_lines_surrounding_diff.max(0) as usize;
    let HiddenBlocks {
        line_blocks,
        blocks,
    } = compute_hidden_blocks(&line_information, &diff_lines, extra);

    Ok(ComputedDiff {
        line_information,
        diff_lines,
        line_blocks,
        blocks,
    })
}

type CacheSlot = Arc<OnceLock<Result<Arc<ComputedDiff>, DiffError>>>;

/// Insert-only memoization cache over [`compute_diff_view`].
///
/// Keys are never removed or overwritten. Each key owns a one-shot slot;
/// concurrent callers for the same key all initialize against that slot, so
/// exactly one of them runs the computation and the rest block until it is
/// filled.
#[derive(Default)]
pub struct DiffCache {
    slots: Mutex<HashMap<CacheKey, CacheSlot>>,
    #[cfg(test)]
    computations: std::sync::atomic::AtomicUsize,
}

impl DiffCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached result for this input tuple, computing it on first
    /// use. Errors are cached like successes: a contract violation is a
    /// property of the inputs, so retrying the same key cannot succeed.
    pub fn get_or_compute(&self, options: &DiffOptions) -> Result<Arc<ComputedDiff>, DiffError> {
        let key = CacheKey::from_options(options);
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(slots.entry(key).or_default())
        };
        slot.get_or_init(|| {
            #[cfg(test)]
            self.computations
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            compute_diff_view(options).map(Arc::new)
        })
        .clone()
    }

    #[cfg(test)]
    fn computation_count(&self) -> usize {
        self.computations.load(std::sync::atomic::Ordering::SeqCst)
    }
}

struct Job {
    options: DiffOptions,
    reply: mpsc::Sender<Result<Arc<ComputedDiff>, DiffError>>,
}

/// A dedicated thread running diff computations off the caller's thread.
///
/// One logical request/response round trip per call; placement is the only
/// difference from calling [`DiffCache::get_or_compute`] inline, so the
/// worker and synchronous paths return identical results for identical
/// inputs.
pub struct DiffWorker {
    sender: Option<mpsc::Sender<Job>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl DiffWorker {
    /// Spawn the worker thread. It serves requests against `cache` until the
    /// worker handle is dropped.
    pub fn spawn(cache: Arc<DiffCache>) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        let handle = thread::spawn(move || {
            while let Ok(job) = receiver.recv() {
                let result = cache.get_or_compute(&job.options);
                // A dropped receiver just means the caller stopped waiting.
                let _ = job.reply.send(result);
            }
        });
        Self {
            sender: Some(sender),
            handle: Some(handle),
        }
    }

    /// Enqueue a computation and return the channel its single result will
    /// arrive on. Dropping the receiver abandons the result; the computation
    /// itself is not cancelled and still lands in the cache.
    pub fn request(&self, options: DiffOptions) -> mpsc::Receiver<Result<Arc<ComputedDiff>, DiffError>> {
        let (reply, receiver) = mpsc::channel();
        if let Some(sender) = &self.sender {
            let _ = sender.send(Job { options, reply });
        }
        receiver
    }

    /// Enqueue a computation and block until its result arrives.
    pub fn request_blocking(
        &self,
        options: DiffOptions,
    ) -> Result<Arc<ComputedDiff>, DiffError> {
        self.request(options)
            .recv()
            .map_err(|_| DiffError::WorkerUnavailable)?
    }
}

impl Drop for DiffWorker {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
