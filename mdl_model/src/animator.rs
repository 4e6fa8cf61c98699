//! Playback state for evaluating a model's sequences each frame.
//!
//! The [Animator] stores the inputs for a bound [ModelRoot] between frames.
//! Callers that own their own state can use [advance_frame] and [evaluate_bones] directly.
//!
//! ```rust no_run
//! use mdl_model::animator::Animator;
//!
//! let root = mdl_model::load_model("models/scientist.mdl")?;
//!
//! let mut animator = Animator::new();
//! animator.bind(&root);
//! if let Some(index) = root.sequence_index("walk") {
//!     animator.set_sequence(index);
//! }
//!
//! animator.advance(1.0 / 60.0);
//! let transforms = animator.setup_bones();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
use glam::Affine3A;

use crate::{
    ModelRoot,
    animation::{ControllerValues, Sequence},
    transform::model_space_transforms,
};

/// The largest time step in seconds applied by a single call to [advance_frame].
pub const MAX_FRAME_DELTA: f32 = 0.1;

/// Advance `frame` by `delta_seconds` at the playback rate of `sequence`.
///
/// The time step is limited to [MAX_FRAME_DELTA] to avoid large jumps after a stall.
/// Frames wrap to `0.0..frame_count - 1`, so the last frame is shown as the first frame.
pub fn advance_frame(frame: f32, delta_seconds: f32, sequence: &Sequence) -> f32 {
    let delta_seconds = delta_seconds.min(MAX_FRAME_DELTA);
    let frame = frame + delta_seconds * sequence.fps;

    if sequence.frame_count <= 1 {
        0.0
    } else {
        let length = (sequence.frame_count - 1) as f32;
        frame - (frame / length).floor() * length
    }
}

/// Compute the model space transform of each bone for the sequence at `sequence_index`
/// or `None` if the sequence or its animation is unavailable.
///
/// Transforms are in the same order as [bones](crate::skeleton::Skeleton::bones).
pub fn evaluate_bones(
    root: &ModelRoot,
    sequence_index: usize,
    frame: f32,
    values: &ControllerValues,
) -> Option<Vec<Affine3A>> {
    let sequence = root.sequences.get(sequence_index)?;
    let poses = sequence.sample_poses(&root.skeleton, frame, values)?;
    Some(model_space_transforms(
        &poses,
        &root.skeleton.parent_indices(),
    ))
}

/// The current sequence, frame, and controller inputs for a bound model.
#[derive(Debug, Default)]
pub struct Animator<'a> {
    root: Option<&'a ModelRoot>,
    sequence_index: usize,
    frame: f32,
    controller_values: ControllerValues,
    transforms: Vec<Affine3A>,
}

impl<'a> Animator<'a> {
    /// Create an animator with no bound model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `root` for future updates.
    ///
    /// The sequence, frame, and controller values are kept.
    pub fn bind(&mut self, root: &'a ModelRoot) {
        self.root = Some(root);
    }

    pub fn unbind(&mut self) {
        self.root = None;
    }

    pub fn is_bound(&self) -> bool {
        self.root.is_some()
    }

    /// Play the sequence at `index` from the first frame.
    pub fn set_sequence(&mut self, index: usize) {
        self.sequence_index = index;
        self.frame = 0.0;
    }

    pub fn sequence_index(&self) -> usize {
        self.sequence_index
    }

    pub fn frame(&self) -> f32 {
        self.frame
    }

    pub fn set_frame(&mut self, frame: f32) {
        self.frame = frame;
    }

    pub fn set_controller_values(&mut self, values: ControllerValues) {
        self.controller_values = values;
    }

    pub fn controller_values(&self) -> ControllerValues {
        self.controller_values
    }

    /// The current sequence with out of range indices using the first sequence.
    pub fn sequence(&self) -> Option<&'a Sequence> {
        let root = self.root?;
        root.sequences
            .get(self.sequence_index)
            .or_else(|| root.sequences.first())
    }

    /// Advance the current frame by `delta_seconds` and return the new frame.
    pub fn advance(&mut self, delta_seconds: f32) -> f32 {
        if let Some(sequence) = self.sequence() {
            self.frame = advance_frame(self.frame, delta_seconds, sequence);
        }
        self.frame
    }

    /// Evaluate the current sequence and return the model space transform for each bone.
    ///
    /// The previous transforms are returned if no model is bound
    /// or the animation is unavailable.
    pub fn setup_bones(&mut self) -> &[Affine3A] {
        if let Some(root) = self.root {
            let index = if self.sequence_index < root.sequences.len() {
                self.sequence_index
            } else {
                0
            };

            match evaluate_bones(root, index, self.frame, &self.controller_values) {
                Some(transforms) => self.transforms = transforms,
                None => {
                    // Keep the previous pose if the bone count still matches.
                    let bone_count = root.skeleton.bones.len();
                    if self.transforms.len() != bone_count {
                        self.transforms = vec![Affine3A::IDENTITY; bone_count];
                    }
                }
            }
        }
        &self.transforms
    }

    /// The transforms from the most recent call to [setup_bones](Self::setup_bones).
    pub fn transforms(&self) -> &[Affine3A] {
        &self.transforms
    }
}
